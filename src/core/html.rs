// src/core/html.rs
// Case-insensitive tag scanning. Only ASCII is lowercased, so byte offsets in the
// lowered copy line up with the original.

pub fn to_lower(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_ascii() {
                c.to_ascii_lowercase()
            } else {
                c
            }
        })
        .collect()
}
pub fn next_tag_block_ci(s: &str, o: &str, c: &str, from: usize) -> Option<(usize, usize)> {
    let lc = to_lower(s);
    let ol = to_lower(o);
    let cl = to_lower(c);
    let start = lc.get(from..)?.find(&ol)? + from;
    let open_end = s[start..].find('>')? + start + 1;
    let end_rel = lc[open_end..].find(&cl)?;
    let end = open_end + end_rel + c.len();
    Some((start, end))
}

/// Next `<td>` or `<th>` block, whichever comes first.
pub fn next_cell_block_ci(s: &str, from: usize) -> Option<(usize, usize, bool)> {
    let td = next_tag_block_ci(s, "<td", "</td>", from);
    let th = next_tag_block_ci(s, "<th", "</th>", from);
    match (td, th) {
        (Some(d), Some(h)) if h.0 < d.0 => Some((h.0, h.1, true)),
        (Some(d), _) => Some((d.0, d.1, false)),
        (None, Some(h)) => Some((h.0, h.1, true)),
        (None, None) => None,
    }
}

/// Every block whose opening tag contains `class_sub` inside its class attribute.
pub fn blocks_with_class_ci<'a>(s: &'a str, tag: &str, class_sub: &str) -> Vec<&'a str> {
    let open = join!("<", tag);
    let close = format!("</{tag}>");
    let class_lc = to_lower(class_sub);
    let mut out = Vec::new();
    let mut pos = 0usize;
    while let Some((b_s, b_e)) = next_tag_block_ci(s, &open, &close, pos) {
        let block = &s[b_s..b_e];
        pos = b_e;
        let classes = attr_value(open_tag(block), "class").unwrap_or_default();
        if to_lower(&classes).split_whitespace().any(|c| c == class_lc) {
            out.push(block);
        }
    }
    out
}

/// The `<tag ...>` part of a block.
pub fn open_tag(block: &str) -> &str {
    match block.find('>') {
        Some(i) => &block[..=i],
        None => block,
    }
}

/// Attribute value from an opening tag; quoted or bare.
pub fn attr_value(tag: &str, name: &str) -> Option<String> {
    let lc = to_lower(tag);
    let needle = join!(&to_lower(name), "=");
    let mut from = 0usize;
    while let Some(rel) = lc[from..].find(&needle) {
        let at = from + rel;
        from = at + needle.len();
        // must be a whole attribute name
        let boundary = lc[..at].chars().last().map_or(true, |c| c.is_whitespace());
        if !boundary {
            continue;
        }
        let rest = &tag[from..];
        let value = match rest.chars().next()? {
            q @ ('"' | '\'') => {
                let end = rest[1..].find(q)?;
                &rest[1..1 + end]
            }
            _ => {
                let end = rest
                    .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
                    .unwrap_or(rest.len());
                &rest[..end]
            }
        };
        return Some(super::sanitize::normalize_entities(value));
    }
    None
}

pub fn inner_after_open_tag(block: &str) -> String {
    if let Some(oe) = block.find('>') {
        if let Some(cs) = block.rfind('<') {
            if cs > oe {
                return block[oe + 1..cs].to_string();
            }
        }
    }
    s!()
}
pub fn strip_tags<S: AsRef<str>>(s: S) -> String {
    let s = s.as_ref();

    let mut out = String::with_capacity(s.len());
    let mut in_tag = false;

    for ch in s.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    super::sanitize::normalize_ws(&out)
}

/// Opening `<img ...>` tags inside a fragment.
pub fn img_tags(s: &str) -> Vec<&str> {
    let lc = to_lower(s);
    let mut out = Vec::new();
    let mut pos = 0usize;
    while let Some(rel) = lc[pos..].find("<img") {
        let start = pos + rel;
        let Some(end_rel) = s[start..].find('>') else { break };
        let end = start + end_rel + 1;
        out.push(&s[start..end]);
        pos = end;
    }
    out
}
