// src/core/sanitize.rs

pub fn normalize_entities(s: &str) -> String {
    if !s.contains('&') {
        return s!(s);
    }
    s.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#039;", "'")
        .replace("&amp;", "&")
}
pub fn normalize_ws(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_space = false;
    for ch in s.chars() {
        if ch.is_whitespace() {
            if !prev_space { out.push(' '); prev_space = true; }
        } else { out.push(ch); prev_space = false; }
    }
    out.trim().to_string()
}

/// Header text → field name: lowercase, runs of non-alphanumerics become `_`.
pub fn field_name(header: &str) -> String {
    let mut out = String::with_capacity(header.len());
    let mut last_us = false;
    for ch in header.chars() {
        if ch.is_alphanumeric() {
            out.extend(ch.to_lowercase());
            last_us = false;
        } else if !last_us && !out.is_empty() {
            out.push('_');
            last_us = true;
        }
    }
    out.trim_end_matches('_').to_string()
}

/// Form-urlencode a name so it can be used as a flat file name.
pub fn encode_filename(name: &str) -> String {
    url::form_urlencoded::byte_serialize(name.as_bytes()).collect()
}

/// Wiki titles use `_` for spaces.
pub fn wiki_title(name: &str) -> String {
    normalize_ws(name).replace(' ', "_")
}

/// Wiki file name an image URL serves, in title form. Thumbnail paths
/// (`/images/thumb/a/ab/X.png/20px-X.png`) resolve to the original file.
pub fn wiki_file_from_src(src: &str) -> Option<String> {
    let path = src.split(['?', '#']).next().unwrap_or(src);
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let last = *segments.last()?;
    let raw = match segments.iter().position(|s| *s == "thumb") {
        Some(i) if segments.len() > i + 2 => segments[segments.len() - 2],
        _ => last,
    };
    let decoded = urlencoding::decode(raw).map_or_else(|_| s!(raw), |d| d.into_owned());
    let title = wiki_title(&decoded);
    (!title.is_empty()).then_some(title)
}

/// Local asset file name for a wiki file: the same file always lands under the
/// same name, whichever record or source asked for it.
pub fn asset_filename(wiki_file: &str) -> String {
    encode_filename(&wiki_title(wiki_file))
}

/// Parse numbers the way the wiki writes them: `42,000`, ` 1.5 `, `-0.2`.
pub fn parse_number(s: &str) -> Option<f64> {
    let t = s.trim();
    if t.is_empty() {
        return None;
    }
    let cleaned: String = t.chars().filter(|&c| c != ',').collect();
    let n: f64 = cleaned.parse().ok()?;
    n.is_finite().then_some(n)
}

pub fn parse_flag(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "yes" | "true" | "y" => Some(true),
        "0" | "no" | "false" | "n" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entities_decode_amp_last() {
        assert_eq!(normalize_entities("[Acc]&amp;gt;"), "[Acc]&gt;");
        assert_eq!(normalize_entities("A &gt; B&nbsp;C"), "A > B C");
    }

    #[test]
    fn field_names_from_headers() {
        assert_eq!(field_name("Ship Name"), "ship_name");
        assert_eq!(field_name("  Turn Rate (°/s) "), "turn_rate_s");
        assert_eq!(field_name("T5-U Console"), "t5_u_console");
    }

    #[test]
    fn filenames_are_flat() {
        assert_eq!(encode_filename("Console - Tac/Eng"), "Console+-+Tac%2FEng");
        assert!(!encode_filename("../../etc/passwd").contains('/'));
    }

    #[test]
    fn image_sources_resolve_to_wiki_files() {
        assert_eq!(wiki_file_from_src("https://stowiki.net/images/a/ab/Fed_icon.png?v=2").as_deref(), Some("Fed_icon.png"));
        assert_eq!(
            wiki_file_from_src("https://stowiki.net/images/thumb/a/ab/Fed_icon.png/20px-Fed_icon.png").as_deref(),
            Some("Fed_icon.png")
        );
        assert_eq!(
            wiki_file_from_src("/images/4/4e/Defiant_%28Escort%29.png").as_deref(),
            Some("Defiant_(Escort).png")
        );
        assert_eq!(wiki_file_from_src("https://stowiki.net/"), None);
    }

    #[test]
    fn asset_names_ignore_space_spelling() {
        assert_eq!(asset_filename("Defiant (Escort).png"), "Defiant_%28Escort%29.png");
        assert_eq!(asset_filename("Defiant_(Escort).png"), "Defiant_%28Escort%29.png");
    }

    #[test]
    fn numbers_and_flags() {
        assert_eq!(parse_number("42,000"), Some(42000.0));
        assert_eq!(parse_number(" -0.5 "), Some(-0.5));
        assert_eq!(parse_number("n/a"), None);
        assert_eq!(parse_number("inf"), None);
        assert_eq!(parse_flag("1"), Some(true));
        assert_eq!(parse_flag("No"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
