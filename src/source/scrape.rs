// src/source/scrape.rs
// Wiki page scraping: locate the category's tables, read header + data rows.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value as Json};
use url::Url;

use super::{RawPayload, SourceKind};
use crate::category::DomainCategory;
use crate::core::html::{
    attr_value, blocks_with_class_ci, img_tags, inner_after_open_tag, next_cell_block_ci,
    next_tag_block_ci, strip_tags,
};
use crate::core::net::{CancelToken, Pacer, Transport};
use crate::core::sanitize::field_name;
use crate::error::SourceError;
use crate::specs::pages::{self, PageSpec};

pub struct ScrapeAdapter {
    endpoint: String,
    transport: Arc<dyn Transport>,
    pacer: Pacer,
}

impl ScrapeAdapter {
    pub fn new(endpoint: &str, transport: Arc<dyn Transport>, pacer: Pacer) -> Self {
        Self { endpoint: s!(endpoint), transport, pacer }
    }

    pub fn fetch(
        &self,
        category: DomainCategory,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> Result<RawPayload, SourceError> {
        let Some(spec) = pages::for_category(category) else {
            return Err(SourceError::rejected(
                &self.endpoint,
                format!("no page layout known for {category}"),
            ));
        };

        let mut rows: Vec<Json> = Vec::new();
        let mut tables_seen = 0usize;
        let mut tables_read = 0usize;
        let mut fetched = 0usize;
        let mut rejected: Option<SourceError> = None;
        let mut unreadable: Option<(String, String)> = None;
        let mut last_url = s!();

        for page in spec.pages {
            let url = join!(&self.endpoint, page);
            last_url = url.clone();

            if cancel.is_cancelled() {
                return Err(SourceError::Cancelled { url });
            }
            self.pacer.wait();
            let doc = match self.transport.get(&url, timeout) {
                Ok(bytes) => {
                    fetched += 1;
                    String::from_utf8_lossy(&bytes).into_owned()
                }
                Err(err @ SourceError::SourceRejected { .. }) => {
                    logw!("{category}: skipping {url}: {err}");
                    rejected = Some(err);
                    continue;
                }
                Err(err) => return Err(err),
            };

            let tables = blocks_with_class_ci(&doc, "table", spec.table_class);
            tables_seen += tables.len();
            for table in tables {
                match read_table(table, &spec, category, &url) {
                    Ok(read) => {
                        tables_read += 1;
                        rows.extend(read.into_iter().map(Json::Object));
                    }
                    Err(detail) => {
                        logd!("{category}: ignoring a table on {url}: {detail}");
                        unreadable = Some((url.clone(), detail));
                    }
                }
            }
        }

        if fetched == 0
            && let Some(err) = rejected
        {
            return Err(err);
        }
        if tables_seen == 0 {
            return Err(SourceError::StructureChanged {
                url: last_url,
                detail: format!("no table with class '{}'", spec.table_class),
            });
        }
        if tables_read == 0
            && let Some((url, detail)) = unreadable
        {
            return Err(SourceError::StructureChanged { url, detail });
        }
        if rows.is_empty() {
            return Err(SourceError::SourceEmpty { category });
        }
        logf!("{category}: {} rows scraped from {} tables", rows.len(), tables_read);
        Ok(RawPayload::new(SourceKind::Scrape, rows))
    }
}

/// Rows of one table as field maps. The header row is the first row made of
/// `<th>` cells; rows before it are skipped.
///
/// A table with no header row, or whose headers never map to the category's
/// identity fields, is not one of ours: `Err` carries what was missing.
pub fn read_table(
    table: &str,
    spec: &PageSpec,
    category: DomainCategory,
    page_url: &str,
) -> Result<Vec<Map<String, Json>>, String> {
    let base = Url::parse(page_url).ok();
    let mut headers: Option<Vec<String>> = None;
    let mut out = Vec::new();

    // skip the opening <table ...> so the first <tr> search starts inside it
    let inner = inner_after_open_tag(table);
    let mut pos = 0usize;
    while let Some((tr_s, tr_e)) = next_tag_block_ci(&inner, "<tr", "</tr>", pos) {
        let tr = &inner[tr_s..tr_e];
        pos = tr_e;

        let cells = row_cells(tr);
        if cells.is_empty() {
            continue;
        }

        if headers.is_none() {
            if cells.iter().all(|(_, is_th)| *is_th) {
                let hdr: Vec<String> = cells.iter().map(|(block, _)| header_field(block, spec)).collect();
                if let Some(id) = category.identity_fields().iter().find(|id| !hdr.iter().any(|h| h == *id)) {
                    return Err(format!("no column maps to identity field '{id}'"));
                }
                headers = Some(hdr);
            }
            continue;
        }
        let hdr = headers.as_deref().unwrap_or_default();

        if cells.len() < spec.min_cells {
            continue;
        }

        let mut row = Map::new();
        let mut icons = Vec::new();
        for ((block, _), field) in cells.iter().zip(hdr) {
            let inner = inner_after_open_tag(block);
            icons.extend(cell_icons(&inner, base.as_ref()));
            let text = strip_tags(&inner);
            if text.is_empty() || field.is_empty() || row.contains_key(field) {
                continue;
            }
            row.insert(field.clone(), Json::String(text));
        }
        if !icons.is_empty() {
            row.insert(s!("icons"), Json::Array(icons));
        }
        if !row.is_empty() {
            out.push(row);
        }
    }
    if headers.is_none() {
        return Err(s!("no header row"));
    }
    Ok(out)
}

fn header_field(cell: &str, spec: &PageSpec) -> String {
    spec.field_for(&field_name(&strip_tags(inner_after_open_tag(cell))))
}

fn row_cells(tr: &str) -> Vec<(&str, bool)> {
    let mut cells = Vec::new();
    let mut pos = 0usize;
    while let Some((s, e, is_th)) = next_cell_block_ci(tr, pos) {
        cells.push((&tr[s..e], is_th));
        pos = e;
    }
    cells
}

fn cell_icons(cell: &str, base: Option<&Url>) -> Vec<Json> {
    let mut out = Vec::new();
    for tag in img_tags(cell) {
        let Some(src) = attr_value(tag, "src") else { continue };
        let absolute = match base {
            Some(b) => match b.join(&src) {
                Ok(u) => u.to_string(),
                Err(_) => continue,
            },
            None => src,
        };
        let mut icon = Map::new();
        icon.insert(s!("src"), Json::String(absolute));
        if let Some(alt) = attr_value(tag, "alt").filter(|a| !a.trim().is_empty()) {
            icon.insert(s!("alt"), Json::String(alt));
        }
        out.push(Json::Object(icon));
    }
    out
}
