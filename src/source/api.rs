// src/source/api.rs
// Cargo export client. Read-only: builds GET URLs, pages with limit/offset.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value as Json;
use url::Url;

use super::{RawPayload, SourceKind};
use crate::category::DomainCategory;
use crate::config::consts::CARGO_MAX_PAGES;
use crate::core::net::{CancelToken, Pacer, Transport};
use crate::error::SourceError;
use crate::specs::cargo::{self, CargoSpec};

pub struct ApiAdapter {
    endpoint: String,
    transport: Arc<dyn Transport>,
    pacer: Pacer,
}

impl ApiAdapter {
    pub fn new(endpoint: &str, transport: Arc<dyn Transport>, pacer: Pacer) -> Self {
        Self { endpoint: s!(endpoint), transport, pacer }
    }

    pub fn fetch(
        &self,
        category: DomainCategory,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> Result<RawPayload, SourceError> {
        let spec = cargo::for_category(category);
        let mut rows: Vec<Json> = Vec::new();
        let mut exhausted = false;

        for page in 0..CARGO_MAX_PAGES {
            let offset = page * spec.page_limit;
            let url = query_url(&self.endpoint, &spec, offset)?;

            if cancel.is_cancelled() {
                return Err(SourceError::Cancelled { url });
            }
            self.pacer.wait();
            let body = self.transport.get(&url, timeout)?;
            let batch = parse_rows(&url, &body)?;
            let n = batch.len();
            rows.extend(batch);

            logd!("{category}: cargo page {page} → {n} rows");
            if n < spec.page_limit {
                exhausted = true;
                break;
            }
        }

        // a full last page means the table goes on past what we are allowed to read
        if !exhausted {
            return Err(SourceError::rejected(
                &self.endpoint,
                format!(
                    "{} still had rows after {CARGO_MAX_PAGES} pages of {}; refusing a truncated table",
                    spec.table, spec.page_limit
                ),
            ));
        }

        if rows.is_empty() {
            return Err(SourceError::SourceEmpty { category });
        }
        logf!("{category}: {} rows from Cargo table {}", rows.len(), spec.table);
        Ok(RawPayload::new(SourceKind::Api, rows))
    }
}

pub fn query_url(endpoint: &str, spec: &CargoSpec, offset: usize) -> Result<String, SourceError> {
    let mut url = Url::parse(endpoint)
        .map_err(|e| SourceError::rejected(endpoint, format!("invalid endpoint: {e}")))?;
    {
        let mut q = url.query_pairs_mut();
        q.append_pair("tables", spec.table);
        q.append_pair("fields", &spec.fields_param());
        if let Some(w) = spec.where_clause {
            q.append_pair("where", w);
        }
        q.append_pair("limit", &spec.page_limit.to_string());
        q.append_pair("offset", &offset.to_string());
        q.append_pair("format", "json");
    }
    Ok(url.into())
}

/// The export answers with a JSON array of objects. Anything else (HTML
/// challenge pages come back as 200) means we were not served.
fn parse_rows(url: &str, body: &[u8]) -> Result<Vec<Json>, SourceError> {
    let json: Json = serde_json::from_slice(body)
        .map_err(|e| SourceError::rejected(url, format!("response is not JSON: {e}")))?;
    match json {
        Json::Array(rows) => Ok(rows),
        other => Err(SourceError::rejected(
            url,
            format!("expected a JSON array, got {}", json_kind(&other)),
        )),
    }
}

fn json_kind(v: &Json) -> &'static str {
    match v {
        Json::Null => "null",
        Json::Bool(_) => "a boolean",
        Json::Number(_) => "a number",
        Json::String(_) => "a string",
        Json::Array(_) => "an array",
        Json::Object(_) => "an object",
    }
}
