// tests/common/mod.rs
#![allow(dead_code)]

use std::path::Path;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};
use std::thread;
use std::time::Duration;

use serde_json::{Value as Json, json};

use sets_data::core::net::is_transient_status;
use sets_data::{LoadOptions, RetryPolicy, SourceError, Transport};

pub const WIKI: &str = "https://wiki.test";

#[derive(Clone, Debug)]
pub enum Reply {
    Json(String),
    Html(String),
    Bytes(Vec<u8>),
    Status(u16),
    Unavailable,
}

/// Canned transport. The first route whose needle occurs in the URL answers;
/// unrouted URLs get a 404.
#[derive(Default)]
pub struct FakeTransport {
    routes: Mutex<Vec<(String, Reply)>>,
    calls: Mutex<Vec<String>>,
    delay: Mutex<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn route(&self, needle: &str, reply: Reply) -> &Self {
        self.routes.lock().unwrap().push((needle.to_string(), reply));
        self
    }

    pub fn set_delay(&self, d: Duration) {
        *self.delay.lock().unwrap() = d;
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, needle: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|u| u.contains(needle)).count()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl Transport for FakeTransport {
    fn get(&self, url: &str, _timeout: Duration) -> Result<Vec<u8>, SourceError> {
        self.calls.lock().unwrap().push(url.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        let reply = self
            .routes
            .lock()
            .unwrap()
            .iter()
            .find(|(needle, _)| url.contains(needle.as_str()))
            .map(|(_, r)| r.clone());
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match reply {
            Some(Reply::Json(s)) | Some(Reply::Html(s)) => Ok(s.into_bytes()),
            Some(Reply::Bytes(b)) => Ok(b),
            Some(Reply::Status(code)) if is_transient_status(code) => {
                Err(SourceError::unavailable(url, format!("HTTP {code}")))
            }
            Some(Reply::Status(code)) => Err(SourceError::rejected(url, format!("HTTP {code}"))),
            Some(Reply::Unavailable) => Err(SourceError::unavailable(url, "connection reset")),
            None => Err(SourceError::rejected(url, "HTTP 404")),
        }
    }
}

/// Fast, quiet options rooted at `dir`: no retries, no pacing, no assets.
pub fn options(dir: &Path) -> LoadOptions {
    let mut opts = LoadOptions::default().with_cache_dir(dir).with_wiki_base(WIKI);
    opts.retry = RetryPolicy::NONE;
    opts.asset_retry = RetryPolicy::NONE;
    opts.request_spacing = Duration::ZERO;
    opts.asset_spacing = Duration::ZERO;
    opts.fetch_assets = false;
    opts
}

pub fn cargo_endpoint() -> String {
    format!("{WIKI}/wiki/Special:CargoExport")
}

pub fn json_body(rows: Json) -> Reply {
    Reply::Json(rows.to_string())
}

pub fn ships(names: &[&str]) -> Reply {
    json_body(Json::Array(
        names
            .iter()
            .map(|n| json!({"Page": n, "name": n, "image": format!("{n}.png"), "tier": "6", "hull": "40,000"}))
            .collect(),
    ))
}

pub fn named(names: &[&str]) -> Reply {
    json_body(Json::Array(names.iter().map(|n| json!({"Page": n, "name": n})).collect()))
}

pub fn traits(names: &[&str]) -> Reply {
    json_body(Json::Array(
        names.iter().map(|n| json!({"name": n, "environment": "space", "isunique": "0"})).collect(),
    ))
}

pub fn modifiers(names: &[&str]) -> Reply {
    json_body(Json::Array(
        names.iter().map(|n| json!({"type": "Phaser", "modifier": n, "isepic": "1"})).collect(),
    ))
}

pub fn doffs(names: &[&str]) -> Reply {
    json_body(Json::Array(names.iter().map(|n| json!({"spec": n, "department": "Tactical"})).collect()))
}

/// One export page filled to `CARGO_PAGE_LIMIT`, so the adapter keeps paging.
pub fn full_ship_page() -> Reply {
    let names: Vec<String> = (0..sets_data::config::consts::CARGO_PAGE_LIMIT).map(|i| format!("Ship {i}")).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    ships(&refs)
}
