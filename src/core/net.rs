// src/core/net.rs
// Read-only HTTP. The transport only knows GET; nothing in the crate can issue a
// mutating request.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};
use std::thread;
use std::time::{Duration, Instant};

use crate::config::consts::{MAX_BODY_BYTES, USER_AGENT};
use crate::error::SourceError;

/// Fetches raw bytes for a URL.
///
/// Implementations must enforce `timeout` and map failures onto
/// `SourceUnavailable` (transient) or `SourceRejected` (the source said no).
pub trait Transport: Send + Sync {
    fn get(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, SourceError>;
}

/// `ureq`-backed transport with a fixed client signature.
pub struct HttpTransport {
    agent: ureq::Agent,
    user_agent: String,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::with_user_agent(USER_AGENT)
    }

    pub fn with_user_agent(user_agent: &str) -> Self {
        Self { agent: ureq::Agent::new_with_defaults(), user_agent: s!(user_agent) }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, SourceError> {
        logd!("GET {url}");
        let response = self
            .agent
            .get(url)
            .header("User-Agent", self.user_agent.as_str())
            .config()
            .timeout_global(Some(timeout))
            .build()
            .call()
            .map_err(|err| classify(url, err))?;

        let mut body = response.into_body();
        body.with_config()
            .limit(MAX_BODY_BYTES)
            .read_to_vec()
            .map_err(|err| SourceError::unavailable(url, format!("reading body: {err}")))
    }
}

fn classify(url: &str, err: ureq::Error) -> SourceError {
    match err {
        ureq::Error::StatusCode(code) if is_transient_status(code) => {
            SourceError::unavailable(url, format!("HTTP {code}"))
        }
        ureq::Error::StatusCode(code) => SourceError::rejected(url, format!("HTTP {code}")),
        ureq::Error::BadUri(reason) => SourceError::rejected(url, format!("bad uri: {reason}")),
        other => SourceError::unavailable(url, other),
    }
}

/// Statuses worth retrying; everything else non-2xx is a rejection.
pub fn is_transient_status(code: u16) -> bool {
    matches!(code, 408 | 429 | 502 | 503 | 504)
}

/// Minimum spacing between requests that share this pacer.
///
/// The lock is held across the sleep, so concurrent callers queue up and leave
/// at most one request per `spacing`.
pub struct Pacer {
    spacing: Duration,
    last: Mutex<Option<Instant>>,
}

impl Pacer {
    pub fn new(spacing: Duration) -> Self {
        Self { spacing, last: Mutex::new(None) }
    }

    pub fn wait(&self) {
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(prev) = *last {
            let since = prev.elapsed();
            if since < self.spacing {
                thread::sleep(self.spacing - since);
            }
        }
        *last = Some(Instant::now());
    }
}

/// Cooperative cancellation flag shared between a refresh and its owner.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pacer_spaces_requests() {
        let pacer = Pacer::new(Duration::from_millis(30));
        let started = Instant::now();
        pacer.wait();
        pacer.wait();
        pacer.wait();
        assert!(started.elapsed() >= Duration::from_millis(60));
    }

    #[test]
    fn transient_statuses() {
        assert!(is_transient_status(503));
        assert!(is_transient_status(429));
        assert!(!is_transient_status(404));
        assert!(!is_transient_status(403));
    }

    #[test]
    fn cancel_token_is_shared() {
        let a = CancelToken::new();
        let b = a.clone();
        assert!(!b.is_cancelled());
        a.cancel();
        assert!(b.is_cancelled());
    }
}
