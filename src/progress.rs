// src/progress.rs
use std::sync::mpsc::Sender;

use crate::category::DomainCategory;
use crate::router::LoadResult;

/// Lightweight progress reporting for a refresh.
/// Frontends implement this to surface status; every method has a no-op default.
///
/// All calls happen on the thread that coordinates the refresh, one at a time.
pub trait Progress {
    /// Called at the start with the number of categories.
    fn begin(&mut self, _total: usize) {}

    /// Free-form status line for human eyes.
    fn log(&mut self, _msg: &str) {}

    /// `fraction` in `0.0..=1.0` for one category. Categories interleave.
    fn category_progress(&mut self, _category: DomainCategory, _fraction: f32) {}

    fn category_done(&mut self, _result: &LoadResult) {}

    /// Called once at the end, cancelled or not, with one result per category.
    fn finish(&mut self, _results: &[LoadResult]) {}
}

/// A no-op progress sink.
pub struct NullProgress;
impl Progress for NullProgress {}

/// What a spawned refresh publishes to its subscriber.
#[derive(Clone, Debug, PartialEq)]
pub enum LoadEvent {
    Started { total: usize },
    Log(String),
    Progress { category: DomainCategory, fraction: f32 },
    CategoryDone(LoadResult),
    Finished(Vec<LoadResult>),
}

/// Channel sink. A dropped receiver is ignored; the refresh still completes
/// and writes its cache.
impl Progress for Sender<LoadEvent> {
    fn begin(&mut self, total: usize) {
        let _ = self.send(LoadEvent::Started { total });
    }

    fn log(&mut self, msg: &str) {
        let _ = self.send(LoadEvent::Log(s!(msg)));
    }

    fn category_progress(&mut self, category: DomainCategory, fraction: f32) {
        let _ = self.send(LoadEvent::Progress { category, fraction });
    }

    fn category_done(&mut self, result: &LoadResult) {
        let _ = self.send(LoadEvent::CategoryDone(result.clone()));
    }

    fn finish(&mut self, results: &[LoadResult]) {
        let _ = self.send(LoadEvent::Finished(results.to_vec()));
    }
}
