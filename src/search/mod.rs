//! Search engine contract and the SQLite-backed path search.
//!
//! An engine runs on its own tasks and reports back over an mpsc channel.
//! Every `start` yields zero or more [`SearchEvent::Batch`] followed by exactly
//! one [`SearchEvent::Finished`], all tagged with the [`SearchId`] it returned.

mod paths;

pub use paths::PathSearchEngine;

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::Result;
use crate::graph::{NodeId, ResultBatch};

/// Handle for one engine run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SearchId(Uuid);

impl SearchId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SearchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SearchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub from: NodeId,
    pub to: NodeId,
    /// Maximum number of hops in a reported path.
    pub max_depth: usize,
    /// Cadence of incremental batches.
    pub refresh_interval: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "message", rename_all = "snake_case")]
pub enum Terminal {
    Completed,
    Cancelled,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchEvent {
    Batch(ResultBatch),
    Finished(Terminal),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchSignal {
    pub search: SearchId,
    pub event: SearchEvent,
}

pub type SignalSender = mpsc::UnboundedSender<SearchSignal>;
pub type SignalReceiver = mpsc::UnboundedReceiver<SearchSignal>;

/// Bounded-depth relation search between two endpoints.
pub trait SearchEngine: Send + Sync {
    /// Begin a search. `Ok` means the engine is running and will report on `signals`;
    /// an `Err` means it could not be reached or initialised and nothing will be reported.
    fn start(&self, request: SearchRequest, signals: SignalSender) -> Result<SearchId>;

    /// Best effort: at most one more batch may still arrive for `search`.
    fn cancel(&self, search: SearchId);
}
