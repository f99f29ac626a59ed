//! Relation discovery session: the Idle/Running state machine that prunes the
//! view to two endpoints, drives a search engine and relays its lifecycle.
//!
//! All public operations are meant to be called from one control loop (see
//! [`controller`]). Engine output arrives through [`RelationDiscoverySession::next_signal`]
//! and is applied with [`RelationDiscoverySession::handle_signal`].

pub mod controller;
mod events;
mod gate;
mod selection;

pub use controller::{run_session, SessionCommand};
pub use events::{EventBus, SessionEvent, StopReason};
pub use gate::{AutoGate, Confirmation, ConfirmationGate};
pub use selection::{pickup, NodeSelection, NodeSelector};

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::graph::{GraphView, NodeId};
use crate::search::{SearchEngine, SearchEvent, SearchId, SearchRequest, SearchSignal, SignalReceiver, SignalSender};

/// Per-query settings. Defaults: 500 ms refresh, depth 6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub refresh_interval_ms: u64,
    pub max_depth: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: 500,
            max_depth: 6,
        }
    }
}

impl SessionConfig {
    pub fn with_max_depth(self, max_depth: usize) -> Self {
        Self { max_depth, ..self }
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    fn validate(&self) -> Result<(), SessionError> {
        if self.refresh_interval_ms == 0 || self.max_depth == 0 {
            return Err(SessionError::InvalidConfig(*self));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Idle,
    Running,
}

/// Why `request_start` did not leave the session running.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("two distinct nodes are required, {selected} selected")]
    InsufficientSelection { selected: usize },

    #[error("clearing existing results was declined")]
    DeclinedConfirmation,

    #[error("a relation search is already running")]
    AlreadyRunning,

    #[error("search engine failure: {0}")]
    SearchEngineFailure(String),

    #[error("invalid session config: {0:?}")]
    InvalidConfig(SessionConfig),
}

/// The search currently owned by a running session.
#[derive(Debug, Clone)]
struct ActiveSearch {
    id: SearchId,
    from: NodeId,
    to: NodeId,
}

#[derive(Debug, Clone)]
enum State {
    Idle,
    Running(ActiveSearch),
}

pub struct RelationDiscoverySession<V: GraphView> {
    view: V,
    selector: Arc<dyn NodeSelector>,
    gate: Arc<dyn ConfirmationGate>,
    engine: Arc<dyn SearchEngine>,
    events: EventBus,
    state: State,
    signals_tx: SignalSender,
    signals_rx: SignalReceiver,
}

impl<V: GraphView> RelationDiscoverySession<V> {
    pub fn new(
        view: V,
        selector: Arc<dyn NodeSelector>,
        gate: Arc<dyn ConfirmationGate>,
        engine: Arc<dyn SearchEngine>,
    ) -> Self {
        let (signals_tx, signals_rx) = mpsc::unbounded_channel();
        Self {
            view,
            selector,
            gate,
            engine,
            events: EventBus::new(),
            state: State::Idle,
            signals_tx,
            signals_rx,
        }
    }

    pub fn state(&self) -> SessionState {
        match self.state {
            State::Idle => SessionState::Idle,
            State::Running(_) => SessionState::Running,
        }
    }

    /// Id of the running search, if any.
    pub fn active_search(&self) -> Option<SearchId> {
        match &self.state {
            State::Running(active) => Some(active.id),
            State::Idle => None,
        }
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn into_view(self) -> V {
        self.view
    }

    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Start a relation search between the two selected nodes.
    ///
    /// Precondition failures leave view and state untouched. When the engine
    /// cannot be started the view has already been pruned; the session stays
    /// idle and listeners get a failed `stopped` instead of `started`.
    pub fn request_start(&mut self, config: SessionConfig) -> Result<SearchId, SessionError> {
        if let State::Running(active) = &self.state {
            log::info!("search {} already running, start ignored", active.id);
            return Err(SessionError::AlreadyRunning);
        }
        let selection = self.selector.current_selection();
        let (from, to) = match selection.as_slice() {
            [a, b] if a != b => (a.clone(), b.clone()),
            _ => {
                log::info!("start refused: {} nodes selected", selection.len());
                self.gate.notify_insufficient_selection(selection.len());
                return Err(SessionError::InsufficientSelection {
                    selected: selection.len(),
                });
            }
        };
        config.validate()?;

        if self.view.has_any_edges() {
            match self.gate.confirm_clear_existing_results() {
                Confirmation::Confirmed => {}
                Confirmation::Declined => {
                    log::info!("start aborted: clearing results declined");
                    return Err(SessionError::DeclinedConfirmation);
                }
            }
        }

        self.view.prune_nodes_except(&[from.clone(), to.clone()]);

        let request = SearchRequest {
            from: from.clone(),
            to: to.clone(),
            max_depth: config.max_depth,
            refresh_interval: config.refresh_interval(),
        };
        match self.engine.start(request, self.signals_tx.clone()) {
            Ok(id) => {
                log::info!("relation search {} started: {} <-> {}", id, from, to);
                self.state = State::Running(ActiveSearch {
                    id,
                    from: from.clone(),
                    to: to.clone(),
                });
                self.events.emit(SessionEvent::started(from, to, config));
                Ok(id)
            }
            Err(e) => {
                log::error!("search engine could not start: {}", e);
                let message = e.to_string();
                self.events.emit(SessionEvent::stopped(StopReason::Failed {
                    message: message.clone(),
                }));
                Err(SessionError::SearchEngineFailure(message))
            }
        }
    }

    /// Cancel the running search. Returns false, with no event, when idle.
    pub fn stop(&mut self) -> bool {
        let State::Running(active) = std::mem::replace(&mut self.state, State::Idle) else {
            return false;
        };
        log::info!(
            "relation search {} stopped: {} <-> {}",
            active.id,
            active.from,
            active.to
        );
        self.engine.cancel(active.id);
        self.events.emit(SessionEvent::stopped(StopReason::Cancelled));
        true
    }

    /// Stop any search and empty both the view and the selection, as when a
    /// new graph source is connected.
    pub fn reset(&mut self) {
        self.stop();
        self.view.clear();
        self.selector.select(Vec::new());
    }

    /// Next signal from any engine run this session started.
    pub async fn next_signal(&mut self) -> Option<SearchSignal> {
        self.signals_rx.recv().await
    }

    /// Apply one engine signal. Signals that do not belong to the running
    /// search, such as a late batch after `stop()`, are dropped. Returns
    /// whether the signal was applied.
    pub fn handle_signal(&mut self, signal: SearchSignal) -> bool {
        let is_active = matches!(&self.state, State::Running(active) if active.id == signal.search);
        if !is_active {
            log::debug!("dropping signal from inactive search {}", signal.search);
            return false;
        }

        match signal.event {
            SearchEvent::Batch(batch) => {
                self.view.apply_batch(&batch);
            }
            SearchEvent::Finished(terminal) => {
                let reason = StopReason::from(terminal);
                log::info!("relation search {} finished: {:?}", signal.search, reason);
                self.state = State::Idle;
                self.events.emit(SessionEvent::stopped(reason));
            }
        }
        true
    }
}
