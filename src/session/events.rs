//! Session lifecycle events and their fan-out to listeners.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;

use super::SessionConfig;
use crate::graph::NodeId;
use crate::search::Terminal;

/// Why a running session went back to idle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StopReason {
    /// `stop()` was called.
    Cancelled,
    /// The engine exhausted the search space.
    Completed,
    /// The engine could not start or broke down mid-search.
    Failed { message: String },
}

impl StopReason {
    pub fn is_failure(&self) -> bool {
        matches!(self, StopReason::Failed { .. })
    }
}

impl From<Terminal> for StopReason {
    fn from(terminal: Terminal) -> Self {
        match terminal {
            Terminal::Completed => StopReason::Completed,
            Terminal::Cancelled => StopReason::Cancelled,
            Terminal::Failed(message) => StopReason::Failed { message },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event")]
pub enum SessionEvent {
    #[serde(rename = "RELFINDER_STARTED")]
    Started {
        from: NodeId,
        to: NodeId,
        config: SessionConfig,
        at: DateTime<Utc>,
    },
    #[serde(rename = "RELFINDER_STOPPED")]
    Stopped {
        reason: StopReason,
        at: DateTime<Utc>,
    },
}

impl SessionEvent {
    pub fn started(from: NodeId, to: NodeId, config: SessionConfig) -> Self {
        SessionEvent::Started {
            from,
            to,
            config,
            at: Utc::now(),
        }
    }

    pub fn stopped(reason: StopReason) -> Self {
        SessionEvent::Stopped {
            reason,
            at: Utc::now(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::Started { .. } => "RELFINDER_STARTED",
            SessionEvent::Stopped { .. } => "RELFINDER_STOPPED",
        }
    }
}

/// Delivers every event to every live subscriber, in emission order.
/// Subscribers whose receiver was dropped are forgotten on the next emit.
#[derive(Debug, Default)]
pub struct EventBus {
    listeners: Vec<mpsc::UnboundedSender<SessionEvent>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<SessionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners.push(tx);
        rx
    }

    pub fn emit(&mut self, event: SessionEvent) {
        log::debug!("emit {}", event.name());
        self.listeners.retain(|l| l.send(event.clone()).is_ok());
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_subscriber_sees_events_in_order() {
        let mut bus = EventBus::new();
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        bus.emit(SessionEvent::started("a".into(), "b".into(), SessionConfig::default()));
        bus.emit(SessionEvent::stopped(StopReason::Completed));

        for rx in [&mut first, &mut second] {
            assert_eq!(rx.try_recv().unwrap().name(), "RELFINDER_STARTED");
            assert_eq!(rx.try_recv().unwrap().name(), "RELFINDER_STOPPED");
            assert!(rx.try_recv().is_err());
        }
    }

    #[test]
    fn test_dropped_subscriber_is_forgotten() {
        let mut bus = EventBus::new();
        let kept = bus.subscribe();
        drop(bus.subscribe());

        bus.emit(SessionEvent::stopped(StopReason::Cancelled));
        assert_eq!(bus.listener_count(), 1);
        drop(kept);
    }

    #[test]
    fn test_stopped_serializes_with_reason() {
        let event = SessionEvent::stopped(StopReason::Failed {
            message: "store offline".to_string(),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "RELFINDER_STOPPED");
        assert_eq!(json["reason"]["kind"], "failed");
        assert_eq!(json["reason"]["message"], "store offline");
    }

    #[test]
    fn test_stop_reason_from_terminal() {
        assert_eq!(StopReason::from(Terminal::Completed), StopReason::Completed);
        assert!(StopReason::from(Terminal::Failed("x".to_string())).is_failure());
    }
}
