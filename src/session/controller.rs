//! Control loop: inbound UI commands and engine signals, handled one at a time.

use tokio::sync::mpsc;

use super::{RelationDiscoverySession, SessionConfig, SessionError};
use crate::graph::GraphView;

/// Inbound requests from the UI side.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    /// `RELFINDER_START`; `None` keeps the configured depth.
    Start { max_depth: Option<usize> },
    /// `RELFINDER_STOP`
    Stop,
    /// A new graph source was connected.
    GraphConnected,
}

/// Apply one command. Start failures are reported here and never escalate.
pub fn apply_command<V: GraphView>(
    session: &mut RelationDiscoverySession<V>,
    command: SessionCommand,
    defaults: SessionConfig,
) -> Result<(), SessionError> {
    match command {
        SessionCommand::Start { max_depth } => {
            let config = match max_depth {
                Some(depth) => defaults.with_max_depth(depth),
                None => defaults,
            };
            session.request_start(config).map(|_| ())
        }
        SessionCommand::Stop => {
            session.stop();
            Ok(())
        }
        SessionCommand::GraphConnected => {
            session.reset();
            Ok(())
        }
    }
}

/// Drive `session` until the command channel closes, then stop any running
/// search and hand the session back.
pub async fn run_session<V: GraphView>(
    mut session: RelationDiscoverySession<V>,
    defaults: SessionConfig,
    mut commands: mpsc::UnboundedReceiver<SessionCommand>,
) -> RelationDiscoverySession<V> {
    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(command) => {
                    log::debug!("command {:?}", command);
                    if let Err(e) = apply_command(&mut session, command, defaults) {
                        log::warn!("command not applied: {}", e);
                    }
                }
                None => break,
            },
            Some(signal) = session.next_signal() => {
                session.handle_signal(signal);
            }
        }
    }

    session.stop();
    session
}
