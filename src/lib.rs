pub mod config;
pub mod error;
pub mod db;
pub mod graph;
pub mod search;
pub mod session;

pub use config::Config;
pub use error::{RelfinderError, Result};
pub use graph::{GraphView, InMemoryView, NodeId};
pub use search::{PathSearchEngine, SearchEngine};
pub use session::{RelationDiscoverySession, SessionConfig, SessionEvent, SessionState};
