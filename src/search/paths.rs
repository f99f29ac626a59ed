//! Simple-path enumeration over the relation store.
//!
//! A producer task walks paths breadth first and hands every path that ends
//! at the target to the emitter, which merges them into one pending batch and
//! flushes it on each refresh tick.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::{SearchEngine, SearchEvent, SearchId, SearchRequest, SearchSignal, SignalSender, Terminal};
use crate::config::SearchConfig;
use crate::error::{RelfinderError, Result};
use crate::graph::{GraphEdge, NodeId, RelationStore, ResultBatch};

type CancelMap = Arc<Mutex<HashMap<SearchId, watch::Sender<bool>>>>;

pub struct PathSearchEngine {
    store: Arc<RelationStore>,
    settings: SearchConfig,
    active: CancelMap,
}

impl PathSearchEngine {
    pub fn new(store: Arc<RelationStore>, settings: SearchConfig) -> Self {
        Self {
            store,
            settings,
            active: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Number of searches that have not reported their terminal signal yet.
    pub fn active_searches(&self) -> usize {
        self.active.lock().map(|m| m.len()).unwrap_or(0)
    }
}

impl SearchEngine for PathSearchEngine {
    fn start(&self, request: SearchRequest, signals: SignalSender) -> Result<SearchId> {
        if !self.store.db().exists() {
            return Err(RelfinderError::Search(format!(
                "relation store not found: {}",
                self.store.db().path().display()
            )));
        }
        if request.from == request.to {
            return Err(RelfinderError::InvalidInput(
                "search endpoints must differ".to_string(),
            ));
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| RelfinderError::Search(format!("no async runtime: {}", e)))?;

        let id = SearchId::new();
        let (cancel_tx, cancel_rx) = watch::channel(false);
        self.active
            .lock()
            .map_err(|_| RelfinderError::Search("search registry poisoned".to_string()))?
            .insert(id, cancel_tx);

        log::info!(
            "search {}: {} -> {} (max depth {}, refresh {:?})",
            id,
            request.from,
            request.to,
            request.max_depth,
            request.refresh_interval
        );

        let run = SearchRun {
            id,
            store: self.store.clone(),
            request,
            limits: PathLimits {
                max_paths: self.settings.max_paths,
                max_frontier: self.settings.max_frontier,
            },
            timeout: self.settings.timeout_ms.map(Duration::from_millis),
            signals,
        };
        let active = self.active.clone();
        runtime.spawn(async move {
            run.execute(cancel_rx).await;
            if let Ok(mut map) = active.lock() {
                map.remove(&id);
            }
        });

        Ok(id)
    }

    fn cancel(&self, search: SearchId) {
        let sender = self.active.lock().ok().and_then(|mut m| m.remove(&search));
        match sender {
            Some(tx) => {
                log::debug!("search {}: cancel requested", search);
                let _ = tx.send(true);
            }
            None => log::debug!("search {}: cancel ignored, not running", search),
        }
    }
}

/// One path from the source to the target, as the edges walked.
type FoundPath = Vec<GraphEdge>;

struct SearchRun {
    id: SearchId,
    store: Arc<RelationStore>,
    request: SearchRequest,
    limits: PathLimits,
    timeout: Option<Duration>,
    signals: SignalSender,
}

#[derive(Debug, Clone, Copy)]
struct PathLimits {
    max_paths: usize,
    max_frontier: usize,
}

impl SearchRun {
    async fn execute(self, mut cancel: watch::Receiver<bool>) {
        let (path_tx, mut path_rx) = mpsc::unbounded_channel::<FoundPath>();
        let mut producer: JoinHandle<Result<()>> = tokio::spawn(enumerate_paths(
            self.store.clone(),
            self.request.clone(),
            self.limits,
            cancel.clone(),
            path_tx,
        ));

        let period = self.request.refresh_interval.max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        let deadline = self.timeout.map(|t| Instant::now() + t);
        let expired = async move {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(expired);

        let mut pending = PendingBatch::new(&self.request);

        let terminal = loop {
            tokio::select! {
                biased;

                changed = cancel.changed() => {
                    if changed.is_err() || *cancel.borrow() {
                        break Terminal::Cancelled;
                    }
                }
                _ = &mut expired => {
                    let ms = self.timeout.map(|t| t.as_millis()).unwrap_or_default();
                    break Terminal::Failed(format!("search timed out after {} ms", ms));
                }
                _ = ticker.tick() => {
                    match self.flush(&mut pending).await {
                        Ok(true) => {}
                        Ok(false) => break Terminal::Cancelled,
                        Err(e) => break Terminal::Failed(e.to_string()),
                    }
                }
                found = path_rx.recv() => match found {
                    Some(path) => pending.add(path),
                    None => {
                        break match (&mut producer).await {
                            Ok(Ok(())) => match self.flush(&mut pending).await {
                                Ok(_) => Terminal::Completed,
                                Err(e) => Terminal::Failed(e.to_string()),
                            },
                            Ok(Err(e)) => Terminal::Failed(e.to_string()),
                            Err(e) => Terminal::Failed(format!("path search task: {}", e)),
                        };
                    }
                },
            }
        };

        producer.abort();
        log::info!("search {}: {:?} ({} paths)", self.id, terminal, pending.paths);
        let _ = self.signals.send(SearchSignal {
            search: self.id,
            event: SearchEvent::Finished(terminal),
        });
    }

    /// Send whatever was discovered since the last tick. Returns false when
    /// nobody listens any more.
    async fn flush(&self, pending: &mut PendingBatch) -> Result<bool> {
        let Some((node_ids, edges)) = pending.take() else {
            return Ok(true);
        };
        let nodes = self.store.resolve_nodes(node_ids).await?;
        log::debug!(
            "search {}: batch of {} nodes, {} edges",
            self.id,
            nodes.len(),
            edges.len()
        );
        let batch = ResultBatch { nodes, edges };
        Ok(self
            .signals
            .send(SearchSignal {
                search: self.id,
                event: SearchEvent::Batch(batch),
            })
            .is_ok())
    }
}

/// Discoveries not yet sent, deduplicated against everything sent before.
struct PendingBatch {
    seen_nodes: HashSet<NodeId>,
    seen_edges: HashSet<String>,
    nodes: Vec<NodeId>,
    edges: Vec<GraphEdge>,
    paths: usize,
}

impl PendingBatch {
    /// The endpoints are already rendered and never reported again.
    fn new(request: &SearchRequest) -> Self {
        Self {
            seen_nodes: HashSet::from([request.from.clone(), request.to.clone()]),
            seen_edges: HashSet::new(),
            nodes: Vec::new(),
            edges: Vec::new(),
            paths: 0,
        }
    }

    fn add(&mut self, path: FoundPath) {
        self.paths += 1;
        for edge in path {
            for id in [&edge.source, &edge.target] {
                if self.seen_nodes.insert(id.clone()) {
                    self.nodes.push(id.clone());
                }
            }
            if self.seen_edges.insert(edge.id.clone()) {
                self.edges.push(edge);
            }
        }
    }

    fn take(&mut self) -> Option<(Vec<NodeId>, Vec<GraphEdge>)> {
        if self.nodes.is_empty() && self.edges.is_empty() {
            return None;
        }
        Some((
            std::mem::take(&mut self.nodes),
            std::mem::take(&mut self.edges),
        ))
    }
}

struct Partial {
    nodes: Vec<NodeId>,
    edges: Vec<GraphEdge>,
}

/// Breadth-first walk of simple paths from `request.from`, reporting each one
/// that reaches `request.to` within `request.max_depth` hops.
///
/// Cached neighbor lookups never suspend, so the walk yields after every
/// partial path to let the refresh ticker and cancellation run.
async fn enumerate_paths(
    store: Arc<RelationStore>,
    request: SearchRequest,
    limits: PathLimits,
    cancel: watch::Receiver<bool>,
    found: mpsc::UnboundedSender<FoundPath>,
) -> Result<()> {
    let mut queue = VecDeque::from([Partial {
        nodes: vec![request.from.clone()],
        edges: Vec::new(),
    }]);
    let mut reported = 0;
    let mut frontier_full = false;

    while let Some(partial) = queue.pop_front() {
        tokio::task::yield_now().await;
        if *cancel.borrow() {
            return Ok(());
        }
        let hops = partial.edges.len();
        if hops >= request.max_depth {
            continue;
        }
        let Some(last) = partial.nodes.last() else {
            continue;
        };

        for neighbor in store.neighbors(last).await? {
            if partial.nodes.contains(&neighbor.node) {
                continue;
            }

            if neighbor.node == request.to {
                let mut path = partial.edges.clone();
                path.push(neighbor.edge);
                if found.send(path).is_err() {
                    return Ok(());
                }
                reported += 1;
                if reported >= limits.max_paths {
                    log::debug!("path limit of {} reached", limits.max_paths);
                    return Ok(());
                }
                continue;
            }

            if hops + 1 < request.max_depth {
                if queue.len() >= limits.max_frontier {
                    if !frontier_full {
                        log::warn!(
                            "frontier limit of {} reached, longer paths are skipped",
                            limits.max_frontier
                        );
                        frontier_full = true;
                    }
                    continue;
                }
                let mut nodes = partial.nodes.clone();
                nodes.push(neighbor.node);
                let mut edges = partial.edges.clone();
                edges.push(neighbor.edge);
                queue.push_back(Partial { nodes, edges });
            }
        }
    }

    Ok(())
}
