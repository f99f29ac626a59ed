use clap::{Parser, Subcommand};
use relfinder::db::{migrate, Db};
use relfinder::graph::{InMemoryView, NodeId, RelationStore};
use relfinder::session::{
    pickup, run_session, AutoGate, Confirmation, NodeSelection, RelationDiscoverySession,
    SessionCommand, SessionConfig, SessionEvent,
};
use relfinder::{Config, GraphView, PathSearchEngine};
use std::sync::Arc;
use anyhow::Result;
use tokio::sync::mpsc;

#[derive(Parser, Debug)]
#[command(name = "relfinder")]
#[command(about = "Discover relation paths between two graph nodes", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one relation search between two nodes, printing events as JSON lines
    Find {
        from: String,
        to: String,
        /// Maximum path length in hops (defaults to session.max_depth)
        #[arg(long)]
        max_depth: Option<usize>,
        /// Batch cadence in milliseconds (defaults to session.refresh_interval_ms)
        #[arg(long)]
        refresh_ms: Option<u64>,
    },
    /// List the nodes whose id or label matches any keyword
    Pick {
        #[arg(required = true)]
        keywords: Vec<String>,
    },
    /// Apply migrations and check the relation store schema
    Verify,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;

    // Logs go to stderr; stdout carries JSON only
    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or("RUST_LOG", config.relfinder.log_level.as_str()),
    )
    .init();

    log::debug!("relation store: {}", config.db_path().display());

    match cli.command.unwrap_or(Command::Verify) {
        Command::Find {
            from,
            to,
            max_depth,
            refresh_ms,
        } => {
            let session_config = SessionConfig {
                refresh_interval_ms: refresh_ms.unwrap_or(config.session.refresh_interval_ms),
                max_depth: max_depth.unwrap_or(config.session.max_depth),
            };
            run_find(&config, from, to, session_config).await?;
        }
        Command::Pick { keywords } => run_pick(&config, &keywords).await?,
        Command::Verify => run_verify(&config).await?,
    }

    Ok(())
}

fn open_store(config: &Config) -> Arc<RelationStore> {
    Arc::new(RelationStore::new(
        Db::new(config.db_path()),
        config.search.neighbor_cache_capacity,
    ))
}

/// Run a single session to its terminal event. Ctrl+C stops the search.
async fn run_find(config: &Config, from: String, to: String, session_config: SessionConfig) -> Result<()> {
    let store = open_store(config);
    let endpoints = vec![NodeId::from(from), NodeId::from(to)];
    let view = InMemoryView::with_nodes(store.endpoint_nodes(endpoints.clone()).await?);
    let engine = Arc::new(PathSearchEngine::new(store, config.search.clone()));
    let selection = Arc::new(NodeSelection::with_ids(endpoints));
    let gate = Arc::new(AutoGate::new(Confirmation::Confirmed));

    let mut session = RelationDiscoverySession::new(view, selection, gate, engine);
    let mut events = session.subscribe();

    if let Err(e) = session.request_start(session_config) {
        while let Ok(event) = events.try_recv() {
            println!("{}", serde_json::to_string(&event)?);
        }
        anyhow::bail!("relation search not started: {}", e);
    }

    let (commands, command_rx) = mpsc::unbounded_channel();
    let interrupt_tx = commands.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("interrupted, stopping search");
            let _ = interrupt_tx.send(SessionCommand::Stop);
        }
    });
    let driver = tokio::spawn(run_session(session, session_config, command_rx));

    while let Some(event) = events.recv().await {
        println!("{}", serde_json::to_string(&event)?);
        if matches!(event, SessionEvent::Stopped { .. }) {
            break;
        }
    }

    interrupt.abort();
    drop(commands);
    let session = driver.await?;

    let snapshot = session.view().snapshot();
    log::info!(
        "view holds {} nodes, {} edges",
        snapshot.nodes.len(),
        snapshot.edges.len()
    );
    println!("{}", serde_json::to_string(&snapshot)?);
    Ok(())
}

async fn run_pick(config: &Config, keywords: &[String]) -> Result<()> {
    let store = open_store(config);
    if !store.db().exists() {
        anyhow::bail!("relation store not found: {}", config.db_path().display());
    }
    let selection = NodeSelection::new();
    let nodes = pickup(&store, &selection, keywords).await?;
    println!("{}", serde_json::to_string(&nodes)?);
    Ok(())
}

async fn run_verify(config: &Config) -> Result<()> {
    log::info!("Starting relfinder v{}", env!("CARGO_PKG_VERSION"));
    let db = Db::new(config.db_path());

    let applied = db
        .with_connection(|conn| {
            let applied = migrate::run_migrations(conn)?;
            migrate::verify_schema(conn)?;
            Ok(applied)
        })
        .await?;

    log::info!("{} migrations applied", applied);
    log::info!("✓ Relation store schema verified: {}", config.db_path().display());
    Ok(())
}
