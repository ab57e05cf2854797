//! stagegated - the dashboard daemon.
//!
//! Exposes a minimal read-only query surface over folded pipeline state:
//!
//! - `GET /healthz` — liveness and cache size
//! - `GET /snapshot?iteration=<path>` — fold-on-demand via the cache
//! - `GET /ws` — one-way refresh channel; the only message ever sent is
//!   the literal text `refresh`, telling viewers to re-read
//!
//! A poll-interval watcher fingerprints the iteration directories under
//! each watched root; on change it invalidates the cache and broadcasts
//! one refresh mark. The daemon never writes into iteration directories
//! — it only mirrors derived state.

use anyhow::{Context, Result};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use clap::Parser;
use serde::Deserialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn, Level};

use stagegate_core::{IterationStore, PhaseTable, RefreshNotifier, SnapshotCache};

#[derive(Parser)]
#[command(name = "stagegated")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Stagegate dashboard daemon", long_about = None)]
struct Args {
    /// Address to bind the query surface to
    #[arg(long, default_value = "127.0.0.1:7171")]
    bind: SocketAddr,

    /// Roots whose child directories are watched as iterations (repeatable)
    #[arg(long = "watch-root")]
    watch_roots: Vec<PathBuf>,

    /// Seconds between watcher polls
    #[arg(long, default_value = "2")]
    poll_secs: u64,

    /// Shared phase registry file (tier -> checkpoint table)
    #[arg(long)]
    registry: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json_logs: bool,
}

struct AppState {
    cache: SnapshotCache,
    notifier: RefreshNotifier,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    stagegate_core::init_tracing(args.json_logs, level);

    let registry = load_registry(args.registry.as_deref())?;
    let state = Arc::new(AppState {
        cache: SnapshotCache::new(Duration::from_secs(args.poll_secs), registry),
        notifier: RefreshNotifier::default(),
    });

    if !args.watch_roots.is_empty() {
        tokio::spawn(watch_roots(
            state.clone(),
            args.watch_roots.clone(),
            Duration::from_secs(args.poll_secs),
        ));
    }

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/snapshot", get(snapshot))
        .route("/ws", get(ws_upgrade))
        .with_state(state);

    info!(bind = %args.bind, roots = args.watch_roots.len(), "stagegated listening");
    let listener = tokio::net::TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("Failed to bind {}", args.bind))?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn load_registry(path: Option<&std::path::Path>) -> Result<Option<PhaseTable>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read phase registry: {}", path.display()))?;
    let table = serde_json::from_str(&content)
        .with_context(|| format!("Invalid JSON in {}", path.display()))?;
    Ok(Some(table))
}

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": stagegate_core::VERSION,
        "cached_iterations": state.cache.len(),
        "subscribers": state.notifier.subscriber_count(),
    }))
}

#[derive(Deserialize)]
struct SnapshotQuery {
    iteration: PathBuf,
}

async fn snapshot(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SnapshotQuery>,
) -> impl IntoResponse {
    let result = tokio::task::spawn_blocking(move || state.cache.get(&query.iteration)).await;

    match result {
        Ok(Ok(snapshot)) => (StatusCode::OK, Json(serde_json::json!(snapshot))),
        Ok(Err(err)) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({ "error": err.to_string() })),
        ),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": err.to_string() })),
        ),
    }
}

async fn ws_upgrade(
    State(state): State<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| refresh_socket(socket, state))
}

/// Push-only socket: forwards refresh marks as the literal text
/// `refresh`. Viewer messages other than ping/close are ignored.
async fn refresh_socket(mut socket: WebSocket, state: Arc<AppState>) {
    let mut rx = state.notifier.subscribe();

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Ping(payload))) => {
                        if socket.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(_)) => {}
                }
            }
            refresh = rx.recv() => {
                match refresh {
                    Ok(_) => {
                        if socket.send(Message::Text("refresh".to_string())).await.is_err() {
                            break;
                        }
                    }
                    // Lagged viewers just get one coalesced refresh.
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {
                        if socket.send(Message::Text("refresh".to_string())).await.is_err() {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Watcher
// ---------------------------------------------------------------------------

/// Poll the watched roots; on any fingerprint change, invalidate the
/// cache and broadcast one refresh mark.
async fn watch_roots(state: Arc<AppState>, roots: Vec<PathBuf>, interval: Duration) {
    let mut fingerprints: HashMap<PathBuf, String> = HashMap::new();

    loop {
        tokio::time::sleep(interval).await;

        let mut changed = false;
        for iteration in iteration_dirs(&roots) {
            let fingerprint = match IterationStore::new(&iteration).fingerprint() {
                Ok(fp) => fp,
                Err(err) => {
                    warn!(iteration = %iteration.display(), error = %err, "watcher skip");
                    continue;
                }
            };
            let stale = fingerprints
                .insert(iteration.clone(), fingerprint.clone())
                .map_or(true, |old| old != fingerprint);
            if stale {
                state.cache.invalidate(&iteration);
                changed = true;
            }
        }

        if changed {
            state.notifier.notify();
        }
    }
}

fn iteration_dirs(roots: &[PathBuf]) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    for root in roots {
        let Ok(entries) = std::fs::read_dir(root) else {
            continue;
        };
        for entry in entries.flatten() {
            if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                dirs.push(entry.path());
            }
        }
    }
    dirs.sort();
    dirs
}
