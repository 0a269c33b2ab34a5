//! Merge Sync - `merge-watch` binary
//!
//! Follows one merge session and logs what the backend pushes until Ctrl-C.
//!
//! Environment:
//! - `MERGE_SYNC_ORIGIN` backend origin (default `http://localhost:8000`)
//! - `MERGE_SYNC_SESSION` session id (required, or first argument)
//! - `MERGE_SYNC_RECONNECT_DELAY_MS`, `MERGE_SYNC_MAX_RECONNECTS`, `MERGE_SYNC_TIMEOUT_SECS`
//! - `RUST_LOG` log filter (default `info`)

use std::env;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use merge_sync::channel::{QuestionPayload, StatusPayload};
use merge_sync::{
    HttpGraphSource, MergeSession, MessageKind, SyncConfig, SyncError, SyncResult, WsTransport,
};
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "ignoring unparsable setting");
            default
        }),
        Err(_) => default,
    }
}

fn load_config() -> SyncConfig {
    let defaults = SyncConfig::default();
    let origin = env::var("MERGE_SYNC_ORIGIN").unwrap_or(defaults.origin);

    SyncConfig::new(origin)
        .with_reconnect_delay(Duration::from_millis(env_or(
            "MERGE_SYNC_RECONNECT_DELAY_MS",
            defaults.reconnect_delay.as_millis() as u64,
        )))
        .with_max_reconnect_attempts(env_or(
            "MERGE_SYNC_MAX_RECONNECTS",
            defaults.max_reconnect_attempts,
        ))
        .with_request_timeout(Duration::from_secs(env_or(
            "MERGE_SYNC_TIMEOUT_SECS",
            defaults.request_timeout.as_secs(),
        )))
}

#[tokio::main]
async fn main() -> SyncResult<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .init();

    let Some(session_id) = env::args().nth(1).or_else(|| env::var("MERGE_SYNC_SESSION").ok())
    else {
        error!("no session id: pass it as the first argument or set MERGE_SYNC_SESSION");
        return Err(SyncError::Config("missing session id".to_string()));
    };

    let config = load_config();
    let source = Arc::new(HttpGraphSource::new(&config)?);
    let session = MergeSession::open(&config, session_id, Arc::new(WsTransport::new()), source);

    session.channel().on(MessageKind::Status, |frame| {
        match frame.payload_as::<StatusPayload>() {
            Ok(status) => info!(
                status = %status.status,
                progress = status.progress,
                step = status.current_step.as_deref().unwrap_or("-"),
                "merge status"
            ),
            Err(e) => warn!(error = %e, "unreadable STATUS payload"),
        }
    });
    session.channel().on(MessageKind::Question, |frame| {
        match frame.payload_as::<QuestionPayload>() {
            Ok(question) => info!(
                question = %question.question_id,
                options = ?question.options,
                "question: {}", question.text
            ),
            Err(e) => warn!(error = %e, "unreadable QUESTION payload"),
        }
    });
    session.channel().on(MessageKind::Error, |frame| {
        warn!(payload = %frame.payload, "backend reported an error");
    });

    let mut states = session.channel().state_changes();
    let mut views = session.subscribe();
    let interrupted = tokio::signal::ctrl_c();
    tokio::pin!(interrupted);

    loop {
        tokio::select! {
            _ = &mut interrupted => {
                info!("interrupted, closing session");
                break;
            }
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *states.borrow_and_update();
                match session.channel().last_error() {
                    Some(reason) if !state.is_active() => {
                        warn!(%state, %reason, "push channel state changed")
                    }
                    _ => info!(%state, "push channel state changed"),
                }
            }
            view = views.recv() => match view {
                Ok(view) => info!(
                    version = view.snapshot_version,
                    nodes = view.snapshot.node_count(),
                    edges = view.snapshot.edge_count(),
                    conflicts = view.conflicts.len(),
                    "view updated"
                ),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "view updates lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    session.close().await;
    Ok(())
}
