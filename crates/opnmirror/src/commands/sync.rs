//! Sync handlers: one-shot passes, status, and the watch loop.

use std::time::Duration;

use serde::Serialize;
use tabled::Tabled;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use opnmirror_core::{SyncInfo, SyncResult, SyncStatus, TypeOutcome};

use crate::cli::{GlobalOpts, SyncArgs, SyncCommand};
use crate::error::CliError;
use crate::output::{self, Painter};
use crate::state::{self, Session, StateLock};

use super::util;

// ── Rendering ───────────────────────────────────────────────────────

pub fn paint_status(status: SyncStatus, paint: Painter) -> String {
    let text = status.to_string();
    match status {
        SyncStatus::Complete => paint.good(&text),
        SyncStatus::Partial | SyncStatus::InProgress => paint.warn(&text),
        SyncStatus::Failed => paint.bad(&text),
    }
}

#[derive(Tabled)]
struct TypeRow {
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Result")]
    result: String,
    #[tabled(rename = "Entities")]
    entities: String,
    #[tabled(rename = "+")]
    created: String,
    #[tabled(rename = "~")]
    updated: String,
    #[tabled(rename = "-")]
    deleted: String,
}

/// Per-type table for one pass, headed by its status line.
pub fn detail(result: &SyncResult, paint: Painter) -> String {
    let rows: Vec<TypeRow> = result
        .types
        .iter()
        .map(|t| match &t.outcome {
            TypeOutcome::Reconciled {
                counts,
                entities,
                refetched,
            } => TypeRow {
                kind: t.kind.to_string(),
                result: if *refetched {
                    paint.good("ok (refetched)")
                } else {
                    paint.good("ok")
                },
                entities: entities.to_string(),
                created: counts.created.to_string(),
                updated: counts.updated.to_string(),
                deleted: counts.deleted.to_string(),
            },
            TypeOutcome::Failed { error, .. } => TypeRow {
                kind: t.kind.to_string(),
                result: paint.bad(error),
                entities: "-".into(),
                created: "-".into(),
                updated: "-".into(),
                deleted: "-".into(),
            },
        })
        .collect();

    let header = format!(
        "sync {} in {}ms: {}",
        paint_status(result.status, paint),
        result.duration_ms,
        result.message
    );
    if rows.is_empty() {
        header
    } else {
        format!("{header}\n{}", output::render_table(&rows))
    }
}

/// A pass that reconciled nothing is an error; partial passes are not.
pub fn ensure_usable(result: &SyncResult) -> Result<(), CliError> {
    if result.status == SyncStatus::Failed {
        return Err(CliError::SyncFailed {
            message: result.message.clone(),
        });
    }
    Ok(())
}

#[derive(Serialize)]
struct StatusView {
    server: String,
    #[serde(flatten)]
    info: Option<SyncInfo>,
}

#[derive(Tabled)]
struct StatusRow {
    #[tabled(rename = "Server")]
    server: String,
    #[tabled(rename = "Last Sync")]
    last_sync: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Duration")]
    duration: String,
    #[tabled(rename = "Changes")]
    changes: String,
    #[tabled(rename = "Last Success")]
    last_success: String,
}

impl StatusRow {
    fn from_view(v: &StatusView, paint: Painter) -> Self {
        match &v.info {
            Some(info) => Self {
                server: v.server.clone(),
                last_sync: util::timestamp(Some(info.last_sync)),
                status: paint_status(info.status, paint),
                duration: format!("{}ms", info.duration_ms),
                changes: info.counts.total().to_string(),
                last_success: util::timestamp(info.last_success),
            },
            None => Self {
                server: v.server.clone(),
                last_sync: "-".into(),
                status: paint.dim("never"),
                duration: "-".into(),
                changes: "-".into(),
                last_success: "-".into(),
            },
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(session: &Session, args: SyncArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let paint = Painter::new(&global.color);
    let command = args.command.unwrap_or(SyncCommand::Run { all: args.all });
    match command {
        SyncCommand::Run { all: false } => {
            let id = session.connected_server(global)?;
            let result = session.mirror.sync_server(id).await?;
            let out = output::render_single(&global.output, &result, |r| detail(r, paint), |r| {
                r.status.to_string()
            });
            output::print_output(&out, global.quiet);
            ensure_usable(&result)
        }

        SyncCommand::Run { all: true } => {
            session.connect_all(global)?;
            let results = session.mirror.sync_all_servers().await;
            let servers = session.mirror.servers();
            let out = output::render_single(
                &global.output,
                &results,
                |rs| {
                    rs.iter()
                        .map(|r| {
                            let name = servers
                                .iter()
                                .find(|s| s.id == r.server_id)
                                .map_or("?", |s| s.name.as_str());
                            format!("{name}: {}", detail(r, paint))
                        })
                        .collect::<Vec<_>>()
                        .join("\n\n")
                },
                |rs| {
                    rs.iter()
                        .map(|r| r.status.to_string())
                        .collect::<Vec<_>>()
                        .join("\n")
                },
            );
            output::print_output(&out, global.quiet);
            if let Some(failed) = results.iter().find(|r| r.status == SyncStatus::Failed) {
                return ensure_usable(failed);
            }
            Ok(())
        }

        SyncCommand::Status => {
            let views: Vec<StatusView> = session
                .mirror
                .servers()
                .into_iter()
                .map(|s| StatusView {
                    info: session.mirror.sync_info(s.id).ok().flatten(),
                    server: s.name,
                })
                .collect();
            let out = output::render_list(
                &global.output,
                &views,
                |v| StatusRow::from_view(v, paint),
                |v| v.server.clone(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        SyncCommand::Watch { interval } => watch(session, global, Duration::from_secs(interval)).await,
    }
}

/// Run a pass every interval until Ctrl-C.
///
/// Each pass takes the state lock, reloads the state file, syncs, and
/// saves, so deployments made between passes are kept.
async fn watch(session: &Session, global: &GlobalOpts, every: Duration) -> Result<(), CliError> {
    if every.is_zero() {
        return Err(CliError::Validation {
            field: "interval".into(),
            reason: "must be at least 1 second".into(),
        });
    }
    let mut lock = StateLock::open(&session.state_path)?;

    let connected = watch_pass(session, global, &mut lock).await?;
    if connected == 0 {
        return Err(CliError::Validation {
            field: "servers".into(),
            reason: "no registered server has a matching profile".into(),
        });
    }
    if !global.quiet {
        eprintln!("Syncing {connected} server(s) every {}s; Ctrl-C to stop", every.as_secs());
    }

    // A pass in flight finishes before the loop sees the cancellation.
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    let mut tick = tokio::time::interval(every);
    tick.tick().await;
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = tick.tick() => {}
        }
        watch_pass(session, global, &mut lock).await?;
    }
    info!("periodic sync stopped");
    Ok(())
}

/// One locked reload, sync and save. Returns the connected server count.
async fn watch_pass(session: &Session, global: &GlobalOpts, lock: &mut StateLock) -> Result<usize, CliError> {
    let _guard = lock.acquire()?;
    let mirror = state::load_mirror(&session.state_path, session.mirror.settings().clone())?;
    let connected = session.connect_all_in(&mirror, global)?;
    for result in mirror.sync_all_servers().await {
        if result.status == SyncStatus::Complete {
            debug!(server = %result.server_id, changes = result.counts.total(), "pass complete");
        } else {
            warn!(server = %result.server_id, status = %result.status, message = %result.message, "pass incomplete");
        }
    }
    state::save_mirror(&session.state_path, &mirror)?;
    Ok(connected)
}
