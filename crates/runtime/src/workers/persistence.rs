//! Persistence worker for periodic session snapshots.
//!
//! Every cycle walks the live registry, fingerprints each session and writes
//! only the ones that changed since the previous cycle.
//!
//! # Cycle
//!
//! 1. Snapshot every registered session (the registry lock is not held while
//!    waiting on workers or the store)
//! 2. Ended sessions are written once more as an archival record, then removed
//!    from the registry so recovery never revives them
//! 3. Active sessions are hashed; an unchanged hash skips the write
//! 4. Changed sessions are upserted and their hash recorded; a failed write
//!    leaves the old hash so the next cycle retries
//! 5. Hash entries of sessions no longer in the registry are dropped
//!
//! Shutdown clears the hash cache and forces one unconditional pass.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use battle_core::SessionId;

use crate::api::{Result, RuntimeError};
use crate::repository::{BattleStore, StoredSession};
use crate::utils::PersistenceHash;

use super::session::SessionContext;

/// Counters of one persistence cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Sessions whose snapshot was taken.
    pub examined: usize,
    /// Active sessions written.
    pub written: usize,
    /// Active sessions whose hash was unchanged.
    pub skipped: usize,
    /// Ended sessions written as archive and removed from the registry.
    pub archived: usize,
    /// Sessions that could not be hashed or written this cycle.
    pub failed: usize,
    pub elapsed: Duration,
}

/// Commands that can be sent to the persistence worker
pub(crate) enum PersistenceCommand {
    /// Run a cycle now; `force` bypasses the unchanged-hash check.
    Flush {
        force: bool,
        reply: oneshot::Sender<CycleReport>,
    },
    /// Run the final forced pass and stop.
    Shutdown { reply: oneshot::Sender<CycleReport> },
}

/// Cloneable handle to the persistence worker.
#[derive(Clone)]
pub(crate) struct PersistenceHandle {
    command_tx: mpsc::Sender<PersistenceCommand>,
}

impl PersistenceHandle {
    pub async fn flush(&self, force: bool) -> Result<CycleReport> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(PersistenceCommand::Flush {
                force,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RuntimeError::CommandChannelClosed)?;
        reply_rx.await.map_err(RuntimeError::ReplyChannelClosed)
    }

    pub async fn shutdown(&self) -> Result<CycleReport> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(PersistenceCommand::Shutdown { reply: reply_tx })
            .await
            .map_err(|_| RuntimeError::CommandChannelClosed)?;
        reply_rx.await.map_err(RuntimeError::ReplyChannelClosed)
    }
}

/// Background worker that handles all session persistence.
pub(crate) struct PersistenceWorker {
    context: Arc<SessionContext>,
    store: Arc<dyn BattleStore>,
    /// Hash written by the last successful cycle, per session. Only this
    /// worker reads or writes it.
    hashes: HashMap<SessionId, PersistenceHash>,
    command_rx: mpsc::Receiver<PersistenceCommand>,
}

impl PersistenceWorker {
    pub fn new(
        context: Arc<SessionContext>,
        store: Arc<dyn BattleStore>,
    ) -> (Self, PersistenceHandle) {
        let (command_tx, command_rx) = mpsc::channel(8);
        let worker = Self {
            context,
            store,
            hashes: HashMap::new(),
            command_rx,
        };
        (worker, PersistenceHandle { command_tx })
    }

    /// Main worker loop
    pub async fn run(mut self) {
        let interval = self.context.config.persist_interval;
        info!(
            target: "runtime::persistence",
            "PersistenceWorker started: interval={:?}", interval
        );

        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_cycle(false).await;
                }

                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(PersistenceCommand::Flush { force, reply }) => {
                            let report = self.run_cycle(force).await;
                            let _ = reply.send(report);
                        }
                        Some(PersistenceCommand::Shutdown { reply }) => {
                            info!("Shutdown command received");
                            let report = self.finalize().await;
                            let _ = reply.send(report);
                            return;
                        }
                        None => {
                            debug!("Command channel closed");
                            break;
                        }
                    }
                }
            }
        }

        self.finalize().await;
    }

    /// Unconditional pass so no mutation is lost to a graceful restart.
    async fn finalize(&mut self) -> CycleReport {
        info!("Finalizing persistence worker...");
        self.hashes.clear();
        let report = self.run_cycle(true).await;
        info!(
            written = report.written,
            archived = report.archived,
            failed = report.failed,
            "PersistenceWorker stopped"
        );
        report
    }

    pub async fn run_cycle(&mut self, force: bool) -> CycleReport {
        let started = Instant::now();
        let mut report = CycleReport::default();
        let mut live = HashSet::new();

        for handle in self.context.registry.handles() {
            let id = handle.id();
            let session = match handle.snapshot().await {
                Ok(session) => session,
                Err(e) => {
                    warn!(session = %id, "Session worker unavailable for snapshot: {}", e);
                    continue;
                }
            };
            report.examined += 1;
            let stored = StoredSession::capture(&session);

            if !session.is_active() {
                match self.store.save(&stored).await {
                    Ok(()) => {
                        report.archived += 1;
                        self.context.registry.remove(id);
                        info!(session = %id, outcome = ?session.outcome, "Archived ended session");
                    }
                    Err(e) => {
                        report.failed += 1;
                        live.insert(id);
                        error!(session = %id, "Failed to archive ended session: {}", e);
                    }
                }
                continue;
            }

            live.insert(id);
            let hash = match PersistenceHash::of(&session) {
                Ok(hash) => hash,
                Err(e) => {
                    report.failed += 1;
                    error!(session = %id, "Failed to hash session: {}", e);
                    continue;
                }
            };
            if !force && self.hashes.get(&id) == Some(&hash) {
                report.skipped += 1;
                continue;
            }

            match self.store.save(&stored).await {
                Ok(()) => {
                    report.written += 1;
                    self.hashes.insert(id, hash);
                    debug!(session = %id, %hash, "Persisted session");
                }
                Err(e) => {
                    report.failed += 1;
                    error!(session = %id, "Failed to persist session: {}", e);
                }
            }
        }

        self.hashes.retain(|id, _| live.contains(id));

        report.elapsed = started.elapsed();
        if report.elapsed > self.context.config.persist_soft_budget {
            warn!(
                elapsed_ms = report.elapsed.as_millis() as u64,
                budget_ms = self.context.config.persist_soft_budget.as_millis() as u64,
                sessions = report.examined,
                "Persistence cycle exceeded its soft budget"
            );
        } else if report.written + report.archived > 0 {
            debug!(?report, "Persistence cycle complete");
        }
        report
    }
}
