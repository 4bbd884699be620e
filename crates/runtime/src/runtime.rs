//! High-level runtime orchestrator.
//!
//! The runtime owns background workers, wires up command/event channels, and
//! exposes a builder-based API. Building the runtime recovers every battle
//! that was live when the previous process stopped.

use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::api::{ChannelTransport, Result, RuntimeError, RuntimeHandle, SessionRegistry, Transport};
use crate::config::RuntimeConfig;
use crate::events::EventBus;
use crate::repository::{BattleStore, EventLogRepository, InMemoryBattleStore};
use crate::workers::{
    CycleReport, EventLogWorker, PersistenceWorker, SessionContext, recover_sessions,
};

/// Main runtime that orchestrates battle sessions
///
/// Design: Runtime owns workers and coordinates shutdown.
/// [`RuntimeHandle`] provides a cloneable façade for clients.
pub struct Runtime {
    // Shared handle (can be cloned for clients)
    handle: RuntimeHandle,

    // Background workers
    persistence_worker_handle: JoinHandle<()>,
    event_log_worker: Option<(oneshot::Sender<()>, JoinHandle<()>)>,

    recovered: usize,
}

impl Runtime {
    /// Create a new runtime builder
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Get a cloneable handle to this runtime
    ///
    /// The handle can be shared across clients and async tasks.
    pub fn handle(&self) -> RuntimeHandle {
        self.handle.clone()
    }

    /// Sessions brought back from the store at startup.
    pub fn recovered_sessions(&self) -> usize {
        self.recovered
    }

    /// Shutdown the runtime gracefully
    ///
    /// Runs one forced persistence pass over every live session, then stops
    /// the session workers and the event log.
    pub async fn shutdown(self) -> Result<CycleReport> {
        let report = self.handle.persistence().shutdown().await?;
        self.persistence_worker_handle
            .await
            .map_err(RuntimeError::WorkerJoin)?;

        let context = Arc::clone(self.handle.context());
        drop(self.handle);
        for task in context.registry.drain() {
            task.await.map_err(RuntimeError::WorkerJoin)?;
        }

        if let Some((shutdown_tx, task)) = self.event_log_worker {
            let _ = shutdown_tx.send(());
            task.await.map_err(RuntimeError::WorkerJoin)?;
        }

        info!(
            written = report.written,
            archived = report.archived,
            failed = report.failed,
            "Runtime stopped"
        );
        Ok(report)
    }
}

/// Builder for [`Runtime`] with flexible configuration.
pub struct RuntimeBuilder {
    config: RuntimeConfig,
    store: Option<Arc<dyn BattleStore>>,
    event_log: Option<Arc<dyn EventLogRepository>>,
    transport: Option<Arc<dyn Transport>>,
}

impl RuntimeBuilder {
    fn new() -> Self {
        Self {
            config: RuntimeConfig::default(),
            store: None,
            event_log: None,
            transport: None,
        }
    }

    /// Override runtime configuration
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Durable battle store (default: in-memory, lost on exit)
    pub fn store(mut self, store: Arc<dyn BattleStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Durable log for system, account and match events (optional)
    pub fn event_log(mut self, log: Arc<dyn EventLogRepository>) -> Self {
        self.event_log = Some(log);
        self
    }

    /// Push channel to clients (default: an in-process [`ChannelTransport`])
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Recovers live battles from the store and starts the workers.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::StoreUnavailable`] when the store cannot be
    /// read; starting without the live battles would abandon them.
    pub async fn build(self) -> Result<Runtime> {
        let store = self.store.unwrap_or_else(|| {
            warn!("No battle store configured, battles will not survive a restart");
            Arc::new(InMemoryBattleStore::new())
        });
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(ChannelTransport::new()));

        let event_bus = EventBus::new();
        let context = Arc::new(SessionContext {
            config: self.config,
            registry: SessionRegistry::new(),
            transport,
            event_bus,
        });

        // Subscribe before recovery so the recovery notice is logged.
        let event_log_worker = self.event_log.and_then(|log| {
            EventLogWorker::new(
                log,
                &context.event_bus,
                context.config.retention,
                context.config.event_cleanup_interval,
            )
        });

        let recovered = recover_sessions(&context, store.as_ref()).await?;

        let (persistence_worker, persistence) = PersistenceWorker::new(Arc::clone(&context), store);
        let persistence_worker_handle = tokio::spawn(persistence_worker.run());

        let event_log_worker = event_log_worker.map(|(worker, shutdown_tx)| {
            (shutdown_tx, tokio::spawn(worker.run()))
        });

        info!(
            recovered,
            turn_seconds = context.config.turn_duration.as_secs(),
            persist_interval_secs = context.config.persist_interval.as_secs(),
            "Runtime started"
        );

        Ok(Runtime {
            handle: RuntimeHandle::new(context, persistence),
            persistence_worker_handle,
            event_log_worker,
            recovered,
        })
    }
}
