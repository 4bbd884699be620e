//! Event log worker: durable storage and retention of non-battle events.
//!
//! Subscribes to every bus topic, appends each event to the
//! [`EventLogRepository`] and periodically purges entries older than their
//! context's retention window.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, oneshot};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::RetentionPolicy;
use crate::events::{CombatEvent, EventBus, EventContext, Topic};
use crate::repository::EventLogRepository;

const DURABLE_CONTEXTS: [EventContext; 3] =
    [EventContext::System, EventContext::Account, EventContext::Match];

pub(crate) struct EventLogWorker {
    log: Arc<dyn EventLogRepository>,
    retention: RetentionPolicy,
    cleanup_interval: std::time::Duration,
    system_rx: broadcast::Receiver<CombatEvent>,
    account_rx: broadcast::Receiver<CombatEvent>,
    match_rx: broadcast::Receiver<CombatEvent>,
    shutdown_rx: oneshot::Receiver<()>,
}

impl EventLogWorker {
    /// Subscribes immediately, so events published before `run` starts are kept.
    pub fn new(
        log: Arc<dyn EventLogRepository>,
        bus: &EventBus,
        retention: RetentionPolicy,
        cleanup_interval: std::time::Duration,
    ) -> Option<(Self, oneshot::Sender<()>)> {
        let mut receivers = bus.subscribe_multiple(&Topic::ALL);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let worker = Self {
            log,
            retention,
            cleanup_interval,
            system_rx: receivers.remove(&Topic::System)?,
            account_rx: receivers.remove(&Topic::Account)?,
            match_rx: receivers.remove(&Topic::Match)?,
            shutdown_rx,
        };
        Some((worker, shutdown_tx))
    }

    pub async fn run(mut self) {
        info!(target: "runtime::event_log", "EventLogWorker started");
        let mut cleanup = tokio::time::interval_at(
            Instant::now() + self.cleanup_interval,
            self.cleanup_interval,
        );
        cleanup.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let received = tokio::select! {
                event = self.system_rx.recv() => event,
                event = self.account_rx.recv() => event,
                event = self.match_rx.recv() => event,
                _ = cleanup.tick() => {
                    self.purge();
                    continue;
                }
                _ = &mut self.shutdown_rx => break,
            };

            match received {
                Ok(event) => self.append(&event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("EventLogWorker lagged, {} events not logged", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed");
                    break;
                }
            }
        }

        self.drain();
        if let Err(e) = self.log.flush() {
            error!("Failed to flush event log: {}", e);
        }
        info!("EventLogWorker stopped");
    }

    fn append(&self, event: &CombatEvent) {
        if let Err(e) = self.log.append(event).and_then(|()| self.log.flush()) {
            error!(
                context = %event.context,
                message_type = event.message_type(),
                "Failed to append event: {}",
                e
            );
        }
    }

    /// Logs whatever is still queued on the receivers.
    fn drain(&mut self) {
        let mut pending = Vec::new();
        for rx in [&mut self.system_rx, &mut self.account_rx, &mut self.match_rx] {
            while let Ok(event) = rx.try_recv() {
                pending.push(event);
            }
        }
        for event in &pending {
            self.append(event);
        }
    }

    fn purge(&self) {
        let now = Utc::now();
        for context in DURABLE_CONTEXTS {
            let Some(window) = self.retention.window(context) else {
                continue;
            };
            match self.log.purge_older_than(context, now - window) {
                Ok(0) => {}
                Ok(removed) => info!(%context, removed, "Purged expired events"),
                Err(e) => error!(%context, "Event log cleanup failed: {}", e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventPayload, EventSeverity};
    use crate::repository::InMemoryEventLog;

    fn notice(context: EventContext) -> CombatEvent {
        CombatEvent::new(
            context,
            EventSeverity::Notice,
            "server restarted",
            EventPayload::Notice {
                text: "restart".into(),
            },
        )
    }

    #[tokio::test]
    async fn durable_events_reach_the_log() {
        let bus = EventBus::new();
        let log = Arc::new(InMemoryEventLog::new());
        let (worker, shutdown) = EventLogWorker::new(
            log.clone(),
            &bus,
            RetentionPolicy::default(),
            std::time::Duration::from_secs(3600),
        )
        .unwrap();
        let task = tokio::spawn(worker.run());

        bus.publish(notice(EventContext::System));
        bus.publish(notice(EventContext::Battle));
        bus.publish(notice(EventContext::Match));

        shutdown.send(()).unwrap();
        task.await.unwrap();

        let logged = log.read_all().unwrap();
        assert_eq!(logged.len(), 2);
        assert!(logged.iter().all(|e| e.context.is_durable()));
    }
}
