//! Worker tasks that back the runtime orchestration.
//!
//! One session worker per live battle executes client requests and turn
//! timeouts, while the persistence and event log workers run on their own
//! schedules without ever blocking a battle.

mod event_log;
mod persistence;
mod recovery;
mod session;
mod timer;

pub(crate) use event_log::EventLogWorker;
pub use persistence::CycleReport;
pub(crate) use persistence::{PersistenceHandle, PersistenceWorker};
pub(crate) use recovery::recover_sessions;
pub use session::Dispatch;
pub(crate) use session::{SessionContext, SessionHandle};
