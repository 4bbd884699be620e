//! Runtime orchestration for turn-based tactical battles.
//!
//! This crate hosts live battle sessions on top of the pure rules in
//! `battle-core`. Each session runs in its own worker task that serializes
//! client requests and turn timeouts; narration is delivered per participant
//! through a [`Transport`], and a persistence worker periodically writes live
//! sessions to a [`BattleStore`] so they survive a restart.
//!
//! Modules are organized by responsibility:
//! - [`runtime`] hosts the orchestrator and builder
//! - [`api`] exposes the types downstream clients interact with
//! - [`events`] narrates engine effects and routes them by context
//! - [`repository`] provides durable storage adapters
//! - [`config`] collects tunables and their environment overrides
//! - [`workers`] keeps background tasks internal to the crate
pub mod api;
pub mod config;
pub mod events;
pub mod repository;
pub mod runtime;
pub mod utils;

mod workers;

pub use api::{
    BattleStateView, ChannelTransport, ClientMessage, NewBattle, Outbound, Result, RuntimeError,
    RuntimeHandle, ServerMessage, SessionRequestError, Transport,
};
pub use config::{RetentionPolicy, RuntimeConfig};
pub use events::{
    CombatEvent, EventBus, EventContext, EventPayload, EventSeverity, Party, Topic, VisibilitySet,
};
pub use repository::{
    BattleStore, EventLogRepository, FileBattleStore, FileEventLog, InMemoryBattleStore,
    InMemoryEventLog, RepositoryError, StoredSession,
};
pub use runtime::{Runtime, RuntimeBuilder};
pub use utils::PersistenceHash;
pub use workers::{CycleReport, Dispatch};
