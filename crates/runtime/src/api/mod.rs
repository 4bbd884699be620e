//! Public runtime API surface.
//!
//! This module gathers the types exposed to consumers of the runtime crate so
//! other layers can stay focused on orchestration, workers, or infrastructure.

pub mod errors;
pub mod handle;
pub mod messages;
pub(crate) mod registry;
pub mod transport;

pub use errors::{Result, RuntimeError, SessionRequestError};
pub use handle::{NewBattle, RuntimeHandle};
pub use messages::{BattleStateView, ClientMessage, ServerMessage};
pub(crate) use messages::Request;
pub(crate) use registry::SessionRegistry;
pub use transport::{ChannelTransport, Outbound, Transport};
