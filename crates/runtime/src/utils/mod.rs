//! Small helpers shared by the runtime workers.

pub mod hash;

pub use hash::PersistenceHash;
