//! Common error infrastructure for battle-core.
//!
//! Domain-specific errors (`ActionError`, `TurnError`, `SetupError`) live in
//! [`crate::engine`] next to the transitions they guard. This module holds the
//! classification shared by all of them.

/// Severity level of an error, used for categorization and recovery strategies.
///
/// - **Recoverable**: the same request may succeed later (budget refilled, turn comes round)
/// - **Validation**: the request is malformed for the current state and should not be retried
/// - **Internal**: unexpected state inconsistency, worth investigating
/// - **Fatal**: the session cannot continue
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorSeverity {
    /// Recoverable error - can retry later or with an alternative action.
    ///
    /// Examples: not your turn, no actions left
    Recoverable,

    /// Validation error - invalid input, should not retry without changes.
    ///
    /// Examples: unit not found, target out of range
    Validation,

    /// Internal error - unexpected state inconsistency.
    Internal,

    /// Fatal error - session state cannot be used any more.
    Fatal,
}

impl ErrorSeverity {
    /// Returns a human-readable description of this severity level.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Recoverable => "recoverable",
            Self::Validation => "validation",
            Self::Internal => "internal",
            Self::Fatal => "fatal",
        }
    }

    /// Returns true if this error is potentially recoverable.
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Recoverable)
    }

    /// Returns true if this error indicates an internal bug.
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal | Self::Fatal)
    }
}

/// Common trait for all battle-core errors.
///
/// Provides a uniform interface for classification so the runtime can decide
/// how loudly to log a rejection and which code to put on the wire.
pub trait GameError: core::fmt::Display + core::fmt::Debug {
    /// Returns the severity level of this error.
    fn severity(&self) -> ErrorSeverity;

    /// Returns a static string identifier for this error variant.
    ///
    /// Used as the machine-readable code in rejection messages.
    fn error_code(&self) -> &'static str {
        core::any::type_name::<Self>()
    }
}
