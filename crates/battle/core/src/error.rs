//! Common error infrastructure for battle-core.
//!
//! Rejected player input is never an error: it is logged and dropped by the
//! state that received it. The types here cover the two places where a caller
//! must be told something went wrong: the presentation barrier, and the state
//! machine driver.
//!
//! # Design Principles
//!
//! - **Severity Classification**: every error reports an [`ErrorSeverity`]
//! - **Poisoning**: a [`ErrorSeverity::Fatal`] machine error halts the machine
//! - **No negative counts**: double releases are warnings, never underflow

use crate::barrier::{BatchHandle, OperationHandle};
use crate::machine::TurnPhase;

/// Severity level of an error, used for categorization and recovery strategies.
///
/// - **Recoverable**: the call was dropped, state is untouched
/// - **Validation**: the caller referenced something that does not exist
/// - **Internal**: unexpected inconsistency worth investigating
/// - **Fatal**: the state graph itself is malformed, the machine halts
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorSeverity {
    Recoverable,
    Validation,
    Internal,
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
        matches!(self, Self::Recoverable | Self::Validation)
    }

    /// Returns true if this error indicates an internal bug.
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal | Self::Fatal)
    }
}

/// Errors surfaced by [`crate::barrier::PresentationBarrier`].
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum BarrierError {
    #[error("batch {batch} not found")]
    BatchNotFound { batch: BatchHandle },

    #[error("operation {operation} not found (already completed?)")]
    OperationNotFound { operation: OperationHandle },

    #[error("the default batch never ends")]
    DefaultBatchCannotEnd,
}

impl BarrierError {
    pub const fn severity(&self) -> ErrorSeverity {
        match self {
            Self::OperationNotFound { .. } => ErrorSeverity::Recoverable,
            Self::BatchNotFound { .. } | Self::DefaultBatchCannotEnd => ErrorSeverity::Validation,
        }
    }
}

/// Errors surfaced by [`crate::machine::TurnStateMachine`].
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum MachineError {
    #[error("no state registered for current phase {phase}")]
    NoCurrentState { phase: TurnPhase },

    #[error("state {from} requested unregistered state {to}; staying in {from}")]
    UnregisteredState { from: TurnPhase, to: TurnPhase },

    #[error("transition cap of {cap} exceeded while in {phase}: free states form a cycle")]
    TransitionCapExceeded { cap: usize, phase: TurnPhase },

    #[error("state machine halted after a fatal error")]
    Halted,
}

impl MachineError {
    pub const fn severity(&self) -> ErrorSeverity {
        match self {
            Self::UnregisteredState { .. } => ErrorSeverity::Recoverable,
            Self::NoCurrentState { .. } | Self::TransitionCapExceeded { .. } | Self::Halted => {
                ErrorSeverity::Fatal
            }
        }
    }

    pub const fn is_fatal(&self) -> bool {
        matches!(self.severity(), ErrorSeverity::Fatal)
    }
}
