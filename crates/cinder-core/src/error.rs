//! # Cinder Error Handling
//!
//! Unified error types for the controller stack.
//!
//! Error handling follows these principles:
//! - Errors are typed and categorized
//! - Every error is local and recoverable; the control loop never halts
//! - Diagnostic reasons are observability output, never control flow

use core::fmt;

// =============================================================================
// RESULT TYPE
// =============================================================================

/// Cinder Result type alias
pub type Result<T> = core::result::Result<T, Error>;

// =============================================================================
// ERROR ENUM
// =============================================================================

/// Cinder unified error type
///
/// Covers all error conditions across the controller. None of these is fatal;
/// callers degrade and continue rather than stopping the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    // =========================================================================
    // Generic Errors
    // =========================================================================
    /// Invalid parameter provided
    InvalidParameter,
    /// Referenced consumer is not in the active set
    UnknownConsumer,

    // =========================================================================
    // Budget / Watermark Errors
    // =========================================================================
    /// A watermark tier cannot be satisfied by the current allocation
    ConfigurationInfeasible,
    /// Fixed minimum reservations exceed pool capacity
    PoolExhausted,

    // =========================================================================
    // Sequencer Errors
    // =========================================================================
    /// A bounded refresh-cycle wait did not complete
    WaitTimeout,

    // =========================================================================
    // Governor Errors
    // =========================================================================
    /// Externally supplied soft limits had min > max
    InvalidSoftLimit,
    /// Operation requires the governor to be enabled
    GovernorDisabled,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidParameter => write!(f, "invalid parameter"),
            Self::UnknownConsumer => write!(f, "unknown consumer"),
            Self::ConfigurationInfeasible => write!(f, "configuration infeasible"),
            Self::PoolExhausted => write!(f, "buffer pool exhausted"),
            Self::WaitTimeout => write!(f, "refresh-cycle wait timed out"),
            Self::InvalidSoftLimit => write!(f, "invalid soft frequency limit"),
            Self::GovernorDisabled => write!(f, "governor disabled"),
        }
    }
}

// =============================================================================
// DIAGNOSTIC REASONS
// =============================================================================

/// Reason code attached when a tier, plane or feature is degraded.
///
/// Exposed for observability only. Nothing in the controller branches on a
/// recorded reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum DiagReason {
    /// Consumer has no visible output
    NoOutput,
    /// Feature restricted to a single active consumer
    MultipleConsumers,
    /// Mode geometry exceeds what the pool can buffer
    ModeTooLarge,
    /// Minimum reservations exceeded the available envelope
    PoolExhausted,
    /// Surface stride is incompatible with the fetch unit
    BadStride,
    /// A bounded reallocation wait expired; correctness risk accepted
    WaitTimeout,
}

impl DiagReason {
    /// Human-readable reason string
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoOutput => "no output",
            Self::MultipleConsumers => "more than one consumer active",
            Self::ModeTooLarge => "mode too large",
            Self::PoolExhausted => "pool exhausted",
            Self::BadStride => "bad stride",
            Self::WaitTimeout => "refresh wait timed out",
        }
    }
}

impl fmt::Display for DiagReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
