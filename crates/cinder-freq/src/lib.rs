//! # Cinder Freq
//!
//! The power side of the controller: a closed-loop governor that turns
//! periodic utilization samples into discrete frequency-tier requests, plus
//! the idle and deep-idle paths.
//!
//! The governor is deliberately conservative: each bias mode pairs an eager
//! "up" window with a reluctant "down" window, and demotion only happens on
//! a falling request, so bursty load cannot make the tier oscillate.
//!
//! Soft limits are externally mutable at any time; every request is clamped
//! before it is issued, without exception.

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]

#[cfg(feature = "std")]
extern crate std;

pub mod governor;
pub mod idle;

// Re-exports
pub use governor::{BiasMode, Governor, GovernorStats, HysteresisWindow, Teardown};
pub use idle::{DeepIdleGate, IdleVeto};
