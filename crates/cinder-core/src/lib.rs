//! # Cinder Core
//!
//! Foundational types for the display engine power & bandwidth controller.
//!
//! This crate carries everything the concern crates share:
//!
//! - Strong typing for pool blocks, consumers, planes and frequency tiers
//! - The unified error enum and diagnostic reason codes
//! - The `HardwareProfile` capability object, selected once at init
//!
//! ## Design Principles
//!
//! 1. **No Hidden State**: everything is a value passed to an operation
//! 2. **Profile, Not Branches**: hardware differences live in one capability
//!    object, never in per-call revision checks
//! 3. **No Panics**: fallible paths return `Result`, degraded paths return
//!    diagnostics

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::new_without_default)]

#[cfg(feature = "std")]
extern crate std;

// =============================================================================
// MODULE EXPORTS
// =============================================================================

pub mod consumer;
pub mod error;
pub mod profile;
pub mod types;

// Re-exports for convenience
pub use consumer::{Consumer, Plane, PlaneClass, Rotation, SlotKind, TileMode};
pub use error::{DiagReason, Error, Result};
pub use profile::{FreqCurve, HardwareProfile};
pub use types::*;
