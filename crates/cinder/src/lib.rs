//! # Cinder
//!
//! Display engine power & bandwidth controller.
//!
//! Cinder does three things, and only these three:
//!
//! 1. **Budget**: partition a fixed shared buffer pool between the active
//!    display consumers so none of them starves before a hardware refill
//!    deadline ([`cinder_pool::budget`], [`cinder_pool::watermark`]).
//! 2. **Migrate**: move live consumers between pool partitions in an order
//!    that never lets one fetch from space a neighbour still owns
//!    ([`cinder_pool::sequencer`]).
//! 3. **Govern**: turn utilization samples into frequency-tier and
//!    idle/deep-idle requests through hysteresis bias modes
//!    ([`cinder_freq`]).
//!
//! Composition, register programming, firmware and lifecycle all live
//! elsewhere; they feed this crate geometry, samples and limits, and consume
//! the allocation tables and power requests it emits.
//!
//! The one entry point is [`DisplayController`]: an explicit context object
//! owning its serialization point. There is no process-wide state anywhere
//! in this workspace.

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod controller;

// Re-exports: the facade surface
pub use cinder_core::{
    BlockRange, Consumer, ConsumerId, DiagReason, Error, FreqCurve, FreqTier, HardwareProfile,
    KiloHertz, Plane, PlaneClass, PlaneId, Result, Rotation, SlotKind, TileMode,
    UtilizationSample,
};
pub use cinder_freq::{BiasMode, Governor, IdleVeto, Teardown};
pub use cinder_pool::{AllocationTable, CommitReport, CommitSink, SlotWatermarks, WatermarkLevel};

pub use controller::{ConsumerWatermarks, DisplayController, PowerDecision, PowerState};
