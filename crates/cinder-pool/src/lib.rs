//! # Cinder Pool
//!
//! The buffer-pool side of the controller: deciding how much of the shared
//! display buffer each consumer needs (watermarks), carving the pool between
//! consumers (budget), and migrating live consumers between carvings without
//! letting anyone read space it no longer owns (sequencer).
//!
//! ## Architecture
//!
//! ```text
//! geometry/timing ──► watermark ──► per-tier occupancy floors
//!                        │
//! active set ──────► budget ─────► AllocationTable
//!                        │
//! old + new table ──► sequencer ─► ordered latches over CommitSink
//! ```
//!
//! Everything here is pure computation over a [`HardwareProfile`] except the
//! sequencer, which drives the register layer through the [`CommitSink`]
//! seam.
//!
//! [`HardwareProfile`]: cinder_core::HardwareProfile
//! [`CommitSink`]: sequencer::CommitSink

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod budget;
pub mod sequencer;
pub mod watermark;

// Re-exports
pub use budget::{allocate, AllocationTable, ConsumerAllocation, SlotAllocation, MAX_SLOTS};
pub use sequencer::{commit, CommitClass, CommitReport, CommitSink};
pub use watermark::{
    compute_level, compute_slot, line_time_eighths_us, SlotWatermarks, WatermarkLevel,
};
