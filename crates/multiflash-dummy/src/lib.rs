//! multiflash-dummy - Emulated target and volume for testing
//!
//! [`DummyTarget`] stands in for a SAM D21 behind a debug link: it keeps a
//! flash array and a user row, applies row writes on the next reset and
//! refuses to program protected or locked flash. Faults and read-back
//! corruption can be injected to exercise the orchestrator's error paths.
//!
//! [`MemVolume`] is an in-memory root directory for image discovery.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod target;
mod volume;

pub use target::{DummyConfig, DummyStats, DummyTarget};
#[cfg(feature = "std")]
pub use target::parse_options;
pub use volume::{MemFile, MemIoError, MemVolume};
