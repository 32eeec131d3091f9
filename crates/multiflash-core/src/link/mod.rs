//! Debug link traits and abstractions
//!
//! This module defines the contract a debug-access-port transport must
//! implement so the orchestrator can drive a target through it.

mod traits;

pub use traits::*;
