//! Target device types and database
//!
//! This module describes the targets the programmer knows how to flash,
//! keyed by the value of their device identity register.

mod database;

pub use database::*;

/// A supported target device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetDevice {
    /// Device identity with the revision field cleared
    pub device_id: u32,
    /// Marketing name
    pub name: &'static str,
    /// Application flash size in bytes
    pub flash_size: u32,
}

impl TargetDevice {
    /// Flash size in KiB, rounded up
    pub fn flash_size_kib(&self) -> u32 {
        crate::status::size_in_k(self.flash_size)
    }
}
