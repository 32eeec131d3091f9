//! Orchestrator settings

use crate::fuse::BootProt;
use crate::link::TransferConfig;

/// Link and programming parameters for one attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "std",
    derive(serde::Serialize, serde::Deserialize),
    serde(default, deny_unknown_fields)
)]
pub struct FlashConfig {
    /// Link clock in kHz
    pub clock_khz: u32,
    /// Idle cycles after each transfer
    pub idle_cycles: u8,
    /// Retries on a WAIT response
    pub wait_retry: u16,
    /// Retries on a value-match read
    pub match_retry: u16,
    /// Wire protocol turnaround period
    pub turnaround: u8,
    /// Issue a chip erase before programming
    pub erase_before_program: bool,
    /// Re-protect the boot region after a successful verify
    pub protect_after: bool,
    /// Boot-protect code written when re-protecting
    pub protect_level: BootProt,
}

impl Default for FlashConfig {
    fn default() -> Self {
        let transfer = TransferConfig::default();
        Self {
            clock_khz: 50,
            idle_cycles: transfer.idle_cycles,
            wait_retry: transfer.wait_retry,
            match_retry: transfer.match_retry,
            turnaround: 0,
            erase_before_program: false,
            protect_after: true,
            protect_level: BootProt::NARROWEST,
        }
    }
}

impl FlashConfig {
    /// Transfer parameters passed to the link
    pub fn transfer(&self) -> TransferConfig {
        TransferConfig {
            idle_cycles: self.idle_cycles,
            wait_retry: self.wait_retry,
            match_retry: self.match_retry,
        }
    }
}
