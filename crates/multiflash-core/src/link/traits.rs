//! Debug link trait definitions
//!
//! These traits use `maybe_async` to support both sync and async modes.
//! - By default, traits are async (suitable for Embassy or other executors)
//! - With the `is_sync` feature, traits become synchronous

use core::fmt;

use maybe_async::maybe_async;

use crate::fuse::UserRow;

/// Size of one programming block in bytes
///
/// The target's auto-incrementing write protocol requires block-aligned
/// writes of exactly this size. Do not change it without re-checking the
/// target's write semantics.
pub const BLOCK_SIZE: usize = 256;

/// Maximum length of a queued link diagnostic message
pub const DIAGNOSTIC_LEN: usize = 64;

/// A human-readable message queued by the link outside of a call result
pub type Diagnostic = heapless::String<DIAGNOSTIC_LEN>;

/// Result type for debug link operations
pub type LinkResult<T> = core::result::Result<T, LinkError>;

/// The link step that was being performed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkOp {
    /// Returning the link to idle
    Reset,
    /// Opening the link
    Connect,
    /// Configuring transfer retries and idle cycles
    ConfigureTransfer,
    /// Configuring the wire protocol
    ConfigureLinkMode,
    /// Line reset of the wire protocol
    ResetLink,
    /// Changing the link clock
    SetClock,
    /// Pulsing the target reset line
    ResetTarget,
    /// Halting the target and preparing it for flash access
    PrepareTarget,
    /// Reading the target identity
    SelectTarget,
    /// Reading the protection row
    ReadProtectionRow,
    /// Writing the protection row
    WriteProtectionRow,
    /// Chip erase
    EraseAll,
    /// Reading one block
    ReadBlock,
    /// Programming one block
    ProgramBlock,
    /// Releasing the target
    Deselect,
    /// Closing the link
    Disconnect,
}

impl fmt::Display for LinkOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Reset => "reset",
            Self::Connect => "connect",
            Self::ConfigureTransfer => "configure transfer",
            Self::ConfigureLinkMode => "configure link mode",
            Self::ResetLink => "reset link",
            Self::SetClock => "set clock",
            Self::ResetTarget => "reset target",
            Self::PrepareTarget => "prepare target",
            Self::SelectTarget => "select target",
            Self::ReadProtectionRow => "read protection row",
            Self::WriteProtectionRow => "write protection row",
            Self::EraseAll => "erase",
            Self::ReadBlock => "read block",
            Self::ProgramBlock => "program block",
            Self::Deselect => "deselect",
            Self::Disconnect => "disconnect",
        };
        f.write_str(s)
    }
}

/// What went wrong on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkFault {
    /// Target did not acknowledge
    NoAck,
    /// Target kept answering WAIT past the retry limit
    Wait,
    /// Target answered FAULT
    Fault,
    /// Parity error in returned data
    Parity,
    /// Response could not be decoded
    InvalidResponse,
    /// Transfer timed out
    Timeout,
    /// The link does not implement this step
    Unsupported,
}

impl fmt::Display for LinkFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NoAck => "no ACK",
            Self::Wait => "WAIT retries exhausted",
            Self::Fault => "FAULT response",
            Self::Parity => "parity error",
            Self::InvalidResponse => "invalid response",
            Self::Timeout => "timeout",
            Self::Unsupported => "not supported",
        };
        f.write_str(s)
    }
}

/// A failed debug link step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LinkError {
    /// Step that failed
    pub op: LinkOp,
    /// Failure reported by the transport
    pub fault: LinkFault,
}

impl LinkError {
    /// Create a new link error
    pub const fn new(op: LinkOp, fault: LinkFault) -> Self {
        Self { op, fault }
    }
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.op, self.fault)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for LinkError {}

/// Transfer retry parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferConfig {
    /// Idle cycles inserted after each transfer
    pub idle_cycles: u8,
    /// Retries on a WAIT response
    pub wait_retry: u16,
    /// Retries on a value-match read
    pub match_retry: u16,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            idle_cycles: 0,
            wait_retry: 128,
            match_retry: 128,
        }
    }
}

/// Debug link trait (sync or async depending on `is_sync` feature)
///
/// This trait represents a transport to one target's debug access port.
/// Implementations perform the electrical and register-level work; the
/// orchestrator only sequences the steps.
///
/// Every fallible step returns a [`LinkError`] naming the step. Some
/// transports also produce messages outside of a call result (e.g. a
/// protocol trace complaining about a malformed response). Those are
/// queued and handed out by [`DebugLink::take_diagnostic`], so they reach
/// whoever currently owns the link instead of a global handler.
#[maybe_async(AFIT)]
pub trait DebugLink {
    /// Return the link to its idle state, dropping any open session
    async fn reset(&mut self) -> LinkResult<()> {
        self.disconnect().await
    }

    /// Open the link
    async fn connect(&mut self) -> LinkResult<()>;

    /// Configure transfer retries and idle cycles
    async fn configure_transfer(&mut self, config: TransferConfig) -> LinkResult<()>;

    /// Configure the wire protocol (turnaround period)
    async fn configure_link_mode(&mut self, turnaround: u8) -> LinkResult<()>;

    /// Issue a line reset on the wire protocol
    async fn reset_link(&mut self) -> LinkResult<()>;

    /// Set the link clock in kHz
    async fn set_clock(&mut self, khz: u32) -> LinkResult<()>;

    /// Pulse the target's hardware reset line
    ///
    /// Pending protection row writes take effect on this reset.
    async fn reset_target_hardware(&mut self) -> LinkResult<()>;

    /// Halt the target and prepare it for flash access
    async fn prepare_target(&mut self) -> LinkResult<()>;

    /// Read the target's identity register
    ///
    /// Returns `None` when nothing answered.
    async fn select_target(&mut self) -> LinkResult<Option<u32>>;

    /// Read the protection (user) row
    async fn read_protection_row(&mut self) -> LinkResult<UserRow>;

    /// Write the protection (user) row
    async fn write_protection_row(&mut self, row: &UserRow) -> LinkResult<()>;

    /// Erase the whole application flash
    ///
    /// Not every link version provides this.
    async fn erase_all(&mut self) -> LinkResult<()> {
        Err(LinkError::new(LinkOp::EraseAll, LinkFault::Unsupported))
    }

    /// Read one block starting at `addr`
    async fn read_block(&mut self, addr: u32, buf: &mut [u8; BLOCK_SIZE]) -> LinkResult<()>;

    /// Program one block starting at `addr`
    async fn program_block(&mut self, addr: u32, data: &[u8; BLOCK_SIZE]) -> LinkResult<()>;

    /// First flash address available for the image
    fn program_start_address(&self) -> u32;

    /// Release the target
    async fn deselect(&mut self) -> LinkResult<()>;

    /// Close the link
    async fn disconnect(&mut self) -> LinkResult<()>;

    /// Take the oldest queued diagnostic message, if any
    fn take_diagnostic(&mut self) -> Option<Diagnostic> {
        None
    }
}

// Blanket impl for boxed links to allow trait objects (sync mode only)
// In async mode, traits with async fn are not object-safe
#[cfg(all(feature = "alloc", feature = "is_sync"))]
impl DebugLink for alloc::boxed::Box<dyn DebugLink + Send> {
    fn reset(&mut self) -> LinkResult<()> {
        (**self).reset()
    }

    fn connect(&mut self) -> LinkResult<()> {
        (**self).connect()
    }

    fn configure_transfer(&mut self, config: TransferConfig) -> LinkResult<()> {
        (**self).configure_transfer(config)
    }

    fn configure_link_mode(&mut self, turnaround: u8) -> LinkResult<()> {
        (**self).configure_link_mode(turnaround)
    }

    fn reset_link(&mut self) -> LinkResult<()> {
        (**self).reset_link()
    }

    fn set_clock(&mut self, khz: u32) -> LinkResult<()> {
        (**self).set_clock(khz)
    }

    fn reset_target_hardware(&mut self) -> LinkResult<()> {
        (**self).reset_target_hardware()
    }

    fn prepare_target(&mut self) -> LinkResult<()> {
        (**self).prepare_target()
    }

    fn select_target(&mut self) -> LinkResult<Option<u32>> {
        (**self).select_target()
    }

    fn read_protection_row(&mut self) -> LinkResult<UserRow> {
        (**self).read_protection_row()
    }

    fn write_protection_row(&mut self, row: &UserRow) -> LinkResult<()> {
        (**self).write_protection_row(row)
    }

    fn erase_all(&mut self) -> LinkResult<()> {
        (**self).erase_all()
    }

    fn read_block(&mut self, addr: u32, buf: &mut [u8; BLOCK_SIZE]) -> LinkResult<()> {
        (**self).read_block(addr, buf)
    }

    fn program_block(&mut self, addr: u32, data: &[u8; BLOCK_SIZE]) -> LinkResult<()> {
        (**self).program_block(addr, data)
    }

    fn program_start_address(&self) -> u32 {
        (**self).program_start_address()
    }

    fn deselect(&mut self) -> LinkResult<()> {
        (**self).deselect()
    }

    fn disconnect(&mut self) -> LinkResult<()> {
        (**self).disconnect()
    }

    fn take_diagnostic(&mut self) -> Option<Diagnostic> {
        (**self).take_diagnostic()
    }
}

/// Information about a link backend
#[derive(Debug, Clone)]
pub struct LinkInfo {
    /// Name of the link backend
    pub name: &'static str,
    /// Alternative names/aliases
    pub aliases: &'static [&'static str],
    /// Description
    pub description: &'static str,
}
