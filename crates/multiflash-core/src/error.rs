//! Error types for multiflash-core
//!
//! Every failure of a programming attempt maps onto one of these variants.
//! All of them are attempt-fatal; the only local recovery is the single
//! unlock retry performed while negotiating protection bits.

use core::fmt;

use crate::image::ImageError;
use crate::link::LinkError;

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // Readiness
    /// No boot segment is present, so there is nothing to program
    NoBootImage,

    // Target errors
    /// Nothing answered on the debug link
    NoTarget,
    /// A device answered but its identity is not in the target table
    UnknownDevice(u32),

    // Link errors
    /// A debug link step failed
    Link(LinkError),

    // Protection errors
    /// Protection bits were still set after the unlock write and reset
    UnprotectFailed,

    // Data errors
    /// Reading the composite image failed
    ImageRead(ImageError),
    /// The image does not fit between the program start and end of flash
    ImageTooLarge {
        /// Composite image size in bytes
        size: u32,
        /// Bytes available on the target from the program start
        capacity: u32,
    },
    /// Read-back data differs from the image
    VerifyMismatch {
        /// Address of the first mismatching block
        addr: u32,
    },
}

impl Error {
    /// Short stable tag for the error class
    pub fn tag(&self) -> &'static str {
        match self {
            Self::NoBootImage => "no-boot-image",
            Self::NoTarget => "no-target",
            Self::UnknownDevice(_) => "unknown-device",
            Self::Link(_) => "link-transfer-failure",
            Self::UnprotectFailed => "unprotect-failed",
            Self::ImageRead(_) => "image-read-error",
            Self::ImageTooLarge { .. } => "image-too-large",
            Self::VerifyMismatch { .. } => "verify-mismatch",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoBootImage => write!(f, "no boot .bin file found"),
            Self::NoTarget => write!(f, "No target device connected"),
            Self::UnknownDevice(id) => write!(f, "Unknown device 0x{:x}", id),
            Self::Link(e) => write!(f, "link error: {}", e),
            Self::UnprotectFailed => write!(f, "unprotection failed"),
            Self::ImageRead(e) => write!(f, "{}", e),
            Self::ImageTooLarge { size, capacity } => write!(
                f,
                "image too large: {} bytes, target has {} bytes",
                size, capacity
            ),
            Self::VerifyMismatch { addr } => write!(f, "mismatch @{:08x}", addr),
        }
    }
}

impl From<LinkError> for Error {
    fn from(e: LinkError) -> Self {
        Self::Link(e)
    }
}

impl From<ImageError> for Error {
    fn from(e: ImageError) -> Self {
        Self::ImageRead(e)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
