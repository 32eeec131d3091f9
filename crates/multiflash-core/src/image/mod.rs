//! Image discovery and the composite boot + app image
//!
//! The programmer's mass-storage volume is scanned (root directory only)
//! for a `boot*.bin` and an optional `app*.bin` file. The two files are
//! exposed as one address-ordered byte stream: boot first, app directly
//! after it.
//!
//! The filesystem itself is external. It is reached through the
//! [`Volume`] and [`SegmentFile`] traits; segment files are plain
//! [`embedded_io`] readers that can seek back to the start.

mod composite;
mod source;

pub use composite::{CompositeImage, ImageSummary};
pub use source::{discover, Discovery, DiscoveryReport, ImageSource};

use core::fmt;

/// An opened image file on the volume
pub trait SegmentFile: embedded_io::Read + embedded_io::Seek {
    /// File name as stored on the volume
    fn name(&self) -> &str;

    /// File size in bytes
    fn size(&self) -> u32;
}

/// Root directory traversal failed part way or could not start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootScanError;

impl fmt::Display for RootScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "root directory scan failed")
    }
}

/// The mounted filesystem holding candidate images
pub trait Volume {
    /// Opened file handle type
    type File: SegmentFile;

    /// Open each regular file in the root directory for reading, in
    /// directory order, and hand it to `visit`
    ///
    /// Entries visited before a traversal error stay visited; the error is
    /// reported once the walk stops.
    fn for_each_root_file(
        &mut self,
        visit: &mut dyn FnMut(Self::File),
    ) -> core::result::Result<(), RootScanError>;
}

/// The two recognised image segments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentKind {
    /// Bootloader, always first in the composite image
    Boot,
    /// Application, placed right after the bootloader
    App,
}

impl SegmentKind {
    /// Lowercase file name prefix for this segment
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Boot => "boot",
            Self::App => "app",
        }
    }

    /// Classify a file name
    ///
    /// A name matches when, ignoring ASCII case, it starts with the segment
    /// prefix and ends with `.bin`. `boot` is checked before `app`.
    pub fn classify(name: &str) -> Option<Self> {
        [Self::Boot, Self::App]
            .into_iter()
            .find(|kind| is_bin_with_prefix(name, kind.prefix()))
    }
}

impl fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

const BIN_SUFFIX: &str = ".bin";

fn is_bin_with_prefix(name: &str, prefix: &str) -> bool {
    let name = name.as_bytes();
    name.len() >= prefix.len()
        && name.len() >= BIN_SUFFIX.len()
        && name[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
        && name[name.len() - BIN_SUFFIX.len()..].eq_ignore_ascii_case(BIN_SUFFIX.as_bytes())
}

/// Reading or rewinding a segment file failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageError {
    /// Segment whose file failed
    pub segment: SegmentKind,
    /// Error class reported by the file
    pub kind: embedded_io::ErrorKind,
}

impl fmt::Display for ImageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "error reading binaries ({}: {:?})", self.segment, self.kind)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ImageError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(SegmentKind::classify("boot.bin"), Some(SegmentKind::Boot));
        assert_eq!(SegmentKind::classify("BOOT-v2.BIN"), Some(SegmentKind::Boot));
        assert_eq!(SegmentKind::classify("App_release.Bin"), Some(SegmentKind::App));
        assert_eq!(SegmentKind::classify("app.bin"), Some(SegmentKind::App));
    }

    #[test]
    fn test_classify_rejects() {
        assert_eq!(SegmentKind::classify("boot.hex"), None);
        assert_eq!(SegmentKind::classify("my_boot.bin"), None);
        assert_eq!(SegmentKind::classify("application.elf"), None);
        assert_eq!(SegmentKind::classify("bin"), None);
        assert_eq!(SegmentKind::classify(""), None);
        // Non-ASCII names must not panic on byte slicing
        assert_eq!(SegmentKind::classify("bö.bin"), None);
        assert_eq!(SegmentKind::classify("bootä.bin"), Some(SegmentKind::Boot));
    }
}
