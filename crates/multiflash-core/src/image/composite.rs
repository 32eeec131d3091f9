//! Composite image built from the boot and app segments

use embedded_io::{Error as _, Read};

use super::{ImageError, SegmentFile, SegmentKind};

/// Segment names and sizes, for reporting only
///
/// Absent segments have size 0 and an empty name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImageSummary<'a> {
    /// Boot segment size in bytes
    pub boot_size: u32,
    /// Boot segment file name
    pub boot_name: &'a str,
    /// App segment size in bytes
    pub app_size: u32,
    /// App segment file name
    pub app_name: &'a str,
}

/// Boot segment followed by the optional app segment
///
/// The image owns both file handles; they are closed when the image is
/// dropped or [`CompositeImage::close`] is called.
#[derive(Debug)]
pub struct CompositeImage<F> {
    boot: Option<F>,
    app: Option<F>,
}

impl<F> Default for CompositeImage<F> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<F> CompositeImage<F> {
    /// An image with no segments
    pub const fn empty() -> Self {
        Self {
            boot: None,
            app: None,
        }
    }

    /// Release both segment handles
    pub fn close(&mut self) {
        self.boot = None;
        self.app = None;
    }
}

impl<F: SegmentFile> CompositeImage<F> {
    /// Build an image from already opened segments
    pub fn new(boot: Option<F>, app: Option<F>) -> Self {
        Self { boot, app }
    }

    /// Whether a boot segment is present
    pub fn is_ready(&self) -> bool {
        self.boot.is_some()
    }

    /// Whether an app segment is present
    pub fn has_app(&self) -> bool {
        self.app.is_some()
    }

    /// Sum of the present segment sizes, saturating at `u32::MAX`
    pub fn total_size(&self) -> u32 {
        let boot = self.boot.as_ref().map_or(0, |f| f.size());
        let app = self.app.as_ref().map_or(0, |f| f.size());
        boot.saturating_add(app)
    }

    /// Move both read cursors back to the start of their segment
    pub fn rewind(&mut self) -> Result<(), ImageError> {
        if let Some(boot) = self.boot.as_mut() {
            boot.rewind().map_err(|e| image_error(SegmentKind::Boot, e))?;
        }
        if let Some(app) = self.app.as_mut() {
            app.rewind().map_err(|e| image_error(SegmentKind::App, e))?;
        }
        Ok(())
    }

    /// Fill `buf` with the next bytes of the image
    ///
    /// Reads continue from the boot segment into the app segment within a
    /// single call, so a block spanning the boundary comes back whole.
    /// Returns 0 only when both segments are exhausted (or there is no boot
    /// segment).
    pub fn read_next(&mut self, buf: &mut [u8]) -> Result<usize, ImageError> {
        let Some(boot) = self.boot.as_mut() else {
            return Ok(0);
        };

        let mut filled = fill(boot, buf).map_err(|e| image_error(SegmentKind::Boot, e))?;
        if filled == buf.len() {
            return Ok(filled);
        }

        if let Some(app) = self.app.as_mut() {
            filled += fill(app, &mut buf[filled..]).map_err(|e| image_error(SegmentKind::App, e))?;
        }

        Ok(filled)
    }

    /// Segment names and sizes
    pub fn describe(&self) -> ImageSummary<'_> {
        let (boot_size, boot_name) = self.boot.as_ref().map_or((0, ""), |f| (f.size(), f.name()));
        let (app_size, app_name) = self.app.as_ref().map_or((0, ""), |f| (f.size(), f.name()));
        ImageSummary {
            boot_size,
            boot_name,
            app_size,
            app_name,
        }
    }
}

fn image_error<E: embedded_io::Error>(segment: SegmentKind, e: E) -> ImageError {
    ImageError {
        segment,
        kind: e.kind(),
    }
}

/// Read until `buf` is full or the file reports end of data
fn fill<R: Read>(file: &mut R, buf: &mut [u8]) -> Result<usize, R::Error> {
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{TestFile, APP, BOOT};

    #[test]
    fn test_total_size() {
        let image = CompositeImage::new(Some(TestFile::new("boot.bin", &BOOT)), None);
        assert_eq!(image.total_size(), 1024);

        let image = CompositeImage::new(
            Some(TestFile::new("boot.bin", &BOOT)),
            Some(TestFile::new("app.bin", &APP)),
        );
        assert_eq!(image.total_size(), 1536);
        assert_eq!(CompositeImage::<TestFile>::empty().total_size(), 0);
    }

    #[test]
    fn test_total_size_saturates() {
        let image = CompositeImage::new(
            Some(TestFile::new("boot.bin", &BOOT).with_size(0xC000_0000)),
            Some(TestFile::new("app.bin", &APP).with_size(0xC000_0000)),
        );
        assert_eq!(image.total_size(), u32::MAX);
    }
}
