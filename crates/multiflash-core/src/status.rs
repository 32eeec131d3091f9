//! Status reporting
//!
//! Everything the programmer has to tell the user goes through a
//! [`StatusSink`]: the console, a small display, LEDs. Sinks only consume
//! events; no decision logic lives there. Several sinks can be attached at
//! once through [`SinkList`].

use core::fmt::{self, Write as _};

use crate::image::{CompositeImage, DiscoveryReport, ImageSummary, SegmentFile};

/// Capacity of the formatting buffer used by [`StatusSinkExt`]
pub const STATUS_LINE_LEN: usize = 128;

/// Phase reported with progress events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Blocks are being compared and written
    Programming,
    /// Blocks are being read back and compared
    Verifying,
    /// Attempt finished successfully
    Complete,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Programming => write!(f, "programming"),
            Self::Verifying => write!(f, "verifying"),
            Self::Complete => write!(f, "complete"),
        }
    }
}

/// Receiver of status events
///
/// All methods default to doing nothing, so a sink only implements what it
/// can show.
pub trait StatusSink {
    /// An attempt has started; `label` names it
    fn on_start(&mut self, _label: &str) {}

    /// Informational status line
    fn on_status(&mut self, _text: &str) {}

    /// Error line
    fn on_error(&mut self, _text: &str) {}

    /// Clear any status shown so far
    fn on_clear(&mut self) {}

    /// Result of a discovery pass
    fn on_images_discovered(&mut self, _images: &ImageSummary<'_>) {}

    /// Progress of the current phase
    fn on_progress(&mut self, _phase: Phase, _done: u32, _total: u32) {}
}

impl<S: StatusSink + ?Sized> StatusSink for &mut S {
    fn on_start(&mut self, label: &str) {
        (**self).on_start(label)
    }

    fn on_status(&mut self, text: &str) {
        (**self).on_status(text)
    }

    fn on_error(&mut self, text: &str) {
        (**self).on_error(text)
    }

    fn on_clear(&mut self) {
        (**self).on_clear()
    }

    fn on_images_discovered(&mut self, images: &ImageSummary<'_>) {
        (**self).on_images_discovered(images)
    }

    fn on_progress(&mut self, phase: Phase, done: u32, total: u32) {
        (**self).on_progress(phase, done, total)
    }
}

/// Formatted variants of the text events
///
/// Lines longer than [`STATUS_LINE_LEN`] are cut short at the last
/// formatting fragment that still fit.
pub trait StatusSinkExt: StatusSink {
    /// [`StatusSink::on_start`] with format arguments
    fn start_fmt(&mut self, args: fmt::Arguments<'_>) {
        self.on_start(&format_line(args));
    }

    /// [`StatusSink::on_status`] with format arguments
    fn status_fmt(&mut self, args: fmt::Arguments<'_>) {
        self.on_status(&format_line(args));
    }

    /// [`StatusSink::on_error`] with format arguments
    fn error_fmt(&mut self, args: fmt::Arguments<'_>) {
        self.on_error(&format_line(args));
    }
}

impl<S: StatusSink + ?Sized> StatusSinkExt for S {}

fn format_line(args: fmt::Arguments<'_>) -> heapless::String<STATUS_LINE_LEN> {
    let mut line = heapless::String::new();
    // Overflowing fragments are dropped
    let _ = line.write_fmt(args);
    line
}

/// Forwards status events to the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl StatusSink for LogSink {
    fn on_start(&mut self, label: &str) {
        log::info!("{}", label);
    }

    fn on_status(&mut self, text: &str) {
        log::info!("{}", text);
    }

    fn on_error(&mut self, text: &str) {
        log::error!("{}", text);
    }

    fn on_images_discovered(&mut self, images: &ImageSummary<'_>) {
        log::info!(
            "boot: {}k {}, app: {}k {}",
            size_in_k(images.boot_size),
            images.boot_name,
            size_in_k(images.app_size),
            images.app_name
        );
    }

    fn on_progress(&mut self, phase: Phase, done: u32, total: u32) {
        log::trace!("{}: {}/{}", phase, done, total);
    }
}

/// A sink that drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl StatusSink for NullSink {}

/// Fans every event out to an ordered list of sinks
#[cfg(feature = "alloc")]
#[derive(Default)]
pub struct SinkList<'a> {
    sinks: alloc::vec::Vec<&'a mut dyn StatusSink>,
}

#[cfg(feature = "alloc")]
impl<'a> SinkList<'a> {
    /// Create an empty list
    pub fn new() -> Self {
        Self {
            sinks: alloc::vec::Vec::new(),
        }
    }

    /// Attach a sink; it receives events after the ones already attached
    pub fn push(&mut self, sink: &'a mut dyn StatusSink) {
        self.sinks.push(sink);
    }

    /// Number of attached sinks
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Whether no sink is attached
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[cfg(feature = "alloc")]
impl StatusSink for SinkList<'_> {
    fn on_start(&mut self, label: &str) {
        self.sinks.iter_mut().for_each(|s| s.on_start(label));
    }

    fn on_status(&mut self, text: &str) {
        self.sinks.iter_mut().for_each(|s| s.on_status(text));
    }

    fn on_error(&mut self, text: &str) {
        self.sinks.iter_mut().for_each(|s| s.on_error(text));
    }

    fn on_clear(&mut self) {
        self.sinks.iter_mut().for_each(|s| s.on_clear());
    }

    fn on_images_discovered(&mut self, images: &ImageSummary<'_>) {
        self.sinks
            .iter_mut()
            .for_each(|s| s.on_images_discovered(images));
    }

    fn on_progress(&mut self, phase: Phase, done: u32, total: u32) {
        self.sinks
            .iter_mut()
            .for_each(|s| s.on_progress(phase, done, total));
    }
}

/// Size in KiB, rounded up
pub const fn size_in_k(bytes: u32) -> u32 {
    bytes.div_ceil(1024)
}

/// Report a discovery pass: clear, then one error per diagnostic, then the
/// image summary
pub fn announce_discovery<S, F>(sink: &mut S, image: &CompositeImage<F>, report: DiscoveryReport)
where
    S: StatusSink + ?Sized,
    F: SegmentFile,
{
    sink.on_clear();
    for msg in report.messages() {
        sink.on_error(msg);
    }
    sink.on_images_discovered(&image.describe());
}
