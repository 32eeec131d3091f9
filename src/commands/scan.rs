//! One discovery pass

use multiflash_core::status::{announce_discovery, StatusSink, StatusSinkExt};
use std::path::Path;

use super::open_source;

/// Scan the volume and report the images found
pub fn run_scan(volume: &Path, sink: &mut dyn StatusSink) -> Result<(), Box<dyn std::error::Error>> {
    let mut source = open_source(volume)?;
    let report = source.rescan();
    announce_discovery(&mut *sink, source.image(), report);

    if report.is_ready() {
        sink.status_fmt(format_args!(
            "ready: {} bytes",
            source.image().total_size()
        ));
    }
    Ok(())
}
