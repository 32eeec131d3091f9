//! One-shot programming

use multiflash_core::flash::{flash_image, FlashConfig};
use multiflash_core::link::DebugLink;
use multiflash_core::status::{announce_discovery, StatusSink};
use multiflash_core::Error;
use std::path::Path;

use super::{open_source, ThreadYield};

/// Scan the volume once, then run one attempt over `link`
///
/// The attempt reports its own failure to `sink`; the returned error only
/// carries the error class. A volume without a boot image is reported by
/// the scan alone and never reaches the link.
pub fn run_flash<L>(
    volume: &Path,
    link: &mut L,
    config: &FlashConfig,
    mut sink: &mut dyn StatusSink,
) -> Result<(), Box<dyn std::error::Error>>
where
    L: DebugLink + ?Sized,
{
    let mut source = open_source(volume)?;
    let report = source.rescan();
    announce_discovery(&mut *sink, source.image(), report);
    if !report.is_ready() {
        return Err(format!("flash failed ({})", Error::NoBootImage.tag()).into());
    }

    flash_image(link, source.image_mut(), &mut sink, &mut ThreadYield, config)
        .map_err(|e| format!("flash failed ({})", e.tag()).into())
}
