//! CLI command implementations
//!
//! `scan` and `flash` do a single pass over the volume. `run` is the
//! long-lived control loop: it watches the volume, rescans once a write
//! burst has settled and programs the target when asked.

mod flash;
mod list;
mod run;
mod scan;

pub use flash::run_flash;
pub use list::{list_links, list_targets};
pub use run::{run_loop, Session};
pub use scan::run_scan;

use multiflash_core::flash::Scheduler;
use multiflash_core::image::ImageSource;
use std::path::Path;

use crate::volume::DirVolume;

/// Yields the host thread between block operations
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadYield;

impl Scheduler for ThreadYield {
    fn yield_now(&mut self) {
        std::thread::yield_now();
    }
}

/// Open the volume directory as an image source
fn open_source(volume: &Path) -> Result<ImageSource<DirVolume>, Box<dyn std::error::Error>> {
    let volume = DirVolume::open(volume)
        .map_err(|e| format!("Failed to open volume {}: {}", volume.display(), e))?;
    Ok(ImageSource::new(volume))
}
