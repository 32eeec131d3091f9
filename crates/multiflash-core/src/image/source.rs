//! Root directory discovery

use bitflags::bitflags;

use super::{CompositeImage, SegmentFile, SegmentKind, Volume};

bitflags! {
    /// Outcome of one discovery pass
    ///
    /// Duplicate matches are warnings: the first file encountered for a
    /// prefix is kept and programming may go ahead with it. A missing boot
    /// file or a failed root scan blocks readiness.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DiscoveryReport: u8 {
        /// A boot segment was found
        const BOOT_FOUND       = 1 << 0;
        /// An app segment was found
        const APP_FOUND        = 1 << 1;
        /// More than one file matched `boot*.bin`
        const DUPLICATE_BOOT   = 1 << 2;
        /// More than one file matched `app*.bin`
        const DUPLICATE_APP    = 1 << 3;
        /// Root directory traversal failed
        const ROOT_SCAN_FAILED = 1 << 4;
    }
}

impl DiscoveryReport {
    /// Whether the pass produced a programmable image
    pub fn is_ready(&self) -> bool {
        self.contains(Self::BOOT_FOUND) && !self.contains(Self::ROOT_SCAN_FAILED)
    }

    /// Whether any duplicate match was seen
    pub fn is_ambiguous(&self) -> bool {
        self.intersects(Self::DUPLICATE_BOOT | Self::DUPLICATE_APP)
    }

    /// Human-readable diagnostics, warnings first
    pub fn messages(&self) -> impl Iterator<Item = &'static str> + '_ {
        [
            (self.contains(Self::DUPLICATE_BOOT), "multiple boot .bin files found"),
            (self.contains(Self::DUPLICATE_APP), "multiple app .bin files found"),
            (self.contains(Self::ROOT_SCAN_FAILED), "root directory scan failed"),
            (!self.contains(Self::BOOT_FOUND), "no boot .bin file found"),
        ]
        .into_iter()
        .filter_map(|(hit, msg)| hit.then_some(msg))
    }
}

/// A successful discovery pass
#[derive(Debug)]
pub struct Discovery<F> {
    /// The assembled image (may lack a boot segment)
    pub image: CompositeImage<F>,
    /// Diagnostics gathered while scanning
    pub report: DiscoveryReport,
}

/// Scan the volume root for `boot*.bin` and `app*.bin`
///
/// Returns `Err` only when the root traversal itself failed; any files
/// opened before the failure are closed again.
pub fn discover<V: Volume>(volume: &mut V) -> Result<Discovery<V::File>, DiscoveryReport> {
    let mut boot: Option<V::File> = None;
    let mut app: Option<V::File> = None;
    let mut report = DiscoveryReport::empty();

    let scan = volume.for_each_root_file(&mut |file| {
        let (slot, found, duplicate) = match SegmentKind::classify(file.name()) {
            Some(SegmentKind::Boot) => (
                &mut boot,
                DiscoveryReport::BOOT_FOUND,
                DiscoveryReport::DUPLICATE_BOOT,
            ),
            Some(SegmentKind::App) => (
                &mut app,
                DiscoveryReport::APP_FOUND,
                DiscoveryReport::DUPLICATE_APP,
            ),
            None => return,
        };

        if slot.is_none() {
            log::debug!("Found {} ({} bytes)", file.name(), file.size());
            *slot = Some(file);
            report |= found;
        } else {
            log::warn!("Ignoring extra image file {}", file.name());
            report |= duplicate;
        }
    });

    if scan.is_err() {
        log::error!("Root directory scan failed");
        return Err(report | DiscoveryReport::ROOT_SCAN_FAILED);
    }

    Ok(Discovery {
        image: CompositeImage::new(boot, app),
        report,
    })
}

/// Keeps the volume and the image from the latest discovery pass
pub struct ImageSource<V: Volume> {
    volume: V,
    image: CompositeImage<V::File>,
    report: DiscoveryReport,
}

impl<V: Volume> ImageSource<V> {
    /// Create a source with no image; call [`ImageSource::rescan`] to fill it
    pub fn new(volume: V) -> Self {
        Self {
            volume,
            image: CompositeImage::empty(),
            report: DiscoveryReport::empty(),
        }
    }

    /// Close the current segments and scan the volume again
    pub fn rescan(&mut self) -> DiscoveryReport {
        self.image.close();

        self.report = match discover(&mut self.volume) {
            Ok(Discovery { image, report }) => {
                self.image = image;
                report
            }
            Err(report) => report,
        };

        self.report
    }

    /// Report from the latest pass
    pub fn report(&self) -> DiscoveryReport {
        self.report
    }

    /// Current image
    pub fn image(&self) -> &CompositeImage<V::File> {
        &self.image
    }

    /// Current image, mutable for reading
    pub fn image_mut(&mut self) -> &mut CompositeImage<V::File> {
        &mut self.image
    }

    /// Underlying volume
    pub fn volume_mut(&mut self) -> &mut V {
        &mut self.volume
    }
}

#[cfg(test)]
mod tests {
    use super::super::ImageError;
    use super::*;
    use crate::testutil::{TestVolume, APP, BOOT, OTHER};
    use embedded_io::ErrorKind;

    #[test]
    fn test_discover_boot_and_app() {
        let mut vol = TestVolume::new(&[
            ("README.TXT", &OTHER),
            ("app_v1.bin", &APP),
            ("Boot.BIN", &BOOT),
        ]);
        let found = discover(&mut vol).unwrap();

        assert!(found.report.is_ready());
        assert!(!found.report.is_ambiguous());
        assert_eq!(found.report.messages().count(), 0);
        assert!(found.image.is_ready());
        assert_eq!(found.image.total_size(), 1536);

        let summary = found.image.describe();
        assert_eq!(summary.boot_size, 1024);
        assert_eq!(summary.boot_name, "Boot.BIN");
        assert_eq!(summary.app_size, 512);
        assert_eq!(summary.app_name, "app_v1.bin");
    }

    #[test]
    fn test_no_boot_file() {
        let mut vol = TestVolume::new(&[("app.bin", &APP), ("bootloader.hex", &OTHER)]);
        let found = discover(&mut vol).unwrap();

        assert!(!found.image.is_ready());
        assert!(!found.report.is_ready());
        assert!(found.report.contains(DiscoveryReport::APP_FOUND));
        let msgs: [&str; 1] = [found.report.messages().next().unwrap()];
        assert_eq!(msgs, ["no boot .bin file found"]);
        assert_eq!(found.image.describe().boot_name, "");
        assert_eq!(found.image.describe().boot_size, 0);
    }

    #[test]
    fn test_duplicates_keep_first() {
        let mut vol = TestVolume::new(&[
            ("boot_a.bin", &BOOT),
            ("boot_b.bin", &OTHER),
            ("app1.bin", &APP),
            ("APP2.bin", &OTHER),
        ]);
        let found = discover(&mut vol).unwrap();

        assert!(found.report.is_ready());
        assert!(found.report.is_ambiguous());
        assert!(found
            .report
            .contains(DiscoveryReport::DUPLICATE_BOOT | DiscoveryReport::DUPLICATE_APP));
        assert_eq!(found.image.describe().boot_name, "boot_a.bin");
        assert_eq!(found.image.describe().app_name, "app1.bin");
        assert_eq!(found.report.messages().count(), 2);
    }

    #[test]
    fn test_root_scan_failure_is_fatal() {
        let mut vol = TestVolume::new(&[("boot.bin", &BOOT), ("app.bin", &APP)]);
        vol.fail_after = Some(1);

        let report = discover(&mut vol).unwrap_err();
        assert!(report.contains(DiscoveryReport::ROOT_SCAN_FAILED));
        assert!(!report.is_ready());
        assert!(report.messages().any(|m| m == "root directory scan failed"));
    }

    #[test]
    fn test_cross_segment_read() {
        let mut vol = TestVolume::new(&[("boot.bin", &BOOT), ("app.bin", &APP)]);
        let mut image = discover(&mut vol).unwrap().image;

        let mut skip = [0u8; 1000];
        assert_eq!(image.read_next(&mut skip).unwrap(), 1000);

        let mut buf = [0u8; 300];
        assert_eq!(image.read_next(&mut buf).unwrap(), 300);
        assert_eq!(&buf[..24], &BOOT[1000..]);
        assert_eq!(&buf[24..], &APP[..276]);
    }

    #[test]
    fn test_rewind_reproduces_stream() {
        let mut vol = TestVolume::new(&[("boot.bin", &BOOT), ("app.bin", &APP)]);
        let mut image = discover(&mut vol).unwrap().image;

        let mut first = [0u8; 1536];
        let mut second = [0u8; 1536];
        for out in [&mut first, &mut second] {
            image.rewind().unwrap();
            let mut off = 0;
            loop {
                let mut block = [0u8; 256];
                let n = image.read_next(&mut block).unwrap();
                if n == 0 {
                    break;
                }
                out[off..off + n].copy_from_slice(&block[..n]);
                off += n;
            }
            assert_eq!(off, 1536);
        }

        assert_eq!(first, second);
        assert_eq!(&first[..1024], &BOOT[..]);
        assert_eq!(&first[1024..], &APP[..]);
    }

    #[test]
    fn test_boot_only_image() {
        let mut vol = TestVolume::new(&[("boot.bin", &OTHER)]);
        let mut image = discover(&mut vol).unwrap().image;
        assert!(!image.has_app());

        let mut buf = [0u8; 64];
        assert_eq!(image.read_next(&mut buf).unwrap(), 16);
        assert_eq!(image.read_next(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_read_error_names_segment() {
        let mut vol = TestVolume::new(&[("boot.bin", &OTHER), ("app.bin", &APP)]);
        vol.fail_read = Some("app.bin");
        let mut image = discover(&mut vol).unwrap().image;

        let mut buf = [0u8; 64];
        let err = image.read_next(&mut buf).unwrap_err();
        assert_eq!(
            err,
            ImageError {
                segment: SegmentKind::App,
                kind: ErrorKind::Other
            }
        );
    }

    #[test]
    fn test_rescan_replaces_image() {
        let mut source = ImageSource::new(TestVolume::new(&[("boot.bin", &BOOT)]));
        assert!(!source.image().is_ready());

        assert!(source.rescan().is_ready());
        assert_eq!(source.image().total_size(), 1024);

        source.volume_mut().files = &[("app.bin", &APP)];
        let report = source.rescan();
        assert!(!report.is_ready());
        assert_eq!(source.report(), report);
        assert!(!source.image().is_ready());
        assert_eq!(source.image().total_size(), 0);
    }
}
