//! In-memory root directory

use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec::Vec;

use embedded_io::{ErrorKind, ErrorType, Read, Seek, SeekFrom};
use multiflash_core::image::{RootScanError, SegmentFile, Volume};

/// Injected read failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemIoError;

impl embedded_io::Error for MemIoError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

impl core::fmt::Display for MemIoError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "injected read failure")
    }
}

#[derive(Debug, Clone)]
struct Entry {
    name: String,
    data: Arc<[u8]>,
}

/// A flat directory of files held in memory
///
/// Files are visited in insertion order.
#[derive(Debug, Clone, Default)]
pub struct MemVolume {
    entries: Vec<Entry>,
    fail_scan_after: Option<usize>,
    failing_reads: Vec<String>,
}

impl MemVolume {
    /// Create an empty volume
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`MemVolume::insert`]
    pub fn with_file(mut self, name: &str, data: &[u8]) -> Self {
        self.insert(name, data);
        self
    }

    /// Add a file, replacing one with the same name
    pub fn insert(&mut self, name: &str, data: &[u8]) {
        self.remove(name);
        self.entries.push(Entry {
            name: name.to_string(),
            data: Arc::from(data),
        });
    }

    /// Remove a file; returns whether it existed
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.name != name);
        self.entries.len() != before
    }

    /// Number of files in the directory
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the directory is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Make the root traversal fail once `n` entries have been visited
    pub fn fail_scan_after(&mut self, n: usize) {
        self.fail_scan_after = Some(n);
    }

    /// Make every read of the named file fail
    pub fn fail_reads_of(&mut self, name: &str) {
        self.failing_reads.push(name.to_string());
    }
}

impl Volume for MemVolume {
    type File = MemFile;

    fn for_each_root_file(
        &mut self,
        visit: &mut dyn FnMut(MemFile),
    ) -> Result<(), RootScanError> {
        for (i, entry) in self.entries.iter().enumerate() {
            if self.fail_scan_after == Some(i) {
                return Err(RootScanError);
            }
            visit(MemFile {
                name: entry.name.clone(),
                data: Arc::clone(&entry.data),
                pos: 0,
                fail_reads: self.failing_reads.contains(&entry.name),
            });
        }
        Ok(())
    }
}

/// An open file of a [`MemVolume`]
#[derive(Debug, Clone)]
pub struct MemFile {
    name: String,
    data: Arc<[u8]>,
    pos: usize,
    fail_reads: bool,
}

impl ErrorType for MemFile {
    type Error = MemIoError;
}

impl Read for MemFile {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, MemIoError> {
        if self.fail_reads {
            return Err(MemIoError);
        }
        let rest = self.data.get(self.pos..).unwrap_or(&[]);
        let n = rest.len().min(buf.len());
        buf[..n].copy_from_slice(&rest[..n]);
        self.pos += n;
        Ok(n)
    }
}

impl Seek for MemFile {
    fn seek(&mut self, pos: SeekFrom) -> Result<u64, MemIoError> {
        let new = match pos {
            SeekFrom::Start(p) => i64::try_from(p).map_err(|_| MemIoError)?,
            SeekFrom::End(d) => self.data.len() as i64 + d,
            SeekFrom::Current(d) => self.pos as i64 + d,
        };
        if new < 0 {
            return Err(MemIoError);
        }
        self.pos = new as usize;
        Ok(self.pos as u64)
    }
}

impl SegmentFile for MemFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u32 {
        self.data.len() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use multiflash_core::image::{discover, DiscoveryReport, ImageSource, SegmentKind};

    fn bytes(len: usize, seed: u8) -> Vec<u8> {
        (0..len).map(|i| (i as u8).wrapping_mul(31) ^ seed).collect()
    }

    #[test]
    fn test_spanning_read() {
        let boot = bytes(1024, 0x11);
        let app = bytes(512, 0x22);
        let mut vol = MemVolume::new()
            .with_file("boot.bin", &boot)
            .with_file("app.bin", &app);

        let mut image = discover(&mut vol).unwrap().image;
        assert_eq!(image.total_size(), 1536);

        let mut skip = [0u8; 1000];
        assert_eq!(image.read_next(&mut skip).unwrap(), 1000);

        let mut buf = [0u8; 300];
        assert_eq!(image.read_next(&mut buf).unwrap(), 300);
        assert_eq!(&buf[..24], &boot[1000..]);
        assert_eq!(&buf[24..], &app[..276]);
    }

    #[test]
    fn test_seek() {
        let mut vol = MemVolume::new().with_file("boot.bin", b"0123456789");
        let mut file = None;
        vol.for_each_root_file(&mut |f| file = Some(f)).unwrap();
        let mut file = file.unwrap();

        let mut buf = [0u8; 4];
        assert_eq!(file.seek(SeekFrom::End(-3)).unwrap(), 7);
        assert_eq!(file.read(&mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], b"789");
        assert_eq!(file.read(&mut buf).unwrap(), 0);
        assert!(file.seek(SeekFrom::Current(-20)).is_err());
        file.rewind().unwrap();
        assert_eq!(file.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"0123");
    }

    #[test]
    fn test_image_source_follows_edits() {
        let mut source = ImageSource::new(MemVolume::new().with_file("APP.BIN", &[1, 2, 3]));

        let report = source.rescan();
        assert!(!report.is_ready());
        assert!(report.contains(DiscoveryReport::APP_FOUND));

        source.volume_mut().insert("Boot_v3.bin", &[9; 700]);
        let report = source.rescan();
        assert!(report.is_ready());
        let summary = source.image().describe();
        assert_eq!(summary.boot_name, "Boot_v3.bin");
        assert_eq!(summary.boot_size, 700);
        assert_eq!(summary.app_name, "APP.BIN");

        assert!(source.volume_mut().remove("Boot_v3.bin"));
        assert!(!source.rescan().is_ready());
    }

    #[test]
    fn test_read_failure_propagates() {
        let mut vol = MemVolume::new()
            .with_file("boot.bin", &[0; 100])
            .with_file("app.bin", &[0; 100]);
        vol.fail_reads_of("boot.bin");

        let mut image = discover(&mut vol).unwrap().image;
        let err = image.read_next(&mut [0u8; 256]).unwrap_err();
        assert_eq!(err.segment, SegmentKind::Boot);
    }

    #[test]
    fn test_scan_failure() {
        let mut vol = MemVolume::new()
            .with_file("boot.bin", &[0; 16])
            .with_file("readme.txt", &[0; 16]);
        vol.fail_scan_after(1);

        let report = discover(&mut vol).unwrap_err();
        assert!(report.contains(DiscoveryReport::ROOT_SCAN_FAILED));
        assert!(report.contains(DiscoveryReport::BOOT_FOUND));
        assert!(!report.is_ready());
    }
}
