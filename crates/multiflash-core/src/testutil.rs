//! Slice-backed volume for unit tests

use embedded_io::{ErrorKind, ErrorType, Read, Seek, SeekFrom};

use crate::image::{RootScanError, SegmentFile, Volume};

#[derive(Debug)]
pub(crate) struct TestIoError;

impl embedded_io::Error for TestIoError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

#[derive(Debug)]
pub(crate) struct TestFile {
    name: &'static str,
    data: &'static [u8],
    pos: usize,
    fail_read: bool,
    size: Option<u32>,
}

impl TestFile {
    pub fn new(name: &'static str, data: &'static [u8]) -> Self {
        Self {
            name,
            data,
            pos: 0,
            fail_read: false,
            size: None,
        }
    }

    /// Report `size` from [`SegmentFile::size`] regardless of the data
    pub fn with_size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }
}

impl ErrorType for TestFile {
    type Error = TestIoError;
}

impl Read for TestFile {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TestIoError> {
        if self.fail_read {
            return Err(TestIoError);
        }
        // Hand out at most 100 bytes per call to exercise short reads
        let n = buf.len().min(self.data.len() - self.pos).min(100);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

impl Seek for TestFile {
    fn seek(&mut self, pos: SeekFrom) -> Result<u64, TestIoError> {
        match pos {
            SeekFrom::Start(p) => self.pos = p as usize,
            _ => return Err(TestIoError),
        }
        Ok(self.pos as u64)
    }
}

impl SegmentFile for TestFile {
    fn name(&self) -> &str {
        self.name
    }

    fn size(&self) -> u32 {
        self.size.unwrap_or(self.data.len() as u32)
    }
}

pub(crate) struct TestVolume {
    pub files: &'static [(&'static str, &'static [u8])],
    pub fail_after: Option<usize>,
    pub fail_read: Option<&'static str>,
}

impl TestVolume {
    pub fn new(files: &'static [(&'static str, &'static [u8])]) -> Self {
        Self {
            files,
            fail_after: None,
            fail_read: None,
        }
    }
}

impl Volume for TestVolume {
    type File = TestFile;

    fn for_each_root_file(
        &mut self,
        visit: &mut dyn FnMut(TestFile),
    ) -> Result<(), RootScanError> {
        for (i, &(name, data)) in self.files.iter().enumerate() {
            if self.fail_after == Some(i) {
                return Err(RootScanError);
            }
            let mut file = TestFile::new(name, data);
            file.fail_read = self.fail_read == Some(name);
            visit(file);
        }
        Ok(())
    }
}

pub(crate) const fn pattern<const N: usize>(seed: u8) -> [u8; N] {
    let mut out = [0u8; N];
    let mut i = 0;
    while i < N {
        out[i] = (i as u8).wrapping_mul(7).wrapping_add(seed);
        i += 1;
    }
    out
}

pub(crate) const BOOT: [u8; 1024] = pattern(1);
pub(crate) const APP: [u8; 512] = pattern(100);
pub(crate) const OTHER: [u8; 16] = pattern(3);
