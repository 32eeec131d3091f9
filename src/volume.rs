//! Host directory standing in for the programmer's mass-storage volume
//!
//! On the device the volume is a FAT filesystem written by the USB host.
//! Here it is a plain directory; its regular files play the role of the
//! root directory entries.

use std::fs::{self, File};
use std::io::{self, Read as _, Seek as _};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use embedded_io::{ErrorKind, ErrorType, Read, Seek, SeekFrom};
use multiflash_core::image::{RootScanError, SegmentFile, Volume};
use thiserror::Error;

/// I/O error from a host file
#[derive(Debug, Error)]
#[error(transparent)]
pub struct HostIoError(#[from] io::Error);

impl embedded_io::Error for HostIoError {
    fn kind(&self) -> ErrorKind {
        match self.0.kind() {
            io::ErrorKind::NotFound => ErrorKind::NotFound,
            io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
            io::ErrorKind::InvalidInput => ErrorKind::InvalidInput,
            io::ErrorKind::InvalidData => ErrorKind::InvalidData,
            io::ErrorKind::TimedOut => ErrorKind::TimedOut,
            io::ErrorKind::Interrupted => ErrorKind::Interrupted,
            io::ErrorKind::Unsupported => ErrorKind::Unsupported,
            io::ErrorKind::OutOfMemory => ErrorKind::OutOfMemory,
            _ => ErrorKind::Other,
        }
    }
}

/// A directory whose regular files are the candidate images
#[derive(Debug, Clone)]
pub struct DirVolume {
    root: PathBuf,
}

impl DirVolume {
    /// Use `root` as the volume
    pub fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        if !fs::metadata(&root)?.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a directory", root.display()),
            ));
        }
        Ok(Self { root })
    }

    /// Directory path
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Record names, sizes and modification times of the root files
    pub fn snapshot(&self) -> io::Result<DirSnapshot> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let meta = entry.metadata()?;
            if !meta.is_file() {
                continue;
            }
            entries.push(SnapshotEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                len: meta.len(),
                modified: meta.modified().ok(),
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(DirSnapshot { entries })
    }

    /// Root regular files sorted by name
    fn root_files(&self) -> io::Result<Vec<(String, PathBuf)>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => files.push((name, entry.path())),
                Err(name) => log::debug!("Skipping non UTF-8 file name {:?}", name),
            }
        }
        files.sort();
        Ok(files)
    }
}

impl Volume for DirVolume {
    type File = HostFile;

    fn for_each_root_file(&mut self, visit: &mut dyn FnMut(HostFile)) -> Result<(), RootScanError> {
        let files = self.root_files().map_err(|e| {
            log::warn!("Failed to list {}: {}", self.root.display(), e);
            RootScanError
        })?;

        for (name, path) in files {
            match HostFile::open(&path, name) {
                Ok(file) => visit(file),
                Err(e) => log::warn!("Skipping {}: {}", path.display(), e),
            }
        }
        Ok(())
    }
}

/// An open file of a [`DirVolume`]
#[derive(Debug)]
pub struct HostFile {
    name: String,
    size: u32,
    file: File,
}

impl HostFile {
    fn open(path: &Path, name: String) -> io::Result<Self> {
        let file = File::open(path)?;
        let size = u32::try_from(file.metadata()?.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "file exceeds 4 GiB"))?;
        Ok(Self { name, size, file })
    }
}

impl ErrorType for HostFile {
    type Error = HostIoError;
}

impl Read for HostFile {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, HostIoError> {
        Ok(self.file.read(buf)?)
    }
}

impl Seek for HostFile {
    fn seek(&mut self, pos: SeekFrom) -> Result<u64, HostIoError> {
        let pos = match pos {
            SeekFrom::Start(p) => io::SeekFrom::Start(p),
            SeekFrom::End(d) => io::SeekFrom::End(d),
            SeekFrom::Current(d) => io::SeekFrom::Current(d),
        };
        Ok(self.file.seek(pos)?)
    }
}

impl SegmentFile for HostFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u32 {
        self.size
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SnapshotEntry {
    name: String,
    len: u64,
    modified: Option<SystemTime>,
}

/// State of the root directory at one point in time
///
/// Two snapshots compare equal when no root file was added, removed,
/// resized or rewritten in between.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirSnapshot {
    entries: Vec<SnapshotEntry>,
}

impl DirSnapshot {
    /// Number of regular files seen
    pub fn file_count(&self) -> usize {
        self.entries.len()
    }
}
