//! Backing disk image access.
//!
//! `DiskImage` owns the image file handle and performs offset-addressed
//! reads and writes. Positioned I/O (`FileExt`) keeps the handle shareable,
//! so readers holding the filesystem's shared lock never need `&mut`.
//! The handle is only ever touched under the filesystem manager's lock;
//! nothing here does its own synchronization.

use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::path::Path;

use log::debug;

use crate::error::Result;

pub struct DiskImage {
    file: File,
}

impl DiskImage {
    /// Open or create the backing image, growing it to `total_size` bytes
    /// if it is smaller (never shrinking it). Returns the image and whether
    /// it was fresh, i.e. created or grown, in which case the metadata
    /// region holds nothing usable.
    pub fn open(path: &Path, total_size: u64) -> Result<(Self, bool)> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;

        let len = file.metadata()?.len();
        let fresh = len < total_size;
        if fresh {
            file.set_len(total_size)?;
            debug!(target: "disk", "grew image {:?} from {} to {} bytes", path, len, total_size);
        }

        Ok((Self { file }, fresh))
    }

    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.file.read_exact_at(buf, offset)?;
        Ok(())
    }

    pub fn write_at(&self, offset: u64, bytes: &[u8]) -> Result<()> {
        self.file.write_all_at(bytes, offset)?;
        Ok(())
    }

    /// Zero `len` bytes starting at `offset`. Used when a block is released.
    pub fn zero_range(&self, offset: u64, len: usize) -> Result<()> {
        self.write_at(offset, &vec![0u8; len])
    }

    /// Durably force all written data to the device.
    pub fn flush(&self) -> Result<()> {
        self.file.sync_data()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::TempImage;

    #[test]
    fn test_open_creates_and_grows() {
        let img = TempImage::new("disk-open");
        let (disk, fresh) = DiskImage::open(img.path(), 256).unwrap();
        assert!(fresh);
        drop(disk);

        // Reopening at the same size is no longer fresh.
        let (disk, fresh) = DiskImage::open(img.path(), 256).unwrap();
        assert!(!fresh);
        drop(disk);

        // A larger size grows the file and marks it fresh again.
        let (_, fresh) = DiskImage::open(img.path(), 512).unwrap();
        assert!(fresh);
        assert_eq!(std::fs::metadata(img.path()).unwrap().len(), 512);
    }

    #[test]
    fn test_read_write_zero_round_trip() {
        let img = TempImage::new("disk-rw");
        let (disk, _) = DiskImage::open(img.path(), 256).unwrap();

        disk.write_at(10, b"hello").unwrap();
        let mut buf = [0u8; 5];
        disk.read_at(10, &mut buf).unwrap();
        assert_eq!(&buf, b"hello");

        disk.zero_range(10, 5).unwrap();
        disk.read_at(10, &mut buf).unwrap();
        assert_eq!(buf, [0u8; 5]);
    }
}
