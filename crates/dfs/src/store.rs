//! Backing store for image files.
//!
//! An [`ImageStore`] presents the bytes of an image as a flat, bounded byte
//! array with sector-granular growth. Reads past the end of the backing
//! return zero bytes, matching the truncated-image convention: a shrunk
//! image is equivalent to the full-size image with its trailing zero sectors
//! cut off. Writes beyond the end grow the backing to the containing sector
//! boundary.
//!
//! Two backings exist behind the same type: a host file, and an in-memory
//! buffer used for MMB slot views and tests.

use std::fs;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use log::{debug, trace};

use crate::{Result, SECTOR_SIZE};

/// How an image file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenMode {
    /// Create the file; fail if it already exists.
    New,
    /// Open the file; fail if it does not exist.
    Existing,
    /// Open the file, creating it when absent.
    #[default]
    Always,
}

/// Requested access to an image file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Access {
    #[default]
    Read,
    ReadWrite,
}

enum Backing {
    File(fs::File),
    Memory(Vec<u8>),
}

/// The backing store of one image or MMB file.
pub struct ImageStore {
    backing: Backing,
    size: u64,
    writable: bool,
}

impl ImageStore {
    /// Opens `path` according to `mode` and `access`.
    pub fn open(path: &Path, mode: OpenMode, access: Access) -> Result<Self> {
        let writable = access == Access::ReadWrite;
        let mut options = fs::OpenOptions::new();
        options.read(true);
        match mode {
            OpenMode::New => {
                options.write(true).create_new(true);
            }
            OpenMode::Existing => {
                options.write(writable);
            }
            OpenMode::Always => {
                options.write(true).create(true);
            }
        }
        let file = options.open(path)?;
        let size = file.metadata()?.len();
        debug!(
            "opened {} ({size} bytes, {mode:?}/{access:?})",
            path.display()
        );
        Ok(ImageStore {
            backing: Backing::File(file),
            size,
            writable,
        })
    }

    /// Wraps an in-memory buffer.
    pub fn from_vec(buf: Vec<u8>, writable: bool) -> Self {
        let size = buf.len() as u64;
        ImageStore {
            backing: Backing::Memory(buf),
            size,
            writable,
        }
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn writable(&self) -> bool {
        self.writable
    }

    /// The whole buffer of a memory-backed store.
    pub fn as_memory(&self) -> Option<&[u8]> {
        match &self.backing {
            Backing::Memory(buf) => Some(buf),
            Backing::File(_) => None,
        }
    }

    /// Reads `buf.len()` bytes at `offset`, zero-filling past the end.
    pub fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        if offset >= self.size {
            buf.fill(0);
            return Ok(());
        }
        let available = ((self.size - offset) as usize).min(buf.len());
        match &mut self.backing {
            Backing::File(file) => {
                file.seek(SeekFrom::Start(offset))?;
                file.read_exact(&mut buf[..available])?;
            }
            Backing::Memory(data) => {
                let offset = offset as usize;
                buf[..available].copy_from_slice(&data[offset..offset + available]);
            }
        }
        buf[available..].fill(0);
        Ok(())
    }

    /// Writes `bytes` at `offset`, growing the backing to the containing
    /// sector boundary when the write lands past the current end.
    pub fn write_at(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        if !self.writable {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "image is open read-only",
            )
            .into());
        }
        let end = offset + bytes.len() as u64;
        if end > self.size {
            let new_size = end.div_ceil(SECTOR_SIZE as u64) * SECTOR_SIZE as u64;
            trace!("extending backing from {} to {new_size} bytes", self.size);
            self.set_len(new_size)?;
        }
        match &mut self.backing {
            Backing::File(file) => {
                file.seek(SeekFrom::Start(offset))?;
                file.write_all(bytes)?;
            }
            Backing::Memory(data) => {
                let offset = offset as usize;
                data[offset..offset + bytes.len()].copy_from_slice(bytes);
            }
        }
        Ok(())
    }

    /// Sets the backing length exactly, zero-filling any growth.
    pub fn set_len(&mut self, new_size: u64) -> Result<()> {
        match &mut self.backing {
            Backing::File(file) => file.set_len(new_size)?,
            Backing::Memory(data) => data.resize(new_size as usize, 0),
        }
        self.size = new_size;
        Ok(())
    }

    /// Zero-pads the backing up to `target` bytes. Never shrinks.
    pub fn expand(&mut self, target: u64) -> Result<()> {
        if target > self.size {
            debug!("expanding backing from {} to {target} bytes", self.size);
            self.set_len(target)?;
        }
        Ok(())
    }

    /// Truncates trailing zero-only sectors, never cutting into the catalog
    /// sectors. The result is always a whole number of sectors.
    pub fn shrink_to_content(&mut self) -> Result<()> {
        let sector = SECTOR_SIZE as u64;
        let mut keep = self.size.div_ceil(sector);
        let mut buf = [0u8; SECTOR_SIZE];
        while keep > 2 {
            self.read_at((keep - 1) * sector, &mut buf)?;
            if buf.iter().any(|&b| b != 0) {
                break;
            }
            keep -= 1;
        }
        let new_size = keep.max(2) * sector;
        if new_size != self.size {
            debug!("shrinking backing from {} to {new_size} bytes", self.size);
            self.set_len(new_size)?;
        }
        Ok(())
    }

    /// Flushes backing-store writes to the host.
    pub fn flush(&mut self) -> Result<()> {
        if let Backing::File(file) = &mut self.backing {
            file.flush()?;
            file.sync_all()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_past_end_zero_fills() {
        let mut store = ImageStore::from_vec(vec![0xAA; 100], false);
        let mut buf = [1u8; 8];
        store.read_at(96, &mut buf).unwrap();
        assert_eq!(buf, [0xAA, 0xAA, 0xAA, 0xAA, 0, 0, 0, 0]);
        store.read_at(1000, &mut buf).unwrap();
        assert_eq!(buf, [0; 8]);
    }

    #[test]
    fn test_write_extends_to_sector_boundary() {
        let mut store = ImageStore::from_vec(Vec::new(), true);
        store.write_at(300, b"abc").unwrap();
        assert_eq!(store.size(), 2 * SECTOR_SIZE as u64);
        let mut buf = [0u8; 3];
        store.read_at(300, &mut buf).unwrap();
        assert_eq!(&buf, b"abc");
    }

    #[test]
    fn test_write_requires_write_access() {
        let mut store = ImageStore::from_vec(vec![0; 512], false);
        assert!(store.write_at(0, b"x").is_err());
    }

    #[test]
    fn test_shrink_keeps_catalog_and_content() {
        let mut store = ImageStore::from_vec(vec![0; 10 * SECTOR_SIZE], true);
        store.write_at(4 * SECTOR_SIZE as u64 + 10, &[7]).unwrap();
        store.shrink_to_content().unwrap();
        assert_eq!(store.size(), 5 * SECTOR_SIZE as u64);

        // An all-zero image still keeps its two catalog sectors.
        let mut empty = ImageStore::from_vec(vec![0; 10 * SECTOR_SIZE], true);
        empty.shrink_to_content().unwrap();
        assert_eq!(empty.size(), 2 * SECTOR_SIZE as u64);
    }
}
