//! MMB archive index structures.
//!
//! An MMB file packs up to 511 single-sided 80-track SSD payloads behind a
//! 16 KiB index region. Sector 0 of the index is the header: 16 bytes of
//! magic/padding (preserved verbatim), then the on-boot record naming the
//! image loaded into each of drives 0–3 at startup. The entry table starts
//! at the second sector, one 16-byte record per slot: a 12-byte title and a
//! status byte at offset 15.

use binrw::prelude::*;

use crate::SECTOR_SIZE;

/// Size of the index region preceding the first slot.
pub const MMB_INDEX_SIZE: u64 = 16 * 1024;

/// Number of image slots in an MMB archive.
pub const MMB_SLOTS: u16 = 511;

/// Byte offset of the entry table; entry `i` (1-based) lives at
/// `MMB_ENTRY_TABLE + (i - 1) * MMB_ENTRY_SIZE`.
pub const MMB_ENTRY_TABLE: u64 = SECTOR_SIZE as u64;

/// Size of one entry record.
pub const MMB_ENTRY_SIZE: u64 = 16;

/// Size of one slot: a single-sided 80-track SSD payload.
pub const MMB_SLOT_SIZE: u64 = 80 * 10 * SECTOR_SIZE as u64;

/// Length of an entry title.
pub const MMB_TITLE_LEN: usize = 12;

/// Documented status-byte values.
///
/// Unknown values are preserved as found; accessors treat anything other
/// than the two uninitialized markers as an initialized slot.
pub mod status {
    /// Slot holds an image and is write protected.
    pub const LOCKED: u8 = 0x00;
    /// Slot holds an image and is writable.
    pub const UNLOCKED: u8 = 0x0F;
    /// Slot is formatted but marked unused; payload bytes are retained.
    pub const UNINITIALIZED: u8 = 0xF0;
    /// Slot marked invalid.
    pub const INVALID: u8 = 0xFF;
}

/// The header sector of the index region.
#[binrw::binrw]
#[brw(little)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MmbHeaderSector {
    /// Magic/padding bytes; preserved verbatim on rewrite.
    pub magic: [u8; 16],
    /// Slot index loaded into each of drives 0–3 on boot.
    pub onboot: [u16; 4],
    pub pad: [u8; SECTOR_SIZE - 24],
}

impl MmbHeaderSector {
    pub fn new() -> Self {
        MmbHeaderSector {
            magic: [0; 16],
            onboot: [1, 2, 3, 4],
            pad: [0; SECTOR_SIZE - 24],
        }
    }
}

impl Default for MmbHeaderSector {
    fn default() -> Self {
        Self::new()
    }
}

/// One entry of the MMB index table.
#[binrw::binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MmbEntry {
    /// Image title, space padded.
    pub title: [u8; MMB_TITLE_LEN],
    pub reserved: [u8; 3],
    pub status: u8,
}

impl MmbEntry {
    /// A freshly created entry: untitled and uninitialized.
    pub const EMPTY: MmbEntry = MmbEntry {
        title: [0; MMB_TITLE_LEN],
        reserved: [0; 3],
        status: status::UNINITIALIZED,
    };

    /// Whether the slot is considered to hold a live image.
    pub fn is_initialized(&self) -> bool {
        self.status != status::UNINITIALIZED && self.status != status::INVALID
    }

    pub fn is_locked(&self) -> bool {
        self.status == status::LOCKED
    }

    /// Title bytes up to the first NUL, trailing spaces trimmed.
    pub fn title_trimmed(&self) -> Vec<u8> {
        let end = self
            .title
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(MMB_TITLE_LEN);
        let mut title = self.title[..end].to_vec();
        while title.last() == Some(&b' ') {
            title.pop();
        }
        title
    }

    /// Sets the title, space padding to 12 bytes. Longer input is truncated.
    pub fn set_title(&mut self, title: &[u8]) {
        let len = title.len().min(MMB_TITLE_LEN);
        self.title = [b' '; MMB_TITLE_LEN];
        self.title[..len].copy_from_slice(&title[..len]);
    }
}

/// File offset of slot `index` (1-based).
pub fn slot_offset(index: u16) -> u64 {
    MMB_INDEX_SIZE + (index as u64 - 1) * MMB_SLOT_SIZE
}

/// File offset of the index entry for slot `index` (1-based).
pub fn entry_offset(index: u16) -> u64 {
    MMB_ENTRY_TABLE + (index as u64 - 1) * MMB_ENTRY_SIZE
}

#[cfg(test)]
mod tests {
    use dfs_tests::*;

    use super::*;

    test_binrw! {
        MmbEntry => unlocked: MmbEntry {
            title: *b"GAMES-01    ",
            reserved: [0; 3],
            status: status::UNLOCKED,
        } => "47 41 4d 45 53 2d 30 31 20 20 20 20 00 00 00 0f"
    }

    // Unknown status bytes round-trip untouched.
    test_binrw! {
        MmbEntry => unknown_status: MmbEntry {
            title: *b"ODDBALL     ",
            reserved: [0; 3],
            status: 0x42,
        } => "4f 44 44 42 41 4c 4c 20 20 20 20 20 00 00 00 42"
    }

    #[test]
    fn test_entry_status() {
        let mut entry = MmbEntry::EMPTY;
        assert!(!entry.is_initialized());
        entry.status = status::UNLOCKED;
        assert!(entry.is_initialized());
        assert!(!entry.is_locked());
        entry.status = status::LOCKED;
        assert!(entry.is_locked());
        entry.status = status::INVALID;
        assert!(!entry.is_initialized());
    }

    #[test]
    fn test_entry_title() {
        let mut entry = MmbEntry::EMPTY;
        entry.set_title(b"ELITE");
        assert_eq!(entry.title, *b"ELITE       ");
        assert_eq!(entry.title_trimmed(), b"ELITE");
        entry.set_title(b"A-VERY-LONG-TITLE");
        assert_eq!(entry.title, *b"A-VERY-LONG-");
    }

    #[test]
    fn test_offsets() {
        assert_eq!(entry_offset(1), 256);
        assert_eq!(entry_offset(511), 256 + 510 * 16);
        assert_eq!(slot_offset(1), 16 * 1024);
        assert_eq!(slot_offset(2), 16 * 1024 + 204_800);
    }
}
