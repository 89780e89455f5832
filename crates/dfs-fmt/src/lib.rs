//! On-disk record layer for Acorn DFS disk images.
//!
//! This crate contains the byte-level structures of the DFS catalog (the
//! first two sectors of a side) and of the MMB archive index, together with
//! the bit packing rules that tie them to usable integer values. Everything
//! here is a pure codec: no I/O, no policy. Decoding is total over any byte
//! stream of the right length, and encoding a decoded value reproduces the
//! input bytes exactly.

pub mod catalog;
pub mod mmb;

pub use catalog::{
    AddrBits, AddrSlot, BootOption, Catalog, CatalogSector0, CatalogSector1, NameSlot, OptByte,
    bcd_next, is_valid_bcd,
};
pub use mmb::{MmbEntry, MmbHeaderSector, status};

/// Sector size of every known DFS implementation.
pub const SECTOR_SIZE: usize = 256;

/// Sectors per track on a DFS side.
pub const SECTORS_PER_TRACK: usize = 10;

/// Number of file-entry slots in a DFS catalog.
pub const CATALOG_ENTRIES: usize = 31;

/// Sectors occupied by the catalog at the start of each side.
pub const CATALOG_SECTORS: usize = 2;
