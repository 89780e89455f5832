//! In-memory model of one DFS side.
//!
//! A [`Side`] is the decoded form of a side's catalog: title, sequence,
//! boot option, total-sector count and the file-entry table, held in the
//! DFS on-disk order (descending start sector, newest allocation first).
//! The side owns the catalog invariants; every mutation goes through typed
//! operations that keep the entry table ordered and disjoint, and the free
//! map is derived from the table on demand rather than stored.
//!
//! The side never touches the backing store itself. [`Image`] methods
//! orchestrate data-sector I/O and call back into the side for the catalog
//! state; [`Side::dirty`] tracks whether the catalog needs rewriting.
//!
//! [`Image`]: crate::image::Image

use dfs_fmt::{
    AddrSlot, BootOption, CATALOG_ENTRIES, CATALOG_SECTORS, Catalog, NameSlot, OptByte, bcd_next,
};
use log::trace;

use crate::{Error, Result};

/// One catalog entry in canonical in-memory form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// File name, 1–7 ASCII characters.
    pub name: String,
    /// Directory character, `$` by default.
    pub dir: u8,
    pub locked: bool,
    pub load_addr: u32,
    pub exec_addr: u32,
    pub length: u32,
    pub start_sector: u16,
}

impl Entry {
    /// Sectors occupied by the file data.
    pub fn sectors(&self) -> u16 {
        self.length.div_ceil(256) as u16
    }

    pub fn end_sector(&self) -> u16 {
        self.start_sector + self.sectors()
    }

    /// Case-insensitive identity match on `(directory, name)`.
    pub fn matches(&self, dir: u8, name: &str) -> bool {
        self.dir.eq_ignore_ascii_case(&dir) && self.name.eq_ignore_ascii_case(name)
    }

    /// The `D.NAME` display form.
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.dir as char, self.name)
    }
}

/// Checks a file name against the DFS charset and length rules.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::NameInvalid(name.into()));
    }
    if name.len() > 7 {
        return Err(Error::NameTooLong(name.into()));
    }
    if !name.bytes().all(is_name_char) {
        return Err(Error::NameInvalid(name.into()));
    }
    Ok(())
}

/// Checks a directory character.
pub fn validate_dir(dir: u8) -> Result<()> {
    if is_name_char(dir) {
        Ok(())
    } else {
        Err(Error::DirInvalid(dir as char))
    }
}

/// Characters usable in names and directories: printable ASCII minus the
/// separators and wildcards DFS reserves.
fn is_name_char(b: u8) -> bool {
    (0x21..0x7f).contains(&b) && !matches!(b, b'.' | b':' | b'*' | b'#' | b'"')
}

/// In-memory DFS volume state for one side.
#[derive(Debug, Clone)]
pub struct Side {
    index: u8,
    title: [u8; 12],
    sequence: u8,
    /// Raw boot/size byte; reserved bits are carried through untouched.
    opt: OptByte,
    total_sectors: u16,
    entries: Vec<Entry>,
    dirty: bool,
    valid: bool,
}

impl Side {
    /// Builds the model from a decoded catalog.
    ///
    /// This never fails: unrepresentable bytes in names become `?`
    /// sentinels, and out-of-range fields are kept as found. The validator
    /// reports them; mutating operations refuse to build on them.
    pub fn from_catalog(index: u8, catalog: &Catalog) -> Self {
        let entries = (0..catalog.file_count())
            .map(|i| {
                let name_slot = &catalog.sector0.names[i];
                let addr = &catalog.sector1.addrs[i];
                Entry {
                    name: sentinel_name(&name_slot.name_trimmed()),
                    dir: printable_or(name_slot.dir_char(), b'$'),
                    locked: name_slot.locked(),
                    load_addr: addr.load_addr(),
                    exec_addr: addr.exec_addr(),
                    length: addr.file_length(),
                    start_sector: addr.start_sector(),
                }
            })
            .collect();
        Side {
            index,
            title: catalog.title_bytes(),
            sequence: catalog.sector1.sequence,
            opt: catalog.sector1.opt,
            total_sectors: catalog.total_sectors(),
            entries,
            dirty: false,
            valid: true,
        }
    }

    /// A freshly formatted side.
    pub fn formatted(index: u8, title: &[u8], boot: BootOption, total_sectors: u16) -> Self {
        let mut catalog = Catalog::formatted(title, total_sectors);
        catalog.set_boot_option(boot);
        let mut side = Side::from_catalog(index, &catalog);
        side.dirty = true;
        side
    }

    /// Encodes the model back into catalog form.
    pub fn to_catalog(&self) -> Catalog {
        let mut catalog = Catalog::formatted(&self.title, self.total_sectors);
        catalog.sector1.sequence = self.sequence;
        catalog.sector1.opt = self.opt;
        catalog.set_total_sectors(self.total_sectors);
        catalog.set_file_count(self.entries.len());
        for (i, entry) in self.entries.iter().take(CATALOG_ENTRIES).enumerate() {
            catalog.sector0.names[i] = NameSlot::pack(entry.name.as_bytes(), entry.dir, entry.locked);
            catalog.sector1.addrs[i] = AddrSlot::pack(
                entry.load_addr,
                entry.exec_addr,
                entry.length,
                entry.start_sector,
            );
        }
        catalog
    }

    pub fn index(&self) -> u8 {
        self.index
    }

    pub fn title_bytes(&self) -> &[u8; 12] {
        &self.title
    }

    /// The title with padding trimmed, lossily decoded for display.
    pub fn title_string(&self) -> String {
        let end = self.title.iter().position(|&b| b == 0).unwrap_or(12);
        String::from_utf8_lossy(&self.title[..end]).trim_end().to_string()
    }

    pub fn set_title(&mut self, title: &[u8]) {
        let mut padded = [b' '; 12];
        let len = title.len().min(12);
        padded[..len].copy_from_slice(&title[..len]);
        self.title = padded;
        self.dirty = true;
    }

    pub fn sequence(&self) -> u8 {
        self.sequence
    }

    pub fn boot_option(&self) -> BootOption {
        self.opt.boot_option()
    }

    pub fn set_boot_option(&mut self, boot: BootOption) {
        self.opt.set_boot_option(boot);
        self.dirty = true;
    }

    pub fn total_sectors(&self) -> u16 {
        self.total_sectors
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Whether the catalog passed the structural check at open time.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub(crate) fn set_valid(&mut self, valid: bool) {
        self.valid = valid;
    }

    /// Index of the entry matching `(dir, name)`, case-insensitive.
    pub fn find(&self, dir: u8, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.matches(dir, name))
    }

    /// Free regions as `(start, length)` pairs in ascending sector order.
    ///
    /// Derived from the entry table: everything outside the catalog sectors
    /// and the file regions.
    pub fn free_map(&self) -> Vec<(u16, u16)> {
        let mut occupied: Vec<(u16, u16)> = self
            .entries
            .iter()
            .filter(|e| e.sectors() > 0)
            .map(|e| (e.start_sector, e.sectors()))
            .collect();
        occupied.sort_unstable();

        let mut gaps = Vec::new();
        let mut cursor = CATALOG_SECTORS as u16;
        for (start, len) in occupied {
            if start > cursor {
                gaps.push((cursor, start - cursor));
            }
            cursor = cursor.max(start.saturating_add(len));
        }
        if cursor < self.total_sectors {
            gaps.push((cursor, self.total_sectors - cursor));
        }
        gaps
    }

    /// Total free sectors.
    pub fn free_sectors(&self) -> u16 {
        self.free_map().iter().map(|(_, len)| len).sum()
    }

    /// Sectors occupied by files.
    pub fn used_sectors(&self) -> u16 {
        self.entries.iter().map(|e| e.sectors()).sum()
    }

    /// Picks a start sector for a new file of `sectors` sectors.
    ///
    /// First fit from the highest free sector downward, so fresh files land
    /// at the top of the disk and the newest entry usually carries the
    /// highest start sector.
    pub fn allocate(&self, sectors: u16) -> Option<u16> {
        let gaps = self.free_map();
        if sectors == 0 {
            // Zero-length files occupy nothing; give them the top free
            // sector boundary.
            return Some(gaps.last().map_or(self.total_sectors, |&(s, l)| s + l));
        }
        gaps.iter()
            .rev()
            .find(|&&(_, len)| len >= sectors)
            .map(|&(start, len)| start + len - sectors)
    }

    /// Inserts `entry` keeping the table ordered by descending start
    /// sector. Returns the position used.
    pub fn insert_entry(&mut self, entry: Entry) -> usize {
        let pos = self
            .entries
            .iter()
            .position(|e| e.start_sector < entry.start_sector)
            .unwrap_or(self.entries.len());
        trace!(
            "side {}: insert {} at slot {pos} (sector {})",
            self.index,
            entry.full_name(),
            entry.start_sector
        );
        self.entries.insert(pos, entry);
        self.dirty = true;
        pos
    }

    pub fn remove_entry(&mut self, index: usize) -> Entry {
        let entry = self.entries.remove(index);
        trace!("side {}: removed {}", self.index, entry.full_name());
        self.dirty = true;
        entry
    }

    pub(crate) fn entry_mut(&mut self, index: usize) -> &mut Entry {
        self.dirty = true;
        &mut self.entries[index]
    }

    /// Replaces the whole entry table (compaction commit/rollback).
    pub(crate) fn set_entries(&mut self, entries: Vec<Entry>) {
        self.entries = entries;
        self.dirty = true;
    }

    /// Bumps the BCD write sequence; one bump per catalog-touching
    /// mutation.
    pub fn bump_sequence(&mut self) {
        self.sequence = bcd_next(self.sequence);
        self.dirty = true;
    }

    /// Resets the side to an empty catalog, keeping the sector count.
    pub fn format(&mut self, title: &[u8], boot: BootOption) {
        self.entries.clear();
        self.set_title(title);
        self.opt = OptByte::new();
        self.opt.set_boot_option(boot);
        self.sequence = 0;
        self.valid = true;
        self.dirty = true;
    }

    /// Whether the entry table is safe to allocate against: every region in
    /// range and pairwise disjoint.
    pub fn allocation_safe(&self) -> bool {
        let mut regions: Vec<(u16, u16)> = self
            .entries
            .iter()
            .map(|e| (e.start_sector, e.end_sector()))
            .collect();
        if regions
            .iter()
            .any(|&(s, e)| s < CATALOG_SECTORS as u16 || e > self.total_sectors)
        {
            return false;
        }
        regions.sort_unstable();
        regions.windows(2).all(|w| w[0].1 <= w[1].0)
    }
}

fn sentinel_name(raw: &[u8]) -> String {
    if raw.is_empty() {
        return "?".into();
    }
    raw.iter()
        .map(|&b| if (0x21..0x7f).contains(&b) { b as char } else { '?' })
        .collect()
}

fn printable_or(b: u8, fallback: u8) -> u8 {
    if (0x21..0x7f).contains(&b) { b } else { fallback }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, start: u16, length: u32) -> Entry {
        Entry {
            name: name.into(),
            dir: b'$',
            locked: false,
            load_addr: 0,
            exec_addr: 0,
            length,
            start_sector: start,
        }
    }

    fn empty_side() -> Side {
        Side::formatted(0, b"TEST", BootOption::None, 800)
    }

    #[test]
    fn test_entry_derived_fields() {
        let e = entry("A", 398, 100);
        assert_eq!(e.sectors(), 1);
        assert_eq!(e.end_sector(), 399);
        assert_eq!(entry("B", 2, 256).sectors(), 1);
        assert_eq!(entry("C", 2, 257).sectors(), 2);
        assert_eq!(entry("D", 2, 0).sectors(), 0);
        assert!(e.matches(b'$', "a"));
        assert!(!e.matches(b'A', "a"));
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("MENU").is_ok());
        assert!(validate_name("!BOOT").is_ok());
        assert!(validate_name("").is_err());
        assert!(matches!(
            validate_name("TOOLONGNAME"),
            Err(Error::NameTooLong(_))
        ));
        assert!(validate_name("A.B").is_err());
        assert!(validate_name("A B").is_err());
        assert!(validate_name("DRV:0").is_err());
        assert!(validate_dir(b'$').is_ok());
        assert!(validate_dir(b' ').is_err());
    }

    #[test]
    fn test_free_map_and_allocation() {
        let mut side = empty_side();
        assert_eq!(side.free_map(), vec![(2, 798)]);
        assert_eq!(side.allocate(1), Some(799));
        assert_eq!(side.allocate(798), Some(2));
        assert_eq!(side.allocate(799), None);

        side.insert_entry(entry("TOP", 700, 100 * 256));
        side.insert_entry(entry("MID", 300, 100 * 256));
        assert_eq!(side.free_map(), vec![(2, 298), (400, 300)]);
        // Highest gap that fits wins; the file sits at the top of the gap.
        assert_eq!(side.allocate(200), Some(500));
        assert_eq!(side.allocate(299), Some(401));
        assert_eq!(side.allocate(350), None);
        assert_eq!(side.free_sectors(), 598);
        assert_eq!(side.used_sectors(), 200);
    }

    #[test]
    fn test_insert_keeps_descending_order() {
        let mut side = empty_side();
        side.insert_entry(entry("A", 500, 256));
        side.insert_entry(entry("B", 700, 256));
        side.insert_entry(entry("C", 2, 256));
        let starts: Vec<u16> = side.entries().iter().map(|e| e.start_sector).collect();
        assert_eq!(starts, vec![700, 500, 2]);
        assert_eq!(side.entries()[0].name, "B");
    }

    #[test]
    fn test_sequence_bump() {
        let mut side = empty_side();
        assert_eq!(side.sequence(), 0);
        side.bump_sequence();
        assert_eq!(side.sequence(), 0x01);
        for _ in 0..9 {
            side.bump_sequence();
        }
        assert_eq!(side.sequence(), 0x10);
    }

    #[test]
    fn test_catalog_roundtrip_through_model() {
        let mut side = empty_side();
        side.insert_entry(Entry {
            name: "Loader".into(),
            dir: b'$',
            locked: true,
            load_addr: 0x1900,
            exec_addr: 0xFF_8023,
            length: 100,
            start_sector: 799,
        });
        side.bump_sequence();
        let catalog = side.to_catalog();
        let back = Side::from_catalog(0, &catalog);
        // Names are uppercased on the way into the catalog.
        let entry = &back.entries()[0];
        assert_eq!(entry.name, "LOADER");
        assert_eq!(entry.dir, b'$');
        assert!(entry.locked);
        assert_eq!(entry.load_addr, 0x1900);
        assert_eq!(entry.exec_addr, 0xFF_8023);
        assert_eq!(entry.length, 100);
        assert_eq!(entry.start_sector, 799);
        assert_eq!(back.sequence(), 0x01);
        assert_eq!(back.title_string(), "TEST");
        assert_eq!(back.total_sectors(), 800);
    }

    #[test]
    fn test_allocation_safety() {
        let mut side = empty_side();
        side.insert_entry(entry("A", 100, 10 * 256));
        assert!(side.allocation_safe());
        side.insert_entry(entry("B", 105, 10 * 256));
        assert!(!side.allocation_safe());
        let mut side = empty_side();
        side.insert_entry(entry("HIGH", 795, 10 * 256));
        assert!(!side.allocation_safe());
    }

    #[test]
    fn test_format_resets() {
        let mut side = empty_side();
        side.insert_entry(entry("A", 100, 256));
        side.bump_sequence();
        side.format(b"FRESH", BootOption::Exec);
        assert!(side.entries().is_empty());
        assert_eq!(side.sequence(), 0);
        assert_eq!(side.boot_option(), BootOption::Exec);
        assert_eq!(side.total_sectors(), 800);
        assert_eq!(side.title_string(), "FRESH");
    }
}
