//! Structural validation of a side's catalog.
//!
//! The validator runs a bounded, read-only check of the catalog invariants
//! against the opened geometry and reports ordered findings. Findings never
//! abort an open: a structurally bad side stays readable and is marked
//! invalid; only mutating operations that would build on a broken field
//! escalate to [`CatalogCorrupt`](crate::Error::CatalogCorrupt).

use dfs_fmt::{CATALOG_ENTRIES, CATALOG_SECTORS, Catalog, is_valid_bcd};
use log::warn;

use crate::context::WarnMode;
use crate::geom::Geometry;

/// What a validation finding is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    FileCount,
    TotalSectors,
    StartSector,
    EndSector,
    Name,
    Overlap,
    EntryOrder,
    Duplicate,
    Sequence,
    GeometryMismatch,
}

/// One ordered validation finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    fn new(kind: WarningKind, message: String) -> Self {
        Warning { kind, message }
    }
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Runs the full structural check, returning every finding in invariant
/// order.
pub fn validate(catalog: &Catalog, geometry: &Geometry) -> Vec<Warning> {
    let mut warnings = Vec::new();
    let total = catalog.total_sectors();

    if catalog.sector1.end_offset % 8 != 0 {
        warnings.push(Warning::new(
            WarningKind::FileCount,
            format!(
                "entry end offset {:#04x} is not a multiple of 8",
                catalog.sector1.end_offset
            ),
        ));
    }
    if catalog.sector1.end_offset as usize / 8 > CATALOG_ENTRIES {
        warnings.push(Warning::new(
            WarningKind::FileCount,
            format!(
                "entry end offset {:#04x} implies more than {CATALOG_ENTRIES} files",
                catalog.sector1.end_offset
            ),
        ));
    }

    if total != 400 && total != 800 {
        warnings.push(Warning::new(
            WarningKind::TotalSectors,
            format!("total sector count {total} is not a 40 or 80 track side"),
        ));
    }
    if total != geometry.sectors_per_side() {
        warnings.push(Warning::new(
            WarningKind::GeometryMismatch,
            format!(
                "catalog claims {total} sectors but the backing store holds {}",
                geometry.sectors_per_side()
            ),
        ));
    }

    let count = catalog.file_count();
    let mut regions: Vec<(u16, u16, usize)> = Vec::with_capacity(count);
    for i in 0..count {
        let name_slot = &catalog.sector0.names[i];
        let addr = &catalog.sector1.addrs[i];
        let name = String::from_utf8_lossy(&name_slot.name_trimmed()).into_owned();

        if name_slot.name.iter().any(|&b| (b & 0x7f) < 0x20) {
            warnings.push(Warning::new(
                WarningKind::Name,
                format!("entry {i} has control characters in its name"),
            ));
        }

        let start = addr.start_sector();
        let end = start + (addr.file_length().div_ceil(256) as u16);
        if start < CATALOG_SECTORS as u16 {
            warnings.push(Warning::new(
                WarningKind::StartSector,
                format!("{name}: start sector {start} lies inside the catalog"),
            ));
        }
        if end > total {
            warnings.push(Warning::new(
                WarningKind::EndSector,
                format!("{name}: file ends at sector {end}, past the {total} sector side"),
            ));
        }
        regions.push((start, end, i));
    }

    // Regions must be pairwise disjoint, and slots ordered by descending
    // start sector.
    for window in regions.windows(2) {
        let (prev, next) = (&window[0], &window[1]);
        if next.0 > prev.0 {
            warnings.push(Warning::new(
                WarningKind::EntryOrder,
                format!(
                    "entries {} and {} are not in descending sector order",
                    prev.2, next.2
                ),
            ));
        }
    }
    let mut by_start = regions.clone();
    by_start.sort_unstable();
    for window in by_start.windows(2) {
        let (low, high) = (&window[0], &window[1]);
        if low.1 > high.0 {
            warnings.push(Warning::new(
                WarningKind::Overlap,
                format!("entries {} and {} overlap on disk", low.2, high.2),
            ));
        }
    }

    for i in 0..count {
        for j in i + 1..count {
            let a = &catalog.sector0.names[i];
            let b = &catalog.sector0.names[j];
            if a.dir_char().eq_ignore_ascii_case(&b.dir_char())
                && a.name_trimmed().eq_ignore_ascii_case(&b.name_trimmed())
            {
                warnings.push(Warning::new(
                    WarningKind::Duplicate,
                    format!("entries {i} and {j} share a directory and name"),
                ));
            }
        }
    }

    if !is_valid_bcd(catalog.sector1.sequence) {
        warnings.push(Warning::new(
            WarningKind::Sequence,
            format!(
                "sequence byte {:#04x} is not valid BCD",
                catalog.sector1.sequence
            ),
        ));
    }

    warnings
}

/// Filters findings per the requested warn mode and logs what survives.
pub fn apply_mode(mut warnings: Vec<Warning>, mode: WarnMode) -> Vec<Warning> {
    match mode {
        WarnMode::None => warnings.clear(),
        WarnMode::First => warnings.truncate(1),
        WarnMode::All => {}
    }
    for warning in &warnings {
        warn!("{warning}");
    }
    warnings
}

#[cfg(test)]
mod tests {
    use dfs_fmt::{AddrSlot, NameSlot};

    use super::*;
    use crate::geom::Layout;

    fn geometry() -> Geometry {
        Geometry {
            sides: 1,
            tracks: 80,
            layout: Layout::Linear,
        }
    }

    fn catalog_with(entries: &[(&[u8], u8, u32, u16)]) -> Catalog {
        let mut catalog = Catalog::formatted(b"TEST", 800);
        catalog.set_file_count(entries.len());
        for (i, &(name, dir, length, start)) in entries.iter().enumerate() {
            catalog.sector0.names[i] = NameSlot::pack(name, dir, false);
            catalog.sector1.addrs[i] = AddrSlot::pack(0, 0, length, start);
        }
        catalog
    }

    #[test]
    fn test_clean_catalog() {
        let catalog = catalog_with(&[(b"B", b'$', 256, 500), (b"A", b'$', 256, 2)]);
        assert!(validate(&catalog, &geometry()).is_empty());
    }

    #[test]
    fn test_bad_sector_ranges() {
        let catalog = catalog_with(&[(b"HIGH", b'$', 600 * 256, 700), (b"LOW", b'$', 256, 1)]);
        let warnings = validate(&catalog, &geometry());
        let kinds: Vec<WarningKind> = warnings.iter().map(|w| w.kind).collect();
        assert!(kinds.contains(&WarningKind::EndSector));
        assert!(kinds.contains(&WarningKind::StartSector));
    }

    #[test]
    fn test_overlap_and_order() {
        let catalog = catalog_with(&[(b"A", b'$', 10 * 256, 100), (b"B", b'$', 10 * 256, 105)]);
        let warnings = validate(&catalog, &geometry());
        let kinds: Vec<WarningKind> = warnings.iter().map(|w| w.kind).collect();
        assert!(kinds.contains(&WarningKind::Overlap));
        assert!(kinds.contains(&WarningKind::EntryOrder));
    }

    #[test]
    fn test_duplicate_names() {
        let mut catalog = catalog_with(&[(b"MENU", b'$', 256, 500), (b"XXXX", b'$', 256, 2)]);
        // Foreign tools can leave mixed-case names in a catalog; the
        // duplicate check still matches them case-insensitively.
        catalog.sector0.names[1].name[..4].copy_from_slice(b"menu");
        let warnings = validate(&catalog, &geometry());
        assert!(warnings.iter().any(|w| w.kind == WarningKind::Duplicate));
    }

    #[test]
    fn test_sequence_and_count() {
        let mut catalog = catalog_with(&[]);
        catalog.sector1.sequence = 0xAB;
        catalog.sector1.end_offset = 0x0c;
        let warnings = validate(&catalog, &geometry());
        let kinds: Vec<WarningKind> = warnings.iter().map(|w| w.kind).collect();
        assert!(kinds.contains(&WarningKind::Sequence));
        assert!(kinds.contains(&WarningKind::FileCount));
    }

    #[test]
    fn test_geometry_mismatch() {
        let catalog = catalog_with(&[]);
        let small = Geometry {
            sides: 1,
            tracks: 40,
            layout: Layout::Linear,
        };
        let warnings = validate(&catalog, &small);
        assert!(
            warnings
                .iter()
                .any(|w| w.kind == WarningKind::GeometryMismatch)
        );
    }

    #[test]
    fn test_warn_modes() {
        let catalog = catalog_with(&[(b"A", b'$', 10 * 256, 100), (b"B", b'$', 10 * 256, 105)]);
        let all = validate(&catalog, &geometry());
        assert!(all.len() >= 2);
        assert_eq!(apply_mode(all.clone(), WarnMode::None).len(), 0);
        assert_eq!(apply_mode(all.clone(), WarnMode::First).len(), 1);
        assert_eq!(apply_mode(all.clone(), WarnMode::All).len(), all.len());
    }
}
