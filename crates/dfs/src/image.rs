//! Image handling: one or two sides bound to a backing store.
//!
//! An [`Image`] owns its [`ImageStore`] exclusively and holds the decoded
//! [`Side`] models. All data-sector I/O and every compound mutation runs
//! through here; the sides supply the catalog state and its invariants.
//! Catalog rewrites are deferred: mutations mark a side dirty, and the
//! bytes reach the store on [`Image::save`] or [`Image::close`]. Dropping
//! an image discards unflushed catalog state.

use std::path::Path;

use dfs_fmt::{BootOption, CATALOG_ENTRIES, CATALOG_SECTORS, Catalog, SECTOR_SIZE};
use log::{debug, info};

use crate::context::OpContext;
use crate::geom::{Geometry, GeometryHint};
use crate::side::{Entry, Side, validate_dir, validate_name};
use crate::store::{Access, ImageStore, OpenMode};
use crate::validate::{self, Warning};
use crate::{Error, Result};

/// Open-time options for an image file.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenOptions {
    pub mode: OpenMode,
    pub access: Access,
    pub geometry: GeometryHint,
    /// Pad the file to its full geometry size on close.
    pub expand: bool,
    /// Truncate trailing zero sectors on close.
    pub shrink: bool,
}

/// Metadata of a file being added to a side.
#[derive(Debug, Clone)]
pub struct NewFile<'a> {
    pub name: &'a str,
    pub dir: u8,
    pub load_addr: u32,
    pub exec_addr: u32,
    pub locked: bool,
}

/// Behavior switches for [`Image::add_file`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AddOptions {
    /// Replace an existing entry with the same directory and name.
    pub replace: bool,
    /// Override locked-entry guards.
    pub ignore_access: bool,
    /// Compact the side and retry when no contiguous block fits.
    pub compact: bool,
}

/// Attribute changes for [`Image::set_attrib`]; `None` leaves a field as is.
#[derive(Debug, Clone, Copy, Default)]
pub struct AttribPatch {
    pub locked: Option<bool>,
    pub load_addr: Option<u32>,
    pub exec_addr: Option<u32>,
}

/// An open DFS image.
pub struct Image {
    store: ImageStore,
    geometry: Geometry,
    sides: Vec<Side>,
    warnings: Vec<Vec<Warning>>,
    expand_on_close: bool,
    shrink_on_close: bool,
}

impl Image {
    /// Opens an image file.
    ///
    /// A file freshly created by the `New`/`Always` open modes starts empty;
    /// it gets formatted sides from the geometry hints (single-sided 80
    /// track by default) and a blank title.
    pub fn open(path: &Path, opts: &OpenOptions, ctx: &OpContext) -> Result<Image> {
        let store = ImageStore::open(path, opts.mode, opts.access)?;
        let mut image = if store.size() == 0 && opts.mode != OpenMode::Existing {
            let hint = &opts.geometry;
            let geometry = Geometry {
                sides: hint.sides.unwrap_or(match hint.layout {
                    Some(crate::geom::Layout::Interleaved) => 2,
                    _ => 1,
                }),
                tracks: hint.tracks.unwrap_or(80),
                layout: hint.layout.unwrap_or_default(),
            };
            Image::formatted(store, geometry, b"", BootOption::None)
        } else {
            Image::from_store(store, &opts.geometry, ctx)?
        };
        image.expand_on_close = opts.expand;
        image.shrink_on_close = opts.shrink;
        Ok(image)
    }

    /// Builds an image over an already-opened store.
    pub fn from_store(mut store: ImageStore, hint: &GeometryHint, ctx: &OpContext) -> Result<Image> {
        let geometry = Geometry::infer(store.size(), hint)?;
        debug!(
            "image geometry: {} side(s), {} tracks, {} layout",
            geometry.sides, geometry.tracks, geometry.layout
        );
        let mut sides = Vec::with_capacity(geometry.sides as usize);
        let mut warnings = Vec::with_capacity(geometry.sides as usize);
        for index in 0..geometry.sides {
            let mut bytes = vec![0u8; SECTOR_SIZE * CATALOG_SECTORS];
            let offset = geometry.sector_offset(index, 0)?;
            store.read_at(offset, &mut bytes)?;
            let catalog = Catalog::decode(&bytes)?;
            let found = validate::validate(&catalog, &geometry);
            let mut side = Side::from_catalog(index, &catalog);
            side.set_valid(found.is_empty());
            validate::apply_mode(found.clone(), ctx.warn_mode);
            sides.push(side);
            warnings.push(found);
        }
        Ok(Image {
            store,
            geometry,
            sides,
            warnings,
            expand_on_close: false,
            shrink_on_close: false,
        })
    }

    /// Creates and formats a fresh image file.
    pub fn create(
        path: &Path,
        mode: OpenMode,
        geometry: Geometry,
        title: &[u8],
        boot: BootOption,
    ) -> Result<Image> {
        let store = ImageStore::open(path, mode, Access::ReadWrite)?;
        let mut image = Image::formatted(store, geometry, title, boot);
        image.save()?;
        info!("created {} ({} sides)", path.display(), geometry.sides);
        Ok(image)
    }

    /// Builds an image of freshly formatted sides over `store`; nothing is
    /// written until the catalogs are flushed.
    fn formatted(store: ImageStore, geometry: Geometry, title: &[u8], boot: BootOption) -> Image {
        let sides = (0..geometry.sides)
            .map(|i| Side::formatted(i, title, boot, geometry.sectors_per_side()))
            .collect();
        Image {
            store,
            geometry,
            sides,
            warnings: vec![Vec::new(); geometry.sides as usize],
            expand_on_close: false,
            shrink_on_close: false,
        }
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn side_count(&self) -> u8 {
        self.geometry.sides
    }

    pub fn side(&self, index: u8) -> &Side {
        &self.sides[index as usize]
    }

    /// Full validation findings for a side, as recorded at open time.
    pub fn warnings(&self, index: u8) -> &[Warning] {
        &self.warnings[index as usize]
    }

    pub fn store_size(&self) -> u64 {
        self.store.size()
    }

    /// Reads `count` logical sectors starting at `start` on `side`.
    pub fn read_sectors(&mut self, side: u8, start: u16, count: u16) -> Result<Vec<u8>> {
        self.check_range(side, start, count)?;
        let mut bytes = vec![0u8; count as usize * SECTOR_SIZE];
        for (i, chunk) in bytes.chunks_mut(SECTOR_SIZE).enumerate() {
            let offset = self.geometry.sector_offset(side, start + i as u16)?;
            self.store.read_at(offset, chunk)?;
        }
        Ok(bytes)
    }

    /// Writes `bytes` to consecutive logical sectors starting at `start`.
    /// The final sector may be partial; the store pads it.
    pub fn write_sectors(&mut self, side: u8, start: u16, bytes: &[u8]) -> Result<()> {
        let count = bytes.len().div_ceil(SECTOR_SIZE) as u16;
        self.check_range(side, start, count)?;
        for (i, chunk) in bytes.chunks(SECTOR_SIZE).enumerate() {
            let offset = self.geometry.sector_offset(side, start + i as u16)?;
            self.store.write_at(offset, chunk)?;
        }
        Ok(())
    }

    fn check_range(&self, side: u8, start: u16, count: u16) -> Result<()> {
        let limit = self.geometry.sectors_per_side();
        let end = start as u32 + count as u32;
        if side >= self.geometry.sides || end > limit as u32 {
            return Err(Error::SectorOutOfRange {
                start,
                end: end.min(u16::MAX as u32) as u16,
                limit,
            });
        }
        Ok(())
    }

    /// Reads the data of the entry at `index` on `side`.
    pub fn read_entry_data(&mut self, side: u8, index: usize) -> Result<Vec<u8>> {
        let entry = self.sides[side as usize].entries()[index].clone();
        let mut bytes = self.read_sectors(side, entry.start_sector, entry.sectors())?;
        bytes.truncate(entry.length as usize);
        Ok(bytes)
    }

    /// Adds a file to `side` per the contract of the side model.
    pub fn add_file(
        &mut self,
        side: u8,
        file: &NewFile<'_>,
        data: &[u8],
        opts: &AddOptions,
    ) -> Result<()> {
        validate_name(file.name)?;
        validate_dir(file.dir)?;
        self.require_allocation_safe(side)?;

        let full_name = format!("{}.{}", file.dir as char, file.name);
        let model = &self.sides[side as usize];
        let existing = model.find(file.dir, file.name);
        if let Some(i) = existing {
            if !opts.replace {
                return Err(Error::Exists(full_name));
            }
            if model.entries()[i].locked && !opts.ignore_access {
                return Err(Error::Locked(full_name));
            }
        } else if model.entries().len() >= CATALOG_ENTRIES {
            return Err(Error::Full);
        }

        let sectors_needed = data.len().div_ceil(SECTOR_SIZE);
        let reclaimed = existing.map_or(0, |i| model.entries()[i].sectors()) as usize;
        if (model.free_sectors() as usize + reclaimed) < sectors_needed {
            return Err(Error::NoSpace(
                sectors_needed.min(u16::MAX as usize) as u16
            ));
        }
        let sectors = sectors_needed as u16;

        // The replaced entry's region is reusable from here on. The removal
        // is undone if allocation still fails without compaction.
        let was_dirty = self.sides[side as usize].is_dirty();
        let replaced = existing.map(|i| self.sides[side as usize].remove_entry(i));

        let start = match self.sides[side as usize].allocate(sectors) {
            Some(start) => start,
            None if opts.compact => {
                self.compact_side(side)?;
                // Total free space was checked above, so the single block
                // left after compaction fits the file.
                self.sides[side as usize]
                    .allocate(sectors)
                    .ok_or(Error::NoSpace(sectors))?
            }
            None => {
                if let Some(entry) = replaced {
                    let model = &mut self.sides[side as usize];
                    model.insert_entry(entry);
                    if !was_dirty {
                        model.mark_clean();
                    }
                }
                return Err(Error::NoSpace(sectors));
            }
        };

        self.write_sectors(side, start, data)?;
        let model = &mut self.sides[side as usize];
        // DFS uppercases names on write.
        model.insert_entry(Entry {
            name: file.name.to_ascii_uppercase(),
            dir: file.dir.to_ascii_uppercase(),
            locked: file.locked,
            load_addr: file.load_addr,
            exec_addr: file.exec_addr,
            length: data.len() as u32,
            start_sector: start,
        });
        model.bump_sequence();
        debug!("added {full_name} at sector {start} ({sectors} sectors)");
        Ok(())
    }

    /// Deletes `(dir, name)` from `side`. Returns whether an entry was
    /// removed; a missing file is only an error outside `silent` mode.
    pub fn delete(
        &mut self,
        side: u8,
        dir: u8,
        name: &str,
        ignore_access: bool,
        ctx: &OpContext,
    ) -> Result<bool> {
        let model = &mut self.sides[side as usize];
        let Some(index) = model.find(dir, name) else {
            if ctx.silent {
                return Ok(false);
            }
            return Err(Error::NotFound(format!("{}.{name}", dir as char)));
        };
        if model.entries()[index].locked && !ignore_access {
            return Err(Error::Locked(model.entries()[index].full_name()));
        }
        let entry = model.remove_entry(index);
        model.bump_sequence();
        debug!("deleted {}", entry.full_name());
        Ok(true)
    }

    /// Renames `(dir, name)`; the data does not move.
    pub fn rename(
        &mut self,
        side: u8,
        from: (u8, &str),
        to: (u8, &str),
        replace: bool,
        ignore_access: bool,
    ) -> Result<()> {
        validate_name(to.1)?;
        validate_dir(to.0)?;
        let model = &mut self.sides[side as usize];
        let Some(index) = model.find(from.0, from.1) else {
            return Err(Error::NotFound(format!("{}.{}", from.0 as char, from.1)));
        };
        if model.entries()[index].locked && !ignore_access {
            return Err(Error::Locked(model.entries()[index].full_name()));
        }
        if let Some(target) = model.find(to.0, to.1) {
            if target != index {
                if !replace {
                    return Err(Error::Exists(format!("{}.{}", to.0 as char, to.1)));
                }
                if model.entries()[target].locked && !ignore_access {
                    return Err(Error::Locked(model.entries()[target].full_name()));
                }
                model.remove_entry(target);
            }
        }
        // Removal above may have shifted the source index.
        let index = model
            .find(from.0, from.1)
            .ok_or_else(|| Error::NotFound(format!("{}.{}", from.0 as char, from.1)))?;
        let entry = model.entry_mut(index);
        entry.dir = to.0.to_ascii_uppercase();
        entry.name = to.1.to_ascii_uppercase();
        model.bump_sequence();
        Ok(())
    }

    /// Applies attribute changes to `(dir, name)`.
    pub fn set_attrib(&mut self, side: u8, dir: u8, name: &str, patch: &AttribPatch) -> Result<()> {
        let model = &mut self.sides[side as usize];
        let Some(index) = model.find(dir, name) else {
            return Err(Error::NotFound(format!("{}.{name}", dir as char)));
        };
        let entry = model.entry_mut(index);
        if let Some(locked) = patch.locked {
            entry.locked = locked;
        }
        if let Some(load) = patch.load_addr {
            entry.load_addr = load;
        }
        if let Some(exec) = patch.exec_addr {
            entry.exec_addr = exec;
        }
        model.bump_sequence();
        Ok(())
    }

    /// Repacks all file regions downward from sector 2, eliminating gaps.
    pub fn compact(&mut self, side: u8) -> Result<()> {
        self.require_allocation_safe(side)?;
        self.compact_side(side)
    }

    /// The compaction worker: moves regions, keeps originals for rollback,
    /// and only touches the entry table once every move has succeeded.
    fn compact_side(&mut self, side: u8) -> Result<()> {
        let snapshot = self.sides[side as usize].entries().to_vec();
        let mut order: Vec<usize> = (0..snapshot.len()).collect();
        order.sort_unstable_by_key(|&i| snapshot[i].start_sector);

        let mut new_entries = snapshot.clone();
        let mut moved: Vec<(u16, Vec<u8>)> = Vec::new();
        let mut cursor = CATALOG_SECTORS as u16;
        let mut failure: Option<Error> = None;

        for &i in &order {
            let entry = &snapshot[i];
            let sectors = entry.sectors();
            if entry.start_sector != cursor {
                match self.move_region(side, entry.start_sector, cursor, sectors, &mut moved) {
                    Ok(()) => new_entries[i].start_sector = cursor,
                    Err(err) => {
                        failure = Some(err);
                        break;
                    }
                }
            }
            cursor += sectors;
        }

        if let Some(err) = failure {
            // Put the original bytes back where the catalog still points.
            // Best effort: the catalog was never rewritten, so the image
            // stays consistent even if a restore write fails too.
            for (start, bytes) in moved.iter().rev() {
                let _ = self.write_sectors(side, *start, bytes);
            }
            let io = match err {
                Error::Io(io) => io,
                other => return Err(other),
            };
            return Err(Error::IoDuringCompact(io));
        }

        new_entries.sort_by(|a, b| b.start_sector.cmp(&a.start_sector));
        let model = &mut self.sides[side as usize];
        model.set_entries(new_entries);
        model.bump_sequence();
        info!("compacted side {side}: {} files repacked", snapshot.len());
        Ok(())
    }

    fn move_region(
        &mut self,
        side: u8,
        from: u16,
        to: u16,
        sectors: u16,
        moved: &mut Vec<(u16, Vec<u8>)>,
    ) -> Result<()> {
        if sectors == 0 {
            return Ok(());
        }
        let bytes = self.read_sectors(side, from, sectors)?;
        moved.push((from, bytes.clone()));
        self.write_sectors(side, to, &bytes)
    }

    /// Resets `side` to an empty catalog with the given title and boot
    /// option; the total-sector count is kept.
    pub fn format(&mut self, side: u8, title: &[u8], boot: BootOption) -> Result<()> {
        self.sides[side as usize].format(title, boot);
        self.warnings[side as usize].clear();
        Ok(())
    }

    /// Writes every dirty catalog back through the codec and store.
    pub fn save(&mut self) -> Result<()> {
        for index in 0..self.sides.len() {
            self.save_side(index as u8)?;
        }
        self.store.flush()
    }

    fn save_side(&mut self, index: u8) -> Result<()> {
        if !self.sides[index as usize].is_dirty() {
            return Ok(());
        }
        let catalog = self.sides[index as usize].to_catalog();
        let bytes = catalog.encode()?;
        let offset = self.geometry.sector_offset(index, 0)?;
        self.store.write_at(offset, &bytes)?;
        self.sides[index as usize].mark_clean();
        debug!("side {index}: catalog written (sequence {:#04x})", catalog.sector1.sequence);
        Ok(())
    }

    /// Flushes dirty sides in side-index order and releases the image.
    ///
    /// A failure on one side does not stop the attempt on the others; the
    /// first error is reported after everything has been tried.
    pub fn close(mut self) -> Result<()> {
        let mut first_error = None;
        for index in 0..self.sides.len() as u8 {
            if let Err(err) = self.save_side(index) {
                first_error.get_or_insert(err);
            }
        }
        if self.expand_on_close {
            if let Err(err) = self.store.expand(self.geometry.total_bytes()) {
                first_error.get_or_insert(err);
            }
        }
        if self.shrink_on_close {
            if let Err(err) = self.store.shrink_to_content() {
                first_error.get_or_insert(err);
            }
        }
        if let Err(err) = self.store.flush() {
            first_error.get_or_insert(err);
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Consumes the image, handing back the store (MMB slot write-back).
    pub(crate) fn into_store(mut self) -> Result<ImageStore> {
        for index in 0..self.sides.len() as u8 {
            self.save_side(index)?;
        }
        Ok(self.store)
    }

    fn require_allocation_safe(&self, side: u8) -> Result<()> {
        if self.sides[side as usize].allocation_safe() {
            Ok(())
        } else {
            Err(Error::CatalogCorrupt(format!(
                "side {side} has overlapping or out-of-range entries"
            )))
        }
    }
}
