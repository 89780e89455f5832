//! MMB archive container.
//!
//! An [`MmbFile`] owns the archive file and its decoded index: the header
//! sector (magic bytes preserved verbatim, plus the on-boot drive record)
//! and one entry per slot. Slot payloads are reached through [`SlotView`]s,
//! which borrow the container for their lifetime and route every byte back
//! through it on save; the container is not re-entered while a view is
//! open.

use std::ops::{Deref, DerefMut};
use std::path::Path;

use binrw::{BinReaderExt, BinWriterExt};
use dfs_fmt::mmb::{
    MMB_ENTRY_SIZE, MMB_ENTRY_TABLE, MMB_INDEX_SIZE, MMB_SLOT_SIZE, MMB_SLOTS, MMB_TITLE_LEN,
    MmbEntry, MmbHeaderSector, slot_offset,
};
use log::{debug, info};

pub use dfs_fmt::mmb::status;

use crate::context::OpContext;
use crate::geom::{GeometryHint, Layout};
use crate::image::Image;
use crate::store::{Access, ImageStore, OpenMode};
use crate::{Error, Result};

/// Geometry of every MMB slot: a single-sided 80-track SSD.
const SLOT_HINT: GeometryHint = GeometryHint {
    sides: Some(1),
    tracks: Some(80),
    layout: Some(Layout::Linear),
};

/// An open MMB archive.
pub struct MmbFile {
    store: ImageStore,
    header: MmbHeaderSector,
    entries: Vec<MmbEntry>,
    dirty: bool,
}

impl MmbFile {
    /// Creates a fresh archive: full-size index plus 511 zero-filled slots,
    /// all marked uninitialized.
    pub fn create(path: &Path) -> Result<MmbFile> {
        let mut store = ImageStore::open(path, OpenMode::New, Access::ReadWrite)?;
        store.set_len(MMB_INDEX_SIZE + MMB_SLOTS as u64 * MMB_SLOT_SIZE)?;
        let mut mmb = MmbFile {
            store,
            header: MmbHeaderSector::new(),
            entries: vec![MmbEntry::EMPTY; MMB_SLOTS as usize],
            dirty: true,
        };
        mmb.save()?;
        info!("created MMB archive {} ({MMB_SLOTS} slots)", path.display());
        Ok(mmb)
    }

    /// Opens an existing archive and decodes its index region.
    pub fn open(path: &Path, access: Access) -> Result<MmbFile> {
        let mut store = ImageStore::open(path, OpenMode::Existing, access)?;
        if store.size() < MMB_INDEX_SIZE {
            return Err(Error::NotAnImage(format!(
                "{} is too small to hold an MMB index",
                path.display()
            )));
        }
        let mut sector = vec![0u8; dfs_fmt::SECTOR_SIZE];
        store.read_at(0, &mut sector)?;
        let header: MmbHeaderSector = binrw::io::Cursor::new(&sector).read_le()?;

        let mut table = vec![0u8; MMB_SLOTS as usize * MMB_ENTRY_SIZE as usize];
        store.read_at(MMB_ENTRY_TABLE, &mut table)?;
        let mut cursor = binrw::io::Cursor::new(&table);
        let mut entries = Vec::with_capacity(MMB_SLOTS as usize);
        for _ in 0..MMB_SLOTS {
            entries.push(cursor.read_le::<MmbEntry>()?);
        }
        Ok(MmbFile {
            store,
            header,
            entries,
            dirty: false,
        })
    }

    fn check_index(&self, index: u16) -> Result<()> {
        if (1..=MMB_SLOTS).contains(&index) {
            Ok(())
        } else {
            Err(Error::AddressOutOfRange {
                sector: index,
                limit: MMB_SLOTS,
            })
        }
    }

    /// The index entry of slot `index` (1-based).
    pub fn entry(&self, index: u16) -> Result<&MmbEntry> {
        self.check_index(index)?;
        Ok(&self.entries[index as usize - 1])
    }

    /// All entries, slot 1 first.
    pub fn entries(&self) -> &[MmbEntry] {
        &self.entries
    }

    /// The on-boot record: slot index per drive 0–3.
    pub fn onboot(&self) -> [u16; 4] {
        self.header.onboot
    }

    /// Points drive 0–3 at `slot` for boot.
    pub fn set_onboot(&mut self, drive: u8, slot: u16) -> Result<()> {
        if drive > 3 {
            return Err(Error::AddressOutOfRange {
                sector: drive as u16,
                limit: 4,
            });
        }
        self.check_index(slot)?;
        self.header.onboot[drive as usize] = slot;
        self.dirty = true;
        Ok(())
    }

    /// Lowest uninitialized slot.
    pub fn find_free(&self) -> Result<u16> {
        self.entries
            .iter()
            .position(|e| !e.is_initialized())
            .map(|i| i as u16 + 1)
            .ok_or(Error::OutOfMmbSlots)
    }

    /// Marks a slot uninitialized. The payload bytes are retained, so a
    /// later [`Self::drestore`] brings the image back. Killing a locked
    /// slot requires `dunlock`.
    pub fn dkill(&mut self, index: u16, dunlock: bool) -> Result<()> {
        self.check_index(index)?;
        let entry = &mut self.entries[index as usize - 1];
        if entry.is_locked() && !dunlock {
            return Err(Error::Locked(format!("slot {index}")));
        }
        entry.status = status::UNINITIALIZED;
        self.dirty = true;
        debug!("slot {index} marked uninitialized");
        Ok(())
    }

    /// Marks a slot initialized again, optionally locked.
    pub fn drestore(&mut self, index: u16, dlock: bool) -> Result<()> {
        self.check_index(index)?;
        let entry = &mut self.entries[index as usize - 1];
        entry.status = if dlock { status::LOCKED } else { status::UNLOCKED };
        self.dirty = true;
        debug!("slot {index} restored{}", if dlock { " (locked)" } else { "" });
        Ok(())
    }

    /// Overwrites the title of a slot's index entry.
    pub fn set_title(&mut self, index: u16, title: &[u8]) -> Result<()> {
        self.check_index(index)?;
        self.entries[index as usize - 1].set_title(title);
        self.dirty = true;
        Ok(())
    }

    /// Re-reads the DFS title of every initialized slot into the index.
    /// Returns how many entries were rewritten.
    pub fn drecat(&mut self) -> Result<usize> {
        let mut updated = 0;
        for index in 1..=MMB_SLOTS {
            if !self.entries[index as usize - 1].is_initialized() {
                continue;
            }
            let title = self.read_slot_title(index)?;
            let entry = &mut self.entries[index as usize - 1];
            if entry.title != title {
                entry.title = title;
                self.dirty = true;
                updated += 1;
            }
        }
        info!("drecat: {updated} title(s) refreshed");
        Ok(updated)
    }

    fn read_slot_title(&mut self, index: u16) -> Result<[u8; MMB_TITLE_LEN]> {
        let base = slot_offset(index);
        let mut title = [0u8; MMB_TITLE_LEN];
        self.store.read_at(base, &mut title[..8])?;
        self.store
            .read_at(base + dfs_fmt::SECTOR_SIZE as u64, &mut title[8..])?;
        Ok(title)
    }

    /// Inserts an SSD payload into `slot` (or the first free slot), marks
    /// it initialized and records its title.
    pub fn dput(&mut self, slot: Option<u16>, ssd: &[u8]) -> Result<u16> {
        if ssd.len() as u64 > MMB_SLOT_SIZE {
            return Err(Error::NotAnImage(format!(
                "{} bytes does not fit a {MMB_SLOT_SIZE} byte MMB slot",
                ssd.len()
            )));
        }
        let index = match slot {
            Some(index) => {
                self.check_index(index)?;
                index
            }
            None => self.find_free()?,
        };
        let base = slot_offset(index);
        self.store.write_at(base, ssd)?;
        // Zero the remainder so a shorter image does not inherit stale
        // bytes from the slot's previous occupant.
        if (ssd.len() as u64) < MMB_SLOT_SIZE {
            let tail = vec![0u8; (MMB_SLOT_SIZE - ssd.len() as u64) as usize];
            self.store.write_at(base + ssd.len() as u64, &tail)?;
        }
        let title = self.read_slot_title(index)?;
        let entry = &mut self.entries[index as usize - 1];
        entry.title = title;
        entry.status = status::UNLOCKED;
        self.dirty = true;
        info!("slot {index}: image inserted");
        Ok(index)
    }

    /// Reads the full payload of an initialized slot.
    pub fn dget(&mut self, index: u16) -> Result<Vec<u8>> {
        self.check_index(index)?;
        if !self.entries[index as usize - 1].is_initialized() {
            return Err(Error::SlotUninitialized(index));
        }
        let mut bytes = vec![0u8; MMB_SLOT_SIZE as usize];
        self.store.read_at(slot_offset(index), &mut bytes)?;
        Ok(bytes)
    }

    /// Opens slot `index` as an image. The view borrows the container; the
    /// slot bytes are written back on [`SlotView::save`] and discarded
    /// otherwise.
    pub fn image(&mut self, index: u16, ctx: &OpContext) -> Result<SlotView<'_>> {
        self.check_index(index)?;
        let entry = &self.entries[index as usize - 1];
        if !entry.is_initialized() {
            return Err(Error::SlotUninitialized(index));
        }
        let writable = self.store.writable() && !entry.is_locked();
        let mut bytes = vec![0u8; MMB_SLOT_SIZE as usize];
        self.store.read_at(slot_offset(index), &mut bytes)?;
        let image = Image::from_store(ImageStore::from_vec(bytes, writable), &SLOT_HINT, ctx)?;
        Ok(SlotView {
            mmb: self,
            index,
            image,
        })
    }

    /// Writes the index region back when dirty.
    pub fn save(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        let mut sector = binrw::io::Cursor::new(Vec::with_capacity(dfs_fmt::SECTOR_SIZE));
        sector.write_le(&self.header)?;
        self.store.write_at(0, &sector.into_inner())?;

        let mut table =
            binrw::io::Cursor::new(Vec::with_capacity(MMB_SLOTS as usize * MMB_ENTRY_SIZE as usize));
        for entry in &self.entries {
            table.write_le(entry)?;
        }
        self.store.write_at(MMB_ENTRY_TABLE, &table.into_inner())?;
        self.store.flush()?;
        self.dirty = false;
        Ok(())
    }

    /// Saves and releases the archive.
    pub fn close(mut self) -> Result<()> {
        self.save()
    }

    pub(crate) fn write_slot(&mut self, index: u16, bytes: &[u8]) -> Result<()> {
        self.store.write_at(slot_offset(index), bytes)
    }
}

/// A lifetime-bounded image view over one MMB slot.
///
/// Derefs to [`Image`]; catalog mutations work exactly as on a standalone
/// image. Nothing reaches the archive until [`SlotView::save`].
pub struct SlotView<'a> {
    mmb: &'a mut MmbFile,
    index: u16,
    image: Image,
}

impl SlotView<'_> {
    pub fn slot(&self) -> u16 {
        self.index
    }

    /// Flushes the image and writes the slot window back through the
    /// container, refreshing the index title.
    pub fn save(self) -> Result<()> {
        let SlotView { mmb, index, image } = self;
        let store = image.into_store()?;
        let bytes = store
            .as_memory()
            .ok_or_else(|| Error::NotAnImage("slot view lost its buffer".into()))?;
        mmb.write_slot(index, bytes)?;
        let title = mmb.read_slot_title(index)?;
        mmb.entries[index as usize - 1].title = title;
        mmb.dirty = true;
        mmb.save()
    }
}

impl Deref for SlotView<'_> {
    type Target = Image;

    fn deref(&self) -> &Self::Target {
        &self.image
    }
}

impl DerefMut for SlotView<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.image
    }
}
