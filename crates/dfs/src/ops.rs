//! File-granularity operations: import, export, cross-image copy, layout
//! conversion, and digests.
//!
//! Everything here is composed from [`Image`] primitives. Host-side
//! concerns (filename translation, `.inf` parsing, pattern syntax) stay
//! outside the engine: import consumes an already-parsed metadata record,
//! and copy matching is driven by a caller-supplied predicate.

use std::path::Path;

use digest::Digest;
use log::{info, warn};

use crate::context::OpContext;
use crate::geom::{Geometry, Layout};
use crate::image::{AddOptions, Image, NewFile};
use crate::side::Entry;
use crate::store::{Access, ImageStore, OpenMode};
use crate::{Error, Result};

/// When sidecar metadata is consulted on import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InfPolicy {
    /// Ignore sidecar metadata even when present.
    Never,
    /// Use sidecar metadata when present, fall back otherwise.
    #[default]
    Auto,
    /// Require sidecar metadata; fail without it.
    Always,
}

/// Parsed sidecar (or explicit) metadata for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMeta {
    pub name: String,
    pub dir: u8,
    pub load_addr: u32,
    pub exec_addr: u32,
    pub locked: bool,
}

impl From<&Entry> for FileMeta {
    fn from(entry: &Entry) -> Self {
        FileMeta {
            name: entry.name.clone(),
            dir: entry.dir,
            load_addr: entry.load_addr,
            exec_addr: entry.exec_addr,
            locked: entry.locked,
        }
    }
}

/// Options for [`import`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportOptions {
    pub inf: InfPolicy,
    pub add: AddOptions,
}

/// Imports one file. `fallback` carries the catalog identity derived from
/// the host side (translated name, default addresses); `meta` is the
/// sidecar record when one was found.
pub fn import(
    image: &mut Image,
    side: u8,
    fallback: &FileMeta,
    meta: Option<&FileMeta>,
    data: &[u8],
    opts: &ImportOptions,
) -> Result<()> {
    let meta = match (meta, opts.inf) {
        (Some(meta), InfPolicy::Auto | InfPolicy::Always) => meta,
        (None, InfPolicy::Always) => {
            return Err(Error::InfMissing(fallback.name.clone()));
        }
        _ => fallback,
    };
    image.add_file(
        side,
        &NewFile {
            name: &meta.name,
            dir: meta.dir,
            load_addr: meta.load_addr,
            exec_addr: meta.exec_addr,
            locked: meta.locked,
        },
        data,
        &opts.add,
    )
}

/// A file read out of an image together with its metadata.
#[derive(Debug, Clone)]
pub struct Exported {
    pub meta: FileMeta,
    pub data: Vec<u8>,
}

/// Exports `(dir, name)` from `side`.
pub fn export(image: &mut Image, side: u8, dir: u8, name: &str) -> Result<Exported> {
    let index = image
        .side(side)
        .find(dir, name)
        .ok_or_else(|| Error::NotFound(format!("{}.{name}", dir as char)))?;
    let meta = FileMeta::from(&image.side(side).entries()[index]);
    let data = image.read_entry_data(side, index)?;
    Ok(Exported { meta, data })
}

/// Options for [`copy_over`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyOptions {
    pub replace: bool,
    pub ignore_access: bool,
    /// Carry the locked attribute onto the destination.
    pub preserve_attr: bool,
}

/// Outcome counts of a [`copy_over`] batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyStats {
    pub copied: usize,
    pub skipped: usize,
}

/// Copies every source entry accepted by `matcher` into the destination
/// side. With `continue_on_error` set, per-file collisions and space
/// failures are logged and counted instead of aborting the batch.
pub fn copy_over(
    src: &mut Image,
    src_side: u8,
    dest: &mut Image,
    dest_side: u8,
    matcher: &dyn Fn(&Entry) -> bool,
    opts: &CopyOptions,
    ctx: &OpContext,
) -> Result<CopyStats> {
    let matching: Vec<usize> = src
        .side(src_side)
        .entries()
        .iter()
        .enumerate()
        .filter(|(_, entry)| matcher(entry))
        .map(|(i, _)| i)
        .collect();

    let mut stats = CopyStats::default();
    for index in matching {
        let entry = src.side(src_side).entries()[index].clone();
        let data = src.read_entry_data(src_side, index)?;
        let result = dest.add_file(
            dest_side,
            &NewFile {
                name: &entry.name,
                dir: entry.dir,
                load_addr: entry.load_addr,
                exec_addr: entry.exec_addr,
                locked: opts.preserve_attr && entry.locked,
            },
            &data,
            &AddOptions {
                replace: opts.replace,
                ignore_access: opts.ignore_access,
                compact: false,
            },
        );
        match result {
            Ok(()) => stats.copied += 1,
            Err(err) if ctx.continue_on_error && is_per_file(&err) => {
                warn!("skipping {}: {err}", entry.full_name());
                stats.skipped += 1;
            }
            Err(err) => return Err(err),
        }
    }
    info!(
        "copied {} file(s), skipped {}",
        stats.copied, stats.skipped
    );
    Ok(stats)
}

fn is_per_file(err: &Error) -> bool {
    matches!(
        err,
        Error::Exists(_) | Error::Locked(_) | Error::NoSpace(_) | Error::Full | Error::NotFound(_)
    )
}

/// Rewrites the image at a different side layout; every logical sector of
/// every side keeps its content, only its file offset changes.
pub fn convert(src: &mut Image, dest_path: &Path, layout: Layout, mode: OpenMode) -> Result<()> {
    let dest_geometry = Geometry {
        layout,
        ..src.geometry()
    };
    let mut dest = ImageStore::open(dest_path, mode, Access::ReadWrite)?;
    let side_count = src.side_count() as usize;
    copy_surface(src, &mut dest, &dest_geometry, &[0, 1][..side_count])?;
    dest.flush()?;
    info!("converted to {} layout at {}", layout, dest_path.display());
    Ok(())
}

/// Extracts one side into a fresh single-sided linear image.
pub fn extract_side(src: &mut Image, side: u8, dest_path: &Path, mode: OpenMode) -> Result<()> {
    let dest_geometry = Geometry {
        sides: 1,
        tracks: src.geometry().tracks,
        layout: Layout::Linear,
    };
    let mut dest = ImageStore::open(dest_path, mode, Access::ReadWrite)?;
    let sectors = src.geometry().sectors_per_side();
    for sector in 0..sectors {
        let bytes = src.read_sectors(side, sector, 1)?;
        dest.write_at(dest_geometry.sector_offset(0, sector)?, &bytes)?;
    }
    dest.flush()?;
    Ok(())
}

fn copy_surface(
    src: &mut Image,
    dest: &mut ImageStore,
    dest_geometry: &Geometry,
    sides: &[u8],
) -> Result<()> {
    let sectors = src.geometry().sectors_per_side();
    for (dest_side, &src_side) in sides.iter().enumerate() {
        for sector in 0..sectors {
            let bytes = src.read_sectors(src_side, sector, 1)?;
            dest.write_at(
                dest_geometry.sector_offset(dest_side as u8, sector)?,
                &bytes,
            )?;
        }
    }
    Ok(())
}

/// What a per-file digest covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DigestMode {
    /// File data only.
    #[default]
    Data,
    /// Data plus load and execution addresses.
    DataAddrs,
    /// Data plus addresses plus the locked attribute.
    DataAttrs,
}

/// What a side-level digest covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SideDigestMode {
    /// The entire side surface as stored.
    #[default]
    Surface,
    /// Catalog sectors plus every file region, in ascending sector order.
    Used,
    /// File contents in catalog-name order, with their identities.
    Files,
}

/// Digest of one file under `mode`. The hash primitive is pluggable; any
/// [`digest::Digest`] works.
pub fn file_digest<D: Digest>(
    image: &mut Image,
    side: u8,
    dir: u8,
    name: &str,
    mode: DigestMode,
) -> Result<Vec<u8>> {
    let exported = export(image, side, dir, name)?;
    let mut hasher = D::new();
    hasher.update(&exported.data);
    if matches!(mode, DigestMode::DataAddrs | DigestMode::DataAttrs) {
        hasher.update(exported.meta.load_addr.to_le_bytes());
        hasher.update(exported.meta.exec_addr.to_le_bytes());
    }
    if mode == DigestMode::DataAttrs {
        hasher.update([exported.meta.locked as u8]);
    }
    Ok(hasher.finalize().to_vec())
}

/// Digest of a whole side under `mode`.
pub fn side_digest<D: Digest>(image: &mut Image, side: u8, mode: SideDigestMode) -> Result<Vec<u8>> {
    let mut hasher = D::new();
    match mode {
        SideDigestMode::Surface => {
            let sectors = image.geometry().sectors_per_side();
            for sector in 0..sectors {
                hasher.update(image.read_sectors(side, sector, 1)?);
            }
        }
        SideDigestMode::Used => {
            hasher.update(image.read_sectors(side, 0, 2)?);
            let mut regions: Vec<(u16, u16)> = image
                .side(side)
                .entries()
                .iter()
                .filter(|e| e.sectors() > 0)
                .map(|e| (e.start_sector, e.sectors()))
                .collect();
            regions.sort_unstable();
            for (start, count) in regions {
                hasher.update(image.read_sectors(side, start, count)?);
            }
        }
        SideDigestMode::Files => {
            let mut order: Vec<usize> = (0..image.side(side).entries().len()).collect();
            order.sort_by_key(|&i| {
                let entry = &image.side(side).entries()[i];
                (
                    entry.dir.to_ascii_uppercase(),
                    entry.name.to_ascii_uppercase(),
                )
            });
            for index in order {
                let entry = image.side(side).entries()[index].clone();
                hasher.update([entry.dir.to_ascii_uppercase(), b'.']);
                hasher.update(entry.name.to_ascii_uppercase().as_bytes());
                hasher.update([0u8]);
                hasher.update(image.read_entry_data(side, index)?);
            }
        }
    }
    Ok(hasher.finalize().to_vec())
}

/// Digest of a raw logical-sector range, as stored on disk.
pub fn sector_digest<D: Digest>(
    image: &mut Image,
    side: u8,
    start: u16,
    count: u16,
) -> Result<Vec<u8>> {
    let bytes = image.read_sectors(side, start, count)?;
    let mut hasher = D::new();
    hasher.update(&bytes);
    Ok(hasher.finalize().to_vec())
}

/// Concrete hash algorithms offered at the tool surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashAlgorithm {
    #[default]
    Sha1,
    Sha256,
}

/// Enum-dispatched variant of [`file_digest`] for non-generic callers.
pub fn file_digest_with(
    algo: HashAlgorithm,
    image: &mut Image,
    side: u8,
    dir: u8,
    name: &str,
    mode: DigestMode,
) -> Result<Vec<u8>> {
    match algo {
        HashAlgorithm::Sha1 => file_digest::<sha1::Sha1>(image, side, dir, name, mode),
        HashAlgorithm::Sha256 => file_digest::<sha2::Sha256>(image, side, dir, name, mode),
    }
}

/// Enum-dispatched variant of [`side_digest`].
pub fn side_digest_with(
    algo: HashAlgorithm,
    image: &mut Image,
    side: u8,
    mode: SideDigestMode,
) -> Result<Vec<u8>> {
    match algo {
        HashAlgorithm::Sha1 => side_digest::<sha1::Sha1>(image, side, mode),
        HashAlgorithm::Sha256 => side_digest::<sha2::Sha256>(image, side, mode),
    }
}

/// Enum-dispatched variant of [`sector_digest`].
pub fn sector_digest_with(
    algo: HashAlgorithm,
    image: &mut Image,
    side: u8,
    start: u16,
    count: u16,
) -> Result<Vec<u8>> {
    match algo {
        HashAlgorithm::Sha1 => sector_digest::<sha1::Sha1>(image, side, start, count),
        HashAlgorithm::Sha256 => sector_digest::<sha2::Sha256>(image, side, start, count),
    }
}
