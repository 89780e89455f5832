//! Disk-image storage engine for Acorn DFS floppies.
//!
//! This crate owns the in-memory model of a DFS volume and everything needed
//! to inspect and mutate image files safely: the backing store, sector
//! addressing across the interleaved and linear layouts, the side model with
//! its catalog invariants, a structural validator, file-granularity
//! operations, and the MMB multi-image container.
//!
//! The engine is single threaded and synchronous. An [`Image`] owns its
//! backing store exclusively; mutations update the in-memory catalog and the
//! data sectors, and the catalog itself reaches the disk only on an explicit
//! [`Image::save`] or [`Image::close`]. A dropped image discards unflushed
//! catalog state.

#![forbid(unsafe_code)]

pub mod context;
pub mod error;
pub mod geom;
pub mod image;
pub mod mmb;
pub mod ops;
pub mod properties;
pub mod side;
pub mod store;
pub mod validate;

pub use context::{OpContext, WarnMode};
pub use error::Error;
pub use geom::{Geometry, GeometryHint, Layout};
pub use image::{AddOptions, AttribPatch, Image, NewFile, OpenOptions};
pub use mmb::{MmbFile, SlotView};
pub use ops::{
    CopyOptions, CopyStats, DigestMode, Exported, FileMeta, HashAlgorithm, ImportOptions,
    InfPolicy, SideDigestMode,
};
pub use properties::{FileProperty, ImageProperty, SideProperty, Value};
pub use side::{Entry, Side};
pub use store::{Access, ImageStore, OpenMode};
pub use validate::{Warning, WarningKind};

pub use dfs_fmt::{BootOption, CATALOG_ENTRIES, CATALOG_SECTORS, SECTOR_SIZE, SECTORS_PER_TRACK};

/// Engine result type.
pub type Result<T> = std::result::Result<T, crate::Error>;
