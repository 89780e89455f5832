//! Engine error type.

use thiserror::Error;

/// Everything that can go wrong inside the engine.
///
/// Validation findings are deliberately not part of this enum; they are
/// surfaced as ordered [`Warning`](crate::validate::Warning) lists and only
/// escalate to [`Error::CatalogCorrupt`] when a mutating operation depends
/// on the broken field.
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not a DFS image: {0}")]
    NotAnImage(String),

    #[error("ambiguous geometry: {0}")]
    GeometryAmbiguous(String),

    #[error("catalog corrupt: {0}")]
    CatalogCorrupt(String),

    #[error("sector {sector} out of range, side has {limit} sectors")]
    AddressOutOfRange { sector: u16, limit: u16 },

    #[error("sectors {start}..{end} out of range, side has {limit} sectors")]
    SectorOutOfRange { start: u16, end: u16, limit: u16 },

    #[error("invalid file name {0:?}")]
    NameInvalid(String),

    #[error("file name {0:?} is longer than 7 characters")]
    NameTooLong(String),

    #[error("invalid directory character {0:?}")]
    DirInvalid(char),

    #[error("file {0} already exists")]
    Exists(String),

    #[error("file {0} not found")]
    NotFound(String),

    #[error("file {0} is locked")]
    Locked(String),

    #[error("catalog is full")]
    Full,

    #[error("no room for {0} sectors")]
    NoSpace(u16),

    #[error("no uninitialized MMB slot available")]
    OutOfMmbSlots,

    #[error("MMB slot {0} is uninitialized")]
    SlotUninitialized(u16),

    #[error("sidecar metadata required but not present for {0}")]
    InfMissing(String),

    #[error("I/O failure during compaction, catalog left unchanged: {0}")]
    IoDuringCompact(std::io::Error),

    #[error("record codec error: {0}")]
    Codec(#[from] binrw::Error),
}
