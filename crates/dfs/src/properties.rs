//! Named property views over entries, sides and images.
//!
//! Listing and info output is driven by property names. Instead of a
//! dynamic dictionary there are three closed sets, each resolved against a
//! static name table; unknown names simply fail the lookup and the
//! rendering layer decides what to do about it.

use crate::image::Image;
use crate::side::{Entry, Side};

/// A property value as handed to the rendering layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Str(String),
    Int(u64),
    Bool(bool),
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{s}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// Per-file properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileProperty {
    Name,
    Directory,
    FullName,
    LoadAddr,
    ExecAddr,
    Length,
    StartSector,
    EndSector,
    Sectors,
    Locked,
}

const FILE_PROPS: &[(&str, FileProperty)] = &[
    ("name", FileProperty::Name),
    ("directory", FileProperty::Directory),
    ("full_name", FileProperty::FullName),
    ("load_addr", FileProperty::LoadAddr),
    ("exec_addr", FileProperty::ExecAddr),
    ("length", FileProperty::Length),
    ("start_sector", FileProperty::StartSector),
    ("end_sector", FileProperty::EndSector),
    ("sectors", FileProperty::Sectors),
    ("locked", FileProperty::Locked),
];

impl FileProperty {
    pub fn all() -> impl Iterator<Item = FileProperty> {
        FILE_PROPS.iter().map(|&(_, p)| p)
    }

    pub fn lookup(name: &str) -> Option<FileProperty> {
        FILE_PROPS
            .iter()
            .find(|(key, _)| *key == name)
            .map(|&(_, p)| p)
    }

    pub fn key(self) -> &'static str {
        FILE_PROPS
            .iter()
            .find(|&&(_, p)| p == self)
            .map(|&(key, _)| key)
            .unwrap_or("unknown")
    }

    pub fn get(self, entry: &Entry) -> Value {
        match self {
            FileProperty::Name => Value::Str(entry.name.clone()),
            FileProperty::Directory => Value::Str((entry.dir as char).to_string()),
            FileProperty::FullName => Value::Str(entry.full_name()),
            FileProperty::LoadAddr => Value::Int(entry.load_addr as u64),
            FileProperty::ExecAddr => Value::Int(entry.exec_addr as u64),
            FileProperty::Length => Value::Int(entry.length as u64),
            FileProperty::StartSector => Value::Int(entry.start_sector as u64),
            FileProperty::EndSector => Value::Int(entry.end_sector() as u64),
            FileProperty::Sectors => Value::Int(entry.sectors() as u64),
            FileProperty::Locked => Value::Bool(entry.locked),
        }
    }
}

/// Per-side properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideProperty {
    Title,
    Sequence,
    BootOption,
    TotalSectors,
    UsedSectors,
    FreeSectors,
    FileCount,
    FreeSlots,
    Valid,
}

const SIDE_PROPS: &[(&str, SideProperty)] = &[
    ("title", SideProperty::Title),
    ("sequence", SideProperty::Sequence),
    ("boot_option", SideProperty::BootOption),
    ("total_sectors", SideProperty::TotalSectors),
    ("used_sectors", SideProperty::UsedSectors),
    ("free_sectors", SideProperty::FreeSectors),
    ("file_count", SideProperty::FileCount),
    ("free_slots", SideProperty::FreeSlots),
    ("valid", SideProperty::Valid),
];

impl SideProperty {
    pub fn all() -> impl Iterator<Item = SideProperty> {
        SIDE_PROPS.iter().map(|&(_, p)| p)
    }

    pub fn lookup(name: &str) -> Option<SideProperty> {
        SIDE_PROPS
            .iter()
            .find(|(key, _)| *key == name)
            .map(|&(_, p)| p)
    }

    pub fn key(self) -> &'static str {
        SIDE_PROPS
            .iter()
            .find(|&&(_, p)| p == self)
            .map(|&(key, _)| key)
            .unwrap_or("unknown")
    }

    pub fn get(self, side: &Side) -> Value {
        match self {
            SideProperty::Title => Value::Str(side.title_string()),
            SideProperty::Sequence => Value::Int(side.sequence() as u64),
            SideProperty::BootOption => Value::Str(side.boot_option().to_string()),
            SideProperty::TotalSectors => Value::Int(side.total_sectors() as u64),
            SideProperty::UsedSectors => Value::Int(side.used_sectors() as u64),
            SideProperty::FreeSectors => Value::Int(side.free_sectors() as u64),
            SideProperty::FileCount => Value::Int(side.entries().len() as u64),
            SideProperty::FreeSlots => {
                Value::Int((dfs_fmt::CATALOG_ENTRIES - side.entries().len()) as u64)
            }
            SideProperty::Valid => Value::Bool(side.is_valid()),
        }
    }
}

/// Whole-image properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageProperty {
    Sides,
    Tracks,
    Layout,
    Size,
}

const IMAGE_PROPS: &[(&str, ImageProperty)] = &[
    ("sides", ImageProperty::Sides),
    ("tracks", ImageProperty::Tracks),
    ("layout", ImageProperty::Layout),
    ("size", ImageProperty::Size),
];

impl ImageProperty {
    pub fn all() -> impl Iterator<Item = ImageProperty> {
        IMAGE_PROPS.iter().map(|&(_, p)| p)
    }

    pub fn lookup(name: &str) -> Option<ImageProperty> {
        IMAGE_PROPS
            .iter()
            .find(|(key, _)| *key == name)
            .map(|&(_, p)| p)
    }

    pub fn key(self) -> &'static str {
        IMAGE_PROPS
            .iter()
            .find(|&&(_, p)| p == self)
            .map(|&(key, _)| key)
            .unwrap_or("unknown")
    }

    pub fn get(self, image: &Image) -> Value {
        match self {
            ImageProperty::Sides => Value::Int(image.side_count() as u64),
            ImageProperty::Tracks => Value::Int(image.geometry().tracks as u64),
            ImageProperty::Layout => Value::Str(image.geometry().layout.to_string()),
            ImageProperty::Size => Value::Int(image.store_size()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dfs_fmt::BootOption;

    #[test]
    fn test_lookup_roundtrip() {
        for prop in FileProperty::all() {
            assert_eq!(FileProperty::lookup(prop.key()), Some(prop));
        }
        for prop in SideProperty::all() {
            assert_eq!(SideProperty::lookup(prop.key()), Some(prop));
        }
        for prop in ImageProperty::all() {
            assert_eq!(ImageProperty::lookup(prop.key()), Some(prop));
        }
        assert_eq!(FileProperty::lookup("no_such_prop"), None);
    }

    #[test]
    fn test_file_values() {
        let entry = Entry {
            name: "MENU".into(),
            dir: b'$',
            locked: true,
            load_addr: 0x1900,
            exec_addr: 0x8023,
            length: 300,
            start_sector: 700,
        };
        assert_eq!(
            FileProperty::FullName.get(&entry),
            Value::Str("$.MENU".into())
        );
        assert_eq!(FileProperty::Sectors.get(&entry), Value::Int(2));
        assert_eq!(FileProperty::EndSector.get(&entry), Value::Int(702));
        assert_eq!(FileProperty::Locked.get(&entry), Value::Bool(true));
    }

    #[test]
    fn test_side_values() {
        let side = Side::formatted(0, b"GAMES", BootOption::Run, 800);
        assert_eq!(SideProperty::Title.get(&side), Value::Str("GAMES".into()));
        assert_eq!(
            SideProperty::BootOption.get(&side),
            Value::Str("RUN".into())
        );
        assert_eq!(SideProperty::FreeSectors.get(&side), Value::Int(798));
        assert_eq!(SideProperty::FreeSlots.get(&side), Value::Int(31));
    }
}
