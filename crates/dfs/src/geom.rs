//! Image geometry and sector addressing.
//!
//! A geometry fixes the number of sides, tracks per side, and how the sides
//! are laid out in the file: `.dsd` files interleave the two sides track by
//! track, double-sided `.ssd` files store them back to back. All addressing
//! below is in terms of a side-local logical sector number
//! `L ∈ [0, tracks × 10)`; the physical `track/sector` form is accepted as
//! `L = track × 10 + sector`.

use crate::{Error, Result, SECTOR_SIZE, SECTORS_PER_TRACK};

/// How the sides of a double-sided image share the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Layout {
    /// All tracks of side 0, then all tracks of side 1.
    #[default]
    Linear,
    /// Track 0 of side 0, track 0 of side 1, track 1 of side 0, ...
    Interleaved,
}

impl std::fmt::Display for Layout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Layout::Linear => write!(f, "linear"),
            Layout::Interleaved => write!(f, "interleaved"),
        }
    }
}

/// Caller-supplied geometry overrides for opening an image.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeometryHint {
    pub sides: Option<u8>,
    pub tracks: Option<u8>,
    pub layout: Option<Layout>,
}

/// Fixed geometry of an open image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub sides: u8,
    pub tracks: u8,
    pub layout: Layout,
}

impl Geometry {
    /// Logical sectors on one side.
    pub fn sectors_per_side(&self) -> u16 {
        self.tracks as u16 * SECTORS_PER_TRACK as u16
    }

    /// Bytes of one side at full size.
    pub fn side_bytes(&self) -> u64 {
        self.sectors_per_side() as u64 * SECTOR_SIZE as u64
    }

    /// Bytes of the whole image at full size.
    pub fn total_bytes(&self) -> u64 {
        self.side_bytes() * self.sides as u64
    }

    /// File offset of logical sector `sector` on `side`.
    pub fn sector_offset(&self, side: u8, sector: u16) -> Result<u64> {
        if side >= self.sides {
            return Err(Error::AddressOutOfRange {
                sector,
                limit: 0,
            });
        }
        let limit = self.sectors_per_side();
        if sector >= limit {
            return Err(Error::AddressOutOfRange { sector, limit });
        }
        let offset = match self.layout {
            Layout::Linear => side as u64 * self.side_bytes() + sector as u64 * SECTOR_SIZE as u64,
            Layout::Interleaved => {
                let track = sector as u64 / SECTORS_PER_TRACK as u64;
                let within = sector as u64 % SECTORS_PER_TRACK as u64;
                (track * 2 + side as u64) * SECTORS_PER_TRACK as u64 * SECTOR_SIZE as u64
                    + within * SECTOR_SIZE as u64
            }
        };
        Ok(offset)
    }

    /// File offset of the physical address `track/sector` on `side`.
    pub fn track_sector_offset(&self, side: u8, track: u8, sector: u8) -> Result<u64> {
        if sector as usize >= SECTORS_PER_TRACK {
            return Err(Error::AddressOutOfRange {
                sector: sector as u16,
                limit: SECTORS_PER_TRACK as u16,
            });
        }
        self.sector_offset(
            side,
            track as u16 * SECTORS_PER_TRACK as u16 + sector as u16,
        )
    }

    /// Infers a geometry for a file of `size` bytes.
    ///
    /// Explicit hints always win. With no hints, the smallest canonical
    /// geometry at least as large as the file is chosen, so undersized files
    /// are treated as truncated images. A 204,800-byte file is ambiguous
    /// between single-sided 80-track and double-sided 40-track; the
    /// single-sided reading wins unless `sides` says otherwise. The layout
    /// defaults to linear; interleaved needs an explicit hint.
    pub fn infer(size: u64, hint: &GeometryHint) -> Result<Geometry> {
        if hint.layout == Some(Layout::Interleaved) && hint.sides == Some(1) {
            return Err(Error::GeometryAmbiguous(
                "an interleaved image is double-sided".into(),
            ));
        }
        let sides_filter = match hint.layout {
            Some(Layout::Interleaved) => Some(2),
            _ => hint.sides,
        };
        if size == 0 {
            return Err(Error::NotAnImage("file is empty".into()));
        }

        // Ordered so that the single-sided 80-track reading of a
        // 204,800-byte file is preferred over double-sided 40-track.
        const CANDIDATES: [(u8, u8); 4] = [(1, 40), (1, 80), (2, 40), (2, 80)];
        for (sides, tracks) in CANDIDATES {
            if sides_filter.is_some_and(|s| s != sides) {
                continue;
            }
            if hint.tracks.is_some_and(|t| t != tracks) {
                continue;
            }
            // Absent a layout hint the linear reading wins for any side
            // count; the interleaved `.dsd` arrangement always takes an
            // explicit hint.
            let geometry = Geometry {
                sides,
                tracks,
                layout: hint.layout.unwrap_or_default(),
            };
            if size <= geometry.total_bytes() {
                return Ok(geometry);
            }
        }
        Err(Error::NotAnImage(format!(
            "{size} bytes does not fit any DFS geometry"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hint(sides: Option<u8>, tracks: Option<u8>, layout: Option<Layout>) -> GeometryHint {
        GeometryHint {
            sides,
            tracks,
            layout,
        }
    }

    #[test]
    fn test_linear_offsets() {
        let g = Geometry {
            sides: 2,
            tracks: 80,
            layout: Layout::Linear,
        };
        assert_eq!(g.sector_offset(0, 0).unwrap(), 0);
        assert_eq!(g.sector_offset(0, 11).unwrap(), 11 * 256);
        assert_eq!(g.sector_offset(1, 0).unwrap(), 204_800);
        assert_eq!(g.sector_offset(1, 799).unwrap(), 204_800 + 799 * 256);
    }

    #[test]
    fn test_interleaved_offsets() {
        let g = Geometry {
            sides: 2,
            tracks: 80,
            layout: Layout::Interleaved,
        };
        // Track n of side 0 sits at file track 2n, side 1 at 2n + 1.
        assert_eq!(g.sector_offset(0, 0).unwrap(), 0);
        assert_eq!(g.sector_offset(1, 0).unwrap(), 2560);
        assert_eq!(g.sector_offset(0, 10).unwrap(), 2 * 2560);
        assert_eq!(g.sector_offset(1, 10).unwrap(), 3 * 2560);
        assert_eq!(g.sector_offset(0, 15).unwrap(), 2 * 2560 + 5 * 256);
    }

    #[test]
    fn test_out_of_range() {
        let g = Geometry {
            sides: 1,
            tracks: 40,
            layout: Layout::Linear,
        };
        assert!(matches!(
            g.sector_offset(0, 400),
            Err(Error::AddressOutOfRange { sector: 400, limit: 400 })
        ));
        assert!(g.sector_offset(1, 0).is_err());
        assert!(g.track_sector_offset(0, 0, 10).is_err());
    }

    #[test]
    fn test_infer_canonical_sizes() {
        let g = Geometry::infer(102_400, &GeometryHint::default()).unwrap();
        assert_eq!((g.sides, g.tracks), (1, 40));
        // The ambiguous size resolves to single-sided 80 tracks.
        let g = Geometry::infer(204_800, &GeometryHint::default()).unwrap();
        assert_eq!((g.sides, g.tracks, g.layout), (1, 80, Layout::Linear));
        let g = Geometry::infer(409_600, &GeometryHint::default()).unwrap();
        assert_eq!((g.sides, g.tracks, g.layout), (2, 80, Layout::Linear));
        let g = Geometry::infer(409_600, &hint(None, None, Some(Layout::Interleaved))).unwrap();
        assert_eq!((g.sides, g.tracks, g.layout), (2, 80, Layout::Interleaved));
    }

    #[test]
    fn test_infer_truncated_promotes() {
        let g = Geometry::infer(512, &GeometryHint::default()).unwrap();
        assert_eq!((g.sides, g.tracks), (1, 40));
        let g = Geometry::infer(150_000, &GeometryHint::default()).unwrap();
        assert_eq!((g.sides, g.tracks), (1, 80));
    }

    #[test]
    fn test_infer_overrides() {
        // A bare double-sided override means a double-sided linear `.ssd`.
        let g = Geometry::infer(204_800, &hint(Some(2), None, None)).unwrap();
        assert_eq!((g.sides, g.tracks, g.layout), (2, 40, Layout::Linear));
        let g = Geometry::infer(204_800, &hint(Some(2), None, Some(Layout::Interleaved))).unwrap();
        assert_eq!((g.sides, g.tracks, g.layout), (2, 40, Layout::Interleaved));
        let g = Geometry::infer(204_800, &hint(None, None, Some(Layout::Interleaved))).unwrap();
        assert_eq!((g.sides, g.tracks), (2, 40));
        assert!(Geometry::infer(204_800, &hint(Some(1), Some(40), None)).is_err());
        assert!(Geometry::infer(0, &GeometryHint::default()).is_err());
        assert!(
            Geometry::infer(204_800, &hint(Some(1), None, Some(Layout::Interleaved))).is_err()
        );
    }
}
