#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! S2 cell identifiers for the rooftop tile index.
//!
//! Rooftop datasets are partitioned into files keyed by S2 cell ID at a
//! fixed level; this crate is the adapter between those 64-bit IDs and
//! `WGS84` geometry. [`CellId`] wraps a validated S2 ID and converts to
//! the cell's 4-vertex lng/lat polygon; [`Level`] bounds the subdivision
//! granularity. Both are immutable value types so CRS and validity are
//! established at construction, not inside algorithm code.

use std::fmt;
use std::str::FromStr;

use geo::{Coord, LineString, Polygon};
use s2::cell::Cell;
use s2::cellid::CellID;
use s2::latlng::LatLng;
use s2::s1::Deg;
use thiserror::Error;

/// Finest S2 subdivision level.
pub const MAX_LEVEL: u8 = 30;

/// Errors that can occur constructing cell identifiers.
#[derive(Debug, Error)]
pub enum CellError {
    /// The 64-bit value is not a valid S2 cell ID.
    #[error("invalid S2 cell ID: {id}")]
    InvalidCellId {
        /// The rejected raw value.
        id: u64,
    },

    /// The level is outside the valid S2 range.
    #[error("S2 level must be between 0 and {MAX_LEVEL}, got {level}")]
    InvalidLevel {
        /// The rejected level.
        level: u8,
    },

    /// A cell ID string did not parse as a decimal integer.
    #[error("cell ID is not a decimal integer: {input}")]
    ParseCellId {
        /// The rejected input.
        input: String,
    },
}

/// S2 subdivision level in `0..=30`. Higher levels mean smaller cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Level(u8);

impl Level {
    /// Validates and wraps a raw level.
    ///
    /// # Errors
    ///
    /// Returns [`CellError::InvalidLevel`] if `level` exceeds [`MAX_LEVEL`].
    pub const fn new(level: u8) -> Result<Self, CellError> {
        if level > MAX_LEVEL {
            Err(CellError::InvalidLevel { level })
        } else {
            Ok(Self(level))
        }
    }

    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Level {
    type Error = CellError;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        Self::new(level)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A 64-bit S2 cell identifier.
///
/// Encodes both location and level. Cells at the same level tile the
/// sphere without gaps or overlaps, which is what makes them usable as
/// keys for partitioned rooftop files. Displays as the decimal integer
/// used for tile file stems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellId(u64);

impl CellId {
    /// Validates and wraps a raw S2 cell ID.
    ///
    /// # Errors
    ///
    /// Returns [`CellError::InvalidCellId`] if the value is not a valid
    /// S2 cell ID.
    pub fn new(id: u64) -> Result<Self, CellError> {
        if CellID(id).is_valid() {
            Ok(Self(id))
        } else {
            Err(CellError::InvalidCellId { id })
        }
    }

    /// The ID of the cell containing a `WGS84` point at the given level.
    #[must_use]
    pub fn from_lng_lat(lng: f64, lat: f64, level: Level) -> Self {
        let leaf = CellID::from(LatLng::new(Deg(lat).into(), Deg(lng).into()));
        Self(leaf.parent(u64::from(level.get())).0)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Subdivision level encoded in this ID.
    #[must_use]
    pub fn level(self) -> Level {
        #[allow(clippy::cast_possible_truncation)]
        Level(CellID(self.0).level() as u8)
    }

    /// The cell's boundary as a closed 4-vertex lng/lat polygon.
    #[must_use]
    pub fn polygon(self) -> Polygon<f64> {
        let cell = Cell::from(CellID(self.0));
        let mut coords = Vec::with_capacity(5);
        for k in 0..4usize {
            let vertex = LatLng::from(cell.vertex(k));
            coords.push(Coord {
                x: vertex.lng.deg(),
                y: vertex.lat.deg(),
            });
        }
        // Close the ring by repeating the first vertex.
        coords.push(coords[0]);
        Polygon::new(LineString::from(coords), vec![])
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CellId {
    type Err = CellError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = s.parse::<u64>().map_err(|_| CellError::ParseCellId {
            input: s.to_string(),
        })?;
        Self::new(id)
    }
}

/// Resolves a batch of cell IDs to their polygons, keyed by ID.
#[must_use]
pub fn cell_polygons(cells: &[CellId]) -> Vec<(CellId, Polygon<f64>)> {
    cells.iter().map(|&cell| (cell, cell.polygon())).collect()
}
