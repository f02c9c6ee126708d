#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Survey-area boundary tables.
//!
//! A [`BoundarySet`] is the polygon-plus-attributes input consumed by the
//! coverage solver and the tiled matcher: each [`Boundary`] carries a
//! `WGS84` multi-polygon and arbitrary attribute columns (e.g. a PSU
//! identifier). The set carries an explicit CRS tag so the coordinate
//! system precondition can be checked up front instead of deep inside
//! geometry code.

use geo::MultiPolygon;
use geojson::GeoJson;
use thiserror::Error;

/// Arbitrary attribute columns attached to a boundary or rooftop row.
pub type Attributes = serde_json::Map<String, serde_json::Value>;

/// Errors that can occur while constructing or validating boundary tables.
#[derive(Debug, Error)]
pub enum BoundaryError {
    /// The input geometry is not tagged as WGS84 (EPSG:4326).
    #[error("boundaries must be in WGS84 (EPSG:4326), found {found:?}")]
    InvalidCrs {
        /// CRS code that was found, or `None` if no CRS was set.
        found: Option<String>,
    },

    /// `GeoJSON` parsing or conversion failed.
    #[error("GeoJSON error: {0}")]
    Geojson(#[from] geojson::Error),

    /// The input contained geometry this pipeline cannot use.
    #[error("unsupported geometry: {message}")]
    Geometry {
        /// Description of what went wrong.
        message: String,
    },
}

/// Coordinate reference system tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Crs {
    /// WGS84 geographic coordinates (EPSG:4326), longitude/latitude degrees.
    Wgs84,
    /// Any other CRS, identified by its authority code (e.g. "EPSG:3857").
    Other(String),
}

impl Crs {
    /// Authority code for this CRS.
    #[must_use]
    pub fn code(&self) -> &str {
        match self {
            Self::Wgs84 => "EPSG:4326",
            Self::Other(code) => code,
        }
    }
}

/// A single survey-area polygon with its attribute columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Boundary {
    /// Boundary geometry in the CRS of the owning [`BoundarySet`].
    pub geometry: MultiPolygon<f64>,
    /// Attribute columns carried through spatial joins unchanged.
    pub attributes: Attributes,
}

impl Boundary {
    #[must_use]
    pub const fn new(geometry: MultiPolygon<f64>, attributes: Attributes) -> Self {
        Self {
            geometry,
            attributes,
        }
    }
}

/// A collection of boundaries with an explicit CRS tag.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundarySet {
    crs: Option<Crs>,
    boundaries: Vec<Boundary>,
}

impl BoundarySet {
    #[must_use]
    pub const fn new(crs: Option<Crs>, boundaries: Vec<Boundary>) -> Self {
        Self { crs, boundaries }
    }

    /// Constructs a set tagged as WGS84.
    #[must_use]
    pub const fn wgs84(boundaries: Vec<Boundary>) -> Self {
        Self::new(Some(Crs::Wgs84), boundaries)
    }

    /// Parses a `GeoJSON` `FeatureCollection` of polygons into a boundary set.
    ///
    /// `GeoJSON` coordinates are WGS84 per RFC 7946, so the result is tagged
    /// [`Crs::Wgs84`]. Features without geometry, or with non-polygon
    /// geometry, are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`BoundaryError`] if the input is not valid `GeoJSON` or is
    /// not a `FeatureCollection`.
    pub fn from_geojson_str(input: &str) -> Result<Self, BoundaryError> {
        let geojson: GeoJson = input.parse()?;
        let GeoJson::FeatureCollection(collection) = geojson else {
            return Err(BoundaryError::Geometry {
                message: "expected a GeoJSON FeatureCollection".to_string(),
            });
        };

        let mut boundaries = Vec::with_capacity(collection.features.len());
        for feature in collection.features {
            let Some(geometry) = feature.geometry else {
                log::warn!("Skipping boundary feature without geometry");
                continue;
            };
            let geo_geom: geo::Geometry<f64> = geometry.try_into()?;
            let multi_polygon = match geo_geom {
                geo::Geometry::MultiPolygon(mp) => mp,
                geo::Geometry::Polygon(p) => MultiPolygon(vec![p]),
                other => {
                    log::warn!("Skipping non-polygon boundary feature: {other:?}");
                    continue;
                }
            };
            boundaries.push(Boundary::new(
                multi_polygon,
                feature.properties.unwrap_or_default(),
            ));
        }

        Ok(Self::wgs84(boundaries))
    }

    /// CRS tag of this set, if one was declared.
    #[must_use]
    pub const fn crs(&self) -> Option<&Crs> {
        self.crs.as_ref()
    }

    /// Checks the WGS84 precondition shared by all geometry operations.
    ///
    /// # Errors
    ///
    /// Returns [`BoundaryError::InvalidCrs`] if the set has no CRS or a
    /// CRS other than EPSG:4326.
    pub fn ensure_wgs84(&self) -> Result<(), BoundaryError> {
        if matches!(self.crs, Some(Crs::Wgs84)) {
            Ok(())
        } else {
            Err(BoundaryError::InvalidCrs {
                found: self.crs.as_ref().map(|crs| crs.code().to_string()),
            })
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.boundaries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.boundaries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Boundary> {
        self.boundaries.iter()
    }
}

impl<'a> IntoIterator for &'a BoundarySet {
    type Item = &'a Boundary;
    type IntoIter = std::slice::Iter<'a, Boundary>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
