//! Read-only access to the per-cell rooftop tile store.
//!
//! A tile store is a directory where each S2 cell maps to one
//! `{cellId}.geojson` file holding a `FeatureCollection` of rooftop
//! footprint polygons plus arbitrary attribute columns, in `WGS84`.
//! The store is an external precondition; this module only reads it.

use std::path::{Path, PathBuf};

use geo::MultiPolygon;
use geojson::GeoJson;
use rooftop_survey_boundaries::Attributes;
use rooftop_survey_cells::CellId;

use crate::MatchError;

/// File extension of tile files.
pub const TILE_EXTENSION: &str = "geojson";

/// A rooftop footprint as stored in a tile file.
#[derive(Debug, Clone)]
pub struct Rooftop {
    /// Footprint polygon, `WGS84`.
    pub geometry: MultiPolygon<f64>,
    /// Attribute columns carried through the join unchanged.
    pub attributes: Attributes,
}

/// Read-only handle to a directory of per-cell rooftop files.
#[derive(Debug, Clone)]
pub struct TileStore {
    dir: PathBuf,
}

impl TileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the tile file for a cell, whether or not it exists.
    #[must_use]
    pub fn path_for(&self, cell: CellId) -> PathBuf {
        self.dir.join(format!("{cell}.{TILE_EXTENSION}"))
    }

    /// Whether the tile file for a cell is present.
    #[must_use]
    pub fn has_tile(&self, cell: CellId) -> bool {
        self.path_for(cell).is_file()
    }

    /// Loads the rooftops stored for a cell.
    ///
    /// Non-polygon features are skipped with a warning, matching the
    /// tolerance of the boundary loader.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::MissingTileFile`] if the tile file is
    /// absent, [`MatchError::TileIo`] / [`MatchError::TileParse`] on
    /// read or parse failures.
    pub fn load(&self, cell: CellId) -> Result<Vec<Rooftop>, MatchError> {
        let path = self.path_for(cell);
        let raw = std::fs::read_to_string(&path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                MatchError::MissingTileFile { cell, path: path.clone() }
            } else {
                MatchError::TileIo { path: path.clone(), source }
            }
        })?;

        let geojson: GeoJson = raw.parse().map_err(|source| MatchError::TileParse {
            path: path.clone(),
            source,
        })?;
        let GeoJson::FeatureCollection(collection) = geojson else {
            return Err(MatchError::TileFormat {
                path,
                message: "expected a GeoJSON FeatureCollection".to_string(),
            });
        };

        let mut rooftops = Vec::with_capacity(collection.features.len());
        for feature in collection.features {
            let Some(geometry) = feature.geometry else {
                log::warn!("Skipping rooftop feature without geometry in {}", path.display());
                continue;
            };
            let geo_geom: geo::Geometry<f64> =
                geometry.try_into().map_err(|source| MatchError::TileParse {
                    path: path.clone(),
                    source,
                })?;
            let geometry = match geo_geom {
                geo::Geometry::MultiPolygon(mp) => mp,
                geo::Geometry::Polygon(p) => MultiPolygon(vec![p]),
                other => {
                    log::warn!(
                        "Skipping non-polygon rooftop feature in {}: {other:?}",
                        path.display()
                    );
                    continue;
                }
            };
            rooftops.push(Rooftop {
                geometry,
                attributes: feature.properties.unwrap_or_default(),
            });
        }

        Ok(rooftops)
    }
}

#[cfg(test)]
mod tests {
    use rooftop_survey_cells::Level;

    use super::*;

    fn test_cell() -> CellId {
        CellId::from_lng_lat(77.59, 12.97, Level::new(8).unwrap())
    }

    #[test]
    fn missing_tile_file_is_typed() {
        let store = TileStore::new(std::env::temp_dir().join("rooftop_tile_store_missing"));
        let err = store.load(test_cell()).unwrap_err();
        assert!(matches!(err, MatchError::MissingTileFile { cell, .. } if cell == test_cell()));
    }

    #[test]
    fn loads_polygon_features_and_skips_points() {
        let tmp = std::env::temp_dir().join("rooftop_tile_store_load");
        let _ = std::fs::remove_dir_all(&tmp);
        std::fs::create_dir_all(&tmp).unwrap();

        let store = TileStore::new(&tmp);
        let cell = test_cell();
        std::fs::write(
            store.path_for(cell),
            r#"{
                "type": "FeatureCollection",
                "features": [
                    {
                        "type": "Feature",
                        "properties": {"rooftop_id": 7},
                        "geometry": {
                            "type": "Polygon",
                            "coordinates": [[[77.59,12.97],[77.591,12.97],[77.591,12.971],[77.59,12.971],[77.59,12.97]]]
                        }
                    },
                    {
                        "type": "Feature",
                        "properties": {},
                        "geometry": {"type": "Point", "coordinates": [77.59, 12.97]}
                    }
                ]
            }"#,
        )
        .unwrap();

        let rooftops = store.load(cell).unwrap();
        assert_eq!(rooftops.len(), 1);
        assert_eq!(
            rooftops[0].attributes["rooftop_id"],
            serde_json::Value::from(7)
        );

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn tile_path_uses_decimal_cell_id() {
        let store = TileStore::new("/tiles");
        let cell = test_cell();
        assert_eq!(
            store.path_for(cell),
            PathBuf::from(format!("/tiles/{}.geojson", cell.get()))
        );
    }
}
