#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Iterative S2 cell coverage solver.
//!
//! Computes the set of S2 cells, at a fixed level, whose union fully
//! contains every boundary in a [`BoundarySet`]. A single
//! point-to-cell lookup per area is not enough: an area that straddles
//! a cell border leaves "spillover" outside that point's cell. The
//! solver therefore runs a fixed point over the leftover regions (map
//! an interior point of each leftover to its cell, subtract the new
//! cell polygons, repeat on whatever remains) until no above-tolerance
//! leftover area is left. Used to decide which per-cell rooftop tile
//! files a set of survey areas needs.

pub mod progress;

use std::collections::BTreeSet;
use std::sync::Arc;

use geo::{Area, BooleanOps, InteriorPoint, MultiPolygon, Point};
use rooftop_survey_boundaries::{BoundaryError, BoundarySet};
use rooftop_survey_cells::{CellId, Level};
use thiserror::Error;

pub use crate::progress::{CoverageProgress, NullCoverageProgress, null_progress};

/// Leftover regions with less area than this (in square degrees) are
/// treated as floating-point residue and discarded.
pub const AREA_TOLERANCE: f64 = 1e-12;

/// Default bound on coverage rounds before giving up.
pub const DEFAULT_MAX_ROUNDS: usize = 64;

/// Errors that can occur during coverage computation.
#[derive(Debug, Error)]
pub enum CoverageError {
    /// Input boundaries failed the WGS84 precondition.
    #[error("CRS error: {0}")]
    Crs(#[from] BoundaryError),

    /// The covering loop exceeded its round bound. Each round shrinks
    /// the leftover, but degenerate geometry or floating-point residue
    /// could stall progress; the bound turns that into a typed failure.
    #[error("coverage did not converge after {rounds} round(s), {leftover_count} leftover region(s) remain")]
    DidNotConverge {
        /// Rounds executed before giving up.
        rounds: usize,
        /// Leftover regions still uncovered.
        leftover_count: usize,
    },
}

/// Options for [`covering_cells`].
#[derive(Debug, Clone)]
pub struct CoverageOptions {
    /// S2 level of the cells in the covering. Must match the level the
    /// tiled dataset was produced at, or lookups silently miss data.
    pub level: Level,
    /// Maximum coverage rounds before [`CoverageError::DidNotConverge`].
    pub max_rounds: usize,
    /// Drop cell IDs already accumulated in earlier rounds. Defaults to
    /// `false`, which reproduces the reference accumulation where the
    /// same cell can appear twice; the union is idempotent either way.
    pub dedupe_cells: bool,
}

impl CoverageOptions {
    #[must_use]
    pub const fn new(level: Level) -> Self {
        Self {
            level,
            max_rounds: DEFAULT_MAX_ROUNDS,
            dedupe_cells: false,
        }
    }
}

/// Unique cell IDs containing the given `WGS84` points, in first-seen
/// order. Multiple points may fall in the same cell.
#[must_use]
pub fn cells_containing_points(points: &[Point<f64>], level: Level) -> Vec<CellId> {
    let mut seen = BTreeSet::new();
    let mut cells = Vec::new();
    for point in points {
        let cell = CellId::from_lng_lat(point.x(), point.y(), level);
        if seen.insert(cell) {
            cells.push(cell);
        }
    }
    cells
}

/// Computes the cell IDs whose union fully covers every area in `areas`.
///
/// Round 1 maps an interior point of each area to its containing cell;
/// each later round does the same for the still-uncovered leftover
/// regions and subtracts the new cell polygons from them. Seeding from
/// interior points (not centroids) guarantees the chosen cell overlaps
/// its region, so every round strictly shrinks the leftover; a centroid
/// can fall in a hole or outside a concave region entirely and stall
/// the loop. Disconnected leftovers are tracked piecewise so every
/// piece gets its own seed point in the next round. The accumulated ID
/// list is returned in discovery order and,
/// unless [`CoverageOptions::dedupe_cells`] is set, may repeat a cell
/// that two different rounds landed in.
///
/// # Errors
///
/// Returns [`CoverageError::Crs`] if `areas` is not tagged WGS84, before
/// any geometry computation, and [`CoverageError::DidNotConverge`] if
/// the loop exceeds `options.max_rounds`.
pub fn covering_cells(
    areas: &BoundarySet,
    options: &CoverageOptions,
    progress: &Arc<dyn CoverageProgress>,
) -> Result<Vec<CellId>, CoverageError> {
    areas.ensure_wgs84()?;
    if areas.is_empty() {
        return Ok(Vec::new());
    }

    let working: Vec<MultiPolygon<f64>> =
        areas.iter().map(|boundary| boundary.geometry.clone()).collect();
    let seeds = region_seed_points(&working);
    let mut cells = cells_containing_points(&seeds, options.level);
    let mut leftovers = subtract_cells(working, &cells);
    progress.round(1, leftovers.len(), cells.len());
    log::debug!(
        "Coverage round 1: {} cell(s), {} leftover region(s)",
        cells.len(),
        leftovers.len()
    );

    let mut round = 1_usize;
    while !leftovers.is_empty() {
        round += 1;
        if round > options.max_rounds {
            return Err(CoverageError::DidNotConverge {
                rounds: options.max_rounds,
                leftover_count: leftovers.len(),
            });
        }

        let seeds = region_seed_points(&leftovers);
        let new_cells = cells_containing_points(&seeds, options.level);
        let added = append_cells(&mut cells, &new_cells, options.dedupe_cells);
        leftovers = subtract_cells(leftovers, &new_cells);
        progress.round(round, leftovers.len(), added);
        log::debug!(
            "Coverage round {round}: {added} cell(s) added, {} leftover region(s)",
            leftovers.len()
        );
    }

    log::info!("Coverage converged after {round} round(s) with {} cell(s)", cells.len());
    Ok(cells)
}

/// A point strictly inside each region. Unlike a centroid, an interior
/// point of a region with a hole, or a concave one, still lies within
/// the region itself.
fn region_seed_points(regions: &[MultiPolygon<f64>]) -> Vec<Point<f64>> {
    regions.iter().filter_map(InteriorPoint::interior_point).collect()
}

/// Subtracts the union of `cells` from every region, returning the
/// connected leftover pieces above [`AREA_TOLERANCE`].
fn subtract_cells(regions: Vec<MultiPolygon<f64>>, cells: &[CellId]) -> Vec<MultiPolygon<f64>> {
    let cover = cell_union(cells);
    let mut leftovers = Vec::new();
    for region in &regions {
        let difference = region.difference(&cover);
        for piece in difference.0 {
            let piece = MultiPolygon(vec![piece]);
            if piece.unsigned_area() > AREA_TOLERANCE {
                leftovers.push(piece);
            }
        }
    }
    leftovers
}

fn cell_union(cells: &[CellId]) -> MultiPolygon<f64> {
    cells.iter().fold(MultiPolygon::new(Vec::new()), |acc, cell| {
        acc.union(&MultiPolygon(vec![cell.polygon()]))
    })
}

fn append_cells(cells: &mut Vec<CellId>, new_cells: &[CellId], dedupe: bool) -> usize {
    let mut added = 0;
    for &cell in new_cells {
        if dedupe && cells.contains(&cell) {
            continue;
        }
        cells.push(cell);
        added += 1;
    }
    added
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use geo::{Centroid, LineString, Polygon};
    use rooftop_survey_boundaries::{Attributes, Boundary, Crs};

    use super::*;

    fn square(lng: f64, lat: f64, half: f64) -> MultiPolygon<f64> {
        MultiPolygon(vec![Polygon::new(
            LineString::from(vec![
                (lng - half, lat - half),
                (lng + half, lat - half),
                (lng + half, lat + half),
                (lng - half, lat + half),
                (lng - half, lat - half),
            ]),
            vec![],
        )])
    }

    fn area_set(geometries: Vec<MultiPolygon<f64>>) -> BoundarySet {
        BoundarySet::wgs84(
            geometries
                .into_iter()
                .map(|geometry| Boundary::new(geometry, Attributes::new()))
                .collect(),
        )
    }

    struct RecordingProgress(Mutex<Vec<(usize, usize, usize)>>);

    impl CoverageProgress for RecordingProgress {
        fn round(&self, round: usize, leftover_count: usize, cells_added: usize) {
            self.0.lock().unwrap().push((round, leftover_count, cells_added));
        }
    }

    #[test]
    fn covers_area_spanning_multiple_cells() {
        // A 1-degree square is far larger than a level-8 cell, so round 1
        // cannot cover it and the solver must iterate on the spillover.
        let area = square(77.59, 12.97, 0.5);
        let areas = area_set(vec![area.clone()]);
        let options = CoverageOptions::new(Level::new(8).unwrap());

        let cells = covering_cells(&areas, &options, &null_progress()).unwrap();
        assert!(cells.len() > 1);

        let cover = cell_union(&cells);
        let uncovered = area.difference(&cover).unsigned_area();
        assert!(uncovered < 1e-9, "uncovered area: {uncovered}");
    }

    #[test]
    fn does_not_terminate_with_leftover_area() {
        let areas = area_set(vec![square(77.59, 12.97, 0.5)]);
        let options = CoverageOptions::new(Level::new(8).unwrap());
        let recording = Arc::new(RecordingProgress(Mutex::new(Vec::new())));
        let progress: Arc<dyn CoverageProgress> = recording.clone();

        covering_cells(&areas, &options, &progress).unwrap();

        // Rounds are sequential from 1 and the final round reports no
        // leftover regions.
        let rounds = recording.0.lock().unwrap();
        assert!(rounds.len() > 1);
        for (i, (round, _, _)) in rounds.iter().enumerate() {
            assert_eq!(*round, i + 1);
        }
        assert_eq!(rounds.last().unwrap().1, 0);
    }

    #[test]
    fn covers_region_whose_centroid_lies_in_a_hole() {
        // A donut: 1-degree square with a central hole. Its centroid is
        // in the hole, outside the region, so seeding must use interior
        // points or the loop would re-pick the same cell forever.
        let ring = |half: f64| {
            LineString::from(vec![
                (77.59 - half, 12.97 - half),
                (77.59 + half, 12.97 - half),
                (77.59 + half, 12.97 + half),
                (77.59 - half, 12.97 + half),
                (77.59 - half, 12.97 - half),
            ])
        };
        let donut = MultiPolygon(vec![Polygon::new(ring(0.5), vec![ring(0.1)])]);
        let areas = area_set(vec![donut.clone()]);
        let options = CoverageOptions::new(Level::new(8).unwrap());

        let cells = covering_cells(&areas, &options, &null_progress()).unwrap();
        let uncovered = donut.difference(&cell_union(&cells)).unsigned_area();
        assert!(uncovered < 1e-9, "uncovered area: {uncovered}");
    }

    #[test]
    fn single_cell_area_converges_in_one_round() {
        // A tiny square at a cell's center fits inside that cell.
        let level = Level::new(8).unwrap();
        let seed = CellId::from_lng_lat(77.59, 12.97, level);
        let center = seed.polygon().centroid().unwrap();
        let areas = area_set(vec![square(center.x(), center.y(), 0.001)]);
        let options = CoverageOptions::new(level);

        let cells = covering_cells(&areas, &options, &null_progress()).unwrap();
        assert_eq!(cells, vec![seed]);
    }

    #[test]
    fn deduplicates_cells_containing_points() {
        let level = Level::new(8).unwrap();
        let points = vec![
            Point::new(77.59, 12.97),
            Point::new(77.591, 12.971),
            Point::new(79.0, 14.0),
        ];
        let cells = cells_containing_points(&points, level);
        assert_eq!(cells.len(), 2);
        assert_eq!(cells[0], CellId::from_lng_lat(77.59, 12.97, level));
    }

    #[test]
    fn round_bound_surfaces_as_did_not_converge() {
        let areas = area_set(vec![square(77.59, 12.97, 0.5)]);
        let mut options = CoverageOptions::new(Level::new(8).unwrap());
        options.max_rounds = 1;

        let err = covering_cells(&areas, &options, &null_progress()).unwrap_err();
        assert!(matches!(err, CoverageError::DidNotConverge { rounds: 1, .. }));
    }

    #[test]
    fn rejects_untagged_crs_before_any_geometry() {
        let areas = BoundarySet::new(
            None,
            vec![Boundary::new(square(77.59, 12.97, 0.5), Attributes::new())],
        );
        let options = CoverageOptions::new(Level::new(8).unwrap());

        let err = covering_cells(&areas, &options, &null_progress()).unwrap_err();
        assert!(matches!(err, CoverageError::Crs(BoundaryError::InvalidCrs { .. })));
    }

    #[test]
    fn rejects_projected_crs() {
        let areas = BoundarySet::new(
            Some(Crs::Other("EPSG:3857".to_string())),
            vec![Boundary::new(square(77.59, 12.97, 0.5), Attributes::new())],
        );
        let options = CoverageOptions::new(Level::new(8).unwrap());

        assert!(covering_cells(&areas, &options, &null_progress()).is_err());
    }

    #[test]
    fn empty_area_set_yields_empty_covering() {
        let areas = area_set(Vec::new());
        let options = CoverageOptions::new(Level::new(8).unwrap());

        let cells = covering_cells(&areas, &options, &null_progress()).unwrap();
        assert!(cells.is_empty());
    }
}
