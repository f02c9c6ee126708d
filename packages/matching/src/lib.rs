#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Tiled spatial join of rooftops against survey-area boundaries.
//!
//! Rooftop data arrives pre-partitioned into per-cell tile files; the
//! boundaries of interest arrive as a [`BoundarySet`]. [`match_one`]
//! joins a single tile: rooftop footprints are reduced to centroids and
//! a centroid matches a boundary iff it lies strictly within the
//! boundary polygon. [`match_all`] drives the coverage solver to find
//! every tile the boundaries need, fails fast if any required tile file
//! is absent, and concatenates the per-tile joins. Both operations are
//! read-only against the tile directory.

pub mod dataset;
mod join;
pub mod tile;

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use geo::{Centroid, Intersects};
use rooftop_survey_boundaries::BoundarySet;
use rooftop_survey_cells::{CellId, Level};
use rooftop_survey_coverage::{
    CoverageError, CoverageOptions, CoverageProgress, DEFAULT_MAX_ROUNDS, covering_cells,
};
use thiserror::Error;

pub use crate::dataset::{MatchedDataset, RooftopRecord};
pub use crate::tile::{Rooftop, TileStore};

/// Number of missing cell IDs shown before truncating the list.
const MISSING_TILES_DISPLAY_LIMIT: usize = 10;

/// Errors that can occur during tile matching.
#[derive(Debug, Error)]
pub enum MatchError {
    /// Coverage computation failed (bad CRS or no convergence).
    #[error("coverage error: {0}")]
    Coverage(#[from] CoverageError),

    /// A single required tile file is absent.
    #[error("missing tile file for cell {cell}: {}", .path.display())]
    MissingTileFile {
        /// Cell whose tile file is missing.
        cell: CellId,
        /// Path that was expected.
        path: PathBuf,
    },

    /// The fail-fast precondition of [`match_all`]: at least one
    /// required cell has no tile file. Carries every missing ID so the
    /// caller can fetch them.
    #[error("{} required tile file(s) missing: {}", .missing.len(), format_missing(.missing))]
    MissingTiles {
        /// Cells with no corresponding tile file.
        missing: Vec<CellId>,
    },

    /// Reading a tile file failed for a reason other than absence.
    #[error("I/O error reading tile {}: {source}", .path.display())]
    TileIo {
        /// Tile file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A tile file is not valid `GeoJSON`.
    #[error("failed to parse tile {}: {source}", .path.display())]
    TileParse {
        /// Tile file path.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: geojson::Error,
    },

    /// A tile file parsed but is not the expected shape.
    #[error("unexpected tile format in {}: {message}", .path.display())]
    TileFormat {
        /// Tile file path.
        path: PathBuf,
        /// Description of what went wrong.
        message: String,
    },
}

fn format_missing(missing: &[CellId]) -> String {
    let shown: Vec<String> = missing
        .iter()
        .take(MISSING_TILES_DISPLAY_LIMIT)
        .map(CellId::to_string)
        .collect();
    if missing.len() > MISSING_TILES_DISPLAY_LIMIT {
        format!(
            "{}, ... ({} more)",
            shown.join(", "),
            missing.len() - MISSING_TILES_DISPLAY_LIMIT
        )
    } else {
        shown.join(", ")
    }
}

/// Options for [`match_all`].
#[derive(Debug, Clone)]
pub struct MatchOptions {
    /// S2 level the tile store was produced at.
    pub level: Level,
    /// Round bound forwarded to the coverage solver.
    pub max_rounds: usize,
    /// Forwarded to [`CoverageOptions::dedupe_cells`].
    pub dedupe_cells: bool,
    /// Keep only the first matching boundary per rooftop. Defaults to
    /// `false`: a centroid within two overlapping boundaries is emitted
    /// as two rows.
    pub dedupe_matches: bool,
}

impl MatchOptions {
    #[must_use]
    pub const fn new(level: Level) -> Self {
        Self {
            level,
            max_rounds: DEFAULT_MAX_ROUNDS,
            dedupe_cells: false,
            dedupe_matches: false,
        }
    }

    const fn coverage_options(&self) -> CoverageOptions {
        CoverageOptions {
            level: self.level,
            max_rounds: self.max_rounds,
            dedupe_cells: self.dedupe_cells,
        }
    }
}

/// Joins the rooftops of one tile cell against `boundaries`.
///
/// Loads the cell's tile file, reduces every footprint to its centroid,
/// pre-filters `boundaries` to those intersecting the cell polygon (a
/// performance shortcut, not a correctness requirement), then emits one
/// row per (rooftop, containing boundary) pair. Rooftops inside no
/// boundary are dropped; rooftops inside several produce several rows
/// unless `dedupe_matches` keeps only the first.
///
/// # Errors
///
/// Returns [`MatchError::MissingTileFile`] if the tile file is absent,
/// or a tile read/parse error.
pub fn match_one(
    store: &TileStore,
    cell: CellId,
    boundaries: &BoundarySet,
    dedupe_matches: bool,
) -> Result<MatchedDataset, MatchError> {
    let rooftops = store.load(cell)?;

    // Shrink the join's right-hand side to boundaries that can possibly
    // contain a centroid from this cell.
    let cell_polygon = cell.polygon();
    let candidates: Vec<_> = boundaries
        .iter()
        .filter(|boundary| boundary.geometry.intersects(&cell_polygon))
        .collect();
    let index = join::BoundaryIndex::build(candidates.iter().copied());

    let mut matched = MatchedDataset::new();
    for rooftop in rooftops {
        let Some(centroid) = rooftop.geometry.centroid() else {
            log::warn!("Skipping rooftop with empty geometry in cell {cell}");
            continue;
        };
        for entry in index.containing(centroid) {
            matched.records.push(RooftopRecord {
                centroid,
                cell,
                attributes: rooftop.attributes.clone(),
                boundary_attributes: entry.attributes.clone(),
            });
            if dedupe_matches {
                break;
            }
        }
    }

    log::debug!(
        "Cell {cell}: {} rooftop(s) matched against {} candidate boundary(ies)",
        matched.len(),
        candidates.len()
    );
    Ok(matched)
}

/// Joins every tile the given boundaries require.
///
/// Runs the coverage solver at `options.level`, verifies that a tile
/// file exists for every required cell **before any join work begins**
/// (so the caller gets either a fully-computed result or a fatal
/// [`MatchError::MissingTiles`], never a silently partial one), then
/// concatenates the non-empty [`match_one`] results in cell-processing
/// order. Returns an empty dataset when no cell yields a match.
///
/// # Errors
///
/// Returns [`MatchError::Coverage`] on CRS or convergence failures and
/// [`MatchError::MissingTiles`] when required tile files are absent.
pub fn match_all(
    store: &TileStore,
    boundaries: &BoundarySet,
    options: &MatchOptions,
    progress: &Arc<dyn CoverageProgress>,
) -> Result<MatchedDataset, MatchError> {
    let required = covering_cells(boundaries, &options.coverage_options(), progress)?;

    // The coverage list can repeat a cell across rounds; each tile is
    // checked and joined once.
    let mut seen = BTreeSet::new();
    let unique: Vec<CellId> = required
        .iter()
        .copied()
        .filter(|cell| seen.insert(*cell))
        .collect();
    log::info!(
        "{} tile cell(s) required to cover {} boundary(ies)",
        unique.len(),
        boundaries.len()
    );

    let missing: Vec<CellId> = unique
        .iter()
        .copied()
        .filter(|&cell| !store.has_tile(cell))
        .collect();
    if !missing.is_empty() {
        return Err(MatchError::MissingTiles { missing });
    }

    let mut matched = MatchedDataset::new();
    for cell in unique {
        let tile_matches = match_one(store, cell, boundaries, options.dedupe_matches)?;
        if tile_matches.is_empty() {
            log::debug!("Cell {cell}: no matches, skipping");
            continue;
        }
        matched.extend(tile_matches);
    }

    log::info!("Matched {} rooftop(s) in total", matched.len());
    Ok(matched)
}
