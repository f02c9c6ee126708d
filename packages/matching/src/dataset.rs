//! Matched rooftop rows.

use geo::Point;
use rooftop_survey_boundaries::Attributes;
use rooftop_survey_cells::CellId;

/// One rooftop matched to one boundary.
///
/// Carries the rooftop's centroid, the tile cell it was loaded from,
/// the rooftop's original attribute columns, and every attribute column
/// of the boundary it matched. A rooftop whose centroid lies within two
/// boundaries produces two records.
#[derive(Debug, Clone, PartialEq)]
pub struct RooftopRecord {
    /// Rooftop footprint reduced to its centroid, `WGS84`.
    pub centroid: Point<f64>,
    /// Tile cell the rooftop was loaded from.
    pub cell: CellId,
    /// The rooftop's original attribute columns.
    pub attributes: Attributes,
    /// Attribute columns joined from the matching boundary.
    pub boundary_attributes: Attributes,
}

impl RooftopRecord {
    /// Looks up a column, checking rooftop columns first and then the
    /// joined boundary columns.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&serde_json::Value> {
        self.attributes
            .get(name)
            .or_else(|| self.boundary_attributes.get(name))
    }
}

/// Concatenated match results across tile cells. May be empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchedDataset {
    /// Matched rows in cell-processing order. Callers must not depend
    /// on row order.
    pub records: Vec<RooftopRecord>,
}

impl MatchedDataset {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether any record carries the named column, on either side of
    /// the join.
    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.records.iter().any(|record| record.column(name).is_some())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RooftopRecord> {
        self.records.iter()
    }

    /// Appends all records of `other`.
    pub fn extend(&mut self, other: Self) {
        self.records.extend(other.records);
    }
}

impl<'a> IntoIterator for &'a MatchedDataset {
    type Item = &'a RooftopRecord;
    type IntoIter = std::slice::Iter<'a, RooftopRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
