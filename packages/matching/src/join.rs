//! R-tree index over boundary polygons for point-in-polygon joins.

use geo::{BoundingRect, Contains, MultiPolygon, Point};
use rooftop_survey_boundaries::{Attributes, Boundary};
use rstar::{AABB, RTree, RTreeObject};

/// A boundary polygon stored in the R-tree with its attribute columns.
pub(crate) struct BoundaryEntry {
    pub attributes: Attributes,
    envelope: AABB<[f64; 2]>,
    polygon: MultiPolygon<f64>,
}

impl RTreeObject for BoundaryEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Pre-built spatial index over one cell's candidate boundaries.
///
/// Envelope intersection narrows the candidates, then an exact
/// point-in-polygon test confirms containment.
pub(crate) struct BoundaryIndex {
    tree: RTree<BoundaryEntry>,
}

impl BoundaryIndex {
    pub fn build<'a>(boundaries: impl IntoIterator<Item = &'a Boundary>) -> Self {
        let entries = boundaries
            .into_iter()
            .map(|boundary| BoundaryEntry {
                attributes: boundary.attributes.clone(),
                envelope: compute_envelope(&boundary.geometry),
                polygon: boundary.geometry.clone(),
            })
            .collect();
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// Boundaries strictly containing the point, in R-tree order.
    pub fn containing(&self, point: Point<f64>) -> impl Iterator<Item = &BoundaryEntry> {
        let query_env = AABB::from_point([point.x(), point.y()]);
        self.tree
            .locate_in_envelope_intersecting(&query_env)
            .filter(move |entry| entry.polygon.contains(&point))
    }
}

/// Compute the bounding box envelope for a [`MultiPolygon`].
fn compute_envelope(mp: &MultiPolygon<f64>) -> AABB<[f64; 2]> {
    mp.bounding_rect().map_or_else(
        || AABB::from_point([0.0, 0.0]),
        |rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
    )
}
