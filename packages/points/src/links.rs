//! Google Maps link generation for survey points.

use geo::Point;

/// URL showing a single point on Google Maps.
#[must_use]
pub fn map_link(point: &Point<f64>) -> String {
    format!("https://www.google.com/maps?q={},{}", point.y(), point.x())
}

/// URL with directions from `origin` to `road`, or a plain map link for
/// `origin` when no road point is available.
#[must_use]
pub fn directions_link(origin: &Point<f64>, road: Option<&Point<f64>>) -> String {
    road.map_or_else(
        || map_link(origin),
        |road| {
            format!(
                "https://www.google.com/maps/dir/{},{}/{},{}",
                origin.y(),
                origin.x(),
                road.y(),
                road.x()
            )
        },
    )
}
