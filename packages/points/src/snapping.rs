//! Snapping points to the nearest road via the Google Roads API.
//!
//! The `nearestRoads` endpoint accepts at most 100 points per request,
//! so larger inputs are split into batches executed with bounded
//! concurrency. A failed batch degrades to `None` results for its
//! points rather than failing the whole snap; retry policy is the
//! caller's concern.

use std::collections::BTreeMap;

use futures::StreamExt;
use geo::Point;

use crate::RoadsError;

/// Roads API request limit.
pub const MAX_POINTS_PER_REQUEST: usize = 100;

/// Default number of in-flight batch requests.
pub const DEFAULT_MAX_CONCURRENT: usize = 12;

const NEAREST_ROADS_URL: &str = "https://roads.googleapis.com/v1/nearestRoads";

fn resolve_api_key(api_key: Option<&str>) -> Result<String, RoadsError> {
    api_key.map_or_else(
        || std::env::var("GOOGLE_MAPS_API_KEY").map_err(|_| RoadsError::MissingApiKey),
        |key| Ok(key.to_string()),
    )
}

/// Snaps one batch of at most [`MAX_POINTS_PER_REQUEST`] points.
///
/// Returns one entry per input point in input order; points the API did
/// not match come back as `None`.
///
/// # Errors
///
/// Returns [`RoadsError::BatchTooLarge`] for oversized batches and
/// [`RoadsError::Http`] on request failures.
pub async fn snap_batch(
    client: &reqwest::Client,
    points: &[Point<f64>],
    api_key: &str,
) -> Result<Vec<Option<Point<f64>>>, RoadsError> {
    if points.len() > MAX_POINTS_PER_REQUEST {
        return Err(RoadsError::BatchTooLarge { len: points.len() });
    }

    // Format: points=lat1,lng1|lat2,lng2|...
    let points_param = points
        .iter()
        .map(|p| format!("{},{}", p.y(), p.x()))
        .collect::<Vec<_>>()
        .join("|");
    let url = format!("{NEAREST_ROADS_URL}?points={points_param}&key={api_key}");

    let json: serde_json::Value = client.get(&url).send().await?.json().await?;
    Ok(decode_snapped(&json, points.len()))
}

/// Decodes a `nearestRoads` response body into per-point results.
///
/// Entries are keyed by `originalIndex`; the first entry per index wins
/// (the API can return several road candidates for one input point).
fn decode_snapped(json: &serde_json::Value, len: usize) -> Vec<Option<Point<f64>>> {
    let Some(entries) = json.get("snappedPoints").and_then(serde_json::Value::as_array) else {
        return vec![None; len];
    };

    let mut by_index: BTreeMap<usize, Point<f64>> = BTreeMap::new();
    for entry in entries {
        let Some(index) = entry
            .get("originalIndex")
            .and_then(serde_json::Value::as_u64)
            .and_then(|i| usize::try_from(i).ok())
        else {
            continue;
        };
        if index >= len || by_index.contains_key(&index) {
            continue;
        }
        let (Some(lng), Some(lat)) = (
            entry
                .pointer("/location/longitude")
                .and_then(serde_json::Value::as_f64),
            entry
                .pointer("/location/latitude")
                .and_then(serde_json::Value::as_f64),
        ) else {
            continue;
        };
        by_index.insert(index, Point::new(lng, lat));
    }

    (0..len).map(|i| by_index.get(&i).copied()).collect()
}

/// Snaps an arbitrary number of points, batching requests and keeping
/// at most `max_concurrent` in flight.
///
/// Results are returned in input order. A batch that fails is logged
/// and contributes `None` for each of its points.
///
/// # Errors
///
/// Returns [`RoadsError::MissingApiKey`] if no key is available.
pub async fn snap_points(
    points: &[Point<f64>],
    api_key: Option<&str>,
    max_concurrent: usize,
) -> Result<Vec<Option<Point<f64>>>, RoadsError> {
    let api_key = resolve_api_key(api_key)?;
    let client = reqwest::Client::new();

    let batches: Vec<Vec<Option<Point<f64>>>> =
        futures::stream::iter(points.chunks(MAX_POINTS_PER_REQUEST).enumerate())
            .map(|(batch, chunk)| {
                let client = client.clone();
                let api_key = api_key.clone();
                async move {
                    match snap_batch(&client, chunk, &api_key).await {
                        Ok(snapped) => snapped,
                        Err(err) => {
                            log::error!("Failed to snap batch {batch}: {err}");
                            vec![None; chunk.len()]
                        }
                    }
                }
            })
            .buffered(max_concurrent.max(1))
            .collect()
            .await;

    Ok(batches.into_iter().flatten().collect())
}
