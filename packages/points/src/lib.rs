#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Point utilities for field work on sampled rooftops.
//!
//! Once rooftops are sampled, surveyors need something they can
//! navigate to: [`links`] turns points into Google Maps URLs and
//! [`snapping`] moves points onto the nearest road via the Google Roads
//! API in bounded-concurrency batches. Neither module is used by the
//! coverage/matching core; they consume its output.

pub mod links;
pub mod snapping;

use thiserror::Error;

/// Errors that can occur while snapping points to roads.
#[derive(Debug, Error)]
pub enum RoadsError {
    /// No API key was provided and `GOOGLE_MAPS_API_KEY` is unset.
    #[error("API key must be provided or set via GOOGLE_MAPS_API_KEY")]
    MissingApiKey,

    /// A single batch exceeded the Roads API request limit.
    #[error("Roads API supports a maximum of 100 points per request, got {len}")]
    BatchTooLarge {
        /// Number of points in the rejected batch.
        len: usize,
    },

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}
