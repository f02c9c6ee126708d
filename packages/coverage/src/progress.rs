//! Progress reporting trait for the coverage loop.
//!
//! Defines a [`CoverageProgress`] trait that decouples per-round
//! reporting from any specific rendering backend (log lines, progress
//! bars, or silence). Implementations are provided by callers that
//! choose a rendering strategy; the solver itself stays side-effect
//! free apart from invoking the hook.

use std::sync::Arc;

/// Trait for observing the coverage loop round by round.
///
/// Implementations must be `Send + Sync` to support `Arc`-based sharing
/// across threads.
pub trait CoverageProgress: Send + Sync {
    /// Called after each round with the 1-based round number, the number
    /// of areas still left over after the round, and the number of cell
    /// IDs the round appended.
    fn round(&self, round: usize, leftover_count: usize, cells_added: usize);
}

/// A no-op implementation of [`CoverageProgress`] that silently ignores
/// all updates.
///
/// Useful for callers and tests that do not need progress reporting.
pub struct NullCoverageProgress;

impl CoverageProgress for NullCoverageProgress {
    fn round(&self, _round: usize, _leftover_count: usize, _cells_added: usize) {}
}

/// Returns a shared [`NullCoverageProgress`] instance for convenient use.
#[must_use]
pub fn null_progress() -> Arc<dyn CoverageProgress> {
    Arc::new(NullCoverageProgress)
}
