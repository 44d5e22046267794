//! Temporal filtering of decoded landmark coordinates.
//!
//! Landmark positions jitter by a few pixels from frame to frame even when
//! the head is still. Filters here smooth the whole coordinate buffer before
//! it reaches the pose solver.

/// Exponential moving average over the landmark buffer
pub mod exponential;

pub use exponential::ExponentialFilter;

/// Trait for all landmark filters
pub trait LandmarkFilter: Send {
    /// Filter `coords` in place, updating the internal history
    fn apply(&mut self, coords: &mut [f32]);

    /// Reset filter state
    fn reset(&mut self);

    /// Get filter name
    fn name(&self) -> &str;
}

/// No-op filter that passes coordinates through unchanged
pub struct NoFilter;

impl LandmarkFilter for NoFilter {
    fn apply(&mut self, _coords: &mut [f32]) {}

    fn reset(&mut self) {}

    fn name(&self) -> &str {
        "NoFilter"
    }
}
