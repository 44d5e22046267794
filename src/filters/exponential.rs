use super::LandmarkFilter;
use crate::constants::{LANDMARK_COORDS_LEN, NOISE_FILTER_WEIGHT};

/// Exponential smoothing filter over the full landmark buffer
///
/// `filtered = weight * current + (1 - weight) * previous`. The history
/// starts at zero and lives as long as the filter, so the first frames are
/// pulled toward the origin until the average settles.
pub struct ExponentialFilter {
    weight: f32,
    last_values: [f32; LANDMARK_COORDS_LEN],
}

impl ExponentialFilter {
    pub fn new(weight: f32) -> Self {
        assert!(weight > 0.0 && weight <= 1.0, "Weight must be in (0, 1]");
        Self {
            weight,
            last_values: [0.0; LANDMARK_COORDS_LEN],
        }
    }
}

impl Default for ExponentialFilter {
    fn default() -> Self {
        Self::new(NOISE_FILTER_WEIGHT)
    }
}

impl LandmarkFilter for ExponentialFilter {
    fn apply(&mut self, coords: &mut [f32]) {
        for (value, last) in coords.iter_mut().zip(self.last_values.iter_mut()) {
            *value = self.weight * *value + (1.0 - self.weight) * *last;
            *last = *value;
        }
    }

    fn reset(&mut self) {
        self.last_values = [0.0; LANDMARK_COORDS_LEN];
    }

    fn name(&self) -> &str {
        "ExponentialFilter"
    }
}
