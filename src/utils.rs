//! Small helpers shared by the pipeline stages.

pub mod image_conversion;

/// Round a landmark coordinate to a drawable pixel, clamped to `[0, max]`
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn to_pixel(value: f32, max: i32) -> i32 {
    if !value.is_finite() {
        return 0;
    }
    value.round().clamp(0.0, max.max(0) as f32) as i32
}
