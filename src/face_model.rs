//! Canonical 3D face contour used as the `PnP` reference model.

use nalgebra::{Matrix3, Vector3};

/// Number of contour points used by the pose solver
pub const NUM_CONTOUR_POINTS: usize = 18;

/// Landmark indices matching the reference points: eyebrow ends, chin,
/// nose bridge and base, outer and inner eye corners
pub const CONTOUR_INDICES: [usize; NUM_CONTOUR_POINTS] =
    [0, 1, 8, 15, 16, 27, 28, 29, 30, 31, 32, 33, 34, 35, 36, 39, 42, 45];

const REFERENCE_POINTS: [[f64; 3]; NUM_CONTOUR_POINTS] = [
    [0.455_176_98, -0.300_895_78, 0.764_429_45],
    [0.448_998_84, -0.166_995_84, 0.765_143],
    [0.0, 0.621_079, 0.287_294_78],
    [-0.448_998_84, -0.166_995_84, 0.765_143],
    [-0.455_176_98, -0.300_895_78, 0.764_429_45],
    [0.0, -0.293_332_6, 0.137_582_1],
    [0.0, -0.194_828_7, 0.069_158_11],
    [0.0, -0.103_844_02, 0.009_151_82],
    [0.0, 0.0, 0.0],
    [0.080_626_35, 0.041_276_07, 0.134_161_04],
    [0.046_439_35, 0.057_675_22, 0.102_990_63],
    [0.0, 0.068_753_12, 0.090_545_35],
    [-0.046_439_35, 0.057_675_22, 0.102_990_63],
    [-0.080_626_35, 0.041_276_07, 0.134_161_04],
    [0.315_905_18, -0.298_337_5, 0.285_107_4],
    [0.131_229_73, -0.284_447_37, 0.234_239_15],
    [-0.131_229_73, -0.284_447_37, 0.234_239_15],
    [-0.315_905_18, -0.298_337_5, 0.285_107_4],
];

/// Fixed 3D reference geometry with its anisotropic scale
#[derive(Debug, Clone, PartialEq)]
pub struct FaceModel3D {
    scale: Matrix3<f64>,
    points: Vec<Vector3<f64>>,
}

impl FaceModel3D {
    /// Build the model with per-axis scale factors.
    ///
    /// The scale matrix is `diag(y_scale, x_scale, z_scale)`: the reference
    /// points are stored row axis first, like the landmark coordinates.
    #[must_use]
    pub fn new(x_scale: f64, y_scale: f64, z_scale: f64) -> Self {
        let scale = Matrix3::from_diagonal(&Vector3::new(y_scale, x_scale, z_scale));
        let points = REFERENCE_POINTS
            .iter()
            .map(|p| scale * Vector3::new(p[0], p[1], p[2]))
            .collect();
        Self { scale, points }
    }

    #[must_use]
    pub fn scale(&self) -> &Matrix3<f64> {
        &self.scale
    }

    /// Scaled reference points in contour order
    #[must_use]
    pub fn points(&self) -> &[Vector3<f64>] {
        &self.points
    }

    /// Scaled reference points as plain arrays
    #[must_use]
    pub fn object_points(&self) -> Vec<[f64; 3]> {
        self.points.iter().map(|p| [p.x, p.y, p.z]).collect()
    }
}

impl Default for FaceModel3D {
    fn default() -> Self {
        Self::new(1.0, 1.0, 1.0)
    }
}
