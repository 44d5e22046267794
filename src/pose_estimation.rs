//! Head pose from landmarks: `PnP` against the 3D face contour, then
//! perspective correction and clamping of the Euler angles.

use crate::{
    camera::CameraIntrinsics,
    constants::TRANSLATION_SCALE,
    face_data::FaceFrameState,
    face_model::{FaceModel3D, CONTOUR_INDICES, NUM_CONTOUR_POINTS},
    Error, Result,
};
use log::warn;
use opencv::{
    calib3d,
    core::{self, Mat, CV_32F, CV_64F},
    prelude::*,
};

/// Prior pitch fed to the first solve (radians, Rodrigues component)
pub const PRIOR_PITCH: f64 = -1.57;
/// Prior yaw fed to the first solve (radians, Rodrigues component)
pub const PRIOR_YAW: f64 = -1.57;
/// Prior roll fed to the first solve (radians, Rodrigues component)
pub const PRIOR_ROLL: f64 = -1.57;
/// Prior depth fed to the first solve (model units)
pub const PRIOR_DISTANCE: f64 = -2.0;

/// `PnP` primitive consumed by the pose solver
pub trait PnpBackend {
    /// Refine `rvec`/`tvec` in place with the iterative method, using their
    /// incoming values as the extrinsic guess
    fn solve(
        &self,
        object_points: &[[f64; 3]],
        image_points: &[[f32; 2]],
        intrinsics: &CameraIntrinsics,
        rvec: &mut [f64; 3],
        tvec: &mut [f64; 3],
    ) -> Result<()>;

    /// Euler angles in degrees (about x, y, z) of the pose `[R | t]`
    fn euler_angles(&self, rvec: &[f64; 3], tvec: &[f64; 3]) -> Result<[f64; 3]>;
}

/// Extrinsic guess carried from one solve to the next
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseSolverPriors {
    pub rotation: [f64; 3],
    pub translation: [f64; 3],
}

impl Default for PoseSolverPriors {
    fn default() -> Self {
        Self {
            rotation: [PRIOR_PITCH, PRIOR_YAW, PRIOR_ROLL],
            translation: [0.0, 0.0, PRIOR_DISTANCE],
        }
    }
}

/// Result of one solve call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveOutcome {
    /// Pose written to the frame state
    Solved,
    /// Solver produced non-finite values; previous pose and priors kept
    Rejected,
}

/// Head pose solver holding the face model, intrinsics and priors
pub struct PoseSolver {
    backend: Box<dyn PnpBackend>,
    object_points: Vec<[f64; 3]>,
    intrinsics: CameraIntrinsics,
    priors: PoseSolverPriors,
    image_points: [[f32; 2]; NUM_CONTOUR_POINTS],
}

impl PoseSolver {
    /// Create a solver seeded with the fixed priors
    pub fn new(backend: Box<dyn PnpBackend>, model: &FaceModel3D, intrinsics: CameraIntrinsics) -> Self {
        log::info!(
            "Initializing PoseSolver with {} contour points, focal lengths {:.1}/{:.1}",
            NUM_CONTOUR_POINTS,
            intrinsics.matrix[(0, 0)],
            intrinsics.matrix[(1, 1)]
        );
        Self {
            backend,
            object_points: model.object_points(),
            intrinsics,
            priors: PoseSolverPriors::default(),
            image_points: [[0.0; 2]; NUM_CONTOUR_POINTS],
        }
    }

    /// Replace the intrinsics after a camera restart
    pub fn set_intrinsics(&mut self, intrinsics: CameraIntrinsics) {
        self.intrinsics = intrinsics;
    }

    #[must_use]
    pub fn intrinsics(&self) -> &CameraIntrinsics {
        &self.intrinsics
    }

    #[must_use]
    pub fn priors(&self) -> &PoseSolverPriors {
        &self.priors
    }

    /// Solve the pose for the landmarks in `state` and write rotation and
    /// translation back into it.
    ///
    /// The refined rotation and translation vectors become the extrinsic
    /// guess for the next call. A solve yielding non-finite values is
    /// rejected: the priors and the previous pose stay in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the `PnP` backend fails
    pub fn solve(&mut self, state: &mut FaceFrameState) -> Result<SolveOutcome> {
        self.gather_contour(state);

        let mut rvec = self.priors.rotation;
        let mut tvec = self.priors.translation;
        self.backend
            .solve(&self.object_points, &self.image_points, &self.intrinsics, &mut rvec, &mut tvec)?;

        if !all_finite(&rvec) || !all_finite(&tvec) {
            warn!("PnP produced a non-finite pose, holding previous pose");
            return Ok(SolveOutcome::Rejected);
        }

        let euler = self.backend.euler_angles(&rvec, &tvec)?;
        if !all_finite(&euler) {
            warn!("Euler decomposition produced non-finite angles, holding previous pose");
            return Ok(SolveOutcome::Rejected);
        }

        self.priors = PoseSolverPriors {
            rotation: rvec,
            translation: tvec,
        };

        state.rotation = euler;
        for (reported, solved) in state.translation.iter_mut().zip(tvec) {
            *reported = solved * TRANSLATION_SCALE;
        }

        correct_rotation(&mut state.rotation, &state.translation);
        clip_rotations(&mut state.rotation);

        Ok(SolveOutcome::Solved)
    }

    /// Copy the contour landmarks into the image point buffer, one axis at a time
    fn gather_contour(&mut self, state: &FaceFrameState) {
        for axis in 0..2 {
            for (point, &landmark) in self.image_points.iter_mut().zip(CONTOUR_INDICES.iter()) {
                point[axis] = state.landmarks[2 * landmark + axis];
            }
        }
    }
}

fn all_finite(values: &[f64; 3]) -> bool {
    values.iter().all(|v| v.is_finite())
}

/// Compensate the rotation a flat contour model loses under perspective.
///
/// A head off the optical axis is seen from an angle even when it faces the
/// camera. The correction is `90° - atan2(depth, |offset|)`, signed like the
/// offset, added to yaw (lateral offset) and pitch (vertical offset).
pub fn correct_rotation(rotation: &mut [f64; 3], translation: &[f64; 3]) {
    let distance = translation[2].abs();
    let lateral_offset = translation[1];
    let vertical_offset = translation[0];

    let mut correction_yaw = 90.0 - distance.atan2(lateral_offset.abs()).to_degrees();
    let mut correction_pitch = 90.0 - distance.atan2(vertical_offset.abs()).to_degrees();

    if lateral_offset < 0.0 {
        correction_yaw = -correction_yaw;
    }
    if vertical_offset < 0.0 {
        correction_pitch = -correction_pitch;
    }

    rotation[1] += correction_yaw;
    rotation[0] += correction_pitch;
}

/// Hard-clip pitch and yaw to `[-90, 90]` and roll to `[0, 180]` degrees
pub fn clip_rotations(rotation: &mut [f64; 3]) {
    rotation[0] = rotation[0].clamp(-90.0, 90.0);
    rotation[1] = rotation[1].clamp(-90.0, 90.0);
    rotation[2] = rotation[2].clamp(0.0, 180.0);
}

/// `PnP` backend built on `OpenCV`'s calib3d module
#[derive(Debug, Default)]
pub struct OpenCvPnp;

impl OpenCvPnp {
    fn column(values: &[f64; 3]) -> Result<Mat> {
        let mut mat = Mat::zeros(3, 1, CV_64F)?.to_mat()?;
        for (row, &value) in (0..).zip(values.iter()) {
            *mat.at_2d_mut::<f64>(row, 0)? = value;
        }
        Ok(mat)
    }

    fn read_column(mat: &Mat) -> Result<[f64; 3]> {
        if mat.total() != 3 {
            return Err(Error::InvalidInput(format!(
                "Expected a 3-element vector, got {} elements",
                mat.total()
            )));
        }
        let values = mat.data_typed::<f64>()?;
        Ok([values[0], values[1], values[2]])
    }

    fn camera_matrix(intrinsics: &CameraIntrinsics) -> Result<Mat> {
        let mut camera_matrix = Mat::zeros(3, 3, CV_64F)?.to_mat()?;
        for (i, row) in (0..).zip(intrinsics.rows()) {
            for (j, value) in (0..).zip(row) {
                *camera_matrix.at_2d_mut::<f64>(i, j)? = value;
            }
        }
        Ok(camera_matrix)
    }

    fn distortion(intrinsics: &CameraIntrinsics) -> Result<Mat> {
        let mut dist_coeffs = Mat::zeros(4, 1, CV_64F)?.to_mat()?;
        for (row, &value) in (0..).zip(intrinsics.distortion.iter()) {
            *dist_coeffs.at_2d_mut::<f64>(row, 0)? = value;
        }
        Ok(dist_coeffs)
    }
}

impl PnpBackend for OpenCvPnp {
    fn solve(
        &self,
        object_points: &[[f64; 3]],
        image_points: &[[f32; 2]],
        intrinsics: &CameraIntrinsics,
        rvec: &mut [f64; 3],
        tvec: &mut [f64; 3],
    ) -> Result<()> {
        if object_points.len() != image_points.len() {
            return Err(Error::InvalidInput(format!(
                "Got {} model points but {} image points",
                object_points.len(),
                image_points.len()
            )));
        }

        let rows: i32 = object_points
            .len()
            .try_into()
            .map_err(|_| Error::InvalidInput("Too many model points".to_string()))?;

        let mut object_points_mat = Mat::zeros(rows, 3, CV_64F)?.to_mat()?;
        let mut image_points_mat = Mat::zeros(rows, 2, CV_32F)?.to_mat()?;
        for (idx, (object, image)) in (0..).zip(object_points.iter().zip(image_points)) {
            for (col, &value) in (0..).zip(object.iter()) {
                *object_points_mat.at_2d_mut::<f64>(idx, col)? = value;
            }
            for (col, &value) in (0..).zip(image.iter()) {
                *image_points_mat.at_2d_mut::<f32>(idx, col)? = value;
            }
        }

        let mut rvec_mat = Self::column(rvec)?;
        let mut tvec_mat = Self::column(tvec)?;

        calib3d::solve_pnp(
            &object_points_mat,
            &image_points_mat,
            &Self::camera_matrix(intrinsics)?,
            &Self::distortion(intrinsics)?,
            &mut rvec_mat,
            &mut tvec_mat,
            true,
            calib3d::SOLVEPNP_ITERATIVE,
        )?;

        *rvec = Self::read_column(&rvec_mat)?;
        *tvec = Self::read_column(&tvec_mat)?;
        Ok(())
    }

    fn euler_angles(&self, rvec: &[f64; 3], tvec: &[f64; 3]) -> Result<[f64; 3]> {
        let mut rotation_matrix = Mat::default();
        calib3d::rodrigues(&Self::column(rvec)?, &mut rotation_matrix, &mut Mat::default())?;

        let mut projection = Mat::default();
        core::hconcat2(&rotation_matrix, &Self::column(tvec)?, &mut projection)?;

        let mut camera_matrix = Mat::default();
        let mut rot_matrix = Mat::default();
        let mut trans_vect = Mat::default();
        let mut euler_angles = Mat::default();
        calib3d::decompose_projection_matrix(
            &projection,
            &mut camera_matrix,
            &mut rot_matrix,
            &mut trans_vect,
            &mut Mat::default(),
            &mut Mat::default(),
            &mut Mat::default(),
            &mut euler_angles,
        )?;

        Self::read_column(&euler_angles)
    }
}
