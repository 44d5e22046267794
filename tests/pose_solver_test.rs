//! Pose solving: contour gathering, prior chaining, hardening and the
//! `OpenCV` backend

mod test_helpers;

use head_pose_tracker::{
    camera::CameraIntrinsics,
    face_data::FaceFrameState,
    face_model::{FaceModel3D, CONTOUR_INDICES},
    pose_estimation::{OpenCvPnp, PnpBackend, PoseSolver, PoseSolverPriors, SolveOutcome},
};
use nalgebra::{Rotation3, Vector3};
use std::sync::Arc;
use test_helpers::{frontal_pnp, MockPnp};

fn numbered_landmarks() -> FaceFrameState {
    let mut state = FaceFrameState::default();
    for (i, value) in state.landmarks.iter_mut().enumerate() {
        *value = i as f32;
    }
    state
}

fn solver_with(pnp: MockPnp) -> PoseSolver {
    PoseSolver::new(
        Box::new(pnp),
        &FaceModel3D::default(),
        CameraIntrinsics::from_fov(640, 480, 0.0),
    )
}

#[test]
fn test_contour_points_follow_landmark_pairs() {
    let pnp = frontal_pnp();
    let calls = Arc::clone(&pnp.calls);
    let mut solver = solver_with(pnp);
    let mut state = numbered_landmarks();

    solver.solve(&mut state).unwrap();

    let calls = calls.lock().unwrap();
    let points = &calls[0].image_points;
    assert_eq!(points.len(), 18);
    for (point, &landmark) in points.iter().zip(CONTOUR_INDICES.iter()) {
        assert_eq!(point[0], (2 * landmark) as f32);
        assert_eq!(point[1], (2 * landmark + 1) as f32);
    }
}

#[test]
fn test_solution_seeds_next_solve() {
    let pnp = frontal_pnp();
    let calls = Arc::clone(&pnp.calls);
    let mut solver = solver_with(pnp);
    let mut state = numbered_landmarks();

    solver.solve(&mut state).unwrap();
    solver.solve(&mut state).unwrap();

    let calls = calls.lock().unwrap();
    assert_eq!(calls[0].seed_rotation, [-1.57, -1.57, -1.57]);
    assert_eq!(calls[0].seed_translation, [0.0, 0.0, -2.0]);
    assert_eq!(calls[1].seed_rotation, [0.1, 0.2, 0.3]);
    assert_eq!(calls[1].seed_translation, [0.0, 0.0, -5.0]);
    assert_eq!(solver.priors().rotation, [0.1, 0.2, 0.3]);
}

#[test]
fn test_pose_written_in_centimeters_and_degrees() {
    let mut solver = solver_with(frontal_pnp());
    let mut state = numbered_landmarks();

    assert_eq!(solver.solve(&mut state).unwrap(), SolveOutcome::Solved);

    assert_eq!(state.translation, [0.0, 0.0, -50.0]);
    // On the optical axis the perspective correction is zero
    assert!((state.pitch() - 10.0).abs() < 1e-9);
    assert!((state.yaw() - 20.0).abs() < 1e-9);
    assert!((state.roll() - 30.0).abs() < 1e-9);
}

#[test]
fn test_off_axis_head_is_corrected_then_clamped() {
    // Lateral offset equal to depth adds 45 degrees of yaw
    let pnp = MockPnp::new([0.0; 3], [0.0, 4.0, -4.0], [0.0, 60.0, -10.0]);
    let mut solver = solver_with(pnp);
    let mut state = numbered_landmarks();

    solver.solve(&mut state).unwrap();

    assert_eq!(state.translation, [0.0, 40.0, -40.0]);
    assert_eq!(state.yaw(), 90.0);
    assert!(state.pitch().abs() < 1e-9);
    assert_eq!(state.roll(), 0.0);
}

#[test]
fn test_non_finite_solution_holds_previous_pose() {
    let mut solver = solver_with(frontal_pnp());
    let mut state = numbered_landmarks();
    solver.solve(&mut state).unwrap();
    let solved = state.clone();
    let priors = *solver.priors();

    let mut failing = solver_with(MockPnp::new([f64::NAN, 0.0, 0.0], [0.0, 0.0, -5.0], [0.0; 3]));
    let mut held = solved.clone();
    assert_eq!(failing.solve(&mut held).unwrap(), SolveOutcome::Rejected);
    assert_eq!(held, solved);
    assert_eq!(*failing.priors(), PoseSolverPriors::default());

    let mut infinite = solver_with(MockPnp::new([0.0; 3], [0.0, 0.0, f64::INFINITY], [0.0; 3]));
    assert_eq!(infinite.solve(&mut held).unwrap(), SolveOutcome::Rejected);
    assert_eq!(held, solved);

    assert_eq!(*solver.priors(), priors);
}

#[test]
fn test_non_finite_euler_is_rejected() {
    let mut solver = solver_with(MockPnp::new([0.0; 3], [0.0, 0.0, -5.0], [f64::NAN, 0.0, 0.0]));
    let mut state = numbered_landmarks();
    let before = state.clone();

    assert_eq!(solver.solve(&mut state).unwrap(), SolveOutcome::Rejected);
    assert_eq!(state, before);
    assert_eq!(*solver.priors(), PoseSolverPriors::default());
}

#[test]
fn test_intrinsics_can_be_replaced() {
    let pnp = frontal_pnp();
    let calls = Arc::clone(&pnp.calls);
    let mut solver = solver_with(pnp);
    let wide = CameraIntrinsics::from_fov(1280, 720, 0.0);

    solver.set_intrinsics(wide.clone());
    solver.solve(&mut numbered_landmarks()).unwrap();

    assert_eq!(calls.lock().unwrap()[0].intrinsics, wide);
}

/// Project the model with a known pose using the row-first intrinsics
fn project(model: &FaceModel3D, intrinsics: &CameraIntrinsics, rvec: [f64; 3], tvec: [f64; 3]) -> Vec<[f32; 2]> {
    let rotation = Rotation3::new(Vector3::new(rvec[0], rvec[1], rvec[2]));
    let translation = Vector3::new(tvec[0], tvec[1], tvec[2]);
    let m = &intrinsics.matrix;

    model
        .points()
        .iter()
        .map(|p| {
            let cam = rotation * p + translation;
            [
                (m[(0, 0)] * cam.x / cam.z + m[(0, 2)]) as f32,
                (m[(1, 1)] * cam.y / cam.z + m[(1, 2)]) as f32,
            ]
        })
        .collect()
}

#[test]
fn test_opencv_backend_recovers_pose_near_guess() {
    let model = FaceModel3D::default();
    let intrinsics = CameraIntrinsics::from_fov(640, 480, 56.0);
    let target_rvec = [-1.5, -1.6, -1.55];
    let target_tvec = [0.1, -0.05, -2.2];
    let image_points = project(&model, &intrinsics, target_rvec, target_tvec);

    let mut rvec = PoseSolverPriors::default().rotation;
    let mut tvec = PoseSolverPriors::default().translation;
    OpenCvPnp
        .solve(&model.object_points(), &image_points, &intrinsics, &mut rvec, &mut tvec)
        .unwrap();

    for (solved, expected) in rvec.iter().zip(target_rvec) {
        assert!((solved - expected).abs() < 1e-3, "rotation {rvec:?}");
    }
    for (solved, expected) in tvec.iter().zip(target_tvec) {
        assert!((solved - expected).abs() < 1e-3, "translation {tvec:?}");
    }
}

#[test]
fn test_opencv_backend_rejects_mismatched_points() {
    let model = FaceModel3D::default();
    let intrinsics = CameraIntrinsics::from_fov(640, 480, 0.0);
    let mut rvec = [0.0; 3];
    let mut tvec = [0.0, 0.0, -2.0];

    let result = OpenCvPnp.solve(&model.object_points(), &[[0.0, 0.0]; 4], &intrinsics, &mut rvec, &mut tvec);
    assert!(result.is_err());
}
