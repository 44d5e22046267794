//! Edge case tests for crop geometry, filtering, conversion and pose output

use head_pose_tracker::{
    constants::LANDMARK_COORDS_LEN,
    face_crop::{DetectionScale, FaceCrop},
    filters::{ExponentialFilter, LandmarkFilter, NoFilter},
    landmark_decoder::{argmax, logit},
    pose_estimation::{clip_rotations, correct_rotation},
    pose_streamer::{decode_pose, encode_pose},
    face_data::FaceFrameState,
    utils::{image_conversion::normalize_pixels, to_pixel},
};
use opencv::core::{Rect, Size};

#[test]
fn test_crop_of_zero_sized_box() {
    let crop = FaceCrop::from_detection(Rect::new(100, 100, 0, 0), Size::new(640, 480));
    assert!(crop.is_degenerate());
}

#[test]
fn test_crop_left_of_frame() {
    let crop = FaceCrop::from_detection(Rect::new(-300, 100, 100, 100), Size::new(640, 480));
    assert_eq!(crop.top_left.x, 0);
    assert_eq!(crop.bottom_right.x, 0);
    assert!(crop.is_degenerate());
}

#[test]
fn test_crop_covering_whole_frame() {
    let crop = FaceCrop::from_detection(Rect::new(-50, -50, 1000, 1000), Size::new(640, 480));
    assert_eq!(crop.rect(), Rect::new(0, 0, 640, 480));
    assert!(!crop.is_degenerate());
}

#[test]
fn test_detection_scale_rejects_empty_frame() {
    assert!(DetectionScale::new(Size::new(0, 480), 124).is_err());
    assert!(DetectionScale::new(Size::new(640, 0), 124).is_err());
    // Extremely wide frame collapses the detection height
    assert!(DetectionScale::new(Size::new(100_000, 10), 84).is_err());
}

#[test]
fn test_filters_propagate_non_finite_values() {
    let mut filter = ExponentialFilter::default();
    let mut coords = [0.0f32; LANDMARK_COORDS_LEN];
    coords[0] = f32::NAN;
    coords[1] = f32::INFINITY;
    filter.apply(&mut coords);
    assert!(coords[0].is_nan());
    assert!(coords[1].is_infinite());
    assert_eq!(coords[2], 0.0);

    // Reset clears the poisoned history
    filter.reset();
    let mut coords = [10.0f32; LANDMARK_COORDS_LEN];
    filter.apply(&mut coords);
    assert!((coords[0] - 6.0).abs() < 1e-5);
}

#[test]
fn test_filter_on_short_buffer() {
    let mut filter = ExponentialFilter::new(0.5);
    let mut coords = [4.0f32; 4];
    filter.apply(&mut coords);
    assert_eq!(coords, [2.0; 4]);

    let mut passthrough = NoFilter;
    let mut coords = [4.0f32; 4];
    passthrough.apply(&mut coords);
    assert_eq!(coords, [4.0; 4]);
}

#[test]
fn test_logit_extremes_are_finite() {
    for p in [-1.0, 0.0, 1.0, 2.0, f32::MIN_POSITIVE] {
        assert!(logit(p).is_finite(), "logit({p})");
    }
}

#[test]
fn test_argmax_with_nan() {
    // NaN never compares greater, so it is skipped
    assert_eq!(argmax(&[f32::NAN, 0.5, 0.2]), 1);
    assert_eq!(argmax(&[]), 0);
}

#[test]
fn test_rotation_limits() {
    let mut rotation = [f64::MAX, f64::MIN, f64::MAX];
    clip_rotations(&mut rotation);
    assert_eq!(rotation, [90.0, -90.0, 180.0]);

    let mut rotation = [90.0, -90.0, 0.0];
    clip_rotations(&mut rotation);
    assert_eq!(rotation, [90.0, -90.0, 0.0]);
}

#[test]
fn test_correction_at_zero_depth() {
    // Head in the image plane: a full quarter turn, signed by the offset
    let mut rotation = [0.0; 3];
    correct_rotation(&mut rotation, &[-1.0, 1.0, 0.0]);
    assert!((rotation[1] - 90.0).abs() < 1e-9);
    assert!((rotation[0] + 90.0).abs() < 1e-9);
}

#[test]
fn test_datagram_carries_special_values() {
    let state = FaceFrameState {
        rotation: [f64::NAN, -0.0, f64::INFINITY],
        ..FaceFrameState::default()
    };
    let fields = decode_pose(&encode_pose(&state)).unwrap();
    assert!(fields[3].is_sign_negative() && fields[3] == 0.0);
    assert!(fields[4].is_nan());
    assert!(fields[5].is_infinite());
}

#[test]
fn test_to_pixel_bounds() {
    assert_eq!(to_pixel(-5.0, 100), 0);
    assert_eq!(to_pixel(150.0, 100), 100);
    assert_eq!(to_pixel(f32::NAN, 100), 0);
    assert_eq!(to_pixel(49.6, 100), 50);
}

#[test]
fn test_normalize_rejects_wrong_pixel_count() {
    assert!(normalize_pixels(vec![[0.0f32; 3]; 10]).is_err());
}
