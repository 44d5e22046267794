//! Constants used throughout the pipeline

/// Number of landmarks produced by the landmark network
pub const NUM_LANDMARKS: usize = 66;

/// Length of the flat landmark coordinate buffer (66 × 2)
pub const LANDMARK_COORDS_LEN: usize = NUM_LANDMARKS * 2;

/// Side of one landmark heatmap
pub const HEATMAP_SIDE: usize = 28;

/// Cells in one landmark heatmap (28 × 28)
pub const HEATMAP_CELLS: usize = HEATMAP_SIDE * HEATMAP_SIDE;

/// Heatmap channels: confidence, row offset logits, column offset logits
pub const HEATMAP_CHANNELS: usize = 3;

/// Length of the landmark network output (3 × 66 × 28 × 28)
pub const HEATMAP_TENSOR_LEN: usize = HEATMAP_CHANNELS * NUM_LANDMARKS * HEATMAP_CELLS;

/// Side of the landmark network input image
pub const NETWORK_INPUT_SIDE: i32 = 224;

/// Pixels per channel of the landmark network input (224 × 224)
pub const NETWORK_INPUT_STRIDE: usize = (NETWORK_INPUT_SIDE * NETWORK_INPUT_SIDE) as usize;

/// Last pixel index of the landmark network input
pub const NETWORK_INPUT_RESOLUTION: f32 = 223.0;

/// Logit outputs are divided by this factor
pub const LOGIT_FACTOR: f32 = 16.0;

/// Bound applied to probabilities before taking the logit
pub const LOGIT_EPSILON: f32 = 1e-7;

/// Per-channel ImageNet mean (RGB)
pub const CHANNEL_MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// Per-channel ImageNet standard deviation (RGB)
pub const CHANNEL_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Smallest accepted face detection resize target
pub const MIN_DETECTION_RESIZE: i32 = 84;

/// Resize targets above this value are accepted with a performance warning
pub const LARGE_DETECTION_RESIZE: i32 = 200;

/// Weight of the current sample in the landmark noise filter
pub const NOISE_FILTER_WEIGHT: f32 = 0.6;

/// Quiescence window for configuration reloads in milliseconds
pub const RELOAD_DEBOUNCE_MS: u64 = 300;

/// Crop padding on the left and top edges, as a fraction of the box size
pub const CROP_LEADING_PADDING: f64 = 0.1;

/// Crop padding on the right and bottom edges, as a fraction of the box size
pub const CROP_TRAILING_PADDING: f64 = 0.2;

/// Translation units reported per solver unit (centimeters)
pub const TRANSLATION_SCALE: f64 = 10.0;

/// Size of one pose datagram (six f64 values)
pub const POSE_DATAGRAM_LEN: usize = 48;
