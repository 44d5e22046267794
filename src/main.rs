//! Webcam head tracker streaming the head pose over UDP.

use anyhow::{Context, Result};
use clap::Parser;
use head_pose_tracker::{
    app::{CancellationToken, Collaborators, FrameLoop},
    camera::{FrameSource, OpenCvCamera},
    config::{ProcessingConfig, EXAMPLE_CONFIG},
    face_crop::DetectionScale,
    face_detection::YuNetDetector,
    filters::ExponentialFilter,
    hot_reload::{ConfigStore, ConfigWatcher, Debouncer},
    image_ops::create_image_ops,
    mark_detection::MarkDetector,
    pose_estimation::OpenCvPnp,
};
use log::{info, warn};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (YAML format), watched for changes
    #[arg(short = 'C', long, default_value = "config.yaml")]
    config: PathBuf,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,

    /// Write an example configuration file to the config path and exit
    #[arg(long)]
    write_default_config: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.debug {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("debug"));
    } else {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    }

    if args.write_default_config {
        std::fs::write(&args.config, EXAMPLE_CONFIG)
            .with_context(|| format!("Failed to write {}", args.config.display()))?;
        info!("Example configuration written to {}", args.config.display());
        return Ok(());
    }

    info!("Head Pose Tracker");

    let config = if args.config.exists() {
        info!("Loading configuration from: {}", args.config.display());
        ProcessingConfig::from_file(&args.config)?
    } else {
        warn!("{} not found, using defaults", args.config.display());
        ProcessingConfig::default()
    };
    config.validate()?;
    config.validate_model_paths()?;

    let camera = OpenCvCamera::open(config.camera.index, &config.camera)?;
    let detection_scale = DetectionScale::new(camera.resolution()?, config.face_detection.resize_to)?;
    let detector = YuNetDetector::new(
        &config.face_detection.model_path,
        detection_scale.detection_size,
        config.face_detection.score_threshold,
        config.face_detection.nms_threshold,
    )?;
    let landmark_model = MarkDetector::new(&config.landmark_detection.model_path)?;
    let image_ops = create_image_ops(config.image_processing.accelerated)?;

    let store = ConfigStore::new(config);
    let _watcher = if args.config.exists() {
        Some(ConfigWatcher::start(&args.config, store.clone(), Debouncer::default())?)
    } else {
        None
    };

    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        info!("Interrupt received, stopping");
        handler_token.cancel();
    })
    .context("Failed to install Ctrl+C handler")?;

    let parts = Collaborators {
        camera: Box::new(camera),
        detector: Box::new(detector),
        landmark_model: Box::new(landmark_model),
        image_ops,
        pnp: Box::new(OpenCvPnp),
        noise_filter: Box::new(ExponentialFilter::default()),
    };

    let mut frame_loop = FrameLoop::new(parts, store, cancel)?;
    frame_loop.run()?;

    info!("Head Pose Tracker shutting down");
    Ok(())
}
