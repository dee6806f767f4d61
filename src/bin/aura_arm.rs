//! aura_arm - detect a target on camera frames and harvest it on key press.
//!
//! Keys are read from stdin, one per line: `g` or `space` grabs the current
//! target, `q` or `esc` quits. Ctrl-C also quits, after any running motion
//! sequence has finished.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use aura_arm::detect::ObjectDetector;
use aura_arm::ingest::{FileConfig, FileSource};
use aura_arm::input::{ChannelFocus, InputRouter, KeyListener, LineKeys, Mailbox, RawKey};
use aura_arm::kinematics::PlanarArm;
use aura_arm::transport::{validate_port, MemoryConnector};
use aura_arm::{
    ArmConfig, ControlLoop, Detector, LazyModel, LoopSettings, Target, Transport,
};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Camera-guided pick-and-place controller for a serial servo arm"
)]
struct Args {
    /// Serial device of the actuator board. Discovered when omitted.
    port: Option<String>,

    /// JSON or TOML config file.
    #[arg(long, env = "ARM_CONFIG")]
    config: Option<PathBuf>,

    /// Frame source: image directory, image file, or stub://<name>.
    #[arg(long)]
    frames: Option<String>,

    /// Target: cup, color:<name> or label:<text>.
    #[arg(long)]
    target: Option<Target>,

    /// Object detector model (ONNX).
    #[arg(long)]
    model: Option<PathBuf>,

    /// Detector confidence floor.
    #[arg(long)]
    confidence: Option<f32>,

    /// Pause between frames in milliseconds.
    #[arg(long, default_value = "33")]
    frame_interval_ms: u64,

    /// Stop after this many frames.
    #[arg(long)]
    max_frames: Option<u64>,

    /// Log commands instead of opening a serial port.
    #[arg(long)]
    dry_run: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = ArmConfig::load(args.config.as_deref())?;
    if let Some(port) = args.port.as_deref() {
        config.serial.port = Some(validate_port(port)?);
    }
    if let Some(frames) = args.frames {
        config.control.frames = frames;
    }
    if let Some(target) = args.target {
        config.detect.target = target;
    }
    if let Some(model) = args.model {
        config.detect.model_path = Some(model);
    }
    if let Some(confidence) = args.confidence {
        if !(confidence > 0.0 && confidence <= 1.0) {
            return Err(anyhow!("--confidence must be in (0, 1]"));
        }
        config.detect.confidence = confidence;
    }

    let frames = FileSource::new(FileConfig {
        path: config.control.frames.clone(),
        max_frames: args.max_frames,
        repeat: true,
    })?;

    let model_path = config.detect.model_path.clone();
    let model_input = config.detect.model_input;
    let model = Arc::new(LazyModel::new(move || {
        load_model(model_path.as_deref(), model_input)
    }));
    let detector = Detector::new(model).with_min_area(config.detect.min_area);

    let mailbox = Mailbox::new();
    let _listener = KeyListener::spawn(LineKeys::stdin(), mailbox.clone())?;
    let (focus_keys, focus) = ChannelFocus::channel();
    ctrlc::set_handler(move || {
        let _ = focus_keys.send(RawKey::Escape);
    })
    .context("error setting Ctrl-C handler")?;
    let router = InputRouter::new(mailbox, Box::new(focus));

    let transport = if args.dry_run {
        let mut settings = config.transport_settings();
        settings.port = Some("dry-run".to_string());
        settings.settle_delay = Duration::ZERO;
        log::info!("dry run: commands are recorded, not sent");
        Transport::new(settings, Box::new(MemoryConnector::new()))
    } else {
        Transport::serial(config.transport_settings())
    };

    let settings = LoopSettings {
        target: config.detect.target.clone(),
        confidence: config.detect.confidence,
        mirror: config.control.mirror,
        detect_all_every: config.control.detect_all_every,
        frame_interval: Duration::from_millis(args.frame_interval_ms),
        harvest: config.motion.clone(),
    };
    log::info!("looking for {}; keys: g=grab, q=quit", settings.target);

    let control = ControlLoop::new(
        frames,
        detector,
        router,
        Arc::new(Mutex::new(transport)),
        Box::new(PlanarArm::new(config.calibration.clone())),
        settings,
    );
    let summary = control.run()?;
    log::info!(
        "exiting: {} frames, {} grabs ({:?})",
        summary.frames,
        summary.grabs_started,
        summary.exit
    );
    Ok(())
}

#[cfg(feature = "backend-tract")]
fn load_model(path: Option<&Path>, input_size: u32) -> Result<Box<dyn ObjectDetector>> {
    let path = path.ok_or_else(|| anyhow!("model targets need --model or ARM_MODEL_PATH"))?;
    let backend = aura_arm::detect::TractBackend::new(path, input_size)?;
    Ok(Box::new(backend))
}

#[cfg(not(feature = "backend-tract"))]
fn load_model(path: Option<&Path>, _input_size: u32) -> Result<Box<dyn ObjectDetector>> {
    Err(anyhow!(
        "model {} cannot be loaded: built without the backend-tract feature",
        path.map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none)".to_string())
    ))
}
