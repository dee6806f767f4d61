use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::detect::Target;
use crate::kinematics::Calibration;
use crate::sequence::HarvestSettings;
use crate::transport::TransportSettings;

const DEFAULT_BAUD_RATE: u32 = 115_200;
const DEFAULT_SERIAL_TIMEOUT_MS: u64 = 1000;
const DEFAULT_SETTLE_MS: u64 = 2000;
const DEFAULT_MIN_AREA: u64 = 500;
const DEFAULT_CONFIDENCE: f32 = 0.25;
const DEFAULT_MODEL_INPUT: u32 = 640;
const DEFAULT_STEP_DELAY_MS: u64 = 2000;
const DEFAULT_SIDE_OFFSET_M: f64 = 0.05;
const DEFAULT_HOVER_Z_M: f64 = 0.10;
const DEFAULT_GRASP_Z_M: f64 = 0.02;
const DEFAULT_GRIPPER_OPEN_US: u16 = 1200;
const DEFAULT_GRIPPER_CLOSED_US: u16 = 1800;
const DEFAULT_DETECT_ALL_EVERY: u64 = 5;
const DEFAULT_FRAMES: &str = "stub://table";

const GRIPPER_MIN_US: u16 = 500;
const GRIPPER_MAX_US: u16 = 2500;

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ArmConfigFile {
    serial: Option<SerialConfigFile>,
    detect: Option<DetectConfigFile>,
    motion: Option<MotionConfigFile>,
    control: Option<ControlConfigFile>,
    calibration: Option<Calibration>,
}

#[derive(Debug, Deserialize, Default)]
struct SerialConfigFile {
    port: Option<String>,
    baud_rate: Option<u32>,
    timeout_ms: Option<u64>,
    settle_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectConfigFile {
    target: Option<String>,
    min_area: Option<u64>,
    confidence: Option<f32>,
    model_path: Option<PathBuf>,
    model_input: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct MotionConfigFile {
    step_delay_ms: Option<u64>,
    side_offset_m: Option<f64>,
    hover_z_m: Option<f64>,
    grasp_z_m: Option<f64>,
    gripper_open_us: Option<u16>,
    gripper_closed_us: Option<u16>,
}

#[derive(Debug, Deserialize, Default)]
struct ControlConfigFile {
    frames: Option<String>,
    mirror: Option<bool>,
    detect_all_every: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct ArmConfig {
    pub serial: SerialSettings,
    pub detect: DetectSettings,
    pub motion: HarvestSettings,
    pub control: ControlSettings,
    pub calibration: Calibration,
}

#[derive(Debug, Clone)]
pub struct SerialSettings {
    pub port: Option<String>,
    pub baud_rate: u32,
    pub timeout: Duration,
    pub settle_delay: Duration,
}

#[derive(Debug, Clone)]
pub struct DetectSettings {
    pub target: Target,
    pub min_area: u64,
    pub confidence: f32,
    pub model_path: Option<PathBuf>,
    pub model_input: u32,
}

#[derive(Debug, Clone)]
pub struct ControlSettings {
    /// Frame source: image directory, image file or `stub://`.
    pub frames: String,
    pub mirror: bool,
    /// Run the full detection list every this many frames.
    pub detect_all_every: u64,
}

impl Default for ArmConfig {
    fn default() -> Self {
        Self {
            serial: SerialSettings {
                port: None,
                baud_rate: DEFAULT_BAUD_RATE,
                timeout: Duration::from_millis(DEFAULT_SERIAL_TIMEOUT_MS),
                settle_delay: Duration::from_millis(DEFAULT_SETTLE_MS),
            },
            detect: DetectSettings {
                target: Target::cup(),
                min_area: DEFAULT_MIN_AREA,
                confidence: DEFAULT_CONFIDENCE,
                model_path: None,
                model_input: DEFAULT_MODEL_INPUT,
            },
            motion: HarvestSettings {
                step_delay: Duration::from_millis(DEFAULT_STEP_DELAY_MS),
                side_offset_m: DEFAULT_SIDE_OFFSET_M,
                hover_z_m: DEFAULT_HOVER_Z_M,
                grasp_z_m: DEFAULT_GRASP_Z_M,
                gripper_open_us: DEFAULT_GRIPPER_OPEN_US,
                gripper_closed_us: DEFAULT_GRIPPER_CLOSED_US,
            },
            control: ControlSettings {
                frames: DEFAULT_FRAMES.to_string(),
                mirror: true,
                detect_all_every: DEFAULT_DETECT_ALL_EVERY,
            },
            calibration: Calibration::default(),
        }
    }
}

impl ArmConfig {
    /// Defaults, overlaid by the config file (`path`, else `ARM_CONFIG`),
    /// overlaid by `ARM_*` environment variables, then validated.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var("ARM_CONFIG")
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);
        let config_path = path.map(Path::to_path_buf).or(env_path);
        let file_cfg = match config_path.as_deref() {
            Some(path) => read_config_file(path)?,
            None => ArmConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg)?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ArmConfigFile) -> Result<Self> {
        let defaults = Self::default();
        let serial = file.serial.unwrap_or_default();
        let detect = file.detect.unwrap_or_default();
        let motion = file.motion.unwrap_or_default();
        let control = file.control.unwrap_or_default();

        let target = match detect.target.as_deref() {
            Some(raw) => raw.parse()?,
            None => defaults.detect.target,
        };

        Ok(Self {
            serial: SerialSettings {
                port: serial.port.filter(|p| !p.trim().is_empty()),
                baud_rate: serial.baud_rate.unwrap_or(defaults.serial.baud_rate),
                timeout: serial
                    .timeout_ms
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.serial.timeout),
                settle_delay: serial
                    .settle_ms
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.serial.settle_delay),
            },
            detect: DetectSettings {
                target,
                min_area: detect.min_area.unwrap_or(defaults.detect.min_area),
                confidence: detect.confidence.unwrap_or(defaults.detect.confidence),
                model_path: detect.model_path,
                model_input: detect.model_input.unwrap_or(defaults.detect.model_input),
            },
            motion: HarvestSettings {
                step_delay: motion
                    .step_delay_ms
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.motion.step_delay),
                side_offset_m: motion.side_offset_m.unwrap_or(defaults.motion.side_offset_m),
                hover_z_m: motion.hover_z_m.unwrap_or(defaults.motion.hover_z_m),
                grasp_z_m: motion.grasp_z_m.unwrap_or(defaults.motion.grasp_z_m),
                gripper_open_us: motion
                    .gripper_open_us
                    .unwrap_or(defaults.motion.gripper_open_us),
                gripper_closed_us: motion
                    .gripper_closed_us
                    .unwrap_or(defaults.motion.gripper_closed_us),
            },
            control: ControlSettings {
                frames: control.frames.unwrap_or(defaults.control.frames),
                mirror: control.mirror.unwrap_or(defaults.control.mirror),
                detect_all_every: control
                    .detect_all_every
                    .unwrap_or(defaults.control.detect_all_every),
            },
            calibration: file.calibration.unwrap_or(defaults.calibration),
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(port) = std::env::var("ARM_SERIAL_PORT") {
            if !port.trim().is_empty() {
                self.serial.port = Some(port);
            }
        }
        if let Ok(baud) = std::env::var("ARM_BAUD_RATE") {
            self.serial.baud_rate = baud
                .trim()
                .parse()
                .map_err(|_| anyhow!("ARM_BAUD_RATE must be an integer"))?;
        }
        if let Ok(timeout) = std::env::var("ARM_SERIAL_TIMEOUT_MS") {
            let ms: u64 = timeout
                .trim()
                .parse()
                .map_err(|_| anyhow!("ARM_SERIAL_TIMEOUT_MS must be an integer number of milliseconds"))?;
            self.serial.timeout = Duration::from_millis(ms);
        }
        if let Ok(path) = std::env::var("ARM_MODEL_PATH") {
            if !path.trim().is_empty() {
                self.detect.model_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(confidence) = std::env::var("ARM_CONFIDENCE") {
            self.detect.confidence = confidence
                .trim()
                .parse()
                .map_err(|_| anyhow!("ARM_CONFIDENCE must be a number"))?;
        }
        if let Ok(delay) = std::env::var("ARM_STEP_DELAY_MS") {
            let ms: u64 = delay
                .trim()
                .parse()
                .map_err(|_| anyhow!("ARM_STEP_DELAY_MS must be an integer number of milliseconds"))?;
            self.motion.step_delay = Duration::from_millis(ms);
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.serial.baud_rate == 0 {
            return Err(anyhow!("baud rate must be greater than zero"));
        }
        if !(self.detect.confidence > 0.0 && self.detect.confidence <= 1.0) {
            return Err(anyhow!(
                "confidence must be in (0, 1], got {}",
                self.detect.confidence
            ));
        }
        if self.detect.min_area == 0 {
            return Err(anyhow!("min_area must be greater than zero"));
        }
        if self.detect.model_input == 0 {
            return Err(anyhow!("model_input must be greater than zero"));
        }
        for (name, us) in [
            ("gripper_open_us", self.motion.gripper_open_us),
            ("gripper_closed_us", self.motion.gripper_closed_us),
        ] {
            if !(GRIPPER_MIN_US..=GRIPPER_MAX_US).contains(&us) {
                return Err(anyhow!(
                    "{} must be within {}..={} us, got {}",
                    name,
                    GRIPPER_MIN_US,
                    GRIPPER_MAX_US,
                    us
                ));
            }
        }
        if self.control.detect_all_every == 0 {
            return Err(anyhow!("detect_all_every must be greater than zero"));
        }
        Ok(())
    }

    pub fn transport_settings(&self) -> TransportSettings {
        TransportSettings {
            port: self.serial.port.clone(),
            baud_rate: self.serial.baud_rate,
            timeout: self.serial.timeout,
            settle_delay: self.serial.settle_delay,
        }
    }
}

fn read_config_file(path: &Path) -> Result<ArmConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}
