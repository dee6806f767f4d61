//! Camera-to-table mapping and joint solving.
//!
//! The control loop only needs two pure functions: pixel to table plane, and
//! table point to servo pulses. `PlanarArm` is a simple calibration-driven
//! version of both; other arms plug in through the `Kinematics` trait.

use std::f64::consts::FRAC_PI_2;
use std::f64::consts::FRAC_PI_4;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::transport::{DEFAULT_WRIST_US, NOMINAL_MAX_US, NOMINAL_MIN_US};

const CENTER_US: f64 = 1500.0;

/// Camera and arm geometry. Distances in metres.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Calibration {
    pub image_width: u32,
    pub image_height: u32,
    /// Table area covered by the full frame.
    pub table_width_m: f64,
    pub table_depth_m: f64,
    /// Distance from the arm base to the bottom edge of the frame.
    pub base_to_frame_m: f64,
    pub base_height_m: f64,
    pub upper_arm_m: f64,
    pub forearm_m: f64,
    /// Pulse change per radian of joint rotation.
    pub us_per_rad: f64,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            image_width: 640,
            image_height: 480,
            table_width_m: 0.30,
            table_depth_m: 0.20,
            base_to_frame_m: 0.08,
            base_height_m: 0.08,
            upper_arm_m: 0.18,
            forearm_m: 0.18,
            // 1000 us per quarter turn
            us_per_rad: 1000.0 / FRAC_PI_2,
        }
    }
}

pub trait Kinematics: Send + Sync {
    /// Pixel centroid to table-plane (x, y): x lateral, y forward from base.
    fn pixel_to_table(&self, px: i32, py: i32) -> (f64, f64);

    /// Servo pulses (base, shoulder, elbow, wrist) for a point above the table.
    fn solve(&self, x: f64, y: f64, z: f64) -> Result<Vec<u16>>;
}

/// Base yaw plus a two-link shoulder/elbow chain in the vertical plane.
#[derive(Clone, Debug, Default)]
pub struct PlanarArm {
    calibration: Calibration,
}

impl PlanarArm {
    pub fn new(calibration: Calibration) -> Self {
        Self { calibration }
    }

    fn to_us(&self, angle: f64) -> u16 {
        let us = CENTER_US + angle * self.calibration.us_per_rad;
        us.round()
            .clamp(f64::from(NOMINAL_MIN_US), f64::from(NOMINAL_MAX_US)) as u16
    }
}

impl Kinematics for PlanarArm {
    fn pixel_to_table(&self, px: i32, py: i32) -> (f64, f64) {
        let c = &self.calibration;
        let w = f64::from(c.image_width.max(1));
        let h = f64::from(c.image_height.max(1));
        let x = (f64::from(px) - w / 2.0) * c.table_width_m / w;
        let y = c.base_to_frame_m + (h - f64::from(py)) * c.table_depth_m / h;
        (x, y)
    }

    fn solve(&self, x: f64, y: f64, z: f64) -> Result<Vec<u16>> {
        if !(x.is_finite() && y.is_finite() && z.is_finite()) {
            return Err(anyhow!("target ({}, {}, {}) is not finite", x, y, z));
        }
        let c = &self.calibration;
        let (l1, l2) = (c.upper_arm_m, c.forearm_m);
        if l1 <= 0.0 || l2 <= 0.0 {
            return Err(anyhow!("link lengths must be positive"));
        }

        let base = x.atan2(y);
        let reach = x.hypot(y);
        let rise = z - c.base_height_m;
        let wanted = reach.hypot(rise);
        let min = (l1 - l2).abs() + 1e-6;
        let max = l1 + l2 - 1e-6;
        let d = wanted.clamp(min, max);
        if d != wanted {
            log::debug!(
                "target ({:.3}, {:.3}, {:.3}) out of reach, clamped to {:.3} m",
                x,
                y,
                z,
                d
            );
        }

        let cos_elbow = ((d * d - l1 * l1 - l2 * l2) / (2.0 * l1 * l2)).clamp(-1.0, 1.0);
        let elbow = cos_elbow.acos();
        let shoulder =
            rise.atan2(reach) + (l2 * elbow.sin()).atan2(l1 + l2 * elbow.cos());

        Ok(vec![
            self.to_us(base),
            self.to_us(shoulder - FRAC_PI_4),
            self.to_us(elbow - FRAC_PI_2),
            DEFAULT_WRIST_US,
        ])
    }
}
