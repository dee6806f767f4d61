use std::time::Duration;

use anyhow::{Context, Result};

use super::plan::{MotionSequence, MotionStep};
use crate::detect::Detection;
use crate::kinematics::Kinematics;

pub const HARVEST_SEQUENCE: &str = "harvest";

#[derive(Clone, Debug, PartialEq)]
pub struct HarvestSettings {
    pub step_delay: Duration,
    /// Lateral distance the object is carried before release.
    pub side_offset_m: f64,
    pub hover_z_m: f64,
    pub grasp_z_m: f64,
    pub gripper_open_us: u16,
    pub gripper_closed_us: u16,
}

impl Default for HarvestSettings {
    fn default() -> Self {
        Self {
            step_delay: Duration::from_secs(2),
            side_offset_m: 0.05,
            hover_z_m: 0.10,
            grasp_z_m: 0.02,
            gripper_open_us: 1200,
            gripper_closed_us: 1800,
        }
    }
}

#[derive(Clone, Copy)]
enum Grip {
    Open,
    Closed,
}

/// Pick up `target` and set it down to the side:
/// above, grab, lift, move aside, drop.
pub fn harvest_sequence(
    kinematics: &dyn Kinematics,
    target: &Detection,
    settings: &HarvestSettings,
) -> Result<MotionSequence> {
    let (x, y) = kinematics.pixel_to_table(target.cx, target.cy);
    let side_x = x + settings.side_offset_m;
    log::info!(
        "harvest target '{}' at pixel ({}, {}) -> table ({:.3} m, {:.3} m)",
        target.label,
        target.cx,
        target.cy,
        x,
        y
    );

    let waypoints = [
        ("above_cup", x, settings.hover_z_m, Grip::Open),
        ("grab_cup", x, settings.grasp_z_m, Grip::Closed),
        ("lift", x, settings.hover_z_m, Grip::Closed),
        ("move_side", side_x, settings.hover_z_m, Grip::Closed),
        ("drop", side_x, settings.grasp_z_m, Grip::Open),
    ];

    let mut steps = Vec::with_capacity(waypoints.len());
    for (name, wx, wz, grip) in waypoints {
        let mut positions = kinematics
            .solve(wx, y, wz)
            .with_context(|| format!("solve waypoint '{}'", name))?;
        if let Some(last) = positions.last_mut() {
            *last = match grip {
                Grip::Open => settings.gripper_open_us,
                Grip::Closed => settings.gripper_closed_us,
            };
        }
        steps.push(MotionStep::new(name, positions, settings.step_delay));
    }
    MotionSequence::new(HARVEST_SEQUENCE, steps)
}
