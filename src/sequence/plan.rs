use std::time::Duration;

use anyhow::{anyhow, Result};

use crate::transport::Command;

/// One waypoint: target pulse widths (base, shoulder, elbow[, wrist]) and
/// the pause after issuing them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MotionStep {
    pub name: String,
    pub positions: Vec<u16>,
    pub delay: Duration,
}

impl MotionStep {
    pub fn new(name: impl Into<String>, positions: Vec<u16>, delay: Duration) -> Self {
        Self {
            name: name.into(),
            positions,
            delay,
        }
    }

    /// Actuation command for this step. Fails on arity other than 3 or 4.
    pub fn command(&self) -> Result<Command> {
        Command::from_us_list(&self.positions)
            .map_err(|err| anyhow!("step '{}': {}", self.name, err))
    }
}

/// Ordered list of steps with unique names.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MotionSequence {
    name: String,
    steps: Vec<MotionStep>,
}

impl MotionSequence {
    pub fn new(name: impl Into<String>, steps: Vec<MotionStep>) -> Result<Self> {
        for (i, step) in steps.iter().enumerate() {
            if steps[..i].iter().any(|prior| prior.name == step.name) {
                return Err(anyhow!("duplicate step name '{}'", step.name));
            }
        }
        Ok(Self {
            name: name.into(),
            steps,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[MotionStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Sum of all post-step delays.
    pub fn total_delay(&self) -> Duration {
        self.steps.iter().map(|step| step.delay).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_duplicate_step_names() {
        let step = MotionStep::new("lift", vec![1500, 1500, 1500], Duration::ZERO);
        assert!(MotionSequence::new("bad", vec![step.clone(), step]).is_err());
    }

    #[test]
    fn three_value_step_defaults_wrist() {
        let step = MotionStep::new("a", vec![1500, 1600, 1800], Duration::ZERO);
        assert_eq!(step.command().unwrap(), Command::servos(1500, 1600, 1800, 1500));
    }

    #[test]
    fn bad_arity_names_the_step() {
        let step = MotionStep::new("reach", vec![1500], Duration::ZERO);
        let err = step.command().unwrap_err().to_string();
        assert!(err.contains("reach"));
    }

    #[test]
    fn total_delay_sums_steps() {
        let seq = MotionSequence::new(
            "s",
            vec![
                MotionStep::new("a", vec![1500; 3], Duration::from_millis(2500)),
                MotionStep::new("b", vec![1500; 3], Duration::from_millis(2000)),
            ],
        )
        .unwrap();
        assert_eq!(seq.total_delay(), Duration::from_millis(4500));
        assert_eq!(seq.len(), 2);
    }
}
