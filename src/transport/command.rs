use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

/// Wrist pulse used when a request only carries base, shoulder and elbow.
pub const DEFAULT_WRIST_US: u16 = 1500;

/// Nominal servo pulse range in microseconds.
pub const NOMINAL_MIN_US: u16 = 900;
pub const NOMINAL_MAX_US: u16 = 2100;

/// One actuator command, serialized as a single JSON line keyed by `op`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Command {
    /// Set all four servo pulse widths (microseconds).
    Servos {
        base: u16,
        shoulder: u16,
        elbow: u16,
        wrist: u16,
    },
    /// Liveness check; firmware may answer with a line of text.
    Ping,
}

impl Command {
    pub fn servos(base: u16, shoulder: u16, elbow: u16, wrist: u16) -> Self {
        Command::Servos {
            base,
            shoulder,
            elbow,
            wrist,
        }
    }

    /// Build a servo command from 3 or 4 pulse widths
    /// (base, shoulder, elbow[, wrist]). Wrist defaults to 1500.
    pub fn from_us_list(us: &[u16]) -> Result<Self> {
        match *us {
            [base, shoulder, elbow] => Ok(Self::servos(base, shoulder, elbow, DEFAULT_WRIST_US)),
            [base, shoulder, elbow, wrist] => Ok(Self::servos(base, shoulder, elbow, wrist)),
            _ => Err(anyhow!("expected 3 or 4 servo values, got {}", us.len())),
        }
    }

    /// Pulse widths outside the nominal range, if any. Reported, not rejected:
    /// the firmware clamps on its side.
    pub fn out_of_range(&self) -> Vec<u16> {
        match self {
            Command::Servos {
                base,
                shoulder,
                elbow,
                wrist,
            } => [*base, *shoulder, *elbow, *wrist]
                .into_iter()
                .filter(|us| !(NOMINAL_MIN_US..=NOMINAL_MAX_US).contains(us))
                .collect(),
            Command::Ping => Vec::new(),
        }
    }

    /// Newline-terminated UTF-8 JSON frame.
    pub fn encode_line(&self) -> Result<String> {
        let mut line = serde_json::to_string(self).context("serialize actuator command")?;
        line.push('\n');
        Ok(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_values_default_the_wrist() {
        let cmd = Command::from_us_list(&[1500, 1600, 1800]).unwrap();
        let line = cmd.encode_line().unwrap();
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);
        let value: serde_json::Value = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(value["op"], "servos");
        assert_eq!(value["base"], 1500);
        assert_eq!(value["shoulder"], 1600);
        assert_eq!(value["elbow"], 1800);
        assert_eq!(value["wrist"], 1500);
    }

    #[test]
    fn wire_layout_is_stable() {
        let line = Command::servos(1000, 1100, 1200, 1300).encode_line().unwrap();
        assert_eq!(
            line,
            "{\"op\":\"servos\",\"base\":1000,\"shoulder\":1100,\"elbow\":1200,\"wrist\":1300}\n"
        );
        assert_eq!(Command::Ping.encode_line().unwrap(), "{\"op\":\"ping\"}\n");
    }

    #[test]
    fn rejects_other_arities() {
        assert!(Command::from_us_list(&[1500, 1500]).is_err());
        assert!(Command::from_us_list(&[1500; 5]).is_err());
    }

    #[test]
    fn reports_out_of_range_pulses() {
        let cmd = Command::servos(800, 1500, 2200, 1500);
        assert_eq!(cmd.out_of_range(), vec![800, 2200]);
    }
}
