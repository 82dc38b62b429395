use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::drivers::ConfigError;

/// One acquired measurement and its arrival order.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample {
    pub index: u64,
    pub value: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntervalUnit {
    Milliseconds,
    Seconds,
    Minutes,
}

impl IntervalUnit {
    /// Single-letter code used by the device protocol and the native file format.
    pub fn code(&self) -> char {
        match self {
            Self::Milliseconds => 'm',
            Self::Seconds => 's',
            Self::Minutes => 'M',
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "m" => Some(Self::Milliseconds),
            "s" => Some(Self::Seconds),
            "M" => Some(Self::Minutes),
            _ => None,
        }
    }

    /// Accepted magnitude range for this unit.
    pub fn range(&self) -> (u32, u32) {
        match self {
            Self::Milliseconds => (1, 1000),
            Self::Seconds | Self::Minutes => (1, 60),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Milliseconds => "ms",
            Self::Seconds => "s",
            Self::Minutes => "min",
        }
    }

    fn millis(&self) -> u64 {
        match self {
            Self::Milliseconds => 1,
            Self::Seconds => 1_000,
            Self::Minutes => 60_000,
        }
    }
}

/// Time between two samples, as configured on the device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleInterval {
    pub magnitude: u32,
    pub unit: IntervalUnit,
}

impl SampleInterval {
    pub fn new(magnitude: u32, unit: IntervalUnit) -> Result<Self, ConfigError> {
        let interval = Self { magnitude, unit };
        interval.validate()?;
        Ok(interval)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let (min, max) = self.unit.range();
        if self.magnitude < min || self.magnitude > max {
            return Err(ConfigError::InvalidInterval {
                magnitude: self.magnitude,
                unit: self.unit.label(),
                min,
                max,
            });
        }
        Ok(())
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_millis(u64::from(self.magnitude) * self.unit.millis())
    }

    /// Start command understood by the microcontroller, e.g. `"250m"`.
    pub fn device_command(&self) -> String {
        format!("{}{}", self.magnitude, self.unit.code())
    }
}

impl Default for SampleInterval {
    fn default() -> Self {
        Self {
            magnitude: 1,
            unit: IntervalUnit::Seconds,
        }
    }
}

impl fmt::Display for SampleInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.magnitude, self.unit.label())
    }
}

/// Estimated time until `capacity` is reached at the given interval.
pub fn remaining_time(capacity: usize, count: usize, interval: SampleInterval) -> Duration {
    let left = capacity.saturating_sub(count) as u32;
    interval.as_duration() * left
}

/// Status-bar rendering of a remaining duration.
pub fn format_remaining(remaining: Duration) -> String {
    let total_ms = remaining.as_millis();
    let days = total_ms / 86_400_000;
    let hours = (total_ms % 86_400_000) / 3_600_000;
    let mins = (total_ms % 3_600_000) / 60_000;
    let secs = (total_ms % 60_000) / 1_000;
    let millis = total_ms % 1_000;
    format!("Rem. time: {days}d : {hours:02}h : {mins:02}m : {secs:02}s : {millis:03}ms")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_codes_match_device_protocol() {
        assert_eq!(IntervalUnit::Milliseconds.code(), 'm');
        assert_eq!(IntervalUnit::Seconds.code(), 's');
        assert_eq!(IntervalUnit::Minutes.code(), 'M');
        assert_eq!(IntervalUnit::from_code("M"), Some(IntervalUnit::Minutes));
        assert_eq!(IntervalUnit::from_code("min"), None);
    }

    #[test]
    fn device_command_joins_magnitude_and_code() {
        let interval = SampleInterval::new(250, IntervalUnit::Milliseconds).unwrap();
        assert_eq!(interval.device_command(), "250m");
        assert_eq!(interval.as_duration(), Duration::from_millis(250));
    }

    #[test]
    fn out_of_range_interval_is_rejected() {
        assert!(SampleInterval::new(0, IntervalUnit::Seconds).is_err());
        assert!(SampleInterval::new(61, IntervalUnit::Minutes).is_err());
        assert!(SampleInterval::new(1000, IntervalUnit::Milliseconds).is_ok());
    }

    #[test]
    fn remaining_time_scales_with_free_slots() {
        let interval = SampleInterval::new(2, IntervalUnit::Seconds).unwrap();
        assert_eq!(remaining_time(10, 4, interval), Duration::from_secs(12));
        assert_eq!(remaining_time(10, 10, interval), Duration::ZERO);
    }

    #[test]
    fn remaining_time_formatting() {
        let d = Duration::from_millis(86_400_000 + 2 * 3_600_000 + 3 * 60_000 + 4_005);
        assert_eq!(
            format_remaining(d),
            "Rem. time: 1d : 02h : 03m : 04s : 005ms"
        );
    }
}
