use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Wall-clock time of day as kept by the RTC, 24-hour format.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay {
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TimeParseError {
    #[error("Expected time as HH:MM:SS, got '{0}'")]
    Format(String),
    #[error("Field '{field}' out of range: {value}")]
    OutOfRange { field: &'static str, value: u8 },
}

impl TimeOfDay {
    pub fn new(hours: u8, minutes: u8, seconds: u8) -> Result<Self, TimeParseError> {
        if hours > 23 {
            return Err(TimeParseError::OutOfRange {
                field: "hours",
                value: hours,
            });
        }
        if minutes > 59 {
            return Err(TimeParseError::OutOfRange {
                field: "minutes",
                value: minutes,
            });
        }
        if seconds > 59 {
            return Err(TimeParseError::OutOfRange {
                field: "seconds",
                value: seconds,
            });
        }
        Ok(Self {
            hours,
            minutes,
            seconds,
        })
    }
}

impl FromStr for TimeOfDay {
    type Err = TimeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.trim().split(':').collect();
        if fields.len() != 3 {
            return Err(TimeParseError::Format(s.to_string()));
        }
        let mut parsed = [0u8; 3];
        for (slot, field) in parsed.iter_mut().zip(&fields) {
            *slot = field
                .parse()
                .map_err(|_| TimeParseError::Format(s.to_string()))?;
        }
        Self::new(parsed[0], parsed[1], parsed[2])
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = TimeParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeOfDay> for String {
    fn from(t: TimeOfDay) -> Self {
        t.to_string()
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}",
            self.hours, self.minutes, self.seconds
        )
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct RtcConfig {
    /// Time loaded into the RTC before power-on.
    #[serde(default)]
    pub start: TimeOfDay,
    /// Leave the oscillator halted (CH bit set), as on a fresh chip.
    #[serde(default)]
    pub halted: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct BoardConfig {
    #[serde(default)]
    pub rtc: RtcConfig,
    /// Mirror UART output to stdout.
    #[serde(default = "default_uart_echo")]
    pub uart_echo: bool,
}

fn default_uart_echo() -> bool {
    true
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            rtc: RtcConfig::default(),
            uart_echo: default_uart_echo(),
        }
    }
}

impl BoardConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let f = std::fs::File::open(path)?;
        serde_yaml::from_reader(f).context("Failed to parse Board Config")
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct TestLimits {
    pub duration_ms: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct UartContainsAssertion {
    pub uart_contains: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct MinTicksAssertion {
    pub min_ticks: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct MaxTicksAssertion {
    pub max_ticks: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(untagged)]
pub enum TestAssertion {
    UartContains(UartContainsAssertion),
    MinTicks(MinTicksAssertion),
    MaxTicks(MaxTicksAssertion),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct TestScript {
    pub schema_version: String,
    #[serde(default)]
    pub board: BoardConfig,
    pub limits: TestLimits,
    #[serde(default)]
    pub assertions: Vec<TestAssertion>,
}

impl TestScript {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let f = std::fs::File::open(&path)
            .with_context(|| {
                format!("Failed to open test script at {:?}", path.as_ref())
            })?;
        let script: Self =
            serde_yaml::from_reader(f).context("Failed to parse Test Script YAML")?;
        script.validate()?;
        Ok(script)
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema_version != "1.0" {
            anyhow::bail!(
                "Unsupported schema_version '{}'. Supported versions: '1.0'",
                self.schema_version
            );
        }

        if self.limits.duration_ms == 0 {
            anyhow::bail!("Limit 'duration_ms' must be greater than zero");
        }

        for assertion in &self.assertions {
            if let TestAssertion::UartContains(a) = assertion {
                if a.uart_contains.is_empty() {
                    anyhow::bail!("Assertion 'uart_contains' cannot be empty");
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_script() {
        let yaml = r#"
schema_version: "1.0"
board:
  rtc:
    start: "12:34:56"
    halted: true
  uart_echo: false
limits:
  duration_ms: 5000
assertions:
  - uart_contains: "seconds"
  - min_ticks: 4
  - max_ticks: 6
"#;
        let script: TestScript = serde_yaml::from_str(yaml).unwrap();
        assert!(script.validate().is_ok());
        assert_eq!(script.board.rtc.start, TimeOfDay::new(12, 34, 56).unwrap());
        assert!(script.board.rtc.halted);
        assert!(!script.board.uart_echo);
        assert_eq!(script.limits.duration_ms, 5000);
        assert_eq!(script.assertions.len(), 3);
        assert!(matches!(
            script.assertions[1],
            TestAssertion::MinTicks(MinTicksAssertion { min_ticks: 4 })
        ));
    }

    #[test]
    fn test_board_defaults() {
        let yaml = r#"
schema_version: "1.0"
limits:
  duration_ms: 10
"#;
        let script: TestScript = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(script.board.rtc.start, TimeOfDay::default());
        assert!(!script.board.rtc.halted);
        assert!(script.board.uart_echo);
        assert!(script.assertions.is_empty());
    }

    #[test]
    fn test_invalid_version() {
        let yaml = r#"
schema_version: "2.0"
limits:
  duration_ms: 100
"#;
        let script: TestScript = serde_yaml::from_str(yaml).unwrap();
        let err = script.validate().unwrap_err();
        assert!(err.to_string().contains("Unsupported schema_version"));
    }

    #[test]
    fn test_invalid_duration() {
        let yaml = r#"
schema_version: "1.0"
limits:
  duration_ms: 0
"#;
        let script: TestScript = serde_yaml::from_str(yaml).unwrap();
        let err = script.validate().unwrap_err();
        assert!(err.to_string().contains("duration_ms"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let yaml = r#"
schema_version: "1.0"
limits:
  duration_ms: 10
  max_steps: 10
"#;
        assert!(serde_yaml::from_str::<TestScript>(yaml).is_err());
    }

    #[test]
    fn test_bad_start_time_rejected() {
        let yaml = r#"
schema_version: "1.0"
board:
  rtc:
    start: "25:00:00"
limits:
  duration_ms: 10
"#;
        assert!(serde_yaml::from_str::<TestScript>(yaml).is_err());
    }

    #[test]
    fn test_time_parse() {
        assert_eq!("07:05:09".parse::<TimeOfDay>(), TimeOfDay::new(7, 5, 9));
        assert_eq!(
            "7:5".parse::<TimeOfDay>(),
            Err(TimeParseError::Format("7:5".to_string()))
        );
        assert_eq!(
            "10:60:00".parse::<TimeOfDay>(),
            Err(TimeParseError::OutOfRange {
                field: "minutes",
                value: 60
            })
        );
        assert!("aa:bb:cc".parse::<TimeOfDay>().is_err());
        assert_eq!(TimeOfDay::new(1, 2, 3).unwrap().to_string(), "01:02:03");
    }
}
