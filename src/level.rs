use std::{fmt, str::FromStr};

use tracing_core::{Level, LevelFilter};

use crate::error::ParseLevelError;

/// Ordered severity of a log event.
///
/// The numeric values follow the conventional 10-step scale, with `TRACE` below `DEBUG` for events
/// coming from `tracing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Trace,
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn name(self) -> &'static str {
        match self {
            Self::Trace => "TRACE",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        }
    }

    pub fn number(self) -> u32 {
        match self {
            Self::Trace => 5,
            Self::Debug => 10,
            Self::Info => 20,
            Self::Warning => 30,
            Self::Error => 40,
            Self::Critical => 50,
        }
    }

    /// `tracing` has no level above `ERROR`, so `CRITICAL` events are emitted as `ERROR`.
    pub fn as_level(self) -> Level {
        match self {
            Self::Trace => Level::TRACE,
            Self::Debug => Level::DEBUG,
            Self::Info => Level::INFO,
            Self::Warning => Level::WARN,
            Self::Error | Self::Critical => Level::ERROR,
        }
    }
}

impl From<Level> for Severity {
    fn from(level: Level) -> Self {
        match level {
            Level::TRACE => Self::Trace,
            Level::DEBUG => Self::Debug,
            Level::INFO => Self::Info,
            Level::WARN => Self::Warning,
            _ => Self::Error,
        }
    }
}

impl From<&Level> for Severity {
    fn from(level: &Level) -> Self {
        Self::from(*level)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

impl FromStr for Severity {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TRACE" => Ok(Self::Trace),
            "DEBUG" => Ok(Self::Debug),
            "INFO" => Ok(Self::Info),
            "WARNING" | "WARN" => Ok(Self::Warning),
            "ERROR" => Ok(Self::Error),
            "CRITICAL" | "FATAL" => Ok(Self::Critical),
            _ => Err(ParseLevelError(s.to_owned())),
        }
    }
}

/// A threshold as given to the setup helper: either a named severity or a raw number.
///
/// Names are normalized to their upper-case form; numbers are kept as given and only mapped onto
/// a [`LevelFilter`] when the filter is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelSetting {
    Named(Severity),
    Numeric(u32),
}

impl LevelSetting {
    /// Events below this setting are dropped. A number keeps the events whose severity number is
    /// at least that number.
    ///
    /// No `tracing` event is more severe than `ERROR`, so `CRITICAL` and numbers above 40 drop
    /// everything.
    pub fn to_level_filter(self) -> LevelFilter {
        let number = match self {
            Self::Named(severity) => severity.number(),
            Self::Numeric(number) => number,
        };
        match number {
            0..=5 => LevelFilter::TRACE,
            6..=10 => LevelFilter::DEBUG,
            11..=20 => LevelFilter::INFO,
            21..=30 => LevelFilter::WARN,
            31..=40 => LevelFilter::ERROR,
            _ => LevelFilter::OFF,
        }
    }
}

impl Default for LevelSetting {
    fn default() -> Self {
        Self::Named(Severity::Info)
    }
}

impl From<Severity> for LevelSetting {
    fn from(severity: Severity) -> Self {
        Self::Named(severity)
    }
}

impl From<Level> for LevelSetting {
    fn from(level: Level) -> Self {
        Self::Named(level.into())
    }
}

impl From<u32> for LevelSetting {
    fn from(number: u32) -> Self {
        Self::Numeric(number)
    }
}

impl FromStr for LevelSetting {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return trimmed
                .parse()
                .map(Self::Numeric)
                .map_err(|_| ParseLevelError(s.to_owned()));
        }
        trimmed.parse().map(Self::Named)
    }
}

impl TryFrom<&str> for LevelSetting {
    type Error = ParseLevelError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for LevelSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(severity) => fmt::Display::fmt(severity, f),
            Self::Numeric(number) => write!(f, "{number}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use tracing_core::LevelFilter;

    use super::{LevelSetting, Severity};

    #[test]
    fn names_are_case_insensitive() {
        assert_eq!("info".parse::<Severity>(), Ok(Severity::Info));
        assert_eq!("Warn".parse::<Severity>(), Ok(Severity::Warning));
        assert_eq!("CRITICAL".parse::<Severity>(), Ok(Severity::Critical));
        assert!("loud".parse::<Severity>().is_err());
    }

    #[test]
    fn severities_are_ordered() {
        assert!(Severity::Debug < Severity::Info);
        assert!(Severity::Error < Severity::Critical);
        assert_eq!(Severity::Warning.number(), 30);
    }

    #[test]
    fn settings_normalize() {
        let named: LevelSetting = "warning".parse().unwrap();
        assert_eq!(named.to_string(), "WARNING");

        let numeric: LevelSetting = "25".parse().unwrap();
        assert_eq!(numeric, LevelSetting::Numeric(25));
        assert_eq!(numeric.to_string(), "25");
        assert_eq!(numeric.to_level_filter(), LevelFilter::WARN);

        assert_eq!(LevelSetting::Numeric(60).to_level_filter(), LevelFilter::OFF);
    }

    #[test]
    fn top_of_scale_drops_errors() {
        assert_eq!(LevelSetting::Numeric(40).to_level_filter(), LevelFilter::ERROR);
        assert_eq!(LevelSetting::Numeric(41).to_level_filter(), LevelFilter::OFF);
        assert_eq!(LevelSetting::Numeric(50).to_level_filter(), LevelFilter::OFF);
        assert_eq!(
            LevelSetting::Named(Severity::Error).to_level_filter(),
            LevelFilter::ERROR,
        );
        assert_eq!(
            LevelSetting::Named(Severity::Critical).to_level_filter(),
            LevelFilter::OFF,
        );
    }
}
