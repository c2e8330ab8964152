//! Unit selection and conversion for measurement output.

use crate::error::{GuardError, GuardResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};

const BYTES_PER_KB: f64 = 1024.0;
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Unit used when reporting elapsed time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TimeUnit {
    /// Milliseconds
    #[default]
    #[serde(rename = "ms")]
    Milliseconds,
    /// Seconds
    #[serde(rename = "s")]
    Seconds,
}

impl TimeUnit {
    /// Short label used in log records.
    pub fn as_str(self) -> &'static str {
        match self {
            TimeUnit::Milliseconds => "ms",
            TimeUnit::Seconds => "s",
        }
    }

    fn tag(self) -> u8 {
        match self {
            TimeUnit::Milliseconds => 0,
            TimeUnit::Seconds => 1,
        }
    }

    // Tags are only ever written from `tag()`.
    fn from_tag(tag: u8) -> Self {
        match tag {
            1 => TimeUnit::Seconds,
            _ => TimeUnit::Milliseconds,
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeUnit {
    type Err = GuardError;

    fn from_str(s: &str) -> GuardResult<Self> {
        match s {
            "ms" => Ok(TimeUnit::Milliseconds),
            "s" => Ok(TimeUnit::Seconds),
            other => Err(GuardError::Configuration(format!(
                "unknown time unit '{}' (expected 'ms' or 's')",
                other
            ))),
        }
    }
}

/// Unit used when reporting memory deltas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum MemoryUnit {
    /// Raw bytes
    #[default]
    #[serde(rename = "bytes")]
    Bytes,
    /// Kibibytes (1024 bytes)
    #[serde(rename = "KB")]
    Kilobytes,
    /// Mebibytes (1024 * 1024 bytes)
    #[serde(rename = "MB")]
    Megabytes,
}

impl MemoryUnit {
    /// Short label used in log records.
    pub fn as_str(self) -> &'static str {
        match self {
            MemoryUnit::Bytes => "bytes",
            MemoryUnit::Kilobytes => "KB",
            MemoryUnit::Megabytes => "MB",
        }
    }

    fn tag(self) -> u8 {
        match self {
            MemoryUnit::Bytes => 0,
            MemoryUnit::Kilobytes => 1,
            MemoryUnit::Megabytes => 2,
        }
    }

    fn from_tag(tag: u8) -> Self {
        match tag {
            1 => MemoryUnit::Kilobytes,
            2 => MemoryUnit::Megabytes,
            _ => MemoryUnit::Bytes,
        }
    }
}

impl fmt::Display for MemoryUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemoryUnit {
    type Err = GuardError;

    fn from_str(s: &str) -> GuardResult<Self> {
        match s {
            "bytes" => Ok(MemoryUnit::Bytes),
            "KB" => Ok(MemoryUnit::Kilobytes),
            "MB" => Ok(MemoryUnit::Megabytes),
            other => Err(GuardError::Configuration(format!(
                "unknown memory unit '{}' (expected 'bytes', 'KB' or 'MB')",
                other
            ))),
        }
    }
}

/// Convert a raw duration in seconds into `unit`.
#[inline]
pub fn convert_time(raw_seconds: f64, unit: TimeUnit) -> f64 {
    match unit {
        TimeUnit::Milliseconds => raw_seconds * 1000.0,
        TimeUnit::Seconds => raw_seconds,
    }
}

/// Convert a raw (possibly negative) byte delta into `unit`.
#[inline]
pub fn convert_memory(raw_bytes: f64, unit: MemoryUnit) -> f64 {
    match unit {
        MemoryUnit::Bytes => raw_bytes,
        MemoryUnit::Kilobytes => raw_bytes / BYTES_PER_KB,
        MemoryUnit::Megabytes => raw_bytes / BYTES_PER_MB,
    }
}

/// A plain, serializable pair of units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Units {
    /// Unit for elapsed time
    #[serde(default)]
    pub time_unit: TimeUnit,
    /// Unit for memory deltas
    #[serde(default)]
    pub memory_unit: MemoryUnit,
}

/// Live unit settings shared between an engine and whoever configures it.
///
/// Reads and writes are lock-free. A measurement already in flight when a
/// setter runs converts with whatever unit is loaded when it finishes.
#[derive(Debug, Default)]
pub struct UnitSettings {
    time_unit: AtomicU8,
    memory_unit: AtomicU8,
}

impl UnitSettings {
    /// Create settings with the default units (`ms` / `bytes`).
    pub fn new() -> Self {
        Self::default()
    }

    /// Create settings holding the given units.
    pub fn with_units(units: Units) -> Self {
        let settings = Self::new();
        settings.apply(units);
        settings
    }

    /// Parse settings from a JSON document such as
    /// `{"timeUnit": "s", "memoryUnit": "KB"}`.
    pub fn from_json(json: &str) -> GuardResult<Self> {
        let units: Units = serde_json::from_str(json)?;
        Ok(Self::with_units(units))
    }

    /// Load settings from a JSON file.
    pub fn load_sync(path: impl AsRef<Path>) -> GuardResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Currently active time unit.
    #[inline]
    pub fn time_unit(&self) -> TimeUnit {
        TimeUnit::from_tag(self.time_unit.load(Ordering::Relaxed))
    }

    /// Currently active memory unit.
    #[inline]
    pub fn memory_unit(&self) -> MemoryUnit {
        MemoryUnit::from_tag(self.memory_unit.load(Ordering::Relaxed))
    }

    /// Set the time unit for all subsequent conversions.
    pub fn set_time_unit(&self, unit: TimeUnit) {
        self.time_unit.store(unit.tag(), Ordering::Relaxed);
    }

    /// Set the memory unit for all subsequent conversions.
    pub fn set_memory_unit(&self, unit: MemoryUnit) {
        self.memory_unit.store(unit.tag(), Ordering::Relaxed);
    }

    /// Overwrite both units.
    pub fn apply(&self, units: Units) {
        self.set_time_unit(units.time_unit);
        self.set_memory_unit(units.memory_unit);
    }

    /// Copy out the current units.
    pub fn snapshot(&self) -> Units {
        Units {
            time_unit: self.time_unit(),
            memory_unit: self.memory_unit(),
        }
    }

    /// Convert raw seconds with the active time unit.
    pub fn convert_time(&self, raw_seconds: f64) -> f64 {
        convert_time(raw_seconds, self.time_unit())
    }

    /// Convert raw bytes with the active memory unit.
    pub fn convert_memory(&self, raw_bytes: f64) -> f64 {
        convert_memory(raw_bytes, self.memory_unit())
    }
}

/// Process-wide default settings
static GLOBAL_UNITS: OnceLock<Arc<UnitSettings>> = OnceLock::new();

/// Get the process-wide unit settings.
///
/// Engines built with [`Guardian::default`](crate::Guardian) read from this
/// instance, so the free setters affect every such engine.
pub fn global_units() -> &'static Arc<UnitSettings> {
    GLOBAL_UNITS.get_or_init(|| Arc::new(UnitSettings::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_defaults() {
        let settings = UnitSettings::new();
        assert_eq!(settings.time_unit(), TimeUnit::Milliseconds);
        assert_eq!(settings.memory_unit(), MemoryUnit::Bytes);
    }

    #[test]
    fn test_setters_round_trip_through_atomics() {
        let settings = UnitSettings::new();
        settings.set_time_unit(TimeUnit::Seconds);
        settings.set_memory_unit(MemoryUnit::Megabytes);
        assert_eq!(settings.time_unit(), TimeUnit::Seconds);
        assert_eq!(settings.memory_unit(), MemoryUnit::Megabytes);

        settings.set_memory_unit(MemoryUnit::Kilobytes);
        assert_eq!(settings.memory_unit(), MemoryUnit::Kilobytes);
    }

    #[test]
    fn test_known_conversions() {
        assert_eq!(convert_time(1.5, TimeUnit::Milliseconds), 1500.0);
        assert_eq!(convert_time(1.5, TimeUnit::Seconds), 1.5);
        assert_eq!(convert_memory(2048.0, MemoryUnit::Kilobytes), 2.0);
        assert_eq!(convert_memory(3.0 * 1024.0 * 1024.0, MemoryUnit::Megabytes), 3.0);
        assert_eq!(convert_memory(-512.0, MemoryUnit::Kilobytes), -0.5);
    }

    #[test]
    fn test_settings_convert_with_active_units() {
        let settings = UnitSettings::new();
        assert_eq!(settings.convert_time(0.25), 250.0);
        assert_eq!(settings.convert_memory(3072.0), 3072.0);

        settings.apply(Units {
            time_unit: TimeUnit::Seconds,
            memory_unit: MemoryUnit::Kilobytes,
        });
        assert_eq!(settings.convert_time(0.25), 0.25);
        assert_eq!(settings.convert_memory(3072.0), 3.0);

        settings.set_memory_unit(MemoryUnit::Megabytes);
        assert_eq!(settings.convert_memory(1_048_576.0), 1.0);
    }

    #[test]
    fn test_parse_units() {
        assert_eq!("ms".parse::<TimeUnit>().unwrap(), TimeUnit::Milliseconds);
        assert_eq!("s".parse::<TimeUnit>().unwrap(), TimeUnit::Seconds);
        assert_eq!("KB".parse::<MemoryUnit>().unwrap(), MemoryUnit::Kilobytes);

        let err = "min".parse::<TimeUnit>().unwrap_err();
        assert!(matches!(err, GuardError::Configuration(_)));
        let err = "GB".parse::<MemoryUnit>().unwrap_err();
        assert!(matches!(err, GuardError::Configuration(_)));
    }

    #[test]
    fn test_settings_from_json() {
        let settings = UnitSettings::from_json(r#"{"timeUnit": "s", "memoryUnit": "MB"}"#).unwrap();
        assert_eq!(settings.time_unit(), TimeUnit::Seconds);
        assert_eq!(settings.memory_unit(), MemoryUnit::Megabytes);

        let partial = UnitSettings::from_json(r#"{"memoryUnit": "KB"}"#).unwrap();
        assert_eq!(partial.time_unit(), TimeUnit::Milliseconds);
        assert_eq!(partial.memory_unit(), MemoryUnit::Kilobytes);

        let bad = UnitSettings::from_json(r#"{"timeUnit": "hours"}"#);
        assert!(matches!(bad, Err(GuardError::Serialization(_))));
    }

    #[test]
    fn test_units_serialize_with_short_labels() {
        let units = Units {
            time_unit: TimeUnit::Seconds,
            memory_unit: MemoryUnit::Kilobytes,
        };
        let json = serde_json::to_string(&units).unwrap();
        assert_eq!(json, r#"{"timeUnit":"s","memoryUnit":"KB"}"#);
    }

    proptest! {
        #[test]
        fn seconds_is_identity(raw in -1.0e6f64..1.0e6) {
            prop_assert_eq!(convert_time(raw, TimeUnit::Seconds), raw);
        }

        #[test]
        fn milliseconds_scale_by_thousand(raw in -1.0e6f64..1.0e6) {
            prop_assert_eq!(convert_time(raw, TimeUnit::Milliseconds), raw * 1000.0);
        }

        #[test]
        fn memory_units_divide_exactly(raw in -1.0e12f64..1.0e12) {
            prop_assert_eq!(convert_memory(raw, MemoryUnit::Bytes), raw);
            prop_assert_eq!(convert_memory(raw, MemoryUnit::Kilobytes), raw / 1024.0);
            prop_assert_eq!(convert_memory(raw, MemoryUnit::Megabytes), raw / 1_048_576.0);
        }
    }
}
