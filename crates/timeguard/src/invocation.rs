//! Per-call measurement state
//!
//! An [`Invocation`] is created right before the target runs and finalizes
//! exactly once: explicitly through [`Invocation::finish`], or from `Drop`
//! when the call never completed (an async wrapper dropped mid-flight).

use crate::config::MeasurementConfig;
use crate::engine::Guardian;
use crate::units::{MemoryUnit, Units};
use std::any::Any;
use std::sync::Arc;
use std::time::Instant;

/// Raw before/after readings for one call.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MeasurementSample {
    /// Instant taken before the target ran
    pub start_time: Option<Instant>,
    /// Resident bytes before the target ran
    pub start_memory: Option<u64>,
    /// Instant taken after the target finished
    pub end_time: Option<Instant>,
    /// Resident bytes after the target finished
    pub end_memory: Option<u64>,
}

impl MeasurementSample {
    /// Elapsed seconds between the two instants, if both were taken.
    pub fn elapsed_seconds(&self) -> Option<f64> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some(end.saturating_duration_since(start).as_secs_f64()),
            _ => None,
        }
    }

    /// Signed resident-memory delta in bytes, if both reads succeeded.
    pub fn memory_delta(&self) -> Option<i64> {
        match (self.start_memory, self.end_memory) {
            (Some(start), Some(end)) => Some(end as i64 - start as i64),
            _ => None,
        }
    }
}

/// How a call left the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Outcome {
    Success,
    /// `Err` display text or panic message
    Failure(String),
    /// The wrapper future was dropped before the target completed
    Cancelled,
}

pub(crate) struct Invocation {
    guardian: Guardian,
    config: Arc<MeasurementConfig>,
    target: &'static str,
    sample: MeasurementSample,
    finished: bool,
}

impl Invocation {
    /// Take the start snapshot for one call.
    pub(crate) fn start(
        guardian: Guardian,
        config: Arc<MeasurementConfig>,
        target: &'static str,
    ) -> Self {
        let mut sample = MeasurementSample::default();
        if config.tracks_elapsed() {
            sample.start_time = Some(Instant::now());
        }
        if config.tracks_memory() {
            sample.start_memory = guardian.read_memory();
        }

        Self {
            guardian,
            config,
            target,
            sample,
            finished: false,
        }
    }

    /// Finalize after the target returned or panicked.
    pub(crate) fn finish(mut self, outcome: Outcome) {
        self.finalize(outcome);
    }

    fn finalize(&mut self, outcome: Outcome) {
        self.finished = true;
        let sink = self.guardian.sink();

        if !self.config.is_passthrough() {
            // Memory is not read at the end when the start read failed.
            if self.sample.start_memory.is_some() {
                self.sample.end_memory = self.guardian.read_memory();
            }
            if self.sample.start_time.is_some() {
                self.sample.end_time = Some(Instant::now());
            }

            let units = self.guardian.units().snapshot();
            tracing::trace!(
                target: "timeguard::engine",
                callable = self.target,
                elapsed_s = self.sample.elapsed_seconds(),
                memory_delta = self.sample.memory_delta(),
                "call measured"
            );

            if let Some(message) = measurement_record(&self.config, &self.sample, units) {
                sink.info(&message);
            }
        }

        match outcome {
            Outcome::Success => {}
            Outcome::Failure(reason) => {
                sink.error(&format!(
                    "{}Error in {}: {}",
                    self.config.prefix(),
                    self.target,
                    reason
                ));
            }
            Outcome::Cancelled => {
                tracing::debug!(
                    target: "timeguard::engine",
                    callable = self.target,
                    "call dropped before completion"
                );
            }
        }
    }
}

impl Drop for Invocation {
    fn drop(&mut self) {
        if !self.finished {
            self.finalize(Outcome::Cancelled);
        }
    }
}

/// Build the info record for a finished sample, or `None` when the policy
/// suppresses every segment.
pub(crate) fn measurement_record(
    config: &MeasurementConfig,
    sample: &MeasurementSample,
    units: Units,
) -> Option<String> {
    let mut segments = Vec::with_capacity(2);

    if let Some(delta) = sample.memory_delta() {
        let usage = crate::units::convert_memory(delta as f64, units.memory_unit);
        if config.should_log_memory(usage) {
            segments.push(format!(
                "Memory usage: {} {}",
                format_memory(usage, units.memory_unit),
                units.memory_unit
            ));
        }
    }

    if let Some(seconds) = sample.elapsed_seconds() {
        let elapsed = crate::units::convert_time(seconds, units.time_unit);
        if config.should_log_elapsed(elapsed) {
            segments.push(format!("Elapsed time: {:.3} {}", elapsed, units.time_unit));
        }
    }

    if segments.is_empty() {
        return None;
    }
    Some(format!("{}{}", config.prefix(), segments.join(", ")))
}

fn format_memory(value: f64, unit: MemoryUnit) -> String {
    match unit {
        MemoryUnit::Bytes => format!("{:.0}", value),
        MemoryUnit::Kilobytes | MemoryUnit::Megabytes => format!("{:.3}", value),
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with a non-string payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::TimeUnit;
    use std::time::Duration;

    fn sample(elapsed: Option<Duration>, memory: Option<(u64, u64)>) -> MeasurementSample {
        let start = Instant::now();
        MeasurementSample {
            start_time: elapsed.map(|_| start),
            end_time: elapsed.map(|d| start + d),
            start_memory: memory.map(|(s, _)| s),
            end_memory: memory.map(|(_, e)| e),
        }
    }

    #[test]
    fn test_sample_deltas() {
        let s = sample(Some(Duration::from_millis(250)), Some((4096, 1024)));
        assert!((s.elapsed_seconds().unwrap() - 0.25).abs() < 1e-9);
        assert_eq!(s.memory_delta(), Some(-3072));

        let empty = MeasurementSample::default();
        assert_eq!(empty.elapsed_seconds(), None);
        assert_eq!(empty.memory_delta(), None);
    }

    #[test]
    fn test_record_elapsed_only() {
        let config = MeasurementConfig::measure();
        let s = sample(Some(Duration::from_millis(100)), None);
        let record = measurement_record(&config, &s, Units::default()).unwrap();
        assert_eq!(record, "Elapsed time: 100.000 ms");
    }

    #[test]
    fn test_record_combines_memory_first_with_single_prefix() {
        let config = MeasurementConfig::measure()
            .with_name("Loader")
            .with_memory(true);
        let s = sample(Some(Duration::from_secs(2)), Some((1000, 3048)));
        let units = Units {
            time_unit: TimeUnit::Seconds,
            memory_unit: MemoryUnit::Kilobytes,
        };
        let record = measurement_record(&config, &s, units).unwrap();
        assert_eq!(record, "Loader - Memory usage: 2.000 KB, Elapsed time: 2.000 s");
    }

    #[test]
    fn test_record_bytes_are_whole_numbers() {
        let config = MeasurementConfig::measure().with_elapsed(false).with_memory(true);
        let s = sample(None, Some((100, 2148)));
        let record = measurement_record(&config, &s, Units::default()).unwrap();
        assert_eq!(record, "Memory usage: 2048 bytes");
    }

    #[test]
    fn test_record_drops_segments_under_threshold() {
        let config = MeasurementConfig::measure()
            .with_memory(true)
            .with_memory_threshold(10_000.0);
        let s = sample(Some(Duration::from_millis(5)), Some((0, 2048)));
        let record = measurement_record(&config, &s, Units::default()).unwrap();
        assert_eq!(record, "Elapsed time: 5.000 ms");

        let config = config.with_elapsed_threshold(50.0);
        assert_eq!(measurement_record(&config, &s, Units::default()), None);
    }

    #[test]
    fn test_panic_message_variants() {
        let boxed: Box<dyn Any + Send> = Box::new("static text");
        assert_eq!(panic_message(boxed.as_ref()), "static text");

        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned text"));
        assert_eq!(panic_message(boxed.as_ref()), "owned text");

        let boxed: Box<dyn Any + Send> = Box::new(42_u32);
        assert_eq!(panic_message(boxed.as_ref()), "panic with a non-string payload");
    }
}
