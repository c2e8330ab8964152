//! Call Measurement
//!
//! This crate wraps callables so each call reports how long it took and,
//! optionally, how much resident memory the process gained or lost:
//! - Transparent wrappers for plain and future-returning callables
//! - Units chosen at runtime (`ms`/`s`, `bytes`/`KB`/`MB`)
//! - Threshold-gated records under two policies, measure and monitor
//! - Failures (`Err` results and panics) reported and passed through untouched
//!
//! # Feature Flags
//!
//! - `process-memory` (default): read resident memory through `sysinfo`
//!
//! # Example
//!
//! ```rust
//! use timeguard::{MeasurementConfig, MemoryUnit};
//!
//! timeguard::set_memory_unit(MemoryUnit::Kilobytes);
//!
//! // Bare form: default config, records every call's elapsed time
//! let checksum = timeguard::measure(|data: &[u8]| data.iter().map(|b| *b as u32).sum::<u32>());
//! assert_eq!(checksum.call((&[1, 2, 3][..],)), 6);
//!
//! // Parameterized form: only report calls slower than 200 ms
//! let slow_only = timeguard::decorate(
//!     MeasurementConfig::monitor()
//!         .with_name("render")
//!         .with_elapsed_threshold(200.0),
//! );
//! let render = slow_only.wrap(|| "frame");
//! assert_eq!(render.call(()), "frame");
//! ```

mod config;
mod engine;
mod error;
mod invocation;
pub mod logging;
mod probe;
mod sink;
mod units;

pub use config::{LogPolicy, MeasurementConfig};
pub use engine::{
    decorate, global, measure, measure_async, monitor, Blocking, CallKind, Decorator, Guardian,
    Invoke, Kind, Measured, Suspending,
};
pub use error::{GuardError, GuardResult};
pub use invocation::MeasurementSample;
pub use probe::{MemoryProbe, ProcessMemoryProbe};
pub use sink::{LogRecord, LogSink, MemorySink, RecordLevel, TracingSink};
pub use units::{
    convert_memory, convert_time, global_units, MemoryUnit, TimeUnit, UnitSettings, Units,
};

/// Set the time unit on the process-wide settings.
pub fn set_time_unit(unit: TimeUnit) {
    global_units().set_time_unit(unit);
}

/// Set the memory unit on the process-wide settings.
pub fn set_memory_unit(unit: MemoryUnit) {
    global_units().set_memory_unit(unit);
}

/// Parse and set the process-wide time unit (`"ms"` or `"s"`).
pub fn set_time_unit_str(unit: &str) -> GuardResult<()> {
    set_time_unit(unit.parse()?);
    Ok(())
}

/// Parse and set the process-wide memory unit (`"bytes"`, `"KB"` or `"MB"`).
pub fn set_memory_unit_str(unit: &str) -> GuardResult<()> {
    set_memory_unit(unit.parse()?);
    Ok(())
}
