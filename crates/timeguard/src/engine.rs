//! Measurement wrapper engine
//!
//! A [`Guardian`] owns the collaborators every measurement needs (unit
//! settings, log sink, memory probe) and turns callables into [`Measured`]
//! wrappers. Whether a wrapper is blocking or suspending is fixed when it is
//! created, by the marker type it carries.

use crate::config::MeasurementConfig;
use crate::invocation::{panic_message, Invocation, Outcome};
use crate::probe::{MemoryProbe, ProcessMemoryProbe};
use crate::sink::{LogSink, TracingSink};
use crate::units::{global_units, UnitSettings};
use futures_util::FutureExt;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};

/// Calling convention of a wrapped callable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    /// Runs to completion on the caller's thread
    Blocking,
    /// Returns a future; measurement spans its execution
    Suspending,
}

/// Marker for wrappers around plain callables.
#[derive(Debug, Clone, Copy)]
pub struct Blocking;

/// Marker for wrappers around callables returning a future.
#[derive(Debug, Clone, Copy)]
pub struct Suspending;

/// Links a marker type to its [`CallKind`].
pub trait Kind {
    const KIND: CallKind;
}

impl Kind for Blocking {
    const KIND: CallKind = CallKind::Blocking;
}

impl Kind for Suspending {
    const KIND: CallKind = CallKind::Suspending;
}

/// Uniform tuple-argument invocation for `Fn` of any supported arity.
///
/// ```rust
/// use timeguard::Invoke;
///
/// let add = |a: i32, b: i32| a + b;
/// assert_eq!(add.invoke((2, 3)), 5);
/// ```
pub trait Invoke<Args> {
    type Output;

    fn invoke(&self, args: Args) -> Self::Output;
}

macro_rules! impl_invoke {
    ($($arg:ident),*) => {
        impl<Func, Out, $($arg,)*> Invoke<($($arg,)*)> for Func
        where
            Func: Fn($($arg),*) -> Out,
        {
            type Output = Out;

            #[inline]
            #[allow(non_snake_case)]
            fn invoke(&self, ($($arg,)*): ($($arg,)*)) -> Out {
                (self)($($arg),*)
            }
        }
    };
}

impl_invoke!();
impl_invoke!(A1);
impl_invoke!(A1, A2);
impl_invoke!(A1, A2, A3);
impl_invoke!(A1, A2, A3, A4);
impl_invoke!(A1, A2, A3, A4, A5);
impl_invoke!(A1, A2, A3, A4, A5, A6);
impl_invoke!(A1, A2, A3, A4, A5, A6, A7);
impl_invoke!(A1, A2, A3, A4, A5, A6, A7, A8);

/// Measurement engine.
///
/// Cloning is cheap; clones share the same settings, sink and probe.
#[derive(Clone)]
pub struct Guardian {
    units: Arc<UnitSettings>,
    sink: Arc<dyn LogSink>,
    probe: Arc<dyn MemoryProbe>,
}

impl Guardian {
    /// Create an engine reading the given unit settings, logging through
    /// `tracing` and probing the current process.
    pub fn new(units: Arc<UnitSettings>) -> Self {
        Self {
            units,
            sink: Arc::new(TracingSink),
            probe: Arc::new(ProcessMemoryProbe::new()),
        }
    }

    /// Builder method to replace the unit settings.
    pub fn with_units(mut self, units: Arc<UnitSettings>) -> Self {
        self.units = units;
        self
    }

    /// Builder method to replace the log sink.
    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Builder method to replace the memory probe.
    pub fn with_probe(mut self, probe: Arc<dyn MemoryProbe>) -> Self {
        self.probe = probe;
        self
    }

    /// Unit settings read at the end of each measurement.
    pub fn units(&self) -> &Arc<UnitSettings> {
        &self.units
    }

    pub(crate) fn sink(&self) -> &dyn LogSink {
        self.sink.as_ref()
    }

    /// Read resident memory, reporting probe failures without failing the call.
    pub(crate) fn read_memory(&self) -> Option<u64> {
        match self.probe.resident_bytes() {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::warn!(
                    target: "timeguard::probe",
                    error = %e,
                    "memory snapshot skipped"
                );
                None
            }
        }
    }

    /// Bind a configuration, producing a reusable [`Decorator`].
    pub fn with_config(&self, config: MeasurementConfig) -> Decorator {
        Decorator {
            guardian: self.clone(),
            config: Arc::new(config),
        }
    }

    /// Wrap a plain callable with the default configuration.
    pub fn wrap<F>(&self, target: F) -> Measured<F, Blocking> {
        self.with_config(MeasurementConfig::default()).wrap(target)
    }

    /// Wrap a future-returning callable with the default configuration.
    pub fn wrap_async<F>(&self, target: F) -> Measured<F, Suspending> {
        self.with_config(MeasurementConfig::default()).wrap_async(target)
    }
}

impl Default for Guardian {
    /// Engine over the process-wide unit settings.
    fn default() -> Self {
        Self::new(Arc::clone(global_units()))
    }
}

impl fmt::Debug for Guardian {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Guardian")
            .field("units", &self.units.snapshot())
            .finish_non_exhaustive()
    }
}

/// An engine paired with one configuration, ready to wrap callables.
#[derive(Debug, Clone)]
pub struct Decorator {
    guardian: Guardian,
    config: Arc<MeasurementConfig>,
}

impl Decorator {
    /// Configuration every wrapper from this decorator is bound to.
    pub fn config(&self) -> &MeasurementConfig {
        &self.config
    }

    /// Wrap a plain callable.
    pub fn wrap<F>(&self, target: F) -> Measured<F, Blocking> {
        Measured::new(target, self.guardian.clone(), Arc::clone(&self.config))
    }

    /// Wrap a callable that returns a future.
    pub fn wrap_async<F>(&self, target: F) -> Measured<F, Suspending> {
        Measured::new(target, self.guardian.clone(), Arc::clone(&self.config))
    }
}

/// A callable wrapped with measurement.
///
/// Arguments are passed as a tuple: `measured.call(())`,
/// `measured.call((a,))`, `measured.call((a, b))`.
pub struct Measured<F, K> {
    target: Arc<F>,
    target_name: &'static str,
    guardian: Guardian,
    config: Arc<MeasurementConfig>,
    _kind: PhantomData<K>,
}

impl<F, K: Kind> Measured<F, K> {
    fn new(target: F, guardian: Guardian, config: Arc<MeasurementConfig>) -> Self {
        let target_name = std::any::type_name::<F>();
        tracing::debug!(
            target: "timeguard::engine",
            callable = target_name,
            kind = ?K::KIND,
            "callable wrapped"
        );
        Self {
            target: Arc::new(target),
            target_name,
            guardian,
            config,
            _kind: PhantomData,
        }
    }

    /// Calling convention chosen at wrap time.
    pub fn kind(&self) -> CallKind {
        K::KIND
    }

    /// Declared type name of the wrapped callable.
    pub fn target_name(&self) -> &'static str {
        self.target_name
    }

    /// Configuration bound at wrap time.
    pub fn config(&self) -> &MeasurementConfig {
        &self.config
    }

    fn begin(&self) -> Invocation {
        Invocation::start(
            self.guardian.clone(),
            Arc::clone(&self.config),
            self.target_name,
        )
    }
}

impl<F, K> Clone for Measured<F, K> {
    fn clone(&self) -> Self {
        Self {
            target: Arc::clone(&self.target),
            target_name: self.target_name,
            guardian: self.guardian.clone(),
            config: Arc::clone(&self.config),
            _kind: PhantomData,
        }
    }
}

impl<F, K: Kind> fmt::Debug for Measured<F, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Measured")
            .field("target", &self.target_name)
            .field("kind", &K::KIND)
            .field("config", &self.config)
            .finish()
    }
}

impl<F> Measured<F, Blocking> {
    /// Call the target, returning exactly what it returns.
    ///
    /// A panic in the target is logged and then resumed with its payload.
    pub fn call<Args>(&self, args: Args) -> <F as Invoke<Args>>::Output
    where
        F: Invoke<Args>,
    {
        let run = self.begin();
        let target = self.target.as_ref();
        let result =
            panic::catch_unwind(AssertUnwindSafe(|| <F as Invoke<Args>>::invoke(target, args)));
        settle(run, result, |_| None)
    }

    /// Call a fallible target; an `Err` is logged and returned unchanged.
    pub fn try_call<Args, T, E>(&self, args: Args) -> Result<T, E>
    where
        F: Invoke<Args, Output = Result<T, E>>,
        E: fmt::Display,
    {
        let run = self.begin();
        let target = self.target.as_ref();
        let result =
            panic::catch_unwind(AssertUnwindSafe(|| <F as Invoke<Args>>::invoke(target, args)));
        settle(run, result, failure_text)
    }
}

impl<F> Measured<F, Suspending> {
    /// Call the target and await its future.
    ///
    /// The start snapshot is taken on first poll, before the target runs,
    /// so any synchronous work the target does before handing back its
    /// future is measured too. Dropping the returned future early still
    /// records the partial measurement.
    pub fn call<Args>(
        &self,
        args: Args,
    ) -> impl Future<Output = <<F as Invoke<Args>>::Output as Future>::Output>
    where
        F: Invoke<Args>,
        <F as Invoke<Args>>::Output: Future,
    {
        let target = Arc::clone(&self.target);
        let guardian = self.guardian.clone();
        let config = Arc::clone(&self.config);
        let target_name = self.target_name;

        async move {
            let run = Invocation::start(guardian, config, target_name);
            let result = AssertUnwindSafe(async move {
                <F as Invoke<Args>>::invoke(&target, args).await
            })
            .catch_unwind()
            .await;
            settle(run, result, |_| None)
        }
    }

    /// Await a fallible target; an `Err` is logged and returned unchanged.
    pub fn try_call<Args, T, E>(&self, args: Args) -> impl Future<Output = Result<T, E>>
    where
        F: Invoke<Args>,
        <F as Invoke<Args>>::Output: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let target = Arc::clone(&self.target);
        let guardian = self.guardian.clone();
        let config = Arc::clone(&self.config);
        let target_name = self.target_name;

        async move {
            let run = Invocation::start(guardian, config, target_name);
            let result = AssertUnwindSafe(async move {
                <F as Invoke<Args>>::invoke(&target, args).await
            })
            .catch_unwind()
            .await;
            settle(run, result, failure_text)
        }
    }
}

fn failure_text<T, E: fmt::Display>(output: &Result<T, E>) -> Option<String> {
    output.as_ref().err().map(|e| e.to_string())
}

/// Finalize a run and hand the target's result back untouched.
fn settle<R>(
    run: Invocation,
    result: std::thread::Result<R>,
    failure: impl FnOnce(&R) -> Option<String>,
) -> R {
    match result {
        Ok(output) => {
            let outcome = match failure(&output) {
                Some(reason) => Outcome::Failure(reason),
                None => Outcome::Success,
            };
            run.finish(outcome);
            output
        }
        Err(payload) => {
            run.finish(Outcome::Failure(panic_message(payload.as_ref())));
            panic::resume_unwind(payload)
        }
    }
}

/// Process-wide default engine
static GLOBAL_GUARDIAN: OnceLock<Guardian> = OnceLock::new();

/// Get the process-wide engine.
///
/// It reads [`global_units`], logs through `tracing` and probes the current
/// process.
pub fn global() -> &'static Guardian {
    GLOBAL_GUARDIAN.get_or_init(Guardian::default)
}

/// Wrap a plain callable on the process-wide engine with default settings.
///
/// ```rust
/// let double = timeguard::measure(|x: u32| x * 2);
/// assert_eq!(double.call((21,)), 42);
/// ```
pub fn measure<F>(target: F) -> Measured<F, Blocking> {
    global().wrap(target)
}

/// Wrap a future-returning callable on the process-wide engine.
pub fn measure_async<F>(target: F) -> Measured<F, Suspending> {
    global().wrap_async(target)
}

/// Bind `config` on the process-wide engine.
///
/// ```rust
/// use timeguard::MeasurementConfig;
///
/// let decorator = timeguard::decorate(MeasurementConfig::measure().with_name("parse"));
/// let parse = decorator.wrap(|s: &str| s.len());
/// assert_eq!(parse.call(("hello",)), 5);
/// ```
pub fn decorate(config: MeasurementConfig) -> Decorator {
    global().with_config(config)
}

/// Monitor-style decorator on the process-wide engine.
///
/// Only metrics given a threshold are tracked.
pub fn monitor(elapsed_threshold: Option<f64>, memory_threshold: Option<f64>) -> Decorator {
    let config = MeasurementConfig {
        elapsed_threshold,
        memory_threshold,
        ..MeasurementConfig::monitor()
    };
    decorate(config)
}
