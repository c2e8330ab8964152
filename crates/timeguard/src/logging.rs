//! Console logging setup for applications that have none of their own.

use tracing::Subscriber;
use tracing_subscriber::{
    fmt::{self, MakeWriter},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Directive used when `RUST_LOG` is unset.
pub const DEFAULT_DIRECTIVE: &str = "timeguard=debug";

/// Console formatting layer. Event targets stay visible so records from
/// `timeguard::probe` and `timeguard::engine` can be told apart.
pub(crate) fn console_layer<S, W>(make_writer: W) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    fmt::layer().with_writer(make_writer).with_target(true)
}

/// Install a global `fmt` subscriber filtered by `RUST_LOG`.
///
/// Falls back to [`DEFAULT_DIRECTIVE`]. Returns `false` if a global
/// subscriber was already installed, in which case nothing changes.
pub fn try_init() -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));

    tracing_subscriber::registry()
        .with(console_layer(std::io::stdout))
        .with(filter)
        .try_init()
        .is_ok()
}

/// Same as [`try_init`], ignoring whether a subscriber already existed.
pub fn init() {
    let _ = try_init();
}
