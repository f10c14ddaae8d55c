pub mod hal;
pub mod loom;
pub mod runtime;
pub mod tuning;

pub use loom::{
    array::Array,
    contract::tensordot,
    network::{ContractionPath, Network},
    tensor::{Tensor, TensorError, transpose},
};
pub use runtime::{Local, LocalBuilder, Runtime, Scheduler, SchedulerError};
pub use tuning::{Autotuner, ClusterProfile, Reservation};

/// Installs a `tracing` subscriber printing spans of the instrumented entry points.
///
/// The filter follows `RUST_LOG`, falling back to `filter`.
#[cfg(feature = "trace")]
pub fn init_trace(filter: &str) {
    use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    let result = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .try_init();
    if let Err(err) = result {
        log::warn!("tracing subscriber already installed: {err}");
    }
}
