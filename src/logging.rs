//! Logging utilities - structured tracing for weak reference bookkeeping
//!
//! Design: Uses `tracing` for structured logging with fixed targets so
//! hosts can filter liveness, weak-reference and heap events separately.
//! Zero cost when no subscriber is installed.

use once_cell::sync::OnceCell;
use std::io;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::finalize::{Affiliation, HandleId, InstanceId};

// Re-export tracing macros for use throughout the crate
pub use tracing::{debug, error, info, trace, warn, Level};

static LOGGER_INITIALIZED: OnceCell<()> = OnceCell::new();

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Default log level
    pub level: Level,
    /// Enable JSON format (vs human-readable)
    pub json_format: bool,
    /// Show span events (enter/exit)
    pub show_spans: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json_format: false,
            show_spans: false,
        }
    }
}

impl LogConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // GCREF_LOG_LEVEL: trace, debug, info, warn, error
        if let Ok(level_str) = std::env::var("GCREF_LOG_LEVEL") {
            config.level = parse_level(&level_str);
        }

        config.json_format = std::env::var("GCREF_LOG_JSON").is_ok();
        config.show_spans = std::env::var("GCREF_LOG_SPANS").is_ok();

        config
    }

    /// Errors only
    pub fn quiet() -> Self {
        Self {
            level: Level::ERROR,
            json_format: false,
            show_spans: false,
        }
    }

    /// Everything, including span enter/exit
    pub fn verbose() -> Self {
        Self {
            level: Level::TRACE,
            json_format: false,
            show_spans: true,
        }
    }
}

fn parse_level(s: &str) -> Level {
    match s.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Filter directive covering every target this crate logs under
fn default_directive(level: Level) -> String {
    format!("gcref={}", level.as_str().to_lowercase())
}

/// Initialize logging with configuration taken from the environment
pub fn init() {
    init_with_config(LogConfig::from_env());
}

/// Initialize logging with custom configuration
pub fn init_with_config(config: LogConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directive(config.level)));

        let span_events = if config.show_spans {
            FmtSpan::ENTER | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };

        let layer = if config.json_format {
            fmt::layer()
                .json()
                .with_writer(io::stdout)
                .with_span_events(span_events)
                .with_target(true)
                .boxed()
        } else {
            fmt::layer()
                .compact()
                .with_writer(io::stdout)
                .with_span_events(span_events)
                .with_target(true)
                .boxed()
        };

        // Another subscriber may already be installed by the host
        tracing_subscriber::registry()
            .with(env_filter)
            .with(layer)
            .try_init()
            .ok();
    });
}

/// Check if logging is initialized
pub fn is_initialized() -> bool {
    LOGGER_INITIALIZED.get().is_some()
}

/// Log an interpreter instance becoming alive
#[inline]
pub fn log_runtime_init(instance: InstanceId) {
    info!(target: "gcref::liveness", instance = instance.raw(), "runtime initialized");
}

/// Log an interpreter instance being torn down
#[inline]
pub fn log_runtime_teardown(instance: InstanceId) {
    info!(target: "gcref::liveness", instance = instance.raw(), "runtime torn down");
}

/// Log a successful bind
#[inline]
pub fn log_bind(handle: HandleId, affiliation: Affiliation) {
    debug!(
        target: "gcref::weak",
        handle = handle.raw(),
        affiliation = ?affiliation,
        "weak reference bound"
    );
}

/// Log a bind the collector refused
#[inline]
pub fn log_bind_rejected(handle: HandleId, type_name: &str) {
    debug!(
        target: "gcref::weak",
        handle = handle.raw(),
        type_name,
        "target is not finalizable"
    );
}

/// Log a finalizer clearing a slot
#[inline]
pub fn log_finalized(handle: HandleId) {
    trace!(target: "gcref::weak", handle = handle.raw(), "slot cleared by finalizer");
}

/// Log the read-side backstop clearing a slot
#[inline]
pub fn log_stale_read(handle: HandleId) {
    debug!(
        target: "gcref::weak",
        handle = handle.raw(),
        "target dead before finalizer delivery, slot cleared on read"
    );
}

/// Log a binding replaced by rebind or release
#[inline]
pub fn log_superseded(handle: HandleId) {
    trace!(target: "gcref::weak", handle = handle.raw(), "previous binding disarmed");
}

/// Log a collection cycle of the reference heap
#[inline]
pub fn log_collect_complete(duration_us: u64, collected: usize, live: usize) {
    debug!(
        target: "gcref::heap",
        duration_us,
        collected,
        live,
        "collection complete"
    );
}
