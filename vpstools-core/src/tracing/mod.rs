//! Structured logging setup
//!
//! Builds a `tracing-subscriber` registry with an `EnvFilter` and a single
//! `fmt` layer. Fleet, compiler and persistence operations open spans
//! named after [`span_names`].

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Global flag indicating whether tracing has been initialized
static TRACING_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Configuration passed to the first successful [`init_tracing`] call
static TRACING_CONFIG: OnceLock<TracingConfig> = OnceLock::new();

/// Crates whose events pass the default filter
const OWN_TARGETS: [&str; 2] = ["vpstools_core", "vpstools"];

/// Errors that can occur during tracing initialization
#[derive(Debug, Error)]
pub enum TracingError {
    /// Failed to initialize tracing subscriber
    #[error("Failed to initialize tracing: {0}")]
    InitializationFailed(String),

    /// The filter directive string is invalid
    #[error("Invalid filter '{filter}': {reason}")]
    InvalidFilter {
        /// Directive string as given
        filter: String,
        /// Parser message
        reason: String,
    },

    /// Tracing already initialized
    #[error("Tracing has already been initialized")]
    AlreadyInitialized,

    /// Failed to open the log file
    #[error("Failed to open log file {path}: {reason}")]
    FileCreationFailed {
        /// Log file path
        path: PathBuf,
        /// OS error text
        reason: String,
    },
}

/// Result type for tracing operations
pub type TracingResult<T> = Result<T, TracingError>;

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum TracingLevel {
    /// Only errors
    Error,
    /// Errors and warnings
    Warn,
    /// Errors, warnings and info (default)
    #[default]
    Info,
    /// All above plus debug messages
    Debug,
    /// Everything
    Trace,
}

impl TracingLevel {
    /// Lowercase directive name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }

    /// Level for a `-v`/`-q` command-line count.
    ///
    /// `quiet` wins; each `-v` moves one step from `base` towards trace.
    #[must_use]
    pub fn from_verbosity(base: Self, verbose: u8, quiet: bool) -> Self {
        const LEVELS: [TracingLevel; 5] = [
            TracingLevel::Error,
            TracingLevel::Warn,
            TracingLevel::Info,
            TracingLevel::Debug,
            TracingLevel::Trace,
        ];
        if quiet {
            return Self::Error;
        }
        let idx = (base as usize + usize::from(verbose)).min(LEVELS.len() - 1);
        LEVELS[idx]
    }
}

impl std::str::FromStr for TracingLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for TracingLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output destination for log lines
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TracingOutput {
    /// Standard output
    Stdout,
    /// Standard error
    #[default]
    Stderr,
    /// Append to a file
    File {
        /// Path to the log file
        path: PathBuf,
    },
}

/// Configuration for tracing initialization
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Log level for this workspace's crates
    pub level: TracingLevel,
    /// Output destination
    pub output: TracingOutput,
    /// Adds thread ids and span close timings
    pub profiling_enabled: bool,
    /// Custom filter string (overrides level if set)
    pub filter: Option<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: TracingLevel::Warn,
            output: TracingOutput::Stderr,
            profiling_enabled: false,
            filter: None,
        }
    }
}

impl TracingConfig {
    /// Creates a new tracing configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the log level
    #[must_use]
    pub const fn with_level(mut self, level: TracingLevel) -> Self {
        self.level = level;
        self
    }

    /// Sets the output destination
    #[must_use]
    pub fn with_output(mut self, output: TracingOutput) -> Self {
        self.output = output;
        self
    }

    /// Enables or disables profiling
    #[must_use]
    pub const fn with_profiling(mut self, enabled: bool) -> Self {
        self.profiling_enabled = enabled;
        self
    }

    /// Sets a custom filter string
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Debug level on stdout with profiling
    #[must_use]
    pub const fn development() -> Self {
        Self {
            level: TracingLevel::Debug,
            output: TracingOutput::Stdout,
            profiling_enabled: true,
            filter: None,
        }
    }

    /// Info level on stderr
    #[must_use]
    pub const fn production() -> Self {
        Self {
            level: TracingLevel::Info,
            output: TracingOutput::Stderr,
            profiling_enabled: false,
            filter: None,
        }
    }

    /// Filter directives derived from this configuration
    #[must_use]
    pub fn directives(&self) -> String {
        self.filter.clone().unwrap_or_else(|| {
            OWN_TARGETS
                .iter()
                .map(|target| format!("{target}={}", self.level))
                .collect::<Vec<_>>()
                .join(",")
        })
    }
}

/// Initializes the tracing subscriber with the given configuration
///
/// Call once at startup. `RUST_LOG`, when set, takes precedence over the
/// configured level but not over an explicit filter.
///
/// # Errors
///
/// Returns an error if:
/// - Tracing has already been initialized
/// - The filter is invalid
/// - File output is configured but the file cannot be opened
pub fn init_tracing(config: &TracingConfig) -> TracingResult<()> {
    if TRACING_INITIALIZED.load(Ordering::SeqCst) {
        return Err(TracingError::AlreadyInitialized);
    }

    let directives = match (&config.filter, std::env::var("RUST_LOG")) {
        (None, Ok(env)) if !env.trim().is_empty() => env,
        _ => config.directives(),
    };
    let filter = EnvFilter::try_new(&directives).map_err(|e| TracingError::InvalidFilter {
        filter: directives.clone(),
        reason: e.to_string(),
    })?;

    let span_events = if config.profiling_enabled {
        tracing_subscriber::fmt::format::FmtSpan::CLOSE
    } else {
        tracing_subscriber::fmt::format::FmtSpan::NONE
    };

    match &config.output {
        TracingOutput::Stdout => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(config.profiling_enabled)
                    .with_span_events(span_events)
                    .with_writer(std::io::stdout),
            )
            .try_init(),
        TracingOutput::Stderr => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(config.profiling_enabled)
                    .with_span_events(span_events)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        TracingOutput::File { path } => {
            let file = open_log_file(path)?;
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_target(true)
                        .with_thread_ids(config.profiling_enabled)
                        .with_span_events(span_events)
                        .with_ansi(false)
                        .with_writer(std::sync::Mutex::new(file)),
                )
                .try_init()
        }
    }
    .map_err(|e| TracingError::InitializationFailed(e.to_string()))?;

    // Recorded only once the subscriber is installed
    TRACING_INITIALIZED.store(true, Ordering::SeqCst);
    if TRACING_CONFIG.set(config.clone()).is_err() {
        tracing::warn!("Tracing configuration was already recorded");
    }

    tracing::debug!(
        level = %config.level,
        profiling = config.profiling_enabled,
        "Tracing initialized"
    );

    Ok(())
}

fn open_log_file(path: &Path) -> TracingResult<std::fs::File> {
    let fail = |e: std::io::Error| TracingError::FileCreationFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(fail)?;
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(fail)
}

/// Checks if tracing has been initialized
#[must_use]
pub fn is_tracing_initialized() -> bool {
    TRACING_INITIALIZED.load(Ordering::SeqCst)
}

/// Gets the configuration of the active subscriber, if any
#[must_use]
pub fn get_tracing_config() -> Option<&'static TracingConfig> {
    TRACING_CONFIG.get()
}

/// Creates an info-level span with standard field names
///
/// ```ignore
/// use vpstools_core::trace_operation;
/// use vpstools_core::tracing::span_names;
///
/// let _span = trace_operation!(span_names::FLEET_PROBE, vps_id = %instance.id);
/// ```
#[macro_export]
macro_rules! trace_operation {
    ($name:expr) => {
        tracing::info_span!($name)
    };
    ($name:expr, $($field:tt)*) => {
        tracing::info_span!($name, $($field)*)
    };
}

/// Creates a debug-level span for less important operations
#[macro_export]
macro_rules! trace_operation_debug {
    ($name:expr) => {
        tracing::debug_span!($name)
    };
    ($name:expr, $($field:tt)*) => {
        tracing::debug_span!($name, $($field)*)
    };
}

/// Standard span names
pub mod span_names {
    /// Admission of a new instance
    pub const FLEET_ADD: &str = "fleet.add";
    /// Single-instance probe
    pub const FLEET_PROBE: &str = "fleet.probe";
    /// Fleet-wide probe
    pub const FLEET_PROBE_ALL: &str = "fleet.probe_all";
    /// Telemetry refresh
    pub const FLEET_TELEMETRY: &str = "fleet.telemetry";
    /// Configuration rendering
    pub const COMPILER_RENDER: &str = "compiler.render";
    /// Configuration export
    pub const COMPILER_EXPORT: &str = "compiler.export";
    /// Fleet document load
    pub const STORE_LOAD: &str = "store.load";
    /// Fleet document save
    pub const STORE_SAVE: &str = "store.save";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracing_level_from_str() {
        assert_eq!("error".parse::<TracingLevel>(), Ok(TracingLevel::Error));
        assert_eq!("WARNING".parse::<TracingLevel>(), Ok(TracingLevel::Warn));
        assert_eq!("Info".parse::<TracingLevel>(), Ok(TracingLevel::Info));
        assert_eq!("trace".parse::<TracingLevel>(), Ok(TracingLevel::Trace));
        assert!("loud".parse::<TracingLevel>().is_err());
    }

    #[test]
    fn test_level_display_matches_directive() {
        for level in [
            TracingLevel::Error,
            TracingLevel::Warn,
            TracingLevel::Info,
            TracingLevel::Debug,
            TracingLevel::Trace,
        ] {
            assert_eq!(level.to_string().parse::<TracingLevel>(), Ok(level));
        }
    }

    #[test]
    fn test_verbosity_steps() {
        let base = TracingLevel::Warn;
        assert_eq!(TracingLevel::from_verbosity(base, 0, false), TracingLevel::Warn);
        assert_eq!(TracingLevel::from_verbosity(base, 1, false), TracingLevel::Info);
        assert_eq!(TracingLevel::from_verbosity(base, 2, false), TracingLevel::Debug);
        assert_eq!(TracingLevel::from_verbosity(base, 3, false), TracingLevel::Trace);
        assert_eq!(TracingLevel::from_verbosity(base, 9, false), TracingLevel::Trace);
        assert_eq!(TracingLevel::from_verbosity(base, 3, true), TracingLevel::Error);
    }

    #[test]
    fn test_default_directives() {
        let config = TracingConfig::new().with_level(TracingLevel::Debug);
        assert_eq!(config.directives(), "vpstools_core=debug,vpstools=debug");
        let custom = config.with_filter("vpstools_core=trace,tokio=warn");
        assert_eq!(custom.directives(), "vpstools_core=trace,tokio=warn");
    }

    #[test]
    fn test_presets() {
        let dev = TracingConfig::development();
        assert_eq!(dev.level, TracingLevel::Debug);
        assert_eq!(dev.output, TracingOutput::Stdout);
        assert!(dev.profiling_enabled);

        let prod = TracingConfig::production();
        assert_eq!(prod.level, TracingLevel::Info);
        assert_eq!(prod.output, TracingOutput::Stderr);
        assert!(!prod.profiling_enabled);
    }

    #[test]
    fn test_init_once() {
        // Rejected configurations leave tracing uninitialized so a retry can succeed
        let invalid = TracingConfig::new().with_filter("vpstools_core=loud");
        assert!(matches!(
            init_tracing(&invalid),
            Err(TracingError::InvalidFilter { .. })
        ));
        assert!(!is_tracing_initialized());
        assert!(get_tracing_config().is_none());

        let config = TracingConfig::new()
            .with_output(TracingOutput::Stderr)
            .with_profiling(true)
            .with_filter("vpstools_core=warn");

        init_tracing(&config).unwrap();
        assert!(is_tracing_initialized());
        assert_eq!(
            get_tracing_config().map(|c| c.directives()),
            Some("vpstools_core=warn".to_string())
        );
        assert!(matches!(
            init_tracing(&config),
            Err(TracingError::AlreadyInitialized)
        ));
    }
}
