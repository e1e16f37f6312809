use std::env;

use crate::logging::{parse_filter, LogFilter, LogFormat};

/// Default limit on nested user-function calls
pub const DEFAULT_MAX_CALL_DEPTH: usize = 10_000;

/// Env var overriding [`InterpreterConfig::max_call_depth`]
pub const MAX_DEPTH_ENV: &str = "EXPLANG_MAX_DEPTH";

/// Env var holding a log filter spec such as `info,interpreter=trace`
pub const LOG_ENV: &str = "EXPLANG_LOG";

/// Env var selecting the log format: text, compact or json
pub const LOG_FORMAT_ENV: &str = "EXPLANG_LOG_FORMAT";

/// Trace mode for debugging, shows step-by-step execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TraceMode {
    #[default]
    Off,
    /// Statements, calls and returns
    Statements,
    /// Everything, including scope pushes and pops
    Verbose,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterpreterConfig {
    pub max_call_depth: usize,
    pub log_filter: LogFilter,
    pub log_format: LogFormat,
    pub trace: TraceMode,
}

impl InterpreterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `EXPLANG_MAX_DEPTH`, `EXPLANG_LOG` and `EXPLANG_LOG_FORMAT`.
    /// Malformed values are reported on stderr and ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(depth) = lookup(MAX_DEPTH_ENV) {
            match depth.trim().parse::<usize>() {
                Ok(n) if n > 0 => config.max_call_depth = n,
                _ => eprintln!("Warning: Invalid {} value '{}'", MAX_DEPTH_ENV, depth),
            }
        }

        if let Some(spec) = lookup(LOG_ENV) {
            match parse_filter(&spec) {
                Ok(filter) => config.log_filter = filter,
                Err(_) => eprintln!("Warning: Invalid {} filter '{}'", LOG_ENV, spec),
            }
        }

        if let Some(format) = lookup(LOG_FORMAT_ENV) {
            match format.parse() {
                Ok(format) => config.log_format = format,
                Err(msg) => eprintln!("Warning: {}", msg),
            }
        }

        config
    }

    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    pub fn with_log_filter(mut self, filter: LogFilter) -> Self {
        self.log_filter = filter;
        self
    }

    pub fn with_log_format(mut self, format: LogFormat) -> Self {
        self.log_format = format;
        self
    }

    pub fn with_trace(mut self, trace: TraceMode) -> Self {
        self.trace = trace;
        self
    }
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        InterpreterConfig {
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            log_filter: LogFilter::default(),
            log_format: LogFormat::Text,
            trace: TraceMode::Off,
        }
    }
}
