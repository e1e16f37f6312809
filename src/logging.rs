use std::fs::OpenOptions;
use std::io::Write;
use std::str::FromStr;

use chrono::Local;
use serde_json::{json, Map, Value as JsonValue};

/// Log levels, quietest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum LogLevel {
    Off = 0,
    Error = 1,
    Warn = 2,
    #[default]
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl LogLevel {
    pub fn parse_level(s: &str) -> Option<LogLevel> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" | "none" => Some(LogLevel::Off),
            "error" => Some(LogLevel::Error),
            "warn" | "warning" => Some(LogLevel::Warn),
            "info" => Some(LogLevel::Info),
            "debug" => Some(LogLevel::Debug),
            "trace" => Some(LogLevel::Trace),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            LogLevel::Off => "OFF",
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Trace => "TRACE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
    Compact,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            other => Err(format!("Invalid log format '{}'", other)),
        }
    }
}

/// A default level plus per-target overrides, e.g. `info,interpreter=trace`
#[derive(Debug, Clone, PartialEq)]
pub struct LogFilter {
    pub default: LogLevel,
    pub rules: Vec<(String, LogLevel)>,
}

impl LogFilter {
    pub fn new(default: LogLevel) -> Self {
        LogFilter {
            default,
            rules: Vec::new(),
        }
    }

    /// Level for `target`; the longest matching rule prefix wins
    pub fn level_for_target(&self, target: &str) -> LogLevel {
        let mut best: Option<(usize, LogLevel)> = None;
        for (rule_target, level) in &self.rules {
            if rule_target.is_empty() {
                continue;
            }
            if target.starts_with(rule_target.as_str()) {
                let len = rule_target.len();
                if best.map(|(best_len, _)| len > best_len).unwrap_or(true) {
                    best = Some((len, *level));
                }
            }
        }
        best.map(|(_, level)| level).unwrap_or(self.default)
    }

    pub fn enabled(&self, level: LogLevel, target: &str) -> bool {
        level != LogLevel::Off && level <= self.level_for_target(target)
    }

    /// Whether anything at all could pass this filter at `level`
    pub fn any_enabled(&self, level: LogLevel) -> bool {
        level <= self.default || self.rules.iter().any(|(_, l)| level <= *l)
    }
}

impl Default for LogFilter {
    fn default() -> Self {
        LogFilter::new(LogLevel::Warn)
    }
}

pub fn parse_filter(spec: &str) -> Result<LogFilter, String> {
    let mut default = None;
    let mut rules = Vec::new();
    for part in spec.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if let Some((target, level_str)) = part.split_once('=') {
            let level = LogLevel::parse_level(level_str.trim())
                .ok_or_else(|| format!("Invalid log level '{}'", level_str.trim()))?;
            rules.push((target.trim().to_string(), level));
        } else {
            let level = LogLevel::parse_level(part)
                .ok_or_else(|| format!("Invalid log level '{}'", part))?;
            default = Some(level);
        }
    }

    Ok(LogFilter {
        default: default.unwrap_or(LogLevel::Warn),
        rules,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub level: LogLevel,
    pub message: String,
    pub target: String,
    pub line: usize,
    pub column: usize,
    pub fields: Vec<(String, String)>,
}

impl LogRecord {
    pub fn new(level: LogLevel, target: &str, message: impl Into<String>) -> Self {
        LogRecord {
            level,
            message: message.into(),
            target: target.to_string(),
            line: 0,
            column: 0,
            fields: Vec::new(),
        }
    }

    pub fn at(mut self, line: usize, column: usize) -> Self {
        self.line = line;
        self.column = column;
        self
    }

    pub fn field(mut self, key: &str, value: impl ToString) -> Self {
        self.fields.push((key.to_string(), value.to_string()));
        self
    }
}

#[derive(Debug)]
pub enum LogSink {
    Stderr,
    Stdout,
    File {
        path: String,
        append: bool,
        file: Option<std::fs::File>,
    },
    Memory {
        entries: Vec<String>,
        max: usize,
    },
}

impl LogSink {
    pub fn memory(max: usize) -> Self {
        LogSink::Memory {
            entries: Vec::new(),
            max,
        }
    }

    pub fn file(path: &str, append: bool) -> Self {
        LogSink::File {
            path: path.to_string(),
            append,
            file: None,
        }
    }
}

#[derive(Debug)]
pub struct LoggerCore {
    pub filter: LogFilter,
    pub format: LogFormat,
    pub timestamps: bool,
    pub sinks: Vec<LogSink>,
}

impl LoggerCore {
    pub fn new() -> Self {
        LoggerCore {
            filter: LogFilter::default(),
            format: LogFormat::Text,
            timestamps: true,
            sinks: vec![LogSink::Stderr],
        }
    }

    pub fn with_filter(filter: LogFilter) -> Self {
        LoggerCore {
            filter,
            ..Self::new()
        }
    }

    pub fn enabled(&self, level: LogLevel, target: &str) -> bool {
        self.filter.enabled(level, target)
    }

    pub fn log(&mut self, record: &LogRecord) {
        if !self.enabled(record.level, &record.target) {
            return;
        }

        let formatted = self.format_record(record);
        for sink in &mut self.sinks {
            match sink {
                LogSink::Stderr => {
                    eprintln!("{}", formatted);
                }
                LogSink::Stdout => {
                    println!("{}", formatted);
                }
                LogSink::File { path, append, file } => {
                    if file.is_none() {
                        let mut opts = OpenOptions::new();
                        opts.create(true).write(true);
                        if *append {
                            opts.append(true);
                        } else {
                            opts.truncate(true);
                        }
                        match opts.open(path.as_str()) {
                            Ok(handle) => {
                                *file = Some(handle);
                            }
                            Err(err) => {
                                eprintln!("Warning: could not open log file '{}': {}", path, err);
                            }
                        }
                    }
                    if let Some(handle) = file {
                        let _ = writeln!(handle, "{}", formatted);
                    }
                }
                LogSink::Memory { entries, max } => {
                    entries.push(formatted.clone());
                    if entries.len() > *max {
                        let drain = entries.len() - *max;
                        entries.drain(0..drain);
                    }
                }
            }
        }
    }

    /// Entries held by the first memory sink
    pub fn memory_entries(&self) -> &[String] {
        self.sinks
            .iter()
            .find_map(|sink| match sink {
                LogSink::Memory { entries, .. } => Some(entries.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }

    fn format_record(&self, record: &LogRecord) -> String {
        match self.format {
            LogFormat::Json => self.format_json(record),
            LogFormat::Compact => self.format_compact(record),
            LogFormat::Text => self.format_text(record),
        }
    }

    fn format_text(&self, record: &LogRecord) -> String {
        let mut parts = Vec::new();
        parts.push(format!("[{:5}]", record.level.name()));
        if self.timestamps {
            parts.push(timestamp_string());
        }
        if !record.target.is_empty() {
            parts.push(record.target.clone());
        }
        if record.line > 0 {
            parts.push(format!("{}:{}", record.line, record.column));
        }

        let mut msg = record.message.clone();
        if !record.fields.is_empty() {
            msg = format!("{} {}", msg, format_fields(&record.fields));
        }

        format!("{} | {}", parts.join(" "), msg)
    }

    fn format_compact(&self, record: &LogRecord) -> String {
        let mut msg = record.message.clone();
        if !record.fields.is_empty() {
            msg = format!("{} {}", msg, format_fields(&record.fields));
        }
        format!("[{}] {}", record.level.name(), msg)
    }

    fn format_json(&self, record: &LogRecord) -> String {
        let mut obj = Map::new();
        if self.timestamps {
            obj.insert("ts".to_string(), JsonValue::String(timestamp_string()));
        }
        obj.insert(
            "level".to_string(),
            JsonValue::String(record.level.name().to_string()),
        );
        obj.insert(
            "target".to_string(),
            JsonValue::String(record.target.clone()),
        );
        obj.insert("line".to_string(), json!(record.line));
        obj.insert("column".to_string(), json!(record.column));
        obj.insert("msg".to_string(), JsonValue::String(record.message.clone()));

        let mut fields = Map::new();
        for (k, v) in &record.fields {
            fields.insert(k.clone(), JsonValue::String(v.clone()));
        }
        obj.insert("fields".to_string(), JsonValue::Object(fields));

        JsonValue::Object(obj).to_string()
    }
}

impl Default for LoggerCore {
    fn default() -> Self {
        Self::new()
    }
}

fn format_fields(fields: &[(String, String)]) -> String {
    fields
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn timestamp_string() -> String {
    format!("{}", Local::now().format("%Y-%m-%d %H:%M:%S%.3f"))
}
