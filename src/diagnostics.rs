//! The process-wide log sink: `env_logger` behind a substring filter over
//! formatted messages.

use log::{LevelFilter, Log, Metadata, Record};

/// Messages suppressed unless verbose output was requested. They repeat
/// for every page that uses an affected font.
pub const DEFAULT_DENY: &[&str] = &[
    "no substitute font available for",
    "has no embedded program and no ToUnicode map",
];

/// Allow entries win over deny entries; both match substrings of the
/// formatted message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiagnosticFilter {
    pub allow: Vec<String>,
    pub deny: Vec<String>,
}

impl DiagnosticFilter {
    pub fn with_default_deny() -> Self {
        Self {
            allow: Vec::new(),
            deny: DEFAULT_DENY.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn permits(&self, message: &str) -> bool {
        if self.allow.iter().any(|needle| message.contains(needle.as_str())) {
            return true;
        }
        !self.deny.iter().any(|needle| message.contains(needle.as_str()))
    }
}

struct FilteredLogger {
    inner: env_logger::Logger,
    filter: DiagnosticFilter,
}

impl Log for FilteredLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        self.inner.enabled(metadata)
    }

    fn log(&self, record: &Record<'_>) {
        if !self.inner.matches(record) {
            return;
        }
        if self.filter.permits(&record.args().to_string()) {
            self.inner.log(record);
        }
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

/// Level used when `RUST_LOG` is unset: `warn`, then `info`, `debug` and
/// `trace` for each extra `-v`.
pub fn default_level(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Installs the sink. Returns false when a logger was already installed,
/// in which case nothing changes.
pub fn install(verbosity: u8, filter: DiagnosticFilter) -> bool {
    let level = default_level(verbosity).to_string().to_ascii_lowercase();
    let inner = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .build();
    let max_level = inner.filter();
    if log::set_boxed_logger(Box::new(FilteredLogger { inner, filter })).is_err() {
        return false;
    }
    log::set_max_level(max_level);
    true
}
