//! Configuration for the background indexer and Nova's tracing setup.
//!
//! Every field has a serde default, so an empty TOML document is a valid
//! configuration:
//!
//! ```toml
//! [background_index]
//! threads = 4
//! tus_before_rebuild = 100
//! shuffle_worklist = true
//! cache_root = "/tmp/nova-cache"
//!
//! [logging]
//! level = "nova.index=debug,info"
//! json = false
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Once, OnceLock};
use thiserror::Error;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::prelude::*;

/// Upper bound for the default worker count; explicit configs may go higher.
const DEFAULT_MAX_THREADS: usize = 8;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndexerConfig {
    #[serde(default)]
    pub background_index: BackgroundIndexConfig,

    /// Global logging settings for Nova crates.
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackgroundIndexConfig {
    /// Number of background worker threads. `0` is treated as `1`.
    #[serde(default = "BackgroundIndexConfig::default_threads")]
    pub threads: usize,

    /// Translation units indexed between two snapshot rebuilds once the first
    /// snapshot has been published.
    #[serde(default = "BackgroundIndexConfig::default_tus_before_rebuild")]
    pub tus_before_rebuild: usize,

    /// Randomize the order in which stale translation units are indexed.
    #[serde(default = "BackgroundIndexConfig::default_shuffle_worklist")]
    pub shuffle_worklist: bool,

    /// Override the shard cache root (the project hash is still appended).
    #[serde(default)]
    pub cache_root: Option<PathBuf>,
}

impl BackgroundIndexConfig {
    fn default_threads() -> usize {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .clamp(1, DEFAULT_MAX_THREADS)
    }

    fn default_tus_before_rebuild() -> usize {
        100
    }

    fn default_shuffle_worklist() -> bool {
        true
    }

    /// Worker count with invalid values corrected.
    pub fn effective_threads(&self) -> usize {
        if self.threads == 0 {
            tracing::warn!(
                target: "nova.config",
                "background_index.threads = 0 is invalid; using 1 worker thread"
            );
            return 1;
        }
        self.threads
    }

    pub fn effective_tus_before_rebuild(&self) -> usize {
        self.tus_before_rebuild.max(1)
    }
}

impl Default for BackgroundIndexConfig {
    fn default() -> Self {
        Self {
            threads: Self::default_threads(),
            tus_before_rebuild: Self::default_tus_before_rebuild(),
            shuffle_worklist: Self::default_shuffle_worklist(),
            cache_root: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Either a plain level (`info`, `debug`, ...) or an `EnvFilter` directive string.
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,

    /// Emit logs in JSON format.
    #[serde(default)]
    pub json: bool,

    /// Mirror logs to stderr.
    #[serde(default = "LoggingConfig::default_stderr")]
    pub stderr: bool,

    /// Append logs to the given file path. If the file cannot be opened, file
    /// logging is disabled while other sinks remain active.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_owned()
    }

    fn default_stderr() -> bool {
        true
    }

    pub(crate) fn normalize_level_directives(input: &str) -> String {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Self::default_level();
        }

        match trimmed.to_ascii_lowercase().as_str() {
            "trace" => "trace".to_owned(),
            "debug" => "debug".to_owned(),
            "info" => "info".to_owned(),
            "warn" | "warning" => "warn".to_owned(),
            "error" => "error".to_owned(),
            _ => trimmed.to_owned(),
        }
    }

    fn config_env_filter(&self) -> tracing_subscriber::EnvFilter {
        let directives = Self::normalize_level_directives(&self.level);
        tracing_subscriber::EnvFilter::try_new(directives).unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::default()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
        })
    }

    /// The effective filter: the configured level merged with `RUST_LOG`.
    pub fn env_filter(&self) -> tracing_subscriber::EnvFilter {
        let env_directives = std::env::var("RUST_LOG")
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty());

        match env_directives {
            Some(env_directives) => {
                let config_directives = Self::normalize_level_directives(&self.level);
                tracing_subscriber::EnvFilter::try_new(format!(
                    "{config_directives},{env_directives}"
                ))
                .or_else(|_| tracing_subscriber::EnvFilter::try_new(env_directives))
                .unwrap_or_else(|_| self.config_env_filter())
            }
            None => self.config_env_filter(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            json: false,
            stderr: Self::default_stderr(),
            file: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse toml config: {0}")]
    Toml(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        // The default `Display` includes a source snippet; keep only the message.
        ConfigError::Toml(sanitize_toml_error_message(err.message()))
    }
}

/// Redact quoted values from a toml/serde diagnostic.
fn sanitize_toml_error_message(message: &str) -> String {
    static QUOTED_STRING_RE: OnceLock<regex::Regex> = OnceLock::new();
    let re = QUOTED_STRING_RE.get_or_init(|| {
        regex::Regex::new(r#""(?:\\.|[^"\\])*""#).expect("quoted-string regex should compile")
    });
    re.replace_all(message, r#""<redacted>""#).into_owned()
}

impl IndexerConfig {
    /// Load a config file from TOML.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::load_from_str(&text)
    }

    pub fn load_from_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }
}

static TRACING_INIT: Once = Once::new();

/// Install the global tracing subscriber described by `config`.
///
/// Safe to call multiple times; only the first call has an effect (and it is a
/// no-op if another subscriber was already installed).
pub fn init_tracing(config: &LoggingConfig) {
    TRACING_INIT.call_once(|| {
        let file = config.file.as_ref().and_then(|path| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .ok()
        });

        let mut make_writer = BoxMakeWriter::new(std::io::sink);
        if config.stderr {
            // `cargo test` only captures output written through the stdlib print macros.
            make_writer = if cfg!(debug_assertions) {
                BoxMakeWriter::new(
                    make_writer.and(tracing_subscriber::fmt::writer::TestWriter::with_stderr),
                )
            } else {
                BoxMakeWriter::new(make_writer.and(std::io::stderr))
            };
        }
        if let Some(file) = file {
            let file = Arc::new(Mutex::new(file));
            make_writer = BoxMakeWriter::new(make_writer.and(move || MutexFileWriter {
                file: Arc::clone(&file),
            }));
        }

        let layer: Box<dyn tracing_subscriber::Layer<_> + Send + Sync> = if config.json {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(make_writer)
                .with_ansi(false)
                .boxed()
        } else {
            tracing_subscriber::fmt::layer()
                .with_writer(make_writer)
                .with_ansi(false)
                .boxed()
        };

        let _ = tracing_subscriber::registry()
            .with(config.env_filter())
            .with(layer)
            .try_init();
    });
}

struct MutexFileWriter {
    file: Arc<Mutex<std::fs::File>>,
}

impl std::io::Write for MutexFileWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| std::io::Error::other("log file lock poisoned"))?;
        file.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| std::io::Error::other("log file lock poisoned"))?;
        file.flush()
    }
}
