use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::Deserialize;
use std::num::NonZeroUsize;
use std::thread;

pub const DEFAULT_DB_PATH: &str = "hashdir.db";
pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_TOP_K: usize = 5;

const DEFAULT_IGNORE_DIRS: &[&str] = &[
    ".git",
    "__pycache__",
    "node_modules",
    "venv",
    ".env",
    ".idea",
    ".vscode",
];
const DEFAULT_IGNORE_EXTENSIONS: &[&str] = &[".pyc", ".o", ".tmp", ".swp", ".class"];

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub db_path: String,
    /// Hashing threads. `None` or `0` means one per available core.
    pub workers: Option<usize>,
    /// Records written per store transaction during a scan.
    pub batch_size: usize,
    pub top_k: usize,
    pub ignore_dirs: Vec<String>,
    pub ignore_extensions: Vec<String>,
    pub ignore_patterns: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: DEFAULT_DB_PATH.to_string(),
            workers: None,
            batch_size: DEFAULT_BATCH_SIZE,
            top_k: DEFAULT_TOP_K,
            ignore_dirs: DEFAULT_IGNORE_DIRS.iter().map(|s| s.to_string()).collect(),
            ignore_extensions: DEFAULT_IGNORE_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            ignore_patterns: Vec::new(),
        }
    }
}

impl AppConfig {
    pub fn worker_count(&self) -> usize {
        match self.workers {
            Some(n) if n > 0 => n,
            _ => thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size.max(1)
    }
}

/// Loads `HashDir.{toml,yaml,json}` from the working directory if present,
/// then `HASHDIR_*` environment overrides (lists are comma separated).
pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name("HashDir").required(false))
        .add_source(
            Environment::with_prefix("HASHDIR")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("ignore_dirs")
                .with_list_parse_key("ignore_extensions")
                .with_list_parse_key("ignore_patterns"),
        )
        .build()?;
    builder.try_deserialize::<AppConfig>()
}
