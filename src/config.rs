//! Service Configuration
//!
//! Two configuration surfaces with different lifetimes:
//!
//! - [`ServiceConfig`] describes the process: listen port, worker count,
//!   input paths, keep-alive interval. Loaded from an optional JSON file and
//!   overridable per-field through `TRAVELS_*` environment variables.
//! - [`DataOptions`] is the dataset's own two-line options source: the data
//!   generation timestamp (reference point for age filters) and the sizing
//!   flag selecting full or train cardinalities.

use crate::error::{LoadError, LoadResult};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Per-entity array cardinalities, known ahead of load so the store can be
/// pre-sized with placeholders before any file is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetSize {
    pub users: usize,
    pub locations: usize,
    pub visits: usize,
}

impl DatasetSize {
    /// Sizing of the small ("train") dataset.
    pub const TRAIN: DatasetSize = DatasetSize {
        users: 10_062,
        locations: 7_978,
        visits: 100_620,
    };

    /// Sizing of the large ("full") rating-run dataset.
    pub const FULL: DatasetSize = DatasetSize {
        users: 1_000_058,
        locations: 763_802,
        visits: 10_000_580,
    };
}

/// Parsed contents of the dataset options source.
#[derive(Debug, Clone, Copy)]
pub struct DataOptions {
    /// Unix timestamp the dataset was generated at; age filters are computed
    /// relative to this instant, not to wall-clock time.
    pub generated_at: i64,
    /// True when the options flag selected the full dataset sizing.
    pub full_dataset: bool,
}

impl DataOptions {
    /// Read the two-line options file: line 1 is an integer unix timestamp,
    /// line 2 is a flag whose literal value `1` selects the full sizing and
    /// any other value selects the train sizing.
    pub fn from_file(path: &Path) -> LoadResult<Self> {
        let text = fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut lines = text.lines();

        let generated_at = lines
            .next()
            .ok_or_else(|| LoadError::BadOptions {
                path: path.to_path_buf(),
                reason: "missing generation timestamp line".into(),
            })?
            .trim()
            .parse::<i64>()
            .map_err(|e| LoadError::BadOptions {
                path: path.to_path_buf(),
                reason: format!("generation timestamp: {e}"),
            })?;

        let full_dataset = matches!(lines.next().map(str::trim), Some("1"));

        Ok(DataOptions {
            generated_at,
            full_dataset,
        })
    }

    pub fn sizing(&self) -> DatasetSize {
        if self.full_dataset {
            DatasetSize::FULL
        } else {
            DatasetSize::TRAIN
        }
    }
}

/// Process-level configuration assembled at bootstrap.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listen port; supplied by the deployment, the library bakes in none.
    pub port: u16,
    /// Number of independent event-loop workers owning connections.
    pub workers: usize,
    /// Directory tree of data files routed to the loader by name.
    pub data_dir: PathBuf,
    /// Path of the two-line options source.
    pub options_path: PathBuf,
    /// TCP keep-alive probe interval, seconds.
    pub keepalive_secs: u64,
    /// Enable the read-through response cache on point-lookup routes.
    pub point_cache: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            workers: crate::server::DEFAULT_WORKERS,
            data_dir: PathBuf::from("/tmp/data/data"),
            options_path: PathBuf::from("/tmp/data/options.txt"),
            keepalive_secs: 30,
            point_cache: false,
        }
    }
}

impl ServiceConfig {
    /// Load configuration: JSON file named by `TRAVELS_CONFIG` if set, then
    /// per-field `TRAVELS_*` environment overrides on top.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = match std::env::var("TRAVELS_CONFIG") {
            Ok(path) => {
                let text = fs::read_to_string(&path)
                    .map_err(|e| anyhow::anyhow!("reading config {path}: {e}"))?;
                serde_json::from_str(&text)
                    .map_err(|e| anyhow::anyhow!("parsing config {path}: {e}"))?
            }
            Err(_) => ServiceConfig::default(),
        };

        if let Ok(v) = std::env::var("TRAVELS_PORT") {
            config.port = v.parse()?;
        }
        if let Ok(v) = std::env::var("TRAVELS_WORKERS") {
            config.workers = v.parse()?;
        }
        if let Ok(v) = std::env::var("TRAVELS_DATA_DIR") {
            config.data_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("TRAVELS_OPTIONS") {
            config.options_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("TRAVELS_POINT_CACHE") {
            config.point_cache = v == "1" || v.eq_ignore_ascii_case("true");
        }

        Ok(config)
    }

    pub fn keepalive(&self) -> Duration {
        Duration::from_secs(self.keepalive_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn options_parse_train_and_full() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "1503695452\n1\n").unwrap();
        let opts = DataOptions::from_file(file.path()).unwrap();
        assert_eq!(opts.generated_at, 1503695452);
        assert!(opts.full_dataset);
        assert_eq!(opts.sizing(), DatasetSize::FULL);

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "1503695452\n0\n").unwrap();
        let opts = DataOptions::from_file(file.path()).unwrap();
        assert!(!opts.full_dataset);
        assert_eq!(opts.sizing(), DatasetSize::TRAIN);
    }

    #[test]
    fn options_reject_non_integer_timestamp() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not-a-number\n1\n").unwrap();
        assert!(matches!(
            DataOptions::from_file(file.path()),
            Err(LoadError::BadOptions { .. })
        ));
    }

    #[test]
    fn missing_flag_line_reads_as_train() {
        // A single-line file still yields a config; the absent flag reads as
        // train sizing, mirroring the lenient flag handling of the loader.
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "1503695452\n").unwrap();
        let opts = DataOptions::from_file(file.path()).unwrap();
        assert!(!opts.full_dataset);
    }
}
