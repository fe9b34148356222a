//! Run configuration.

use crate::error::{CarveError, Result};
use crate::types::{KB, LONGEST_MAGIC, MB};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_WINDOW_SIZE: usize = 2 * MB as usize;
pub const DEFAULT_OVERLAP_SIZE: usize = 64;
pub const DEFAULT_MAX_BLOCK_SIZE: u64 = 200 * KB;
pub const DEFAULT_MAX_RECOVERED_FILES: usize = 20;
pub const DEFAULT_OUTPUT_DIRECTORY: &str = "recovered_docs";
/// Largest container carve, and how far ahead a trailer is searched for.
pub const DEFAULT_TRAILER_SEARCH_LIMIT: u64 = 32 * MB;

/// Options recognized by the scanner and the orchestrator.
///
/// Every field is optional in a JSON config file; missing ones take the
/// defaults below.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CarveConfig {
    /// Bytes per scan window.
    pub window_size: usize,
    /// Bytes carried from the tail of one window into the next.
    pub overlap_size: usize,
    /// Carve size for compound candidates and for containers with no trailer.
    pub max_block_size: u64,
    /// Cap on documents recovered per run.
    pub max_recovered_files: usize,
    pub output_directory: PathBuf,
    /// Bound on the forward trailer search for containers, and so on the size
    /// of a container carve. `None` (`null` in JSON) searches to the end of
    /// the source.
    pub trailer_search_limit: Option<u64>,
}

impl Default for CarveConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            overlap_size: DEFAULT_OVERLAP_SIZE,
            max_block_size: DEFAULT_MAX_BLOCK_SIZE,
            max_recovered_files: DEFAULT_MAX_RECOVERED_FILES,
            output_directory: PathBuf::from(DEFAULT_OUTPUT_DIRECTORY),
            trailer_search_limit: Some(DEFAULT_TRAILER_SEARCH_LIMIT),
        }
    }
}

impl CarveConfig {
    pub fn new(output_directory: impl Into<PathBuf>) -> Self {
        Self {
            output_directory: output_directory.into(),
            ..Default::default()
        }
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| CarveError::ConfigFile {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|e| CarveError::ConfigFile {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_window_size(mut self, size: usize) -> Self {
        self.window_size = size;
        self
    }

    pub fn with_overlap_size(mut self, size: usize) -> Self {
        self.overlap_size = size;
        self
    }

    pub fn with_max_block_size(mut self, size: u64) -> Self {
        self.max_block_size = size;
        self
    }

    pub fn with_max_recovered_files(mut self, count: usize) -> Self {
        self.max_recovered_files = count;
        self
    }

    pub fn with_trailer_search_limit(mut self, limit: Option<u64>) -> Self {
        self.trailer_search_limit = limit;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 {
            return Err(CarveError::InvalidConfig(
                "window_size must be greater than zero".into(),
            ));
        }
        // A magic split by a window join must fit entirely in the next window.
        if self.overlap_size < LONGEST_MAGIC - 1 {
            return Err(CarveError::InvalidConfig(format!(
                "overlap_size must be at least {} bytes",
                LONGEST_MAGIC - 1
            )));
        }
        if self.overlap_size >= self.window_size {
            return Err(CarveError::InvalidConfig(
                "overlap_size must be smaller than window_size".into(),
            ));
        }
        if self.max_block_size == 0 {
            return Err(CarveError::InvalidConfig(
                "max_block_size must be greater than zero".into(),
            ));
        }
        if self.max_recovered_files == 0 {
            return Err(CarveError::InvalidConfig(
                "max_recovered_files must be greater than zero".into(),
            ));
        }
        if self.trailer_search_limit == Some(0) {
            return Err(CarveError::InvalidConfig(
                "trailer_search_limit must be greater than zero when set".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CarveConfig::default();
        assert_eq!(config.window_size, 2 * 1024 * 1024);
        assert_eq!(config.overlap_size, 64);
        assert_eq!(config.max_block_size, 200 * 1024);
        assert_eq!(config.max_recovered_files, 20);
        assert_eq!(config.trailer_search_limit, Some(32 * 1024 * 1024));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_short_overlap() {
        let config = CarveConfig::default().with_overlap_size(3);
        assert!(matches!(
            config.validate(),
            Err(CarveError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_rejects_overlap_not_smaller_than_window() {
        let config = CarveConfig::default()
            .with_window_size(64)
            .with_overlap_size(64);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_cap() {
        let config = CarveConfig::default().with_max_recovered_files(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json() {
        let config: CarveConfig =
            serde_json::from_str(r#"{"max_recovered_files": 5, "overlap_size": 128}"#).unwrap();
        assert_eq!(config.max_recovered_files, 5);
        assert_eq!(config.overlap_size, 128);
        assert_eq!(config.window_size, DEFAULT_WINDOW_SIZE);
    }

    #[test]
    fn test_null_trailer_limit_searches_whole_source() {
        let config: CarveConfig =
            serde_json::from_str(r#"{"trailer_search_limit": null}"#).unwrap();
        assert_eq!(config.trailer_search_limit, None);

        let config: CarveConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(
            config.trailer_search_limit,
            Some(DEFAULT_TRAILER_SEARCH_LIMIT)
        );
    }

    #[test]
    fn test_unknown_json_field() {
        let parsed: std::result::Result<CarveConfig, _> =
            serde_json::from_str(r#"{"chunk_size": 5}"#);
        assert!(parsed.is_err());
    }
}
