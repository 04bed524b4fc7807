// Engine configuration

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{QueryError, Result};

/// Rows per in-memory chunk for external sort when nothing else is configured.
pub const DEFAULT_SORT_CHUNK_SIZE: usize = 1000;

/// Rows per Arrow batch when collecting query output.
pub const DEFAULT_BATCH_SIZE: usize = 8192;

/// Configuration threaded through operator construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Number of rows buffered before a sorted run is spilled to disk
    pub sort_chunk_size: usize,
    /// Batch size for Arrow output (default: 8192)
    pub batch_size_rows: usize,
    /// Directory that receives temporary sort runs
    pub spill_dir: PathBuf,
    /// Field delimiter; `None` detects it from the header line
    pub delimiter: Option<char>,
    /// Whether `.zonemap.json` sidecars are consulted before scanning
    pub use_zone_maps: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sort_chunk_size: DEFAULT_SORT_CHUNK_SIZE,
            batch_size_rows: DEFAULT_BATCH_SIZE,
            spill_dir: std::env::temp_dir(),
            delimiter: None,
            use_zone_maps: true,
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON configuration file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn with_sort_chunk_size(mut self, chunk_size: usize) -> Self {
        self.sort_chunk_size = chunk_size;
        self
    }

    pub fn with_spill_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.spill_dir = dir.into();
        self
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = Some(delimiter);
        self
    }

    pub fn with_zone_maps(mut self, enabled: bool) -> Self {
        self.use_zone_maps = enabled;
        self
    }

    /// Check the configuration contract.
    ///
    /// # Errors
    /// Returns `InvalidConfig` for a zero chunk or batch size, or a delimiter
    /// that is not a single-byte character usable as a field separator
    pub fn validate(&self) -> Result<()> {
        if self.sort_chunk_size == 0 {
            return Err(QueryError::InvalidConfig(
                "sort_chunk_size must be at least 1".to_string(),
            ));
        }
        if self.batch_size_rows == 0 {
            return Err(QueryError::InvalidConfig(
                "batch_size_rows must be at least 1".to_string(),
            ));
        }
        self.delimiter_byte()?;
        Ok(())
    }

    /// The configured delimiter as a byte, if one is set.
    pub fn delimiter_byte(&self) -> Result<Option<u8>> {
        match self.delimiter {
            None => Ok(None),
            Some(c) if c.is_ascii() && !matches!(c, '"' | '\n' | '\r') => Ok(Some(c as u8)),
            Some(c) => Err(QueryError::InvalidConfig(format!(
                "unsupported delimiter {:?}",
                c
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert_eq!(config.sort_chunk_size, 1000);
        assert_eq!(config.batch_size_rows, 8192);
        assert!(config.use_zone_maps);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let config = EngineConfig::default().with_sort_chunk_size(0);
        assert!(matches!(
            config.validate(),
            Err(QueryError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_delimiter_validation() {
        let config = EngineConfig::default().with_delimiter('|');
        assert_eq!(config.delimiter_byte().unwrap(), Some(b'|'));

        let config = EngineConfig::default().with_delimiter('"');
        assert!(config.validate().is_err());

        let config = EngineConfig::default().with_delimiter('é');
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_json_partial_config() {
        let config =
            EngineConfig::from_json_str(r#"{"sort_chunk_size": 16, "delimiter": "\t"}"#).unwrap();
        assert_eq!(config.sort_chunk_size, 16);
        assert_eq!(config.delimiter, Some('\t'));
        assert_eq!(config.batch_size_rows, DEFAULT_BATCH_SIZE);

        assert!(EngineConfig::from_json_str(r#"{"sort_chunk_size": 0}"#).is_err());
    }

    #[test]
    fn test_json_file_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        std::fs::write(&path, r#"{"use_zone_maps": false}"#).unwrap();

        let config = EngineConfig::from_json_file(&path).unwrap();
        assert!(!config.use_zone_maps);
        assert_eq!(config.sort_chunk_size, DEFAULT_SORT_CHUNK_SIZE);
    }
}
