//! Engine configuration.
//!
//! Loaded from a TOML file, validated, then installed process-wide with
//! [`crate::init`]. Every key is optional:
//!
//! ```toml
//! [processing]
//! max_threads = 4          # Worker threads (omit for all CPU cores)
//!
//! [limits]
//! max_pixels = 268402689   # Refuse to decode images with more pixels
//!
//! [foreign]
//! jpeg_quality = 75        # Default JPEG quality (1-100)
//! png_compression = 6      # Default PNG compression level (0-9)
//! ```
//!
//! Savers read the `[foreign]` defaults when a call leaves the matching
//! argument unset, so installing a new config changes the defaults of every
//! later save. Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::{LazyLock, PoisonError, RwLock};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Engine configuration loaded from TOML.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Worker pool settings.
    pub processing: ProcessingConfig,
    /// Decoder safety limits.
    pub limits: LimitsConfig,
    /// Default saver settings.
    pub foreign: ForeignConfig,
}

impl EngineConfig {
    /// Reject values no loader, saver or pool could use.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.processing.max_threads == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_threads must be at least 1".into(),
            ));
        }
        if self.limits.max_pixels == 0 {
            return Err(ConfigError::Validation(
                "limits.max_pixels must be non-zero".into(),
            ));
        }
        if !(1..=100).contains(&self.foreign.jpeg_quality) {
            return Err(ConfigError::Validation(
                "foreign.jpeg_quality must be 1-100".into(),
            ));
        }
        if self.foreign.png_compression > 9 {
            return Err(ConfigError::Validation(
                "foreign.png_compression must be 0-9".into(),
            ));
        }
        Ok(())
    }
}

/// Worker pool settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of worker threads used inside operations.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_threads: Option<usize>,
}

/// Threads for the rayon pool: the configured count capped at the core
/// count, or every core when unset.
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_threads.map(|n| n.min(cores)).unwrap_or(cores)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    /// Largest `width * height` a loader will decode.
    pub max_pixels: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_pixels: 16383 * 16383,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ForeignConfig {
    pub jpeg_quality: u8,
    pub png_compression: u8,
}

impl Default for ForeignConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: 75,
            png_compression: 6,
        }
    }
}

/// Parse and validate a config from TOML text.
pub fn parse_config(text: &str) -> Result<EngineConfig, ConfigError> {
    let config: EngineConfig = toml::from_str(text)?;
    config.validate()?;
    Ok(config)
}

/// Load a config file. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<EngineConfig, ConfigError> {
    if !path.exists() {
        return Ok(EngineConfig::default());
    }
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

static CURRENT: LazyLock<RwLock<EngineConfig>> =
    LazyLock::new(|| RwLock::new(EngineConfig::default()));

/// The installed configuration.
pub fn current() -> EngineConfig {
    CURRENT
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

pub(crate) fn install(config: EngineConfig) {
    *CURRENT.write().unwrap_or_else(PoisonError::into_inner) = config;
}

/// Returns a fully-commented stock config with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# vimage Configuration
# ====================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum worker threads used inside operations.
# Omit to use all CPU cores. Values above the core count are clamped.
# max_threads = 4

# ---------------------------------------------------------------------------
# Limits
# ---------------------------------------------------------------------------
[limits]
# Loaders refuse images with more than this many pixels (width * height).
max_pixels = 268402689

# ---------------------------------------------------------------------------
# Savers
# ---------------------------------------------------------------------------
[foreign]
# JPEG quality when a save doesn't pass Q (1-100).
jpeg_quality = 75

# PNG compression level when a save doesn't pass compression (0-9).
png_compression = 6
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_match_the_saver_fallbacks() {
        let config = EngineConfig::default();
        assert_eq!(config.processing.max_threads, None);
        assert_eq!(config.limits.max_pixels, 268402689);
        assert_eq!((config.foreign.jpeg_quality, config.foreign.png_compression), (75, 6));
        assert_eq!(parse_config(stock_config_toml()).unwrap(), config);
    }

    #[test]
    fn missing_sections_keep_their_defaults() {
        let config = parse_config("[foreign]\njpeg_quality = 90\n").unwrap();
        assert_eq!(config.foreign.jpeg_quality, 90);
        assert_eq!(config.foreign.png_compression, 6);
        assert_eq!(config.limits, LimitsConfig::default());
    }

    #[test]
    fn typos_are_errors() {
        let err = parse_config("[foreign]\njpeg_qualty = 90\n").unwrap_err();
        assert!(err.to_string().contains("unknown field"));
        assert!(parse_config("[codecs]\npng = true\n").is_err());
    }

    #[test]
    fn out_of_range_values_rejected() {
        for text in [
            "[foreign]\njpeg_quality = 0\n",
            "[foreign]\npng_compression = 10\n",
            "[limits]\nmax_pixels = 0\n",
            "[processing]\nmax_threads = 0\n",
        ] {
            assert!(
                matches!(parse_config(text), Err(ConfigError::Validation(_))),
                "{text}"
            );
        }
    }

    #[test]
    fn absent_file_means_defaults() {
        let dir = TempDir::new().unwrap();
        let config = load_config(&dir.path().join("vimage.toml")).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn file_is_read_and_checked() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vimage.toml");
        fs::write(&path, "[processing]\nmax_threads = 2\n").unwrap();
        assert_eq!(load_config(&path).unwrap().processing.max_threads, Some(2));

        fs::write(&path, "[limits\nmax_pixels = 1").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn thread_count_never_exceeds_cores() {
        let cores = effective_threads(&ProcessingConfig::default());
        assert!(cores >= 1);
        let one = ProcessingConfig { max_threads: Some(1) };
        assert_eq!(effective_threads(&one), 1);
        let many = ProcessingConfig { max_threads: Some(99999) };
        assert_eq!(effective_threads(&many), cores);
    }
}
