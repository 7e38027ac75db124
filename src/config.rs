//! Service configuration module.
//!
//! Handles loading, validating, and merging `config.toml`. Stock defaults are
//! serialized to a TOML table and the user file is merged on top, so a config
//! file only needs the keys it wants to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [server]
//! bind = "127.0.0.1:8080"                  # Listen address for `serve`
//! cache_control = "public, max-age=86400"  # Cache-Control on resized images
//!
//! [store]
//! root = "images"                          # Directory source images are fetched from
//!
//! [resize]
//! empty_request = "pass-through"           # or "reject"
//! jpeg_quality = 90                        # 1-100
//!
//! [limits]
//! max_input_width = 16384
//! max_input_height = 16384
//! max_alloc_mb = 512
//! max_output_pixels = 50000000
//!
//! [processing]
//! max_processes = 4                        # Max parallel workers for `batch` (omit for auto)
//!
//! [logging]
//! level = "info"
//! format = "pretty"                        # or "json"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{BackendLimits, EmptyRequestPolicy, Quality, RustBackend};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Service configuration loaded from `config.toml`.
///
/// All fields have sensible defaults. Unknown keys are rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    /// HTTP listener settings.
    pub server: ServerConfig,
    /// Where source images are fetched from.
    pub store: StoreConfig,
    /// Resize behaviour shared by every caller.
    pub resize: ResizeConfig,
    /// Decoder and resampler resource ceilings.
    pub limits: LimitsConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
    /// Log level and output format.
    pub logging: LoggingConfig,
}

impl ServiceConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.resize.jpeg_quality) {
            return Err(ConfigError::Validation(
                "resize.jpeg_quality must be 1-100".into(),
            ));
        }
        if self.server.bind.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::Validation(format!(
                "server.bind is not a socket address: {:?}",
                self.server.bind
            )));
        }
        if self.store.root.trim().is_empty() {
            return Err(ConfigError::Validation(
                "store.root must not be empty".into(),
            ));
        }
        let limits = &self.limits;
        if limits.max_input_width == 0
            || limits.max_input_height == 0
            || limits.max_alloc_mb == 0
            || limits.max_output_pixels == 0
        {
            return Err(ConfigError::Validation(
                "limits values must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// Build the process-wide image backend from these settings.
    pub fn backend(&self) -> RustBackend {
        RustBackend::with_settings(
            self.limits.to_backend_limits(),
            Quality::new(self.resize.jpeg_quality),
        )
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Socket address to listen on.
    pub bind: String,
    /// `Cache-Control` header sent with successful image responses.
    pub cache_control: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            cache_control: "public, max-age=86400".to_string(),
        }
    }
}

/// Source image store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Root directory; `image_name` values are resolved relative to it.
    pub root: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: "images".to_string(),
        }
    }
}

/// Resize behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResizeConfig {
    /// What a request with neither width nor height does.
    pub empty_request: EmptyRequestPolicy,
    /// JPEG encoding quality (1 = worst, 100 = best).
    pub jpeg_quality: u32,
}

impl Default for ResizeConfig {
    fn default() -> Self {
        Self {
            empty_request: EmptyRequestPolicy::PassThrough,
            jpeg_quality: Quality::default().value(),
        }
    }
}

/// Resource ceilings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    /// Largest accepted source width in pixels.
    pub max_input_width: u32,
    /// Largest accepted source height in pixels.
    pub max_input_height: u32,
    /// Decoder allocation ceiling in MiB.
    pub max_alloc_mb: u64,
    /// Largest output (width × height) the resampler will produce.
    pub max_output_pixels: u64,
}

impl LimitsConfig {
    pub fn to_backend_limits(&self) -> BackendLimits {
        BackendLimits {
            max_input_width: self.max_input_width,
            max_input_height: self.max_input_height,
            max_alloc_bytes: self.max_alloc_mb.saturating_mul(1024 * 1024),
            max_output_pixels: self.max_output_pixels,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        let limits = BackendLimits::default();
        Self {
            max_input_width: limits.max_input_width,
            max_input_height: limits.max_input_height,
            max_alloc_mb: limits.max_alloc_bytes / (1024 * 1024),
            max_output_pixels: limits.max_output_pixels,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel image processing workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` overrides it.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(ServiceConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<ServiceConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: ServiceConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from the file at `path`.
///
/// A missing file yields the stock defaults. User values are merged on top of
/// stock defaults, unknown keys are rejected, and the result is validated.
pub fn load_config(path: &Path) -> Result<ServiceConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Simple Resize Configuration
# ===========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# HTTP service (`simple-resize serve`)
# ---------------------------------------------------------------------------
[server]
# Address to listen on.
bind = "127.0.0.1:8080"

# Cache-Control header for successful image responses.
# Error responses always use "no-store".
cache_control = "public, max-age=86400"

# ---------------------------------------------------------------------------
# Source store
# ---------------------------------------------------------------------------
[store]
# Directory that `image_name` is resolved against.
root = "images"

# ---------------------------------------------------------------------------
# Resize behaviour
# ---------------------------------------------------------------------------
[resize]
# A request without width and height either returns the original bytes
# unchanged ("pass-through") or fails with MissingDimension ("reject").
empty_request = "pass-through"

# JPEG encoding quality (1 = worst, 100 = best). Other formats are lossless.
jpeg_quality = 90

# ---------------------------------------------------------------------------
# Resource limits
# ---------------------------------------------------------------------------
[limits]
# Sources larger than this fail to decode.
max_input_width = 16384
max_input_height = 16384

# Decoder allocation ceiling, in MiB.
max_alloc_mb = 512

# Largest output (width x height) the resampler will produce. Also bounds
# the intermediate buffer (source width x output height).
max_output_pixels = 50000000

# ---------------------------------------------------------------------------
# Processing (`simple-resize batch`)
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel image-processing workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4

# ---------------------------------------------------------------------------
# Logging
# ---------------------------------------------------------------------------
[logging]
# Filter directive, e.g. "debug" or "simple_resize=debug,tower=info".
# RUST_LOG takes precedence when set.
level = "info"

# "pretty" for humans, "json" for log collectors.
format = "pretty"
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = ServiceConfig::default();
        assert_eq!(config.server.bind, "127.0.0.1:8080");
        assert_eq!(config.server.cache_control, "public, max-age=86400");
        assert_eq!(config.store.root, "images");
        assert_eq!(config.resize.empty_request, EmptyRequestPolicy::PassThrough);
        assert_eq!(config.resize.jpeg_quality, 90);
        assert_eq!(config.limits.max_alloc_mb, 512);
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn validate_default_config_passes() {
        assert!(ServiceConfig::default().validate().is_ok());
    }

    #[test]
    fn parse_partial_config() {
        let toml = r#"
[resize]
empty_request = "reject"
"#;
        let config: ServiceConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.resize.empty_request, EmptyRequestPolicy::Reject);
        // Default values preserved
        assert_eq!(config.resize.jpeg_quality, 90);
        assert_eq!(config.server.bind, "127.0.0.1:8080");
    }

    #[test]
    fn parse_logging_json() {
        let toml = r#"
[logging]
format = "json"
level = "debug"
"#;
        let config: ServiceConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn backend_uses_configured_limits_and_quality() {
        let mut config = ServiceConfig::default();
        config.resize.jpeg_quality = 70;
        config.limits.max_alloc_mb = 2;
        config.limits.max_output_pixels = 1000;
        let backend = config.backend();
        assert_eq!(backend.quality().value(), 70);
        assert_eq!(backend.limits().max_alloc_bytes, 2 * 1024 * 1024);
        assert_eq!(backend.limits().max_output_pixels, 1000);
    }

    #[test]
    fn default_limits_match_backend_defaults() {
        assert_eq!(
            LimitsConfig::default().to_backend_limits(),
            BackendLimits::default()
        );
    }

    // =========================================================================
    // Processing config tests
    // =========================================================================

    #[test]
    fn default_processing_config() {
        let config = ProcessingConfig::default();
        assert_eq!(config.max_processes, None);
    }

    #[test]
    fn effective_threads_auto() {
        let config = ProcessingConfig {
            max_processes: None,
        };
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(effective_threads(&config), cores);
    }

    #[test]
    fn effective_threads_clamped_to_cores() {
        let config = ProcessingConfig {
            max_processes: Some(99999),
        };
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(effective_threads(&config), cores);
    }

    #[test]
    fn effective_threads_user_constrains_down() {
        let config = ProcessingConfig {
            max_processes: Some(1),
        };
        assert_eq!(effective_threads(&config), 1);
    }

    #[test]
    fn effective_threads_zero_means_one() {
        let config = ProcessingConfig {
            max_processes: Some(0),
        };
        assert_eq!(effective_threads(&config), 1);
    }

    // =========================================================================
    // merge_toml tests
    // =========================================================================

    #[test]
    fn merge_toml_scalar_override() {
        let base: toml::Value = toml::from_str(r#"quality = 90"#).unwrap();
        let overlay: toml::Value = toml::from_str(r#"quality = 70"#).unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("quality").unwrap().as_integer(), Some(70));
    }

    #[test]
    fn merge_toml_table_merge_preserves_siblings() {
        let base: toml::Value = toml::from_str(
            r#"
[server]
bind = "127.0.0.1:8080"
cache_control = "public"
"#,
        )
        .unwrap();
        let overlay: toml::Value = toml::from_str(
            r#"
[server]
bind = "0.0.0.0:9000"
"#,
        )
        .unwrap();
        let merged = merge_toml(base, overlay);
        let server = merged.get("server").unwrap();
        assert_eq!(server.get("bind").unwrap().as_str(), Some("0.0.0.0:9000"));
        assert_eq!(server.get("cache_control").unwrap().as_str(), Some("public"));
    }

    // =========================================================================
    // Unknown key rejection tests
    // =========================================================================

    #[test]
    fn unknown_key_rejected() {
        let toml_str = r#"
[resize]
jpeg_qualty = 90
"#;
        let result: Result<ServiceConfig, _> = toml::from_str(toml_str);
        let err = result.unwrap_err().to_string();
        assert!(err.contains("unknown field"));
    }

    #[test]
    fn unknown_section_rejected() {
        let toml_str = r#"
[resise]
jpeg_quality = 90
"#;
        let result: Result<ServiceConfig, _> = toml::from_str(toml_str);
        assert!(result.is_err());
    }

    #[test]
    fn unknown_policy_rejected() {
        let toml_str = r#"
[resize]
empty_request = "guess"
"#;
        let result: Result<ServiceConfig, _> = toml::from_str(toml_str);
        assert!(result.is_err());
    }

    // =========================================================================
    // Validation tests
    // =========================================================================

    #[test]
    fn validate_quality_boundaries() {
        let mut config = ServiceConfig::default();
        config.resize.jpeg_quality = 100;
        assert!(config.validate().is_ok());
        config.resize.jpeg_quality = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
        config.resize.jpeg_quality = 101;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_bad_bind_address() {
        let mut config = ServiceConfig::default();
        config.server.bind = "localhost".into();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("server.bind"));
    }

    #[test]
    fn validate_empty_store_root() {
        let mut config = ServiceConfig::default();
        config.store.root = "  ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_zero_limit() {
        let mut config = ServiceConfig::default();
        config.limits.max_output_pixels = 0;
        assert!(config.validate().is_err());
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join("config.toml")).unwrap();
        assert_eq!(config.store.root, "images");
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(
            &path,
            r#"
[store]
root = "/srv/bucket"

[limits]
max_input_width = 4096
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.store.root, "/srv/bucket");
        assert_eq!(config.limits.max_input_width, 4096);
        // Unspecified values should be defaults
        assert_eq!(config.limits.max_input_height, 16_384);
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(&path, "this is not [valid toml").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn load_config_validates_values() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(&path, "[resize]\njpeg_quality = 500\n").unwrap();
        assert!(matches!(
            load_config(&path),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn stock_config_toml_parses_to_defaults() {
        let config: ServiceConfig = toml::from_str(stock_config_toml()).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.bind, ServiceConfig::default().server.bind);
        assert_eq!(config.resize.jpeg_quality, 90);
        assert_eq!(config.processing.max_processes, None);
    }
}
