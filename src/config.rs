//! Resource configuration
//!
//! Parses and manages per-resource configuration from YAML files.
//!
//! Uses serde_yaml for parsing: define the field here with a default function
//! and serde handles the rest.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Default per-call argument payload cap (strings and buffers combined)
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 64 * 1024;

/// Payload references are 32-bit offsets, so no cap may exceed this
pub const PAYLOAD_LIMIT_CEILING: usize = u32::MAX as usize;

/// Configuration for one scripting resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceConfig {
    // ============================================
    // Identity
    // ============================================
    /// Resource name, as returned by GET_CURRENT_RESOURCE_NAME
    pub resource_name: String,

    // ============================================
    // Scripts
    // ============================================
    /// Directory scanned for `.lua` files (`main.lua` runs first)
    #[serde(default = "default_script_dir")]
    pub script_dir: String,

    // ============================================
    // Logging
    // ============================================
    /// `tracing_subscriber::EnvFilter` directive, overridden by RUST_LOG
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    /// Hex-dump every call buffer at trace level
    #[serde(default)]
    pub trace_native_calls: bool,

    // ============================================
    // Native calls
    // ============================================
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,

    /// Initial convar values for the in-memory engine
    #[serde(default)]
    pub convars: BTreeMap<String, String>,
}

// ============================================
// Default value functions
// ============================================

fn default_script_dir() -> String {
    "./scripts/".to_string()
}

fn default_log_filter() -> String {
    "info".to_string()
}

fn default_max_payload_bytes() -> usize {
    DEFAULT_MAX_PAYLOAD_BYTES
}

impl ResourceConfig {
    /// Config with every optional field at its default
    pub fn new(resource_name: impl Into<String>) -> Self {
        Self {
            resource_name: resource_name.into(),
            script_dir: default_script_dir(),
            log_filter: default_log_filter(),
            trace_native_calls: false,
            max_payload_bytes: default_max_payload_bytes(),
            convars: BTreeMap::new(),
        }
    }

    /// Load configuration from a YAML file
    ///
    /// # Example
    /// ```no_run
    /// use hashcall::config::ResourceConfig;
    ///
    /// let config = ResourceConfig::from_file("conf/resource.yaml")
    ///     .expect("Failed to load config");
    /// println!("resource: {}", config.resource_name);
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: ResourceConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML in {}", path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Parse configuration from a YAML string
    pub fn from_str(contents: &str) -> Result<Self> {
        let config: ResourceConfig =
            serde_yaml::from_str(contents).context("Failed to parse YAML")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.resource_name.is_empty(), "resource_name cannot be empty");
        anyhow::ensure!(
            !self.resource_name.chars().any(char::is_whitespace),
            "resource_name cannot contain whitespace: {:?}",
            self.resource_name
        );
        anyhow::ensure!(!self.script_dir.is_empty(), "script_dir cannot be empty");
        anyhow::ensure!(self.max_payload_bytes > 0, "max_payload_bytes must be positive");
        anyhow::ensure!(
            self.max_payload_bytes <= PAYLOAD_LIMIT_CEILING,
            "max_payload_bytes too large: {} (max {})",
            self.max_payload_bytes,
            PAYLOAD_LIMIT_CEILING
        );
        tracing_subscriber::EnvFilter::try_new(&self.log_filter)
            .with_context(|| format!("Invalid log_filter: {:?}", self.log_filter))?;

        Ok(())
    }

    /// Save configuration to a YAML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(&self).context("Failed to serialize config to YAML")?;

        fs::write(path.as_ref(), yaml)
            .with_context(|| format!("Failed to write config to {}", path.as_ref().display()))?;

        Ok(())
    }
}
