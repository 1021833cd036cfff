//! Configuration module for the HTML filter plugin
//!
//! CRITICAL: Configuration is loaded from Envoy plugin configuration,
//! NOT from external files. This avoids file I/O in the Wasm sandbox.

use serde::Deserialize;

/// Plugin configuration loaded from Envoy plugin configuration
#[derive(Clone, Debug, Deserialize)]
pub struct PluginConfig {
    /// Tag/attribute directive string, e.g. `dt=script,style;da=onclick`
    #[serde(default)]
    pub html_filter: String,

    /// Longest tag or attribute name that survives a chunk split
    #[serde(default = "default_carryover_capacity")]
    pub carryover_capacity: usize,

    /// Response content types to filter (case-insensitive substring match)
    #[serde(default = "default_content_types")]
    pub content_types: Vec<String>,

    /// Whether to emit a telemetry event per filtered document
    #[serde(default = "default_log_documents")]
    pub log_documents: bool,
}

fn default_carryover_capacity() -> usize {
    256
}

fn default_content_types() -> Vec<String> {
    vec!["text/html".to_string()]
}

fn default_log_documents() -> bool {
    true
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            html_filter: String::new(),
            carryover_capacity: default_carryover_capacity(),
            content_types: default_content_types(),
            log_documents: default_log_documents(),
        }
    }
}

impl PluginConfig {
    /// Parse configuration from JSON bytes (from Envoy plugin configuration)
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        let config_str = std::str::from_utf8(bytes)
            .map_err(|e| ConfigError::InvalidUtf8(e.to_string()))?;

        let config: Self = serde_json::from_str(config_str)
            .map_err(|e| ConfigError::InvalidJson(e.to_string()))?;

        if config.content_types.is_empty() {
            return Err(ConfigError::EmptyContentTypes);
        }
        Ok(config)
    }

    /// Check if a response content type should be filtered
    pub fn is_filterable(&self, content_type: &str) -> bool {
        let ct_lower = content_type.to_ascii_lowercase();
        self.content_types
            .iter()
            .any(|t| ct_lower.contains(&t.to_ascii_lowercase()))
    }
}

/// Configuration parsing errors
#[derive(Debug)]
pub enum ConfigError {
    InvalidUtf8(String),
    InvalidJson(String),
    EmptyContentTypes,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidUtf8(e) => write!(f, "Invalid UTF-8: {}", e),
            ConfigError::InvalidJson(e) => write!(f, "Invalid JSON: {}", e),
            ConfigError::EmptyContentTypes => write!(f, "content_types must not be empty"),
        }
    }
}

impl std::error::Error for ConfigError {}
