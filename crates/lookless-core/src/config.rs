#![forbid(unsafe_code)]

//! Tree configuration.
//!
//! [`TreeConfig`] groups the few tunables of a [`WidgetTree`](crate::WidgetTree).
//! It can be built in code or, with the `config` feature, loaded from TOML or
//! JSON:
//!
//! ```toml
//! capacity = 256
//! validate_names = true
//! max_layout_passes = 8
//! ```

#[cfg(feature = "config")]
use std::path::Path;

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

/// Tunables for a widget tree and its layout driver.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct TreeConfig {
    /// Arena pre-allocation hint.
    pub capacity: usize,

    /// Reject element names that are not identifier shaped.
    pub validate_names: bool,

    /// Maximum queue drains per [`LayoutManager::run`](crate::LayoutManager::run).
    pub max_layout_passes: u32,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            capacity: 64,
            validate_names: true,
            max_layout_passes: 8,
        }
    }
}

impl TreeConfig {
    /// Set the arena capacity hint.
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Enable or disable element name validation.
    #[must_use]
    pub fn with_name_validation(mut self, enabled: bool) -> Self {
        self.validate_names = enabled;
        self
    }

    /// Set the layout pass budget.
    #[must_use]
    pub fn with_max_layout_passes(mut self, passes: u32) -> Self {
        self.max_layout_passes = passes;
        self
    }

    /// Load from a TOML string.
    #[cfg(feature = "config")]
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validated()
    }

    /// Load from a TOML file on disk.
    #[cfg(feature = "config")]
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Load from a JSON string.
    #[cfg(feature = "config")]
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s)?;
        config.validated()
    }

    /// Check every field against its accepted range. An empty list means the
    /// config is valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.max_layout_passes == 0 {
            errors.push("max_layout_passes must be > 0".into());
        }
        if self.capacity > (1 << 24) {
            errors.push(format!(
                "capacity must be <= {}, got {}",
                1 << 24,
                self.capacity
            ));
        }
        errors
    }

    /// `self` if [`validate`](Self::validate) reports nothing.
    pub fn validated(self) -> Result<Self, ConfigError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

/// Errors from loading or validating a [`TreeConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// I/O error reading a file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parse error.
    #[cfg(feature = "config")]
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    /// JSON parse error.
    #[cfg(feature = "config")]
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    /// Field validation failed.
    #[error("invalid tree config: {}", .0.join("; "))]
    Validation(Vec<String>),
}
