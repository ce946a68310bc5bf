//! Configuration for drawing and delivery
//!
//! Every value has a default, so an empty TOML document is a valid
//! configuration.

use crate::error::{FieldmarkError, Result};
use crate::persist::DEFAULT_FIELDS_KEY;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Top-level configuration loaded from TOML
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FieldmarkConfig {
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl FieldmarkConfig {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns [`FieldmarkError::Config`] if the file cannot be read, the TOML is
    /// malformed, or a value fails validation.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            FieldmarkError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string
    pub fn parse(s: &str) -> Result<Self> {
        let config: FieldmarkConfig = toml::from_str(s)
            .map_err(|e| FieldmarkError::Config(format!("Failed to parse TOML: {}", e)))?;
        config.export.validate()?;
        Ok(config)
    }
}

/// Sizes and colors used when burning fields into pages.
///
/// Sizes are PDF points. `screen_scale` is screen pixels per PDF point at the
/// zoom the fields were placed with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub font_size: f64,
    /// RGB components in 0.0..=1.0
    pub text_color: [f64; 3],
    pub fill_color: [f64; 3],
    pub checkbox_size: f64,
    pub radio_radius: f64,
    pub signature_width: f64,
    pub signature_height: f64,
    pub screen_scale: f64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            font_size: 12.0,
            text_color: [0.0, 0.0, 0.0],
            fill_color: [0.0, 0.0, 0.0],
            checkbox_size: 10.0,
            radio_radius: 10.0,
            signature_width: 100.0,
            signature_height: 50.0,
            screen_scale: 1.0,
        }
    }
}

impl ExportConfig {
    pub fn validate(&self) -> Result<()> {
        let sizes = [
            ("font_size", self.font_size),
            ("checkbox_size", self.checkbox_size),
            ("radio_radius", self.radio_radius),
            ("signature_width", self.signature_width),
            ("signature_height", self.signature_height),
            ("screen_scale", self.screen_scale),
        ];
        for (name, value) in sizes {
            if !value.is_finite() || value <= 0.0 {
                return Err(FieldmarkError::Config(format!(
                    "{} must be a positive number, got {}",
                    name, value
                )));
            }
        }
        for (name, color) in [("text_color", self.text_color), ("fill_color", self.fill_color)] {
            if color.iter().any(|c| !(0.0..=1.0).contains(c)) {
                return Err(FieldmarkError::Config(format!(
                    "{} components must be within 0.0..=1.0",
                    name
                )));
            }
        }
        Ok(())
    }
}

/// How the exported file is delivered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub file_name: String,
    pub mime_type: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            file_name: "modified.pdf".to_string(),
            mime_type: crate::PDF_MIME_TYPE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Key the field list is mirrored under
    pub key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            key: DEFAULT_FIELDS_KEY.to_string(),
        }
    }
}
