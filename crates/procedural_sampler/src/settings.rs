// SPDX-License-Identifier: MIT OR Apache-2.0
//! Sampler settings, stored as RON.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Current settings format version
pub const SETTINGS_FORMAT_VERSION: u32 = 1;

/// Deepest refinement level a settings file may request
pub const MAX_REFINEMENT_DEPTH: u32 = 16;

/// Adaptive sampling configuration
///
/// Missing fields take their defaults, so a partial file such as
/// `(error_tolerance: 0.001)` loads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerSettings {
    /// Settings format version
    pub version: u32,
    /// Cells whose error estimate exceeds this are refined
    pub error_tolerance: f64,
    /// Every cell is refined at least this many times
    pub min_depth: u32,
    /// No cell is refined more than this many times
    pub max_depth: u32,
    /// Extra blur added to every evaluation
    pub base_blur: f64,
    /// Worker thread count; `None` uses the rayon default
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threads: Option<usize>,
}

impl Default for SamplerSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_FORMAT_VERSION,
            error_tolerance: 0.01,
            min_depth: 0,
            max_depth: 4,
            base_blur: 0.0,
            threads: None,
        }
    }
}

/// Error loading, saving or validating settings
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// Reading or writing the file failed
    #[error("Settings I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The text is not valid settings RON
    #[error("Invalid settings file: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Serializing failed
    #[error("Failed to write settings: {0}")]
    Serialize(#[from] ron::Error),

    /// Written by a newer version
    #[error("Settings version {found} is newer than supported version {supported}")]
    UnsupportedVersion {
        /// Version in the file
        found: u32,
        /// Newest version this build reads
        supported: u32,
    },

    /// Tolerance is negative or not finite
    #[error("Error tolerance must be a non-negative number, got {0}")]
    InvalidTolerance(f64),

    /// Blur is negative or not finite
    #[error("Base blur must be a non-negative number, got {0}")]
    InvalidBlur(f64),

    /// Depth limits are inconsistent
    #[error("Invalid refinement depth: min {min}, max {max}")]
    InvalidDepth {
        /// Requested minimum depth
        min: u32,
        /// Requested maximum depth
        max: u32,
    },

    /// Zero worker threads requested
    #[error("Thread count must be at least 1 when set")]
    ZeroThreads,
}

impl SamplerSettings {
    /// Check the settings for values the sampler cannot use
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.version > SETTINGS_FORMAT_VERSION {
            return Err(SettingsError::UnsupportedVersion {
                found: self.version,
                supported: SETTINGS_FORMAT_VERSION,
            });
        }
        if !self.error_tolerance.is_finite() || self.error_tolerance < 0.0 {
            return Err(SettingsError::InvalidTolerance(self.error_tolerance));
        }
        if !self.base_blur.is_finite() || self.base_blur < 0.0 {
            return Err(SettingsError::InvalidBlur(self.base_blur));
        }
        if self.min_depth > self.max_depth || self.max_depth > MAX_REFINEMENT_DEPTH {
            return Err(SettingsError::InvalidDepth {
                min: self.min_depth,
                max: self.max_depth,
            });
        }
        if self.threads == Some(0) {
            return Err(SettingsError::ZeroThreads);
        }
        Ok(())
    }

    /// Parse and validate settings from RON text
    pub fn from_ron(text: &str) -> Result<Self, SettingsError> {
        let settings: Self = ron::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Pretty-printed RON text
    pub fn to_ron(&self) -> Result<String, SettingsError> {
        let config = ron::ser::PrettyConfig::default()
            .struct_names(true)
            .enumerate_arrays(false);
        Ok(ron::ser::to_string_pretty(self, config)?)
    }

    /// Load settings from a file
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path)?;
        let settings = Self::from_ron(&content)?;
        tracing::debug!(path = %path.display(), "Loaded sampler settings");
        Ok(settings)
    }

    /// Save settings to a file
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        std::fs::write(path, self.to_ron()?)?;
        tracing::debug!(path = %path.display(), "Saved sampler settings");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = SamplerSettings::default();
        assert_eq!(settings.version, SETTINGS_FORMAT_VERSION);
        assert_eq!(settings.max_depth, 4);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_serialization() {
        let settings = SamplerSettings {
            error_tolerance: 0.125,
            threads: Some(3),
            ..SamplerSettings::default()
        };
        let text = settings.to_ron().unwrap();
        assert!(text.contains("SamplerSettings"));
        assert_eq!(SamplerSettings::from_ron(&text).unwrap(), settings);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let settings = SamplerSettings::from_ron("(max_depth: 6, base_blur: 0.5)").unwrap();
        assert_eq!(settings.max_depth, 6);
        assert_eq!(settings.base_blur, 0.5);
        assert_eq!(settings.error_tolerance, 0.01);
        assert_eq!(settings.threads, None);
    }

    #[test]
    fn test_invalid_settings() {
        assert!(matches!(
            SamplerSettings::from_ron("(min_depth: 5, max_depth: 2)"),
            Err(SettingsError::InvalidDepth { min: 5, max: 2 })
        ));
        assert!(matches!(
            SamplerSettings::from_ron("(error_tolerance: -1.0)"),
            Err(SettingsError::InvalidTolerance(_))
        ));
        assert!(matches!(
            SamplerSettings::from_ron("(threads: Some(0))"),
            Err(SettingsError::ZeroThreads)
        ));
        assert!(matches!(
            SamplerSettings::from_ron("(version: 99)"),
            Err(SettingsError::UnsupportedVersion { found: 99, .. })
        ));
        assert!(matches!(
            SamplerSettings::from_ron("(max_depth: \"deep\")"),
            Err(SettingsError::Parse(_))
        ));
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("sampler-settings-{}.ron", std::process::id()));
        let settings = SamplerSettings {
            min_depth: 1,
            ..SamplerSettings::default()
        };
        settings.save(&path).unwrap();
        let loaded = SamplerSettings::load(&path);
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded.unwrap(), settings);
    }
}
