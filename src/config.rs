//! Workspace configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PersistenceError, ValidationError};
use crate::graph::{LayoutConfig, ViewportConfig};

/// Top-level configuration. Every field has a default, so a partial JSON
/// file is enough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DissonanceConfig {
    /// Circular layout of the graph.
    pub layout: LayoutConfig,
    /// Zoom behaviour of the viewport.
    pub viewport: ViewportConfig,
    /// Quiet period before a change is written to the snapshot.
    pub autosave_debounce_ms: u64,
    /// Where the file snapshot lives.
    pub snapshot_path: PathBuf,
}

impl Default for DissonanceConfig {
    fn default() -> Self {
        Self {
            layout: LayoutConfig::default(),
            viewport: ViewportConfig::default(),
            autosave_debounce_ms: 500,
            snapshot_path: PathBuf::from("./dissonance.snapshot"),
        }
    }
}

impl DissonanceConfig {
    /// Upper bound on the debounce delay (one hour).
    const MAX_DEBOUNCE_MS: u64 = 60 * 60 * 1000;

    /// Checks every field.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidConfig` naming the first bad field.
    pub fn validate(self) -> Result<Self, ValidationError> {
        if !(self.layout.radius > 0.0 && self.layout.radius.is_finite()) {
            return Err(ValidationError::InvalidConfig {
                reason: format!("layout.radius must be positive (got {})", self.layout.radius),
            });
        }
        if !(self.layout.center.x.is_finite() && self.layout.center.y.is_finite()) {
            return Err(ValidationError::InvalidConfig {
                reason: "layout.center must be finite".to_string(),
            });
        }
        self.viewport.validate()?;
        if self.autosave_debounce_ms > Self::MAX_DEBOUNCE_MS {
            return Err(ValidationError::InvalidConfig {
                reason: format!(
                    "autosave_debounce_ms must be at most {} (got {})",
                    Self::MAX_DEBOUNCE_MS,
                    self.autosave_debounce_ms
                ),
            });
        }
        if self.snapshot_path.as_os_str().is_empty() {
            return Err(ValidationError::InvalidConfig {
                reason: "snapshot_path cannot be empty".to_string(),
            });
        }
        Ok(self)
    }

    /// The debounce delay as a `Duration`.
    #[must_use]
    pub fn autosave_debounce(&self) -> Duration {
        Duration::from_millis(self.autosave_debounce_ms)
    }

    /// Parses a JSON document.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidConfig` for malformed JSON or an
    /// invalid value.
    pub fn from_json_str(json: &str) -> Result<Self, ValidationError> {
        let config: Self = serde_json::from_str(json).map_err(|e| ValidationError::InvalidConfig {
            reason: e.to_string(),
        })?;
        config.validate()
    }

    /// Reads and parses a JSON file.
    ///
    /// # Errors
    ///
    /// Returns `DissonanceError::Persistence` if the file cannot be read and
    /// `DissonanceError::Validation` if its contents are invalid.
    pub fn from_json_file(path: impl AsRef<Path>) -> crate::DissonanceResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| PersistenceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_json_str(&json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let c = DissonanceConfig::default().validate().unwrap();
        assert!((c.layout.radius - 200.0).abs() < f64::EPSILON);
        assert!((c.viewport.zoom_factor - 1.1).abs() < f64::EPSILON);
        assert_eq!(c.autosave_debounce(), Duration::from_millis(500));
        assert_eq!(c.snapshot_path, PathBuf::from("./dissonance.snapshot"));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let c = DissonanceConfig::from_json_str(r#"{"layout":{"radius":320},"autosave_debounce_ms":50}"#).unwrap();
        assert!((c.layout.radius - 320.0).abs() < f64::EPSILON);
        assert!((c.viewport.max_scale - 5.0).abs() < f64::EPSILON);
        assert_eq!(c.autosave_debounce_ms, 50);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = DissonanceConfig::from_json_str(r#"{"layout":{"radius":0}}"#).unwrap_err();
        assert!(err.to_string().contains("layout.radius"));

        let err = DissonanceConfig::from_json_str(r#"{"viewport":{"min_scale":2,"max_scale":1}}"#).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidConfig { .. }));

        assert!(DissonanceConfig::from_json_str("not json").is_err());
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("dissonance.json");
        std::fs::write(&path, r#"{"snapshot_path":"/tmp/x.snapshot"}"#).unwrap();
        let c = DissonanceConfig::from_json_file(&path).unwrap();
        assert_eq!(c.snapshot_path, PathBuf::from("/tmp/x.snapshot"));

        let missing = DissonanceConfig::from_json_file(dir.path().join("nope.json")).unwrap_err();
        assert!(missing.is_persistence());
    }
}
