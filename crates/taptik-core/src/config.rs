use crate::context::CONTEXT_VERSION;
use crate::error::Result;
use crate::mapping::MergeStrategy;
use crate::paths;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// ConversionConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionConfig {
    #[serde(default)]
    pub merge_strategy: MergeStrategy,
    #[serde(default = "default_validate_integrity")]
    pub validate_integrity: bool,
    /// Minimum compatibility score (0-100) for a conversion to count as compatible.
    #[serde(default = "default_threshold")]
    pub compatibility_threshold: u32,
}

fn default_validate_integrity() -> bool {
    true
}

pub const DEFAULT_COMPATIBILITY_THRESHOLD: u32 = 60;

fn default_threshold() -> u32 {
    DEFAULT_COMPATIBILITY_THRESHOLD
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            merge_strategy: MergeStrategy::default(),
            validate_integrity: default_validate_integrity(),
            compatibility_threshold: default_threshold(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    /// Version stamped on every context produced by `normalize`.
    #[serde(default = "default_context_version")]
    pub context_version: String,
    #[serde(default)]
    pub conversion: ConversionConfig,
}

fn default_version() -> u32 {
    1
}

fn default_context_version() -> String {
    CONTEXT_VERSION.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            context_version: default_context_version(),
            conversion: ConversionConfig::default(),
        }
    }
}

static SEMVER_RE: OnceLock<Regex> = OnceLock::new();

fn semver_re() -> &'static Regex {
    SEMVER_RE.get_or_init(|| {
        Regex::new(r"^\d+\.\d+\.\d+(?:-[0-9A-Za-z.-]+)?(?:\+[0-9A-Za-z.-]+)?$").unwrap()
    })
}

impl Config {
    /// Load `.taptik/config.yaml`, falling back to defaults when it is absent.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.conversion.compatibility_threshold > 100 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!(
                    "conversion.compatibility_threshold={} is above 100; no conversion can pass",
                    self.conversion.compatibility_threshold
                ),
            });
        }

        if !semver_re().is_match(&self.context_version) {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "context_version '{}' is not a semver string",
                    self.context_version
                ),
            });
        }

        if self.version != 1 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!("unknown config version {}", self.version),
            });
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let cfg = Config::load(dir.path()).unwrap();
        assert_eq!(cfg.context_version, "1.0.0");
        assert_eq!(cfg.conversion.compatibility_threshold, 60);
        assert!(cfg.conversion.validate_integrity);
        assert_eq!(cfg.conversion.merge_strategy, MergeStrategy::Replace);
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let yaml = "conversion:\n  merge_strategy: append\n";
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.conversion.merge_strategy, MergeStrategy::Append);
        assert_eq!(cfg.conversion.compatibility_threshold, 60);
        assert_eq!(cfg.version, 1);
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let mut cfg = Config::default();
        cfg.conversion.compatibility_threshold = 75;
        cfg.save(dir.path()).unwrap();
        let loaded = Config::load(dir.path()).unwrap();
        assert_eq!(loaded.conversion.compatibility_threshold, 75);
    }

    #[test]
    fn validate_flags_bad_values() {
        let mut cfg = Config::default();
        assert!(cfg.validate().is_empty());

        cfg.conversion.compatibility_threshold = 140;
        cfg.context_version = "v1".to_string();
        let warnings = cfg.validate();
        assert_eq!(warnings.len(), 2);
        assert!(warnings.iter().any(|w| w.level == WarnLevel::Error));
        assert!(warnings.iter().any(|w| w.message.contains("semver")));
    }
}
