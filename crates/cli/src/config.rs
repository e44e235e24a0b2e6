#![forbid(unsafe_code)]

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub(crate) const DEFAULT_STORAGE_DIRNAME: &str = ".solar-timeline";
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_MATERIAL_LEAD_TIME_HOURS: i64 = 48;
const DEFAULT_LOG: &str = "warn";

/// One source of settings. Unset keys fall through to the layer below.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct ConfigLayer {
    pub storage_dir: Option<PathBuf>,
    pub busy_timeout_ms: Option<u64>,
    pub material_lead_time_hours: Option<i64>,
    pub log: Option<String>,
}

impl ConfigLayer {
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&raw).with_context(|| format!("parse config {}", path.display()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct CliConfig {
    pub storage_dir: PathBuf,
    pub busy_timeout: std::time::Duration,
    pub material_lead_time: time::Duration,
    pub log: String,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from(DEFAULT_STORAGE_DIRNAME),
            busy_timeout: std::time::Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
            material_lead_time: time::Duration::hours(DEFAULT_MATERIAL_LEAD_TIME_HOURS),
            log: DEFAULT_LOG.to_string(),
        }
    }
}

impl CliConfig {
    /// Defaults, then the optional YAML file, then `overrides` (environment and flags,
    /// already merged by clap with flags winning).
    pub fn resolve(file: Option<&Path>, overrides: &ConfigLayer) -> Result<Self> {
        let mut config = Self::default();
        if let Some(path) = file {
            config.apply(&ConfigLayer::from_yaml_file(path)?)?;
        }
        config.apply(overrides)?;
        Ok(config)
    }

    fn apply(&mut self, layer: &ConfigLayer) -> Result<()> {
        if let Some(dir) = &layer.storage_dir {
            if dir.as_os_str().is_empty() {
                bail!("storage_dir must not be empty");
            }
            self.storage_dir = dir.clone();
        }
        if let Some(ms) = layer.busy_timeout_ms {
            self.busy_timeout = std::time::Duration::from_millis(ms);
        }
        if let Some(hours) = layer.material_lead_time_hours {
            if hours < 0 {
                bail!("material_lead_time_hours must not be negative (got {hours})");
            }
            self.material_lead_time = time::Duration::hours(hours);
        }
        if let Some(log) = &layer.log {
            let log = log.trim();
            if !log.is_empty() {
                self.log = log.to_string();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("solar-timeline.yaml");
        std::fs::write(&path, body).expect("write config");
        path
    }

    #[test]
    fn defaults_apply_without_sources() {
        let config = CliConfig::resolve(None, &ConfigLayer::default()).expect("resolve");
        assert_eq!(config, CliConfig::default());
        assert_eq!(config.storage_dir, PathBuf::from(".solar-timeline"));
        assert_eq!(config.busy_timeout, std::time::Duration::from_secs(5));
        assert_eq!(config.material_lead_time, time::Duration::hours(48));
        assert_eq!(config.log, "warn");
    }

    #[test]
    fn file_values_sit_between_defaults_and_overrides() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = write_config(
            &dir,
            "storage_dir: /var/lib/solar\nmaterial_lead_time_hours: 72\nlog: info\n",
        );
        let overrides = ConfigLayer {
            log: Some("debug".to_string()),
            ..ConfigLayer::default()
        };

        let config = CliConfig::resolve(Some(&path), &overrides).expect("resolve");
        assert_eq!(config.storage_dir, PathBuf::from("/var/lib/solar"));
        assert_eq!(config.material_lead_time, time::Duration::hours(72));
        assert_eq!(config.busy_timeout, std::time::Duration::from_secs(5));
        assert_eq!(config.log, "debug");
    }

    #[test]
    fn empty_file_is_allowed() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = write_config(&dir, "\n");
        let config = CliConfig::resolve(Some(&path), &ConfigLayer::default()).expect("resolve");
        assert_eq!(config, CliConfig::default());
    }

    #[test]
    fn unknown_keys_and_bad_values_are_rejected() {
        let dir = tempfile::tempdir().expect("temp dir");
        let typo = write_config(&dir, "storage_directory: /tmp\n");
        assert!(CliConfig::resolve(Some(&typo), &ConfigLayer::default()).is_err());

        let negative = ConfigLayer {
            material_lead_time_hours: Some(-1),
            ..ConfigLayer::default()
        };
        assert!(CliConfig::resolve(None, &negative).is_err());
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = CliConfig::resolve(
            Some(Path::new("/nonexistent/solar-timeline.yaml")),
            &ConfigLayer::default(),
        )
        .expect_err("missing file");
        assert!(format!("{err:#}").contains("/nonexistent/solar-timeline.yaml"));
    }
}
