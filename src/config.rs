// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Configuration for k8s-explorer
//!
//! Read once at startup; command line flags override individual values.
//! All k8s-explorer data is stored under ~/.k8s-explorer/:
//! - ~/.k8s-explorer/config.json - configuration
//! - ~/.k8s-explorer/log/ - rotated log files
//! - ~/.k8s-explorer/history - REPL command history

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::kubernetes::{CacheSettings, DEFAULT_SKIP_RESOURCES};
use crate::progress::ProgressSettings;

/// Get the base k8s-explorer directory (~/.k8s-explorer/)
pub fn base_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|p| p.join(".k8s-explorer"))
        .context("Could not determine home directory")
}

fn default_ttl_secs() -> u64 {
    300
}

fn default_count_timeout_secs() -> u64 {
    3
}

fn default_count_page_size() -> u32 {
    1
}

fn default_count_concurrency() -> usize {
    8
}

fn default_skip_resources() -> Vec<String> {
    DEFAULT_SKIP_RESOURCES.iter().map(|s| s.to_string()).collect()
}

fn default_expected_denial_codes() -> Vec<u16> {
    vec![403, 405]
}

fn default_progress_every() -> usize {
    10
}

fn default_progress_buffer() -> usize {
    100
}

/// k8s-explorer configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Lifetime of the resource type catalog
    #[serde(default = "default_ttl_secs")]
    pub catalog_ttl_secs: u64,

    /// Lifetime of one namespace's counted resources
    #[serde(default = "default_ttl_secs")]
    pub namespace_ttl_secs: u64,

    /// Time budget for counting one resource type
    #[serde(default = "default_count_timeout_secs")]
    pub count_timeout_secs: u64,

    /// Items requested by the first count page
    #[serde(default = "default_count_page_size")]
    pub count_page_size: u32,

    /// Resource types counted concurrently within one scan
    #[serde(default = "default_count_concurrency")]
    pub count_concurrency: usize,

    /// Resource names never counted
    #[serde(default = "default_skip_resources")]
    pub skip_resources: Vec<String>,

    /// HTTP status codes that mean "not listable here" and count as zero
    #[serde(default = "default_expected_denial_codes")]
    pub expected_denial_codes: Vec<u16>,

    #[serde(default)]
    pub verbose_progress: bool,

    #[serde(default = "default_progress_every")]
    pub progress_every: usize,

    #[serde(default = "default_progress_buffer")]
    pub progress_buffer: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            catalog_ttl_secs: default_ttl_secs(),
            namespace_ttl_secs: default_ttl_secs(),
            count_timeout_secs: default_count_timeout_secs(),
            count_page_size: default_count_page_size(),
            count_concurrency: default_count_concurrency(),
            skip_resources: default_skip_resources(),
            expected_denial_codes: default_expected_denial_codes(),
            verbose_progress: false,
            progress_every: default_progress_every(),
            progress_buffer: default_progress_buffer(),
        }
    }
}

impl Config {
    /// Load config from disk, or return default if not found
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Save config to disk
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Write atomically: temp file in the same directory, then rename
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;

        let temp_file = tempfile::NamedTempFile::new_in(parent).context("Failed to create temp file")?;
        fs::write(temp_file.path(), content)
            .with_context(|| format!("Failed to write temp file {:?}", temp_file.path()))?;
        temp_file
            .persist(path)
            .with_context(|| format!("Failed to persist config to {}", path.display()))?;

        Ok(())
    }

    /// Get the config file path (~/.k8s-explorer/config.json)
    pub fn config_path() -> Result<PathBuf> {
        Ok(base_dir()?.join("config.json"))
    }

    pub fn catalog_ttl(&self) -> Duration {
        Duration::from_secs(self.catalog_ttl_secs)
    }

    pub fn namespace_ttl(&self) -> Duration {
        Duration::from_secs(self.namespace_ttl_secs)
    }

    pub fn count_timeout(&self) -> Duration {
        Duration::from_secs(self.count_timeout_secs)
    }

    pub fn progress_settings(&self) -> ProgressSettings {
        ProgressSettings {
            verbose: self.verbose_progress,
            every: self.progress_every,
            buffer: self.progress_buffer.max(1),
        }
    }

    pub fn cache_settings(&self) -> CacheSettings {
        CacheSettings {
            ttl: self.namespace_ttl(),
            skip_resources: self.skip_resources.iter().cloned().collect(),
            concurrency: self.count_concurrency.max(1),
            progress: self.progress_settings(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.catalog_ttl(), Duration::from_secs(300));
        assert_eq!(config.namespace_ttl(), Duration::from_secs(300));
        assert_eq!(config.count_timeout(), Duration::from_secs(3));
        assert_eq!(config.count_page_size, 1);
        assert_eq!(config.expected_denial_codes, vec![403, 405]);
        assert!(config.skip_resources.contains(&"tokenrequests".to_string()));
        assert_eq!(config.skip_resources.len(), 7);
        assert!(!config.verbose_progress);
    }

    #[test]
    fn test_config_deserialize_empty() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_config_deserialize_partial() {
        let json = r#"{"namespace_ttl_secs": 60, "skip_resources": ["events"]}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.namespace_ttl(), Duration::from_secs(60));
        assert_eq!(config.catalog_ttl(), Duration::from_secs(300));
        assert_eq!(config.skip_resources, vec!["events"]);
    }

    #[test]
    fn test_cache_settings() {
        let config = Config {
            count_concurrency: 0,
            verbose_progress: true,
            ..Default::default()
        };
        let settings = config.cache_settings();
        assert_eq!(settings.concurrency, 1);
        assert!(settings.progress.verbose);
        assert!(settings.skip_resources.contains("bindings"));
    }

    #[test]
    fn test_config_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.json");

        let config = Config {
            count_timeout_secs: 5,
            expected_denial_codes: vec![403],
            ..Default::default()
        };
        config.save_to(&config_path).unwrap();

        let loaded = Config::load_from(&config_path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_file_gives_default() {
        let temp_dir = TempDir::new().unwrap();
        let loaded = Config::load_from(&temp_dir.path().join("absent.json")).unwrap();
        assert_eq!(loaded, Config::default());
    }

    #[test]
    fn test_load_invalid_file_fails() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        fs::write(&path, "not json").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
