use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::models::FilterField;
use crate::repository::ReviewRepository;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub dashboard: DashboardConfig,
}

/// Where the review service lives
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub base_url: String,
    /// Per-request timeout; the only timeout in the system
    pub timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Filter and sort the dashboard starts with
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub sort_by: String,
    pub property: Option<String>,
    pub channel: Option<String>,
    pub rating: Option<String>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            sort_by: "date".to_string(),
            property: None,
            channel: None,
            rating: None,
        }
    }
}

impl DashboardConfig {
    /// Apply the configured filters and sort key to a repository
    pub fn apply(&self, repository: &mut ReviewRepository) {
        repository.set_sort_key(&self.sort_by);

        let filters = [
            (FilterField::Property, &self.property),
            (FilterField::Channel, &self.channel),
            (FilterField::Rating, &self.rating),
        ];
        for (field, value) in filters {
            if let Some(value) = value {
                repository.set_filter_field(field, value);
            }
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            info!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        info!(path = %path.display(), "Loaded configuration");

        Ok(config)
    }

    /// Load configuration from the default location (.guest-reviews/config.yml)
    pub fn load_default() -> Result<Self> {
        Self::load(".guest-reviews/config.yml")
    }
}
