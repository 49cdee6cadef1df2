//! Planner settings read from an optional JSON file.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::models::Theme;
use crate::themes::{default_themes, load_themes};

fn default_train_penalty() -> f64 {
    2.0
}

fn default_water_penalty() -> f64 {
    3.0
}

fn default_max_factories() -> usize {
    8
}

fn default_search_radius_m() -> f64 {
    500.0
}

fn default_n_results() -> usize {
    3
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Effort per unit of resource brought in by train.
    #[serde(default = "default_train_penalty")]
    pub train_penalty: f64,
    /// Effort per unit of water, local or not.
    #[serde(default = "default_water_penalty")]
    pub water_penalty: f64,
    #[serde(default = "default_max_factories")]
    pub max_factories: usize,
    #[serde(default = "default_search_radius_m")]
    pub search_radius_m: f64,
    #[serde(default = "default_n_results")]
    pub n_results: usize,
    /// Replaces the built-in theme catalog.
    #[serde(default)]
    pub themes_path: Option<PathBuf>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            train_penalty: default_train_penalty(),
            water_penalty: default_water_penalty(),
            max_factories: default_max_factories(),
            search_radius_m: default_search_radius_m(),
            n_results: default_n_results(),
            themes_path: None,
        }
    }
}

impl PlannerConfig {
    /// Read settings from `path`, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = fs::read_to_string(path).with_context(|| format!("Failed to read config {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("Failed to parse config {}", path.display()))
    }

    /// The configured theme catalog.
    pub fn themes(&self) -> anyhow::Result<Vec<Theme>> {
        match &self.themes_path {
            Some(path) => load_themes(path),
            None => Ok(default_themes()?),
        }
    }
}
