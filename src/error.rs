//! Error types for planning operations

use thiserror::Error;

/// Failures raised by the planning core.
///
/// Degenerate numeric input (zero yield, zero rate, no factories) is never an
/// error; those cases produce empty or zero results instead.
#[derive(Error, Debug)]
pub enum PlannerError {
    #[error("no recipe found for {item}")]
    NoRecipe { item: String },

    #[error("recipe cycle detected at {item}: {}", path.join(" -> "))]
    CyclicRecipe { item: String, path: Vec<String> },

    #[error("theme catalog is empty")]
    NoThemes,

    #[error("catalog lookup failed: {0}")]
    Catalog(#[from] rusqlite::Error),

    #[error("invalid theme catalog: {0}")]
    ThemeConfig(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PlannerError>;
