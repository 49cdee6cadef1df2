//! Factory Planner
//!
//! Plans Satisfactory production for a target item: resolves the recipe
//! graph, sizes every production step, groups the chain into resource
//! themes, scores factory sites on the map and splits the target rate
//! across factories so that no site works much harder than another.
//!
//! The catalog lives in SQLite ([`db`]) and is filled either from game-data
//! exports ([`extract`]) or the built-in sample set ([`sample`]).

pub mod allocator;
pub mod calculator;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod graph;
pub mod locations;
pub mod logging;
pub mod models;
pub mod modules;
pub mod planner;
pub mod resources;
pub mod sample;
pub mod themes;

pub use error::{PlannerError, Result};
