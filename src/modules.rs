//! Repeatable factory modules
//!
//! A module is one terminal building at 100% clock plus the upstream it
//! needs. A full plan is stamped out of `copies` identical modules.

use serde::Serialize;

use crate::calculator::Plan;
use crate::graph::RecipeDag;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleBuilding {
    pub item: String,
    pub recipe: String,
    pub building: String,
    pub count_exact: f64,
    pub count: u32,
    pub power_mw: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Module {
    pub rate_per_module: f64,
    pub copies: u32,
    pub copies_exact: f64,
    pub buildings_per_module: u32,
    /// Plan power divided by copies, not re-derived from the clock curve.
    pub power_per_module: f64,
    pub buildings: Vec<ModuleBuilding>,
}

/// Reduce a plan to its smallest repeatable unit.
///
/// A root with no output gives an all-zero module.
pub fn compute_modules(dag: &RecipeDag, plan: &Plan) -> Module {
    let rate_per_module = dag.root().output_per_min();
    if rate_per_module <= 0.0 {
        return Module::default();
    }

    let copies_exact = plan.target_rate / rate_per_module;
    let copies = copies_exact.ceil().max(0.0) as u32;
    let share = |value: f64| if copies_exact > 0.0 { value / copies_exact } else { 0.0 };

    let buildings: Vec<ModuleBuilding> = plan
        .buildings
        .iter()
        .map(|b| {
            let count_exact = share(b.count_exact);
            ModuleBuilding {
                item: b.item.clone(),
                recipe: b.recipe.clone(),
                building: b.building.clone(),
                count_exact,
                count: count_exact.ceil() as u32,
                power_mw: share(b.power_mw),
            }
        })
        .collect();

    Module {
        rate_per_module,
        copies,
        copies_exact,
        buildings_per_module: buildings.iter().map(|b| b.count).sum(),
        power_per_module: buildings.iter().map(|b| b.power_mw).sum(),
        buildings,
    }
}

impl std::fmt::Display for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Module ===")?;
        writeln!(
            f,
            "{:.2}/min per module x {} copies ({:.2} exact)",
            self.rate_per_module, self.copies, self.copies_exact
        )?;
        for b in &self.buildings {
            writeln!(f, "  {:>3}x {:<16} {} ({:.2} exact)", b.count, b.building, b.item, b.count_exact)?;
        }
        writeln!(f, "Buildings per module: {}", self.buildings_per_module)?;
        writeln!(f, "Power per module:     {:.1} MW", self.power_per_module)?;
        Ok(())
    }
}
