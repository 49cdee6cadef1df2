//! Data models for the recipe catalog, production graphs and factory sites

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Recipes whose name carries this prefix are alternates, picked only
/// when no default recipe is available.
pub const ALTERNATE_PREFIX: &str = "Alternate:";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemQuantity {
    pub item: String,
    pub quantity: f64,
}

impl ItemQuantity {
    pub fn new(item: impl Into<String>, quantity: f64) -> Self {
        Self {
            item: item.into(),
            quantity,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Building {
    pub id: String,
    pub name: String,
    pub category: Option<String>,
    pub power_mw: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub name: String,
    pub category: Option<String>,
}

/// A catalog recipe as returned by a lookup, joined with its building.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    pub id: String,
    pub name: String,
    pub duration_s: f64,
    pub building: String,
    pub power_mw: f64,
    pub inputs: Vec<ItemQuantity>,  // per cycle, catalog order
    pub outputs: Vec<ItemQuantity>, // per cycle, catalog order
}

impl Recipe {
    pub fn is_alternate(&self) -> bool {
        self.name.starts_with(ALTERNATE_PREFIX)
    }

    pub fn produces(&self, item: &str) -> bool {
        self.outputs.iter().any(|o| o.item == item)
    }
}

/// Index of a node inside its owning [`RecipeDag`](crate::graph::RecipeDag).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub usize);

/// One production step for one primary item.
#[derive(Debug, Clone, Serialize)]
pub struct RecipeNode {
    pub item: String,
    pub recipe_id: String,
    pub recipe_name: String,
    pub building: String,
    pub power_mw: f64,
    pub duration_s: f64,
    pub outputs: Vec<ItemQuantity>,
    pub inputs: Vec<ItemQuantity>,
    pub children: Vec<NodeId>,
}

impl RecipeNode {
    pub fn from_recipe(item: &str, recipe: &Recipe) -> Self {
        Self {
            item: item.to_string(),
            recipe_id: recipe.id.clone(),
            recipe_name: recipe.name.clone(),
            building: recipe.building.clone(),
            power_mw: recipe.power_mw,
            duration_s: recipe.duration_s,
            outputs: recipe.outputs.clone(),
            inputs: recipe.inputs.clone(),
            children: Vec::new(),
        }
    }

    /// Per-minute rate of a per-cycle quantity at one building, 100% clock.
    pub fn per_minute(&self, quantity: f64) -> f64 {
        if self.duration_s > 0.0 {
            quantity / self.duration_s * 60.0
        } else {
            0.0
        }
    }

    /// Primary output per minute at one building, 100% clock.
    pub fn output_per_min(&self) -> f64 {
        let quantity = self
            .outputs
            .iter()
            .filter(|o| o.item == self.item)
            .map(|o| o.quantity)
            .sum();
        self.per_minute(quantity)
    }

    pub fn inputs_per_min(&self) -> impl Iterator<Item = (&str, f64)> {
        self.inputs
            .iter()
            .map(|i| (i.item.as_str(), self.per_minute(i.quantity)))
    }

    pub fn outputs_per_min(&self) -> impl Iterator<Item = (&str, f64)> {
        self.outputs
            .iter()
            .map(|o| (o.item.as_str(), self.per_minute(o.quantity)))
    }
}

/// A named resource-affinity cluster, meant to become one factory site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Theme {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub primary_resources: BTreeSet<String>,
}

impl Theme {
    pub fn owns(&self, resource: &str) -> bool {
        self.primary_resources.contains(resource)
    }
}

/// A theme, the DAG items placed in it and the raw demand it owns
/// (per unit/min of the target item).
#[derive(Debug, Clone, Serialize)]
pub struct ThemeAssignment {
    pub theme: Theme,
    pub recipes: Vec<String>,
    pub raw_demands: BTreeMap<String, f64>,
}

impl ThemeAssignment {
    pub fn total_demand(&self) -> f64 {
        self.raw_demands.values().sum()
    }

    /// Moves another assignment's recipes and demand into this one.
    pub fn absorb(&mut self, other: ThemeAssignment) {
        self.recipes.extend(other.recipes);
        for (resource, demand) in other.raw_demands {
            *self.raw_demands.entry(resource).or_default() += demand;
        }
    }
}

/// Allocator input: one candidate factory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Factory {
    pub theme_id: String,
    pub demands_per_unit: BTreeMap<String, f64>,
    #[serde(default)]
    pub local_capacity: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub theme_id: String,
    pub allocated_rate: f64,
    pub effort: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Purity {
    Impure,
    Normal,
    Pure,
}

impl Purity {
    pub fn weight(self) -> f64 {
        match self {
            Purity::Impure => 1.0,
            Purity::Normal => 2.0,
            Purity::Pure => 4.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Purity::Impure => "impure",
            Purity::Normal => "normal",
            Purity::Pure => "pure",
        }
    }
}

impl std::str::FromStr for Purity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "impure" => Ok(Purity::Impure),
            "normal" => Ok(Purity::Normal),
            "pure" => Ok(Purity::Pure),
            other => Err(format!("unknown purity '{}'", other)),
        }
    }
}

/// A resource node on the world map. Coordinates are game units (cm).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceNode {
    #[serde(rename = "type")]
    pub node_type: String,
    pub purity: Purity,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ingot_recipe() -> Recipe {
        Recipe {
            id: "Recipe_IngotIron_C".to_string(),
            name: "Iron Ingot".to_string(),
            duration_s: 2.0,
            building: "Smelter".to_string(),
            power_mw: 4.0,
            inputs: vec![ItemQuantity::new("Iron Ore", 1.0)],
            outputs: vec![ItemQuantity::new("Iron Ingot", 1.0)],
        }
    }

    #[test]
    fn output_rate_uses_primary_item_only() {
        let mut recipe = ingot_recipe();
        recipe.outputs.push(ItemQuantity::new("Slag", 5.0));
        let node = RecipeNode::from_recipe("Iron Ingot", &recipe);
        assert_eq!(node.output_per_min(), 30.0);
        let outputs: Vec<_> = node.outputs_per_min().collect();
        assert_eq!(outputs, vec![("Iron Ingot", 30.0), ("Slag", 150.0)]);
    }

    #[test]
    fn zero_duration_yields_zero_rate() {
        let mut recipe = ingot_recipe();
        recipe.duration_s = 0.0;
        let node = RecipeNode::from_recipe("Iron Ingot", &recipe);
        assert_eq!(node.output_per_min(), 0.0);
    }

    #[test]
    fn alternate_detection() {
        let mut recipe = ingot_recipe();
        assert!(!recipe.is_alternate());
        recipe.name = "Alternate: Pure Iron Ingot".to_string();
        assert!(recipe.is_alternate());
    }

    #[test]
    fn absorb_merges_demand_additively() {
        let theme = Theme {
            id: "a".to_string(),
            name: String::new(),
            description: String::new(),
            primary_resources: BTreeSet::new(),
        };
        let mut a = ThemeAssignment {
            theme: theme.clone(),
            recipes: vec!["Iron Plate".to_string()],
            raw_demands: BTreeMap::from([("Iron Ore".to_string(), 2.0)]),
        };
        let b = ThemeAssignment {
            theme,
            recipes: vec!["Concrete".to_string()],
            raw_demands: BTreeMap::from([
                ("Iron Ore".to_string(), 1.0),
                ("Limestone".to_string(), 3.0),
            ]),
        };
        a.absorb(b);
        assert_eq!(a.recipes, vec!["Iron Plate", "Concrete"]);
        assert_eq!(a.raw_demands["Iron Ore"], 3.0);
        assert_eq!(a.total_demand(), 6.0);
    }
}
