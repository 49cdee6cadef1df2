//! Theme catalog and theme assignment
//!
//! Every graph node is placed in the theme owning the rarest raw resource
//! its upstream consumes. Themes that carry almost none of the target's raw
//! demand are folded into bigger ones, and the total is capped at the number
//! of factories the player is willing to build.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::Path;

use anyhow::Context;
use tracing::debug;

use crate::error::{PlannerError, Result};
use crate::graph::RecipeDag;
use crate::models::{NodeId, Theme, ThemeAssignment};
use crate::resources::{WATER, is_raw, node_count};

const DEFAULT_THEMES: &str = include_str!("../data/themes.json");

/// Theme used for nodes whose rarest resource no theme owns.
pub const FALLBACK_THEME: &str = "iron-works";

/// Themes holding less than this share of total raw demand get merged away.
pub const MATERIALITY_SHARE: f64 = 0.05;

/// The theme catalog compiled into the binary.
pub fn default_themes() -> Result<Vec<Theme>> {
    parse_themes(DEFAULT_THEMES)
}

pub fn parse_themes(json: &str) -> Result<Vec<Theme>> {
    Ok(serde_json::from_str(json)?)
}

/// Load a theme catalog from a JSON file
pub fn load_themes(path: &Path) -> anyhow::Result<Vec<Theme>> {
    let content = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    parse_themes(&content).with_context(|| format!("Failed to parse themes from {}", path.display()))
}

/// The first theme owning `resource`.
pub fn theme_for_resource<'t>(resource: &str, themes: &'t [Theme]) -> Option<&'t Theme> {
    themes.iter().find(|t| t.owns(resource))
}

/// Rarest non-water resource of a footprint; ties keep the first in key order.
pub fn rarest_resource(footprint: &BTreeMap<String, f64>) -> Option<&str> {
    let mut rarest: Option<(&str, u32)> = None;
    for resource in footprint.keys() {
        if resource == WATER {
            continue;
        }
        let count = node_count(resource);
        if rarest.is_none_or(|(_, best)| count < best) {
            rarest = Some((resource.as_str(), count));
        }
    }
    rarest.map(|(resource, _)| resource)
}

/// Per-unit raw demand of each node's upstream, memoized per node.
struct Footprints<'a> {
    dag: &'a RecipeDag,
    memo: HashMap<NodeId, BTreeMap<String, f64>>,
    path: HashSet<NodeId>,
}

impl<'a> Footprints<'a> {
    fn new(dag: &'a RecipeDag) -> Self {
        Self {
            dag,
            memo: HashMap::new(),
            path: HashSet::new(),
        }
    }

    /// Raw demand for one unit/min of the node's primary output.
    fn of(&mut self, id: NodeId) -> BTreeMap<String, f64> {
        if let Some(known) = self.memo.get(&id) {
            return known.clone();
        }
        // Already on the current path: contributes nothing.
        if !self.path.insert(id) {
            return BTreeMap::new();
        }

        let dag = self.dag;
        let node = dag.node(id);
        let output = node.output_per_min();
        let scale = if output > 0.0 { 1.0 / output } else { 0.0 };

        let mut demands: BTreeMap<String, f64> = BTreeMap::new();
        for (input, per_min) in node.inputs_per_min() {
            let rate = per_min * scale;
            if is_raw(input) {
                *demands.entry(input.to_string()).or_default() += rate;
            } else if let Some(child) = dag.child_for(id, input) {
                for (resource, per_unit) in self.of(child) {
                    *demands.entry(resource).or_default() += per_unit * rate;
                }
            }
        }

        self.path.remove(&id);
        self.memo.insert(id, demands.clone());
        demands
    }
}

fn largest_index(groups: &[ThemeAssignment], skip: usize) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, group) in groups.iter().enumerate() {
        if i == skip {
            continue;
        }
        let demand = group.total_demand();
        if best.is_none_or(|(_, d)| demand > d) {
            best = Some((i, demand));
        }
    }
    best.map(|(i, _)| i)
}

/// Fold themes below the materiality share into the largest remaining theme
/// until none is left below it or a single theme remains.
fn merge_immaterial(groups: &mut Vec<ThemeAssignment>, total_demand: f64) {
    if total_demand <= 0.0 {
        return;
    }
    while groups.len() > 1 {
        let smallest = groups
            .iter()
            .enumerate()
            .filter(|(_, g)| g.total_demand() / total_demand < MATERIALITY_SHARE)
            .min_by(|a, b| a.1.total_demand().total_cmp(&b.1.total_demand()))
            .map(|(i, _)| i);
        let Some(smallest) = smallest else {
            break;
        };
        let Some(mut target) = largest_index(groups, smallest) else {
            break;
        };

        let absorbed = groups.remove(smallest);
        if target > smallest {
            target -= 1;
        }
        debug!(from = %absorbed.theme.id, into = %groups[target].theme.id, "merged immaterial theme");
        groups[target].absorb(absorbed);
    }
}

/// Partition the graph's nodes into at most `max_factories` themes, largest
/// raw demand first. `max_factories` of 0 counts as 1.
pub fn assign_themes(dag: &RecipeDag, themes: &[Theme], max_factories: usize) -> Result<Vec<ThemeAssignment>> {
    let fallback = themes
        .iter()
        .find(|t| t.id == FALLBACK_THEME)
        .or_else(|| themes.first())
        .ok_or(PlannerError::NoThemes)?;

    let mut footprints = Footprints::new(dag);
    let mut groups: Vec<ThemeAssignment> = Vec::new();
    for id in dag.ids() {
        let footprint = footprints.of(id);
        let theme = rarest_resource(&footprint)
            .and_then(|resource| theme_for_resource(resource, themes))
            .unwrap_or(fallback);
        let item = dag.node(id).item.clone();
        debug!(item = %item, theme = %theme.id, "assigned theme");

        match groups.iter_mut().find(|g| g.theme.id == theme.id) {
            Some(group) => group.recipes.push(item),
            None => groups.push(ThemeAssignment {
                theme: theme.clone(),
                recipes: vec![item],
                raw_demands: BTreeMap::new(),
            }),
        }
    }

    let root_demands = footprints.of(dag.root_id());
    for (resource, demand) in &root_demands {
        let Some(owner) = theme_for_resource(resource, themes) else {
            continue;
        };
        if let Some(group) = groups.iter_mut().find(|g| g.theme.id == owner.id) {
            group.raw_demands.insert(resource.clone(), *demand);
        }
    }

    let total_demand: f64 = root_demands.values().sum();
    merge_immaterial(&mut groups, total_demand);

    groups.sort_by(|a, b| b.total_demand().total_cmp(&a.total_demand()));
    let cap = max_factories.max(1);
    if groups.len() > cap {
        let excess = groups.split_off(cap);
        if let Some(last) = groups.last_mut() {
            for group in excess {
                debug!(from = %group.theme.id, into = %last.theme.id, "folded theme past factory cap");
                last.absorb(group);
            }
        }
    }

    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryCatalog;
    use crate::graph::build_graph;
    use crate::models::{ItemQuantity, Recipe};

    fn recipe(name: &str, duration: f64, inputs: &[(&str, f64)]) -> Recipe {
        Recipe {
            id: name.to_string(),
            name: name.to_string(),
            duration_s: duration,
            building: "Constructor".to_string(),
            power_mw: 4.0,
            inputs: inputs.iter().map(|(i, q)| ItemQuantity::new(*i, *q)).collect(),
            outputs: vec![ItemQuantity::new(name, 1.0)],
        }
    }

    fn smelting() -> Vec<Recipe> {
        vec![
            recipe("Iron Ingot", 60.0, &[("Iron Ore", 1.0)]),
            recipe("Copper Ingot", 60.0, &[("Copper Ore", 1.0)]),
            recipe("Coal Brick", 60.0, &[("Coal", 1.0)]),
            recipe("Concrete", 60.0, &[("Limestone", 1.0)]),
        ]
    }

    fn dag_for(target: Recipe) -> RecipeDag {
        let mut recipes = smelting();
        let name = target.name.clone();
        recipes.push(target);
        build_graph(&MemoryCatalog::new(recipes), &name, &[]).unwrap()
    }

    fn ids(assignments: &[ThemeAssignment]) -> Vec<&str> {
        assignments.iter().map(|a| a.theme.id.as_str()).collect()
    }

    #[test]
    fn default_catalog_starts_with_iron_works() {
        let themes = default_themes().unwrap();
        assert!(themes.len() >= 8);
        assert_eq!(themes[0].id, FALLBACK_THEME);
        assert!(themes[0].owns("Iron Ore"));
    }

    #[test]
    fn bad_theme_json_is_config_error() {
        assert!(matches!(parse_themes("{not json"), Err(PlannerError::ThemeConfig(_))));
    }

    #[test]
    fn rarest_skips_water() {
        let footprint = BTreeMap::from([
            ("Water".to_string(), 100.0),
            ("Iron Ore".to_string(), 1.0),
            ("Coal".to_string(), 1.0),
        ]);
        assert_eq!(rarest_resource(&footprint), Some("Coal"));
        let only_water = BTreeMap::from([("Water".to_string(), 1.0)]);
        assert_eq!(rarest_resource(&only_water), None);
    }

    #[test]
    fn iron_chain_is_one_iron_theme() {
        let dag = dag_for(recipe("Iron Plate", 60.0, &[("Iron Ingot", 2.0)]));
        let assignments = assign_themes(&dag, &default_themes().unwrap(), 8).unwrap();
        assert_eq!(ids(&assignments), vec!["iron-works"]);
        assert_eq!(assignments[0].recipes, vec!["Iron Plate", "Iron Ingot"]);
        assert!((assignments[0].raw_demands["Iron Ore"] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn footprint_composes_through_children() {
        let dag = dag_for(recipe("Beam", 30.0, &[("Iron Ingot", 3.0), ("Coal Brick", 1.0)]));
        let mut footprints = Footprints::new(&dag);
        let root = footprints.of(dag.root_id());
        // 2 beams/min need 6 ingots and 2 bricks
        assert!((root["Iron Ore"] - 3.0).abs() < 1e-12);
        assert!((root["Coal"] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn immaterial_theme_merges_into_largest() {
        let dag = dag_for(recipe("Frame", 60.0, &[("Iron Ingot", 50.0), ("Copper Ingot", 1.0)]));
        let assignments = assign_themes(&dag, &default_themes().unwrap(), 8).unwrap();
        assert_eq!(ids(&assignments), vec!["iron-works"]);
        let merged = &assignments[0];
        assert_eq!(merged.recipes.len(), 3);
        assert!(merged.recipes.contains(&"Frame".to_string()));
        assert!((merged.raw_demands["Copper Ore"] - 1.0).abs() < 1e-12);
        assert!((merged.total_demand() - 51.0).abs() < 1e-12);
    }

    #[test]
    fn no_theme_left_below_threshold() {
        let dag = dag_for(recipe(
            "Widget",
            60.0,
            &[("Iron Ingot", 80.0), ("Copper Ingot", 3.0), ("Coal Brick", 3.0), ("Concrete", 14.0)],
        ));
        let assignments = assign_themes(&dag, &default_themes().unwrap(), 8).unwrap();
        let total: f64 = assignments.iter().map(|a| a.total_demand()).sum();
        assert!(assignments.len() > 1);
        for a in &assignments {
            assert!(a.total_demand() / total >= MATERIALITY_SHARE);
        }
    }

    #[test]
    fn cap_folds_excess_into_last_kept() {
        let dag = dag_for(recipe(
            "Widget",
            60.0,
            &[("Iron Ingot", 40.0), ("Copper Ingot", 30.0), ("Coal Brick", 20.0), ("Concrete", 10.0)],
        ));
        let themes = default_themes().unwrap();

        let all = assign_themes(&dag, &themes, 8).unwrap();
        assert_eq!(ids(&all), vec!["iron-works", "copper-foundry", "coal-forge", "concrete-quarry"]);
        assert_eq!(all[2].recipes, vec!["Widget", "Coal Brick"]);

        let capped = assign_themes(&dag, &themes, 2).unwrap();
        assert_eq!(ids(&capped), vec!["iron-works", "copper-foundry"]);
        assert!((capped[1].total_demand() - 60.0).abs() < 1e-9);
        assert_eq!(capped[1].recipes, vec!["Copper Ingot", "Widget", "Coal Brick", "Concrete"]);

        assert_eq!(assign_themes(&dag, &themes, 0).unwrap().len(), 1);
    }

    #[test]
    fn unowned_rarest_resource_falls_back() {
        let dag = dag_for(recipe("Ice", 60.0, &[("Water", 1.0)]));
        let assignments = assign_themes(&dag, &default_themes().unwrap(), 8).unwrap();
        assert_eq!(ids(&assignments), vec!["iron-works"]);
        assert!(assignments[0].raw_demands.is_empty());

        let themes = vec![Theme {
            id: "coal-forge".to_string(),
            name: String::new(),
            description: String::new(),
            primary_resources: ["Coal".to_string()].into(),
        }];
        let assignments = assign_themes(&dag, &themes, 8).unwrap();
        assert_eq!(ids(&assignments), vec!["coal-forge"]);
    }

    #[test]
    fn empty_catalog_is_an_error() {
        let dag = dag_for(recipe("Iron Plate", 60.0, &[("Iron Ingot", 2.0)]));
        assert!(matches!(assign_themes(&dag, &[], 8), Err(PlannerError::NoThemes)));
    }
}
