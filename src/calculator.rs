//! Demand propagation: sizes every step of a production graph for a target rate

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::graph::RecipeDag;
use crate::models::NodeId;
use crate::resources::is_raw;

/// Underclocked buildings draw power along `clock ^ POWER_EXPONENT`.
pub const POWER_EXPONENT: f64 = 1.321929;

/// A remainder at or below this fraction of a building is not built at all:
/// it adds neither a building nor power.
const PARTIAL_BUILDING_MIN: f64 = 0.001;

/// Clock remainders below this report the last building as running at 100%.
const PARTIAL_CLOCK_MIN: f64 = 0.01;

/// Imports smaller than this are noise from floating point, not trains.
const IMPORT_MIN: f64 = 0.01;

/// How a node reached from several parents gets its rate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum DemandMode {
    /// A node is sized once, at the rate of the first parent that reaches it.
    /// Later parents add nothing.
    #[default]
    FirstVisit,
    /// Every parent's demand is summed before the node is sized.
    Accumulated,
}

/// Buildings needed for one graph node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedBuilding {
    pub item: String,
    pub recipe: String,
    pub building: String,
    pub count_exact: f64,
    pub count: u32,
    pub last_clock_pct: f64,
    pub power_mw: f64,
}

/// Full production plan for one factory at its allocated rate.
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub target_rate: f64,
    pub buildings: Vec<PlannedBuilding>,
    pub total_buildings: u32,
    pub total_power_mw: f64,
    pub raw_demands: BTreeMap<String, f64>,
    pub train_imports: BTreeMap<String, f64>,
    pub local_extraction: BTreeMap<String, f64>,
    pub building_summary: BTreeMap<String, u32>,
}

/// Results gathered while walking the graph.
#[derive(Debug, Default)]
struct Accumulator {
    buildings: Vec<PlannedBuilding>,
    total_power_mw: f64,
    raw_demands: BTreeMap<String, f64>,
    visited: HashSet<NodeId>,
}

impl Accumulator {
    /// Sizes one node for `needed_rate` and returns the per-input rates it
    /// pulls, or `None` for a zero-yield node.
    fn place(&mut self, dag: &RecipeDag, id: NodeId, needed_rate: f64) -> Option<Vec<(String, f64)>> {
        let node = dag.node(id);
        let output = node.output_per_min();
        if output <= 0.0 {
            return None;
        }

        let count_exact = needed_rate / output;
        let full = count_exact.floor();
        let frac = count_exact - full;

        let partial = frac > PARTIAL_BUILDING_MIN;
        let power_full = full * node.power_mw;
        let power_partial = if partial {
            node.power_mw * frac.powf(POWER_EXPONENT)
        } else {
            0.0
        };
        let power_mw = power_full + power_partial;
        self.total_power_mw += power_mw;

        self.buildings.push(PlannedBuilding {
            item: node.item.clone(),
            recipe: node.recipe_name.clone(),
            building: node.building.clone(),
            count_exact,
            count: if partial { full as u32 + 1 } else { full as u32 },
            last_clock_pct: if frac > PARTIAL_CLOCK_MIN { frac * 100.0 } else { 100.0 },
            power_mw,
        });

        let scale = needed_rate / output;
        Some(
            node.inputs_per_min()
                .map(|(input, per_min)| (input.to_string(), per_min * scale))
                .collect(),
        )
    }

    fn add_raw(&mut self, resource: &str, rate: f64) {
        *self.raw_demands.entry(resource.to_string()).or_default() += rate;
    }

    fn plan_first_visit(&mut self, dag: &RecipeDag, id: NodeId, needed_rate: f64) {
        if dag.node(id).output_per_min() <= 0.0 || !self.visited.insert(id) {
            return;
        }
        let Some(inputs) = self.place(dag, id, needed_rate) else {
            return;
        };
        for (input, rate) in inputs {
            if is_raw(&input) {
                self.add_raw(&input, rate);
            } else if let Some(child) = dag.child_for(id, &input) {
                self.plan_first_visit(dag, child, rate);
            }
        }
    }

    fn plan_accumulated(&mut self, dag: &RecipeDag, target_rate: f64) {
        let mut incoming: HashMap<NodeId, f64> = HashMap::from([(dag.root_id(), target_rate)]);
        for id in topological_order(dag) {
            let Some(rate) = incoming.get(&id).copied() else {
                continue;
            };
            let Some(inputs) = self.place(dag, id, rate) else {
                continue;
            };
            for (input, input_rate) in inputs {
                if is_raw(&input) {
                    self.add_raw(&input, input_rate);
                } else if let Some(child) = dag.child_for(id, &input) {
                    *incoming.entry(child).or_default() += input_rate;
                }
            }
        }
    }
}

/// Parents before children, starting from the root.
fn topological_order(dag: &RecipeDag) -> Vec<NodeId> {
    fn visit(dag: &RecipeDag, id: NodeId, seen: &mut HashSet<NodeId>, post: &mut Vec<NodeId>) {
        if !seen.insert(id) {
            return;
        }
        for child in &dag.node(id).children {
            visit(dag, *child, seen, post);
        }
        post.push(id);
    }

    let mut seen = HashSet::new();
    let mut post = Vec::with_capacity(dag.len());
    visit(dag, dag.root_id(), &mut seen, &mut post);
    post.reverse();
    post
}

/// Generate the production plan for `allocated_rate` units/min of the root
/// item, splitting raw demand between local extraction and train imports.
pub fn generate_plan(dag: &RecipeDag, allocated_rate: f64, local_resources: &BTreeMap<String, f64>) -> Plan {
    generate_plan_with(dag, allocated_rate, local_resources, DemandMode::FirstVisit)
}

pub fn generate_plan_with(
    dag: &RecipeDag,
    allocated_rate: f64,
    local_resources: &BTreeMap<String, f64>,
    mode: DemandMode,
) -> Plan {
    let mut acc = Accumulator::default();
    match mode {
        DemandMode::FirstVisit => acc.plan_first_visit(dag, dag.root_id(), allocated_rate),
        DemandMode::Accumulated => acc.plan_accumulated(dag, allocated_rate),
    }

    let mut train_imports = BTreeMap::new();
    let mut local_extraction = BTreeMap::new();
    for (resource, demand) in &acc.raw_demands {
        let local_cap = local_resources.get(resource).copied().unwrap_or(0.0);
        let local_used = demand.min(local_cap);
        let train_needed = (demand - local_cap).max(0.0);
        local_extraction.insert(resource.clone(), local_used);
        if train_needed > IMPORT_MIN {
            train_imports.insert(resource.clone(), train_needed);
        }
    }

    let mut building_summary: BTreeMap<String, u32> = BTreeMap::new();
    for b in &acc.buildings {
        *building_summary.entry(b.building.clone()).or_default() += b.count;
    }
    let total_buildings: u32 = acc.buildings.iter().map(|b| b.count).sum();

    info!(
        item = %dag.root().item,
        rate = allocated_rate,
        total_buildings,
        power_mw = acc.total_power_mw,
        "generated plan"
    );

    Plan {
        target_rate: allocated_rate,
        buildings: acc.buildings,
        total_buildings,
        total_power_mw: acc.total_power_mw,
        raw_demands: acc.raw_demands,
        train_imports,
        local_extraction,
        building_summary,
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Production Plan ===")?;
        writeln!(f, "Target rate: {:.2}/min", self.target_rate)?;
        writeln!(f)?;

        writeln!(f, "Buildings required:")?;
        for b in &self.buildings {
            writeln!(
                f,
                "  {:>3}x {:<16} {} ({:.2} exact, last @ {:.1}%, {:.1} MW)",
                b.count, b.building, b.item, b.count_exact, b.last_clock_pct, b.power_mw
            )?;
        }
        writeln!(f)?;

        writeln!(f, "Raw inputs required:")?;
        for (name, rate) in &self.raw_demands {
            let local = self.local_extraction.get(name).copied().unwrap_or(0.0);
            let train = self.train_imports.get(name).copied().unwrap_or(0.0);
            writeln!(f, "  {} @ {:.2}/min (local {:.2}, train {:.2})", name, rate, local, train)?;
        }
        writeln!(f)?;

        writeln!(f, "Building summary:")?;
        for (building, count) in &self.building_summary {
            writeln!(f, "  {:>3}x {}", count, building)?;
        }
        writeln!(f)?;

        writeln!(f, "Total buildings: {}", self.total_buildings)?;
        writeln!(f, "Total power:     {:.1} MW", self.total_power_mw)?;

        Ok(())
    }
}
