//! Recipe graph resolution
//!
//! Resolves a target item into a production DAG by walking recipes from the
//! catalog down to raw resources. One recipe is picked per item and every
//! item appears in the graph at most once, so a shared ingredient (screws
//! feeding both a plate and a frame) is resolved a single time.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;
use tracing::debug;

use crate::db::Catalog;
use crate::error::{PlannerError, Result};
use crate::models::{NodeId, Recipe, RecipeNode};
use crate::resources::is_raw;

/// Production graph for one target item. Nodes are owned by the graph and
/// addressed by [`NodeId`]; the root is always the first node.
#[derive(Debug, Clone)]
pub struct RecipeDag {
    root: NodeId,
    nodes: Vec<RecipeNode>,
    index: HashMap<String, NodeId>,
}

impl RecipeDag {
    pub fn root(&self) -> &RecipeNode {
        &self.nodes[self.root.0]
    }

    pub fn root_id(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &RecipeNode {
        &self.nodes[id.0]
    }

    /// All nodes, in order of first discovery.
    pub fn nodes(&self) -> &[RecipeNode] {
        &self.nodes
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, item: &str) -> Option<&RecipeNode> {
        self.index.get(item).map(|id| self.node(*id))
    }

    /// The child of `parent` producing `item`, if `item` is one of its non-raw inputs.
    pub fn child_for(&self, parent: NodeId, item: &str) -> Option<NodeId> {
        self.node(parent)
            .children
            .iter()
            .copied()
            .find(|child| self.node(*child).item == item)
    }

    /// Nodes whose inputs are all raw resources.
    pub fn leaves(&self) -> Vec<&RecipeNode> {
        self.nodes
            .iter()
            .filter(|n| n.inputs.iter().all(|i| is_raw(&i.item)))
            .collect()
    }

    /// Raw resource demand for `rate` units/min of the root item, following
    /// every path through the graph.
    pub fn raw_demands(&self, rate: f64) -> BTreeMap<String, f64> {
        let mut demands = BTreeMap::new();
        self.trace_raw(self.root, rate, &mut demands);
        demands
    }

    fn trace_raw(&self, id: NodeId, needed_rate: f64, demands: &mut BTreeMap<String, f64>) {
        let node = self.node(id);
        let output = node.output_per_min();
        if output <= 0.0 {
            return;
        }
        let scale = needed_rate / output;
        for (input, per_min) in node.inputs_per_min() {
            let input_rate = per_min * scale;
            if is_raw(input) {
                *demands.entry(input.to_string()).or_default() += input_rate;
            } else if let Some(child) = self.child_for(id, input) {
                self.trace_raw(child, input_rate, demands);
            }
        }
    }

    /// Flat view for serialization: one entry per node with names instead of ids.
    pub fn summary(&self) -> Vec<DagNodeView> {
        self.nodes
            .iter()
            .map(|n| DagNodeView {
                item: n.item.clone(),
                recipe: n.recipe_name.clone(),
                building: n.building.clone(),
                inputs: n.inputs.iter().map(|i| i.item.clone()).collect(),
                children: n.children.iter().map(|c| self.node(*c).item.clone()).collect(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DagNodeView {
    pub item: String,
    pub recipe: String,
    pub building: String,
    pub inputs: Vec<String>,
    pub children: Vec<String>,
}

/// Pick the recipe to use for an item: skip excluded names, prefer the first
/// default recipe, otherwise fall back to the first alternate.
pub fn pick_recipe<'a>(recipes: &'a [Recipe], excluded: &HashSet<&str>) -> Option<&'a Recipe> {
    let mut available = recipes.iter().filter(|r| !excluded.contains(r.name.as_str()));
    let first = available.next()?;
    if !first.is_alternate() {
        return Some(first);
    }
    available.find(|r| !r.is_alternate()).or(Some(first))
}

struct GraphBuilder<'a, C: Catalog + ?Sized> {
    catalog: &'a C,
    excluded: HashSet<&'a str>,
    nodes: Vec<RecipeNode>,
    index: HashMap<String, NodeId>,
    path: Vec<String>,
}

impl<C: Catalog + ?Sized> GraphBuilder<'_, C> {
    fn resolve(&mut self, item: &str) -> Result<Option<NodeId>> {
        if is_raw(item) {
            return Ok(None);
        }
        if self.path.iter().any(|p| p == item) {
            let mut path = self.path.clone();
            path.push(item.to_string());
            return Err(PlannerError::CyclicRecipe {
                item: item.to_string(),
                path,
            });
        }
        if let Some(id) = self.index.get(item) {
            return Ok(Some(*id));
        }

        let recipes = self.catalog.recipes_producing(item)?;
        let recipe = pick_recipe(&recipes, &self.excluded).ok_or_else(|| PlannerError::NoRecipe {
            item: item.to_string(),
        })?;
        debug!(item, recipe = %recipe.name, building = %recipe.building, "resolved recipe");

        let id = NodeId(self.nodes.len());
        let node = RecipeNode::from_recipe(item, recipe);
        let inputs: Vec<String> = node.inputs.iter().map(|i| i.item.clone()).collect();
        self.nodes.push(node);
        self.index.insert(item.to_string(), id);

        self.path.push(item.to_string());
        let mut children = Vec::new();
        for input in &inputs {
            if let Some(child) = self.resolve(input)? {
                if !children.contains(&child) {
                    children.push(child);
                }
            }
        }
        self.path.pop();

        self.nodes[id.0].children = children;
        Ok(Some(id))
    }
}

/// Build the full production DAG from `target_item` down to raw resources.
///
/// Fails with [`PlannerError::NoRecipe`] when the target or any intermediate
/// item has no eligible recipe, and with [`PlannerError::CyclicRecipe`] when
/// an item transitively requires itself. A raw target yields `NoRecipe`, since
/// there is nothing to build.
pub fn build_graph<C: Catalog + ?Sized>(catalog: &C, target_item: &str, excluded_recipes: &[String]) -> Result<RecipeDag> {
    let mut builder = GraphBuilder {
        catalog,
        excluded: excluded_recipes.iter().map(String::as_str).collect(),
        nodes: Vec::new(),
        index: HashMap::new(),
        path: Vec::new(),
    };

    let root = builder.resolve(target_item)?.ok_or_else(|| PlannerError::NoRecipe {
        item: target_item.to_string(),
    })?;

    debug!(target = target_item, nodes = builder.nodes.len(), "built recipe graph");
    Ok(RecipeDag {
        root,
        nodes: builder.nodes,
        index: builder.index,
    })
}

/// Format a production graph as an indented tree, raw inputs shown as leaves
pub fn format_dag(dag: &RecipeDag) -> String {
    let mut output = String::new();
    format_node(dag, dag.root_id(), 0, &mut output);
    output
}

fn format_node(dag: &RecipeDag, id: NodeId, indent: usize, output: &mut String) {
    let node = dag.node(id);
    let prefix = "  ".repeat(indent);
    output.push_str(&format!(
        "{}{} [{} in {}, {:.2}/min]\n",
        prefix,
        node.item,
        node.recipe_name,
        node.building,
        node.output_per_min()
    ));
    for (input, per_min) in node.inputs_per_min() {
        match dag.child_for(id, input) {
            Some(child) => format_node(dag, child, indent + 1, output),
            None => output.push_str(&format!("{}  -> {} @ {:.2}/min (raw)\n", prefix, input, per_min)),
        }
    }
}
