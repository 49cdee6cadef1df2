//! End-to-end planning: graph, themes, sites, allocation, plans.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::info;

use crate::allocator::allocate_production;
use crate::calculator::{DemandMode, Plan, generate_plan_with};
use crate::db::Catalog;
use crate::error::Result;
use crate::graph::{DagNodeView, RecipeDag, build_graph};
use crate::locations::{LocationCandidate, Quadrant, find_locations, local_capacity};
use crate::models::{Allocation, Factory, ResourceNode, Theme, ThemeAssignment};
use crate::modules::{Module, compute_modules};

/// A target resolved into its graph and split into themes.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub dag: RecipeDag,
    pub assignments: Vec<ThemeAssignment>,
    /// Raw demand at the requested rate, every path counted.
    pub raw_demands: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub themes: Vec<ThemeAssignment>,
    pub dag: Vec<DagNodeView>,
    pub raw_demands: BTreeMap<String, f64>,
}

impl Analysis {
    pub fn report(&self) -> AnalysisReport {
        AnalysisReport {
            themes: self.assignments.clone(),
            dag: self.dag.summary(),
            raw_demands: self.raw_demands.clone(),
        }
    }

    /// Demand per minute a theme's site must supply at `target_rate`.
    pub fn critical_resources(assignment: &ThemeAssignment, target_rate: f64) -> BTreeMap<String, f64> {
        assignment
            .raw_demands
            .iter()
            .map(|(resource, per_unit)| (resource.clone(), per_unit * target_rate))
            .collect()
    }
}

pub fn analyze<C: Catalog + ?Sized>(
    catalog: &C,
    themes: &[Theme],
    target_item: &str,
    target_rate: f64,
    excluded_recipes: &[String],
    max_factories: usize,
) -> Result<Analysis> {
    let dag = build_graph(catalog, target_item, excluded_recipes)?;
    let assignments = crate::themes::assign_themes(&dag, themes, max_factories)?;
    let raw_demands = dag.raw_demands(target_rate);
    info!(
        target = target_item,
        nodes = dag.len(),
        themes = assignments.len(),
        "analyzed target"
    );
    Ok(Analysis {
        dag,
        assignments,
        raw_demands,
    })
}

#[derive(Debug, Clone)]
pub struct PlanRequest {
    pub target_item: String,
    pub target_rate: f64,
    pub excluded_recipes: Vec<String>,
    pub max_factories: usize,
    pub search_radius_m: f64,
    pub excluded_quadrants: Vec<Quadrant>,
    pub train_penalty: f64,
    pub water_penalty: f64,
    pub demand_mode: DemandMode,
}

/// One factory of a full plan.
#[derive(Debug, Clone, Serialize)]
pub struct FactoryReport {
    pub theme_id: String,
    pub location: Option<LocationCandidate>,
    pub local_capacity: BTreeMap<String, f64>,
    pub allocation: Allocation,
    pub plan: Plan,
    pub module: Module,
}

/// Plan one factory per theme and split the target rate across them.
///
/// Each factory's effort follows its theme's own raw demand per unit of
/// target, and each builds the whole chain at its allocated rate. Its site
/// is the best-scoring location for the theme's resources; a theme with no
/// site found plans with no local capacity and imports everything by train.
pub fn plan_factories<C: Catalog + ?Sized>(
    catalog: &C,
    themes: &[Theme],
    nodes: &[ResourceNode],
    request: &PlanRequest,
) -> Result<Vec<FactoryReport>> {
    let analysis = analyze(
        catalog,
        themes,
        &request.target_item,
        request.target_rate,
        &request.excluded_recipes,
        request.max_factories,
    )?;

    let mut sites = Vec::with_capacity(analysis.assignments.len());
    let mut factories = Vec::with_capacity(analysis.assignments.len());
    for assignment in &analysis.assignments {
        let critical = Analysis::critical_resources(assignment, request.target_rate);
        let location = if critical.is_empty() {
            None
        } else {
            find_locations(
                nodes,
                &critical,
                request.search_radius_m,
                1,
                &request.excluded_quadrants,
            )
            .into_iter()
            .next()
        };
        let capacity = location.as_ref().map(local_capacity).unwrap_or_default();
        if location.is_none() {
            info!(theme = %assignment.theme.id, "no site found, all resources by train");
        }

        factories.push(Factory {
            theme_id: assignment.theme.id.clone(),
            demands_per_unit: assignment.raw_demands.clone(),
            local_capacity: capacity,
        });
        sites.push(location);
    }

    let allocations = allocate_production(
        &factories,
        request.target_rate,
        request.train_penalty,
        request.water_penalty,
    );

    let reports = factories
        .into_iter()
        .zip(sites)
        .zip(allocations)
        .map(|((factory, location), allocation)| {
            let plan = generate_plan_with(
                &analysis.dag,
                allocation.allocated_rate,
                &factory.local_capacity,
                request.demand_mode,
            );
            let module = compute_modules(&analysis.dag, &plan);
            FactoryReport {
                theme_id: factory.theme_id,
                location,
                local_capacity: factory.local_capacity,
                allocation,
                plan,
                module,
            }
        })
        .collect();
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryCatalog;
    use crate::error::PlannerError;
    use crate::models::{ItemQuantity, Purity, Recipe};
    use crate::themes::default_themes;

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

    fn catalog() -> MemoryCatalog {
        alloy_catalog(1.0)
    }

    fn alloy_catalog(iron_per_alloy: f64) -> MemoryCatalog {
        MemoryCatalog::new(vec![
            recipe("Iron Ingot", 60.0, &[("Iron Ore", 1.0)]),
            recipe("Copper Ingot", 60.0, &[("Copper Ore", 1.0)]),
            recipe("Alloy", 60.0, &[("Iron Ingot", iron_per_alloy), ("Copper Ingot", 1.0)]),
        ])
    }

    fn request(target_rate: f64) -> PlanRequest {
        PlanRequest {
            target_item: "Alloy".to_string(),
            target_rate,
            excluded_recipes: Vec::new(),
            max_factories: 8,
            search_radius_m: 500.0,
            excluded_quadrants: Vec::new(),
            train_penalty: 2.0,
            water_penalty: 3.0,
            demand_mode: DemandMode::FirstVisit,
        }
    }

    fn node(t: &str, x: f64, y: f64) -> ResourceNode {
        ResourceNode {
            node_type: t.to_string(),
            purity: Purity::Normal,
            x,
            y,
            z: 0.0,
        }
    }

    #[test]
    fn analysis_reports_themes_and_demand() {
        let analysis = analyze(&catalog(), &default_themes().unwrap(), "Alloy", 10.0, &[], 8).unwrap();
        assert_eq!(analysis.dag.len(), 3);
        assert_eq!(analysis.raw_demands["Iron Ore"], 10.0);
        assert_eq!(analysis.assignments.len(), 2);
        let report = analysis.report();
        assert_eq!(report.dag[0].item, "Alloy");
    }

    #[test]
    fn unknown_target_propagates() {
        let err = analyze(&catalog(), &default_themes().unwrap(), "Nothing", 1.0, &[], 8).unwrap_err();
        assert!(matches!(err, PlannerError::NoRecipe { ref item } if item == "Nothing"));
    }

    #[test]
    fn factories_share_the_target() {
        let nodes = vec![node("iron", 0.0, 0.0), node("copper", 1_000_000.0, 1_000_000.0)];
        let reports = plan_factories(&catalog(), &default_themes().unwrap(), &nodes, &request(30.0)).unwrap();
        assert_eq!(reports.len(), 2);
        let total: f64 = reports.iter().map(|r| r.allocation.allocated_rate).sum();
        assert!((total - 30.0).abs() < 1e-6);
        for r in &reports {
            assert!(r.location.is_some());
            assert!((r.plan.target_rate - r.allocation.allocated_rate).abs() < 1e-12);
        }
    }

    #[test]
    fn theme_resource_mix_drives_allocation() {
        // Iron theme needs 3 ore per alloy, copper theme 1: with everything
        // by train, efforts balance at 6r = 2r', so iron gets a quarter.
        let reports = plan_factories(&alloy_catalog(3.0), &default_themes().unwrap(), &[], &request(10.0)).unwrap();
        assert_eq!(reports.len(), 2);
        let rate = |id: &str| {
            reports
                .iter()
                .find(|r| r.theme_id == id)
                .map(|r| r.allocation.allocated_rate)
                .unwrap()
        };
        assert!((rate("iron-works") - 2.5).abs() < 1e-3);
        assert!((rate("copper-foundry") - 7.5).abs() < 1e-3);
        for r in &reports {
            assert!((r.allocation.effort - 15.0).abs() < 1e-3);
        }
    }

    #[test]
    fn missing_sites_mean_train_imports() {
        let reports = plan_factories(&catalog(), &default_themes().unwrap(), &[], &request(10.0)).unwrap();
        for r in &reports {
            assert!(r.location.is_none());
            assert!(r.local_capacity.is_empty());
        }
        let imported: f64 = reports.iter().flat_map(|r| r.plan.train_imports.values()).sum();
        assert!((imported - 20.0).abs() < 1e-6);
    }
}
