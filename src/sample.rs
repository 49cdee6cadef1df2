//! Built-in sample catalog for trying the planner without a game-data export.
//!
//! Covers the iron, steel, concrete, copper and aluminum chains up to the
//! Heavy Modular Frame, plus a handful of map nodes.

use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

use crate::db;
use crate::models::{Building, Item, Purity, ResourceNode};
use crate::resources::{is_fluid, is_raw};

struct SampleRecipe {
    name: &'static str,
    building: &'static str,
    duration_s: f64,
    inputs: &'static [(&'static str, f64)],
    outputs: &'static [(&'static str, f64)],
}

const BUILDINGS: [(&str, f64); 6] = [
    ("Smelter", 4.0),
    ("Constructor", 4.0),
    ("Assembler", 15.0),
    ("Foundry", 16.0),
    ("Manufacturer", 55.0),
    ("Refinery", 30.0),
];

const RECIPES: &[SampleRecipe] = &[
    SampleRecipe {
        name: "Iron Ingot",
        building: "Smelter",
        duration_s: 2.0,
        inputs: &[("Iron Ore", 1.0)],
        outputs: &[("Iron Ingot", 1.0)],
    },
    SampleRecipe {
        name: "Iron Plate",
        building: "Constructor",
        duration_s: 6.0,
        inputs: &[("Iron Ingot", 3.0)],
        outputs: &[("Iron Plate", 2.0)],
    },
    SampleRecipe {
        name: "Iron Rod",
        building: "Constructor",
        duration_s: 4.0,
        inputs: &[("Iron Ingot", 1.0)],
        outputs: &[("Iron Rod", 1.0)],
    },
    SampleRecipe {
        name: "Screw",
        building: "Constructor",
        duration_s: 6.0,
        inputs: &[("Iron Rod", 1.0)],
        outputs: &[("Screw", 4.0)],
    },
    SampleRecipe {
        name: "Alternate: Cast Screw",
        building: "Constructor",
        duration_s: 24.0,
        inputs: &[("Iron Ingot", 5.0)],
        outputs: &[("Screw", 20.0)],
    },
    SampleRecipe {
        name: "Reinforced Iron Plate",
        building: "Assembler",
        duration_s: 12.0,
        inputs: &[("Iron Plate", 6.0), ("Screw", 12.0)],
        outputs: &[("Reinforced Iron Plate", 1.0)],
    },
    SampleRecipe {
        name: "Modular Frame",
        building: "Assembler",
        duration_s: 60.0,
        inputs: &[("Reinforced Iron Plate", 3.0), ("Iron Rod", 12.0)],
        outputs: &[("Modular Frame", 2.0)],
    },
    SampleRecipe {
        name: "Steel Ingot",
        building: "Foundry",
        duration_s: 4.0,
        inputs: &[("Iron Ore", 3.0), ("Coal", 3.0)],
        outputs: &[("Steel Ingot", 3.0)],
    },
    SampleRecipe {
        name: "Alternate: Solid Steel Ingot",
        building: "Foundry",
        duration_s: 3.0,
        inputs: &[("Iron Ingot", 2.0), ("Coal", 2.0)],
        outputs: &[("Steel Ingot", 3.0)],
    },
    SampleRecipe {
        name: "Steel Beam",
        building: "Constructor",
        duration_s: 4.0,
        inputs: &[("Steel Ingot", 4.0)],
        outputs: &[("Steel Beam", 1.0)],
    },
    SampleRecipe {
        name: "Steel Pipe",
        building: "Constructor",
        duration_s: 6.0,
        inputs: &[("Steel Ingot", 3.0)],
        outputs: &[("Steel Pipe", 2.0)],
    },
    SampleRecipe {
        name: "Concrete",
        building: "Constructor",
        duration_s: 4.0,
        inputs: &[("Limestone", 3.0)],
        outputs: &[("Concrete", 1.0)],
    },
    SampleRecipe {
        name: "Encased Industrial Beam",
        building: "Assembler",
        duration_s: 10.0,
        inputs: &[("Steel Beam", 3.0), ("Concrete", 6.0)],
        outputs: &[("Encased Industrial Beam", 1.0)],
    },
    SampleRecipe {
        name: "Heavy Modular Frame",
        building: "Manufacturer",
        duration_s: 30.0,
        inputs: &[
            ("Modular Frame", 5.0),
            ("Steel Pipe", 20.0),
            ("Encased Industrial Beam", 5.0),
            ("Screw", 120.0),
        ],
        outputs: &[("Heavy Modular Frame", 1.0)],
    },
    SampleRecipe {
        name: "Copper Ingot",
        building: "Smelter",
        duration_s: 2.0,
        inputs: &[("Copper Ore", 1.0)],
        outputs: &[("Copper Ingot", 1.0)],
    },
    SampleRecipe {
        name: "Wire",
        building: "Constructor",
        duration_s: 4.0,
        inputs: &[("Copper Ingot", 1.0)],
        outputs: &[("Wire", 2.0)],
    },
    SampleRecipe {
        name: "Cable",
        building: "Constructor",
        duration_s: 2.0,
        inputs: &[("Wire", 2.0)],
        outputs: &[("Cable", 1.0)],
    },
    SampleRecipe {
        name: "Silica",
        building: "Constructor",
        duration_s: 8.0,
        inputs: &[("Raw Quartz", 3.0)],
        outputs: &[("Silica", 5.0)],
    },
    SampleRecipe {
        name: "Alumina Solution",
        building: "Refinery",
        duration_s: 6.0,
        inputs: &[("Bauxite", 12.0), ("Water", 18.0)],
        outputs: &[("Alumina Solution", 12.0), ("Silica", 5.0)],
    },
    SampleRecipe {
        name: "Aluminum Scrap",
        building: "Refinery",
        duration_s: 1.0,
        inputs: &[("Alumina Solution", 4.0), ("Coal", 2.0)],
        outputs: &[("Aluminum Scrap", 6.0), ("Water", 2.0)],
    },
    SampleRecipe {
        name: "Aluminum Ingot",
        building: "Foundry",
        duration_s: 4.0,
        inputs: &[("Aluminum Scrap", 6.0), ("Silica", 5.0)],
        outputs: &[("Aluminum Ingot", 4.0)],
    },
];

const NODES: [(&str, Purity, f64, f64); 14] = [
    ("iron", Purity::Pure, 150_000.0, -120_000.0),
    ("iron", Purity::Normal, 162_000.0, -118_000.0),
    ("iron", Purity::Normal, 140_000.0, -131_000.0),
    ("coal", Purity::Normal, 158_000.0, -135_000.0),
    ("limestone", Purity::Pure, 171_000.0, -109_000.0),
    ("limestone", Purity::Normal, -210_000.0, 80_000.0),
    ("iron", Purity::Impure, -205_000.0, 72_000.0),
    ("copper", Purity::Pure, -60_000.0, -240_000.0),
    ("copper", Purity::Normal, -48_000.0, -236_000.0),
    ("coal", Purity::Pure, -220_000.0, 95_000.0),
    ("bauxite", Purity::Normal, 310_000.0, 260_000.0),
    ("quartz", Purity::Normal, 318_000.0, 251_000.0),
    ("water", Purity::Normal, 305_000.0, 270_000.0),
    ("oil", Purity::Impure, -20_000.0, 310_000.0),
];

/// Catalog id for a sample name: "Iron Ore" becomes "IronOre".
fn sample_id(name: &str) -> String {
    name.chars().filter(|c| c.is_alphanumeric()).collect()
}

fn category_for(name: &str) -> &'static str {
    if is_fluid(name) {
        "Fluid"
    } else if is_raw(name) {
        "Resource"
    } else {
        "Part"
    }
}

fn upsert_sample_item(conn: &Connection, name: &str) -> Result<String> {
    let id = sample_id(name);
    db::upsert_item(
        conn,
        &Item {
            id: id.clone(),
            name: name.to_string(),
            category: Some(category_for(name).to_string()),
        },
    )?;
    Ok(id)
}

/// Replace the catalog contents with the sample data set
pub fn load_sample_data(conn: &Connection) -> Result<()> {
    db::clear_extracted_data(conn)?;

    for (name, power_mw) in BUILDINGS {
        db::upsert_building(
            conn,
            &Building {
                id: sample_id(name),
                name: name.to_string(),
                category: Some("Production".to_string()),
                power_mw,
            },
        )?;
    }

    for recipe in RECIPES {
        let recipe_id = format!("Recipe_{}", sample_id(recipe.name));
        db::upsert_recipe(conn, &recipe_id, recipe.name, recipe.duration_s)?;
        db::insert_recipe_building(conn, &recipe_id, &sample_id(recipe.building))?;
        for (item, quantity) in recipe.inputs {
            let item_id = upsert_sample_item(conn, item)?;
            db::insert_recipe_ingredient(conn, &recipe_id, &item_id, *quantity)?;
        }
        for (item, quantity) in recipe.outputs {
            let item_id = upsert_sample_item(conn, item)?;
            db::insert_recipe_product(conn, &recipe_id, &item_id, *quantity)?;
        }
    }

    for (node_type, purity, x, y) in NODES {
        db::insert_resource_node(
            conn,
            &ResourceNode {
                node_type: node_type.to_string(),
                purity,
                x,
                y,
                z: 0.0,
            },
        )?;
    }

    info!(
        recipes = RECIPES.len(),
        buildings = BUILDINGS.len(),
        nodes = NODES.len(),
        "loaded sample catalog"
    );
    Ok(())
}
