//! Catalog schema, writes and lookups

use anyhow::Result;
use rusqlite::Connection;

use crate::error;
use crate::models::{Building, Item, ItemQuantity, Recipe, ResourceNode};

/// Buildings whose products make sensible end targets.
const TARGET_BUILDINGS: [&str; 4] = ["Manufacturer", "Assembler", "Blender", "Particle Accelerator"];

/// Read-only recipe lookup used by the graph builder.
pub trait Catalog {
    /// All recipes producing `item`, in stable catalog order.
    fn recipes_producing(&self, item: &str) -> error::Result<Vec<Recipe>>;
}

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS items (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            category TEXT
        );

        CREATE TABLE IF NOT EXISTS buildings (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            category TEXT,
            power_mw REAL
        );

        -- One row per recipe; ingredients and products hang off it
        CREATE TABLE IF NOT EXISTS recipes (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            duration_s REAL NOT NULL
        );

        CREATE TABLE IF NOT EXISTS recipe_ingredients (
            recipe_id TEXT NOT NULL,
            item_id TEXT NOT NULL,
            quantity REAL NOT NULL,
            PRIMARY KEY (recipe_id, item_id)
        );

        CREATE TABLE IF NOT EXISTS recipe_products (
            recipe_id TEXT NOT NULL,
            item_id TEXT NOT NULL,
            quantity REAL NOT NULL,
            PRIMARY KEY (recipe_id, item_id)
        );

        -- Where a recipe is crafted; hand-crafting benches have no building row
        CREATE TABLE IF NOT EXISTS recipe_buildings (
            recipe_id TEXT NOT NULL,
            building_id TEXT NOT NULL,
            PRIMARY KEY (recipe_id, building_id)
        );

        -- Map data for the location finder
        CREATE TABLE IF NOT EXISTS resource_nodes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            type TEXT NOT NULL,
            purity TEXT NOT NULL,
            x REAL NOT NULL,
            y REAL NOT NULL,
            z REAL NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_items_name ON items(name);
        CREATE INDEX IF NOT EXISTS idx_recipe_products_item ON recipe_products(item_id);
        CREATE INDEX IF NOT EXISTS idx_recipe_ingredients_item ON recipe_ingredients(item_id);
        "#,
    )?;
    Ok(())
}

/// Insert or replace an item
pub fn upsert_item(conn: &Connection, item: &Item) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO items (id, name, category) VALUES (?1, ?2, ?3)",
        (&item.id, &item.name, &item.category),
    )?;
    Ok(())
}

/// Insert or replace a building
pub fn upsert_building(conn: &Connection, building: &Building) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO buildings (id, name, category, power_mw) VALUES (?1, ?2, ?3, ?4)",
        (&building.id, &building.name, &building.category, building.power_mw),
    )?;
    Ok(())
}

/// Insert or update a recipe row (without ingredients or products).
///
/// Updates keep the row in place, so catalog order survives a re-import.
pub fn upsert_recipe(conn: &Connection, id: &str, name: &str, duration_s: f64) -> Result<()> {
    conn.execute(
        "INSERT INTO recipes (id, name, duration_s) VALUES (?1, ?2, ?3)
         ON CONFLICT(id) DO UPDATE SET name = excluded.name, duration_s = excluded.duration_s",
        (id, name, duration_s),
    )?;
    Ok(())
}

pub fn insert_recipe_ingredient(conn: &Connection, recipe_id: &str, item_id: &str, quantity: f64) -> Result<()> {
    conn.execute(
        "INSERT INTO recipe_ingredients (recipe_id, item_id, quantity) VALUES (?1, ?2, ?3)
         ON CONFLICT(recipe_id, item_id) DO UPDATE SET quantity = excluded.quantity",
        (recipe_id, item_id, quantity),
    )?;
    Ok(())
}

pub fn insert_recipe_product(conn: &Connection, recipe_id: &str, item_id: &str, quantity: f64) -> Result<()> {
    conn.execute(
        "INSERT INTO recipe_products (recipe_id, item_id, quantity) VALUES (?1, ?2, ?3)
         ON CONFLICT(recipe_id, item_id) DO UPDATE SET quantity = excluded.quantity",
        (recipe_id, item_id, quantity),
    )?;
    Ok(())
}

pub fn insert_recipe_building(conn: &Connection, recipe_id: &str, building_id: &str) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO recipe_buildings (recipe_id, building_id) VALUES (?1, ?2)",
        (recipe_id, building_id),
    )?;
    Ok(())
}

pub fn insert_resource_node(conn: &Connection, node: &ResourceNode) -> Result<()> {
    conn.execute(
        "INSERT INTO resource_nodes (type, purity, x, y, z) VALUES (?1, ?2, ?3, ?4, ?5)",
        (&node.node_type, node.purity.as_str(), node.x, node.y, node.z),
    )?;
    Ok(())
}

/// Clear all extracted data (for re-extraction)
pub fn clear_extracted_data(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        DELETE FROM resource_nodes;
        DELETE FROM recipe_buildings;
        DELETE FROM recipe_products;
        DELETE FROM recipe_ingredients;
        DELETE FROM recipes;
        DELETE FROM buildings;
        DELETE FROM items;
        "#,
    )?;
    Ok(())
}

fn recipe_items(conn: &Connection, table: &str, recipe_id: &str) -> rusqlite::Result<Vec<ItemQuantity>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT i.name, t.quantity
         FROM {table} t
         JOIN items i ON i.id = t.item_id
         WHERE t.recipe_id = ?1
         ORDER BY t.rowid"
    ))?;

    let rows = stmt.query_map([recipe_id], |row| {
        Ok(ItemQuantity {
            item: row.get(0)?,
            quantity: row.get(1)?,
        })
    })?;

    rows.collect()
}

/// Get all recipes producing a given item, joined with their building
pub fn get_recipes_for_item(conn: &Connection, item_name: &str) -> rusqlite::Result<Vec<Recipe>> {
    let mut stmt = conn.prepare(
        "SELECT r.id, r.name, r.duration_s, b.name, b.power_mw
         FROM recipes r
         JOIN recipe_products rp ON rp.recipe_id = r.id
         JOIN items i ON i.id = rp.item_id
         JOIN recipe_buildings rb ON rb.recipe_id = r.id
         JOIN buildings b ON b.id = rb.building_id
         WHERE i.name = ?1
         ORDER BY r.rowid, rb.rowid",
    )?;

    let heads = stmt
        .query_map([item_name], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<f64>>(4)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut results = Vec::with_capacity(heads.len());
    for (id, name, duration_s, building, power_mw) in heads {
        let inputs = recipe_items(conn, "recipe_ingredients", &id)?;
        let outputs = recipe_items(conn, "recipe_products", &id)?;
        results.push(Recipe {
            id,
            name,
            duration_s,
            building,
            power_mw: power_mw.unwrap_or(0.0),
            inputs,
            outputs,
        });
    }
    Ok(results)
}

impl Catalog for Connection {
    fn recipes_producing(&self, item: &str) -> error::Result<Vec<Recipe>> {
        Ok(get_recipes_for_item(self, item)?)
    }
}

/// List all buildings in the database
pub fn list_buildings(conn: &Connection) -> Result<Vec<Building>> {
    let mut stmt = conn.prepare("SELECT id, name, category, power_mw FROM buildings ORDER BY name")?;

    let rows = stmt.query_map([], |row| {
        Ok(Building {
            id: row.get(0)?,
            name: row.get(1)?,
            category: row.get(2)?,
            power_mw: row.get::<_, Option<f64>>(3)?.unwrap_or(0.0),
        })
    })?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

/// Items made in end-product buildings: the viable production targets
pub fn list_target_items(conn: &Connection) -> Result<Vec<Item>> {
    let placeholders = vec!["?"; TARGET_BUILDINGS.len()].join(", ");
    let mut stmt = conn.prepare(&format!(
        "SELECT DISTINCT i.id, i.name, i.category
         FROM items i
         JOIN recipe_products rp ON rp.item_id = i.id
         JOIN recipe_buildings rb ON rb.recipe_id = rp.recipe_id
         JOIN buildings b ON b.id = rb.building_id
         WHERE b.name IN ({placeholders})
         ORDER BY i.name"
    ))?;

    let rows = stmt.query_map(rusqlite::params_from_iter(TARGET_BUILDINGS), |row| {
        Ok(Item {
            id: row.get(0)?,
            name: row.get(1)?,
            category: row.get(2)?,
        })
    })?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

/// Load every resource node on the map
pub fn load_resource_nodes(conn: &Connection) -> Result<Vec<ResourceNode>> {
    let mut stmt = conn.prepare("SELECT type, purity, x, y, z FROM resource_nodes ORDER BY id")?;

    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, f64>(2)?,
            row.get::<_, f64>(3)?,
            row.get::<_, f64>(4)?,
        ))
    })?;

    let mut results = Vec::new();
    for row in rows {
        let (node_type, purity, x, y, z) = row?;
        let purity = purity.parse().map_err(anyhow::Error::msg)?;
        results.push(ResourceNode {
            node_type,
            purity,
            x,
            y,
            z,
        });
    }
    Ok(results)
}

/// Catalog held in memory, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    recipes: Vec<Recipe>,
}

impl MemoryCatalog {
    pub fn new(recipes: Vec<Recipe>) -> Self {
        Self { recipes }
    }
}

impl Catalog for MemoryCatalog {
    fn recipes_producing(&self, item: &str) -> error::Result<Vec<Recipe>> {
        Ok(self.recipes.iter().filter(|r| r.produces(item)).cloned().collect())
    }
}
