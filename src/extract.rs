//! Game-data import
//!
//! Loads the JSON exports of the game's item, building and recipe
//! descriptors (plus the resource node map) into the catalog database.
//! Class paths are reduced to their short class id, so a recipe that
//! refers to `/Game/.../Desc_OreIron.Desc_OreIron_C` joins against the item
//! exported as `Desc_OreIron_C`.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use regex::Regex;
use rusqlite::Connection;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::db;
use crate::models::{Building, Item, ResourceNode};
use crate::resources::normalize_quantity;

const ITEM_FILES: [&str; 2] = ["items.json", "tools.json"];
const BUILDING_FILE: &str = "buildings.json";
const RECIPE_FILE: &str = "recipes.json";
const NODE_FILE: &str = "resource_nodes.json";

#[derive(Debug, Deserialize)]
struct ItemRecord {
    #[serde(default, alias = "ClassName", alias = "className")]
    class_name: Option<String>,
    #[serde(alias = "mDisplayName")]
    name: String,
    #[serde(default)]
    category: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BuildingRecord {
    #[serde(default, alias = "ClassName", alias = "className")]
    class_name: Option<String>,
    #[serde(alias = "mDisplayName")]
    name: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default, alias = "powerUsed", alias = "mPowerConsumption")]
    power_mw: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct AmountRecord {
    item: String,
    amount: f64,
}

/// Recipe amounts, either as `[{"item", "amount"}]` or as a map of item
/// class path to quantity.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Amounts {
    List(Vec<AmountRecord>),
    ByClass(Map<String, Value>),
}

impl Default for Amounts {
    fn default() -> Self {
        Amounts::List(Vec::new())
    }
}

impl Amounts {
    /// Item path and quantity in export order. Non-numeric quantities are dropped.
    fn entries(&self) -> Vec<(&str, f64)> {
        match self {
            Amounts::List(list) => list.iter().map(|a| (a.item.as_str(), a.amount)).collect(),
            Amounts::ByClass(map) => map
                .iter()
                .filter_map(|(item, qty)| qty.as_f64().map(|q| (item.as_str(), q)))
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RecipeRecord {
    #[serde(default, alias = "ClassName", alias = "className")]
    class_name: Option<String>,
    #[serde(alias = "mDisplayName")]
    name: String,
    #[serde(alias = "mManufactoringDuration")]
    duration: f64,
    #[serde(default)]
    ingredients: Amounts,
    #[serde(default, alias = "produce")]
    products: Amounts,
    #[serde(default, alias = "producedIn", alias = "mProducedIn")]
    produced_in: Vec<Option<String>>,
}

/// A record plus the key it was stored under, when the file is keyed by id.
type Keyed<T> = (Option<String>, T);

/// Find every known export file under `data_dir`, in a stable order
pub fn find_data_files(data_dir: &Path) -> Vec<PathBuf> {
    let known = |name: &str| ITEM_FILES.contains(&name) || [BUILDING_FILE, RECIPE_FILE, NODE_FILE].contains(&name);

    WalkDir::new(data_dir)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.file_name().to_str().is_some_and(known))
        .map(|e| e.into_path())
        .collect()
}

/// Reduce a class path to its short class id; plain ids pass through.
pub fn short_class_id(class_re: &Regex, path: &str) -> String {
    class_re
        .captures(path)
        .map_or_else(|| path.to_string(), |cap| cap[1].to_string())
}

fn class_regex() -> Result<Regex> {
    Ok(Regex::new(r"([A-Za-z0-9_]+)'?$")?)
}

/// Read the records of an export file.
///
/// Three shapes are accepted: a plain array, an object keyed by short id
/// whose values are the records, and a wrapper object whose first array
/// value holds the records (`{"resource_nodes": [...]}`).
fn read_records(path: &Path) -> Result<Vec<Keyed<Value>>> {
    let content = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let value: Value = serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))?;
    match value {
        Value::Array(records) => Ok(records.into_iter().map(|r| (None, r)).collect()),
        Value::Object(map) if map.values().all(Value::is_object) => {
            Ok(map.into_iter().map(|(key, r)| (Some(key), r)).collect())
        }
        Value::Object(map) => map
            .into_iter()
            .find_map(|(_, v)| match v {
                Value::Array(records) => Some(records.into_iter().map(|r| (None, r)).collect()),
                _ => None,
            })
            .with_context(|| format!("No record array in {}", path.display())),
        _ => anyhow::bail!("Expected a JSON array or object in {}", path.display()),
    }
}

/// Decode each record, skipping and counting the ones that do not fit `T`.
fn decode_records<T: DeserializeOwned>(
    path: &Path,
    records: Vec<Keyed<Value>>,
    stats: &mut ExtractStats,
) -> Vec<Keyed<T>> {
    let mut decoded = Vec::with_capacity(records.len());
    for (index, (key, record)) in records.into_iter().enumerate() {
        match serde_json::from_value(record) {
            Ok(r) => decoded.push((key, r)),
            Err(e) => {
                warn!(file = %path.display(), index, key = ?key, error = %e, "skipped record");
                stats.skipped += 1;
            }
        }
    }
    decoded
}

struct Importer<'a> {
    conn: &'a Connection,
    class_re: Regex,
    /// Short item id to display name, for fluid unit conversion.
    item_names: HashMap<String, String>,
    stats: ExtractStats,
}

impl<'a> Importer<'a> {
    /// Short id of a record: its key in a keyed file, else its class name.
    fn record_id(&mut self, path: &Path, key: Option<String>, class_name: Option<&str>) -> Option<String> {
        let id = key
            .as_deref()
            .or(class_name)
            .map(|c| short_class_id(&self.class_re, c));
        if id.is_none() {
            warn!(file = %path.display(), "skipped record with no id");
            self.stats.skipped += 1;
        }
        id
    }

    fn items(&mut self, path: &Path, records: Vec<Keyed<Value>>) -> Result<()> {
        for (key, record) in decode_records::<ItemRecord>(path, records, &mut self.stats) {
            let Some(id) = self.record_id(path, key, record.class_name.as_deref()) else {
                continue;
            };
            db::upsert_item(
                self.conn,
                &Item {
                    id: id.clone(),
                    name: record.name.clone(),
                    category: record.category,
                },
            )?;
            self.item_names.insert(id, record.name);
            self.stats.items += 1;
        }
        Ok(())
    }

    fn buildings(&mut self, path: &Path, records: Vec<Keyed<Value>>) -> Result<()> {
        for (key, record) in decode_records::<BuildingRecord>(path, records, &mut self.stats) {
            let Some(id) = self.record_id(path, key, record.class_name.as_deref()) else {
                continue;
            };
            db::upsert_building(
                self.conn,
                &Building {
                    id,
                    name: record.name,
                    category: record.category,
                    power_mw: record.power_mw.unwrap_or(0.0),
                },
            )?;
            self.stats.buildings += 1;
        }
        Ok(())
    }

    fn quantity(&self, item_id: &str, amount: f64) -> f64 {
        match self.item_names.get(item_id) {
            Some(name) => normalize_quantity(name, amount),
            None => amount,
        }
    }

    fn recipes(&mut self, path: &Path, records: Vec<Keyed<Value>>) -> Result<()> {
        for (key, record) in decode_records::<RecipeRecord>(path, records, &mut self.stats) {
            let Some(recipe_id) = self.record_id(path, key, record.class_name.as_deref()) else {
                continue;
            };
            db::upsert_recipe(self.conn, &recipe_id, &record.name, record.duration)?;

            let ingredients = record.ingredients.entries();
            for (item, amount) in &ingredients {
                let item_id = short_class_id(&self.class_re, item);
                let quantity = self.quantity(&item_id, *amount);
                db::insert_recipe_ingredient(self.conn, &recipe_id, &item_id, quantity)?;
            }
            for (item, amount) in record.products.entries() {
                let item_id = short_class_id(&self.class_re, item);
                let quantity = self.quantity(&item_id, amount);
                db::insert_recipe_product(self.conn, &recipe_id, &item_id, quantity)?;
            }
            // Exports leave empty slots in the building list.
            for building in record.produced_in.iter().flatten().filter(|b| !b.is_empty()) {
                let building_id = short_class_id(&self.class_re, building);
                db::insert_recipe_building(self.conn, &recipe_id, &building_id)?;
            }

            debug!(recipe = %record.name, inputs = ingredients.len(), "imported recipe");
            self.stats.recipes += 1;
        }
        Ok(())
    }

    fn nodes(&mut self, path: &Path, records: Vec<Keyed<Value>>) -> Result<()> {
        for (_, node) in decode_records::<ResourceNode>(path, records, &mut self.stats) {
            db::insert_resource_node(self.conn, &node)?;
            self.stats.nodes += 1;
        }
        Ok(())
    }
}

/// Import every export file found under `data_dir`
///
/// Items go in first so recipe amounts can be converted by item kind. A file
/// that cannot be read or parsed is logged and counted, not fatal.
pub fn extract_to_database(conn: &Connection, data_dir: &Path) -> Result<ExtractStats> {
    let files = find_data_files(data_dir);
    info!(dir = %data_dir.display(), files = files.len(), "found game-data files");

    let mut importer = Importer {
        conn,
        class_re: class_regex()?,
        item_names: HashMap::new(),
        stats: ExtractStats::default(),
    };

    let pass = |name: &str| -> u8 {
        if ITEM_FILES.contains(&name) {
            0
        } else if name == BUILDING_FILE {
            1
        } else if name == RECIPE_FILE {
            2
        } else {
            3
        }
    };
    let mut ordered: Vec<(u8, &PathBuf)> = files
        .iter()
        .map(|p| (pass(p.file_name().and_then(|n| n.to_str()).unwrap_or_default()), p))
        .collect();
    ordered.sort_by_key(|(rank, _)| *rank);

    for (rank, path) in ordered {
        let records = match read_records(path) {
            Ok(records) => records,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "skipped file");
                importer.stats.errors += 1;
                continue;
            }
        };
        match rank {
            0 => importer.items(path, records)?,
            1 => importer.buildings(path, records)?,
            2 => importer.recipes(path, records)?,
            _ => importer.nodes(path, records)?,
        }
    }

    Ok(importer.stats)
}

#[derive(Debug, Default)]
pub struct ExtractStats {
    pub items: usize,
    pub buildings: usize,
    pub recipes: usize,
    pub nodes: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl std::fmt::Display for ExtractStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Imported {} items, {} buildings, {} recipes, {} resource nodes. Skipped: {}, Errors: {}",
            self.items, self.buildings, self.recipes, self.nodes, self.skipped, self.errors
        )
    }
}
