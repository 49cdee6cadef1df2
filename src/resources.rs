//! Static resource tables: what counts as raw, what flows in pipes,
//! how rare each resource is on the map and how fast a node can be tapped.

use crate::models::Purity;

/// Extractable inputs with no producing recipe. Graph resolution stops here.
pub const RAW_RESOURCES: [&str; 13] = [
    "Iron Ore",
    "Copper Ore",
    "Limestone",
    "Coal",
    "Caterium Ore",
    "Raw Quartz",
    "Sulfur",
    "Bauxite",
    "Uranium",
    "Crude Oil",
    "Water",
    "Nitrogen Gas",
    "SAM",
];

/// Items carried by pipe. Quantities are in m3 once imported.
pub const FLUID_ITEMS: [&str; 9] = [
    "Water",
    "Crude Oil",
    "Heavy Oil Residue",
    "Alumina Solution",
    "Sulfuric Acid",
    "Nitric Acid",
    "Fuel",
    "Turbofuel",
    "Nitrogen Gas",
];

/// Always available, so it never decides a theme.
pub const WATER: &str = "Water";

/// Node count used for resources missing from the rarity table.
pub const DEFAULT_NODE_COUNT: u32 = 999;

const NODE_COUNTS: [(&str, u32); 13] = [
    ("Iron Ore", 163),
    ("Limestone", 72),
    ("Copper Ore", 50),
    ("Coal", 43),
    ("Caterium Ore", 16),
    ("Raw Quartz", 17),
    ("Sulfur", 15),
    ("Bauxite", 14),
    ("Crude Oil", 18),
    ("Uranium", 5),
    ("Nitrogen Gas", 13),
    ("SAM", 25),
    ("Water", 999),
];

const NODE_TYPES: [(&str, &str); 13] = [
    ("Iron Ore", "iron"),
    ("Copper Ore", "copper"),
    ("Limestone", "limestone"),
    ("Coal", "coal"),
    ("Caterium Ore", "caterium"),
    ("Raw Quartz", "quartz"),
    ("Sulfur", "sulfur"),
    ("Bauxite", "bauxite"),
    ("Uranium", "uranium"),
    ("Crude Oil", "oil"),
    ("Water", "water"),
    ("Nitrogen Gas", "nitrogen-gas"),
    ("SAM", "sam"),
];

// Mk.3 miner at 250%, capped by a Mk.5 belt (780/min).
const BELT_CAP: f64 = 780.0;
const MINER_BASE: [f64; 3] = [120.0, 240.0, 480.0];

// Extractor at 250%, capped by a Mk.2 pipe (600 m3/min).
const PIPE_CAP: f64 = 600.0;
const EXTRACTOR_BASE: [f64; 3] = [60.0, 120.0, 240.0];

const OVERCLOCK: f64 = 2.5;

pub fn is_raw(item: &str) -> bool {
    RAW_RESOURCES.contains(&item)
}

pub fn is_fluid(item: &str) -> bool {
    FLUID_ITEMS.contains(&item)
}

/// Number of nodes of this resource on the map; lower is rarer.
pub fn node_count(resource: &str) -> u32 {
    NODE_COUNTS
        .iter()
        .find(|(name, _)| *name == resource)
        .map_or(DEFAULT_NODE_COUNT, |(_, count)| *count)
}

/// Map node type for an item name ("Iron Ore" -> "iron").
pub fn node_type(resource: &str) -> String {
    NODE_TYPES
        .iter()
        .find(|(name, _)| *name == resource)
        .map_or_else(|| resource.to_lowercase(), |(_, t)| t.to_string())
}

/// Item name for a map node type ("iron" -> "Iron Ore"). Unknown types pass through.
pub fn resource_for_node_type(node_type: &str) -> String {
    NODE_TYPES
        .iter()
        .find(|(_, t)| *t == node_type)
        .map_or_else(|| node_type.to_string(), |(name, _)| name.to_string())
}

/// Sustained extraction rate of one node, items/min for solids, m3/min for fluids.
pub fn extraction_rate(resource: &str, purity: Purity) -> f64 {
    let tier = match purity {
        Purity::Impure => 0,
        Purity::Normal => 1,
        Purity::Pure => 2,
    };
    if is_fluid(resource) {
        (EXTRACTOR_BASE[tier] * OVERCLOCK).min(PIPE_CAP)
    } else {
        (MINER_BASE[tier] * OVERCLOCK).min(BELT_CAP)
    }
}

/// The game stores fluid amounts in litres; the planner works in m3.
pub fn normalize_quantity(item: &str, quantity: f64) -> f64 {
    if is_fluid(item) && quantity >= 1000.0 {
        quantity / 1000.0
    } else {
        quantity
    }
}
