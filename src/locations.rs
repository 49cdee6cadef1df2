//! Factory site scoring
//!
//! Every map node of a needed resource is tried as a site centre. A centre
//! scores the purity-weighted importance of all needed nodes within the
//! search radius, where importance grows with demand and with how rare the
//! resource is on the map.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::models::{Purity, ResourceNode};
use crate::resources::{extraction_rate, node_type, resource_for_node_type};

/// Minimum distance between two returned sites, in game units (250 m).
pub const MIN_SEPARATION: f64 = 25_000.0;

/// Game units per metre.
const UNITS_PER_METRE: f64 = 100.0;

const RARITY_EXPONENT: f64 = 1.5;

/// Map quadrant; north is negative y, west is negative x.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, clap::ValueEnum)]
#[serde(rename_all = "UPPERCASE")]
#[value(rename_all = "UPPERCASE")]
pub enum Quadrant {
    NE,
    NW,
    SE,
    SW,
}

impl Quadrant {
    pub fn of(x: f64, y: f64) -> Self {
        match (y < 0.0, x < 0.0) {
            (true, true) => Quadrant::NW,
            (true, false) => Quadrant::NE,
            (false, true) => Quadrant::SW,
            (false, false) => Quadrant::SE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn distance(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NearbyNode {
    #[serde(flatten)]
    pub node: ResourceNode,
    pub distance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceDetail {
    pub node_count: usize,
    pub purity_breakdown: BTreeMap<Purity, usize>,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationCandidate {
    pub center: Point,
    pub score: f64,
    pub resources: BTreeMap<String, ResourceDetail>,
    pub nearby_nodes: Vec<NearbyNode>,
}

fn distance(node: &ResourceNode, center: &Point) -> f64 {
    Point { x: node.x, y: node.y }.distance(center)
}

/// Rank candidate sites for a set of critical resources.
///
/// `critical_resources` maps item names ("Iron Ore") to demand per minute.
/// At most `n_results` sites are returned, best first, no two closer than
/// [`MIN_SEPARATION`].
pub fn find_locations(
    nodes: &[ResourceNode],
    critical_resources: &BTreeMap<String, f64>,
    search_radius_m: f64,
    n_results: usize,
    excluded_quadrants: &[Quadrant],
) -> Vec<LocationCandidate> {
    let radius = search_radius_m * UNITS_PER_METRE;

    let mut node_counts: BTreeMap<&str, usize> = BTreeMap::new();
    for n in nodes {
        *node_counts.entry(n.node_type.as_str()).or_default() += 1;
    }
    let max_count = node_counts.values().copied().max().unwrap_or(1) as f64;

    let critical: BTreeMap<String, f64> = critical_resources
        .iter()
        .map(|(resource, demand)| (node_type(resource), *demand))
        .collect();
    let importance: BTreeMap<&str, f64> = critical
        .iter()
        .map(|(t, demand)| {
            let count = node_counts.get(t.as_str()).copied().unwrap_or(1) as f64;
            (t.as_str(), demand * (max_count / count).powf(RARITY_EXPONENT))
        })
        .collect();
    let wanted: BTreeSet<&str> = critical.keys().map(String::as_str).collect();

    let mut scored = Vec::new();
    for center_node in nodes {
        if !wanted.contains(center_node.node_type.as_str()) {
            continue;
        }
        if excluded_quadrants.contains(&Quadrant::of(center_node.x, center_node.y)) {
            continue;
        }
        let center = Point {
            x: center_node.x,
            y: center_node.y,
        };

        let mut nearby: BTreeMap<&str, Vec<NearbyNode>> = wanted.iter().map(|t| (*t, Vec::new())).collect();
        for n in nodes {
            let Some(bucket) = nearby.get_mut(n.node_type.as_str()) else {
                continue;
            };
            let d = distance(n, &center);
            if d <= radius {
                bucket.push(NearbyNode {
                    node: n.clone(),
                    distance: d,
                });
            }
        }
        if nearby.values().any(Vec::is_empty) {
            continue;
        }

        let mut score = 0.0;
        let mut resources = BTreeMap::new();
        for (t, found) in &nearby {
            let weight = importance.get(t).copied().unwrap_or(1.0);
            let type_score: f64 = found.iter().map(|n| n.node.purity.weight() * weight).sum();
            score += type_score;

            let mut purity_breakdown = BTreeMap::new();
            for n in found {
                *purity_breakdown.entry(n.node.purity).or_default() += 1;
            }
            resources.insert(
                resource_for_node_type(t),
                ResourceDetail {
                    node_count: found.len(),
                    purity_breakdown,
                    score: type_score,
                },
            );
        }

        let nearby_nodes: Vec<NearbyNode> = nearby.into_values().flatten().collect();
        let n = nearby_nodes.len() as f64;
        let centroid = Point {
            x: nearby_nodes.iter().map(|c| c.node.x).sum::<f64>() / n,
            y: nearby_nodes.iter().map(|c| c.node.y).sum::<f64>() / n,
        };

        scored.push(LocationCandidate {
            center: centroid,
            score,
            resources,
            nearby_nodes,
        });
    }

    scored.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut results: Vec<LocationCandidate> = Vec::new();
    for candidate in scored {
        if results.len() >= n_results {
            break;
        }
        let too_close = results
            .iter()
            .any(|r| r.center.distance(&candidate.center) < MIN_SEPARATION);
        if !too_close {
            results.push(candidate);
        }
    }
    results
}

/// Extraction capacity a site offers, per resource item name.
pub fn local_capacity(candidate: &LocationCandidate) -> BTreeMap<String, f64> {
    let mut capacity = BTreeMap::new();
    for n in &candidate.nearby_nodes {
        let resource = resource_for_node_type(&n.node.node_type);
        let rate = extraction_rate(&resource, n.node.purity);
        *capacity.entry(resource).or_default() += rate;
    }
    capacity
}
