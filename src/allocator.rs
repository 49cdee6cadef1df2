//! Effort-balanced split of a target rate across factories
//!
//! Each factory pays 1 effort per unit of locally mined resource, the train
//! penalty per unit beyond local capacity and the water penalty per unit of
//! water. The allocator finds one effort level at which the factories'
//! achievable rates sum to the target, then rescales so the sum is exact.

use std::collections::BTreeMap;

use tracing::debug;

use crate::models::{Allocation, Factory};
use crate::resources::WATER;

const MAX_ITERATIONS: usize = 100;
const RELATIVE_TOLERANCE: f64 = 1e-12;

const INNER_RATE_CEILING: f64 = 10_000.0;
const OUTER_EFFORT_CEILING: f64 = 1e9;

/// Effort for a factory producing `rate` units per minute.
pub fn effort(
    demands_per_unit: &BTreeMap<String, f64>,
    local_capacity: &BTreeMap<String, f64>,
    rate: f64,
    train_penalty: f64,
    water_penalty: f64,
) -> f64 {
    let mut total = 0.0;
    for (resource, per_unit) in demands_per_unit {
        let demand = per_unit * rate;
        if resource == WATER {
            total += demand * water_penalty;
            continue;
        }
        let cap = local_capacity.get(resource).copied().unwrap_or(0.0);
        let local_used = demand.min(cap);
        let train_needed = (demand - cap).max(0.0);
        total += local_used + train_needed * train_penalty;
    }
    total
}

/// Bisects a monotone predicate on `[lo, hi]`.
///
/// Returns the bracket after at most [`MAX_ITERATIONS`] halvings, or earlier
/// once it is narrower than the relative tolerance. `pred(mid) == true`
/// moves the lower bound up.
fn bisect(mut lo: f64, mut hi: f64, pred: impl Fn(f64) -> bool) -> (f64, f64) {
    for _ in 0..MAX_ITERATIONS {
        if hi - lo <= RELATIVE_TOLERANCE * hi.abs().max(1.0) {
            break;
        }
        let mid = (lo + hi) / 2.0;
        if pred(mid) {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    (lo, hi)
}

/// Largest rate whose effort stays within `target_effort`, searched on
/// `[0, ceiling]`.
pub fn max_rate_for_effort(
    factory: &Factory,
    target_effort: f64,
    ceiling: f64,
    train_penalty: f64,
    water_penalty: f64,
) -> f64 {
    let within = |rate: f64| {
        effort(
            &factory.demands_per_unit,
            &factory.local_capacity,
            rate,
            train_penalty,
            water_penalty,
        ) <= target_effort
    };
    bisect(0.0, ceiling, within).0
}

fn allocation(factory: &Factory, rate: f64, train_penalty: f64, water_penalty: f64) -> Allocation {
    Allocation {
        theme_id: factory.theme_id.clone(),
        allocated_rate: rate,
        effort: effort(
            &factory.demands_per_unit,
            &factory.local_capacity,
            rate,
            train_penalty,
            water_penalty,
        ),
    }
}

/// Split `target_rate` across `factories` so their efforts balance.
///
/// The returned rates always sum to `target_rate` (or are all zero for a
/// non-positive target). One factory takes the whole target.
pub fn allocate_production(
    factories: &[Factory],
    target_rate: f64,
    train_penalty: f64,
    water_penalty: f64,
) -> Vec<Allocation> {
    if factories.is_empty() {
        return Vec::new();
    }
    if target_rate <= 0.0 {
        return factories
            .iter()
            .map(|f| allocation(f, 0.0, train_penalty, water_penalty))
            .collect();
    }
    if let [only] = factories {
        return vec![allocation(only, target_rate, train_penalty, water_penalty)];
    }

    let ceiling = INNER_RATE_CEILING.max(target_rate);
    let rates_at = |level: f64| -> Vec<f64> {
        factories
            .iter()
            .map(|f| max_rate_for_effort(f, level, ceiling, train_penalty, water_penalty))
            .collect()
    };

    let (_, balanced_effort) = bisect(0.0, OUTER_EFFORT_CEILING, |level| {
        rates_at(level).iter().sum::<f64>() < target_rate
    });
    let raw_rates = rates_at(balanced_effort);
    let total_raw: f64 = raw_rates.iter().sum();
    debug!(balanced_effort, total_raw, target_rate, "effort level found");

    let rates: Vec<f64> = if total_raw > 0.0 {
        let scale = target_rate / total_raw;
        raw_rates.iter().map(|r| r * scale).collect()
    } else {
        vec![target_rate / factories.len() as f64; factories.len()]
    };

    factories
        .iter()
        .zip(rates)
        .map(|(f, rate)| allocation(f, rate, train_penalty, water_penalty))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factory(id: &str, demands: &[(&str, f64)], capacity: &[(&str, f64)]) -> Factory {
        Factory {
            theme_id: id.to_string(),
            demands_per_unit: demands.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            local_capacity: capacity.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        }
    }

    fn total(allocations: &[Allocation]) -> f64 {
        allocations.iter().map(|a| a.allocated_rate).sum()
    }

    #[test]
    fn effort_charges_local_then_train() {
        let demands = BTreeMap::from([("Iron Ore".to_string(), 10.0)]);
        let capacity = BTreeMap::from([("Iron Ore".to_string(), 50.0)]);
        assert_eq!(effort(&demands, &capacity, 4.0, 2.0, 3.0), 40.0);
        // 100 demand: 50 local + 50 by train at 2x
        assert_eq!(effort(&demands, &capacity, 10.0, 2.0, 3.0), 150.0);
    }

    #[test]
    fn water_is_always_penalised() {
        let demands = BTreeMap::from([(WATER.to_string(), 1.0)]);
        let capacity = BTreeMap::from([(WATER.to_string(), 1_000.0)]);
        assert_eq!(effort(&demands, &capacity, 10.0, 2.0, 3.0), 30.0);
    }

    #[test]
    fn max_rate_inverts_effort() {
        let f = factory("a", &[("Iron Ore", 1.0)], &[("Iron Ore", 100.0)]);
        // effort 300 = 100 local + 100 train x2
        let rate = max_rate_for_effort(&f, 300.0, 10_000.0, 2.0, 3.0);
        assert!((rate - 200.0).abs() < 1e-6);
    }

    #[test]
    fn single_factory_takes_everything() {
        let f = factory("solo", &[("Iron Ore", 2.0)], &[("Iron Ore", 10.0)]);
        let result = allocate_production(&[f], 15.0, 2.0, 3.0);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].allocated_rate, 15.0);
        // 30 demand: 10 local + 20 train
        assert_eq!(result[0].effort, 50.0);
    }

    #[test]
    fn rich_site_gets_more() {
        let a = factory("a", &[("Iron Ore", 100.0)], &[("Iron Ore", 5_000.0)]);
        let b = factory("b", &[("Iron Ore", 100.0)], &[("Iron Ore", 500.0)]);
        let result = allocate_production(&[a, b], 20.0, 2.0, 3.0);
        assert!(result[0].allocated_rate > result[1].allocated_rate);
        assert!((total(&result) - 20.0).abs() < 1e-6);
        assert!((result[0].allocated_rate - 35.0 / 3.0).abs() < 1e-3);
        assert!((result[0].effort - result[1].effort).abs() < 1e-3);
    }

    #[test]
    fn conservation_across_uneven_sites() {
        let factories = vec![
            factory("a", &[("Iron Ore", 30.0), (WATER, 5.0)], &[("Iron Ore", 2_000.0)]),
            factory("b", &[("Copper Ore", 12.0)], &[]),
            factory("c", &[("Iron Ore", 7.5), ("Coal", 3.0)], &[("Iron Ore", 60.0), ("Coal", 1_000.0)]),
        ];
        let result = allocate_production(&factories, 95.0, 2.0, 3.0);
        assert_eq!(result.len(), 3);
        assert!((total(&result) - 95.0).abs() < 1e-2);
        assert!(result.iter().all(|a| a.allocated_rate >= 0.0));
    }

    #[test]
    fn higher_train_penalty_favours_self_sufficient_site() {
        let a = factory("a", &[("Iron Ore", 100.0)], &[("Iron Ore", 5_000.0)]);
        let b = factory("b", &[("Iron Ore", 100.0)], &[("Iron Ore", 500.0)]);
        let cheap = allocate_production(&[a.clone(), b.clone()], 20.0, 2.0, 3.0);
        let dear = allocate_production(&[a, b], 20.0, 10.0, 3.0);
        assert!(dear[0].allocated_rate >= cheap[0].allocated_rate);
    }

    #[test]
    fn target_above_inner_ceiling_is_reachable() {
        let a = factory("a", &[("Iron Ore", 0.001)], &[]);
        let b = factory("b", &[("Iron Ore", 0.001)], &[]);
        let result = allocate_production(&[a, b], 50_000.0, 2.0, 3.0);
        assert!((result[0].allocated_rate - 25_000.0).abs() < 1e-3);
        assert!((total(&result) - 50_000.0).abs() < 1e-6);
    }

    #[test]
    fn zero_demand_sites_split_evenly() {
        let a = factory("a", &[], &[]);
        let b = factory("b", &[], &[]);
        let result = allocate_production(&[a, b], 10.0, 2.0, 3.0);
        assert!((result[0].allocated_rate - 5.0).abs() < 1e-9);
        assert!((total(&result) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn degenerate_inputs() {
        assert!(allocate_production(&[], 10.0, 2.0, 3.0).is_empty());
        let f = factory("a", &[("Iron Ore", 1.0)], &[]);
        let zero = allocate_production(&[f.clone(), f], 0.0, 2.0, 3.0);
        assert_eq!(zero.len(), 2);
        assert!(zero.iter().all(|a| a.allocated_rate == 0.0 && a.effort == 0.0));
    }
}
