//! Visitation order for a driver's flexible (untimed) stops.
//!
//! Timed stops are pinned in time order. The flexible stops form an open
//! path after them, anchored at the last located timed stop or, failing
//! that, the driver's starting point. Ordering that path is a travelling
//! salesman path problem; it is solved exactly for small inputs and with
//! nearest neighbour plus 2-opt otherwise.
//!
//! Distances are haversine miles. They ignore the road network, so the
//! result is a good relative ordering, not a navigation-grade route.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::engine::geo::{haversine_miles, path_length, GeoPoint};
use crate::models::{OptimizationMethod, ScheduledEvent};

pub const EXACT_STOP_LIMIT: usize = 8;

const IMPROVEMENT_EPSILON: f64 = 1e-9;
const CANCEL_CHECK_INTERVAL: u64 = 1024;

#[derive(Debug, Clone, Copy)]
pub struct SearchBudget {
    pub max_iterations: u64,
    pub time_limit: Duration,
}

impl Default for SearchBudget {
    fn default() -> Self {
        Self {
            max_iterations: 10_000,
            time_limit: Duration::from_millis(250),
        }
    }
}

pub struct SearchContext {
    budget: SearchBudget,
    cancel: CancellationToken,
    started: Instant,
}

impl SearchContext {
    pub fn new(budget: SearchBudget, cancel: CancellationToken) -> Self {
        Self {
            budget,
            cancel,
            started: Instant::now(),
        }
    }

    fn out_of_time(&self) -> bool {
        self.cancel.is_cancelled() || self.started.elapsed() >= self.budget.time_limit
    }
}

#[derive(Debug, Clone)]
pub struct StrategyResult {
    /// Indices into the input points, in visiting order.
    pub order: Vec<usize>,
    pub method: OptimizationMethod,
    /// False when the search stopped early.
    pub completed: bool,
}

/// Orders an open path over `points`. Implementations must return a
/// permutation of `0..points.len()` and must not panic on any input.
pub trait RouteStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn solve(&self, anchor: Option<GeoPoint>, points: &[GeoPoint], ctx: &SearchContext)
        -> StrategyResult;
}

struct DistanceTable {
    from_anchor: Option<Vec<f64>>,
    between: Vec<Vec<f64>>,
}

impl DistanceTable {
    fn new(anchor: Option<GeoPoint>, points: &[GeoPoint]) -> Self {
        let from_anchor = anchor.map(|a| points.iter().map(|p| haversine_miles(a, *p)).collect());
        let between = points
            .iter()
            .map(|a| points.iter().map(|b| haversine_miles(*a, *b)).collect())
            .collect();
        Self {
            from_anchor,
            between,
        }
    }

    /// Cost of entering `to` from `from`; `None` means the path start.
    fn leg(&self, from: Option<usize>, to: usize) -> f64 {
        match from {
            Some(f) => self.between[f][to],
            None => self.from_anchor.as_ref().map_or(0.0, |d| d[to]),
        }
    }

    fn cost(&self, order: &[usize]) -> f64 {
        let mut total = 0.0;
        let mut prev = None;
        for &i in order {
            total += self.leg(prev, i);
            prev = Some(i);
        }
        total
    }
}

/// Branch-and-bound over all permutations.
pub struct ExactStrategy;

impl RouteStrategy for ExactStrategy {
    fn name(&self) -> &'static str {
        "exact"
    }

    fn solve(
        &self,
        anchor: Option<GeoPoint>,
        points: &[GeoPoint],
        ctx: &SearchContext,
    ) -> StrategyResult {
        let table = DistanceTable::new(anchor, points);
        let identity: Vec<usize> = (0..points.len()).collect();

        let mut search = ExactSearch {
            table: &table,
            ctx,
            best_cost: table.cost(&identity),
            best: identity,
            path: Vec::with_capacity(points.len()),
            used: vec![false; points.len()],
            nodes: 0,
            aborted: false,
        };
        search.descend(0.0);

        StrategyResult {
            order: search.best,
            method: OptimizationMethod::Exact,
            completed: !search.aborted,
        }
    }
}

struct ExactSearch<'a> {
    table: &'a DistanceTable,
    ctx: &'a SearchContext,
    best: Vec<usize>,
    best_cost: f64,
    path: Vec<usize>,
    used: Vec<bool>,
    nodes: u64,
    aborted: bool,
}

impl ExactSearch<'_> {
    fn descend(&mut self, cost: f64) {
        if self.aborted {
            return;
        }
        self.nodes += 1;
        if self.nodes % CANCEL_CHECK_INTERVAL == 0 && self.ctx.cancel.is_cancelled() {
            self.aborted = true;
            return;
        }

        if self.path.len() == self.used.len() {
            if cost + IMPROVEMENT_EPSILON < self.best_cost {
                self.best_cost = cost;
                self.best = self.path.clone();
            }
            return;
        }

        let prev = self.path.last().copied();
        for next in 0..self.used.len() {
            if self.used[next] {
                continue;
            }
            let extended = cost + self.table.leg(prev, next);
            if extended >= self.best_cost {
                continue;
            }
            self.used[next] = true;
            self.path.push(next);
            self.descend(extended);
            self.path.pop();
            self.used[next] = false;
        }
    }
}

/// Nearest-neighbour construction improved by 2-opt segment reversals,
/// bounded by the search budget.
pub struct NearestNeighborTwoOpt;

impl NearestNeighborTwoOpt {
    fn nearest_neighbor(table: &DistanceTable, n: usize, first: Option<usize>) -> Vec<usize> {
        let mut used = vec![false; n];
        let mut order = Vec::with_capacity(n);
        let mut prev = None;

        if let Some(f) = first {
            used[f] = true;
            order.push(f);
            prev = Some(f);
        }

        while order.len() < n {
            let next = (0..n)
                .filter(|&i| !used[i])
                .min_by(|&a, &b| table.leg(prev, a).total_cmp(&table.leg(prev, b)));
            let Some(next) = next else { break };
            used[next] = true;
            order.push(next);
            prev = Some(next);
        }
        order
    }

    /// Returns true if the search ran to a local optimum.
    fn two_opt(table: &DistanceTable, order: &mut [usize], ctx: &SearchContext) -> bool {
        let n = order.len();
        let mut iterations: u64 = 0;

        loop {
            let mut improved = false;

            for i in 0..n.saturating_sub(1) {
                if ctx.out_of_time() {
                    return false;
                }
                let prev = if i == 0 { None } else { Some(order[i - 1]) };

                for k in (i + 1)..n {
                    iterations += 1;
                    if iterations > ctx.budget.max_iterations {
                        return false;
                    }

                    let tail_before = if k + 1 < n {
                        table.between[order[k]][order[k + 1]]
                    } else {
                        0.0
                    };
                    let tail_after = if k + 1 < n {
                        table.between[order[i]][order[k + 1]]
                    } else {
                        0.0
                    };

                    let before = table.leg(prev, order[i]) + tail_before;
                    let after = table.leg(prev, order[k]) + tail_after;

                    if after + IMPROVEMENT_EPSILON < before {
                        order[i..=k].reverse();
                        improved = true;
                    }
                }
            }

            if !improved {
                return true;
            }
        }
    }
}

impl RouteStrategy for NearestNeighborTwoOpt {
    fn name(&self) -> &'static str {
        "nearest_neighbor_2opt"
    }

    fn solve(
        &self,
        anchor: Option<GeoPoint>,
        points: &[GeoPoint],
        ctx: &SearchContext,
    ) -> StrategyResult {
        let n = points.len();
        let table = DistanceTable::new(anchor, points);

        let mut best: Vec<usize> = (0..n).collect();
        let mut best_cost = table.cost(&best);

        // With no anchor every stop is a candidate first stop.
        let seeds: Vec<Option<usize>> = if anchor.is_some() {
            vec![None]
        } else {
            (0..n).map(Some).collect()
        };
        for seed in seeds {
            if ctx.out_of_time() {
                break;
            }
            let candidate = Self::nearest_neighbor(&table, n, seed);
            let cost = table.cost(&candidate);
            if cost + IMPROVEMENT_EPSILON < best_cost {
                best = candidate;
                best_cost = cost;
            }
        }

        let completed = Self::two_opt(&table, &mut best, ctx);

        StrategyResult {
            order: best,
            method: OptimizationMethod::Heuristic,
            completed,
        }
    }
}

/// Exact search up to [`EXACT_STOP_LIMIT`] stops, heuristic beyond.
pub struct AutoStrategy {
    exact: ExactStrategy,
    heuristic: NearestNeighborTwoOpt,
}

impl Default for AutoStrategy {
    fn default() -> Self {
        Self {
            exact: ExactStrategy,
            heuristic: NearestNeighborTwoOpt,
        }
    }
}

impl RouteStrategy for AutoStrategy {
    fn name(&self) -> &'static str {
        "auto"
    }

    fn solve(
        &self,
        anchor: Option<GeoPoint>,
        points: &[GeoPoint],
        ctx: &SearchContext,
    ) -> StrategyResult {
        if points.len() <= EXACT_STOP_LIMIT {
            self.exact.solve(anchor, points, ctx)
        } else {
            self.heuristic.solve(anchor, points, ctx)
        }
    }
}

#[derive(Debug, Clone)]
pub struct Plan {
    /// Full stop order: pinned, then optimized flexible, then unplaceable.
    pub ordered: Vec<ScheduledEvent>,
    pub flexible_order: Vec<Uuid>,
    pub unplaceable: Vec<Uuid>,
    pub flexible_distance_miles: f64,
    pub baseline_distance_miles: f64,
    pub method: OptimizationMethod,
    pub degraded: bool,
}

/// Reorders the flexible tail of an already ordered day.
///
/// Never fails and never returns a longer flexible path than the input
/// order; a search that was cut short keeps the best order it had.
pub fn plan_route(
    ordered: Vec<ScheduledEvent>,
    start: Option<GeoPoint>,
    strategy: &dyn RouteStrategy,
    ctx: &SearchContext,
) -> Plan {
    let mut pinned = Vec::new();
    let mut flexible = Vec::new();
    let mut unplaceable = Vec::new();

    for event in ordered {
        match (event.scheduled_time.is_some(), event.location()) {
            (true, _) => pinned.push(event),
            (false, Some(_)) => flexible.push(event),
            (false, None) => unplaceable.push(event),
        }
    }

    let anchor = pinned
        .iter()
        .rev()
        .find_map(|e| e.location())
        .or(start);
    let points: Vec<GeoPoint> = flexible.iter().filter_map(|e| e.location()).collect();
    let baseline = path_length(anchor, &points);

    let (order, method, degraded): (Vec<usize>, OptimizationMethod, bool) = if points.len() < 2 {
        ((0..points.len()).collect(), OptimizationMethod::Unchanged, false)
    } else {
        let result = strategy.solve(anchor, &points, ctx);
        let order = if is_permutation(&result.order, points.len()) {
            result.order
        } else {
            warn!(
                "Strategy '{}' returned an invalid order; keeping input order",
                strategy.name()
            );
            (0..points.len()).collect()
        };

        let ordered_points: Vec<GeoPoint> = order.iter().map(|&i| points[i]).collect();
        if path_length(anchor, &ordered_points) > baseline + IMPROVEMENT_EPSILON {
            ((0..points.len()).collect(), result.method, true)
        } else {
            (order, result.method, !result.completed)
        }
    };

    let mut slots: Vec<Option<ScheduledEvent>> = flexible.into_iter().map(Some).collect();
    let reordered: Vec<ScheduledEvent> = order.iter().filter_map(|&i| slots[i].take()).collect();
    let reordered_points: Vec<GeoPoint> = reordered.iter().filter_map(|e| e.location()).collect();
    let flexible_distance = path_length(anchor, &reordered_points);

    debug!(
        "Planned {} flexible stop(s) with {:?}: {:.2} mi (baseline {:.2} mi)",
        reordered.len(),
        method,
        flexible_distance,
        baseline
    );

    let flexible_order = reordered.iter().map(|e| e.event_id).collect();
    let unplaceable_ids = unplaceable.iter().map(|e| e.event_id).collect();

    let mut all = pinned;
    all.extend(reordered);
    all.extend(unplaceable);

    Plan {
        ordered: all,
        flexible_order,
        unplaceable: unplaceable_ids,
        flexible_distance_miles: flexible_distance,
        baseline_distance_miles: baseline,
        method,
        degraded,
    }
}

/// Baseline plan used when the search task itself failed.
pub fn unoptimized(ordered: Vec<ScheduledEvent>, start: Option<GeoPoint>) -> Plan {
    let cancelled = CancellationToken::new();
    cancelled.cancel();
    let ctx = SearchContext::new(SearchBudget::default(), cancelled);
    let mut plan = plan_route(ordered, start, &KeepOrder, &ctx);
    plan.degraded = true;
    plan
}

struct KeepOrder;

impl RouteStrategy for KeepOrder {
    fn name(&self) -> &'static str {
        "keep_order"
    }

    fn solve(&self, _: Option<GeoPoint>, points: &[GeoPoint], _: &SearchContext) -> StrategyResult {
        StrategyResult {
            order: (0..points.len()).collect(),
            method: OptimizationMethod::Unchanged,
            completed: false,
        }
    }
}

pub fn default_strategy() -> Arc<dyn RouteStrategy> {
    Arc::new(AutoStrategy::default())
}

fn is_permutation(order: &[usize], n: usize) -> bool {
    if order.len() != n {
        return false;
    }
    let mut seen = vec![false; n];
    for &i in order {
        if i >= n || seen[i] {
            return false;
        }
        seen[i] = true;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_event;
    use chrono::NaiveTime;

    fn ctx() -> SearchContext {
        SearchContext::new(SearchBudget::default(), CancellationToken::new())
    }

    fn flexible_at(lat: f64, lon: f64) -> ScheduledEvent {
        let mut event = sample_event("driver-a");
        event.scheduled_time = None;
        event.gps_latitude = Some(lat);
        event.gps_longitude = Some(lon);
        event
    }

    #[test]
    fn test_fewer_than_two_flexible_is_noop() {
        let one = flexible_at(34.7, -86.6);
        let plan = plan_route(vec![one.clone()], None, &AutoStrategy::default(), &ctx());

        assert_eq!(plan.method, OptimizationMethod::Unchanged);
        assert_eq!(plan.flexible_order, vec![one.event_id]);
        assert!(!plan.degraded);
    }

    #[test]
    fn test_line_is_visited_in_order_from_anchor() {
        let far = flexible_at(34.90, -86.60);
        let near = flexible_at(34.72, -86.60);
        let mid = flexible_at(34.80, -86.60);
        let start = GeoPoint::new(34.70, -86.60);

        let plan = plan_route(
            vec![far.clone(), near.clone(), mid.clone()],
            Some(start),
            &AutoStrategy::default(),
            &ctx(),
        );

        assert_eq!(plan.method, OptimizationMethod::Exact);
        assert_eq!(plan.flexible_order, vec![near.event_id, mid.event_id, far.event_id]);
        assert!(plan.flexible_distance_miles < plan.baseline_distance_miles);
    }

    #[test]
    fn test_pinned_stops_stay_first_and_anchor_the_path() {
        let mut pinned = flexible_at(34.90, -86.60);
        pinned.scheduled_time = NaiveTime::from_hms_opt(9, 0, 0);
        let near_pinned = flexible_at(34.88, -86.60);
        let far_from_pinned = flexible_at(34.70, -86.60);

        let plan = plan_route(
            vec![pinned.clone(), far_from_pinned.clone(), near_pinned.clone()],
            Some(GeoPoint::new(34.70, -86.60)),
            &AutoStrategy::default(),
            &ctx(),
        );

        assert_eq!(plan.ordered[0].event_id, pinned.event_id);
        assert_eq!(
            plan.flexible_order,
            vec![near_pinned.event_id, far_from_pinned.event_id]
        );
    }

    #[test]
    fn test_unlocated_flexible_is_unplaceable() {
        let a = flexible_at(34.70, -86.60);
        let b = flexible_at(34.80, -86.60);
        let mut lost = sample_event("driver-a");
        lost.scheduled_time = None;
        lost.gps_latitude = None;
        lost.gps_longitude = None;

        let plan = plan_route(
            vec![lost.clone(), a, b],
            None,
            &AutoStrategy::default(),
            &ctx(),
        );

        assert_eq!(plan.unplaceable, vec![lost.event_id]);
        assert_eq!(plan.ordered.last().unwrap().event_id, lost.event_id);
        assert_eq!(plan.ordered.len(), 3);
    }

    #[test]
    fn test_heuristic_used_above_exact_limit() {
        let events: Vec<_> = (0..12)
            .map(|i| flexible_at(34.70 + (i as f64 * 0.37).sin() * 0.1, -86.60 + i as f64 * 0.01))
            .collect();

        let plan = plan_route(events, None, &AutoStrategy::default(), &ctx());

        assert_eq!(plan.method, OptimizationMethod::Heuristic);
        assert_eq!(plan.flexible_order.len(), 12);
        assert!(plan.flexible_distance_miles <= plan.baseline_distance_miles + 1e-9);
    }

    #[test]
    fn test_cancelled_search_still_returns_a_route() {
        let events: Vec<_> = (0..20)
            .map(|i| flexible_at(34.70 + (i as f64 * 1.3).cos() * 0.2, -86.60 + (i as f64 * 0.7).sin() * 0.2))
            .collect();
        let token = CancellationToken::new();
        token.cancel();
        let ctx = SearchContext::new(SearchBudget::default(), token);

        let plan = plan_route(events, None, &NearestNeighborTwoOpt, &ctx);

        assert!(plan.degraded);
        assert_eq!(plan.flexible_order.len(), 20);
        assert!(plan.flexible_distance_miles <= plan.baseline_distance_miles + 1e-9);
    }

    #[test]
    fn test_unoptimized_keeps_input_order() {
        let a = flexible_at(34.90, -86.60);
        let b = flexible_at(34.70, -86.60);
        let c = flexible_at(34.80, -86.60);

        let plan = unoptimized(vec![a.clone(), b.clone(), c.clone()], None);

        assert!(plan.degraded);
        assert_eq!(plan.flexible_order, vec![a.event_id, b.event_id, c.event_id]);
    }

    #[test]
    fn test_is_permutation() {
        assert!(is_permutation(&[2, 0, 1], 3));
        assert!(!is_permutation(&[0, 0, 1], 3));
        assert!(!is_permutation(&[0, 1], 3));
        assert!(!is_permutation(&[0, 1, 3], 3));
    }
}
