use fieldroute::engine::geo::{haversine_miles, path_length, GeoPoint};
use fieldroute::engine::optimizer::{SearchBudget, SearchContext};
use fieldroute::engine::{AutoStrategy, ExactStrategy, NearestNeighborTwoOpt, RouteStrategy};
use proptest::prelude::*;
use tokio_util::sync::CancellationToken;

fn ctx() -> SearchContext {
    SearchContext::new(SearchBudget::default(), CancellationToken::new())
}

fn point() -> impl Strategy<Value = GeoPoint> {
    (34.0f64..35.5, -87.5f64..-86.0).prop_map(|(lat, lon)| GeoPoint::new(lat, lon))
}

fn cost(anchor: Option<GeoPoint>, points: &[GeoPoint], order: &[usize]) -> f64 {
    let ordered: Vec<GeoPoint> = order.iter().map(|&i| points[i]).collect();
    path_length(anchor, &ordered)
}

fn is_permutation(order: &[usize], n: usize) -> bool {
    let mut sorted = order.to_vec();
    sorted.sort_unstable();
    sorted == (0..n).collect::<Vec<_>>()
}

fn brute_force(anchor: Option<GeoPoint>, points: &[GeoPoint]) -> f64 {
    fn walk(
        anchor: Option<GeoPoint>,
        points: &[GeoPoint],
        order: &mut Vec<usize>,
        used: &mut Vec<bool>,
        best: &mut f64,
    ) {
        if order.len() == points.len() {
            *best = best.min(cost(anchor, points, order));
            return;
        }
        for i in 0..points.len() {
            if used[i] {
                continue;
            }
            used[i] = true;
            order.push(i);
            walk(anchor, points, order, used, best);
            order.pop();
            used[i] = false;
        }
    }

    let mut best = f64::MAX;
    walk(
        anchor,
        points,
        &mut Vec::new(),
        &mut vec![false; points.len()],
        &mut best,
    );
    best
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_strategies_return_permutations_no_longer_than_input(
        anchor in proptest::option::of(point()),
        points in proptest::collection::vec(point(), 0..14),
    ) {
        let strategies: [&dyn RouteStrategy; 3] =
            [&ExactStrategy, &NearestNeighborTwoOpt, &AutoStrategy::default()];
        let baseline = path_length(anchor, &points);

        for strategy in strategies {
            if strategy.name() == "exact" && points.len() > 8 {
                continue;
            }
            let result = strategy.solve(anchor, &points, &ctx());
            prop_assert!(is_permutation(&result.order, points.len()));
            prop_assert!(cost(anchor, &points, &result.order) <= baseline + 1e-6);
        }
    }

    #[test]
    fn test_exact_matches_brute_force(
        anchor in proptest::option::of(point()),
        points in proptest::collection::vec(point(), 1..7),
    ) {
        let result = ExactStrategy.solve(anchor, &points, &ctx());
        let found = cost(anchor, &points, &result.order);
        let optimal = brute_force(anchor, &points);

        prop_assert!(result.completed);
        prop_assert!((found - optimal).abs() < 1e-6, "found {found}, optimal {optimal}");
    }

    #[test]
    fn test_haversine_is_a_metric(a in point(), b in point(), c in point()) {
        prop_assert!(haversine_miles(a, a).abs() < 1e-9);
        prop_assert!((haversine_miles(a, b) - haversine_miles(b, a)).abs() < 1e-9);
        prop_assert!(haversine_miles(a, c) <= haversine_miles(a, b) + haversine_miles(b, c) + 1e-6);
    }
}
