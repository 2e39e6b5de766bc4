pub mod test_utils;

use road_conditions_core::gps_interpolator::{
    anchor_interval, nearest_anchor, predecessor, sort_by_distance, successor, GpsFix,
};

fn track(distances: &[f64]) -> Vec<GpsFix> {
    let mut fixes: Vec<GpsFix> = distances
        .iter()
        .map(|d| GpsFix {
            distance: *d,
            lat: 55.0 + d / 100_000.0,
            lon: 12.0,
        })
        .collect();
    sort_by_distance(&mut fixes);
    fixes
}

#[test]
fn predecessor_and_successor_bound_every_query() {
    let fixes = track(&[40.0, 0.0, 10.0, 25.0, 10.0, 70.0, 55.0, 90.0]);
    let mut target = -5.0;
    while target <= 95.0 {
        let expected_pred = fixes.iter().filter(|f| f.distance <= target).last();
        let expected_succ = fixes.iter().find(|f| f.distance >= target);
        assert_eq!(
            predecessor(&fixes, target).map(|f| f.distance),
            expected_pred.map(|f| f.distance),
            "predecessor of {target}"
        );
        assert_eq!(
            successor(&fixes, target).map(|f| f.distance),
            expected_succ.map(|f| f.distance),
            "successor of {target}"
        );
        if let (Some(p), Some(s)) = (predecessor(&fixes, target), successor(&fixes, target)) {
            assert!(p.distance <= target && target <= s.distance);
        }
        target += 2.5;
    }
}

#[test]
fn nearest_anchor_is_closest() {
    let fixes = track(&[0.0, 10.0, 30.0, 31.0, 100.0]);
    for target in [0.0, 4.0, 5.0, 6.0, 20.0, 30.4, 30.6, 64.0, 66.0, 150.0, -20.0] {
        let anchor = nearest_anchor(&fixes, target).unwrap();
        let best = fixes
            .iter()
            .map(|f| (f.distance - target).abs())
            .fold(f64::INFINITY, f64::min);
        assert_eq!((anchor.distance - target).abs(), best, "target {target}");
    }
    // equidistant: predecessor wins
    assert_eq!(nearest_anchor(&fixes, 20.0).unwrap().distance, 10.0);
    assert_eq!(nearest_anchor(&fixes, 65.5).unwrap().distance, 31.0);
}

#[test]
fn single_and_no_fix() {
    let one = track(&[42.0]);
    assert_eq!(nearest_anchor(&one, 0.0).unwrap().distance, 42.0);
    assert_eq!(nearest_anchor(&one, 1000.0).unwrap().distance, 42.0);
    assert!(anchor_interval(&[], 0.0, 10.0).is_none());
}

#[test]
fn interval_with_end_before_begin() {
    let fixes = track(&[0.0, 50.0, 100.0]);
    let anchored = anchor_interval(&fixes, 98.0, 2.0).unwrap();
    assert_eq!(anchored.start.distance, 100.0);
    assert_eq!(anchored.end.distance, 0.0);
}
