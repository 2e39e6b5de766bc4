use serde::Serialize;

use crate::geo_utils::GpsPoint;

/// A GPS fix with its distance along the surveyed track.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct GpsFix {
    pub distance: f64,
    pub lat: f64,
    pub lon: f64,
}

impl GpsFix {
    pub fn point(&self) -> GpsPoint {
        GpsPoint::new(self.lat, self.lon)
    }
}

pub fn sort_by_distance(fixes: &mut [GpsFix]) {
    // stable, so fixes sharing a distance keep their file order
    fixes.sort_by(|a, b| a.distance.total_cmp(&b.distance));
}

// The two searches below halve `[lo, hi)` recursively. `fixes` must be
// sorted by distance.

/// Closest fix with `distance <= target`.
pub fn predecessor(fixes: &[GpsFix], target: f64) -> Option<&GpsFix> {
    predecessor_in(fixes, target, 0, fixes.len())
}

fn predecessor_in(fixes: &[GpsFix], target: f64, lo: usize, hi: usize) -> Option<&GpsFix> {
    if lo >= hi {
        return None;
    }
    let m = lo + (hi - lo) / 2;
    let fix = &fixes[m];
    if fix.distance == target {
        Some(fix)
    } else if fix.distance > target {
        predecessor_in(fixes, target, lo, m)
    } else {
        predecessor_in(fixes, target, m + 1, hi).or(Some(fix))
    }
}

/// Closest fix with `distance >= target`.
pub fn successor(fixes: &[GpsFix], target: f64) -> Option<&GpsFix> {
    successor_in(fixes, target, 0, fixes.len())
}

fn successor_in(fixes: &[GpsFix], target: f64, lo: usize, hi: usize) -> Option<&GpsFix> {
    if lo >= hi {
        return None;
    }
    let m = lo + (hi - lo) / 2;
    let fix = &fixes[m];
    if fix.distance == target {
        Some(fix)
    } else if fix.distance < target {
        successor_in(fixes, target, m + 1, hi)
    } else {
        successor_in(fixes, target, lo, m).or(Some(fix))
    }
}

/// Picks whichever of predecessor/successor is closer to `target`. On a tie
/// the predecessor wins. This is the nearest fix, not a bracketing pair.
pub fn nearest_anchor(fixes: &[GpsFix], target: f64) -> Option<&GpsFix> {
    match (predecessor(fixes, target), successor(fixes, target)) {
        (None, None) => None,
        (Some(p), None) => Some(p),
        (None, Some(s)) => Some(s),
        (Some(p), Some(s)) => {
            if (target - p.distance).abs() > (target - s.distance).abs() {
                Some(s)
            } else {
                Some(p)
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnchoredInterval {
    pub start: GpsFix,
    pub end: GpsFix,
}

/// Anchors `[interval_begin, interval_end]` to its nearest fixes. `None` only
/// when there are no fixes at all.
pub fn anchor_interval(
    fixes: &[GpsFix],
    interval_begin: f64,
    interval_end: f64,
) -> Option<AnchoredInterval> {
    let start = nearest_anchor(fixes, interval_begin)?;
    let end = nearest_anchor(fixes, interval_end)?;
    Some(AnchoredInterval {
        start: *start,
        end: *end,
    })
}
