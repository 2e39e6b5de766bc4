//! Counters for records the pipeline dropped or patched up instead of failing.
//! Every stage returns one of these next to its result and logs it once.
use std::fmt;

use serde::Serialize;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ParseStats {
    pub lines: usize,
    pub unknown_lines: usize,
    pub malformed_lines: usize,
    pub gps_fixes: usize,
    pub measurements: usize,
    pub unanchored_measurements: usize,
    pub matched_points: usize,
    pub unmatched_points: usize,
    pub edge_fallbacks: usize,
    pub segments: usize,
}

impl fmt::Display for ParseStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "lines={} unknown={} malformed={} gps={} measurements={} unanchored={} \
             matched_points={} unmatched_points={} edge_fallbacks={} segments={}",
            self.lines,
            self.unknown_lines,
            self.malformed_lines,
            self.gps_fixes,
            self.measurements,
            self.unanchored_measurements,
            self.matched_points,
            self.unmatched_points,
            self.edge_fallbacks,
            self.segments
        )
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AggregationStats {
    pub rows: usize,
    pub malformed_rows: usize,
    pub ways: usize,
    pub merged_points: usize,
    pub points: usize,
}

impl AggregationStats {
    pub fn absorb(&mut self, other: &AggregationStats) {
        self.rows += other.rows;
        self.malformed_rows += other.malformed_rows;
        self.ways += other.ways;
        self.merged_points += other.merged_points;
        self.points += other.points;
    }
}

impl fmt::Display for AggregationStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rows={} malformed={} ways={} merged_points={} points={}",
            self.rows, self.malformed_rows, self.ways, self.merged_points, self.points
        )
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RidePathStats {
    pub records: usize,
    pub position_fixes: usize,
    pub missing_value: usize,
    pub before_first_fix: usize,
    pub after_last_fix: usize,
    pub throttled: usize,
    pub emitted: usize,
}

impl fmt::Display for RidePathStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "records={} fixes={} missing_value={} before_first_fix={} after_last_fix={} \
             throttled={} emitted={}",
            self.records,
            self.position_fixes,
            self.missing_value,
            self.before_first_fix,
            self.after_last_fix,
            self.throttled,
            self.emitted
        )
    }
}
