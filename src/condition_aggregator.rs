use std::collections::BTreeMap;

use anyhow::Result;
use geo_types::{LineString, MultiLineString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::diagnostics::AggregationStats;
use crate::geo_utils::GpsPoint;

/// One stored condition value on a way, as handed over by persistence.
/// `section_geom` is GeoJSON.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawConditionRow {
    pub way_id: i64,
    pub way_length: f64,
    #[serde(rename = "type")]
    pub kind: String,
    pub value: f64,
    pub distance01: f64,
    pub distance02: f64,
    pub section_geom: String,
    #[serde(default)]
    pub data_source: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RawWayCondition {
    pub way_id: i64,
    pub way_length: f64,
    pub kind: String,
    pub value: f64,
    // fractions of the way, 0..1
    pub distance01: f64,
    pub distance02: f64,
    pub start: GpsPoint,
    pub end: GpsPoint,
    pub data_source: Option<String>,
}

// first two vertices of a LineString or of the first line of a MultiLineString
fn section_endpoints(section_geom: &str) -> Result<(GpsPoint, GpsPoint)> {
    let geom: Value = serde_json::from_str(section_geom)?;
    let line = match geom["type"].as_str() {
        Some("MultiLineString") => &geom["coordinates"][0],
        Some("LineString") => &geom["coordinates"],
        other => bail!("unsupported section geometry type: {:?}", other),
    };
    let vertex = |i: usize| -> Result<GpsPoint> {
        let lon = line[i][0].as_f64();
        let lat = line[i][1].as_f64();
        match (lat, lon) {
            (Some(lat), Some(lon)) => Ok(GpsPoint::new(lat, lon)),
            _ => Err(anyhow!("section geometry has no vertex {}", i)),
        }
    };
    Ok((vertex(0)?, vertex(1)?))
}

// Condition values are flattened next to these fields in `ConditionPoint`.
const RESERVED_KINDS: [&str; 4] = ["distance", "lat", "lon", "source"];

impl RawWayCondition {
    pub fn from_row(row: &RawConditionRow) -> Result<Self> {
        if RESERVED_KINDS.contains(&row.kind.as_str()) {
            bail!("condition type {:?} clashes with a point field", row.kind);
        }
        let (start, end) = section_endpoints(&row.section_geom)?;
        Ok(RawWayCondition {
            way_id: row.way_id,
            way_length: row.way_length,
            kind: row.kind.clone(),
            value: row.value,
            distance01: row.distance01,
            distance02: row.distance02,
            start,
            end,
            data_source: row.data_source.clone(),
        })
    }
}

/// Rows with unreadable geometry or a reserved type name are dropped and
/// counted.
pub fn decode_rows(rows: &[RawConditionRow]) -> (Vec<RawWayCondition>, AggregationStats) {
    let mut stats = AggregationStats {
        rows: rows.len(),
        ..Default::default()
    };
    let conditions = rows
        .iter()
        .filter_map(|row| match RawWayCondition::from_row(row) {
            Ok(condition) => Some(condition),
            Err(e) => {
                debug!("[condition_aggregator] dropping row on way {}: {}", row.way_id, e);
                stats.malformed_rows += 1;
                None
            }
        })
        .collect();
    if stats.malformed_rows > 0 {
        warn!(
            "[condition_aggregator] dropped {} of {} malformed rows",
            stats.malformed_rows, stats.rows
        );
    }
    (conditions, stats)
}

#[derive(Clone, Debug, PartialEq)]
pub struct FlatPoint {
    pub distance: f64,
    pub point: GpsPoint,
    pub kind: String,
    pub value: f64,
    pub source: Option<String>,
}

/// A location on a way together with every condition measured there.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ConditionPoint {
    pub distance: f64,
    pub lat: f64,
    pub lon: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(flatten)]
    pub values: BTreeMap<String, f64>,
}

impl ConditionPoint {
    pub fn point(&self) -> GpsPoint {
        GpsPoint::new(self.lat, self.lon)
    }

    pub fn flatten(&self) -> Vec<FlatPoint> {
        self.values
            .iter()
            .map(|(kind, value)| FlatPoint {
                distance: self.distance,
                point: self.point(),
                kind: kind.clone(),
                value: *value,
                source: self.source.clone(),
            })
            .collect()
    }
}

// Distances become hundredths of the way. The coarse key is what lets the
// two ends of neighbouring sections land on the same point.
fn expand(condition: &RawWayCondition) -> [FlatPoint; 2] {
    let flat = |fraction: f64, point: GpsPoint| FlatPoint {
        distance: (fraction * 100.0).round(),
        point,
        kind: condition.kind.clone(),
        value: condition.value,
        source: condition.data_source.clone(),
    };
    [
        flat(condition.distance01, condition.start),
        flat(condition.distance02, condition.end),
    ]
}

/// Left fold over points sorted by distance. A point joins the last emitted
/// one when it shares its coordinates or its distance.
pub fn merge_points(points: impl IntoIterator<Item = FlatPoint>) -> Vec<ConditionPoint> {
    let mut merged: Vec<ConditionPoint> = Vec::new();
    for flat in points {
        let joins_last = merged.last().is_some_and(|last| {
            last.point().same_location(&flat.point) || last.distance == flat.distance
        });
        if let (true, Some(last)) = (joins_last, merged.last_mut()) {
            last.values.insert(flat.kind, flat.value);
            continue;
        }
        let mut values = BTreeMap::new();
        values.insert(flat.kind, flat.value);
        merged.push(ConditionPoint {
            distance: flat.distance,
            lat: flat.point.lat,
            lon: flat.point.lon,
            source: flat.source,
            values,
        });
    }
    merged
}

/// N points give N-1 two-vertex lines.
pub fn stitch(points: &[ConditionPoint]) -> MultiLineString<f64> {
    MultiLineString(
        points
            .windows(2)
            .map(|pair| {
                LineString::from(vec![pair[0].point().to_coord(), pair[1].point().to_coord()])
            })
            .collect(),
    )
}

pub fn multi_line_string_to_geojson(geometry: &MultiLineString<f64>) -> Value {
    let coordinates: Vec<Vec<[f64; 2]>> = geometry
        .0
        .iter()
        .map(|line| line.coords().map(|c| [c.x, c.y]).collect())
        .collect();
    json!({
        "type": "MultiLineString",
        "coordinates": coordinates,
    })
}

#[derive(Clone, Debug, PartialEq)]
pub struct WayResult {
    pub way_id: Option<i64>,
    pub length: f64,
    pub points: Vec<ConditionPoint>,
    pub geometry: MultiLineString<f64>,
    pub stats: AggregationStats,
}

impl WayResult {
    fn first_longitude(&self) -> f64 {
        self.geometry
            .0
            .first()
            .and_then(|line| line.0.first())
            .map(|c| c.x)
            .or_else(|| self.points.first().map(|p| p.lon))
            .unwrap_or(f64::INFINITY)
    }

    pub fn to_json(&self) -> Value {
        json!({
            "way_id": self.way_id,
            "distance": self.length.round(),
            "initial_distance": 0,
            "conditions": self.points,
            "way_geometry": multi_line_string_to_geojson(&self.geometry),
        })
    }
}

pub fn compute_way_conditions(conditions: &[RawWayCondition]) -> WayResult {
    let mut points: Vec<FlatPoint> = conditions.iter().flat_map(expand).collect();
    points.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    let flat_count = points.len();

    let merged = merge_points(points);
    let geometry = stitch(&merged);
    let stats = AggregationStats {
        rows: conditions.len(),
        malformed_rows: 0,
        ways: usize::from(!conditions.is_empty()),
        merged_points: flat_count - merged.len(),
        points: merged.len(),
    };
    debug!("[condition_aggregator] way tier: {}", stats);
    WayResult {
        way_id: conditions.first().map(|c| c.way_id),
        length: conditions.first().map(|c| c.way_length).unwrap_or(0.0),
        points: merged,
        geometry,
        stats,
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RoadResult {
    pub points: Vec<ConditionPoint>,
    pub geometry: MultiLineString<f64>,
    pub total_distance: f64,
    // way ids in output order
    pub way_order: Vec<i64>,
    pub stats: AggregationStats,
}

impl RoadResult {
    pub fn to_json(&self) -> Value {
        json!({
            "road_distance": self.total_distance,
            "initial_distance": 0,
            "road_geometry": multi_line_string_to_geojson(&self.geometry),
            "road": self.points,
        })
    }
}

/// Runs the way tier per way, orders ways west to east by their first vertex
/// and concatenates them. Point distances are shifted by the rounded lengths
/// of the ways before them.
pub fn compute_road_conditions(conditions: &[RawWayCondition]) -> RoadResult {
    let mut by_way: BTreeMap<i64, Vec<RawWayCondition>> = BTreeMap::new();
    for condition in conditions {
        by_way
            .entry(condition.way_id)
            .or_default()
            .push(condition.clone());
    }

    let mut ways: Vec<WayResult> = by_way
        .values()
        .map(|rows| compute_way_conditions(rows))
        .collect();
    // NOTE: longitude order misplaces roads running north-south; ways would
    // need adjacency information to be ordered properly.
    ways.sort_by(|a, b| a.first_longitude().total_cmp(&b.first_longitude()));

    let mut stats = AggregationStats::default();
    let mut points = Vec::new();
    let mut lines = Vec::new();
    let mut way_order = Vec::with_capacity(ways.len());
    let mut total_distance = 0.0;
    for way in ways {
        stats.absorb(&way.stats);
        way_order.extend(way.way_id);
        lines.extend(way.geometry.0);
        points.extend(way.points.into_iter().map(|mut p| {
            p.distance += total_distance;
            p
        }));
        total_distance += way.length.round();
    }

    info!("[condition_aggregator] road tier: {}", stats);
    RoadResult {
        points,
        geometry: MultiLineString(lines),
        total_distance,
        way_order,
        stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_from_geojson() {
        let (start, end) = section_endpoints(
            r#"{"type":"MultiLineString","coordinates":[[[12.5,55.6],[12.6,55.7]]]}"#,
        )
        .unwrap();
        assert_eq!(start, GpsPoint::new(55.6, 12.5));
        assert_eq!(end, GpsPoint::new(55.7, 12.6));

        let (start, _) =
            section_endpoints(r#"{"type":"LineString","coordinates":[[1,2],[3,4]]}"#).unwrap();
        assert_eq!(start, GpsPoint::new(2.0, 1.0));
    }

    #[test]
    fn bad_geojson() {
        assert!(section_endpoints("nope").is_err());
        assert!(section_endpoints(r#"{"type":"Point","coordinates":[1,2]}"#).is_err());
        assert!(
            section_endpoints(r#"{"type":"MultiLineString","coordinates":[[[1,2]]]}"#).is_err()
        );
    }

    #[test]
    fn reserved_kind() {
        let row = |kind: &str| RawConditionRow {
            way_id: 4,
            way_length: 20.0,
            kind: kind.to_owned(),
            value: 1.0,
            distance01: 0.0,
            distance02: 1.0,
            section_geom: r#"{"type":"LineString","coordinates":[[12.5,55.0],[12.6,55.0]]}"#
                .to_owned(),
            data_source: None,
        };
        assert!(RawWayCondition::from_row(&row("lat")).is_err());
        assert!(RawWayCondition::from_row(&row("source")).is_err());

        let (conditions, stats) = decode_rows(&[row("distance"), row("IRI"), row("lon")]);
        assert_eq!(conditions.len(), 1);
        assert_eq!(stats.malformed_rows, 2);

        let result = compute_way_conditions(&conditions);
        let json = serde_json::to_value(&result.points[0]).unwrap();
        assert_eq!(json, json!({"distance": 0.0, "lat": 55.0, "lon": 12.5, "IRI": 1.0}));
    }

    #[test]
    fn expand_rounds_to_hundredths() {
        let condition = RawWayCondition {
            way_id: 1,
            way_length: 50.0,
            kind: "IRI".to_owned(),
            value: 2.0,
            distance01: 0.1234,
            distance02: 0.4567,
            start: GpsPoint::new(55.0, 12.0),
            end: GpsPoint::new(55.1, 12.1),
            data_source: None,
        };
        let [a, b] = expand(&condition);
        assert_eq!(a.distance, 12.0);
        assert_eq!(b.distance, 46.0);
        assert_eq!(a.point, condition.start);
        assert_eq!(b.point, condition.end);
    }

    #[test]
    fn empty_geometry() {
        assert!(stitch(&[]).0.is_empty());
        assert_eq!(
            multi_line_string_to_geojson(&MultiLineString(vec![])),
            json!({"type": "MultiLineString", "coordinates": []})
        );
    }
}
