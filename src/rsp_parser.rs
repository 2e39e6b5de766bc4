use std::collections::HashMap;

use anyhow::Result;
use geo_types::LineString;
use itertools::Itertools;
use serde::Serialize;
use serde_json::{json, Value};

use crate::diagnostics::ParseStats;
use crate::geo_utils::GpsPoint;
use crate::gps_interpolator::{self, AnchoredInterval, GpsFix};
use crate::map_matching::{MapMatcher, MatchOutcome};

/* Decoder for the line based survey format (`.rsp`). Every line is a comma
separated record whose first field is a numeric line type. Only the line types
below are understood, everything else is skipped. GPS lines give the position
of the vehicle at a distance along the survey, the other types are condition
measurements over a distance interval and carry no position of their own.
*/

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum LineType {
    Gps = 5280,
    Lpe = 5405,
    Iri = 5406,
    Rn = 5407,
    Rutting = 5411,
}

impl LineType {
    pub fn from_code(code: i64) -> Option<LineType> {
        match code {
            5280 => Some(LineType::Gps),
            5405 => Some(LineType::Lpe),
            5406 => Some(LineType::Iri),
            5407 => Some(LineType::Rn),
            5411 => Some(LineType::Rutting),
            _ => None,
        }
    }

    pub fn code(&self) -> u16 {
        *self as u16
    }

    pub fn measurement_type(&self) -> Option<MeasurementType> {
        match self {
            LineType::Gps => None,
            LineType::Lpe => Some(MeasurementType::Lpe),
            LineType::Iri => Some(MeasurementType::Iri),
            LineType::Rn => Some(MeasurementType::Rn),
            LineType::Rutting => Some(MeasurementType::Rutting),
        }
    }
}

#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum MeasurementType {
    Lpe,
    Iri,
    Rn,
    Rutting,
}

#[derive(Clone, Debug, PartialEq)]
pub enum RspField {
    Number(f64),
    Text(String),
}

impl RspField {
    pub fn parse(raw: &str) -> RspField {
        let raw = raw.trim();
        // `NaN` and `inf` parse as f64 but are not numbers in a survey file
        match raw.parse::<f64>() {
            Ok(n) if n.is_finite() => RspField::Number(n),
            _ => RspField::Text(raw.to_owned()),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            RspField::Number(n) => Some(*n),
            RspField::Text(_) => None,
        }
    }
}

pub fn split_fields(line: &str) -> Vec<RspField> {
    line.split(',').map(RspField::parse).collect()
}

#[derive(Clone, Debug, PartialEq)]
pub struct RawGpsRecord {
    pub distance: f64,
    pub status: Option<RspField>,
    pub time: Option<RspField>,
    pub lat: f64,
    pub lon: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RuttingMaxima {
    pub left: Option<f64>,
    pub full: Option<f64>,
    pub right: Option<f64>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RawMeasurement {
    pub kind: MeasurementType,
    pub interval_begin: f64,
    pub interval_end: f64,
    pub left: Option<f64>,
    pub center: f64,
    pub right: Option<f64>,
    // only present on rutting lines
    pub maxima: Option<RuttingMaxima>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum RspRecord {
    Gps(RawGpsRecord),
    Measurement(RawMeasurement),
}

#[derive(Clone, Debug, PartialEq)]
pub enum DecodedLine {
    Blank,
    Unknown,
    Malformed(LineType),
    Record(RspRecord),
}

pub fn decode_line(line: &str) -> DecodedLine {
    if line.trim().is_empty() {
        return DecodedLine::Blank;
    }
    let fields = split_fields(line);
    let line_type = match fields
        .first()
        .and_then(|f| f.as_number())
        .filter(|code| code.fract() == 0.0)
        .and_then(|code| LineType::from_code(code as i64))
    {
        None => return DecodedLine::Unknown,
        Some(line_type) => line_type,
    };

    let number = |i: usize| fields.get(i).and_then(|f| f.as_number());
    let record = match line_type.measurement_type() {
        None => match (number(1), number(5), number(6)) {
            (Some(distance), Some(lat), Some(lon)) => Some(RspRecord::Gps(RawGpsRecord {
                distance,
                status: fields.get(3).cloned(),
                time: fields.get(4).cloned(),
                lat,
                lon,
            })),
            _ => None,
        },
        Some(kind) => match (number(1), number(2), number(4)) {
            (Some(interval_begin), Some(interval_end), Some(center)) => {
                let maxima = if kind == MeasurementType::Rutting {
                    Some(RuttingMaxima {
                        left: number(6),
                        full: number(7),
                        right: number(8),
                    })
                } else {
                    None
                };
                Some(RspRecord::Measurement(RawMeasurement {
                    kind,
                    interval_begin,
                    interval_end,
                    left: number(3),
                    center,
                    right: number(5),
                    maxima,
                }))
            }
            _ => None,
        },
    };

    match record {
        Some(record) => DecodedLine::Record(record),
        None => DecodedLine::Malformed(line_type),
    }
}

/// The decoded content of one file, GPS fixes already sorted by distance.
#[derive(Debug, Default)]
pub struct RspDocument {
    pub gps_fixes: Vec<GpsFix>,
    pub measurements: Vec<RawMeasurement>,
    pub stats: ParseStats,
}

pub fn decode_rsp(text: &str) -> RspDocument {
    let mut document = RspDocument::default();
    for line in text.lines() {
        let decoded = decode_line(line);
        if decoded != DecodedLine::Blank {
            document.stats.lines += 1;
        }
        match decoded {
            DecodedLine::Blank => (),
            DecodedLine::Unknown => document.stats.unknown_lines += 1,
            DecodedLine::Malformed(line_type) => {
                debug!(
                    "[rsp_parser] malformed line of type {}: {}",
                    line_type.code(),
                    line
                );
                document.stats.malformed_lines += 1;
            }
            DecodedLine::Record(RspRecord::Gps(gps)) => document.gps_fixes.push(GpsFix {
                distance: gps.distance,
                lat: gps.lat,
                lon: gps.lon,
            }),
            DecodedLine::Record(RspRecord::Measurement(measurement)) => {
                document.measurements.push(measurement)
            }
        }
    }
    gps_interpolator::sort_by_distance(&mut document.gps_fixes);
    document.stats.gps_fixes = document.gps_fixes.len();
    document.stats.measurements = document.measurements.len();
    document
}

#[derive(Clone, Debug, PartialEq)]
pub struct AnchoredMeasurement {
    pub measurement: RawMeasurement,
    pub anchor: AnchoredInterval,
}

pub fn anchor_measurements(document: &mut RspDocument) -> Vec<AnchoredMeasurement> {
    let fixes = &document.gps_fixes;
    let mut anchored = Vec::with_capacity(document.measurements.len());
    for measurement in &document.measurements {
        match gps_interpolator::anchor_interval(
            fixes,
            measurement.interval_begin,
            measurement.interval_end,
        ) {
            Some(anchor) => anchored.push(AnchoredMeasurement {
                measurement: measurement.clone(),
                anchor,
            }),
            None => document.stats.unanchored_measurements += 1,
        }
    }
    anchored
}

fn point_key(point: &GpsPoint) -> (u64, u64) {
    (point.lat.to_bits(), point.lon.to_bits())
}

/// Every distinct anchor point, in first-seen order. This is the batch that
/// goes to the map matcher.
pub fn distinct_anchor_points(anchored: &[AnchoredMeasurement]) -> Vec<GpsPoint> {
    anchored
        .iter()
        .flat_map(|m| [m.anchor.start.point(), m.anchor.end.point()])
        .unique_by(point_key)
        .collect()
}

#[derive(Clone, Debug, PartialEq)]
pub struct LocatedSegment {
    pub kind: MeasurementType,
    pub value: f64,
    pub start: GpsFix,
    pub end: GpsFix,
    pub way_id: Option<i64>,
    pub names: Vec<String>,
    pub geometry: LineString<f64>,
}

impl LocatedSegment {
    pub fn to_geojson_feature(&self) -> Value {
        let coordinates: Vec<[f64; 2]> = self.geometry.coords().map(|c| [c.x, c.y]).collect();
        json!({
            "type": "Feature",
            "geometry": {
                "type": "LineString",
                "coordinates": coordinates,
            },
            "properties": {
                "type": self.kind,
                "value": self.value,
                "distance01": self.start.distance,
                "distance02": self.end.distance,
                "way_id": self.way_id,
                "names": self.names,
            },
        })
    }
}

/// Attaches the way of each measurement's start point and emits one segment
/// per anchored measurement.
pub fn locate_segments(
    anchored: Vec<AnchoredMeasurement>,
    submitted: &[GpsPoint],
    matched: &MatchOutcome,
    stats: &mut ParseStats,
) -> Vec<LocatedSegment> {
    let by_point: HashMap<(u64, u64), usize> = submitted
        .iter()
        .enumerate()
        .map(|(i, p)| (point_key(p), i))
        .collect();

    let matched_points = matched
        .points
        .iter()
        .filter(|p| p.way_id.is_some())
        .count();
    stats.edge_fallbacks += matched.edge_fallbacks;
    stats.matched_points += matched_points;
    stats.unmatched_points += submitted.len().saturating_sub(matched_points);

    let segments: Vec<LocatedSegment> = anchored
        .into_iter()
        .map(|AnchoredMeasurement { measurement, anchor }| {
            let matched_start = by_point
                .get(&point_key(&anchor.start.point()))
                .and_then(|i| matched.points.get(*i));
            let (way_id, names) = match matched_start {
                Some(p) => (p.way_id, p.names.clone()),
                None => (None, Vec::new()),
            };
            LocatedSegment {
                kind: measurement.kind,
                value: measurement.center,
                start: anchor.start,
                end: anchor.end,
                way_id,
                names,
                geometry: LineString::from(vec![
                    anchor.start.point().to_coord(),
                    anchor.end.point().to_coord(),
                ]),
            }
        })
        .collect();
    stats.segments = segments.len();
    segments
}

#[derive(Debug, Default)]
pub struct ParsedRsp {
    pub segments: Vec<LocatedSegment>,
    pub stats: ParseStats,
}

/// Full pipeline for one file. Only a failing map-matching call is an error,
/// bad lines are dropped and counted.
pub async fn parse_rsp<M: MapMatcher>(text: &str, matcher: &M) -> Result<ParsedRsp> {
    let mut document = decode_rsp(text);
    let anchored = anchor_measurements(&mut document);
    let mut stats = document.stats;

    let submitted = distinct_anchor_points(&anchored);
    let matched = if submitted.is_empty() {
        MatchOutcome::default()
    } else {
        matcher.map_match(&submitted).await?
    };
    let segments = locate_segments(anchored, &submitted, &matched, &mut stats);

    if stats.unknown_lines + stats.malformed_lines + stats.unanchored_measurements > 0
        || stats.edge_fallbacks > 0
    {
        warn!("[rsp_parser] degraded parse: {}", stats);
    } else {
        info!("[rsp_parser] parsed: {}", stats);
    }
    Ok(ParsedRsp { segments, stats })
}
