use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::PipelineConfig;
use crate::diagnostics::RidePathStats;
use crate::geo_utils::{lerp, GpsPoint};

/* Rebuilds the path of one sensor channel over one trip. Only the position
channel has coordinates, every other channel is placed on the track by linear
interpolation in time between the two position fixes around it.
*/

/// A trip record as stored: `message` is the JSON payload of the sensor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawTripRow {
    pub tag: String,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub message: Option<String>,
}

pub type ChannelValues = BTreeMap<String, f64>;

// Keeps numeric top-level entries only. A payload that does not parse is
// treated as carrying no values.
pub fn decode_payload(message: Option<&str>) -> ChannelValues {
    let parsed = match message.map(serde_json::from_str::<Value>) {
        Some(Ok(Value::Object(map))) => map,
        Some(Err(e)) => {
            debug!("[ride_path] unreadable payload: {}", e);
            return ChannelValues::new();
        }
        _ => return ChannelValues::new(),
    };
    parsed
        .into_iter()
        .filter_map(|(key, value)| value.as_f64().map(|v| (key, v)))
        .collect()
}

#[derive(Clone, Debug, PartialEq)]
pub struct PositionRecord {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub time: Option<DateTime<Utc>>,
    pub values: ChannelValues,
}

impl PositionRecord {
    fn resolve(&self) -> Option<(GpsPoint, DateTime<Utc>)> {
        match (self.lat, self.lon, self.time) {
            (Some(lat), Some(lon), Some(time)) => Some((GpsPoint::new(lat, lon), time)),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChannelRecord {
    pub tag: String,
    pub time: Option<DateTime<Utc>>,
    pub values: ChannelValues,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TripRecord {
    Position(PositionRecord),
    Channel(ChannelRecord),
}

impl TripRecord {
    pub fn from_row(row: &RawTripRow, position_channel: &str) -> TripRecord {
        let values = decode_payload(row.message.as_deref());
        if row.tag == position_channel {
            TripRecord::Position(PositionRecord {
                lat: row.lat,
                lon: row.lon,
                time: row.timestamp,
                values,
            })
        } else {
            TripRecord::Channel(ChannelRecord {
                tag: row.tag.clone(),
                time: row.timestamp,
                values,
            })
        }
    }
}

pub fn decode_rows(rows: &[RawTripRow], position_channel: &str) -> Vec<TripRecord> {
    rows.iter()
        .map(|row| TripRecord::from_row(row, position_channel))
        .collect()
}

/// Which records a channel name refers to and where its value sits in the
/// payload. The accelerometer axes share the `acc.xyz` records.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelSelector {
    pub name: String,
    pub tag: String,
    pub value_key: String,
}

impl ChannelSelector {
    pub fn new(name: &str) -> Self {
        match name {
            "acc.xyz.x" | "acc.xyz.y" | "acc.xyz.z" => ChannelSelector {
                name: name.to_owned(),
                tag: "acc.xyz".to_owned(),
                value_key: name.to_owned(),
            },
            _ => ChannelSelector {
                name: name.to_owned(),
                tag: name.to_owned(),
                value_key: format!("{name}.value"),
            },
        }
    }

    fn value_of(&self, values: &ChannelValues) -> Option<f64> {
        values.get(&self.value_key).copied()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrackFix {
    pub lat: f64,
    pub lon: f64,
    pub time_ms: i64,
    pub cum_distance: f64,
}

impl TrackFix {
    fn point(&self) -> GpsPoint {
        GpsPoint::new(self.lat, self.lon)
    }

    fn next(&self, point: GpsPoint, time: DateTime<Utc>) -> TrackFix {
        TrackFix {
            lat: point.lat,
            lon: point.lon,
            time_ms: time.timestamp_millis(),
            cum_distance: self.cum_distance + self.point().haversine_distance(&point),
        }
    }

    // falls back to `self` when the two fixes share a timestamp
    fn interpolate(&self, other: &TrackFix, time_ms: i64) -> (f64, f64, f64) {
        let delta = other.time_ms - self.time_ms;
        if delta > 0 {
            let fraction = (time_ms - self.time_ms) as f64 / delta as f64;
            (
                lerp(self.lat, other.lat, fraction),
                lerp(self.lon, other.lon, fraction),
                lerp(self.cum_distance, other.cum_distance, fraction),
            )
        } else {
            (self.lat, self.lon, self.cum_distance)
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PathPoint {
    pub lat: f64,
    pub lng: f64,
    pub value: f64,
    #[serde(rename = "type")]
    pub kind: String,
    pub absolute_time: DateTime<Utc>,
    pub relative_time_ms: i64,
    pub distance: f64,
}

/// x is relative time in ms, y is the channel value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct BoundedPath {
    pub path: Vec<PathPoint>,
    pub bounds: Bounds,
    #[serde(skip)]
    pub stats: RidePathStats,
}

impl BoundedPath {
    fn push(&mut self, point: PathPoint) {
        let x = point.relative_time_ms as f64;
        let y = point.value;
        if self.path.is_empty() {
            self.bounds = Bounds {
                min_x: x,
                max_x: x,
                min_y: y,
                max_y: y,
            };
        } else {
            self.bounds.min_x = self.bounds.min_x.min(x);
            self.bounds.max_x = self.bounds.max_x.max(x);
            self.bounds.min_y = self.bounds.min_y.min(y);
            self.bounds.max_y = self.bounds.max_y.max(y);
        }
        self.stats.emitted += 1;
        self.path.push(point);
    }
}

/// `records` must be in time order. Never fails: records that cannot be
/// placed are skipped and counted in `stats`.
pub fn build_ride_path(
    records: &[TripRecord],
    channel: &str,
    config: &PipelineConfig,
) -> BoundedPath {
    let selector = ChannelSelector::new(channel);
    let result = if channel == config.position_channel {
        build_position_path(records, &selector)
    } else {
        build_interpolated_path(records, &selector, config.throttle_interval_ms)
    };
    info!("[ride_path] channel {}: {}", channel, result.stats);
    result
}

// The position channel is its own track, so every fix is emitted as is.
fn build_position_path(records: &[TripRecord], selector: &ChannelSelector) -> BoundedPath {
    let mut result = BoundedPath::default();
    result.stats.records = records.len();
    let mut last_fix: Option<TrackFix> = None;
    let mut first_time_ms: Option<i64> = None;

    for record in records {
        let position = match record {
            TripRecord::Position(position) => position,
            TripRecord::Channel(_) => continue,
        };
        let (point, time) = match position.resolve() {
            Some(x) => x,
            None => continue,
        };
        result.stats.position_fixes += 1;
        let fix = match &last_fix {
            None => TrackFix {
                lat: point.lat,
                lon: point.lon,
                time_ms: time.timestamp_millis(),
                cum_distance: 0.0,
            },
            Some(prev) => prev.next(point, time),
        };
        last_fix = Some(fix);
        // relative time counts from the first fix, with or without a value
        let start_ms = *first_time_ms.get_or_insert(fix.time_ms);

        let value = match selector.value_of(&position.values) {
            Some(value) => value,
            None => {
                result.stats.missing_value += 1;
                continue;
            }
        };
        result.push(PathPoint {
            lat: fix.lat,
            lng: fix.lon,
            value,
            kind: selector.name.clone(),
            absolute_time: time,
            relative_time_ms: fix.time_ms - start_ms,
            distance: fix.cum_distance,
        });
    }
    result
}

fn build_interpolated_path(
    records: &[TripRecord],
    selector: &ChannelSelector,
    throttle_interval_ms: i64,
) -> BoundedPath {
    let mut result = BoundedPath::default();
    result.stats.records = records.len();

    let mut pos1: Option<TrackFix> = None;
    let mut start_time_ms = 0;
    let mut last_emitted_ms: Option<i64> = None;
    // target channel messages seen since `pos1`
    let mut pending: Vec<(f64, DateTime<Utc>)> = Vec::new();

    for record in records {
        match record {
            TripRecord::Channel(message) => {
                if message.tag != selector.tag {
                    continue;
                }
                match (selector.value_of(&message.values), message.time) {
                    (Some(value), Some(time)) => pending.push((value, time)),
                    _ => result.stats.missing_value += 1,
                }
            }
            TripRecord::Position(position) => {
                let (point, time) = match position.resolve() {
                    Some(x) => x,
                    None => continue,
                };
                result.stats.position_fixes += 1;
                let prev = match pos1 {
                    Some(prev) => prev,
                    None => {
                        result.stats.before_first_fix += pending.len();
                        pending.clear();
                        start_time_ms = time.timestamp_millis();
                        pos1 = Some(TrackFix {
                            lat: point.lat,
                            lon: point.lon,
                            time_ms: start_time_ms,
                            cum_distance: 0.0,
                        });
                        continue;
                    }
                };
                let pos2 = prev.next(point, time);
                for (value, time) in pending.drain(..) {
                    let time_ms = time.timestamp_millis();
                    let due = match last_emitted_ms {
                        None => true,
                        Some(last) => time_ms - last > throttle_interval_ms,
                    };
                    if !due {
                        result.stats.throttled += 1;
                        continue;
                    }
                    let (lat, lng, distance) = prev.interpolate(&pos2, time_ms);
                    result.push(PathPoint {
                        lat,
                        lng,
                        value,
                        kind: selector.name.clone(),
                        absolute_time: time,
                        relative_time_ms: time_ms - start_time_ms,
                        distance,
                    });
                    last_emitted_ms = Some(time_ms);
                }
                pos1 = Some(pos2);
            }
        }
    }
    if pos1.is_none() {
        result.stats.before_first_fix += pending.len();
    } else {
        result.stats.after_last_fix += pending.len();
    }
    result
}
