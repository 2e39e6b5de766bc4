#![allow(dead_code)]

use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use road_conditions_core::api::conditions::{ConditionSource, WayInfo};
use road_conditions_core::api::rides::{RideMeta, TripSource};
use road_conditions_core::condition_aggregator::{RawConditionRow, RawWayCondition};
use road_conditions_core::geo_utils::GpsPoint;
use road_conditions_core::map_matching::{MapMatcher, MatchOutcome, MatchedGpsPoint, Transport};
use road_conditions_core::ride_path::RawTripRow;
use serde_json::{json, Value};

pub const START_LAT: f64 = 55.676098;
pub const START_LON: f64 = 12.568337;

pub fn gps_line(distance: f64, lat: f64, lon: f64) -> String {
    format!("5280,{distance},0,1,081500,{lat},{lon}")
}

pub fn measurement_line(code: u16, begin: f64, end: f64, center: f64) -> String {
    format!("{code},{begin},{end},0.9,{center},1.1")
}

pub fn condition_row(
    way_id: i64,
    way_length: f64,
    kind: &str,
    value: f64,
    distances: (f64, f64),
    start: (f64, f64),
    end: (f64, f64),
) -> RawConditionRow {
    // start/end are (lat, lon), geometry is (lon, lat)
    let section_geom = json!({
        "type": "MultiLineString",
        "coordinates": [[[start.1, start.0], [end.1, end.0]]],
    });
    RawConditionRow {
        way_id,
        way_length,
        kind: kind.to_owned(),
        value,
        distance01: distances.0,
        distance02: distances.1,
        section_geom: section_geom.to_string(),
        data_source: None,
    }
}

pub fn way_condition(
    way_id: i64,
    way_length: f64,
    kind: &str,
    value: f64,
    distances: (f64, f64),
    start: (f64, f64),
    end: (f64, f64),
) -> RawWayCondition {
    RawWayCondition::from_row(&condition_row(
        way_id, way_length, kind, value, distances, start, end,
    ))
    .unwrap()
}

pub fn time(ms: i64) -> DateTime<Utc> {
    // 2024-03-01T08:00:00Z
    DateTime::from_timestamp_millis(1_709_280_000_000 + ms).unwrap()
}

pub fn position_row(lat: f64, lon: f64, ms: i64) -> RawTripRow {
    RawTripRow {
        tag: "track.pos".to_owned(),
        lat: Some(lat),
        lon: Some(lon),
        timestamp: Some(time(ms)),
        message: Some(json!({ "track.pos.value": ms as f64 / 1000.0 }).to_string()),
    }
}

pub fn channel_row(tag: &str, ms: i64, payload: Value) -> RawTripRow {
    RawTripRow {
        tag: tag.to_owned(),
        lat: None,
        lon: None,
        timestamp: Some(time(ms)),
        message: Some(payload.to_string()),
    }
}

/// Assigns ways by a closure and remembers every batch it was given.
pub struct FakeMatcher {
    way_of: Box<dyn Fn(&GpsPoint) -> Option<i64>>,
    pub batches: Mutex<Vec<Vec<GpsPoint>>>,
}

impl FakeMatcher {
    pub fn new(way_of: impl Fn(&GpsPoint) -> Option<i64> + 'static) -> Self {
        FakeMatcher {
            way_of: Box::new(way_of),
            batches: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.batches.lock().unwrap().len()
    }
}

impl MapMatcher for FakeMatcher {
    async fn map_match(&self, points: &[GpsPoint]) -> Result<MatchOutcome> {
        self.batches.lock().unwrap().push(points.to_vec());
        Ok(MatchOutcome {
            points: points
                .iter()
                .map(|p| MatchedGpsPoint {
                    lat: p.lat,
                    lon: p.lon,
                    way_id: (self.way_of)(p),
                    names: vec!["Vesterbrogade".to_owned()],
                })
                .collect(),
            edge_fallbacks: 0,
        })
    }
}

pub struct SlowMatcher(pub Duration);

impl MapMatcher for SlowMatcher {
    async fn map_match(&self, _points: &[GpsPoint]) -> Result<MatchOutcome> {
        tokio::time::sleep(self.0).await;
        Ok(MatchOutcome::default())
    }
}

pub struct FailingMatcher;

impl MapMatcher for FailingMatcher {
    async fn map_match(&self, _points: &[GpsPoint]) -> Result<MatchOutcome> {
        Err(anyhow::anyhow!("connection refused"))
    }
}

/// Answers every request with the same body.
pub struct FakeTransport {
    pub response: Value,
    pub requests: Mutex<Vec<Value>>,
}

impl FakeTransport {
    pub fn new(response: Value) -> Self {
        FakeTransport {
            response,
            requests: Mutex::new(Vec::new()),
        }
    }
}

impl Transport for FakeTransport {
    async fn post_json(&self, body: Value) -> Result<Value> {
        self.requests.lock().unwrap().push(body);
        Ok(self.response.clone())
    }
}

#[derive(Default)]
pub struct FakeConditionStore {
    pub ways: Vec<WayInfo>,
    pub rows: Vec<RawConditionRow>,
    // what `ways_near` returns, regardless of its arguments
    pub neighbours: Vec<i64>,
    pub near_queries: Mutex<Vec<(GpsPoint, String, f64)>>,
}

impl ConditionSource for FakeConditionStore {
    async fn way_info(&self, way_id: i64) -> Result<Option<WayInfo>> {
        Ok(self.ways.iter().find(|w| w.way_id == way_id).cloned())
    }

    async fn conditions_for_ways(&self, way_ids: &[i64]) -> Result<Vec<RawConditionRow>> {
        Ok(self
            .rows
            .iter()
            .filter(|r| way_ids.contains(&r.way_id))
            .cloned()
            .collect())
    }

    async fn ways_near(&self, point: GpsPoint, name: &str, radius_m: f64) -> Result<Vec<i64>> {
        self.near_queries
            .lock()
            .unwrap()
            .push((point, name.to_owned(), radius_m));
        Ok(self.neighbours.clone())
    }
}

#[derive(Default)]
pub struct FakeTripStore {
    pub rows: Vec<RawTripRow>,
    pub rides: Vec<RideMeta>,
    pub queried_tags: Mutex<Vec<String>>,
}

impl TripSource for FakeTripStore {
    async fn trip_rows(&self, _trip_id: &str, tag: &str) -> Result<Vec<RawTripRow>> {
        self.queried_tags.lock().unwrap().push(tag.to_owned());
        Ok(self
            .rows
            .iter()
            .filter(|r| r.tag == tag || r.tag == "track.pos")
            .cloned()
            .collect())
    }

    async fn rides(&self) -> Result<Vec<RideMeta>> {
        Ok(self.rides.clone())
    }
}
