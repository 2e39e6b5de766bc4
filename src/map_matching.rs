use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::MapMatchingConfig;
use crate::geo_utils::GpsPoint;

/// A submitted point echoed back with the way it was snapped onto.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MatchedGpsPoint {
    pub lat: f64,
    pub lon: f64,
    pub way_id: Option<i64>,
    pub names: Vec<String>,
}

#[derive(Debug, Default, PartialEq)]
pub struct MatchOutcome {
    // one entry per matched point, in submission order
    pub points: Vec<MatchedGpsPoint>,
    pub edge_fallbacks: usize,
}

/// Snaps a batch of points onto the road network in a single call.
#[allow(async_fn_in_trait)]
pub trait MapMatcher {
    async fn map_match(&self, points: &[GpsPoint]) -> Result<MatchOutcome>;
}

/// How requests reach the map-matching service. Kept separate from
/// `ValhallaMatcher` so the HTTP client is the caller's choice.
#[allow(async_fn_in_trait)]
pub trait Transport {
    async fn post_json(&self, body: Value) -> Result<Value>;
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ValhallaEdge {
    #[serde(default)]
    pub way_id: Option<i64>,
    #[serde(default)]
    pub names: Vec<String>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ValhallaMatchedPoint {
    // unmatched points come back with a huge sentinel or without the field
    #[serde(default)]
    pub edge_index: Option<u64>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ValhallaResult {
    #[serde(default)]
    pub units: Option<String>,
    #[serde(default)]
    pub edges: Vec<ValhallaEdge>,
    #[serde(default)]
    pub matched_points: Vec<ValhallaMatchedPoint>,
}

pub fn trace_attributes_request(points: &[GpsPoint], config: &MapMatchingConfig) -> Value {
    json!({
        "shape": points,
        "costing": config.costing,
        "shape_match": config.shape_match,
        "filters": {
            "attributes": [
                "edge.way_id",
                "edge.names",
                "edge.length",
                "matched.edge_index",
            ],
            "action": "include",
        },
    })
}

/// Pairs each submitted point with the edge its matched point refers to. An
/// edge index outside the edge table takes the way of the previous result.
pub fn resolve_matched_points(points: &[GpsPoint], result: &ValhallaResult) -> MatchOutcome {
    let mut outcome = MatchOutcome::default();
    for (point, matched) in points.iter().zip(result.matched_points.iter()) {
        let edge = matched
            .edge_index
            .and_then(|i| usize::try_from(i).ok())
            .and_then(|i| result.edges.get(i));
        let (way_id, names) = match edge {
            Some(edge) => (edge.way_id, edge.names.clone()),
            None => {
                outcome.edge_fallbacks += 1;
                match outcome.points.last() {
                    Some(prev) => (prev.way_id, prev.names.clone()),
                    None => (None, Vec::new()),
                }
            }
        };
        outcome.points.push(MatchedGpsPoint {
            lat: point.lat,
            lon: point.lon,
            way_id,
            names,
        });
    }
    if result.matched_points.len() != points.len() {
        warn!(
            "[map_matching] submitted {} points but got {} matched points",
            points.len(),
            result.matched_points.len()
        );
    }
    outcome
}

pub struct ValhallaMatcher<T: Transport> {
    transport: T,
    config: MapMatchingConfig,
}

impl<T: Transport> ValhallaMatcher<T> {
    pub fn new(transport: T, config: MapMatchingConfig) -> Self {
        ValhallaMatcher { transport, config }
    }
}

impl<T: Transport> MapMatcher for ValhallaMatcher<T> {
    async fn map_match(&self, points: &[GpsPoint]) -> Result<MatchOutcome> {
        if points.is_empty() {
            return Ok(MatchOutcome::default());
        }
        debug!("[map_matching] submitting {} points", points.len());
        let body = trace_attributes_request(points, &self.config);
        let response = self.transport.post_json(body).await?;
        let result: ValhallaResult = serde_json::from_value(response)
            .map_err(|e| anyhow!("unexpected map-matching response: {}", e))?;
        Ok(resolve_matched_points(points, &result))
    }
}
