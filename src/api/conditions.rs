use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::condition_aggregator::{
    self, compute_road_conditions, compute_way_conditions, RawConditionRow, RoadResult, WayResult,
};
use crate::config::PipelineConfig;
use crate::geo_utils::GpsPoint;
use crate::map_matching::{MapMatcher, MatchOutcome};
use crate::rsp_parser::{self, ParsedRsp};

/// What persistence knows about a way besides its conditions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WayInfo {
    pub way_id: i64,
    #[serde(default)]
    pub name: Option<String>,
    pub length: f64,
    // first vertex of the way geometry
    pub start: GpsPoint,
}

/// Read side of the condition store. Rows are expected to be filtered
/// already (no ignored values).
#[allow(async_fn_in_trait)]
pub trait ConditionSource {
    async fn way_info(&self, way_id: i64) -> Result<Option<WayInfo>>;
    async fn conditions_for_ways(&self, way_ids: &[i64]) -> Result<Vec<RawConditionRow>>;
    /// Ids of the ways with the given name within `radius_m` of `point`.
    async fn ways_near(&self, point: GpsPoint, name: &str, radius_m: f64) -> Result<Vec<i64>>;
}

/// Gives up on the wrapped matcher after `timeout`. The request itself is
/// dropped, not cancelled on the remote side.
pub struct TimeoutMatcher<'a, M: MapMatcher> {
    inner: &'a M,
    timeout: Duration,
}

impl<'a, M: MapMatcher> TimeoutMatcher<'a, M> {
    pub fn new(inner: &'a M, timeout: Duration) -> Self {
        TimeoutMatcher { inner, timeout }
    }
}

impl<M: MapMatcher> MapMatcher for TimeoutMatcher<'_, M> {
    async fn map_match(&self, points: &[GpsPoint]) -> Result<MatchOutcome> {
        match tokio::time::timeout(self.timeout, self.inner.map_match(points)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(
                    "[api] map matching of {} points timed out after {:?}",
                    points.len(),
                    self.timeout
                );
                bail!("map matching timed out after {:?}", self.timeout)
            }
        }
    }
}

pub async fn upload_rsp<M: MapMatcher>(
    text: &str,
    matcher: &M,
    config: &PipelineConfig,
) -> Result<ParsedRsp> {
    let matcher = TimeoutMatcher::new(matcher, config.map_matching.timeout());
    rsp_parser::parse_rsp(text, &matcher).await
}

#[derive(Clone, Debug, PartialEq)]
pub struct WayConditions {
    pub name: Option<String>,
    pub result: WayResult,
}

impl WayConditions {
    pub fn to_json(&self) -> serde_json::Value {
        let mut json = self.result.to_json();
        json["name"] = serde_json::json!(self.name);
        json
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RoadConditions {
    // name of the way the road was looked up from
    pub name: Option<String>,
    pub result: RoadResult,
}

impl RoadConditions {
    pub fn to_json(&self) -> serde_json::Value {
        let mut json = self.result.to_json();
        json["road_name"] = serde_json::json!(self.name);
        json
    }
}

/// `Ok(None)` when the way is unknown.
pub async fn get_way_conditions<S: ConditionSource>(
    source: &S,
    way_id: i64,
) -> Result<Option<WayConditions>> {
    let info = match source.way_info(way_id).await? {
        Some(info) => info,
        None => {
            info!("[api] way {} not found", way_id);
            return Ok(None);
        }
    };
    let rows = source.conditions_for_ways(&[way_id]).await?;
    let (conditions, decode_stats) = condition_aggregator::decode_rows(&rows);
    let mut result = compute_way_conditions(&conditions);
    // the stored way is authoritative, conditions may be missing entirely
    result.way_id = Some(info.way_id);
    result.length = info.length;
    result.stats.rows = decode_stats.rows;
    result.stats.malformed_rows = decode_stats.malformed_rows;
    info!("[api] way {}: {}", way_id, result.stats);
    Ok(Some(WayConditions {
        name: info.name,
        result,
    }))
}

/// Conditions along the whole road the way belongs to, i.e. every way with
/// the same name around its first vertex.
pub async fn get_road_conditions<S: ConditionSource>(
    source: &S,
    way_id: i64,
    config: &PipelineConfig,
) -> Result<Option<RoadConditions>> {
    let info = match source.way_info(way_id).await? {
        Some(info) => info,
        None => {
            info!("[api] way {} not found", way_id);
            return Ok(None);
        }
    };
    let mut way_ids = match &info.name {
        Some(name) => {
            source
                .ways_near(info.start, name, config.road_search_radius_m)
                .await?
        }
        None => Vec::new(),
    };
    if !way_ids.contains(&way_id) {
        way_ids.push(way_id);
    }
    debug!("[api] road of way {} spans {} ways", way_id, way_ids.len());

    let rows = source.conditions_for_ways(&way_ids).await?;
    let (conditions, decode_stats) = condition_aggregator::decode_rows(&rows);
    let mut result = compute_road_conditions(&conditions);
    result.stats.rows = decode_stats.rows;
    result.stats.malformed_rows = decode_stats.malformed_rows;
    Ok(Some(RoadConditions {
        name: info.name,
        result,
    }))
}
