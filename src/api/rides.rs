use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::ride_path::{self, BoundedPath, RawTripRow};

/// A trip as listed by the trip store. Not interpreted here.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RideMeta {
    pub trip_id: String,
    pub task_id: i64,
    #[serde(default)]
    pub start_time_utc: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time_utc: Option<DateTime<Utc>>,
    #[serde(default)]
    pub start_position_display: Option<String>,
    #[serde(default)]
    pub end_position_display: Option<String>,
    #[serde(default)]
    pub distance_km: Option<f64>,
}

#[allow(async_fn_in_trait)]
pub trait TripSource {
    /// Position rows and the rows of `tag`, in time order.
    async fn trip_rows(&self, trip_id: &str, tag: &str) -> Result<Vec<RawTripRow>>;
    async fn rides(&self) -> Result<Vec<RideMeta>>;
}

pub async fn list_rides<S: TripSource>(source: &S) -> Result<Vec<RideMeta>> {
    source.rides().await
}

pub async fn get_ride<S: TripSource>(
    source: &S,
    trip_id: &str,
    channel: &str,
    config: &PipelineConfig,
) -> Result<BoundedPath> {
    let selector = ride_path::ChannelSelector::new(channel);
    let rows = source.trip_rows(trip_id, &selector.tag).await?;
    debug!("[api] trip {} has {} rows for {}", trip_id, rows.len(), channel);
    let records = ride_path::decode_rows(&rows, &config.position_channel);
    Ok(ride_path::build_ride_path(&records, channel, config))
}
