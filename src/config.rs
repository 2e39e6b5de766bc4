use anyhow::Result;
use serde::{Deserialize, Serialize};
use simplelog::LevelFilter;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/* Settings for one deployment of the pipeline. Everything has a default that
matches the behaviour of the existing service, so an empty JSON object (or no
file at all) is a valid configuration.
*/

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapMatchingConfig {
    pub costing: String,
    pub shape_match: String,
    // the caller abandons the in-flight request after this long
    pub timeout_ms: u64,
}

impl Default for MapMatchingConfig {
    fn default() -> Self {
        MapMatchingConfig {
            costing: "auto".to_owned(),
            shape_match: "walk_or_snap".to_owned(),
            timeout_ms: 60 * 1000,
        }
    }
}

impl MapMatchingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Minimum gap between two emitted ride path samples.
    pub throttle_interval_ms: i64,
    /// Tag of the trip records that carry GPS positions.
    pub position_channel: String,
    /// Radius around a way used to collect the other ways of the same road.
    pub road_search_radius_m: f64,
    pub log_level: String,
    pub map_matching: MapMatchingConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            throttle_interval_ms: 1000,
            position_channel: "track.pos".to_owned(),
            road_search_radius_m: 1000.0,
            log_level: "info".to_owned(),
            map_matching: MapMatchingConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: PipelineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!("no config at {:?}, using defaults", path);
            return Ok(PipelineConfig::default());
        }
        debug!("loading config from {:?}", path);
        Self::from_json_str(&fs::read_to_string(path)?)
    }

    pub fn log_level_filter(&self) -> Result<LevelFilter> {
        LevelFilter::from_str(&self.log_level)
            .map_err(|_| anyhow!("invalid log level: {}", self.log_level))
    }

    fn validate(&self) -> Result<()> {
        if self.throttle_interval_ms < 0 {
            bail!(
                "throttle_interval_ms must not be negative, got {}",
                self.throttle_interval_ms
            );
        }
        if self.position_channel.is_empty() {
            bail!("position_channel must not be empty");
        }
        self.log_level_filter()?;
        Ok(())
    }
}
