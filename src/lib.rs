#[macro_use]
extern crate log;
#[macro_use]
extern crate anyhow;

pub mod api;
pub mod condition_aggregator;
pub mod config;
pub mod diagnostics;
pub mod geo_utils;
pub mod gps_interpolator;
pub mod logs;
pub mod map_matching;
pub mod ride_path;
pub mod rsp_parser;
