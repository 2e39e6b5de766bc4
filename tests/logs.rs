use std::fs;

use log::Log;
use road_conditions_core::config::PipelineConfig;
use road_conditions_core::logs;
use tempdir::TempDir;

// Everything in one test, the logger can only be installed once per process.
#[test]
fn init_and_write() {
    let temp_dir = TempDir::new("logs-init_and_write").unwrap();
    let level = PipelineConfig::default().log_level_filter().unwrap();
    logs::init(temp_dir.path(), level).unwrap();

    log::info!("survey uploaded");
    log::debug!("not at info level");
    log::logger().flush();

    let content = fs::read_to_string(logs::log_file_path(temp_dir.path())).unwrap();
    assert!(content.contains("survey uploaded"));
    assert!(!content.contains("not at info level"));

    assert!(logs::init(temp_dir.path(), level).is_err());
}
