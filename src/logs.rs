use std::path::{Path, PathBuf};

use anyhow::Result;
use file_rotate::{
    compression::Compression,
    suffix::{AppendTimestamp, FileLimit},
    {ContentLimit, FileRotate},
};
use simplelog::{ConfigBuilder, LevelFilter, WriteLogger};

pub fn log_file_path(log_dir: &Path) -> PathBuf {
    log_dir.join("logs/road_conditions.log")
}

/// Installs the process-wide logger. Fails if a logger is already set.
pub fn init<P: AsRef<Path>>(log_dir: P, level: LevelFilter) -> Result<()> {
    let log = FileRotate::new(
        log_file_path(log_dir.as_ref()),
        AppendTimestamp::default(FileLimit::MaxFiles(3)),
        ContentLimit::Lines(1000),
        Compression::None,
        #[cfg(unix)]
        None,
    );
    let config = ConfigBuilder::new().set_time_format_rfc3339().build();
    let write_logger = WriteLogger::new(level, config, log);
    log::set_boxed_logger(write_logger)?;
    log::set_max_level(level);
    info!("[logs] logging to {:?} at {}", log_dir.as_ref(), level);
    Ok(())
}
