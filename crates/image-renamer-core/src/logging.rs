use log::{info, LevelFilter};

// For file-based logging with rotation
use log4rs::append::rolling_file::policy::compound::roll::fixed_window::FixedWindowRoller;
use log4rs::append::rolling_file::policy::compound::trigger::size::SizeTrigger;
use log4rs::append::rolling_file::policy::compound::CompoundPolicy;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::config::{Appender, Root};
use log4rs::encode::pattern::PatternEncoder;

use crate::config::LogLevel;

impl LogLevel {
    pub fn to_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

/// Initialize the logger with timestamp, log level, and module path
/// Logs will be written to file only to avoid interfering with progress bars
pub fn init_logger(log_dir: &str, level: LogLevel) -> Result<(), Box<dyn std::error::Error>> {
    // Create log directory if it doesn't exist
    std::fs::create_dir_all(log_dir)?;

    let log_file_path = format!("{}/renamer.log", log_dir);
    let archived_logs_pattern = format!("{}/renamer.{{}}.log", log_dir);

    // Rotate at 10MB
    let file_trigger = SizeTrigger::new(10 * 1024 * 1024);

    // Keep 5 archived log files
    let file_roller = FixedWindowRoller::builder()
        .build(&archived_logs_pattern, 5)
        .map_err(|e| format!("Failed to create log roller: {}", e))?;

    let compound_policy = CompoundPolicy::new(Box::new(file_trigger), Box::new(file_roller));

    let rolling_file = RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(
            "{d(%Y-%m-%d %H:%M:%S)} [{l}] [{M}:{L}] - {m}{n}",
        )))
        .build(log_file_path.clone(), Box::new(compound_policy))
        .map_err(|e| format!("Failed to create log appender: {}", e))?;

    // File only, no console output
    let config = log4rs::config::Config::builder()
        .appender(Appender::builder().build("file", Box::new(rolling_file)))
        .build(Root::builder().appender("file").build(level.to_filter()))
        .map_err(|e| format!("Failed to build log config: {}", e))?;

    log4rs::init_config(config).map_err(|e| format!("Failed to initialize log4rs: {}", e))?;

    // Environment variable overrides the configured level
    if let Ok(env_filter) = std::env::var("RENAMER_LOG") {
        if let Ok(level) = env_filter.parse::<LevelFilter>() {
            log::set_max_level(level);
        }
    }

    info!("Image renamer started");
    info!("Logging to file: {}", log_file_path);
    Ok(())
}

// -- Tests --

#[cfg(test)]
mod tests {
    use super::*;

    // Only one test may install the global logger per process
    #[test]
    fn test_init_logger_creates_rolling_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().to_string_lossy().into_owned();

        init_logger(&log_dir, LogLevel::Info).unwrap();
        log::logger().flush();

        assert!(dir.path().join("renamer.log").exists());
    }
}
