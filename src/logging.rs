use crate::config::get_data_dir;
use eyre::{
    Context as _,
    Result,
};
use tracing_subscriber::prelude::*;
use tui_logger::TuiLoggerFile;

lazy_static::lazy_static! {
    static ref LOG_FILE: String = format!("{}.log", env!("CARGO_PKG_NAME"));
}

/// Routes everything through tui-logger: the Logs view filters at display
/// time, the log file gets the full trace.
pub fn log_init() -> Result<()> {
    let directory = get_data_dir();
    std::fs::create_dir_all(directory.clone()).context("Failed to create directory")?;

    // Keep one previous run as `.log.old`.
    let log_path = directory.join(LOG_FILE.clone());
    if log_path.exists() {
        let old_path = log_path.with_extension("log.old");
        std::fs::rename(&log_path, old_path).context("Failed to rotate previous log file")?;
    }

    tui_logger::init_logger(tui_logger::LevelFilter::Trace).context("Failed to initialize tui logger")?;
    tui_logger::set_level_for_target("log", tui_logger::LevelFilter::Debug);
    tui_logger::set_log_file(TuiLoggerFile::new(log_path.to_str().unwrap()));

    tracing_subscriber::registry()
        .with(tracing_error::ErrorLayer::default())
        .with(tui_logger::TuiTracingSubscriberLayer)
        .try_init()
        .context("Failed to initialize tracing subscriber")
}
