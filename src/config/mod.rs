mod app_config;
mod args;

use app_config::AppConfig;
pub(crate) use app_config::{
    get_config_dir,
    get_data_dir,
};
pub use args::Args;
use serde::Deserialize;
use std::{
    path::PathBuf,
    time::Duration,
};

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    #[serde(flatten)]
    app_config: AppConfig,
    #[serde(default = "default_poll_interval_secs")]
    poll_interval_secs: u64,
    #[serde(default = "default_fetch_timeout_secs")]
    fetch_timeout_secs: u64,
    #[serde(default = "default_tick_rate")]
    tick_rate: f64,
    #[serde(default = "default_frame_rate")]
    frame_rate: f64,
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_fetch_timeout_secs() -> u64 {
    10
}

fn default_tick_rate() -> f64 {
    1.0
}

fn default_frame_rate() -> f64 {
    60.0
}

impl Config {
    pub fn new(args: Args) -> Result<Self, config::ConfigError> {
        let data_dir = get_data_dir();
        let config_dir = get_config_dir();
        let mut builder = config::Config::builder()
            .set_default("data_dir", data_dir.to_str().unwrap())?
            .set_default("config_dir", config_dir.to_str().unwrap())?;

        let config_files = [("config.yaml", config::FileFormat::Yaml)];

        for (file, format) in &config_files {
            let source = config::File::from(config_dir.join(file))
                .format(*format)
                .required(false);
            builder = builder.add_source(source);
        }

        builder = builder.add_source(args);

        let cfg: Self = builder.build()?.try_deserialize()?;

        Ok(cfg)
    }

    pub fn data_dir(&self) -> PathBuf {
        self.app_config.data_dir.clone()
    }

    /// The fetch cadence, never below one second.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }

    pub fn tick_rate(&self) -> f64 {
        self.tick_rate
    }

    pub fn frame_rate(&self) -> f64 {
        self.frame_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn args_override_the_poll_interval() {
        let args = Args {
            poll_interval_secs: Some(30),
            fetch_timeout_secs: None,
        };
        let config = Config::new(args).unwrap();
        assert_eq!(config.poll_interval(), Duration::from_secs(30));
        assert_eq!(config.fetch_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn a_zero_interval_is_clamped_to_one_second() {
        let args = Args {
            poll_interval_secs: Some(0),
            fetch_timeout_secs: None,
        };
        let config = Config::new(args).unwrap();
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
    }
}
