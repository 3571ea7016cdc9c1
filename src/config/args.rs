use clap::Parser;

/// Fleetmon admin dashboard
#[derive(Parser, Debug, Clone)]
#[command(author, version = version(), about, long_about = None)]
pub struct Args {
    /// Seconds between automatic stat fetches; overrides the stored
    /// configuration.
    #[clap(long = "poll-interval", value_name = "SECONDS")]
    pub poll_interval_secs: Option<u64>,

    /// Seconds before an unanswered stats query counts as failed.
    #[clap(long = "fetch-timeout", value_name = "SECONDS")]
    pub fetch_timeout_secs: Option<u64>,
}

mod config_ext {
    use super::*;
    use config::{
        Map,
        Source,
        Value,
    };
    use std::collections::HashMap;

    impl Source for Args {
        fn clone_into_box(&self) -> Box<dyn Source + Send + Sync> {
            Box::new((*self).clone())
        }

        fn collect(&self) -> Result<Map<String, Value>, config::ConfigError> {
            let mut cache = HashMap::<String, Value>::new();
            if let Some(poll_interval_secs) = self.poll_interval_secs {
                cache.insert("poll_interval_secs".to_string(), (poll_interval_secs as i64).into());
            }
            if let Some(fetch_timeout_secs) = self.fetch_timeout_secs {
                cache.insert("fetch_timeout_secs".to_string(), (fetch_timeout_secs as i64).into());
            }
            Ok(cache)
        }
    }
}

pub fn version() -> String {
    let author = clap::crate_authors!();
    let config_dir_path = crate::config::get_config_dir().display().to_string();
    let data_dir_path = crate::config::get_data_dir().display().to_string();

    format!(
        "\
Authors: {author}

Config directory: {config_dir_path}
Data directory: {data_dir_path}"
    )
}
