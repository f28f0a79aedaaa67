use std::str::FromStr;

use tollsync_core::error::CoreError;
use tollsync_core::mapping::{ActiveMappingPolicy, DeletePolicy};
use tollsync_core::matching::DEFAULT_TIME_WINDOW_SECS;

/// Runtime settings for import processing and mapping.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Rows per duplicate-check batch.
    pub batch_size: usize,
    /// Error log entries retained per session.
    pub max_error_log: usize,
    /// Buffered progress messages per stream.
    pub stream_channel_capacity: usize,
    /// Proximity window for candidate matching, in seconds.
    pub match_window_secs: i64,
    pub active_mapping_policy: ActiveMappingPolicy,
    pub delete_policy: DeletePolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 500,
            max_error_log: 1000,
            stream_channel_capacity: 16,
            match_window_secs: DEFAULT_TIME_WINDOW_SECS,
            active_mapping_policy: ActiveMappingPolicy::default(),
            delete_policy: DeletePolicy::default(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default     |
    /// |---------------------------|-------------|
    /// | `IMPORT_BATCH_SIZE`       | `500`       |
    /// | `IMPORT_MAX_ERROR_LOG`    | `1000`      |
    /// | `STREAM_CHANNEL_CAPACITY` | `16`        |
    /// | `MATCH_TIME_WINDOW_SECS`  | `1800`      |
    /// | `ACTIVE_MAPPING_POLICY`   | `reject`    |
    /// | `DELETE_MISSING_POLICY`   | `not_found` |
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, CoreError> {
        let defaults = Self::default();

        let batch_size = positive(&lookup, "IMPORT_BATCH_SIZE", defaults.batch_size)?;
        let max_error_log = parse_or(&lookup, "IMPORT_MAX_ERROR_LOG", defaults.max_error_log)?;
        let stream_channel_capacity =
            positive(&lookup, "STREAM_CHANNEL_CAPACITY", defaults.stream_channel_capacity)?;
        let match_window_secs =
            parse_or(&lookup, "MATCH_TIME_WINDOW_SECS", defaults.match_window_secs)?;
        if match_window_secs <= 0 {
            return Err(CoreError::Validation(
                "MATCH_TIME_WINDOW_SECS must be positive".into(),
            ));
        }

        let active_mapping_policy = match lookup("ACTIVE_MAPPING_POLICY") {
            Some(v) => ActiveMappingPolicy::parse(&v)?,
            None => defaults.active_mapping_policy,
        };
        let delete_policy = match lookup("DELETE_MISSING_POLICY") {
            Some(v) => DeletePolicy::parse(&v)?,
            None => defaults.delete_policy,
        };

        Ok(Self {
            batch_size,
            max_error_log,
            stream_channel_capacity,
            match_window_secs,
            active_mapping_policy,
            delete_policy,
        })
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> Result<T, CoreError> {
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| CoreError::Validation(format!("{name} has an invalid value '{raw}'"))),
    }
}

fn positive(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: usize,
) -> Result<usize, CoreError> {
    let value = parse_or(lookup, name, default)?;
    if value == 0 {
        return Err(CoreError::Validation(format!("{name} must be at least 1")));
    }
    Ok(value)
}
