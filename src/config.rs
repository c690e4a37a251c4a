use std::env;
use std::fmt::{self, Display};
use std::time::Duration;

use crate::controller::ResyncPolicy;

pub const BASE_URL_KEY: &str = "CRUSH_BASE_URL";
pub const EVENT_ID_KEY: &str = "CRUSH_EVENT_ID";
pub const RESULTS_URL_KEY: &str = "CRUSH_RESULTS_URL";
pub const RESYNC_DRIFT_KEY: &str = "CRUSH_RESYNC_DRIFT";
pub const HTTP_TIMEOUT_KEY: &str = "CRUSH_HTTP_TIMEOUT_SECS";

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str, String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "Key {} not found in environment", key),
            ConfigError::Invalid(key, value) => write!(f, "Invalid {} value: {:?}", key, value),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub base_url: String,
    pub event_id: u64,
    pub results_url: String,
    pub resync: ResyncPolicy,
    pub http_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Config, ConfigError> {
        Config::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<L>(lookup: L) -> Result<Config, ConfigError>
    where L: Fn(&str) -> Option<String> {
        let base_url = lookup(BASE_URL_KEY)
            .unwrap_or_else(|| {
                info!("{} not set, using default: {}", BASE_URL_KEY, DEFAULT_BASE_URL);
                DEFAULT_BASE_URL.to_string()
            })
            .trim_end_matches('/')
            .to_string();

        let event_id = parse(EVENT_ID_KEY, lookup(EVENT_ID_KEY).ok_or(ConfigError::Missing(EVENT_ID_KEY))?)?;

        let results_url = lookup(RESULTS_URL_KEY)
            .unwrap_or_else(|| format!("{}/events/{}/voting/results/", base_url, event_id));

        let resync = match lookup(RESYNC_DRIFT_KEY) {
            Some(raw) => ResyncPolicy::DriftThreshold(parse(RESYNC_DRIFT_KEY, raw)?),
            None => ResyncPolicy::Authoritative,
        };

        let http_timeout = match lookup(HTTP_TIMEOUT_KEY) {
            Some(raw) => Duration::from_secs(parse(HTTP_TIMEOUT_KEY, raw)?),
            None => Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        };

        Ok(Config {
            base_url,
            event_id,
            results_url,
            resync,
            http_timeout,
        })
    }
}

fn parse(key: &'static str, raw: String) -> Result<u64, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| {
            warn!("Invalid {} value: {}", key, raw);
            ConfigError::Invalid(key, raw.clone())
        })
}
