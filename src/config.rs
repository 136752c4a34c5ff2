use std::path::PathBuf;

use jiff::tz::TimeZone;
use thiserror::Error;

use crate::models::proposal::DEFAULT_REQUIRED_SIGNERS;

pub const STORE_ENV: &str = "PROPDESK_STORE";
pub const REQUIRED_SIGNERS_ENV: &str = "PROPDESK_REQUIRED_SIGNERS";
pub const TIME_ZONE_ENV: &str = "PROPDESK_TZ";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("PROPDESK_REQUIRED_SIGNERS must be a positive integer, got '{0}'")]
    InvalidRequiredSigners(String),

    #[error("PROPDESK_TZ names an unknown time zone '{name}': {source}")]
    InvalidTimeZone {
        name: String,
        #[source]
        source: jiff::Error,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub store_path: PathBuf,
    pub required_signers: u32,
    pub time_zone: TimeZone,
}

impl Config {
    /// Flag beats environment beats the platform data directory.
    pub fn resolve(store_flag: Option<PathBuf>) -> Result<Self, ConfigError> {
        Self::from_lookup(store_flag, |key| std::env::var(key).ok())
    }

    fn from_lookup(
        store_flag: Option<PathBuf>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let store_path = store_flag
            .or_else(|| lookup(STORE_ENV).map(PathBuf::from))
            .unwrap_or_else(default_store_path);

        let required_signers = match lookup(REQUIRED_SIGNERS_ENV) {
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => return Err(ConfigError::InvalidRequiredSigners(raw)),
            },
            None => DEFAULT_REQUIRED_SIGNERS,
        };

        let time_zone = match lookup(TIME_ZONE_ENV) {
            Some(name) => TimeZone::get(&name)
                .map_err(|source| ConfigError::InvalidTimeZone { name, source })?,
            None => TimeZone::system(),
        };

        Ok(Self {
            store_path,
            required_signers,
            time_zone,
        })
    }
}

fn default_store_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("propdesk")
        .join("store.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let config = Config::from_lookup(None, lookup(&[])).unwrap();
        assert_eq!(config.required_signers, 2);
        assert!(config.store_path.ends_with("propdesk/store.json"));
    }

    #[test]
    fn flag_overrides_environment() {
        let config = Config::from_lookup(
            Some(PathBuf::from("/srv/flag.json")),
            lookup(&[(STORE_ENV, "/srv/env.json")]),
        )
        .unwrap();
        assert_eq!(config.store_path, PathBuf::from("/srv/flag.json"));

        let config = Config::from_lookup(None, lookup(&[(STORE_ENV, "/srv/env.json")])).unwrap();
        assert_eq!(config.store_path, PathBuf::from("/srv/env.json"));
    }

    #[test]
    fn required_signers_from_environment() {
        let config =
            Config::from_lookup(None, lookup(&[(REQUIRED_SIGNERS_ENV, "3")])).unwrap();
        assert_eq!(config.required_signers, 3);

        for bad in ["0", "-1", "two"] {
            assert!(matches!(
                Config::from_lookup(None, lookup(&[(REQUIRED_SIGNERS_ENV, bad)])),
                Err(ConfigError::InvalidRequiredSigners(_))
            ));
        }
    }

    #[test]
    fn unknown_time_zone_is_rejected() {
        assert!(matches!(
            Config::from_lookup(None, lookup(&[(TIME_ZONE_ENV, "Mars/Olympus_Mons")])),
            Err(ConfigError::InvalidTimeZone { .. })
        ));
    }
}
