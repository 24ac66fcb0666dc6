use std::env;
use std::path::PathBuf;
use std::time::Duration;

use santa_core::RandomSource;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_DRAW_DELAY_MS: u64 = 1500;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bind_addr: String,
    /// Session snapshot file; sessions live in memory only when unset.
    pub persist_path: Option<PathBuf>,
    pub rooms_path: Option<PathBuf>,
    /// Cosmetic pause before a draw completes.
    pub draw_delay: Duration,
    pub random_source: RandomSource,
    /// Whether `?seed=` may replace `random_source` for a single draw.
    pub allow_seed_override: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let draw_delay = match get("SANTA_DRAW_DELAY_MS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|err| ConfigError::Invalid {
                    key: "SANTA_DRAW_DELAY_MS",
                    message: err.to_string(),
                })?,
            None => Duration::from_millis(DEFAULT_DRAW_DELAY_MS),
        };

        let random_source = match get("SANTA_RANDOM_SOURCE") {
            Some(raw) => raw
                .parse::<RandomSource>()
                .map_err(|err| ConfigError::Invalid {
                    key: "SANTA_RANDOM_SOURCE",
                    message: err.to_string(),
                })?,
            None => RandomSource::default(),
        };

        let allow_seed_override = match get("SANTA_ALLOW_SEED_OVERRIDE") {
            Some(raw) => parse_flag(&raw).ok_or_else(|| ConfigError::Invalid {
                key: "SANTA_ALLOW_SEED_OVERRIDE",
                message: format!("expected true or false, got {raw:?}"),
            })?,
            None => false,
        };

        Ok(Self {
            bind_addr: get("SANTA_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            persist_path: get("SANTA_PERSIST_PATH").map(PathBuf::from),
            rooms_path: get("SANTA_ROOMS_PATH").map(PathBuf::from),
            draw_delay,
            random_source,
            allow_seed_override,
        })
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.bind_addr, "0.0.0.0:3000");
        assert_eq!(cfg.persist_path, None);
        assert_eq!(cfg.draw_delay, Duration::from_millis(1500));
        assert_eq!(cfg.random_source, RandomSource::Thread);
        assert!(!cfg.allow_seed_override);
    }

    #[test]
    fn reads_overrides() {
        let cfg = config(&[
            ("SANTA_BIND_ADDR", "127.0.0.1:8080"),
            ("SANTA_PERSIST_PATH", "/tmp/sessions.json"),
            ("SANTA_ROOMS_PATH", "/tmp/rooms.json"),
            ("SANTA_DRAW_DELAY_MS", "0"),
            ("SANTA_RANDOM_SOURCE", "os"),
            ("SANTA_ALLOW_SEED_OVERRIDE", "True"),
        ])
        .unwrap();
        assert_eq!(cfg.bind_addr, "127.0.0.1:8080");
        assert_eq!(cfg.persist_path, Some(PathBuf::from("/tmp/sessions.json")));
        assert_eq!(cfg.rooms_path, Some(PathBuf::from("/tmp/rooms.json")));
        assert!(cfg.draw_delay.is_zero());
        assert_eq!(cfg.random_source, RandomSource::Os);
        assert!(cfg.allow_seed_override);
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let cfg = config(&[("SANTA_PERSIST_PATH", "  "), ("SANTA_DRAW_DELAY_MS", "")]).unwrap();
        assert_eq!(cfg.persist_path, None);
        assert_eq!(cfg.draw_delay, Duration::from_millis(1500));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            config(&[("SANTA_DRAW_DELAY_MS", "soon")]),
            Err(ConfigError::Invalid { key: "SANTA_DRAW_DELAY_MS", .. })
        ));
        assert!(matches!(
            config(&[("SANTA_RANDOM_SOURCE", "dice")]),
            Err(ConfigError::Invalid { key: "SANTA_RANDOM_SOURCE", .. })
        ));
        assert!(matches!(
            config(&[("SANTA_ALLOW_SEED_OVERRIDE", "sometimes")]),
            Err(ConfigError::Invalid { key: "SANTA_ALLOW_SEED_OVERRIDE", .. })
        ));
    }
}
