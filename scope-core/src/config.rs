//! Configuration file management for the scope.
//!
//! Reads/writes `~/.scope/config.yaml` (or an explicit path) with server
//! bind settings, upstream URL templates, and scope timing.

use std::path::{Path, PathBuf};

use crate::facility::DEFAULT_FACILITY;
use crate::tracker::{MIN_ALTITUDE_FT, TRACK_TTL_MS};
use crate::types::{Millis, Result, ScopeError};

pub const DEFAULT_TRAFFIC_URL: &str = "https://api.adsb.lol/v2/point/{lat}/{lon}/{dist}";
pub const DEFAULT_METAR_URL: &str =
    "https://aviationweather.gov/api/data/metar?ids={ids}&format=raw";
pub const DEFAULT_RADIUS_NM: f64 = 50.0;

/// Full configuration structure.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub scope: ScopeConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// URL templates. `{lat}`, `{lon}`, `{dist}` and `{ids}` are substituted.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamConfig {
    pub traffic_url: String,
    pub metar_url: String,
    pub radius_nm: f64,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScopeConfig {
    pub facility: String,
    pub poll_ms: u64,
    pub weather_ms: u64,
    pub ttl_ms: Millis,
    pub min_altitude_ft: f64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "127.0.0.1".into(),
                port: 8080,
            },
            upstream: UpstreamConfig {
                traffic_url: DEFAULT_TRAFFIC_URL.into(),
                metar_url: DEFAULT_METAR_URL.into(),
                radius_nm: DEFAULT_RADIUS_NM,
                timeout_ms: 5_000,
            },
            scope: ScopeConfig {
                facility: DEFAULT_FACILITY.into(),
                poll_ms: 1_000,
                weather_ms: 60_000,
                ttl_ms: TRACK_TTL_MS,
                min_altitude_ft: MIN_ALTITUDE_FT,
            },
        }
    }
}

/// Get the config directory path (`~/.scope/`).
pub fn config_dir() -> PathBuf {
    dirs_home().join(".scope")
}

/// Get the default config file path.
pub fn config_file() -> PathBuf {
    config_dir().join("config.yaml")
}

fn dirs_home() -> PathBuf {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Load config from `path`, or the default location when `None`.
///
/// A missing file yields the default config; an unreadable one is an error.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(config_file);
    if !path.exists() {
        return Ok(Config::default());
    }
    let text = std::fs::read_to_string(&path)?;
    parse_config(&text)
}

/// Save config to `path`, or the default location when `None`.
pub fn save_config(config: &Config, path: Option<&Path>) -> Result<PathBuf> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(config_file);
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| ScopeError::Config(e.to_string()))?;
    }
    std::fs::write(&path, serialize_config(config))
        .map_err(|e| ScopeError::Config(e.to_string()))?;
    Ok(path)
}

/// Parse simple YAML-like config text.
pub fn parse_config(text: &str) -> Result<Config> {
    let mut config = Config::default();
    let mut current_section: Option<String> = None;

    for (lineno, line) in text.lines().enumerate() {
        let stripped = line.trim();
        if stripped.is_empty() || stripped.starts_with('#') {
            continue;
        }

        let is_indented = line.starts_with("  ") || line.starts_with('\t');

        let Some((key, val)) = stripped.split_once(':') else {
            return Err(ScopeError::Config(format!(
                "line {}: expected `key: value`",
                lineno + 1
            )));
        };
        let key = key.trim();
        let val = val.trim();

        if !is_indented {
            current_section = val.is_empty().then(|| key.to_string());
            continue;
        }

        let bad = |what: &str| ScopeError::Config(format!("line {}: invalid {what}", lineno + 1));

        match (current_section.as_deref(), key) {
            (Some("server"), "host") => {
                if let Some(v) = parse_string_value(val) {
                    config.server.host = v;
                }
            }
            (Some("server"), "port") => {
                config.server.port = val.parse().map_err(|_| bad("port"))?;
            }
            (Some("upstream"), "traffic_url") => {
                if let Some(v) = parse_string_value(val) {
                    config.upstream.traffic_url = v;
                }
            }
            (Some("upstream"), "metar_url") => {
                if let Some(v) = parse_string_value(val) {
                    config.upstream.metar_url = v;
                }
            }
            (Some("upstream"), "radius_nm") => {
                config.upstream.radius_nm = val.parse().map_err(|_| bad("radius_nm"))?;
            }
            (Some("upstream"), "timeout_ms") => {
                config.upstream.timeout_ms = val.parse().map_err(|_| bad("timeout_ms"))?;
            }
            (Some("scope"), "facility") => {
                if let Some(v) = parse_string_value(val) {
                    config.scope.facility = v;
                }
            }
            (Some("scope"), "poll_ms") => {
                config.scope.poll_ms = val.parse().map_err(|_| bad("poll_ms"))?;
            }
            (Some("scope"), "weather_ms") => {
                config.scope.weather_ms = val.parse().map_err(|_| bad("weather_ms"))?;
            }
            (Some("scope"), "ttl_ms") => {
                config.scope.ttl_ms = val.parse().map_err(|_| bad("ttl_ms"))?;
            }
            (Some("scope"), "min_altitude_ft") => {
                config.scope.min_altitude_ft =
                    val.parse().map_err(|_| bad("min_altitude_ft"))?;
            }
            // Unknown keys are ignored so newer files load on older builds.
            _ => {}
        }
    }

    Ok(config)
}

fn parse_string_value(val: &str) -> Option<String> {
    if val == "null" || val == "~" || val.is_empty() {
        return None;
    }
    if val.len() >= 2
        && ((val.starts_with('"') && val.ends_with('"'))
            || (val.starts_with('\'') && val.ends_with('\'')))
    {
        return Some(val[1..val.len() - 1].to_string());
    }
    Some(val.to_string())
}

/// Serialize config to YAML-like text.
pub fn serialize_config(config: &Config) -> String {
    let lines = [
        "# scope configuration".to_string(),
        String::new(),
        "server:".into(),
        format!("  host: \"{}\"", config.server.host),
        format!("  port: {}", config.server.port),
        String::new(),
        "upstream:".into(),
        format!("  traffic_url: \"{}\"", config.upstream.traffic_url),
        format!("  metar_url: \"{}\"", config.upstream.metar_url),
        format!("  radius_nm: {}", config.upstream.radius_nm),
        format!("  timeout_ms: {}", config.upstream.timeout_ms),
        String::new(),
        "scope:".into(),
        format!("  facility: \"{}\"", config.scope.facility),
        format!("  poll_ms: {}", config.scope.poll_ms),
        format!("  weather_ms: {}", config.scope.weather_ms),
        format!("  ttl_ms: {}", config.scope.ttl_ms),
        format!("  min_altitude_ft: {}", config.scope.min_altitude_ft),
    ];

    lines.join("\n") + "\n"
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.scope.facility, "JFK");
        assert_eq!(config.scope.ttl_ms, 10_000);
        assert_eq!(config.scope.min_altitude_ft, 100.0);
        assert_eq!(config.upstream.radius_nm, 50.0);
    }

    #[test]
    fn test_parse_config() {
        let text = r#"
server:
  host: "0.0.0.0"
  port: 9090

upstream:
  traffic_url: "http://localhost:9000/{lat}/{lon}/{dist}"
  radius_nm: 44

scope:
  facility: 'EWR'
  poll_ms: 2000
  ttl_ms: 15000
"#;
        let config = parse_config(text).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9090);
        assert_eq!(
            config.upstream.traffic_url,
            "http://localhost:9000/{lat}/{lon}/{dist}"
        );
        assert_eq!(config.upstream.metar_url, DEFAULT_METAR_URL);
        assert_eq!(config.upstream.radius_nm, 44.0);
        assert_eq!(config.scope.facility, "EWR");
        assert_eq!(config.scope.poll_ms, 2000);
        assert_eq!(config.scope.ttl_ms, 15000);
        assert_eq!(config.scope.weather_ms, 60_000);
    }

    #[test]
    fn test_parse_config_null_keeps_default() {
        let text = "server:\n  host: null\nscope:\n  facility: ~\n";
        let config = parse_config(text).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.scope.facility, "JFK");
    }

    #[test]
    fn test_parse_config_bad_number() {
        let err = parse_config("server:\n  port: eighty\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_parse_config_ignores_unknown() {
        let config = parse_config("extra:\n  thing: 1\nserver:\n  colour: red\n").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_roundtrip() {
        let mut config = Config::default();
        config.server.port = 9191;
        config.upstream.radius_nm = 44.5;
        config.scope.facility = "LGA".into();
        config.scope.min_altitude_ft = 250.0;

        let parsed = parse_config(&serialize_config(&config)).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(Some(&dir.path().join("absent.yaml"))).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");
        let mut config = Config::default();
        config.scope.poll_ms = 1500;

        let written = save_config(&config, Some(&path)).unwrap();
        assert_eq!(written, path);
        assert_eq!(load_config(Some(&path)).unwrap(), config);
    }
}
