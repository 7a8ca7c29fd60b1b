use std::time::Duration;

use serde::{Deserialize, Serialize};

use inkrelay_shared::WireFormat;

use crate::export::DEFAULT_JPEG_QUALITY;

pub const DEFAULT_BACKGROUND: &str = "#ffffff";
pub const DEFAULT_COLOR: &str = "#000000";
pub const DEFAULT_WIDTH: f64 = 4.0;
pub const MIN_WIDTH: f64 = 1.0;
pub const MAX_WIDTH: f64 = 50.0;
pub const MAX_BACKGROUND_LEN: usize = 64;
pub const MIN_DISPLAY_NAME_LEN: usize = 2;

const DEFAULT_CLEAR_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_DISPLAY_NAME_TIMEOUT_MS: u64 = 7_000;
const DEFAULT_CURSOR_INTERVAL_MS: u64 = 50;
const DEFAULT_RECONNECT_DELAY_MS: u64 = 1_000;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    pub clear_timeout_ms: u64,
    pub display_name_timeout_ms: u64,
    pub cursor_interval_ms: u64,
    pub reconnect_delay_ms: u64,
    pub jpeg_quality: f32,
    pub wire_format: WireFormat,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            clear_timeout_ms: DEFAULT_CLEAR_TIMEOUT_MS,
            display_name_timeout_ms: DEFAULT_DISPLAY_NAME_TIMEOUT_MS,
            cursor_interval_ms: DEFAULT_CURSOR_INTERVAL_MS,
            reconnect_delay_ms: DEFAULT_RECONNECT_DELAY_MS,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            wire_format: WireFormat::Json,
        }
    }
}

impl BoardConfig {
    /// Reads `INKRELAY_*` variables; anything missing or unparsable keeps its default.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            clear_timeout_ms: env_parse("INKRELAY_CLEAR_TIMEOUT_MS", defaults.clear_timeout_ms),
            display_name_timeout_ms: env_parse(
                "INKRELAY_DISPLAY_NAME_TIMEOUT_MS",
                defaults.display_name_timeout_ms,
            ),
            cursor_interval_ms: env_parse("INKRELAY_CURSOR_INTERVAL_MS", defaults.cursor_interval_ms),
            reconnect_delay_ms: env_parse("INKRELAY_RECONNECT_DELAY_MS", defaults.reconnect_delay_ms),
            jpeg_quality: env_parse("INKRELAY_JPEG_QUALITY", defaults.jpeg_quality),
            wire_format: std::env::var("INKRELAY_WIRE_FORMAT")
                .ok()
                .and_then(|value| WireFormat::from_name(&value))
                .unwrap_or(defaults.wire_format),
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn clear_timeout(&self) -> Duration {
        Duration::from_millis(self.clear_timeout_ms)
    }

    pub fn display_name_timeout(&self) -> Duration {
        Duration::from_millis(self.display_name_timeout_ms)
    }

    pub fn cursor_interval(&self) -> Duration {
        Duration::from_millis(self.cursor_interval_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_protocol_timings() {
        let config = BoardConfig::default();
        assert_eq!(config.clear_timeout(), Duration::from_secs(5));
        assert_eq!(config.display_name_timeout(), Duration::from_secs(7));
        assert_eq!(config.cursor_interval(), Duration::from_millis(50));
        assert_eq!(config.wire_format, WireFormat::Json);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = BoardConfig::from_json_str(r#"{"cursor_interval_ms":20,"wire_format":"binary"}"#).unwrap();
        assert_eq!(config.cursor_interval_ms, 20);
        assert_eq!(config.wire_format, WireFormat::Binary);
        assert_eq!(config.clear_timeout_ms, DEFAULT_CLEAR_TIMEOUT_MS);
    }

    #[test]
    fn test_env_parse_missing_returns_default() {
        let val: u64 = env_parse("__INKRELAY_TEST_MISSING_KEY__", 42);
        assert_eq!(val, 42);
    }

    #[test]
    fn test_env_parse_invalid_returns_default() {
        std::env::set_var("__INKRELAY_TEST_BAD__", "soon");
        let val: u64 = env_parse("__INKRELAY_TEST_BAD__", 7);
        assert_eq!(val, 7);
    }
}
