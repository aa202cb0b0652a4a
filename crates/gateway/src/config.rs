use std::env;
use std::time::Duration;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_POINTS_TABLE: &str = "restaurants";

/// Connection settings for [`crate::HttpGateway`].
///
/// Environment:
/// - `LEADMAP_URL`: service base URL (e.g. `https://xyz.example.co`)
/// - `LEADMAP_API_KEY`: key sent as `apikey` and bearer token
/// - `LEADMAP_TIMEOUT_SECS`: per-request timeout, default 30
/// - `LEADMAP_POINTS_TABLE`: table holding the leads, default `restaurants`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
    pub points_table: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            points_table: DEFAULT_POINTS_TABLE.to_string(),
        }
    }
}

impl GatewayConfig {
    pub fn from_env() -> Self {
        Self {
            base_url: env_var_string("LEADMAP_URL", ""),
            api_key: env_var_string("LEADMAP_API_KEY", ""),
            timeout: Duration::from_secs(env_var_u64("LEADMAP_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)),
            points_table: env_var_string("LEADMAP_POINTS_TABLE", DEFAULT_POINTS_TABLE),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = key.into();
        self
    }

    /// `<base>/rest/v1/<path>`.
    pub fn rest_url(&self, path: &str) -> String {
        format!(
            "{}/rest/v1/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn rpc_url(&self, function: &str) -> String {
        self.rest_url(&format!("rpc/{function}"))
    }
}

fn env_var_string(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_var_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_ignore_stray_slashes() {
        let config = GatewayConfig::default().with_base_url("https://db.example.co/");
        assert_eq!(
            config.rest_url("/territories"),
            "https://db.example.co/rest/v1/territories"
        );
        assert_eq!(
            config.rpc_url("get_cached_clusters"),
            "https://db.example.co/rest/v1/rpc/get_cached_clusters"
        );
    }

    #[test]
    fn defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.points_table, "restaurants");
    }
}
