use std::env;

use crate::sheet::SheetConfig;

#[derive(Clone, Debug)]
pub struct Config {
    pub bind_addr: String,
    pub google_maps_api_key: String,
    /// Upstream `GET` returning `{ "apiKey": ... }`; takes precedence over the env key.
    pub maps_key_url: Option<String>,
    pub sheet: SheetConfig,
    /// Idle map views are dropped after this long.
    pub view_ttl_minutes: i64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let google_maps_api_key = env::var("GOOGLE_MAPS_API_KEY").unwrap_or_default();
        let maps_key_url = env::var("MAPS_KEY_URL")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let view_ttl_minutes = env::var("VIEW_TTL_MINUTES")
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .filter(|m| *m > 0)
            .unwrap_or(120);

        let defaults = SheetConfig::default();
        let sheet = SheetConfig {
            viewport_height: env_f64("VIEWPORT_HEIGHT").unwrap_or(defaults.viewport_height),
            partial_height: env_f64("SHEET_PARTIAL_HEIGHT").unwrap_or(defaults.partial_height),
            full_top: env_f64("SHEET_FULL_TOP").unwrap_or(defaults.full_top),
            distance_threshold: env_f64("DRAG_DISTANCE_THRESHOLD")
                .unwrap_or(defaults.distance_threshold),
            velocity_threshold: env_f64("DRAG_VELOCITY_THRESHOLD")
                .unwrap_or(defaults.velocity_threshold),
            ..defaults
        };

        if google_maps_api_key.is_empty() && maps_key_url.is_none() {
            tracing::warn!("GOOGLE_MAPS_API_KEY not set, map functionality will be limited");
        }

        Ok(Self {
            bind_addr,
            google_maps_api_key,
            maps_key_url,
            sheet,
            view_ttl_minutes,
        })
    }
}

fn env_f64(name: &str) -> Option<f64> {
    env::var(name)
        .ok()
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v >= 0.0)
}
