use std::env;
use std::time::Duration;

/// Runtime settings, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub zap_base_url: String,
    pub zap_api_key: Option<String>,
    pub crawl_timeout: Duration,
    pub fingerprint_timeout: Duration,
    pub zap_request_timeout: Duration,
    pub zap_poll_interval: Duration,
    pub zap_poll_ceiling: Duration,
    pub fanout_limit: usize,
}

impl Settings {
    pub fn from_env() -> Self {
        Self {
            zap_base_url: env::var("ZAP_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            zap_api_key: env::var("ZAP_API_KEY").ok(),
            crawl_timeout: secs_from_env("CRAWL_TIMEOUT_SECS", 5),
            fingerprint_timeout: secs_from_env("FINGERPRINT_TIMEOUT_SECS", 5),
            zap_request_timeout: secs_from_env("ZAP_REQUEST_TIMEOUT_SECS", 10),
            zap_poll_interval: secs_from_env("ZAP_POLL_INTERVAL_SECS", 2),
            zap_poll_ceiling: secs_from_env("ZAP_POLL_CEILING_SECS", 300),
            fanout_limit: env::var("FANOUT_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8),
        }
    }
}

fn secs_from_env(key: &str, default: u64) -> Duration {
    let secs = env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default);
    Duration::from_secs(secs)
}
