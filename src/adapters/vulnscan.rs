use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tokio::time::Instant;

use super::{Finding, VulnScanner};
use crate::config::Settings;
use crate::error::StageError;

/// Drives a ZAP-style passive scanner through its three-step protocol:
/// start a scan, poll status until 100%, fetch alerts for the base URL.
/// The poll loop runs under a hard deadline so a stalled scanner surfaces
/// as a stage failure instead of hanging the pipeline.
pub struct ZapScanner {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    poll_interval: Duration,
    poll_ceiling: Duration,
}

#[derive(Deserialize)]
struct StartResponse {
    #[serde(default)]
    scan: String,
}

#[derive(Deserialize)]
struct StatusResponse {
    #[serde(default)]
    status: String,
}

#[derive(Deserialize)]
struct AlertsResponse {
    #[serde(default)]
    alerts: Vec<ZapAlert>,
}

// ZAP serializes nearly everything as strings and omits fields freely.
#[derive(Deserialize, Default)]
#[serde(default)]
struct ZapAlert {
    alert: String,
    name: String,
    description: String,
    url: String,
    method: String,
    param: String,
    attack: String,
    evidence: String,
    other: String,
    solution: String,
    reference: String,
    risk: String,
    count: String,
    cweid: String,
    wascid: String,
    #[serde(rename = "pluginId")]
    plugin_id: String,
}

impl ZapScanner {
    pub fn new(settings: &Settings) -> Self {
        let client = Client::builder()
            .timeout(settings.zap_request_timeout)
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            base_url: settings.zap_base_url.trim_end_matches('/').to_string(),
            api_key: settings.zap_api_key.clone(),
            poll_interval: settings.zap_poll_interval,
            poll_ceiling: settings.zap_poll_ceiling,
        }
    }

    fn err(&self, url: &str, e: impl ToString) -> StageError {
        StageError::VulnScan {
            url: url.to_string(),
            reason: e.to_string(),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
        target: &str,
    ) -> Result<T, StageError> {
        let mut query: Vec<(&str, &str)> = params.to_vec();
        if let Some(key) = self.api_key.as_deref() {
            query.push(("apikey", key));
        }
        let resp = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .query(&query)
            .send()
            .await
            .map_err(|e| self.err(target, e))?
            .error_for_status()
            .map_err(|e| self.err(target, e))?;
        resp.json::<T>().await.map_err(|e| self.err(target, e))
    }

    async fn start_scan(&self, url: &str) -> Result<String, StageError> {
        let resp: StartResponse = self
            .get_json("/JSON/core/action/scan/", &[("url", url)], url)
            .await?;
        if resp.scan.is_empty() {
            return Err(self.err(url, "scanner returned no scan handle"));
        }
        Ok(resp.scan)
    }

    async fn poll_until_complete(&self, handle: &str, url: &str) -> Result<(), StageError> {
        let deadline = Instant::now() + self.poll_ceiling;
        loop {
            let resp: StatusResponse = self
                .get_json("/JSON/core/view/status/", &[("scanId", handle)], url)
                .await?;
            let progress: i32 = resp.status.trim().parse().unwrap_or(0);
            tracing::debug!("scan {} progress: {}%", handle, progress);
            if progress >= 100 {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(StageError::PollDeadline(self.poll_ceiling));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn fetch_alerts(&self, url: &str) -> Result<Vec<Finding>, StageError> {
        let resp: AlertsResponse = self
            .get_json("/JSON/core/view/alerts/", &[("baseurl", url)], url)
            .await?;
        Ok(resp.alerts.into_iter().map(Finding::from).collect())
    }
}

#[async_trait::async_trait]
impl VulnScanner for ZapScanner {
    async fn scan(&self, url: &str) -> Result<Vec<Finding>, StageError> {
        let handle = self.start_scan(url).await?;
        self.poll_until_complete(&handle, url).await?;
        self.fetch_alerts(url).await
    }
}

impl From<ZapAlert> for Finding {
    fn from(a: ZapAlert) -> Self {
        let non_empty = |s: String| if s.is_empty() { None } else { Some(s) };
        // Newer ZAP versions report the finding name under "name", older
        // ones under "alert".
        let name = if a.name.is_empty() { a.alert } else { a.name };
        Finding {
            name,
            description: a.description,
            url: a.url,
            method: non_empty(a.method),
            param: non_empty(a.param),
            attack: non_empty(a.attack),
            evidence: non_empty(a.evidence),
            other_info: non_empty(a.other),
            instances: a.count.trim().parse().unwrap_or(1),
            solution: non_empty(a.solution),
            references: a
                .reference
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect(),
            severity: non_empty(a.risk),
            cwe_id: non_empty(a.cweid),
            wasc_id: non_empty(a.wascid),
            plugin_id: non_empty(a.plugin_id),
        }
    }
}
