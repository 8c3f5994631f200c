use std::time::Duration;

use reqwest::Client;

use super::{Fingerprint, HttpFingerprinter};
use crate::error::StageError;

/// Single bounded GET capturing status code, content type and server header.
pub struct HttpProber {
    client: Client,
}

impl HttpProber {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(timeout)
            .build()
            .expect("failed to build HTTP client");
        Self { client }
    }
}

#[async_trait::async_trait]
impl HttpFingerprinter for HttpProber {
    async fn fingerprint(&self, url: &str) -> Result<Fingerprint, StageError> {
        let resp = self.client.get(url).send().await.map_err(|e| StageError::Fingerprint {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let header = |name: &str| {
            resp.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.to_string())
        };

        Ok(Fingerprint {
            status_code: Some(resp.status().as_u16() as i32),
            content_type: header("content-type").or_else(|| Some("Unknown".to_string())),
            server: header("server").or_else(|| Some("Unknown".to_string())),
        })
    }
}
