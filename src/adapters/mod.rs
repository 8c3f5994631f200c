pub mod crawl;
pub mod enumeration;
pub mod fingerprint;
pub mod vulnscan;

use crate::error::StageError;

/// Result of a single HTTP probe. Fields are independently nullable; a probe
/// that fails entirely is an error and the URL is dropped upstream.
#[derive(Debug, Clone)]
pub struct Fingerprint {
    pub status_code: Option<i32>,
    pub content_type: Option<String>,
    pub server: Option<String>,
}

/// One finding reported by the external vulnerability scanner, before
/// severity normalization. Only `name` and `url` are guaranteed.
#[derive(Debug, Clone, Default)]
pub struct Finding {
    pub name: String,
    pub description: String,
    pub url: String,
    pub method: Option<String>,
    pub param: Option<String>,
    pub attack: Option<String>,
    pub evidence: Option<String>,
    pub other_info: Option<String>,
    pub instances: i32,
    pub solution: Option<String>,
    pub references: Vec<String>,
    pub severity: Option<String>,
    pub cwe_id: Option<String>,
    pub wasc_id: Option<String>,
    pub plugin_id: Option<String>,
}

#[async_trait::async_trait]
pub trait SubdomainEnumerator: Send + Sync {
    /// Discover hostnames for a domain. Zero results is a valid outcome.
    async fn enumerate(&self, domain: &str) -> Result<Vec<String>, StageError>;
}

#[async_trait::async_trait]
pub trait EndpointCrawler: Send + Sync {
    /// Render the root page of a hostname and return the absolute URLs
    /// reachable from hyperlink and script-source attributes.
    async fn crawl(&self, hostname: &str) -> Result<Vec<String>, StageError>;
}

#[async_trait::async_trait]
pub trait HttpFingerprinter: Send + Sync {
    async fn fingerprint(&self, url: &str) -> Result<Fingerprint, StageError>;
}

#[async_trait::async_trait]
pub trait VulnScanner: Send + Sync {
    /// Drive the scanner's start/poll/fetch protocol for one URL.
    async fn scan(&self, url: &str) -> Result<Vec<Finding>, StageError>;
}
