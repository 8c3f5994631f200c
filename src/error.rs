use thiserror::Error;

/// Adapter-level failure in one pipeline stage. Always absorbed by the
/// orchestrator: logged, degraded to an empty or partial result, never fatal
/// to the scan.
#[derive(Error, Debug)]
pub enum StageError {
    #[error("subdomain enumeration failed: {0}")]
    Enumeration(String),

    #[error("crawl failed for {host}: {reason}")]
    Crawl { host: String, reason: String },

    #[error("fingerprint failed for {url}: {reason}")]
    Fingerprint { url: String, reason: String },

    #[error("vulnerability scan failed for {url}: {reason}")]
    VulnScan { url: String, reason: String },

    #[error("vulnerability scan poll exceeded {0:?} deadline")]
    PollDeadline(std::time::Duration),
}

/// Fatal orchestration failure. Flips the scan status to `error`; rows
/// persisted before the failure are kept.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("scan {0} not found")]
    ScanNotFound(i32),

    #[error("domain {0} not found")]
    DomainNotFound(i32),

    #[error("scan {scan_id} already dispatched (status {status})")]
    AlreadyDispatched { scan_id: i32, status: String },

    #[error("database error: {0}")]
    Db(#[from] sea_orm::DbErr),

    #[error("worker task failed: {0}")]
    Task(String),
}
