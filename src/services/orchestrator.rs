use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set,
};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::adapters::{
    EndpointCrawler, Finding, HttpFingerprinter, SubdomainEnumerator, VulnScanner,
};
use crate::entities::{alert, domain, endpoint, scan, subdomain};
use crate::error::PipelineError;
use crate::services::severity::SeverityOverrides;

/// Scan lifecycle: queued -> in_progress -> complete | error. Terminal
/// states are never left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStatus {
    Queued,
    InProgress,
    Complete,
    Error,
}

impl ScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Queued => "queued",
            ScanStatus::InProgress => "in_progress",
            ScanStatus::Complete => "complete",
            ScanStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(ScanStatus::Queued),
            "in_progress" => Some(ScanStatus::InProgress),
            "complete" => Some(ScanStatus::Complete),
            "error" => Some(ScanStatus::Error),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ScanStatus::Complete | ScanStatus::Error)
    }
}

/// Drives one scan through enumeration, crawl, fingerprint and vulnerability
/// scan stages, persisting every artifact as soon as it exists. Stage-level
/// failures degrade to empty results; lookup and database failures abort the
/// scan with a terminal `error` status.
#[derive(Clone)]
pub struct Orchestrator {
    db: DatabaseConnection,
    enumerator: Arc<dyn SubdomainEnumerator>,
    crawler: Arc<dyn EndpointCrawler>,
    fingerprinter: Arc<dyn HttpFingerprinter>,
    vuln_scanner: Arc<dyn VulnScanner>,
    overrides: Arc<SeverityOverrides>,
    fanout_limit: usize,
}

impl Orchestrator {
    pub fn new(
        db: DatabaseConnection,
        enumerator: Arc<dyn SubdomainEnumerator>,
        crawler: Arc<dyn EndpointCrawler>,
        fingerprinter: Arc<dyn HttpFingerprinter>,
        vuln_scanner: Arc<dyn VulnScanner>,
        overrides: Arc<SeverityOverrides>,
        fanout_limit: usize,
    ) -> Self {
        Self {
            db,
            enumerator,
            crawler,
            fingerprinter,
            vuln_scanner,
            overrides,
            fanout_limit: fanout_limit.max(1),
        }
    }

    /// Entry point for the dispatch layer. Never returns an error; everything
    /// observable lands in the database.
    pub async fn run_scan(&self, scan_id: i32, domain_id: i32) {
        match self.execute(scan_id, domain_id).await {
            Ok(()) => tracing::info!("scan {} complete", scan_id),
            Err(PipelineError::AlreadyDispatched { scan_id, status }) => {
                // Rejected re-entry must not disturb the existing run's status.
                tracing::warn!("scan {} already dispatched (status {}), ignoring", scan_id, status);
            }
            Err(e) => {
                tracing::error!("scan {} failed: {}", scan_id, e);
                if let Err(e) = self.set_status(scan_id, ScanStatus::Error).await {
                    tracing::error!("failed to mark scan {} as error: {}", scan_id, e);
                }
            }
        }
    }

    async fn execute(&self, scan_id: i32, domain_id: i32) -> Result<(), PipelineError> {
        self.claim_scan(scan_id).await?;

        let domain_row = domain::Entity::find_by_id(domain_id)
            .one(&self.db)
            .await?
            .ok_or(PipelineError::DomainNotFound(domain_id))?;

        tracing::info!("scan {} started for {}", scan_id, domain_row.domain);

        let hostnames = match self.enumerator.enumerate(&domain_row.domain).await {
            Ok(hosts) => hosts,
            Err(e) => {
                tracing::warn!("enumeration degraded to empty set: {}", e);
                Vec::new()
            }
        };

        // All subdomains are durable before any crawling starts, so a crash
        // mid-crawl still leaves enumeration results queryable.
        for host in &hostnames {
            self.insert_subdomain(scan_id, host).await?;
        }

        let host_sem = Arc::new(Semaphore::new(self.fanout_limit));
        let endpoint_sem = Arc::new(Semaphore::new(self.fanout_limit));
        let mut tasks = JoinSet::new();
        let mut seen_hosts = HashSet::new();
        for host in hostnames {
            if !seen_hosts.insert(host.clone()) {
                continue;
            }
            let this = self.clone();
            let sem = host_sem.clone();
            let ep_sem = endpoint_sem.clone();
            tasks.spawn(async move {
                let _permit = sem
                    .acquire_owned()
                    .await
                    .map_err(|e| PipelineError::Task(e.to_string()))?;
                this.process_hostname(scan_id, host, ep_sem).await
            });
        }
        join_all(&mut tasks).await?;

        self.set_status(scan_id, ScanStatus::Complete).await
    }

    async fn process_hostname(
        &self,
        scan_id: i32,
        host: String,
        endpoint_sem: Arc<Semaphore>,
    ) -> Result<(), PipelineError> {
        let urls = match self.crawler.crawl(&host).await {
            Ok(urls) => urls,
            Err(e) => {
                tracing::warn!("{}", e);
                return Ok(());
            }
        };

        let mut seen = HashSet::new();
        let mut tasks = JoinSet::new();
        for url in urls {
            if !seen.insert(url.clone()) {
                continue;
            }
            let this = self.clone();
            let host = host.clone();
            let sem = endpoint_sem.clone();
            tasks.spawn(async move {
                let _permit = sem
                    .acquire_owned()
                    .await
                    .map_err(|e| PipelineError::Task(e.to_string()))?;
                this.process_endpoint(scan_id, host, url).await
            });
        }
        join_all(&mut tasks).await
    }

    async fn process_endpoint(
        &self,
        scan_id: i32,
        host: String,
        url: String,
    ) -> Result<(), PipelineError> {
        // A URL that cannot be fingerprinted gets no endpoint row at all.
        let fp = match self.fingerprinter.fingerprint(&url).await {
            Ok(fp) => fp,
            Err(e) => {
                tracing::warn!("dropping endpoint: {}", e);
                return Ok(());
            }
        };

        let ep = endpoint::ActiveModel {
            scan_id: Set(scan_id),
            uid: Set(Uuid::new_v4().to_string()),
            subdomain: Set(host),
            url: Set(url.clone()),
            status_code: Set(fp.status_code),
            content_type: Set(fp.content_type),
            server: Set(fp.server),
            alert_refs: Set("[]".to_string()),
            created_at: Set(Utc::now().naive_utc()),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        let findings = match self.vuln_scanner.scan(&url).await {
            Ok(findings) => findings,
            Err(e) => {
                tracing::warn!("{}", e);
                return Ok(());
            }
        };

        let mut refs: Vec<String> = Vec::new();
        for finding in findings {
            let stored = self.insert_alert(ep.id, &url, finding).await?;
            refs.push(stored.uid);
            let mut am: endpoint::ActiveModel = ep.clone().into();
            am.alert_refs =
                Set(serde_json::to_string(&refs).unwrap_or_else(|_| "[]".to_string()));
            am.update(&self.db).await?;
        }
        Ok(())
    }

    /// Atomically moves the scan from `queued` to `in_progress`. A single
    /// conditional UPDATE is the claim: concurrent dispatches of the same
    /// scan race for it and exactly one wins, so re-entry is rejected before
    /// any stage runs.
    async fn claim_scan(&self, scan_id: i32) -> Result<(), PipelineError> {
        let res = scan::Entity::update_many()
            .col_expr(
                scan::Column::Status,
                Expr::value(ScanStatus::InProgress.as_str()),
            )
            .filter(scan::Column::Id.eq(scan_id))
            .filter(scan::Column::Status.eq(ScanStatus::Queued.as_str()))
            .exec(&self.db)
            .await?;
        if res.rows_affected == 1 {
            return Ok(());
        }
        match scan::Entity::find_by_id(scan_id).one(&self.db).await? {
            Some(row) => Err(PipelineError::AlreadyDispatched {
                scan_id,
                status: row.status,
            }),
            None => Err(PipelineError::ScanNotFound(scan_id)),
        }
    }

    async fn insert_subdomain(&self, scan_id: i32, host: &str) -> Result<(), PipelineError> {
        let row = subdomain::ActiveModel {
            scan_id: Set(scan_id),
            subdomain: Set(host.to_string()),
            created_at: Set(Utc::now().naive_utc()),
            ..Default::default()
        };
        let insert = subdomain::Entity::insert(row).on_conflict(
            OnConflict::columns([subdomain::Column::ScanId, subdomain::Column::Subdomain])
                .do_nothing()
                .to_owned(),
        );
        match insert.exec(&self.db).await {
            Ok(_) | Err(DbErr::RecordNotInserted) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn insert_alert(
        &self,
        endpoint_id: i32,
        endpoint_url: &str,
        finding: Finding,
    ) -> Result<alert::Model, PipelineError> {
        let severity = self
            .overrides
            .normalize(&finding.name, finding.severity.as_deref());
        let url = if finding.url.is_empty() {
            endpoint_url.to_string()
        } else {
            finding.url
        };
        let row = alert::ActiveModel {
            endpoint_id: Set(endpoint_id),
            uid: Set(Uuid::new_v4().to_string()),
            name: Set(finding.name),
            description: Set(finding.description),
            url: Set(url),
            method: Set(finding.method),
            param: Set(finding.param),
            attack: Set(finding.attack),
            evidence: Set(finding.evidence),
            other_info: Set(finding.other_info),
            instances: Set(finding.instances),
            references: Set(
                serde_json::to_string(&finding.references).unwrap_or_else(|_| "[]".to_string())
            ),
            severity: Set(severity),
            cwe_id: Set(finding.cwe_id),
            wasc_id: Set(finding.wasc_id),
            plugin_id: Set(finding.plugin_id),
            solution: Set(finding.solution),
            created_at: Set(Utc::now().naive_utc()),
            ..Default::default()
        };
        Ok(row.insert(&self.db).await?)
    }

    /// Status writes are monotonic: once a scan is terminal it stays there.
    async fn set_status(&self, scan_id: i32, status: ScanStatus) -> Result<(), PipelineError> {
        let row = scan::Entity::find_by_id(scan_id)
            .one(&self.db)
            .await?
            .ok_or(PipelineError::ScanNotFound(scan_id))?;
        if ScanStatus::parse(&row.status).is_some_and(|s| s.is_terminal()) {
            return Ok(());
        }
        let mut am: scan::ActiveModel = row.into();
        am.status = Set(status.as_str().to_string());
        am.update(&self.db).await?;
        Ok(())
    }
}

async fn join_all(tasks: &mut JoinSet<Result<(), PipelineError>>) -> Result<(), PipelineError> {
    while let Some(res) = tasks.join_next().await {
        match res {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(e) => return Err(PipelineError::Task(e.to_string())),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::Fingerprint;
    use crate::entities::account;
    use crate::error::StageError;
    use sea_orm::{ColumnTrait, Database, QueryFilter};
    use std::collections::HashMap;

    struct StaticEnumerator(Vec<String>);

    #[async_trait::async_trait]
    impl SubdomainEnumerator for StaticEnumerator {
        async fn enumerate(&self, _domain: &str) -> Result<Vec<String>, StageError> {
            Ok(self.0.clone())
        }
    }

    /// Enumerates after a delay, widening any dispatch race window.
    struct SlowEnumerator(Vec<String>);

    #[async_trait::async_trait]
    impl SubdomainEnumerator for SlowEnumerator {
        async fn enumerate(&self, _domain: &str) -> Result<Vec<String>, StageError> {
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            Ok(self.0.clone())
        }
    }

    struct FailingEnumerator;

    #[async_trait::async_trait]
    impl SubdomainEnumerator for FailingEnumerator {
        async fn enumerate(&self, _domain: &str) -> Result<Vec<String>, StageError> {
            Err(StageError::Enumeration("subfinder exited with 1".into()))
        }
    }

    /// Hosts without an entry behave like a crawl timeout.
    struct MapCrawler(HashMap<String, Vec<String>>);

    #[async_trait::async_trait]
    impl EndpointCrawler for MapCrawler {
        async fn crawl(&self, hostname: &str) -> Result<Vec<String>, StageError> {
            self.0
                .get(hostname)
                .cloned()
                .ok_or_else(|| StageError::Crawl {
                    host: hostname.to_string(),
                    reason: "timeout".into(),
                })
        }
    }

    struct StaticFingerprinter {
        fail_urls: Vec<String>,
    }

    #[async_trait::async_trait]
    impl HttpFingerprinter for StaticFingerprinter {
        async fn fingerprint(&self, url: &str) -> Result<Fingerprint, StageError> {
            if self.fail_urls.iter().any(|u| u == url) {
                return Err(StageError::Fingerprint {
                    url: url.to_string(),
                    reason: "connection refused".into(),
                });
            }
            Ok(Fingerprint {
                status_code: Some(200),
                content_type: Some("application/json".into()),
                server: Some("nginx".into()),
            })
        }
    }

    struct StaticScanner {
        findings: Vec<Finding>,
        fail: bool,
    }

    /// Simulates a stalled external scanner whose poll loop hit its ceiling.
    struct StalledScanner;

    #[async_trait::async_trait]
    impl VulnScanner for StalledScanner {
        async fn scan(&self, _url: &str) -> Result<Vec<Finding>, StageError> {
            Err(StageError::PollDeadline(std::time::Duration::from_secs(300)))
        }
    }

    #[async_trait::async_trait]
    impl VulnScanner for StaticScanner {
        async fn scan(&self, url: &str) -> Result<Vec<Finding>, StageError> {
            if self.fail {
                return Err(StageError::VulnScan {
                    url: url.to_string(),
                    reason: "scanner unreachable".into(),
                });
            }
            Ok(self.findings.clone())
        }
    }

    async fn test_db() -> DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        crate::db::create_schema(&db).await.unwrap();
        db
    }

    async fn seed_scan(db: &DatabaseConnection, domain: &str) -> (i32, i32) {
        let account = account::ActiveModel {
            uid: Set(Uuid::new_v4().to_string()),
            name: Set("acme".into()),
            created_at: Set(Utc::now().naive_utc()),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap();
        let domain = domain::ActiveModel {
            account_id: Set(account.id),
            uid: Set(Uuid::new_v4().to_string()),
            domain: Set(domain.to_string()),
            created_at: Set(Utc::now().naive_utc()),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap();
        let scan = scan::ActiveModel {
            domain_id: Set(domain.id),
            uid: Set(Uuid::new_v4().to_string()),
            status: Set(ScanStatus::Queued.as_str().to_string()),
            created_at: Set(Utc::now().naive_utc()),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap();
        (scan.id, domain.id)
    }

    fn orchestrator(
        db: DatabaseConnection,
        enumerator: impl SubdomainEnumerator + 'static,
        crawler: impl EndpointCrawler + 'static,
        fingerprinter: impl HttpFingerprinter + 'static,
        scanner: impl VulnScanner + 'static,
    ) -> Orchestrator {
        Orchestrator::new(
            db,
            Arc::new(enumerator),
            Arc::new(crawler),
            Arc::new(fingerprinter),
            Arc::new(scanner),
            Arc::new(SeverityOverrides::default()),
            4,
        )
    }

    async fn scan_status(db: &DatabaseConnection, scan_id: i32) -> String {
        scan::Entity::find_by_id(scan_id)
            .one(db)
            .await
            .unwrap()
            .unwrap()
            .status
    }

    #[tokio::test]
    async fn empty_enumeration_completes_with_no_children() {
        let db = test_db().await;
        let (scan_id, domain_id) = seed_scan(&db, "example.com").await;
        let orch = orchestrator(
            db.clone(),
            StaticEnumerator(vec![]),
            MapCrawler(HashMap::new()),
            StaticFingerprinter { fail_urls: vec![] },
            StaticScanner { findings: vec![], fail: false },
        );
        orch.run_scan(scan_id, domain_id).await;

        assert_eq!(scan_status(&db, scan_id).await, "complete");
        assert_eq!(subdomain::Entity::find().all(&db).await.unwrap().len(), 0);
        assert_eq!(endpoint::Entity::find().all(&db).await.unwrap().len(), 0);
        assert_eq!(alert::Entity::find().all(&db).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn enumeration_failure_degrades_to_empty_set() {
        let db = test_db().await;
        let (scan_id, domain_id) = seed_scan(&db, "example.com").await;
        let orch = orchestrator(
            db.clone(),
            FailingEnumerator,
            MapCrawler(HashMap::new()),
            StaticFingerprinter { fail_urls: vec![] },
            StaticScanner { findings: vec![], fail: false },
        );
        orch.run_scan(scan_id, domain_id).await;

        assert_eq!(scan_status(&db, scan_id).await, "complete");
        assert!(subdomain::Entity::find().all(&db).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_subdomains_are_absorbed() {
        let db = test_db().await;
        let (scan_id, domain_id) = seed_scan(&db, "example.com").await;
        let orch = orchestrator(
            db.clone(),
            StaticEnumerator(vec!["api.example.com".into(), "api.example.com".into()]),
            MapCrawler(HashMap::from([("api.example.com".to_string(), vec![])])),
            StaticFingerprinter { fail_urls: vec![] },
            StaticScanner { findings: vec![], fail: false },
        );
        orch.run_scan(scan_id, domain_id).await;

        assert_eq!(scan_status(&db, scan_id).await, "complete");
        let rows = subdomain::Entity::find()
            .filter(subdomain::Column::Subdomain.eq("api.example.com"))
            .all(&db)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn crawl_failure_is_local_to_the_hostname() {
        let db = test_db().await;
        let (scan_id, domain_id) = seed_scan(&db, "example.com").await;
        let crawl_map = HashMap::from([
            (
                "a.example.com".to_string(),
                vec!["https://a.example.com/x".to_string()],
            ),
            (
                "c.example.com".to_string(),
                vec!["https://c.example.com/y".to_string()],
            ),
            // b.example.com missing: crawl times out for it
        ]);
        let orch = orchestrator(
            db.clone(),
            StaticEnumerator(vec![
                "a.example.com".into(),
                "b.example.com".into(),
                "c.example.com".into(),
            ]),
            MapCrawler(crawl_map),
            StaticFingerprinter { fail_urls: vec![] },
            StaticScanner { findings: vec![], fail: false },
        );
        orch.run_scan(scan_id, domain_id).await;

        assert_eq!(scan_status(&db, scan_id).await, "complete");
        let endpoints = endpoint::Entity::find().all(&db).await.unwrap();
        assert_eq!(endpoints.len(), 2);
        assert!(endpoints.iter().all(|e| e.subdomain != "b.example.com"));
    }

    #[tokio::test]
    async fn unfingerprintable_url_is_dropped() {
        let db = test_db().await;
        let (scan_id, domain_id) = seed_scan(&db, "example.com").await;
        let crawl_map = HashMap::from([(
            "api.example.com".to_string(),
            vec![
                "https://api.example.com/ok".to_string(),
                "https://api.example.com/dead".to_string(),
            ],
        )]);
        let orch = orchestrator(
            db.clone(),
            StaticEnumerator(vec!["api.example.com".into()]),
            MapCrawler(crawl_map),
            StaticFingerprinter {
                fail_urls: vec!["https://api.example.com/dead".to_string()],
            },
            StaticScanner { findings: vec![], fail: false },
        );
        orch.run_scan(scan_id, domain_id).await;

        assert_eq!(scan_status(&db, scan_id).await, "complete");
        let endpoints = endpoint::Entity::find().all(&db).await.unwrap();
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].url, "https://api.example.com/ok");
    }

    #[tokio::test]
    async fn vuln_scan_failure_keeps_endpoint_without_alerts() {
        let db = test_db().await;
        let (scan_id, domain_id) = seed_scan(&db, "example.com").await;
        let crawl_map = HashMap::from([(
            "api.example.com".to_string(),
            vec!["https://api.example.com/v1".to_string()],
        )]);
        let orch = orchestrator(
            db.clone(),
            StaticEnumerator(vec!["api.example.com".into()]),
            MapCrawler(crawl_map),
            StaticFingerprinter { fail_urls: vec![] },
            StaticScanner { findings: vec![], fail: true },
        );
        orch.run_scan(scan_id, domain_id).await;

        assert_eq!(scan_status(&db, scan_id).await, "complete");
        assert_eq!(endpoint::Entity::find().all(&db).await.unwrap().len(), 1);
        assert!(alert::Entity::find().all(&db).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn severity_override_applies_and_alert_refs_append() {
        let db = test_db().await;
        let (scan_id, domain_id) = seed_scan(&db, "example.com").await;
        let crawl_map = HashMap::from([(
            "api.example.com".to_string(),
            vec!["https://api.example.com/v1/users".to_string()],
        )]);
        let finding = Finding {
            name: "Strict-Transport-Security Header Not Set".into(),
            url: "https://api.example.com/v1/users".into(),
            severity: Some("Unknown".into()),
            instances: 1,
            ..Default::default()
        };
        let orch = orchestrator(
            db.clone(),
            StaticEnumerator(vec!["api.example.com".into()]),
            MapCrawler(crawl_map),
            StaticFingerprinter { fail_urls: vec![] },
            StaticScanner { findings: vec![finding], fail: false },
        );
        orch.run_scan(scan_id, domain_id).await;

        assert_eq!(scan_status(&db, scan_id).await, "complete");
        let alerts = alert::Entity::find().all(&db).await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, "Low");

        let ep = endpoint::Entity::find().one(&db).await.unwrap().unwrap();
        let refs: Vec<String> = serde_json::from_str(&ep.alert_refs).unwrap();
        assert_eq!(refs, vec![alerts[0].uid.clone()]);

        let scan_row = scan::Entity::find_by_id(scan_id).one(&db).await.unwrap().unwrap();
        let summary = crate::services::aggregator::get_scan_summary(&db, &scan_row.uid, false)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(summary.subdomains, vec!["api.example.com".to_string()]);
        assert_eq!(summary.endpoints.len(), 1);
        assert_eq!(
            summary.endpoints[0].alerts,
            vec!["Strict-Transport-Security Header Not Set".to_string()]
        );
    }

    #[tokio::test]
    async fn reentry_of_a_dispatched_scan_is_rejected() {
        let db = test_db().await;
        let (scan_id, domain_id) = seed_scan(&db, "example.com").await;
        let orch = orchestrator(
            db.clone(),
            StaticEnumerator(vec!["api.example.com".into()]),
            MapCrawler(HashMap::from([("api.example.com".to_string(), vec![])])),
            StaticFingerprinter { fail_urls: vec![] },
            StaticScanner { findings: vec![], fail: false },
        );
        orch.run_scan(scan_id, domain_id).await;
        assert_eq!(scan_status(&db, scan_id).await, "complete");

        // Second dispatch: no re-run, no duplicate rows, status untouched.
        orch.run_scan(scan_id, domain_id).await;
        assert_eq!(scan_status(&db, scan_id).await, "complete");
        assert_eq!(subdomain::Entity::find().all(&db).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn concurrent_dispatch_claims_scan_once() {
        let db = test_db().await;
        let (scan_id, domain_id) = seed_scan(&db, "example.com").await;
        let crawl_map = HashMap::from([(
            "api.example.com".to_string(),
            vec!["https://api.example.com/v1".to_string()],
        )]);
        let orch = orchestrator(
            db.clone(),
            SlowEnumerator(vec!["api.example.com".into()]),
            MapCrawler(crawl_map),
            StaticFingerprinter { fail_urls: vec![] },
            StaticScanner { findings: vec![], fail: false },
        );

        // Two dispatches race for the same queued scan; exactly one may run.
        tokio::join!(
            orch.run_scan(scan_id, domain_id),
            orch.run_scan(scan_id, domain_id),
        );

        assert_eq!(scan_status(&db, scan_id).await, "complete");
        assert_eq!(endpoint::Entity::find().all(&db).await.unwrap().len(), 1);
        assert_eq!(subdomain::Entity::find().all(&db).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn poll_deadline_is_absorbed_per_endpoint() {
        let db = test_db().await;
        let (scan_id, domain_id) = seed_scan(&db, "example.com").await;
        let crawl_map = HashMap::from([(
            "api.example.com".to_string(),
            vec!["https://api.example.com/v1".to_string()],
        )]);
        let orch = orchestrator(
            db.clone(),
            StaticEnumerator(vec!["api.example.com".into()]),
            MapCrawler(crawl_map),
            StaticFingerprinter { fail_urls: vec![] },
            StalledScanner,
        );
        orch.run_scan(scan_id, domain_id).await;

        // A scanner that never finishes costs that endpoint its alerts,
        // nothing more.
        assert_eq!(scan_status(&db, scan_id).await, "complete");
        assert_eq!(endpoint::Entity::find().all(&db).await.unwrap().len(), 1);
        assert!(alert::Entity::find().all(&db).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_domain_is_fatal() {
        let db = test_db().await;
        let (scan_id, _domain_id) = seed_scan(&db, "example.com").await;
        let orch = orchestrator(
            db.clone(),
            StaticEnumerator(vec![]),
            MapCrawler(HashMap::new()),
            StaticFingerprinter { fail_urls: vec![] },
            StaticScanner { findings: vec![], fail: false },
        );
        orch.run_scan(scan_id, 9999).await;
        assert_eq!(scan_status(&db, scan_id).await, "error");
    }
}
