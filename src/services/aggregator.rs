use std::collections::BTreeSet;

use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder};
use serde::Serialize;

use crate::entities::{alert, domain, endpoint, scan, subdomain};

/// Externally visible scan view, valid at any stage of progress.
#[derive(Debug, Serialize)]
pub struct ScanSummary {
    pub uid: String,
    pub domain: String,
    pub status: String,
    pub created_at: String,
    pub subdomains: Vec<String>,
    pub endpoints: Vec<EndpointSummary>,
}

#[derive(Debug, Serialize)]
pub struct EndpointSummary {
    pub uid: String,
    pub subdomain: String,
    pub url: String,
    pub status_code: Option<i32>,
    pub content_type: Option<String>,
    pub server: Option<String>,
    /// Sorted, de-duplicated alert names observed for this endpoint.
    pub alerts: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct EndpointDetail {
    pub uid: String,
    pub subdomain: String,
    pub url: String,
    pub status_code: Option<i32>,
    pub content_type: Option<String>,
    pub server: Option<String>,
    pub alerts: Vec<AlertDetail>,
}

/// Full alert record, minus internal row identifiers.
#[derive(Debug, Serialize)]
pub struct AlertDetail {
    pub uid: String,
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
    pub severity: String,
    pub cwe_id: Option<String>,
    pub wasc_id: Option<String>,
    pub plugin_id: Option<String>,
    pub created_at: String,
}

impl From<alert::Model> for AlertDetail {
    fn from(a: alert::Model) -> Self {
        let references: Vec<String> = serde_json::from_str(&a.references).unwrap_or_default();
        AlertDetail {
            uid: a.uid,
            name: a.name,
            description: a.description,
            url: a.url,
            method: a.method,
            param: a.param,
            attack: a.attack,
            evidence: a.evidence,
            other_info: a.other_info,
            instances: a.instances,
            solution: a.solution,
            references,
            severity: a.severity,
            cwe_id: a.cwe_id,
            wasc_id: a.wasc_id,
            plugin_id: a.plugin_id,
            created_at: a.created_at.to_string(),
        }
    }
}

/// Pure read over persisted state; `Ok(None)` when the scan uid does not
/// resolve. With `exclude_html` set, endpoints whose content type contains
/// "text/html" are omitted to surface only API-like endpoints.
pub async fn get_scan_summary(
    db: &DatabaseConnection,
    scan_uid: &str,
    exclude_html: bool,
) -> Result<Option<ScanSummary>, DbErr> {
    let Some(scan_row) = scan::Entity::find()
        .filter(scan::Column::Uid.eq(scan_uid))
        .one(db)
        .await?
    else {
        return Ok(None);
    };

    let domain_name = domain::Entity::find_by_id(scan_row.domain_id)
        .one(db)
        .await?
        .map(|d| d.domain)
        .unwrap_or_default();

    let subdomains = subdomain::Entity::find()
        .filter(subdomain::Column::ScanId.eq(scan_row.id))
        .order_by_asc(subdomain::Column::Subdomain)
        .all(db)
        .await?
        .into_iter()
        .map(|s| s.subdomain)
        .collect();

    let endpoint_rows = endpoint::Entity::find()
        .filter(endpoint::Column::ScanId.eq(scan_row.id))
        .order_by_asc(endpoint::Column::Id)
        .all(db)
        .await?;

    let mut endpoints = Vec::new();
    for ep in endpoint_rows {
        if exclude_html && is_html(ep.content_type.as_deref()) {
            continue;
        }
        let names: BTreeSet<String> = alert::Entity::find()
            .filter(alert::Column::EndpointId.eq(ep.id))
            .all(db)
            .await?
            .into_iter()
            .map(|a| a.name)
            .collect();
        endpoints.push(EndpointSummary {
            uid: ep.uid,
            subdomain: ep.subdomain,
            url: ep.url,
            status_code: ep.status_code,
            content_type: ep.content_type,
            server: ep.server,
            alerts: names.into_iter().collect(),
        });
    }

    Ok(Some(ScanSummary {
        uid: scan_row.uid,
        domain: domain_name,
        status: scan_row.status,
        created_at: scan_row.created_at.to_string(),
        subdomains,
        endpoints,
    }))
}

/// `Ok(None)` when the endpoint uid does not resolve; alerts are returned in
/// full, ordered by creation time ascending.
pub async fn get_endpoint_detail(
    db: &DatabaseConnection,
    endpoint_uid: &str,
) -> Result<Option<EndpointDetail>, DbErr> {
    let Some(ep) = endpoint::Entity::find()
        .filter(endpoint::Column::Uid.eq(endpoint_uid))
        .one(db)
        .await?
    else {
        return Ok(None);
    };

    let alerts = alert::Entity::find()
        .filter(alert::Column::EndpointId.eq(ep.id))
        .order_by_asc(alert::Column::CreatedAt)
        .order_by_asc(alert::Column::Id)
        .all(db)
        .await?
        .into_iter()
        .map(AlertDetail::from)
        .collect();

    Ok(Some(EndpointDetail {
        uid: ep.uid,
        subdomain: ep.subdomain,
        url: ep.url,
        status_code: ep.status_code,
        content_type: ep.content_type,
        server: ep.server,
        alerts,
    }))
}

fn is_html(content_type: Option<&str>) -> bool {
    content_type
        .map(|ct| ct.to_lowercase().contains("text/html"))
        .unwrap_or(false)
}
