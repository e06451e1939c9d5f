//! Report synthesis: no report entity is stored anywhere. The listing view
//! classifies the most recent snapshots into synthetic report titles, types,
//! and statuses purely by list position, and the detail view flattens one
//! snapshot with its children into a display-ready record.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{AnalyticsError, Result};
use crate::model::TenantContext;
use crate::store::SnapshotStore;
use crate::utils::{month_name, quarter_of};

/// How many snapshots the listing view covers.
pub const REPORT_LIST_LIMIT: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReportType {
    Financial,
    Compliance,
    Risk,
    Performance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReportStatus {
    Published,
    Draft,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub title: String,
    #[serde(rename = "type")]
    pub report_type: ReportType,
    pub status: ReportStatus,
}

/// Assigns a synthetic report identity to the snapshot at `index` in a
/// newest-first listing.
///
/// Index 0 is always the quarterly financial report; every sixth slot is a
/// compliance report (checked before the every-third financial rule so it is
/// reachable), every third financial, every fourth a risk assessment, and the
/// rest monthly performance summaries. The first six slots are published,
/// the rest drafts.
///
/// The classification is derived on read: the same snapshot's type shifts as
/// newer snapshots push its index. Known limitation of the listing contract.
pub fn classify(index: usize, period_end: NaiveDate) -> Classification {
    let quarter = quarter_of(period_end);
    let year = period_end.year();
    let month = month_name(period_end.month());

    let (title, report_type) = if index == 0 {
        (
            format!("Q{quarter} {year} Financial Report"),
            ReportType::Financial,
        )
    } else if index % 6 == 0 {
        (
            format!("Q{quarter} {year} Compliance Report"),
            ReportType::Compliance,
        )
    } else if index % 3 == 0 {
        (
            format!("Q{quarter} {year} Financial Report"),
            ReportType::Financial,
        )
    } else if index % 4 == 0 {
        (
            format!("{month} {year} Risk Assessment Analysis"),
            ReportType::Risk,
        )
    } else {
        (
            format!("{month} {year} Performance Summary"),
            ReportType::Performance,
        )
    };

    let status = if index < 6 {
        ReportStatus::Published
    } else {
        ReportStatus::Draft
    };

    Classification {
        title,
        report_type,
        status,
    }
}

/// One row in the report listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub id: Uuid,
    pub title: String,
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub report_type: ReportType,
    pub status: ReportStatus,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub revenue: f64,
    pub cost: f64,
    pub profit: f64,
    pub gross_margin: f64,
    pub operating_margin: f64,
    pub net_margin: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportList {
    pub reports: Vec<ReportSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDepartmentMetric {
    pub department: String,
    pub revenue: f64,
    pub cost: f64,
    pub profit: f64,
    pub margin: f64,
    pub revenue_share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportCostEntry {
    pub category: String,
    pub amount: f64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportKpi {
    pub label: String,
    pub value: f64,
    pub format: String,
    pub trend: String,
    pub delta_percent: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDetail {
    pub id: Uuid,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub organization: String,
    pub sector: String,
    pub currency: String,
    pub revenue: f64,
    pub cost: f64,
    pub profit: f64,
    pub gross_margin: f64,
    pub operating_margin: f64,
    pub net_margin: f64,
    pub department_metrics: Vec<ReportDepartmentMetric>,
    pub cost_breakdown: Vec<ReportCostEntry>,
    pub kpis: Vec<ReportKpi>,
}

/// The newest [`REPORT_LIST_LIMIT`] snapshots classified into synthetic
/// reports, newest first.
pub fn list_reports<S: SnapshotStore + ?Sized>(
    store: &S,
    ctx: &TenantContext,
) -> Result<ReportList> {
    let snapshots = store.recent_snapshots(ctx, REPORT_LIST_LIMIT)?;

    let reports = snapshots
        .into_iter()
        .enumerate()
        .map(|(index, snapshot)| {
            let classification = classify(index, snapshot.period_end);
            ReportSummary {
                id: snapshot.id,
                title: classification.title,
                date: snapshot.period_end,
                report_type: classification.report_type,
                status: classification.status,
                period_start: snapshot.period_start,
                period_end: snapshot.period_end,
                revenue: snapshot.revenue,
                cost: snapshot.cost,
                profit: snapshot.profit,
                gross_margin: snapshot.gross_margin,
                operating_margin: snapshot.operating_margin,
                net_margin: snapshot.net_margin,
            }
        })
        .collect();

    Ok(ReportList { reports })
}

/// A single snapshot flattened into a full report. An id outside the
/// caller's tenant is reported as not found; whether it exists elsewhere is
/// never revealed.
pub fn report_detail<S: SnapshotStore + ?Sized>(
    store: &S,
    ctx: &TenantContext,
    id: Uuid,
) -> Result<ReportDetail> {
    let detail = store
        .snapshot_by_id(ctx, id)?
        .ok_or(AnalyticsError::ReportNotFound(id))?;

    let organization = store
        .organization(detail.snapshot.organization_id)?
        .ok_or(AnalyticsError::UnknownOrganization(
            detail.snapshot.organization_id,
        ))?;
    let sector = store
        .sector(detail.snapshot.sector_id)?
        .ok_or(AnalyticsError::UnknownSector(detail.snapshot.sector_id))?;

    let department_metrics = detail
        .department_metrics
        .iter()
        .map(|row| ReportDepartmentMetric {
            department: row.department.name.clone(),
            revenue: row.metric.revenue,
            cost: row.metric.cost,
            profit: row.metric.profit,
            margin: row.metric.margin,
            revenue_share: row.metric.revenue_share,
        })
        .collect();

    let cost_breakdown = detail
        .cost_entries
        .iter()
        .map(|row| ReportCostEntry {
            category: row.category.name.clone(),
            amount: row.entry.amount,
            percentage: row.entry.percentage,
        })
        .collect();

    let kpis = detail
        .kpi_values
        .iter()
        .map(|row| ReportKpi {
            label: row.kpi.label.clone(),
            value: row.value.value,
            format: row.kpi.format.as_lower().to_string(),
            trend: row.value.trend.as_lower().to_string(),
            delta_percent: row.value.delta_percent,
        })
        .collect();

    Ok(ReportDetail {
        id: detail.snapshot.id,
        period_start: detail.snapshot.period_start,
        period_end: detail.snapshot.period_end,
        organization: organization.name,
        sector: sector.name,
        currency: detail.snapshot.currency,
        revenue: detail.snapshot.revenue,
        cost: detail.snapshot.cost,
        profit: detail.snapshot.profit,
        gross_margin: detail.snapshot.gross_margin,
        operating_margin: detail.snapshot.operating_margin,
        net_margin: detail.snapshot.net_margin,
        department_metrics,
        cost_breakdown,
        kpis,
    })
}
