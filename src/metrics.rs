//! Derived metrics: the pure calculations applied to caller-supplied revenue
//! and cost figures at snapshot-creation time, plus the validated write
//! operation that persists a snapshot and its child rows.
//!
//! The gross and net margin derivations lean on the fixed ratios in
//! [`crate::estimation`]; they are modeling approximations for tenants that
//! submit only top-line revenue and cost, not general accounting formulas.

use std::collections::HashMap;

use chrono::NaiveDate;
use log::{debug, info};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{AnalyticsError, Result};
use crate::estimation::{ASSUMED_COGS_RATIO, NET_TO_OPERATING_RATIO};
use crate::model::{
    CostEntry, CostEntryRow, DepartmentMetric, DepartmentMetricRow, KpiValue, KpiValueRow,
    Snapshot, SnapshotDetail, TenantContext, Trend,
};
use crate::store::SnapshotStore;

/// Raw inputs for one snapshot. Required fields are optional at the type
/// level so a missing field surfaces as a validation error, not a
/// deserialization failure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateSnapshotRequest {
    pub period_start: Option<NaiveDate>,
    pub period_end: Option<NaiveDate>,
    pub currency: Option<String>,
    pub revenue: Option<f64>,
    pub cost: Option<f64>,
    pub department_metrics: Vec<DepartmentMetricInput>,
    pub cost_breakdown: Vec<CostEntryInput>,
    pub kpi_values: Vec<KpiValueInput>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentMetricInput {
    pub department_name: String,
    pub revenue: f64,
    pub cost: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostEntryInput {
    pub category_name: String,
    pub amount: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiValueInput {
    pub kpi_slug: String,
    pub value: f64,
    #[serde(default)]
    pub trend: Trend,
}

/// Margins derived from top-line revenue and cost.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapshotMargins {
    pub profit: f64,
    pub gross_margin: f64,
    pub operating_margin: f64,
    pub net_margin: f64,
}

/// Derives profit and the three margins. Gross margin assumes
/// [`ASSUMED_COGS_RATIO`] of total cost is cost of goods sold; net margin is
/// [`NET_TO_OPERATING_RATIO`] of operating margin. Callers are expected to
/// supply revenue > 0, as every margin divides by it.
pub fn snapshot_margins(revenue: f64, cost: f64) -> SnapshotMargins {
    let profit = revenue - cost;
    let gross_margin = ((revenue - cost * ASSUMED_COGS_RATIO) / revenue) * 100.0;
    let operating_margin = (profit / revenue) * 100.0;
    let net_margin = operating_margin * NET_TO_OPERATING_RATIO;

    SnapshotMargins {
        profit,
        gross_margin,
        operating_margin,
        net_margin,
    }
}

/// A department's revenue as a percentage of the snapshot's total revenue.
/// Computed independently per department; shares are not renormalized across
/// departments, so partial reporting can sum to above or below 100.
pub fn revenue_share(department_revenue: f64, total_revenue: f64) -> f64 {
    (department_revenue / total_revenue) * 100.0
}

/// A cost entry's amount as a percentage of the snapshot's total cost. Same
/// independent-denominator behavior as [`revenue_share`].
pub fn cost_percentage(amount: f64, total_cost: f64) -> f64 {
    (amount / total_cost) * 100.0
}

/// Percent deviation of a KPI value from its target, or `None` when the KPI
/// has no target.
pub fn kpi_delta_percent(value: f64, target_value: Option<f64>) -> Option<f64> {
    target_value.map(|target| ((value - target) / target) * 100.0)
}

/// Validates the request, derives every stored metric, and persists the
/// snapshot with its child rows in one atomic store insert.
///
/// Department, category, and KPI inputs that do not match a known reference
/// record are dropped without failing the write. The period uniqueness
/// constraint is enforced by the store itself.
pub fn create_snapshot<S: SnapshotStore + ?Sized>(
    store: &S,
    ctx: &TenantContext,
    request: CreateSnapshotRequest,
) -> Result<Snapshot> {
    let period_start = request
        .period_start
        .ok_or(AnalyticsError::MissingField("periodStart"))?;
    let period_end = request
        .period_end
        .ok_or(AnalyticsError::MissingField("periodEnd"))?;
    let revenue = request
        .revenue
        .ok_or(AnalyticsError::MissingField("revenue"))?;
    let cost = request.cost.ok_or(AnalyticsError::MissingField("cost"))?;
    let currency = request.currency.unwrap_or_else(|| "USD".to_string());

    let margins = snapshot_margins(revenue, cost);
    let snapshot_id = Uuid::new_v4();

    let snapshot = Snapshot {
        id: snapshot_id,
        organization_id: ctx.organization_id,
        sector_id: ctx.sector_id,
        period_start,
        period_end,
        currency,
        revenue,
        cost,
        profit: margins.profit,
        gross_margin: margins.gross_margin,
        operating_margin: margins.operating_margin,
        net_margin: margins.net_margin,
    };

    let departments = store.departments_for_organization(ctx.organization_id)?;
    let by_name: HashMap<&str, usize> = departments
        .iter()
        .enumerate()
        .map(|(i, d)| (d.name.as_str(), i))
        .collect();

    let mut department_metrics = Vec::new();
    for input in &request.department_metrics {
        match by_name.get(input.department_name.as_str()) {
            Some(&idx) => {
                let department = departments[idx].clone();
                let profit = input.revenue - input.cost;
                department_metrics.push(DepartmentMetricRow {
                    metric: DepartmentMetric {
                        snapshot_id,
                        department_id: department.id,
                        revenue: input.revenue,
                        cost: input.cost,
                        profit,
                        margin: (profit / input.revenue) * 100.0,
                        revenue_share: revenue_share(input.revenue, revenue),
                    },
                    department,
                });
            }
            None => {
                debug!(
                    "Dropping metric for unknown department '{}'",
                    input.department_name
                );
            }
        }
    }

    let mut cost_entries = Vec::new();
    for input in &request.cost_breakdown {
        match store.cost_category_by_name(&input.category_name)? {
            Some(category) => {
                cost_entries.push(CostEntryRow {
                    entry: CostEntry {
                        snapshot_id,
                        category_id: category.id,
                        amount: input.amount,
                        percentage: cost_percentage(input.amount, cost),
                    },
                    category,
                });
            }
            None => {
                debug!(
                    "Dropping cost entry for unknown category '{}'",
                    input.category_name
                );
            }
        }
    }

    let mut kpi_values = Vec::new();
    for input in &request.kpi_values {
        match store.kpi_definition_by_slug(ctx.sector_id, &input.kpi_slug)? {
            Some(kpi) => {
                kpi_values.push(KpiValueRow {
                    value: KpiValue {
                        snapshot_id,
                        kpi_id: kpi.id,
                        value: input.value,
                        delta_percent: kpi_delta_percent(input.value, kpi.target_value),
                        trend: input.trend,
                    },
                    kpi,
                });
            }
            None => {
                debug!("Dropping value for unknown KPI slug '{}'", input.kpi_slug);
            }
        }
    }

    let created = store.insert_snapshot(SnapshotDetail {
        snapshot,
        department_metrics,
        cost_entries,
        kpi_values,
    })?;

    info!(
        "Created snapshot {} for organization {} ({} to {})",
        created.id, ctx.organization_id, created.period_start, created.period_end
    );
    Ok(created)
}

/// One row of the snapshot listing: the snapshot with its department and
/// cost breakdowns. KPI values are not part of this view.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotListEntry {
    pub snapshot: Snapshot,
    pub department_metrics: Vec<DepartmentMetricRow>,
    pub cost_entries: Vec<CostEntryRow>,
}

/// Every snapshot for the tenant, newest first.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct SnapshotList {
    pub snapshots: Vec<SnapshotListEntry>,
}

pub fn list_snapshots<S: SnapshotStore + ?Sized>(
    store: &S,
    ctx: &TenantContext,
) -> Result<SnapshotList> {
    let snapshots = store
        .snapshots_with_children(ctx)?
        .into_iter()
        .map(|detail| SnapshotListEntry {
            snapshot: detail.snapshot,
            department_metrics: detail.department_metrics,
            cost_entries: detail.cost_entries,
        })
        .collect();
    Ok(SnapshotList { snapshots })
}
