//! Aggregation engine: turns the snapshots inside a date window into the
//! comparison, chart, and summary structures the dashboards render.
//!
//! Two read paths live here. The analytics summary compares the most recent
//! three snapshots against the three before them and rolls the whole window
//! up into a monthly chart. The profitability summary exposes the single
//! most recent snapshot's breakdowns verbatim next to an organization-wide
//! time series.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, Utc};
use log::debug;
use serde::Serialize;
use uuid::Uuid;

use crate::error::Result;
use crate::estimation::{
    BASELINE_COST_RATIO, BASELINE_PROFIT_RATIO, BASELINE_REVENUE_RATIO, KPI_BASELINE_RATIO,
};
use crate::model::{KpiFormat, Snapshot, TenantContext};
use crate::store::SnapshotStore;
use crate::utils::{month_abbrev, month_key, month_order, months_before};

/// Default lookback for the analytics summary when no dates are supplied.
pub const ANALYTICS_DEFAULT_MONTHS: u32 = 6;

/// Default lookback for the profitability summary.
pub const PROFITABILITY_DEFAULT_MONTHS: u32 = 3;

/// An inclusive date range a query runs over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Fills in missing bounds: the end defaults to today, the start to
    /// `default_months` before the end.
    pub fn resolve(
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        default_months: u32,
    ) -> Self {
        Self::resolve_from(start, end, default_months, Utc::now().date_naive())
    }

    pub fn resolve_from(
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        default_months: u32,
        today: NaiveDate,
    ) -> Self {
        let end = end.unwrap_or(today);
        let start = start.unwrap_or_else(|| months_before(today, default_months));
        Self { start, end }
    }
}

/// One headline metric on the analytics dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSummary {
    pub value: f64,
    pub change: f64,
    pub period: String,
}

impl MetricSummary {
    fn vs_last_quarter(value: f64, change: f64) -> Self {
        Self {
            value,
            change,
            period: "vs last quarter".to_string(),
        }
    }
}

/// One monthly point on the trend chart. `value` is revenue in millions for
/// the headline axis; the raw sums ride along for tooltips.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartPoint {
    pub month: String,
    pub value: f64,
    pub revenue: f64,
    pub cost: f64,
    pub profit: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSummary {
    pub revenue_analytics: MetricSummary,
    pub cost_analysis: MetricSummary,
    pub profit_margin: MetricSummary,
    pub chart_data: Vec<ChartPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiCard {
    pub label: String,
    pub value: f64,
    pub delta: String,
    pub trend: String,
    pub format: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentRevenue {
    pub department: String,
    pub revenue: f64,
    pub cost: f64,
    pub profit: f64,
    pub margin: f64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostBreakdownEntry {
    pub category: String,
    pub amount: f64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeriesPoint {
    pub date: NaiveDate,
    pub revenue: f64,
    pub cost: f64,
    pub profit: f64,
    pub margin: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfitabilitySummary {
    pub kpis: Vec<KpiCard>,
    pub gross_profit_margin: f64,
    pub operating_profit_margin: f64,
    pub net_profit_margin: f64,
    pub revenue: f64,
    pub costs: f64,
    pub profit: f64,
    pub revenue_by_department: Vec<DepartmentRevenue>,
    pub cost_breakdown: Vec<CostBreakdownEntry>,
    pub time_series_data: Vec<TimeSeriesPoint>,
}

fn percent_change(current: f64, previous: f64) -> f64 {
    if previous > 0.0 {
        ((current - previous) / previous) * 100.0
    } else {
        0.0
    }
}

fn sum_totals(snapshots: &[Snapshot]) -> (f64, f64, f64) {
    snapshots.iter().fold((0.0, 0.0, 0.0), |acc, s| {
        (acc.0 + s.revenue, acc.1 + s.cost, acc.2 + s.profit)
    })
}

struct MonthBucket {
    month: u32,
    revenue: f64,
    cost: f64,
    profit: f64,
}

/// Groups in-window snapshots by the calendar month of their period_end and
/// emits one labeled point per month.
///
/// Points are ordered by month-of-year (Jan..Dec), not chronologically, so a
/// window crossing a year boundary interleaves the years. Known quirk of the
/// dashboard contract, kept deliberately.
fn build_chart_data(snapshots: &[Snapshot]) -> Vec<ChartPoint> {
    let mut buckets: BTreeMap<String, MonthBucket> = BTreeMap::new();
    for snapshot in snapshots {
        let bucket = buckets
            .entry(month_key(snapshot.period_end))
            .or_insert(MonthBucket {
                month: snapshot.period_end.month(),
                revenue: 0.0,
                cost: 0.0,
                profit: 0.0,
            });
        bucket.revenue += snapshot.revenue;
        bucket.cost += snapshot.cost;
        bucket.profit += snapshot.profit;
    }

    let mut chart: Vec<ChartPoint> = buckets
        .into_values()
        .map(|bucket| ChartPoint {
            month: month_abbrev(bucket.month).to_string(),
            value: bucket.revenue / 1_000_000.0,
            revenue: bucket.revenue,
            cost: bucket.cost,
            profit: bucket.profit,
        })
        .collect();
    chart.sort_by_key(|point| month_order(&point.month));
    chart
}

/// Current-vs-previous comparison plus the monthly chart for the window.
///
/// The most recent three snapshots form the current period and the three
/// before them the previous one. With no previous snapshots at all, a
/// baseline is synthesized from the estimation ratios so the dashboard still
/// shows a comparison; an entirely empty window yields zeroed metrics and an
/// empty chart rather than an error.
pub fn analytics_summary<S: SnapshotStore + ?Sized>(
    store: &S,
    ctx: &TenantContext,
    window: DateWindow,
) -> Result<AnalyticsSummary> {
    let snapshots = store.snapshots_within(ctx, window.start, window.end)?;

    if snapshots.is_empty() {
        return Ok(AnalyticsSummary {
            revenue_analytics: MetricSummary::vs_last_quarter(0.0, 0.0),
            cost_analysis: MetricSummary::vs_last_quarter(0.0, 0.0),
            profit_margin: MetricSummary::vs_last_quarter(0.0, 0.0),
            chart_data: Vec::new(),
        });
    }

    let len = snapshots.len();
    let current = &snapshots[len.saturating_sub(3)..];
    let previous = &snapshots[len.saturating_sub(6)..len.saturating_sub(3)];

    let (current_revenue, current_cost, current_profit) = sum_totals(current);
    let (previous_revenue, previous_cost, previous_profit) = if previous.is_empty() {
        debug!(
            "No previous period in window {}..{}; synthesizing comparison baseline",
            window.start, window.end
        );
        (
            current_revenue * BASELINE_REVENUE_RATIO,
            current_cost * BASELINE_COST_RATIO,
            current_profit * BASELINE_PROFIT_RATIO,
        )
    } else {
        sum_totals(previous)
    };

    Ok(AnalyticsSummary {
        revenue_analytics: MetricSummary::vs_last_quarter(
            current_revenue,
            percent_change(current_revenue, previous_revenue),
        ),
        cost_analysis: MetricSummary::vs_last_quarter(
            current_cost,
            percent_change(current_cost, previous_cost),
        ),
        profit_margin: MetricSummary::vs_last_quarter(
            current_profit,
            percent_change(current_profit, previous_profit),
        ),
        chart_data: build_chart_data(&snapshots),
    })
}

/// Delta caption for a KPI card. Percentage KPIs report the signed deviation
/// from target; currency KPIs without a target compare against a synthesized
/// previous value so the card still shows a trend; plain numbers get none.
fn kpi_delta_string(format: KpiFormat, value: f64, target_value: Option<f64>) -> String {
    match format {
        KpiFormat::Percentage => {
            let delta = target_value.map(|t| value - t).unwrap_or(0.0);
            let sign = if delta > 0.0 { "+" } else { "" };
            format!("{sign}{delta:.1}% vs target")
        }
        KpiFormat::Currency => {
            let previous = target_value.unwrap_or(value * KPI_BASELINE_RATIO);
            let change = ((value - previous) / previous) * 100.0;
            format!("+{change:.1}% vs last quarter")
        }
        KpiFormat::Number => String::new(),
    }
}

/// The profitability dashboard: the most recent snapshot overlapping the
/// window, flattened into KPI cards and department/cost breakdowns, plus an
/// ordered time series of every in-window snapshot.
///
/// The department filter narrows the breakdown only; the time series stays
/// organization-wide. A department name not in the sector catalog simply
/// leaves the breakdown unfiltered. A window with no matching snapshot
/// yields an all-zero summary.
pub fn profitability_summary<S: SnapshotStore + ?Sized>(
    store: &S,
    ctx: &TenantContext,
    window: DateWindow,
    department: Option<&str>,
) -> Result<ProfitabilitySummary> {
    let department_id: Option<Uuid> = match department {
        Some(name) => store.department_by_name(ctx.sector_id, name)?.map(|d| d.id),
        None => None,
    };

    let Some(detail) = store.latest_overlapping(ctx, window.start, window.end, department_id)?
    else {
        return Ok(ProfitabilitySummary::default());
    };

    let series = store.snapshots_within(ctx, window.start, window.end)?;

    let kpis = detail
        .kpi_values
        .iter()
        .map(|row| KpiCard {
            label: row.kpi.label.clone(),
            value: row.value.value,
            delta: kpi_delta_string(row.kpi.format, row.value.value, row.kpi.target_value),
            trend: row.value.trend.as_lower().to_string(),
            format: row.kpi.format.as_lower().to_string(),
            description: row.kpi.description.clone(),
        })
        .collect();

    let revenue_by_department = detail
        .department_metrics
        .iter()
        .map(|row| DepartmentRevenue {
            department: row.department.name.clone(),
            revenue: row.metric.revenue,
            cost: row.metric.cost,
            profit: row.metric.profit,
            margin: row.metric.margin,
            percentage: row.metric.revenue_share,
        })
        .collect();

    let cost_breakdown = detail
        .cost_entries
        .iter()
        .map(|row| CostBreakdownEntry {
            category: row.category.name.clone(),
            amount: row.entry.amount,
            percentage: row.entry.percentage,
        })
        .collect();

    let time_series_data = series
        .iter()
        .map(|snapshot| TimeSeriesPoint {
            date: snapshot.period_end,
            revenue: snapshot.revenue,
            cost: snapshot.cost,
            profit: snapshot.profit,
            margin: snapshot.operating_margin,
        })
        .collect();

    Ok(ProfitabilitySummary {
        kpis,
        gross_profit_margin: detail.snapshot.gross_margin,
        operating_profit_margin: detail.snapshot.operating_margin,
        net_profit_margin: detail.snapshot.net_margin,
        revenue: detail.snapshot.revenue,
        costs: detail.snapshot.cost,
        profit: detail.snapshot.profit,
        revenue_by_department,
        cost_breakdown,
        time_series_data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SnapshotDetail;
    use crate::store::MemoryStore;
    use crate::utils::last_day_of_month;

    fn ctx() -> TenantContext {
        TenantContext {
            organization_id: Uuid::new_v4(),
            sector_id: Uuid::new_v4(),
        }
    }

    fn month_snapshot(ctx: &TenantContext, year: i32, month: u32, revenue: f64) -> Snapshot {
        let cost = revenue * 0.6;
        Snapshot {
            id: Uuid::new_v4(),
            organization_id: ctx.organization_id,
            sector_id: ctx.sector_id,
            period_start: NaiveDate::from_ymd_opt(year, month, 1).unwrap(),
            period_end: last_day_of_month(year, month),
            currency: "USD".to_string(),
            revenue,
            cost,
            profit: revenue - cost,
            gross_margin: 64.0,
            operating_margin: 40.0,
            net_margin: 34.0,
        }
    }

    fn insert(store: &MemoryStore, snapshot: Snapshot) {
        store
            .insert_snapshot(SnapshotDetail {
                snapshot,
                department_metrics: Vec::new(),
                cost_entries: Vec::new(),
                kpi_values: Vec::new(),
            })
            .unwrap();
    }

    fn window(start: (i32, u32, u32), end: (i32, u32, u32)) -> DateWindow {
        DateWindow::new(
            NaiveDate::from_ymd_opt(start.0, start.1, start.2).unwrap(),
            NaiveDate::from_ymd_opt(end.0, end.1, end.2).unwrap(),
        )
    }

    #[test]
    fn test_percent_change_zero_previous_is_zero() {
        assert_eq!(percent_change(100.0, 0.0), 0.0);
        assert_eq!(percent_change(100.0, -5.0), 0.0);
        assert!((percent_change(110.0, 100.0) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_window_returns_zeroed_summary() {
        let store = MemoryStore::new();
        let ctx = ctx();
        let summary =
            analytics_summary(&store, &ctx, window((2024, 1, 1), (2024, 6, 30))).unwrap();

        assert_eq!(summary.revenue_analytics.value, 0.0);
        assert_eq!(summary.revenue_analytics.change, 0.0);
        assert_eq!(summary.revenue_analytics.period, "vs last quarter");
        assert_eq!(summary.cost_analysis.value, 0.0);
        assert_eq!(summary.profit_margin.value, 0.0);
        assert!(summary.chart_data.is_empty());
    }

    #[test]
    fn test_synthesized_baseline_with_three_snapshots() {
        let store = MemoryStore::new();
        let ctx = ctx();
        for month in 1..=3 {
            insert(&store, month_snapshot(&ctx, 2024, month, 100_000.0));
        }

        let summary =
            analytics_summary(&store, &ctx, window((2024, 1, 1), (2024, 3, 31))).unwrap();

        // previous = current * 0.9, so change = (1/0.9 - 1) * 100.
        let expected = ((1.0 / BASELINE_REVENUE_RATIO) - 1.0) * 100.0;
        assert!((summary.revenue_analytics.change - expected).abs() < 1e-9);
        assert!((summary.revenue_analytics.change - 11.111).abs() < 0.01);
        assert_eq!(summary.revenue_analytics.value, 300_000.0);
    }

    #[test]
    fn test_real_previous_period_beats_baseline() {
        let store = MemoryStore::new();
        let ctx = ctx();
        for month in 1..=6 {
            let revenue = if month <= 3 { 100_000.0 } else { 120_000.0 };
            insert(&store, month_snapshot(&ctx, 2024, month, revenue));
        }

        let summary =
            analytics_summary(&store, &ctx, window((2024, 1, 1), (2024, 6, 30))).unwrap();
        assert_eq!(summary.revenue_analytics.value, 360_000.0);
        assert!((summary.revenue_analytics.change - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_chart_sorted_by_month_of_year_across_year_boundary() {
        let store = MemoryStore::new();
        let ctx = ctx();
        insert(&store, month_snapshot(&ctx, 2023, 11, 100.0));
        insert(&store, month_snapshot(&ctx, 2023, 12, 100.0));
        insert(&store, month_snapshot(&ctx, 2024, 1, 100.0));

        let summary =
            analytics_summary(&store, &ctx, window((2023, 11, 1), (2024, 1, 31))).unwrap();
        let labels: Vec<&str> = summary
            .chart_data
            .iter()
            .map(|p| p.month.as_str())
            .collect();
        // Month-of-year ordering puts January first even though it is the
        // most recent point.
        assert_eq!(labels, vec!["Jan", "Nov", "Dec"]);
    }

    #[test]
    fn test_chart_value_is_revenue_in_millions() {
        let store = MemoryStore::new();
        let ctx = ctx();
        insert(&store, month_snapshot(&ctx, 2024, 1, 2_500_000.0));

        let summary =
            analytics_summary(&store, &ctx, window((2024, 1, 1), (2024, 1, 31))).unwrap();
        assert_eq!(summary.chart_data.len(), 1);
        assert!((summary.chart_data[0].value - 2.5).abs() < 1e-9);
        assert_eq!(summary.chart_data[0].revenue, 2_500_000.0);
    }

    #[test]
    fn test_kpi_delta_strings() {
        assert_eq!(
            kpi_delta_string(KpiFormat::Percentage, 44.5, Some(40.0)),
            "+4.5% vs target"
        );
        assert_eq!(
            kpi_delta_string(KpiFormat::Percentage, 37.0, Some(40.0)),
            "-3.0% vs target"
        );
        assert_eq!(
            kpi_delta_string(KpiFormat::Percentage, 44.5, None),
            "0.0% vs target"
        );
        // No target: previous synthesized as value * 0.8, change = +25%.
        assert_eq!(
            kpi_delta_string(KpiFormat::Currency, 1_000_000.0, None),
            "+25.0% vs last quarter"
        );
        assert_eq!(kpi_delta_string(KpiFormat::Number, 42.0, Some(40.0)), "");
    }

    #[test]
    fn test_profitability_empty_window_is_zeroed() {
        let store = MemoryStore::new();
        let ctx = ctx();
        let summary =
            profitability_summary(&store, &ctx, window((2024, 1, 1), (2024, 3, 31)), None)
                .unwrap();
        assert_eq!(summary.revenue, 0.0);
        assert!(summary.kpis.is_empty());
        assert!(summary.time_series_data.is_empty());
    }

    #[test]
    fn test_profitability_time_series_is_window_wide() {
        let store = MemoryStore::new();
        let ctx = ctx();
        insert(&store, month_snapshot(&ctx, 2024, 1, 100_000.0));
        insert(&store, month_snapshot(&ctx, 2024, 2, 110_000.0));
        insert(&store, month_snapshot(&ctx, 2024, 3, 120_000.0));

        let summary =
            profitability_summary(&store, &ctx, window((2024, 1, 1), (2024, 3, 31)), None)
                .unwrap();
        // Headline figures come from the most recent snapshot only.
        assert_eq!(summary.revenue, 120_000.0);
        assert_eq!(summary.time_series_data.len(), 3);
        assert!(summary.time_series_data[0].date < summary.time_series_data[2].date);
        assert!((summary.time_series_data[0].margin - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_department_name_leaves_breakdown_unfiltered() {
        let store = MemoryStore::new();
        let ctx = ctx();
        insert(&store, month_snapshot(&ctx, 2024, 1, 100_000.0));

        let summary = profitability_summary(
            &store,
            &ctx,
            window((2024, 1, 1), (2024, 1, 31)),
            Some("No Such Department"),
        )
        .unwrap();
        assert_eq!(summary.revenue, 100_000.0);
    }

    #[test]
    fn test_window_resolution_defaults() {
        let today = NaiveDate::from_ymd_opt(2024, 7, 15).unwrap();
        let window = DateWindow::resolve_from(None, None, ANALYTICS_DEFAULT_MONTHS, today);
        assert_eq!(window.end, today);
        assert_eq!(window.start, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());

        let explicit = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let window =
            DateWindow::resolve_from(Some(explicit), None, PROFITABILITY_DEFAULT_MONTHS, today);
        assert_eq!(window.start, explicit);
        assert_eq!(window.end, today);
    }
}
