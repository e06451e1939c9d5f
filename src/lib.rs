//! # Helix Analytics
//!
//! A multi-tenant profitability analytics engine: organizations submit
//! periodic profitability snapshots (revenue, cost, per-department splits,
//! cost-category breakdowns, KPI values) and the engine turns them into
//! dashboard summaries, trend charts, and synthesized reports, scoped per
//! organization and sector.
//!
//! ## Core Concepts
//!
//! - **Snapshot**: one organization's financial facts for one explicit
//!   period; immutable once written, unique per (organization, period).
//! - **Derived metrics**: profit and margins are computed at write time from
//!   revenue and cost, never stored independently.
//! - **Estimation policy**: fixed-ratio approximations (COGS share, net
//!   margin factor, comparison baselines) collected in one module so thin
//!   history still renders a complete dashboard.
//! - **Tenant context**: every operation takes an explicit organization and
//!   sector pair resolved from the authenticated principal; incomplete
//!   profiles are rejected outright.
//! - **Positional reports**: the report listing classifies snapshots by list
//!   index on read; there is no stored report entity.
//!
//! ## Example
//!
//! ```rust,ignore
//! use helix_analytics::*;
//!
//! let store = MemoryStore::new();
//! let catalog = install_catalog(&store)?;
//! let sector = catalog.sector_by_slug("healthcare").unwrap();
//! let ctx = provision_organization(&store, sector.id, "City General Hospital")?;
//!
//! let service = AnalyticsService::new(store);
//! let principal = Principal {
//!     user_id: uuid::Uuid::new_v4(),
//!     organization_id: Some(ctx.organization_id),
//!     sector_id: Some(ctx.sector_id),
//! };
//! let summary = service.analytics_summary(&principal, None, None)?;
//! ```

pub mod aggregation;
pub mod error;
pub mod estimation;
pub mod metrics;
pub mod model;
pub mod reference;
pub mod report;
pub mod sample;
pub mod store;
pub mod utils;

pub use aggregation::{
    analytics_summary, profitability_summary, AnalyticsSummary, ChartPoint, CostBreakdownEntry,
    DateWindow, DepartmentRevenue, KpiCard, MetricSummary, ProfitabilitySummary, TimeSeriesPoint,
    ANALYTICS_DEFAULT_MONTHS, PROFITABILITY_DEFAULT_MONTHS,
};
pub use error::{AnalyticsError, Result};
pub use metrics::{
    create_snapshot, list_snapshots, snapshot_margins, CostEntryInput, CreateSnapshotRequest,
    DepartmentMetricInput, KpiValueInput, SnapshotList, SnapshotListEntry, SnapshotMargins,
};
pub use model::*;
pub use reference::{
    list_cost_categories, list_departments, list_kpi_definitions, CategoryList, DepartmentList,
    KpiList,
};
pub use report::{
    classify, list_reports, report_detail, Classification, ReportDetail, ReportList, ReportStatus,
    ReportSummary, ReportType, REPORT_LIST_LIMIT,
};
pub use sample::{
    generate_snapshots, generate_snapshots_from, install_catalog, provision_organization, Catalog,
    DemoDataConfig,
};
pub use store::{MemoryStore, SnapshotStore};

use chrono::NaiveDate;
use uuid::Uuid;

/// The query surface: resolves the caller's tenant scope, fills in default
/// date windows, and delegates to the engine. An HTTP layer maps these
/// methods onto routes one-to-one.
pub struct AnalyticsService<S: SnapshotStore> {
    store: S,
}

impl<S: SnapshotStore> AnalyticsService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Dashboard headline metrics and monthly chart; window defaults to the
    /// last six months.
    pub fn analytics_summary(
        &self,
        principal: &Principal,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<AnalyticsSummary> {
        let ctx = principal.tenant()?;
        let window = DateWindow::resolve(start_date, end_date, ANALYTICS_DEFAULT_MONTHS);
        aggregation::analytics_summary(&self.store, &ctx, window)
    }

    /// Profitability dashboard; window defaults to the last three months.
    pub fn profitability_summary(
        &self,
        principal: &Principal,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
        department: Option<&str>,
    ) -> Result<ProfitabilitySummary> {
        let ctx = principal.tenant()?;
        let window = DateWindow::resolve(start_date, end_date, PROFITABILITY_DEFAULT_MONTHS);
        aggregation::profitability_summary(&self.store, &ctx, window, department)
    }

    pub fn list_reports(&self, principal: &Principal) -> Result<ReportList> {
        let ctx = principal.tenant()?;
        report::list_reports(&self.store, &ctx)
    }

    pub fn report_detail(&self, principal: &Principal, id: Uuid) -> Result<ReportDetail> {
        let ctx = principal.tenant()?;
        report::report_detail(&self.store, &ctx, id)
    }

    pub fn list_snapshots(&self, principal: &Principal) -> Result<SnapshotList> {
        let ctx = principal.tenant()?;
        metrics::list_snapshots(&self.store, &ctx)
    }

    pub fn create_snapshot(
        &self,
        principal: &Principal,
        request: CreateSnapshotRequest,
    ) -> Result<Snapshot> {
        let ctx = principal.tenant()?;
        metrics::create_snapshot(&self.store, &ctx, request)
    }

    pub fn list_departments(&self, principal: &Principal) -> Result<DepartmentList> {
        let ctx = principal.tenant()?;
        reference::list_departments(&self.store, &ctx)
    }

    pub fn list_cost_categories(&self, principal: &Principal) -> Result<CategoryList> {
        let ctx = principal.tenant()?;
        reference::list_cost_categories(&self.store, &ctx)
    }

    pub fn list_kpi_definitions(&self, principal: &Principal) -> Result<KpiList> {
        let ctx = principal.tenant()?;
        reference::list_kpi_definitions(&self.store, &ctx)
    }
}
