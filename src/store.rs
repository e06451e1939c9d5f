//! Persistence seam for the engine.
//!
//! The engine only ever talks to a [`SnapshotStore`]; the query shapes mirror
//! what the dashboard needs and nothing more. [`MemoryStore`] is the bundled
//! implementation: a mutex over plain collections with the period uniqueness
//! constraint enforced inside the same lock as the insert, so concurrent
//! submissions cannot race a duplicate into existence.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::{AnalyticsError, Result};
use crate::model::{
    CostCategory, Department, KpiDefinition, Organization, Sector, Snapshot, SnapshotDetail,
    TenantContext,
};

pub trait SnapshotStore: Send + Sync {
    /// Persists a snapshot together with its child rows. Fails with
    /// [`AnalyticsError::DuplicatePeriod`] when a snapshot already exists for
    /// the same (organization, period_start, period_end); the existing record
    /// is left untouched.
    fn insert_snapshot(&self, detail: SnapshotDetail) -> Result<Snapshot>;

    /// Snapshots fully contained in the window (period_start ≥ start and
    /// period_end ≤ end), ascending by period_start.
    fn snapshots_within(
        &self,
        ctx: &TenantContext,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Snapshot>>;

    /// The single most recent snapshot whose period overlaps the window
    /// (period_start ≤ end and period_end ≥ start), children included. When a
    /// department id is supplied, its metric rows are filtered to that
    /// department at the query level.
    fn latest_overlapping(
        &self,
        ctx: &TenantContext,
        start: NaiveDate,
        end: NaiveDate,
        department_id: Option<Uuid>,
    ) -> Result<Option<SnapshotDetail>>;

    /// Newest snapshots first (by period_end), up to `limit`.
    fn recent_snapshots(&self, ctx: &TenantContext, limit: usize) -> Result<Vec<Snapshot>>;

    /// Every snapshot for the tenant, newest first, with children.
    fn snapshots_with_children(&self, ctx: &TenantContext) -> Result<Vec<SnapshotDetail>>;

    /// Tenant-scoped lookup. A snapshot belonging to another tenant is
    /// indistinguishable from one that does not exist.
    fn snapshot_by_id(&self, ctx: &TenantContext, id: Uuid) -> Result<Option<SnapshotDetail>>;

    fn organization(&self, id: Uuid) -> Result<Option<Organization>>;

    fn sector(&self, id: Uuid) -> Result<Option<Sector>>;

    /// Departments the organization has opted into.
    fn departments_for_organization(&self, organization_id: Uuid) -> Result<Vec<Department>>;

    /// The sector's full department catalog.
    fn departments_in_sector(&self, sector_id: Uuid) -> Result<Vec<Department>>;

    fn department_by_name(&self, sector_id: Uuid, name: &str) -> Result<Option<Department>>;

    /// All cost categories, ordered by sort_order.
    fn cost_categories(&self) -> Result<Vec<CostCategory>>;

    fn cost_category_by_name(&self, name: &str) -> Result<Option<CostCategory>>;

    /// Sector-specific plus global KPI definitions, ordered by label.
    fn kpi_definitions(&self, sector_id: Uuid) -> Result<Vec<KpiDefinition>>;

    /// Looks a KPI up by slug, accepting both sector-specific and global
    /// definitions.
    fn kpi_definition_by_slug(&self, sector_id: Uuid, slug: &str)
        -> Result<Option<KpiDefinition>>;

    fn insert_sector(&self, sector: Sector) -> Result<()>;

    fn insert_organization(&self, organization: Organization) -> Result<()>;

    fn insert_department(&self, department: Department) -> Result<()>;

    /// Opts an organization into a department of its sector.
    fn link_department(&self, organization_id: Uuid, department_id: Uuid) -> Result<()>;

    fn insert_cost_category(&self, category: CostCategory) -> Result<()>;

    fn insert_kpi_definition(&self, kpi: KpiDefinition) -> Result<()>;
}

#[derive(Default)]
struct Inner {
    sectors: HashMap<Uuid, Sector>,
    organizations: HashMap<Uuid, Organization>,
    departments: HashMap<Uuid, Department>,
    organization_departments: Vec<(Uuid, Uuid)>,
    cost_categories: Vec<CostCategory>,
    kpi_definitions: Vec<KpiDefinition>,
    snapshots: Vec<SnapshotDetail>,
    period_index: HashSet<(Uuid, NaiveDate, NaiveDate)>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| AnalyticsError::Store("memory store lock poisoned".to_string()))
    }
}

fn belongs_to(snapshot: &Snapshot, ctx: &TenantContext) -> bool {
    snapshot.organization_id == ctx.organization_id && snapshot.sector_id == ctx.sector_id
}

impl SnapshotStore for MemoryStore {
    fn insert_snapshot(&self, detail: SnapshotDetail) -> Result<Snapshot> {
        let mut inner = self.lock()?;
        let key = (
            detail.snapshot.organization_id,
            detail.snapshot.period_start,
            detail.snapshot.period_end,
        );
        if inner.period_index.contains(&key) {
            return Err(AnalyticsError::DuplicatePeriod {
                period_start: detail.snapshot.period_start,
                period_end: detail.snapshot.period_end,
            });
        }
        inner.period_index.insert(key);
        let created = detail.snapshot.clone();
        inner.snapshots.push(detail);
        Ok(created)
    }

    fn snapshots_within(
        &self,
        ctx: &TenantContext,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Snapshot>> {
        let inner = self.lock()?;
        let mut rows: Vec<Snapshot> = inner
            .snapshots
            .iter()
            .map(|d| &d.snapshot)
            .filter(|s| belongs_to(s, ctx) && s.period_start >= start && s.period_end <= end)
            .cloned()
            .collect();
        rows.sort_by_key(|s| s.period_start);
        Ok(rows)
    }

    fn latest_overlapping(
        &self,
        ctx: &TenantContext,
        start: NaiveDate,
        end: NaiveDate,
        department_id: Option<Uuid>,
    ) -> Result<Option<SnapshotDetail>> {
        let inner = self.lock()?;
        let mut detail = inner
            .snapshots
            .iter()
            .filter(|d| {
                belongs_to(&d.snapshot, ctx)
                    && d.snapshot.period_start <= end
                    && d.snapshot.period_end >= start
            })
            .max_by_key(|d| d.snapshot.period_end)
            .cloned();

        if let (Some(detail), Some(department_id)) = (detail.as_mut(), department_id) {
            detail
                .department_metrics
                .retain(|row| row.department.id == department_id);
        }
        Ok(detail)
    }

    fn recent_snapshots(&self, ctx: &TenantContext, limit: usize) -> Result<Vec<Snapshot>> {
        let inner = self.lock()?;
        let mut rows: Vec<Snapshot> = inner
            .snapshots
            .iter()
            .map(|d| &d.snapshot)
            .filter(|s| belongs_to(s, ctx))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.period_end.cmp(&a.period_end));
        rows.truncate(limit);
        Ok(rows)
    }

    fn snapshots_with_children(&self, ctx: &TenantContext) -> Result<Vec<SnapshotDetail>> {
        let inner = self.lock()?;
        let mut rows: Vec<SnapshotDetail> = inner
            .snapshots
            .iter()
            .filter(|d| belongs_to(&d.snapshot, ctx))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.snapshot.period_end.cmp(&a.snapshot.period_end));
        Ok(rows)
    }

    fn snapshot_by_id(&self, ctx: &TenantContext, id: Uuid) -> Result<Option<SnapshotDetail>> {
        let inner = self.lock()?;
        Ok(inner
            .snapshots
            .iter()
            .find(|d| d.snapshot.id == id && belongs_to(&d.snapshot, ctx))
            .cloned())
    }

    fn organization(&self, id: Uuid) -> Result<Option<Organization>> {
        Ok(self.lock()?.organizations.get(&id).cloned())
    }

    fn sector(&self, id: Uuid) -> Result<Option<Sector>> {
        Ok(self.lock()?.sectors.get(&id).cloned())
    }

    fn departments_for_organization(&self, organization_id: Uuid) -> Result<Vec<Department>> {
        let inner = self.lock()?;
        Ok(inner
            .organization_departments
            .iter()
            .filter(|(org, _)| *org == organization_id)
            .filter_map(|(_, dept)| inner.departments.get(dept).cloned())
            .collect())
    }

    fn departments_in_sector(&self, sector_id: Uuid) -> Result<Vec<Department>> {
        let inner = self.lock()?;
        let mut departments: Vec<Department> = inner
            .departments
            .values()
            .filter(|d| d.sector_id == sector_id)
            .cloned()
            .collect();
        departments.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(departments)
    }

    fn department_by_name(&self, sector_id: Uuid, name: &str) -> Result<Option<Department>> {
        let inner = self.lock()?;
        Ok(inner
            .departments
            .values()
            .find(|d| d.sector_id == sector_id && d.name == name)
            .cloned())
    }

    fn cost_categories(&self) -> Result<Vec<CostCategory>> {
        let inner = self.lock()?;
        let mut categories = inner.cost_categories.clone();
        categories.sort_by_key(|c| c.sort_order);
        Ok(categories)
    }

    fn cost_category_by_name(&self, name: &str) -> Result<Option<CostCategory>> {
        let inner = self.lock()?;
        Ok(inner
            .cost_categories
            .iter()
            .find(|c| c.name == name)
            .cloned())
    }

    fn kpi_definitions(&self, sector_id: Uuid) -> Result<Vec<KpiDefinition>> {
        let inner = self.lock()?;
        let mut kpis: Vec<KpiDefinition> = inner
            .kpi_definitions
            .iter()
            .filter(|k| k.sector_id.is_none() || k.sector_id == Some(sector_id))
            .cloned()
            .collect();
        kpis.sort_by(|a, b| a.label.cmp(&b.label));
        Ok(kpis)
    }

    fn kpi_definition_by_slug(
        &self,
        sector_id: Uuid,
        slug: &str,
    ) -> Result<Option<KpiDefinition>> {
        let inner = self.lock()?;
        Ok(inner
            .kpi_definitions
            .iter()
            .find(|k| k.slug == slug && (k.sector_id.is_none() || k.sector_id == Some(sector_id)))
            .cloned())
    }

    fn insert_sector(&self, sector: Sector) -> Result<()> {
        self.lock()?.sectors.insert(sector.id, sector);
        Ok(())
    }

    fn insert_organization(&self, organization: Organization) -> Result<()> {
        self.lock()?
            .organizations
            .insert(organization.id, organization);
        Ok(())
    }

    fn insert_department(&self, department: Department) -> Result<()> {
        self.lock()?.departments.insert(department.id, department);
        Ok(())
    }

    fn link_department(&self, organization_id: Uuid, department_id: Uuid) -> Result<()> {
        let mut inner = self.lock()?;
        let link = (organization_id, department_id);
        if !inner.organization_departments.contains(&link) {
            inner.organization_departments.push(link);
        }
        Ok(())
    }

    fn insert_cost_category(&self, category: CostCategory) -> Result<()> {
        self.lock()?.cost_categories.push(category);
        Ok(())
    }

    fn insert_kpi_definition(&self, kpi: KpiDefinition) -> Result<()> {
        self.lock()?.kpi_definitions.push(kpi);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Snapshot;

    fn snapshot(ctx: &TenantContext, start: (i32, u32, u32), end: (i32, u32, u32)) -> Snapshot {
        Snapshot {
            id: Uuid::new_v4(),
            organization_id: ctx.organization_id,
            sector_id: ctx.sector_id,
            period_start: NaiveDate::from_ymd_opt(start.0, start.1, start.2).unwrap(),
            period_end: NaiveDate::from_ymd_opt(end.0, end.1, end.2).unwrap(),
            currency: "USD".to_string(),
            revenue: 1000.0,
            cost: 600.0,
            profit: 400.0,
            gross_margin: 64.0,
            operating_margin: 40.0,
            net_margin: 34.0,
        }
    }

    fn detail(snapshot: Snapshot) -> SnapshotDetail {
        SnapshotDetail {
            snapshot,
            department_metrics: Vec::new(),
            cost_entries: Vec::new(),
            kpi_values: Vec::new(),
        }
    }

    fn ctx() -> TenantContext {
        TenantContext {
            organization_id: Uuid::new_v4(),
            sector_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn test_duplicate_period_is_rejected() {
        let store = MemoryStore::new();
        let ctx = ctx();
        let first = snapshot(&ctx, (2024, 1, 1), (2024, 1, 31));
        store.insert_snapshot(detail(first)).unwrap();

        let second = snapshot(&ctx, (2024, 1, 1), (2024, 1, 31));
        let err = store.insert_snapshot(detail(second)).unwrap_err();
        assert!(matches!(err, AnalyticsError::DuplicatePeriod { .. }));

        let all = store.snapshots_with_children(&ctx).unwrap();
        assert_eq!(all.len(), 1);
    }

    #[test]
    fn test_snapshots_within_is_ordered_and_contained() {
        let store = MemoryStore::new();
        let ctx = ctx();
        store
            .insert_snapshot(detail(snapshot(&ctx, (2024, 2, 1), (2024, 2, 29))))
            .unwrap();
        store
            .insert_snapshot(detail(snapshot(&ctx, (2024, 1, 1), (2024, 1, 31))))
            .unwrap();
        // Straddles the window start, so it is excluded.
        store
            .insert_snapshot(detail(snapshot(&ctx, (2023, 12, 15), (2024, 1, 14))))
            .unwrap();

        let rows = store
            .snapshots_within(
                &ctx,
                NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
            )
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].period_start < rows[1].period_start);
    }

    #[test]
    fn test_latest_overlapping_picks_newest_period_end() {
        let store = MemoryStore::new();
        let ctx = ctx();
        store
            .insert_snapshot(detail(snapshot(&ctx, (2024, 1, 1), (2024, 1, 31))))
            .unwrap();
        let newest = snapshot(&ctx, (2024, 2, 1), (2024, 2, 29));
        let newest_id = newest.id;
        store.insert_snapshot(detail(newest)).unwrap();

        let found = store
            .latest_overlapping(
                &ctx,
                NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
                NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                None,
            )
            .unwrap()
            .unwrap();
        assert_eq!(found.snapshot.id, newest_id);
    }

    #[test]
    fn test_snapshot_by_id_is_tenant_scoped() {
        let store = MemoryStore::new();
        let owner = ctx();
        let created = store
            .insert_snapshot(detail(snapshot(&owner, (2024, 1, 1), (2024, 1, 31))))
            .unwrap();

        let stranger = ctx();
        assert!(store
            .snapshot_by_id(&stranger, created.id)
            .unwrap()
            .is_none());
        assert!(store.snapshot_by_id(&owner, created.id).unwrap().is_some());
    }

    #[test]
    fn test_kpi_definitions_include_global() {
        let store = MemoryStore::new();
        let sector = Uuid::new_v4();
        store
            .insert_kpi_definition(KpiDefinition {
                id: Uuid::new_v4(),
                label: "Total Revenue".to_string(),
                slug: "total-revenue".to_string(),
                description: None,
                format: crate::model::KpiFormat::Currency,
                target_value: Some(5_000_000.0),
                sector_id: None,
            })
            .unwrap();
        store
            .insert_kpi_definition(KpiDefinition {
                id: Uuid::new_v4(),
                label: "Bed Occupancy".to_string(),
                slug: "bed-occupancy".to_string(),
                description: None,
                format: crate::model::KpiFormat::Percentage,
                target_value: Some(85.0),
                sector_id: Some(sector),
            })
            .unwrap();
        store
            .insert_kpi_definition(KpiDefinition {
                id: Uuid::new_v4(),
                label: "Other Sector KPI".to_string(),
                slug: "other-sector".to_string(),
                description: None,
                format: crate::model::KpiFormat::Number,
                target_value: None,
                sector_id: Some(Uuid::new_v4()),
            })
            .unwrap();

        let kpis = store.kpi_definitions(sector).unwrap();
        assert_eq!(kpis.len(), 2);
        // Ordered by label.
        assert_eq!(kpis[0].label, "Bed Occupancy");
        assert!(store
            .kpi_definition_by_slug(sector, "total-revenue")
            .unwrap()
            .is_some());
    }
}
