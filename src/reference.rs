//! Reference-data lookups backing the snapshot submission forms: the
//! departments an organization reports against, the global cost-category
//! catalog, and the KPI definitions available to a sector.

use serde::Serialize;
use uuid::Uuid;

use crate::error::Result;
use crate::model::{CostCategory, KpiDefinition, TenantContext};
use crate::store::SnapshotStore;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepartmentInfo {
    pub id: Uuid,
    pub name: String,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepartmentList {
    pub departments: Vec<DepartmentInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryList {
    pub categories: Vec<CostCategory>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiList {
    pub kpis: Vec<KpiDefinition>,
}

/// Departments the caller's organization has opted into.
pub fn list_departments<S: SnapshotStore + ?Sized>(
    store: &S,
    ctx: &TenantContext,
) -> Result<DepartmentList> {
    let departments = store
        .departments_for_organization(ctx.organization_id)?
        .into_iter()
        .map(|d| DepartmentInfo {
            id: d.id,
            name: d.name,
            code: d.code,
        })
        .collect();
    Ok(DepartmentList { departments })
}

/// All cost categories in sort order. The catalog is global, not
/// sector-scoped.
pub fn list_cost_categories<S: SnapshotStore + ?Sized>(
    store: &S,
    _ctx: &TenantContext,
) -> Result<CategoryList> {
    Ok(CategoryList {
        categories: store.cost_categories()?,
    })
}

/// KPI definitions usable by the caller's sector: sector-specific entries
/// plus global ones, ordered by label.
pub fn list_kpi_definitions<S: SnapshotStore + ?Sized>(
    store: &S,
    ctx: &TenantContext,
) -> Result<KpiList> {
    Ok(KpiList {
        kpis: store.kpi_definitions(ctx.sector_id)?,
    })
}
