use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AnalyticsError, Result};

/// The tenant scope every engine operation runs under. Built explicitly from
/// an authenticated principal rather than read from ambient session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TenantContext {
    pub organization_id: Uuid,
    pub sector_id: Uuid,
}

/// An authenticated caller as the session layer hands it over. Organization
/// and sector are optional because signup can complete before the profile
/// does; such callers cannot reach any tenant data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
    pub organization_id: Option<Uuid>,
    pub sector_id: Option<Uuid>,
}

impl Principal {
    /// Resolves the tenant scope, rejecting incomplete profiles outright.
    pub fn tenant(&self) -> Result<TenantContext> {
        match (self.organization_id, self.sector_id) {
            (Some(organization_id), Some(sector_id)) => Ok(TenantContext {
                organization_id,
                sector_id,
            }),
            _ => Err(AnalyticsError::Unauthorized),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sector {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub sector_id: Uuid,
}

/// Sector-scoped department catalog entry. Organizations opt into a subset
/// of their sector's departments via an explicit join kept in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Department {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    pub sector_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostCategory {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    pub description: String,
    pub sort_order: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KpiFormat {
    Percentage,
    Currency,
    Number,
}

impl KpiFormat {
    /// Lowercase form used by the display contracts.
    pub fn as_lower(&self) -> &'static str {
        match self {
            KpiFormat::Percentage => "percentage",
            KpiFormat::Currency => "currency",
            KpiFormat::Number => "number",
        }
    }
}

/// Directional label a caller asserts when submitting a KPI value. It is
/// stored verbatim and never derived from the computed delta.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Trend {
    Up,
    Down,
    #[default]
    Neutral,
}

impl Trend {
    pub fn as_lower(&self) -> &'static str {
        match self {
            Trend::Up => "up",
            Trend::Down => "down",
            Trend::Neutral => "neutral",
        }
    }
}

/// Reference definition of a KPI. `sector_id = None` marks a global KPI
/// available to every sector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiDefinition {
    pub id: Uuid,
    pub label: String,
    pub slug: String,
    pub description: Option<String>,
    pub format: KpiFormat,
    pub target_value: Option<f64>,
    pub sector_id: Option<Uuid>,
}

/// One organization's financial facts for one explicit period. Immutable
/// once written; profit and the margins are derived at creation time and
/// never independently settable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub sector_id: Uuid,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub currency: String,
    pub revenue: f64,
    pub cost: f64,
    pub profit: f64,
    pub gross_margin: f64,
    pub operating_margin: f64,
    pub net_margin: f64,
}

/// One department's contribution within a snapshot. `revenue_share` is this
/// department's revenue against the snapshot total, computed independently
/// per department — shares are not renormalized on the live write path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentMetric {
    pub snapshot_id: Uuid,
    pub department_id: Uuid,
    pub revenue: f64,
    pub cost: f64,
    pub profit: f64,
    pub margin: f64,
    pub revenue_share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostEntry {
    pub snapshot_id: Uuid,
    pub category_id: Uuid,
    pub amount: f64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiValue {
    pub snapshot_id: Uuid,
    pub kpi_id: Uuid,
    pub value: f64,
    pub delta_percent: Option<f64>,
    pub trend: Trend,
}

/// A department metric joined with its catalog entry, as read queries
/// return it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepartmentMetricRow {
    pub department: Department,
    pub metric: DepartmentMetric,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostEntryRow {
    pub category: CostCategory,
    pub entry: CostEntry,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiValueRow {
    pub kpi: KpiDefinition,
    pub value: KpiValue,
}

/// A snapshot with all of its child rows resolved against reference data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotDetail {
    pub snapshot: Snapshot,
    pub department_metrics: Vec<DepartmentMetricRow>,
    pub cost_entries: Vec<CostEntryRow>,
    pub kpi_values: Vec<KpiValueRow>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_principal_with_full_profile_resolves_tenant() {
        let org = Uuid::new_v4();
        let sector = Uuid::new_v4();
        let principal = Principal {
            user_id: Uuid::new_v4(),
            organization_id: Some(org),
            sector_id: Some(sector),
        };

        let ctx = principal.tenant().unwrap();
        assert_eq!(ctx.organization_id, org);
        assert_eq!(ctx.sector_id, sector);
    }

    #[test]
    fn test_principal_with_incomplete_profile_is_unauthorized() {
        let principal = Principal {
            user_id: Uuid::new_v4(),
            organization_id: Some(Uuid::new_v4()),
            sector_id: None,
        };

        assert!(matches!(
            principal.tenant(),
            Err(AnalyticsError::Unauthorized)
        ));
    }

    #[test]
    fn test_kpi_format_serializes_screaming() {
        let json = serde_json::to_string(&KpiFormat::Percentage).unwrap();
        assert_eq!(json, "\"PERCENTAGE\"");
        assert_eq!(KpiFormat::Currency.as_lower(), "currency");
    }

    #[test]
    fn test_trend_defaults_to_neutral() {
        assert_eq!(Trend::default(), Trend::Neutral);
        assert_eq!(Trend::default().as_lower(), "neutral");
    }
}
