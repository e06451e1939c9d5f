//! Demo and test fixtures: the sector/department/category/KPI catalog and a
//! randomized snapshot generator for freshly provisioned tenants.
//!
//! Unlike the live write path, the generator normalizes department revenue
//! shares against their own subtotal so a seeded dashboard always shows
//! shares summing to 100. Live submissions keep the snapshot total as the
//! denominator.

use chrono::{Datelike, NaiveDate, Utc};
use log::info;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use uuid::Uuid;

use crate::error::Result;
use crate::metrics::{kpi_delta_percent, snapshot_margins};
use crate::model::{
    CostCategory, CostEntry, CostEntryRow, Department, DepartmentMetric, DepartmentMetricRow,
    KpiDefinition, KpiFormat, KpiValue, KpiValueRow, Organization, Sector, Snapshot,
    SnapshotDetail, TenantContext, Trend,
};
use crate::store::SnapshotStore;
use crate::utils::{first_day_of_month, last_day_of_month, months_before};

/// Fixed cost split applied to generated snapshots, in catalog sort order:
/// Labor, Materials, Overhead, Technology, Marketing, Other.
const COST_SPLIT_PERCENTAGES: [f64; 6] = [35.0, 25.0, 15.0, 10.0, 10.0, 5.0];

pub struct Catalog {
    pub sectors: Vec<Sector>,
    pub categories: Vec<CostCategory>,
    pub kpis: Vec<KpiDefinition>,
}

impl Catalog {
    pub fn sector_by_slug(&self, slug: &str) -> Option<&Sector> {
        self.sectors.iter().find(|s| s.slug == slug)
    }
}

fn slugify(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Installs the reference catalog: six sectors with five departments each,
/// the six-entry cost-category list, and four global KPI definitions.
pub fn install_catalog<S: SnapshotStore + ?Sized>(store: &S) -> Result<Catalog> {
    let sector_specs: [(&str, &str, &[(&str, &str)]); 6] = [
        (
            "Healthcare",
            "Hospitals, clinics, and healthcare providers",
            &[
                ("Emergency", "ER"),
                ("Surgery", "SURG"),
                ("Cardiology", "CARD"),
                ("Pediatrics", "PED"),
                ("Radiology", "RAD"),
            ],
        ),
        (
            "Banking & Capital Markets",
            "Financial institutions and investment services",
            &[
                ("Retail Banking", "RB"),
                ("Investment Banking", "IB"),
                ("Wealth Management", "WM"),
                ("Trading", "TRD"),
                ("Operations", "OPS"),
            ],
        ),
        (
            "Retail & Ecommerce",
            "Retail stores and online commerce",
            &[
                ("Electronics", "ELEC"),
                ("Clothing", "CLO"),
                ("Home & Garden", "HG"),
                ("Food & Beverage", "FB"),
                ("Online Sales", "ONL"),
            ],
        ),
        (
            "Energy",
            "Oil, gas, renewable energy, and utilities",
            &[
                ("Oil & Gas", "OG"),
                ("Renewable Energy", "RE"),
                ("Utilities", "UTIL"),
                ("Infrastructure", "INFRA"),
                ("Maintenance", "MAINT"),
            ],
        ),
        (
            "Life Sciences",
            "Pharmaceuticals, biotechnology, and medical devices",
            &[
                ("Research & Development", "R&D"),
                ("Manufacturing", "MFG"),
                ("Quality Control", "QC"),
                ("Sales", "SALES"),
                ("Regulatory", "REG"),
            ],
        ),
        (
            "Public Sector",
            "Government agencies and public services",
            &[
                ("Health Services", "HS"),
                ("Education", "EDU"),
                ("Infrastructure", "INFRA"),
                ("Public Safety", "PS"),
                ("Administration", "ADMIN"),
            ],
        ),
    ];

    let mut sectors = Vec::new();
    for (name, description, departments) in sector_specs {
        let sector = Sector {
            id: Uuid::new_v4(),
            name: name.to_string(),
            slug: slugify(name),
            description: description.to_string(),
        };
        store.insert_sector(sector.clone())?;
        for (dept_name, code) in departments {
            store.insert_department(Department {
                id: Uuid::new_v4(),
                name: dept_name.to_string(),
                code: code.to_string(),
                sector_id: sector.id,
            })?;
        }
        sectors.push(sector);
    }

    let category_specs = [
        ("Labor", "LABOR", "Employee salaries and benefits", 1),
        ("Materials", "MAT", "Raw materials and supplies", 2),
        ("Overhead", "OH", "General overhead expenses", 3),
        ("Technology", "TECH", "IT infrastructure and software", 4),
        ("Marketing", "MKT", "Marketing and advertising", 5),
        ("Other", "OTHER", "Miscellaneous expenses", 6),
    ];
    let mut categories = Vec::new();
    for (name, code, description, sort_order) in category_specs {
        let category = CostCategory {
            id: Uuid::new_v4(),
            name: name.to_string(),
            code: code.to_string(),
            description: description.to_string(),
            sort_order,
        };
        store.insert_cost_category(category.clone())?;
        categories.push(category);
    }

    let kpi_specs: [(&str, &str, &str, KpiFormat, Option<f64>); 4] = [
        (
            "Gross Profit Margin",
            "gross-profit-margin",
            "Revenue minus cost of goods sold",
            KpiFormat::Percentage,
            Some(40.0),
        ),
        (
            "Operating Profit Margin",
            "operating-profit-margin",
            "Profit after operating expenses",
            KpiFormat::Percentage,
            Some(20.0),
        ),
        (
            "Net Profit Margin",
            "net-profit-margin",
            "Final profit after all expenses",
            KpiFormat::Percentage,
            Some(15.0),
        ),
        (
            "Total Revenue",
            "total-revenue",
            "Total revenue generated",
            KpiFormat::Currency,
            Some(5_000_000.0),
        ),
    ];
    let mut kpis = Vec::new();
    for (label, slug, description, format, target_value) in kpi_specs {
        let kpi = KpiDefinition {
            id: Uuid::new_v4(),
            label: label.to_string(),
            slug: slug.to_string(),
            description: Some(description.to_string()),
            format,
            target_value,
            sector_id: None,
        };
        store.insert_kpi_definition(kpi.clone())?;
        kpis.push(kpi);
    }

    info!(
        "Installed catalog: {} sectors, {} categories, {} KPIs",
        sectors.len(),
        categories.len(),
        kpis.len()
    );
    Ok(Catalog {
        sectors,
        categories,
        kpis,
    })
}

/// Creates an organization in the given sector, opted into the sector's full
/// department catalog, and returns its tenant context.
pub fn provision_organization<S: SnapshotStore + ?Sized>(
    store: &S,
    sector_id: Uuid,
    name: &str,
) -> Result<TenantContext> {
    let organization = Organization {
        id: Uuid::new_v4(),
        name: name.to_string(),
        slug: slugify(name),
        sector_id,
    };
    store.insert_organization(organization.clone())?;

    let ctx = TenantContext {
        organization_id: organization.id,
        sector_id,
    };

    for department in store.departments_in_sector(sector_id)? {
        store.link_department(organization.id, department.id)?;
    }
    Ok(ctx)
}

/// Tuning knobs for the generator.
pub struct DemoDataConfig {
    /// How many trailing calendar months to cover, newest first.
    pub months: u32,
    /// Midpoint monthly revenue before jitter.
    pub base_revenue: f64,
    /// Standard deviation of the multiplicative revenue jitter.
    pub noise_factor: f64,
}

impl Default for DemoDataConfig {
    fn default() -> Self {
        Self {
            months: 12,
            base_revenue: 5_000_000.0,
            noise_factor: 0.03,
        }
    }
}

/// Generates one snapshot per trailing calendar month, anchored at today.
pub fn generate_snapshots<S: SnapshotStore + ?Sized, R: Rng>(
    store: &S,
    ctx: &TenantContext,
    config: &DemoDataConfig,
    rng: &mut R,
) -> Result<Vec<Snapshot>> {
    generate_snapshots_from(store, ctx, config, rng, Utc::now().date_naive())
}

/// Like [`generate_snapshots`] with an explicit anchor date, for
/// deterministic horizons in tests.
pub fn generate_snapshots_from<S: SnapshotStore + ?Sized, R: Rng>(
    store: &S,
    ctx: &TenantContext,
    config: &DemoDataConfig,
    rng: &mut R,
    today: NaiveDate,
) -> Result<Vec<Snapshot>> {
    let departments = store.departments_for_organization(ctx.organization_id)?;
    let categories = store.cost_categories()?;
    let kpis = store.kpi_definitions(ctx.sector_id)?;

    let noise = if config.noise_factor > 0.0 {
        Some(Normal::new(0.0, config.noise_factor).map_err(|e| {
            crate::error::AnalyticsError::Store(format!("invalid noise factor: {e}"))
        })?)
    } else {
        None
    };

    let mut created = Vec::new();
    for month_offset in 0..config.months {
        let anchor = months_before(first_day_of_month(today.year(), today.month()), month_offset);
        let period_start = anchor;
        let period_end = last_day_of_month(anchor.year(), anchor.month());

        let mut revenue = config.base_revenue + rng.gen_range(0.0..2_000_000.0);
        if let Some(normal) = &noise {
            revenue *= 1.0 + normal.sample(rng);
        }
        let cost = revenue * (0.65 + rng.gen_range(0.0..0.1));
        let margins = snapshot_margins(revenue, cost);

        let snapshot_id = Uuid::new_v4();
        let snapshot = Snapshot {
            id: snapshot_id,
            organization_id: ctx.organization_id,
            sector_id: ctx.sector_id,
            period_start,
            period_end,
            currency: "USD".to_string(),
            revenue,
            cost,
            profit: margins.profit,
            gross_margin: margins.gross_margin,
            operating_margin: margins.operating_margin,
            net_margin: margins.net_margin,
        };

        let department_metrics =
            generate_department_metrics(snapshot_id, revenue, &departments, rng);
        let cost_entries = generate_cost_entries(snapshot_id, cost, &categories);
        let kpi_values = generate_kpi_values(snapshot_id, &margins, revenue, &kpis);

        let stored = store.insert_snapshot(SnapshotDetail {
            snapshot,
            department_metrics,
            cost_entries,
            kpi_values,
        })?;
        created.push(stored);
    }

    info!(
        "Generated {} demo snapshots for organization {}",
        created.len(),
        ctx.organization_id
    );
    Ok(created)
}

fn generate_department_metrics<R: Rng>(
    snapshot_id: Uuid,
    revenue: f64,
    departments: &[Department],
    rng: &mut R,
) -> Vec<DepartmentMetricRow> {
    if departments.is_empty() {
        return Vec::new();
    }

    let mut rows = Vec::new();
    let mut total_department_revenue = 0.0;
    for department in departments {
        let dept_revenue = revenue * (0.15 + rng.gen_range(0.0..0.1)) / departments.len() as f64;
        let dept_cost = dept_revenue * (0.6 + rng.gen_range(0.0..0.15));
        let dept_profit = dept_revenue - dept_cost;
        total_department_revenue += dept_revenue;
        rows.push(DepartmentMetricRow {
            department: department.clone(),
            metric: DepartmentMetric {
                snapshot_id,
                department_id: department.id,
                revenue: dept_revenue,
                cost: dept_cost,
                profit: dept_profit,
                margin: (dept_profit / dept_revenue) * 100.0,
                revenue_share: 0.0,
            },
        });
    }

    // Seeded shares are normalized against the department subtotal, unlike
    // the live write path.
    for row in &mut rows {
        row.metric.revenue_share = (row.metric.revenue / total_department_revenue) * 100.0;
    }
    rows
}

fn generate_cost_entries(
    snapshot_id: Uuid,
    cost: f64,
    categories: &[CostCategory],
) -> Vec<CostEntryRow> {
    categories
        .iter()
        .zip(COST_SPLIT_PERCENTAGES)
        .map(|(category, percentage)| CostEntryRow {
            category: category.clone(),
            entry: CostEntry {
                snapshot_id,
                category_id: category.id,
                amount: cost * (percentage / 100.0),
                percentage,
            },
        })
        .collect()
}

fn generate_kpi_values(
    snapshot_id: Uuid,
    margins: &crate::metrics::SnapshotMargins,
    revenue: f64,
    kpis: &[KpiDefinition],
) -> Vec<KpiValueRow> {
    kpis.iter()
        .map(|kpi| {
            let (value, trend) = match kpi.slug.as_str() {
                "gross-profit-margin" => (
                    margins.gross_margin,
                    trend_vs_target(margins.gross_margin, kpi.target_value.unwrap_or(40.0)),
                ),
                "operating-profit-margin" => (
                    margins.operating_margin,
                    trend_vs_target(margins.operating_margin, kpi.target_value.unwrap_or(20.0)),
                ),
                "net-profit-margin" => (
                    margins.net_margin,
                    trend_vs_target(margins.net_margin, kpi.target_value.unwrap_or(15.0)),
                ),
                "total-revenue" => (revenue, Trend::Up),
                _ => (0.0, Trend::Neutral),
            };
            KpiValueRow {
                kpi: kpi.clone(),
                value: KpiValue {
                    snapshot_id,
                    kpi_id: kpi.id,
                    value,
                    delta_percent: kpi_delta_percent(value, kpi.target_value),
                    trend,
                },
            }
        })
        .collect()
}

fn trend_vs_target(value: f64, target: f64) -> Trend {
    if value > target {
        Trend::Up
    } else {
        Trend::Down
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Banking & Capital Markets"), "banking-capital-markets");
        assert_eq!(slugify("Healthcare"), "healthcare");
        assert_eq!(slugify("City General Hospital"), "city-general-hospital");
    }

    #[test]
    fn test_install_catalog_shapes() {
        let store = MemoryStore::new();
        let catalog = install_catalog(&store).unwrap();
        assert_eq!(catalog.sectors.len(), 6);
        assert_eq!(catalog.categories.len(), 6);
        assert_eq!(catalog.kpis.len(), 4);
        assert!(catalog.sector_by_slug("healthcare").is_some());
        assert!(catalog.sector_by_slug("banking-capital-markets").is_some());

        let healthcare = catalog.sector_by_slug("healthcare").unwrap();
        assert!(store
            .department_by_name(healthcare.id, "Surgery")
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_generated_shares_are_normalized() {
        let store = MemoryStore::new();
        let catalog = install_catalog(&store).unwrap();
        let sector = catalog.sector_by_slug("healthcare").unwrap();
        let ctx = provision_organization(&store, sector.id, "City General Hospital").unwrap();

        let mut rng = StdRng::seed_from_u64(7);
        let config = DemoDataConfig {
            months: 1,
            ..Default::default()
        };
        let today = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        let created = generate_snapshots_from(&store, &ctx, &config, &mut rng, today).unwrap();
        assert_eq!(created.len(), 1);

        let detail = store.snapshot_by_id(&ctx, created[0].id).unwrap().unwrap();
        assert_eq!(detail.department_metrics.len(), 5);
        let share_sum: f64 = detail
            .department_metrics
            .iter()
            .map(|row| row.metric.revenue_share)
            .sum();
        assert!((share_sum - 100.0).abs() < 1e-6);

        let cost_sum: f64 = detail
            .cost_entries
            .iter()
            .map(|row| row.entry.percentage)
            .sum();
        assert!((cost_sum - 100.0).abs() < 1e-9);
        assert_eq!(detail.kpi_values.len(), 4);
    }

    #[test]
    fn test_generated_periods_are_calendar_months() {
        let store = MemoryStore::new();
        let catalog = install_catalog(&store).unwrap();
        let sector = catalog.sector_by_slug("energy").unwrap();
        let ctx = provision_organization(&store, sector.id, "Green Energy Solutions").unwrap();

        let mut rng = StdRng::seed_from_u64(11);
        let config = DemoDataConfig {
            months: 3,
            noise_factor: 0.0,
            ..Default::default()
        };
        let today = NaiveDate::from_ymd_opt(2024, 3, 20).unwrap();
        let created = generate_snapshots_from(&store, &ctx, &config, &mut rng, today).unwrap();

        assert_eq!(created[0].period_start, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(created[0].period_end, NaiveDate::from_ymd_opt(2024, 3, 31).unwrap());
        assert_eq!(created[2].period_start, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(created[2].period_end, NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());

        for snapshot in &created {
            assert!((snapshot.profit - (snapshot.revenue - snapshot.cost)).abs() < 1e-6);
        }
    }
}
