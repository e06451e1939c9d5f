//! Estimation policy: every fixed-ratio approximation the engine applies when
//! real accounting inputs are missing, collected in one place so they can be
//! swapped for actual data feeds without touching aggregation logic.
//!
//! These are modeling approximations, not general accounting formulas. They
//! exist so a tenant with thin history still sees a complete dashboard.

/// Share of total cost assumed to be cost of goods sold when no explicit
/// COGS breakdown exists. Feeds the gross margin derivation.
pub const ASSUMED_COGS_RATIO: f64 = 0.6;

/// Net margin is assumed to be this fraction of operating margin.
pub const NET_TO_OPERATING_RATIO: f64 = 0.85;

/// Synthesized previous-period baselines used when fewer than two comparison
/// periods of history exist. The comparison always renders, even for tenants
/// with under six months of data.
pub const BASELINE_REVENUE_RATIO: f64 = 0.9;
pub const BASELINE_COST_RATIO: f64 = 0.95;
pub const BASELINE_PROFIT_RATIO: f64 = 0.85;

/// Synthesized previous value for currency-format KPIs that have no target,
/// so the card still shows a trend.
pub const KPI_BASELINE_RATIO: f64 = 0.8;
