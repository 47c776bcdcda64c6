//! Derived analytics rows for dashboard reporting.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One rollup row per calendar day, recomputed wholesale on each refresh.
/// The latest row for a given day is authoritative; rows are never
/// incrementally patched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    pub snapshot_date: NaiveDate,
    pub total_shipments: u64,
    pub at_risk_shipments: u64,
    pub total_risks: u64,
    pub critical_risks: u64,
    pub high_risks: u64,
    pub average_risk_score: f64,
    pub refreshed_at: DateTime<Utc>,
}
