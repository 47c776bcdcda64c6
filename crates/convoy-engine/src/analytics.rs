use std::sync::Arc;

use chrono::{Days, Utc};
use convoy_protocol::{
    DashboardSnapshot, EngineEvent, EngineResult, RiskSeverity, TowerStore,
};
use tracing::{info, instrument};

use crate::hub::EventStreamHub;

/// Rolling window of daily rollup rows maintained by `refresh`.
const WINDOW_DAYS: u64 = 30;

/// Periodic rollup of shipment and risk state into per-day dashboard rows.
///
/// `refresh` reads one consistent export of the live tables and replaces
/// the whole window, so it is idempotent and safe to run concurrently
/// with live writes; it never blocks writers. A day-D row counts rows
/// that existed by the end of D, evaluated against current table state.
#[derive(Clone)]
pub struct AnalyticsAggregator {
    store: Arc<dyn TowerStore>,
    hub: EventStreamHub,
}

impl AnalyticsAggregator {
    pub fn new(store: Arc<dyn TowerStore>, hub: EventStreamHub) -> Self {
        Self { store, hub }
    }

    #[instrument(skip(self))]
    pub async fn refresh(&self) -> EngineResult<usize> {
        let view = self.store.export_for_analytics().await?;
        let now = Utc::now();
        let today = now.date_naive();

        let mut rows = Vec::with_capacity(WINDOW_DAYS as usize);
        for offset in (0..WINDOW_DAYS).rev() {
            let Some(day) = today.checked_sub_days(Days::new(offset)) else {
                continue;
            };

            let shipments: Vec<_> = view
                .shipments
                .iter()
                .filter(|shipment| shipment.created_at.date_naive() <= day)
                .collect();
            let risks: Vec<_> = view
                .risks
                .iter()
                .filter(|risk| risk.detected_at.date_naive() <= day)
                .collect();

            let total_shipments = shipments.len() as u64;
            let at_risk_shipments =
                shipments.iter().filter(|s| s.is_at_risk).count() as u64;
            let average_risk_score = if shipments.is_empty() {
                0.0
            } else {
                shipments.iter().map(|s| f64::from(s.risk_score)).sum::<f64>()
                    / shipments.len() as f64
            };

            rows.push(DashboardSnapshot {
                snapshot_date: day,
                total_shipments,
                at_risk_shipments,
                total_risks: risks.len() as u64,
                critical_risks: risks
                    .iter()
                    .filter(|r| r.severity == RiskSeverity::Critical)
                    .count() as u64,
                high_risks: risks
                    .iter()
                    .filter(|r| r.severity == RiskSeverity::High)
                    .count() as u64,
                average_risk_score,
                refreshed_at: now,
            });
        }

        let days = rows.len();
        self.store.upsert_snapshots(rows).await?;
        self.hub.publish(EngineEvent::SnapshotRefreshed { days });
        info!(days, "dashboard snapshots refreshed");
        Ok(days)
    }
}
