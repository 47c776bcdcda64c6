//! Canonical runtime ports for the coordination engine.
//!
//! These traits define the only allowed boundary between engine components
//! and storage implementations. The composite operations
//! (`insert_risk_with_message`, `apply_outcome`) exist because those write
//! paths are all-or-nothing: an orphaned message with no backing risk, or a
//! half-applied action, breaks auditability. Implementations must commit
//! them atomically.
//!
//! Object-safety note: traits use `async-trait` for async dyn-dispatch.

use crate::activity::AgentActivity;
use crate::analytics::DashboardSnapshot;
use crate::error::EngineResult;
use crate::ids::{MessageId, RiskId, ShipmentId};
use crate::message::{ActionOutcome, AgentKind, AgentMessage, EnqueueRequest};
use crate::risk::{Risk, RiskSeverity};
use crate::shipment::{Shipment, ShipmentEvent, ShipmentUpdate};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Consistent point-in-time export of the live tables, used by the
/// analytics aggregator so its rollup never observes a torn write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsView {
    pub shipments: Vec<Shipment>,
    pub risks: Vec<Risk>,
}

/// Read-only shipment risk summary for the dashboard query surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentRiskSummary {
    pub shipment: Shipment,
    pub open_risks: usize,
    pub mitigating_risks: usize,
    pub counts_by_severity: Vec<(RiskSeverity, usize)>,
    pub risks: Vec<Risk>,
}

/// The durable store behind the control tower: shipments, shipment events,
/// risks, the agent message queue, and dashboard snapshots.
#[async_trait]
pub trait TowerStore: Send + Sync {
    // -- shipments -------------------------------------------------------

    /// Insert a new shipment. Rejects a duplicate tracking number
    /// (case-insensitive) as a conflict.
    async fn register_shipment(&self, shipment: Shipment) -> EngineResult<Shipment>;

    async fn shipment(&self, shipment_id: &ShipmentId) -> EngineResult<Shipment>;

    /// Look up by the natural key; comparison is case-insensitive.
    async fn shipment_by_tracking(&self, tracking_number: &str) -> EngineResult<Shipment>;

    async fn list_shipments(&self) -> EngineResult<Vec<Shipment>>;

    /// Apply a partial update and touch `updated_at`.
    async fn update_shipment(
        &self,
        shipment_id: &ShipmentId,
        update: ShipmentUpdate,
    ) -> EngineResult<Shipment>;

    async fn append_shipment_event(&self, event: ShipmentEvent) -> EngineResult<()>;

    /// Events for one shipment in append (time) order.
    async fn shipment_events(&self, shipment_id: &ShipmentId) -> EngineResult<Vec<ShipmentEvent>>;

    // -- risks -----------------------------------------------------------

    async fn risk(&self, risk_id: &RiskId) -> EngineResult<Risk>;

    async fn risks_for_shipment(&self, shipment_id: &ShipmentId) -> EngineResult<Vec<Risk>>;

    /// Atomically insert a risk, recompute the owning shipment's risk
    /// fields (max-score policy), and enqueue exactly one message. Either
    /// everything commits or nothing does: a missing shipment is a
    /// `NotFound` and a caller-supplied `message_id` that already exists
    /// is a `Conflict` (the plain-`enqueue` no-op semantics would orphan
    /// the risk), both with no side effects.
    async fn insert_risk_with_message(
        &self,
        risk: Risk,
        request: EnqueueRequest,
    ) -> EngineResult<(RiskId, MessageId)>;

    // -- message queue ---------------------------------------------------

    /// Insert a pending message. Idempotent when the caller supplies a
    /// `message_id` that already exists; generated IDs retry on collision.
    async fn enqueue(&self, request: EnqueueRequest) -> EngineResult<MessageId>;

    /// Atomically claim the oldest pending message for a recipient type.
    /// Visible to exactly one caller under concurrency; returns `None`
    /// (never blocks) when nothing is pending.
    async fn claim(&self, recipient: AgentKind) -> EngineResult<Option<AgentMessage>>;

    /// `claimed → processed`; conflict if the message is not claimed.
    async fn ack(&self, message_id: &MessageId, result: Value) -> EngineResult<AgentMessage>;

    /// `claimed → failed`, recording the reason; conflict if the message
    /// is not claimed. Failed messages are never auto-retried.
    async fn fail(&self, message_id: &MessageId, reason: &str) -> EngineResult<AgentMessage>;

    async fn message(&self, message_id: &MessageId) -> EngineResult<AgentMessage>;

    /// Atomically apply an agent's declared outcome: transition the risk
    /// per the state machine, recompute the shipment's derived risk
    /// fields, apply the shipment update, and ack the message — in one
    /// commit. Validation happens before any mutation, so a rejected
    /// transition leaves every row untouched (the message stays claimed
    /// for the caller to `fail`).
    async fn apply_outcome(
        &self,
        message_id: &MessageId,
        risk_id: &RiskId,
        outcome: &ActionOutcome,
        update: ShipmentUpdate,
    ) -> EngineResult<AgentMessage>;

    // -- analytics -------------------------------------------------------

    async fn export_for_analytics(&self) -> EngineResult<AnalyticsView>;

    /// Replace the snapshot rows for the dates they carry.
    async fn upsert_snapshots(&self, rows: Vec<DashboardSnapshot>) -> EngineResult<()>;

    /// All snapshot rows in date order.
    async fn snapshots(&self) -> EngineResult<Vec<DashboardSnapshot>>;

    async fn risk_summary(&self, shipment_id: &ShipmentId) -> EngineResult<ShipmentRiskSummary>;
}

/// Append-only audit log of agent activity.
#[async_trait]
pub trait ActivityLog: Send + Sync {
    async fn append(&self, activity: &AgentActivity) -> EngineResult<()>;

    /// The most recent `limit` records, oldest first.
    async fn recent(&self, limit: usize) -> EngineResult<Vec<AgentActivity>>;
}
