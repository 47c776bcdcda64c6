//! # convoy-engine — Convoy Coordination Engine
//!
//! Wires the durable store, the risk trigger, the agent dispatch protocol,
//! and the analytics aggregator into one [`ControlTower`] facade. The
//! facade owns the live event hub; every durable mutation announces itself
//! there after committing.

mod agents;
mod analytics;
mod dispatch;
mod hub;
mod trigger;

use std::sync::Arc;

use convoy_protocol::{
    ActivityLog, AgentActivity, DashboardSnapshot, EngineEvent, EngineResult, EnqueueRequest,
    MessageId, Risk, RiskId, RiskRouting, RiskSeverity, RiskType, Shipment, ShipmentEvent,
    ShipmentId, ShipmentRiskSummary, ShipmentUpdate, TowerStore,
};
use convoy_store::{InMemoryTowerStore, MemoryActivityLog};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{info, instrument};

pub use agents::{CustomsExpediteAgent, RerouteAgent, StakeholderNotifyAgent};
pub use analytics::AnalyticsAggregator;
pub use dispatch::{AgentHandler, AgentWorker};
pub use hub::EventStreamHub;
pub use trigger::{RISK_DETECTOR_SENDER, RiskTrigger};

#[derive(Default)]
pub struct ControlTowerBuilder {
    store: Option<Arc<dyn TowerStore>>,
    activity: Option<Arc<dyn ActivityLog>>,
    routing: Option<RiskRouting>,
    hub_buffer: Option<usize>,
}

impl ControlTowerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(mut self, store: Arc<dyn TowerStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn activity_log(mut self, activity: Arc<dyn ActivityLog>) -> Self {
        self.activity = Some(activity);
        self
    }

    pub fn routing(mut self, routing: RiskRouting) -> Self {
        self.routing = Some(routing);
        self
    }

    pub fn hub_buffer(mut self, buffer: usize) -> Self {
        self.hub_buffer = Some(buffer);
        self
    }

    pub fn build(self) -> ControlTower {
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryTowerStore::new()));
        let activity = self
            .activity
            .unwrap_or_else(|| Arc::new(MemoryActivityLog::new()));
        let hub = EventStreamHub::new(self.hub_buffer.unwrap_or(1024));
        let routing = self.routing.unwrap_or_default();

        let trigger = RiskTrigger::new(store.clone(), routing, hub.clone());
        let aggregator = AnalyticsAggregator::new(store.clone(), hub.clone());

        ControlTower {
            store,
            activity,
            hub,
            trigger,
            aggregator,
        }
    }
}

/// Facade over the coordination substrate: shipment registry, risk
/// trigger, agent mailboxes, activity audit, and dashboard rollups.
#[derive(Clone)]
pub struct ControlTower {
    store: Arc<dyn TowerStore>,
    activity: Arc<dyn ActivityLog>,
    hub: EventStreamHub,
    trigger: RiskTrigger,
    aggregator: AnalyticsAggregator,
}

impl ControlTower {
    #[instrument(skip(self, tracking_number, origin, destination))]
    pub async fn register_shipment(
        &self,
        tracking_number: impl Into<String>,
        origin: impl Into<String>,
        destination: impl Into<String>,
    ) -> EngineResult<Shipment> {
        let shipment = self
            .store
            .register_shipment(Shipment::new(tracking_number, origin, destination))
            .await?;
        self.store
            .append_shipment_event(
                ShipmentEvent::new(shipment.shipment_id.clone(), "shipment_created")
                    .with_description(format!("{} -> {}", shipment.origin, shipment.destination)),
            )
            .await?;
        self.hub.publish(EngineEvent::ShipmentRegistered {
            shipment_id: shipment.shipment_id.clone(),
            tracking_number: shipment.tracking_number.clone(),
        });
        info!(shipment_id = %shipment.shipment_id, tracking = %shipment.tracking_number, "shipment registered");
        Ok(shipment)
    }

    pub async fn update_shipment(
        &self,
        shipment_id: &ShipmentId,
        update: ShipmentUpdate,
    ) -> EngineResult<Shipment> {
        let status_change = update.status;
        let shipment = self.store.update_shipment(shipment_id, update).await?;
        if let Some(status) = status_change {
            self.store
                .append_shipment_event(
                    ShipmentEvent::new(shipment_id.clone(), "status_updated")
                        .with_description(format!("{status:?}")),
                )
                .await?;
        }
        Ok(shipment)
    }

    pub async fn shipment(&self, shipment_id: &ShipmentId) -> EngineResult<Shipment> {
        self.store.shipment(shipment_id).await
    }

    pub async fn shipment_by_tracking(&self, tracking_number: &str) -> EngineResult<Shipment> {
        self.store.shipment_by_tracking(tracking_number).await
    }

    pub async fn list_shipments(&self) -> EngineResult<Vec<Shipment>> {
        self.store.list_shipments().await
    }

    pub async fn shipment_events(
        &self,
        shipment_id: &ShipmentId,
    ) -> EngineResult<Vec<ShipmentEvent>> {
        self.store.shipment_events(shipment_id).await
    }

    /// Producer interface for detectors: see [`RiskTrigger::raise_risk`].
    pub async fn raise_risk(
        &self,
        shipment_id: &ShipmentId,
        risk_type: RiskType,
        severity: RiskSeverity,
        evidence: Value,
    ) -> EngineResult<(RiskId, MessageId)> {
        self.trigger
            .raise_risk(shipment_id, risk_type, severity, evidence)
            .await
    }

    pub async fn risks_for_shipment(&self, shipment_id: &ShipmentId) -> EngineResult<Vec<Risk>> {
        self.store.risks_for_shipment(shipment_id).await
    }

    pub async fn risk_summary(
        &self,
        shipment_id: &ShipmentId,
    ) -> EngineResult<ShipmentRiskSummary> {
        self.store.risk_summary(shipment_id).await
    }

    /// Direct enqueue for supervisors (deliberate re-enqueue of failed
    /// work) and agent-to-agent requests.
    pub async fn enqueue(&self, request: EnqueueRequest) -> EngineResult<MessageId> {
        let recipient = request.recipient;
        let message_type = request.message_type.clone();
        let message_id = self.store.enqueue(request).await?;
        self.hub.publish(EngineEvent::MessageEnqueued {
            message_id: message_id.clone(),
            recipient,
            message_type,
        });
        Ok(message_id)
    }

    /// Build a worker bound to this tower's store, audit log, and hub.
    pub fn worker(
        &self,
        agent_id: impl Into<String>,
        handler: Arc<dyn AgentHandler>,
    ) -> AgentWorker {
        AgentWorker::new(
            agent_id,
            handler,
            self.store.clone(),
            self.activity.clone(),
            self.hub.clone(),
        )
    }

    pub async fn refresh_analytics(&self) -> EngineResult<usize> {
        self.aggregator.refresh().await
    }

    pub async fn snapshots(&self) -> EngineResult<Vec<DashboardSnapshot>> {
        self.store.snapshots().await
    }

    pub async fn recent_activity(&self, limit: usize) -> EngineResult<Vec<AgentActivity>> {
        self.activity.recent(limit).await
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<EngineEvent> {
        self.hub.subscribe()
    }

    pub fn store(&self) -> Arc<dyn TowerStore> {
        self.store.clone()
    }
}
