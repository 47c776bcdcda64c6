use std::sync::Arc;

use convoy_protocol::{
    EngineEvent, EngineResult, EnqueueRequest, MessageId, Risk, RiskId, RiskRouting, RiskSeverity,
    RiskType, ShipmentId, TowerStore,
};
use serde_json::{Value, json};
use tracing::{info, instrument};

use crate::hub::EventStreamHub;

/// Sender name stamped on messages raised by the detection path.
pub const RISK_DETECTOR_SENDER: &str = "risk-detector";

/// The single write path that couples risk detection to dispatch.
///
/// The routing table is immutable and injected at construction; there is
/// no hidden global lookup between detector output and agent mailboxes.
#[derive(Clone)]
pub struct RiskTrigger {
    store: Arc<dyn TowerStore>,
    routing: RiskRouting,
    hub: EventStreamHub,
}

impl RiskTrigger {
    pub fn new(store: Arc<dyn TowerStore>, routing: RiskRouting, hub: EventStreamHub) -> Self {
        Self {
            store,
            routing,
            hub,
        }
    }

    /// Convert a detected condition into a Risk row plus exactly one
    /// queued message for the responsible agent type. Both commit
    /// together or neither does; a missing shipment surfaces as
    /// `NotFound` with no side effects.
    #[instrument(
        skip(self, evidence),
        fields(shipment_id = %shipment_id, risk_type = ?risk_type, severity = ?severity)
    )]
    pub async fn raise_risk(
        &self,
        shipment_id: &ShipmentId,
        risk_type: RiskType,
        severity: RiskSeverity,
        evidence: Value,
    ) -> EngineResult<(RiskId, MessageId)> {
        let recipient = self.routing.route(risk_type);
        let risk = Risk::new(shipment_id.clone(), risk_type, severity);

        let content = json!({
            "risk_id": risk.risk_id,
            "shipment_id": shipment_id,
            "risk_type": risk_type,
            "severity": severity,
            "evidence": evidence,
        });
        let request = EnqueueRequest::new(
            RISK_DETECTOR_SENDER,
            recipient,
            "risk_detected",
            content,
        );

        let (risk_id, message_id) = self.store.insert_risk_with_message(risk, request).await?;

        self.hub.publish(EngineEvent::RiskRaised {
            risk_id: risk_id.clone(),
            shipment_id: shipment_id.clone(),
            risk_type,
            severity,
        });
        self.hub.publish(EngineEvent::MessageEnqueued {
            message_id: message_id.clone(),
            recipient,
            message_type: "risk_detected".into(),
        });
        info!(risk_id = %risk_id, message_id = %message_id, recipient = %recipient, "risk raised");
        Ok((risk_id, message_id))
    }
}
