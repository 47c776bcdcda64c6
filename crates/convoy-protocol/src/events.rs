//! Engine event taxonomy for live subscribers.
//!
//! These events are broadcast after durable state has committed; they are a
//! notification surface for dashboards and the daemon, not a source of
//! truth. Missing one (lagging subscriber) loses no data.

use crate::ids::{MessageId, RiskId, ShipmentId};
use crate::message::AgentKind;
use crate::risk::{RiskSeverity, RiskType};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    ShipmentRegistered {
        shipment_id: ShipmentId,
        tracking_number: String,
    },
    RiskRaised {
        risk_id: RiskId,
        shipment_id: ShipmentId,
        risk_type: RiskType,
        severity: RiskSeverity,
    },
    MessageEnqueued {
        message_id: MessageId,
        recipient: AgentKind,
        message_type: String,
    },
    ActionCompleted {
        message_id: MessageId,
        agent_id: String,
        outcome: String,
    },
    ActionFailed {
        message_id: MessageId,
        agent_id: String,
        reason: String,
    },
    SnapshotRefreshed {
        days: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_wire_form_is_tagged() {
        let event = EngineEvent::MessageEnqueued {
            message_id: MessageId::from_string("msg_1"),
            recipient: AgentKind::RoutingAgent,
            message_type: "risk_detected".into(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "message_enqueued");
        assert_eq!(value["recipient"], "routing-agent");
    }
}
