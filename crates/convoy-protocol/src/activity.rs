//! Append-only agent activity audit records.

use crate::ids::{ActivityId, MessageId, ShipmentId};
use crate::message::AgentKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One audit record of something an agent did. Write-only from the
/// engine's perspective; never mutated after append.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentActivity {
    pub activity_id: ActivityId,
    pub agent_id: String,
    pub agent_kind: AgentKind,
    pub activity_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<MessageId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipment_id: Option<ShipmentId>,
    pub detail: Value,
    pub created_at: DateTime<Utc>,
}

impl AgentActivity {
    pub fn new(
        agent_id: impl Into<String>,
        agent_kind: AgentKind,
        activity_type: impl Into<String>,
        detail: Value,
    ) -> Self {
        Self {
            activity_id: ActivityId::new_uuid(),
            agent_id: agent_id.into(),
            agent_kind,
            activity_type: activity_type.into(),
            message_id: None,
            shipment_id: None,
            detail,
            created_at: Utc::now(),
        }
    }

    pub fn with_message(mut self, message_id: MessageId) -> Self {
        self.message_id = Some(message_id);
        self
    }

    pub fn with_shipment(mut self, shipment_id: ShipmentId) -> Self {
        self.shipment_id = Some(shipment_id);
        self
    }
}
