//! Agent message queue types and the agent runtime contract.

use crate::ids::MessageId;
use crate::risk::RiskStatus;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// The fixed enumeration of recipient agent types. Messages are addressed
/// to a type, not an instance; any live instance of the type may claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgentKind {
    RoutingAgent,
    CustomsAgent,
    NotificationAgent,
}

impl AgentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RoutingAgent => "routing-agent",
            Self::CustomsAgent => "customs-agent",
            Self::NotificationAgent => "notification-agent",
        }
    }

    pub const ALL: [AgentKind; 3] = [
        Self::RoutingAgent,
        Self::CustomsAgent,
        Self::NotificationAgent,
    ];
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "routing-agent" => Ok(Self::RoutingAgent),
            "customs-agent" => Ok(Self::CustomsAgent),
            "notification-agent" => Ok(Self::NotificationAgent),
            other => Err(format!("unknown agent kind: {other}")),
        }
    }
}

/// Queue lifecycle of a message: `pending → claimed → processed | failed`,
/// never back. Terminal messages are kept for audit, not re-delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Pending,
    Claimed,
    Processed,
    Failed,
}

impl MessageStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Processed | Self::Failed)
    }
}

/// A durable message between agents. `message_id` is globally unique and
/// the idempotency key: redelivery at the transport layer is tolerated
/// because handlers key their work on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMessage {
    pub message_id: MessageId,
    pub sender: String,
    pub recipient: AgentKind,
    pub message_type: String,
    pub content: Value,
    pub status: MessageStatus,
    pub enqueued_at: chrono::DateTime<chrono::Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

/// Input to `enqueue`. When `message_id` is `None` the store generates one
/// (retrying on the improbable collision); a caller-supplied id makes the
/// enqueue idempotent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnqueueRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<MessageId>,
    pub sender: String,
    pub recipient: AgentKind,
    pub message_type: String,
    pub content: Value,
}

impl EnqueueRequest {
    pub fn new(
        sender: impl Into<String>,
        recipient: AgentKind,
        message_type: impl Into<String>,
        content: Value,
    ) -> Self {
        Self {
            message_id: None,
            sender: sender.into(),
            recipient,
            message_type: message_type.into(),
            content,
        }
    }

    pub fn with_message_id(mut self, message_id: MessageId) -> Self {
        self.message_id = Some(message_id);
        self
    }
}

/// The live state an agent moves a mitigated risk into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskResolution {
    /// Mitigation is underway; the risk stays live.
    Mitigating,
    /// The risk is fully handled and closes.
    Resolved,
}

impl From<RiskResolution> for RiskStatus {
    fn from(resolution: RiskResolution) -> Self {
        match resolution {
            RiskResolution::Mitigating => RiskStatus::Mitigating,
            RiskResolution::Resolved => RiskStatus::Resolved,
        }
    }
}

/// What an agent handler declares after executing its domain logic for a
/// claimed message. The engine applies the matching risk transition and
/// acks the message with the outcome as result payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ActionOutcome {
    Mitigated {
        resolution: RiskResolution,
        detail: Value,
    },
    Escalated {
        detail: Value,
    },
    NoAction {
        reason: String,
    },
}

impl ActionOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Mitigated { .. } => "mitigated",
            Self::Escalated { .. } => "escalated",
            Self::NoAction { .. } => "no_action",
        }
    }

    /// Risk status this outcome moves the related risk into, if any.
    pub fn target_status(&self) -> Option<RiskStatus> {
        match self {
            Self::Mitigated { resolution, .. } => Some((*resolution).into()),
            Self::Escalated { .. } => Some(RiskStatus::Escalated),
            Self::NoAction { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn agent_kind_wire_form_is_kebab() {
        let json = serde_json::to_string(&AgentKind::CustomsAgent).unwrap();
        assert_eq!(json, "\"customs-agent\"");
        let back: AgentKind = serde_json::from_str("\"routing-agent\"").unwrap();
        assert_eq!(back, AgentKind::RoutingAgent);
    }

    #[test]
    fn agent_kind_parses_from_str() {
        let kind: AgentKind = "notification-agent".parse().unwrap();
        assert_eq!(kind, AgentKind::NotificationAgent);
        assert!("risk-detector".parse::<AgentKind>().is_err());
    }

    #[test]
    fn message_status_terminal() {
        assert!(MessageStatus::Processed.is_terminal());
        assert!(MessageStatus::Failed.is_terminal());
        assert!(!MessageStatus::Pending.is_terminal());
        assert!(!MessageStatus::Claimed.is_terminal());
    }

    #[test]
    fn outcome_targets_match_state_machine() {
        let mitigating = ActionOutcome::Mitigated {
            resolution: RiskResolution::Mitigating,
            detail: json!({}),
        };
        assert_eq!(mitigating.target_status(), Some(RiskStatus::Mitigating));

        let escalated = ActionOutcome::Escalated { detail: json!({}) };
        assert_eq!(escalated.target_status(), Some(RiskStatus::Escalated));

        let none = ActionOutcome::NoAction {
            reason: "nothing to do".into(),
        };
        assert_eq!(none.target_status(), None);
    }

    #[test]
    fn outcome_serde_is_tagged() {
        let outcome = ActionOutcome::Mitigated {
            resolution: RiskResolution::Resolved,
            detail: json!({"action": "reroute"}),
        };
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["outcome"], "mitigated");
        assert_eq!(value["resolution"], "RESOLVED");
    }
}
