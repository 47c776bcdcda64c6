//! Reference agent handlers.
//!
//! Deterministic implementations of the three fixed agent types. Real
//! deployments swap these for handlers that talk to carrier APIs, customs
//! brokers, and notification channels; these exist so the claim/act/ack
//! protocol is exercised end to end without external dependencies.

use convoy_protocol::{
    ActionOutcome, AgentKind, AgentMessage, EngineResult, RiskResolution, RiskSeverity,
};
use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use crate::dispatch::AgentHandler;

fn severity_of(message: &AgentMessage) -> RiskSeverity {
    message
        .content
        .get("severity")
        .cloned()
        .and_then(|value| serde_json::from_value(value).ok())
        .unwrap_or(RiskSeverity::Medium)
}

fn risk_type_label(message: &AgentMessage) -> String {
    message
        .content
        .get("risk_type")
        .and_then(Value::as_str)
        .unwrap_or("UNKNOWN")
        .to_owned()
}

/// Diverts the shipment through an alternative corridor. Critical risks
/// stay in mitigation until the new route is confirmed; anything below
/// resolves immediately.
pub struct RerouteAgent;

#[async_trait]
impl AgentHandler for RerouteAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::RoutingAgent
    }

    async fn handle(&self, message: &AgentMessage) -> EngineResult<ActionOutcome> {
        let severity = severity_of(message);
        let detail = json!({
            "action": "reroute",
            "corridor": "southern-overland",
            "new_location": "Piraeus transshipment hub",
            "estimated_hours_saved": 18,
            "risk_type": risk_type_label(message),
        });
        debug!(message_id = %message.message_id, "reroute planned");
        let resolution = if severity == RiskSeverity::Critical {
            RiskResolution::Mitigating
        } else {
            RiskResolution::Resolved
        };
        Ok(ActionOutcome::Mitigated { resolution, detail })
    }
}

/// Requests expedited clearance. Low-severity holds clear on request;
/// everything else stays mitigating until the broker confirms.
pub struct CustomsExpediteAgent;

#[async_trait]
impl AgentHandler for CustomsExpediteAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::CustomsAgent
    }

    async fn handle(&self, message: &AgentMessage) -> EngineResult<ActionOutcome> {
        let severity = severity_of(message);
        let detail = json!({
            "action": "expedite_customs",
            "service_level": "premium",
            "reference": format!("EXP-{}", message.message_id),
            "expected_clearance_hours": 6,
        });
        debug!(message_id = %message.message_id, "expedited clearance requested");
        let resolution = if severity == RiskSeverity::Low {
            RiskResolution::Resolved
        } else {
            RiskResolution::Mitigating
        };
        Ok(ActionOutcome::Mitigated { resolution, detail })
    }
}

/// Notifies stakeholders. Notification mitigates nothing by itself:
/// critical risks escalate for human attention, the rest stay open with
/// the notification on record.
pub struct StakeholderNotifyAgent;

#[async_trait]
impl AgentHandler for StakeholderNotifyAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::NotificationAgent
    }

    async fn handle(&self, message: &AgentMessage) -> EngineResult<ActionOutcome> {
        let severity = severity_of(message);
        let risk_type = risk_type_label(message);
        debug!(message_id = %message.message_id, %risk_type, "stakeholders notified");
        if severity == RiskSeverity::Critical {
            Ok(ActionOutcome::Escalated {
                detail: json!({
                    "action": "notify_operations",
                    "urgency": "high",
                    "risk_type": risk_type,
                    "channels": ["email", "dashboard"],
                }),
            })
        } else {
            Ok(ActionOutcome::NoAction {
                reason: format!("stakeholders notified; no mitigation available for {risk_type}"),
            })
        }
    }
}
