use std::sync::Arc;

use convoy_protocol::{
    ActionOutcome, ActivityLog, AgentActivity, AgentKind, AgentMessage, EngineEvent, EngineResult,
    MessageId, RiskId, ShipmentId, ShipmentUpdate, TowerStore,
};
use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, instrument, warn};

use crate::hub::EventStreamHub;

/// The contract every agent type implements. Domain logic is opaque to
/// the engine; only the declared [`ActionOutcome`] matters.
///
/// Handlers must be idempotent keyed on `message_id`: at-least-once
/// delivery at the transport layer is tolerated by design.
#[async_trait]
pub trait AgentHandler: Send + Sync {
    /// The recipient type this handler claims messages for.
    fn kind(&self) -> AgentKind;

    async fn handle(&self, message: &AgentMessage) -> EngineResult<ActionOutcome>;
}

/// Claim-then-act worker for one agent instance.
///
/// Protocol per message: claim, run the handler, then either apply the
/// outcome (risk transition + shipment update + ack, one commit) or fail
/// the message leaving domain state untouched. Every path writes an
/// activity record.
pub struct AgentWorker {
    agent_id: String,
    handler: Arc<dyn AgentHandler>,
    store: Arc<dyn TowerStore>,
    activity: Arc<dyn ActivityLog>,
    hub: EventStreamHub,
}

impl AgentWorker {
    pub fn new(
        agent_id: impl Into<String>,
        handler: Arc<dyn AgentHandler>,
        store: Arc<dyn TowerStore>,
        activity: Arc<dyn ActivityLog>,
        hub: EventStreamHub,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            handler,
            store,
            activity,
            hub,
        }
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    /// Claim and process at most one message. Returns the processed
    /// message id, or `None` when the mailbox had nothing pending.
    #[instrument(skip(self), fields(agent_id = %self.agent_id, kind = %self.handler.kind()))]
    pub async fn poll_once(&self) -> EngineResult<Option<MessageId>> {
        let Some(message) = self.store.claim(self.handler.kind()).await? else {
            return Ok(None);
        };
        let message_id = message.message_id.clone();
        let risk_id = message
            .content
            .get("risk_id")
            .and_then(Value::as_str)
            .map(RiskId::from_string);
        let shipment_id = message
            .content
            .get("shipment_id")
            .and_then(Value::as_str)
            .map(ShipmentId::from_string);
        debug!(message_id = %message_id, "message claimed for processing");

        match self.handler.handle(&message).await {
            Ok(outcome) => {
                let applied = match &risk_id {
                    Some(risk_id) => {
                        self.store
                            .apply_outcome(
                                &message_id,
                                risk_id,
                                &outcome,
                                shipment_update_from(&outcome),
                            )
                            .await
                    }
                    // Messages without a backing risk (supervisor
                    // re-enqueues, plain notifications) just ack.
                    None => {
                        self.store
                            .ack(&message_id, serde_json::to_value(&outcome)?)
                            .await
                    }
                };
                match applied {
                    Ok(_) => {
                        self.record(
                            "action_executed",
                            &message_id,
                            &shipment_id,
                            json!({
                                "outcome": outcome.label(),
                                "message_type": message.message_type,
                            }),
                        )
                        .await?;
                        self.hub.publish(EngineEvent::ActionCompleted {
                            message_id: message_id.clone(),
                            agent_id: self.agent_id.clone(),
                            outcome: outcome.label().to_owned(),
                        });
                    }
                    Err(err) => {
                        // The store rejected the outcome before mutating
                        // anything; the claim is still live, so the
                        // failure is recorded on the message itself.
                        warn!(message_id = %message_id, %err, "outcome rejected by store");
                        self.fail_message(&message_id, &shipment_id, &err.to_string())
                            .await?;
                    }
                }
            }
            Err(err) => {
                warn!(message_id = %message_id, %err, "handler failed");
                self.fail_message(&message_id, &shipment_id, &err.to_string())
                    .await?;
            }
        }
        Ok(Some(message_id))
    }

    /// Drain the mailbox for this agent's type. Returns how many messages
    /// were processed (acked or failed).
    pub async fn run_until_idle(&self) -> EngineResult<usize> {
        let mut processed = 0;
        while self.poll_once().await?.is_some() {
            processed += 1;
        }
        Ok(processed)
    }

    async fn fail_message(
        &self,
        message_id: &MessageId,
        shipment_id: &Option<ShipmentId>,
        reason: &str,
    ) -> EngineResult<()> {
        self.store.fail(message_id, reason).await?;
        self.record(
            "action_failed",
            message_id,
            shipment_id,
            json!({"reason": reason}),
        )
        .await?;
        self.hub.publish(EngineEvent::ActionFailed {
            message_id: message_id.clone(),
            agent_id: self.agent_id.clone(),
            reason: reason.to_owned(),
        });
        Ok(())
    }

    async fn record(
        &self,
        activity_type: &str,
        message_id: &MessageId,
        shipment_id: &Option<ShipmentId>,
        detail: Value,
    ) -> EngineResult<()> {
        let mut activity = AgentActivity::new(
            self.agent_id.clone(),
            self.handler.kind(),
            activity_type,
            detail,
        )
        .with_message(message_id.clone());
        if let Some(shipment_id) = shipment_id {
            activity = activity.with_shipment(shipment_id.clone());
        }
        self.activity.append(&activity).await
    }
}

/// Shipment fields an outcome may carry. Handlers put a `new_location`
/// and/or a `new_status` into the mitigation detail when their action
/// moved the shipment or changed its status. An unrecognized status
/// string is ignored rather than failing the commit.
fn shipment_update_from(outcome: &ActionOutcome) -> ShipmentUpdate {
    match outcome {
        ActionOutcome::Mitigated { detail, .. } => ShipmentUpdate {
            status: detail
                .get("new_status")
                .and_then(|value| serde_json::from_value(value.clone()).ok()),
            current_location: detail
                .get("new_location")
                .and_then(Value::as_str)
                .map(str::to_owned),
        },
        _ => ShipmentUpdate::default(),
    }
}
