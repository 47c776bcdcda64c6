use std::collections::{BTreeMap, HashMap};

use chrono::{NaiveDate, Utc};
use convoy_protocol::{
    ActionOutcome, AgentKind, AgentMessage, AnalyticsView, DashboardSnapshot, EngineError,
    EngineResult, EnqueueRequest, MessageId, MessageStatus, Risk, RiskId, RiskSeverity,
    RiskStatus, Shipment, ShipmentEvent, ShipmentId, ShipmentRiskSummary, ShipmentUpdate,
    TowerStore,
};
use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, instrument, warn};

/// Attempts before giving up on generating a unique message id. With a
/// random UUID suffix a second collision is not realistically reachable,
/// but the contract stays explicit rather than looping forever.
const MESSAGE_ID_ATTEMPTS: u32 = 8;

#[derive(Debug, Default)]
struct TowerState {
    shipments: HashMap<ShipmentId, Shipment>,
    /// Lowercased tracking number → shipment id.
    tracking_index: HashMap<String, ShipmentId>,
    events: HashMap<ShipmentId, Vec<ShipmentEvent>>,
    risks: HashMap<RiskId, Risk>,
    risks_by_shipment: HashMap<ShipmentId, Vec<RiskId>>,
    /// Insertion order doubles as enqueue order, which gives FIFO claims
    /// per recipient without a separate queue structure.
    messages: IndexMap<MessageId, AgentMessage>,
    snapshots: BTreeMap<NaiveDate, DashboardSnapshot>,
}

impl TowerState {
    fn shipment_mut(&mut self, shipment_id: &ShipmentId) -> EngineResult<&mut Shipment> {
        self.shipments
            .get_mut(shipment_id)
            .ok_or_else(|| EngineError::NotFound(format!("shipment {shipment_id}")))
    }

    fn enqueue_locked(&mut self, request: EnqueueRequest) -> EngineResult<MessageId> {
        if let Some(message_id) = &request.message_id
            && self.messages.contains_key(message_id)
        {
            debug!(message_id = %message_id, "enqueue is a no-op, id already present");
            return Ok(message_id.clone());
        }
        let message_id = self.reserve_message_id(&request)?;
        self.insert_message(message_id.clone(), &request);
        Ok(message_id)
    }

    /// Resolve the id a request will enqueue under without inserting
    /// anything, so composite writes can settle the id during their
    /// validation phase. A caller-supplied id that already exists is a
    /// `Conflict` here; the idempotent no-op path lives in
    /// `enqueue_locked`.
    fn reserve_message_id(&self, request: &EnqueueRequest) -> EngineResult<MessageId> {
        if let Some(message_id) = &request.message_id {
            if self.messages.contains_key(message_id) {
                return Err(EngineError::Conflict(format!(
                    "message {message_id} already enqueued"
                )));
            }
            return Ok(message_id.clone());
        }

        for _ in 0..MESSAGE_ID_ATTEMPTS {
            let message_id = MessageId::generate(Utc::now());
            if self.messages.contains_key(&message_id) {
                warn!(message_id = %message_id, "generated message id collided, retrying");
                continue;
            }
            return Ok(message_id);
        }
        Err(EngineError::QueueExhausted {
            attempts: MESSAGE_ID_ATTEMPTS,
        })
    }

    fn insert_message(&mut self, message_id: MessageId, request: &EnqueueRequest) {
        let message = AgentMessage {
            message_id: message_id.clone(),
            sender: request.sender.clone(),
            recipient: request.recipient,
            message_type: request.message_type.clone(),
            content: request.content.clone(),
            status: MessageStatus::Pending,
            enqueued_at: Utc::now(),
            processed_at: None,
            result: None,
            failure_reason: None,
        };
        self.messages.insert(message_id, message);
    }

    fn message_mut(&mut self, message_id: &MessageId) -> EngineResult<&mut AgentMessage> {
        self.messages
            .get_mut(message_id)
            .ok_or_else(|| EngineError::NotFound(format!("message {message_id}")))
    }

    fn claimed_message_mut(&mut self, message_id: &MessageId) -> EngineResult<&mut AgentMessage> {
        let message = self.message_mut(message_id)?;
        if message.status != MessageStatus::Claimed {
            return Err(EngineError::Conflict(format!(
                "message {message_id} is {:?}, expected claimed",
                message.status
            )));
        }
        Ok(message)
    }

    fn apply_shipment_update(&mut self, shipment_id: &ShipmentId, update: ShipmentUpdate) {
        if let Some(shipment) = self.shipments.get_mut(shipment_id) {
            if let Some(status) = update.status {
                shipment.status = status;
            }
            if let Some(location) = update.current_location {
                shipment.current_location = Some(location);
            }
            shipment.updated_at = Utc::now();
        }
    }

    /// Recompute the derived `is_at_risk`/`risk_score` fields from the
    /// shipment's non-terminal risks (max-score policy).
    fn recompute_shipment_risk(&mut self, shipment_id: &ShipmentId) {
        let live_max = self
            .risks_by_shipment
            .get(shipment_id)
            .into_iter()
            .flatten()
            .filter_map(|risk_id| self.risks.get(risk_id))
            .filter(|risk| !risk.status.is_terminal())
            .map(|risk| risk.severity.score())
            .max();

        if let Some(shipment) = self.shipments.get_mut(shipment_id) {
            shipment.is_at_risk = live_max.is_some();
            shipment.risk_score = live_max.unwrap_or(0);
            shipment.updated_at = Utc::now();
        }
    }
}

/// In-memory implementation of [`TowerStore`].
///
/// One mutex guards every table. Composite operations validate all their
/// preconditions first and mutate only afterwards, so a failed call leaves
/// no partial state; and because the lock spans the whole call, concurrent
/// claimers or risk-raises on the same shipment serialize instead of
/// racing read-then-update.
#[derive(Debug, Default)]
pub struct InMemoryTowerStore {
    state: Mutex<TowerState>,
}

impl InMemoryTowerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TowerStore for InMemoryTowerStore {
    #[instrument(skip(self, shipment), fields(tracking = %shipment.tracking_number))]
    async fn register_shipment(&self, shipment: Shipment) -> EngineResult<Shipment> {
        let mut state = self.state.lock();
        let tracking_key = shipment.tracking_number.to_lowercase();
        if state.tracking_index.contains_key(&tracking_key) {
            return Err(EngineError::Conflict(format!(
                "tracking number {} already registered",
                shipment.tracking_number
            )));
        }
        state
            .tracking_index
            .insert(tracking_key, shipment.shipment_id.clone());
        state
            .shipments
            .insert(shipment.shipment_id.clone(), shipment.clone());
        debug!(shipment_id = %shipment.shipment_id, "shipment registered");
        Ok(shipment)
    }

    async fn shipment(&self, shipment_id: &ShipmentId) -> EngineResult<Shipment> {
        let state = self.state.lock();
        state
            .shipments
            .get(shipment_id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("shipment {shipment_id}")))
    }

    async fn shipment_by_tracking(&self, tracking_number: &str) -> EngineResult<Shipment> {
        let state = self.state.lock();
        state
            .tracking_index
            .get(&tracking_number.to_lowercase())
            .and_then(|id| state.shipments.get(id))
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("tracking number {tracking_number}")))
    }

    async fn list_shipments(&self) -> EngineResult<Vec<Shipment>> {
        let state = self.state.lock();
        Ok(state.shipments.values().cloned().collect())
    }

    #[instrument(skip(self, update), fields(shipment_id = %shipment_id))]
    async fn update_shipment(
        &self,
        shipment_id: &ShipmentId,
        update: ShipmentUpdate,
    ) -> EngineResult<Shipment> {
        let mut state = self.state.lock();
        state.shipment_mut(shipment_id)?;
        state.apply_shipment_update(shipment_id, update);
        Ok(state.shipments[shipment_id].clone())
    }

    async fn append_shipment_event(&self, event: ShipmentEvent) -> EngineResult<()> {
        let mut state = self.state.lock();
        state.shipment_mut(&event.shipment_id)?;
        state
            .events
            .entry(event.shipment_id.clone())
            .or_default()
            .push(event);
        Ok(())
    }

    async fn shipment_events(&self, shipment_id: &ShipmentId) -> EngineResult<Vec<ShipmentEvent>> {
        let state = self.state.lock();
        Ok(state.events.get(shipment_id).cloned().unwrap_or_default())
    }

    async fn risk(&self, risk_id: &RiskId) -> EngineResult<Risk> {
        let state = self.state.lock();
        state
            .risks
            .get(risk_id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("risk {risk_id}")))
    }

    async fn risks_for_shipment(&self, shipment_id: &ShipmentId) -> EngineResult<Vec<Risk>> {
        let state = self.state.lock();
        Ok(state
            .risks_by_shipment
            .get(shipment_id)
            .into_iter()
            .flatten()
            .filter_map(|risk_id| state.risks.get(risk_id))
            .cloned()
            .collect())
    }

    #[instrument(
        skip(self, risk, request),
        fields(shipment_id = %risk.shipment_id, risk_type = ?risk.risk_type, severity = ?risk.severity)
    )]
    async fn insert_risk_with_message(
        &self,
        risk: Risk,
        request: EnqueueRequest,
    ) -> EngineResult<(RiskId, MessageId)> {
        let mut state = self.state.lock();

        // Validate everything, the message id included, before touching
        // any table. A duplicate caller-supplied id must reject here: the
        // plain-enqueue no-op semantics would commit the risk while
        // pairing it with a message that never references it.
        if !state.shipments.contains_key(&risk.shipment_id) {
            return Err(EngineError::NotFound(format!(
                "shipment {}",
                risk.shipment_id
            )));
        }
        if state.risks.contains_key(&risk.risk_id) {
            return Err(EngineError::Conflict(format!(
                "risk {} already exists",
                risk.risk_id
            )));
        }
        let message_id = state.reserve_message_id(&request)?;

        let risk_id = risk.risk_id.clone();
        let shipment_id = risk.shipment_id.clone();
        let severity = risk.severity;

        state.risks.insert(risk_id.clone(), risk);
        state
            .risks_by_shipment
            .entry(shipment_id.clone())
            .or_default()
            .push(risk_id.clone());

        let now = Utc::now();
        {
            let shipment = state.shipment_mut(&shipment_id)?;
            shipment.is_at_risk = true;
            shipment.risk_score = shipment.risk_score.max(severity.score());
            shipment.last_risk_check = Some(now);
            shipment.updated_at = now;
        }

        state.insert_message(message_id.clone(), &request);
        debug!(risk_id = %risk_id, message_id = %message_id, "risk and message committed");
        Ok((risk_id, message_id))
    }

    #[instrument(skip(self, request), fields(recipient = %request.recipient, message_type = %request.message_type))]
    async fn enqueue(&self, request: EnqueueRequest) -> EngineResult<MessageId> {
        let mut state = self.state.lock();
        state.enqueue_locked(request)
    }

    #[instrument(skip(self), fields(recipient = %recipient))]
    async fn claim(&self, recipient: AgentKind) -> EngineResult<Option<AgentMessage>> {
        let mut state = self.state.lock();
        let claimed = state
            .messages
            .values_mut()
            .find(|message| {
                message.status == MessageStatus::Pending && message.recipient == recipient
            })
            .map(|message| {
                message.status = MessageStatus::Claimed;
                message.clone()
            });
        if let Some(message) = &claimed {
            debug!(message_id = %message.message_id, "message claimed");
        }
        Ok(claimed)
    }

    #[instrument(skip(self, result), fields(message_id = %message_id))]
    async fn ack(&self, message_id: &MessageId, result: Value) -> EngineResult<AgentMessage> {
        let mut state = self.state.lock();
        let message = state.claimed_message_mut(message_id)?;
        message.status = MessageStatus::Processed;
        message.processed_at = Some(Utc::now());
        message.result = Some(result);
        Ok(message.clone())
    }

    #[instrument(skip(self), fields(message_id = %message_id))]
    async fn fail(&self, message_id: &MessageId, reason: &str) -> EngineResult<AgentMessage> {
        let mut state = self.state.lock();
        let message = state.claimed_message_mut(message_id)?;
        message.status = MessageStatus::Failed;
        message.processed_at = Some(Utc::now());
        message.failure_reason = Some(reason.to_owned());
        Ok(message.clone())
    }

    async fn message(&self, message_id: &MessageId) -> EngineResult<AgentMessage> {
        let state = self.state.lock();
        state
            .messages
            .get(message_id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("message {message_id}")))
    }

    #[instrument(skip(self, outcome, update), fields(message_id = %message_id, risk_id = %risk_id))]
    async fn apply_outcome(
        &self,
        message_id: &MessageId,
        risk_id: &RiskId,
        outcome: &ActionOutcome,
        update: ShipmentUpdate,
    ) -> EngineResult<AgentMessage> {
        let mut state = self.state.lock();

        // Validation phase: nothing below may mutate until every check
        // passed, otherwise a rejected outcome would leave partial state.
        {
            let message = state
                .messages
                .get(message_id)
                .ok_or_else(|| EngineError::NotFound(format!("message {message_id}")))?;
            if message.status != MessageStatus::Claimed {
                return Err(EngineError::Conflict(format!(
                    "message {message_id} is {:?}, expected claimed",
                    message.status
                )));
            }
        }
        let (current_status, shipment_id) = {
            let risk = state
                .risks
                .get(risk_id)
                .ok_or_else(|| EngineError::NotFound(format!("risk {risk_id}")))?;
            (risk.status, risk.shipment_id.clone())
        };
        if !state.shipments.contains_key(&shipment_id) {
            return Err(EngineError::NotFound(format!("shipment {shipment_id}")));
        }
        if let Some(target) = outcome.target_status()
            && !current_status.can_transition_to(target)
        {
            return Err(EngineError::IntegrityViolation(format!(
                "risk {risk_id} cannot transition {current_status:?} -> {target:?}"
            )));
        }

        // Mutation phase.
        let now = Utc::now();
        if let Some(target) = outcome.target_status()
            && let Some(risk) = state.risks.get_mut(risk_id)
        {
            risk.status = target;
            if target == RiskStatus::Resolved {
                risk.resolved_at = Some(now);
            }
        }
        state.recompute_shipment_risk(&shipment_id);
        if !update.is_empty() {
            state.apply_shipment_update(&shipment_id, update);
        }

        let event_type = match outcome {
            ActionOutcome::Mitigated { .. } => "action_executed",
            ActionOutcome::Escalated { .. } => "risk_escalated",
            ActionOutcome::NoAction { .. } => "action_skipped",
        };
        state
            .events
            .entry(shipment_id.clone())
            .or_default()
            .push(ShipmentEvent::new(shipment_id, event_type));

        let result = serde_json::to_value(outcome)?;
        let message = state.claimed_message_mut(message_id)?;
        message.status = MessageStatus::Processed;
        message.processed_at = Some(now);
        message.result = Some(result);
        debug!("outcome applied and message acked");
        Ok(message.clone())
    }

    async fn export_for_analytics(&self) -> EngineResult<AnalyticsView> {
        let state = self.state.lock();
        Ok(AnalyticsView {
            shipments: state.shipments.values().cloned().collect(),
            risks: state.risks.values().cloned().collect(),
        })
    }

    async fn upsert_snapshots(&self, rows: Vec<DashboardSnapshot>) -> EngineResult<()> {
        let mut state = self.state.lock();
        for row in rows {
            state.snapshots.insert(row.snapshot_date, row);
        }
        Ok(())
    }

    async fn snapshots(&self) -> EngineResult<Vec<DashboardSnapshot>> {
        let state = self.state.lock();
        Ok(state.snapshots.values().cloned().collect())
    }

    async fn risk_summary(&self, shipment_id: &ShipmentId) -> EngineResult<ShipmentRiskSummary> {
        let state = self.state.lock();
        let shipment = state
            .shipments
            .get(shipment_id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("shipment {shipment_id}")))?;
        let risks: Vec<Risk> = state
            .risks_by_shipment
            .get(shipment_id)
            .into_iter()
            .flatten()
            .filter_map(|risk_id| state.risks.get(risk_id))
            .cloned()
            .collect();

        let open_risks = risks
            .iter()
            .filter(|risk| risk.status == RiskStatus::Open)
            .count();
        let mitigating_risks = risks
            .iter()
            .filter(|risk| risk.status == RiskStatus::Mitigating)
            .count();
        let mut counts_by_severity = Vec::new();
        for severity in [
            RiskSeverity::Low,
            RiskSeverity::Medium,
            RiskSeverity::High,
            RiskSeverity::Critical,
        ] {
            let count = risks
                .iter()
                .filter(|risk| risk.severity == severity && !risk.status.is_terminal())
                .count();
            if count > 0 {
                counts_by_severity.push((severity, count));
            }
        }

        Ok(ShipmentRiskSummary {
            shipment,
            open_risks,
            mitigating_risks,
            counts_by_severity,
            risks,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::Result;
    use convoy_protocol::{
        ActionOutcome, AgentKind, EngineError, EnqueueRequest, MessageId, MessageStatus, Risk,
        RiskResolution, RiskSeverity, RiskStatus, RiskType, Shipment, ShipmentStatus,
        ShipmentUpdate, TowerStore,
    };
    use serde_json::json;

    use crate::InMemoryTowerStore;

    fn request_for(recipient: AgentKind) -> EnqueueRequest {
        EnqueueRequest::new(
            "risk-detector",
            recipient,
            "risk_detected",
            json!({"queue_length": 38}),
        )
    }

    async fn seeded_shipment(store: &InMemoryTowerStore, tracking: &str) -> Shipment {
        store
            .register_shipment(Shipment::new(tracking, "Shanghai", "Rotterdam"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn enqueue_claim_ack_roundtrip() -> Result<()> {
        let store = InMemoryTowerStore::new();
        let message_id = store.enqueue(request_for(AgentKind::RoutingAgent)).await?;

        let claimed = store.claim(AgentKind::RoutingAgent).await?.unwrap();
        assert_eq!(claimed.message_id, message_id);
        assert_eq!(claimed.status, MessageStatus::Claimed);

        let acked = store.ack(&message_id, json!({"ok": true})).await?;
        assert_eq!(acked.status, MessageStatus::Processed);
        assert!(acked.processed_at.is_some());
        assert_eq!(acked.result, Some(json!({"ok": true})));
        Ok(())
    }

    #[tokio::test]
    async fn claim_returns_none_when_queue_is_empty() -> Result<()> {
        let store = InMemoryTowerStore::new();
        assert!(store.claim(AgentKind::CustomsAgent).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn claim_is_exclusive_under_concurrent_claimers() -> Result<()> {
        let store = Arc::new(InMemoryTowerStore::new());
        store
            .enqueue(request_for(AgentKind::RoutingAgent).with_message_id("msg_1".into()))
            .await?;

        let a = {
            let store = store.clone();
            tokio::spawn(async move { store.claim(AgentKind::RoutingAgent).await })
        };
        let b = {
            let store = store.clone();
            tokio::spawn(async move { store.claim(AgentKind::RoutingAgent).await })
        };

        let first = a.await??;
        let second = b.await??;
        let winners = [&first, &second]
            .iter()
            .filter(|claim| claim.is_some())
            .count();
        assert_eq!(winners, 1, "exactly one claimer must win");
        let winner = first.or(second).unwrap();
        assert_eq!(winner.message_id, MessageId::from_string("msg_1"));
        Ok(())
    }

    #[tokio::test]
    async fn claims_are_fifo_per_recipient() -> Result<()> {
        let store = InMemoryTowerStore::new();
        let first = store.enqueue(request_for(AgentKind::RoutingAgent)).await?;
        let interleaved = store.enqueue(request_for(AgentKind::CustomsAgent)).await?;
        let second = store.enqueue(request_for(AgentKind::RoutingAgent)).await?;

        let claim1 = store.claim(AgentKind::RoutingAgent).await?.unwrap();
        let claim2 = store.claim(AgentKind::RoutingAgent).await?.unwrap();
        assert_eq!(claim1.message_id, first);
        assert_eq!(claim2.message_id, second);

        let customs = store.claim(AgentKind::CustomsAgent).await?.unwrap();
        assert_eq!(customs.message_id, interleaved);
        Ok(())
    }

    #[tokio::test]
    async fn ack_rejects_message_not_claimed() -> Result<()> {
        let store = InMemoryTowerStore::new();
        let message_id = store.enqueue(request_for(AgentKind::RoutingAgent)).await?;

        let err = store.ack(&message_id, json!({})).await.unwrap_err();
        assert!(matches!(err, EngineError::Conflict(_)));
        Ok(())
    }

    #[tokio::test]
    async fn terminal_messages_never_transition_again() -> Result<()> {
        let store = InMemoryTowerStore::new();
        let message_id = store.enqueue(request_for(AgentKind::RoutingAgent)).await?;
        store.claim(AgentKind::RoutingAgent).await?;
        store.ack(&message_id, json!({})).await?;

        let double_ack = store.ack(&message_id, json!({})).await.unwrap_err();
        assert!(matches!(double_ack, EngineError::Conflict(_)));
        let late_fail = store.fail(&message_id, "too late").await.unwrap_err();
        assert!(matches!(late_fail, EngineError::Conflict(_)));

        let message = store.message(&message_id).await?;
        assert_eq!(message.status, MessageStatus::Processed);
        Ok(())
    }

    #[tokio::test]
    async fn fail_records_reason_and_is_terminal() -> Result<()> {
        let store = InMemoryTowerStore::new();
        let message_id = store.enqueue(request_for(AgentKind::CustomsAgent)).await?;
        store.claim(AgentKind::CustomsAgent).await?;

        let failed = store.fail(&message_id, "timeout").await?;
        assert_eq!(failed.status, MessageStatus::Failed);
        assert_eq!(failed.failure_reason.as_deref(), Some("timeout"));

        // Failed messages are never re-delivered.
        assert!(store.claim(AgentKind::CustomsAgent).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn enqueue_is_idempotent_for_caller_supplied_id() -> Result<()> {
        let store = InMemoryTowerStore::new();
        let request = request_for(AgentKind::RoutingAgent).with_message_id("msg_1".into());
        let first = store.enqueue(request.clone()).await?;
        let second = store.enqueue(request).await?;
        assert_eq!(first, second);

        store.claim(AgentKind::RoutingAgent).await?.unwrap();
        assert!(
            store.claim(AgentKind::RoutingAgent).await?.is_none(),
            "re-enqueue must not create a duplicate row"
        );
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_tracking_number_is_a_conflict() -> Result<()> {
        let store = InMemoryTowerStore::new();
        seeded_shipment(&store, "MAEU-1001").await;
        let err = store
            .register_shipment(Shipment::new("maeu-1001", "Ningbo", "Hamburg"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Conflict(_)));
        Ok(())
    }

    #[tokio::test]
    async fn tracking_lookup_is_case_insensitive() -> Result<()> {
        let store = InMemoryTowerStore::new();
        let shipment = seeded_shipment(&store, "MAEU-1001").await;
        let found = store.shipment_by_tracking("maeu-1001").await?;
        assert_eq!(found.shipment_id, shipment.shipment_id);
        Ok(())
    }

    #[tokio::test]
    async fn risk_insert_for_unknown_shipment_commits_nothing() -> Result<()> {
        let store = InMemoryTowerStore::new();
        let risk = Risk::new("ghost".into(), RiskType::CustomsHold, RiskSeverity::High);
        let err = store
            .insert_risk_with_message(risk, request_for(AgentKind::CustomsAgent))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));

        // Neither half of the composite may be visible.
        assert!(store.claim(AgentKind::CustomsAgent).await?.is_none());
        assert!(store.export_for_analytics().await?.risks.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn risk_insert_rejects_duplicate_message_id_without_mutation() -> Result<()> {
        let store = InMemoryTowerStore::new();
        let shipment = seeded_shipment(&store, "MAEU-2002").await;
        let prior = EnqueueRequest::new(
            "risk-detector",
            AgentKind::CustomsAgent,
            "risk_detected",
            json!({"prior": true}),
        )
        .with_message_id("msg_dup".into());
        store.enqueue(prior).await?;

        let risk = Risk::new(
            shipment.shipment_id.clone(),
            RiskType::CustomsHold,
            RiskSeverity::High,
        );
        let err = store
            .insert_risk_with_message(
                risk,
                request_for(AgentKind::CustomsAgent).with_message_id("msg_dup".into()),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Conflict(_)));

        // Neither the risk row nor the shipment mutation may be visible,
        // and the pre-existing message must be untouched.
        assert!(store.export_for_analytics().await?.risks.is_empty());
        let after = store.shipment(&shipment.shipment_id).await?;
        assert!(!after.is_at_risk);
        assert_eq!(after.risk_score, 0);
        let existing = store.message(&MessageId::from_string("msg_dup")).await?;
        assert_eq!(existing.content, json!({"prior": true}));
        Ok(())
    }

    #[tokio::test]
    async fn risk_insert_applies_max_score_policy() -> Result<()> {
        let store = InMemoryTowerStore::new();
        let shipment = seeded_shipment(&store, "MAEU-2001").await;

        let medium = Risk::new(
            shipment.shipment_id.clone(),
            RiskType::PortCongestion,
            RiskSeverity::Medium,
        );
        store
            .insert_risk_with_message(medium, request_for(AgentKind::RoutingAgent))
            .await?;
        let after_medium = store.shipment(&shipment.shipment_id).await?;
        assert_eq!(after_medium.risk_score, 50);
        assert!(after_medium.is_at_risk);
        assert!(after_medium.last_risk_check.is_some());

        let critical = Risk::new(
            shipment.shipment_id.clone(),
            RiskType::WeatherImpact,
            RiskSeverity::Critical,
        );
        store
            .insert_risk_with_message(critical, request_for(AgentKind::RoutingAgent))
            .await?;
        let after_critical = store.shipment(&shipment.shipment_id).await?;
        assert_eq!(after_critical.risk_score, 95, "max policy, not a sum");
        Ok(())
    }

    #[tokio::test]
    async fn apply_outcome_resolves_risk_and_clears_shipment() -> Result<()> {
        let store = InMemoryTowerStore::new();
        let shipment = seeded_shipment(&store, "MAEU-3001").await;
        let risk = Risk::new(
            shipment.shipment_id.clone(),
            RiskType::PortCongestion,
            RiskSeverity::High,
        );
        let (risk_id, message_id) = store
            .insert_risk_with_message(risk, request_for(AgentKind::RoutingAgent))
            .await?;
        store.claim(AgentKind::RoutingAgent).await?.unwrap();

        let outcome = ActionOutcome::Mitigated {
            resolution: RiskResolution::Resolved,
            detail: json!({"action": "reroute"}),
        };
        let update = ShipmentUpdate {
            status: Some(ShipmentStatus::InTransit),
            current_location: Some("Suez".into()),
        };
        let message = store
            .apply_outcome(&message_id, &risk_id, &outcome, update)
            .await?;
        assert_eq!(message.status, MessageStatus::Processed);

        let resolved = store.risk(&risk_id).await?;
        assert_eq!(resolved.status, RiskStatus::Resolved);
        assert!(resolved.resolved_at.is_some());

        let after = store.shipment(&shipment.shipment_id).await?;
        assert!(!after.is_at_risk);
        assert_eq!(after.risk_score, 0);
        assert_eq!(after.status, ShipmentStatus::InTransit);
        assert_eq!(after.current_location.as_deref(), Some("Suez"));

        let events = store.shipment_events(&shipment.shipment_id).await?;
        assert!(events.iter().any(|e| e.event_type == "action_executed"));
        Ok(())
    }

    #[tokio::test]
    async fn apply_outcome_keeps_score_of_remaining_risks() -> Result<()> {
        let store = InMemoryTowerStore::new();
        let shipment = seeded_shipment(&store, "MAEU-3002").await;

        let high = Risk::new(
            shipment.shipment_id.clone(),
            RiskType::CustomsHold,
            RiskSeverity::High,
        );
        let (high_id, high_msg) = store
            .insert_risk_with_message(high, request_for(AgentKind::CustomsAgent))
            .await?;
        let low = Risk::new(
            shipment.shipment_id.clone(),
            RiskType::Other,
            RiskSeverity::Low,
        );
        store
            .insert_risk_with_message(low, request_for(AgentKind::NotificationAgent))
            .await?;

        store.claim(AgentKind::CustomsAgent).await?.unwrap();
        let outcome = ActionOutcome::Mitigated {
            resolution: RiskResolution::Resolved,
            detail: json!({}),
        };
        store
            .apply_outcome(&high_msg, &high_id, &outcome, ShipmentUpdate::default())
            .await?;

        let after = store.shipment(&shipment.shipment_id).await?;
        assert!(after.is_at_risk, "the low risk is still live");
        assert_eq!(after.risk_score, 25);
        Ok(())
    }

    #[tokio::test]
    async fn apply_outcome_rejects_illegal_transition_without_mutation() -> Result<()> {
        let store = InMemoryTowerStore::new();
        let shipment = seeded_shipment(&store, "MAEU-3003").await;
        let risk = Risk::new(
            shipment.shipment_id.clone(),
            RiskType::QualityHold,
            RiskSeverity::Medium,
        );
        let (risk_id, first_msg) = store
            .insert_risk_with_message(risk, request_for(AgentKind::CustomsAgent))
            .await?;

        store.claim(AgentKind::CustomsAgent).await?.unwrap();
        let resolve = ActionOutcome::Mitigated {
            resolution: RiskResolution::Resolved,
            detail: json!({}),
        };
        store
            .apply_outcome(&first_msg, &risk_id, &resolve, ShipmentUpdate::default())
            .await?;

        // A second message against the now-resolved risk must be rejected
        // and must leave the claimed message claimed.
        let second_msg = store
            .enqueue(request_for(AgentKind::CustomsAgent))
            .await?;
        store.claim(AgentKind::CustomsAgent).await?.unwrap();
        let reopen = ActionOutcome::Mitigated {
            resolution: RiskResolution::Mitigating,
            detail: json!({}),
        };
        let err = store
            .apply_outcome(&second_msg, &risk_id, &reopen, ShipmentUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::IntegrityViolation(_)));

        let message = store.message(&second_msg).await?;
        assert_eq!(message.status, MessageStatus::Claimed);
        let risk_after = store.risk(&risk_id).await?;
        assert_eq!(risk_after.status, RiskStatus::Resolved);
        Ok(())
    }

    #[tokio::test]
    async fn apply_outcome_no_action_leaves_risk_open() -> Result<()> {
        let store = InMemoryTowerStore::new();
        let shipment = seeded_shipment(&store, "MAEU-3004").await;
        let risk = Risk::new(
            shipment.shipment_id.clone(),
            RiskType::LaborStrike,
            RiskSeverity::Medium,
        );
        let (risk_id, message_id) = store
            .insert_risk_with_message(risk, request_for(AgentKind::NotificationAgent))
            .await?;
        store.claim(AgentKind::NotificationAgent).await?.unwrap();

        let outcome = ActionOutcome::NoAction {
            reason: "stakeholders notified".into(),
        };
        store
            .apply_outcome(&message_id, &risk_id, &outcome, ShipmentUpdate::default())
            .await?;

        let risk_after = store.risk(&risk_id).await?;
        assert_eq!(risk_after.status, RiskStatus::Open);
        let after = store.shipment(&shipment.shipment_id).await?;
        assert!(after.is_at_risk, "risk never auto-clears without mitigation");
        Ok(())
    }

    #[tokio::test]
    async fn risk_summary_counts_live_risks() -> Result<()> {
        let store = InMemoryTowerStore::new();
        let shipment = seeded_shipment(&store, "MAEU-4001").await;
        for severity in [RiskSeverity::High, RiskSeverity::High, RiskSeverity::Low] {
            let risk = Risk::new(shipment.shipment_id.clone(), RiskType::Other, severity);
            store
                .insert_risk_with_message(risk, request_for(AgentKind::NotificationAgent))
                .await?;
        }

        let summary = store.risk_summary(&shipment.shipment_id).await?;
        assert_eq!(summary.open_risks, 3);
        assert_eq!(summary.mitigating_risks, 0);
        assert!(
            summary
                .counts_by_severity
                .contains(&(RiskSeverity::High, 2))
        );
        Ok(())
    }

    #[tokio::test]
    async fn snapshot_upsert_replaces_rows_per_day() -> Result<()> {
        use chrono::{NaiveDate, Utc};
        use convoy_protocol::DashboardSnapshot;

        let store = InMemoryTowerStore::new();
        let day = NaiveDate::from_ymd_opt(2026, 8, 29).unwrap();
        let row = |total| DashboardSnapshot {
            snapshot_date: day,
            total_shipments: total,
            at_risk_shipments: 0,
            total_risks: 0,
            critical_risks: 0,
            high_risks: 0,
            average_risk_score: 0.0,
            refreshed_at: Utc::now(),
        };

        store.upsert_snapshots(vec![row(1)]).await?;
        store.upsert_snapshots(vec![row(2)]).await?;

        let rows = store.snapshots().await?;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].total_shipments, 2, "latest row per day wins");
        Ok(())
    }
}
