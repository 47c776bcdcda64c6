//! Shipment entities and status lifecycle.

use crate::ids::ShipmentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Shipment lifecycle status. Shipments are never deleted; they move to a
/// terminal status instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShipmentStatus {
    Pending,
    InTransit,
    Delayed,
    Delivered,
    Cancelled,
}

impl ShipmentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }
}

/// A tracked shipment. `tracking_number` is a unique, case-insensitive
/// natural key; `is_at_risk` and `risk_score` are derived from the
/// shipment's non-terminal risks and maintained by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shipment {
    pub shipment_id: ShipmentId,
    pub tracking_number: String,
    pub origin: String,
    pub destination: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_location: Option<String>,
    pub status: ShipmentStatus,
    pub is_at_risk: bool,
    pub risk_score: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_risk_check: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Shipment {
    pub fn new(
        tracking_number: impl Into<String>,
        origin: impl Into<String>,
        destination: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            shipment_id: ShipmentId::new_uuid(),
            tracking_number: tracking_number.into(),
            origin: origin.into(),
            destination: destination.into(),
            current_location: None,
            status: ShipmentStatus::Pending,
            is_at_risk: false,
            risk_score: 0,
            last_risk_check: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Immutable, time-ordered record of a shipment state change. Append-only;
/// used for audit and as input to risk heuristics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentEvent {
    pub shipment_id: ShipmentId,
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ShipmentEvent {
    pub fn new(shipment_id: ShipmentId, event_type: impl Into<String>) -> Self {
        Self {
            shipment_id,
            event_type: event_type.into(),
            location: None,
            description: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Partial update applied to a shipment by an agent action. `None` fields
/// are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShipmentUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ShipmentStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_location: Option<String>,
}

impl ShipmentUpdate {
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.current_location.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_shipment_starts_clean() {
        let shipment = Shipment::new("MAEU-1001", "Shanghai", "Rotterdam");
        assert_eq!(shipment.status, ShipmentStatus::Pending);
        assert!(!shipment.is_at_risk);
        assert_eq!(shipment.risk_score, 0);
        assert!(shipment.last_risk_check.is_none());
    }

    #[test]
    fn status_wire_form_is_screaming_snake() {
        let json = serde_json::to_string(&ShipmentStatus::InTransit).unwrap();
        assert_eq!(json, "\"IN_TRANSIT\"");
        let back: ShipmentStatus = serde_json::from_str("\"DELAYED\"").unwrap();
        assert_eq!(back, ShipmentStatus::Delayed);
    }

    #[test]
    fn terminal_statuses() {
        assert!(ShipmentStatus::Delivered.is_terminal());
        assert!(ShipmentStatus::Cancelled.is_terminal());
        assert!(!ShipmentStatus::InTransit.is_terminal());
    }

    #[test]
    fn shipment_serde_roundtrip() {
        let shipment = Shipment::new("maeu-1002", "Ningbo", "Hamburg");
        let json = serde_json::to_string(&shipment).unwrap();
        let back: Shipment = serde_json::from_str(&json).unwrap();
        assert_eq!(back.tracking_number, "maeu-1002");
        assert_eq!(back.shipment_id, shipment.shipment_id);
    }

    #[test]
    fn empty_update_detected() {
        assert!(ShipmentUpdate::default().is_empty());
        let update = ShipmentUpdate {
            current_location: Some("Suez".into()),
            ..Default::default()
        };
        assert!(!update.is_empty());
    }
}
