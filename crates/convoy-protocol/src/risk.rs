//! Risk records and their lifecycle state machine.

use crate::ids::{RiskId, ShipmentId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category of detected risk. The set is closed so the routing table stays
/// total; `Other` is the escape hatch for novel detector output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskType {
    PortCongestion,
    CustomsHold,
    QualityHold,
    WeatherImpact,
    EquipmentFailure,
    LaborStrike,
    SecurityIssue,
    RouteBlockage,
    CapacityShortage,
    Other,
}

/// Severity assigned by the detector. Each severity maps to a deterministic
/// contribution to the owning shipment's risk score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskSeverity {
    /// Severity-to-score policy. A shipment's score is the max over its
    /// non-terminal risks, never a sum or average.
    pub fn score(&self) -> u8 {
        match self {
            Self::Low => 25,
            Self::Medium => 50,
            Self::High => 75,
            Self::Critical => 95,
        }
    }
}

/// Risk lifecycle: `OPEN → MITIGATING → RESOLVED`, with `ESCALATED` as a
/// terminal exit from either live state. Terminal risks never reopen; a
/// new risk must be raised instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskStatus {
    Open,
    Mitigating,
    Resolved,
    Escalated,
}

impl RiskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved | Self::Escalated)
    }

    pub fn can_transition_to(&self, next: RiskStatus) -> bool {
        matches!(
            (self, next),
            (Self::Open, RiskStatus::Mitigating)
                | (Self::Open, RiskStatus::Resolved)
                | (Self::Open, RiskStatus::Escalated)
                | (Self::Mitigating, RiskStatus::Resolved)
                | (Self::Mitigating, RiskStatus::Escalated)
        )
    }
}

/// A detected condition threatening on-time or compliant delivery of one
/// shipment. A shipment may carry many concurrent open risks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Risk {
    pub risk_id: RiskId,
    pub shipment_id: ShipmentId,
    pub risk_type: RiskType,
    pub severity: RiskSeverity,
    pub status: RiskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub detected_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Risk {
    pub fn new(shipment_id: ShipmentId, risk_type: RiskType, severity: RiskSeverity) -> Self {
        Self {
            risk_id: RiskId::new_uuid(),
            shipment_id,
            risk_type,
            severity,
            status: RiskStatus::Open,
            description: None,
            detected_at: Utc::now(),
            resolved_at: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}
