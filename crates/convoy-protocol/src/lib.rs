//! # convoy-protocol — Convoy Coordination Protocol
//!
//! This crate defines the shared types, state machines, and trait interfaces
//! that every Convoy component depends on: the durable message queue between
//! agent types, the shipment risk lifecycle, and the analytics contract.
//!
//! It is intentionally dependency-light (no runtime deps like tokio or
//! parking_lot) so it can be used as a pure contract crate.
//!
//! ## Module Overview
//!
//! - [`ids`] — Typed ID wrappers (ShipmentId, RiskId, MessageId, ActivityId)
//! - [`shipment`] — Shipment, ShipmentEvent, ShipmentStatus, ShipmentUpdate
//! - [`risk`] — Risk, RiskType, RiskSeverity, RiskStatus state machine
//! - [`message`] — AgentKind, AgentMessage, MessageStatus, ActionOutcome
//! - [`activity`] — AgentActivity audit records
//! - [`analytics`] — DashboardSnapshot rollup rows
//! - [`routing`] — RiskRouting (risk_type → agent type table)
//! - [`events`] — EngineEvent broadcast taxonomy
//! - [`ports`] — Runtime boundary ports (tower store, activity log)
//! - [`error`] — EngineError, EngineResult

pub mod activity;
pub mod analytics;
pub mod error;
pub mod events;
pub mod ids;
pub mod message;
pub mod ports;
pub mod risk;
pub mod routing;
pub mod shipment;

// Re-export the most commonly used types at the crate root.
pub use activity::AgentActivity;
pub use analytics::DashboardSnapshot;
pub use error::{EngineError, EngineResult};
pub use events::EngineEvent;
pub use ids::{ActivityId, MessageId, RiskId, ShipmentId};
pub use message::{
    ActionOutcome, AgentKind, AgentMessage, EnqueueRequest, MessageStatus, RiskResolution,
};
pub use ports::{ActivityLog, AnalyticsView, ShipmentRiskSummary, TowerStore};
pub use risk::{Risk, RiskSeverity, RiskStatus, RiskType};
pub use routing::RiskRouting;
pub use shipment::{Shipment, ShipmentEvent, ShipmentStatus, ShipmentUpdate};
