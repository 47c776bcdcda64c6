//! Risk-to-agent routing configuration.

use crate::message::AgentKind;
use crate::risk::RiskType;
use std::collections::HashMap;

/// Immutable table mapping each risk type to the agent type responsible
/// for it. Constructed once and handed to the trigger; there is no hidden
/// global lookup and no mutation after construction.
#[derive(Debug, Clone)]
pub struct RiskRouting {
    table: HashMap<RiskType, AgentKind>,
    fallback: AgentKind,
}

impl RiskRouting {
    pub fn new(fallback: AgentKind) -> Self {
        Self {
            table: HashMap::new(),
            fallback,
        }
    }

    /// Builder-style route entry; consumes and returns self so tables are
    /// assembled in one expression at construction time.
    pub fn with_route(mut self, risk_type: RiskType, recipient: AgentKind) -> Self {
        self.table.insert(risk_type, recipient);
        self
    }

    pub fn route(&self, risk_type: RiskType) -> AgentKind {
        self.table.get(&risk_type).copied().unwrap_or(self.fallback)
    }
}

impl Default for RiskRouting {
    /// Routing and blockage risks go to the routing agent, customs and
    /// quality holds to the customs agent, everything else to the
    /// notification agent.
    fn default() -> Self {
        Self::new(AgentKind::NotificationAgent)
            .with_route(RiskType::PortCongestion, AgentKind::RoutingAgent)
            .with_route(RiskType::RouteBlockage, AgentKind::RoutingAgent)
            .with_route(RiskType::WeatherImpact, AgentKind::RoutingAgent)
            .with_route(RiskType::CapacityShortage, AgentKind::RoutingAgent)
            .with_route(RiskType::CustomsHold, AgentKind::CustomsAgent)
            .with_route(RiskType::QualityHold, AgentKind::CustomsAgent)
    }
}
