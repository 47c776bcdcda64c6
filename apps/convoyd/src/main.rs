use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use convoy_engine::{
    ControlTowerBuilder, CustomsExpediteAgent, RerouteAgent, StakeholderNotifyAgent,
};
use convoy_protocol::{RiskSeverity, RiskType, ShipmentStatus, ShipmentUpdate};
use convoy_store::FileActivityLog;
use serde_json::json;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "convoyd")]
#[command(about = "Convoy control tower demo daemon")]
struct Cli {
    #[arg(long, default_value = ".convoy")]
    root: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("info")
        .compact()
        .init();

    let cli = Cli::parse();

    let tower = ControlTowerBuilder::new()
        .activity_log(Arc::new(FileActivityLog::new(&cli.root)))
        .build();

    let mut events = tower.subscribe_events();
    let event_task = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            let rendered = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_owned());
            info!(event = %rendered, "engine.event");
        }
    });

    // Seed a small fleet.
    let congested = tower
        .register_shipment("MAEU-8801", "Shanghai", "Rotterdam")
        .await?;
    let held = tower
        .register_shipment("MSCU-4410", "Ningbo", "Hamburg")
        .await?;
    let exposed = tower
        .register_shipment("CMDU-9923", "Busan", "Antwerp")
        .await?;

    for shipment in [&congested, &held, &exposed] {
        tower
            .update_shipment(
                &shipment.shipment_id,
                ShipmentUpdate {
                    status: Some(ShipmentStatus::InTransit),
                    current_location: Some("South China Sea".into()),
                },
            )
            .await?;
    }

    // Detector submissions.
    tower
        .raise_risk(
            &congested.shipment_id,
            RiskType::PortCongestion,
            RiskSeverity::Medium,
            json!({"queue_length": 38, "port": "Rotterdam"}),
        )
        .await?;
    tower
        .raise_risk(
            &held.shipment_id,
            RiskType::CustomsHold,
            RiskSeverity::High,
            json!({"port": "Hamburg", "reason": "documentation review"}),
        )
        .await?;
    tower
        .raise_risk(
            &exposed.shipment_id,
            RiskType::WeatherImpact,
            RiskSeverity::Critical,
            json!({"system": "typhoon", "basin": "western-pacific"}),
        )
        .await?;

    // One worker per agent type, drained to quiescence.
    let workers = [
        tower.worker("routing-agent-1", Arc::new(RerouteAgent)),
        tower.worker("customs-agent-1", Arc::new(CustomsExpediteAgent)),
        tower.worker("notification-agent-1", Arc::new(StakeholderNotifyAgent)),
    ];
    for worker in &workers {
        let processed = worker.run_until_idle().await?;
        info!(agent = worker.agent_id(), processed, "worker drained");
    }

    let days = tower.refresh_analytics().await?;
    info!(days, "analytics refreshed");

    for shipment in [&congested, &held, &exposed] {
        let summary = tower.risk_summary(&shipment.shipment_id).await?;
        info!(
            tracking = %summary.shipment.tracking_number,
            at_risk = summary.shipment.is_at_risk,
            risk_score = summary.shipment.risk_score,
            open = summary.open_risks,
            mitigating = summary.mitigating_risks,
            "shipment summary"
        );
    }

    if let Some(today) = tower.snapshots().await?.last() {
        info!(
            date = %today.snapshot_date,
            total = today.total_shipments,
            at_risk = today.at_risk_shipments,
            avg_score = today.average_risk_score,
            "dashboard snapshot"
        );
    }

    for activity in tower.recent_activity(16).await? {
        info!(
            agent = %activity.agent_id,
            activity = %activity.activity_type,
            detail = %activity.detail,
            "activity"
        );
    }

    tokio::time::sleep(std::time::Duration::from_millis(150)).await;
    event_task.abort();
    if let Err(error) = event_task.await
        && !error.is_cancelled()
    {
        warn!(%error, "event task stopped");
    }

    Ok(())
}
