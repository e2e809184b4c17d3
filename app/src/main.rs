use settings::Settings;
use tokio::sync::{mpsc, watch};

use crate::coordinator::{CoordinatorRunner, InputBus};
use crate::port::{Command, CommandSink, TracingSink};
use crate::water::WaterBoostRunner;

mod coordinator;
mod core;
mod heating;
pub mod port;
mod pricing;
mod settings;
mod water;

#[tokio::main(flavor = "multi_thread")]
pub async fn main() {
    let settings = Settings::new().expect("Error reading configuration");
    settings
        .monitoring
        .init()
        .expect("Error initializing monitoring");

    // Ingestion adapters publish sensor readings and price updates here. The
    // bus stays owned by main so the coordinator never sees it closed.
    let input_bus = InputBus::new();

    let (command_tx, mut command_rx) = mpsc::channel::<Command>(16);
    let (completed_tx, completed_rx) = watch::channel(None);

    let (coordinator, plan_rx, breach_rx) = CoordinatorRunner::new(
        settings.coordinator_config(),
        input_bus.subscribe(),
        command_tx.clone(),
        completed_rx,
    );

    let water_runner = WaterBoostRunner::new(plan_rx, breach_rx, command_tx, completed_tx);

    let dispatch = async move {
        let sink = TracingSink;
        while let Some(command) = command_rx.recv().await {
            if let Err(e) = sink.dispatch(command).await {
                tracing::error!("Command dispatch failed: {:?}", e);
            }
        }
    };

    tracing::info!("Starting main loop");

    tokio::select!(
        _ = coordinator.run() => {},
        _ = water_runner.run() => {},
        _ = dispatch => {},
    );
}
