//! conveyor-worker
//!
//! topic を購読し、タスクごとに SimulatedWork を並行実行する。
//! SIGINT / SIGTERM で drain に入り、期限切れなら非ゼロで終了する。

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use conveyor_core::app::{BrokerConnector, ShutdownCoordinator, WorkerLoop};
use conveyor_core::config::PipelineConfig;
use conveyor_core::domain::state::FATAL_EXIT_CODE;
use conveyor_core::impls::{KafkaConnector, SimulatedWork};
use conveyor_core::observability::init_tracing;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("conveyor-worker: {err:#}");
            ExitCode::from(FATAL_EXIT_CODE)
        }
    }
}

fn host_identity() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .unwrap_or_else(|| "worker".to_string())
}

async fn run() -> anyhow::Result<ExitCode> {
    let config = PipelineConfig::load().context("loading configuration")?;
    init_tracing(&config.log).context("installing tracing subscriber")?;

    let settings = config.worker.settings(&host_identity());
    info!(
        worker = %settings.worker_id,
        brokers = ?config.broker.brokers,
        topic = %config.broker.topic,
        partition = config.broker.partition,
        dispatch = ?settings.dispatch,
        "starting worker"
    );

    let shutdown = ShutdownCoordinator::new();
    shutdown.spawn_signal_listener();

    let connector = BrokerConnector::new(
        KafkaConnector::new(&config.broker),
        config.broker.connect_policy(),
        config.broker.publish_policy(),
    );
    let handler = Arc::new(SimulatedWork::new(
        settings.worker_id.clone(),
        config.worker.work_delay(),
    ));

    let worker = WorkerLoop::new(connector, handler, settings, shutdown.signal());

    match worker.run().await {
        Ok(report) => {
            info!(
                outcome = ?report.outcome,
                received = report.counts.received,
                completed = report.counts.completed,
                malformed = report.counts.malformed,
                "worker stopped"
            );
            Ok(ExitCode::from(report.outcome.exit_code()))
        }
        Err(err) => {
            error!(error = %err, "worker failed");
            Ok(ExitCode::from(FATAL_EXIT_CODE))
        }
    }
}
