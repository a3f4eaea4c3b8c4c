//! conveyor-producer
//!
//! 2 秒ごとにランダムなタスクを生成して topic に publish する。
//! SIGINT / SIGTERM で次の iteration の前に止まる。

use std::process::ExitCode;

use anyhow::Context;
use conveyor_core::app::{BrokerConnector, ProducerLoop, ShutdownCoordinator};
use conveyor_core::config::PipelineConfig;
use conveyor_core::domain::TaskGenerator;
use conveyor_core::domain::state::FATAL_EXIT_CODE;
use conveyor_core::impls::KafkaConnector;
use conveyor_core::observability::init_tracing;
use conveyor_core::ports::SystemClock;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => {
            // tracing 初期化前に失敗することもある
            eprintln!("conveyor-producer: {err:#}");
            ExitCode::from(FATAL_EXIT_CODE)
        }
    }
}

async fn run() -> anyhow::Result<ExitCode> {
    let config = PipelineConfig::load().context("loading configuration")?;
    init_tracing(&config.log).context("installing tracing subscriber")?;

    info!(
        brokers = ?config.broker.brokers,
        topic = %config.broker.topic,
        partition = config.broker.partition,
        "starting producer"
    );

    let shutdown = ShutdownCoordinator::new();
    shutdown.spawn_signal_listener();

    let connector = BrokerConnector::new(
        KafkaConnector::new(&config.broker),
        config.broker.connect_policy(),
        config.broker.publish_policy(),
    );
    let generator = match config.producer.seed {
        Some(seed) => TaskGenerator::seeded(seed, SystemClock),
        None => TaskGenerator::from_entropy(SystemClock),
    };

    let producer = ProducerLoop::new(
        connector,
        generator,
        config.producer.settings(),
        shutdown.signal(),
    );

    match producer.run().await {
        Ok(counts) => {
            info!(
                published = counts.published,
                publish_failures = counts.publish_failures,
                reconnects = counts.reconnects,
                "producer stopped"
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            error!(error = %err, "producer failed");
            Ok(ExitCode::from(FATAL_EXIT_CODE))
        }
    }
}
