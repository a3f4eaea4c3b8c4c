//! producer → InMemoryBroker → worker の結合テスト

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use conveyor_core::app::{
    BrokerConnector, ProducerLoop, ProducerSettings, ShutdownCoordinator, WorkerLoop,
    WorkerSettings,
};
use conveyor_core::domain::{DrainOutcome, LoopState, Task, TaskGenerator, codec};
use conveyor_core::impls::{InMemoryBroker, SimulatedWork};
use conveyor_core::ports::{FixedClock, TaskHandler};
use parking_lot::Mutex;
use tokio::time::sleep;

#[derive(Default)]
struct Collect {
    tasks: Mutex<Vec<Task>>,
}

#[async_trait]
impl TaskHandler for Collect {
    async fn handle(&self, task: Task) {
        sleep(Duration::from_millis(500)).await;
        self.tasks.lock().push(task);
    }
}

fn clock() -> FixedClock {
    FixedClock::new(Utc.timestamp_opt(1_700_000_000, 0).unwrap())
}

#[tokio::test(start_paused = true)]
async fn every_published_task_reaches_the_worker_unchanged() {
    let broker = InMemoryBroker::new(1);
    let shutdown = ShutdownCoordinator::new();
    let collect = Arc::new(Collect::default());

    let worker = WorkerLoop::new(
        BrokerConnector::with_defaults(broker.connector(0)),
        Arc::clone(&collect),
        WorkerSettings::new("it-worker"),
        shutdown.signal(),
    );
    let worker = tokio::spawn(worker.run());
    while broker.open_sessions() < 1 {
        sleep(Duration::from_millis(1)).await;
    }

    let producer = ProducerLoop::new(
        BrokerConnector::with_defaults(broker.connector(0)),
        TaskGenerator::seeded(42, clock()),
        ProducerSettings::default(),
        shutdown.signal(),
    );
    let producer_state = producer.state();
    let producer = tokio::spawn(producer.run());

    // publish at 0s, 2s, 4s
    sleep(Duration::from_millis(5_000)).await;
    shutdown.trigger();

    let counts = producer.await.unwrap().unwrap();
    let report = worker.await.unwrap().unwrap();

    assert_eq!(counts.published, 3);
    assert_eq!(report.outcome, DrainOutcome::Clean);
    assert_eq!(report.counts.completed, 3);
    assert_eq!(*producer_state.borrow(), LoopState::Terminated);

    let published: Vec<Task> = broker
        .records(0)
        .iter()
        .map(|raw| codec::decode(raw).unwrap())
        .collect();
    assert_eq!(*collect.tasks.lock(), published);
    assert_eq!(broker.open_sessions(), 0);
}

#[tokio::test(start_paused = true)]
async fn both_sides_wait_for_a_slow_broker() {
    let broker = InMemoryBroker::new(1);
    broker.set_down(true);
    let shutdown = ShutdownCoordinator::new();

    let worker = WorkerLoop::new(
        BrokerConnector::with_defaults(broker.connector(0)),
        Arc::new(SimulatedWork::new("it-worker", Duration::from_millis(100))),
        WorkerSettings::new("it-worker"),
        shutdown.signal(),
    );
    let worker_stats = worker.stats();
    let worker = tokio::spawn(worker.run());

    sleep(Duration::from_millis(3_500)).await;
    broker.set_down(false);
    // worker は 4s の試行で接続する
    sleep(Duration::from_millis(1_000)).await;
    assert_eq!(broker.open_sessions(), 1);

    let producer = ProducerLoop::new(
        BrokerConnector::with_defaults(broker.connector(0)),
        TaskGenerator::seeded(7, clock()),
        ProducerSettings::default(),
        shutdown.signal(),
    );
    let producer = tokio::spawn(producer.run());

    sleep(Duration::from_millis(1_000)).await;
    shutdown.trigger();

    let counts = producer.await.unwrap().unwrap();
    let report = worker.await.unwrap().unwrap();

    assert_eq!(counts.published, 1);
    assert_eq!(report.counts.completed, 1);
    assert_eq!(worker_stats.snapshot().malformed, 0);
}
