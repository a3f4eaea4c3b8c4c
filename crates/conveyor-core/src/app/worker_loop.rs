//! WorkerLoop - メッセージを受けて handler を並行実行し、shutdown 時に drain する
//!
//! # フロー（running）
//! control loop は {次のメッセージ / delivery error, shutdown} を select で競合させる。
//! 1. ConsumerSession::recv() でメッセージ受信
//! 2. codec で decode（失敗したら log して skip）
//! 3. handler を 1 件ごとに spawn（Bounded なら空き slot を待つ）
//!
//! # 状態遷移
//! running → draining → terminated
//! - draining: 新しい dispatch はしない。in-flight の handler を `drain_deadline` まで待つ
//! - 期限切れの handler は置き去り（キャンセルは伝えない）
//!
//! # delivery error（Continue 方針）
//! error の直後に stream が終わった場合は終端ではなく consumer の故障とみなし、
//! BrokerConnector で購読し直す（newest から）。再接続が retry を使い切ったら致命的。
//!
//! in-flight の数は TaskTracker が atomic に数える（handler と control loop の唯一の共有状態）。

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{Semaphore, watch};
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

use super::connector::BrokerConnector;
use super::shutdown::ShutdownSignal;
use super::status::{WorkerCounts, WorkerStats};
use crate::domain::{DrainOutcome, LoopState, PipelineError, codec};
use crate::ports::{BrokerError, Connector, ConsumerEvent, ConsumerSession, TaskHandler};

/// consumer から delivery error が届いたときの方針
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryErrorPolicy {
    /// log して受信を続ける
    #[default]
    Continue,
    /// dispatch を止め、drain してからエラーで終了する
    Terminate,
}

/// handler の並行数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DispatchMode {
    /// 1 メッセージ 1 handler、上限なし
    #[default]
    Unbounded,
    /// 同時に走る handler は `slots` 個まで。満杯なら control loop が空きを待つ
    Bounded { slots: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkerSettings {
    pub worker_id: String,
    pub drain_deadline: Duration,
    pub delivery_error_policy: DeliveryErrorPolicy,
    pub dispatch: DispatchMode,
}

impl WorkerSettings {
    pub fn new(worker_id: impl Into<String>) -> Self {
        Self {
            worker_id: worker_id.into(),
            drain_deadline: Duration::from_secs(10),
            delivery_error_policy: DeliveryErrorPolicy::Continue,
            dispatch: DispatchMode::Unbounded,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerReport {
    pub outcome: DrainOutcome,
    pub counts: WorkerCounts,
}

/// control loop が抜けた理由
enum Stop {
    Shutdown,
    StreamEnded,
    DeliveryError(BrokerError),
    Unavailable(PipelineError),
}

pub struct WorkerLoop<C, H> {
    connector: BrokerConnector<C>,
    handler: Arc<H>,
    settings: WorkerSettings,
    shutdown: ShutdownSignal,
    stats: Arc<WorkerStats>,
    state_tx: watch::Sender<LoopState>,
}

impl<C, H> WorkerLoop<C, H>
where
    C: Connector,
    H: TaskHandler,
{
    pub fn new(
        connector: BrokerConnector<C>,
        handler: Arc<H>,
        settings: WorkerSettings,
        shutdown: ShutdownSignal,
    ) -> Self {
        let (state_tx, _) = watch::channel(LoopState::Running);
        Self {
            connector,
            handler,
            settings,
            shutdown,
            stats: Arc::new(WorkerStats::default()),
            state_tx,
        }
    }

    pub fn stats(&self) -> Arc<WorkerStats> {
        Arc::clone(&self.stats)
    }

    pub fn state(&self) -> watch::Receiver<LoopState> {
        self.state_tx.subscribe()
    }

    /// shutdown（または stream 終端 / Terminate 方針の delivery error）まで処理する
    pub async fn run(mut self) -> Result<WorkerReport, PipelineError> {
        let connected = tokio::select! {
            biased;
            _ = self.shutdown.wait() => None,
            result = self.connector.connect_consumer() => Some(result),
        };

        let mut consumer = match connected {
            Some(Ok(consumer)) => consumer,
            Some(Err(err)) => {
                self.state_tx.send_replace(LoopState::Terminated);
                return Err(err);
            }
            None => {
                info!(worker = %self.settings.worker_id, "shutdown requested before the worker connected");
                self.state_tx.send_replace(LoopState::Terminated);
                return Ok(self.report(DrainOutcome::Clean));
            }
        };

        info!(worker = %self.settings.worker_id, "worker started, waiting for tasks");

        let tracker = TaskTracker::new();
        let slots = match self.settings.dispatch {
            DispatchMode::Bounded { slots } => Some(Arc::new(Semaphore::new(slots))),
            DispatchMode::Unbounded => None,
        };

        // 直前のイベントが許容した delivery error だったか
        let mut after_error = false;

        let stop = loop {
            let event = tokio::select! {
                biased;
                _ = self.shutdown.wait() => break Stop::Shutdown,
                event = consumer.recv() => event,
            };

            let delivery = match event {
                Some(ConsumerEvent::Message(delivery)) => {
                    after_error = false;
                    delivery
                }
                Some(ConsumerEvent::Error(err)) => {
                    self.stats.record_delivery_error();
                    match self.settings.delivery_error_policy {
                        DeliveryErrorPolicy::Continue => {
                            warn!(error = %err, "error from partition consumer");
                            after_error = true;
                            continue;
                        }
                        DeliveryErrorPolicy::Terminate => {
                            error!(error = %err, "error from partition consumer, terminating");
                            break Stop::DeliveryError(err);
                        }
                    }
                }
                None if after_error => {
                    after_error = false;
                    warn!(
                        worker = %self.settings.worker_id,
                        "consumer stream ended after a delivery error, resubscribing"
                    );
                    let reopened = tokio::select! {
                        biased;
                        _ = self.shutdown.wait() => break Stop::Shutdown,
                        result = self.connector.connect_consumer() => result,
                    };
                    match reopened {
                        Ok(fresh) => {
                            let stale = std::mem::replace(&mut consumer, fresh);
                            stale.close().await;
                            self.stats.record_resubscribe();
                            continue;
                        }
                        Err(err) => break Stop::Unavailable(err),
                    }
                }
                None => break Stop::StreamEnded,
            };

            self.stats.record_received();
            let task = match codec::decode(&delivery.payload) {
                Ok(task) => task,
                Err(err) => {
                    self.stats.record_malformed();
                    let err = PipelineError::MalformedMessage(err);
                    warn!(
                        partition = delivery.handle.partition,
                        offset = delivery.handle.offset,
                        error = %err,
                        "skipping malformed message"
                    );
                    continue;
                }
            };

            let permit = match &slots {
                None => None,
                Some(slots) => {
                    let acquired = tokio::select! {
                        biased;
                        _ = self.shutdown.wait() => {
                            // slot 待ちの間に drain が始まった: dispatch しない
                            self.stats.record_dropped();
                            break Stop::Shutdown;
                        }
                        permit = Arc::clone(slots).acquire_owned() => permit,
                    };
                    match acquired {
                        Ok(permit) => Some(permit),
                        Err(_) => break Stop::Shutdown,
                    }
                }
            };

            self.stats.record_dispatched();
            let handler = Arc::clone(&self.handler);
            let stats = Arc::clone(&self.stats);
            tracker.spawn(async move {
                let _permit = permit;
                handler.handle(task).await;
                stats.record_completed();
            });
        };

        // draining
        self.state_tx.send_replace(LoopState::Draining);
        tracker.close();
        let reason = match &stop {
            Stop::Shutdown => "shutdown signal",
            Stop::StreamEnded => "consumer stream ended",
            Stop::DeliveryError(_) => "delivery error",
            Stop::Unavailable(_) => "consumer could not be reopened",
        };
        info!(
            worker = %self.settings.worker_id,
            in_flight = tracker.len(),
            reason,
            "stopping new task processing"
        );

        let deadline = self.settings.drain_deadline;
        let outcome = tokio::select! {
            _ = tracker.wait() => DrainOutcome::Clean,
            _ = tokio::time::sleep(deadline) => DrainOutcome::Forced { abandoned: tracker.len() },
        };
        match outcome {
            DrainOutcome::Clean => {
                info!(worker = %self.settings.worker_id, "all tasks completed, shutting down gracefully");
            }
            DrainOutcome::Forced { abandoned } => {
                warn!(
                    worker = %self.settings.worker_id,
                    abandoned,
                    deadline = ?deadline,
                    "shutdown timeout reached, abandoning in-flight tasks"
                );
            }
        }

        consumer.close().await;
        self.state_tx.send_replace(LoopState::Terminated);

        match stop {
            Stop::DeliveryError(err) => Err(PipelineError::ConsumerDelivery(err)),
            Stop::Unavailable(err) => Err(err),
            Stop::Shutdown | Stop::StreamEnded => Ok(self.report(outcome)),
        }
    }

    fn report(&self, outcome: DrainOutcome) -> WorkerReport {
        WorkerReport {
            outcome,
            counts: self.stats.snapshot(),
        }
    }
}
