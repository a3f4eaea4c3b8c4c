//! ProducerLoop - タスクを一定間隔で生成して publish
//!
//! # フロー（1 iteration）
//! 1. TaskGenerator で Task を生成
//! 2. codec で encode
//! 3. ProducerSession::publish（session 内で 5 回まで retry 済み）
//! 4. 失敗したら session を close して再接続。再接続も失敗したら少し待って次の iteration へ
//! 5. `interval` 待つ（shutdown と競合）
//!
//! # 状態遷移
//! running → terminated（drain なし。publish は同期的なので in-flight は存在しない）

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use rand::rngs::StdRng;
use tokio::sync::watch;
use tracing::{error, info, warn};

use super::connector::{BrokerConnector, ReliableProducer};
use super::shutdown::ShutdownSignal;
use super::status::{ProducerCounts, ProducerStats};
use crate::domain::{LoopState, PipelineError, TaskGenerator, codec};
use crate::ports::{Clock, Connector, ProducerSession};

#[derive(Debug, Clone, PartialEq)]
pub struct ProducerSettings {
    /// publish と publish の間隔
    pub interval: Duration,
    /// 再接続に失敗した後、次の iteration までの待ち
    pub reconnect_pause: Duration,
}

impl Default for ProducerSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            reconnect_pause: Duration::from_secs(1),
        }
    }
}

enum Reconnect<P> {
    Connected(P),
    Failed,
    Interrupted,
}

pub struct ProducerLoop<C, K, R = StdRng> {
    connector: BrokerConnector<C>,
    generator: TaskGenerator<K, R>,
    settings: ProducerSettings,
    shutdown: ShutdownSignal,
    stats: Arc<ProducerStats>,
    state_tx: watch::Sender<LoopState>,
}

impl<C, K, R> ProducerLoop<C, K, R>
where
    C: Connector,
    K: Clock,
    R: Rng + Send,
{
    pub fn new(
        connector: BrokerConnector<C>,
        generator: TaskGenerator<K, R>,
        settings: ProducerSettings,
        shutdown: ShutdownSignal,
    ) -> Self {
        let (state_tx, _) = watch::channel(LoopState::Running);
        Self {
            connector,
            generator,
            settings,
            shutdown,
            stats: Arc::new(ProducerStats::default()),
            state_tx,
        }
    }

    pub fn stats(&self) -> Arc<ProducerStats> {
        Arc::clone(&self.stats)
    }

    pub fn state(&self) -> watch::Receiver<LoopState> {
        self.state_tx.subscribe()
    }

    /// shutdown まで publish し続ける
    ///
    /// 起動時の接続が retry を使い切った場合のみ `Err`（致命的）。
    pub async fn run(mut self) -> Result<ProducerCounts, PipelineError> {
        let connected = tokio::select! {
            biased;
            _ = self.shutdown.wait() => None,
            result = self.connector.connect_producer() => Some(result),
        };

        let mut session = match connected {
            Some(Ok(session)) => Some(session),
            Some(Err(err)) => {
                self.state_tx.send_replace(LoopState::Terminated);
                return Err(err);
            }
            None => {
                info!("shutdown requested before the producer connected");
                self.state_tx.send_replace(LoopState::Terminated);
                return Ok(self.stats.snapshot());
            }
        };

        info!("producer started, generating tasks");

        loop {
            if self.shutdown.is_triggered() {
                break;
            }

            if session.is_none() {
                match self.reconnect().await {
                    Reconnect::Connected(fresh) => session = Some(fresh),
                    Reconnect::Interrupted => break,
                    Reconnect::Failed => {
                        if self.pause(self.settings.reconnect_pause).await {
                            break;
                        }
                        continue;
                    }
                }
            }
            let Some(producer) = session.as_mut() else {
                continue;
            };

            let task = self.generator.generate();
            match codec::encode(&task) {
                Ok(payload) => match producer.publish(&payload).await {
                    Ok(handle) => {
                        self.stats.record_published();
                        info!(
                            task_id = task.task_id,
                            task_type = %task.task_type,
                            partition = handle.partition,
                            offset = handle.offset,
                            "published task"
                        );
                    }
                    Err(err) => {
                        self.stats.record_publish_failure();
                        let err = PipelineError::PublishFailure(err);
                        warn!(task_id = task.task_id, error = %err, "failed to publish task, recreating producer");

                        if let Some(broken) = session.take() {
                            broken.close().await;
                        }
                        match self.reconnect().await {
                            Reconnect::Connected(fresh) => session = Some(fresh),
                            Reconnect::Interrupted => break,
                            Reconnect::Failed => {
                                if self.pause(self.settings.reconnect_pause).await {
                                    break;
                                }
                                continue;
                            }
                        }
                    }
                },
                Err(err) => error!(task_id = task.task_id, error = %err, "failed to encode task"),
            }

            if self.pause(self.settings.interval).await {
                break;
            }
        }

        info!("shutting down producer");
        if let Some(session) = session.take() {
            session.close().await;
        }
        self.state_tx.send_replace(LoopState::Terminated);

        let counts = self.stats.snapshot();
        info!(
            published = counts.published,
            publish_failures = counts.publish_failures,
            reconnects = counts.reconnects,
            "producer stopped"
        );
        Ok(counts)
    }

    async fn reconnect(&mut self) -> Reconnect<ReliableProducer<C::Producer>> {
        let result = tokio::select! {
            biased;
            _ = self.shutdown.wait() => return Reconnect::Interrupted,
            result = self.connector.connect_producer() => result,
        };
        match result {
            Ok(session) => {
                self.stats.record_reconnect();
                Reconnect::Connected(session)
            }
            Err(err) => {
                // プロセスは落とさない（broker の再起動を跨いで生き残る）
                error!(error = %err, "failed to recreate producer");
                Reconnect::Failed
            }
        }
    }

    /// `duration` 待つ。途中で shutdown が来たら true
    async fn pause(&mut self, duration: Duration) -> bool {
        tokio::select! {
            biased;
            _ = self.shutdown.wait() => true,
            _ = tokio::time::sleep(duration) => false,
        }
    }
}
