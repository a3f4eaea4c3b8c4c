//! InMemoryBroker - 開発・テスト用の partitioned log
//!
//! # 実装詳細
//! - partition ごとに `Vec<Vec<u8>>` の追記ログ（index = offset）
//! - parking_lot::Mutex で排他制御（await を跨いでロックしない）
//! - tokio::sync::Notify で publish / error 注入時に consumer を起こす
//!
//! # 障害注入
//! - `refuse_next_connects(n)`: 次の n 回の接続試行を拒否
//! - `set_down(true)`: 接続も publish も全て拒否
//! - `fail_next_publishes(n)`: 次の n 回の publish を拒否
//! - `inject_consumer_error(..)`: consumer に delivery error を 1 件流す
//! - `inject_fatal_consumer_error(..)`: error を流した後、その session の stream を終わらせる
//!   （rskafka の StreamConsumer は error を 1 件返すと以後 None しか返さない）
//! - `end_streams()`: 全 consumer の stream を終端させる

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::domain::{Delivery, DeliveryHandle};
use crate::ports::{BrokerError, Connector, ConsumerEvent, ConsumerSession, ProducerSession};

struct BrokerState {
    partitions: Vec<Vec<Vec<u8>>>,
    down: bool,
    refuse_connects: u32,
    failing_publishes: u32,
    consumer_errors: VecDeque<InjectedError>,
    streams_ended: bool,
    connect_attempts: u32,
    open_sessions: usize,
}

impl BrokerState {
    fn log(&self, partition: i32) -> Option<&Vec<Vec<u8>>> {
        usize::try_from(partition)
            .ok()
            .and_then(|p| self.partitions.get(p))
    }

    fn append(&mut self, partition: i32, payload: Vec<u8>) -> Result<DeliveryHandle, BrokerError> {
        let log = usize::try_from(partition)
            .ok()
            .and_then(|p| self.partitions.get_mut(p))
            .ok_or_else(|| BrokerError::Publish(format!("unknown partition {partition}")))?;
        log.push(payload);
        Ok(DeliveryHandle::new(partition, log.len() as i64 - 1))
    }
}

struct InjectedError {
    error: BrokerError,
    /// 受け取った session の stream をこれで終える
    ends_stream: bool,
}

struct Shared {
    state: Mutex<BrokerState>,
    notify: Notify,
}

/// InMemoryBroker は開発用の broker
///
/// clone は同じ log を共有します。
///
/// # 使用例
/// ```ignore
/// let broker = InMemoryBroker::new(1);
/// let connector = broker.connector(0);
/// let mut producer = connector.open_producer().await?;
/// producer.publish(b"{}").await?;
/// ```
#[derive(Clone)]
pub struct InMemoryBroker {
    shared: Arc<Shared>,
}

impl InMemoryBroker {
    pub fn new(partitions: usize) -> Self {
        let partitions = partitions.max(1);
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(BrokerState {
                    partitions: vec![Vec::new(); partitions],
                    down: false,
                    refuse_connects: 0,
                    failing_publishes: 0,
                    consumer_errors: VecDeque::new(),
                    streams_ended: false,
                    connect_attempts: 0,
                    open_sessions: 0,
                }),
                notify: Notify::new(),
            }),
        }
    }

    /// 指定 partition に繋ぐ connector
    pub fn connector(&self, partition: i32) -> InMemoryConnector {
        InMemoryConnector {
            shared: Arc::clone(&self.shared),
            partition,
        }
    }

    pub fn set_down(&self, down: bool) {
        self.shared.state.lock().down = down;
    }

    pub fn refuse_next_connects(&self, n: u32) {
        self.shared.state.lock().refuse_connects = n;
    }

    pub fn fail_next_publishes(&self, n: u32) {
        self.shared.state.lock().failing_publishes = n;
    }

    pub fn inject_consumer_error(&self, message: impl Into<String>) {
        self.push_consumer_error(message.into(), false);
    }

    /// error を 1 件流し、受け取った consumer session はその後 `None` しか返さない
    pub fn inject_fatal_consumer_error(&self, message: impl Into<String>) {
        self.push_consumer_error(message.into(), true);
    }

    fn push_consumer_error(&self, message: String, ends_stream: bool) {
        self.shared
            .state
            .lock()
            .consumer_errors
            .push_back(InjectedError {
                error: BrokerError::Consume(message),
                ends_stream,
            });
        self.shared.notify.notify_waiters();
    }

    pub fn end_streams(&self) {
        self.shared.state.lock().streams_ended = true;
        self.shared.notify.notify_waiters();
    }

    /// session を通さずに raw bytes を追記（壊れたメッセージの投入などに使う）
    pub fn append(&self, partition: i32, payload: impl Into<Vec<u8>>) -> Result<DeliveryHandle, BrokerError> {
        let handle = self.shared.state.lock().append(partition, payload.into())?;
        self.shared.notify.notify_waiters();
        Ok(handle)
    }

    /// partition の全レコード（offset 順）
    pub fn records(&self, partition: i32) -> Vec<Vec<u8>> {
        self.shared
            .state
            .lock()
            .log(partition)
            .cloned()
            .unwrap_or_default()
    }

    pub fn connect_attempts(&self) -> u32 {
        self.shared.state.lock().connect_attempts
    }

    /// open されて未 close の session 数
    pub fn open_sessions(&self) -> usize {
        self.shared.state.lock().open_sessions
    }
}

/// InMemoryBroker の 1 partition に繋ぐ Connector
#[derive(Clone)]
pub struct InMemoryConnector {
    shared: Arc<Shared>,
    partition: i32,
}

impl InMemoryConnector {
    fn admit(&self) -> Result<(), BrokerError> {
        let mut state = self.shared.state.lock();
        state.connect_attempts += 1;

        if state.down {
            return Err(BrokerError::Unreachable("broker is down".to_string()));
        }
        if state.refuse_connects > 0 {
            state.refuse_connects -= 1;
            return Err(BrokerError::Unreachable("broker is still starting".to_string()));
        }
        if state.log(self.partition).is_none() {
            return Err(BrokerError::Unreachable(format!(
                "unknown partition {}",
                self.partition
            )));
        }

        state.open_sessions += 1;
        Ok(())
    }

    fn release(shared: &Shared) {
        let mut state = shared.state.lock();
        state.open_sessions = state.open_sessions.saturating_sub(1);
    }
}

#[async_trait]
impl Connector for InMemoryConnector {
    type Producer = InMemoryProducer;
    type Consumer = InMemoryConsumer;

    async fn open_producer(&self) -> Result<InMemoryProducer, BrokerError> {
        self.admit()?;
        Ok(InMemoryProducer {
            shared: Arc::clone(&self.shared),
            partition: self.partition,
        })
    }

    async fn open_consumer(&self) -> Result<InMemoryConsumer, BrokerError> {
        self.admit()?;
        // start at newest: 購読開始より前のレコードは見えない
        let next_offset = self
            .shared
            .state
            .lock()
            .log(self.partition)
            .map(Vec::len)
            .unwrap_or_default();
        Ok(InMemoryConsumer {
            shared: Arc::clone(&self.shared),
            partition: self.partition,
            next_offset,
            broken: false,
        })
    }
}

pub struct InMemoryProducer {
    shared: Arc<Shared>,
    partition: i32,
}

#[async_trait]
impl ProducerSession for InMemoryProducer {
    async fn publish(&mut self, payload: &[u8]) -> Result<DeliveryHandle, BrokerError> {
        let handle = {
            let mut state = self.shared.state.lock();
            if state.down {
                return Err(BrokerError::Unreachable("broker is down".to_string()));
            }
            if state.failing_publishes > 0 {
                state.failing_publishes -= 1;
                return Err(BrokerError::Publish("not enough in-sync replicas".to_string()));
            }
            state.append(self.partition, payload.to_vec())?
        };
        self.shared.notify.notify_waiters();
        Ok(handle)
    }

    async fn close(self) {
        InMemoryConnector::release(&self.shared);
    }
}

pub struct InMemoryConsumer {
    shared: Arc<Shared>,
    partition: i32,
    next_offset: usize,
    broken: bool,
}

#[async_trait]
impl ConsumerSession for InMemoryConsumer {
    async fn recv(&mut self) -> Option<ConsumerEvent> {
        if self.broken {
            return None;
        }
        loop {
            // 状態を見る前に登録しておく（見た直後の notify を取りこぼさない）
            let notified = self.shared.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.shared.state.lock();
                if let Some(injected) = state.consumer_errors.pop_front() {
                    self.broken = injected.ends_stream;
                    return Some(ConsumerEvent::Error(injected.error));
                }
                if let Some(payload) = state
                    .log(self.partition)
                    .and_then(|log| log.get(self.next_offset))
                {
                    let delivery = Delivery {
                        payload: payload.clone(),
                        handle: DeliveryHandle::new(self.partition, self.next_offset as i64),
                    };
                    self.next_offset += 1;
                    return Some(ConsumerEvent::Message(delivery));
                }
                if state.streams_ended {
                    return None;
                }
            }

            notified.await;
        }
    }

    async fn close(self) {
        InMemoryConnector::release(&self.shared);
    }
}
