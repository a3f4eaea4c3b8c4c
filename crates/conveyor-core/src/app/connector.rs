//! BrokerConnector - retry 付きの broker 接続
//!
//! # 二つの retry
//! - 接続確立: `connect_policy`（既定 30 回 × 1 秒）。使い切ったら BrokerUnavailable。
//! - publish 1 件: `publish_policy`（既定 5 回 × 100ms）。`ReliableProducer` が session 内で吸収し、
//!   再接続までは行わない。

use std::future::Future;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::domain::{DeliveryHandle, PipelineError, Role};
use crate::ports::{BrokerError, Connector, ProducerSession};
use crate::retry::RetryPolicy;

pub struct BrokerConnector<C> {
    connector: C,
    connect_policy: RetryPolicy,
    publish_policy: RetryPolicy,
}

impl<C: Connector> BrokerConnector<C> {
    pub fn new(connector: C, connect_policy: RetryPolicy, publish_policy: RetryPolicy) -> Self {
        Self {
            connector,
            connect_policy,
            publish_policy,
        }
    }

    /// 既定の retry 設定（30 × 1s / 5 × 100ms）
    pub fn with_defaults(connector: C) -> Self {
        Self::new(
            connector,
            RetryPolicy::connect_default(),
            RetryPolicy::publish_default(),
        )
    }

    pub async fn connect_producer(&self) -> Result<ReliableProducer<C::Producer>, PipelineError> {
        let session = self
            .establish(Role::Producer, || self.connector.open_producer())
            .await?;
        Ok(ReliableProducer::new(session, self.publish_policy.clone()))
    }

    pub async fn connect_consumer(&self) -> Result<C::Consumer, PipelineError> {
        self.establish(Role::Consumer, || self.connector.open_consumer())
            .await
    }

    async fn establish<T, F, Fut>(&self, role: Role, mut open: F) -> Result<T, PipelineError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BrokerError>>,
    {
        let policy = &self.connect_policy;
        let mut attempt = 0;
        loop {
            attempt += 1;
            match open().await {
                Ok(session) => {
                    info!(%role, attempt, "connected to broker");
                    return Ok(session);
                }
                Err(err) if policy.should_retry(attempt) => {
                    let delay = policy.next_delay(attempt);
                    warn!(
                        %role,
                        attempt,
                        max_attempts = policy.max_attempts,
                        error = %err,
                        retry_in = ?delay,
                        "failed to connect to broker, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    error!(%role, attempt, error = %err, "giving up on broker connection");
                    return Err(PipelineError::BrokerUnavailable {
                        role,
                        attempts: attempt,
                        last_error: err,
                    });
                }
            }
        }
    }
}

/// ReliableProducer は publish 失敗を session 内で retry する
pub struct ReliableProducer<P> {
    inner: P,
    policy: RetryPolicy,
}

impl<P: ProducerSession> ReliableProducer<P> {
    pub fn new(inner: P, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl<P: ProducerSession> ProducerSession for ReliableProducer<P> {
    async fn publish(&mut self, payload: &[u8]) -> Result<DeliveryHandle, BrokerError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.inner.publish(payload).await {
                Ok(handle) => return Ok(handle),
                Err(err) if self.policy.should_retry(attempt) => {
                    debug!(attempt, error = %err, "publish attempt failed, backing off");
                    tokio::time::sleep(self.policy.next_delay(attempt)).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn close(self) {
        self.inner.close().await;
    }
}
