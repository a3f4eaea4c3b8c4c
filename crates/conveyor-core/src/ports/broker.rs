//! Broker port - partitioned message log への接続
//!
//! # 実装
//! - `impls::kafka::KafkaConnector`: 本番用（rskafka）
//! - `impls::inmem_broker::InMemoryConnector`: テスト・ローカル用
//!
//! session は作った loop が排他的に所有し、どの経路で抜けても `close()` する。

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{Delivery, DeliveryHandle};

/// BrokerError は broker 操作のエラー
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BrokerError {
    #[error("broker unreachable: {0}")]
    Unreachable(String),

    #[error("publish rejected: {0}")]
    Publish(String),

    #[error("consume failed: {0}")]
    Consume(String),

    #[error("broker did not answer within {0:?}")]
    Timeout(Duration),

    #[error("session already closed")]
    Closed,
}

/// ConsumerEvent は consumer session から届くもの
///
/// メッセージと delivery error は同じ経路で流れ、control loop だけが読む。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumerEvent {
    Message(Delivery),
    Error(BrokerError),
}

/// Producer session（1 回の接続）
#[async_trait]
pub trait ProducerSession: Send {
    /// 1 件 publish して broker が割り当てた位置を返す
    async fn publish(&mut self, payload: &[u8]) -> Result<DeliveryHandle, BrokerError>;

    /// 接続を解放
    async fn close(self);
}

/// Consumer session（1 回の購読）
#[async_trait]
pub trait ConsumerSession: Send {
    /// 次のメッセージか delivery error を待つ。`None` は stream の終端。
    async fn recv(&mut self) -> Option<ConsumerEvent>;

    /// 購読を解放
    async fn close(self);
}

/// Connector は 1 回の接続試行を行う（retry は `app::connector` 側）
#[async_trait]
pub trait Connector: Send + Sync {
    type Producer: ProducerSession;
    type Consumer: ConsumerSession;

    async fn open_producer(&self) -> Result<Self::Producer, BrokerError>;

    async fn open_consumer(&self) -> Result<Self::Consumer, BrokerError>;
}
