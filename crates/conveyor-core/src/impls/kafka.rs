//! KafkaConnector - rskafka による本番用 Connector
//!
//! # 接続
//! - 1 回の試行 = bootstrap broker への接続 + topic/partition の partition client 取得
//! - 試行ごとに `attempt_timeout` で打ち切る（rskafka 内部の retry に任せきりにしない）
//!
//! # producer
//! - produce は全 in-sync replica の ack を待つ（rskafka の produce は acks=-1）
//!
//! # consumer
//! - `StartOffset::Latest` から読む。起動前のレコードは読まない。
//! - rskafka の StreamConsumer は error を 1 件返すと終端する。error を渡した時点で
//!   最後に読んだ offset の次から stream を作り直す（まだ何も読んでいなければ Latest）。

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use rskafka::client::ClientBuilder;
use rskafka::client::consumer::{StartOffset, StreamConsumer, StreamConsumerBuilder};
use rskafka::client::partition::{Compression, PartitionClient, UnknownTopicHandling};
use rskafka::record::Record;
use tracing::debug;

use crate::config::BrokerConfig;
use crate::domain::{Delivery, DeliveryHandle};
use crate::ports::{BrokerError, Connector, ConsumerEvent, ConsumerSession, ProducerSession};

/// KafkaConnector は固定の topic / partition に繋ぐ
#[derive(Debug, Clone)]
pub struct KafkaConnector {
    brokers: Vec<String>,
    topic: String,
    partition: i32,
    attempt_timeout: Duration,
    fetch_max_wait_ms: i32,
}

impl KafkaConnector {
    pub fn new(config: &BrokerConfig) -> Self {
        Self {
            brokers: config.brokers.clone(),
            topic: config.topic.clone(),
            partition: config.partition,
            attempt_timeout: config.attempt_timeout(),
            fetch_max_wait_ms: config.fetch_max_wait_ms,
        }
    }

    async fn partition_client(&self) -> Result<PartitionClient, BrokerError> {
        let attempt = async {
            let client = ClientBuilder::new(self.brokers.clone())
                .build()
                .await
                .map_err(|e| BrokerError::Unreachable(e.to_string()))?;
            client
                .partition_client(
                    self.topic.clone(),
                    self.partition,
                    UnknownTopicHandling::Error,
                )
                .await
                .map_err(|e| BrokerError::Unreachable(e.to_string()))
        };

        tokio::time::timeout(self.attempt_timeout, attempt)
            .await
            .map_err(|_| BrokerError::Timeout(self.attempt_timeout))?
    }
}

#[async_trait]
impl Connector for KafkaConnector {
    type Producer = KafkaProducer;
    type Consumer = KafkaConsumer;

    async fn open_producer(&self) -> Result<KafkaProducer, BrokerError> {
        let client = self.partition_client().await?;
        debug!(topic = %self.topic, partition = self.partition, "kafka producer session opened");
        Ok(KafkaProducer {
            client,
            partition: self.partition,
            request_timeout: self.attempt_timeout,
        })
    }

    async fn open_consumer(&self) -> Result<KafkaConsumer, BrokerError> {
        let client = Arc::new(self.partition_client().await?);
        let stream = partition_stream(&client, StartOffset::Latest, self.fetch_max_wait_ms);
        debug!(topic = %self.topic, partition = self.partition, "kafka consumer session opened");
        Ok(KafkaConsumer {
            client,
            stream,
            partition: self.partition,
            fetch_max_wait_ms: self.fetch_max_wait_ms,
            last_offset: None,
        })
    }
}

pub struct KafkaProducer {
    client: PartitionClient,
    partition: i32,
    request_timeout: Duration,
}

#[async_trait]
impl ProducerSession for KafkaProducer {
    async fn publish(&mut self, payload: &[u8]) -> Result<DeliveryHandle, BrokerError> {
        // partition key は付けない
        let record = Record {
            key: None,
            value: Some(payload.to_vec()),
            headers: BTreeMap::new(),
            timestamp: Utc::now(),
        };

        let offsets = tokio::time::timeout(
            self.request_timeout,
            self.client.produce(vec![record], Compression::NoCompression),
        )
        .await
        .map_err(|_| BrokerError::Timeout(self.request_timeout))?
        .map_err(|e| BrokerError::Publish(e.to_string()))?;

        let offset = offsets
            .first()
            .copied()
            .ok_or_else(|| BrokerError::Publish("broker returned no offset".to_string()))?;
        Ok(DeliveryHandle::new(self.partition, offset))
    }

    async fn close(self) {
        // rskafka は drop で接続を閉じる
        drop(self.client);
    }
}

fn partition_stream(
    client: &Arc<PartitionClient>,
    start: StartOffset,
    fetch_max_wait_ms: i32,
) -> StreamConsumer {
    StreamConsumerBuilder::new(Arc::clone(client), start)
        .with_max_wait_ms(fetch_max_wait_ms)
        .build()
}

/// fetch error の後に読み直す位置
fn resume_from(last_offset: Option<i64>) -> StartOffset {
    match last_offset {
        Some(offset) => StartOffset::At(offset + 1),
        None => StartOffset::Latest,
    }
}

pub struct KafkaConsumer {
    client: Arc<PartitionClient>,
    stream: StreamConsumer,
    partition: i32,
    fetch_max_wait_ms: i32,
    last_offset: Option<i64>,
}

#[async_trait]
impl ConsumerSession for KafkaConsumer {
    async fn recv(&mut self) -> Option<ConsumerEvent> {
        let event = match self.stream.next().await? {
            Ok((record, _high_watermark)) => {
                self.last_offset = Some(record.offset);
                ConsumerEvent::Message(Delivery {
                    payload: record.record.value.unwrap_or_default(),
                    handle: DeliveryHandle::new(self.partition, record.offset),
                })
            }
            Err(e) => {
                let resume = resume_from(self.last_offset);
                debug!(partition = self.partition, ?resume, "rebuilding partition stream after fetch error");
                self.stream = partition_stream(&self.client, resume, self.fetch_max_wait_ms);
                ConsumerEvent::Error(BrokerError::Consume(e.to_string()))
            }
        };
        Some(event)
    }

    async fn close(self) {
        drop(self.stream);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resumes_after_last_delivered_offset() {
        assert!(matches!(resume_from(Some(41)), StartOffset::At(42)));
        assert!(matches!(resume_from(Some(0)), StartOffset::At(1)));
    }

    #[test]
    fn resumes_at_newest_when_nothing_was_read() {
        assert!(matches!(resume_from(None), StartOffset::Latest));
    }
}
