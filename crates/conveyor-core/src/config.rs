//! Config - プロセス設定
//!
//! 読み込み順（後勝ち）:
//! 1. 各 struct の Default
//! 2. `conveyor.toml`（`CONVEYOR_CONFIG` でパス変更、無くてもよい）
//! 3. 環境変数 `CONVEYOR_<SECTION>__<KEY>`（例: `CONVEYOR_BROKER__BROKERS=kafka:29092`）

use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::app::producer_loop::ProducerSettings;
use crate::app::worker_loop::{DeliveryErrorPolicy, DispatchMode, WorkerSettings};
use crate::domain::PipelineError;
use crate::retry::RetryPolicy;

pub const ENV_PREFIX: &str = "CONVEYOR";
pub const CONFIG_PATH_VAR: &str = "CONVEYOR_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "conveyor.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub broker: BrokerConfig,
    pub producer: ProducerConfig,
    pub worker: WorkerConfig,
    pub log: LogConfig,
}

impl PipelineConfig {
    pub fn load() -> Result<Self, PipelineError> {
        let path = std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        let config = Config::builder()
            .add_source(File::with_name(&path).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("broker.brokers")
                    .try_parsing(true),
            )
            .build()?;
        Ok(config.try_deserialize()?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub brokers: Vec<String>,
    pub topic: String,
    /// producer と worker が共有する唯一の partition
    pub partition: i32,
    pub connect_attempts: u32,
    pub connect_delay_ms: u64,
    pub attempt_timeout_ms: u64,
    pub publish_attempts: u32,
    pub publish_backoff_ms: u64,
    pub fetch_max_wait_ms: i32,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            brokers: vec!["kafka:29092".to_string()],
            topic: "tasks".to_string(),
            partition: 0,
            connect_attempts: 30,
            connect_delay_ms: 1_000,
            attempt_timeout_ms: 5_000,
            publish_attempts: 5,
            publish_backoff_ms: 100,
            fetch_max_wait_ms: 500,
        }
    }
}

impl BrokerConfig {
    pub fn connect_policy(&self) -> RetryPolicy {
        RetryPolicy::constant(
            self.connect_attempts.max(1),
            Duration::from_millis(self.connect_delay_ms),
        )
    }

    pub fn publish_policy(&self) -> RetryPolicy {
        RetryPolicy::constant(
            self.publish_attempts.max(1),
            Duration::from_millis(self.publish_backoff_ms),
        )
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProducerConfig {
    pub interval_ms: u64,
    pub reconnect_pause_ms: u64,
    /// 乱数 seed（未指定なら OS entropy）
    pub seed: Option<u64>,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            interval_ms: 2_000,
            reconnect_pause_ms: 1_000,
            seed: None,
        }
    }
}

impl ProducerConfig {
    pub fn settings(&self) -> ProducerSettings {
        ProducerSettings {
            interval: Duration::from_millis(self.interval_ms),
            reconnect_pause: Duration::from_millis(self.reconnect_pause_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub drain_deadline_ms: u64,
    pub work_delay_ms: u64,
    pub delivery_error_policy: DeliveryErrorPolicy,
    /// 未指定なら handler 数の上限なし
    pub max_in_flight: Option<usize>,
    /// 未指定なら hostname
    pub worker_id: Option<String>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            drain_deadline_ms: 10_000,
            work_delay_ms: 1_000,
            delivery_error_policy: DeliveryErrorPolicy::Continue,
            max_in_flight: None,
            worker_id: None,
        }
    }
}

impl WorkerConfig {
    pub fn dispatch_mode(&self) -> DispatchMode {
        match self.max_in_flight {
            Some(slots) => DispatchMode::Bounded { slots: slots.max(1) },
            None => DispatchMode::Unbounded,
        }
    }

    pub fn work_delay(&self) -> Duration {
        Duration::from_millis(self.work_delay_ms)
    }

    /// `fallback_id` は worker_id 未指定時に使う（通常は hostname）
    pub fn settings(&self, fallback_id: &str) -> WorkerSettings {
        WorkerSettings {
            worker_id: self
                .worker_id
                .clone()
                .unwrap_or_else(|| fallback_id.to_string()),
            drain_deadline: Duration::from_millis(self.drain_deadline_ms),
            delivery_error_policy: self.delivery_error_policy,
            dispatch: self.dispatch_mode(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub format: LogFormat,
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn from_toml(raw: &str) -> PipelineConfig {
        Config::builder()
            .add_source(File::from_str(raw, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn defaults_match_deployment() {
        let config = PipelineConfig::default();
        assert_eq!(config.broker.topic, "tasks");
        assert_eq!(config.broker.partition, 0);
        assert_eq!(config.broker.connect_policy(), RetryPolicy::connect_default());
        assert_eq!(config.broker.publish_policy(), RetryPolicy::publish_default());
        assert_eq!(config.producer.interval_ms, 2_000);
        assert_eq!(config.worker.drain_deadline_ms, 10_000);
        assert_eq!(config.worker.delivery_error_policy, DeliveryErrorPolicy::Continue);
        assert_eq!(config.worker.dispatch_mode(), DispatchMode::Unbounded);
    }

    #[test]
    fn empty_source_yields_defaults() {
        assert_eq!(from_toml(""), PipelineConfig::default());
    }

    #[test]
    fn partial_file_overrides_only_given_keys() {
        let config = from_toml(
            r#"
            [broker]
            brokers = ["k1:9092", "k2:9092"]

            [worker]
            delivery_error_policy = "terminate"
            max_in_flight = 4

            [log]
            format = "json"
            "#,
        );

        assert_eq!(config.broker.brokers, vec!["k1:9092", "k2:9092"]);
        assert_eq!(config.broker.topic, "tasks");
        assert_eq!(config.worker.delivery_error_policy, DeliveryErrorPolicy::Terminate);
        assert_eq!(config.worker.dispatch_mode(), DispatchMode::Bounded { slots: 4 });
        assert_eq!(config.log.format, LogFormat::Json);
    }

    #[test]
    fn settings_carry_durations_and_identity() {
        let config = from_toml(
            r#"
            [producer]
            interval_ms = 250

            [worker]
            drain_deadline_ms = 3000
            "#,
        );

        let producer = config.producer.settings();
        assert_eq!(producer.interval, Duration::from_millis(250));
        assert_eq!(producer.reconnect_pause, Duration::from_secs(1));

        let worker = config.worker.settings("host-a");
        assert_eq!(worker.worker_id, "host-a");
        assert_eq!(worker.drain_deadline, Duration::from_secs(3));

        let named = WorkerConfig {
            worker_id: Some("w-7".to_string()),
            ..WorkerConfig::default()
        };
        assert_eq!(named.settings("host-a").worker_id, "w-7");
    }

    #[test]
    fn zero_slots_still_leaves_one() {
        let config = WorkerConfig {
            max_in_flight: Some(0),
            ..WorkerConfig::default()
        };
        assert_eq!(config.dispatch_mode(), DispatchMode::Bounded { slots: 1 });
    }
}
