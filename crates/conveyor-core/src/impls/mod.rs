//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **KafkaConnector**: 本番用の broker 接続（rskafka）
//! - **InMemoryBroker**: 開発・テスト用の partitioned log
//! - **SimulatedWork**: sleep で代用するタスク処理

pub mod inmem_broker;
pub mod kafka;
pub mod simulated;

// 主要な型を再エクスポート
pub use self::inmem_broker::{InMemoryBroker, InMemoryConnector};
pub use self::kafka::KafkaConnector;
pub use self::simulated::SimulatedWork;
