//! Ports - 抽象化レイヤー
//!
//! 各 trait は外部システム（Kafka broker、時刻、タスク処理）への
//! インターフェースを提供し、実装の詳細を隠蔽します。

pub mod broker;
pub mod clock;
pub mod handler;

// 主要な trait を再エクスポート
pub use self::broker::{BrokerError, Connector, ConsumerEvent, ConsumerSession, ProducerSession};
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::handler::TaskHandler;
