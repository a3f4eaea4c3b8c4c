//! App - アプリケーション層
//!
//! ports を組み合わせて producer / worker の制御ループを実装します。
//!
//! # 主要コンポーネント
//! - **BrokerConnector**: retry 付きの接続確立と publish
//! - **ProducerLoop**: タスク生成と定周期 publish
//! - **WorkerLoop**: 受信 → decode → 並行 dispatch → drain
//! - **ShutdownCoordinator**: 終了シグナルの伝搬

pub mod connector;
pub mod producer_loop;
pub mod shutdown;
pub mod status;
pub mod worker_loop;

// 主要な型を再エクスポート
pub use self::connector::{BrokerConnector, ReliableProducer};
pub use self::producer_loop::{ProducerLoop, ProducerSettings};
pub use self::shutdown::{ShutdownCoordinator, ShutdownSignal};
pub use self::status::{ProducerCounts, ProducerStats, WorkerCounts, WorkerStats};
pub use self::worker_loop::{
    DeliveryErrorPolicy, DispatchMode, WorkerLoop, WorkerReport, WorkerSettings,
};
