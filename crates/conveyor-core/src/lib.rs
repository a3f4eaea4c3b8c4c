//! conveyor-core
//!
//! Kafka の単一 partition を挟んだ producer / worker パイプラインの部品。
//!
//! # モジュール構成
//! - **domain**: Task、wire codec、loop 状態、エラー
//! - **ports**: 抽象化レイヤー（Connector / ProducerSession / ConsumerSession, Clock, TaskHandler）
//! - **app**: 制御ループ（connector, producer_loop, worker_loop, shutdown, status）
//! - **impls**: 実装（KafkaConnector、開発用 InMemoryBroker など）
//! - **config**: ファイル + 環境変数からの設定
//! - **observability**: tracing の初期化
//! - **retry**: 固定間隔 / 指数の retry policy

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod observability;
pub mod ports;
pub mod retry;
