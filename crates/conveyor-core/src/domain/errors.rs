//! Errors - エラー型と分類
//!
//! # 分類
//! - BrokerUnavailable: 接続 retry を使い切った（致命的、プロセス終了）
//! - PublishFailure: 一時的な publish 失敗（producer が再接続して継続）
//! - MalformedMessage: decode 失敗（worker が skip して継続）
//! - ConsumerDelivery: broker 側の consume エラー（policy 次第）
//!
//! drain の期限切れはエラーではなく `DrainOutcome::Forced` で表します。

use thiserror::Error;

use super::Role;
use crate::ports::BrokerError;

/// CodecError は Task の encode/decode エラー
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed task record: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("timestamp {0} cannot be encoded")]
    NonFiniteTimestamp(f64),
}

/// PipelineError は producer / worker プロセスのエラー
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("broker unavailable for {role} after {attempts} attempts: {last_error}")]
    BrokerUnavailable {
        role: Role,
        attempts: u32,
        #[source]
        last_error: BrokerError,
    },

    #[error("publish failed: {0}")]
    PublishFailure(#[source] BrokerError),

    #[error(transparent)]
    MalformedMessage(#[from] CodecError),

    #[error("consumer delivery error: {0}")]
    ConsumerDelivery(#[source] BrokerError),

    #[error("invalid configuration: {0}")]
    Config(#[from] config::ConfigError),
}

impl PipelineError {
    /// プロセス終了を引き起こすエラーか
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PipelineError::BrokerUnavailable { .. }
                | PipelineError::ConsumerDelivery(_)
                | PipelineError::Config(_)
        )
    }
}
