//! State - loop の状態と終了結果
//!
//! # 状態遷移
//! - producer: running → terminated
//! - worker: running → draining → terminated

use serde::{Deserialize, Serialize};
use std::fmt;

/// Exit status used when the worker had to abandon handlers at the drain deadline.
pub const FORCED_DRAIN_EXIT_CODE: u8 = 3;

/// Exit status for fatal errors (startup retry budget exhausted, etc.).
pub const FATAL_EXIT_CODE: u8 = 1;

/// LoopState は producer / worker プロセスの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    /// 生成・publish 中、または新着メッセージを受け付け中
    Running,
    /// worker のみ: 新規 dispatch を止め、in-flight handler の完了を待つ
    Draining,
    /// 接続を解放済み
    Terminated,
}

/// Role は broker 接続の用途
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Producer,
    Consumer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Producer => f.write_str("producer"),
            Role::Consumer => f.write_str("consumer"),
        }
    }
}

/// DrainOutcome は worker の drain がどう終わったか
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrainOutcome {
    /// 全 handler が期限内に完了
    Clean,
    /// 期限切れ。`abandoned` 個の handler を置き去りにした
    Forced { abandoned: usize },
}

impl DrainOutcome {
    pub fn is_clean(&self) -> bool {
        matches!(self, DrainOutcome::Clean)
    }

    /// プロセスの終了コード（clean = 0）
    pub fn exit_code(&self) -> u8 {
        match self {
            DrainOutcome::Clean => 0,
            DrainOutcome::Forced { .. } => FORCED_DRAIN_EXIT_CODE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forced_drain_is_distinguishable_by_exit_code() {
        assert_eq!(DrainOutcome::Clean.exit_code(), 0);
        assert_eq!(
            DrainOutcome::Forced { abandoned: 1 }.exit_code(),
            FORCED_DRAIN_EXIT_CODE
        );
        assert_ne!(FORCED_DRAIN_EXIT_CODE, FATAL_EXIT_CODE);
    }

    #[test]
    fn role_display() {
        assert_eq!(Role::Producer.to_string(), "producer");
        assert_eq!(Role::Consumer.to_string(), "consumer");
    }
}
