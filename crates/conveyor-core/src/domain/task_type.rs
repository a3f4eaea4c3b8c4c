//! TaskKind - タスク種別の固定集合
//!
//! wire 上では snake_case の文字列（`"process_data"` など）として流れます。
//! 集合外の文字列は decode 時に弾かれます。

use serde::{Deserialize, Serialize};
use std::fmt;

/// TaskKind はタスクのカテゴリ
///
/// # 種別
/// - process_data
/// - generate_report
/// - send_notification
/// - update_database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    ProcessData,
    GenerateReport,
    SendNotification,
    UpdateDatabase,
}

impl TaskKind {
    /// 全種別（generator が一様に選ぶ対象）
    pub const ALL: [TaskKind; 4] = [
        TaskKind::ProcessData,
        TaskKind::GenerateReport,
        TaskKind::SendNotification,
        TaskKind::UpdateDatabase,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::ProcessData => "process_data",
            TaskKind::GenerateReport => "generate_report",
            TaskKind::SendNotification => "send_notification",
            TaskKind::UpdateDatabase => "update_database",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
