use serde::{Deserialize, Serialize};

use super::TaskKind;

/// Lower bound (inclusive) of generated task ids.
pub const TASK_ID_MIN: i64 = 1000;

/// Upper bound (inclusive) of generated task ids.
pub const TASK_ID_MAX: i64 = 9999;

/// 1 件の作業単位。producer と worker の間の wire 契約そのもの。
///
/// - `task_id` は一意ではない（衝突は許容）
/// - `timestamp` は epoch 秒（小数あり）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub task_id: i64,
    pub task_type: TaskKind,
    pub timestamp: f64,
}

impl Task {
    pub fn new(task_id: i64, task_type: TaskKind, timestamp: f64) -> Self {
        Self {
            task_id,
            task_type,
            timestamp,
        }
    }
}
