//! SimulatedWork - 固定時間 sleep するだけの TaskHandler
//!
//! 本物の処理の代わり。完了ログが出たら「処理済み」とみなす。

use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::domain::Task;
use crate::ports::TaskHandler;

pub struct SimulatedWork {
    worker_id: String,
    delay: Duration,
}

impl SimulatedWork {
    pub fn new(worker_id: impl Into<String>, delay: Duration) -> Self {
        Self {
            worker_id: worker_id.into(),
            delay,
        }
    }
}

#[async_trait]
impl TaskHandler for SimulatedWork {
    async fn handle(&self, task: Task) {
        info!(
            worker = %self.worker_id,
            task_id = task.task_id,
            task_type = %task.task_type,
            timestamp = task.timestamp,
            "processing task"
        );
        tokio::time::sleep(self.delay).await;
        info!(
            worker = %self.worker_id,
            task_id = task.task_id,
            task_type = %task.task_type,
            "completed task"
        );
    }
}
