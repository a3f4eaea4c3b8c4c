//! TaskHandler port - 受信した Task を処理する
//!
//! 戻り値はない。ack は受信時点で済んでいる（worker は offset commit をしない）ので、
//! 処理の成否が配送に影響することはない。

use async_trait::async_trait;

use crate::domain::Task;

#[async_trait]
pub trait TaskHandler: Send + Sync + 'static {
    async fn handle(&self, task: Task);
}
