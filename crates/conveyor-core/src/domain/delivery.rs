//! Delivery - broker が返すメタデータ
//!
//! DeliveryHandle は観測用のみ（アプリケーション上の意味は持たない）。

use serde::{Deserialize, Serialize};
use std::fmt;

/// publish 成功時に broker が割り当てた位置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeliveryHandle {
    pub partition: i32,
    pub offset: i64,
}

impl DeliveryHandle {
    pub fn new(partition: i32, offset: i64) -> Self {
        Self { partition, offset }
    }
}

impl fmt::Display for DeliveryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "partition={} offset={}", self.partition, self.offset)
    }
}

/// consumer が受け取った 1 件（decode 前の raw bytes）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub payload: Vec<u8>,
    pub handle: DeliveryHandle,
}
