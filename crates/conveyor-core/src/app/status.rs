//! Status - loop の観測用カウンタ
//!
//! loop と handler task が共有する唯一の可変状態。全て atomic。

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

#[derive(Debug, Default)]
pub struct ProducerStats {
    published: AtomicU64,
    publish_failures: AtomicU64,
    reconnects: AtomicU64,
}

impl ProducerStats {
    pub(crate) fn record_published(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_publish_failure(&self) {
        self.publish_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ProducerCounts {
        ProducerCounts {
            published: self.published.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProducerCounts {
    pub published: u64,
    pub publish_failures: u64,
    pub reconnects: u64,
}

#[derive(Debug, Default)]
pub struct WorkerStats {
    received: AtomicU64,
    dispatched: AtomicU64,
    completed: AtomicU64,
    malformed: AtomicU64,
    delivery_errors: AtomicU64,
    dropped: AtomicU64,
    resubscribes: AtomicU64,
}

impl WorkerStats {
    pub(crate) fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dispatched(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_malformed(&self) {
        self.malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delivery_error(&self) {
        self.delivery_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_resubscribe(&self) {
        self.resubscribes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> WorkerCounts {
        WorkerCounts {
            received: self.received.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            delivery_errors: self.delivery_errors.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            resubscribes: self.resubscribes.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerCounts {
    pub received: u64,
    pub dispatched: u64,
    pub completed: u64,
    pub malformed: u64,
    pub delivery_errors: u64,
    /// 受信したが drain 開始のため dispatch しなかった件数
    pub dropped: u64,
    /// delivery error で終わった stream を開き直した回数
    pub resubscribes: u64,
}
