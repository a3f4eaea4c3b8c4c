//! Shutdown - 終了シグナルの受付と loop への伝搬
//!
//! - `ShutdownCoordinator::trigger()` で全 loop に停止を要求
//! - loop 側は `ShutdownSignal::wait()` を他の待ちと select で競合させる
//! - OS シグナルは SIGINT / SIGTERM のみ（Unix 以外は Ctrl-C）

use tokio::sync::watch;
use tracing::{info, warn};

/// 停止要求の送り手。clone しても同じチャンネルを共有する。
#[derive(Clone)]
pub struct ShutdownCoordinator {
    tx: watch::Sender<bool>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// 停止を要求（2 回目以降は何もしない）
    pub fn trigger(&self) {
        self.tx.send_if_modified(|requested| {
            if *requested {
                false
            } else {
                *requested = true;
                true
            }
        });
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }

    /// SIGINT / SIGTERM を待って trigger する task を起動
    pub fn spawn_signal_listener(&self) -> tokio::task::JoinHandle<()> {
        let coordinator = self.clone();
        tokio::spawn(async move {
            match wait_for_termination_signal().await {
                Ok(()) => info!("termination signal received"),
                Err(e) => warn!(error = %e, "failed to install signal handlers; shutting down"),
            }
            coordinator.trigger();
        })
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// 停止要求の受け手
#[derive(Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// 停止要求が来るまで待つ
    ///
    /// coordinator が全て drop された場合も（もう誰も止められないので）戻る。
    pub async fn wait(&mut self) {
        let _ = self.rx.wait_for(|requested| *requested).await;
    }
}

#[cfg(unix)]
async fn wait_for_termination_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::select! {
        _ = sigint.recv()  => {},
        _ = sigterm.recv() => {},
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_termination_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn trigger_wakes_waiters() {
        let coordinator = ShutdownCoordinator::new();
        let mut a = coordinator.signal();
        let mut b = coordinator.signal();

        let waiters = tokio::spawn(async move {
            a.wait().await;
            b.wait().await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!coordinator.is_triggered());
        coordinator.trigger();

        tokio::time::timeout(Duration::from_secs(1), waiters)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn signal_created_after_trigger_is_already_set() {
        let coordinator = ShutdownCoordinator::new();
        coordinator.trigger();
        coordinator.trigger();

        let mut late = coordinator.signal();
        assert!(late.is_triggered());
        late.wait().await;
    }

    #[tokio::test]
    async fn dropped_coordinator_releases_waiters() {
        let coordinator = ShutdownCoordinator::new();
        let mut signal = coordinator.signal();
        drop(coordinator);

        tokio::time::timeout(Duration::from_secs(1), signal.wait())
            .await
            .unwrap();
    }
}
