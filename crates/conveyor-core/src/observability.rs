//! Observability - tracing subscriber の初期化
//!
//! `RUST_LOG` があればそれを優先し、無ければ `info`。
//! 出力形式は `LogConfig::format`（text / json）。

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::{LogConfig, LogFormat};

const DEFAULT_DIRECTIVE: &str = "info";

pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
}

/// global subscriber を設定する。2 回目の呼び出しは Err。
pub fn init_tracing(config: &LogConfig) -> Result<(), TryInitError> {
    let registry = tracing_subscriber::registry().with(env_filter());
    match config.format {
        LogFormat::Text => registry.with(fmt::layer().with_target(false)).try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(false))
            .try_init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_rejected() {
        let config = LogConfig {
            format: LogFormat::Json,
        };
        // 他のテストが先に設定していても 2 回目は必ず失敗する
        let _ = init_tracing(&config);
        assert!(init_tracing(&config).is_err());
    }
}
