//! 可观测性：tracing 日志初始化
//!
//! 默认 info 级别，可通过 RUST_LOG 覆盖；工具审计日志由 ToolExecutor 以 JSON 字段输出。

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// 安装全局 subscriber；重复调用时保持已有的 subscriber
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_init_is_idempotent() {
        super::init();
        super::init();
        tracing::info!("observability initialized twice");
    }
}
