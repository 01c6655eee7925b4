// ==========================================
// 住院医师排班合规核心 - 日志
// ==========================================
// 职责: 安装 tracing 订阅器 (文本 / JSON / 测试)
// 红线: 核心库只产出事件, 订阅器由调用方在进程入口安装一次
// ==========================================

use tracing_subscriber::{fmt, EnvFilter};

/// 未设置 RUST_LOG 时的默认过滤: 引擎 info, 慢操作告警始终可见
pub const DEFAULT_DIRECTIVES: &str = "info,slow_op=warn";

fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// 文本日志 (带 target 与行号)
///
/// 典型用法: 入口处安装后再构建编排器
/// ```no_run
/// use residency_compliance::{logging, ComplianceConfig, ComplianceOrchestrator};
/// use std::sync::Arc;
///
/// logging::init();
/// let orchestrator = ComplianceOrchestrator::new(Arc::new(ComplianceConfig::default()));
/// # let _ = orchestrator;
/// ```
///
/// 已安装过订阅器时返回 false
pub fn init() -> bool {
    fmt()
        .with_env_filter(env_filter(DEFAULT_DIRECTIVES))
        .with_target(true)
        .with_line_number(true)
        .try_init()
        .is_ok()
}

/// JSON 日志: 事件字段 (person_id, run_id, elapsed_ms ...) 原样输出, 供协作方采集
pub fn init_json() -> bool {
    fmt()
        .json()
        .with_env_filter(env_filter(DEFAULT_DIRECTIVES))
        .with_target(true)
        .with_current_span(true)
        .try_init()
        .is_ok()
}

/// 测试日志: debug 级别, 输出交给测试框架捕获; 重复调用无副作用
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_install_is_rejected() {
        init_test();
        // 测试订阅器已占用全局槽位
        assert!(!init());
        assert!(!init_json());
    }
}
