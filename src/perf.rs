// ==========================================
// 住院医师排班合规核心 - 性能统计
// ==========================================
// 职责: 记录单次操作耗时 + 期间约束评估次数; 超过阈值记慢操作
// ==========================================

use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

static SLOW_OP_THRESHOLD_MS: AtomicU64 = AtomicU64::new(0);

thread_local! {
    static PERF_DEPTH: Cell<u32> = Cell::new(0);
    static EVAL_COUNT: Cell<u64> = Cell::new(0);
}

/// 设置慢操作阈值 (毫秒, 0 表示关闭)
pub fn set_slow_threshold_ms(threshold_ms: u64) {
    SLOW_OP_THRESHOLD_MS.store(threshold_ms, Ordering::Relaxed);
}

/// 记录一次约束评估 (仅在存在活动 Guard 时计数)
pub fn record_evaluation() {
    let active = PERF_DEPTH.with(|d| d.get() > 0);
    if active {
        EVAL_COUNT.with(|c| c.set(c.get().saturating_add(1)));
    }
}

/// 当前线程累计评估次数
pub fn evaluation_count() -> u64 {
    EVAL_COUNT.with(|c| c.get())
}

/// 性能统计 Guard: 记录 elapsed_ms + 约束评估次数
///
/// 使用方式:
/// ```ignore
/// let _perf = residency_compliance::perf::PerfGuard::new("orchestrator.validate");
/// // do work...
/// ```
pub struct PerfGuard {
    op: &'static str,
    start: Instant,
    eval_start: u64,
}

impl PerfGuard {
    pub fn new(op: &'static str) -> Self {
        PERF_DEPTH.with(|d| d.set(d.get().saturating_add(1)));
        Self {
            op,
            start: Instant::now(),
            eval_start: evaluation_count(),
        }
    }
}

impl Drop for PerfGuard {
    fn drop(&mut self) {
        let elapsed_ms = self.start.elapsed().as_millis() as u64;
        let evaluations = evaluation_count().saturating_sub(self.eval_start);

        tracing::info!(
            target: "perf",
            op = self.op,
            elapsed_ms,
            evaluations,
            "done"
        );

        let threshold = SLOW_OP_THRESHOLD_MS.load(Ordering::Relaxed);
        if threshold > 0 && elapsed_ms >= threshold {
            tracing::warn!(
                target: "slow_op",
                op = self.op,
                elapsed_ms,
                threshold_ms = threshold,
                "slow operation"
            );
        }

        PERF_DEPTH.with(|d| d.set(d.get().saturating_sub(1)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluations_counted_only_inside_guard() {
        let before = evaluation_count();
        record_evaluation();
        assert_eq!(evaluation_count(), before);

        {
            let _perf = PerfGuard::new("test.op");
            record_evaluation();
            record_evaluation();
        }
        assert_eq!(evaluation_count(), before + 2);
    }
}
