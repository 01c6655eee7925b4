// ==========================================
// 住院医师排班合规核心 - 排班求解器
// ==========================================
// 职责: 统一入口 solve(problem, registry, deadline) -> SolveResult
// 红线: 可行性优先于惩罚最小化 (任何可行解优于任何不可行解)
// 红线: 不可行/超时以结果返回; 只有输入畸形才返回错误
// 红线: 各策略私有持有候选排班, 不共享可变搜索状态
// ==========================================

mod exact;
mod greedy;
mod problem;
mod relaxation;
mod result;
mod search;
mod strategy;

#[cfg(test)]
mod tests;

pub use problem::{CallDemand, Deadline, SlotDemand, SolveProblem};
pub use result::{SolveResult, SolveStatus};
pub use strategy::SolverStrategy;

use crate::config::ComplianceConfig;
use crate::constraint::{ConstraintRegistry, ConstraintType, Score};
use crate::error::{CoreError, CoreResult};
use crate::perf::PerfGuard;
use search::SearchSpace;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// 策略搜索产出 (供统一收尾)
pub(crate) struct SearchOutcome {
    pub choices: Vec<Option<String>>,
    pub blocking: BTreeSet<ConstraintType>,
    pub timed_out: bool,
    /// 搜索空间已穷尽 (仅精确策略)
    pub exhausted: bool,
    pub iterations: u64,
}

// ==========================================
// ScheduleSolver - 排班求解器
// ==========================================
pub struct ScheduleSolver {
    config: Arc<ComplianceConfig>,
}

impl ScheduleSolver {
    pub fn new(config: Arc<ComplianceConfig>) -> Self {
        Self { config }
    }

    /// 按配置的时间预算生成截止时刻
    pub fn default_deadline(&self) -> Deadline {
        Deadline::after_ms(self.config.solver.time_budget_ms)
    }

    /// 执行单一策略求解
    ///
    /// # 返回
    /// - `Ok(SolveResult)`: 完成 / 部分 (超时或未补齐) / 不可行
    /// - `Err(CoreError)`: 前置条件错误 (无人员、无时间块、无需求、悬空引用)
    #[instrument(skip(self, problem, registry, deadline), fields(
        strategy = %strategy,
        slots = problem.total_slots(),
        profile = registry.profile().as_str()
    ))]
    pub fn solve(
        &self,
        strategy: SolverStrategy,
        problem: &SolveProblem,
        registry: &ConstraintRegistry,
        deadline: Deadline,
    ) -> CoreResult<SolveResult> {
        let _perf = PerfGuard::new("solver.solve");
        let started = Instant::now();
        let space = SearchSpace::build(problem, registry, &self.config)?;

        // 静态可证不可行: 存在无任何候选的槽位
        let empty = space.empty_slots();
        if !empty.is_empty() {
            let blocking: BTreeSet<ConstraintType> =
                empty.iter().flat_map(|s| s.excluded_by.iter().copied()).collect();
            let unfilled_slots: Vec<String> = empty.iter().map(|s| s.label.clone()).collect();
            warn!(
                unfilled = unfilled_slots.len(),
                blocking = ?blocking,
                "存在无候选槽位, 判定不可行"
            );
            return Ok(SolveResult {
                run_id: Uuid::new_v4().to_string(),
                strategy,
                status: SolveStatus::Infeasible {
                    unfilled_slots,
                    blocking: blocking.into_iter().collect(),
                },
                timed_out: false,
                feasible: false,
                candidate: Default::default(),
                score: Score::worst(),
                findings: Vec::new(),
                iterations: 0,
                elapsed_ms: started.elapsed().as_millis() as u64,
            });
        }

        let settings = &self.config.solver;
        let outcome = match strategy {
            SolverStrategy::Exact => exact::search(&space, &deadline)?,
            SolverStrategy::Relaxation => relaxation::search(
                &space,
                &deadline,
                settings.relaxation_rounds,
                settings.relaxation_step,
            )?,
            SolverStrategy::Greedy => greedy::search(&space, &deadline, settings.max_backtracks)?,
        };

        let result = self.finalize(strategy, &space, outcome, started)?;
        info!(
            run_id = %result.run_id,
            status = result.status.as_str(),
            feasible = result.feasible,
            timed_out = result.timed_out,
            hard_violations = result.score.hard_violations,
            penalty = result.score.penalty,
            iterations = result.iterations,
            elapsed_ms = result.elapsed_ms,
            "求解完成"
        );
        Ok(result)
    }

    /// 依次运行多个策略, 取最优 (可行优先 -> 评分 -> 平局裁决键 -> 策略序)
    pub fn solve_best_of(
        &self,
        strategies: &[SolverStrategy],
        problem: &SolveProblem,
        registry: &ConstraintRegistry,
        deadline: Deadline,
    ) -> CoreResult<SolveResult> {
        let mut ordered: Vec<SolverStrategy> = if strategies.is_empty() {
            SolverStrategy::ALL.to_vec()
        } else {
            strategies.to_vec()
        };
        ordered.sort();
        ordered.dedup();

        let mut best: Option<SolveResult> = None;
        for strategy in ordered {
            let result = self.solve(strategy, problem, registry, deadline)?;
            best = match best {
                Some(current) if current.compare(&result).is_le() => Some(current),
                _ => Some(result),
            };
        }
        best.ok_or_else(|| CoreError::InvalidInput {
            field: "strategies".to_string(),
            message: "未指定求解策略".to_string(),
        })
    }

    fn finalize(
        &self,
        strategy: SolverStrategy,
        space: &SearchSpace,
        outcome: SearchOutcome,
        started: Instant,
    ) -> CoreResult<SolveResult> {
        let candidate = space.candidate_from(&outcome.choices);
        let scored = space.evaluate(&candidate)?;
        let score = scored.score();
        let unfilled_slots: Vec<String> = space
            .slots
            .iter()
            .zip(outcome.choices.iter())
            .filter(|(_, choice)| choice.is_none())
            .map(|(slot, _)| slot.label.clone())
            .collect();
        let feasible = scored.is_feasible && unfilled_slots.is_empty();

        let mut blocking = outcome.blocking;
        blocking.extend(scored.violated_hard());

        let blocking: Vec<ConstraintType> = blocking.into_iter().collect();
        let status = if outcome.exhausted && !unfilled_slots.is_empty() {
            SolveStatus::Infeasible {
                unfilled_slots,
                blocking,
            }
        } else if feasible && unfilled_slots.is_empty() && !outcome.timed_out {
            SolveStatus::Complete
        } else {
            SolveStatus::Partial {
                unfilled_slots,
                blocking,
            }
        };

        Ok(SolveResult {
            run_id: Uuid::new_v4().to_string(),
            strategy,
            status,
            timed_out: outcome.timed_out,
            feasible,
            candidate,
            score,
            findings: scored.findings,
            iterations: outcome.iterations,
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
    }
}
