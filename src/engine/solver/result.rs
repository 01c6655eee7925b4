// ==========================================
// 住院医师排班合规核心 - 求解结果
// ==========================================
// 红线: 不可行与超时都是结果形态, 不是错误
// ==========================================

use crate::constraint::{Candidate, ConstraintType, Score};
use crate::domain::finding::ComplianceFinding;
use crate::engine::solver::strategy::SolverStrategy;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// 求解状态
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SolveStatus {
    /// 全部需求已满足且无硬约束违规
    Complete,
    /// 超时或启发式未能补齐; 携带未满足槽位与阻塞约束
    Partial {
        unfilled_slots: Vec<String>,
        blocking: Vec<ConstraintType>,
    },
    /// 已证明无可行解; 携带阻塞约束
    Infeasible {
        unfilled_slots: Vec<String>,
        blocking: Vec<ConstraintType>,
    },
}

impl SolveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SolveStatus::Complete => "COMPLETE",
            SolveStatus::Partial { .. } => "PARTIAL",
            SolveStatus::Infeasible { .. } => "INFEASIBLE",
        }
    }

    pub fn blocking(&self) -> &[ConstraintType] {
        match self {
            SolveStatus::Complete => &[],
            SolveStatus::Partial { blocking, .. } | SolveStatus::Infeasible { blocking, .. } => blocking,
        }
    }
}

/// 求解结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolveResult {
    /// 单次求解运行 ID (供协作方持久化关联)
    pub run_id: String,
    pub strategy: SolverStrategy,
    pub status: SolveStatus,
    pub timed_out: bool,
    /// 全部槽位已填且候选 (含快照既有排班) 无硬约束违规
    pub feasible: bool,
    /// 求解器新增的排班与值班 (不含快照既有排班)
    pub candidate: Candidate,
    pub score: Score,
    pub findings: Vec<ComplianceFinding>,
    /// 搜索节点数 / 迭代轮数
    pub iterations: u64,
    pub elapsed_ms: u64,
}

impl SolveResult {
    pub fn is_complete(&self) -> bool {
        self.status == SolveStatus::Complete
    }

    /// 跨策略比较: 可行优先, 再比评分, 再按 (block_id, person_id) 字典序
    pub fn compare(&self, other: &SolveResult) -> Ordering {
        other
            .feasible
            .cmp(&self.feasible)
            .then_with(|| self.score.cmp(&other.score))
            .then_with(|| self.candidate.tie_break_key().cmp(&other.candidate.tie_break_key()))
            .then_with(|| self.strategy.cmp(&other.strategy))
    }
}
