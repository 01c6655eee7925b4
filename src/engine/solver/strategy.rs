// ==========================================
// 住院医师排班合规核心 - 求解策略定义
// ==========================================
// 用途: 求解策略为封闭集合, 由调用方显式选择, 不做运行期类型探测
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

/// 求解策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverStrategy {
    /// 精确搜索 (时间预算内穷举, 单调硬约束剪枝)
    Exact,
    /// 松弛求解 (硬约束转乘子惩罚, 迭代收紧)
    Relaxation,
    /// 贪心 + 局部回溯
    Greedy,
}

impl SolverStrategy {
    pub const ALL: [SolverStrategy; 3] = [
        SolverStrategy::Exact,
        SolverStrategy::Relaxation,
        SolverStrategy::Greedy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SolverStrategy::Exact => "exact",
            SolverStrategy::Relaxation => "relaxation",
            SolverStrategy::Greedy => "greedy",
        }
    }

    pub fn title_cn(&self) -> &'static str {
        match self {
            SolverStrategy::Exact => "精确搜索",
            SolverStrategy::Relaxation => "松弛求解",
            SolverStrategy::Greedy => "贪心回溯",
        }
    }
}

impl Default for SolverStrategy {
    fn default() -> Self {
        SolverStrategy::Greedy
    }
}

impl fmt::Display for SolverStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SolverStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "exact" | "cp" => Ok(SolverStrategy::Exact),
            "relaxation" | "lp" | "lagrangian" => Ok(SolverStrategy::Relaxation),
            "greedy" | "heuristic" => Ok(SolverStrategy::Greedy),
            other => Err(format!("未知求解策略: {}", other)),
        }
    }
}
