// ==========================================
// 住院医师排班合规核心 - 求解问题定义
// ==========================================
// 输入: 快照 (已有排班视为固定) + 时间块需求 + 值班需求
// 红线: 求解期间快照只读, 候选排班由策略私有持有
// ==========================================

use crate::domain::schedule::SchedulePeriod;
use crate::domain::snapshot::ScheduleSnapshot;
use crate::domain::types::AssignmentRole;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// 时间块人力需求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotDemand {
    pub block_id: String,

    #[serde(default)]
    pub rotation_id: Option<String>,

    pub role: AssignmentRole,

    /// 需求人数
    pub headcount: u32,

    /// 候选人员 (为空时按角色取在岗人员池)
    #[serde(default)]
    pub candidates: Vec<String>,
}

impl SlotDemand {
    pub fn primary(block_id: &str, rotation_id: Option<&str>, headcount: u32) -> Self {
        Self {
            block_id: block_id.to_string(),
            rotation_id: rotation_id.map(|s| s.to_string()),
            role: AssignmentRole::Primary,
            headcount,
            candidates: Vec::new(),
        }
    }

    pub fn supervising(block_id: &str, rotation_id: Option<&str>, headcount: u32) -> Self {
        Self {
            role: AssignmentRole::Supervising,
            ..Self::primary(block_id, rotation_id, headcount)
        }
    }

    pub fn with_candidates(mut self, candidates: &[&str]) -> Self {
        self.candidates = candidates.iter().map(|s| s.to_string()).collect();
        self
    }
}

/// 夜间值班需求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallDemand {
    pub date: NaiveDate,
    pub headcount: u32,
    #[serde(default)]
    pub candidates: Vec<String>,
}

impl CallDemand {
    pub fn new(date: NaiveDate, headcount: u32) -> Self {
        Self {
            date,
            headcount,
            candidates: Vec::new(),
        }
    }
}

/// 求解问题
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolveProblem {
    pub snapshot: ScheduleSnapshot,

    #[serde(default)]
    pub demands: Vec<SlotDemand>,

    #[serde(default)]
    pub call_demands: Vec<CallDemand>,

    /// 评估周期 (缺省取时间块覆盖范围)
    #[serde(default)]
    pub period: Option<SchedulePeriod>,
}

impl SolveProblem {
    pub fn new(snapshot: ScheduleSnapshot) -> Self {
        Self {
            snapshot,
            demands: Vec::new(),
            call_demands: Vec::new(),
            period: None,
        }
    }

    pub fn with_demand(mut self, demand: SlotDemand) -> Self {
        self.demands.push(demand);
        self
    }

    pub fn with_call_demand(mut self, demand: CallDemand) -> Self {
        self.call_demands.push(demand);
        self
    }

    pub fn total_slots(&self) -> u32 {
        self.demands.iter().map(|d| d.headcount).sum::<u32>()
            + self.call_demands.iter().map(|d| d.headcount).sum::<u32>()
    }
}

// ==========================================
// Deadline - 协作式超时
// ==========================================
// 策略在搜索循环中轮询, 超时后带部分结果退出
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Option<Instant>,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Some(Instant::now() + budget),
        }
    }

    pub fn after_ms(budget_ms: u64) -> Self {
        Self::after(Duration::from_millis(budget_ms))
    }

    /// 不设时限
    pub fn unbounded() -> Self {
        Self { at: None }
    }

    pub fn expired(&self) -> bool {
        self.at.map_or(false, |at| Instant::now() >= at)
    }
}
