// ==========================================
// 住院医师排班合规核心 - 合规配置
// ==========================================
// 职责: 全部阈值/策略参数, 支持 JSON 局部覆写
// 红线: 默认值即法规常量; 配置只读, 运行期不修改
// ==========================================

use crate::constraint::ConstraintType;
use crate::error::{CoreError, CoreResult};
use crate::domain::types::RotationCategory;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// ComplianceConfig - 顶层配置
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComplianceConfig {
    #[serde(default)]
    pub work_hours: WorkHourLimits,

    #[serde(default)]
    pub supervision: SupervisionPolicy,

    #[serde(default)]
    pub call: CallPolicy,

    #[serde(default)]
    pub leave: LeavePolicy,

    #[serde(default)]
    pub rotation: RotationPolicy,

    #[serde(default)]
    pub solver: SolverSettings,
}

impl ComplianceConfig {
    /// 从 JSON 文本加载 (缺省字段取默认值), 并做一致性校验
    pub fn from_json_str(raw: &str) -> CoreResult<Self> {
        let config: ComplianceConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// 配置一致性校验
    pub fn validate(&self) -> CoreResult<()> {
        let wh = &self.work_hours;
        if wh.rolling_window_days < 7 || wh.rolling_window_days % 7 != 0 {
            return Err(invalid(
                "work_hours.rolling_window_days",
                format!("必须为 7 的正整数倍, 实际 {}", wh.rolling_window_days),
            ));
        }
        if !(wh.weekly_hour_ceiling > 0.0) {
            return Err(invalid("work_hours.weekly_hour_ceiling", "必须大于 0"));
        }
        let mut last = 0.0;
        for tier in &wh.warning_tiers {
            if *tier < last || *tier > wh.weekly_hour_ceiling {
                return Err(invalid(
                    "work_hours.warning_tiers",
                    "预警档位必须升序且不超过上限",
                ));
            }
            last = *tier;
        }
        if wh.max_duty_hours <= 0.0 || wh.handoff_allowance_hours < 0.0 || wh.min_rest_hours < 0.0 {
            return Err(invalid("work_hours", "班次时长/交接/休息参数无效"));
        }

        let sp = &self.supervision;
        if sp.units_per_faculty == 0 {
            return Err(invalid("supervision.units_per_faculty", "必须大于 0"));
        }
        if sp.pgy1_load_units < sp.senior_load_units {
            return Err(invalid(
                "supervision.pgy1_load_units",
                "PGY-1 带教负荷不得低于高年资",
            ));
        }

        let cp = &self.call;
        if cp.window_days <= 0 || cp.max_calls_per_window == 0 || cp.max_consecutive_calls == 0 {
            return Err(invalid("call", "值班窗口/频次参数必须为正"));
        }
        if !(cp.equity_imbalance_threshold >= 1.0) {
            return Err(invalid("call.equity_imbalance_threshold", "必须不小于 1.0"));
        }

        let rp = &self.rotation;
        if rp.min_rotation_days <= 0 {
            return Err(invalid("rotation.min_rotation_days", "必须为正"));
        }
        if !(1..=12).contains(&rp.academic_year_start_month) {
            return Err(invalid("rotation.academic_year_start_month", "必须在 1-12"));
        }

        for (kind, weight) in &self.solver.weight_overrides {
            if !weight.is_finite() || *weight < 0.0 {
                return Err(invalid(
                    "solver.weight_overrides",
                    format!("{} 权重无效: {}", kind, weight),
                ));
            }
        }

        Ok(())
    }
}

fn invalid(key: &str, message: impl Into<String>) -> CoreError {
    CoreError::InvalidConfig {
        key: key.to_string(),
        message: message.into(),
    }
}

// ==========================================
// 工时限制
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkHourLimits {
    /// 滚动窗口天数
    pub rolling_window_days: i64,
    /// 周均工时上限
    pub weekly_hour_ceiling: f64,
    /// 预警档位 (升序, 不超过上限)
    pub warning_tiers: Vec<f64>,
    /// 单次连续值守上限
    pub max_duty_hours: f64,
    /// 交接宽限
    pub handoff_allowance_hours: f64,
    /// 两次值守之间最短连续休息
    pub min_rest_hours: f64,
    /// 间隔不超过该值的相邻时段合并为同一值守
    pub duty_merge_gap_hours: f64,
    /// 夜间值班折算工时
    pub call_shift_hours: f64,
    /// 未指定轮转时单个时间块折算工时
    pub default_block_hours: f64,
}

impl Default for WorkHourLimits {
    fn default() -> Self {
        Self {
            rolling_window_days: 28,
            weekly_hour_ceiling: 80.0,
            warning_tiers: vec![75.0, 78.0, 80.0],
            max_duty_hours: 24.0,
            handoff_allowance_hours: 4.0,
            min_rest_hours: 10.0,
            duty_merge_gap_hours: 1.0,
            call_shift_hours: 12.0,
            default_block_hours: 5.0,
        }
    }
}

impl WorkHourLimits {
    /// 单次值守硬上限 (含交接)
    pub fn duty_hard_ceiling(&self) -> f64 {
        self.max_duty_hours + self.handoff_allowance_hours
    }
}

// ==========================================
// 带教策略 (分数负荷)
// ==========================================
// required = ceil((pgy1_units * PGY1 + senior_units * PGY2/3) / units_per_faculty)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisionPolicy {
    pub pgy1_load_units: u32,
    pub senior_load_units: u32,
    pub units_per_faculty: u32,
}

impl Default for SupervisionPolicy {
    fn default() -> Self {
        Self {
            pgy1_load_units: 2,
            senior_load_units: 1,
            units_per_faculty: 4,
        }
    }
}

// ==========================================
// 值班策略
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallPolicy {
    pub window_days: i64,
    /// 窗口内值班次数上限 (约每三晚一次)
    pub max_calls_per_window: u32,
    pub max_consecutive_calls: u32,
    /// 非连续值班之间至少间隔的空闲天数
    pub min_days_between_calls: i64,
    /// 夜班后强制恢复天数
    pub post_call_rest_days: i64,
    /// 公平性预警阈值 (max / mean)
    pub equity_imbalance_threshold: f64,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            window_days: 28,
            max_calls_per_window: 9,
            max_consecutive_calls: 2,
            min_days_between_calls: 2,
            post_call_rest_days: 1,
            equity_imbalance_threshold: 1.5,
        }
    }
}

// ==========================================
// 缺勤策略
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeavePolicy {
    /// 病假 (medical) 超过该天数才阻断
    pub medical_blocking_after_days: i64,
    /// 事假 (sick) 超过该天数才阻断
    pub sick_blocking_after_days: i64,
    /// 派遣返岗后强制恢复天数
    pub post_deployment_recovery_days: i64,
}

impl Default for LeavePolicy {
    fn default() -> Self {
        Self {
            medical_blocking_after_days: 7,
            sick_blocking_after_days: 3,
            post_deployment_recovery_days: 7,
        }
    }
}

// ==========================================
// 轮转策略
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationPolicy {
    /// 轮转块最短天数
    pub min_rotation_days: i64,
    /// 学年起始月份 (默认 7 月 1 日)
    pub academic_year_start_month: u32,
    /// 进度预警容忍系数 (实际 < 期望 * 系数 时预警)
    pub trend_tolerance: f64,
    pub requirements: Vec<RotationRequirement>,
    pub sequences: Vec<SequenceRule>,
    pub procedure_targets: Vec<ProcedureTarget>,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            min_rotation_days: 7,
            academic_year_start_month: 7,
            trend_tolerance: 0.9,
            requirements: Vec::new(),
            sequences: Vec::new(),
            procedure_targets: Vec::new(),
        }
    }
}

/// PGY 年资对应的轮转块最低数量
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RotationRequirement {
    pub pgy_level: u8,
    pub category: RotationCategory,
    pub min_blocks: u32,
}

/// 轮转顺序规则
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", tag = "rule")]
pub enum SequenceRule {
    /// `first` 必须先于 `then` 开始
    Before { first: String, then: String },
    /// 同一轮转两次之间至少间隔天数
    MinSpacing { rotation_id: String, min_days: i64 },
}

/// PGY 年资对应的操作量目标
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcedureTarget {
    pub pgy_level: u8,
    pub procedure_code: String,
    pub annual_target: u32,
}

// ==========================================
// 求解器参数
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    /// 求解时间预算 (毫秒)
    pub time_budget_ms: u64,
    /// 贪心策略最大回溯次数
    pub max_backtracks: u32,
    /// 松弛策略最大迭代轮数
    pub relaxation_rounds: u32,
    /// 拉格朗日乘子步长
    pub relaxation_step: f64,
    /// 软约束权重覆写
    pub weight_overrides: BTreeMap<ConstraintType, f64>,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            time_budget_ms: 5_000,
            max_backtracks: 200,
            relaxation_rounds: 40,
            relaxation_step: 50.0,
            weight_overrides: BTreeMap::new(),
        }
    }
}
