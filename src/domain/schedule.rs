// ==========================================
// 住院医师排班合规核心 - 排班实体
// ==========================================
// 职责: 时间块、轮转模板、排班、值班记录、周期
// 红线: 时间块生成后不可变; 轮转模板为静态参考数据
// ==========================================

use crate::domain::types::{AssignmentRole, DayPeriod, RotationCategory, SupervisionCategory};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// SchedulePeriod - 排班周期 (含首尾)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulePeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl SchedulePeriod {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn is_valid(&self) -> bool {
        self.start <= self.end
    }

    /// 周期天数 (含首尾)
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// 逐日迭代
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> {
        let start = self.start;
        let days = self.days().max(0);
        (0..days).map(move |offset| start + Duration::days(offset))
    }
}

// ==========================================
// TimeBlock - 时间块
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBlock {
    pub block_id: String,
    pub date: NaiveDate,
    pub period: DayPeriod,
}

impl TimeBlock {
    pub fn new(block_id: &str, date: NaiveDate, period: DayPeriod) -> Self {
        Self {
            block_id: block_id.to_string(),
            date,
            period,
        }
    }

    pub fn start_at(&self) -> NaiveDateTime {
        self.date.and_time(self.period.start_time())
    }
}

// ==========================================
// RotationTemplate - 轮转模板
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RotationTemplate {
    pub rotation_id: String,

    pub name: String,

    pub category: RotationCategory,

    /// 单个时间块折算工时 (轮转强度)
    pub hours_per_block: f64,

    #[serde(default)]
    pub min_duration_days: Option<i64>,

    #[serde(default)]
    pub max_duration_days: Option<i64>,

    /// 所需资质代码
    #[serde(default)]
    pub required_credentials: Vec<String>,

    /// 允许的 PGY 年资 (空表示不限)
    #[serde(default)]
    pub allowed_pgy_levels: Vec<u8>,

    #[serde(default)]
    pub supervision: SupervisionCategory,
}

impl RotationTemplate {
    pub fn new(rotation_id: &str, category: RotationCategory, hours_per_block: f64) -> Self {
        Self {
            rotation_id: rotation_id.to_string(),
            name: rotation_id.to_string(),
            category,
            hours_per_block,
            min_duration_days: None,
            max_duration_days: None,
            required_credentials: Vec::new(),
            allowed_pgy_levels: Vec::new(),
            supervision: SupervisionCategory::Standard,
        }
    }

    pub fn allows_pgy(&self, pgy_level: Option<u8>) -> bool {
        if self.allowed_pgy_levels.is_empty() {
            return true;
        }
        pgy_level.map_or(false, |level| self.allowed_pgy_levels.contains(&level))
    }
}

// ==========================================
// Assignment - 排班
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Assignment {
    pub person_id: String,

    pub block_id: String,

    #[serde(default)]
    pub rotation_id: Option<String>,

    pub role: AssignmentRole,

    /// 本时间块执行的操作 (用于操作带教与操作量统计)
    #[serde(default)]
    pub procedure_code: Option<String>,
}

impl Assignment {
    pub fn primary(person_id: &str, block_id: &str, rotation_id: Option<&str>) -> Self {
        Self {
            person_id: person_id.to_string(),
            block_id: block_id.to_string(),
            rotation_id: rotation_id.map(|s| s.to_string()),
            role: AssignmentRole::Primary,
            procedure_code: None,
        }
    }

    pub fn supervising(person_id: &str, block_id: &str, rotation_id: Option<&str>) -> Self {
        Self {
            role: AssignmentRole::Supervising,
            ..Self::primary(person_id, block_id, rotation_id)
        }
    }

    pub fn with_procedure(mut self, procedure_code: &str) -> Self {
        self.procedure_code = Some(procedure_code.to_string());
        self
    }

    /// 排序键 (用于确定性比较)
    pub fn sort_key(&self) -> (&str, &str, AssignmentRole) {
        (self.block_id.as_str(), self.person_id.as_str(), self.role)
    }
}

// ==========================================
// CallRecord - 值班记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CallRecord {
    pub person_id: String,
    pub call_date: NaiveDate,
}

impl CallRecord {
    pub fn new(person_id: &str, call_date: NaiveDate) -> Self {
        Self {
            person_id: person_id.to_string(),
            call_date,
        }
    }
}

// ==========================================
// MoonlightingEntry - 院外兼职工时
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoonlightingEntry {
    pub date: NaiveDate,
    pub hours: f64,
}
