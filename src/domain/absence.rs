// ==========================================
// 住院医师排班合规核心 - 缺勤实体
// ==========================================
// 红线: 阻断型缺勤期间不得有任何排班
// ==========================================

use crate::domain::types::AbsenceType;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Absence {
    pub person_id: String,

    pub absence_type: AbsenceType,

    pub start_date: NaiveDate,

    /// 结束日期 (含当日)
    pub end_date: NaiveDate,

    /// 显式阻断标记, 优先于类型推导
    #[serde(default)]
    pub is_blocking: Option<bool>,

    /// 返岗日期为暂定
    #[serde(default)]
    pub return_date_tentative: bool,

    /// 返岗已确认
    #[serde(default)]
    pub return_confirmed: bool,
}

impl Absence {
    pub fn new(
        person_id: &str,
        absence_type: AbsenceType,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Self {
        Self {
            person_id: person_id.to_string(),
            absence_type,
            start_date,
            end_date,
            is_blocking: None,
            return_date_tentative: false,
            return_confirmed: false,
        }
    }

    /// 缺勤天数 (含首尾)
    pub fn duration_days(&self) -> i64 {
        (self.end_date - self.start_date).num_days() + 1
    }

    pub fn covers(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date <= self.end_date
    }
}
