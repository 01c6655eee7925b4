// ==========================================
// 住院医师排班合规核心 - 人员实体
// ==========================================
// 红线: 周期内人员不删除, 仅停用 (active=false)
// ==========================================

use crate::domain::types::{CredentialKind, PersonRole};
use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

// ==========================================
// Credential - 资质
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    /// 资质代码 (操作代码或专科代码)
    pub code: String,

    pub kind: CredentialKind,

    /// 生效日期 (None 表示不限)
    #[serde(default)]
    pub valid_from: Option<NaiveDate>,

    /// 失效日期 (含当日; None 表示不限)
    #[serde(default)]
    pub valid_until: Option<NaiveDate>,
}

impl Credential {
    pub fn new(code: &str, kind: CredentialKind) -> Self {
        Self {
            code: code.to_string(),
            kind,
            valid_from: None,
            valid_until: None,
        }
    }

    /// 指定日期是否有效
    pub fn is_valid_on(&self, date: NaiveDate) -> bool {
        self.valid_from.map_or(true, |from| date >= from)
            && self.valid_until.map_or(true, |until| date <= until)
    }
}

// ==========================================
// PreferenceSet - 个人偏好
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreferenceSet {
    /// 希望避开的日期 (普通排班与值班均适用)
    #[serde(default)]
    pub avoid_dates: Vec<NaiveDate>,

    /// 希望避开的值班星期
    #[serde(default)]
    pub avoid_call_weekdays: Vec<Weekday>,
}

// ==========================================
// Person - 人员
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub person_id: String,

    pub name: String,

    pub role: PersonRole,

    /// PGY 年资 (1-3), 仅住院医师
    #[serde(default)]
    pub pgy_level: Option<u8>,

    #[serde(default)]
    pub credentials: Vec<Credential>,

    #[serde(default)]
    pub preferences: PreferenceSet,

    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Person {
    pub fn resident(person_id: &str, name: &str, pgy_level: u8) -> Self {
        Self {
            person_id: person_id.to_string(),
            name: name.to_string(),
            role: PersonRole::Resident,
            pgy_level: Some(pgy_level),
            credentials: Vec::new(),
            preferences: PreferenceSet::default(),
            active: true,
        }
    }

    pub fn faculty(person_id: &str, name: &str) -> Self {
        Self {
            person_id: person_id.to_string(),
            name: name.to_string(),
            role: PersonRole::Faculty,
            pgy_level: None,
            credentials: Vec::new(),
            preferences: PreferenceSet::default(),
            active: true,
        }
    }

    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credentials.push(credential);
        self
    }

    pub fn is_resident(&self) -> bool {
        self.role == PersonRole::Resident
    }

    pub fn is_faculty(&self) -> bool {
        self.role == PersonRole::Faculty
    }

    /// PGY-1 在带教负荷中按双倍计算
    pub fn is_pgy1(&self) -> bool {
        self.is_resident() && self.pgy_level == Some(1)
    }

    /// 指定日期是否持有某类有效资质
    pub fn holds_credential(&self, code: &str, kind: CredentialKind, date: NaiveDate) -> bool {
        self.credentials
            .iter()
            .any(|c| c.kind == kind && c.code == code && c.is_valid_on(date))
    }

    /// 指定日期是否持有某代码的有效资质 (不区分类别)
    pub fn holds_any_credential(&self, code: &str, date: NaiveDate) -> bool {
        self.credentials
            .iter()
            .any(|c| c.code == code && c.is_valid_on(date))
    }
}
