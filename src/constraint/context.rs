// ==========================================
// 住院医师排班合规核心 - 约束评估上下文
// ==========================================
// 职责: 候选排班 + 只读索引 + 配置, 供硬/软约束评估共用
// ==========================================

use crate::config::ComplianceConfig;
use crate::domain::person::Person;
use crate::domain::schedule::{Assignment, CallRecord, SchedulePeriod};
use crate::domain::snapshot::SnapshotIndex;
use crate::domain::types::DayPeriod;
use crate::engine::work_hour::WorkHourValidator;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// Candidate - 候选排班
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub assignments: Vec<Assignment>,
    #[serde(default)]
    pub calls: Vec<CallRecord>,
}

impl Candidate {
    pub fn new(assignments: Vec<Assignment>, calls: Vec<CallRecord>) -> Self {
        Self { assignments, calls }
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty() && self.calls.is_empty()
    }

    /// 规范化排序 (确定性比较用)
    pub fn normalize(&mut self) {
        self.assignments.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        self.calls.sort_by(|a, b| (a.call_date, &a.person_id).cmp(&(b.call_date, &b.person_id)));
    }

    /// 平局裁决键: (block_id, person_id) 字典序
    pub fn tie_break_key(&self) -> Vec<(String, String)> {
        let mut key: Vec<(String, String)> = self
            .assignments
            .iter()
            .map(|a| (a.block_id.clone(), a.person_id.clone()))
            .chain(
                self.calls
                    .iter()
                    .map(|c| (c.call_date.to_string(), c.person_id.clone())),
            )
            .collect();
        key.sort();
        key
    }
}

// ==========================================
// EvaluationContext - 评估上下文
// ==========================================
pub struct EvaluationContext<'a> {
    pub index: &'a SnapshotIndex<'a>,
    pub config: &'a ComplianceConfig,
    pub period: SchedulePeriod,
}

impl<'a> EvaluationContext<'a> {
    pub fn new(index: &'a SnapshotIndex<'a>, config: &'a ComplianceConfig, period: SchedulePeriod) -> Self {
        Self {
            index,
            config,
            period,
        }
    }

    /// 在岗住院医师池 (按 person_id 排序)
    pub fn resident_pool(&self) -> Vec<&'a Person> {
        self.index
            .residents()
            .into_iter()
            .filter(|p| p.active)
            .collect()
    }

    /// 周期内计入值守的排班日期 (去重排序)
    pub fn duty_dates(&self, person_id: &str) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = self
            .index
            .assignments_for_person(person_id)
            .iter()
            .filter(|a| a.role.counts_as_duty())
            .filter_map(|a| self.index.assignment_date(a))
            .filter(|d| self.period.contains(*d))
            .collect();
        dates.sort();
        dates.dedup();
        dates
    }

    /// 周期内日间 (非夜间时段) 计入值守的排班日期
    pub fn day_work_dates(&self, person_id: &str) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = self
            .index
            .assignments_for_person(person_id)
            .iter()
            .filter(|a| a.role.counts_as_duty())
            .filter_map(|a| self.index.block(&a.block_id))
            .filter(|b| b.period != DayPeriod::Night && self.period.contains(b.date))
            .map(|b| b.date)
            .collect();
        dates.sort();
        dates.dedup();
        dates
    }

    /// 周期内值班日期
    pub fn call_dates(&self, person_id: &str) -> Vec<NaiveDate> {
        self.index
            .call_dates(person_id)
            .iter()
            .copied()
            .filter(|d| self.period.contains(*d))
            .collect()
    }

    /// 周期内每日院内工时 (不含院外兼职)
    pub fn daily_hours(&self, validator: &WorkHourValidator, person_id: &str) -> BTreeMap<NaiveDate, f64> {
        let mut hours: BTreeMap<NaiveDate, f64> = BTreeMap::new();
        for interval in validator.derive_duty_intervals(self.index, person_id) {
            let date = interval.start.date();
            if self.period.contains(date) {
                *hours.entry(date).or_insert(0.0) += interval.hours();
            }
        }
        hours
    }

    /// 周期内总工时 (含院外兼职)
    pub fn period_hours(&self, validator: &WorkHourValidator, person_id: &str) -> f64 {
        let internal: f64 = self.daily_hours(validator, person_id).values().sum();
        let external: f64 = self
            .index
            .moonlighting(person_id)
            .iter()
            .filter(|m| self.period.contains(m.date))
            .map(|m| m.hours)
            .sum();
        internal + external
    }

    /// 周期折算周数
    pub fn period_weeks(&self) -> f64 {
        (self.period.days().max(1)) as f64 / 7.0
    }
}
