// ==========================================
// 快照构建器 - 用于集成测试
// ==========================================

use chrono::{Duration, NaiveDate};
use residency_compliance::domain::{
    Absence, Assignment, MoonlightingEntry, Person, RotationTemplate, ScheduleSnapshot, TimeBlock,
};
use residency_compliance::domain::{DayPeriod, RotationCategory};

pub fn d(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

/// 时间块 ID 约定: "<时段>-<日期>", 如 "AM-2025-09-01"
pub fn block_id(date: NaiveDate, period: DayPeriod) -> String {
    format!("{}-{}", period, date)
}

/// 从 start 起连续 days 天的日期
pub fn dates_from(start: NaiveDate, days: i64) -> Vec<NaiveDate> {
    (0..days).map(|offset| start + Duration::days(offset)).collect()
}

// ==========================================
// SnapshotBuilder
// ==========================================

#[derive(Clone)]
pub struct SnapshotBuilder {
    snapshot: ScheduleSnapshot,
}

impl SnapshotBuilder {
    pub fn new(as_of: NaiveDate) -> Self {
        Self {
            snapshot: ScheduleSnapshot::new(as_of),
        }
    }

    pub fn resident(mut self, person_id: &str, pgy_level: u8) -> Self {
        self.snapshot
            .people
            .push(Person::resident(person_id, person_id, pgy_level));
        self
    }

    pub fn faculty(mut self, person_id: &str) -> Self {
        self.snapshot.people.push(Person::faculty(person_id, person_id));
        self
    }

    pub fn person(mut self, person: Person) -> Self {
        self.snapshot.people.push(person);
        self
    }

    pub fn rotation(mut self, rotation: RotationTemplate) -> Self {
        self.snapshot.rotations.push(rotation);
        self
    }

    /// 标准门诊轮转 (每块 8 小时)
    pub fn clinic(self) -> Self {
        self.rotation(RotationTemplate::new("CLINIC", RotationCategory::Clinic, 8.0))
    }

    pub fn block(mut self, date: NaiveDate, period: DayPeriod) -> Self {
        let id = block_id(date, period);
        if !self.snapshot.blocks.iter().any(|b| b.block_id == id) {
            self.snapshot.blocks.push(TimeBlock::new(&id, date, period));
        }
        self
    }

    /// 连续若干天的同一时段时间块
    pub fn daily_blocks(mut self, start: NaiveDate, days: i64, period: DayPeriod) -> Self {
        for date in dates_from(start, days) {
            self = self.block(date, period);
        }
        self
    }

    pub fn assign(mut self, assignment: Assignment) -> Self {
        self.snapshot.assignments.push(assignment);
        self
    }

    /// 主责排班 (时间块不存在时自动补建)
    pub fn primary(self, person_id: &str, date: NaiveDate, period: DayPeriod, rotation_id: &str) -> Self {
        let id = block_id(date, period);
        self.block(date, period)
            .assign(Assignment::primary(person_id, &id, Some(rotation_id)))
    }

    pub fn supervise(self, person_id: &str, date: NaiveDate, period: DayPeriod, rotation_id: &str) -> Self {
        let id = block_id(date, period);
        self.block(date, period)
            .assign(Assignment::supervising(person_id, &id, Some(rotation_id)))
    }

    /// 住院医师 + 带教医师在同一时间块
    pub fn staffed(self, resident: &str, faculty: &str, date: NaiveDate, period: DayPeriod, rotation_id: &str) -> Self {
        self.primary(resident, date, period, rotation_id)
            .supervise(faculty, date, period, rotation_id)
    }

    pub fn call(mut self, person_id: &str, date: NaiveDate) -> Self {
        self.snapshot
            .call_dates
            .entry(person_id.to_string())
            .or_default()
            .push(date);
        self
    }

    pub fn absence(mut self, absence: Absence) -> Self {
        self.snapshot
            .absences
            .entry(absence.person_id.clone())
            .or_default()
            .push(absence);
        self
    }

    pub fn moonlighting(mut self, person_id: &str, date: NaiveDate, hours: f64) -> Self {
        self.snapshot
            .moonlighting
            .entry(person_id.to_string())
            .or_default()
            .push(MoonlightingEntry { date, hours });
        self
    }

    pub fn build(self) -> ScheduleSnapshot {
        self.snapshot
    }

    /// 构建快照但保留构建器, 便于在同一基线上继续追加
    pub fn clone_snapshot(&self) -> ScheduleSnapshot {
        self.snapshot.clone()
    }
}
