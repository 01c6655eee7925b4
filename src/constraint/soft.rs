// ==========================================
// 住院医师排班合规核心 - 软约束
// ==========================================
// 职责: 计算违规量 (violation magnitude), 惩罚 = 权重 x 违规量
// 红线: 软约束只影响惩罚分, 不影响可行性
// ==========================================

use crate::constraint::catalog::{ConstraintCategory, ConstraintType};
use crate::constraint::context::EvaluationContext;
use crate::engine::work_hour::WorkHourValidator;
use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 值班最差日 (周五/周六/周日夜)
const WORST_CALL_DAYS: [Weekday; 3] = [Weekday::Fri, Weekday::Sat, Weekday::Sun];

/// 利用率缓冲线
const UTILIZATION_BUFFER: f64 = 0.8;

// ==========================================
// SoftConstraint - 软约束
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoftConstraint {
    pub constraint_type: ConstraintType,
    pub category: ConstraintCategory,
    pub weight: f64,
}

/// 单条软约束违规量
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoftViolation {
    pub person_id: Option<String>,
    pub magnitude: f64,
    pub detail: String,
}

impl SoftViolation {
    fn person(person_id: &str, magnitude: f64, detail: String) -> Self {
        Self {
            person_id: Some(person_id.to_string()),
            magnitude,
            detail,
        }
    }

    fn pool(magnitude: f64, detail: String) -> Self {
        Self {
            person_id: None,
            magnitude,
            detail,
        }
    }
}

impl SoftConstraint {
    pub fn evaluate(&self, ctx: &EvaluationContext) -> Vec<SoftViolation> {
        let violations = match self.constraint_type {
            ConstraintType::CallWorstDay => call_worst_day(ctx),
            ConstraintType::CallSpacing => call_spacing(ctx),
            ConstraintType::CallWeekdayBalance => call_weekday_balance(ctx),
            ConstraintType::CallPreference => call_preference(ctx),
            ConstraintType::WorkloadBalance => workload_balance(ctx),
            ConstraintType::BlockPreference => block_preference(ctx),
            ConstraintType::HoursHeadroom => hours_headroom(ctx),
            ConstraintType::ResilienceN1Coverage => n1_coverage(ctx),
            ConstraintType::ResilienceUtilizationBuffer => utilization_buffer(ctx),
            ConstraintType::OnePrimaryPerBlock
            | ConstraintType::BlockingAbsence
            | ConstraintType::RotationCredential
            | ConstraintType::PgyEligibility
            | ConstraintType::SupervisionRatio
            | ConstraintType::RollingWorkHours
            | ConstraintType::PostDeploymentRecovery
            | ConstraintType::CallConsecutiveLimit
            | ConstraintType::PostCallRest
            | ConstraintType::CallFrequency => Vec::new(),
        };
        violations.into_iter().filter(|v| v.magnitude > 0.0).collect()
    }

    /// 惩罚 = 权重 x 违规量之和
    pub fn penalty(&self, violations: &[SoftViolation]) -> f64 {
        self.weight * violations.iter().map(|v| v.magnitude).sum::<f64>()
    }
}

// ==========================================
// 值班公平
// ==========================================

/// 最差日值班极差 (人员池内 max - min)
fn call_worst_day(ctx: &EvaluationContext) -> Vec<SoftViolation> {
    let pool = ctx.resident_pool();
    if pool.len() < 2 {
        return Vec::new();
    }
    let counts: Vec<usize> = pool
        .iter()
        .map(|p| {
            ctx.call_dates(&p.person_id)
                .iter()
                .filter(|d| WORST_CALL_DAYS.contains(&d.weekday()))
                .count()
        })
        .collect();
    let max = counts.iter().copied().max().unwrap_or(0);
    let min = counts.iter().copied().min().unwrap_or(0);
    vec![SoftViolation::pool(
        (max - min) as f64,
        format!("Fri/Sat/Sun call spread {} (max {}, min {})", max - min, max, min),
    )]
}

/// 非连续值班间隔不足
fn call_spacing(ctx: &EvaluationContext) -> Vec<SoftViolation> {
    let required_gap = ctx.config.call.min_days_between_calls + 1;
    let mut violations = Vec::new();
    for person in ctx.resident_pool() {
        let dates = ctx.call_dates(&person.person_id);
        let shortfall: i64 = dates
            .windows(2)
            .map(|pair| (pair[1] - pair[0]).num_days())
            .filter(|gap| *gap > 1)
            .map(|gap| (required_gap - gap).max(0))
            .sum();
        if shortfall > 0 {
            violations.push(SoftViolation::person(
                &person.person_id,
                shortfall as f64,
                format!("call spacing short by {} day(s) in total", shortfall),
            ));
        }
    }
    violations
}

/// 同一星期几值班过度集中
fn call_weekday_balance(ctx: &EvaluationContext) -> Vec<SoftViolation> {
    let mut violations = Vec::new();
    for person in ctx.resident_pool() {
        let dates = ctx.call_dates(&person.person_id);
        if dates.is_empty() {
            continue;
        }
        let mut by_weekday: BTreeMap<u32, i64> = BTreeMap::new();
        for date in &dates {
            *by_weekday
                .entry(date.weekday().num_days_from_monday())
                .or_insert(0) += 1;
        }
        let fair_share = (dates.len() as i64 + 6) / 7;
        let excess: i64 = by_weekday.values().map(|c| (c - fair_share).max(0)).sum();
        if excess > 0 {
            violations.push(SoftViolation::person(
                &person.person_id,
                excess as f64,
                format!("{} call(s) beyond even weekday spread", excess),
            ));
        }
    }
    violations
}

/// 值班偏好 (回避日期/回避星期)
fn call_preference(ctx: &EvaluationContext) -> Vec<SoftViolation> {
    let mut violations = Vec::new();
    for person in ctx.resident_pool() {
        let prefs = &person.preferences;
        let hits = ctx
            .call_dates(&person.person_id)
            .iter()
            .filter(|d| prefs.avoid_dates.contains(*d) || prefs.avoid_call_weekdays.contains(&d.weekday()))
            .count();
        if hits > 0 {
            violations.push(SoftViolation::person(
                &person.person_id,
                hits as f64,
                format!("{} call(s) on avoided days", hits),
            ));
        }
    }
    violations
}

// ==========================================
// 工作量
// ==========================================

/// 主责排班数极差
fn workload_balance(ctx: &EvaluationContext) -> Vec<SoftViolation> {
    let pool = ctx.resident_pool();
    if pool.len() < 2 {
        return Vec::new();
    }
    let counts: Vec<usize> = pool
        .iter()
        .map(|p| ctx.duty_dates(&p.person_id).len())
        .collect();
    let max = counts.iter().copied().max().unwrap_or(0);
    let min = counts.iter().copied().min().unwrap_or(0);
    vec![SoftViolation::pool(
        (max - min) as f64,
        format!("assigned-day spread {} (max {}, min {})", max - min, max, min),
    )]
}

/// 排班偏好 (回避日期)
fn block_preference(ctx: &EvaluationContext) -> Vec<SoftViolation> {
    let mut violations = Vec::new();
    for person in ctx.index.people_sorted() {
        if person.preferences.avoid_dates.is_empty() {
            continue;
        }
        let hits = ctx
            .duty_dates(&person.person_id)
            .iter()
            .filter(|d| person.preferences.avoid_dates.contains(*d))
            .count();
        if hits > 0 {
            violations.push(SoftViolation::person(
                &person.person_id,
                hits as f64,
                format!("{} assigned day(s) on avoided dates", hits),
            ));
        }
    }
    violations
}

/// 工时余量: 周均工时超过首档预警线的部分
fn hours_headroom(ctx: &EvaluationContext) -> Vec<SoftViolation> {
    let validator = WorkHourValidator::new(ctx.config.work_hours.clone());
    let Some(first_tier) = ctx.config.work_hours.warning_tiers.first().copied() else {
        return Vec::new();
    };
    let mut violations = Vec::new();
    for person in ctx.resident_pool() {
        let daily = ctx.daily_hours(&validator, &person.person_id);
        let windows = validator.rolling_windows(&daily, ctx.index.moonlighting(&person.person_id), &ctx.period);
        let weekly = if windows.is_empty() {
            ctx.period_hours(&validator, &person.person_id) / ctx.period_weeks()
        } else {
            windows
                .iter()
                .map(|w| w.weekly_average)
                .fold(0.0, f64::max)
        };
        let over = weekly - first_tier;
        if over > 0.0 {
            violations.push(SoftViolation::person(
                &person.person_id,
                over,
                format!("weekly average {:.1} h above {:.0} h headroom line", weekly, first_tier),
            ));
        }
    }
    violations
}

// ==========================================
// 韧性
// ==========================================

/// N-1 覆盖: 有排班的日期至少保留一名可替补住院医师
fn n1_coverage(ctx: &EvaluationContext) -> Vec<SoftViolation> {
    let pool = ctx.resident_pool();
    let busy: BTreeMap<&str, Vec<NaiveDate>> = pool
        .iter()
        .map(|p| {
            let mut dates = ctx.duty_dates(&p.person_id);
            dates.extend(ctx.call_dates(&p.person_id));
            (p.person_id.as_str(), dates)
        })
        .collect();

    let mut uncovered = Vec::new();
    for date in ctx.period.dates() {
        let scheduled = busy.values().any(|dates| dates.contains(&date));
        if !scheduled {
            continue;
        }
        let reserve = pool
            .iter()
            .filter(|p| {
                !busy
                    .get(p.person_id.as_str())
                    .map_or(false, |dates| dates.contains(&date))
                    && !ctx
                        .index
                        .absences(&p.person_id)
                        .iter()
                        .any(|a| a.covers(date))
            })
            .count();
        if reserve == 0 {
            uncovered.push(date);
        }
    }

    if uncovered.is_empty() {
        return Vec::new();
    }
    vec![SoftViolation::pool(
        uncovered.len() as f64,
        format!("{} day(s) without a reserve resident", uncovered.len()),
    )]
}

/// 利用率缓冲: 周期工时 / 周期上限 超过 80% 的部分
fn utilization_buffer(ctx: &EvaluationContext) -> Vec<SoftViolation> {
    let validator = WorkHourValidator::new(ctx.config.work_hours.clone());
    let capacity = ctx.config.work_hours.weekly_hour_ceiling * ctx.period_weeks();
    if capacity <= 0.0 {
        return Vec::new();
    }
    let mut violations = Vec::new();
    for person in ctx.resident_pool() {
        let utilization = ctx.period_hours(&validator, &person.person_id) / capacity;
        let over = utilization - UTILIZATION_BUFFER;
        if over > 0.0 {
            violations.push(SoftViolation::person(
                &person.person_id,
                over * 10.0,
                format!("utilization {:.0}% above {:.0}% buffer", utilization * 100.0, UTILIZATION_BUFFER * 100.0),
            ));
        }
    }
    violations
}
