// ==========================================
// 住院医师排班合规核心 - 硬约束
// ==========================================
// 红线: 任一硬约束违规即候选不可行, 与惩罚分无关
// 依据: 各校验引擎的判定规则 (与合规校验保持同一口径)
// ==========================================

use crate::constraint::catalog::{ConstraintCategory, ConstraintType};
use crate::constraint::context::EvaluationContext;
use crate::domain::finding::{ComplianceFinding, FindingEvidence};
use crate::domain::types::{AssignmentRole, DayPeriod, FindingType, Severity};
use crate::engine::call::CallValidator;
use crate::engine::leave::LeaveValidator;
use crate::engine::supervision::SupervisionValidator;
use crate::engine::work_hour::{WorkHourValidator, HOURS_EPSILON};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ==========================================
// HardConstraint - 硬约束
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HardConstraint {
    pub constraint_type: ConstraintType,
    pub category: ConstraintCategory,
    /// 单调约束可用于部分解剪枝
    pub monotone: bool,
}

impl HardConstraint {
    /// 评估候选, 返回全部违规发现
    pub fn evaluate(&self, ctx: &EvaluationContext) -> Vec<ComplianceFinding> {
        match self.constraint_type {
            ConstraintType::OnePrimaryPerBlock => one_primary_per_block(ctx),
            ConstraintType::BlockingAbsence => blocking_absence(ctx),
            ConstraintType::RotationCredential => rotation_credential(ctx),
            ConstraintType::PgyEligibility => pgy_eligibility(ctx),
            ConstraintType::SupervisionRatio => supervision_ratio(ctx),
            ConstraintType::RollingWorkHours => rolling_work_hours(ctx),
            ConstraintType::PostDeploymentRecovery => post_deployment_recovery(ctx),
            ConstraintType::CallConsecutiveLimit => call_rule(ctx, |v, id, calls, _| {
                v.check_consecutive(id, calls)
            }),
            ConstraintType::PostCallRest => call_rule(ctx, |v, id, calls, day_work| {
                v.check_post_call_rest(id, calls, day_work)
            }),
            ConstraintType::CallFrequency => call_rule(ctx, |v, id, calls, _| {
                v.check_frequency(id, calls)
            }),
            ConstraintType::CallWorstDay
            | ConstraintType::CallSpacing
            | ConstraintType::CallWeekdayBalance
            | ConstraintType::CallPreference
            | ConstraintType::WorkloadBalance
            | ConstraintType::BlockPreference
            | ConstraintType::HoursHeadroom
            | ConstraintType::ResilienceN1Coverage
            | ConstraintType::ResilienceUtilizationBuffer => Vec::new(),
        }
    }
}

// ==========================================
// 唯一主责
// ==========================================
// 同一人同一日期同一时段至多一个主责排班
fn one_primary_per_block(ctx: &EvaluationContext) -> Vec<ComplianceFinding> {
    let mut seen: HashMap<(&str, NaiveDate, DayPeriod), &str> = HashMap::new();
    let mut findings = Vec::new();

    for assignment in ctx.index.assignments {
        if assignment.role != AssignmentRole::Primary {
            continue;
        }
        let Some(block) = ctx.index.block(&assignment.block_id) else {
            continue;
        };
        if !ctx.period.contains(block.date) {
            continue;
        }
        let key = (assignment.person_id.as_str(), block.date, block.period);
        match seen.get(&key) {
            Some(existing) => findings.push(
                ComplianceFinding::new(
                    Some(&assignment.person_id),
                    FindingType::DuplicatePrimaryAssignment,
                    Severity::Critical,
                    format!(
                        "More than one primary assignment on {} {} (blocks {} and {})",
                        block.date, block.period, existing, assignment.block_id
                    ),
                )
                .with_evidence(FindingEvidence {
                    dates: vec![block.date],
                    block_id: Some(assignment.block_id.clone()),
                    ..Default::default()
                }),
            ),
            None => {
                seen.insert(key, assignment.block_id.as_str());
            }
        }
    }
    findings
}

// ==========================================
// 阻断型缺勤
// ==========================================
fn blocking_absence(ctx: &EvaluationContext) -> Vec<ComplianceFinding> {
    let leave = LeaveValidator::new(ctx.config.leave.clone());
    let mut findings = Vec::new();
    for person in ctx.index.people_sorted() {
        let absences = ctx.index.absences(&person.person_id);
        if absences.is_empty() {
            continue;
        }
        let mut dates = ctx.duty_dates(&person.person_id);
        dates.extend(ctx.call_dates(&person.person_id));
        dates.sort();
        dates.dedup();
        findings.extend(leave.check_conflicts(&person.person_id, absences, &dates));
    }
    findings
}

// ==========================================
// 轮转资质
// ==========================================
fn rotation_credential(ctx: &EvaluationContext) -> Vec<ComplianceFinding> {
    let mut findings = Vec::new();
    for assignment in ctx.index.assignments {
        if assignment.role != AssignmentRole::Primary {
            continue;
        }
        let (Some(rotation), Some(person), Some(date)) = (
            ctx.index.rotation_of(assignment),
            ctx.index.person(&assignment.person_id),
            ctx.index.assignment_date(assignment),
        ) else {
            continue;
        };
        if !ctx.period.contains(date) {
            continue;
        }
        let missing: Vec<&str> = rotation
            .required_credentials
            .iter()
            .filter(|code| !person.holds_any_credential(code, date))
            .map(|code| code.as_str())
            .collect();
        if missing.is_empty() {
            continue;
        }
        findings.push(
            ComplianceFinding::new(
                Some(&person.person_id),
                FindingType::MissingCredential,
                Severity::High,
                format!(
                    "Rotation {} on {} requires credential(s) not held: {}",
                    rotation.rotation_id,
                    date,
                    missing.join(", ")
                ),
            )
            .with_evidence(FindingEvidence {
                dates: vec![date],
                block_id: Some(assignment.block_id.clone()),
                reference: Some(missing.join(",")),
                ..Default::default()
            }),
        );
    }
    findings
}

// ==========================================
// PGY 准入
// ==========================================
fn pgy_eligibility(ctx: &EvaluationContext) -> Vec<ComplianceFinding> {
    let mut findings = Vec::new();
    for assignment in ctx.index.assignments {
        if assignment.role != AssignmentRole::Primary {
            continue;
        }
        let (Some(rotation), Some(person), Some(date)) = (
            ctx.index.rotation_of(assignment),
            ctx.index.person(&assignment.person_id),
            ctx.index.assignment_date(assignment),
        ) else {
            continue;
        };
        if !person.is_resident() || !ctx.period.contains(date) || rotation.allows_pgy(person.pgy_level) {
            continue;
        }
        findings.push(
            ComplianceFinding::new(
                Some(&person.person_id),
                FindingType::PgyIneligible,
                Severity::High,
                format!(
                    "PGY-{} is not eligible for rotation {} (allowed: {:?})",
                    person.pgy_level.unwrap_or(0),
                    rotation.rotation_id,
                    rotation.allowed_pgy_levels
                ),
            )
            .with_evidence(FindingEvidence {
                dates: vec![date],
                block_id: Some(assignment.block_id.clone()),
                reference: Some(rotation.rotation_id.clone()),
                ..Default::default()
            }),
        );
    }
    findings
}

// ==========================================
// 带教比例
// ==========================================
fn supervision_ratio(ctx: &EvaluationContext) -> Vec<ComplianceFinding> {
    let validator = SupervisionValidator::new(ctx.config.supervision.clone());
    ctx.index
        .blocks_sorted()
        .into_iter()
        .filter(|b| ctx.period.contains(b.date))
        .map(|b| validator.analyze_block(ctx.index, b))
        .filter(|stats| stats.deficit > 0)
        .map(|stats| validator.deficit_finding(&stats))
        .collect()
}

// ==========================================
// 工时 (滚动均值 + 单次值守上限)
// ==========================================
// 休息规则可因追加排班合并值守而消除, 不具单调性, 由工时校验负责
fn rolling_work_hours(ctx: &EvaluationContext) -> Vec<ComplianceFinding> {
    let validator = WorkHourValidator::new(ctx.config.work_hours.clone());
    let limits = validator.limits();
    let mut findings = Vec::new();

    for person in ctx.resident_pool() {
        let analysis = validator.validate_person(ctx.index, &person.person_id, &ctx.period);
        findings.extend(analysis.findings.into_iter().filter(|f| {
            matches!(
                f.finding_type,
                FindingType::RollingAverageExceeded | FindingType::DutyPeriodExceeded
            )
        }));

        // 周期短于窗口: 周期总工时超过整窗口上限, 则任何覆盖它的窗口都超限
        if ctx.period.days() < limits.rolling_window_days {
            let window_cap = limits.weekly_hour_ceiling * limits.rolling_window_days as f64 / 7.0;
            let total = ctx.period_hours(&validator, &person.person_id);
            if total > window_cap + HOURS_EPSILON {
                findings.push(
                    ComplianceFinding::new(
                        Some(&person.person_id),
                        FindingType::RollingAverageExceeded,
                        Severity::Critical,
                        format!(
                            "{:.1} h scheduled in {}..{} already exceeds the {:.0} h cap of any {}-day window",
                            total, ctx.period.start, ctx.period.end, window_cap, limits.rolling_window_days
                        ),
                    )
                    .with_evidence(FindingEvidence {
                        window_start: Some(ctx.period.start),
                        window_end: Some(ctx.period.end),
                        measured: Some(total),
                        threshold: Some(window_cap),
                        percent_over: Some((total - window_cap) / window_cap * 100.0),
                        ..Default::default()
                    }),
                );
            }
        }
    }
    findings
}

// ==========================================
// 派遣返岗恢复期
// ==========================================
fn post_deployment_recovery(ctx: &EvaluationContext) -> Vec<ComplianceFinding> {
    let leave = LeaveValidator::new(ctx.config.leave.clone());
    let mut findings = Vec::new();
    for person in ctx.index.people_sorted() {
        let absences = ctx.index.absences(&person.person_id);
        if !absences.iter().any(|a| a.absence_type.is_deployment()) {
            continue;
        }
        let mut dates = ctx.duty_dates(&person.person_id);
        dates.extend(ctx.call_dates(&person.person_id));
        dates.sort();
        dates.dedup();
        findings.extend(leave.check_post_deployment_recovery(&person.person_id, absences, &dates));
    }
    findings
}

// ==========================================
// 值班规则 (连续上限 / 夜班后恢复日 / 窗口频次)
// ==========================================
// 追加排班或值班只会增加冲突, 三条规则均可用于剪枝
fn call_rule<F>(ctx: &EvaluationContext, check: F) -> Vec<ComplianceFinding>
where
    F: Fn(&CallValidator, &str, &[NaiveDate], &[NaiveDate]) -> Vec<ComplianceFinding>,
{
    let validator = CallValidator::new(ctx.config.call.clone());
    let mut findings = Vec::new();
    for person in ctx.index.people_sorted() {
        let calls = ctx.call_dates(&person.person_id);
        if calls.is_empty() {
            continue;
        }
        let day_work = ctx.day_work_dates(&person.person_id);
        findings.extend(check(&validator, &person.person_id, &calls, &day_work));
    }
    findings
}
