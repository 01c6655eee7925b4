// ==========================================
// 住院医师排班合规核心 - 轮转校验引擎
// ==========================================
// 职责: 轮转块最短时长 / PGY 最低轮转数量 / 轮转顺序与间隔 / 操作量进度
// 红线: 轮转块短于下限即无效, 与人力可行性无关
// 红线: 学年未结束只预警, 截止后未达标才是违规
// ==========================================

use crate::config::{RotationPolicy, SequenceRule};
use crate::domain::finding::{ComplianceFinding, FindingEvidence};
use crate::domain::person::Person;
use crate::domain::schedule::{RotationTemplate, SchedulePeriod};
use crate::domain::snapshot::SnapshotIndex;
use crate::domain::types::{AssignmentRole, FindingType, RotationCategory, Severity};
use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

// ==========================================
// RotationSpan - 连续轮转块
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RotationSpan {
    pub person_id: String,
    pub rotation_id: String,
    pub category: RotationCategory,
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// 被数据边界截断 (不做时长判定)
    pub truncated: bool,
}

impl RotationSpan {
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

// ==========================================
// AcademicYear - 学年
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcademicYear {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl AcademicYear {
    /// 包含指定日期的学年
    pub fn containing(date: NaiveDate, start_month: u32) -> Self {
        let year = if date.month() >= start_month {
            date.year()
        } else {
            date.year() - 1
        };
        let start = NaiveDate::from_ymd_opt(year, start_month, 1).unwrap_or(date);
        let next = NaiveDate::from_ymd_opt(year + 1, start_month, 1).unwrap_or(date);
        Self {
            start,
            end: next - Duration::days(1),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// 截至 as_of 的学年进度 (0.0-1.0)
    pub fn elapsed_fraction(&self, as_of: NaiveDate) -> f64 {
        let total = (self.end - self.start).num_days() + 1;
        let elapsed = (as_of - self.start).num_days() + 1;
        (elapsed as f64 / total as f64).clamp(0.0, 1.0)
    }
}

/// 年度目标进度判定
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProgressStatus {
    Met,
    OnTrack,
    Trending { expected: f64 },
    Unmet,
}

// ==========================================
// RotationValidator - 轮转校验引擎
// ==========================================
#[derive(Debug, Clone)]
pub struct RotationValidator {
    policy: RotationPolicy,
}

impl RotationValidator {
    pub fn new(policy: RotationPolicy) -> Self {
        Self { policy }
    }

    pub fn academic_year(&self, as_of: NaiveDate) -> AcademicYear {
        AcademicYear::containing(as_of, self.policy.academic_year_start_month)
    }

    /// 校验周期所属学年 (以周期末日为准)
    ///
    /// 复核已结束的学年时, as_of 晚于学年末日, 未达标目标判定为违规
    pub fn review_year(&self, period: &SchedulePeriod) -> AcademicYear {
        self.academic_year(period.end)
    }

    // ==========================================
    // 轮转块推导
    // ==========================================

    /// 由连续日期的主责排班推导轮转块
    ///
    /// # 规则
    /// - 同一轮转、日期连续 (相邻相差 1 天) 归为一个轮转块
    /// - 起止触及快照时间块边界的轮转块标记为截断
    pub fn derive_spans(&self, index: &SnapshotIndex, person_id: &str) -> Vec<RotationSpan> {
        let horizon = index.snapshot.block_span();
        let mut by_rotation: BTreeMap<&str, Vec<NaiveDate>> = BTreeMap::new();

        for assignment in index.assignments_for_person(person_id) {
            if assignment.role != AssignmentRole::Primary {
                continue;
            }
            let (Some(rotation_id), Some(date)) =
                (assignment.rotation_id.as_deref(), index.assignment_date(assignment))
            else {
                continue;
            };
            by_rotation.entry(rotation_id).or_default().push(date);
        }

        let mut spans = Vec::new();
        for (rotation_id, mut dates) in by_rotation {
            let Some(template) = index.rotation(rotation_id) else {
                continue;
            };
            dates.sort();
            dates.dedup();

            let mut start = dates[0];
            let mut previous = dates[0];
            for date in dates.iter().skip(1).copied().chain(std::iter::once(NaiveDate::MAX)) {
                if date != NaiveDate::MAX && (date - previous).num_days() == 1 {
                    previous = date;
                    continue;
                }
                let truncated = horizon.map_or(false, |h| start <= h.start || previous >= h.end);
                spans.push(RotationSpan {
                    person_id: person_id.to_string(),
                    rotation_id: rotation_id.to_string(),
                    category: template.category,
                    start,
                    end: previous,
                    truncated,
                });
                start = date;
                previous = date;
            }
        }

        spans.sort_by(|a, b| (a.start, &a.rotation_id).cmp(&(b.start, &b.rotation_id)));
        spans
    }

    // ==========================================
    // 时长
    // ==========================================

    /// 轮转块时长校验 (全局下限与模板上下限取严)
    pub fn check_span_length(
        &self,
        span: &RotationSpan,
        template: Option<&RotationTemplate>,
    ) -> Option<ComplianceFinding> {
        if span.truncated {
            return None;
        }
        let days = span.days();
        let min_days = template
            .and_then(|t| t.min_duration_days)
            .unwrap_or(0)
            .max(self.policy.min_rotation_days);

        if days < min_days {
            return Some(
                ComplianceFinding::new(
                    Some(&span.person_id),
                    FindingType::RotationTooShort,
                    Severity::High,
                    format!(
                        "Rotation {} block {}..{} lasts {} day(s), minimum {}",
                        span.rotation_id, span.start, span.end, days, min_days
                    ),
                )
                .with_evidence(span_evidence(span, days, min_days)),
            );
        }

        if let Some(max_days) = template.and_then(|t| t.max_duration_days) {
            if days > max_days {
                return Some(
                    ComplianceFinding::new(
                        Some(&span.person_id),
                        FindingType::RotationTooLong,
                        Severity::Medium,
                        format!(
                            "Rotation {} block {}..{} lasts {} day(s), maximum {}",
                            span.rotation_id, span.start, span.end, days, max_days
                        ),
                    )
                    .with_evidence(span_evidence(span, days, max_days)),
                );
            }
        }
        None
    }

    // ==========================================
    // 年度进度
    // ==========================================

    /// 年度目标进度: 达标 / 正常 / 落后预警 / 截止未达标
    pub fn progress_status(
        &self,
        actual: u32,
        target: u32,
        year: &AcademicYear,
        as_of: NaiveDate,
    ) -> ProgressStatus {
        if actual >= target {
            return ProgressStatus::Met;
        }
        if as_of > year.end {
            return ProgressStatus::Unmet;
        }
        let expected = target as f64 * year.elapsed_fraction(as_of);
        if (actual as f64) < expected * self.policy.trend_tolerance {
            ProgressStatus::Trending { expected }
        } else {
            ProgressStatus::OnTrack
        }
    }

    /// PGY 最低轮转数量
    pub fn check_minimum_counts(
        &self,
        person: &Person,
        spans: &[RotationSpan],
        year: &AcademicYear,
        as_of: NaiveDate,
    ) -> Vec<ComplianceFinding> {
        let Some(pgy) = person.pgy_level else {
            return Vec::new();
        };

        let mut findings = Vec::new();
        for requirement in self
            .policy
            .requirements
            .iter()
            .filter(|r| r.pgy_level == pgy)
        {
            let actual = spans
                .iter()
                .filter(|s| s.category == requirement.category && year.contains(s.start))
                .count() as u32;
            let status = self.progress_status(actual, requirement.min_blocks, year, as_of);
            let (finding_type, severity, expected) = match status {
                ProgressStatus::Unmet => (FindingType::RotationMinimumUnmet, Severity::High, None),
                ProgressStatus::Trending { expected } => (
                    FindingType::RotationMinimumTrending,
                    Severity::Warning,
                    Some(expected),
                ),
                _ => continue,
            };
            findings.push(
                ComplianceFinding::new(
                    Some(&person.person_id),
                    finding_type,
                    severity,
                    format!(
                        "PGY-{} {} rotation blocks: {} of {} required{}",
                        pgy,
                        requirement.category,
                        actual,
                        requirement.min_blocks,
                        expected
                            .map(|e| format!(" (expected ~{:.1} by {})", e, as_of))
                            .unwrap_or_else(|| format!(" by year end {}", year.end))
                    ),
                )
                .with_evidence(FindingEvidence {
                    window_start: Some(year.start),
                    window_end: Some(year.end),
                    count: Some(actual),
                    threshold: Some(requirement.min_blocks as f64),
                    measured: expected,
                    reference: Some(requirement.category.to_string()),
                    ..Default::default()
                }),
            );
        }
        findings
    }

    /// 轮转顺序与间隔
    pub fn check_sequences(&self, person_id: &str, spans: &[RotationSpan]) -> Vec<ComplianceFinding> {
        let mut findings = Vec::new();
        let first_start = |rotation_id: &str| {
            spans
                .iter()
                .filter(|s| s.rotation_id == rotation_id)
                .map(|s| s.start)
                .min()
        };

        for rule in &self.policy.sequences {
            match rule {
                SequenceRule::Before { first, then } => {
                    let Some(then_start) = first_start(then) else {
                        continue;
                    };
                    let ok = first_start(first).map_or(false, |s| s < then_start);
                    if !ok {
                        findings.push(
                            ComplianceFinding::new(
                                Some(person_id),
                                FindingType::RotationSequenceViolation,
                                Severity::Medium,
                                format!(
                                    "Rotation {} starts {} before required predecessor {}",
                                    then, then_start, first
                                ),
                            )
                            .with_evidence(FindingEvidence {
                                dates: vec![then_start],
                                reference: Some(format!("{} -> {}", first, then)),
                                ..Default::default()
                            }),
                        );
                    }
                }
                SequenceRule::MinSpacing {
                    rotation_id,
                    min_days,
                } => {
                    let occurrences: Vec<&RotationSpan> =
                        spans.iter().filter(|s| &s.rotation_id == rotation_id).collect();
                    for pair in occurrences.windows(2) {
                        let gap = (pair[1].start - pair[0].end).num_days() - 1;
                        if gap < *min_days {
                            findings.push(
                                ComplianceFinding::new(
                                    Some(person_id),
                                    FindingType::RotationSpacingViolation,
                                    Severity::Medium,
                                    format!(
                                        "Rotation {} repeats after {} day(s) ({}..{} then {}), minimum {}",
                                        rotation_id, gap, pair[0].start, pair[0].end, pair[1].start, min_days
                                    ),
                                )
                                .with_evidence(FindingEvidence {
                                    dates: vec![pair[0].end, pair[1].start],
                                    measured: Some(gap as f64),
                                    threshold: Some(*min_days as f64),
                                    reference: Some(rotation_id.clone()),
                                    ..Default::default()
                                }),
                            );
                        }
                    }
                }
            }
        }
        findings
    }

    /// 操作量进度
    ///
    /// # 参数
    /// - `performed`: procedure_code -> 学年内截至 as_of 完成次数
    pub fn check_procedure_volume(
        &self,
        person: &Person,
        performed: &BTreeMap<String, u32>,
        year: &AcademicYear,
        as_of: NaiveDate,
    ) -> Vec<ComplianceFinding> {
        let Some(pgy) = person.pgy_level else {
            return Vec::new();
        };

        let mut findings = Vec::new();
        for target in self
            .policy
            .procedure_targets
            .iter()
            .filter(|t| t.pgy_level == pgy)
        {
            let actual = performed.get(&target.procedure_code).copied().unwrap_or(0);
            let (finding_type, severity, expected) =
                match self.progress_status(actual, target.annual_target, year, as_of) {
                    ProgressStatus::Unmet => (FindingType::ProcedureVolumeUnmet, Severity::High, None),
                    ProgressStatus::Trending { expected } => (
                        FindingType::ProcedureVolumeTrending,
                        Severity::Warning,
                        Some(expected),
                    ),
                    _ => continue,
                };
            findings.push(
                ComplianceFinding::new(
                    Some(&person.person_id),
                    finding_type,
                    severity,
                    format!(
                        "Procedure {}: {} of {} annual target{}",
                        target.procedure_code,
                        actual,
                        target.annual_target,
                        expected
                            .map(|e| format!(", trending below proportional ~{:.1}", e))
                            .unwrap_or_else(|| format!(", deadline {} passed", year.end))
                    ),
                )
                .with_evidence(FindingEvidence {
                    window_start: Some(year.start),
                    window_end: Some(year.end),
                    count: Some(actual),
                    threshold: Some(target.annual_target as f64),
                    measured: expected,
                    reference: Some(target.procedure_code.clone()),
                    ..Default::default()
                }),
            );
        }
        findings
    }

    // ==========================================
    // 单人完整校验
    // ==========================================

    pub fn validate_person(
        &self,
        index: &SnapshotIndex,
        person: &Person,
        period: &SchedulePeriod,
        as_of: NaiveDate,
    ) -> Vec<ComplianceFinding> {
        let spans = self.derive_spans(index, &person.person_id);
        let year = self.review_year(period);
        let mut findings = Vec::new();

        for span in spans
            .iter()
            .filter(|s| s.start <= period.end && s.end >= period.start)
        {
            if let Some(finding) = self.check_span_length(span, index.rotation(&span.rotation_id)) {
                findings.push(finding);
            }
        }
        findings.extend(self.check_minimum_counts(person, &spans, &year, as_of));
        findings.extend(self.check_sequences(&person.person_id, &spans));

        let mut performed: BTreeMap<String, u32> = BTreeMap::new();
        for assignment in index.assignments_for_person(&person.person_id) {
            let (Some(code), Some(date)) =
                (assignment.procedure_code.as_deref(), index.assignment_date(assignment))
            else {
                continue;
            };
            if year.contains(date) && date <= as_of {
                *performed.entry(code.to_string()).or_insert(0) += 1;
            }
        }
        findings.extend(self.check_procedure_volume(person, &performed, &year, as_of));

        debug!(
            person_id = %person.person_id,
            spans = spans.len(),
            findings = findings.len(),
            "轮转校验完成"
        );
        findings
    }
}

fn span_evidence(span: &RotationSpan, days: i64, limit: i64) -> FindingEvidence {
    FindingEvidence {
        window_start: Some(span.start),
        window_end: Some(span.end),
        measured: Some(days as f64),
        threshold: Some(limit as f64),
        reference: Some(span.rotation_id.clone()),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ProcedureTarget, RotationRequirement};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn span(days: i64) -> RotationSpan {
        let start = d(2026, 3, 2);
        RotationSpan {
            person_id: "R1".to_string(),
            rotation_id: "CLINIC".to_string(),
            category: RotationCategory::Clinic,
            start,
            end: start + Duration::days(days - 1),
            truncated: false,
        }
    }

    fn validator() -> RotationValidator {
        RotationValidator::new(RotationPolicy::default())
    }

    #[test]
    fn test_five_day_block_rejected() {
        let finding = validator().check_span_length(&span(5), None).unwrap();
        assert_eq!(finding.finding_type, FindingType::RotationTooShort);
        assert_eq!(finding.evidence.measured, Some(5.0));
    }

    #[test]
    fn test_seven_day_block_accepted() {
        assert!(validator().check_span_length(&span(7), None).is_none());
    }

    #[test]
    fn test_template_maximum() {
        let mut template = RotationTemplate::new("CLINIC", RotationCategory::Clinic, 5.0);
        template.max_duration_days = Some(28);
        let finding = validator().check_span_length(&span(30), Some(&template)).unwrap();
        assert_eq!(finding.finding_type, FindingType::RotationTooLong);
    }

    #[test]
    fn test_academic_year_bounds() {
        let year = AcademicYear::containing(d(2026, 3, 1), 7);
        assert_eq!(year.start, d(2025, 7, 1));
        assert_eq!(year.end, d(2026, 6, 30));
        let year = AcademicYear::containing(d(2026, 7, 1), 7);
        assert_eq!(year.start, d(2026, 7, 1));
    }

    #[test]
    fn test_procedure_trending_then_unmet() {
        let mut policy = RotationPolicy::default();
        policy.procedure_targets.push(ProcedureTarget {
            pgy_level: 1,
            procedure_code: "LP".to_string(),
            annual_target: 10,
        });
        let v = RotationValidator::new(policy);
        let person = Person::resident("R1", "Resident One", 1);
        let year = AcademicYear::containing(d(2026, 1, 1), 7);
        let performed: BTreeMap<String, u32> = [("LP".to_string(), 2u32)].into_iter().collect();

        // 学年过半, 仅完成 2/10 => 预警
        let mid = v.check_procedure_volume(&person, &performed, &year, d(2026, 1, 1));
        assert_eq!(mid.len(), 1);
        assert_eq!(mid[0].severity, Severity::Warning);

        // 学年截止后 => 违规
        let after = v.check_procedure_volume(&person, &performed, &year, d(2026, 7, 2));
        assert_eq!(after[0].finding_type, FindingType::ProcedureVolumeUnmet);
        assert_eq!(after[0].severity, Severity::High);
    }

    #[test]
    fn test_review_year_follows_period_end() {
        let v = validator();
        let june = SchedulePeriod::new(d(2025, 6, 1), d(2025, 6, 30));
        let year = v.review_year(&june);
        assert_eq!(year.start, d(2024, 7, 1));
        assert_eq!(year.end, d(2025, 6, 30));
        assert_eq!(
            v.progress_status(1, 10, &year, d(2025, 7, 5)),
            ProgressStatus::Unmet
        );
    }

    #[test]
    fn test_minimum_counts_on_track_early_in_year() {
        let mut policy = RotationPolicy::default();
        policy.requirements.push(RotationRequirement {
            pgy_level: 2,
            category: RotationCategory::Procedure,
            min_blocks: 2,
        });
        let v = RotationValidator::new(policy);
        let person = Person::resident("R2", "Resident Two", 2);
        let year = AcademicYear::containing(d(2025, 7, 10), 7);
        assert!(v
            .check_minimum_counts(&person, &[], &year, d(2025, 7, 10))
            .is_empty());
    }

    #[test]
    fn test_sequence_before_rule() {
        let mut policy = RotationPolicy::default();
        policy.sequences.push(SequenceRule::Before {
            first: "CLINIC".to_string(),
            then: "ICU".to_string(),
        });
        let v = RotationValidator::new(policy);
        let mut icu = span(7);
        icu.rotation_id = "ICU".to_string();
        let mut clinic = span(7);
        clinic.start = clinic.start + Duration::days(14);
        clinic.end = clinic.end + Duration::days(14);

        let findings = v.check_sequences("R1", &[icu.clone(), clinic]);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].finding_type, FindingType::RotationSequenceViolation);
    }
}
