// ==========================================
// 住院医师排班合规核心 - 值班校验引擎
// ==========================================
// 职责: 窗口内值班频次 / 连续值班上限 / 非连续值班间隔 / 夜班后恢复日 / 值班公平性
// 红线: 公平性失衡只报 WARNING, 不构成违规
// ==========================================

use crate::config::CallPolicy;
use crate::domain::finding::{ComplianceFinding, FindingEvidence};
use crate::domain::person::Person;
use crate::domain::schedule::SchedulePeriod;
use crate::domain::snapshot::SnapshotIndex;
use crate::domain::types::{FindingType, Severity};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

// ==========================================
// 值班公平性报告
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallEquityReport {
    pub pool_size: usize,
    pub total_calls: u32,
    pub mean: f64,
    pub variance: f64,
    pub std_dev: f64,
    pub max_calls: u32,
    pub min_calls: u32,
    /// max / mean (mean 为 0 时为 0)
    pub imbalance_ratio: f64,
    pub counts: BTreeMap<String, u32>,
    pub findings: Vec<ComplianceFinding>,
}

// ==========================================
// CallValidator - 值班校验引擎
// ==========================================
#[derive(Debug, Clone)]
pub struct CallValidator {
    policy: CallPolicy,
}

impl CallValidator {
    pub fn new(policy: CallPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &CallPolicy {
        &self.policy
    }

    // ==========================================
    // 单人规则
    // ==========================================

    /// 窗口内值班频次上限 (以每次值班为窗口起点滑动)
    pub fn check_frequency(&self, person_id: &str, call_dates: &[NaiveDate]) -> Vec<ComplianceFinding> {
        let window = self.policy.window_days;
        let mut worst: Option<(NaiveDate, usize)> = None;

        for (i, start) in call_dates.iter().enumerate() {
            let window_end = *start + Duration::days(window - 1);
            let count = call_dates[i..].iter().take_while(|d| **d <= window_end).count();
            if worst.map_or(true, |(_, c)| count > c) {
                worst = Some((*start, count));
            }
        }

        match worst {
            Some((start, count)) if count as u32 > self.policy.max_calls_per_window => {
                let end = start + Duration::days(window - 1);
                vec![ComplianceFinding::new(
                    Some(person_id),
                    FindingType::CallFrequencyExceeded,
                    Severity::High,
                    format!(
                        "{} calls within {}-day window {}..{} (maximum {})",
                        count, window, start, end, self.policy.max_calls_per_window
                    ),
                )
                .with_evidence(FindingEvidence {
                    window_start: Some(start),
                    window_end: Some(end),
                    count: Some(count as u32),
                    threshold: Some(self.policy.max_calls_per_window as f64),
                    ..Default::default()
                })]
            }
            _ => Vec::new(),
        }
    }

    /// 连续值班上限 (超出部分逐晚报告)
    pub fn check_consecutive(&self, person_id: &str, call_dates: &[NaiveDate]) -> Vec<ComplianceFinding> {
        let mut findings = Vec::new();
        let mut run_length = 0u32;
        let mut previous: Option<NaiveDate> = None;

        for date in call_dates {
            run_length = match previous {
                Some(prev) if (*date - prev).num_days() == 1 => run_length + 1,
                _ => 1,
            };
            previous = Some(*date);

            if run_length > self.policy.max_consecutive_calls {
                findings.push(
                    ComplianceFinding::new(
                        Some(person_id),
                        FindingType::ConsecutiveCallExceeded,
                        Severity::High,
                        format!(
                            "Call on {} is consecutive night #{} (maximum {})",
                            date, run_length, self.policy.max_consecutive_calls
                        ),
                    )
                    .with_evidence(FindingEvidence {
                        dates: vec![*date],
                        count: Some(run_length),
                        threshold: Some(self.policy.max_consecutive_calls as f64),
                        ..Default::default()
                    }),
                );
            }
        }
        findings
    }

    /// 非连续值班之间的最少空闲天数
    pub fn check_spacing(&self, person_id: &str, call_dates: &[NaiveDate]) -> Vec<ComplianceFinding> {
        let min_days_off = self.policy.min_days_between_calls;
        call_dates
            .windows(2)
            .filter_map(|pair| {
                let gap = (pair[1] - pair[0]).num_days();
                let days_off = gap - 1;
                if gap > 1 && days_off < min_days_off {
                    Some(
                        ComplianceFinding::new(
                            Some(person_id),
                            FindingType::CallSpacingViolation,
                            Severity::Medium,
                            format!(
                                "Calls on {} and {} leave {} day(s) off (minimum {})",
                                pair[0], pair[1], days_off, min_days_off
                            ),
                        )
                        .with_evidence(FindingEvidence {
                            dates: vec![pair[0], pair[1]],
                            measured: Some(days_off as f64),
                            threshold: Some(min_days_off as f64),
                            ..Default::default()
                        }),
                    )
                } else {
                    None
                }
            })
            .collect()
    }

    /// 夜班后恢复日内不得有日间排班
    pub fn check_post_call_rest(
        &self,
        person_id: &str,
        call_dates: &[NaiveDate],
        day_work_dates: &[NaiveDate],
    ) -> Vec<ComplianceFinding> {
        let rest_days = self.policy.post_call_rest_days;
        if rest_days <= 0 {
            return Vec::new();
        }

        let mut findings = Vec::new();
        for call_date in call_dates {
            let conflicts: Vec<NaiveDate> = day_work_dates
                .iter()
                .copied()
                .filter(|d| *d > *call_date && *d <= *call_date + Duration::days(rest_days))
                .collect();
            if conflicts.is_empty() {
                continue;
            }
            findings.push(
                ComplianceFinding::new(
                    Some(person_id),
                    FindingType::PostCallRestViolation,
                    Severity::High,
                    format!(
                        "Day assignment on {} violates post-call recovery after overnight call on {}",
                        conflicts
                            .iter()
                            .map(|d| d.to_string())
                            .collect::<Vec<_>>()
                            .join(", "),
                        call_date
                    ),
                )
                .with_evidence(FindingEvidence {
                    dates: conflicts,
                    reference: Some(call_date.to_string()),
                    threshold: Some(rest_days as f64),
                    ..Default::default()
                }),
            );
        }
        findings
    }

    /// 单人值班校验
    ///
    /// # 参数
    /// - `call_dates`: 已排序去重的值班日期
    /// - `day_work_dates`: 日间排班日期 (不含夜间时段)
    pub fn validate_person(
        &self,
        person_id: &str,
        call_dates: &[NaiveDate],
        day_work_dates: &[NaiveDate],
        period: &SchedulePeriod,
    ) -> Vec<ComplianceFinding> {
        let calls: Vec<NaiveDate> = call_dates
            .iter()
            .copied()
            .filter(|d| period.contains(*d))
            .collect();

        let mut findings = Vec::new();
        findings.extend(self.check_frequency(person_id, &calls));
        findings.extend(self.check_consecutive(person_id, &calls));
        findings.extend(self.check_spacing(person_id, &calls));
        findings.extend(self.check_post_call_rest(person_id, &calls, day_work_dates));

        if !findings.is_empty() {
            warn!(person_id = person_id, findings = findings.len(), "值班规则存在问题");
        }
        debug!(person_id = person_id, calls = calls.len(), "值班校验完成");
        findings
    }

    // ==========================================
    // 公平性
    // ==========================================

    /// 计算值班公平性 (counts 应包含零值班成员)
    pub fn compute_equity(&self, counts: &BTreeMap<String, u32>) -> CallEquityReport {
        let pool_size = counts.len();
        if pool_size == 0 {
            return CallEquityReport::default();
        }

        let total_calls: u32 = counts.values().sum();
        let mean = total_calls as f64 / pool_size as f64;
        let variance = counts
            .values()
            .map(|c| {
                let diff = *c as f64 - mean;
                diff * diff
            })
            .sum::<f64>()
            / pool_size as f64;
        let max_calls = counts.values().copied().max().unwrap_or(0);
        let min_calls = counts.values().copied().min().unwrap_or(0);
        let imbalance_ratio = if mean > 0.0 { max_calls as f64 / mean } else { 0.0 };

        let mut findings = Vec::new();
        if pool_size >= 2 && imbalance_ratio > self.policy.equity_imbalance_threshold {
            // 归属到值班最多的人员 (同数取 ID 最小)
            let top_person = counts
                .iter()
                .find(|(_, c)| **c == max_calls)
                .map(|(id, _)| id.as_str());
            info!(
                imbalance_ratio = imbalance_ratio,
                threshold = self.policy.equity_imbalance_threshold,
                "值班分布失衡"
            );
            findings.push(
                ComplianceFinding::new(
                    top_person,
                    FindingType::CallEquityImbalance,
                    Severity::Warning,
                    format!(
                        "Call distribution skewed: max {} vs mean {:.2} (ratio {:.2} > {:.2}) across {} people",
                        max_calls,
                        mean,
                        imbalance_ratio,
                        self.policy.equity_imbalance_threshold,
                        pool_size
                    ),
                )
                .with_evidence(FindingEvidence {
                    measured: Some(imbalance_ratio),
                    threshold: Some(self.policy.equity_imbalance_threshold),
                    count: Some(max_calls),
                    ..Default::default()
                }),
            );
        }

        CallEquityReport {
            pool_size,
            total_calls,
            mean,
            variance,
            std_dev: variance.sqrt(),
            max_calls,
            min_calls,
            imbalance_ratio,
            counts: counts.clone(),
            findings,
        }
    }

    /// 基于快照计算人员池在周期内的值班公平性
    pub fn equity_for_period(
        &self,
        index: &SnapshotIndex,
        pool: &[&Person],
        period: &SchedulePeriod,
    ) -> CallEquityReport {
        let counts: BTreeMap<String, u32> = pool
            .iter()
            .map(|p| {
                let count = index
                    .call_dates(&p.person_id)
                    .iter()
                    .filter(|d| period.contains(**d))
                    .count() as u32;
                (p.person_id.clone(), count)
            })
            .collect();
        self.compute_equity(&counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, day).unwrap()
    }

    fn validator() -> CallValidator {
        CallValidator::new(CallPolicy::default())
    }

    #[test]
    fn test_third_consecutive_call_flagged() {
        let findings = validator().check_consecutive("R1", &[d(1), d(2), d(3)]);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].finding_type, FindingType::ConsecutiveCallExceeded);
        assert_eq!(findings[0].evidence.dates, vec![d(3)]);
    }

    #[test]
    fn test_two_consecutive_calls_allowed() {
        assert!(validator().check_consecutive("R1", &[d(1), d(2), d(6)]).is_empty());
    }

    #[test]
    fn test_spacing_every_other_night_violates() {
        let findings = validator().check_spacing("R1", &[d(1), d(3), d(6)]);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].evidence.dates, vec![d(1), d(3)]);
    }

    #[test]
    fn test_frequency_ceiling() {
        // q3 共 10 次 => 28 天窗口内 10 次 > 9
        let dates: Vec<NaiveDate> = (0..10).map(|i| d(1) + Duration::days(i * 3)).collect();
        let findings = validator().check_frequency("R1", &dates);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].evidence.count, Some(10));

        let compliant: Vec<NaiveDate> = dates[..9].to_vec();
        assert!(validator().check_frequency("R1", &compliant).is_empty());
    }

    #[test]
    fn test_post_call_rest() {
        let findings = validator().check_post_call_rest("R1", &[d(4)], &[d(4), d(5), d(7)]);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].evidence.dates, vec![d(5)]);
    }

    #[test]
    fn test_equity_imbalance_warning() {
        let counts: BTreeMap<String, u32> = [("A", 8u32), ("B", 2), ("C", 2)]
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect();
        let report = validator().compute_equity(&counts);
        assert!((report.mean - 4.0).abs() < 1e-9);
        assert!((report.imbalance_ratio - 2.0).abs() < 1e-9);
        assert!((report.variance - 8.0).abs() < 1e-9);
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].severity, Severity::Warning);
        assert_eq!(report.findings[0].person_id.as_deref(), Some("A"));
    }

    #[test]
    fn test_equity_balanced_no_warning() {
        let counts: BTreeMap<String, u32> = [("A", 3u32), ("B", 3), ("C", 4)]
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect();
        assert!(validator().compute_equity(&counts).findings.is_empty());
    }
}
