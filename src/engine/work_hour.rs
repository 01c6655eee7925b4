// ==========================================
// 住院医师排班合规核心 - 工时校验引擎
// ==========================================
// 职责: 28 天滚动均值 / 单次值守上限 / 最短休息 / 院外兼职计入
// 红线: 必须检查每一个滚动窗口, 不得只看自然周
// 红线: 80.0 合规, 超过即 CRITICAL
// ==========================================
// 输入: 日期 -> 工时 (由轮转强度折算) + 院外兼职工时
// 输出: 窗口检查记录 + 合规发现
// ==========================================

use crate::config::WorkHourLimits;
use crate::domain::finding::{ComplianceFinding, FindingEvidence};
use crate::domain::schedule::{MoonlightingEntry, SchedulePeriod};
use crate::domain::snapshot::SnapshotIndex;
use crate::domain::types::{DayPeriod, FindingType, Severity};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// 浮点比较容差 (80.0 与 80.0000001 视为相等)
pub const HOURS_EPSILON: f64 = 1e-6;

// ==========================================
// 值守区间
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct DutyInterval {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl DutyInterval {
    pub fn hours(&self) -> f64 {
        (self.end - self.start).num_minutes() as f64 / 60.0
    }
}

// ==========================================
// 滚动窗口检查记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollingWindowCheck {
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub total_hours: f64,
    pub weekly_average: f64,
}

// ==========================================
// 单人工时分析结果
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkHourAnalysis {
    pub person_id: String,
    pub windows_checked: usize,
    pub max_weekly_average: f64,
    pub worst_window: Option<RollingWindowCheck>,
    pub findings: Vec<ComplianceFinding>,
}

// ==========================================
// WorkHourValidator - 工时校验引擎
// ==========================================
#[derive(Debug, Clone)]
pub struct WorkHourValidator {
    limits: WorkHourLimits,
}

impl WorkHourValidator {
    pub fn new(limits: WorkHourLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &WorkHourLimits {
        &self.limits
    }

    // ==========================================
    // 工时推导
    // ==========================================

    /// 推导值守区间 (排班 + 夜间值班)
    ///
    /// # 规则
    /// - 排班区间 = 时段开始时刻 + 轮转强度折算工时 (BACKUP 不计)
    /// - 值班区间 = 当日 19:00 + 值班折算工时; 当日已有夜间排班则不重复计入
    pub fn derive_duty_intervals(&self, index: &SnapshotIndex, person_id: &str) -> Vec<DutyInterval> {
        let mut intervals = Vec::new();
        let mut night_dates = Vec::new();

        for assignment in index.assignments_for_person(person_id) {
            if !assignment.role.counts_as_duty() {
                continue;
            }
            let Some(block) = index.block(&assignment.block_id) else {
                continue;
            };
            let hours = index
                .rotation_of(assignment)
                .map(|r| r.hours_per_block)
                .unwrap_or(self.limits.default_block_hours);
            if hours <= 0.0 {
                continue;
            }
            let start = block.start_at();
            intervals.push(DutyInterval {
                start,
                end: start + hours_duration(hours),
            });
            if block.period == DayPeriod::Night {
                night_dates.push(block.date);
            }
        }

        for call_date in index.call_dates(person_id) {
            if night_dates.contains(call_date) {
                continue;
            }
            let start = call_date.and_time(DayPeriod::Night.start_time());
            intervals.push(DutyInterval {
                start,
                end: start + hours_duration(self.limits.call_shift_hours),
            });
        }

        intervals.sort();
        intervals
    }

    /// 推导每日工时 (区间工时计入开始日期)
    pub fn derive_daily_hours(&self, index: &SnapshotIndex, person_id: &str) -> BTreeMap<NaiveDate, f64> {
        let mut hours: BTreeMap<NaiveDate, f64> = BTreeMap::new();
        for interval in self.derive_duty_intervals(index, person_id) {
            *hours.entry(interval.start.date()).or_insert(0.0) += interval.hours();
        }
        hours
    }

    /// 合并相邻区间为连续值守 (间隔不超过 duty_merge_gap_hours)
    pub fn merge_duty_periods(&self, intervals: &[DutyInterval]) -> Vec<DutyInterval> {
        let mut sorted = intervals.to_vec();
        sorted.sort();
        let gap = hours_duration(self.limits.duty_merge_gap_hours);

        let mut merged: Vec<DutyInterval> = Vec::new();
        for interval in sorted {
            match merged.last_mut() {
                Some(current) if interval.start <= current.end + gap => {
                    if interval.end > current.end {
                        current.end = interval.end;
                    }
                }
                _ => merged.push(interval),
            }
        }
        merged
    }

    // ==========================================
    // 滚动均值规则
    // ==========================================

    /// 计算周期内全部 28 天滚动窗口
    ///
    /// # 规则
    /// - 窗口 [d-27, d], d 取周期内每一天且窗口完全落在周期内
    /// - 窗口数 = 周期天数 - 27 (周期不足 28 天时为 0)
    /// - 周均工时 = 窗口总工时 / (窗口天数 / 7)
    pub fn rolling_windows(
        &self,
        daily_hours: &BTreeMap<NaiveDate, f64>,
        moonlighting: &[MoonlightingEntry],
        period: &SchedulePeriod,
    ) -> Vec<RollingWindowCheck> {
        let window_days = self.limits.rolling_window_days;
        let total_days = period.days();
        if total_days < window_days {
            return Vec::new();
        }

        // 日工时序列 (院内 + 院外)
        let mut series: Vec<f64> = period
            .dates()
            .map(|date| daily_hours.get(&date).copied().unwrap_or(0.0))
            .collect();
        for entry in moonlighting {
            if period.contains(entry.date) {
                let offset = (entry.date - period.start).num_days() as usize;
                series[offset] += entry.hours;
            }
        }

        // 前缀和
        let mut prefix = Vec::with_capacity(series.len() + 1);
        prefix.push(0.0);
        for hours in &series {
            let last = prefix[prefix.len() - 1];
            prefix.push(last + hours);
        }

        let weeks = window_days as f64 / 7.0;
        let window = window_days as usize;
        (window..=series.len())
            .map(|end| {
                let total = prefix[end] - prefix[end - window];
                let window_end = period.start + Duration::days(end as i64 - 1);
                RollingWindowCheck {
                    window_start: window_end - Duration::days(window_days - 1),
                    window_end,
                    total_hours: total,
                    weekly_average: total / weeks,
                }
            })
            .collect()
    }

    /// 检查滚动均值 (CRITICAL 违规 + 分级预警)
    pub fn check_rolling_average(
        &self,
        person_id: &str,
        daily_hours: &BTreeMap<NaiveDate, f64>,
        moonlighting: &[MoonlightingEntry],
        period: &SchedulePeriod,
    ) -> WorkHourAnalysis {
        let windows = self.rolling_windows(daily_hours, moonlighting, period);
        let ceiling = self.limits.weekly_hour_ceiling;

        let worst = windows
            .iter()
            .max_by(|a, b| {
                a.weekly_average
                    .partial_cmp(&b.weekly_average)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .cloned();
        let max_avg = worst.as_ref().map(|w| w.weekly_average).unwrap_or(0.0);

        let mut findings = Vec::new();
        if let Some(worst_window) = worst.as_ref() {
            let violating = windows
                .iter()
                .filter(|w| w.weekly_average > ceiling + HOURS_EPSILON)
                .count();

            if violating > 0 {
                let percent_over = (worst_window.weekly_average - ceiling) / ceiling * 100.0;
                warn!(
                    person_id = person_id,
                    weekly_average = worst_window.weekly_average,
                    violating_windows = violating,
                    "滚动均值超过上限"
                );
                findings.push(
                    ComplianceFinding::new(
                        Some(person_id),
                        FindingType::RollingAverageExceeded,
                        Severity::Critical,
                        format!(
                            "{}-day rolling average {:.2} h/week exceeds {:.0} h ({:.1}% over) in window {}..{}; {} window(s) in violation",
                            self.limits.rolling_window_days,
                            worst_window.weekly_average,
                            ceiling,
                            percent_over,
                            worst_window.window_start,
                            worst_window.window_end,
                            violating
                        ),
                    )
                    .with_evidence(FindingEvidence {
                        window_start: Some(worst_window.window_start),
                        window_end: Some(worst_window.window_end),
                        measured: Some(worst_window.weekly_average),
                        threshold: Some(ceiling),
                        percent_over: Some(percent_over),
                        count: Some(violating as u32),
                        ..Default::default()
                    }),
                );
            } else if let Some(tier) = self
                .limits
                .warning_tiers
                .iter()
                .rev()
                .find(|tier| worst_window.weekly_average + HOURS_EPSILON >= **tier)
            {
                findings.push(
                    ComplianceFinding::new(
                        Some(person_id),
                        FindingType::RollingAverageApproaching,
                        Severity::Warning,
                        format!(
                            "{}-day rolling average {:.2} h/week reached the {:.0} h warning tier (limit {:.0} h) in window {}..{}",
                            self.limits.rolling_window_days,
                            worst_window.weekly_average,
                            tier,
                            ceiling,
                            worst_window.window_start,
                            worst_window.window_end
                        ),
                    )
                    .with_evidence(FindingEvidence {
                        window_start: Some(worst_window.window_start),
                        window_end: Some(worst_window.window_end),
                        measured: Some(worst_window.weekly_average),
                        threshold: Some(*tier),
                        ..Default::default()
                    }),
                );
            }
        }

        debug!(
            person_id = person_id,
            windows_checked = windows.len(),
            max_weekly_average = max_avg,
            "滚动均值检查完成"
        );

        WorkHourAnalysis {
            person_id: person_id.to_string(),
            windows_checked: windows.len(),
            max_weekly_average: max_avg,
            worst_window: worst,
            findings,
        }
    }

    // ==========================================
    // 单次值守 + 最短休息
    // ==========================================

    /// 检查连续值守时长与值守后休息
    pub fn check_duty_periods(
        &self,
        person_id: &str,
        duty_periods: &[DutyInterval],
    ) -> Vec<ComplianceFinding> {
        let hard_ceiling = self.limits.duty_hard_ceiling();
        let min_rest = self.limits.min_rest_hours;
        let mut findings = Vec::new();

        for duty in duty_periods {
            let hours = duty.hours();
            if hours > hard_ceiling + HOURS_EPSILON {
                findings.push(
                    ComplianceFinding::new(
                        Some(person_id),
                        FindingType::DutyPeriodExceeded,
                        Severity::Critical,
                        format!(
                            "Continuous duty of {:.1} h from {} exceeds {:.0} h + {:.0} h handoff",
                            hours, duty.start, self.limits.max_duty_hours, self.limits.handoff_allowance_hours
                        ),
                    )
                    .with_evidence(FindingEvidence {
                        dates: vec![duty.start.date()],
                        measured: Some(hours),
                        threshold: Some(hard_ceiling),
                        percent_over: Some((hours - hard_ceiling) / hard_ceiling * 100.0),
                        ..Default::default()
                    }),
                );
            }
        }

        for pair in duty_periods.windows(2) {
            let rest = (pair[1].start - pair[0].end).num_minutes() as f64 / 60.0;
            if rest + HOURS_EPSILON < min_rest {
                findings.push(
                    ComplianceFinding::new(
                        Some(person_id),
                        FindingType::InsufficientRest,
                        Severity::High,
                        format!(
                            "Only {:.1} h rest between duty ending {} and duty starting {} (minimum {:.0} h)",
                            rest, pair[0].end, pair[1].start, min_rest
                        ),
                    )
                    .with_evidence(FindingEvidence {
                        dates: vec![pair[0].end.date(), pair[1].start.date()],
                        measured: Some(rest),
                        threshold: Some(min_rest),
                        ..Default::default()
                    }),
                );
            }
        }

        findings
    }

    // ==========================================
    // 单人完整校验
    // ==========================================

    pub fn validate_person(
        &self,
        index: &SnapshotIndex,
        person_id: &str,
        period: &SchedulePeriod,
    ) -> WorkHourAnalysis {
        let intervals: Vec<DutyInterval> = self
            .derive_duty_intervals(index, person_id)
            .into_iter()
            .filter(|i| period.contains(i.start.date()))
            .collect();

        let mut daily_hours: BTreeMap<NaiveDate, f64> = BTreeMap::new();
        for interval in &intervals {
            *daily_hours.entry(interval.start.date()).or_insert(0.0) += interval.hours();
        }

        let mut analysis = self.check_rolling_average(
            person_id,
            &daily_hours,
            index.moonlighting(person_id),
            period,
        );
        let duty_periods = self.merge_duty_periods(&intervals);
        analysis
            .findings
            .extend(self.check_duty_periods(person_id, &duty_periods));
        analysis
    }
}

fn hours_duration(hours: f64) -> Duration {
    Duration::minutes((hours * 60.0).round() as i64)
}
