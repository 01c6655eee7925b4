// ==========================================
// 住院医师排班合规核心 - 缺勤校验引擎
// ==========================================
// 职责: 缺勤阻断判定 (类型 + 时长) / 冲突日期枚举 / 返岗跟进 / 派遣恢复期
// 红线: 阻断型缺勤内的任何排班均为 CRITICAL
// 红线: 所有判定必须输出 reason
// ==========================================

use crate::config::LeavePolicy;
use crate::domain::absence::Absence;
use crate::domain::finding::{ComplianceFinding, FindingEvidence};
use crate::domain::schedule::SchedulePeriod;
use crate::domain::types::{AbsenceType, FindingType, Severity};
use chrono::{Duration, NaiveDate};
use tracing::{debug, warn};

// ==========================================
// LeaveValidator - 缺勤校验引擎
// ==========================================
#[derive(Debug, Clone)]
pub struct LeaveValidator {
    policy: LeavePolicy,
}

impl LeaveValidator {
    pub fn new(policy: LeavePolicy) -> Self {
        Self { policy }
    }

    // ==========================================
    // 阻断判定
    // ==========================================

    /// 判定缺勤是否阻断排班
    ///
    /// # 规则
    /// 1. 显式 is_blocking 优先
    /// 2. 派遣/TDY/家庭紧急/丧假/产假/陪产假/康复假 → 始终阻断
    /// 3. 会议/常规休假 → 从不阻断
    /// 4. 病假 (medical) → 超过 7 天阻断; 事假 (sick) → 超过 3 天阻断
    /// 5. 其他 → 不阻断
    ///
    /// # 返回
    /// (是否阻断, 判定原因)
    pub fn evaluate_blocking(&self, absence: &Absence) -> (bool, String) {
        if let Some(explicit) = absence.is_blocking {
            return (explicit, format!("explicit blocking flag = {}", explicit));
        }

        let days = absence.duration_days();
        match absence.absence_type {
            AbsenceType::Deployment
            | AbsenceType::Tdy
            | AbsenceType::FamilyEmergency
            | AbsenceType::Bereavement
            | AbsenceType::Maternity
            | AbsenceType::Paternity
            | AbsenceType::Convalescent => {
                (true, format!("{} always blocks", absence.absence_type))
            }
            AbsenceType::Conference | AbsenceType::Vacation => {
                (false, format!("{} never blocks", absence.absence_type))
            }
            AbsenceType::Medical => self.duration_rule(
                absence.absence_type,
                days,
                self.policy.medical_blocking_after_days,
            ),
            AbsenceType::Sick => self.duration_rule(
                absence.absence_type,
                days,
                self.policy.sick_blocking_after_days,
            ),
            AbsenceType::Other => (false, "OTHER without explicit flag does not block".to_string()),
        }
    }

    fn duration_rule(&self, absence_type: AbsenceType, days: i64, limit: i64) -> (bool, String) {
        if days > limit {
            (
                true,
                format!("{} of {} days exceeds {} days", absence_type, days, limit),
            )
        } else {
            (
                false,
                format!("{} of {} days within {} days", absence_type, days, limit),
            )
        }
    }

    pub fn is_blocking(&self, absence: &Absence) -> bool {
        self.evaluate_blocking(absence).0
    }

    /// 返回覆盖该日期的阻断型缺勤
    pub fn blocking_absence_on<'a>(
        &self,
        absences: &'a [Absence],
        date: NaiveDate,
    ) -> Option<&'a Absence> {
        absences
            .iter()
            .find(|a| a.covers(date) && self.is_blocking(a))
    }

    /// 返回该日期所处的派遣恢复期对应的缺勤
    pub fn recovery_absence_on<'a>(
        &self,
        absences: &'a [Absence],
        date: NaiveDate,
    ) -> Option<&'a Absence> {
        let recovery_days = self.policy.post_deployment_recovery_days;
        if recovery_days <= 0 {
            return None;
        }
        absences.iter().find(|a| {
            a.absence_type.is_deployment()
                && date > a.end_date
                && date <= a.end_date + Duration::days(recovery_days)
        })
    }

    // ==========================================
    // 核心方法
    // ==========================================

    /// 校验单人缺勤合规
    ///
    /// # 参数
    /// - `work_dates`: 排班日期 (已去重排序)
    /// - `call_dates`: 值班日期 (已去重排序)
    /// - `period`: 校验周期
    /// - `as_of`: 评估基准日
    pub fn validate_person(
        &self,
        person_id: &str,
        absences: &[Absence],
        work_dates: &[NaiveDate],
        call_dates: &[NaiveDate],
        period: &SchedulePeriod,
        as_of: NaiveDate,
    ) -> Vec<ComplianceFinding> {
        let mut duty_dates: Vec<NaiveDate> = work_dates
            .iter()
            .chain(call_dates.iter())
            .copied()
            .filter(|d| period.contains(*d))
            .collect();
        duty_dates.sort();
        duty_dates.dedup();

        let mut findings = Vec::new();
        findings.extend(self.check_conflicts(person_id, absences, &duty_dates));
        findings.extend(self.check_return_follow_up(person_id, absences, as_of));
        findings.extend(self.check_post_deployment_recovery(person_id, absences, &duty_dates));

        debug!(
            person_id = person_id,
            absences = absences.len(),
            duty_dates = duty_dates.len(),
            findings = findings.len(),
            "缺勤校验完成"
        );
        findings
    }

    /// 阻断型缺勤冲突 (逐一列出冲突日期)
    pub fn check_conflicts(
        &self,
        person_id: &str,
        absences: &[Absence],
        duty_dates: &[NaiveDate],
    ) -> Vec<ComplianceFinding> {
        let mut findings = Vec::new();
        for absence in absences {
            let (blocking, reason) = self.evaluate_blocking(absence);
            if !blocking {
                continue;
            }
            let conflicts: Vec<NaiveDate> = duty_dates
                .iter()
                .copied()
                .filter(|d| absence.covers(*d))
                .collect();
            if conflicts.is_empty() {
                continue;
            }

            warn!(
                person_id = person_id,
                absence_type = %absence.absence_type,
                conflicts = conflicts.len(),
                "检测到阻断型缺勤冲突"
            );
            let listed: Vec<String> = conflicts.iter().map(|d| d.to_string()).collect();
            findings.push(
                ComplianceFinding::new(
                    Some(person_id),
                    FindingType::BlockingAbsenceConflict,
                    Severity::Critical,
                    format!(
                        "Assigned during blocking {} absence {}..{} ({}) on: {}",
                        absence.absence_type,
                        absence.start_date,
                        absence.end_date,
                        reason,
                        listed.join(", ")
                    ),
                )
                .with_evidence(FindingEvidence {
                    count: Some(conflicts.len() as u32),
                    dates: conflicts,
                    window_start: Some(absence.start_date),
                    window_end: Some(absence.end_date),
                    reference: Some(absence.absence_type.to_string()),
                    ..Default::default()
                }),
            );
        }
        findings
    }

    /// 暂定返岗日已过且未确认
    pub fn check_return_follow_up(
        &self,
        person_id: &str,
        absences: &[Absence],
        as_of: NaiveDate,
    ) -> Vec<ComplianceFinding> {
        absences
            .iter()
            .filter(|a| a.return_date_tentative && !a.return_confirmed && a.end_date < as_of)
            .map(|a| {
                let overdue = (as_of - a.end_date).num_days();
                ComplianceFinding::new(
                    Some(person_id),
                    FindingType::ReturnFollowUpRequired,
                    Severity::Warning,
                    format!(
                        "Tentative return date {} for {} absence passed {} day(s) ago without confirmation",
                        a.end_date, a.absence_type, overdue
                    ),
                )
                .with_evidence(FindingEvidence {
                    dates: vec![a.end_date],
                    count: Some(overdue as u32),
                    reference: Some(a.absence_type.to_string()),
                    ..Default::default()
                })
            })
            .collect()
    }

    /// 派遣/TDY 返岗后强制恢复期
    pub fn check_post_deployment_recovery(
        &self,
        person_id: &str,
        absences: &[Absence],
        duty_dates: &[NaiveDate],
    ) -> Vec<ComplianceFinding> {
        let recovery_days = self.policy.post_deployment_recovery_days;
        if recovery_days <= 0 {
            return Vec::new();
        }

        let mut findings = Vec::new();
        for absence in absences.iter().filter(|a| a.absence_type.is_deployment()) {
            let recovery_start = absence.end_date + Duration::days(1);
            let recovery_end = absence.end_date + Duration::days(recovery_days);
            let conflicts: Vec<NaiveDate> = duty_dates
                .iter()
                .copied()
                .filter(|d| *d >= recovery_start && *d <= recovery_end)
                .collect();
            if conflicts.is_empty() {
                continue;
            }
            findings.push(
                ComplianceFinding::new(
                    Some(person_id),
                    FindingType::PostDeploymentRecovery,
                    Severity::High,
                    format!(
                        "Assigned during {}-day recovery after {} return on {}",
                        recovery_days, absence.absence_type, absence.end_date
                    ),
                )
                .with_evidence(FindingEvidence {
                    count: Some(conflicts.len() as u32),
                    dates: conflicts,
                    window_start: Some(recovery_start),
                    window_end: Some(recovery_end),
                    threshold: Some(recovery_days as f64),
                    reference: Some(absence.absence_type.to_string()),
                    ..Default::default()
                }),
            );
        }
        findings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, day).unwrap()
    }

    fn validator() -> LeaveValidator {
        LeaveValidator::new(LeavePolicy::default())
    }

    #[test]
    fn test_medical_seven_days_does_not_block() {
        let absence = Absence::new("R1", AbsenceType::Medical, d(1), d(7));
        assert_eq!(absence.duration_days(), 7);
        assert!(!validator().is_blocking(&absence));
    }

    #[test]
    fn test_medical_eight_days_blocks() {
        let absence = Absence::new("R1", AbsenceType::Medical, d(1), d(8));
        assert!(validator().is_blocking(&absence));
    }

    #[test]
    fn test_sick_threshold() {
        let v = validator();
        assert!(!v.is_blocking(&Absence::new("R1", AbsenceType::Sick, d(1), d(3))));
        assert!(v.is_blocking(&Absence::new("R1", AbsenceType::Sick, d(1), d(4))));
    }

    #[test]
    fn test_type_policy() {
        let v = validator();
        assert!(v.is_blocking(&Absence::new("R1", AbsenceType::Bereavement, d(1), d(1))));
        assert!(v.is_blocking(&Absence::new("R1", AbsenceType::Tdy, d(1), d(2))));
        assert!(!v.is_blocking(&Absence::new("R1", AbsenceType::Vacation, d(1), d(20))));
        assert!(!v.is_blocking(&Absence::new("R1", AbsenceType::Conference, d(1), d(20))));
    }

    #[test]
    fn test_explicit_flag_overrides_type() {
        let mut absence = Absence::new("R1", AbsenceType::Vacation, d(1), d(5));
        absence.is_blocking = Some(true);
        let (blocking, reason) = validator().evaluate_blocking(&absence);
        assert!(blocking);
        assert!(reason.contains("explicit"));
    }

    #[test]
    fn test_conflicts_enumerate_every_date() {
        let absences = vec![Absence::new("R1", AbsenceType::Deployment, d(10), d(14))];
        let dates = vec![d(9), d(10), d(12), d(14), d(15)];
        let findings = validator().check_conflicts("R1", &absences, &dates);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Critical);
        assert_eq!(findings[0].evidence.dates, vec![d(10), d(12), d(14)]);
    }

    #[test]
    fn test_post_deployment_recovery() {
        let absences = vec![Absence::new("R1", AbsenceType::Deployment, d(1), d(10))];
        let findings = validator().check_post_deployment_recovery("R1", &absences, &[d(11), d(17), d(18)]);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].evidence.dates, vec![d(11), d(17)]);
        assert_eq!(findings[0].finding_type, FindingType::PostDeploymentRecovery);
    }

    #[test]
    fn test_return_follow_up() {
        let mut absence = Absence::new("R1", AbsenceType::Medical, d(1), d(5));
        absence.return_date_tentative = true;
        let findings = validator().check_return_follow_up("R1", &[absence.clone()], d(8));
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Warning);

        absence.return_confirmed = true;
        assert!(validator()
            .check_return_follow_up("R1", &[absence], d(8))
            .is_empty());
    }
}
