use crate::domain::finding::ComplianceFinding;
use crate::domain::schedule::SchedulePeriod;
use crate::domain::types::{ComplianceDomain, FindingType, Severity};
use crate::engine::call::CallEquityReport;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ==========================================
// ReportStatus - 总体合规状态
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportStatus {
    /// 无任何违规 (允许存在提示)
    Compliant,
    /// 存在违规, 但无 HIGH/CRITICAL
    AtRisk,
    /// 存在 HIGH/CRITICAL 违规
    NonCompliant,
}

impl ReportStatus {
    pub fn from_findings<'a>(findings: impl IntoIterator<Item = &'a ComplianceFinding>) -> Self {
        let worst = findings
            .into_iter()
            .filter(|f| f.is_violation())
            .map(|f| f.severity)
            .max();
        match worst {
            None => ReportStatus::Compliant,
            Some(s) if s.is_blocking() => ReportStatus::NonCompliant,
            Some(_) => ReportStatus::AtRisk,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Compliant => "COMPLIANT",
            ReportStatus::AtRisk => "AT_RISK",
            ReportStatus::NonCompliant => "NON_COMPLIANT",
        }
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// ComplianceCheckResult - 单个住院医师的合规结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceCheckResult {
    pub person_id: String,

    pub name: String,

    pub pgy_level: Option<u8>,

    /// 无任何违规 (WARNING 不计)
    pub is_compliant: bool,

    /// 各领域违规数 (五大领域均有条目)
    pub violation_counts: BTreeMap<ComplianceDomain, u32>,

    /// 各领域提示数
    pub warning_counts: BTreeMap<ComplianceDomain, u32>,

    pub findings: Vec<ComplianceFinding>,

    /// 按违规类型去重的整改建议
    pub remediation: Vec<String>,
}

impl ComplianceCheckResult {
    pub fn total_violations(&self) -> u32 {
        self.violation_counts.values().sum()
    }

    pub fn total_warnings(&self) -> u32 {
        self.warning_counts.values().sum()
    }

    /// 最高违规严重程度
    pub fn worst_severity(&self) -> Option<Severity> {
        self.findings
            .iter()
            .filter(|f| f.is_violation())
            .map(|f| f.severity)
            .max()
    }

    pub fn violations_in(&self, domain: ComplianceDomain) -> u32 {
        self.violation_counts.get(&domain).copied().unwrap_or(0)
    }

    pub fn has_finding(&self, finding_type: FindingType) -> bool {
        self.findings.iter().any(|f| f.finding_type == finding_type)
    }
}

// ==========================================
// ScheduleValidationReport - 整表合规报告
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleValidationReport {
    pub period: SchedulePeriod,

    /// 评估基准日
    pub as_of: NaiveDate,

    pub status: ReportStatus,

    pub total_residents: usize,

    pub compliant_residents: usize,

    /// 完全合规住院医师占比 (0-100)
    pub compliance_percentage: f64,

    /// 有住院医师在岗的时间块中带教合规的占比 (0-100)
    pub supervision_compliance_percentage: f64,

    pub call_equity: CallEquityReport,

    /// 逐人结果 (按 person_id 排序)
    pub results: Vec<ComplianceCheckResult>,

    /// 无法归属到住院医师的发现 (值班公平性、带教医师重复排班等)
    pub pool_findings: Vec<ComplianceFinding>,

    pub violations_by_domain: BTreeMap<ComplianceDomain, u32>,

    /// 全部发现按严重程度分布 (含 WARNING)
    pub findings_by_severity: BTreeMap<Severity, u32>,

    /// 全表整改建议 (按违规类型去重)
    pub remediation: Vec<String>,

    pub executive_summary: String,
}

impl ScheduleValidationReport {
    pub fn result_for(&self, person_id: &str) -> Option<&ComplianceCheckResult> {
        self.results.iter().find(|r| r.person_id == person_id)
    }

    /// 全部发现 (逐人 + 人员池)
    pub fn all_findings(&self) -> impl Iterator<Item = &ComplianceFinding> {
        self.results
            .iter()
            .flat_map(|r| r.findings.iter())
            .chain(self.pool_findings.iter())
    }

    pub fn total_violations(&self) -> u32 {
        self.violations_by_domain.values().sum()
    }

    pub fn count_severity(&self, severity: Severity) -> u32 {
        self.findings_by_severity.get(&severity).copied().unwrap_or(0)
    }
}

// ==========================================
// SingleAssignmentCheck - 单条排班预检结果
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SingleAssignmentCheck {
    /// 无任何拒绝原因
    pub accepted: bool,

    /// 拒绝原因
    pub reasons: Vec<String>,

    /// 提示 (不影响 accepted, 如带教尚未到位)
    pub advisories: Vec<String>,
}

impl From<SingleAssignmentCheck> for (bool, Vec<String>) {
    fn from(check: SingleAssignmentCheck) -> Self {
        let mut reasons = check.reasons;
        reasons.extend(check.advisories.into_iter().map(|a| format!("Advisory: {}", a)));
        (check.accepted, reasons)
    }
}
