use crate::domain::types::{ComplianceDomain, FindingType, Severity};
use crate::engine::orchestrator::report::{ReportStatus, ScheduleValidationReport};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// 住院医师排行展示条数
pub const TOP_RESIDENTS: usize = 10;

// ==========================================
// DashboardData - 看板展示结构
// ==========================================
// 纯投影: 只重排报告已有数据, 不重新计算合规结论
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardData {
    pub headline: Headline,
    pub domain_tiles: Vec<DomainTile>,
    pub severity_distribution: Vec<SeverityBucket>,
    pub top_residents: Vec<ResidentRow>,
    pub findings: Vec<FindingRow>,
    pub remediation: Vec<String>,
    pub executive_summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Headline {
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub status: ReportStatus,
    pub compliance_percentage: f64,
    pub supervision_compliance_percentage: f64,
    pub total_residents: usize,
    pub compliant_residents: usize,
    pub total_violations: u32,
    pub call_imbalance_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainTile {
    pub domain: ComplianceDomain,
    pub violations: u32,
    /// 该领域至少一条违规的住院医师数
    pub residents_affected: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeverityBucket {
    pub severity: Severity,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResidentRow {
    pub person_id: String,
    pub name: String,
    pub pgy_level: Option<u8>,
    pub violations: u32,
    pub warnings: u32,
    pub worst_severity: Option<Severity>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindingRow {
    pub person_id: Option<String>,
    pub domain: ComplianceDomain,
    pub finding_type: FindingType,
    pub severity: Severity,
    pub date: Option<NaiveDate>,
    pub message: String,
}

impl DashboardData {
    pub fn from_report(report: &ScheduleValidationReport) -> Self {
        let headline = Headline {
            period_start: report.period.start,
            period_end: report.period.end,
            status: report.status,
            compliance_percentage: report.compliance_percentage,
            supervision_compliance_percentage: report.supervision_compliance_percentage,
            total_residents: report.total_residents,
            compliant_residents: report.compliant_residents,
            total_violations: report.total_violations(),
            call_imbalance_ratio: report.call_equity.imbalance_ratio,
        };

        let domain_tiles = ComplianceDomain::VALIDATED
            .iter()
            .map(|domain| DomainTile {
                domain: *domain,
                violations: report.violations_by_domain.get(domain).copied().unwrap_or(0),
                residents_affected: report
                    .results
                    .iter()
                    .filter(|r| r.violations_in(*domain) > 0)
                    .count(),
            })
            .collect();

        // 严重程度从高到低
        let severity_distribution = [
            Severity::Critical,
            Severity::High,
            Severity::Medium,
            Severity::Warning,
        ]
        .into_iter()
        .map(|severity| SeverityBucket {
            severity,
            count: report.count_severity(severity),
        })
        .collect();

        let mut ranked: Vec<ResidentRow> = report
            .results
            .iter()
            .filter(|r| r.total_violations() > 0 || r.total_warnings() > 0)
            .map(|r| ResidentRow {
                person_id: r.person_id.clone(),
                name: r.name.clone(),
                pgy_level: r.pgy_level,
                violations: r.total_violations(),
                warnings: r.total_warnings(),
                worst_severity: r.worst_severity(),
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.worst_severity
                .cmp(&a.worst_severity)
                .then_with(|| b.violations.cmp(&a.violations))
                .then_with(|| b.warnings.cmp(&a.warnings))
                .then_with(|| a.person_id.cmp(&b.person_id))
        });
        ranked.truncate(TOP_RESIDENTS);

        let mut findings: Vec<FindingRow> = report
            .all_findings()
            .map(|f| FindingRow {
                person_id: f.person_id.clone(),
                domain: f.domain(),
                finding_type: f.finding_type,
                severity: f.severity,
                date: f.evidence.dates.first().copied().or(f.evidence.window_start),
                message: f.message.clone(),
            })
            .collect();
        findings.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then_with(|| a.date.cmp(&b.date))
                .then_with(|| a.person_id.cmp(&b.person_id))
        });

        Self {
            headline,
            domain_tiles,
            severity_distribution,
            top_residents: ranked,
            findings,
            remediation: report.remediation.clone(),
            executive_summary: report.executive_summary.clone(),
        }
    }
}
