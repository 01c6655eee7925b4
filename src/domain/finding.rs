// ==========================================
// 住院医师排班合规核心 - 合规发现
// ==========================================
// 红线: 违规是数据, 不是异常
// 红线: 所有发现必须输出可解释的证据 (日期/计数/阈值)
// ==========================================

use crate::domain::types::{ComplianceDomain, FindingType, Severity};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ==========================================
// FindingEvidence - 结构化证据
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FindingEvidence {
    /// 涉及日期 (冲突日期逐一列出)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dates: Vec<NaiveDate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_start: Option<NaiveDate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_end: Option<NaiveDate>,

    /// 实测值 (工时均值、比例、缺口等)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measured: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,

    /// 超限百分比
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percent_over: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

// ==========================================
// ComplianceFinding - 合规发现
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceFinding {
    /// 关联人员 (人员池级发现可为空)
    pub person_id: Option<String>,

    pub finding_type: FindingType,

    pub severity: Severity,

    pub message: String,

    #[serde(default)]
    pub evidence: FindingEvidence,
}

impl ComplianceFinding {
    pub fn new(
        person_id: Option<&str>,
        finding_type: FindingType,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            person_id: person_id.map(|s| s.to_string()),
            finding_type,
            severity,
            message: message.into(),
            evidence: FindingEvidence::default(),
        }
    }

    pub fn with_evidence(mut self, evidence: FindingEvidence) -> Self {
        self.evidence = evidence;
        self
    }

    pub fn domain(&self) -> ComplianceDomain {
        self.finding_type.domain()
    }

    pub fn is_violation(&self) -> bool {
        self.severity.is_violation()
    }
}

/// 统计违规 (非 WARNING) 数量
pub fn count_violations(findings: &[ComplianceFinding]) -> usize {
    findings.iter().filter(|f| f.is_violation()).count()
}

/// 统计 CRITICAL/HIGH 数量
pub fn count_blocking(findings: &[ComplianceFinding]) -> usize {
    findings.iter().filter(|f| f.severity.is_blocking()).count()
}
