// ==========================================
// 住院医师排班合规核心 - 带教校验引擎
// ==========================================
// 职责: 分数负荷带教需求 / 带教重复占用 / 专科带教 / 操作带教
// 公式: required = ceil((2 * PGY1 + 1 * PGY2/3) / 4)
// 红线: 需求对 PGY-1 人数单调不减
// ==========================================

use crate::config::SupervisionPolicy;
use crate::domain::finding::{ComplianceFinding, FindingEvidence};
use crate::domain::person::Person;
use crate::domain::schedule::{SchedulePeriod, TimeBlock};
use crate::domain::snapshot::SnapshotIndex;
use crate::domain::types::{
    AssignmentRole, CredentialKind, DayPeriod, FindingType, Severity, SupervisionCategory,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

// ==========================================
// 单时间块带教统计
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockSupervision {
    pub block_id: String,
    pub date: NaiveDate,
    pub pgy1_count: u32,
    pub senior_count: u32,
    pub required_faculty: u32,
    pub actual_faculty: u32,
    pub deficit: u32,
    pub resident_ids: Vec<String>,
}

// ==========================================
// 周期带教分析结果
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SupervisionAnalysis {
    pub blocks: Vec<BlockSupervision>,
    pub blocks_with_residents: usize,
    pub compliant_blocks: usize,
    /// 周期带教合规率 (0-100)
    pub compliance_percentage: f64,
    pub findings: Vec<ComplianceFinding>,
}

impl SupervisionAnalysis {
    /// 某时间块内在岗住院医师
    pub fn residents_in_block(&self, block_id: &str) -> &[String] {
        self.blocks
            .iter()
            .find(|b| b.block_id == block_id)
            .map(|b| b.resident_ids.as_slice())
            .unwrap_or(&[])
    }
}

// ==========================================
// SupervisionValidator - 带教校验引擎
// ==========================================
#[derive(Debug, Clone)]
pub struct SupervisionValidator {
    policy: SupervisionPolicy,
}

impl SupervisionValidator {
    pub fn new(policy: SupervisionPolicy) -> Self {
        Self { policy }
    }

    /// 分数负荷带教需求
    ///
    /// PGY-1 按 1:2 比例、高年资按 1:4 比例, 折算为统一负荷单位后向上取整
    pub fn required_faculty(&self, pgy1_count: u32, senior_count: u32) -> u32 {
        let units = self.policy.pgy1_load_units * pgy1_count + self.policy.senior_load_units * senior_count;
        let per_faculty = self.policy.units_per_faculty.max(1);
        (units + per_faculty - 1) / per_faculty
    }

    // ==========================================
    // 单时间块
    // ==========================================

    /// 统计单时间块的带教需求与在岗带教
    pub fn analyze_block(&self, index: &SnapshotIndex, block: &TimeBlock) -> BlockSupervision {
        let mut residents: BTreeSet<&str> = BTreeSet::new();
        let mut faculty: BTreeSet<&str> = BTreeSet::new();
        let mut pgy1_count = 0;
        let mut senior_count = 0;

        for assignment in index.assignments_for_block(&block.block_id) {
            let Some(person) = index.person(&assignment.person_id) else {
                continue;
            };
            if person.is_resident() {
                if assignment.role == AssignmentRole::Primary
                    && residents.insert(person.person_id.as_str())
                {
                    if person.is_pgy1() {
                        pgy1_count += 1;
                    } else {
                        senior_count += 1;
                    }
                }
            } else if assignment.role.counts_as_duty() {
                faculty.insert(person.person_id.as_str());
            }
        }

        let required_faculty = self.required_faculty(pgy1_count, senior_count);
        let actual_faculty = faculty.len() as u32;

        BlockSupervision {
            block_id: block.block_id.clone(),
            date: block.date,
            pgy1_count,
            senior_count,
            required_faculty,
            actual_faculty,
            deficit: required_faculty.saturating_sub(actual_faculty),
            resident_ids: residents.into_iter().map(|s| s.to_string()).collect(),
        }
    }

    pub(crate) fn deficit_finding(&self, stats: &BlockSupervision) -> ComplianceFinding {
        // 缺口越大越严重; 完全无人带教直接 CRITICAL
        let severity = if stats.actual_faculty == 0 || stats.deficit >= 2 {
            Severity::Critical
        } else {
            Severity::High
        };
        ComplianceFinding::new(
            None,
            FindingType::SupervisionDeficit,
            severity,
            format!(
                "Block {} on {} needs {} faculty for {} PGY-1 + {} senior resident(s) but has {} (deficit {})",
                stats.block_id,
                stats.date,
                stats.required_faculty,
                stats.pgy1_count,
                stats.senior_count,
                stats.actual_faculty,
                stats.deficit
            ),
        )
        .with_evidence(FindingEvidence {
            dates: vec![stats.date],
            block_id: Some(stats.block_id.clone()),
            measured: Some(stats.actual_faculty as f64),
            threshold: Some(stats.required_faculty as f64),
            count: Some(stats.deficit),
            ..Default::default()
        })
    }

    /// 专科轮转: 需有持该专科资质的带教在岗
    pub fn check_specialty(&self, index: &SnapshotIndex, block: &TimeBlock) -> Vec<ComplianceFinding> {
        let faculty = self.faculty_in_block(index, block);
        let mut findings = Vec::new();

        for assignment in index.assignments_for_block(&block.block_id) {
            if assignment.role != AssignmentRole::Primary {
                continue;
            }
            let Some(person) = index.person(&assignment.person_id) else {
                continue;
            };
            if !person.is_resident() {
                continue;
            }
            let Some(rotation) = index.rotation_of(assignment) else {
                continue;
            };
            let SupervisionCategory::Specialty(specialty) = &rotation.supervision else {
                continue;
            };

            let covered = faculty
                .iter()
                .any(|f| f.holds_credential(specialty, CredentialKind::Specialty, block.date));
            if !covered {
                findings.push(
                    ComplianceFinding::new(
                        Some(&person.person_id),
                        FindingType::SpecialtySupervisionMissing,
                        Severity::High,
                        format!(
                            "Specialty rotation {} on {} has no faculty credentialed in {}",
                            rotation.rotation_id, block.date, specialty
                        ),
                    )
                    .with_evidence(FindingEvidence {
                        dates: vec![block.date],
                        block_id: Some(block.block_id.clone()),
                        reference: Some(specialty.clone()),
                        ..Default::default()
                    }),
                );
            }
        }
        findings
    }

    /// 操作带教: 无独立资质的住院医师执行操作时需有持该操作资质的带教在岗
    pub fn check_procedures(&self, index: &SnapshotIndex, block: &TimeBlock) -> Vec<ComplianceFinding> {
        let faculty = self.faculty_in_block(index, block);
        let mut findings = Vec::new();

        for assignment in index.assignments_for_block(&block.block_id) {
            let Some(procedure) = assignment.procedure_code.as_deref() else {
                continue;
            };
            let Some(person) = index.person(&assignment.person_id) else {
                continue;
            };
            if !person.is_resident() {
                continue;
            }
            if person.holds_credential(procedure, CredentialKind::Procedure, block.date) {
                continue;
            }
            let supervised = faculty
                .iter()
                .any(|f| f.holds_credential(procedure, CredentialKind::Procedure, block.date));
            if !supervised {
                findings.push(
                    ComplianceFinding::new(
                        Some(&person.person_id),
                        FindingType::ProcedureSupervisionMissing,
                        Severity::High,
                        format!(
                            "Procedure {} on {} performed without independent qualification or credentialed faculty",
                            procedure, block.date
                        ),
                    )
                    .with_evidence(FindingEvidence {
                        dates: vec![block.date],
                        block_id: Some(block.block_id.clone()),
                        reference: Some(procedure.to_string()),
                        ..Default::default()
                    }),
                );
            }
        }
        findings
    }

    fn faculty_in_block<'a>(&self, index: &SnapshotIndex<'a>, block: &TimeBlock) -> Vec<&'a Person> {
        let mut faculty: Vec<&'a Person> = index
            .assignments_for_block(&block.block_id)
            .iter()
            .filter(|a| a.role.counts_as_duty())
            .filter_map(|a| index.person(&a.person_id))
            .filter(|p| p.is_faculty())
            .collect();
        faculty.sort_by(|a, b| a.person_id.cmp(&b.person_id));
        faculty.dedup_by(|a, b| a.person_id == b.person_id);
        faculty
    }

    // ==========================================
    // 带教重复占用
    // ==========================================

    /// 同一带教医师在同一日期时段出现在多个岗位
    pub fn check_double_booking(&self, index: &SnapshotIndex, period: &SchedulePeriod) -> Vec<ComplianceFinding> {
        let mut slots: BTreeMap<(&str, NaiveDate, DayPeriod), BTreeSet<(&str, Option<&str>)>> =
            BTreeMap::new();

        for assignment in index.assignments {
            if !assignment.role.counts_as_duty() {
                continue;
            }
            let Some(person) = index.person(&assignment.person_id) else {
                continue;
            };
            if !person.is_faculty() {
                continue;
            }
            let Some(block) = index.block(&assignment.block_id) else {
                continue;
            };
            if !period.contains(block.date) {
                continue;
            }
            slots
                .entry((person.person_id.as_str(), block.date, block.period))
                .or_default()
                .insert((block.block_id.as_str(), assignment.rotation_id.as_deref()));
        }

        slots
            .into_iter()
            .filter(|(_, posts)| posts.len() > 1)
            .map(|((person_id, date, day_period), posts)| {
                let listed: Vec<String> = posts
                    .iter()
                    .map(|(block_id, rotation)| format!("{}/{}", block_id, rotation.unwrap_or("-")))
                    .collect();
                ComplianceFinding::new(
                    Some(person_id),
                    FindingType::FacultyDoubleBooked,
                    Severity::High,
                    format!(
                        "Faculty double-booked on {} {} across {} posts: {}",
                        date,
                        day_period,
                        posts.len(),
                        listed.join(", ")
                    ),
                )
                .with_evidence(FindingEvidence {
                    dates: vec![date],
                    count: Some(posts.len() as u32),
                    ..Default::default()
                })
            })
            .collect()
    }

    // ==========================================
    // 周期校验
    // ==========================================

    pub fn validate_period(&self, index: &SnapshotIndex, period: &SchedulePeriod) -> SupervisionAnalysis {
        let mut analysis = SupervisionAnalysis::default();

        for block in index.blocks_sorted() {
            if !period.contains(block.date) {
                continue;
            }
            let stats = self.analyze_block(index, block);
            if stats.resident_ids.is_empty() {
                continue;
            }
            analysis.blocks_with_residents += 1;

            let mut block_findings = Vec::new();
            if stats.deficit > 0 {
                warn!(
                    block_id = %stats.block_id,
                    required = stats.required_faculty,
                    actual = stats.actual_faculty,
                    "带教人数不足"
                );
                block_findings.push(self.deficit_finding(&stats));
            }
            block_findings.extend(self.check_specialty(index, block));
            block_findings.extend(self.check_procedures(index, block));

            if block_findings.iter().all(|f| !f.is_violation()) {
                analysis.compliant_blocks += 1;
            }
            analysis.findings.extend(block_findings);
            analysis.blocks.push(stats);
        }

        analysis.findings.extend(self.check_double_booking(index, period));
        analysis.compliance_percentage = if analysis.blocks_with_residents == 0 {
            100.0
        } else {
            analysis.compliant_blocks as f64 / analysis.blocks_with_residents as f64 * 100.0
        };

        info!(
            blocks_with_residents = analysis.blocks_with_residents,
            compliant_blocks = analysis.compliant_blocks,
            compliance_percentage = analysis.compliance_percentage,
            "带教校验完成"
        );
        debug!(findings = analysis.findings.len(), "带教发现统计");
        analysis
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> SupervisionValidator {
        SupervisionValidator::new(SupervisionPolicy::default())
    }

    #[test]
    fn test_required_faculty_formula() {
        let v = validator();
        assert_eq!(v.required_faculty(0, 0), 0);
        assert_eq!(v.required_faculty(3, 0), 2);
        assert_eq!(v.required_faculty(2, 0), 1);
        assert_eq!(v.required_faculty(0, 4), 1);
        assert_eq!(v.required_faculty(0, 5), 2);
        assert_eq!(v.required_faculty(1, 2), 1);
        assert_eq!(v.required_faculty(2, 1), 2);
    }

    #[test]
    fn test_required_faculty_monotonic_in_pgy1() {
        let v = validator();
        for senior in 0..10 {
            let mut previous = 0;
            for pgy1 in 0..20 {
                let required = v.required_faculty(pgy1, senior);
                assert!(required >= previous, "pgy1={} senior={}", pgy1, senior);
                previous = required;
            }
        }
    }
}
