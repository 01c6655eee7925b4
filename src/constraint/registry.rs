// ==========================================
// 住院医师排班合规核心 - 约束注册表
// ==========================================
// 职责: 注册硬/软约束, 统一评分契约 score(candidate, context)
// 红线: 权重层级在构建期校验, 违反即构建失败 (不得带病评分)
// 红线: 无全局单例; 每次求解/校验持有独立注册表实例
// ==========================================

use crate::config::ComplianceConfig;
use crate::constraint::catalog::{ConstraintCategory, ConstraintKind, ConstraintProfile, ConstraintType, WEIGHT_HIERARCHIES};
use crate::constraint::context::{Candidate, EvaluationContext};
use crate::constraint::hard::HardConstraint;
use crate::constraint::soft::SoftConstraint;
use crate::domain::finding::{ComplianceFinding, FindingEvidence};
use crate::domain::schedule::SchedulePeriod;
use crate::domain::snapshot::{ScheduleSnapshot, SnapshotIndex};
use crate::domain::types::{FindingType, Severity};
use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

// ==========================================
// ConstraintDefinition - 约束定义 (硬/软标签变体)
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConstraintDefinition {
    Hard(HardConstraint),
    Soft(SoftConstraint),
}

impl ConstraintDefinition {
    /// 按声明表生成定义 (软约束可覆写权重)
    pub fn from_catalog(constraint_type: ConstraintType, weight_override: Option<f64>) -> Self {
        let decl = constraint_type.declaration();
        match decl.kind {
            ConstraintKind::Hard => ConstraintDefinition::Hard(HardConstraint {
                constraint_type,
                category: decl.category,
                monotone: decl.monotone,
            }),
            ConstraintKind::Soft => ConstraintDefinition::Soft(SoftConstraint {
                constraint_type,
                category: decl.category,
                weight: weight_override.unwrap_or(decl.default_weight),
            }),
        }
    }

    pub fn constraint_type(&self) -> ConstraintType {
        match self {
            ConstraintDefinition::Hard(c) => c.constraint_type,
            ConstraintDefinition::Soft(c) => c.constraint_type,
        }
    }

    pub fn category(&self) -> ConstraintCategory {
        match self {
            ConstraintDefinition::Hard(c) => c.category,
            ConstraintDefinition::Soft(c) => c.category,
        }
    }

    pub fn is_hard(&self) -> bool {
        matches!(self, ConstraintDefinition::Hard(_))
    }
}

// ==========================================
// Score - 评分 (可行性优先于惩罚)
// ==========================================
// 字典序: 先比硬约束违规数, 再比惩罚分; 越小越好
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Score {
    pub hard_violations: usize,
    pub penalty: f64,
}

impl Score {
    pub fn new(hard_violations: usize, penalty: f64) -> Self {
        Self {
            hard_violations,
            penalty,
        }
    }

    pub fn is_feasible(&self) -> bool {
        self.hard_violations == 0
    }

    /// 最差评分 (搜索初值)
    pub fn worst() -> Self {
        Self::new(usize::MAX, f64::INFINITY)
    }
}

impl Ord for Score {
    fn cmp(&self, other: &Self) -> Ordering {
        self.hard_violations
            .cmp(&other.hard_violations)
            .then_with(|| self.penalty.total_cmp(&other.penalty))
    }
}

impl PartialOrd for Score {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Score {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Score {}

// ==========================================
// ScoreOutcome - 评分结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreOutcome {
    pub is_feasible: bool,
    pub total_penalty: f64,
    pub findings: Vec<ComplianceFinding>,
    /// 硬约束 -> 违规条数
    pub hard_violations: BTreeMap<ConstraintType, usize>,
    /// 软约束 -> 惩罚分
    pub soft_penalties: BTreeMap<ConstraintType, f64>,
}

impl ScoreOutcome {
    pub fn score(&self) -> Score {
        Score::new(self.hard_violations.values().sum(), self.total_penalty)
    }

    /// 导致不可行的硬约束
    pub fn violated_hard(&self) -> Vec<ConstraintType> {
        self.hard_violations
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(t, _)| *t)
            .collect()
    }

    /// 兼容契约形式 (is_feasible, total_penalty, findings)
    pub fn into_parts(self) -> (bool, f64, Vec<ComplianceFinding>) {
        (self.is_feasible, self.total_penalty, self.findings)
    }
}

// ==========================================
// ConstraintRegistryBuilder - 注册表构建器
// ==========================================
pub struct ConstraintRegistryBuilder {
    profile: ConstraintProfile,
    definitions: Vec<ConstraintDefinition>,
}

impl ConstraintRegistryBuilder {
    pub fn new(profile: ConstraintProfile) -> Self {
        Self {
            profile,
            definitions: Vec::new(),
        }
    }

    /// 注册约束 (同类型重复注册即错误)
    pub fn register(&mut self, definition: ConstraintDefinition) -> CoreResult<&mut Self> {
        let constraint_type = definition.constraint_type();
        if self
            .definitions
            .iter()
            .any(|d| d.constraint_type() == constraint_type)
        {
            return Err(CoreError::DuplicateConstraint(constraint_type.to_string()));
        }
        if let ConstraintDefinition::Soft(soft) = &definition {
            if !soft.weight.is_finite() || soft.weight < 0.0 {
                return Err(CoreError::InvalidConfig {
                    key: format!("weight.{}", constraint_type),
                    message: format!("权重无效: {}", soft.weight),
                });
            }
        }
        self.definitions.push(definition);
        Ok(self)
    }

    /// 构建注册表并校验权重层级
    ///
    /// 层级链中已注册的软约束, 相邻两项权重必须严格递减
    pub fn build(self) -> CoreResult<ConstraintRegistry> {
        let weights: BTreeMap<ConstraintType, f64> = self
            .definitions
            .iter()
            .filter_map(|d| match d {
                ConstraintDefinition::Soft(s) => Some((s.constraint_type, s.weight)),
                ConstraintDefinition::Hard(_) => None,
            })
            .collect();

        for hierarchy in WEIGHT_HIERARCHIES {
            let present: Vec<(ConstraintType, f64)> = hierarchy
                .chain
                .iter()
                .filter_map(|t| weights.get(t).map(|w| (*t, *w)))
                .collect();
            for pair in present.windows(2) {
                let (higher, higher_weight) = pair[0];
                let (lower, lower_weight) = pair[1];
                if higher_weight <= lower_weight {
                    return Err(CoreError::WeightHierarchyViolation {
                        higher: higher.to_string(),
                        higher_weight,
                        lower: lower.to_string(),
                        lower_weight,
                    });
                }
            }
        }

        let mut hard = Vec::new();
        let mut soft = Vec::new();
        for definition in self.definitions {
            match definition {
                ConstraintDefinition::Hard(c) => hard.push(c),
                ConstraintDefinition::Soft(c) => soft.push(c),
            }
        }
        hard.sort_by_key(|c| c.constraint_type);
        soft.sort_by_key(|c| c.constraint_type);

        debug!(
            profile = self.profile.as_str(),
            hard = hard.len(),
            soft = soft.len(),
            "约束注册表构建完成"
        );
        Ok(ConstraintRegistry {
            profile: self.profile,
            hard,
            soft,
        })
    }
}

// ==========================================
// ConstraintRegistry - 约束注册表 (构建后不可变)
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintRegistry {
    profile: ConstraintProfile,
    hard: Vec<HardConstraint>,
    soft: Vec<SoftConstraint>,
}

impl ConstraintRegistry {
    pub fn profile(&self) -> ConstraintProfile {
        self.profile
    }

    pub fn all_hard(&self) -> &[HardConstraint] {
        &self.hard
    }

    pub fn all_soft(&self) -> &[SoftConstraint] {
        &self.soft
    }

    /// 已注册约束类型
    pub fn registered_types(&self) -> BTreeSet<ConstraintType> {
        self.hard
            .iter()
            .map(|c| c.constraint_type)
            .chain(self.soft.iter().map(|c| c.constraint_type))
            .collect()
    }

    pub fn contains(&self, constraint_type: ConstraintType) -> bool {
        self.registered_types().contains(&constraint_type)
    }

    pub fn weight_of(&self, constraint_type: ConstraintType) -> Option<f64> {
        self.soft
            .iter()
            .find(|c| c.constraint_type == constraint_type)
            .map(|c| c.weight)
    }

    /// 评分: 基于快照与候选排班
    pub fn score(
        &self,
        candidate: &Candidate,
        snapshot: &ScheduleSnapshot,
        config: &ComplianceConfig,
        period: SchedulePeriod,
    ) -> CoreResult<ScoreOutcome> {
        let index = SnapshotIndex::build_with(snapshot, &candidate.assignments, &candidate.calls)?;
        let ctx = EvaluationContext::new(&index, config, period);
        Ok(self.evaluate(&ctx))
    }

    /// 评分: 基于已构建的上下文
    pub fn evaluate(&self, ctx: &EvaluationContext) -> ScoreOutcome {
        crate::perf::record_evaluation();
        let mut findings = Vec::new();
        let mut hard_violations = BTreeMap::new();
        for constraint in &self.hard {
            let violations = constraint.evaluate(ctx);
            hard_violations.insert(constraint.constraint_type, violations.len());
            findings.extend(violations);
        }

        let mut total_penalty = 0.0;
        let mut soft_penalties = BTreeMap::new();
        for constraint in &self.soft {
            let violations = constraint.evaluate(ctx);
            let penalty = constraint.penalty(&violations);
            total_penalty += penalty;
            soft_penalties.insert(constraint.constraint_type, penalty);
            for violation in violations {
                findings.push(
                    ComplianceFinding::new(
                        violation.person_id.as_deref(),
                        FindingType::SoftConstraintPenalty,
                        Severity::Warning,
                        format!("{}: {}", constraint.constraint_type, violation.detail),
                    )
                    .with_evidence(FindingEvidence {
                        measured: Some(violation.magnitude),
                        threshold: Some(constraint.weight),
                        reference: Some(constraint.constraint_type.to_string()),
                        ..Default::default()
                    }),
                );
            }
        }

        let is_feasible = hard_violations.values().all(|count| *count == 0);
        ScoreOutcome {
            is_feasible,
            total_penalty,
            findings,
            hard_violations,
            soft_penalties,
        }
    }

    /// 仅评估单调硬约束的违规数 (部分解剪枝)
    pub fn monotone_violations(&self, ctx: &EvaluationContext) -> usize {
        self.hard
            .iter()
            .filter(|c| c.monotone)
            .map(|c| c.evaluate(ctx).len())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_builder(profile: ConstraintProfile, overrides: &[(ConstraintType, f64)]) -> ConstraintRegistryBuilder {
        let mut builder = ConstraintRegistryBuilder::new(profile);
        for t in ConstraintType::for_profile(profile) {
            let weight = overrides.iter().find(|(o, _)| *o == t).map(|(_, w)| *w);
            builder
                .register(ConstraintDefinition::from_catalog(t, weight))
                .unwrap();
        }
        builder
    }

    #[test]
    fn test_score_ordering_feasibility_dominates() {
        let feasible_expensive = Score::new(0, 1_000_000.0);
        let infeasible_cheap = Score::new(1, 0.0);
        assert!(feasible_expensive < infeasible_cheap);
        assert!(Score::new(0, 1.0) < Score::new(0, 2.0));
    }

    #[test]
    fn test_hierarchy_violation_fails_build() {
        let builder = full_builder(
            ConstraintProfile::Core,
            &[(ConstraintType::CallSpacing, 2000.0)],
        );
        match builder.build() {
            Err(CoreError::WeightHierarchyViolation { higher, lower, .. }) => {
                assert_eq!(higher, "CALL_WORST_DAY");
                assert_eq!(lower, "CALL_SPACING");
            }
            other => panic!("expected hierarchy violation, got {:?}", other),
        }
    }

    #[test]
    fn test_equal_weights_fail_build() {
        let builder = full_builder(
            ConstraintProfile::Core,
            &[
                (ConstraintType::WorkloadBalance, 10.0),
                (ConstraintType::BlockPreference, 10.0),
            ],
        );
        assert!(matches!(
            builder.build(),
            Err(CoreError::WeightHierarchyViolation { .. })
        ));
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut builder = ConstraintRegistryBuilder::new(ConstraintProfile::Core);
        builder
            .register(ConstraintDefinition::from_catalog(ConstraintType::CallSpacing, None))
            .unwrap();
        let err = builder
            .register(ConstraintDefinition::from_catalog(ConstraintType::CallSpacing, None))
            .err()
            .unwrap();
        assert_eq!(err, CoreError::DuplicateConstraint("CALL_SPACING".to_string()));
    }

    #[test]
    fn test_registry_splits_hard_and_soft() {
        let registry = full_builder(ConstraintProfile::Core, &[]).build().unwrap();
        assert!(registry.all_hard().iter().all(|c| c.constraint_type.is_hard()));
        assert!(registry.all_soft().iter().all(|c| !c.constraint_type.is_hard()));
        assert_eq!(registry.weight_of(ConstraintType::CallWorstDay), Some(1000.0));
    }
}
