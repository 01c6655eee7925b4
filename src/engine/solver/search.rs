// ==========================================
// 住院医师排班合规核心 - 搜索空间
// ==========================================
// 职责: 需求展开为单位槽位 / 静态候选过滤 / 候选评估
// 红线: 槽位顺序与候选顺序固定 (日期, 时段, 时间块, 轮转; person_id), 保证结果可复现
// ==========================================

use crate::config::ComplianceConfig;
use crate::constraint::{Candidate, ConstraintRegistry, ConstraintType, EvaluationContext, ScoreOutcome};
use crate::domain::person::Person;
use crate::domain::schedule::{Assignment, CallRecord, SchedulePeriod};
use crate::domain::snapshot::{require_people, require_period, SnapshotIndex};
use crate::domain::types::{AssignmentRole, DayPeriod};
use crate::engine::leave::LeaveValidator;
use crate::engine::solver::problem::SolveProblem;
use crate::error::{CoreError, CoreResult};
use chrono::NaiveDate;
use std::collections::BTreeSet;

// ==========================================
// Slot - 单位槽位
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SlotKind {
    Block {
        block_id: String,
        period: DayPeriod,
        rotation_id: Option<String>,
        role: AssignmentRole,
    },
    Call,
}

#[derive(Debug, Clone)]
pub(crate) struct Slot {
    pub label: String,
    pub date: NaiveDate,
    pub kind: SlotKind,
    /// 通过静态过滤的候选 (按 person_id 排序)
    pub candidates: Vec<String>,
    /// 被静态过滤排除时命中的硬约束
    pub excluded_by: BTreeSet<ConstraintType>,
}

impl Slot {
    fn sort_key(&self) -> (NaiveDate, DayPeriod, String, String) {
        match &self.kind {
            SlotKind::Block {
                block_id,
                period,
                rotation_id,
                ..
            } => (
                self.date,
                *period,
                block_id.clone(),
                rotation_id.clone().unwrap_or_default(),
            ),
            // 值班排在同日夜间时段之后
            SlotKind::Call => (self.date, DayPeriod::Night, "~call".to_string(), String::new()),
        }
    }
}

// ==========================================
// SearchSpace - 搜索空间 (只读)
// ==========================================
pub(crate) struct SearchSpace<'a> {
    pub problem: &'a SolveProblem,
    pub registry: &'a ConstraintRegistry,
    pub config: &'a ComplianceConfig,
    pub period: SchedulePeriod,
    pub slots: Vec<Slot>,
}

impl<'a> SearchSpace<'a> {
    /// 构建搜索空间 (含前置条件检查)
    pub fn build(
        problem: &'a SolveProblem,
        registry: &'a ConstraintRegistry,
        config: &'a ComplianceConfig,
    ) -> CoreResult<Self> {
        let snapshot = &problem.snapshot;
        require_people(snapshot, "solver")?;
        if snapshot.blocks.is_empty() {
            return Err(CoreError::EmptyBlocks);
        }
        if problem.total_slots() == 0 {
            return Err(CoreError::InvalidInput {
                field: "demands".to_string(),
                message: "没有任何需求槽位".to_string(),
            });
        }
        // 未指定周期时取时间块跨度, 并覆盖全部值班需求日期
        let period = match problem.period {
            Some(period) => period,
            None => match snapshot.block_span() {
                Some(span) => problem.call_demands.iter().fold(span, |acc, demand| {
                    SchedulePeriod::new(acc.start.min(demand.date), acc.end.max(demand.date))
                }),
                None => return Err(CoreError::EmptyBlocks),
            },
        };
        require_period(&period)?;

        // 结构校验 (重复 ID / 悬空引用)
        let index = SnapshotIndex::build(snapshot)?;
        let leave = LeaveValidator::new(config.leave.clone());
        let check_recovery = registry.contains(ConstraintType::PostDeploymentRecovery);
        // 阻断型缺勤与派遣恢复期内的人员静态排除
        let unavailable = |person_id: &str, date: NaiveDate, excluded_by: &mut BTreeSet<ConstraintType>| {
            let absences = index.absences(person_id);
            let mut blocked = false;
            if leave.blocking_absence_on(absences, date).is_some() {
                excluded_by.insert(ConstraintType::BlockingAbsence);
                blocked = true;
            }
            if check_recovery && leave.recovery_absence_on(absences, date).is_some() {
                excluded_by.insert(ConstraintType::PostDeploymentRecovery);
                blocked = true;
            }
            blocked
        };
        let mut slots = Vec::new();

        for demand in &problem.demands {
            let block = index.block(&demand.block_id).ok_or_else(|| CoreError::UnknownReference {
                entity: "TimeBlock".to_string(),
                id: demand.block_id.clone(),
            })?;
            let rotation = match demand.rotation_id.as_deref() {
                Some(id) => Some(index.rotation(id).ok_or_else(|| CoreError::UnknownReference {
                    entity: "RotationTemplate".to_string(),
                    id: id.to_string(),
                })?),
                None => None,
            };
            let pool = candidate_pool(&index, &demand.candidates, |p| match demand.role {
                AssignmentRole::Primary => p.is_resident(),
                AssignmentRole::Supervising => p.is_faculty(),
                AssignmentRole::Backup => true,
            })?;

            for unit in 0..demand.headcount {
                let mut excluded_by = BTreeSet::new();
                let candidates = pool
                    .iter()
                    .filter(|person| {
                        let mut ok = !unavailable(&person.person_id, block.date, &mut excluded_by);
                        if let Some(rotation) = rotation {
                            if demand.role == AssignmentRole::Primary {
                                if person.is_resident() && !rotation.allows_pgy(person.pgy_level) {
                                    excluded_by.insert(ConstraintType::PgyEligibility);
                                    ok = false;
                                }
                                if rotation
                                    .required_credentials
                                    .iter()
                                    .any(|code| !person.holds_any_credential(code, block.date))
                                {
                                    excluded_by.insert(ConstraintType::RotationCredential);
                                    ok = false;
                                }
                            }
                        }
                        ok
                    })
                    .map(|p| p.person_id.clone())
                    .collect();

                slots.push(Slot {
                    label: format!(
                        "{}/{}/{}#{}",
                        block.block_id,
                        demand.rotation_id.as_deref().unwrap_or("-"),
                        demand.role,
                        unit + 1
                    ),
                    date: block.date,
                    kind: SlotKind::Block {
                        block_id: block.block_id.clone(),
                        period: block.period,
                        rotation_id: demand.rotation_id.clone(),
                        role: demand.role,
                    },
                    candidates,
                    excluded_by,
                });
            }
        }

        for demand in &problem.call_demands {
            let pool = candidate_pool(&index, &demand.candidates, |p| p.is_resident())?;
            for unit in 0..demand.headcount {
                let mut excluded_by = BTreeSet::new();
                let candidates = pool
                    .iter()
                    .filter(|person| !unavailable(&person.person_id, demand.date, &mut excluded_by))
                    .map(|p| p.person_id.clone())
                    .collect();
                slots.push(Slot {
                    label: format!("CALL/{}#{}", demand.date, unit + 1),
                    date: demand.date,
                    kind: SlotKind::Call,
                    candidates,
                    excluded_by,
                });
            }
        }

        slots.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()).then_with(|| a.label.cmp(&b.label)));

        Ok(Self {
            problem,
            registry,
            config,
            period,
            slots,
        })
    }

    /// 静态可证不可行的槽位 (无任何候选)
    pub fn empty_slots(&self) -> Vec<&Slot> {
        self.slots.iter().filter(|s| s.candidates.is_empty()).collect()
    }

    /// 由选择序列生成候选 (仅新增部分)
    pub fn candidate_from(&self, choices: &[Option<String>]) -> Candidate {
        let mut assignments = Vec::new();
        let mut calls = Vec::new();
        for (slot, choice) in self.slots.iter().zip(choices.iter()) {
            let Some(person_id) = choice else {
                continue;
            };
            match &slot.kind {
                SlotKind::Block {
                    block_id,
                    rotation_id,
                    role,
                    ..
                } => assignments.push(Assignment {
                    person_id: person_id.clone(),
                    block_id: block_id.clone(),
                    rotation_id: rotation_id.clone(),
                    role: *role,
                    procedure_code: None,
                }),
                SlotKind::Call => calls.push(CallRecord::new(person_id, slot.date)),
            }
        }
        let mut candidate = Candidate::new(assignments, calls);
        candidate.normalize();
        candidate
    }

    /// 新增部分 + 快照既有排班
    fn merged(&self, candidate: &Candidate) -> (Vec<Assignment>, Vec<CallRecord>) {
        let snapshot = &self.problem.snapshot;
        let mut assignments = snapshot.assignments.clone();
        assignments.extend(candidate.assignments.iter().cloned());
        let mut calls = snapshot.call_records();
        calls.extend(candidate.calls.iter().cloned());
        (assignments, calls)
    }

    /// 完整评分 (全部硬约束 + 软约束)
    pub fn evaluate(&self, candidate: &Candidate) -> CoreResult<ScoreOutcome> {
        let (assignments, calls) = self.merged(candidate);
        let index = SnapshotIndex::build_with(&self.problem.snapshot, &assignments, &calls)?;
        let ctx = EvaluationContext::new(&index, self.config, self.period);
        Ok(self.registry.evaluate(&ctx))
    }

    /// 单调硬约束违规类型 (部分解剪枝)
    pub fn monotone_violations(&self, candidate: &Candidate) -> CoreResult<BTreeSet<ConstraintType>> {
        let (assignments, calls) = self.merged(candidate);
        let index = SnapshotIndex::build_with(&self.problem.snapshot, &assignments, &calls)?;
        let ctx = EvaluationContext::new(&index, self.config, self.period);
        Ok(self
            .registry
            .all_hard()
            .iter()
            .filter(|c| c.monotone)
            .filter(|c| !c.evaluate(&ctx).is_empty())
            .map(|c| c.constraint_type)
            .collect())
    }

    /// 同一时间块 (或同一值班日) 不得重复选择同一人
    pub fn conflicts(&self, choices: &[Option<String>], slot_index: usize, person_id: &str) -> bool {
        let slot = &self.slots[slot_index];
        self.slots
            .iter()
            .zip(choices.iter())
            .any(|(other, choice)| {
                choice.as_deref() == Some(person_id) && same_position(slot, other)
            })
    }

    /// 槽位无可行候选时, 汇总阻塞约束
    pub fn blocking_for(&self, choices: &[Option<String>], slot_index: usize) -> CoreResult<BTreeSet<ConstraintType>> {
        let slot = &self.slots[slot_index];
        let mut blocking = slot.excluded_by.clone();
        let mut trial = choices.to_vec();
        for person_id in &slot.candidates {
            if self.conflicts(choices, slot_index, person_id) {
                blocking.insert(ConstraintType::OnePrimaryPerBlock);
                continue;
            }
            trial[slot_index] = Some(person_id.clone());
            blocking.extend(self.monotone_violations(&self.candidate_from(&trial))?);
        }
        Ok(blocking)
    }
}

fn same_position(a: &Slot, b: &Slot) -> bool {
    match (&a.kind, &b.kind) {
        (SlotKind::Block { block_id: x, .. }, SlotKind::Block { block_id: y, .. }) => x == y,
        (SlotKind::Call, SlotKind::Call) => a.date == b.date,
        _ => false,
    }
}

/// 候选人员池: 显式名单优先, 否则按角色取在岗人员 (按 person_id 排序)
fn candidate_pool<'a>(
    index: &SnapshotIndex<'a>,
    explicit: &[String],
    role_filter: impl Fn(&Person) -> bool,
) -> CoreResult<Vec<&'a Person>> {
    if explicit.is_empty() {
        return Ok(index
            .people_sorted()
            .into_iter()
            .filter(|p| p.active && role_filter(p))
            .collect());
    }
    let mut pool = Vec::new();
    for person_id in explicit {
        let person = index.person(person_id).ok_or_else(|| CoreError::UnknownReference {
            entity: "Person".to_string(),
            id: person_id.clone(),
        })?;
        if person.active {
            pool.push(person);
        }
    }
    pool.sort_by(|a, b| a.person_id.cmp(&b.person_id));
    pool.dedup_by(|a, b| a.person_id == b.person_id);
    Ok(pool)
}
