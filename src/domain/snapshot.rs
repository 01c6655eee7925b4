// ==========================================
// 住院医师排班合规核心 - 领域快照
// ==========================================
// 红线: 单次运行内快照只读; 核心不回写存储
// 职责: 承载协作方提供的全部输入 + 构建只读索引
// ==========================================

use crate::domain::absence::Absence;
use crate::domain::person::Person;
use crate::domain::schedule::{
    Assignment, CallRecord, MoonlightingEntry, RotationTemplate, SchedulePeriod, TimeBlock,
};
use crate::error::{CoreError, CoreResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

// ==========================================
// ScheduleSnapshot - 输入快照
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleSnapshot {
    pub people: Vec<Person>,

    pub blocks: Vec<TimeBlock>,

    #[serde(default)]
    pub rotations: Vec<RotationTemplate>,

    #[serde(default)]
    pub assignments: Vec<Assignment>,

    /// person_id -> 缺勤记录
    #[serde(default)]
    pub absences: BTreeMap<String, Vec<Absence>>,

    /// person_id -> 值班日期
    #[serde(default)]
    pub call_dates: BTreeMap<String, Vec<NaiveDate>>,

    /// person_id -> 院外兼职工时
    #[serde(default)]
    pub moonlighting: BTreeMap<String, Vec<MoonlightingEntry>>,

    /// 评估基准日 (返岗跟进、学年进度)
    pub as_of: NaiveDate,
}

impl ScheduleSnapshot {
    pub fn new(as_of: NaiveDate) -> Self {
        Self {
            people: Vec::new(),
            blocks: Vec::new(),
            rotations: Vec::new(),
            assignments: Vec::new(),
            absences: BTreeMap::new(),
            call_dates: BTreeMap::new(),
            moonlighting: BTreeMap::new(),
            as_of,
        }
    }

    /// 值班记录 (扁平形式)
    pub fn call_records(&self) -> Vec<CallRecord> {
        self.call_dates
            .iter()
            .flat_map(|(person_id, dates)| dates.iter().map(move |d| CallRecord::new(person_id, *d)))
            .collect()
    }

    /// 时间块覆盖的周期 (无时间块时为 None)
    pub fn block_span(&self) -> Option<SchedulePeriod> {
        let start = self.blocks.iter().map(|b| b.date).min()?;
        let end = self.blocks.iter().map(|b| b.date).max()?;
        Some(SchedulePeriod::new(start, end))
    }
}

// ==========================================
// SnapshotIndex - 只读索引
// ==========================================
// 可基于快照自带排班构建, 也可基于候选排班构建 (求解器评分)
pub struct SnapshotIndex<'a> {
    pub snapshot: &'a ScheduleSnapshot,
    pub assignments: &'a [Assignment],
    people: HashMap<&'a str, &'a Person>,
    blocks: HashMap<&'a str, &'a TimeBlock>,
    rotations: HashMap<&'a str, &'a RotationTemplate>,
    by_person: HashMap<&'a str, Vec<&'a Assignment>>,
    by_block: HashMap<&'a str, Vec<&'a Assignment>>,
    calls: HashMap<String, Vec<NaiveDate>>,
}

impl<'a> SnapshotIndex<'a> {
    /// 基于快照自带排班与值班构建
    pub fn build(snapshot: &'a ScheduleSnapshot) -> CoreResult<Self> {
        let calls = snapshot
            .call_dates
            .iter()
            .map(|(person_id, dates)| (person_id.clone(), normalize_dates(dates)))
            .collect();
        Self::assemble(snapshot, &snapshot.assignments, calls)
    }

    /// 基于候选排班与候选值班构建
    pub fn build_with(
        snapshot: &'a ScheduleSnapshot,
        assignments: &'a [Assignment],
        calls: &[CallRecord],
    ) -> CoreResult<Self> {
        let mut grouped: HashMap<String, Vec<NaiveDate>> = HashMap::new();
        for call in calls {
            grouped
                .entry(call.person_id.clone())
                .or_default()
                .push(call.call_date);
        }
        let calls = grouped
            .into_iter()
            .map(|(person_id, dates)| (person_id, normalize_dates(&dates)))
            .collect();
        Self::assemble(snapshot, assignments, calls)
    }

    fn assemble(
        snapshot: &'a ScheduleSnapshot,
        assignments: &'a [Assignment],
        calls: HashMap<String, Vec<NaiveDate>>,
    ) -> CoreResult<Self> {
        let mut people = HashMap::new();
        for person in &snapshot.people {
            if people.insert(person.person_id.as_str(), person).is_some() {
                return Err(CoreError::DuplicateId {
                    entity: "Person".to_string(),
                    id: person.person_id.clone(),
                });
            }
        }

        let mut blocks = HashMap::new();
        for block in &snapshot.blocks {
            if blocks.insert(block.block_id.as_str(), block).is_some() {
                return Err(CoreError::DuplicateId {
                    entity: "TimeBlock".to_string(),
                    id: block.block_id.clone(),
                });
            }
        }

        let mut rotations = HashMap::new();
        for rotation in &snapshot.rotations {
            if rotations.insert(rotation.rotation_id.as_str(), rotation).is_some() {
                return Err(CoreError::DuplicateId {
                    entity: "RotationTemplate".to_string(),
                    id: rotation.rotation_id.clone(),
                });
            }
        }

        let mut by_person: HashMap<&'a str, Vec<&'a Assignment>> = HashMap::new();
        let mut by_block: HashMap<&'a str, Vec<&'a Assignment>> = HashMap::new();
        for assignment in assignments {
            if !people.contains_key(assignment.person_id.as_str()) {
                return Err(CoreError::UnknownReference {
                    entity: "Person".to_string(),
                    id: assignment.person_id.clone(),
                });
            }
            if !blocks.contains_key(assignment.block_id.as_str()) {
                return Err(CoreError::UnknownReference {
                    entity: "TimeBlock".to_string(),
                    id: assignment.block_id.clone(),
                });
            }
            if let Some(rotation_id) = assignment.rotation_id.as_deref() {
                if !rotations.contains_key(rotation_id) {
                    return Err(CoreError::UnknownReference {
                        entity: "RotationTemplate".to_string(),
                        id: rotation_id.to_string(),
                    });
                }
            }
            by_person
                .entry(assignment.person_id.as_str())
                .or_default()
                .push(assignment);
            by_block
                .entry(assignment.block_id.as_str())
                .or_default()
                .push(assignment);
        }

        Ok(Self {
            snapshot,
            assignments,
            people,
            blocks,
            rotations,
            by_person,
            by_block,
            calls,
        })
    }

    // ===== 查询 =====

    pub fn person(&self, person_id: &str) -> Option<&'a Person> {
        self.people.get(person_id).copied()
    }

    pub fn block(&self, block_id: &str) -> Option<&'a TimeBlock> {
        self.blocks.get(block_id).copied()
    }

    pub fn rotation(&self, rotation_id: &str) -> Option<&'a RotationTemplate> {
        self.rotations.get(rotation_id).copied()
    }

    pub fn rotation_of(&self, assignment: &Assignment) -> Option<&'a RotationTemplate> {
        assignment
            .rotation_id
            .as_deref()
            .and_then(|id| self.rotation(id))
    }

    pub fn assignment_date(&self, assignment: &Assignment) -> Option<NaiveDate> {
        self.block(&assignment.block_id).map(|b| b.date)
    }

    pub fn assignments_for_person(&self, person_id: &str) -> &[&'a Assignment] {
        self.by_person
            .get(person_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn assignments_for_block(&self, block_id: &str) -> &[&'a Assignment] {
        self.by_block
            .get(block_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// 已排序去重的值班日期
    pub fn call_dates(&self, person_id: &str) -> &[NaiveDate] {
        self.calls.get(person_id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn absences(&self, person_id: &str) -> &'a [Absence] {
        self.snapshot
            .absences
            .get(person_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn moonlighting(&self, person_id: &str) -> &'a [MoonlightingEntry] {
        self.snapshot
            .moonlighting
            .get(person_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// 住院医师 (按 person_id 排序)
    pub fn residents(&self) -> Vec<&'a Person> {
        let mut list: Vec<&'a Person> = self
            .snapshot
            .people
            .iter()
            .filter(|p| p.is_resident())
            .collect();
        list.sort_by(|a, b| a.person_id.cmp(&b.person_id));
        list
    }

    /// 全部人员 (按 person_id 排序)
    pub fn people_sorted(&self) -> Vec<&'a Person> {
        let mut list: Vec<&'a Person> = self.snapshot.people.iter().collect();
        list.sort_by(|a, b| a.person_id.cmp(&b.person_id));
        list
    }

    /// 时间块 (按 日期/时段/ID 排序)
    pub fn blocks_sorted(&self) -> Vec<&'a TimeBlock> {
        let mut list: Vec<&'a TimeBlock> = self.snapshot.blocks.iter().collect();
        list.sort_by(|a, b| {
            (a.date, a.period, a.block_id.as_str()).cmp(&(b.date, b.period, b.block_id.as_str()))
        });
        list
    }

    /// 某人在某日期集合上的排班日期 (去重排序)
    pub fn assignment_dates(&self, person_id: &str) -> Vec<NaiveDate> {
        let set: HashSet<NaiveDate> = self
            .assignments_for_person(person_id)
            .iter()
            .filter_map(|a| self.assignment_date(a))
            .collect();
        let mut dates: Vec<NaiveDate> = set.into_iter().collect();
        dates.sort();
        dates
    }
}

fn normalize_dates(dates: &[NaiveDate]) -> Vec<NaiveDate> {
    let mut sorted = dates.to_vec();
    sorted.sort();
    sorted.dedup();
    sorted
}

/// 人员池前置条件
pub fn require_people(snapshot: &ScheduleSnapshot, context: &str) -> CoreResult<()> {
    if snapshot.people.is_empty() {
        return Err(CoreError::EmptyPersonPool {
            context: context.to_string(),
        });
    }
    Ok(())
}

/// 周期前置条件
pub fn require_period(period: &SchedulePeriod) -> CoreResult<()> {
    if !period.is_valid() {
        return Err(CoreError::InvalidPeriod {
            start: period.start.to_string(),
            end: period.end.to_string(),
        });
    }
    Ok(())
}
