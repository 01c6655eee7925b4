// ==========================================
// 住院医师排班合规核心 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、只读快照
// 红线: 不含引擎逻辑, 不含持久化
// ==========================================

pub mod absence;
pub mod finding;
pub mod person;
pub mod schedule;
pub mod snapshot;
pub mod types;

// 重导出核心类型
pub use absence::Absence;
pub use finding::{ComplianceFinding, FindingEvidence};
pub use person::{Credential, Person, PreferenceSet};
pub use schedule::{
    Assignment, CallRecord, MoonlightingEntry, RotationTemplate, SchedulePeriod, TimeBlock,
};
pub use snapshot::{ScheduleSnapshot, SnapshotIndex};
pub use types::{
    AbsenceType, AssignmentRole, ComplianceDomain, CredentialKind, DayPeriod, FindingType,
    PersonRole, RotationCategory, Severity, SupervisionCategory,
};
