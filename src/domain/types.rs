// ==========================================
// 住院医师排班合规核心 - 领域类型定义
// ==========================================
// 序列化格式: SCREAMING_SNAKE_CASE (与上游协作方一致)
// ==========================================

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 人员角色 (Person Role)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PersonRole {
    Resident, // 住院医师
    Faculty,  // 带教医师
}

impl fmt::Display for PersonRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersonRole::Resident => write!(f, "RESIDENT"),
            PersonRole::Faculty => write!(f, "FACULTY"),
        }
    }
}

// ==========================================
// 日内时段 (Day Period)
// ==========================================
// 每个时段有固定的开始时刻, 时长由轮转强度决定
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DayPeriod {
    Am,    // 上午
    Pm,    // 下午/傍晚
    Night, // 夜间
}

impl DayPeriod {
    /// 时段开始时刻
    pub fn start_time(&self) -> NaiveTime {
        let hour = match self {
            DayPeriod::Am => 7,
            DayPeriod::Pm => 13,
            DayPeriod::Night => 19,
        };
        NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or(NaiveTime::MIN)
    }
}

impl fmt::Display for DayPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DayPeriod::Am => write!(f, "AM"),
            DayPeriod::Pm => write!(f, "PM"),
            DayPeriod::Night => write!(f, "NIGHT"),
        }
    }
}

// ==========================================
// 排班角色 (Assignment Role)
// ==========================================
// 红线: 同一 (人员, 时间块) 至多一个 PRIMARY; SUPERVISING/BACKUP 可共存
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentRole {
    Primary,     // 主责
    Supervising, // 带教
    Backup,      // 备班
}

impl AssignmentRole {
    /// 是否计入工时
    pub fn counts_as_duty(&self) -> bool {
        !matches!(self, AssignmentRole::Backup)
    }
}

impl fmt::Display for AssignmentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssignmentRole::Primary => write!(f, "PRIMARY"),
            AssignmentRole::Supervising => write!(f, "SUPERVISING"),
            AssignmentRole::Backup => write!(f, "BACKUP"),
        }
    }
}

// ==========================================
// 轮转类别 (Rotation Category)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RotationCategory {
    Clinic,     // 门诊
    Inpatient,  // 病房
    Procedure,  // 操作
    Specialty,  // 专科
    NightFloat, // 夜班轮转
}

impl fmt::Display for RotationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RotationCategory::Clinic => write!(f, "CLINIC"),
            RotationCategory::Inpatient => write!(f, "INPATIENT"),
            RotationCategory::Procedure => write!(f, "PROCEDURE"),
            RotationCategory::Specialty => write!(f, "SPECIALTY"),
            RotationCategory::NightFloat => write!(f, "NIGHT_FLOAT"),
        }
    }
}

// ==========================================
// 带教类别 (Supervision Category)
// ==========================================
// 专科轮转要求至少一名持有该专科资质的带教医师在场
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", tag = "type", content = "specialty")]
pub enum SupervisionCategory {
    Standard,
    Specialty(String),
}

impl Default for SupervisionCategory {
    fn default() -> Self {
        SupervisionCategory::Standard
    }
}

// ==========================================
// 资质类别 (Credential Kind)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CredentialKind {
    Procedure,     // 操作资质
    Specialty,     // 专科资质
    Certification, // 通用证书 (如 BLS/ACLS)
}

// ==========================================
// 缺勤类型 (Absence Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AbsenceType {
    Vacation,
    Conference,
    Sick,
    Medical,
    Deployment,
    Tdy,
    FamilyEmergency,
    Bereavement,
    Maternity,
    Paternity,
    Convalescent,
    Other,
}

impl AbsenceType {
    /// 是否为派遣类 (返回后需强制恢复期)
    pub fn is_deployment(&self) -> bool {
        matches!(self, AbsenceType::Deployment | AbsenceType::Tdy)
    }
}

impl fmt::Display for AbsenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AbsenceType::Vacation => "VACATION",
            AbsenceType::Conference => "CONFERENCE",
            AbsenceType::Sick => "SICK",
            AbsenceType::Medical => "MEDICAL",
            AbsenceType::Deployment => "DEPLOYMENT",
            AbsenceType::Tdy => "TDY",
            AbsenceType::FamilyEmergency => "FAMILY_EMERGENCY",
            AbsenceType::Bereavement => "BEREAVEMENT",
            AbsenceType::Maternity => "MATERNITY",
            AbsenceType::Paternity => "PATERNITY",
            AbsenceType::Convalescent => "CONVALESCENT",
            AbsenceType::Other => "OTHER",
        };
        write!(f, "{}", s)
    }
}

// ==========================================
// 严重程度 (Severity)
// ==========================================
// 顺序: Warning < Medium < High < Critical
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Warning,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// 是否属于违规 (WARNING 仅为提示)
    pub fn is_violation(&self) -> bool {
        !matches!(self, Severity::Warning)
    }

    /// 是否阻断单条排班提交
    pub fn is_blocking(&self) -> bool {
        matches!(self, Severity::High | Severity::Critical)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "WARNING"),
            Severity::Medium => write!(f, "MEDIUM"),
            Severity::High => write!(f, "HIGH"),
            Severity::Critical => write!(f, "CRITICAL"),
        }
    }
}

// ==========================================
// 合规领域 (Compliance Domain)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComplianceDomain {
    WorkHours,
    Supervision,
    Call,
    Leave,
    Rotation,
    Scheduling, // 约束评分器产生的排班结构类问题
}

impl ComplianceDomain {
    /// 五大合规领域 (不含排班结构类)
    pub const VALIDATED: [ComplianceDomain; 5] = [
        ComplianceDomain::WorkHours,
        ComplianceDomain::Supervision,
        ComplianceDomain::Call,
        ComplianceDomain::Leave,
        ComplianceDomain::Rotation,
    ];
}

impl fmt::Display for ComplianceDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComplianceDomain::WorkHours => write!(f, "WORK_HOURS"),
            ComplianceDomain::Supervision => write!(f, "SUPERVISION"),
            ComplianceDomain::Call => write!(f, "CALL"),
            ComplianceDomain::Leave => write!(f, "LEAVE"),
            ComplianceDomain::Rotation => write!(f, "ROTATION"),
            ComplianceDomain::Scheduling => write!(f, "SCHEDULING"),
        }
    }
}

// ==========================================
// 发现类型 (Finding Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FindingType {
    // 工时
    RollingAverageExceeded,
    RollingAverageApproaching,
    DutyPeriodExceeded,
    InsufficientRest,
    // 带教
    SupervisionDeficit,
    FacultyDoubleBooked,
    SpecialtySupervisionMissing,
    ProcedureSupervisionMissing,
    // 值班
    CallFrequencyExceeded,
    ConsecutiveCallExceeded,
    CallSpacingViolation,
    PostCallRestViolation,
    CallEquityImbalance,
    // 缺勤
    BlockingAbsenceConflict,
    ReturnFollowUpRequired,
    PostDeploymentRecovery,
    // 轮转
    RotationTooShort,
    RotationTooLong,
    RotationMinimumUnmet,
    RotationMinimumTrending,
    RotationSequenceViolation,
    RotationSpacingViolation,
    ProcedureVolumeUnmet,
    ProcedureVolumeTrending,
    // 排班结构 (约束评分)
    DuplicatePrimaryAssignment,
    MissingCredential,
    PgyIneligible,
    SoftConstraintPenalty,
    UnknownReference,
}

impl FindingType {
    /// 所属合规领域
    pub fn domain(&self) -> ComplianceDomain {
        use FindingType::*;
        match self {
            RollingAverageExceeded | RollingAverageApproaching | DutyPeriodExceeded
            | InsufficientRest => ComplianceDomain::WorkHours,
            SupervisionDeficit | FacultyDoubleBooked | SpecialtySupervisionMissing
            | ProcedureSupervisionMissing => ComplianceDomain::Supervision,
            CallFrequencyExceeded | ConsecutiveCallExceeded | CallSpacingViolation
            | PostCallRestViolation | CallEquityImbalance => ComplianceDomain::Call,
            BlockingAbsenceConflict | ReturnFollowUpRequired | PostDeploymentRecovery => {
                ComplianceDomain::Leave
            }
            RotationTooShort | RotationTooLong | RotationMinimumUnmet
            | RotationMinimumTrending | RotationSequenceViolation | RotationSpacingViolation
            | ProcedureVolumeUnmet | ProcedureVolumeTrending => ComplianceDomain::Rotation,
            DuplicatePrimaryAssignment | MissingCredential | PgyIneligible
            | SoftConstraintPenalty | UnknownReference => ComplianceDomain::Scheduling,
        }
    }

    pub fn as_str(&self) -> &'static str {
        use FindingType::*;
        match self {
            RollingAverageExceeded => "ROLLING_AVERAGE_EXCEEDED",
            RollingAverageApproaching => "ROLLING_AVERAGE_APPROACHING",
            DutyPeriodExceeded => "DUTY_PERIOD_EXCEEDED",
            InsufficientRest => "INSUFFICIENT_REST",
            SupervisionDeficit => "SUPERVISION_DEFICIT",
            FacultyDoubleBooked => "FACULTY_DOUBLE_BOOKED",
            SpecialtySupervisionMissing => "SPECIALTY_SUPERVISION_MISSING",
            ProcedureSupervisionMissing => "PROCEDURE_SUPERVISION_MISSING",
            CallFrequencyExceeded => "CALL_FREQUENCY_EXCEEDED",
            ConsecutiveCallExceeded => "CONSECUTIVE_CALL_EXCEEDED",
            CallSpacingViolation => "CALL_SPACING_VIOLATION",
            PostCallRestViolation => "POST_CALL_REST_VIOLATION",
            CallEquityImbalance => "CALL_EQUITY_IMBALANCE",
            BlockingAbsenceConflict => "BLOCKING_ABSENCE_CONFLICT",
            ReturnFollowUpRequired => "RETURN_FOLLOW_UP_REQUIRED",
            PostDeploymentRecovery => "POST_DEPLOYMENT_RECOVERY",
            RotationTooShort => "ROTATION_TOO_SHORT",
            RotationTooLong => "ROTATION_TOO_LONG",
            RotationMinimumUnmet => "ROTATION_MINIMUM_UNMET",
            RotationMinimumTrending => "ROTATION_MINIMUM_TRENDING",
            RotationSequenceViolation => "ROTATION_SEQUENCE_VIOLATION",
            RotationSpacingViolation => "ROTATION_SPACING_VIOLATION",
            ProcedureVolumeUnmet => "PROCEDURE_VOLUME_UNMET",
            ProcedureVolumeTrending => "PROCEDURE_VOLUME_TRENDING",
            DuplicatePrimaryAssignment => "DUPLICATE_PRIMARY_ASSIGNMENT",
            MissingCredential => "MISSING_CREDENTIAL",
            PgyIneligible => "PGY_INELIGIBLE",
            SoftConstraintPenalty => "SOFT_CONSTRAINT_PENALTY",
            UnknownReference => "UNKNOWN_REFERENCE",
        }
    }
}

impl fmt::Display for FindingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
