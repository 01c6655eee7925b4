// ==========================================
// 住院医师排班合规核心 - 配置层
// ==========================================
// 职责: 合规阈值与求解参数, 默认值 + JSON 覆写
// ==========================================

pub mod compliance_config;

// 重导出核心配置
pub use compliance_config::{
    CallPolicy, ComplianceConfig, LeavePolicy, ProcedureTarget, RotationPolicy,
    RotationRequirement, SequenceRule, SolverSettings, SupervisionPolicy, WorkHourLimits,
};
