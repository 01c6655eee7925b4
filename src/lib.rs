// ==========================================
// 住院医师排班合规核心 - 核心库
// ==========================================
// 组成: 约束评分求解器 + 五大合规校验引擎 + 合规编排器
// 系统定位: 决策支持 (输入快照由协作方提供, 结果由协作方持久化)
// 红线: 核心不做 I/O, 不持有全局可变状态
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体、类型、只读快照
pub mod domain;

// 配置层 - 合规阈值与求解参数
pub mod config;

// 约束层 - 约束目录、注册表与工厂
pub mod constraint;

// 引擎层 - 校验引擎、编排器、求解器
pub mod engine;

// 错误类型
pub mod error;

// 日志系统
pub mod logging;

// 性能统计
pub mod perf;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    AbsenceType, AssignmentRole, ComplianceDomain, DayPeriod, FindingType, PersonRole,
    RotationCategory, Severity,
};

// 领域实体
pub use domain::{
    Absence, Assignment, CallRecord, ComplianceFinding, Person, RotationTemplate,
    SchedulePeriod, ScheduleSnapshot, TimeBlock,
};

// 配置
pub use config::ComplianceConfig;

// 约束
pub use constraint::{ConstraintManager, ConstraintRegistry, ConstraintType, Score};

// 引擎
pub use engine::{
    ComplianceOrchestrator, DashboardData, Deadline, ScheduleSolver, ScheduleValidationReport,
    SingleAssignmentCheck, SolveProblem, SolveResult, SolveStatus, SolverStrategy,
};

// 错误
pub use error::{CoreError, CoreResult};

// ==========================================
// 常量定义
// ==========================================

// 版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 名称
pub const APP_NAME: &str = "住院医师排班合规核心";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
