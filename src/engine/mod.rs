// ==========================================
// 住院医师排班合规核心 - 引擎层
// ==========================================
// 职责: 五大合规校验引擎 + 合规编排器 + 排班求解器
// 红线: 引擎不做 I/O, 所有发现必须携带可读说明与证据
// ==========================================

pub mod call;
pub mod leave;
pub mod orchestrator;
pub mod rotation;
pub mod solver;
pub mod supervision;
pub mod work_hour;

// 重导出核心引擎
pub use call::{CallEquityReport, CallValidator};
pub use leave::LeaveValidator;
pub use orchestrator::{
    ComplianceCheckResult, ComplianceOrchestrator, DashboardData, ReportStatus,
    ScheduleValidationReport, SingleAssignmentCheck,
};
pub use rotation::{AcademicYear, ProgressStatus, RotationSpan, RotationValidator};
pub use solver::{
    CallDemand, Deadline, ScheduleSolver, SlotDemand, SolveProblem, SolveResult, SolveStatus,
    SolverStrategy,
};
pub use supervision::{BlockSupervision, SupervisionAnalysis, SupervisionValidator};
pub use work_hour::{DutyInterval, RollingWindowCheck, WorkHourAnalysis, WorkHourValidator};
