// ==========================================
// 住院医师排班合规核心 - 合规编排器
// ==========================================
// 用途: 协调五大校验引擎 (工时/带教/值班/缺勤/轮转) 并汇总报告
// 红线: 违规是数据不是错误; 只有前置条件失败才返回 Err
// 红线: 单次运行内快照只读, 各领域可并行执行
// ==========================================
// 输入: 校验周期 + 快照 (或单条候选排班)
// 输出: 整表报告 / 单条预检结论 / 看板投影
// ==========================================

mod core;
mod dashboard;
mod remediation;
mod report;


pub use self::core::ComplianceOrchestrator;
pub use dashboard::{DashboardData, DomainTile, FindingRow, Headline, ResidentRow, SeverityBucket};
pub use remediation::{remediation_for, suggestions_for};
pub use report::{ComplianceCheckResult, ReportStatus, ScheduleValidationReport, SingleAssignmentCheck};
