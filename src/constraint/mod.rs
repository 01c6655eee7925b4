// ==========================================
// 住院医师排班合规核心 - 约束层
// ==========================================
// 职责: 约束目录、硬/软约束评估、注册表与工厂
// 红线: 注册表构建后不可变, 按运行注入, 无全局状态
// ==========================================

pub mod catalog;
pub mod context;
pub mod hard;
pub mod manager;
pub mod registry;
pub mod soft;

// 重导出核心类型
pub use catalog::{
    ConstraintCategory, ConstraintDeclaration, ConstraintKind, ConstraintProfile, ConstraintType,
    WeightHierarchy, WEIGHT_HIERARCHIES,
};
pub use context::{Candidate, EvaluationContext};
pub use hard::HardConstraint;
pub use manager::ConstraintManager;
pub use registry::{
    ConstraintDefinition, ConstraintRegistry, ConstraintRegistryBuilder, Score, ScoreOutcome,
};
pub use soft::{SoftConstraint, SoftViolation};
