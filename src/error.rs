// ==========================================
// 住院医师排班合规核心 - 错误类型
// ==========================================
// 工具: thiserror 派生宏
// 红线: 只承载前置条件错误 (输入畸形/配置错误)
// 红线: 合规违规、求解不可行、求解超时都不是错误, 以数据形式返回
// ==========================================

use thiserror::Error;

/// 核心层错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    // ===== 输入前置条件错误 =====
    #[error("人员池为空: {context}")]
    EmptyPersonPool { context: String },

    #[error("时间块列表为空")]
    EmptyBlocks,

    #[error("无效的周期: start={start} end={end}")]
    InvalidPeriod { start: String, end: String },

    #[error("引用不存在: {entity} with id={id}")]
    UnknownReference { entity: String, id: String },

    #[error("重复标识: {entity} with id={id}")]
    DuplicateId { entity: String, id: String },

    #[error("输入数据无效 (field={field}): {message}")]
    InvalidInput { field: String, message: String },

    // ===== 约束注册错误 =====
    #[error("权重层级违反: {higher}({higher_weight}) 必须严格大于 {lower}({lower_weight})")]
    WeightHierarchyViolation {
        higher: String,
        higher_weight: f64,
        lower: String,
        lower_weight: f64,
    },

    #[error("约束重复注册: {0}")]
    DuplicateConstraint(String),

    #[error("约束注册缺失: profile={profile}, missing={missing:?}")]
    MissingConstraints {
        profile: String,
        missing: Vec<String>,
    },

    // ===== 配置错误 =====
    #[error("配置无效 (key={key}): {message}")]
    InvalidConfig { key: String, message: String },

    #[error("配置解析失败: {0}")]
    ConfigParse(String),

    // ===== 运行时错误 =====
    #[error("后台任务失败: {0}")]
    TaskJoin(String),
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::ConfigParse(err.to_string())
    }
}

impl From<tokio::task::JoinError> for CoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        CoreError::TaskJoin(err.to_string())
    }
}

/// Result 类型别名
pub type CoreResult<T> = Result<T, CoreError>;
