//! 规则引擎错误类型

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("无效的规则: {0}")]
    InvalidRule(String),

    #[error("无效的逻辑操作符: '{0}'")]
    InvalidOperator(String),

    #[error("无效的比较符: '{0}'")]
    InvalidComparator(String),

    #[error("类型不匹配: 期望 {expected}, 实际 {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("无法解析日期条件: '{0}'")]
    DateCondition(String),

    #[error("路径查询无效 '{query}': {reason}")]
    PathQuery { query: String, reason: String },

    #[error("未知的类型名: '{0}'")]
    UnknownType(String),

    #[error("无效的类型定义: {field} -> '{type_name}'")]
    InvalidType { field: String, type_name: String },

    #[error("顶层文档必须是 JSON 对象, 实际为 {0}")]
    NotAnObject(String),

    #[error("JSON 序列化错误: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RuleError>;
