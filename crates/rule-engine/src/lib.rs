//! JSON 规则引擎
//!
//! 对半结构化 JSON 文档评估布尔业务规则，支持：
//! - JSON 条件文档解析（嵌套 AND/OR 组和叶子规则）
//! - 按 `evaluation_group` 分组的短路求值
//! - 调用级路径解析缓存
//! - 基于路径查询的属性抽取、文档转换与浅合并
//! - 仅用于诊断的字段类型声明

pub mod clock;
pub mod compiler;
pub mod date_condition;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod extractor;
pub mod models;
pub mod operators;
pub mod registry;
pub mod resolver;
pub mod transform;

pub use clock::{Clock, FixedClock, SystemClock};
pub use compiler::{CompiledCondition, ConditionCompiler};
pub use date_condition::DateCondition;
pub use engine::RuleEngine;
pub use error::{Result, RuleError};
pub use evaluator::{ConditionEvaluator, EvaluationOptions};
pub use executor::RuleExecutor;
pub use extractor::{FieldExtractor, PathQuery};
pub use models::{ConditionNode, EvaluationResult, InvalidKind, InvalidNode, LogicalGroup, Rule};
pub use operators::{Comparator, LogicalOperator};
pub use registry::{FieldType, LoadReport, ScalarType, TypeCheck, TypeRegistry};
pub use resolver::PathResolver;
pub use transform::{
    AttributeDefinition, DocumentTransformer, NamespaceDefinition, PropertyGroupDefinition,
    TransformDefinition, merge,
};
