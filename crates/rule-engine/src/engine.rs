//! 规则引擎入口
//!
//! `RuleEngine` 持有类型注册表、评估选项和执行器，由宿主创建后按引用传递，
//! 不依赖任何全局状态。

use crate::compiler::ConditionCompiler;
use crate::error::{Result, RuleError};
use crate::evaluator::{ConditionEvaluator, EvaluationOptions};
use crate::executor::RuleExecutor;
use crate::models::{ConditionNode, EvaluationResult};
use crate::registry::{LoadReport, TypeRegistry};
use crate::transform::{self, DocumentTransformer, TransformDefinition};
use rules_shared::config::EngineConfig;
use serde_json::{Map, Value};
use tracing::instrument;

impl From<&EngineConfig> for EvaluationOptions {
    fn from(config: &EngineConfig) -> Self {
        let options = EvaluationOptions::new();
        if config.case_sensitive {
            options
        } else {
            options.case_insensitive()
        }
    }
}

/// 规则引擎
#[derive(Debug, Clone)]
pub struct RuleEngine {
    types: TypeRegistry,
    executor: RuleExecutor,
}

impl RuleEngine {
    pub fn new() -> Self {
        let types = TypeRegistry::new();
        let executor = RuleExecutor::new().with_type_registry(types.clone());
        Self { types, executor }
    }

    /// 按引擎配置创建
    pub fn from_config(config: &EngineConfig) -> Self {
        let engine = Self::new().with_options(EvaluationOptions::from(config));
        if config.trace_enabled {
            engine.with_trace()
        } else {
            engine
        }
    }

    pub fn with_options(mut self, options: EvaluationOptions) -> Self {
        self.executor = self.executor.with_options(options);
        self
    }

    /// 在评估结果中记录追踪
    pub fn with_trace(mut self) -> Self {
        self.executor = self.executor.with_trace();
        self
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    pub fn options(&self) -> &EvaluationOptions {
        self.executor.options()
    }

    pub fn load_type_definitions<I, S>(&self, lines: I) -> LoadReport
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.types.load_type_definitions(lines)
    }

    pub fn register_type(&self, field: &str, type_name: &str) -> bool {
        self.types.register_type(field, type_name)
    }

    /// 评估条件树，永不失败
    pub fn evaluate(&self, document: &Value, root: &ConditionNode) -> bool {
        self.executor.evaluate(document, root)
    }

    /// 评估条件树并返回完整结果
    pub fn execute(&self, document: &Value, root: &ConditionNode) -> EvaluationResult {
        self.executor.execute(document, root)
    }

    /// 编译 JSON 条件文档后评估，仅在条件文档不是合法 JSON 时返回错误
    pub fn evaluate_json(&self, document: &Value, condition: &str) -> Result<bool> {
        let compiled = ConditionCompiler::compile_from_json(condition)?;
        Ok(self.evaluate(document, &compiled.root))
    }

    pub fn transform(
        &self,
        document: &Value,
        definition: &TransformDefinition,
    ) -> Map<String, Value> {
        DocumentTransformer::transform(document, definition)
    }

    /// 把覆盖层浅合并进文档，文档必须是 JSON 对象
    pub fn merge(&self, document: Value, overlay: Map<String, Value>) -> Result<Value> {
        match document {
            Value::Object(original) => Ok(Value::Object(transform::merge(original, overlay))),
            other => Err(RuleError::NotAnObject(
                ConditionEvaluator::type_name(&other).to_string(),
            )),
        }
    }

    /// 转换并合并，得到用于评估的增强文档
    #[instrument(skip_all)]
    pub fn enrich(&self, document: Value, definition: &TransformDefinition) -> Result<Value> {
        let overlay = self.transform(&document, definition);
        self.merge(document, overlay)
    }

    /// 转换、合并后评估
    pub fn enrich_and_evaluate(
        &self,
        document: Value,
        definition: &TransformDefinition,
        root: &ConditionNode,
    ) -> Result<EvaluationResult> {
        let enriched = self.enrich(document, definition)?;
        Ok(self.execute(&enriched, root))
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new()
    }
}
