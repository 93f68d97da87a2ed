//! 规则引擎领域模型

use crate::error::{Result, RuleError};
use crate::evaluator::{ConditionEvaluator, EvaluationOptions};
use crate::operators::{Comparator, LogicalOperator};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::debug;

/// 叶子规则：对某个命名空间下的一个字段做一次比较
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub namespace: String,
    pub name: String,
    pub comparator: Comparator,
    pub value: String,
    /// 同级规则的分组标签，同一标签的规则按 AND 合并为一个单元
    #[serde(default)]
    pub group: String,
}

impl Rule {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        comparator: Comparator,
        value: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            comparator,
            value: value.into().trim().to_string(),
            group: String::new(),
        }
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    /// 从条件文档的叶子项构建规则
    ///
    /// ```json
    /// { "field": { "namespace": "a", "name": "x", "evaluation_group": "g1" },
    ///   "comp": "greater than", "value": "3" }
    /// ```
    pub fn from_term(term: &Value) -> Result<Self> {
        let field = term.get("field");
        let namespace = text_at(field, "namespace");
        let name = text_at(field, "name");
        let comp = text_at(Some(term), "comp").trim().to_lowercase();
        let value = text_at(Some(term), "value").trim().to_string();
        let group = text_at(field, "evaluation_group");

        if namespace.is_empty() {
            return Err(RuleError::InvalidRule("field.namespace 不能为空".to_string()));
        }
        if name.is_empty() {
            return Err(RuleError::InvalidRule("field.name 不能为空".to_string()));
        }
        if comp.is_empty() {
            return Err(RuleError::InvalidRule("comp 不能为空".to_string()));
        }

        let comparator = comp.parse::<Comparator>()?;

        Ok(Self {
            namespace,
            name,
            comparator,
            value,
            group,
        })
    }

    /// 缓存键与诊断中使用的完整字段路径
    pub fn path(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }

    /// 对解析出的字段值求值
    ///
    /// 任何转换失败（非数值操作数、无法解析的日期）都降级为 `false`。
    pub fn evaluate(&self, field_value: Option<&Value>, options: &EvaluationOptions) -> bool {
        match ConditionEvaluator::evaluate(field_value, self.comparator, &self.value, options) {
            Ok(matched) => matched,
            Err(e) => {
                debug!(rule = %self, error = %e, "规则比较失败，按不匹配处理");
                false
            }
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} {} '{}'",
            self.namespace, self.name, self.comparator, self.value
        )?;
        if !self.group.is_empty() {
            write!(f, " [group={}]", self.group)?;
        }
        Ok(())
    }
}

/// 以 `asText` 语义读取子字段，缺失时为空串
fn text_at(node: Option<&Value>, key: &str) -> String {
    node.and_then(|n| n.get(key))
        .map(|v| match v {
            Value::Null => String::new(),
            other => ConditionEvaluator::as_text(other).into_owned(),
        })
        .unwrap_or_default()
}

/// 条件树节点
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionNode {
    Group(LogicalGroup),
    Leaf(Rule),
    /// 无法构建的节点，保留下来以便评估时输出诊断
    Invalid(InvalidNode),
}

impl ConditionNode {
    pub fn leaf(rule: Rule) -> Self {
        Self::Leaf(rule)
    }

    pub fn and(children: Vec<ConditionNode>) -> Self {
        Self::Group(LogicalGroup::and(children))
    }

    pub fn or(children: Vec<ConditionNode>) -> Self {
        Self::Group(LogicalGroup::or(children))
    }
}

/// 逻辑组节点
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalGroup {
    pub operator: LogicalOperator,
    pub children: Vec<ConditionNode>,
}

impl LogicalGroup {
    pub fn new(operator: LogicalOperator, children: Vec<ConditionNode>) -> Self {
        Self { operator, children }
    }

    pub fn and(children: Vec<ConditionNode>) -> Self {
        Self::new(LogicalOperator::And, children)
    }

    pub fn or(children: Vec<ConditionNode>) -> Self {
        Self::new(LogicalOperator::Or, children)
    }
}

/// 无效节点的种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidKind {
    /// 叶子项缺字段或比较符无法识别：评估时跳过
    Rule,
    /// 逻辑操作符不是 and/or：整个子树按不匹配处理
    Operator,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InvalidNode {
    pub kind: InvalidKind,
    pub reason: String,
    pub source: Value,
}

/// 评估结果
#[derive(Debug, Clone, Default, Serialize)]
pub struct EvaluationResult {
    pub matched: bool,
    pub matched_rules: Vec<String>,
    pub evaluation_trace: Vec<String>,
    /// 被跳过的无效叶子项数量
    pub skipped_terms: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub evaluation_time_ms: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rule_from_term() {
        let term = json!({
            "field": {"namespace": "customer.account", "name": "balance", "evaluation_group": "g1"},
            "comp": "  Greater Than ",
            "value": " 1000 "
        });

        let rule = Rule::from_term(&term).unwrap();
        assert_eq!(rule.namespace, "customer.account");
        assert_eq!(rule.name, "balance");
        assert_eq!(rule.comparator, Comparator::GreaterThan);
        assert_eq!(rule.value, "1000");
        assert_eq!(rule.group, "g1");
        assert_eq!(rule.path(), "customer.account.balance");
    }

    #[test]
    fn test_rule_from_term_defaults() {
        let term = json!({
            "field": {"namespace": "a", "name": "x"},
            "comp": "equal to",
            "value": 5
        });

        let rule = Rule::from_term(&term).unwrap();
        assert_eq!(rule.group, "");
        // 数值操作数按文本形式保存
        assert_eq!(rule.value, "5");
    }

    #[test]
    fn test_rule_from_term_invalid() {
        let missing_namespace = json!({"field": {"name": "x"}, "comp": "equal to", "value": "1"});
        assert!(Rule::from_term(&missing_namespace).is_err());

        let missing_name = json!({"field": {"namespace": "a"}, "comp": "equal to", "value": "1"});
        assert!(Rule::from_term(&missing_name).is_err());

        let missing_comp = json!({"field": {"namespace": "a", "name": "x"}, "value": "1"});
        assert!(Rule::from_term(&missing_comp).is_err());

        let unknown_comp =
            json!({"field": {"namespace": "a", "name": "x"}, "comp": "between", "value": "1"});
        let err = Rule::from_term(&unknown_comp).unwrap_err();
        assert!(matches!(err, RuleError::InvalidComparator(_)));
    }

    #[test]
    fn test_rule_evaluate_degrades_to_false() {
        let rule = Rule::new("a", "x", Comparator::GreaterThan, "not-a-number");
        let options = EvaluationOptions::new();
        assert!(!rule.evaluate(Some(&json!(5)), &options));
        assert!(!rule.evaluate(None, &options));
    }

    #[test]
    fn test_rule_display() {
        let rule = Rule::new("a", "x", Comparator::EqualTo, "1").with_group("g");
        assert_eq!(rule.to_string(), "a.x equal to '1' [group=g]");
    }

    #[test]
    fn test_evaluation_result_serialization() {
        let result = EvaluationResult {
            matched: true,
            ..Default::default()
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["matched"], json!(true));
        assert_eq!(json["skipped_terms"], json!(0));
    }
}
