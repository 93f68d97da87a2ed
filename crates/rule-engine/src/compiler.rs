//! 条件编译器
//!
//! 将 JSON 条件文档解析成内存中的条件树。解析是宽松的：无效的叶子项和
//! 无效的逻辑操作符被保留为 `Invalid` 节点，交给执行器按"跳过并继续"处理。

use crate::error::Result;
use crate::models::{ConditionNode, InvalidKind, InvalidNode, LogicalGroup, Rule};
use crate::operators::LogicalOperator;
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::warn;

/// 编译后的条件
#[derive(Debug, Clone)]
pub struct CompiledCondition {
    pub root: ConditionNode,
    /// 条件中使用的所有 `namespace.name` 路径
    pub required_fields: BTreeSet<String>,
    /// 无效节点数量
    pub invalid_nodes: usize,
}

/// 条件编译器
pub struct ConditionCompiler;

impl ConditionCompiler {
    /// 从 JSON 字符串编译条件，只有 JSON 语法错误会返回 `Err`
    pub fn compile_from_json(json: &str) -> Result<CompiledCondition> {
        let value: Value = serde_json::from_str(json)?;
        Ok(Self::compile(&value))
    }

    pub fn compile(condition: &Value) -> CompiledCondition {
        let root = Self::parse_node(condition, "root");

        let mut required_fields = BTreeSet::new();
        let mut invalid_nodes = 0;
        Self::collect(&root, &mut required_fields, &mut invalid_nodes);

        CompiledCondition {
            root,
            required_fields,
            invalid_nodes,
        }
    }

    /// 解析单个节点：含 `op` 键的为嵌套条件，否则为叶子项
    pub fn parse_node(node: &Value, path: &str) -> ConditionNode {
        match node.get("op") {
            Some(op) => Self::parse_group(node, op, path),
            None => match Rule::from_term(node) {
                Ok(rule) => ConditionNode::Leaf(rule),
                Err(e) => {
                    warn!(path, error = %e, term = %node, "无效或格式错误的规则");
                    ConditionNode::Invalid(InvalidNode {
                        kind: InvalidKind::Rule,
                        reason: e.to_string(),
                        source: node.clone(),
                    })
                }
            },
        }
    }

    fn parse_group(node: &Value, op: &Value, path: &str) -> ConditionNode {
        let operator = match op.as_str().map(str::parse::<LogicalOperator>) {
            Some(Ok(operator)) => operator,
            Some(Err(e)) => return Self::invalid_operator(node, path, e.to_string()),
            None => {
                let reason = format!("op 必须是字符串: {}", op);
                return Self::invalid_operator(node, path, reason);
            }
        };

        let children = match node.get("terms") {
            Some(Value::Array(terms)) => terms
                .iter()
                .enumerate()
                .map(|(i, term)| Self::parse_node(term, &format!("{}.terms[{}]", path, i)))
                .collect(),
            Some(other) => {
                warn!(path, terms = %other, "terms 不是数组，按空组处理");
                Vec::new()
            }
            None => Vec::new(),
        };

        ConditionNode::Group(LogicalGroup::new(operator, children))
    }

    fn invalid_operator(node: &Value, path: &str, reason: String) -> ConditionNode {
        warn!(path, reason = %reason, "无效的逻辑操作符，子树按不匹配处理");
        ConditionNode::Invalid(InvalidNode {
            kind: InvalidKind::Operator,
            reason,
            source: node.clone(),
        })
    }

    fn collect(node: &ConditionNode, fields: &mut BTreeSet<String>, invalid: &mut usize) {
        match node {
            ConditionNode::Leaf(rule) => {
                fields.insert(rule.path());
            }
            ConditionNode::Group(group) => {
                for child in &group.children {
                    Self::collect(child, fields, invalid);
                }
            }
            ConditionNode::Invalid(_) => *invalid += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::Comparator;
    use serde_json::json;

    fn sample_condition() -> &'static str {
        r#"
        {
            "op": "and",
            "terms": [
                {
                    "field": {"namespace": "customer", "name": "status"},
                    "comp": "equal to",
                    "value": "active"
                },
                {
                    "op": "OR",
                    "terms": [
                        {
                            "field": {"namespace": "customer.account", "name": "balance"},
                            "comp": "greater than",
                            "value": "1000"
                        },
                        {
                            "field": {"namespace": "customer", "name": "is_vip", "evaluation_group": "vip"},
                            "comp": "equal to",
                            "value": "true"
                        }
                    ]
                }
            ]
        }
        "#
    }

    #[test]
    fn test_compile_from_json() {
        let compiled = ConditionCompiler::compile_from_json(sample_condition()).unwrap();

        assert_eq!(compiled.invalid_nodes, 0);
        assert_eq!(compiled.required_fields.len(), 3);
        assert!(compiled.required_fields.contains("customer.status"));
        assert!(compiled.required_fields.contains("customer.account.balance"));
        assert!(compiled.required_fields.contains("customer.is_vip"));

        let ConditionNode::Group(root) = &compiled.root else {
            panic!("root should be a group");
        };
        assert_eq!(root.operator, LogicalOperator::And);
        assert_eq!(root.children.len(), 2);
        assert!(matches!(
            &root.children[1],
            ConditionNode::Group(g) if g.operator == LogicalOperator::Or
        ));
    }

    #[test]
    fn test_compile_invalid_json() {
        let result = ConditionCompiler::compile_from_json("{not json");
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_rule_is_kept_as_invalid_node() {
        let compiled = ConditionCompiler::compile(&json!({
            "op": "and",
            "terms": [
                {"field": {"namespace": "a", "name": "x"}, "comp": "between", "value": "1"},
                {"field": {"namespace": "a", "name": "y"}, "comp": "equal to", "value": "1"}
            ]
        }));

        assert_eq!(compiled.invalid_nodes, 1);
        assert_eq!(compiled.required_fields.len(), 1);

        let ConditionNode::Group(root) = &compiled.root else {
            panic!("root should be a group");
        };
        assert!(matches!(
            &root.children[0],
            ConditionNode::Invalid(InvalidNode { kind: InvalidKind::Rule, .. })
        ));
        assert_eq!(
            root.children[1],
            ConditionNode::Leaf(Rule::new("a", "y", Comparator::EqualTo, "1"))
        );
    }

    #[test]
    fn test_invalid_operator() {
        let compiled = ConditionCompiler::compile(&json!({"op": "xor", "terms": []}));
        assert!(matches!(
            compiled.root,
            ConditionNode::Invalid(InvalidNode { kind: InvalidKind::Operator, .. })
        ));

        let compiled = ConditionCompiler::compile(&json!({"op": 1, "terms": []}));
        assert_eq!(compiled.invalid_nodes, 1);
    }

    #[test]
    fn test_missing_terms_is_empty_group() {
        let compiled = ConditionCompiler::compile(&json!({"op": "or"}));
        assert_eq!(
            compiled.root,
            ConditionNode::Group(LogicalGroup::or(Vec::new()))
        );
    }

    #[test]
    fn test_leaf_at_root() {
        let compiled = ConditionCompiler::compile(&json!({
            "field": {"namespace": "a", "name": "x"},
            "comp": "greater than",
            "value": "3"
        }));
        assert!(matches!(compiled.root, ConditionNode::Leaf(_)));
    }
}
