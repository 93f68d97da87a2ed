//! 字段抽取器
//!
//! 对原始文档执行路径查询，返回匹配到的值。确定路径（只含子节点和下标）
//! 返回单个值；含通配、递归下降、过滤或并集的路径返回所有匹配组成的数组。

mod parser;

pub use parser::{CompareOp, Filter, FilterTest, Selector, Step};

use crate::error::Result;
use crate::resolver::child;
use serde_json::Value;
use std::cmp::Ordering;
use tracing::debug;

/// 解析后的路径查询
#[derive(Debug, Clone, PartialEq)]
pub struct PathQuery {
    source: String,
    steps: Vec<Step>,
}

impl PathQuery {
    pub fn parse(query: &str) -> Result<Self> {
        Ok(Self {
            source: query.to_string(),
            steps: parser::parse(query)?,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// 是否为确定路径
    pub fn is_definite(&self) -> bool {
        self.steps
            .iter()
            .all(|s| matches!(s, Step::Child(_) | Step::Index(_)))
    }

    /// 返回所有匹配节点（按文档顺序）
    pub fn select<'v>(&self, root: &'v Value) -> Vec<&'v Value> {
        let mut current = vec![root];
        for step in &self.steps {
            let mut next = Vec::new();
            for node in current {
                apply_step(step, node, &mut next);
            }
            if next.is_empty() {
                return next;
            }
            current = next;
        }
        current
    }

    /// 求值；无匹配时返回 `None`
    pub fn evaluate(&self, root: &Value) -> Option<Value> {
        let matches = self.select(root);
        if self.is_definite() {
            return matches.into_iter().next().cloned();
        }
        if matches.is_empty() {
            return None;
        }
        Some(Value::Array(matches.into_iter().cloned().collect()))
    }
}

/// 字段抽取器
pub struct FieldExtractor;

impl FieldExtractor {
    /// 对文档执行路径查询
    ///
    /// 空查询、语法错误和无匹配都返回 `None`，由调用方决定是否致命。
    pub fn extract(document: &Value, query: &str) -> Option<Value> {
        if query.trim().is_empty() {
            return None;
        }

        match PathQuery::parse(query) {
            Ok(parsed) => parsed.evaluate(document),
            Err(e) => {
                debug!(query, error = %e, "路径查询解析失败");
                None
            }
        }
    }
}

fn apply_step<'v>(step: &Step, node: &'v Value, out: &mut Vec<&'v Value>) {
    match step {
        Step::Child(name) => {
            if let Some(v) = node.as_object().and_then(|m| m.get(name)) {
                out.push(v);
            }
        }
        Step::Index(index) => {
            if let Some(v) = index_of(node, *index) {
                out.push(v);
            }
        }
        Step::Wildcard => match node {
            Value::Object(map) => out.extend(map.values()),
            Value::Array(arr) => out.extend(arr.iter()),
            _ => {}
        },
        Step::Union(selectors) => {
            for selector in selectors {
                let found = match selector {
                    Selector::Name(name) => node.as_object().and_then(|m| m.get(name)),
                    Selector::Index(index) => index_of(node, *index),
                };
                out.extend(found);
            }
        }
        Step::Descendant(inner) => {
            let mut subtree = Vec::new();
            collect_subtree(node, &mut subtree);
            for n in subtree {
                match inner.as_ref() {
                    // 数组元素本身也在子树中，过滤只作用于数组，避免同一节点匹配两次
                    Step::Filter(filter) => {
                        if let Value::Array(arr) = n {
                            out.extend(arr.iter().filter(|item| filter_matches(filter, item)));
                        }
                    }
                    other => apply_step(other, n, out),
                }
            }
        }
        Step::Filter(filter) => match node {
            Value::Array(arr) => out.extend(arr.iter().filter(|item| filter_matches(filter, item))),
            Value::Object(_) if filter_matches(filter, node) => out.push(node),
            _ => {}
        },
    }
}

fn index_of(node: &Value, index: i64) -> Option<&Value> {
    let arr = node.as_array()?;
    let resolved = if index < 0 {
        arr.len().checked_sub(index.unsigned_abs() as usize)?
    } else {
        usize::try_from(index).ok()?
    };
    arr.get(resolved)
}

/// 前序收集节点自身及全部后代
fn collect_subtree<'v>(node: &'v Value, out: &mut Vec<&'v Value>) {
    out.push(node);
    match node {
        Value::Object(map) => map.values().for_each(|v| collect_subtree(v, out)),
        Value::Array(arr) => arr.iter().for_each(|v| collect_subtree(v, out)),
        _ => {}
    }
}

fn filter_matches(filter: &Filter, item: &Value) -> bool {
    let mut target = Some(item);
    for key in &filter.path {
        target = target.and_then(|t| child(t, key));
    }

    match (&filter.test, target) {
        (_, None) => false,
        (FilterTest::Exists, Some(_)) => true,
        (FilterTest::Compare(op, literal), Some(value)) => compare(value, *op, literal),
    }
}

fn compare(value: &Value, op: CompareOp, literal: &Value) -> bool {
    let ordering = match (value, literal) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => None,
        },
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (a, b) if a == b => Some(Ordering::Equal),
        _ => None,
    };

    match op {
        CompareOp::Eq => ordering == Some(Ordering::Equal),
        CompareOp::Ne => ordering != Some(Ordering::Equal),
        CompareOp::Lt => ordering == Some(Ordering::Less),
        CompareOp::Le => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
        CompareOp::Gt => ordering == Some(Ordering::Greater),
        CompareOp::Ge => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document() -> Value {
        json!({
            "customer": {
                "customer_id": 123,
                "age": 105,
                "status": "active",
                "nickname": null
            },
            "account": [
                {"account_number": "ACC123", "account_type": "SB", "balance": 1500, "flag": "open"},
                {"account_number": "ACC456", "account_type": "CA", "balance": 5000, "flag": "open"},
                {"account_number": "ACC789", "account_type": "SB", "balance": 200}
            ],
            "branch": {
                "location": "Bengaluru",
                "suppliers": [{"supplier_type": "Gold", "price": 10}]
            }
        })
    }

    #[test]
    fn test_definite_paths() {
        let doc = document();
        assert_eq!(
            FieldExtractor::extract(&doc, "$.customer.status"),
            Some(json!("active"))
        );
        assert_eq!(
            FieldExtractor::extract(&doc, "$.account[1].account_number"),
            Some(json!("ACC456"))
        );
        assert_eq!(
            FieldExtractor::extract(&doc, "$.account[-1].balance"),
            Some(json!(200))
        );
        assert_eq!(
            FieldExtractor::extract(&doc, "customer.age"),
            Some(json!(105))
        );
    }

    #[test]
    fn test_root_selection() {
        let doc = document();
        assert_eq!(FieldExtractor::extract(&doc, "$"), Some(doc.clone()));
    }

    #[test]
    fn test_definite_null_is_returned_as_null() {
        let doc = document();
        assert_eq!(
            FieldExtractor::extract(&doc, "$.customer.nickname"),
            Some(Value::Null)
        );
    }

    #[test]
    fn test_array_projection() {
        let doc = document();
        assert_eq!(
            FieldExtractor::extract(&doc, "$.account[*].balance"),
            Some(json!([1500, 5000, 200]))
        );
        // 缺少字段的元素不产生匹配
        assert_eq!(
            FieldExtractor::extract(&doc, "$.account[*].flag"),
            Some(json!(["open", "open"]))
        );
    }

    #[test]
    fn test_filters() {
        let doc = document();
        assert_eq!(
            FieldExtractor::extract(&doc, "$.account[?(@.account_type == 'SB')].account_number"),
            Some(json!(["ACC123", "ACC789"]))
        );
        assert_eq!(
            FieldExtractor::extract(&doc, "$.account[?(@.flag)].account_number"),
            Some(json!(["ACC123", "ACC456"]))
        );
        assert_eq!(
            FieldExtractor::extract(&doc, "$.account[?(@.balance > 1000)].account_number"),
            Some(json!(["ACC123", "ACC456"]))
        );
        assert_eq!(
            FieldExtractor::extract(&doc, "$.account[?(@.account_type != 'SB')].balance"),
            Some(json!([5000]))
        );
    }

    #[test]
    fn test_deep_scan_and_union() {
        let doc = document();
        assert_eq!(
            FieldExtractor::extract(&doc, "$..supplier_type"),
            Some(json!(["Gold"]))
        );
        assert_eq!(
            FieldExtractor::extract(&doc, "$.customer['status','age']"),
            Some(json!(["active", 105]))
        );
    }

    #[test]
    fn test_deep_scan_filter_matches_each_node_once() {
        let doc = json!({
            "branch": {
                "suppliers": [
                    {"supplier_type": "Gold", "price": 10},
                    {"supplier_type": "Silver", "price": 3}
                ]
            }
        });

        assert_eq!(
            FieldExtractor::extract(&doc, "$..[?(@.price > 5)].supplier_type"),
            Some(json!(["Gold"]))
        );
        assert_eq!(
            FieldExtractor::extract(&doc, "$..[?(@.price)]"),
            Some(json!([
                {"supplier_type": "Gold", "price": 10},
                {"supplier_type": "Silver", "price": 3}
            ]))
        );
        assert_eq!(
            FieldExtractor::extract(&doc, "$..suppliers[?(@.price)].price"),
            Some(json!([10, 3]))
        );
    }

    #[test]
    fn test_not_found() {
        let doc = document();
        assert_eq!(FieldExtractor::extract(&doc, "$.customer.email"), None);
        assert_eq!(FieldExtractor::extract(&doc, "$.account[10]"), None);
        assert_eq!(
            FieldExtractor::extract(&doc, "$.account[?(@.account_type == 'XX')]"),
            None
        );
        assert_eq!(FieldExtractor::extract(&doc, "$..missing"), None);
    }

    #[test]
    fn test_empty_and_malformed_queries() {
        let doc = document();
        assert_eq!(FieldExtractor::extract(&doc, ""), None);
        assert_eq!(FieldExtractor::extract(&doc, "   "), None);
        assert_eq!(FieldExtractor::extract(&doc, "$.account[?(@.x =="), None);
        assert_eq!(FieldExtractor::extract(&doc, "$.account[abc]"), None);
    }

    #[test]
    fn test_is_definite() {
        assert!(PathQuery::parse("$.a.b[0]").unwrap().is_definite());
        assert!(!PathQuery::parse("$.a[*]").unwrap().is_definite());
        assert!(!PathQuery::parse("$..a").unwrap().is_definite());
        assert!(!PathQuery::parse("$.a[?(@.b)]").unwrap().is_definite());
        assert_eq!(PathQuery::parse("$.a").unwrap().source(), "$.a");
    }
}
