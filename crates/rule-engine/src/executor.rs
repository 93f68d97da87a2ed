//! 条件执行器
//!
//! 实现条件树的短路求值。逻辑组内的子节点先划分为评估单元：
//! - 每个嵌套组（或无效操作符节点）是一个单元；
//! - 同一 `evaluation_group` 标签的叶子规则合并为一个单元，组内按 AND 求值。
//!
//! 单元按其在子节点中首次出现的位置排列，再以组的操作符短路折叠。

use crate::evaluator::EvaluationOptions;
use crate::models::{ConditionNode, EvaluationResult, InvalidKind, LogicalGroup, Rule};
use crate::operators::LogicalOperator;
use crate::registry::{TypeCheck, TypeRegistry};
use crate::resolver::PathResolver;
use rules_shared::observability::metrics::record_rule_evaluation;
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, warn};

/// 条件执行器
#[derive(Debug, Clone, Default)]
pub struct RuleExecutor {
    /// 是否记录详细评估追踪
    trace_enabled: bool,
    options: EvaluationOptions,
    types: Option<TypeRegistry>,
}

/// 组内的评估单元
enum Unit<'r> {
    Node(usize, &'r ConditionNode),
    Cluster(usize),
}

/// 同标签的叶子规则
struct Cluster<'r> {
    tag: &'r str,
    rules: Vec<(usize, &'r Rule)>,
}

impl RuleExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// 启用评估追踪
    pub fn with_trace(mut self) -> Self {
        self.trace_enabled = true;
        self
    }

    pub fn with_options(mut self, options: EvaluationOptions) -> Self {
        self.options = options;
        self
    }

    /// 挂载类型注册表，用于输出类型不符的诊断
    pub fn with_type_registry(mut self, types: TypeRegistry) -> Self {
        self.types = Some(types);
        self
    }

    pub fn options(&self) -> &EvaluationOptions {
        &self.options
    }

    /// 评估条件树，只返回是否匹配
    pub fn evaluate(&self, document: &Value, root: &ConditionNode) -> bool {
        self.execute(document, root).matched
    }

    /// 评估条件树
    ///
    /// 每次调用使用新的路径解析缓存，不同文档之间不会共享缓存结果。
    pub fn execute(&self, document: &Value, root: &ConditionNode) -> EvaluationResult {
        let start = Instant::now();

        let mut resolver = PathResolver::new(document);
        let mut result = EvaluationResult::default();

        let matched = self.evaluate_node(root, &mut resolver, &mut result, "root");

        result.matched = matched;
        result.cache_hits = resolver.hits();
        result.cache_misses = resolver.misses();
        result.evaluation_time_ms = start.elapsed().as_millis() as i64;

        record_rule_evaluation(matched, start.elapsed().as_secs_f64());
        debug!(
            matched,
            skipped_terms = result.skipped_terms,
            cache_hits = result.cache_hits,
            "条件评估完成"
        );

        result
    }

    /// 递归评估节点
    fn evaluate_node<'a>(
        &self,
        node: &ConditionNode,
        resolver: &mut PathResolver<'a>,
        result: &mut EvaluationResult,
        path: &str,
    ) -> bool {
        match node {
            ConditionNode::Group(group) => self.evaluate_group(group, resolver, result, path),
            ConditionNode::Leaf(rule) => self.evaluate_rule(rule, resolver, result, path),
            ConditionNode::Invalid(invalid) => {
                // 编译阶段已输出 warn 诊断
                if invalid.kind == InvalidKind::Rule {
                    result.skipped_terms += 1;
                }
                debug!(
                    path,
                    kind = ?invalid.kind,
                    reason = %invalid.reason,
                    "无效节点按不匹配处理"
                );
                self.trace(result, || format!("{}: INVALID ({})", path, invalid.reason));
                false
            }
        }
    }

    /// 评估逻辑组节点（短路求值）
    fn evaluate_group<'a>(
        &self,
        group: &LogicalGroup,
        resolver: &mut PathResolver<'a>,
        result: &mut EvaluationResult,
        path: &str,
    ) -> bool {
        self.trace(result, || {
            format!(
                "{}: 开始评估 {} 组 (共 {} 个子节点)",
                path,
                group.operator,
                group.children.len()
            )
        });

        let (units, clusters) = self.partition(group, result, path);

        for unit in &units {
            let (unit_matched, label) = match unit {
                Unit::Node(i, child) => {
                    let child_path = format!("{}.terms[{}]", path, i);
                    (
                        self.evaluate_node(child, resolver, result, &child_path),
                        child_path,
                    )
                }
                Unit::Cluster(idx) => {
                    let cluster = &clusters[*idx];
                    (
                        self.evaluate_cluster(cluster, resolver, result, path),
                        format!("{}.group['{}']", path, cluster.tag),
                    )
                }
            };

            match (group.operator, unit_matched) {
                (LogicalOperator::And, false) => {
                    self.trace(result, || format!("{}: AND 短路 - {} 不匹配", path, label));
                    return false;
                }
                (LogicalOperator::Or, true) => {
                    self.trace(result, || format!("{}: OR 短路 - {} 匹配", path, label));
                    return true;
                }
                _ => {}
            }
        }

        let outcome = group.operator.identity();
        self.trace(result, || match group.operator {
            LogicalOperator::And => format!("{}: AND 组全部匹配", path),
            LogicalOperator::Or => format!("{}: OR 组无匹配", path),
        });
        outcome
    }

    /// 把子节点划分为评估单元；无效叶子项在此处跳过
    fn partition<'r>(
        &self,
        group: &'r LogicalGroup,
        result: &mut EvaluationResult,
        path: &str,
    ) -> (Vec<Unit<'r>>, Vec<Cluster<'r>>) {
        let mut units = Vec::new();
        let mut clusters: Vec<Cluster<'r>> = Vec::new();

        for (i, child) in group.children.iter().enumerate() {
            match child {
                ConditionNode::Leaf(rule) => {
                    match clusters.iter_mut().find(|c| c.tag == rule.group) {
                        Some(cluster) => cluster.rules.push((i, rule)),
                        None => {
                            units.push(Unit::Cluster(clusters.len()));
                            clusters.push(Cluster {
                                tag: &rule.group,
                                rules: vec![(i, rule)],
                            });
                        }
                    }
                }
                ConditionNode::Invalid(invalid) if invalid.kind == InvalidKind::Rule => {
                    result.skipped_terms += 1;
                    self.trace(result, || {
                        format!("{}.terms[{}]: SKIPPED ({})", path, i, invalid.reason)
                    });
                }
                _ => units.push(Unit::Node(i, child)),
            }
        }

        (units, clusters)
    }

    /// 同标签规则按 AND 求值，遇到 false 立即返回
    fn evaluate_cluster<'a>(
        &self,
        cluster: &Cluster<'_>,
        resolver: &mut PathResolver<'a>,
        result: &mut EvaluationResult,
        path: &str,
    ) -> bool {
        for (i, rule) in &cluster.rules {
            let rule_path = format!("{}.terms[{}]", path, i);
            if !self.evaluate_rule(rule, resolver, result, &rule_path) {
                if !cluster.tag.is_empty() {
                    self.trace(result, || {
                        format!(
                            "{}: 分组 '{}' 短路 - {} 不匹配",
                            path, cluster.tag, rule_path
                        )
                    });
                }
                return false;
            }
        }
        true
    }

    /// 评估叶子规则
    fn evaluate_rule<'a>(
        &self,
        rule: &Rule,
        resolver: &mut PathResolver<'a>,
        result: &mut EvaluationResult,
        path: &str,
    ) -> bool {
        let field_value = resolver.resolve(&rule.namespace, &rule.name);

        if let (Some(types), Some(value)) = (&self.types, field_value) {
            if let TypeCheck::Mismatch { expected } = types.check(&rule.name, value) {
                warn!(
                    field = %rule.path(),
                    expected = %expected,
                    actual = %value,
                    "字段值与声明类型不符"
                );
            }
        }

        let matched = rule.evaluate(field_value, &self.options);

        if matched {
            debug!(path, rule = %rule, "Rule matched");
            result.matched_rules.push(format!("{}: {}", path, rule));
        } else {
            debug!(path, rule = %rule, found = field_value.is_some(), "Rule failed");
        }

        self.trace(result, || {
            format!(
                "{}: {} => {}",
                path,
                rule,
                if matched { "MATCHED" } else { "NOT_MATCHED" }
            )
        });

        matched
    }

    fn trace(&self, result: &mut EvaluationResult, line: impl FnOnce() -> String) {
        if self.trace_enabled {
            result.evaluation_trace.push(line());
        }
    }
}
