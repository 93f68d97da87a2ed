//! 规则引擎命令行宿主
//!
//! 从配置读取类型定义、数据文档、属性抽取定义和条件文档，
//! 执行 转换 → 合并 → 评估，并以 JSON 输出评估结果。

use anyhow::{Context, Result};
use rule_engine::{ConditionCompiler, RuleEngine, TransformDefinition};
use rules_shared::config::AppConfig;
use rules_shared::observability;
use serde_json::Value;
use std::fs;
use tracing::{info, warn};

fn main() -> Result<()> {
    let config = AppConfig::load("rule-engine").unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {}", e);
        AppConfig::default()
    });

    let obs_config = config
        .observability
        .clone()
        .with_service_name(&config.service_name);
    let guard = observability::init(&obs_config)?;

    info!(environment = %config.environment, "Starting rule-engine...");

    let engine = RuleEngine::from_config(&config.engine);

    if let Some(path) = &config.engine.type_definitions_path {
        let content = fs::read_to_string(path)
            .with_context(|| format!("读取类型定义失败: {}", path))?;
        let report = engine.load_type_definitions(content.lines());
        info!(
            path = %path,
            loaded = report.loaded,
            rejected = report.rejected,
            "类型定义已加载"
        );
    }

    let data_path = config
        .engine
        .data_path
        .as_deref()
        .context("未配置 engine.data_path")?;
    let condition_path = config
        .engine
        .condition_path
        .as_deref()
        .context("未配置 engine.condition_path")?;

    let document: Value = read_json(data_path)?;

    let document = match &config.engine.definition_path {
        Some(path) => {
            let definition: TransformDefinition = read_json(path)?;
            engine.enrich(document, &definition)?
        }
        None => {
            warn!("未配置 engine.definition_path，跳过属性抽取");
            document
        }
    };

    let condition_json = fs::read_to_string(condition_path)
        .with_context(|| format!("读取条件文档失败: {}", condition_path))?;
    let compiled = ConditionCompiler::compile_from_json(&condition_json)
        .with_context(|| format!("条件文档不是合法 JSON: {}", condition_path))?;
    if compiled.invalid_nodes > 0 {
        warn!(invalid_nodes = compiled.invalid_nodes, "条件文档包含无效节点");
    }

    let result = engine.execute(&document, &compiled.root);
    info!(
        matched = result.matched,
        matched_rules = result.matched_rules.len(),
        skipped_terms = result.skipped_terms,
        "评估完成"
    );

    println!("{}", serde_json::to_string_pretty(&result)?);

    if let Some(snapshot) = guard.metrics_snapshot() {
        tracing::debug!(metrics = %snapshot, "指标快照");
    }

    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &str) -> Result<T> {
    let content =
        fs::read_to_string(path).with_context(|| format!("读取文件失败: {}", path))?;
    serde_json::from_str(&content).with_context(|| format!("JSON 解析失败: {}", path))
}
