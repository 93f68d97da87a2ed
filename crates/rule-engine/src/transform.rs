//! 文档转换
//!
//! 按转换定义从原始文档中抽取属性，生成按命名空间组织的覆盖层，
//! 再浅合并回原始文档供条件评估使用。

use crate::error::Result;
use crate::extractor::FieldExtractor;
use rules_shared::observability::metrics::record_transform_attribute;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

/// 转换定义
///
/// ```json
/// { "registeredAttributes": [
///     { "namespace": "customer",
///       "attributeList": [ { "attributeName": "age", "jsonPath": "$.customer.age" } ],
///       "propertygroups": [ { "name": "accounts", "jsonPath": "$.account[*]" } ] } ] }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformDefinition {
    #[serde(rename = "registeredAttributes", default)]
    pub registered_attributes: Vec<NamespaceDefinition>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NamespaceDefinition {
    #[serde(default)]
    pub namespace: String,
    #[serde(rename = "attributeList", default)]
    pub attribute_list: Vec<AttributeDefinition>,
    #[serde(rename = "propertygroups", default)]
    pub property_groups: Vec<PropertyGroupDefinition>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeDefinition {
    #[serde(rename = "attributeName", default)]
    pub attribute_name: String,
    #[serde(rename = "jsonPath", default)]
    pub json_path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyGroupDefinition {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "jsonPath", default)]
    pub json_path: String,
}

impl TransformDefinition {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_value(value: &Value) -> Result<Self> {
        Ok(Self::deserialize(value)?)
    }
}

/// 文档转换器
pub struct DocumentTransformer;

impl DocumentTransformer {
    /// 生成覆盖层
    ///
    /// 每个属性都对整个文档执行路径查询。无匹配、空查询或语法错误的属性被跳过；
    /// 没有抽取到任何值的命名空间不出现在结果中。
    pub fn transform(document: &Value, definition: &TransformDefinition) -> Map<String, Value> {
        let mut overlay = Map::new();

        for entry in &definition.registered_attributes {
            let namespace = entry.namespace.trim();
            if namespace.is_empty() {
                warn!("命名空间为空，跳过该转换定义");
                continue;
            }

            let pairs = entry
                .attribute_list
                .iter()
                .map(|a| (a.attribute_name.as_str(), a.json_path.as_str()))
                .chain(
                    entry
                        .property_groups
                        .iter()
                        .map(|g| (g.name.as_str(), g.json_path.as_str())),
                );

            let mut values = Map::new();
            for (name, query) in pairs {
                if name.is_empty() {
                    warn!(namespace, query, "属性名为空，跳过");
                    continue;
                }

                match FieldExtractor::extract(document, query) {
                    Some(value) if !value.is_null() => {
                        record_transform_attribute(namespace, "extracted");
                        values.insert(name.to_string(), value);
                    }
                    _ => {
                        record_transform_attribute(namespace, "missing");
                        debug!(namespace, attribute = name, query, "属性未找到，跳过");
                    }
                }
            }

            if values.is_empty() {
                debug!(namespace, "命名空间没有抽取到任何属性，省略");
                continue;
            }

            // 同名命名空间出现多次时合并属性，后出现的覆盖先出现的
            match overlay.get_mut(namespace) {
                Some(Value::Object(existing)) => existing.extend(values),
                _ => {
                    overlay.insert(namespace.to_string(), Value::Object(values));
                }
            }
        }

        info!(namespaces = overlay.len(), "文档转换完成");
        overlay
    }
}

/// 浅合并：覆盖层的顶层键覆盖原始文档的同名键
pub fn merge(mut original: Map<String, Value>, overlay: Map<String, Value>) -> Map<String, Value> {
    original.extend(overlay);
    original
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document() -> Value {
        json!({
            "customer": {"customer_id": 123, "age": 105, "nickname": null},
            "account": [
                {"account_number": "ACC123", "account_type": "SB", "balance": 1500},
                {"account_number": "ACC456", "account_type": "CA", "balance": 5000}
            ],
            "branch": {"location": "Bengaluru"}
        })
    }

    fn definition() -> TransformDefinition {
        TransformDefinition::from_json(
            r#"{
                "registeredAttributes": [
                    {
                        "namespace": "profile",
                        "attributeList": [
                            {"attributeName": "id", "jsonPath": "$.customer.customer_id"},
                            {"attributeName": "age", "jsonPath": "$.customer.age"},
                            {"attributeName": "email", "jsonPath": "$.customer.email"},
                            {"attributeName": "nickname", "jsonPath": "$.customer.nickname"},
                            {"attributeName": "broken", "jsonPath": "$.customer[?("},
                            {"attributeName": "empty", "jsonPath": ""}
                        ],
                        "propertygroups": [
                            {"name": "savings", "jsonPath": "$.account[?(@.account_type == 'SB')]"}
                        ]
                    },
                    {
                        "namespace": "ghost",
                        "attributeList": [
                            {"attributeName": "x", "jsonPath": "$.nothing.here"}
                        ]
                    }
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_definition_parsing() {
        let def = definition();
        assert_eq!(def.registered_attributes.len(), 2);
        assert_eq!(def.registered_attributes[0].attribute_list.len(), 6);
        assert_eq!(def.registered_attributes[0].property_groups[0].name, "savings");
        assert!(def.registered_attributes[1].property_groups.is_empty());

        let empty = TransformDefinition::from_json("{}").unwrap();
        assert!(empty.registered_attributes.is_empty());
    }

    #[test]
    fn test_transform() {
        let overlay = DocumentTransformer::transform(&document(), &definition());

        assert_eq!(overlay.len(), 1);
        assert_eq!(
            overlay["profile"],
            json!({
                "id": 123,
                "age": 105,
                "savings": [
                    {"account_number": "ACC123", "account_type": "SB", "balance": 1500}
                ]
            })
        );
    }

    #[test]
    fn test_namespace_without_matches_is_omitted() {
        let overlay = DocumentTransformer::transform(&document(), &definition());
        assert!(!overlay.contains_key("ghost"));
    }

    #[test]
    fn test_duplicate_namespace_extends() {
        let def = TransformDefinition::from_value(&json!({
            "registeredAttributes": [
                {"namespace": "n", "attributeList": [
                    {"attributeName": "a", "jsonPath": "$.customer.age"},
                    {"attributeName": "b", "jsonPath": "$.branch.location"}
                ]},
                {"namespace": "n", "attributeList": [
                    {"attributeName": "a", "jsonPath": "$.customer.customer_id"}
                ]}
            ]
        }))
        .unwrap();

        let overlay = DocumentTransformer::transform(&document(), &def);
        assert_eq!(overlay["n"], json!({"a": 123, "b": "Bengaluru"}));
    }

    #[test]
    fn test_merge_overlay_wins() {
        let original = json!({"customer": {"age": 1}, "keep": true});
        let overlay = json!({"customer": {"age": 2}, "extra": [1]});

        let merged = merge(
            original.as_object().cloned().unwrap(),
            overlay.as_object().cloned().unwrap(),
        );

        assert_eq!(
            Value::Object(merged),
            json!({"customer": {"age": 2}, "keep": true, "extra": [1]})
        );
    }

    #[test]
    fn test_merge_is_idempotent() {
        let doc = document();
        let overlay = DocumentTransformer::transform(&doc, &definition());

        let once = merge(doc.as_object().cloned().unwrap(), overlay.clone());
        let twice = merge(once.clone(), overlay);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_transform_is_pure() {
        let doc = document();
        let def = definition();
        assert_eq!(
            DocumentTransformer::transform(&doc, &def),
            DocumentTransformer::transform(&doc, &def)
        );
        assert_eq!(doc, document());
    }
}
