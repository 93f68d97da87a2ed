//! 字段路径解析
//!
//! 按 `namespace.fieldName` 在文档中逐段下钻，并在一次评估内缓存结果。
//! 缓存只按键区分，不区分文档，因此每次评估都必须使用新的解析器。

use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

/// 路径解析器（单次评估作用域）
pub struct PathResolver<'a> {
    root: &'a Value,
    cache: HashMap<String, Option<&'a Value>>,
    hits: usize,
    misses: usize,
}

impl<'a> PathResolver<'a> {
    pub fn new(root: &'a Value) -> Self {
        Self {
            root,
            cache: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }

    /// 解析 `namespace` 下的 `field`，`None` 表示未找到
    ///
    /// 命名空间按 `.` 分段；数组节点上的纯数字段视为下标。
    pub fn resolve(&mut self, namespace: &str, field: &str) -> Option<&'a Value> {
        let key = format!("{}.{}", namespace, field);
        if let Some(&cached) = self.cache.get(&key) {
            self.hits += 1;
            return cached;
        }

        self.misses += 1;
        let outcome = self.descend(namespace, field);
        self.cache.insert(key, outcome);
        outcome
    }

    fn descend(&self, namespace: &str, field: &str) -> Option<&'a Value> {
        let mut current = self.root;

        for part in namespace.split('.') {
            match child(current, part) {
                Some(next) => current = next,
                None => {
                    debug!(namespace, segment = part, "命名空间路径段不存在");
                    return None;
                }
            }
        }

        let value = child(current, field);
        if value.is_none() {
            debug!(namespace, field, "字段不存在");
        }
        value
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn misses(&self) -> usize {
        self.misses
    }
}

/// 取子节点：对象按键，数组按数字下标
pub(crate) fn child<'v>(node: &'v Value, key: &str) -> Option<&'v Value> {
    match node {
        Value::Object(map) => map.get(key),
        Value::Array(arr) => key.parse::<usize>().ok().and_then(|i| arr.get(i)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document() -> Value {
        json!({
            "customer": {
                "account": {"balance": 1500, "type": "SB"},
                "status": "active",
                "nickname": null
            },
            "accounts": [
                {"id": "ACC1"},
                {"id": "ACC2"}
            ]
        })
    }

    #[test]
    fn test_resolve_nested_namespace() {
        let doc = document();
        let mut resolver = PathResolver::new(&doc);

        assert_eq!(
            resolver.resolve("customer.account", "balance"),
            Some(&json!(1500))
        );
        assert_eq!(resolver.resolve("customer", "status"), Some(&json!("active")));
    }

    #[test]
    fn test_resolve_missing_segment_and_field() {
        let doc = document();
        let mut resolver = PathResolver::new(&doc);

        assert_eq!(resolver.resolve("customer.card", "limit"), None);
        assert_eq!(resolver.resolve("customer.account", "limit"), None);
        assert_eq!(resolver.resolve("customer.status", "length"), None);
    }

    #[test]
    fn test_resolve_null_is_found() {
        let doc = document();
        let mut resolver = PathResolver::new(&doc);
        assert_eq!(resolver.resolve("customer", "nickname"), Some(&Value::Null));
    }

    #[test]
    fn test_resolve_array_index_segment() {
        let doc = document();
        let mut resolver = PathResolver::new(&doc);
        assert_eq!(resolver.resolve("accounts.1", "id"), Some(&json!("ACC2")));
        assert_eq!(resolver.resolve("accounts.5", "id"), None);
    }

    #[test]
    fn test_cache_hits_including_not_found() {
        let doc = document();
        let mut resolver = PathResolver::new(&doc);

        resolver.resolve("customer", "status");
        resolver.resolve("customer", "status");
        resolver.resolve("missing", "x");
        resolver.resolve("missing", "x");

        assert_eq!(resolver.misses(), 2);
        assert_eq!(resolver.hits(), 2);

        // 新解析器不继承旧缓存
        let mut fresh = PathResolver::new(&doc);
        fresh.resolve("customer", "status");
        assert_eq!(fresh.misses(), 1);
        assert_eq!(fresh.hits(), 0);
    }
}
