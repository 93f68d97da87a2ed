//! 字段类型注册表
//!
//! 使用 DashMap 提供线程安全的字段类型声明。类型只用于诊断，不参与求值；
//! 加载可以与规则评估并发进行。

use crate::date_condition::parse_calendar_date;
use crate::error::{Result, RuleError};
use chrono::DateTime;
use dashmap::DashMap;
use rules_shared::observability::metrics::record_type_definition;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// 标量类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ScalarType {
    Integer,
    Double,
    String,
    DateTime,
}

impl ScalarType {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Integer => "Integer",
            Self::Double => "Double",
            Self::String => "String",
            Self::DateTime => "DateTime",
        }
    }

    fn conforms(&self, value: &Value) -> bool {
        match (self, value) {
            (Self::Integer, Value::Number(n)) => n.is_i64() || n.is_u64(),
            (Self::Integer, Value::String(s)) => s.trim().parse::<i64>().is_ok(),
            (Self::Double, Value::Number(_)) => true,
            (Self::Double, Value::String(s)) => s.trim().parse::<f64>().is_ok(),
            (Self::String, Value::String(_)) => true,
            (Self::DateTime, Value::String(s)) => {
                parse_calendar_date(s).is_ok() || DateTime::parse_from_rfc3339(s).is_ok()
            }
            _ => false,
        }
    }
}

impl FromStr for ScalarType {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Integer" => Ok(Self::Integer),
            "Double" => Ok(Self::Double),
            "String" => Ok(Self::String),
            "DateTime" => Ok(Self::DateTime),
            _ => Err(()),
        }
    }
}

/// 字段声明类型：标量或标量数组（如 `Integer[]`）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FieldType {
    Scalar(ScalarType),
    Array(ScalarType),
}

impl FieldType {
    /// 值是否符合声明；null 视为符合任何类型
    pub fn conforms(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (Self::Scalar(s), v) => s.conforms(v),
            (Self::Array(s), Value::Array(items)) => {
                items.iter().all(|item| item.is_null() || s.conforms(item))
            }
            (Self::Array(_), _) => false,
        }
    }
}

impl FromStr for FieldType {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || RuleError::UnknownType(s.to_string());

        match s.strip_suffix("[]") {
            Some(element) => element.parse().map(Self::Array).map_err(|_| invalid()),
            None => s.parse().map(Self::Scalar).map_err(|_| invalid()),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(s) => write!(f, "{}", s.as_str()),
            Self::Array(s) => write!(f, "{}[]", s.as_str()),
        }
    }
}

/// 类型检查结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCheck {
    Undeclared,
    Conforms,
    Mismatch { expected: FieldType },
}

/// 类型定义加载报告
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    /// 成功登记的行数
    pub loaded: usize,
    /// 格式不符（非恰好一个冒号）被静默跳过的行数
    pub skipped: usize,
    /// 类型名无效被拒绝的行数
    pub rejected: usize,
}

/// 字段类型注册表
#[derive(Clone, Default)]
pub struct TypeRegistry {
    types: Arc<DashMap<String, FieldType>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// 登记单个字段类型，类型名无效时拒绝并返回 false
    #[instrument(skip(self))]
    pub fn register_type(&self, field: &str, type_name: &str) -> bool {
        let field = field.trim();
        let type_name = type_name.trim();

        if field.is_empty() {
            warn!("字段名为空，忽略类型定义");
            return false;
        }

        match type_name.parse::<FieldType>() {
            Ok(field_type) => {
                self.types.insert(field.to_string(), field_type);
                debug!(field, %field_type, "类型已登记");
                true
            }
            Err(_) => {
                let error = RuleError::InvalidType {
                    field: field.to_string(),
                    type_name: type_name.to_string(),
                };
                warn!(error = %error, "忽略类型定义");
                false
            }
        }
    }

    /// 按行加载 `fieldName:TypeName` 形式的类型定义
    ///
    /// 非恰好一个冒号的行被静默跳过；类型名无效的行被拒绝并继续处理后续行。
    #[instrument(skip(self, lines))]
    pub fn load_type_definitions<I, S>(&self, lines: I) -> LoadReport
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut report = LoadReport::default();

        for line in lines {
            let line = line.as_ref();
            let Some((field, type_name)) = split_definition(line) else {
                report.skipped += 1;
                record_type_definition("skipped");
                continue;
            };

            if self.register_type(field, type_name) {
                report.loaded += 1;
                record_type_definition("loaded");
            } else {
                report.rejected += 1;
                record_type_definition("rejected");
            }
        }

        info!(
            loaded = report.loaded,
            skipped = report.skipped,
            rejected = report.rejected,
            "类型定义加载完成"
        );
        report
    }

    pub fn get(&self, field: &str) -> Option<FieldType> {
        self.types.get(field).map(|t| *t.value())
    }

    /// 检查值是否符合字段的声明类型
    pub fn check(&self, field: &str, value: &Value) -> TypeCheck {
        match self.get(field) {
            None => TypeCheck::Undeclared,
            Some(expected) if expected.conforms(value) => TypeCheck::Conforms,
            Some(expected) => TypeCheck::Mismatch { expected },
        }
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("len", &self.types.len())
            .finish()
    }
}

/// 拆分一行定义，要求恰好一个冒号
fn split_definition(line: &str) -> Option<(&str, &str)> {
    let (field, type_name) = line.split_once(':')?;
    if type_name.contains(':') {
        return None;
    }
    Some((field, type_name))
}
