//! 比较符评估器
//!
//! 实现叶子规则各比较符的求值逻辑。字段值以 JSON 值给出，操作数以字符串给出。

use crate::clock::{Clock, SystemClock};
use crate::date_condition::{DateCondition, parse_calendar_date};
use crate::error::{Result, RuleError};
use crate::operators::Comparator;
use chrono::NaiveDate;
use serde_json::Value;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// 评估选项
#[derive(Clone)]
pub struct EvaluationOptions {
    /// `equal to` / `not equal to` / `contains` 是否区分大小写
    pub case_sensitive: bool,
    clock: Arc<dyn Clock>,
}

impl EvaluationOptions {
    pub fn new() -> Self {
        Self {
            case_sensitive: true,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn case_insensitive(mut self) -> Self {
        self.case_sensitive = false;
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }
}

impl Default for EvaluationOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EvaluationOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvaluationOptions")
            .field("case_sensitive", &self.case_sensitive)
            .finish_non_exhaustive()
    }
}

/// 比较符评估器
pub struct ConditionEvaluator;

impl ConditionEvaluator {
    /// 评估比较
    ///
    /// # Arguments
    /// * `field_value` - 从文档中解析出的字段值，`None` 表示未找到
    /// * `comparator` - 比较符
    /// * `operand` - 规则中定义的操作数（已去除首尾空白）
    /// * `options` - 大小写与时钟选项
    ///
    /// 字段不存在时任何比较符都返回 `Ok(false)`；数值或日期无法解析时返回 `Err`，
    /// 由调用方决定如何降级。
    pub fn evaluate(
        field_value: Option<&Value>,
        comparator: Comparator,
        operand: &str,
        options: &EvaluationOptions,
    ) -> Result<bool> {
        let field_value = match field_value {
            Some(v) => v,
            None => return Ok(false),
        };

        match comparator {
            Comparator::EqualTo => Ok(Self::text_eq(field_value, operand, options.case_sensitive)),
            Comparator::NotEqualTo => {
                Ok(!Self::text_eq(field_value, operand, options.case_sensitive))
            }
            Comparator::Contains => {
                Ok(Self::contains(field_value, operand, options.case_sensitive))
            }
            Comparator::GreaterThan => Self::compare(field_value, operand, |a, b| a > b),
            Comparator::GreaterThanOrEqualTo => Self::compare(field_value, operand, |a, b| a >= b),
            Comparator::LessThan => Self::compare(field_value, operand, |a, b| a < b),
            Comparator::LessThanOrEqualTo => Self::compare(field_value, operand, |a, b| a <= b),
            Comparator::DateAfter => {
                Self::date_compare(field_value, operand, options.today(), |a, b| a > b)
            }
            Comparator::DateBefore => {
                Self::date_compare(field_value, operand, options.today(), |a, b| a < b)
            }
        }
    }

    /// 值的文本形式：数字、布尔转为字符串，null 为 "null"，容器为空串
    pub fn as_text(value: &Value) -> Cow<'_, str> {
        match value {
            Value::String(s) => Cow::Borrowed(s.as_str()),
            Value::Number(n) => Cow::Owned(n.to_string()),
            Value::Bool(b) => Cow::Borrowed(if *b { "true" } else { "false" }),
            Value::Null => Cow::Borrowed("null"),
            Value::Array(_) | Value::Object(_) => Cow::Borrowed(""),
        }
    }

    fn text_eq(field: &Value, operand: &str, case_sensitive: bool) -> bool {
        let text = Self::as_text(field);
        if case_sensitive {
            text == operand
        } else {
            text.to_lowercase() == operand.to_lowercase()
        }
    }

    fn contains(field: &Value, operand: &str, case_sensitive: bool) -> bool {
        let text = Self::as_text(field);
        if case_sensitive {
            text.contains(operand)
        } else {
            text.to_lowercase().contains(&operand.to_lowercase())
        }
    }

    /// 数值比较
    fn compare<F>(field: &Value, operand: &str, cmp: F) -> Result<bool>
    where
        F: Fn(f64, f64) -> bool,
    {
        let field_num = Self::as_f64(field).ok_or_else(|| RuleError::TypeMismatch {
            expected: "number".to_string(),
            actual: Self::type_name(field).to_string(),
        })?;

        let operand_num: f64 = operand.trim().parse().map_err(|_| RuleError::TypeMismatch {
            expected: "number".to_string(),
            actual: format!("'{}'", operand),
        })?;

        Ok(cmp(field_num, operand_num))
    }

    /// 日期比较（严格先后，不含当天）
    fn date_compare<F>(field: &Value, operand: &str, today: NaiveDate, cmp: F) -> Result<bool>
    where
        F: Fn(NaiveDate, NaiveDate) -> bool,
    {
        let text = field.as_str().ok_or_else(|| RuleError::TypeMismatch {
            expected: "date string".to_string(),
            actual: Self::type_name(field).to_string(),
        })?;

        let field_date = parse_calendar_date(text)?;
        let operand_date = DateCondition::parse(operand)?.resolve(today)?;

        Ok(cmp(field_date, operand_date))
    }

    /// 尝试将 Value 转换为 f64
    fn as_f64(value: &Value) -> Option<f64> {
        match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// 获取值的类型名称
    pub fn type_name(value: &Value) -> &'static str {
        match value {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }
}
