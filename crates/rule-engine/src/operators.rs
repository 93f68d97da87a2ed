//! 规则操作符定义

use crate::error::RuleError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 叶子规则的比较符
///
/// 条件文档中以自然语言书写（如 `"greater than"`），解析时忽略大小写和首尾空白。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparator {
    // 字符串比较
    EqualTo,
    NotEqualTo,
    Contains,

    // 数值比较
    GreaterThan,
    GreaterThanOrEqualTo,
    LessThan,
    LessThanOrEqualTo,

    // 日期比较
    DateAfter,
    DateBefore,
}

impl Comparator {
    pub const ALL: [Comparator; 9] = [
        Self::EqualTo,
        Self::NotEqualTo,
        Self::Contains,
        Self::GreaterThan,
        Self::GreaterThanOrEqualTo,
        Self::LessThan,
        Self::LessThanOrEqualTo,
        Self::DateAfter,
        Self::DateBefore,
    ];

    /// 条件文档中使用的写法
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EqualTo => "equal to",
            Self::NotEqualTo => "not equal to",
            Self::Contains => "contains",
            Self::GreaterThan => "greater than",
            Self::GreaterThanOrEqualTo => "greater than or equal to",
            Self::LessThan => "less than",
            Self::LessThanOrEqualTo => "less than or equal to",
            Self::DateAfter => "date after",
            Self::DateBefore => "date before",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::GreaterThan
                | Self::GreaterThanOrEqualTo
                | Self::LessThan
                | Self::LessThanOrEqualTo
        )
    }

    pub fn is_date(&self) -> bool {
        matches!(self, Self::DateAfter | Self::DateBefore)
    }
}

impl FromStr for Comparator {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| RuleError::InvalidComparator(s.to_string()))
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 逻辑操作符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOperator {
    And,
    Or,
}

impl LogicalOperator {
    /// 组内没有任何可评估单元时的结果（AND 为 true，OR 为 false）
    pub fn identity(&self) -> bool {
        matches!(self, Self::And)
    }
}

impl FromStr for LogicalOperator {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            op if op.eq_ignore_ascii_case("and") => Ok(Self::And),
            op if op.eq_ignore_ascii_case("or") => Ok(Self::Or),
            _ => Err(RuleError::InvalidOperator(s.to_string())),
        }
    }
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => write!(f, "AND"),
            Self::Or => write!(f, "OR"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comparator_parse_is_case_insensitive() {
        assert_eq!(
            "Greater Than ".parse::<Comparator>().unwrap(),
            Comparator::GreaterThan
        );
        assert_eq!(
            "DATE BEFORE".parse::<Comparator>().unwrap(),
            Comparator::DateBefore
        );
        assert_eq!(
            "less than or equal to".parse::<Comparator>().unwrap(),
            Comparator::LessThanOrEqualTo
        );
    }

    #[test]
    fn test_comparator_unknown() {
        let err = "between".parse::<Comparator>().unwrap_err();
        assert!(err.to_string().contains("between"));
        assert!("".parse::<Comparator>().is_err());
    }

    #[test]
    fn test_comparator_display_round_trips() {
        for c in Comparator::ALL {
            assert_eq!(c.to_string().parse::<Comparator>().unwrap(), c);
        }
    }

    #[test]
    fn test_logical_operator_parse() {
        assert_eq!("and".parse::<LogicalOperator>().unwrap(), LogicalOperator::And);
        assert_eq!("OR".parse::<LogicalOperator>().unwrap(), LogicalOperator::Or);
        assert_eq!("Or".parse::<LogicalOperator>().unwrap(), LogicalOperator::Or);
        assert!("xor".parse::<LogicalOperator>().is_err());
        assert!("".parse::<LogicalOperator>().is_err());
    }
}
