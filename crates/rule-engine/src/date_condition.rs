//! 日期条件解析
//!
//! 操作数支持两种写法：
//! - 绝对日期 `YYYY-MM-DD`
//! - 相对日期 `CURRENT DATE - N days`（关键字区分大小写）

use crate::error::{Result, RuleError};
use chrono::{Days, NaiveDate};
use regex::Regex;
use std::sync::LazyLock;

static CALENDAR_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("calendar date pattern is valid"));

static RELATIVE_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^CURRENT DATE\s*-\s*(\d+)\s+days$").expect("relative date pattern is valid")
});

/// 解析后的日期条件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateCondition {
    Absolute(NaiveDate),
    DaysBeforeToday(u32),
}

impl DateCondition {
    pub fn parse(operand: &str) -> Result<Self> {
        let operand = operand.trim();

        if let Some(caps) = RELATIVE_DATE.captures(operand) {
            let days = caps[1]
                .parse::<u32>()
                .map_err(|_| RuleError::DateCondition(operand.to_string()))?;
            return Ok(Self::DaysBeforeToday(days));
        }

        parse_calendar_date(operand).map(Self::Absolute)
    }

    /// 以给定的"今天"求出具体日期
    pub fn resolve(&self, today: NaiveDate) -> Result<NaiveDate> {
        match self {
            Self::Absolute(date) => Ok(*date),
            Self::DaysBeforeToday(days) => today
                .checked_sub_days(Days::new(u64::from(*days)))
                .ok_or_else(|| RuleError::DateCondition(format!("CURRENT DATE - {} days", days))),
        }
    }
}

/// 解析 ISO-8601 日历日期，只接受严格的 `YYYY-MM-DD`
pub fn parse_calendar_date(s: &str) -> Result<NaiveDate> {
    if !CALENDAR_DATE.is_match(s) {
        return Err(RuleError::DateCondition(s.to_string()));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| RuleError::DateCondition(s.to_string()))
}
