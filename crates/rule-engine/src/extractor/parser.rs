//! 路径查询解析器
//!
//! 支持的语法（JSONPath 子集）：
//! - `$` 根节点；不以 `$` 开头的查询视为 `$.` 开头
//! - `.key` / `['key']` / `["key"]` 子节点，`.*` / `[*]` 通配
//! - `..key` / `..*` / `..[...]` 递归下降
//! - `[0]` / `[-1]` 下标，`['a','b']` / `[0,2]` 并集
//! - `[?(@.a.b)]` 存在性过滤，`[?(@.a == 'x')]` 比较过滤（`== != < <= > >=`）

use crate::error::{Result, RuleError};
use serde_json::Value;

/// 单个路径步骤
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Child(String),
    Index(i64),
    Wildcard,
    Union(Vec<Selector>),
    Descendant(Box<Step>),
    Filter(Filter),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    Name(String),
    Index(i64),
}

/// 数组元素过滤条件，`path` 为相对于 `@` 的键序列
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub path: Vec<String>,
    pub test: FilterTest,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterTest {
    Exists,
    Compare(CompareOp, Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

pub(crate) fn parse(query: &str) -> Result<Vec<Step>> {
    Parser::new(query).parse()
}

struct Parser<'q> {
    source: &'q str,
    chars: Vec<char>,
    pos: usize,
}

impl<'q> Parser<'q> {
    fn new(source: &'q str) -> Self {
        Self {
            source,
            chars: source.trim().chars().collect(),
            pos: 0,
        }
    }

    fn error(&self, reason: impl Into<String>) -> RuleError {
        RuleError::PathQuery {
            query: self.source.to_string(),
            reason: reason.into(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn expect(&mut self, expected: char) -> Result<()> {
        match self.bump() {
            Some(c) if c == expected => Ok(()),
            Some(c) => Err(self.error(format!(
                "位置 {} 期望 '{}'，实际为 '{}'",
                self.pos - 1,
                expected,
                c
            ))),
            None => Err(self.error(format!("期望 '{}'，但查询已结束", expected))),
        }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn parse(mut self) -> Result<Vec<Step>> {
        if self.chars.is_empty() {
            return Err(self.error("查询为空"));
        }

        let mut steps = Vec::new();

        match self.peek() {
            Some('$') => self.pos += 1,
            Some('[') | Some('.') | None => {}
            Some(_) => steps.push(self.parse_dot_member()?),
        }

        while let Some(c) = self.peek() {
            let step = match c {
                '.' if self.peek_at(1) == Some('.') => {
                    self.pos += 2;
                    let inner = match self.peek() {
                        Some('[') => self.parse_bracket()?,
                        _ => self.parse_dot_member()?,
                    };
                    Step::Descendant(Box::new(inner))
                }
                '.' => {
                    self.pos += 1;
                    self.parse_dot_member()?
                }
                '[' => self.parse_bracket()?,
                other => {
                    let reason = format!("位置 {} 出现意外字符 '{}'", self.pos, other);
                    return Err(self.error(reason));
                }
            };
            steps.push(step);
        }

        Ok(steps)
    }

    /// 点号后的成员：`*` 或名称
    fn parse_dot_member(&mut self) -> Result<Step> {
        if self.peek() == Some('*') {
            self.pos += 1;
            return Ok(Step::Wildcard);
        }

        let start = self.pos;
        while matches!(self.peek(), Some(c) if c != '.' && c != '[') {
            self.pos += 1;
        }

        let name: String = self.chars[start..self.pos].iter().collect();
        if name.trim().is_empty() {
            return Err(self.error(format!("位置 {} 缺少字段名", start)));
        }
        Ok(Step::Child(name))
    }

    fn parse_bracket(&mut self) -> Result<Step> {
        self.expect('[')?;
        self.skip_whitespace();

        let step = match self.peek() {
            Some('?') => {
                self.pos += 1;
                self.skip_whitespace();
                self.expect('(')?;
                let filter = self.parse_filter()?;
                self.skip_whitespace();
                self.expect(')')?;
                Step::Filter(filter)
            }
            Some('*') => {
                self.pos += 1;
                Step::Wildcard
            }
            Some('\'') | Some('"') => {
                let mut names = vec![self.parse_quoted()?];
                while self.consume_list_separator() {
                    names.push(self.parse_quoted()?);
                }
                if names.len() == 1 {
                    Step::Child(names.remove(0))
                } else {
                    Step::Union(names.into_iter().map(Selector::Name).collect())
                }
            }
            Some(_) => {
                let mut indices = vec![self.parse_integer()?];
                while self.consume_list_separator() {
                    indices.push(self.parse_integer()?);
                }
                if indices.len() == 1 {
                    Step::Index(indices[0])
                } else {
                    Step::Union(indices.into_iter().map(Selector::Index).collect())
                }
            }
            None => return Err(self.error("方括号未闭合")),
        };

        self.skip_whitespace();
        self.expect(']')?;
        Ok(step)
    }

    fn consume_list_separator(&mut self) -> bool {
        self.skip_whitespace();
        if self.peek() == Some(',') {
            self.pos += 1;
            self.skip_whitespace();
            true
        } else {
            false
        }
    }

    fn parse_quoted(&mut self) -> Result<String> {
        let quote = match self.bump() {
            Some(q @ ('\'' | '"')) => q,
            _ => return Err(self.error("期望引号")),
        };

        let mut out = String::new();
        loop {
            match self.bump() {
                Some('\\') => match self.bump() {
                    Some(c) => out.push(c),
                    None => return Err(self.error("转义字符后查询结束")),
                },
                Some(c) if c == quote => return Ok(out),
                Some(c) => out.push(c),
                None => return Err(self.error("字符串未闭合")),
            }
        }
    }

    fn parse_integer(&mut self) -> Result<i64> {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.pos += 1;
        }
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.pos += 1;
        }

        let text: String = self.chars[start..self.pos].iter().collect();
        text.parse()
            .map_err(|_| self.error(format!("位置 {} 的下标无效: '{}'", start, text)))
    }

    /// 过滤表达式：`@` 开头的相对路径，可选比较符与字面量
    fn parse_filter(&mut self) -> Result<Filter> {
        self.skip_whitespace();
        self.expect('@')?;

        let mut path = Vec::new();
        loop {
            match self.peek() {
                Some('.') => {
                    self.pos += 1;
                    let start = self.pos;
                    while matches!(
                        self.peek(),
                        Some(c) if c.is_alphanumeric() || c == '_' || c == '-'
                    ) {
                        self.pos += 1;
                    }
                    if start == self.pos {
                        return Err(self.error(format!("位置 {} 缺少过滤字段名", start)));
                    }
                    path.push(self.chars[start..self.pos].iter().collect());
                }
                Some('[') => {
                    self.pos += 1;
                    self.skip_whitespace();
                    let name = self.parse_quoted()?;
                    self.skip_whitespace();
                    self.expect(']')?;
                    path.push(name);
                }
                _ => break,
            }
        }

        self.skip_whitespace();
        let Some(op) = self.parse_compare_op()? else {
            return Ok(Filter {
                path,
                test: FilterTest::Exists,
            });
        };

        self.skip_whitespace();
        let literal = self.parse_literal()?;
        Ok(Filter {
            path,
            test: FilterTest::Compare(op, literal),
        })
    }

    fn parse_compare_op(&mut self) -> Result<Option<CompareOp>> {
        let op = match (self.peek(), self.peek_at(1)) {
            (Some('='), Some('=')) => Some((CompareOp::Eq, 2)),
            (Some('!'), Some('=')) => Some((CompareOp::Ne, 2)),
            (Some('<'), Some('=')) => Some((CompareOp::Le, 2)),
            (Some('>'), Some('=')) => Some((CompareOp::Ge, 2)),
            (Some('<'), _) => Some((CompareOp::Lt, 1)),
            (Some('>'), _) => Some((CompareOp::Gt, 1)),
            (Some(')'), _) => None,
            (Some(c), _) => {
                let reason = format!("位置 {} 出现未知的过滤操作符 '{}'", self.pos, c);
                return Err(self.error(reason));
            }
            (None, _) => return Err(self.error("过滤表达式未闭合")),
        };

        Ok(op.map(|(op, len)| {
            self.pos += len;
            op
        }))
    }

    /// 字面量：引号字符串、数字、true/false/null
    fn parse_literal(&mut self) -> Result<Value> {
        if matches!(self.peek(), Some('\'' | '"')) {
            return self.parse_quoted().map(Value::String);
        }

        let start = self.pos;
        while matches!(self.peek(), Some(c) if c != ')' && !c.is_whitespace()) {
            self.pos += 1;
        }

        let token: String = self.chars[start..self.pos].iter().collect();
        match serde_json::from_str::<Value>(&token) {
            Ok(v @ (Value::Number(_) | Value::Bool(_) | Value::Null)) => Ok(v),
            _ => Err(self.error(format!("位置 {} 的字面量无效: '{}'", start, token))),
        }
    }
}
