// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 提取程序语言
//!
//! 模型生成的“代码”是一个 JSON 文档。语言是封闭的：没有 I/O、没有导入、没有递归，
//! 唯一的能力是 CSS 选择器和线性时间的正则表达式。

use indexmap::IndexMap;
use regex::{Regex, RegexBuilder};
use scraper::Selector;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// 程序解析、编译或求值错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProgramError {
    #[error("program is not valid JSON for the extraction language: {0}")]
    Syntax(String),
    #[error("invalid CSS selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },
    #[error("invalid regex '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
    #[error("invalid program: {0}")]
    Invalid(String),
    #[error("resource limit exceeded: {0}")]
    ResourceLimit(String),
    #[error("execution time budget exceeded")]
    DeadlineExceeded,
    #[error("operation budget of {0} steps exceeded")]
    OperationLimit(u64),
}

/// 程序源码结构
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Program {
    #[serde(default)]
    pub for_each: Scope,
    pub fields: IndexMap<String, FieldSpec>,
    #[serde(default)]
    pub require: Vec<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// 记录的迭代范围
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Scope {
    #[default]
    Document,
    Select {
        selector: String,
    },
    Matches {
        pattern: String,
        #[serde(default)]
        source: MatchSource,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchSource {
    #[default]
    Text,
    Html,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldSpec {
    pub from: Source,
    #[serde(default)]
    pub pipe: Vec<Transform>,
}

/// 字段值来源
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Source {
    Text {
        #[serde(default)]
        selector: Option<String>,
        #[serde(default)]
        all: bool,
    },
    Attr {
        name: String,
        #[serde(default)]
        selector: Option<String>,
        #[serde(default)]
        all: bool,
    },
    Html {
        #[serde(default)]
        selector: Option<String>,
        #[serde(default)]
        all: bool,
    },
    Match,
    Group {
        group: GroupRef,
    },
    Const {
        value: Value,
    },
}

/// 捕获组引用，按序号或名称
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum GroupRef {
    Index(usize),
    Name(String),
}

fn first_group() -> GroupRef {
    GroupRef::Index(1)
}

/// 字段值变换
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Transform {
    Trim,
    Lowercase,
    Uppercase,
    Replace {
        pattern: String,
        #[serde(default)]
        with: String,
    },
    Capture {
        pattern: String,
        #[serde(default = "first_group")]
        group: GroupRef,
    },
    Join {
        #[serde(default)]
        separator: String,
    },
    First,
    Number,
    Default {
        value: Value,
    },
}

/// 单个字段允许的最大变换数
pub const MAX_PIPE_LEN: usize = 16;

impl Program {
    pub fn parse(source: &str) -> Result<Self, ProgramError> {
        if source.trim().is_empty() {
            return Err(ProgramError::Syntax("program text is empty".to_string()));
        }
        serde_json::from_str(source).map_err(|e| ProgramError::Syntax(e.to_string()))
    }

    /// 编译选择器和正则，并检查字段引用
    pub fn compile(self, regex_size_limit: usize) -> Result<CompiledProgram, ProgramError> {
        if self.fields.is_empty() {
            return Err(ProgramError::Invalid(
                "'fields' must declare at least one field".to_string(),
            ));
        }
        if self.limit == Some(0) {
            return Err(ProgramError::Invalid("'limit' must be positive".to_string()));
        }

        let scope = match self.for_each {
            Scope::Document => CompiledScope::Document,
            Scope::Select { selector } => CompiledScope::Select(compile_selector(&selector)?),
            Scope::Matches { pattern, source } => CompiledScope::Matches {
                regex: compile_regex(&pattern, regex_size_limit)?,
                source,
            },
        };

        let mut fields = Vec::with_capacity(self.fields.len());
        for (name, spec) in self.fields {
            if name.trim().is_empty() {
                return Err(ProgramError::Invalid("field names must not be empty".to_string()));
            }
            if spec.pipe.len() > MAX_PIPE_LEN {
                return Err(ProgramError::Invalid(format!(
                    "field '{}' has {} transforms, at most {} allowed",
                    name,
                    spec.pipe.len(),
                    MAX_PIPE_LEN
                )));
            }
            let source = compile_source(&name, spec.from, &scope)?;
            let pipe = spec
                .pipe
                .into_iter()
                .map(|t| compile_transform(&name, t, regex_size_limit))
                .collect::<Result<Vec<_>, _>>()?;
            fields.push(CompiledField { name, source, pipe });
        }

        let mut require = Vec::with_capacity(self.require.len());
        for name in self.require {
            match fields.iter().position(|f| f.name == name) {
                Some(index) => require.push(index),
                None => {
                    return Err(ProgramError::Invalid(format!(
                        "'require' names unknown field '{}'",
                        name
                    )))
                }
            }
        }

        Ok(CompiledProgram {
            scope,
            fields,
            require,
            limit: self.limit,
        })
    }
}

/// 编译后的程序
#[derive(Debug)]
pub struct CompiledProgram {
    pub scope: CompiledScope,
    pub fields: Vec<CompiledField>,
    /// 必填字段在 `fields` 中的下标
    pub require: Vec<usize>,
    pub limit: Option<usize>,
}

#[derive(Debug)]
pub enum CompiledScope {
    Document,
    Select(Selector),
    Matches { regex: Regex, source: MatchSource },
}

#[derive(Debug)]
pub struct CompiledField {
    pub name: String,
    pub source: CompiledSource,
    pub pipe: Vec<CompiledTransform>,
}

#[derive(Debug)]
pub enum CompiledSource {
    Text { selector: Option<Selector>, all: bool },
    Attr { name: String, selector: Option<Selector>, all: bool },
    Html { selector: Option<Selector>, all: bool },
    Match,
    Group(GroupRef),
    Const(Value),
}

#[derive(Debug)]
pub enum CompiledTransform {
    Trim,
    Lowercase,
    Uppercase,
    Replace { regex: Regex, with: String },
    Capture { regex: Regex, group: GroupRef },
    Join(String),
    First,
    Number,
    Default(Value),
}

fn compile_selector(selector: &str) -> Result<Selector, ProgramError> {
    Selector::parse(selector).map_err(|e| ProgramError::InvalidSelector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

fn compile_optional_selector(selector: Option<String>) -> Result<Option<Selector>, ProgramError> {
    selector.as_deref().map(compile_selector).transpose()
}

fn compile_regex(pattern: &str, size_limit: usize) -> Result<Regex, ProgramError> {
    RegexBuilder::new(pattern)
        .size_limit(size_limit)
        .build()
        .map_err(|e| match e {
            regex::Error::CompiledTooBig(limit) => {
                ProgramError::ResourceLimit(format!("regex '{}' exceeds {} bytes", pattern, limit))
            }
            other => ProgramError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: other.to_string(),
            },
        })
}

fn check_group(regex: &Regex, group: &GroupRef, context: &str) -> Result<(), ProgramError> {
    let known = match group {
        GroupRef::Index(index) => *index < regex.captures_len(),
        GroupRef::Name(name) => regex.capture_names().flatten().any(|n| n == name),
    };
    if known {
        Ok(())
    } else {
        Err(ProgramError::Invalid(format!(
            "{} references capture group {:?} but pattern '{}' does not define it",
            context,
            group,
            regex.as_str()
        )))
    }
}

fn compile_source(
    field: &str,
    source: Source,
    scope: &CompiledScope,
) -> Result<CompiledSource, ProgramError> {
    let compiled = match source {
        Source::Text { selector, all } => CompiledSource::Text {
            selector: compile_optional_selector(selector)?,
            all,
        },
        Source::Attr {
            name,
            selector,
            all,
        } => CompiledSource::Attr {
            name,
            selector: compile_optional_selector(selector)?,
            all,
        },
        Source::Html { selector, all } => CompiledSource::Html {
            selector: compile_optional_selector(selector)?,
            all,
        },
        Source::Match => match scope {
            CompiledScope::Matches { .. } => CompiledSource::Match,
            _ => {
                return Err(ProgramError::Invalid(format!(
                    "field '{}' uses 'match' outside a 'matches' scope",
                    field
                )))
            }
        },
        Source::Group { group } => match scope {
            CompiledScope::Matches { regex, .. } => {
                check_group(regex, &group, &format!("field '{}'", field))?;
                CompiledSource::Group(group)
            }
            _ => {
                return Err(ProgramError::Invalid(format!(
                    "field '{}' uses 'group' outside a 'matches' scope",
                    field
                )))
            }
        },
        Source::Const { value } => CompiledSource::Const(value),
    };
    Ok(compiled)
}

fn compile_transform(
    field: &str,
    transform: Transform,
    size_limit: usize,
) -> Result<CompiledTransform, ProgramError> {
    let compiled = match transform {
        Transform::Trim => CompiledTransform::Trim,
        Transform::Lowercase => CompiledTransform::Lowercase,
        Transform::Uppercase => CompiledTransform::Uppercase,
        Transform::Replace { pattern, with } => CompiledTransform::Replace {
            regex: compile_regex(&pattern, size_limit)?,
            with,
        },
        Transform::Capture { pattern, group } => {
            let regex = compile_regex(&pattern, size_limit)?;
            check_group(&regex, &group, &format!("capture in field '{}'", field))?;
            CompiledTransform::Capture { regex, group }
        }
        Transform::Join { separator } => CompiledTransform::Join(separator),
        Transform::First => CompiledTransform::First,
        Transform::Number => CompiledTransform::Number,
        Transform::Default { value } => CompiledTransform::Default(value),
    };
    Ok(compiled)
}

/// 写进生成提示里的语言说明
pub const LANGUAGE_REFERENCE: &str = r#"An extraction program is one JSON object:
{
  "for_each": <scope>,              // optional, defaults to {"kind": "document"}
  "fields": { "<name>": {"from": <source>, "pipe": [<transform>, ...]}, ... },
  "require": ["<name>", ...],       // optional: drop records where these fields are empty
  "limit": <positive integer>       // optional: stop after this many records
}
Scopes (one record is produced per scope item):
  {"kind": "document"}                                   the whole page, one record
  {"kind": "select", "selector": "<css>"}                one record per matching element
  {"kind": "matches", "pattern": "<regex>", "source": "text" | "html"}
                                                         one record per regex match over the
                                                         visible page text (default) or raw HTML
Sources:
  {"kind": "text", "selector": "<css>", "all": false}    visible text of the first match inside the
                                                         scope element (no selector: the element itself,
                                                         or the whole match in a matches scope)
  {"kind": "attr", "name": "href", "selector": "<css>"}  attribute value
  {"kind": "html", "selector": "<css>"}                  outer HTML
  {"kind": "match"}                                      whole regex match (matches scope only)
  {"kind": "group", "group": 1 | "name"}                 capture group (matches scope only)
  {"kind": "const", "value": <json scalar>}              literal value
  "all": true collects every match as a list; lists must be reduced with "join" or "first".
  Inside a matches scope, selectors are evaluated against the whole document.
Transforms, applied in order:
  {"op": "trim"} {"op": "lowercase"} {"op": "uppercase"}
  {"op": "replace", "pattern": "<regex>", "with": "<text>"}
  {"op": "capture", "pattern": "<regex>", "group": 1}
  {"op": "join", "separator": ", "} {"op": "first"} {"op": "number"}
  {"op": "default", "value": <json scalar>}
A field may chain at most 16 transforms.
Regexes use Rust regex syntax (no look-around, no backreferences).
Every field must end up as a string, number, boolean or null."#;
