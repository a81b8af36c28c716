// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use regex::{Captures, Regex};
use scraper::{ElementRef, Html, Selector};
use serde_json::{Number, Value};
use std::time::Instant;

use super::program::{
    CompiledField, CompiledProgram, CompiledScope, CompiledSource, CompiledTransform, GroupRef,
    MatchSource, ProgramError,
};
use crate::domain::models::Record;
use crate::utils::html::{element_visible_text, visible_text};

/// 执行预算：截止时间加操作计数
#[derive(Debug)]
pub struct Budget {
    deadline: Instant,
    max_operations: u64,
    operations: u64,
}

impl Budget {
    pub fn new(deadline: Instant, max_operations: u64) -> Self {
        Self {
            deadline,
            max_operations,
            operations: 0,
        }
    }

    fn tick(&mut self) -> Result<(), ProgramError> {
        self.operations += 1;
        if self.operations > self.max_operations {
            return Err(ProgramError::OperationLimit(self.max_operations));
        }
        if Instant::now() >= self.deadline {
            return Err(ProgramError::DeadlineExceeded);
        }
        Ok(())
    }

    pub fn operations(&self) -> u64 {
        self.operations
    }
}

/// 输出上限
#[derive(Debug, Clone, Copy)]
pub struct OutputLimits {
    pub max_records: usize,
    pub max_output_bytes: usize,
}

/// 求值上下文：作用域元素，或一次正则匹配
enum Context<'d, 'h> {
    Element(ElementRef<'d>),
    Match {
        captures: Captures<'h>,
        root: ElementRef<'d>,
    },
}

impl<'d> Context<'d, '_> {
    /// 选择器的求值起点
    fn base(&self) -> ElementRef<'d> {
        match self {
            Context::Element(element) => *element,
            Context::Match { root, .. } => *root,
        }
    }

    fn match_text(&self) -> Option<&str> {
        match self {
            Context::Match { captures, .. } => captures.get(0).map(|m| m.as_str()),
            Context::Element(_) => None,
        }
    }
}

/// 对页面内容运行编译后的程序
///
/// 返回的记录已经去掉了全空记录，`limit` 只计算保留下来的记录。
pub fn run(
    program: &CompiledProgram,
    content: &str,
    budget: &mut Budget,
    limits: OutputLimits,
) -> Result<Vec<Record>, ProgramError> {
    let document = Html::parse_document(content);
    let root = document.root_element();
    let mut output = Output::new(limits, program.limit);

    match &program.scope {
        CompiledScope::Document => {
            budget.tick()?;
            let record = evaluate(program, &Context::Element(root), budget, limits)?;
            output.offer(program, record)?;
        }
        CompiledScope::Select(selector) => {
            for element in root.select(selector) {
                budget.tick()?;
                let context = Context::Element(element);
                if !output.offer(program, evaluate(program, &context, budget, limits)?)? {
                    break;
                }
            }
        }
        CompiledScope::Matches { regex, source } => {
            let haystack = match source {
                MatchSource::Text => visible_text(&document),
                MatchSource::Html => content.to_string(),
            };
            for captures in regex.captures_iter(&haystack) {
                budget.tick()?;
                let context = Context::Match { captures, root };
                if !output.offer(program, evaluate(program, &context, budget, limits)?)? {
                    break;
                }
            }
        }
    }

    Ok(output.records)
}

/// 收集记录并执行输出上限
struct Output {
    records: Vec<Record>,
    bytes: usize,
    limits: OutputLimits,
    limit: Option<usize>,
}

impl Output {
    fn new(limits: OutputLimits, limit: Option<usize>) -> Self {
        Self {
            records: Vec::new(),
            bytes: 0,
            limits,
            limit,
        }
    }

    /// 返回是否继续迭代
    fn offer(&mut self, program: &CompiledProgram, record: Record) -> Result<bool, ProgramError> {
        let values: Vec<&Value> = record.values().collect();
        if values.iter().all(|v| is_blank(v)) {
            return Ok(true);
        }
        if program.require.iter().any(|&i| is_blank(values[i])) {
            return Ok(true);
        }

        self.bytes += record
            .iter()
            .map(|(k, v)| k.len() + value_size(v))
            .sum::<usize>();
        if self.bytes > self.limits.max_output_bytes {
            return Err(ProgramError::ResourceLimit(format!(
                "output exceeds {} bytes",
                self.limits.max_output_bytes
            )));
        }
        if self.records.len() >= self.limits.max_records {
            return Err(ProgramError::ResourceLimit(format!(
                "more than {} records produced",
                self.limits.max_records
            )));
        }

        self.records.push(record);
        Ok(self.limit.map_or(true, |limit| self.records.len() < limit))
    }
}

fn evaluate(
    program: &CompiledProgram,
    context: &Context<'_, '_>,
    budget: &mut Budget,
    limits: OutputLimits,
) -> Result<Record, ProgramError> {
    let mut record = Record::new();
    for field in &program.fields {
        let value = evaluate_field(field, context, budget, limits.max_output_bytes)?;
        record.insert(field.name.clone(), value);
    }
    Ok(record)
}

/// 求值单个字段
///
/// 每一步变换之后都检查值的大小，中间结果不能超过 `max_bytes`。
fn evaluate_field(
    field: &CompiledField,
    context: &Context<'_, '_>,
    budget: &mut Budget,
    max_bytes: usize,
) -> Result<Value, ProgramError> {
    budget.tick()?;
    let mut value = evaluate_source(&field.source, context, budget, max_bytes)?;
    check_size(&field.name, &value, max_bytes)?;
    for transform in &field.pipe {
        budget.tick()?;
        value = apply_transform(transform, value, budget, max_bytes)?;
        check_size(&field.name, &value, max_bytes)?;
    }
    Ok(value)
}

fn check_size(field: &str, value: &Value, max_bytes: usize) -> Result<(), ProgramError> {
    if value_size(value) > max_bytes {
        return Err(ProgramError::ResourceLimit(format!(
            "field '{}' exceeds {} bytes",
            field, max_bytes
        )));
    }
    Ok(())
}

fn evaluate_source(
    source: &CompiledSource,
    context: &Context<'_, '_>,
    budget: &mut Budget,
    max_bytes: usize,
) -> Result<Value, ProgramError> {
    let value = match source {
        CompiledSource::Text { selector, all } => select_values(
            context,
            selector.as_ref(),
            *all,
            budget,
            max_bytes,
            |el| Some(element_visible_text(el)),
            |ctx| ctx.match_text().map(str::to_string),
        )?,
        CompiledSource::Attr {
            name,
            selector,
            all,
        } => select_values(
            context,
            selector.as_ref(),
            *all,
            budget,
            max_bytes,
            |el| el.value().attr(name).map(str::to_string),
            |_| None,
        )?,
        CompiledSource::Html { selector, all } => select_values(
            context,
            selector.as_ref(),
            *all,
            budget,
            max_bytes,
            |el| Some(el.html()),
            |ctx| ctx.match_text().map(str::to_string),
        )?,
        CompiledSource::Match => context
            .match_text()
            .map(|m| Value::String(m.to_string()))
            .unwrap_or(Value::Null),
        CompiledSource::Group(group) => match context {
            Context::Match { captures, .. } => group_value(captures, group),
            Context::Element(_) => Value::Null,
        },
        CompiledSource::Const(value) => value.clone(),
    };
    Ok(value)
}

/// 按选择器取值
///
/// 没有选择器时取作用域元素本身；在正则作用域中由 `on_match` 决定取值。
fn select_values<'d>(
    context: &Context<'d, '_>,
    selector: Option<&Selector>,
    all: bool,
    budget: &mut Budget,
    max_bytes: usize,
    extract: impl Fn(ElementRef<'d>) -> Option<String>,
    on_match: impl Fn(&Context<'d, '_>) -> Option<String>,
) -> Result<Value, ProgramError> {
    let to_value = |s: Option<String>| s.map(Value::String).unwrap_or(Value::Null);

    let Some(selector) = selector else {
        let single = match context {
            Context::Element(element) => extract(*element),
            Context::Match { .. } => on_match(context),
        };
        return Ok(if all {
            Value::Array(single.map(Value::String).into_iter().collect())
        } else {
            to_value(single)
        });
    };

    let base = context.base();
    if all {
        let mut values = Vec::new();
        let mut bytes = 0;
        for element in base.select(selector) {
            budget.tick()?;
            if let Some(v) = extract(element) {
                bytes += v.len();
                if bytes > max_bytes {
                    return Err(ProgramError::ResourceLimit(format!(
                        "selected values exceed {} bytes",
                        max_bytes
                    )));
                }
                values.push(Value::String(v));
            }
        }
        Ok(Value::Array(values))
    } else {
        budget.tick()?;
        Ok(to_value(base.select(selector).next().and_then(extract)))
    }
}

fn group_value(captures: &Captures<'_>, group: &GroupRef) -> Value {
    let found = match group {
        GroupRef::Index(index) => captures.get(*index),
        GroupRef::Name(name) => captures.name(name),
    };
    found
        .map(|m| Value::String(m.as_str().to_string()))
        .unwrap_or(Value::Null)
}

fn apply_transform(
    transform: &CompiledTransform,
    value: Value,
    budget: &mut Budget,
    max_bytes: usize,
) -> Result<Value, ProgramError> {
    Ok(match transform {
        CompiledTransform::Trim => map_strings(value, |s| Value::String(s.trim().to_string())),
        CompiledTransform::Lowercase => map_strings(value, |s| Value::String(s.to_lowercase())),
        CompiledTransform::Uppercase => map_strings(value, |s| Value::String(s.to_uppercase())),
        CompiledTransform::Replace { regex, with } => {
            return try_map_strings(value, |s| {
                replace_bounded(regex, with, s, budget, max_bytes).map(Value::String)
            });
        }
        CompiledTransform::Capture { regex, group } => map_strings(value, |s| {
            regex
                .captures(s)
                .map(|c| group_value(&c, group))
                .unwrap_or(Value::Null)
        }),
        CompiledTransform::Join(separator) => match value {
            Value::Array(items) => Value::String(
                items
                    .iter()
                    .filter(|v| !is_blank(v))
                    .map(scalar_text)
                    .collect::<Vec<_>>()
                    .join(separator),
            ),
            other => other,
        },
        CompiledTransform::First => match value {
            Value::Array(items) => items.into_iter().next().unwrap_or(Value::Null),
            other => other,
        },
        CompiledTransform::Number => map_strings(value, parse_number),
        CompiledTransform::Default(default) => {
            if is_blank(&value) {
                default.clone()
            } else {
                value
            }
        }
    })
}

/// 逐个匹配替换，结果超过 `max_bytes` 时立即停止
fn replace_bounded(
    regex: &Regex,
    with: &str,
    text: &str,
    budget: &mut Budget,
    max_bytes: usize,
) -> Result<String, ProgramError> {
    let mut out = String::with_capacity(text.len().min(max_bytes));
    let mut last = 0;
    for captures in regex.captures_iter(text) {
        budget.tick()?;
        let Some(whole) = captures.get(0) else {
            continue;
        };
        out.push_str(&text[last..whole.start()]);
        captures.expand(with, &mut out);
        last = whole.end();
        if out.len() > max_bytes {
            return Err(ProgramError::ResourceLimit(format!(
                "replace output exceeds {} bytes",
                max_bytes
            )));
        }
    }
    out.push_str(&text[last..]);
    Ok(out)
}

fn try_map_strings(
    value: Value,
    mut f: impl FnMut(&str) -> Result<Value, ProgramError>,
) -> Result<Value, ProgramError> {
    match value {
        Value::String(s) => f(&s),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => f(&s),
                other => Ok(other),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        other => Ok(other),
    }
}

/// 对字符串（或字符串列表中的每一项）应用变换
fn map_strings(value: Value, f: impl Fn(&str) -> Value) -> Value {
    match value {
        Value::String(s) => f(&s),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| match item {
                    Value::String(s) => f(&s),
                    other => other,
                })
                .collect(),
        ),
        other => other,
    }
}

/// 从文本中解析数字，忽略货币符号和千位分隔符
fn parse_number(text: &str) -> Value {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    if let Ok(integer) = cleaned.parse::<i64>() {
        return Value::Number(integer.into());
    }
    cleaned
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub(crate) fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.iter().all(is_blank),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn value_size(value: &Value) -> usize {
    match value {
        Value::String(s) => s.len(),
        Value::Array(items) => items.iter().map(value_size).sum(),
        _ => 8,
    }
}

#[cfg(test)]
#[path = "interpreter_test.rs"]
mod tests;
