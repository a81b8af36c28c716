// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::Record;

/// 执行失败类型
///
/// 细分失败类型是为了让修复提示对模型有针对性。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// 超出执行时间预算
    Timeout,
    /// 程序无法解析或运行时出错
    RuntimeError,
    /// 执行完成但没有产生任何记录
    EmptyResult,
    /// 返回值无法转换为扁平记录序列
    MalformedOutput,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Timeout => "timeout",
            FailureKind::RuntimeError => "runtime_error",
            FailureKind::EmptyResult => "empty_result",
            FailureKind::MalformedOutput => "malformed_output",
        }
    }

    /// 写给模型看的修复建议
    pub fn repair_hint(&self) -> &'static str {
        match self {
            FailureKind::Timeout => {
                "The program exceeded its execution time budget. Use narrower selectors, \
                 fewer fields or simpler patterns."
            }
            FailureKind::RuntimeError => {
                "The program could not be run. Fix the error described below; check JSON \
                 syntax, CSS selector syntax, regex syntax and capture group references."
            }
            FailureKind::EmptyResult => {
                "The program ran but produced no records. The selectors or patterns do not \
                 match this page; study the content sample again and target elements that \
                 actually exist."
            }
            FailureKind::MalformedOutput => {
                "The program output could not be used as flat records. Every field must \
                 produce a single text, number, boolean or null; add a join or first \
                 transform to fields that collect several values."
            }
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 一次执行失败
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionFailure {
    pub kind: FailureKind,
    pub detail: String,
}

impl ExecutionFailure {
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn empty_result() -> Self {
        Self::new(
            FailureKind::EmptyResult,
            "No results extracted: the program completed without producing any non-empty record",
        )
    }

    /// 给模型看的失败描述
    pub fn describe(&self) -> String {
        format!("{} ({})\n{}", self.kind.repair_hint(), self.kind, self.detail)
    }
}

impl fmt::Display for ExecutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.detail)
    }
}

/// 沙箱执行结果，两个分支恰有一个成立
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Success { records: Vec<Record> },
    Failure(ExecutionFailure),
}

impl ExecutionOutcome {
    pub fn failure(kind: FailureKind, detail: impl Into<String>) -> Self {
        ExecutionOutcome::Failure(ExecutionFailure::new(kind, detail))
    }

    pub fn as_failure(&self) -> Option<&ExecutionFailure> {
        match self {
            ExecutionOutcome::Failure(failure) => Some(failure),
            ExecutionOutcome::Success { .. } => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionOutcome::Success { .. })
    }
}
