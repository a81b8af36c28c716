// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 提取程序沙箱
//!
//! 程序只接收页面内容作为输入，只能使用 HTML 解析和正则两种能力，
//! 在阻塞线程上以硬性时间预算运行。

pub mod interpreter;
pub mod program;

use async_trait::async_trait;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::config::settings::SandboxSettings;
use crate::domain::models::execution_outcome::{ExecutionFailure, ExecutionOutcome, FailureKind};
use crate::domain::models::generated_code::GeneratedCode;
use crate::domain::models::Record;
use interpreter::{Budget, OutputLimits};
use program::{Program, ProgramError};

/// 沙箱接口
#[async_trait]
pub trait Sandbox: Send + Sync {
    /// 对内容执行生成的程序并分类结果
    async fn execute(&self, code: &GeneratedCode, content: &str) -> ExecutionOutcome;
}

/// 沙箱资源上限
#[derive(Debug, Clone, Copy)]
pub struct SandboxLimits {
    pub timeout: Duration,
    pub max_operations: u64,
    pub max_records: usize,
    pub max_output_bytes: usize,
    pub regex_size_limit: usize,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(5000),
            max_operations: 5_000_000,
            max_records: 10_000,
            max_output_bytes: 16 * 1024 * 1024,
            regex_size_limit: 1024 * 1024,
        }
    }
}

impl From<&SandboxSettings> for SandboxLimits {
    fn from(settings: &SandboxSettings) -> Self {
        Self {
            timeout: Duration::from_millis(settings.timeout_ms),
            max_operations: settings.max_operations,
            max_records: settings.max_records,
            max_output_bytes: settings.max_output_bytes,
            regex_size_limit: settings.regex_size_limit,
        }
    }
}

/// 解释执行提取程序的沙箱
#[derive(Debug, Clone, Default)]
pub struct ProgramSandbox {
    limits: SandboxLimits,
}

impl ProgramSandbox {
    pub fn new(limits: SandboxLimits) -> Self {
        Self { limits }
    }

    fn run_blocking(
        source: &str,
        content: &str,
        limits: SandboxLimits,
        deadline: Instant,
    ) -> Result<Vec<Record>, ProgramError> {
        let program = Program::parse(source)?.compile(limits.regex_size_limit)?;
        let mut budget = Budget::new(deadline, limits.max_operations);
        let records = interpreter::run(
            &program,
            content,
            &mut budget,
            OutputLimits {
                max_records: limits.max_records,
                max_output_bytes: limits.max_output_bytes,
            },
        )?;
        debug!(
            operations = budget.operations(),
            records = records.len(),
            "Program finished"
        );
        Ok(records)
    }
}

#[async_trait]
impl Sandbox for ProgramSandbox {
    async fn execute(&self, code: &GeneratedCode, content: &str) -> ExecutionOutcome {
        let limits = self.limits;
        let source = code.source().to_string();
        let content = content.to_string();
        let deadline = Instant::now() + limits.timeout;

        let handle = tokio::task::spawn_blocking(move || {
            Self::run_blocking(&source, &content, limits, deadline)
        });

        match tokio::time::timeout(limits.timeout, handle).await {
            Err(_) => {
                // The worker notices the same deadline through its budget and stops on its own.
                warn!(
                    attempt = code.attempt_index(),
                    timeout_ms = limits.timeout.as_millis() as u64,
                    "Program exceeded its time budget"
                );
                ExecutionOutcome::failure(
                    FailureKind::Timeout,
                    format!(
                        "execution did not finish within {} ms",
                        limits.timeout.as_millis()
                    ),
                )
            }
            Ok(Err(join_error)) => {
                warn!(error = %join_error, "Program worker failed");
                let detail = if join_error.is_panic() {
                    "the interpreter aborted while running the program".to_string()
                } else {
                    format!("the program worker was cancelled: {}", join_error)
                };
                ExecutionOutcome::failure(FailureKind::RuntimeError, detail)
            }
            Ok(Ok(Err(error))) => classify_error(error),
            Ok(Ok(Ok(records))) => coerce_records(records),
        }
    }
}

fn classify_error(error: ProgramError) -> ExecutionOutcome {
    let kind = match error {
        ProgramError::DeadlineExceeded | ProgramError::OperationLimit(_) => FailureKind::Timeout,
        _ => FailureKind::RuntimeError,
    };
    ExecutionOutcome::failure(kind, error.to_string())
}

/// 把程序输出归类为成功或失败
///
/// 全空记录先被丢弃；没有记录剩下时为 `empty_result`，含列表或对象值时为 `malformed_output`。
pub fn coerce_records(records: Vec<Record>) -> ExecutionOutcome {
    let records: Vec<Record> = records
        .into_iter()
        .filter(|record| !record.values().all(interpreter::is_blank))
        .collect();

    if records.is_empty() {
        return ExecutionOutcome::Failure(ExecutionFailure::empty_result());
    }

    for (index, record) in records.iter().enumerate() {
        for (field, value) in record {
            if matches!(value, Value::Array(_) | Value::Object(_)) {
                return ExecutionOutcome::failure(
                    FailureKind::MalformedOutput,
                    format!(
                        "record {} field '{}' holds a {}, expected a single text, number, boolean or null",
                        index,
                        field,
                        if value.is_array() { "list" } else { "object" }
                    ),
                );
            }
        }
    }

    ExecutionOutcome::Success { records }
}
