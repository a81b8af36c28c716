// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::time::Duration;
use thiserror::Error;

use crate::domain::models::execution_outcome::FailureKind;
use crate::domain::models::fetch_result::FetchMode;

/// 页面抓取错误
///
/// 网络失败、超时或非成功状态码。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{mode} fetch failed{}: {cause}", status_suffix(.status))]
pub struct FetchError {
    pub mode: FetchMode,
    pub status: Option<u16>,
    pub cause: String,
}

fn status_suffix(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (HTTP {})", code),
        None => String::new(),
    }
}

impl FetchError {
    pub fn new(mode: FetchMode, status: Option<u16>, cause: impl Into<String>) -> Self {
        Self {
            mode,
            status,
            cause: cause.into(),
        }
    }

    /// 静态和动态两种模式都失败时的合并错误
    pub fn exhausted(static_error: &FetchError, dynamic_error: &FetchError) -> Self {
        Self {
            mode: FetchMode::Dynamic,
            status: dynamic_error.status.or(static_error.status),
            cause: format!(
                "static and dynamic fetches both failed; static: {}; dynamic: {}",
                static_error, dynamic_error
            ),
        }
    }
}

/// 模型调用错误
///
/// 与提取失败不同，不经过修复路径重试。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("LLM API key not configured")]
    MissingCredential,
    #[error("Failed to send request to LLM API: {0}")]
    Transport(String),
    #[error("LLM API returned error: {status} - {body}")]
    Api { status: u16, body: String },
    #[error("Invalid response format from LLM API: {0}")]
    InvalidResponse(String),
}

/// 结果规范化错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("record {index} field '{field}' holds a nested value that cannot become a column")]
    Nested { index: usize, field: String },
    #[error("record {index} has an empty field name")]
    EmptyKey { index: usize },
    #[error("failed to write CSV: {0}")]
    Csv(String),
}

/// 抓取流程的终止错误
///
/// 所有致命错误最终都以 `success=false` 和这里的可读信息返回给调用方。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScrapeError {
    #[error("Failed to fetch page: {0}")]
    Fetch(#[from] FetchError),
    #[error("Failed to generate extraction code: {0}")]
    Model(#[from] ModelError),
    /// 错误信息即最后一次失败的详情
    #[error("{detail}")]
    ExecutionExhausted {
        attempts: u32,
        kind: FailureKind,
        detail: String,
    },
    #[error("Failed to format results: {0}")]
    Format(#[from] FormatError),
    #[error("Request cancelled")]
    Cancelled,
    #[error("Request timed out after {0:?}")]
    DeadlineExceeded(Duration),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ScrapeError {
    /// 指标标签
    pub fn label(&self) -> &'static str {
        match self {
            ScrapeError::Fetch(_) => "fetch_error",
            ScrapeError::Model(_) => "model_error",
            ScrapeError::ExecutionExhausted { .. } => "attempts_exhausted",
            ScrapeError::Format(_) => "format_error",
            ScrapeError::Cancelled => "cancelled",
            ScrapeError::DeadlineExceeded(_) => "deadline_exceeded",
            ScrapeError::Internal(_) => "internal_error",
        }
    }
}
