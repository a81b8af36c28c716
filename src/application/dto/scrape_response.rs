// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};

use crate::domain::models::scrape_result::ScrapeResult;
use crate::domain::models::Record;

/// 抓取响应数据传输对象
///
/// 成功和失败共用同一个结构；失败时 `data` 为空并带有 `error`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ScrapeResponseDto {
    /// 请求处理是否成功
    pub success: bool,
    /// 提取出的记录
    pub data: Vec<Record>,
    /// 总耗时（秒）
    pub execution_time: f64,
    /// 记录条数
    pub total_results: usize,
    /// 失败原因
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// CSV 格式时的列顺序
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
}

impl ScrapeResponseDto {
    /// 请求未通过校验时的响应
    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: Vec::new(),
            execution_time: 0.0,
            total_results: 0,
            error: Some(error.into()),
            columns: None,
        }
    }
}

impl From<ScrapeResult> for ScrapeResponseDto {
    fn from(result: ScrapeResult) -> Self {
        Self {
            success: result.success,
            data: result.data,
            execution_time: result.execution_time.as_secs_f64(),
            total_results: result.total_results,
            error: result.error,
            columns: result.columns,
        }
    }
}
