// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::time::Duration;

use super::Record;
use crate::domain::services::result_normalizer::NormalizedRecords;
use crate::utils::errors::ScrapeError;

/// 抓取最终结果
///
/// 在修复循环结束时创建一次，返回给调用方后不再修改。
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapeResult {
    pub success: bool,
    pub data: Vec<Record>,
    pub execution_time: Duration,
    pub total_results: usize,
    pub error: Option<String>,
    /// CSV 格式时的列顺序
    pub columns: Option<Vec<String>>,
}

impl ScrapeResult {
    pub fn succeeded(normalized: NormalizedRecords, execution_time: Duration) -> Self {
        Self {
            success: true,
            total_results: normalized.total_results,
            data: normalized.records,
            execution_time,
            error: None,
            columns: normalized.columns,
        }
    }

    pub fn failed(error: &ScrapeError, execution_time: Duration) -> Self {
        Self {
            success: false,
            data: Vec::new(),
            execution_time,
            total_results: 0,
            error: Some(error.to_string()),
            columns: None,
        }
    }
}
