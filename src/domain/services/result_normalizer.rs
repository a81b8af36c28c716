// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde_json::Value;

use crate::domain::models::scrape_request::OutputFormat;
use crate::domain::models::Record;
use crate::utils::errors::FormatError;
use crate::utils::html::collapse_whitespace;

/// 规范化后的记录
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecords {
    pub records: Vec<Record>,
    pub total_results: usize,
    /// 仅 CSV 格式：按首次出现顺序排列的列名
    pub columns: Option<Vec<String>>,
}

/// 结果规范化器
///
/// 保证每条记录都是字符串键到标量值的扁平映射。不去重，重复记录按原顺序保留。
/// 对已经规范化的结果再次规范化得到相同结果。
#[derive(Debug, Default, Clone, Copy)]
pub struct ResultNormalizer;

impl ResultNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// 规范化记录
    ///
    /// # 参数
    /// * `records` - 沙箱返回的原始记录
    /// * `format` - 输出格式，CSV 时额外推导列顺序
    ///
    /// # 错误
    /// * 字段值为数组或对象时返回 `FormatError::Nested`
    /// * 字段名为空时返回 `FormatError::EmptyKey`
    pub fn normalize(
        &self,
        records: Vec<Record>,
        format: OutputFormat,
    ) -> Result<NormalizedRecords, FormatError> {
        let mut normalized = Vec::with_capacity(records.len());

        for (index, record) in records.into_iter().enumerate() {
            let mut flat = Record::new();
            for (field, value) in record {
                if field.trim().is_empty() {
                    return Err(FormatError::EmptyKey { index });
                }
                let value = match value {
                    Value::String(text) => Value::String(collapse_whitespace(&text)),
                    Value::Array(_) | Value::Object(_) => {
                        return Err(FormatError::Nested { index, field });
                    }
                    scalar => scalar,
                };
                flat.insert(field, value);
            }
            normalized.push(flat);
        }

        let columns = match format {
            OutputFormat::Csv => Some(column_order(&normalized)),
            OutputFormat::Json => None,
        };

        Ok(NormalizedRecords {
            total_results: normalized.len(),
            records: normalized,
            columns,
        })
    }
}

/// 所有记录键的并集，按首次出现顺序
fn column_order(records: &[Record]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for record in records {
        for key in record.keys() {
            if !columns.iter().any(|c| c == key) {
                columns.push(key.clone());
            }
        }
    }
    columns
}
