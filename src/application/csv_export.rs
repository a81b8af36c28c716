// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde_json::Value;

use crate::domain::models::Record;
use crate::utils::errors::FormatError;

/// 把规范化后的记录写成 CSV
///
/// 第一行是列名；记录缺少的列写空字符串，null 也写空字符串。
pub fn to_csv(records: &[Record], columns: &[String]) -> Result<String, FormatError> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer
        .write_record(columns)
        .map_err(|e| FormatError::Csv(e.to_string()))?;

    for record in records {
        let row = columns.iter().map(|column| match record.get(column) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(text)) => text.clone(),
            Some(other) => other.to_string(),
        });
        writer
            .write_record(row)
            .map_err(|e| FormatError::Csv(e.to_string()))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| FormatError::Csv(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| FormatError::Csv(e.to_string()))
}

/// 下载文件名
pub fn csv_filename(now: chrono::DateTime<chrono::Local>) -> String {
    format!("scraped_data_{}.csv", now.format("%Y%m%d_%H%M%S"))
}
