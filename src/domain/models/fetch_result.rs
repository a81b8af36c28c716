// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// 抓取模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMode {
    /// 直接 HTTP 请求，不执行页面脚本
    Static,
    /// 无头浏览器渲染
    Dynamic,
}

impl FetchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchMode::Static => "static",
            FetchMode::Dynamic => "dynamic",
        }
    }
}

impl fmt::Display for FetchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 抓取结果
///
/// 由抓取阶段独占创建，之后按值向下游传递，不再修改。
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResult {
    /// 页面原始内容（HTML/文本）
    pub content: String,
    /// 实际使用的抓取模式
    pub mode: FetchMode,
    /// 抓取耗时
    pub fetch_time: Duration,
}
