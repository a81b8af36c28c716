// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 模型生成的提取程序
///
/// 一经创建不可修改。每次修复尝试都会产生新的实例，旧实例只作为修复提示的上下文保留。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedCode {
    source: String,
    attempt_index: u32,
}

impl GeneratedCode {
    pub fn new(source: impl Into<String>, attempt_index: u32) -> Self {
        Self {
            source: source.into(),
            attempt_index,
        }
    }

    /// 程序源码
    pub fn source(&self) -> &str {
        &self.source
    }

    /// 第几次尝试（从 0 开始）
    pub fn attempt_index(&self) -> u32 {
        self.attempt_index
    }
}
