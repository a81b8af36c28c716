// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 应用程序模块
///
/// 请求/响应数据传输对象、CSV 导出和抓取用例
pub mod csv_export;
pub mod dto;
pub mod usecases;
