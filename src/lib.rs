// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 应用程序模块
///
/// 包含抓取用例、请求/响应 DTO 和 CSV 导出
pub mod application;

/// 配置模块
///
/// 处理应用程序的配置设置和环境变量
pub mod config;

/// 领域模块
///
/// 包含核心业务实体和修复循环
pub mod domain;

/// 引擎模块
///
/// 实现静态和动态页面获取以及站点模式选择
pub mod engines;

/// 基础设施模块
///
/// 提供指标导出等外部集成
pub mod infrastructure;

/// 表示层模块
///
/// 处理HTTP请求和响应，包括路由和处理器
pub mod presentation;

/// 沙箱模块
///
/// 解析并在资源限制下执行生成的提取程序
pub mod sandbox;

/// 工具模块
///
/// 提供错误类型、文本处理和日志初始化
pub mod utils;
