// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域层模块
///
/// 该模块包含系统的核心业务逻辑，包括：
/// - 领域模型（models）：请求、抓取结果、生成的提取程序和执行结果
/// - 服务（services）：代码生成、结果规范化以及生成-执行-修复循环
///
/// 领域层只通过 trait 依赖抓取引擎、语言模型和沙箱，
/// 不依赖任何具体实现。
pub mod models;
pub mod services;
