// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域模型模块
///
/// 单次抓取请求生命周期内创建、在响应返回时丢弃的全部实体
pub mod execution_outcome;
pub mod fetch_result;
pub mod generated_code;
pub mod scrape_request;
pub mod scrape_result;

/// 一条提取记录：字段名到标量值的扁平映射，保持字段的插入顺序
pub type Record = serde_json::Map<String, serde_json::Value>;
