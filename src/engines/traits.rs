// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::domain::models::fetch_result::{FetchMode, FetchResult};
use crate::utils::errors::FetchError;

/// 引擎错误类型
#[derive(Error, Debug)]
pub enum EngineError {
    /// 请求失败
    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    /// 超时
    #[error("Timeout after {0:?}")]
    Timeout(Duration),
    /// 目标地址被 SSRF 防护拒绝
    #[error("SSRF protection: {0}")]
    Blocked(String),
    /// 响应体超过上限
    #[error("Response body exceeds {limit} bytes")]
    TooLarge { limit: usize },
    /// 浏览器错误
    #[error("Browser error: {0}")]
    Browser(String),
    /// 其他错误
    #[error("Other error: {0}")]
    Other(String),
}

impl EngineError {
    /// 错误中携带的 HTTP 状态码
    pub fn status(&self) -> Option<u16> {
        match self {
            EngineError::RequestFailed(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// 抓取请求
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// 目标URL
    pub url: Url,
    /// 超时时间
    pub timeout: Duration,
    /// User-Agent
    pub user_agent: String,
    /// 响应体大小上限（字节）
    pub max_content_bytes: usize,
    /// 是否允许访问私有网络地址
    pub allow_private_networks: bool,
}

/// 抓取响应
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// HTTP状态码
    pub status_code: u16,
    /// 响应内容
    pub content: String,
    /// 内容类型
    pub content_type: String,
    /// 响应时间（毫秒）
    pub response_time_ms: u64,
}

/// 抓取引擎特质
#[async_trait]
pub trait ScraperEngine: Send + Sync {
    /// 执行抓取
    async fn scrape(&self, request: &FetchRequest) -> Result<FetchResponse, EngineError>;

    /// 引擎对应的抓取模式
    fn mode(&self) -> FetchMode;

    /// 引擎名称
    fn name(&self) -> &'static str;
}

/// 页面来源
///
/// 给修复循环提供页面内容，内部决定使用静态还是动态抓取。
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn acquire(&self, url: &Url) -> Result<FetchResult, FetchError>;
}
