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

use crate::domain::models::fetch_result::FetchMode;
use crate::engines::traits::{EngineError, FetchRequest, FetchResponse, ScraperEngine};
use crate::engines::validators;
use async_trait::async_trait;
use encoding_rs::{Encoding, UTF_8};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, LOCATION};
use std::future::Future;
use std::time::{Duration, Instant};
use url::Url;

/// 最多跟随的重定向次数
const MAX_REDIRECTS: usize = 10;

/// 抓取引擎
///
/// 基于reqwest实现的静态HTTP抓取引擎，不执行页面脚本
pub struct ReqwestEngine;

impl ReqwestEngine {
    fn default_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
        headers
    }
}

#[async_trait]
impl ScraperEngine for ReqwestEngine {
    /// 执行HTTP抓取
    ///
    /// # 参数
    ///
    /// * `request` - 抓取请求
    ///
    /// # 返回值
    ///
    /// * `Ok(FetchResponse)` - 抓取响应（包括非 2xx 状态）
    /// * `Err(EngineError)` - 网络错误、超时、SSRF 拒绝或响应体过大
    async fn scrape(&self, request: &FetchRequest) -> Result<FetchResponse, EngineError> {
        // Each request gets a fresh client for cookie isolation.
        // Redirects are followed by hand so every hop passes the SSRF check.
        let client = reqwest::Client::builder()
            .user_agent(request.user_agent.as_str())
            .default_headers(Self::default_headers())
            .timeout(request.timeout)
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        let start = Instant::now();
        let allow_private_networks = request.allow_private_networks;
        let mut response = send_guarded(&client, &request.url, request.timeout, |url| async move {
            validators::validate_url(&url, allow_private_networks).await
        })
        .await?;

        let status_code = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.trim().is_empty())
            .unwrap_or("text/html")
            .to_string();

        if let Some(length) = response.content_length() {
            if length as usize > request.max_content_bytes {
                return Err(EngineError::TooLarge {
                    limit: request.max_content_bytes,
                });
            }
        }

        let mut body: Vec<u8> = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if body.len() + chunk.len() > request.max_content_bytes {
                return Err(EngineError::TooLarge {
                    limit: request.max_content_bytes,
                });
            }
            body.extend_from_slice(&chunk);
        }

        let content = decode_body(&body, &content_type);

        Ok(FetchResponse {
            status_code,
            content,
            content_type,
            response_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    fn mode(&self) -> FetchMode {
        FetchMode::Static
    }

    /// 获取引擎名称
    fn name(&self) -> &'static str {
        "reqwest"
    }
}

/// 发送 GET 请求并跟随重定向
///
/// 每一跳（包括起始 URL）在发出前都要通过 `guard`。
///
/// # 参数
///
/// * `client` - 已禁用自动重定向的客户端
/// * `start` - 起始 URL
/// * `timeout` - 单次请求超时，用于错误映射
/// * `guard` - 目标检查
async fn send_guarded<G, Fut>(
    client: &reqwest::Client,
    start: &Url,
    timeout: Duration,
    guard: G,
) -> Result<reqwest::Response, EngineError>
where
    G: Fn(Url) -> Fut,
    Fut: Future<Output = Result<(), EngineError>>,
{
    let mut url = start.clone();
    for _ in 0..=MAX_REDIRECTS {
        guard(url.clone()).await?;
        let response = client.get(url.clone()).send().await.map_err(|e| {
            if e.is_timeout() {
                EngineError::Timeout(timeout)
            } else {
                EngineError::RequestFailed(e)
            }
        })?;

        if !response.status().is_redirection() {
            return Ok(response);
        }
        let Some(location) = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
        else {
            return Ok(response);
        };
        let next = url.join(location).map_err(|e| {
            EngineError::Other(format!("Invalid redirect location {}: {}", location, e))
        })?;
        tracing::debug!(from = %url, to = %next, "Following redirect");
        url = next;
    }

    Err(EngineError::Other(format!(
        "Stopped after {} redirects",
        MAX_REDIRECTS
    )))
}

/// 按 Content-Type 或 `<meta charset>` 声明解码响应体，默认 UTF-8
fn decode_body(body: &[u8], content_type: &str) -> String {
    let encoding = charset_from_content_type(content_type)
        .or_else(|| charset_from_meta(body))
        .unwrap_or(UTF_8);
    let (text, _, _) = encoding.decode(body);
    text.into_owned()
}

fn charset_from_content_type(content_type: &str) -> Option<&'static Encoding> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if key.trim().eq_ignore_ascii_case("charset") {
            Encoding::for_label(value.trim().trim_matches('"').as_bytes())
        } else {
            None
        }
    })
}

fn charset_from_meta(body: &[u8]) -> Option<&'static Encoding> {
    let head = &body[..body.len().min(1024)];
    let head = String::from_utf8_lossy(head).to_ascii_lowercase();
    let start = head.find("charset=")? + "charset=".len();
    let label: String = head[start..]
        .trim_start_matches(['"', '\''])
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    Encoding::for_label(label.as_bytes())
}

#[cfg(test)]
#[path = "reqwest_engine_test.rs"]
mod tests;
