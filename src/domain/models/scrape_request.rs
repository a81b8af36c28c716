// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use url::Url;

/// 输出格式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// JSON 记录数组
    #[default]
    Json,
    /// CSV（需要稳定的列顺序）
    Csv,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = ScrapeRequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            other => Err(ScrapeRequestError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// 请求校验错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScrapeRequestError {
    #[error("invalid url '{0}': {1}")]
    InvalidUrl(String, String),
    #[error("invalid url scheme '{0}': only http and https are supported")]
    UnsupportedScheme(String),
    #[error("prompt cannot be empty")]
    EmptyPrompt,
    #[error("invalid format '{0}': expected json or csv")]
    UnsupportedFormat(String),
}

/// 抓取请求
///
/// 构造时保证 `url` 是合法的 http(s) 绝对地址、`prompt` 非空。
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapeRequest {
    pub url: Url,
    pub prompt: String,
    pub format: OutputFormat,
}

impl ScrapeRequest {
    /// 校验并创建抓取请求
    ///
    /// 没有协议前缀的地址会补上 `https://`。
    pub fn new(url: &str, prompt: &str, format: OutputFormat) -> Result<Self, ScrapeRequestError> {
        let url = url.trim();
        let candidate = if url.contains("://") {
            url.to_string()
        } else {
            format!("https://{}", url)
        };

        let parsed = Url::parse(&candidate)
            .map_err(|e| ScrapeRequestError::InvalidUrl(url.to_string(), e.to_string()))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(ScrapeRequestError::UnsupportedScheme(
                parsed.scheme().to_string(),
            ));
        }
        if !matches!(parsed.host_str(), Some(host) if !host.is_empty()) {
            return Err(ScrapeRequestError::InvalidUrl(
                url.to_string(),
                "missing host".to_string(),
            ));
        }

        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(ScrapeRequestError::EmptyPrompt);
        }

        Ok(Self {
            url: parsed,
            prompt: prompt.to_string(),
            format,
        })
    }
}
