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

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::domain::models::scrape_request::{OutputFormat, ScrapeRequest, ScrapeRequestError};

/// 抓取请求数据传输对象
///
/// `POST /scrape` 的请求体
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct ScrapeRequestDto {
    /// 目标网页 URL，缺少协议时补全为 https
    #[validate(length(min = 1, max = 2048, message = "URL cannot be empty"))]
    pub url: String,
    /// 自然语言提取指令
    #[validate(length(min = 1, max = 4000, message = "Prompt cannot be empty"))]
    pub prompt: String,
    /// 输出格式：json 或 csv，默认 json
    #[serde(default)]
    pub format: Option<String>,
}

impl ScrapeRequestDto {
    /// 转换为领域请求
    ///
    /// `forced_format` 用于 `/scrape/csv`，覆盖请求体中的格式
    pub fn to_domain(
        &self,
        forced_format: Option<OutputFormat>,
    ) -> Result<ScrapeRequest, ScrapeRequestError> {
        let format = match (forced_format, self.format.as_deref()) {
            (Some(format), _) => format,
            (None, Some(raw)) => raw.parse()?,
            (None, None) => OutputFormat::default(),
        };
        ScrapeRequest::new(&self.url, &self.prompt, format)
    }
}
