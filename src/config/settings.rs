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

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

use crate::engines::page_fetcher::default_user_agent;

/// 应用程序配置设置
///
/// 进程启动时加载一次，之后在整个进程生命周期内只读
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// 服务器配置
    pub server: ServerSettings,
    /// 语言模型配置
    pub llm: LlmSettings,
    /// 修复循环配置
    pub scraper: ScraperSettings,
    /// 页面抓取配置
    pub fetch: FetchSettings,
    /// 站点模式判定阈值
    pub site_mode: SiteModeSettings,
    /// 沙箱资源上限
    pub sandbox: SandboxSettings,
    /// 指标配置
    pub metrics: MetricsSettings,
}

/// 服务器配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// 服务器监听主机地址
    pub host: String,
    /// 服务器监听端口
    pub port: u16,
}

/// 语言模型配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSettings {
    /// API 密钥，未设置时回退到 `LLM_API_KEY`
    pub api_key: Option<String>,
    /// 模型名称
    pub model: String,
    /// OpenAI 兼容接口的基础 URL
    pub api_base_url: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// 单次调用超时（秒）
    pub timeout_secs: u64,
}

/// 修复循环配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct ScraperSettings {
    /// 生成加执行的最大轮数
    pub max_attempts: u32,
    /// 单个请求的整体超时（秒）
    pub request_timeout_secs: u64,
    /// 发给模型的页面样本字符数
    pub content_sample_chars: usize,
}

/// 页面抓取配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct FetchSettings {
    /// 每次抓取前的固定延迟（毫秒）
    pub politeness_delay_ms: u64,
    /// 随机抖动上限（毫秒）
    pub politeness_jitter_ms: u64,
    pub static_timeout_secs: u64,
    pub dynamic_timeout_secs: u64,
    /// 动态渲染页面加载后的等待时间（毫秒）
    pub settle_ms: u64,
    pub user_agent: String,
    /// 响应体大小上限（字节）
    pub max_content_bytes: usize,
    /// 是否允许升级到浏览器渲染
    pub dynamic_enabled: bool,
    /// 远程 Chrome DevTools 地址
    pub remote_debugging_url: Option<String>,
    /// 同时存在的浏览器上下文上限
    pub max_browser_contexts: usize,
    /// 是否允许访问私有网络（关闭 SSRF 防护）
    pub allow_private_networks: bool,
}

/// 站点模式判定阈值
#[derive(Debug, Clone, Deserialize)]
pub struct SiteModeSettings {
    pub min_content_bytes: usize,
    pub min_text_chars: usize,
}

/// 沙箱配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct SandboxSettings {
    /// 执行时间预算（毫秒）
    pub timeout_ms: u64,
    pub max_operations: u64,
    pub max_records: usize,
    pub max_output_bytes: usize,
    /// 编译后正则的大小上限（字节）
    pub regex_size_limit: usize,
}

/// 指标配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsSettings {
    pub enabled: bool,
    pub listen_addr: String,
}

impl Settings {
    /// 创建新的配置实例
    ///
    /// 依次叠加默认值、`config/default`、`config/{APP_ENVIRONMENT}` 和 `PROMPTSCRAPER__*` 环境变量
    ///
    /// # Returns
    ///
    /// * `Ok(Settings)` - 成功加载的配置
    /// * `Err(ConfigError)` - 配置加载或校验失败
    pub fn new() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// 从指定目录加载配置
    pub fn load_from(config_dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let dir = config_dir.as_ref();
        let env = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "default".to_string());

        let builder = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8000)?
            .set_default("llm.model", "gpt-4o-mini")?
            .set_default("llm.api_base_url", "https://api.openai.com/v1")?
            .set_default("llm.temperature", 0.0)?
            .set_default("llm.max_tokens", 2048)?
            .set_default("llm.timeout_secs", 60)?
            .set_default("scraper.max_attempts", 3)?
            .set_default("scraper.request_timeout_secs", 120)?
            .set_default("scraper.content_sample_chars", 12000)?
            .set_default("fetch.politeness_delay_ms", 1000)?
            .set_default("fetch.politeness_jitter_ms", 0)?
            .set_default("fetch.static_timeout_secs", 30)?
            .set_default("fetch.dynamic_timeout_secs", 60)?
            .set_default("fetch.settle_ms", 2000)?
            .set_default("fetch.user_agent", default_user_agent())?
            .set_default("fetch.max_content_bytes", 10 * 1024 * 1024)?
            .set_default("fetch.dynamic_enabled", true)?
            .set_default("fetch.max_browser_contexts", 4)?
            .set_default("fetch.allow_private_networks", false)?
            .set_default("site_mode.min_content_bytes", 512)?
            .set_default("site_mode.min_text_chars", 100)?
            .set_default("sandbox.timeout_ms", 5000)?
            .set_default("sandbox.max_operations", 5_000_000)?
            .set_default("sandbox.max_records", 10_000)?
            .set_default("sandbox.max_output_bytes", 16 * 1024 * 1024)?
            .set_default("sandbox.regex_size_limit", 1024 * 1024)?
            .set_default("metrics.enabled", false)?
            .set_default("metrics.listen_addr", "0.0.0.0:9000")?
            .add_source(File::with_name(&dir.join("default").to_string_lossy()).required(false))
            .add_source(File::with_name(&dir.join(&env).to_string_lossy()).required(false))
            .add_source(Environment::with_prefix("PROMPTSCRAPER").separator("__"));

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// 校验取值范围
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            (self.scraper.max_attempts >= 1, "scraper.max_attempts must be at least 1"),
            (
                self.scraper.request_timeout_secs > 0,
                "scraper.request_timeout_secs must be positive",
            ),
            (
                self.scraper.content_sample_chars > 0,
                "scraper.content_sample_chars must be positive",
            ),
            (self.sandbox.timeout_ms > 0, "sandbox.timeout_ms must be positive"),
            (self.sandbox.max_records > 0, "sandbox.max_records must be positive"),
            (
                self.fetch.max_content_bytes > 0,
                "fetch.max_content_bytes must be positive",
            ),
            (
                self.fetch.max_browser_contexts > 0,
                "fetch.max_browser_contexts must be positive",
            ),
        ];

        match checks.iter().find(|(ok, _)| !ok) {
            Some((_, message)) => Err(ConfigError::Message(message.to_string())),
            None => Ok(()),
        }
    }

    /// 服务监听地址
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
#[path = "settings_test.rs"]
mod tests;
