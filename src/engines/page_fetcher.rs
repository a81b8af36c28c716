// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use rand::Rng;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use url::Url;

use crate::config::settings::FetchSettings;
use crate::domain::models::fetch_result::{FetchMode, FetchResult};
use crate::engines::traits::{FetchRequest, ScraperEngine};
use crate::utils::errors::FetchError;

/// 抓取策略
#[derive(Debug, Clone)]
pub struct FetchPolicy {
    /// 每次抓取前的固定礼貌延迟
    pub politeness_delay: Duration,
    /// 在固定延迟上叠加的随机抖动上限
    pub politeness_jitter: Duration,
    pub static_timeout: Duration,
    pub dynamic_timeout: Duration,
    pub user_agent: String,
    pub max_content_bytes: usize,
    pub allow_private_networks: bool,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            politeness_delay: Duration::from_millis(1000),
            politeness_jitter: Duration::ZERO,
            static_timeout: Duration::from_secs(30),
            dynamic_timeout: Duration::from_secs(60),
            user_agent: default_user_agent(),
            max_content_bytes: 10 * 1024 * 1024,
            allow_private_networks: false,
        }
    }
}

impl From<&FetchSettings> for FetchPolicy {
    fn from(settings: &FetchSettings) -> Self {
        Self {
            politeness_delay: Duration::from_millis(settings.politeness_delay_ms),
            politeness_jitter: Duration::from_millis(settings.politeness_jitter_ms),
            static_timeout: Duration::from_secs(settings.static_timeout_secs),
            dynamic_timeout: Duration::from_secs(settings.dynamic_timeout_secs),
            user_agent: settings.user_agent.clone(),
            max_content_bytes: settings.max_content_bytes,
            allow_private_networks: settings.allow_private_networks,
        }
    }
}

pub fn default_user_agent() -> String {
    format!(
        "Mozilla/5.0 (compatible; promptscraper/{}; +https://github.com/Kirky-X)",
        env!("CARGO_PKG_VERSION")
    )
}

/// 页面抓取器
///
/// 按指定模式抓取页面。抓取前先等待礼貌延迟；网络错误、超时和非 2xx 状态都视为失败。
pub struct PageFetcher {
    static_engine: Arc<dyn ScraperEngine>,
    dynamic_engine: Option<Arc<dyn ScraperEngine>>,
    policy: FetchPolicy,
}

impl PageFetcher {
    pub fn new(
        static_engine: Arc<dyn ScraperEngine>,
        dynamic_engine: Option<Arc<dyn ScraperEngine>>,
        policy: FetchPolicy,
    ) -> Self {
        Self {
            static_engine,
            dynamic_engine,
            policy,
        }
    }

    /// 是否支持动态渲染
    pub fn supports_dynamic(&self) -> bool {
        self.dynamic_engine.is_some()
    }

    /// 抓取页面
    ///
    /// # 参数
    /// * `url` - 目标地址
    /// * `mode` - 静态或动态
    ///
    /// # 返回值
    /// * `Result<FetchResult, FetchError>` - 页面内容及耗时
    pub async fn fetch(&self, url: &Url, mode: FetchMode) -> Result<FetchResult, FetchError> {
        let (engine, timeout) = match mode {
            FetchMode::Static => (&self.static_engine, self.policy.static_timeout),
            FetchMode::Dynamic => match &self.dynamic_engine {
                Some(engine) => (engine, self.policy.dynamic_timeout),
                None => {
                    return Err(FetchError::new(
                        mode,
                        None,
                        "dynamic rendering is disabled",
                    ))
                }
            },
        };

        self.politeness_pause().await;

        let request = FetchRequest {
            url: url.clone(),
            timeout,
            user_agent: self.policy.user_agent.clone(),
            max_content_bytes: self.policy.max_content_bytes,
            allow_private_networks: self.policy.allow_private_networks,
        };

        let start = Instant::now();
        info!(url = %url, mode = %mode, engine = engine.name(), "Fetching page");
        let response = engine
            .scrape(&request)
            .await
            .map_err(|e| FetchError::new(mode, e.status(), e.to_string()))?;

        if !(200..300).contains(&response.status_code) {
            return Err(FetchError::new(
                mode,
                Some(response.status_code),
                format!("HTTP status {}", response.status_code),
            ));
        }

        let fetch_time = start.elapsed();
        debug!(
            url = %url,
            mode = %mode,
            bytes = response.content.len(),
            elapsed_ms = fetch_time.as_millis() as u64,
            "Page fetched"
        );

        Ok(FetchResult {
            content: response.content,
            mode,
            fetch_time,
        })
    }

    async fn politeness_pause(&self) {
        let jitter_ms = self.policy.politeness_jitter.as_millis() as u64;
        let jitter = if jitter_ms > 0 {
            Duration::from_millis(rand::rng().random_range(0..=jitter_ms))
        } else {
            Duration::ZERO
        };
        let pause = self.policy.politeness_delay + jitter;
        if !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }
    }
}
