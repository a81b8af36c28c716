// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::config::settings::Settings;
use crate::domain::models::scrape_request::ScrapeRequest;
use crate::domain::services::code_generator::CodeGenerator;
use crate::domain::services::llm_service::{LLMService, LanguageModel};
use crate::domain::services::repair_loop::{RepairLoop, ScrapeRun};
use crate::engines::browser_engine::{BrowserEngine, BrowserEngineConfig};
use crate::engines::page_fetcher::{FetchPolicy, PageFetcher};
use crate::engines::reqwest_engine::ReqwestEngine;
use crate::engines::site_mode::SiteModeSelector;
use crate::engines::traits::{PageSource, ScraperEngine};
use crate::sandbox::{ProgramSandbox, Sandbox, SandboxLimits};

// === Section: Use Case Definition ===

/// 抓取用例
///
/// 每个请求独立运行一个修复循环，请求之间不共享可变状态
pub struct ScrapeUseCase {
    repair_loop: RepairLoop,
}

// === Section: Implementation ===

impl ScrapeUseCase {
    pub fn new(repair_loop: RepairLoop) -> Self {
        Self { repair_loop }
    }

    /// 用配置组装完整的抓取管线
    pub fn from_settings(settings: &Settings) -> Self {
        let model: Arc<dyn LanguageModel> = Arc::new(LLMService::from_settings(&settings.llm));
        Self::with_model(settings, model)
    }

    /// 用指定的语言模型组装管线，其余组件来自配置
    pub fn with_model(settings: &Settings, model: Arc<dyn LanguageModel>) -> Self {
        let static_engine: Arc<dyn ScraperEngine> = Arc::new(ReqwestEngine);
        let dynamic_engine: Option<Arc<dyn ScraperEngine>> = if settings.fetch.dynamic_enabled {
            Some(Arc::new(BrowserEngine::new(BrowserEngineConfig {
                remote_debugging_url: settings.fetch.remote_debugging_url.clone(),
                settle: Duration::from_millis(settings.fetch.settle_ms),
                max_contexts: settings.fetch.max_browser_contexts,
            })))
        } else {
            None
        };

        let fetcher = Arc::new(PageFetcher::new(
            static_engine,
            dynamic_engine,
            FetchPolicy::from(&settings.fetch),
        ));
        let source: Arc<dyn PageSource> = Arc::new(SiteModeSelector::new(
            fetcher,
            (&settings.site_mode).into(),
        ));
        let sandbox: Arc<dyn Sandbox> =
            Arc::new(ProgramSandbox::new(SandboxLimits::from(&settings.sandbox)));
        let generator = CodeGenerator::new(model, settings.scraper.content_sample_chars);

        Self::new(RepairLoop::new(
            source,
            generator,
            sandbox,
            settings.scraper.max_attempts,
            Duration::from_secs(settings.scraper.request_timeout_secs),
        ))
    }

    /// 执行抓取
    ///
    /// # 参数
    /// * `request` - 已校验的领域请求
    /// * `cancel` - 取消信号（客户端断开或服务关闭）
    pub async fn execute(&self, request: &ScrapeRequest, cancel: CancellationToken) -> ScrapeRun {
        let request_id = Uuid::new_v4();
        let span = info_span!(
            "scrape",
            request_id = %request_id,
            url = %request.url,
            format = %request.format
        );

        async {
            info!(max_attempts = self.repair_loop.max_attempts(), "Scrape started");
            self.repair_loop.run(request, &cancel).await
        }
        .instrument(span)
        .await
    }
}
