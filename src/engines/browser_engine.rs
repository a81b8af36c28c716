// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::fetch_result::FetchMode;
use crate::engines::traits::{EngineError, FetchRequest, FetchResponse, ScraperEngine};
use crate::engines::validators;
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::{Browser, BrowserConfig};
use futures::StreamExt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{OnceCell, Semaphore};

/// 浏览器引擎配置
#[derive(Debug, Clone)]
pub struct BrowserEngineConfig {
    /// 远程 DevTools 地址；为空时本地启动 Chrome
    pub remote_debugging_url: Option<String>,
    /// 页面加载后的固定等待时间
    pub settle: Duration,
    /// 同时存在的浏览器上下文上限
    pub max_contexts: usize,
}

/// 浏览器引擎
///
/// 基于chromiumoxide的动态渲染引擎。浏览器进程在首次使用时启动并在请求间共享，
/// 每次抓取都在独立的浏览器上下文中进行，抓取结束或被取消时上下文随之销毁。
pub struct BrowserEngine {
    config: BrowserEngineConfig,
    browser: OnceCell<Arc<Browser>>,
    contexts: Semaphore,
}

impl BrowserEngine {
    pub fn new(config: BrowserEngineConfig) -> Self {
        let permits = config.max_contexts.max(1);
        Self {
            config,
            browser: OnceCell::new(),
            contexts: Semaphore::new(permits),
        }
    }

    async fn browser(&self) -> Result<Arc<Browser>, EngineError> {
        self.browser
            .get_or_try_init(|| async {
                let (browser, mut handler) = match &self.config.remote_debugging_url {
                    Some(url) => {
                        tracing::info!("Connecting to remote Chrome instance at: {}", url);
                        Browser::connect(url.as_str()).await.map_err(|e| {
                            EngineError::Browser(format!("Failed to connect to remote Chrome: {}", e))
                        })?
                    }
                    None => {
                        let config = BrowserConfig::builder()
                            .no_sandbox()
                            .request_timeout(Duration::from_secs(30))
                            .arg("--disable-gpu")
                            .arg("--disable-dev-shm-usage")
                            .build()
                            .map_err(EngineError::Browser)?;
                        tracing::info!("Launching headless Chrome");
                        Browser::launch(config)
                            .await
                            .map_err(|e| EngineError::Browser(e.to_string()))?
                    }
                };

                // Spawn a handler to process browser events
                tokio::spawn(async move {
                    while let Some(event) = handler.next().await {
                        if event.is_err() {
                            break;
                        }
                    }
                });

                Ok::<_, EngineError>(Arc::new(browser))
            })
            .await
            .cloned()
    }

    async fn render(&self, request: &FetchRequest) -> Result<String, EngineError> {
        let _permit = self
            .contexts
            .acquire()
            .await
            .map_err(|e| EngineError::Browser(e.to_string()))?;
        let browser = self.browser().await?;

        let created = browser
            .execute(CreateBrowserContextParams::default())
            .await
            .map_err(|e| EngineError::Browser(format!("Failed to create browser context: {}", e)))?;
        let context = IsolatedContext::new(browser.clone(), created.result.browser_context_id);

        let target = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(context.id().clone())
            .build()
            .map_err(EngineError::Browser)?;
        let page = browser
            .new_page(target)
            .await
            .map_err(|e| EngineError::Browser(e.to_string()))?;

        page.set_user_agent(request.user_agent.as_str())
            .await
            .map_err(|e| EngineError::Browser(e.to_string()))?;
        page.goto(request.url.as_str())
            .await
            .map_err(|e| EngineError::Browser(format!("Navigation failed: {}", e)))?;

        // Navigation may have been redirected; refuse to read a page that ended up on a blocked host.
        if let Some(landed) = page
            .url()
            .await
            .map_err(|e| EngineError::Browser(e.to_string()))?
        {
            let landed = url::Url::parse(&landed)
                .map_err(|e| EngineError::Browser(format!("Invalid final URL: {}", e)))?;
            if landed != request.url {
                validators::validate_url(&landed, request.allow_private_networks).await?;
            }
        }

        // Give client-side rendering a chance to finish after the load event.
        if !self.config.settle.is_zero() {
            tokio::time::sleep(self.config.settle).await;
        }

        let content = page
            .content()
            .await
            .map_err(|e| EngineError::Browser(e.to_string()))?;

        if let Err(e) = page.close().await {
            tracing::debug!("Failed to close page: {}", e);
        }
        drop(context);

        Ok(content)
    }
}

#[async_trait]
impl ScraperEngine for BrowserEngine {
    /// 渲染页面并返回渲染后的 HTML
    async fn scrape(&self, request: &FetchRequest) -> Result<FetchResponse, EngineError> {
        validators::validate_url(&request.url, request.allow_private_networks).await?;

        let start = Instant::now();
        let content = tokio::time::timeout(request.timeout, self.render(request))
            .await
            .map_err(|_| EngineError::Timeout(request.timeout))??;

        if content.len() > request.max_content_bytes {
            return Err(EngineError::TooLarge {
                limit: request.max_content_bytes,
            });
        }

        Ok(FetchResponse {
            // Navigation does not expose the document response status here.
            status_code: 200,
            content,
            content_type: "text/html".to_string(),
            response_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    fn mode(&self) -> FetchMode {
        FetchMode::Dynamic
    }

    fn name(&self) -> &'static str {
        "chromium"
    }
}

/// 独占的浏览器上下文
///
/// 析构时销毁上下文（包括其中的页面、Cookie 和历史记录），被取消的抓取也会释放。
struct IsolatedContext {
    browser: Arc<Browser>,
    id: BrowserContextId,
}

impl IsolatedContext {
    fn new(browser: Arc<Browser>, id: BrowserContextId) -> Self {
        Self { browser, id }
    }

    fn id(&self) -> &BrowserContextId {
        &self.id
    }
}

impl Drop for IsolatedContext {
    fn drop(&mut self) {
        let id = self.id.clone();
        let browser = self.browser.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = browser.execute(DisposeBrowserContextParams::new(id)).await {
                        tracing::warn!("Failed to dispose browser context: {}", e);
                    }
                });
            }
            Err(_) => tracing::warn!("No runtime available to dispose browser context"),
        }
    }
}
