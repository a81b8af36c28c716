// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use promptscraper::domain::models::fetch_result::FetchMode;
use promptscraper::engines::page_fetcher::{FetchPolicy, PageFetcher};
use promptscraper::engines::reqwest_engine::ReqwestEngine;
use promptscraper::engines::site_mode::{SiteModeSelector, SiteModeThresholds};
use promptscraper::engines::traits::{
    EngineError, FetchRequest, FetchResponse, PageSource, ScraperEngine,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ARTICLE: &str = r#"<html><head><title>Team</title></head><body>
<h1>Our team</h1>
<p>Reach the sales desk at test@example.com during office hours, Monday to Friday.</p>
<p>Technical questions go to contact@example.com and are answered within two days.</p>
</body></html>"#;

const SHELL: &str = r#"<html><head><script src="/static/app.js"></script></head>
<body><div id="root"></div></body></html>"#;

/// 模拟浏览器渲染的引擎
struct RenderingEngine {
    rendered: Option<String>,
    calls: AtomicUsize,
}

impl RenderingEngine {
    fn rendering(content: &str) -> Arc<Self> {
        Arc::new(Self {
            rendered: Some(content.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    fn broken() -> Arc<Self> {
        Arc::new(Self {
            rendered: None,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScraperEngine for RenderingEngine {
    async fn scrape(&self, _request: &FetchRequest) -> Result<FetchResponse, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.rendered {
            Some(content) => Ok(FetchResponse {
                status_code: 200,
                content: content.clone(),
                content_type: "text/html".to_string(),
                response_time_ms: 1,
            }),
            None => Err(EngineError::Browser("browser crashed".to_string())),
        }
    }

    fn mode(&self) -> FetchMode {
        FetchMode::Dynamic
    }

    fn name(&self) -> &'static str {
        "rendering"
    }
}

fn policy() -> FetchPolicy {
    FetchPolicy {
        politeness_delay: Duration::ZERO,
        allow_private_networks: true,
        ..FetchPolicy::default()
    }
}

fn selector(dynamic: Option<Arc<RenderingEngine>>) -> SiteModeSelector {
    let dynamic = dynamic.map(|engine| engine as Arc<dyn ScraperEngine>);
    let fetcher = PageFetcher::new(Arc::new(ReqwestEngine), dynamic, policy());
    SiteModeSelector::new(Arc::new(fetcher), SiteModeThresholds::default())
}

async fn serve(status: u16, body: &str) -> (MockServer, Url) {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(
            ResponseTemplate::new(status)
                .insert_header("content-type", "text/html; charset=utf-8")
                .set_body_string(body),
        )
        .mount(&server)
        .await;
    let url = Url::parse(&format!("{}/page", server.uri())).unwrap();
    (server, url)
}

#[tokio::test]
async fn test_sufficient_static_page_is_not_escalated() {
    let (_server, url) = serve(200, &ARTICLE.repeat(3)).await;
    let dynamic = RenderingEngine::rendering("<p>rendered</p>");
    let selector = selector(Some(dynamic.clone()));

    let first = selector.acquire(&url).await.unwrap();
    let second = selector.acquire(&url).await.unwrap();

    assert_eq!(first.mode, FetchMode::Static);
    assert!(first.content.contains("test@example.com"));
    assert_eq!(second.mode, FetchMode::Static);
    assert_eq!(selector.select(&url).await, FetchMode::Static);
    assert_eq!(dynamic.calls(), 0);
}

#[tokio::test]
async fn test_client_rendered_shell_is_escalated() {
    let (_server, url) = serve(200, SHELL).await;
    let dynamic = RenderingEngine::rendering(ARTICLE);
    let selector = selector(Some(dynamic.clone()));

    let result = selector.acquire(&url).await.unwrap();

    assert_eq!(result.mode, FetchMode::Dynamic);
    assert_eq!(result.content, ARTICLE);
    assert_eq!(dynamic.calls(), 1);
}

#[tokio::test]
async fn test_failed_rendering_falls_back_to_static_content() {
    let (_server, url) = serve(200, SHELL).await;
    let selector = selector(Some(RenderingEngine::broken()));

    let result = selector.acquire(&url).await.unwrap();

    assert_eq!(result.mode, FetchMode::Static);
    assert_eq!(result.content, SHELL);
}

#[tokio::test]
async fn test_both_modes_failing_is_fetch_error() {
    let (_server, url) = serve(503, "unavailable").await;
    let selector = selector(Some(RenderingEngine::broken()));

    let err = selector.acquire(&url).await.unwrap_err();

    assert_eq!(err.mode, FetchMode::Dynamic);
    assert_eq!(err.status, Some(503));
    assert!(err.to_string().contains("static and dynamic fetches both failed"));
}

#[tokio::test]
async fn test_static_failure_without_dynamic_engine() {
    let (_server, url) = serve(404, "missing").await;
    let selector = selector(None);

    let err = selector.acquire(&url).await.unwrap_err();

    assert_eq!(err.mode, FetchMode::Static);
    assert_eq!(err.status, Some(404));
}

#[tokio::test]
async fn test_private_targets_are_refused_by_default() {
    let (_server, url) = serve(200, ARTICLE).await;
    let fetcher = PageFetcher::new(
        Arc::new(ReqwestEngine),
        None,
        FetchPolicy {
            politeness_delay: Duration::ZERO,
            ..FetchPolicy::default()
        },
    );

    let err = fetcher.fetch(&url, FetchMode::Static).await.unwrap_err();

    assert_eq!(err.mode, FetchMode::Static);
    assert_eq!(err.status, None);
}
