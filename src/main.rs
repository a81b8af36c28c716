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

use promptscraper::application::usecases::scrape_use_case::ScrapeUseCase;
use promptscraper::config::settings::Settings;
use promptscraper::domain::services::llm_service::LLMService;
use promptscraper::presentation::routes;
use promptscraper::utils::telemetry;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// 主函数
///
/// 应用程序入口点，负责初始化所有组件并启动服务
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize logging
    telemetry::init_telemetry();
    info!("Starting promptscraper...");

    // 2. Load configuration
    let settings = Settings::new()?;
    info!("Configuration loaded");

    // Initialize Prometheus Metrics
    promptscraper::infrastructure::metrics::init_metrics(&settings.metrics);

    // 3. Assemble the scrape pipeline
    let model = LLMService::from_settings(&settings.llm);
    if !model.has_credential() {
        warn!("LLM API key not configured; scrape requests will fail until LLM_API_KEY is set");
    }
    let use_case = Arc::new(ScrapeUseCase::with_model(&settings, Arc::new(model)));
    info!(
        max_attempts = settings.scraper.max_attempts,
        dynamic = settings.fetch.dynamic_enabled,
        "Scrape pipeline initialized"
    );

    // 4. Start HTTP server
    let shutdown = CancellationToken::new();
    let app = routes::routes(use_case, shutdown.clone());

    let addr = settings.listen_addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    info!("Server stopped");
    Ok(())
}

/// 等待 Ctrl+C 并取消所有进行中的请求
async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("Shutdown signal received");
    shutdown.cancel();
}
