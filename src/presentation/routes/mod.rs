// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::application::usecases::scrape_use_case::ScrapeUseCase;
use crate::presentation::handlers::{scrape_handler, service_handler};
use axum::{
    routing::{get, post},
    Extension, Router,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// 创建应用路由
///
/// # 参数
///
/// * `use_case` - 共享的抓取用例
/// * `shutdown` - 服务关闭时触发的根取消信号
///
/// # 返回值
///
/// 返回配置好的路由
pub fn routes(use_case: Arc<ScrapeUseCase>, shutdown: CancellationToken) -> Router {
    Router::new()
        .route("/", get(service_handler::root))
        .route("/health", get(service_handler::health_check))
        .route("/version", get(service_handler::version))
        .route("/scrape", post(scrape_handler::scrape))
        .route("/scrape/csv", post(scrape_handler::scrape_csv))
        .layer(Extension(use_case))
        .layer(Extension(shutdown))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
