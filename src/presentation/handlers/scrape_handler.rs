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

use axum::{
    extract::{rejection::JsonRejection, Extension, Json},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::error;
use validator::Validate;

use crate::{
    application::{
        csv_export,
        dto::{scrape_request::ScrapeRequestDto, scrape_response::ScrapeResponseDto},
        usecases::scrape_use_case::ScrapeUseCase,
    },
    domain::models::scrape_request::{OutputFormat, ScrapeRequest},
    domain::models::scrape_result::ScrapeResult,
    presentation::errors::AppError,
};

/// 解析并校验请求体
fn parse_request(
    payload: Result<Json<ScrapeRequestDto>, JsonRejection>,
    forced_format: Option<OutputFormat>,
) -> Result<ScrapeRequest, AppError> {
    let Json(dto) = payload?;
    dto.validate()?;
    Ok(dto.to_domain(forced_format)?)
}

fn status_for(result: &ScrapeResult) -> StatusCode {
    if result.success {
        StatusCode::OK
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    }
}

/// `POST /scrape`
///
/// 成功返回 200，修复循环以失败结束时返回 422（响应体仍是完整的结果）
pub async fn scrape(
    Extension(use_case): Extension<Arc<ScrapeUseCase>>,
    Extension(shutdown): Extension<CancellationToken>,
    payload: Result<Json<ScrapeRequestDto>, JsonRejection>,
) -> Result<Response, AppError> {
    let request = parse_request(payload, None)?;

    // Dropping the handler (client disconnect) cancels the token through the guard.
    let cancel = shutdown.child_token();
    let _guard = cancel.clone().drop_guard();

    let run = use_case.execute(&request, cancel).await;
    let status = status_for(&run.result);
    Ok((status, Json(ScrapeResponseDto::from(run.result))).into_response())
}

/// `POST /scrape/csv`
///
/// 成功时返回 CSV 附件，失败时返回 JSON 结果
pub async fn scrape_csv(
    Extension(use_case): Extension<Arc<ScrapeUseCase>>,
    Extension(shutdown): Extension<CancellationToken>,
    payload: Result<Json<ScrapeRequestDto>, JsonRejection>,
) -> Result<Response, AppError> {
    let request = parse_request(payload, Some(OutputFormat::Csv))?;

    let cancel = shutdown.child_token();
    let _guard = cancel.clone().drop_guard();

    let run = use_case.execute(&request, cancel).await;
    let result = run.result;
    if !result.success {
        let status = status_for(&result);
        return Ok((status, Json(ScrapeResponseDto::from(result))).into_response());
    }

    let columns = result.columns.clone().unwrap_or_default();
    match csv_export::to_csv(&result.data, &columns) {
        Ok(body) => {
            let disposition = format!(
                "attachment; filename={}",
                csv_export::csv_filename(chrono::Local::now())
            );
            Ok((
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                body,
            )
                .into_response())
        }
        Err(e) => {
            error!("Failed to write CSV: {}", e);
            let failed = ScrapeResponseDto {
                execution_time: result.execution_time.as_secs_f64(),
                ..ScrapeResponseDto::rejected(format!("Failed to format results: {}", e))
            };
            Ok((StatusCode::INTERNAL_SERVER_ERROR, Json(failed)).into_response())
        }
    }
}
