// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{use_case, FixedSource, ScriptedModel, CONTACT_PAGE, EMAIL_PROGRAM};
use promptscraper::domain::models::execution_outcome::FailureKind;
use promptscraper::domain::models::fetch_result::FetchMode;
use promptscraper::domain::models::scrape_request::{OutputFormat, ScrapeRequest};
use promptscraper::utils::errors::FetchError;
use serde_json::json;
use tokio_util::sync::CancellationToken;

const HEADING_PROGRAM: &str = r#"{
  "for_each": {"kind": "select", "selector": "h1"},
  "fields": {"heading": {"from": {"kind": "text"}}}
}"#;

const MISSING_TABLE_PROGRAM: &str = r#"{
  "for_each": {"kind": "select", "selector": "table.prices tr"},
  "fields": {"price": {"from": {"kind": "text", "selector": "td"}}}
}"#;

fn request(format: OutputFormat) -> ScrapeRequest {
    ScrapeRequest::new(
        "https://example.com/contact",
        "extract all email addresses",
        format,
    )
    .unwrap()
}

/// 静态页面中的两个邮箱地址被完整提取
#[tokio::test]
async fn test_extracts_emails_from_static_page() {
    let source = FixedSource::page(CONTACT_PAGE);
    let model = ScriptedModel::new([EMAIL_PROGRAM]);
    let use_case = use_case(source.clone(), model.clone(), 3);

    let run = use_case
        .execute(&request(OutputFormat::Json), CancellationToken::new())
        .await;

    assert!(run.result.success, "error: {:?}", run.result.error);
    assert_eq!(
        serde_json::to_value(&run.result.data).unwrap(),
        json!([{"email": "test@example.com"}, {"email": "contact@example.com"}])
    );
    assert_eq!(run.result.total_results, 2);
    assert_eq!(run.result.error, None);
    assert_eq!(run.fetch_mode, Some(FetchMode::Static));
    assert_eq!(source.calls(), 1);
    assert_eq!(model.calls(), 1);
}

/// 第一次生成的程序无法运行，修复后成功
#[tokio::test]
async fn test_failed_program_is_repaired() {
    let model = ScriptedModel::new([
        "Sure! Here is the program: select every h1".to_string(),
        format!("```json\n{}\n```", HEADING_PROGRAM),
    ]);
    let use_case = use_case(FixedSource::page(CONTACT_PAGE), model.clone(), 3);

    let run = use_case
        .execute(&request(OutputFormat::Json), CancellationToken::new())
        .await;

    assert!(run.result.success, "error: {:?}", run.result.error);
    assert_eq!(
        serde_json::to_value(&run.result.data).unwrap(),
        json!([{"heading": "Contact us"}])
    );
    assert_eq!(run.attempts.len(), 2);
    assert_eq!(
        run.attempts[0].failure.as_ref().map(|f| f.kind),
        Some(FailureKind::RuntimeError)
    );
    assert!(run.attempts[1].failure.is_none());
    assert_eq!(model.calls(), 2);

    let repair_prompt = &model.prompts()[1];
    assert!(repair_prompt.contains("Previous program"));
    assert!(repair_prompt.contains("select every h1"));
    assert!(repair_prompt.contains("runtime_error"));
}

/// 所有尝试都没有产生记录时返回失败
#[tokio::test]
async fn test_exhausted_attempts_report_failure() {
    let model = ScriptedModel::new([MISSING_TABLE_PROGRAM; 3]);
    let use_case = use_case(FixedSource::page(CONTACT_PAGE), model.clone(), 3);

    let run = use_case
        .execute(&request(OutputFormat::Json), CancellationToken::new())
        .await;

    assert!(!run.result.success);
    assert!(run.result.data.is_empty());
    assert_eq!(run.result.total_results, 0);
    assert!(!run.result.error.clone().unwrap_or_default().is_empty());
    assert_eq!(run.attempts.len(), 3);
    assert!(run
        .attempts
        .iter()
        .all(|a| a.failure.as_ref().map(|f| f.kind) == Some(FailureKind::EmptyResult)));
    assert_eq!(model.calls(), 3);
}

/// 抓取失败时不调用模型
#[tokio::test]
async fn test_fetch_failure_skips_generation() {
    let static_error = FetchError::new(FetchMode::Static, Some(503), "service unavailable");
    let dynamic_error = FetchError::new(FetchMode::Dynamic, None, "navigation timed out");
    let source = FixedSource::failing(FetchError::exhausted(&static_error, &dynamic_error));
    let model = ScriptedModel::new([EMAIL_PROGRAM]);
    let use_case = use_case(source, model.clone(), 3);

    let run = use_case
        .execute(&request(OutputFormat::Json), CancellationToken::new())
        .await;

    assert!(!run.result.success);
    assert!(run.result.data.is_empty());
    let error = run.result.error.unwrap_or_default();
    assert!(error.starts_with("Failed to fetch page"), "error: {}", error);
    assert!(run.attempts.is_empty());
    assert_eq!(run.fetch_mode, None);
    assert_eq!(model.calls(), 0);
}

/// 相同输入和确定性的模型产生相同的结果
#[tokio::test]
async fn test_runs_are_deterministic() {
    let mut results = Vec::new();
    for _ in 0..2 {
        let model = ScriptedModel::new(["not json", EMAIL_PROGRAM]);
        let use_case = use_case(FixedSource::page(CONTACT_PAGE), model, 3);
        let run = use_case
            .execute(&request(OutputFormat::Csv), CancellationToken::new())
            .await;
        let result = run.result;
        results.push((
            result.success,
            serde_json::to_string(&result.data).unwrap(),
            result.total_results,
            result.error,
            result.columns,
        ));
    }

    assert_eq!(results[0], results[1]);
    assert_eq!(results[0].4, Some(vec!["email".to_string()]));
}

/// 模型调用失败不进入修复
#[tokio::test]
async fn test_model_failure_is_fatal() {
    let model = ScriptedModel::new(Vec::<String>::new());
    let use_case = use_case(FixedSource::page(CONTACT_PAGE), model.clone(), 3);

    let run = use_case
        .execute(&request(OutputFormat::Json), CancellationToken::new())
        .await;

    assert!(!run.result.success);
    let error = run.result.error.unwrap_or_default();
    assert!(
        error.starts_with("Failed to generate extraction code"),
        "error: {}",
        error
    );
    assert_eq!(model.calls(), 1);
}
