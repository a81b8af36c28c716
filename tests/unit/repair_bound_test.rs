// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use promptscraper::domain::models::execution_outcome::{ExecutionOutcome, FailureKind};
use promptscraper::domain::models::fetch_result::{FetchMode, FetchResult};
use promptscraper::domain::models::generated_code::GeneratedCode;
use promptscraper::domain::models::scrape_request::{OutputFormat, ScrapeRequest};
use promptscraper::domain::services::code_generator::CodeGenerator;
use promptscraper::domain::services::llm_service::LanguageModel;
use promptscraper::domain::services::repair_loop::RepairLoop;
use promptscraper::engines::traits::PageSource;
use promptscraper::sandbox::Sandbox;
use promptscraper::utils::errors::{FetchError, ModelError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

struct Page;

#[async_trait]
impl PageSource for Page {
    async fn acquire(&self, _url: &Url) -> Result<FetchResult, FetchError> {
        Ok(FetchResult {
            content: "<p>hello</p>".to_string(),
            mode: FetchMode::Static,
            fetch_time: Duration::from_millis(1),
        })
    }
}

/// 每次都回复同一个程序的模型
struct EchoModel;

#[async_trait]
impl LanguageModel for EchoModel {
    async fn complete(&self, _prompt: &str) -> Result<String, ModelError> {
        Ok("{}".to_string())
    }
}

/// 按顺序轮换失败类型的沙箱
struct RotatingSandbox {
    outcomes: Vec<ExecutionOutcome>,
    calls: AtomicUsize,
}

impl RotatingSandbox {
    fn new(outcomes: Vec<ExecutionOutcome>) -> Arc<Self> {
        Arc::new(Self {
            outcomes,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Sandbox for RotatingSandbox {
    async fn execute(&self, _code: &GeneratedCode, _content: &str) -> ExecutionOutcome {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcomes[call % self.outcomes.len()].clone()
    }
}

fn repair_loop(sandbox: Arc<RotatingSandbox>, max_attempts: u32) -> RepairLoop {
    RepairLoop::new(
        Arc::new(Page),
        CodeGenerator::new(Arc::new(EchoModel), 1000),
        sandbox,
        max_attempts,
        Duration::from_secs(10),
    )
}

fn request() -> ScrapeRequest {
    ScrapeRequest::new("https://example.com", "greetings", OutputFormat::Json).unwrap()
}

#[tokio::test]
async fn test_attempts_never_exceed_bound() {
    let mixed = vec![
        ExecutionOutcome::failure(FailureKind::Timeout, "slow"),
        ExecutionOutcome::failure(FailureKind::RuntimeError, "broken"),
        ExecutionOutcome::failure(FailureKind::MalformedOutput, "nested"),
        ExecutionOutcome::Success { records: vec![] },
    ];

    for max_attempts in 1..=5 {
        let sandbox = RotatingSandbox::new(mixed.clone());
        let run = repair_loop(sandbox.clone(), max_attempts)
            .run(&request(), &CancellationToken::new())
            .await;

        assert!(!run.result.success);
        assert_eq!(sandbox.calls(), max_attempts as usize);
        assert_eq!(run.attempts.len(), max_attempts as usize);
        let indexes: Vec<u32> = run.attempts.iter().map(|a| a.attempt_index).collect();
        assert_eq!(indexes, (0..max_attempts).collect::<Vec<_>>());
    }
}

#[tokio::test]
async fn test_zero_records_never_succeed() {
    let sandbox = RotatingSandbox::new(vec![ExecutionOutcome::Success { records: vec![] }]);

    let run = repair_loop(sandbox, 2)
        .run(&request(), &CancellationToken::new())
        .await;

    assert!(!run.result.success);
    assert_eq!(run.result.total_results, 0);
    assert!(run
        .attempts
        .iter()
        .all(|a| a.failure.as_ref().map(|f| f.kind) == Some(FailureKind::EmptyResult)));
}
