// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use promptscraper::application::usecases::scrape_use_case::ScrapeUseCase;
use promptscraper::domain::models::fetch_result::{FetchMode, FetchResult};
use promptscraper::domain::services::code_generator::CodeGenerator;
use promptscraper::domain::services::llm_service::LanguageModel;
use promptscraper::domain::services::repair_loop::RepairLoop;
use promptscraper::engines::traits::PageSource;
use promptscraper::sandbox::{ProgramSandbox, Sandbox};
use promptscraper::utils::errors::{FetchError, ModelError};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

pub const CONTACT_PAGE: &str = r#"<html><head><title>Contact</title></head>
<body>
  <h1>Contact us</h1>
  <p>Sales: test@example.com</p>
  <p>Support: contact@example.com</p>
</body></html>"#;

pub const EMAIL_PROGRAM: &str = r#"{
  "for_each": {"kind": "matches", "pattern": "[\\w.+-]+@[\\w-]+\\.[\\w.]+"},
  "fields": {"email": {"from": {"kind": "match"}}}
}"#;

/// 按顺序返回预设回复的语言模型，并记录收到的提示词
pub struct ScriptedModel {
    replies: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new<I, S>(replies: I) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, prompt: &str) -> Result<String, ModelError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ModelError::InvalidResponse("script exhausted".to_string()))
    }
}

/// 返回固定内容或固定错误的页面来源
pub struct FixedSource {
    outcome: Result<FetchResult, FetchError>,
    calls: AtomicUsize,
}

impl FixedSource {
    pub fn page(content: &str) -> Arc<Self> {
        Arc::new(Self {
            outcome: Ok(FetchResult {
                content: content.to_string(),
                mode: FetchMode::Static,
                fetch_time: Duration::from_millis(3),
            }),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing(error: FetchError) -> Arc<Self> {
        Arc::new(Self {
            outcome: Err(error),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageSource for FixedSource {
    async fn acquire(&self, _url: &Url) -> Result<FetchResult, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }
}

/// 用假的页面来源和模型组装用例，沙箱使用真实实现
pub fn use_case(
    source: Arc<dyn PageSource>,
    model: Arc<dyn LanguageModel>,
    max_attempts: u32,
) -> ScrapeUseCase {
    let sandbox: Arc<dyn Sandbox> = Arc::new(ProgramSandbox::default());
    ScrapeUseCase::new(RepairLoop::new(
        source,
        CodeGenerator::new(model, 4000),
        sandbox,
        max_attempts,
        Duration::from_secs(30),
    ))
}
