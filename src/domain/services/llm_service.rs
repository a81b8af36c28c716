// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use std::env;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::settings::LlmSettings;
use crate::utils::errors::ModelError;

/// 语言模型接口
///
/// 提示词进，文本出。抓取流程中唯一的不确定性来源，测试中可以用脚本化的实现替换。
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, ModelError>;
}

const SYSTEM_PROMPT: &str = "You write extraction programs for a restricted JSON extraction \
language. You output only the program as a single JSON object, without explanations.";

/// LLM服务 - OpenAI 兼容的 chat/completions 客户端
///
/// # 配置
///
/// 通过 `llm` 配置段设置模型、地址和超时；未配置密钥时回退到环境变量 `LLM_API_KEY`。
pub struct LLMService {
    api_key: Option<SecretString>,
    model: String,
    api_base_url: String,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
}

impl LLMService {
    pub fn from_settings(settings: &LlmSettings) -> Self {
        let api_key = settings
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| env::var("LLM_API_KEY").ok().filter(|key| !key.trim().is_empty()))
            .map(SecretString::from);

        Self {
            api_key,
            model: settings.model.clone(),
            api_base_url: settings.api_base_url.trim_end_matches('/').to_string(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            timeout: Duration::from_secs(settings.timeout_secs),
        }
    }

    pub fn new_with_config(api_key: String, model: String, api_base_url: String) -> Self {
        Self {
            api_key: Some(SecretString::from(api_key)),
            model,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            temperature: 0.0,
            max_tokens: 2048,
            timeout: Duration::from_secs(60),
        }
    }

    /// 是否配置了密钥
    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    /// 调用 chat/completions 接口
    ///
    /// # 参数
    /// * `prompt` - 用户消息
    ///
    /// # 返回值
    /// * `Result<String, ModelError>` - 第一个候选回复的文本内容
    ///
    /// # 错误
    /// * 未配置密钥、网络失败、非成功状态码或回复缺少内容时返回错误
    async fn chat(&self, prompt: &str) -> Result<String, ModelError> {
        let api_key = self.api_key.as_ref().ok_or(ModelError::MissingCredential)?;

        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| ModelError::Transport(e.to_string()))?;

        let request_body = json!({
            "model": self.model,
            "messages": [
                {
                    "role": "system",
                    "content": SYSTEM_PROMPT
                },
                {
                    "role": "user",
                    "content": prompt
                }
            ],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens
        });

        let url = format!("{}/chat/completions", self.api_base_url);
        debug!(model = %self.model, prompt_chars = prompt.len(), "Calling LLM API");

        let response = client
            .post(url)
            .bearer_auth(api_key.expose_secret())
            .json(&request_body)
            .send()
            .await
            .map_err(|e| ModelError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            warn!(status, "LLM API returned error status");
            return Err(ModelError::Api { status, body });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;

        if let Some(usage) = body.get("usage") {
            debug!(
                prompt_tokens = usage["prompt_tokens"].as_u64().unwrap_or(0),
                completion_tokens = usage["completion_tokens"].as_u64().unwrap_or(0),
                "LLM token usage"
            );
        }

        body["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| {
                ModelError::InvalidResponse("missing choices[0].message.content".to_string())
            })
    }
}

#[async_trait]
impl LanguageModel for LLMService {
    async fn complete(&self, prompt: &str) -> Result<String, ModelError> {
        self.chat(prompt).await
    }
}
