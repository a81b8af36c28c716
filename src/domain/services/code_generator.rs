// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;
use tracing::{debug, info};

use super::llm_service::LanguageModel;
use crate::domain::models::execution_outcome::ExecutionFailure;
use crate::domain::models::generated_code::GeneratedCode;
use crate::domain::models::scrape_request::ScrapeRequest;
use crate::sandbox::program::LANGUAGE_REFERENCE;
use crate::utils::errors::ModelError;

const TRUNCATION_MARKER: &str = "\n[... content truncated ...]";

/// 修复上下文：上一次的程序和它的失败
#[derive(Debug, Clone, Copy)]
pub struct RepairContext<'a> {
    pub code: &'a GeneratedCode,
    pub failure: &'a ExecutionFailure,
}

/// 代码生成器
///
/// 请模型根据指令和页面样本写出提取程序；修复时附上上一次的程序和失败描述。
/// 模型调用本身失败时直接返回 `ModelError`，不走修复路径。
pub struct CodeGenerator {
    model: Arc<dyn LanguageModel>,
    sample_chars: usize,
}

impl CodeGenerator {
    pub fn new(model: Arc<dyn LanguageModel>, sample_chars: usize) -> Self {
        Self {
            model,
            sample_chars,
        }
    }

    /// 生成提取程序
    ///
    /// # 参数
    /// * `request` - 抓取请求（提供指令和 URL）
    /// * `content` - 页面内容，超过样本预算时截断
    /// * `prior` - 修复时的上下文，首次尝试为 `None`
    ///
    /// # 返回值
    /// * `Result<GeneratedCode, ModelError>` - 新的程序实例
    pub async fn generate(
        &self,
        request: &ScrapeRequest,
        content: &str,
        prior: Option<RepairContext<'_>>,
    ) -> Result<GeneratedCode, ModelError> {
        let attempt_index = prior.map_or(0, |p| p.code.attempt_index() + 1);
        let sample = truncate_sample(content, self.sample_chars);
        let prompt = match prior {
            None => first_prompt(request, &sample),
            Some(repair) => repair_prompt(request, &sample, repair),
        };

        info!(attempt = attempt_index, repair = prior.is_some(), "Requesting extraction program");
        let reply = self.model.complete(&prompt).await?;
        let source = extract_program(&reply);
        debug!(attempt = attempt_index, chars = source.len(), "Received extraction program");

        Ok(GeneratedCode::new(source, attempt_index))
    }
}

fn first_prompt(request: &ScrapeRequest, sample: &str) -> String {
    format!(
        "Write an extraction program for the following task.\n\n\
         {LANGUAGE_REFERENCE}\n\n\
         Task: {}\n\
         Page URL: {}\n\n\
         Page content:\n{}\n\n\
         Return only the program JSON.",
        request.prompt, request.url, sample
    )
}

fn repair_prompt(request: &ScrapeRequest, sample: &str, repair: RepairContext<'_>) -> String {
    format!(
        "Your previous extraction program failed. Write a corrected program.\n\n\
         {LANGUAGE_REFERENCE}\n\n\
         Task: {}\n\
         Page URL: {}\n\n\
         Previous program:\n```json\n{}\n```\n\n\
         Failure: {}\n\n\
         Page content:\n{}\n\n\
         Return only the corrected program JSON.",
        request.prompt,
        request.url,
        repair.code.source(),
        repair.failure.describe(),
        sample
    )
}

/// 截断页面内容，保留文档开头，不拆分 UTF-8 字符
pub fn truncate_sample(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{}", &content[..cut], TRUNCATION_MARKER),
        None => content.to_string(),
    }
}

/// 从模型回复中取出程序文本
///
/// 第一个围栏代码块优先；未闭合的围栏延伸到文本结尾；没有围栏时使用整段回复。
pub fn extract_program(reply: &str) -> String {
    let Some(open) = reply.find("```") else {
        return reply.trim().to_string();
    };
    let after_fence = &reply[open + 3..];
    // Skip the info string (e.g. "json") up to the end of the fence line.
    let body = match after_fence.find('\n') {
        Some(newline) => &after_fence[newline + 1..],
        None => after_fence.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
    };
    let body = match body.find("```") {
        Some(close) => &body[..close],
        None => body,
    };
    body.trim().to_string()
}
