// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::code_generator::{CodeGenerator, RepairContext};
use super::result_normalizer::ResultNormalizer;
use crate::domain::models::execution_outcome::{ExecutionFailure, ExecutionOutcome};
use crate::domain::models::fetch_result::{FetchMode, FetchResult};
use crate::domain::models::generated_code::GeneratedCode;
use crate::domain::models::scrape_request::ScrapeRequest;
use crate::domain::models::scrape_result::ScrapeResult;
use crate::domain::models::Record;
use crate::engines::traits::PageSource;
use crate::infrastructure::metrics;
use crate::sandbox::Sandbox;
use crate::utils::errors::{FetchError, ModelError, ScrapeError};

/// 修复循环状态
///
/// `Succeeded` 和 `Aborted` 是终止状态。
#[derive(Debug)]
pub enum LoopState {
    Fetching,
    Generating {
        fetch: FetchResult,
        prior: Option<(GeneratedCode, ExecutionFailure)>,
    },
    Executing {
        fetch: FetchResult,
        code: GeneratedCode,
    },
    Repairing {
        fetch: FetchResult,
        code: GeneratedCode,
        failure: ExecutionFailure,
    },
    Succeeded {
        fetch_mode: FetchMode,
        records: Vec<Record>,
    },
    Aborted {
        error: ScrapeError,
    },
}

/// 驱动状态迁移的事件
#[derive(Debug)]
pub enum LoopEvent {
    Fetched(FetchResult),
    FetchFailed(FetchError),
    Generated(GeneratedCode),
    ModelFailed(ModelError),
    Executed(ExecutionOutcome),
    /// 取消或整体超时
    Interrupted(ScrapeError),
}

impl LoopState {
    pub fn name(&self) -> &'static str {
        match self {
            LoopState::Fetching => "fetching",
            LoopState::Generating { .. } => "generating",
            LoopState::Executing { .. } => "executing",
            LoopState::Repairing { .. } => "repairing",
            LoopState::Succeeded { .. } => "succeeded",
            LoopState::Aborted { .. } => "aborted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, LoopState::Succeeded { .. } | LoopState::Aborted { .. })
    }

    /// 状态迁移
    ///
    /// 纯函数，不做 I/O。执行失败时只有在 `attempt_index + 1 < max_attempts` 时才进入修复，
    /// 因此生成加执行的轮数不会超过 `max_attempts`。成功但没有记录视为 `empty_result`。
    pub fn transition(self, event: LoopEvent, max_attempts: u32) -> LoopState {
        if self.is_terminal() {
            return self;
        }

        match (self, event) {
            (_, LoopEvent::Interrupted(error)) => LoopState::Aborted { error },

            (LoopState::Fetching, LoopEvent::Fetched(fetch)) => {
                LoopState::Generating { fetch, prior: None }
            }
            (LoopState::Fetching, LoopEvent::FetchFailed(error)) => LoopState::Aborted {
                error: ScrapeError::Fetch(error),
            },

            (LoopState::Generating { fetch, .. }, LoopEvent::Generated(code)) => {
                LoopState::Executing { fetch, code }
            }
            (LoopState::Generating { .. }, LoopEvent::ModelFailed(error)) => LoopState::Aborted {
                error: ScrapeError::Model(error),
            },

            (LoopState::Executing { fetch, code }, LoopEvent::Executed(outcome)) => {
                let failure = match outcome {
                    ExecutionOutcome::Success { records } if !records.is_empty() => {
                        return LoopState::Succeeded {
                            fetch_mode: fetch.mode,
                            records,
                        };
                    }
                    ExecutionOutcome::Success { .. } => ExecutionFailure::empty_result(),
                    ExecutionOutcome::Failure(failure) => failure,
                };

                let attempts = code.attempt_index() + 1;
                if attempts < max_attempts {
                    LoopState::Repairing {
                        fetch,
                        code,
                        failure,
                    }
                } else {
                    LoopState::Aborted {
                        error: ScrapeError::ExecutionExhausted {
                            attempts,
                            kind: failure.kind,
                            detail: failure.detail,
                        },
                    }
                }
            }

            (state, event) => LoopState::Aborted {
                error: ScrapeError::Internal(format!(
                    "unexpected event {} in state {}",
                    event.name(),
                    state.name()
                )),
            },
        }
    }

    /// `Repairing -> Generating`，携带上一次的程序和失败
    pub fn repair(self) -> LoopState {
        match self {
            LoopState::Repairing {
                fetch,
                code,
                failure,
            } => LoopState::Generating {
                fetch,
                prior: Some((code, failure)),
            },
            other => other,
        }
    }
}

impl LoopEvent {
    fn name(&self) -> &'static str {
        match self {
            LoopEvent::Fetched(_) => "fetched",
            LoopEvent::FetchFailed(_) => "fetch_failed",
            LoopEvent::Generated(_) => "generated",
            LoopEvent::ModelFailed(_) => "model_failed",
            LoopEvent::Executed(_) => "executed",
            LoopEvent::Interrupted(_) => "interrupted",
        }
    }
}

/// 一次生成加执行的记录，只保存在内存中
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptRecord {
    pub attempt_index: u32,
    pub failure: Option<ExecutionFailure>,
    pub records: usize,
}

/// 一次完整运行的结果
#[derive(Debug, Clone)]
pub struct ScrapeRun {
    pub result: ScrapeResult,
    pub attempts: Vec<AttemptRecord>,
    /// 抓取失败时为 `None`
    pub fetch_mode: Option<FetchMode>,
}

/// 修复循环
///
/// 抓取 → 生成 → 执行 →（失败时）修复 → 再执行，最多 `max_attempts` 轮。
/// 每个挂起点都与取消信号和整体截止时间竞争；无论哪条路径结束，都只产生一个 `ScrapeResult`。
pub struct RepairLoop {
    source: Arc<dyn PageSource>,
    generator: CodeGenerator,
    sandbox: Arc<dyn Sandbox>,
    normalizer: ResultNormalizer,
    max_attempts: u32,
    request_timeout: Duration,
}

impl RepairLoop {
    pub fn new(
        source: Arc<dyn PageSource>,
        generator: CodeGenerator,
        sandbox: Arc<dyn Sandbox>,
        max_attempts: u32,
        request_timeout: Duration,
    ) -> Self {
        Self {
            source,
            generator,
            sandbox,
            normalizer: ResultNormalizer::new(),
            max_attempts: max_attempts.max(1),
            request_timeout,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// 运行修复循环
    ///
    /// # 参数
    /// * `request` - 已校验的抓取请求
    /// * `cancel` - 调用方断开时触发的取消信号
    ///
    /// # 返回值
    /// * `ScrapeRun` - 最终结果、尝试记录和实际抓取模式
    pub async fn run(&self, request: &ScrapeRequest, cancel: &CancellationToken) -> ScrapeRun {
        let started = Instant::now();
        let deadline = tokio::time::Instant::now() + self.request_timeout;
        let mut attempts: Vec<AttemptRecord> = Vec::new();
        let mut fetch_mode = None;
        let mut state = LoopState::Fetching;

        let outcome = loop {
            debug!(state = state.name(), "Repair loop step");
            state = match state {
                LoopState::Fetching => {
                    let event = match self
                        .interruptible(self.source.acquire(&request.url), cancel, deadline)
                        .await
                    {
                        Ok(Ok(fetch)) => {
                            fetch_mode = Some(fetch.mode);
                            metrics::record_fetch_mode(fetch.mode);
                            info!(
                                mode = %fetch.mode,
                                bytes = fetch.content.len(),
                                fetch_ms = fetch.fetch_time.as_millis() as u64,
                                "Page acquired"
                            );
                            LoopEvent::Fetched(fetch)
                        }
                        Ok(Err(error)) => LoopEvent::FetchFailed(error),
                        Err(interrupt) => LoopEvent::Interrupted(interrupt),
                    };
                    LoopState::Fetching.transition(event, self.max_attempts)
                }
                LoopState::Generating { fetch, prior } => {
                    let repair = prior
                        .as_ref()
                        .map(|(code, failure)| RepairContext { code, failure });
                    let event = match self
                        .interruptible(
                            self.generator.generate(request, &fetch.content, repair),
                            cancel,
                            deadline,
                        )
                        .await
                    {
                        Ok(Ok(code)) => LoopEvent::Generated(code),
                        Ok(Err(error)) => LoopEvent::ModelFailed(error),
                        Err(interrupt) => LoopEvent::Interrupted(interrupt),
                    };
                    LoopState::Generating { fetch, prior }.transition(event, self.max_attempts)
                }
                LoopState::Executing { fetch, code } => {
                    let event = match self
                        .interruptible(
                            self.sandbox.execute(&code, &fetch.content),
                            cancel,
                            deadline,
                        )
                        .await
                    {
                        Ok(outcome) => {
                            attempts.push(record_attempt(&code, &outcome));
                            LoopEvent::Executed(outcome)
                        }
                        Err(interrupt) => LoopEvent::Interrupted(interrupt),
                    };
                    LoopState::Executing { fetch, code }.transition(event, self.max_attempts)
                }
                repairing @ LoopState::Repairing { .. } => repairing.repair(),
                LoopState::Succeeded { records, .. } => {
                    break self
                        .normalizer
                        .normalize(records, request.format)
                        .map_err(ScrapeError::from);
                }
                LoopState::Aborted { error } => break Err(error),
            };
        };

        let elapsed = started.elapsed();
        let result = match outcome {
            Ok(normalized) => {
                info!(
                    total_results = normalized.total_results,
                    attempts = attempts.len(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Scrape succeeded"
                );
                metrics::record_scrape("success", elapsed);
                ScrapeResult::succeeded(normalized, elapsed)
            }
            Err(error) => {
                warn!(
                    error = %error,
                    attempts = attempts.len(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Scrape failed"
                );
                metrics::record_scrape(error.label(), elapsed);
                ScrapeResult::failed(&error, elapsed)
            }
        };

        ScrapeRun {
            result,
            attempts,
            fetch_mode,
        }
    }

    /// 在取消信号和截止时间之前等待 `future`
    async fn interruptible<F: Future>(
        &self,
        future: F,
        cancel: &CancellationToken,
        deadline: tokio::time::Instant,
    ) -> Result<F::Output, ScrapeError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ScrapeError::Cancelled),
            _ = tokio::time::sleep_until(deadline) => {
                Err(ScrapeError::DeadlineExceeded(self.request_timeout))
            }
            output = future => Ok(output),
        }
    }
}

fn record_attempt(code: &GeneratedCode, outcome: &ExecutionOutcome) -> AttemptRecord {
    let (failure, records, label) = match outcome {
        ExecutionOutcome::Success { records } if !records.is_empty() => {
            (None, records.len(), "success")
        }
        ExecutionOutcome::Success { .. } => (
            Some(ExecutionFailure::empty_result()),
            0,
            "empty_result",
        ),
        ExecutionOutcome::Failure(failure) => (Some(failure.clone()), 0, failure.kind.as_str()),
    };
    match &failure {
        Some(f) => info!(attempt = code.attempt_index(), kind = %f.kind, detail = %f.detail, "Attempt failed"),
        None => info!(attempt = code.attempt_index(), records, "Attempt succeeded"),
    }
    metrics::record_attempt(label);
    AttemptRecord {
        attempt_index: code.attempt_index(),
        failure,
        records,
    }
}

#[cfg(test)]
#[path = "repair_loop_test.rs"]
mod tests;
