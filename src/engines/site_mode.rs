// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

use crate::config::settings::SiteModeSettings;
use crate::domain::models::fetch_result::{FetchMode, FetchResult};
use crate::engines::page_fetcher::PageFetcher;
use crate::engines::traits::PageSource;
use crate::utils::errors::FetchError;
use crate::utils::html::{element_visible_text, visible_text};

/// 单页应用常见的挂载点
static MOUNT_POINTS: Lazy<Option<Selector>> = Lazy::new(|| {
    Selector::parse("#root, #app, #__next, #__nuxt, [data-reactroot], [ng-app]").ok()
});

static EXTERNAL_SCRIPTS: Lazy<Option<Selector>> =
    Lazy::new(|| Selector::parse("script[src]").ok());

/// 静态内容充分性阈值
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SiteModeThresholds {
    pub min_content_bytes: usize,
    pub min_text_chars: usize,
}

impl Default for SiteModeThresholds {
    fn default() -> Self {
        Self {
            min_content_bytes: 512,
            min_text_chars: 100,
        }
    }
}

impl From<&SiteModeSettings> for SiteModeThresholds {
    fn from(settings: &SiteModeSettings) -> Self {
        Self {
            min_content_bytes: settings.min_content_bytes,
            min_text_chars: settings.min_text_chars,
        }
    }
}

/// 静态内容不足的原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Insufficiency {
    TooSmall { bytes: usize, min: usize },
    TooLittleText { chars: usize, min: usize },
    ClientRenderedShell,
}

impl fmt::Display for Insufficiency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Insufficiency::TooSmall { bytes, min } => {
                write!(f, "content is {} bytes, below {}", bytes, min)
            }
            Insufficiency::TooLittleText { chars, min } => {
                write!(f, "visible text is {} chars, below {}", chars, min)
            }
            Insufficiency::ClientRenderedShell => f.write_str("page is a client-rendered shell"),
        }
    }
}

/// 判断静态内容是否不足
///
/// 返回 `None` 表示静态内容可以直接使用。
pub fn assess(content: &str, thresholds: &SiteModeThresholds) -> Option<Insufficiency> {
    if content.len() < thresholds.min_content_bytes {
        return Some(Insufficiency::TooSmall {
            bytes: content.len(),
            min: thresholds.min_content_bytes,
        });
    }

    let document = Html::parse_document(content);
    let chars = visible_text(&document).chars().count();
    if chars < thresholds.min_text_chars {
        return Some(Insufficiency::TooLittleText {
            chars,
            min: thresholds.min_text_chars,
        });
    }

    if is_client_rendered_shell(&document) {
        return Some(Insufficiency::ClientRenderedShell);
    }

    None
}

/// 在阻塞线程池上执行 [`assess`]
///
/// 解析大页面会占用较长的 CPU 时间，不放在异步执行器上。
pub async fn assess_blocking(
    content: &str,
    thresholds: SiteModeThresholds,
) -> Option<Insufficiency> {
    let content = content.to_owned();
    match tokio::task::spawn_blocking(move || assess(&content, &thresholds)).await {
        Ok(verdict) => verdict,
        Err(e) => {
            warn!(error = %e, "Content assessment failed, keeping static content");
            None
        }
    }
}

fn is_client_rendered_shell(document: &Html) -> bool {
    let (Some(mounts), Some(scripts)) = (MOUNT_POINTS.as_ref(), EXTERNAL_SCRIPTS.as_ref()) else {
        return false;
    };
    let has_scripts = document.select(scripts).next().is_some();
    has_scripts
        && document
            .select(mounts)
            .any(|mount| element_visible_text(mount).is_empty())
}

/// 站点模式选择器
///
/// 先做一次静态抓取；内容不足或静态抓取失败时升级为动态渲染。
pub struct SiteModeSelector {
    fetcher: Arc<PageFetcher>,
    thresholds: SiteModeThresholds,
}

impl SiteModeSelector {
    pub fn new(fetcher: Arc<PageFetcher>, thresholds: SiteModeThresholds) -> Self {
        Self {
            fetcher,
            thresholds,
        }
    }

    /// 决定 URL 应使用的抓取模式
    ///
    /// 只进行静态试抓取，不执行动态渲染。动态渲染被禁用时总是返回静态模式。
    pub async fn select(&self, url: &Url) -> FetchMode {
        if !self.fetcher.supports_dynamic() {
            return FetchMode::Static;
        }
        match self.fetcher.fetch(url, FetchMode::Static).await {
            Ok(result) => match assess_blocking(&result.content, self.thresholds).await {
                None => FetchMode::Static,
                Some(_) => FetchMode::Dynamic,
            },
            Err(_) => FetchMode::Dynamic,
        }
    }
}

#[async_trait]
impl PageSource for SiteModeSelector {
    async fn acquire(&self, url: &Url) -> Result<FetchResult, FetchError> {
        let static_outcome = self.fetcher.fetch(url, FetchMode::Static).await;

        match static_outcome {
            Ok(result) => {
                let Some(reason) = assess_blocking(&result.content, self.thresholds).await else {
                    return Ok(result);
                };
                if !self.fetcher.supports_dynamic() {
                    info!(url = %url, reason = %reason, "Static content looks insufficient, dynamic rendering disabled");
                    return Ok(result);
                }
                info!(url = %url, reason = %reason, "Escalating to dynamic rendering");
                match self.fetcher.fetch(url, FetchMode::Dynamic).await {
                    Ok(rendered) => Ok(rendered),
                    Err(e) => {
                        warn!(url = %url, error = %e, "Dynamic rendering failed, using static content");
                        Ok(result)
                    }
                }
            }
            Err(static_error) => {
                if !self.fetcher.supports_dynamic() {
                    return Err(static_error);
                }
                warn!(url = %url, error = %static_error, "Static fetch failed, escalating to dynamic rendering");
                self.fetcher
                    .fetch(url, FetchMode::Dynamic)
                    .await
                    .map_err(|dynamic_error| FetchError::exhausted(&static_error, &dynamic_error))
            }
        }
    }
}
