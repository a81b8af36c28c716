// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::settings::MetricsSettings;
use crate::domain::models::fetch_result::FetchMode;

/// 初始化指标系统
///
/// 未启用时不安装导出器，计数调用成为空操作。
pub fn init_metrics(settings: &MetricsSettings) {
    if !settings.enabled {
        return;
    }

    let addr: SocketAddr = match settings.listen_addr.parse() {
        Ok(addr) => addr,
        Err(e) => {
            warn!("Invalid metrics address {}: {}", settings.listen_addr, e);
            return;
        }
    };

    // Ignore error if address is already in use (for development/testing)
    if let Err(e) = PrometheusBuilder::new().with_http_listener(addr).install() {
        warn!("Failed to install Prometheus recorder: {}. This might happen if the port is already in use.", e);
        return;
    }

    describe_counter!(
        "promptscraper_scrapes_total",
        "Total number of scrape requests by terminal outcome"
    );
    describe_counter!(
        "promptscraper_attempts_total",
        "Total number of generate-execute attempts by classified result"
    );
    describe_counter!(
        "promptscraper_fetch_mode_total",
        "Total number of page acquisitions by fetch mode"
    );
    describe_histogram!(
        "promptscraper_scrape_duration_seconds",
        "Duration of scrape requests in seconds"
    );

    info!("Metrics exporter listening on {}", addr);
}

pub fn record_scrape(outcome: &'static str, elapsed: Duration) {
    counter!("promptscraper_scrapes_total", "outcome" => outcome).increment(1);
    histogram!("promptscraper_scrape_duration_seconds").record(elapsed.as_secs_f64());
}

pub fn record_attempt(result: &'static str) {
    counter!("promptscraper_attempts_total", "result" => result).increment(1);
}

pub fn record_fetch_mode(mode: FetchMode) {
    counter!("promptscraper_fetch_mode_total", "mode" => mode.as_str()).increment(1);
}
