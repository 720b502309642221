//! Per-request event-loop utilization.
//!
//! "Active" time is the time spent inside `poll` of the request pipeline;
//! utilization is active time over wall-clock time. A request that holds the
//! worker thread for long stretches shows up with high values for both.

use std::future::Future;
use std::time::{Duration, Instant};

use crate::config::schema::EluMonitorConfig;
use crate::observability::metrics;

/// Run `fut` to completion, returning its output and the time spent polling it.
pub async fn measure_active<F: Future>(fut: F) -> (F::Output, Duration) {
    let mut fut = std::pin::pin!(fut);
    let mut active = Duration::ZERO;
    let output = std::future::poll_fn(|cx| {
        let started = Instant::now();
        let poll = fut.as_mut().poll(cx);
        active += started.elapsed();
        poll
    })
    .await;
    (output, active)
}

/// Utilization sample of one request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EluSample {
    pub active: Duration,
    pub elapsed: Duration,
}

impl EluSample {
    pub fn utilization(&self) -> f64 {
        if self.elapsed.is_zero() {
            return 0.0;
        }
        (self.active.as_secs_f64() / self.elapsed.as_secs_f64()).min(1.0)
    }
}

#[derive(Debug, Clone)]
pub struct EluMonitor {
    config: EluMonitorConfig,
}

impl EluMonitor {
    pub fn new(config: EluMonitorConfig) -> Self {
        Self { config }
    }

    pub fn enabled(&self) -> bool {
        self.config.enabled
    }

    /// True when the sample crosses both logging thresholds.
    pub fn exceeds_threshold(&self, sample: &EluSample) -> bool {
        let threshold = &self.config.logging.threshold;
        self.config.logging.enabled
            && sample.active >= Duration::from_millis(threshold.ela_ms)
            && sample.utilization() >= threshold.elu
    }

    pub fn observe(&self, path: &str, sample: EluSample) {
        if !self.config.enabled {
            return;
        }
        metrics::record_active_time(sample.active);

        if self.exceeds_threshold(&sample) {
            let threshold = &self.config.logging.threshold;
            tracing::warn!(
                request_path = %path,
                event_loop_active_ms = sample.active.as_millis() as u64,
                event_loop_utilization = sample.utilization(),
                "Event loop utilization for {} exceeded threshold of {}ms ({}ms out of {}ms) and {}% ({}%)",
                path,
                threshold.ela_ms,
                sample.active.as_millis(),
                sample.elapsed.as_millis(),
                (threshold.elu * 100.0).round(),
                (sample.utilization() * 100.0).round(),
            );
        }
    }
}
