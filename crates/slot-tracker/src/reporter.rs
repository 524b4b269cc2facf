//! Failure path shared by every task: log, throttle, maybe notify.

use chrono::{DateTime, Local, Utc};
use std::sync::Arc;

use crate::error::TrackerError;
use crate::notifier::Notifier;
use crate::throttle::ErrorThrottle;

pub const ERROR_TITLE: &str = "脚本运行出错";

pub struct ErrorReporter {
    throttle: Arc<ErrorThrottle>,
    notifier: Arc<Notifier>,
}

impl ErrorReporter {
    pub fn new(throttle: Arc<ErrorThrottle>, notifier: Arc<Notifier>) -> Self {
        Self { throttle, notifier }
    }

    pub async fn report(&self, context: &str, error: &TrackerError) -> bool {
        self.report_at(context, error, Utc::now()).await
    }

    /// Returns whether a notification went out.
    pub async fn report_at(&self, context: &str, error: &TrackerError, now: DateTime<Utc>) -> bool {
        if matches!(error, TrackerError::AuthRejected) {
            tracing::debug!("{}: {} (handled by re-login)", context, error);
            return false;
        }

        if !self.throttle.should_notify_at(context, error, now).await {
            tracing::error!("{}: {} (notification suppressed)", context, error);
            return false;
        }

        tracing::error!("{}: {}", context, error);

        let local = now
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string();
        let body = format!(
            "运行时间: {}\n错误类型: {}\n错误信息: {}",
            local, context, error
        );
        self.notifier.notify(ERROR_TITLE, &body).await;

        true
    }
}
