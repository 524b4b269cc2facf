//! Best-effort fan-out of notifications to push services.

use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;

use crate::config::TrackerConfig;
use crate::error::{TrackerError, TrackerResult};
use crate::http::HttpTransport;

#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    fn name(&self) -> &str;

    async fn deliver(&self, title: &str, body: &str) -> TrackerResult<()>;
}

fn expect_ok(status: u16) -> TrackerResult<()> {
    if status == 200 {
        Ok(())
    } else {
        Err(TrackerError::Transport(status))
    }
}

/// ServerChan (sctapi.ftqq.com) push channel
pub struct ServerChanChannel {
    transport: Arc<dyn HttpTransport>,
    key: String,
}

impl ServerChanChannel {
    pub fn new(transport: Arc<dyn HttpTransport>, key: impl Into<String>) -> Self {
        Self {
            transport,
            key: key.into(),
        }
    }
}

#[async_trait]
impl DeliveryChannel for ServerChanChannel {
    fn name(&self) -> &str {
        "serverchan"
    }

    async fn deliver(&self, title: &str, body: &str) -> TrackerResult<()> {
        let url = format!(
            "https://sctapi.ftqq.com/{}.send",
            urlencoding::encode(&self.key)
        );
        let response = self
            .transport
            .post_form(&url, &[("title", title), ("desp", body)])
            .await?;
        expect_ok(response.status)
    }
}

/// PushDeer push channel, one per push key
pub struct PushDeerChannel {
    transport: Arc<dyn HttpTransport>,
    key: String,
}

impl PushDeerChannel {
    pub fn new(transport: Arc<dyn HttpTransport>, key: impl Into<String>) -> Self {
        Self {
            transport,
            key: key.into(),
        }
    }
}

#[async_trait]
impl DeliveryChannel for PushDeerChannel {
    fn name(&self) -> &str {
        "pushdeer"
    }

    async fn deliver(&self, title: &str, body: &str) -> TrackerResult<()> {
        let url = format!(
            "https://api2.pushdeer.com/message/push?pushkey={}",
            urlencoding::encode(&self.key)
        );
        let response = self
            .transport
            .post_form(&url, &[("text", title), ("desp", body), ("type", "markdown")])
            .await?;
        expect_ok(response.status)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: usize,
}

pub struct Notifier {
    channels: Vec<Arc<dyn DeliveryChannel>>,
}

impl Notifier {
    pub fn new(channels: Vec<Arc<dyn DeliveryChannel>>) -> Self {
        Self { channels }
    }

    /// Build one channel per configured push key.
    pub fn from_config(config: &TrackerConfig, transport: Arc<dyn HttpTransport>) -> Self {
        let mut channels: Vec<Arc<dyn DeliveryChannel>> = Vec::new();

        if let Some(key) = &config.sendchan_key {
            channels.push(Arc::new(ServerChanChannel::new(transport.clone(), key)));
        }
        for key in &config.pushdeer_keys {
            channels.push(Arc::new(PushDeerChannel::new(transport.clone(), key)));
        }

        tracing::info!("Configured {} notification channels", channels.len());
        Self::new(channels)
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Attempt every channel concurrently. Failures are logged and
    /// counted, never returned.
    pub async fn notify(&self, title: &str, body: &str) -> DeliveryReport {
        if self.channels.is_empty() {
            tracing::debug!("No notification channels configured, dropping \"{}\"", title);
            return DeliveryReport::default();
        }

        let attempts = self.channels.iter().map(|channel| async move {
            let result = channel.deliver(title, body).await;
            (channel.name(), result)
        });

        let mut report = DeliveryReport::default();
        for (name, result) in join_all(attempts).await {
            match result {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    tracing::error!("Notification via {} failed: {}", name, e);
                    report.failed += 1;
                }
            }
        }

        report
    }
}
