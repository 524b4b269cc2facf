//! Per-signature suppression of failure notifications.
//!
//! A signature is `"<context>:<message>"`. The first occurrence of a
//! signature notifies; repeats stay quiet until the cooldown has elapsed.
//! Timestamps are persisted so a restart does not reopen the window.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::error::{TrackerError, TrackerResult};

/// Signature -> last notification time in epoch milliseconds
type NotifiedAt = BTreeMap<String, i64>;

pub struct ErrorThrottle {
    path: Option<PathBuf>,
    cooldown_ms: i64,
    entries: Mutex<NotifiedAt>,
}

impl ErrorThrottle {
    /// Load persisted timestamps from `path`. A missing or unreadable
    /// file starts an empty log.
    pub async fn load(path: PathBuf, cooldown: Duration) -> Self {
        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(content) => match serde_json::from_str::<NotifiedAt>(&content) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!("Ignoring unreadable error log {}: {}", path.display(), e);
                    NotifiedAt::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => NotifiedAt::new(),
            Err(e) => {
                tracing::warn!("Failed to read error log {}: {}", path.display(), e);
                NotifiedAt::new()
            }
        };

        tracing::debug!("Loaded {} error signatures", entries.len());

        Self {
            path: Some(path),
            cooldown_ms: cooldown_millis(cooldown),
            entries: Mutex::new(entries),
        }
    }

    /// A throttle that never touches disk.
    pub fn in_memory(cooldown: Duration) -> Self {
        Self {
            path: None,
            cooldown_ms: cooldown_millis(cooldown),
            entries: Mutex::new(NotifiedAt::new()),
        }
    }

    pub fn signature(context: &str, error: &dyn Display) -> String {
        format!("{}:{}", context, error)
    }

    pub async fn should_notify(&self, context: &str, error: &(dyn Display + Sync)) -> bool {
        self.should_notify_at(context, error, Utc::now()).await
    }

    /// Decide for an occurrence at `now`, recording it when it notifies.
    ///
    /// The lock is held across check, record and persist, so two
    /// concurrent failures with one signature cannot both pass.
    pub async fn should_notify_at(
        &self,
        context: &str,
        error: &(dyn Display + Sync),
        now: DateTime<Utc>,
    ) -> bool {
        let key = Self::signature(context, error);
        let now_ms = now.timestamp_millis();

        let mut entries = self.entries.lock().await;
        let due = match entries.get(&key) {
            None => true,
            Some(&last) => now_ms - last > self.cooldown_ms,
        };
        if !due {
            return false;
        }

        entries.insert(key, now_ms);
        if let Err(e) = self.persist(&entries).await {
            tracing::warn!("Failed to save error log: {}", e);
        }

        true
    }

    pub async fn last_notified(
        &self,
        context: &str,
        error: &(dyn Display + Sync),
    ) -> Option<i64> {
        let key = Self::signature(context, error);
        self.entries.lock().await.get(&key).copied()
    }

    async fn persist(&self, entries: &NotifiedAt) -> TrackerResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let json = serde_json::to_string(entries).map_err(TrackerError::persistence)?;
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await?;
        }
        tokio::fs::write(path, json).await?;
        Ok(())
    }
}

fn cooldown_millis(cooldown: Duration) -> i64 {
    i64::try_from(cooldown.as_millis()).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    fn at(hour: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap() + chrono::Duration::hours(hour)
    }

    #[tokio::test]
    async fn test_repeat_within_window_suppressed() {
        let throttle = ErrorThrottle::in_memory(DAY);
        let err = TrackerError::Transport(502);

        assert!(throttle.should_notify_at("HTTP request error", &err, at(0)).await);
        assert!(!throttle.should_notify_at("HTTP request error", &err, at(1)).await);
        assert!(!throttle.should_notify_at("HTTP request error", &err, at(24)).await);
    }

    #[tokio::test]
    async fn test_after_window_notifies_and_resets() {
        let throttle = ErrorThrottle::in_memory(DAY);
        let err = TrackerError::Transport(502);

        assert!(throttle.should_notify_at("ctx", &err, at(0)).await);
        assert!(throttle.should_notify_at("ctx", &err, at(25)).await);
        assert_eq!(
            throttle.last_notified("ctx", &err).await,
            Some(at(25).timestamp_millis())
        );
        assert!(!throttle.should_notify_at("ctx", &err, at(30)).await);
    }

    #[tokio::test]
    async fn test_signatures_are_independent() {
        let throttle = ErrorThrottle::in_memory(DAY);

        assert!(throttle.should_notify_at("a", &TrackerError::Transport(500), at(0)).await);
        assert!(throttle.should_notify_at("b", &TrackerError::Transport(500), at(0)).await);
        assert!(throttle.should_notify_at("a", &TrackerError::Transport(503), at(0)).await);
    }

    #[tokio::test]
    async fn test_window_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("error.log.json");
        let err = TrackerError::Application("系统维护中".into());

        let throttle = ErrorThrottle::load(path.clone(), DAY).await;
        assert!(throttle.should_notify_at("API response error", &err, at(0)).await);

        let reloaded = ErrorThrottle::load(path.clone(), DAY).await;
        assert!(!reloaded.should_notify_at("API response error", &err, at(2)).await);

        let saved: NotifiedAt =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(
            saved.get("API response error:系统维护中"),
            Some(&at(0).timestamp_millis())
        );
    }

    #[tokio::test]
    async fn test_corrupt_log_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("error.log.json");
        std::fs::write(&path, "not json").unwrap();

        let throttle = ErrorThrottle::load(path, DAY).await;
        assert!(throttle.should_notify_at("ctx", &"boom", at(0)).await);
    }

    #[tokio::test]
    async fn test_check_runs_on_spawned_task() {
        let throttle = std::sync::Arc::new(ErrorThrottle::in_memory(DAY));

        let handle = tokio::spawn({
            let throttle = throttle.clone();
            async move {
                let err = TrackerError::Transport(504);
                throttle.should_notify("HTTP request error", &err).await
            }
        });

        assert!(handle.await.unwrap());
        assert!(throttle
            .last_notified("HTTP request error", &TrackerError::Transport(504))
            .await
            .is_some());
    }
}
