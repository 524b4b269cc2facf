use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable holding the long-lived login credential
pub const SOURCE_CREDENTIAL_VAR: &str = "OpenID_LinkingCloud";

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Long-lived credential exchanged for a session at login
    pub source_credential: Option<String>,
    pub base_url: String,
    pub sendchan_key: Option<String>,
    pub pushdeer_keys: Vec<String>,
    /// Only notify when a first-visit slot is open
    pub notify_haji_only: bool,
    /// Where snapshots and the error log live
    pub state_dir: PathBuf,
    /// File watched for source credential changes
    pub env_file: PathBuf,
    pub error_cooldown: Duration,
}

impl TrackerConfig {
    pub fn from_env() -> Result<Self> {
        let cooldown_hours: u64 = env::var("ERROR_NOTIFY_COOLDOWN_HOURS")
            .unwrap_or_else(|_| "24".to_string())
            .parse()
            .context("ERROR_NOTIFY_COOLDOWN_HOURS must be a valid number")?;

        Ok(Self {
            source_credential: non_empty(env::var(SOURCE_CREDENTIAL_VAR).ok()),
            base_url: env::var("SLOT_TRACKER_BASE_URL")
                .unwrap_or_else(|_| "https://fwcs.linkingcloud.cn".to_string()),
            sendchan_key: non_empty(env::var("SENDCHAN_KEY").ok()),
            pushdeer_keys: split_keys(&env::var("PUSHDEAR_KEYS").unwrap_or_default()),
            notify_haji_only: is_truthy(&env::var("NOTIFY_HAJI_ONLY").unwrap_or_default()),
            state_dir: env::var("SLOT_TRACKER_STATE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".")),
            env_file: env::var("SLOT_TRACKER_ENV_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".env")),
            error_cooldown: Duration::from_secs(cooldown_hours * 60 * 60),
        })
    }

    pub fn error_log_path(&self) -> PathBuf {
        self.state_dir.join("error.log.json")
    }
}

/// Read the source credential straight from a dotenv file.
///
/// The process environment is left untouched; the watcher calls this on
/// every change and hands the result to the session manager.
pub fn read_source_credential(env_file: &Path) -> Result<Option<String>> {
    let iter = dotenvy::from_path_iter(env_file)
        .with_context(|| format!("Failed to open {}", env_file.display()))?;

    let mut found = None;
    for item in iter {
        let (key, value) = item.context("Malformed line in env file")?;
        if key == SOURCE_CREDENTIAL_VAR {
            found = non_empty(Some(value));
        }
    }

    Ok(found)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn split_keys(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn is_truthy(raw: &str) -> bool {
    let raw = raw.trim();
    !raw.is_empty() && raw != "0" && !raw.eq_ignore_ascii_case("false")
}
