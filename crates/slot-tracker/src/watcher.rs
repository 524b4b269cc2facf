//! Live reload of the source credential from the dotenv file.

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::config::{read_source_credential, SOURCE_CREDENTIAL_VAR};
use crate::session::SessionManager;

#[derive(Debug, PartialEq, Eq)]
pub enum SourceReload {
    /// New source installed, cached session dropped
    Replaced,
    /// File has no usable source credential; session left as is
    Missing,
    Unreadable,
}

/// Re-read `env_file` and hand its source credential to the session.
pub fn reload_source(env_file: &Path, session: &SessionManager) -> SourceReload {
    match read_source_credential(env_file) {
        Ok(Some(source)) => {
            session.replace_source(source);
            tracing::info!("{} changed, session credential cleared", env_file.display());
            SourceReload::Replaced
        }
        Ok(None) => {
            tracing::warn!(
                "{} no longer sets {}, keeping the current session",
                env_file.display(),
                SOURCE_CREDENTIAL_VAR
            );
            SourceReload::Missing
        }
        Err(e) => {
            tracing::warn!("Failed to reload {}: {:#}", env_file.display(), e);
            SourceReload::Unreadable
        }
    }
}

fn touches_file(event: &Event, file_name: &OsString) -> bool {
    matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
        && event
            .paths
            .iter()
            .any(|path| path.file_name() == Some(file_name.as_os_str()))
}

/// Watch `env_file` and reload the source credential whenever it changes.
///
/// The parent directory is watched so editors that replace the file
/// instead of writing in place are still seen. The returned watcher must
/// be kept alive for as long as reloading is wanted.
pub fn watch_credential_source(
    env_file: PathBuf,
    session: Arc<SessionManager>,
) -> Result<RecommendedWatcher> {
    let file_name = env_file
        .file_name()
        .map(|name| name.to_os_string())
        .with_context(|| format!("{} does not name a file", env_file.display()))?;
    let dir = match env_file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let (tx, mut rx) = mpsc::unbounded_channel();

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) if touches_file(&event, &file_name) => {
            let _ = tx.send(());
        }
        Ok(_) => {}
        Err(e) => tracing::warn!("File watch error: {}", e),
    })
    .context("Failed to create file watcher")?;

    watcher
        .watch(&dir, RecursiveMode::NonRecursive)
        .with_context(|| format!("Failed to watch {}", dir.display()))?;

    tracing::info!("Watching {} for credential changes", env_file.display());

    tokio::spawn(async move {
        while rx.recv().await.is_some() {
            // One save often arrives as several events
            while rx.try_recv().is_ok() {}
            reload_source(&env_file, &session);
        }
    });

    Ok(watcher)
}
