//! Last-result snapshots, one JSON file per query kind.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::error::{TrackerError, TrackerResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    /// Code catalog
    Catalog,
    /// Doctors with open slots in one department
    Department,
    /// Open slots of one doctor, flattened across days
    Doctor,
}

impl QueryKind {
    /// Named after the upstream endpoint the snapshot came from
    pub fn file_stem(&self) -> &'static str {
        match self {
            QueryKind::Catalog => "OrderDeptResources",
            QueryKind::Department => "OrderDocResources",
            QueryKind::Doctor => "OrderDocNoSources",
        }
    }
}

pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, kind: QueryKind) -> PathBuf {
        self.dir
            .join(format!("{}.last_result.json", kind.file_stem()))
    }

    /// The previous snapshot, or `None` if there is none or it cannot be
    /// read. Read failures are logged and treated as "no snapshot".
    pub async fn load<T: DeserializeOwned>(&self, kind: QueryKind) -> Option<T> {
        let path = self.path_for(kind);

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!("Failed to read {}: {}", path.display(), e);
                return None;
            }
        };

        match serde_json::from_str(&content) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Failed to parse {}: {}", path.display(), e);
                None
            }
        }
    }

    pub async fn save<T: Serialize>(&self, kind: QueryKind, value: &T) -> TrackerResult<()> {
        let json = serde_json::to_string(value).map_err(TrackerError::persistence)?;

        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(self.path_for(kind), json).await?;

        tracing::debug!("Saved {} snapshot", kind.file_stem());
        Ok(())
    }
}
