use shared_types::DeptCatalog;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Names known before the catalog has been fetched
const BUILTIN_NAMES: &[(&str, &str)] = &[
    ("1001_1_1207_633", "廖力维"),
    ("1001_1_1207_922", "金金"),
    ("1001_1_1207_1322", "李冠军"),
    ("1001_1_1207", "成人ADHD咨询"),
];

/// Display names for hospital, department and doctor codes.
pub struct NameDirectory {
    names: RwLock<HashMap<String, String>>,
}

impl NameDirectory {
    pub fn with_builtin() -> Self {
        let names = BUILTIN_NAMES
            .iter()
            .map(|(code, name)| (code.to_string(), name.to_string()))
            .collect();

        Self {
            names: RwLock::new(names),
        }
    }

    /// Merge catalog entries, overwriting existing names.
    pub fn update_from_catalog(&self, catalog: &DeptCatalog) -> usize {
        let entries = catalog.named_codes();
        let mut names = self.names.write().unwrap_or_else(PoisonError::into_inner);

        for (code, name) in &entries {
            tracing::debug!("Catalog name: {} - {}", code, name);
            names.insert(code.to_string(), name.to_string());
        }

        entries.len()
    }

    /// Name for `code`, or the code itself when unknown
    pub fn display_name(&self, code: &str) -> String {
        self.names
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(code)
            .cloned()
            .unwrap_or_else(|| code.to_string())
    }
}

impl Default for NameDirectory {
    fn default() -> Self {
        Self::with_builtin()
    }
}
