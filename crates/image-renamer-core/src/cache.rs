use std::collections::HashMap;
use std::sync::RwLock;

use crate::types::AnalysisRecord;

/// In-memory analysis cache keyed by content fingerprint
///
/// Shared and long-lived, so reads and updates are safe under
/// concurrent access even though current callers are sequential.
#[derive(Default)]
pub struct AnalysisCache {
    inner: RwLock<HashMap<String, AnalysisRecord>>,
}

impl AnalysisCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached record for a fingerprint, if any
    pub fn get(&self, fingerprint: &str) -> Option<AnalysisRecord> {
        self.inner
            .read()
            .ok()
            .and_then(|map| map.get(fingerprint).cloned())
    }

    /// Store a copy of a successful record under its fingerprint
    pub fn insert(&self, record: &AnalysisRecord) {
        if record.fingerprint.is_empty() {
            return;
        }
        if let Ok(mut map) = self.inner.write() {
            map.insert(record.fingerprint.clone(), record.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
