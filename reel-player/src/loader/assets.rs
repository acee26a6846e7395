//! Resolved asset handles
//!
//! A downloaded manifest entry becomes an `AssetHandle` served by this
//! process at `/assets/{id}`. Only the loader inserts handles; everyone else
//! gets a read-only `ResolvedAssets` clone. Handles are never revoked while
//! the process runs.

use axum::body::Bytes;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Locally playable copy of a remote resource
#[derive(Debug, Clone)]
pub struct AssetHandle {
    pub id: u64,
    pub source_ref: String,
    /// Local URI clients play from
    pub uri: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

#[derive(Debug, Default)]
struct AssetTable {
    by_ref: HashMap<String, Arc<AssetHandle>>,
    by_id: HashMap<u64, Arc<AssetHandle>>,
    next_id: u64,
}

/// Shared map `source_ref -> AssetHandle`
#[derive(Debug, Clone, Default)]
pub struct ResolvedAssets {
    inner: Arc<RwLock<AssetTable>>,
}

impl ResolvedAssets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a handle for a finished download
    ///
    /// Re-publishing the same reference replaces the bytes but keeps the id.
    pub(crate) fn publish(
        &self,
        source_ref: &str,
        bytes: Vec<u8>,
        content_type: Option<String>,
    ) -> Arc<AssetHandle> {
        let mut table = self.inner.write().unwrap_or_else(|e| e.into_inner());

        let id = match table.by_ref.get(source_ref) {
            Some(existing) => existing.id,
            None => {
                let id = table.next_id;
                table.next_id += 1;
                id
            }
        };

        let handle = Arc::new(AssetHandle {
            id,
            source_ref: source_ref.to_string(),
            uri: format!("/assets/{}", id),
            content_type,
            bytes: Bytes::from(bytes),
        });

        table.by_ref.insert(source_ref.to_string(), Arc::clone(&handle));
        table.by_id.insert(id, Arc::clone(&handle));
        handle
    }

    /// Playable reference for `source_ref`
    ///
    /// Total: a resolution miss returns the original reference.
    pub fn resolve(&self, source_ref: &str) -> String {
        let table = self.inner.read().unwrap_or_else(|e| e.into_inner());
        table
            .by_ref
            .get(source_ref)
            .map(|h| h.uri.clone())
            .unwrap_or_else(|| source_ref.to_string())
    }

    pub fn get(&self, source_ref: &str) -> Option<Arc<AssetHandle>> {
        let table = self.inner.read().unwrap_or_else(|e| e.into_inner());
        table.by_ref.get(source_ref).cloned()
    }

    pub fn get_by_id(&self, id: u64) -> Option<Arc<AssetHandle>> {
        let table = self.inner.read().unwrap_or_else(|e| e.into_inner());
        table.by_id.get(&id).cloned()
    }
}
