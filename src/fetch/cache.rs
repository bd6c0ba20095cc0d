//! Page cache in the raw layer.
//!
//! Each page fetched from the network is stored as
//! `{raw_dir}/gastos_page_{n}.json` holding the `results` array verbatim
//! (pretty-printed, non-ASCII preserved), next to a cursor sidecar
//! `{raw_dir}/gastos_page_{n}.cursor.json` that records the page's `next`
//! pointer. A present artifact is authoritative: the fetcher never asks the
//! network for that index again.

use opendal::{ErrorKind, Operator};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::FetchError;
use crate::Record;

/// Next-page pointer stored alongside a cached page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub next: Option<String>,
}

/// A page read back from the cache.
#[derive(Debug, Clone)]
pub struct CachedPage {
    pub records: Vec<Record>,
    /// `None` when the artifact has no cursor sidecar
    pub cursor: Option<Cursor>,
}

#[derive(Clone)]
pub struct PageCache {
    operator: Operator,
    dir: String,
}

impl PageCache {
    pub fn new(operator: Operator, dir: &str) -> Self {
        Self {
            operator,
            dir: dir.trim_end_matches('/').to_string(),
        }
    }

    pub fn artifact_path(&self, page: u32) -> String {
        format!("{}/gastos_page_{}.json", self.dir, page)
    }

    pub fn cursor_path(&self, page: u32) -> String {
        format!("{}/gastos_page_{}.cursor.json", self.dir, page)
    }

    /// Read a cached page. Returns `Ok(None)` on a cache miss.
    pub async fn load(&self, page: u32) -> Result<Option<CachedPage>, FetchError> {
        let path = self.artifact_path(page);
        let Some(bytes) = self.read_optional(page, &path).await? else {
            return Ok(None);
        };

        let records: Vec<Record> = serde_json::from_slice(&bytes)
            .map_err(|source| FetchError::CorruptCache { page, path, source })?;

        let cursor_path = self.cursor_path(page);
        let cursor = match self.read_optional(page, &cursor_path).await? {
            Some(bytes) => Some(serde_json::from_slice::<Cursor>(&bytes).map_err(|source| {
                FetchError::CorruptCache {
                    page,
                    path: cursor_path,
                    source,
                }
            })?),
            None => None,
        };

        Ok(Some(CachedPage { records, cursor }))
    }

    /// Persist a freshly fetched page.
    ///
    /// The cursor is written first; the artifact appearing is what marks the
    /// page as cached, so an interrupted store is just a miss on the next run.
    pub async fn store(
        &self,
        page: u32,
        records: &[Record],
        next: Option<&str>,
    ) -> Result<(), FetchError> {
        let cursor = Cursor {
            next: next.map(str::to_string),
        };
        let cursor_bytes = serde_json::to_vec_pretty(&cursor)
            .map_err(|source| FetchError::Serialize { page, source })?;
        self.write(page, self.cursor_path(page), cursor_bytes).await?;

        let artifact = serde_json::to_vec_pretty(records)
            .map_err(|source| FetchError::Serialize { page, source })?;
        let path = self.artifact_path(page);
        debug!(page, path = %path, bytes = artifact.len(), "Caching page");
        self.write(page, path, artifact).await
    }

    async fn read_optional(&self, page: u32, path: &str) -> Result<Option<Vec<u8>>, FetchError> {
        match self.operator.read(path).await {
            Ok(buffer) => Ok(Some(buffer.to_vec())),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(FetchError::CacheRead {
                page,
                path: path.to_string(),
                source,
            }),
        }
    }

    async fn write(&self, page: u32, path: String, bytes: Vec<u8>) -> Result<(), FetchError> {
        match self.operator.write(&path, bytes).await {
            Ok(_) => Ok(()),
            Err(source) => Err(FetchError::CacheWrite { page, path, source }),
        }
    }
}
