//! Guide index loader with a time-based cache.
//!
//! The index is a tab-separated file with one row per source file:
//!
//! ```text
//! basename<TAB>source<TAB>guide_md<TAB>guide_json
//! server.rs<TAB>src/server.rs<TAB>guides/src/server.rs.integration.md<TAB>guides/src/server.rs.integration.json
//! ```
//!
//! Rows are parsed into an immutable snapshot that is replaced wholesale on
//! reload. Readers clone an `Arc` to the current snapshot, so a reload never
//! exposes a half-built row set. The lock is held only for that clone or
//! the pointer swap, never across file I/O.

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use crate::models::GuideIndexRow;

const HEADER_PREFIX: &str = "basename\tsource\tguide_md\tguide_json";

struct Snapshot {
    loaded_at: Option<Instant>,
    rows: Arc<Vec<GuideIndexRow>>,
}

/// Process-wide cache over the guide index file.
pub struct GuideIndex {
    path: PathBuf,
    ttl: Duration,
    snapshot: RwLock<Arc<Snapshot>>,
}

impl GuideIndex {
    pub fn new(path: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            path: path.into(),
            ttl,
            snapshot: RwLock::new(Arc::new(Snapshot {
                loaded_at: None,
                rows: Arc::new(Vec::new()),
            })),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the current rows, reloading when the snapshot is older than
    /// the TTL or holds no rows.
    ///
    /// A missing or unreadable index yields an empty set; it is never an error.
    pub async fn rows(&self) -> Arc<Vec<GuideIndexRow>> {
        let current = self.current();
        let fresh = current
            .loaded_at
            .is_some_and(|at| at.elapsed() < self.ttl);
        if fresh && !current.rows.is_empty() {
            return current.rows.clone();
        }

        let rows = Arc::new(self.load().await);
        let next = Arc::new(Snapshot {
            loaded_at: Some(Instant::now()),
            rows: rows.clone(),
        });
        *self
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner) = next;
        rows
    }

    fn current(&self) -> Arc<Snapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn load(&self) -> Vec<GuideIndexRow> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => {
                let rows = parse_index(&String::from_utf8_lossy(&bytes));
                tracing::debug!(
                    path = %self.path.display(),
                    rows = rows.len(),
                    "guide index loaded"
                );
                rows
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "guide index unreadable, treating as empty"
                );
                Vec::new()
            }
        }
    }
}

/// Parses index text into rows, skipping blank lines, the header, and any
/// line with fewer than four tab-separated fields.
pub fn parse_index(raw: &str) -> Vec<GuideIndexRow> {
    raw.lines()
        .filter(|line| !line.trim().is_empty())
        .filter(|line| !line.starts_with(HEADER_PREFIX))
        .filter_map(parse_row)
        .collect()
}

fn parse_row(line: &str) -> Option<GuideIndexRow> {
    let cols: Vec<&str> = line.split('\t').collect();
    if cols.len() < 4 {
        return None;
    }
    Some(GuideIndexRow {
        basename: cols[0].to_string(),
        source: cols[1].to_string(),
        guide_md: cols[2].to_string(),
        guide_json: cols[3].to_string(),
    })
}
