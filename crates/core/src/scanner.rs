use crate::coordinator::DocumentExtractor;
use crate::discovery::{discover_pdf_files, relative_path_for};
use crate::error::SearchError;
use crate::indexer::ingest_file;
use crate::models::{FailedFile, NewFilesReport};
use crate::traits::DocumentStore;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Upper bound on the indexed-path listing. Corpora above this cap are
/// not paginated; the scan warns instead of silently missing files.
pub const INDEXED_PATHS_PAGE_SIZE: usize = 10_000;

/// Diffs the indexed document set against the filesystem and ingests
/// only the delta. Already-indexed paths are never re-processed, even
/// when their bytes changed on disk.
pub struct NewFilesScanner<S, E> {
    store: Arc<S>,
    extractor: Arc<E>,
}

impl<S, E> NewFilesScanner<S, E>
where
    S: DocumentStore + Send + Sync,
    E: DocumentExtractor + 'static,
{
    pub fn new(store: Arc<S>, extractor: Arc<E>) -> Self {
        Self { store, extractor }
    }

    /// The set of relative paths the store already knows about.
    pub async fn indexed_paths(&self) -> Result<HashSet<String>, SearchError> {
        let body = json!({
            "query": {"match_all": {}},
            "_source": ["relative_path"],
            "size": INDEXED_PATHS_PAGE_SIZE
        });

        let response = self.store.search(&body).await?;
        let hits = response
            .pointer("/hits/hits")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        if hits.len() >= INDEXED_PATHS_PAGE_SIZE {
            warn!(
                cap = INDEXED_PATHS_PAGE_SIZE,
                "indexed-path listing filled the page-size cap; documents beyond it are invisible to this scan"
            );
        }

        Ok(hits
            .iter()
            .filter_map(|hit| {
                hit.pointer("/_source/relative_path")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .collect())
    }

    pub fn find_new_files(&self, root: &Path, indexed: &HashSet<String>) -> Vec<PathBuf> {
        discover_pdf_files(root)
            .into_iter()
            .filter(|path| !indexed.contains(&relative_path_for(path, root)))
            .collect()
    }

    pub async fn find_and_process_new_files(
        &self,
        root: &Path,
    ) -> Result<NewFilesReport, SearchError> {
        let indexed = self.indexed_paths().await?;
        let new_files = self.find_new_files(root, &indexed);

        info!(
            indexed = indexed.len(),
            total_found = new_files.len(),
            root = %root.display(),
            "incremental scan"
        );

        let mut report = NewFilesReport {
            total_found: new_files.len(),
            ..Default::default()
        };

        if new_files.is_empty() {
            return Ok(report);
        }

        for path in new_files {
            let relative = relative_path_for(&path, root);
            match ingest_file(self.store.as_ref(), Arc::clone(&self.extractor), root, &path).await
            {
                Ok(_record) => {
                    report.processed_files.push(relative);
                    report.total_processed += 1;
                }
                Err(error) => {
                    warn!(path = %relative, %error, "new file failed to ingest");
                    report.failed_files.push(FailedFile {
                        path: relative,
                        error,
                    });
                }
            }
        }

        // Without this, searches issued right after the scan may not see
        // the documents just written.
        self.store.refresh().await?;

        Ok(report)
    }
}
