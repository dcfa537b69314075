use crate::coordinator::DocumentExtractor;
use crate::discovery::{discover_pdf_files, relative_path_for};
use crate::models::{now_timestamp, BatchRunSummary, DocumentInfo, DocumentMetadata, DocumentRecord, RawPage};
use crate::traits::DocumentStore;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

pub const DEFAULT_MAX_WORKERS: usize = 4;

/// Drives concurrent extraction and indexing across a directory tree.
/// Per-file failures are recorded, never propagated: a run always
/// completes and returns a summary.
pub struct BatchIndexer<S, E> {
    store: Arc<S>,
    extractor: Arc<E>,
    max_workers: usize,
}

impl<S, E> BatchIndexer<S, E>
where
    S: DocumentStore + Send + Sync + 'static,
    E: DocumentExtractor + 'static,
{
    pub fn new(store: Arc<S>, extractor: Arc<E>) -> Self {
        Self {
            store,
            extractor,
            max_workers: DEFAULT_MAX_WORKERS,
        }
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }

    pub async fn process_directory(&self, root: &Path) -> BatchRunSummary {
        let files = discover_pdf_files(root);

        if files.is_empty() {
            return BatchRunSummary {
                message: Some(format!("no pdf files found in {}", root.display())),
                ..Default::default()
            };
        }

        let total_files = files.len();
        info!(total_files, root = %root.display(), max_workers = self.max_workers, "starting batch indexing run");

        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let mut tasks = JoinSet::new();

        for path in files {
            let store = Arc::clone(&self.store);
            let extractor = Arc::clone(&self.extractor);
            let semaphore = Arc::clone(&semaphore);
            let root = root.to_path_buf();

            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|error| format!("worker pool closed: {error}"))?;
                ingest_file(store.as_ref(), extractor, &root, &path)
                    .await
                    .map(|_record| ())
            });
        }

        // Single aggregating consumer; workers share no mutable state.
        let mut summary = BatchRunSummary {
            total_files,
            ..Default::default()
        };

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => summary.successful += 1,
                Ok(Err(message)) => {
                    warn!(%message, "file failed during batch run");
                    summary.failed += 1;
                    summary.errors.push(message);
                }
                Err(join_error) => {
                    warn!(%join_error, "indexing worker crashed");
                    summary.failed += 1;
                    summary.errors.push(format!("indexing worker crashed: {join_error}"));
                }
            }
        }

        info!(
            successful = summary.successful,
            failed = summary.failed,
            "batch indexing run finished"
        );
        summary
    }
}

/// The single-document ingestion path shared by the batch indexer and
/// the incremental scanner: extract, build the record, upsert. A file
/// only counts as indexed once the store write succeeded.
pub async fn ingest_file<S, E>(
    store: &S,
    extractor: Arc<E>,
    root: &Path,
    path: &Path,
) -> Result<DocumentRecord, String>
where
    S: DocumentStore + Sync + ?Sized,
    E: DocumentExtractor + 'static,
{
    let owned_path = path.to_path_buf();
    let extraction = tokio::task::spawn_blocking(move || extractor.extract(&owned_path))
        .await
        .map_err(|error| format!("extraction task crashed for {}: {error}", path.display()))?;

    if let Some(error) = extraction.error {
        return Err(error);
    }

    let Some(document_info) = extraction.document_info else {
        return Err(format!(
            "extraction produced no document info for {}",
            path.display()
        ));
    };

    let record = build_record(root, path, extraction.pages, extraction.metadata, document_info)?;

    store.upsert(&record).await.map_err(|error| {
        format!("indexing failed for {}: {error}", record.relative_path)
    })?;

    Ok(record)
}

fn build_record(
    root: &Path,
    path: &Path,
    pages: Vec<RawPage>,
    metadata: DocumentMetadata,
    document_info: DocumentInfo,
) -> Result<DocumentRecord, String> {
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| format!("path missing filename: {}", path.display()))?
        .to_string();

    let absolute_path = path
        .canonicalize()
        .unwrap_or_else(|_| path.to_path_buf())
        .to_string_lossy()
        .to_string();

    let directory_structure = path
        .parent()
        .map(|parent| parent.to_string_lossy().to_string())
        .unwrap_or_default();

    let total_pages = pages.len() as u32;

    Ok(DocumentRecord {
        filename,
        absolute_path,
        relative_path: relative_path_for(path, root),
        directory_structure,
        pages,
        total_pages,
        metadata,
        document_info,
        indexed_at: now_timestamp(),
    })
}


#[cfg(test)]
mod tests {
    use super::test_support::FakeStore;
    use super::*;
    use crate::coordinator::DocumentExtractor;
    use crate::models::{ExtractionMethod, ExtractionResult};
    use std::fs;
    use std::sync::Arc;
    use tempfile::tempdir;

    /// Keys behavior off the file name: `scan*` pretends to be a pure
    /// image document, `bad*` fails extraction, everything else yields
    /// two text pages.
    struct FakeExtractor;

    impl FakeExtractor {
        fn result_for(path: &Path) -> ExtractionResult {
            let name = path
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or_default();

            if name.starts_with("bad") {
                return ExtractionResult::failed(format!("unreadable file: {name}"));
            }

            let (pages, method) = if name.starts_with("scan") {
                (
                    vec![
                        RawPage::ocr(1, "scanned one", 0.9),
                        RawPage::ocr(2, "scanned two", 0.8),
                        RawPage::ocr(3, "scanned three", 0.85),
                    ],
                    ExtractionMethod::Ocr,
                )
            } else {
                (
                    vec![
                        RawPage::text_layer(1, "first page"),
                        RawPage::text_layer(2, "second page"),
                    ],
                    ExtractionMethod::Text,
                )
            };

            ExtractionResult {
                document_info: Some(DocumentInfo {
                    page_count: pages.len() as u32,
                    file_size_bytes: 10,
                    processed_at: "2024-01-12 23:59:59".to_string(),
                    extraction_method: method,
                }),
                pages,
                metadata: DocumentMetadata::default(),
                error: None,
            }
        }
    }

    impl DocumentExtractor for FakeExtractor {
        fn extract(&self, path: &Path) -> ExtractionResult {
            Self::result_for(path)
        }
    }

    fn indexer(store: Arc<FakeStore>) -> BatchIndexer<FakeStore, FakeExtractor> {
        BatchIndexer::new(store, Arc::new(FakeExtractor)).with_max_workers(2)
    }

    #[tokio::test]
    async fn empty_directory_is_a_noop_with_message() {
        let dir = tempdir().unwrap();
        let store = Arc::new(FakeStore::default());

        let summary = indexer(Arc::clone(&store)).process_directory(dir.path()).await;

        assert_eq!(summary.total_files, 0);
        assert!(summary.message.is_some());
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn mixed_text_and_scanned_documents_both_index() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.pdf"), b"%PDF").unwrap();
        fs::write(dir.path().join("scan-b.pdf"), b"%PDF").unwrap();

        let store = Arc::new(FakeStore::default());
        let summary = indexer(Arc::clone(&store)).process_directory(dir.path()).await;

        assert_eq!(summary.total_files, 2);
        assert_eq!(summary.successful, 2);
        assert_eq!(summary.failed, 0);

        let text_doc = store.get("a.pdf").unwrap();
        assert_eq!(
            text_doc.document_info.extraction_method,
            ExtractionMethod::Text
        );
        assert_eq!(text_doc.total_pages, 2);

        let scanned = store.get("scan-b.pdf").unwrap();
        assert_eq!(
            scanned.document_info.extraction_method,
            ExtractionMethod::Ocr
        );
        assert_eq!(scanned.total_pages, 3);
        assert_eq!(
            scanned.pages.iter().map(|page| page.number).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[tokio::test]
    async fn failures_are_isolated_and_counted() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.pdf"), b"%PDF").unwrap();
        fs::write(dir.path().join("bad-b.pdf"), b"%PDF").unwrap();
        fs::write(dir.path().join("c.pdf"), b"%PDF").unwrap();

        let store = Arc::new(FakeStore::failing_on(&["c.pdf"]));
        let summary = indexer(Arc::clone(&store)).process_directory(dir.path()).await;

        assert_eq!(summary.total_files, 3);
        assert_eq!(summary.successful, 1);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.successful + summary.failed, summary.total_files);
        assert_eq!(summary.errors.len(), 2);
        // The store write that failed must not leave a record behind.
        assert!(store.get("c.pdf").is_none());
        assert!(store.get("a.pdf").is_some());
    }

    #[tokio::test]
    async fn reindexing_the_same_path_overwrites_in_place() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("reports");
        fs::create_dir(&nested).unwrap();
        fs::write(nested.join("a.pdf"), b"%PDF").unwrap();

        let store = Arc::new(FakeStore::default());
        let batch = indexer(Arc::clone(&store));

        let first = batch.process_directory(dir.path()).await;
        let second = batch.process_directory(dir.path()).await;

        assert_eq!(first.successful, 1);
        assert_eq!(second.successful, 1);
        // Same relative path, one document: last write wins.
        assert_eq!(store.len(), 1);
    }
}
