pub mod coordinator;
pub mod discovery;
pub mod error;
pub mod extractor;
pub mod indexer;
pub mod models;
pub mod scanner;
pub mod search;
pub mod stores;
pub mod traits;

pub use coordinator::{clean_metadata_value, DocumentExtractor, ExtractionCoordinator};
pub use discovery::{discover_pdf_files, relative_path_for};
pub use error::{IngestError, SearchError};
pub use extractor::{OcrConfig, PageExtractor, RemoteOcrExtractor, TextLayerExtractor};
pub use indexer::{ingest_file, BatchIndexer, DEFAULT_MAX_WORKERS};
pub use models::{
    BatchRunSummary, DocumentHit, DocumentInfo, DocumentMetadata, DocumentRecord,
    ExtractionMethod, ExtractionResult, FailedFile, Fuzziness, HighlightConfig, NewFilesReport,
    Operator, PageHit, RawPage, SearchResults, UNAVAILABLE,
};
pub use scanner::{NewFilesScanner, INDEXED_PATHS_PAGE_SIZE};
pub use search::{assemble_results, build_exact_query, build_fuzzy_query, build_match_all_query};
pub use stores::OpenSearchStore;
pub use traits::DocumentStore;
