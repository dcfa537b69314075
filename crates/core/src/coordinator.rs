use crate::extractor::{read_info_dictionary, PageExtractor, RawDocumentMetadata};
use crate::models::{
    now_timestamp, DocumentInfo, DocumentMetadata, ExtractionMethod, ExtractionResult, RawPage,
    UNAVAILABLE,
};
use chrono::NaiveDateTime;
use lopdf::Document;
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;
use tracing::warn;

/// The seam the indexer and scanner consume: one call per file, every
/// failure folded into the result value.
pub trait DocumentExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> ExtractionResult;
}

/// Decides between the text-layer and OCR strategies for one document.
/// The fallback is document-level: only a fully blank text extraction
/// (zero pages included) sends the whole document through OCR.
pub struct ExtractionCoordinator<T, O> {
    text: T,
    ocr: O,
}

impl<T, O> ExtractionCoordinator<T, O>
where
    T: PageExtractor,
    O: PageExtractor,
{
    pub fn new(text: T, ocr: O) -> Self {
        Self { text, ocr }
    }

    pub fn extract(&self, path: &Path) -> ExtractionResult {
        let file_size = match validate_pdf_path(path) {
            Ok(size) => size,
            Err(message) => {
                warn!(path = %path.display(), %message, "rejected before extraction");
                return ExtractionResult::failed(message);
            }
        };

        let parsed = match Document::load(path) {
            Ok(document) => document,
            Err(error) => {
                let message = format!("invalid or corrupt pdf {}: {error}", path.display());
                warn!(path = %path.display(), %error, "rejected before extraction");
                return ExtractionResult::failed(message);
            }
        };

        let metadata = clean_metadata(read_info_dictionary(&parsed));

        let text_attempt = match self.text.extract_pages(path) {
            Ok(pages) if !all_pages_blank(&pages) => Some(pages),
            Ok(_) => None,
            Err(error) => {
                warn!(path = %path.display(), %error, "text layer extraction failed, trying ocr");
                None
            }
        };

        let (pages, method) = match text_attempt {
            Some(pages) => (pages, ExtractionMethod::Text),
            None => match self.ocr.extract_pages(path) {
                Ok(pages) => (pages, ExtractionMethod::Ocr),
                Err(error) => {
                    let message = format!("extraction failed for {}: {error}", path.display());
                    warn!(path = %path.display(), %error, "ocr extraction failed");
                    return ExtractionResult::failed(message);
                }
            },
        };

        let document_info = DocumentInfo {
            page_count: pages.len() as u32,
            file_size_bytes: file_size,
            processed_at: now_timestamp(),
            extraction_method: method,
        };

        ExtractionResult {
            pages,
            metadata,
            document_info: Some(document_info),
            error: None,
        }
    }
}

impl<T, O> DocumentExtractor for ExtractionCoordinator<T, O>
where
    T: PageExtractor + Send + Sync,
    O: PageExtractor + Send + Sync,
{
    fn extract(&self, path: &Path) -> ExtractionResult {
        ExtractionCoordinator::extract(self, path)
    }
}

fn validate_pdf_path(path: &Path) -> Result<u64, String> {
    if !path.is_file() {
        return Err(format!("file does not exist: {}", path.display()));
    }

    let is_pdf = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

    if !is_pdf {
        return Err(format!("not a pdf file: {}", path.display()));
    }

    std::fs::metadata(path)
        .map(|metadata| metadata.len())
        .map_err(|error| format!("cannot stat {}: {error}", path.display()))
}

fn all_pages_blank(pages: &[RawPage]) -> bool {
    pages.iter().all(|page| page.text.trim().is_empty())
}

pub fn clean_metadata(raw: RawDocumentMetadata) -> DocumentMetadata {
    DocumentMetadata {
        author: clean_metadata_value(raw.author.as_deref()),
        title: clean_metadata_value(raw.title.as_deref()),
        creation_date: clean_metadata_value(raw.creation_date.as_deref()),
    }
}

/// Strips path-separator noise and normalizes `D:`-prefixed PDF date
/// stamps to `YYYY-MM-DD HH:MM:SS`. Absent or empty values become the
/// `unavailable` sentinel so the indexed shape stays uniform.
pub fn clean_metadata_value(value: Option<&str>) -> String {
    let Some(value) = value else {
        return UNAVAILABLE.to_string();
    };

    let cleaned = value.replace('/', "").trim().to_string();
    if cleaned.is_empty() {
        return UNAVAILABLE.to_string();
    }

    if let Some(captures) = pdf_date_regex().captures(&cleaned) {
        if let Ok(stamp) = NaiveDateTime::parse_from_str(&captures[1], "%Y%m%d%H%M%S") {
            return stamp.format("%Y-%m-%d %H:%M:%S").to_string();
        }
    }

    cleaned
}

fn pdf_date_regex() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"D:(\d{14})").expect("literal pattern"))
}
