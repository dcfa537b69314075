use crate::error::SearchError;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Sentinel stored in place of missing or unparsable metadata values so
/// every indexed document carries the same field shape.
pub const UNAVAILABLE: &str = "unavailable";

/// One extracted page. Exactly one extraction strategy produces all
/// pages of a document; strategies are never mixed per page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPage {
    pub number: u32,
    #[serde(rename = "content")]
    pub text: String,
    pub is_image: bool,
    pub confidence: f32,
}

impl RawPage {
    pub fn text_layer(number: u32, text: impl Into<String>) -> Self {
        Self {
            number,
            text: text.into(),
            is_image: false,
            confidence: 1.0,
        }
    }

    pub fn ocr(number: u32, text: impl Into<String>, confidence: f32) -> Self {
        Self {
            number,
            text: text.into(),
            is_image: true,
            confidence,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExtractionMethod {
    Text,
    Ocr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub author: String,
    pub title: String,
    pub creation_date: String,
}

impl Default for DocumentMetadata {
    fn default() -> Self {
        Self {
            author: UNAVAILABLE.to_string(),
            title: UNAVAILABLE.to_string(),
            creation_date: UNAVAILABLE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub page_count: u32,
    pub file_size_bytes: u64,
    pub processed_at: String,
    pub extraction_method: ExtractionMethod,
}

/// Outcome of one extraction attempt. A failed attempt carries no pages
/// and no document info, only the error message.
#[derive(Debug, Clone)]
pub struct ExtractionResult {
    pub pages: Vec<RawPage>,
    pub metadata: DocumentMetadata,
    pub document_info: Option<DocumentInfo>,
    pub error: Option<String>,
}

impl ExtractionResult {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            pages: Vec::new(),
            metadata: DocumentMetadata::default(),
            document_info: None,
            error: Some(message.into()),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// The unit persisted to the store, addressed by its relative path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub filename: String,
    pub absolute_path: String,
    pub relative_path: String,
    pub directory_structure: String,
    pub pages: Vec<RawPage>,
    pub total_pages: u32,
    pub metadata: DocumentMetadata,
    pub document_info: DocumentInfo,
    pub indexed_at: String,
}

impl DocumentRecord {
    /// Store identifier: stable per root-directory scan, re-indexing the
    /// same relative path overwrites the prior record.
    pub fn id(&self) -> &str {
        &self.relative_path
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchRunSummary {
    pub total_files: usize,
    pub successful: usize,
    pub failed: usize,
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedFile {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NewFilesReport {
    pub total_found: usize,
    pub total_processed: usize,
    pub processed_files: Vec<String>,
    pub failed_files: Vec<FailedFile>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PageHit {
    pub page_number: u32,
    pub content: String,
    pub highlights: Vec<String>,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentHit {
    pub filename: String,
    pub relative_path: String,
    pub total_pages: u32,
    pub metadata: DocumentMetadata,
    pub score: Option<f64>,
    pub matching_pages: Vec<PageHit>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchResults {
    pub total_hits: u64,
    pub results: Vec<DocumentHit>,
}

/// Allowed edit distance for approximate matching. Anything outside the
/// enum is rejected before a store call is issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fuzziness {
    #[default]
    Auto,
    Zero,
    One,
    Two,
}

impl Fuzziness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Fuzziness::Auto => "AUTO",
            Fuzziness::Zero => "0",
            Fuzziness::One => "1",
            Fuzziness::Two => "2",
        }
    }
}

impl FromStr for Fuzziness {
    type Err = SearchError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "AUTO" => Ok(Fuzziness::Auto),
            "0" => Ok(Fuzziness::Zero),
            "1" => Ok(Fuzziness::One),
            "2" => Ok(Fuzziness::Two),
            other => Err(SearchError::InvalidParameter {
                parameter: "fuzziness",
                value: other.to_string(),
                allowed: "AUTO, 0, 1, 2",
            }),
        }
    }
}

/// Boolean combination of query terms, case-insensitive on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Operator {
    And,
    #[default]
    Or,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::And => "AND",
            Operator::Or => "OR",
        }
    }
}

impl FromStr for Operator {
    type Err = SearchError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_uppercase().as_str() {
            "AND" => Ok(Operator::And),
            "OR" => Ok(Operator::Or),
            _ => Err(SearchError::InvalidParameter {
                parameter: "operator",
                value: value.to_string(),
                allowed: "AND, OR",
            }),
        }
    }
}

/// Highlight fragment contract shared with existing front-ends: the
/// marker pair, fragment count, and fragment size must stay stable.
#[derive(Debug, Clone)]
pub struct HighlightConfig {
    pub pre_tag: String,
    pub post_tag: String,
    pub fragment_count: u32,
    pub fragment_size: u32,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            pre_tag: "<mark>".to_string(),
            post_tag: "</mark>".to_string(),
            fragment_count: 3,
            fragment_size: 150,
        }
    }
}

pub(crate) fn now_timestamp() -> String {
    Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fuzziness_rejects_values_outside_enum() {
        assert!("AUTO".parse::<Fuzziness>().is_ok());
        assert_eq!("1".parse::<Fuzziness>().unwrap(), Fuzziness::One);

        let error = "3".parse::<Fuzziness>().unwrap_err();
        assert!(error.is_client_error());
    }

    #[test]
    fn operator_is_case_insensitive() {
        assert_eq!("and".parse::<Operator>().unwrap(), Operator::And);
        assert_eq!("Or".parse::<Operator>().unwrap(), Operator::Or);
        assert!("XOR".parse::<Operator>().is_err());
    }

    #[test]
    fn page_text_serializes_as_content() {
        let page = RawPage::text_layer(1, "hello");
        let value = serde_json::to_value(&page).unwrap();
        assert_eq!(value["content"], "hello");
        assert_eq!(value["number"], 1);
        assert_eq!(value["is_image"], false);
    }

    #[test]
    fn extraction_method_uses_wire_names() {
        assert_eq!(
            serde_json::to_value(ExtractionMethod::Ocr).unwrap(),
            serde_json::json!("OCR")
        );
        assert_eq!(
            serde_json::to_value(ExtractionMethod::Text).unwrap(),
            serde_json::json!("TEXT")
        );
    }

    #[test]
    fn failed_extraction_has_no_pages() {
        let result = ExtractionResult::failed("corrupt file");
        assert!(result.is_failed());
        assert!(result.pages.is_empty());
        assert!(result.document_info.is_none());
    }
}
