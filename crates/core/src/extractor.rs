use crate::error::IngestError;
use crate::models::RawPage;
use base64::{engine::general_purpose::STANDARD, Engine};
use lopdf::{Document, Object};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One extraction strategy. A document's pages come from exactly one
/// implementation; the coordinator decides which.
pub trait PageExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<RawPage>, IngestError>;
}

/// Pulls embedded text from the PDF text layer, one entry per page in
/// ascending page order. Pages without a text layer are kept with empty
/// text so page numbering stays gapless.
#[derive(Default)]
pub struct TextLayerExtractor;

impl PageExtractor for TextLayerExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<RawPage>, IngestError> {
        let document =
            Document::load(path).map_err(|error| IngestError::PdfParse(error.to_string()))?;

        let mut pages = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            let text = document.extract_text(&[page_no]).unwrap_or_default();
            pages.push(RawPage::text_layer(page_no, text));
        }

        Ok(pages)
    }
}

/// Raw Info-dictionary values, before any cleaning.
#[derive(Debug, Clone, Default)]
pub struct RawDocumentMetadata {
    pub author: Option<String>,
    pub title: Option<String>,
    pub creation_date: Option<String>,
}

pub fn read_info_dictionary(document: &Document) -> RawDocumentMetadata {
    let info = document
        .trailer
        .get(b"Info")
        .ok()
        .and_then(|object| match object {
            Object::Reference(id) => document.get_object(*id).ok(),
            other => Some(other),
        })
        .and_then(|object| object.as_dict().ok());

    let Some(info) = info else {
        return RawDocumentMetadata::default();
    };

    let read = |key: &[u8]| {
        info.get(key).ok().and_then(|object| match object {
            Object::String(bytes, _) => Some(decode_pdf_string(bytes)),
            _ => None,
        })
    };

    RawDocumentMetadata {
        author: read(b"Author"),
        title: read(b"Title"),
        creation_date: read(b"CreationDate"),
    }
}

/// PDF text strings are either PDFDocEncoding (treated as latin-ish
/// bytes) or UTF-16BE with a BOM.
fn decode_pdf_string(bytes: &[u8]) -> String {
    if bytes.starts_with(&[0xFE, 0xFF]) {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        String::from_utf8_lossy(bytes).into_owned()
    }
}

/// Where the OCR sidecar lives. Constructed explicitly and handed to the
/// extractor; the extractor never reads process-global state.
#[derive(Debug, Clone)]
pub struct OcrConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct OcrRequest {
    pdf_base64: String,
    source_path: String,
}

#[derive(Debug, Clone, Deserialize)]
struct OcrResponse {
    pages: Option<Vec<OcrPage>>,
    text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct OcrPage {
    #[serde(default)]
    page: Option<u32>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    confidence: Option<f32>,
}

/// Rasterize-and-OCR strategy backed by an HTTP OCR service. Without a
/// configured endpoint every call fails, which the coordinator folds
/// into the document's error result.
pub struct RemoteOcrExtractor {
    config: Option<OcrConfig>,
}

impl RemoteOcrExtractor {
    pub fn new(config: OcrConfig) -> Self {
        Self {
            config: Some(config),
        }
    }

    pub fn disabled() -> Self {
        Self { config: None }
    }
}

impl PageExtractor for RemoteOcrExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<RawPage>, IngestError> {
        let Some(config) = &self.config else {
            return Err(IngestError::OcrFailed(
                "no ocr endpoint configured".to_string(),
            ));
        };

        let pdf = std::fs::read(path).map_err(IngestError::Io)?;
        let payload = OcrRequest {
            pdf_base64: STANDARD.encode(pdf),
            source_path: path.to_string_lossy().to_string(),
        };

        // Built per call: the blocking client must stay off the async runtime.
        let mut request = Client::new()
            .post(&config.endpoint)
            .header("content-type", "application/json")
            .json(&payload);

        if let Some(api_key) = &config.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send()?;

        if !response.status().is_success() {
            return Err(IngestError::OcrFailed(format!(
                "ocr request to {} returned {}",
                config.endpoint,
                response.status()
            )));
        }

        let payload: OcrResponse = response.json()?;
        payload_to_pages(&payload, path)
    }
}

fn payload_to_pages(payload: &OcrResponse, path: &Path) -> Result<Vec<RawPage>, IngestError> {
    if let Some(listed) = &payload.pages {
        let pages = listed
            .iter()
            .enumerate()
            .map(|(index, page)| {
                let text = page
                    .text
                    .as_deref()
                    .map(str::trim)
                    .unwrap_or_default()
                    .to_string();
                let number = page.page.unwrap_or(index as u32 + 1);
                RawPage::ocr(number, text, page.confidence.unwrap_or(1.0))
            })
            .collect::<Vec<_>>();

        if pages.iter().any(|page| !page.text.is_empty()) {
            return Ok(pages);
        }
    }

    if let Some(raw_text) = &payload.text {
        let mut pages = raw_text
            .split('\u{000c}')
            .enumerate()
            .map(|(index, chunk)| RawPage::ocr(index as u32 + 1, chunk.trim(), 1.0))
            .collect::<Vec<_>>();

        while pages.last().is_some_and(|page| page.text.is_empty()) {
            pages.pop();
        }

        if pages.iter().any(|page| !page.text.is_empty()) {
            return Ok(pages);
        }
    }

    Err(IngestError::OcrFailed(format!(
        "ocr response has no readable text: {}",
        path.display()
    )))
}

#[cfg(test)]
mod tests {
    use super::{
        decode_pdf_string, payload_to_pages, OcrPage, OcrResponse, PageExtractor,
        RemoteOcrExtractor, TextLayerExtractor,
    };
    use std::path::Path;

    #[test]
    fn disabled_ocr_extractor_always_errors() {
        let extractor = RemoteOcrExtractor::disabled();
        assert!(extractor.extract_pages(Path::new("x.pdf")).is_err());
    }

    #[test]
    fn ocr_payload_keeps_blank_pages_for_gapless_numbering() {
        let response = OcrResponse {
            pages: Some(vec![
                OcrPage {
                    page: Some(1),
                    text: Some("  ".to_string()),
                    confidence: None,
                },
                OcrPage {
                    page: Some(2),
                    text: Some("Page 2".to_string()),
                    confidence: Some(0.85),
                },
            ]),
            text: None,
        };

        let pages = payload_to_pages(&response, Path::new("x.pdf")).unwrap();

        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].number, 1);
        assert_eq!(pages[0].text, "");
        assert_eq!(pages[1].number, 2);
        assert_eq!(pages[1].text, "Page 2");
        assert_eq!(pages[1].confidence, 0.85);
        assert!(pages.iter().all(|page| page.is_image));
    }

    #[test]
    fn ocr_payload_fallback_text_split_by_form_feed() {
        let response = OcrResponse {
            pages: None,
            text: Some("First\u{000C}Second\n\u{000C}".to_string()),
        };

        let pages = payload_to_pages(&response, Path::new("x.pdf")).unwrap();

        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].number, 1);
        assert_eq!(pages[0].text, "First");
        assert_eq!(pages[1].number, 2);
        assert_eq!(pages[1].text, "Second");
    }

    #[test]
    fn ocr_payload_without_any_text_is_an_error() {
        let response = OcrResponse {
            pages: Some(Vec::new()),
            text: Some("   ".to_string()),
        };

        assert!(payload_to_pages(&response, Path::new("x.pdf")).is_err());
    }

    #[test]
    fn pdf_strings_decode_utf16be_with_bom() {
        let bytes = [0xFE, 0xFF, 0x00, 0x48, 0x00, 0x69];
        assert_eq!(decode_pdf_string(&bytes), "Hi");
        assert_eq!(decode_pdf_string(b"plain"), "plain");
    }

    #[test]
    fn text_layer_extractor_rejects_garbage_files() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"%PDF-1.4\n%broken")?;

        let result = TextLayerExtractor.extract_pages(&path);
        assert!(result.is_err());
        Ok(())
    }
}
