use crate::models::{
    DocumentHit, DocumentMetadata, Fuzziness, HighlightConfig, Operator, PageHit, SearchResults,
};
use serde_json::{json, Value};
use tracing::warn;

/// Outer hits returned per search, matching what existing clients page
/// through.
const RESULT_WINDOW: usize = 10;

fn inner_hit_highlight(highlight: &HighlightConfig) -> Value {
    json!({
        "highlight": {
            "fields": {
                "pages.content": {
                    "number_of_fragments": highlight.fragment_count,
                    "fragment_size": highlight.fragment_size,
                    "pre_tags": [highlight.pre_tag],
                    "post_tags": [highlight.post_tag]
                }
            }
        }
    })
}

/// Approximate match against page content, scoped to the nested page
/// structure so highlights come from the matching page only.
pub fn build_fuzzy_query(
    term: &str,
    fuzziness: Fuzziness,
    operator: Operator,
    highlight: &HighlightConfig,
) -> Value {
    json!({
        "query": {
            "nested": {
                "path": "pages",
                "query": {
                    "bool": {
                        "should": [
                            {
                                "match": {
                                    "pages.content": {
                                        "query": term,
                                        "fuzziness": fuzziness.as_str(),
                                        "operator": operator.as_str(),
                                    }
                                }
                            }
                        ]
                    }
                },
                "inner_hits": inner_hit_highlight(highlight)
            }
        },
        "_source": ["filename", "relative_path", "total_pages", "metadata", "pages"],
        "size": RESULT_WINDOW
    })
}

/// Phrase match against page content, no fuzziness.
pub fn build_exact_query(term: &str, highlight: &HighlightConfig) -> Value {
    json!({
        "query": {
            "nested": {
                "path": "pages",
                "query": {
                    "bool": {
                        "should": [
                            {
                                "match_phrase": {
                                    "pages.content": term
                                }
                            }
                        ]
                    }
                },
                "inner_hits": inner_hit_highlight(highlight)
            }
        },
        "_source": ["filename", "relative_path", "total_pages", "metadata", "pages"],
        "size": RESULT_WINDOW
    })
}

/// Termless search: every document, document-level fields only.
pub fn build_match_all_query() -> Value {
    json!({
        "query": {"match_all": {}},
        "_source": ["filename", "relative_path", "total_pages", "metadata"]
    })
}

/// Flattens an engine response into the client-facing shape. A hit
/// missing a required field is logged and skipped; one malformed record
/// never fails the whole response.
pub fn assemble_results(response: &Value, term: Option<&str>) -> SearchResults {
    let total_hits = response
        .pointer("/hits/total/value")
        .and_then(Value::as_u64)
        .unwrap_or(0);

    let hits = response
        .pointer("/hits/hits")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut results = Vec::new();

    for hit in &hits {
        match document_from_hit(hit, term) {
            Some(document) => results.push(document),
            None => {
                let id = hit.pointer("/_id").and_then(Value::as_str).unwrap_or("?");
                warn!(document_id = %id, "skipping malformed search hit");
            }
        }
    }

    SearchResults {
        total_hits,
        results,
    }
}

fn document_from_hit(hit: &Value, term: Option<&str>) -> Option<DocumentHit> {
    let source = hit.pointer("/_source")?;
    let filename = source.pointer("/filename")?.as_str()?.to_string();
    let relative_path = source.pointer("/relative_path")?.as_str()?.to_string();
    let total_pages = source.pointer("/total_pages")?.as_u64()? as u32;
    let metadata: DocumentMetadata =
        serde_json::from_value(source.pointer("/metadata")?.clone()).ok()?;

    let matching_pages = if term.is_some() {
        matching_pages_from_hit(hit)
    } else {
        Vec::new()
    };

    Some(DocumentHit {
        filename,
        relative_path,
        total_pages,
        metadata,
        score: hit.pointer("/_score").and_then(Value::as_f64),
        matching_pages,
    })
}

/// Inner hits carry their own relevance score, independent of the outer
/// document score.
fn matching_pages_from_hit(hit: &Value) -> Vec<PageHit> {
    let inner_hits = hit
        .pointer("/inner_hits/pages/hits/hits")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    inner_hits
        .iter()
        .filter_map(|inner| {
            let page_number = inner.pointer("/_source/number")?.as_u64()? as u32;
            let content = inner
                .pointer("/_source/content")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let highlights = inner
                .pointer("/highlight/pages.content")
                .and_then(Value::as_array)
                .map(|fragments| {
                    fragments
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();

            Some(PageHit {
                page_number,
                content,
                highlights,
                score: inner.pointer("/_score").and_then(Value::as_f64),
            })
        })
        .collect()
}
