//! Legacy report import
//!
//! Reads the structured report export (`{"pages": [...]}`) whose records carry
//! `id`, `pageNumber`, `pageType` and `title`. The full record becomes the
//! page payload.

use serde_json::Value;

use crate::error::{CmsError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct LegacyPage {
    pub page_id: String,
    pub page_number: i64,
    pub page_type: String,
    pub title: String,
    pub record: Value,
}

impl LegacyPage {
    pub fn from_record(record: Value) -> Result<Self> {
        let page_number = record
            .get("pageNumber")
            .and_then(Value::as_i64)
            .ok_or_else(|| CmsError::invalid("page record is missing pageNumber"))?;
        let page_id = match record.get("id").and_then(Value::as_str) {
            Some(id) if !id.trim().is_empty() => id.to_string(),
            _ => format!("page_{}", page_number),
        };
        let page_type = record
            .get("pageType")
            .and_then(Value::as_str)
            .unwrap_or("text-only")
            .to_string();
        let title = record
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or(page_id.as_str())
            .to_string();
        Ok(Self { page_id, page_number, page_type, title, record })
    }
}

/// Parse a whole report document.
pub fn parse_report(doc: &Value) -> Result<Vec<LegacyPage>> {
    let pages = doc
        .get("pages")
        .and_then(Value::as_array)
        .ok_or_else(|| CmsError::invalid("report document has no 'pages' array"))?;
    pages.iter().cloned().map(LegacyPage::from_record).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_report_defaults_missing_id() {
        let doc = json!({
            "pages": [
                { "id": "cover", "pageNumber": 1, "pageType": "heading", "title": "Cover" },
                { "pageNumber": 2, "pageType": "table" }
            ]
        });
        let pages = parse_report(&doc).unwrap();
        assert_eq!(pages[0].page_id, "cover");
        assert_eq!(pages[1].page_id, "page_2");
        assert_eq!(pages[1].title, "page_2");
        assert_eq!(pages[1].record["pageType"], "table");
    }

    #[test]
    fn test_missing_page_number_is_invalid() {
        let doc = json!({ "pages": [{ "id": "x" }] });
        assert!(matches!(parse_report(&doc), Err(CmsError::InvalidInput(_))));
        assert!(parse_report(&json!({})).is_err());
    }
}
