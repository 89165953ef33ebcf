//! Page payloads: initial shape per template and the merge used by content
//! updates. The ordering engine never looks inside a payload.

use serde_json::{json, Map, Value};

use crate::pages::model::PageTemplate;

impl PageTemplate {
    /// Starting payload for a freshly created page.
    pub fn initial_payload(&self, title: &str) -> Value {
        match self {
            PageTemplate::TextOnly => json!({ "content": "", "blocks": [] }),
            PageTemplate::JustLinks => json!({ "links": [], "title": title }),
            PageTemplate::JustTables => json!({
                "table": { "rows": [], "columns": [] },
                "captionTop": "",
                "captionBottom": ""
            }),
            PageTemplate::JustImages => json!({ "images": [], "captions": [] }),
            PageTemplate::Heading => json!({ "title": title, "subtitle": "" }),
            PageTemplate::Index => json!({ "content": [] }),
            PageTemplate::ImageText => json!({
                "imageUrl": "",
                "imageCaption": "",
                "content": "",
                "imagePosition": "left",
                "link": null
            }),
            PageTemplate::SplitContent => json!({ "left": {}, "right": {}, "image": {} }),
            PageTemplate::Table => json!({
                "table": { "rows": [], "columns": [] },
                "captionTop": "",
                "captionBottom": "",
                "title": title
            }),
        }
    }
}

/// Shallow key merge: top-level keys in `patch` replace those in `base`.
/// A non-object on either side is treated as an empty object.
pub fn merge_payload(base: &Value, patch: &Value) -> Value {
    let mut merged: Map<String, Value> = base.as_object().cloned().unwrap_or_default();
    if let Some(patch) = patch.as_object() {
        for (k, v) in patch {
            merged.insert(k.clone(), v.clone());
        }
    }
    Value::Object(merged)
}

/// Title carried inside a payload patch, if any.
pub fn title_from_patch(patch: &Value) -> Option<&str> {
    patch.get("title").and_then(Value::as_str)
}
