//! Page entity and request/response shapes

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CmsError, Result};

/// A stored page row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page {
    pub page_id: String,
    pub page_number: i64,
    pub position: i64,
    pub page_type: String,
    pub page_template: String,
    pub title: String,
    pub page_data: Value,
    pub updated_by: String,
    pub updated_at: String,
    pub is_deleted: bool,
}

/// Listing row; payload omitted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PageSummary {
    pub page_id: String,
    pub page_number: i64,
    pub position: i64,
    pub page_type: String,
    pub page_template: String,
    pub title: String,
    pub is_deleted: bool,
}

/// Placement relative to an existing page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PositionParams {
    #[serde(alias = "pageId")]
    pub reference_page_id: Option<String>,
    #[serde(default)]
    pub insert_before: bool,
}

impl PositionParams {
    pub fn before(page_id: impl Into<String>) -> Self {
        Self { reference_page_id: Some(page_id.into()), insert_before: true }
    }

    pub fn after(page_id: impl Into<String>) -> Self {
        Self { reference_page_id: Some(page_id.into()), insert_before: false }
    }
}

/// Placement hints, resolved by the allocator in priority order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Placement {
    pub position_params: Option<PositionParams>,
    pub insert_after_page_id: Option<String>,
    pub position: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct CreatePageRequest {
    #[serde(default)]
    pub template: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub page_id: Option<String>,
    #[serde(default)]
    pub initial_payload: Option<Value>,
    #[serde(default)]
    pub position: Option<i64>,
    #[serde(default)]
    pub insert_after_page_id: Option<String>,
    #[serde(default)]
    pub position_params: Option<PositionParams>,
    #[serde(default)]
    pub updated_by: Option<String>,
}

impl CreatePageRequest {
    pub fn new(template: impl Into<String>, title: impl Into<String>) -> Self {
        Self { template: template.into(), title: title.into(), ..Default::default() }
    }

    pub fn with_page_id(mut self, page_id: impl Into<String>) -> Self {
        self.page_id = Some(page_id.into());
        self
    }

    pub fn with_position_params(mut self, params: PositionParams) -> Self {
        self.position_params = Some(params);
        self
    }

    pub fn with_insert_after(mut self, page_id: impl Into<String>) -> Self {
        self.insert_after_page_id = Some(page_id.into());
        self
    }

    pub fn with_position(mut self, position: i64) -> Self {
        self.position = Some(position);
        self
    }

    pub fn placement(&self) -> Placement {
        Placement {
            position_params: self.position_params.clone(),
            insert_after_page_id: self.insert_after_page_id.clone(),
            position: self.position,
        }
    }

    /// Validates required fields and resolves the template.
    pub fn validate(&self) -> Result<PageTemplate> {
        if self.title.trim().is_empty() {
            return Err(CmsError::invalid("template and title are required"));
        }
        if let Some(id) = &self.page_id {
            if id.trim().is_empty() {
                return Err(CmsError::invalid("page_id must not be blank"));
            }
        }
        PageTemplate::parse(&self.template)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreatedPage {
    pub page_id: String,
    pub page_number: i64,
    pub position: i64,
    pub template: String,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct UpdatePageRequest {
    #[serde(default)]
    pub page_data: Option<Value>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub updated_by: Option<String>,
}

/// Template kinds a page can be created from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum PageTemplate {
    TextOnly,
    JustLinks,
    JustTables,
    JustImages,
    Heading,
    Index,
    ImageText,
    SplitContent,
    Table,
}

impl PageTemplate {
    pub const ALL: [PageTemplate; 9] = [
        PageTemplate::TextOnly,
        PageTemplate::JustLinks,
        PageTemplate::JustTables,
        PageTemplate::JustImages,
        PageTemplate::Heading,
        PageTemplate::Index,
        PageTemplate::ImageText,
        PageTemplate::SplitContent,
        PageTemplate::Table,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            PageTemplate::TextOnly => "text-only",
            PageTemplate::JustLinks => "just-links",
            PageTemplate::JustTables => "just-tables",
            PageTemplate::JustImages => "just-images",
            PageTemplate::Heading => "heading",
            PageTemplate::Index => "index",
            PageTemplate::ImageText => "image-text",
            PageTemplate::SplitContent => "split-content",
            PageTemplate::Table => "table",
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.id() == raw.trim())
            .ok_or_else(|| CmsError::invalid(format!("unknown template '{}'", raw)))
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            PageTemplate::TextOnly => "Text Only",
            PageTemplate::JustLinks => "Just Links",
            PageTemplate::JustTables => "Just Tables",
            PageTemplate::JustImages => "Just Images",
            PageTemplate::Heading => "Heading",
            PageTemplate::Index => "Index",
            PageTemplate::ImageText => "Image + Text",
            PageTemplate::SplitContent => "Split Content + Image",
            PageTemplate::Table => "Table",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            PageTemplate::TextOnly => "Page with just text content",
            PageTemplate::JustLinks => "Page with only links/list",
            PageTemplate::JustTables => "Page with table and optional text above/below",
            PageTemplate::JustImages => "Page with images and optional captions",
            PageTemplate::Heading => "Title and subtitle heading page",
            PageTemplate::Index => "List of linked items",
            PageTemplate::ImageText => "Flexible image and text positioning",
            PageTemplate::SplitContent => "Content on left/right with image",
            PageTemplate::Table => "Primary table page type",
        }
    }
}

impl std::fmt::Display for PageTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TemplateInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    /// Payload a page of this template starts with, untitled
    pub initial_payload: Value,
}

impl From<PageTemplate> for TemplateInfo {
    fn from(t: PageTemplate) -> Self {
        Self {
            id: t.id(),
            name: t.display_name(),
            description: t.description(),
            initial_payload: t.initial_payload(""),
        }
    }
}
