use index::MetadataFilter;
use serde::{Deserialize, Serialize};

use crate::AssistantError;

/// Coarse topic hint supplied by the caller; narrows retrieval with a metadata filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextTag {
    #[default]
    General,
    People,
    Documents,
    Departments,
}

impl ContextTag {
    /// The retrieval filter implied by this tag. `General` searches everything.
    pub fn filter(&self) -> Option<MetadataFilter> {
        match self {
            ContextTag::General => None,
            ContextTag::People => Some(MetadataFilter::new().contains("source_url", "people")),
            ContextTag::Documents => {
                Some(MetadataFilter::new().contains("source_url", "DocumentCenter"))
            }
            ContextTag::Departments => {
                Some(MetadataFilter::new().contains("source_title", "Department"))
            }
        }
    }
}

/// A validated, immutable request to the assistant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawQueryContext")]
pub struct QueryContext {
    query_text: String,
    context_tag: ContextTag,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata_filter: Option<MetadataFilter>,
}

#[derive(Deserialize)]
struct RawQueryContext {
    query_text: String,
    #[serde(default)]
    context_tag: ContextTag,
    #[serde(default)]
    metadata_filter: Option<MetadataFilter>,
}

impl TryFrom<RawQueryContext> for QueryContext {
    type Error = AssistantError;

    fn try_from(raw: RawQueryContext) -> Result<Self, Self::Error> {
        let mut ctx = QueryContext::new(raw.query_text)?.with_tag(raw.context_tag);
        ctx.metadata_filter = raw.metadata_filter;
        Ok(ctx)
    }
}

impl QueryContext {
    /// Trim `query_text` and reject it when nothing is left.
    pub fn new(query_text: impl Into<String>) -> Result<Self, AssistantError> {
        let text = query_text.into();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(AssistantError::InvalidQuery(
                "query text must not be empty".into(),
            ));
        }
        Ok(Self {
            query_text: trimmed.to_string(),
            context_tag: ContextTag::General,
            metadata_filter: None,
        })
    }

    pub fn with_tag(mut self, tag: ContextTag) -> Self {
        self.context_tag = tag;
        self
    }

    /// An explicit filter wins over the tag's filter.
    pub fn with_filter(mut self, filter: MetadataFilter) -> Self {
        self.metadata_filter = Some(filter);
        self
    }

    pub fn query_text(&self) -> &str {
        &self.query_text
    }

    pub fn context_tag(&self) -> ContextTag {
        self.context_tag
    }

    pub fn metadata_filter(&self) -> Option<&MetadataFilter> {
        self.metadata_filter.as_ref()
    }

    /// Filter to send to the vector store.
    pub fn effective_filter(&self) -> Option<MetadataFilter> {
        self.metadata_filter
            .clone()
            .or_else(|| self.context_tag.filter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use index::Condition;
    use serde_json::json;

    #[test]
    fn rejects_blank_queries() {
        assert!(matches!(
            QueryContext::new("   \n"),
            Err(AssistantError::InvalidQuery(_))
        ));
        assert!(matches!(
            QueryContext::new(""),
            Err(AssistantError::InvalidQuery(_))
        ));
    }

    #[test]
    fn trims_query_text() {
        let ctx = QueryContext::new("  When is trash day?  ").unwrap();
        assert_eq!(ctx.query_text(), "When is trash day?");
        assert_eq!(ctx.context_tag(), ContextTag::General);
        assert!(ctx.effective_filter().is_none());
    }

    #[test]
    fn tag_selects_filter() {
        let ctx = QueryContext::new("zoning board")
            .unwrap()
            .with_tag(ContextTag::Departments);
        let filter = ctx.effective_filter().unwrap();
        assert_eq!(
            filter.conditions("source_title"),
            &[Condition::Contains("Department".into())]
        );
    }

    #[test]
    fn explicit_filter_overrides_tag() {
        let ctx = QueryContext::new("minutes")
            .unwrap()
            .with_tag(ContextTag::People)
            .with_filter(MetadataFilter::new().eq("year", 2024));
        let filter = ctx.effective_filter().unwrap();
        assert!(filter.conditions("source_url").is_empty());
        assert_eq!(filter.conditions("year"), &[Condition::Eq(json!(2024))]);
    }

    #[test]
    fn deserialization_validates() {
        let ok: QueryContext =
            serde_json::from_value(json!({"query_text": " parks ", "context_tag": "documents"}))
                .unwrap();
        assert_eq!(ok.query_text(), "parks");
        assert_eq!(ok.context_tag(), ContextTag::Documents);

        let bad = serde_json::from_value::<QueryContext>(json!({"query_text": "  "}));
        assert!(bad.is_err());
    }
}
