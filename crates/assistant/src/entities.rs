//! Curated facts about officeholders, answered without retrieval.

use index::RetrievedDocument;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityFact {
    /// Lowercase phrase that must appear in the query, e.g. `"police chief"`.
    pub name: String,
    pub answer: String,
}

impl EntityFact {
    pub fn new(name: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            answer: answer.into(),
        }
    }
}

/// Entity-name to canned-fact table.
///
/// A query hits when it names an entity *and* asks for an identity (`"who"`, `"current"`, ...).
/// Entries are checked in order and the first hit wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommonEntities {
    pub trigger_terms: Vec<String>,
    pub entries: Vec<EntityFact>,
    /// Content of the synthetic source record attached to every hit.
    pub source_content: String,
    pub source_label: String,
}

impl Default for CommonEntities {
    fn default() -> Self {
        Self {
            trigger_terms: ["who", "name", "current", "is the"]
                .into_iter()
                .map(String::from)
                .collect(),
            entries: vec![
                EntityFact::new(
                    "mayor",
                    "The current mayor of Phoenixville is Peter Urscheler. He has been serving as mayor since 2018.",
                ),
                EntityFact::new(
                    "borough manager",
                    "The Borough Manager of Phoenixville is E. Jean Krack.",
                ),
                EntityFact::new(
                    "council president",
                    "The Phoenixville Borough Council President is Jonathan Ewald.",
                ),
                EntityFact::new(
                    "police chief",
                    "The Phoenixville Police Chief is Brian Marshall.",
                ),
                EntityFact::new(
                    "fire chief",
                    "The Phoenixville Fire Chief is John Buckwalter.",
                ),
            ],
            source_content: "Information about key Phoenixville officials and representatives."
                .into(),
            source_label: "Phoenixville Municipal Records".into(),
        }
    }
}

impl CommonEntities {
    /// The fact matching `query`, if any.
    pub fn lookup(&self, query: &str) -> Option<&EntityFact> {
        let lower = query.to_lowercase();
        let asks_identity = self
            .trigger_terms
            .iter()
            .any(|t| !t.is_empty() && lower.contains(&t.to_lowercase()));
        if !asks_identity {
            return None;
        }
        self.named_in(&lower)
    }

    /// The fact for any entity named in `query`, without requiring an identity question.
    ///
    /// Used after retrieval admitted it found nothing, when the strict [`lookup`](Self::lookup)
    /// has already missed.
    pub fn lookup_named(&self, query: &str) -> Option<&EntityFact> {
        self.named_in(&query.to_lowercase())
    }

    fn named_in(&self, lower: &str) -> Option<&EntityFact> {
        self.entries
            .iter()
            .find(|e| !e.name.is_empty() && lower.contains(&e.name.to_lowercase()))
    }

    /// The single low-detail record cited for entity answers.
    pub fn source_document(&self) -> RetrievedDocument {
        RetrievedDocument {
            content: self.source_content.clone(),
            source: self.source_label.clone(),
            score: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn needs_entity_and_identity_term() {
        let table = CommonEntities::default();
        let hit = table.lookup("Who is the mayor?").unwrap();
        assert!(hit.answer.contains("Peter Urscheler"));

        assert_eq!(
            table.lookup("what is the name of the POLICE CHIEF").unwrap().name,
            "police chief"
        );
        assert!(table.lookup("mayor's office phone number").is_none());
        assert!(table.lookup("who picks up trash").is_none());
    }

    #[test]
    fn named_lookup_ignores_trigger_terms() {
        let table = CommonEntities::default();
        assert!(table.lookup("fire chief phone number").is_none());
        assert_eq!(
            table.lookup_named("fire chief phone number").unwrap().name,
            "fire chief"
        );
        assert!(table.lookup_named("library hours").is_none());
    }

    #[test]
    fn first_entry_wins() {
        let table = CommonEntities {
            entries: vec![
                EntityFact::new("chief", "generic"),
                EntityFact::new("fire chief", "specific"),
            ],
            ..CommonEntities::default()
        };
        assert_eq!(table.lookup("who is the fire chief").unwrap().answer, "generic");
    }

    #[test]
    fn source_document_is_synthetic() {
        let doc = CommonEntities::default().source_document();
        assert_eq!(doc.source, "Phoenixville Municipal Records");
        assert_eq!(doc.score, 1.0);
    }
}
