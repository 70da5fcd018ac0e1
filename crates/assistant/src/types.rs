use index::RetrievedDocument;
use serde::{Deserialize, Serialize};

/// How much the retrieved context supports an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    /// Bucket a mean similarity score: below 0.5 is low, below 0.8 medium, anything else high.
    pub fn from_mean_score(mean: f32) -> Self {
        if mean < 0.5 {
            Confidence::Low
        } else if mean < 0.8 {
            Confidence::Medium
        } else {
            Confidence::High
        }
    }

    /// Confidence of a document set. An empty set is low.
    pub fn of_documents(docs: &[RetrievedDocument]) -> Self {
        if docs.is_empty() {
            return Confidence::Low;
        }
        let mean = docs.iter().map(|d| d.score).sum::<f32>() / docs.len() as f32;
        Self::from_mean_score(mean)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Confidence::Low => "Low",
            Confidence::Medium => "Medium",
            Confidence::High => "High",
        }
    }
}

/// Which strategy produced an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Keyword-triggered canned response (payment, forms, maps).
    Instant,
    CommonEntity,
    VectorAnswer,
    Simulation,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Instant => "instant",
            Tier::CommonEntity => "common_entity",
            Tier::VectorAnswer => "vector_answer",
            Tier::Simulation => "simulation",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The final answer to one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerResult {
    pub result: String,
    pub source_documents: Vec<RetrievedDocument>,
    /// Wall-clock seconds spent answering.
    pub processing_time: f64,
    pub confidence: Confidence,
    pub tier: Tier,
}

/// One frame of a streamed answer.
///
/// A stream ends with exactly one event whose `done` is set; its token may be empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamEvent {
    pub token: String,
    pub done: bool,
}

impl StreamEvent {
    pub fn token(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            done: false,
        }
    }

    /// A terminal event carrying `text`.
    pub fn finish(text: impl Into<String>) -> Self {
        Self {
            token: text.into(),
            done: true,
        }
    }

    /// The bare terminal marker.
    pub fn done() -> Self {
        Self::finish(String::new())
    }
}
