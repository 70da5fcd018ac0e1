//! Canned answers for when retrieval is off or has nothing to offer.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CannedResponse {
    /// Case-insensitive substring of the query.
    pub pattern: String,
    pub answer: String,
}

impl CannedResponse {
    pub fn new(pattern: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            answer: answer.into(),
        }
    }
}

/// Last tier of the fallback chain.
///
/// `default_template` is used when no pattern matches; `{query}` in it is replaced with the
/// original query text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationTable {
    pub responses: Vec<CannedResponse>,
    pub default_template: String,
}

impl Default for SimulationTable {
    fn default() -> Self {
        Self {
            responses: vec![
                CannedResponse::new(
                    "who is the mayor",
                    "The current mayor of Phoenixville is Peter Urscheler. He was elected in 2018 and continues to serve the borough.",
                ),
                CannedResponse::new(
                    "what are the office hours",
                    "Phoenixville Borough office hours are generally Monday through Friday, 8:00 AM to 4:30 PM. However, specific departments may have different hours.",
                ),
                CannedResponse::new(
                    "trash collection",
                    "Trash collection in Phoenixville occurs weekly. The specific day depends on your location within the borough. You can find your collection day on the borough website.",
                ),
                CannedResponse::new(
                    "water bill",
                    "Water bills in Phoenixville can be paid online through the borough website, in person at Borough Hall, or by mail. Bills are typically sent quarterly.",
                ),
                CannedResponse::new(
                    "property tax",
                    "Property taxes in Phoenixville are collected by the borough. The current tax rate is available on the borough website. Payments can be made online, by mail, or in person.",
                ),
            ],
            default_template: "I'm currently in simulation mode and don't have specific information about '{query}'. In a fully connected system, I would query the municipal database for this information. Please check the Phoenixville Borough website for accurate information.".into(),
        }
    }
}

impl SimulationTable {
    /// The canned answer for `query`; never empty.
    pub fn answer(&self, query: &str) -> String {
        let lower = query.to_lowercase();
        self.responses
            .iter()
            .find(|r| !r.pattern.is_empty() && lower.contains(&r.pattern.to_lowercase()))
            .map(|r| r.answer.clone())
            .unwrap_or_else(|| self.default_template.replace("{query}", query))
    }
}
