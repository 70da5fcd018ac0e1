//! Post-generation fact checks for high-sensitivity topics.
//!
//! A rule fires when its topic pattern matches the query and the generated answer does not
//! contain the required fact. A batch answer is then replaced by the correction; a streamed
//! answer, whose tokens are already out, gets the rule's note appended instead.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::AssistantError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardrailRule {
    /// Regular expression matched against the query.
    pub topic: String,
    /// Case-sensitive substring a correct answer must contain.
    pub required: String,
    /// Replacement for a batch answer that misses `required`.
    pub correction: String,
    /// Appended to a streamed answer that misses `required`.
    pub note: String,
}

impl GuardrailRule {
    fn mayor() -> Self {
        Self {
            topic: r"(?i)\bmayor\b".into(),
            required: "Peter Urscheler".into(),
            correction: "The current Mayor of Phoenixville is Peter Urscheler, who has been serving since January 2, 2018. You can contact the Mayor's office at Borough Hall, 351 Bridge Street, or call (610) 933-8801 for more information about municipal services.".into(),
            note: "\n\nNOTE: The current Mayor of Phoenixville is Peter Urscheler, who has been serving since January 2, 2018.".into(),
        }
    }

    pub fn defaults() -> Vec<Self> {
        vec![Self::mayor()]
    }
}

#[derive(Debug, Clone)]
struct CompiledRule {
    topic: Regex,
    rule: GuardrailRule,
}

/// A compiled rule table.
#[derive(Debug, Clone, Default)]
pub struct Guardrails {
    rules: Vec<CompiledRule>,
}

impl Guardrails {
    pub fn compile(rules: &[GuardrailRule]) -> Result<Self, AssistantError> {
        let rules = rules
            .iter()
            .map(|rule| {
                let topic = Regex::new(&rule.topic).map_err(|e| {
                    AssistantError::InvalidConfig(format!(
                        "guardrail topic '{}' is not a valid pattern: {e}",
                        rule.topic
                    ))
                })?;
                Ok(CompiledRule {
                    topic,
                    rule: rule.clone(),
                })
            })
            .collect::<Result<Vec<_>, AssistantError>>()?;
        Ok(Self { rules })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// The first rule that `answer` violates for `query`.
    pub fn violated(&self, query: &str, answer: &str) -> Option<&GuardrailRule> {
        self.rules
            .iter()
            .find(|c| c.topic.is_match(query) && !answer.contains(&c.rule.required))
            .map(|c| &c.rule)
    }

    /// `answer`, or the correction of the rule it violates.
    pub fn correct(&self, query: &str, answer: String) -> String {
        match self.violated(query, &answer) {
            Some(rule) => {
                tracing::warn!(topic = %rule.topic, "answer missed required fact, overriding");
                rule.correction.clone()
            }
            None => answer,
        }
    }
}
