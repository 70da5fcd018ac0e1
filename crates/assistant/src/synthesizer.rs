use std::sync::Arc;

use index::RetrievedDocument;
use llm::{CompletionBackend, TokenStream};
use serde::{Deserialize, Serialize};

use crate::guardrail::Guardrails;
use crate::types::Confidence;
use crate::AssistantError;

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful municipal assistant for Phoenixville, PA. Use the following documents to answer the user's question concisely and clearly.

IMPORTANT: The documents are retrieved using vector similarity search.
- Answer only from the documents below and never make up facts
- If the documents seem irrelevant or don't directly answer the question, acknowledge this
- If the matching score is low (below 0.5), be cautious about drawing conclusions
- Use what information is available, but be clear about limitations
- If you can't find a definitive answer in the documents, say so clearly
- If the documents mention a specific topic (like a board or committee) but not the specific information requested, say what information IS available

Current confidence level based on document relevance: {confidence}";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// `{confidence}` is replaced with `Low`, `Medium` or `High`.
    pub system_prompt: String,
    /// Returned when the completion call fails; `{query}` is replaced with the query text.
    pub apology_template: String,
    /// Answers containing any of these are treated as "nothing found".
    pub no_info_phrases: Vec<String>,
    /// Streamed when generation produced no tokens at all.
    pub empty_stream_message: String,
    /// Streamed when generation failed before its first token.
    pub stream_error_message: String,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            apology_template: "I'm having trouble processing information about '{query}' right now. The database contains information on this topic, but I can't analyze it currently.".into(),
            no_info_phrases: vec![
                "wasn't able to find information".into(),
                "don't contain information".into(),
            ],
            empty_stream_message: "I don't have specific information about that in my database. Please contact Borough Hall directly for the most accurate information.".into(),
            stream_error_message: "I encountered an error processing your request. Please try again.".into(),
        }
    }
}

/// Turns retrieved documents into a natural-language answer.
#[derive(Clone)]
pub struct AnswerSynthesizer {
    backend: Arc<dyn CompletionBackend>,
    cfg: SynthesisConfig,
    guardrails: Guardrails,
}

impl std::fmt::Debug for AnswerSynthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnswerSynthesizer")
            .field("backend", &self.backend.name())
            .field("guardrails", &self.guardrails.len())
            .finish_non_exhaustive()
    }
}

impl AnswerSynthesizer {
    pub fn new(
        backend: Arc<dyn CompletionBackend>,
        cfg: SynthesisConfig,
        guardrails: Guardrails,
    ) -> Self {
        Self {
            backend,
            cfg,
            guardrails,
        }
    }

    pub fn config(&self) -> &SynthesisConfig {
        &self.cfg
    }

    pub fn guardrails(&self) -> &Guardrails {
        &self.guardrails
    }

    pub fn system_prompt(&self, confidence: Confidence) -> String {
        self.cfg
            .system_prompt
            .replace("{confidence}", confidence.label())
    }

    /// The user-side prompt: every document with its source and score, then the question.
    pub fn prompt(&self, query: &str, docs: &[RetrievedDocument]) -> String {
        let context = docs
            .iter()
            .map(|d| {
                format!(
                    "Document from {} (relevance score: {:.4}):\n{}",
                    d.source, d.score, d.content
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");
        format!("Documents:\n{context}\n\nQuestion: {query}\nAnswer:")
    }

    /// Generate an answer and run it through the guardrails.
    pub async fn try_synthesize(
        &self,
        query: &str,
        docs: &[RetrievedDocument],
    ) -> Result<String, AssistantError> {
        let system = self.system_prompt(Confidence::of_documents(docs));
        let prompt = self.prompt(query, docs);
        let answer = self.backend.complete(&prompt, &system).await?;
        Ok(self.guardrails.correct(query, answer.trim().to_string()))
    }

    /// Like [`try_synthesize`](Self::try_synthesize), but a failed call yields the apology.
    pub async fn synthesize(&self, query: &str, docs: &[RetrievedDocument]) -> String {
        match self.try_synthesize(query, docs).await {
            Ok(answer) => answer,
            Err(e) => {
                tracing::error!(backend = self.backend.name(), error = %e, "synthesis failed");
                self.apology(query)
            }
        }
    }

    /// Start a streamed generation. Guardrails are applied by the dispatcher at the end.
    pub async fn stream(
        &self,
        query: &str,
        docs: &[RetrievedDocument],
    ) -> Result<TokenStream, AssistantError> {
        let system = self.system_prompt(Confidence::of_documents(docs));
        let prompt = self.prompt(query, docs);
        Ok(self.backend.stream_complete(&prompt, &system).await?)
    }

    pub fn apology(&self, query: &str) -> String {
        self.cfg.apology_template.replace("{query}", query)
    }

    /// Whether `answer` admits the documents did not contain what was asked.
    pub fn is_no_info(&self, answer: &str) -> bool {
        self.cfg
            .no_info_phrases
            .iter()
            .any(|p| answer.contains(p.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guardrail::GuardrailRule;
    use async_trait::async_trait;
    use futures::StreamExt;
    use llm::LlmError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        reply: Option<String>,
        seen: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl CompletionBackend for Recording {
        async fn complete(&self, prompt: &str, system: &str) -> Result<String, LlmError> {
            self.seen
                .lock()
                .unwrap()
                .push((prompt.to_string(), system.to_string()));
            self.reply
                .clone()
                .ok_or_else(|| LlmError::Unavailable("down".into()))
        }

        async fn stream_complete(&self, _: &str, _: &str) -> Result<TokenStream, LlmError> {
            let tokens = vec![Ok("Mon".to_string()), Ok("days".to_string())];
            Ok(futures::stream::iter(tokens).boxed())
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    fn synthesizer(reply: Option<&str>) -> (AnswerSynthesizer, Arc<Recording>) {
        let backend = Arc::new(Recording {
            reply: reply.map(String::from),
            ..Recording::default()
        });
        let guardrails = Guardrails::compile(&GuardrailRule::defaults()).unwrap();
        (
            AnswerSynthesizer::new(backend.clone(), SynthesisConfig::default(), guardrails),
            backend,
        )
    }

    fn docs() -> Vec<RetrievedDocument> {
        vec![
            RetrievedDocument {
                content: "Trash is collected Mondays.".into(),
                source: "Public Works (https://phoenixville.org/pw)".into(),
                score: 0.9,
            },
            RetrievedDocument {
                content: "Recycling is every other week.".into(),
                source: "Unknown Source".into(),
                score: 0.6,
            },
        ]
    }

    #[tokio::test]
    async fn prompt_carries_sources_scores_and_confidence() {
        let (s, backend) = synthesizer(Some(" Mondays. "));
        let answer = s.synthesize("When is trash day?", &docs()).await;
        assert_eq!(answer, "Mondays.");

        let seen = backend.seen.lock().unwrap();
        let (prompt, system) = &seen[0];
        assert!(prompt.starts_with(
            "Documents:\nDocument from Public Works (https://phoenixville.org/pw) (relevance score: 0.9000):\nTrash is collected Mondays."
        ));
        assert!(prompt.contains("(relevance score: 0.6000)"));
        assert!(prompt.ends_with("Question: When is trash day?\nAnswer:"));
        assert!(system.ends_with("Current confidence level based on document relevance: Medium"));
    }

    #[tokio::test]
    async fn backend_failure_becomes_apology() {
        let (s, _) = synthesizer(None);
        let answer = s.synthesize("parking permits", &docs()).await;
        assert!(answer.starts_with("I'm having trouble processing information about 'parking permits'"));
        assert!(matches!(
            s.try_synthesize("parking permits", &docs()).await,
            Err(AssistantError::SynthesisFailed(_))
        ));
    }

    #[tokio::test]
    async fn guardrail_overrides_batch_answer() {
        let (s, _) = synthesizer(Some("The mayor is John Smith."));
        let answer = s.synthesize("who is the mayor", &docs()).await;
        assert!(answer.contains("Peter Urscheler"));
    }

    #[tokio::test]
    async fn stream_passes_tokens_through() {
        let (s, _) = synthesizer(Some("unused"));
        let tokens: Vec<_> = s.stream("q", &docs()).await.unwrap().collect().await;
        assert_eq!(tokens, vec![Ok("Mon".to_string()), Ok("days".to_string())]);
    }

    #[test]
    fn detects_no_info_phrases() {
        let (s, _) = synthesizer(None);
        assert!(s.is_no_info("Sorry, I wasn't able to find information about that."));
        assert!(!s.is_no_info("Trash is collected Mondays."));
    }
}
