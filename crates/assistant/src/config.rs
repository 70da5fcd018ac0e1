use serde::{Deserialize, Serialize};

use crate::entities::CommonEntities;
use crate::guardrail::GuardrailRule;
use crate::intents::InstantIntents;
use crate::simulation::SimulationTable;
use crate::synthesizer::SynthesisConfig;
use crate::AssistantError;

/// Everything the answering pipeline needs besides its backends.
///
/// All tables ship with the Phoenixville defaults and can be replaced wholesale from YAML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// Skip vector retrieval entirely and answer from the canned tables.
    pub simulation_mode: bool,
    pub entities: CommonEntities,
    pub simulation: SimulationTable,
    pub intents: InstantIntents,
    pub guardrails: Vec<GuardrailRule>,
    pub synthesis: SynthesisConfig,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            simulation_mode: false,
            entities: CommonEntities::default(),
            simulation: SimulationTable::default(),
            intents: InstantIntents::default(),
            guardrails: GuardrailRule::defaults(),
            synthesis: SynthesisConfig::default(),
        }
    }
}

impl AssistantConfig {
    pub fn simulated() -> Self {
        Self {
            simulation_mode: true,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), AssistantError> {
        if self.synthesis.system_prompt.trim().is_empty() {
            return Err(AssistantError::InvalidConfig(
                "synthesis.system_prompt must not be empty".into(),
            ));
        }
        if self.simulation.default_template.trim().is_empty() {
            return Err(AssistantError::InvalidConfig(
                "simulation.default_template must not be empty".into(),
            ));
        }
        if self.synthesis.no_info_phrases.iter().any(|p| p.trim().is_empty()) {
            return Err(AssistantError::InvalidConfig(
                "synthesis.no_info_phrases must not contain blank phrases".into(),
            ));
        }
        if let Some(fact) = self.entities.entries.iter().find(|e| e.answer.trim().is_empty()) {
            return Err(AssistantError::InvalidConfig(format!(
                "entity '{}' has an empty answer",
                fact.name
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::EntityFact;

    #[test]
    fn defaults_are_valid() {
        let cfg = AssistantConfig::default();
        cfg.validate().unwrap();
        assert!(!cfg.simulation_mode);
        assert_eq!(cfg.entities.entries.len(), 5);
        assert_eq!(cfg.guardrails.len(), 1);
        assert!(AssistantConfig::simulated().simulation_mode);
    }

    #[test]
    fn rejects_blank_entity_answer() {
        let mut cfg = AssistantConfig::default();
        cfg.entities.entries.push(EntityFact::new("treasurer", " "));
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("treasurer"));
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let cfg: AssistantConfig = serde_json::from_value(serde_json::json!({
            "simulation_mode": true,
            "entities": {"entries": [{"name": "treasurer", "answer": "Jane Doe."}]}
        }))
        .unwrap();
        assert!(cfg.simulation_mode);
        assert_eq!(cfg.entities.entries.len(), 1);
        assert_eq!(cfg.entities.trigger_terms.len(), 4);
        assert_eq!(cfg.simulation, SimulationTable::default());
    }
}
