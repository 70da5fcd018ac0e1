//! Keyword-triggered responses that bypass retrieval entirely.
//!
//! The front end renders the `<payment_portal>`, `<form_portal>` and `<map_portal>` tags as
//! interactive widgets, so these texts are part of its contract.
//!
//! Keywords match whole words only, case-insensitively, with an optional plural `s`: `"form"`
//! matches "forms" but not "information". Runs of whitespace inside a keyword match any
//! whitespace in the query.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::AssistantError;

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Whole-word matcher for one keyword list. Matches nothing when the list is empty.
#[derive(Debug, Clone)]
struct Phrases(Option<Regex>);

impl Phrases {
    fn compile(what: &str, phrases: &[String]) -> Result<Self, AssistantError> {
        let alternatives: Vec<String> = phrases
            .iter()
            .map(|p| {
                p.split_whitespace()
                    .map(regex::escape)
                    .collect::<Vec<_>>()
                    .join(r"\s+")
            })
            .filter(|p| !p.is_empty())
            .collect();
        if alternatives.is_empty() {
            return Ok(Self(None));
        }
        let pattern = format!(r"(?i)\b(?:{})s?\b", alternatives.join("|"));
        Regex::new(&pattern).map(|re| Self(Some(re))).map_err(|e| {
            AssistantError::InvalidConfig(format!("{what} keywords do not compile: {e}"))
        })
    }

    fn single(what: &str, phrase: &str) -> Result<Self, AssistantError> {
        Self::compile(what, std::slice::from_ref(&phrase.to_string()))
    }

    fn matches(&self, text: &str) -> bool {
        self.0.as_ref().is_some_and(|re| re.is_match(text))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentIntent {
    pub keywords: Vec<String>,
    pub message: String,
}

impl Default for PaymentIntent {
    fn default() -> Self {
        Self {
            keywords: strings(&[
                "pay water bill",
                "water bill payment",
                "pay my water",
                "how do i pay my water",
                "pay utility bill",
                "water payment",
            ]),
            message: "I can help you pay your water bill right here. Please use the secure payment form below:".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormSpec {
    /// Word in the query selecting this form, e.g. `"deck"`.
    pub key: String,
    pub form_id: String,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormIntent {
    pub keywords: Vec<String>,
    pub forms: Vec<FormSpec>,
    /// Key of the form used when the query names none; the first form otherwise.
    pub fallback_key: String,
}

impl Default for FormIntent {
    fn default() -> Self {
        Self {
            keywords: strings(&[
                "permit",
                "application",
                "form",
                "apply for",
                "how do i get a",
                "need a permit",
                "building permit",
                "construction permit",
                "deck permit",
                "patio permit",
                "renovation permit",
                "demolition permit",
                "home improvement",
                "how to apply",
                "permit application",
            ]),
            forms: vec![
                FormSpec {
                    key: "deck".into(),
                    form_id: "deck-patio-permit".into(),
                    title: "Deck/Patio Permit Application".into(),
                    description: "Application for construction of a deck or patio".into(),
                },
                FormSpec {
                    key: "building".into(),
                    form_id: "building-permit".into(),
                    title: "Building Permit Application".into(),
                    description: "Application for new construction, additions and alterations"
                        .into(),
                },
            ],
            fallback_key: "building".into(),
        }
    }
}

impl FormIntent {
    fn render(form: &FormSpec) -> String {
        let message = format!(
            "Here's the {} you requested. You can fill it out directly or download it for submission to the Borough offices.",
            form.title
        );
        format!(
            "<form_portal>{message}|{}|{}</form_portal>",
            form.form_id, form.title
        )
    }
}

/// A themed map view chosen when the query mentions any trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapLayer {
    pub triggers: Vec<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapIntent {
    pub keywords: Vec<String>,
    /// Checked in order before `places`.
    pub layers: Vec<MapLayer>,
    pub places: Vec<String>,
    /// `{place}` is replaced with the title-cased place name.
    pub place_template: String,
    pub default_message: String,
}

impl Default for MapIntent {
    fn default() -> Self {
        Self {
            keywords: strings(&[
                "where is",
                "location of",
                "map",
                "show me where",
                "directions to",
                "zoning",
                "find on the map",
                "show on map",
                "navigate to",
                "borough boundaries",
                "district map",
                "utility service",
                "water service area",
                "sewer service",
                "permits",
                "permit status",
            ]),
            layers: vec![
                MapLayer {
                    triggers: strings(&["zoning"]),
                    message: "Here's the zoning map for Phoenixville Borough. The colored areas represent different zoning districts.".into(),
                },
                MapLayer {
                    triggers: strings(&["utility", "water service", "sewer"]),
                    message: "Here's the utility service map for Phoenixville Borough. The shaded areas show water and sewer service coverage.".into(),
                },
                MapLayer {
                    triggers: strings(&["permit"]),
                    message: "Here's a map showing recent permits issued in Phoenixville Borough. Click on the markers for details about each permit.".into(),
                },
            ],
            places: strings(&[
                "borough hall",
                "police",
                "fire",
                "library",
                "reeves park",
                "black rock",
            ]),
            place_template: "Here's the location of {place} in Phoenixville Borough. You can click on the marker for more details.".into(),
            default_message: "Here's an interactive map of Phoenixville Borough. You can toggle between different map layers using the controls below the map.".into(),
        }
    }
}

fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Payment, form and map intents, checked in that order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstantIntents {
    pub payment: PaymentIntent,
    pub forms: FormIntent,
    pub maps: MapIntent,
}

impl InstantIntents {
    /// Compile every keyword table. Fails only on patterns too large for the regex engine.
    pub fn compile(&self) -> Result<IntentMatcher, AssistantError> {
        let form_keys = self
            .forms
            .forms
            .iter()
            .map(|f| Phrases::single("form key", &f.key))
            .collect::<Result<Vec<_>, _>>()?;
        let layers = self
            .maps
            .layers
            .iter()
            .map(|l| Phrases::compile("map layer", &l.triggers))
            .collect::<Result<Vec<_>, _>>()?;
        let places = self
            .maps
            .places
            .iter()
            .map(|p| Phrases::single("map place", p))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(IntentMatcher {
            payment: Phrases::compile("payment", &self.payment.keywords)?,
            forms: Phrases::compile("form", &self.forms.keywords)?,
            maps: Phrases::compile("map", &self.maps.keywords)?,
            form_keys,
            layers,
            places,
            intents: self.clone(),
        })
    }
}

/// Compiled [`InstantIntents`]: payment, form and map intents, checked in that order.
#[derive(Debug, Clone)]
pub struct IntentMatcher {
    intents: InstantIntents,
    payment: Phrases,
    forms: Phrases,
    maps: Phrases,
    /// Parallel to `intents.forms.forms`.
    form_keys: Vec<Phrases>,
    /// Parallel to `intents.maps.layers`.
    layers: Vec<Phrases>,
    /// Parallel to `intents.maps.places`.
    places: Vec<Phrases>,
}

impl IntentMatcher {
    /// The full canned text for `query`, or `None` when no intent applies.
    pub fn resolve(&self, query: &str) -> Option<String> {
        if self.payment.matches(query) {
            return Some(format!(
                "<payment_portal>{}</payment_portal>",
                self.intents.payment.message
            ));
        }
        if self.forms.matches(query) {
            if let Some(form) = self.select_form(query) {
                return Some(FormIntent::render(form));
            }
        }
        if self.maps.matches(query) {
            return Some(format!("<map_portal>{}</map_portal>", self.map_message(query)));
        }
        None
    }

    fn select_form(&self, query: &str) -> Option<&FormSpec> {
        let forms = &self.intents.forms;
        forms
            .forms
            .iter()
            .zip(&self.form_keys)
            .find(|(_, key)| key.matches(query))
            .map(|(form, _)| form)
            .or_else(|| forms.forms.iter().find(|f| f.key == forms.fallback_key))
            .or_else(|| forms.forms.first())
    }

    fn map_message(&self, query: &str) -> String {
        let maps = &self.intents.maps;
        if let Some((layer, _)) = maps
            .layers
            .iter()
            .zip(&self.layers)
            .find(|(_, triggers)| triggers.matches(query))
        {
            return layer.message.clone();
        }
        if let Some((place, _)) = maps
            .places
            .iter()
            .zip(&self.places)
            .find(|(_, phrase)| phrase.matches(query))
        {
            return maps.place_template.replace("{place}", &title_case(place));
        }
        maps.default_message.clone()
    }
}
