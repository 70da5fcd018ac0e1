//! Metadata filters in the Pinecone operator syntax.
//!
//! A filter is a conjunction of per-field conditions:
//!
//! ```json
//! { "source_url": { "$contains": "people" }, "kind": "page" }
//! ```
//!
//! A bare value is shorthand for `$eq`. The same filter is sent verbatim to remote stores
//! and evaluated locally by the in-memory store.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::IndexError;

/// One operator applied to one metadata field.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(Value),
    Ne(Value),
    In(Vec<Value>),
    /// Substring match on a string field.
    Contains(String),
}

impl Condition {
    fn parse(op: &str, arg: Value) -> Result<Self, IndexError> {
        match op {
            "$eq" => Ok(Condition::Eq(arg)),
            "$ne" => Ok(Condition::Ne(arg)),
            "$in" => match arg {
                Value::Array(items) => Ok(Condition::In(items)),
                other => Err(IndexError::InvalidFilter(format!(
                    "$in expects an array, got {other}"
                ))),
            },
            "$contains" => match arg {
                Value::String(s) => Ok(Condition::Contains(s)),
                other => Err(IndexError::InvalidFilter(format!(
                    "$contains expects a string, got {other}"
                ))),
            },
            other => Err(IndexError::InvalidFilter(format!(
                "unsupported operator '{other}'"
            ))),
        }
    }

    fn to_json(&self) -> (&'static str, Value) {
        match self {
            Condition::Eq(v) => ("$eq", v.clone()),
            Condition::Ne(v) => ("$ne", v.clone()),
            Condition::In(vs) => ("$in", Value::Array(vs.clone())),
            Condition::Contains(s) => ("$contains", Value::String(s.clone())),
        }
    }

    fn matches(&self, field: Option<&Value>) -> bool {
        match (self, field) {
            (Condition::Eq(expected), Some(actual)) => actual == expected,
            (Condition::Eq(_), None) => false,
            (Condition::Ne(expected), actual) => actual != Some(expected),
            (Condition::In(options), Some(actual)) => options.contains(actual),
            (Condition::In(_), None) => false,
            (Condition::Contains(needle), Some(Value::String(hay))) => hay.contains(needle.as_str()),
            (Condition::Contains(_), _) => false,
        }
    }
}

/// Conjunction of field conditions. The empty filter matches everything.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct MetadataFilter {
    fields: BTreeMap<String, Vec<Condition>>,
}

impl MetadataFilter {
    pub fn new() -> Self {
        Self::default()
    }

    fn with(mut self, field: impl Into<String>, cond: Condition) -> Self {
        self.fields.entry(field.into()).or_default().push(cond);
        self
    }

    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(field, Condition::Eq(value.into()))
    }

    pub fn ne(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(field, Condition::Ne(value.into()))
    }

    pub fn is_in<I, V>(self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.with(
            field,
            Condition::In(values.into_iter().map(Into::into).collect()),
        )
    }

    pub fn contains(self, field: impl Into<String>, needle: impl Into<String>) -> Self {
        self.with(field, Condition::Contains(needle.into()))
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn conditions(&self, field: &str) -> &[Condition] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Parse the JSON operator syntax.
    pub fn from_json(value: &Value) -> Result<Self, IndexError> {
        Self::try_from(value.clone())
    }

    pub fn to_json(&self) -> Value {
        Value::from(self.clone())
    }

    /// Evaluate the filter against a record's metadata.
    pub fn matches(&self, metadata: &Map<String, Value>) -> bool {
        self.fields.iter().all(|(field, conds)| {
            let actual = metadata.get(field);
            conds.iter().all(|c| c.matches(actual))
        })
    }
}

impl TryFrom<Value> for MetadataFilter {
    type Error = IndexError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let Value::Object(map) = value else {
            return Err(IndexError::InvalidFilter(
                "filter must be a JSON object".into(),
            ));
        };

        let mut filter = MetadataFilter::new();
        for (field, clause) in map {
            if field.starts_with('$') {
                return Err(IndexError::InvalidFilter(format!(
                    "logical operator '{field}' is not supported"
                )));
            }
            match clause {
                Value::Object(ops) => {
                    if ops.is_empty() {
                        return Err(IndexError::InvalidFilter(format!(
                            "field '{field}' has no operator"
                        )));
                    }
                    for (op, arg) in ops {
                        filter = filter.with(field.clone(), Condition::parse(&op, arg)?);
                    }
                }
                scalar => filter = filter.with(field, Condition::Eq(scalar)),
            }
        }
        Ok(filter)
    }
}

impl From<MetadataFilter> for Value {
    fn from(filter: MetadataFilter) -> Self {
        let mut out = Map::new();
        for (field, conds) in filter.fields {
            let ops: Map<String, Value> = conds
                .iter()
                .map(|c| {
                    let (op, arg) = c.to_json();
                    (op.to_string(), arg)
                })
                .collect();
            out.insert(field, Value::Object(ops));
        }
        Value::Object(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => panic!("metadata must be an object"),
        }
    }

    #[test]
    fn parses_operator_and_shorthand_syntax() {
        let filter = MetadataFilter::from_json(&json!({
            "source_url": {"$contains": "people"},
            "kind": "page",
            "year": {"$in": [2023, 2024]}
        }))
        .unwrap();

        assert_eq!(
            filter.conditions("source_url"),
            &[Condition::Contains("people".into())]
        );
        assert_eq!(filter.conditions("kind"), &[Condition::Eq(json!("page"))]);
        assert_eq!(
            filter.conditions("year"),
            &[Condition::In(vec![json!(2023), json!(2024)])]
        );
    }

    #[test]
    fn rejects_unknown_operator_and_non_object() {
        assert!(matches!(
            MetadataFilter::from_json(&json!({"x": {"$regex": "a.*"}})),
            Err(IndexError::InvalidFilter(_))
        ));
        assert!(matches!(
            MetadataFilter::from_json(&json!(["x"])),
            Err(IndexError::InvalidFilter(_))
        ));
        assert!(matches!(
            MetadataFilter::from_json(&json!({"$or": []})),
            Err(IndexError::InvalidFilter(_))
        ));
    }

    #[test]
    fn serializes_back_to_operator_syntax() {
        let filter = MetadataFilter::new()
            .contains("source_title", "Department")
            .ne("draft", true);
        assert_eq!(
            filter.to_json(),
            json!({
                "draft": {"$ne": true},
                "source_title": {"$contains": "Department"}
            })
        );
        let back: MetadataFilter = serde_json::from_value(filter.to_json()).unwrap();
        assert_eq!(back, filter);
    }

    #[test]
    fn evaluates_conditions_against_metadata() {
        let record = meta(json!({
            "source_url": "https://phoenixville.org/people/mayor",
            "source_title": "Office of the Mayor",
            "year": 2024
        }));

        assert!(MetadataFilter::new().matches(&record));
        assert!(MetadataFilter::new()
            .contains("source_url", "people")
            .matches(&record));
        assert!(!MetadataFilter::new()
            .contains("source_url", "DocumentCenter")
            .matches(&record));
        assert!(MetadataFilter::new()
            .is_in("year", [2023, 2024])
            .matches(&record));
        assert!(MetadataFilter::new().ne("missing", "x").matches(&record));
        assert!(!MetadataFilter::new().eq("missing", "x").matches(&record));
        assert!(!MetadataFilter::new()
            .contains("source_url", "people")
            .eq("year", 2023)
            .matches(&record));
    }
}
