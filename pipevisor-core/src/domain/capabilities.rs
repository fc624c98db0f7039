//! Capability catalog of the pipeline executable
//!
//! The executable describes its processing steps as a JSON array. Only the
//! step name is required; every other attribute is kept verbatim so the
//! catalog can be served back unchanged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// One processing step the executable supports
///
/// Field names follow the executable's own output so a parsed step
/// serializes back to the same JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingStep {
    #[serde(rename = "Name")]
    pub name: String,

    #[serde(
        rename = "Description",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<String>,

    #[serde(flatten)]
    pub attributes: Map<String, JsonValue>,
}

/// The full catalog, fetched once when the agent starts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capabilities {
    pub steps: Vec<ProcessingStep>,
}

impl Capabilities {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Looks up a step by name
    pub fn step(&self, name: &str) -> Option<&ProcessingStep> {
        self.steps.iter().find(|step| step.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_catalog_keeps_extra_attributes() {
        let raw = r#"[
            {"Name": "avg", "Description": "Average of all values", "RequiredParams": []},
            {"Name": "tee", "IsFork": true}
        ]"#;
        let caps: Capabilities = serde_json::from_str(raw).unwrap();

        assert_eq!(caps.len(), 2);
        let avg = caps.step("avg").unwrap();
        assert_eq!(avg.description.as_deref(), Some("Average of all values"));
        assert!(avg.attributes.contains_key("RequiredParams"));

        let tee = caps.step("tee").unwrap();
        assert!(tee.description.is_none());
        assert_eq!(tee.attributes.get("IsFork"), Some(&JsonValue::Bool(true)));
    }

    #[test]
    fn test_catalog_serializes_back_unchanged() {
        let raw = r#"[
            {"Name": "avg", "IsFork": false, "Description": "Average"},
            {"Name": "tee", "IsFork": true, "OptionalParams": ["file"]}
        ]"#;
        let caps: Capabilities = serde_json::from_str(raw).unwrap();

        let served = serde_json::to_value(&caps).unwrap();
        let emitted: JsonValue = serde_json::from_str(raw).unwrap();
        assert_eq!(served, emitted);
    }

    #[test]
    fn test_parse_rejects_non_catalog() {
        assert!(serde_json::from_str::<Capabilities>("{\"steps\": 1}").is_err());
        assert!(serde_json::from_str::<Capabilities>("[{\"Description\": \"no name\"}]").is_err());
    }

    #[test]
    fn test_serializes_as_array() {
        let caps = Capabilities::default();
        assert_eq!(serde_json::to_string(&caps).unwrap(), "[]");
    }
}
