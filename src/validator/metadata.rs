use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// One declared option of the entry routine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub primary: bool,
}

/// `metadata.json` published next to a package's script. It names the
/// entry routine and its options so they never have to be discovered by
/// running the script.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Vec<ParameterSpec>>,
    #[serde(default, alias = "dependencies")]
    pub requirements: Vec<String>,
}

impl ScriptMetadata {
    /// Parse `metadata.json`. The document must be a JSON object; serde
    /// alone would also accept a sequence such as `[]` for this struct.
    pub fn parse(text: &str) -> Result<Self> {
        let value: serde_json::Value =
            serde_json::from_str(text).context("metadata.json is malformed")?;
        if !value.is_object() {
            anyhow::bail!("metadata.json is malformed: expected a JSON object");
        }
        serde_json::from_value(value).context("metadata.json is malformed")
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterSpec> {
        self.parameters.as_ref()?.iter().find(|p| p.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full() {
        let meta = ScriptMetadata::parse(
            r#"{
                "entry": "run",
                "parameters": [
                    {"name": "target", "type": "str", "description": "Host", "required": true}
                ],
                "dependencies": ["requests"]
            }"#,
        )
        .unwrap();
        assert_eq!(meta.entry.as_deref(), Some("run"));
        assert_eq!(meta.requirements, vec!["requests"]);
        let target = meta.parameter("target").unwrap();
        assert!(target.required);
        assert!(!target.primary);
        assert_eq!(target.type_name.as_deref(), Some("str"));
    }

    #[test]
    fn test_parse_empty_and_malformed() {
        assert_eq!(ScriptMetadata::parse("{}").unwrap(), ScriptMetadata::default());
        assert!(ScriptMetadata::parse("[]").is_err());
        assert!(ScriptMetadata::parse(r#"["run", null, []]"#).is_err());
        assert!(ScriptMetadata::parse("\"run\"").is_err());
        assert!(ScriptMetadata::parse("{").is_err());

        let err = ScriptMetadata::parse("[]").unwrap_err();
        assert!(format!("{:#}", err).contains("metadata.json is malformed"));
    }
}
