use std::fs;
use std::path::Path;

use serde_json::{Map, Value};

use crate::domain::Record;
use crate::error::PublishError;

/// Top-level fields that replace those of the fetched record.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataOverride {
    fields: Map<String, Value>,
}

impl MetadataOverride {
    /// Reads `input` as a JSON file when such a file exists, otherwise as a
    /// JSON literal.
    pub fn parse(input: &str) -> Result<Self, PublishError> {
        let path = Path::new(input);
        let text = if path.is_file() {
            fs::read_to_string(path).map_err(|err| {
                PublishError::InvalidMetadataOverride(format!("{}: {err}", path.display()))
            })?
        } else {
            input.to_string()
        };

        let value: Value = serde_json::from_str(&text)
            .map_err(|err| PublishError::InvalidMetadataOverride(err.to_string()))?;
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(PublishError::InvalidMetadataOverride(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    pub fn apply(&self, record: Record) -> Result<Record, PublishError> {
        let oid = record.oid.clone();
        let mut value =
            serde_json::to_value(record).map_err(|err| PublishError::RecordDecode(err.to_string()))?;
        if let Value::Object(target) = &mut value {
            for (key, field) in &self.fields {
                target.insert(key.clone(), field.clone());
            }
        }
        Record::from_value(&oid, value)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    #[test]
    fn literal_override_replaces_fields() {
        let record = Record::from_value(
            "X",
            json!({"title": "Old", "dataRecord": {"oid": "D"}, "keywords": ["a"]}),
        )
        .unwrap();
        let overrides = MetadataOverride::parse(r#"{"title": "New", "dataRecord": {"oid": "E"}}"#)
            .unwrap();

        let merged = overrides.apply(record).unwrap();
        assert_eq!(merged.oid, "X");
        assert_eq!(merged.title.as_deref(), Some("New"));
        assert_eq!(merged.data_record_oid().unwrap(), "E");
        assert_eq!(merged.extra.get("keywords"), Some(&json!(["a"])));
    }

    #[test]
    fn file_override_is_read() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("override.json");
        fs::write(&path, r#"{"description": "From file"}"#).unwrap();

        let overrides = MetadataOverride::parse(path.to_str().unwrap()).unwrap();
        let merged = overrides
            .apply(Record::from_value("X", json!({})).unwrap())
            .unwrap();
        assert_eq!(merged.description.as_deref(), Some("From file"));
    }

    #[test]
    fn non_object_override_is_rejected() {
        assert_matches!(
            MetadataOverride::parse("[1, 2]"),
            Err(PublishError::InvalidMetadataOverride(_))
        );
        assert_matches!(
            MetadataOverride::parse("not json"),
            Err(PublishError::InvalidMetadataOverride(_))
        );
    }
}
