use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::PublishError;

pub const ATTACHMENT_TYPE: &str = "attachment";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordOid(String);

impl RecordOid {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordOid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecordOid {
    type Err = PublishError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let pattern =
            PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_:-][A-Za-z0-9._:-]*$").unwrap());
        let trimmed = value.trim();
        if !pattern.is_match(trimmed) || trimmed == ".." {
            return Err(PublishError::InvalidOid(value.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

/// Size as declared by the repository, or as measured on disk after a fetch.
///
/// Declared sizes are free-form upstream; anything that is neither a byte
/// count nor a label is kept as `Other` and never used as a size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Size {
    Bytes(u64),
    Label(String),
    Other(Value),
}

impl Size {
    pub fn is_known(&self) -> bool {
        !matches!(self, Size::Other(_))
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Size::Bytes(bytes) => write!(f, "{bytes}"),
            Size::Label(label) => write!(f, "{label}"),
            Size::Other(value) => write!(f, "{value}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataRecordRef {
    #[serde(default)]
    pub oid: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mimetype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<Size>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Location {
    pub fn is_attachment(&self) -> bool {
        self.kind == ATTACHMENT_TYPE
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }

    pub fn display_file_id(&self) -> &str {
        self.file_id.as_deref().unwrap_or("")
    }

    /// Checks that the attachment can be requested and written inside the
    /// output directory.
    pub fn as_attachment(&self) -> Result<Attachment<'_>, PublishError> {
        let fail = |reason: &str| PublishError::AttachmentFetch {
            name: self.display_name().to_string(),
            file_id: self.display_file_id().to_string(),
            reason: reason.to_string(),
        };
        let name = self
            .name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| fail("attachment has no name"))?;
        if name == "." || name == ".." || name.contains(['/', '\\']) {
            return Err(fail("attachment name is not a plain file name"));
        }
        let file_id = self
            .file_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| fail("attachment has no fileId"))?;
        Ok(Attachment {
            name,
            file_id,
            mimetype: self.mimetype.as_deref(),
            declared_size: self.size.as_ref().filter(|size| size.is_known()),
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Attachment<'a> {
    pub name: &'a str,
    pub file_id: &'a str,
    pub mimetype: Option<&'a str>,
    pub declared_size: Option<&'a Size>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Party {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orcid: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    #[serde(default)]
    pub oid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub data_record: Option<DataRecordRef>,
    #[serde(default)]
    pub data_locations: Vec<Location>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub creators: Vec<Party>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Record {
    pub fn from_value(oid: &str, value: Value) -> Result<Self, PublishError> {
        let mut record: Record =
            serde_json::from_value(value).map_err(|err| PublishError::RecordDecode(err.to_string()))?;
        if record.oid.is_empty() {
            record.oid = oid.to_string();
        }
        Ok(record)
    }

    /// The id of the data record the attachments are stored against.
    pub fn data_record_oid(&self) -> Result<&str, PublishError> {
        let data_record = self.data_record.as_ref().ok_or_else(|| {
            PublishError::invalid_record(
                &self.oid,
                "data publication doesn't have a dataRecord reference",
            )
        })?;
        data_record
            .oid
            .as_deref()
            .filter(|oid| !oid.trim().is_empty())
            .ok_or_else(|| PublishError::invalid_record(&self.oid, "dataRecord doesn't have an oid"))
    }

    pub fn attachments(&self) -> impl Iterator<Item = &Location> {
        self.data_locations.iter().filter(|loc| loc.is_attachment())
    }

    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    #[test]
    fn parse_oid_valid() {
        let oid: RecordOid = " d615d23ca4bd704bf9aa297e8fc91d0c ".parse().unwrap();
        assert_eq!(oid.as_str(), "d615d23ca4bd704bf9aa297e8fc91d0c");
    }

    #[test]
    fn parse_oid_rejects_paths() {
        for value in ["../etc", "a/b", "", "..", ".hidden", "a b"] {
            let err = value.parse::<RecordOid>().unwrap_err();
            assert_matches!(err, PublishError::InvalidOid(_));
        }
    }

    #[test]
    fn record_keeps_unknown_fields() {
        let record = Record::from_value(
            "X",
            json!({
                "title": "Soil samples",
                "dataRecord": {"oid": "D", "title": "Soil RDMP"},
                "dataLocations": [
                    {"type": "attachment", "name": "a.txt", "fileId": "f1", "size": 12},
                    {"type": "url", "location": "https://example.org"}
                ],
                "license_identifier": "CC-BY-4.0"
            }),
        )
        .unwrap();

        assert_eq!(record.oid, "X");
        assert_eq!(record.data_record_oid().unwrap(), "D");
        assert_eq!(record.attachments().count(), 1);
        assert_eq!(record.extra_str("license_identifier"), Some("CC-BY-4.0"));
        assert_eq!(record.data_locations[0].size, Some(Size::Bytes(12)));
        assert_eq!(
            record.data_locations[1].extra.get("location"),
            Some(&json!("https://example.org"))
        );
    }

    #[test]
    fn unusual_declared_sizes_do_not_break_decoding() {
        let record = Record::from_value(
            "X",
            json!({
                "dataRecord": {"oid": "D"},
                "dataLocations": [
                    {"type": "attachment", "name": "a.txt", "fileId": "f1", "size": -3},
                    {"type": "url", "location": "https://example.org", "size": 12.5},
                    {"type": "url", "location": "https://example.org/b", "size": {"bytes": 1}}
                ]
            }),
        )
        .unwrap();

        assert_eq!(record.data_locations.len(), 3);
        assert_eq!(record.data_locations[1].size, Some(Size::Other(json!(12.5))));
        let attachment = record.data_locations[0].as_attachment().unwrap();
        assert_eq!(attachment.declared_size, None);
    }

    #[test]
    fn missing_data_record_is_invalid() {
        let record = Record::from_value("X", json!({"dataRecord": null})).unwrap();
        assert_matches!(
            record.data_record_oid(),
            Err(PublishError::InvalidRecord { .. })
        );

        let record = Record::from_value("X", json!({"dataRecord": {"title": "t"}})).unwrap();
        assert_matches!(
            record.data_record_oid(),
            Err(PublishError::InvalidRecord { .. })
        );
    }

    #[test]
    fn attachment_names_must_be_plain() {
        let location = Location {
            kind: ATTACHMENT_TYPE.to_string(),
            name: Some("../escape.txt".to_string()),
            file_id: Some("f1".to_string()),
            mimetype: None,
            size: None,
            extra: Map::new(),
        };
        assert_matches!(
            location.as_attachment(),
            Err(PublishError::AttachmentFetch { .. })
        );
    }
}
