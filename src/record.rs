//! Build records as they are delivered by the feed.
//!
//! A [`NodeRecord`] is a single build configuration's status at the time the
//! snapshot was taken. Records are immutable once a snapshot has been handed
//! to the controller; everything derived from them lives in [`crate::Tree`].

use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};

/// Opaque identifier of a build configuration.
///
/// Identifiers are stable across snapshots for the same logical build, which
/// is what lets animation and info box state survive a tree rebuild. The wire
/// format allows either strings or integers, both are normalized to text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "RawId", into = "String")]
pub struct NodeId(Arc<str>);

impl NodeId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        Self(Arc::from(value))
    }
}

impl From<i64> for NodeId {
    fn from(value: i64) -> Self {
        Self::from(value.to_string())
    }
}

impl From<NodeId> for String {
    fn from(value: NodeId) -> Self {
        value.0.to_string()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(i64),
}

impl From<RawId> for NodeId {
    fn from(value: RawId) -> Self {
        match value {
            RawId::Text(text) => NodeId::from(text),
            RawId::Number(number) => NodeId::from(number),
        }
    }
}

/// The build server writes `null` for unset strings and lists.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Any JSON number, rounded and clamped to 0..=100.
fn percentage<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<f64>::deserialize(deserializer)?.unwrap_or_default();
    Ok(value.round().clamp(0.0, 100.0) as u8)
}

/// Status snapshot of a single build configuration.
///
/// The boolean flags are not mutually exclusive in the source data, the
/// precedence between them is decided by [`crate::status::classify`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct NodeRecord {
    #[serde(rename = "BuildTypeId")]
    pub id: NodeId,
    /// Builds this one depends on. The record is a *dependent* of each of them.
    #[serde(deserialize_with = "null_as_default")]
    pub dependency_ids: Vec<NodeId>,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    /// Free-form text supplied by the feed, shown in the info box.
    #[serde(deserialize_with = "null_as_default")]
    pub status_text: String,
    pub log_url: Option<String>,
    /// 0-100, only meaningful while running.
    #[serde(deserialize_with = "percentage")]
    pub percentage_completed: u8,
    pub inactive: bool,
    pub failed: bool,
    pub failed_dependency: bool,
    pub failed_but_still_running: bool,
    pub running: bool,
}

impl NodeRecord {
    pub fn new(id: impl Into<NodeId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn depends_on<I, T>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<NodeId>,
    {
        self.dependency_ids.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn running(mut self, percentage: u8) -> Self {
        self.running = true;
        self.percentage_completed = percentage.min(100);
        self
    }

    pub fn failed(mut self) -> Self {
        self.failed = true;
        self
    }

    pub fn failed_dependency(mut self) -> Self {
        self.failed = true;
        self.failed_dependency = true;
        self
    }

    pub fn failed_but_still_running(mut self, percentage: u8) -> Self {
        self.failed_but_still_running = true;
        self.percentage_completed = percentage.min(100);
        self
    }

    pub fn inactive(mut self) -> Self {
        self.inactive = true;
        self
    }

    pub fn with_status_text(mut self, text: impl Into<String>) -> Self {
        self.status_text = text.into();
        self
    }

    pub fn with_log_url(mut self, url: impl Into<String>) -> Self {
        self.log_url = Some(url.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_shape() {
        let json = r#"{
            "BuildTypeId": "bt2",
            "DependencyIds": ["bt1", 7],
            "Name": "Unit tests",
            "StatusText": "Step 3/5",
            "LogUrl": "https://ci.example/log/2",
            "PercentageCompleted": 40,
            "Running": true
        }"#;

        let record: NodeRecord = serde_json::from_str(json).unwrap();

        assert_eq!(record.id, NodeId::from("bt2"));
        assert_eq!(record.dependency_ids, vec![NodeId::from("bt1"), NodeId::from("7")]);
        assert_eq!(record.name, "Unit tests");
        assert_eq!(record.log_url.as_deref(), Some("https://ci.example/log/2"));
        assert_eq!(record.percentage_completed, 40);
        assert!(record.running);
        assert!(!record.failed);
    }

    #[test]
    fn test_null_fields_are_empty() {
        let json = r#"{
            "BuildTypeId": "a",
            "Name": null,
            "StatusText": null,
            "DependencyIds": null,
            "LogUrl": null,
            "PercentageCompleted": null
        }"#;

        let record: NodeRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.name, "");
        assert_eq!(record.status_text, "");
        assert!(record.dependency_ids.is_empty());
        assert_eq!(record.log_url, None);
        assert_eq!(record.percentage_completed, 0);
    }

    #[test]
    fn test_percentage_is_rounded_and_clamped() {
        let parse = |value: &str| {
            let json = format!(r#"{{"BuildTypeId": "a", "PercentageCompleted": {value}}}"#);
            serde_json::from_str::<NodeRecord>(&json)
                .unwrap()
                .percentage_completed
        };

        assert_eq!(parse("42.5"), 43);
        assert_eq!(parse("42.4"), 42);
        assert_eq!(parse("250"), 100);
        assert_eq!(parse("-3"), 0);
    }

    #[test]
    fn test_integer_id() {
        let record: NodeRecord = serde_json::from_str(r#"{"BuildTypeId": 42}"#).unwrap();
        assert_eq!(record.id.as_str(), "42");
        assert!(record.dependency_ids.is_empty());
    }

    #[test]
    fn test_id_serializes_as_text() {
        let json = serde_json::to_string(&NodeId::from(5)).unwrap();
        assert_eq!(json, r#""5""#);
    }
}
