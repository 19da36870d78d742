//! Plan and sample records written to the document store

use crate::Document;
use serde::{Deserialize, Serialize};

/// One row of `EXPLAIN` output
///
/// `id` and `rows` are always present. Every other field is omitted from the
/// stored document when MySQL reports NULL for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct PlanRecord {
    #[serde(rename = "ID")]
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partitions: Option<String>,
    #[serde(rename = "Type", default, skip_serializing_if = "Option::is_none")]
    pub access_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub possible_keys: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_len: Option<String>,
    #[serde(rename = "Ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    pub rows: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filtered: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<String>,
}

impl PlanRecord {
    /// Create a plan row with only the mandatory fields set
    pub fn new(id: i64, rows: i64) -> Self {
        Self {
            id,
            rows,
            ..Self::default()
        }
    }

    pub fn with_select_type(mut self, select_type: impl Into<String>) -> Self {
        self.select_type = Some(select_type.into());
        self
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn with_access_type(mut self, access_type: impl Into<String>) -> Self {
        self.access_type = Some(access_type.into());
        self
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_key_len(mut self, key_len: impl Into<String>) -> Self {
        self.key_len = Some(key_len.into());
        self
    }

    pub fn with_filtered(mut self, filtered: f64) -> Self {
        self.filtered = Some(filtered);
        self
    }
}

/// One sampling iteration's output: the monitored query, when it was sampled,
/// and its execution plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SampleRecord {
    /// The monitored query text
    pub search: String,
    /// Unix epoch seconds
    pub timestamp: i64,
    /// Digest text of the instrumentation entry that confirmed capture
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    pub plan: Vec<PlanRecord>,
}

impl SampleRecord {
    pub fn new(search: impl Into<String>, timestamp: i64, plan: Vec<PlanRecord>) -> Self {
        Self {
            search: search.into(),
            timestamp,
            digest: None,
            plan,
        }
    }

    pub fn with_digest(mut self, digest: impl Into<String>) -> Self {
        self.digest = Some(digest.into());
        self
    }

    /// Encode as a store document
    pub fn to_document(&self) -> Result<Document, serde_json::Error> {
        match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => Ok(map),
            other => Err(serde::ser::Error::custom(format!(
                "sample record encoded as {} instead of an object",
                other
            ))),
        }
    }

    /// Decode from a store document. Store-assigned keys such as `_id` are ignored.
    pub fn from_document(doc: Document) -> Result<Self, serde_json::Error> {
        serde_json::from_value(serde_json::Value::Object(doc))
    }
}
