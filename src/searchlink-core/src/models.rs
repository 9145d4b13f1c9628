use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Query-string parameters appended to a request URL
pub type QueryString = BTreeMap<String, String>;

/// Request body: either a JSON document or a pre-encoded payload
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Json(Value),
    Raw(String),
}

impl From<Value> for Body {
    fn from(value: Value) -> Self {
        Body::Json(value)
    }
}

impl From<String> for Body {
    fn from(raw: String) -> Self {
        Body::Raw(raw)
    }
}

impl From<&str> for Body {
    fn from(raw: &str) -> Self {
        Body::Raw(raw.to_string())
    }
}

/// Arguments accepted by every verb: optional query string and body
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestArgs {
    pub query: QueryString,
    pub body: Option<Body>,
}

impl RequestArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    pub fn with_query(mut self, query: QueryString) -> Self {
        self.query = query;
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(Body::Json(body));
        self
    }

    pub fn raw(mut self, body: impl Into<String>) -> Self {
        self.body = Some(Body::Raw(body.into()));
        self
    }
}

/// Action tag of a bulk operation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BulkAction {
    Create,
    Index,
    Update,
    Delete,
}

impl BulkAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            BulkAction::Create => "create",
            BulkAction::Index => "index",
            BulkAction::Update => "update",
            BulkAction::Delete => "delete",
        }
    }

    /// Whether a document line follows the action line on the wire
    pub fn carries_data(&self) -> bool {
        matches!(self, BulkAction::Create | BulkAction::Index)
    }
}

/// One entry of a bulk request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BulkOperation {
    pub action: BulkAction,
    #[serde(default = "empty_object")]
    pub metadata: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

impl BulkOperation {
    pub fn new(action: BulkAction, metadata: Value, data: Option<Value>) -> Self {
        Self {
            action,
            metadata,
            data,
        }
    }

    pub fn index(metadata: Value, data: Value) -> Self {
        Self::new(BulkAction::Index, metadata, Some(data))
    }

    pub fn create(metadata: Value, data: Value) -> Self {
        Self::new(BulkAction::Create, metadata, Some(data))
    }

    pub fn update(metadata: Value) -> Self {
        Self::new(BulkAction::Update, metadata, None)
    }

    pub fn delete(metadata: Value) -> Self {
        Self::new(BulkAction::Delete, metadata, None)
    }
}

/// One header/query pair of a multi-search request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MultiSearchOperation {
    #[serde(default = "empty_object")]
    pub header: Value,
    pub body: Value,
}

impl MultiSearchOperation {
    pub fn new(header: Value, body: Value) -> Self {
        Self { header, body }
    }
}
