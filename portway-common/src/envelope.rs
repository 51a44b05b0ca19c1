use serde::Serialize;
use serde_json::Value;

/// The OData-style list envelope of `spec.md` §4.J.
#[derive(Debug, Clone, Serialize)]
pub struct ListEnvelope {
    pub count: usize,
    pub value: Vec<Value>,
    #[serde(rename = "nextLink")]
    pub next_link: Option<String>,
}

impl ListEnvelope {
    pub fn new(value: Vec<Value>, next_link: Option<String>) -> Self {
        Self {
            count: value.len(),
            value,
            next_link,
        }
    }
}

/// The mutation-response envelope: `{success, id?, rowsAffected?, message}`.
#[derive(Debug, Clone, Serialize, Default)]
pub struct MutationEnvelope {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(rename = "rowsAffected", skip_serializing_if = "Option::is_none")]
    pub rows_affected: Option<u64>,
    pub message: String,
}

impl MutationEnvelope {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: Value) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_rows_affected(mut self, n: u64) -> Self {
        self.rows_affected = Some(n);
        self
    }
}
