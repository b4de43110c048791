use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;

/// A stored analytics event. Rows are append-only.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Event {
    pub id: i64,
    pub event_type: String,
    #[sqlx(json)]
    pub event_data: Value,
    pub session_id: String,
    pub user_id: Option<String>,
    pub user_agent: String,
    pub ip_address: String,
    pub referrer: String,
    pub language: String,
    pub page_url: String,
    pub created_at: NaiveDateTime,
}

impl Event {
    /// Column order shared by SELECTs and the CSV export header
    pub const COLUMNS: [&'static str; 11] = [
        "id",
        "event_type",
        "event_data",
        "session_id",
        "user_id",
        "user_agent",
        "ip_address",
        "referrer",
        "language",
        "page_url",
        "created_at",
    ];
}

/// Fully resolved event ready to be inserted
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub event_type: String,
    pub event_data: Map<String, Value>,
    pub session_id: String,
    pub user_id: Option<String>,
    pub user_agent: String,
    pub ip_address: String,
    pub referrer: String,
    pub language: String,
    pub page_url: String,
    pub created_at: NaiveDateTime,
}

impl NewEvent {
    pub const PAGEVIEW: &'static str = "pageview";

    pub fn is_pageview(&self) -> bool {
        self.event_type == Self::PAGEVIEW
    }

    /// Serialized payload as stored in `event_data`
    pub fn data_json(&self) -> String {
        Value::Object(self.event_data.clone()).to_string()
    }
}

/// Body of a tracking beacon
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackRequest {
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub data: Option<Map<String, Value>>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    /// RFC 3339 string, `YYYY-MM-DD HH:MM:SS`, or epoch milliseconds
    #[serde(default)]
    pub timestamp: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrackReceipt {
    pub success: bool,
    pub message: String,
    pub event_id: i64,
    pub session_id: String,
}
