//! Dashboard report shapes

use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::FromRow;

/// Composite object returned by `action=stats`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    /// Distinct sessions in range
    pub total_visitors: i64,
    /// Distinct non-null user ids in range
    pub unique_visitors: i64,
    pub page_views: i64,
    /// Mean session span in seconds
    pub avg_time_on_site: f64,
    /// Percentage of single-event sessions
    pub bounce_rate: f64,
    pub top_pages: Vec<PageCount>,
    pub devices: Vec<DeviceShare>,
    pub referrers: Vec<ReferrerCount>,
    pub visitor_data: Vec<TrendPoint>,
    pub event_types: Vec<EventTypeCount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct PageCount {
    pub page: String,
    pub views: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceShare {
    pub name: String,
    pub count: i64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct ReferrerCount {
    pub referrer: String,
    pub visits: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct TrendPoint {
    /// Calendar date formatted as `YYYY-MM-DD`
    pub date: String,
    pub visitors: i64,
    pub pageviews: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct EventTypeCount {
    pub event_type: String,
    pub count: i64,
}

/// One session's activity within a report window
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct SessionSummary {
    pub session_id: String,
    pub events: i64,
    pub first_seen: NaiveDateTime,
    pub last_seen: NaiveDateTime,
    pub user_agent: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct VisitorRow {
    pub session_id: String,
    pub user_id: Option<String>,
    pub user_agent: String,
    pub ip_address: String,
    pub last_visit: NaiveDateTime,
    pub visits: i64,
    #[sqlx(try_from = "String")]
    pub activities: Activities,
}

/// Distinct event types seen in a session, decoded from a comma-joined column
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Activities(pub Vec<String>);

impl From<String> for Activities {
    fn from(joined: String) -> Self {
        let mut types: Vec<String> = joined
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        types.sort();
        types.dedup();
        Activities(types)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisitorPage {
    pub visitors: Vec<VisitorRow>,
    pub total: i64,
}
