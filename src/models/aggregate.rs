use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use sqlx::FromRow;

/// Per-date rollup maintained by the ingestion write path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct DailyAggregate {
    pub date: NaiveDate,
    pub total_events: i64,
    pub page_views: i64,
    pub unique_visitors: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct SessionRecord {
    pub session_id: String,
    pub start_time: NaiveDateTime,
    pub last_activity: NaiveDateTime,
    pub event_count: i64,
}
