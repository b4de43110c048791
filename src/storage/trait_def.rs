use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use thiserror::Error;

use crate::analytics::DateRange;
use crate::models::{
    DailyAggregate, Event, EventTypeCount, NewEvent, PageCount, ReferrerCount, SessionRecord,
    SessionSummary, TrendPoint, VisitorRow,
};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage operation timed out")]
    Timeout,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

#[async_trait]
pub trait Storage: Send + Sync {
    /// Create tables and indexes if missing
    async fn init(&self) -> StorageResult<()>;

    /// Insert an event and apply the daily and session upserts in one transaction.
    ///
    /// `now` is the server's local time; its date selects the daily row.
    /// Returns the new event id.
    async fn record_event(&self, event: &NewEvent, now: NaiveDateTime) -> StorageResult<i64>;

    async fn daily_aggregate(&self, date: NaiveDate) -> StorageResult<Option<DailyAggregate>>;

    async fn session(&self, session_id: &str) -> StorageResult<Option<SessionRecord>>;

    /// Distinct sessions with at least one event in range
    async fn count_sessions(&self, range: &DateRange) -> StorageResult<i64>;

    /// Distinct non-null user ids in range
    async fn count_users(&self, range: &DateRange) -> StorageResult<i64>;

    async fn count_events_of_type(&self, range: &DateRange, event_type: &str)
        -> StorageResult<i64>;

    /// Per-session event count, first/last event time and user agent
    async fn session_summaries(&self, range: &DateRange) -> StorageResult<Vec<SessionSummary>>;

    /// Pageview counts grouped by `event_data.label`, most viewed first
    async fn top_pages(&self, range: &DateRange, limit: i64) -> StorageResult<Vec<PageCount>>;

    async fn top_referrers(&self, range: &DateRange, limit: i64)
        -> StorageResult<Vec<ReferrerCount>>;

    /// Per-day visitors and event totals, oldest day first
    async fn daily_trend(&self, range: &DateRange) -> StorageResult<Vec<TrendPoint>>;

    async fn event_type_counts(&self, range: &DateRange) -> StorageResult<Vec<EventTypeCount>>;

    /// Sessions ordered by most recent activity
    async fn list_visitors(&self, limit: i64, offset: i64) -> StorageResult<Vec<VisitorRow>>;

    /// Distinct sessions across all stored events
    async fn total_sessions(&self) -> StorageResult<i64>;

    async fn recent_events(&self, event_type: Option<&str>, limit: i64)
        -> StorageResult<Vec<Event>>;

    /// Every event in range, newest first
    async fn events_in_range(&self, range: &DateRange) -> StorageResult<Vec<Event>>;
}
