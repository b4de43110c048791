use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::analytics::DateRange;
use crate::models::{
    DailyAggregate, Event, EventTypeCount, NewEvent, PageCount, ReferrerCount, SessionRecord,
    SessionSummary, TrendPoint, VisitorRow,
};
use crate::storage::{Storage, StorageError, StorageResult};

/// Storage wrapper that bounds every call with a deadline
///
/// A call that outlives the deadline is dropped and reported as
/// [`StorageError::Timeout`]. Dropping an in-flight `record_event` drops its
/// transaction, which rolls it back.
pub struct TimeoutStorage {
    /// Underlying storage implementation
    inner: Arc<dyn Storage>,
    timeout: Duration,
}

impl TimeoutStorage {
    pub fn new(inner: Arc<dyn Storage>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> StorageResult<T>
    where
        F: Future<Output = StorageResult<T>> + Send,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    operation,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "storage call exceeded deadline"
                );
                Err(StorageError::Timeout)
            }
        }
    }
}

#[async_trait]
impl Storage for TimeoutStorage {
    async fn init(&self) -> StorageResult<()> {
        self.bounded("init", self.inner.init()).await
    }

    async fn record_event(&self, event: &NewEvent, now: NaiveDateTime) -> StorageResult<i64> {
        self.bounded("record_event", self.inner.record_event(event, now))
            .await
    }

    async fn daily_aggregate(&self, date: NaiveDate) -> StorageResult<Option<DailyAggregate>> {
        self.bounded("daily_aggregate", self.inner.daily_aggregate(date))
            .await
    }

    async fn session(&self, session_id: &str) -> StorageResult<Option<SessionRecord>> {
        self.bounded("session", self.inner.session(session_id)).await
    }

    async fn count_sessions(&self, range: &DateRange) -> StorageResult<i64> {
        self.bounded("count_sessions", self.inner.count_sessions(range))
            .await
    }

    async fn count_users(&self, range: &DateRange) -> StorageResult<i64> {
        self.bounded("count_users", self.inner.count_users(range)).await
    }

    async fn count_events_of_type(
        &self,
        range: &DateRange,
        event_type: &str,
    ) -> StorageResult<i64> {
        self.bounded(
            "count_events_of_type",
            self.inner.count_events_of_type(range, event_type),
        )
        .await
    }

    async fn session_summaries(&self, range: &DateRange) -> StorageResult<Vec<SessionSummary>> {
        self.bounded("session_summaries", self.inner.session_summaries(range))
            .await
    }

    async fn top_pages(&self, range: &DateRange, limit: i64) -> StorageResult<Vec<PageCount>> {
        self.bounded("top_pages", self.inner.top_pages(range, limit))
            .await
    }

    async fn top_referrers(
        &self,
        range: &DateRange,
        limit: i64,
    ) -> StorageResult<Vec<ReferrerCount>> {
        self.bounded("top_referrers", self.inner.top_referrers(range, limit))
            .await
    }

    async fn daily_trend(&self, range: &DateRange) -> StorageResult<Vec<TrendPoint>> {
        self.bounded("daily_trend", self.inner.daily_trend(range)).await
    }

    async fn event_type_counts(&self, range: &DateRange) -> StorageResult<Vec<EventTypeCount>> {
        self.bounded("event_type_counts", self.inner.event_type_counts(range))
            .await
    }

    async fn list_visitors(&self, limit: i64, offset: i64) -> StorageResult<Vec<VisitorRow>> {
        self.bounded("list_visitors", self.inner.list_visitors(limit, offset))
            .await
    }

    async fn total_sessions(&self) -> StorageResult<i64> {
        self.bounded("total_sessions", self.inner.total_sessions())
            .await
    }

    async fn recent_events(
        &self,
        event_type: Option<&str>,
        limit: i64,
    ) -> StorageResult<Vec<Event>> {
        self.bounded("recent_events", self.inner.recent_events(event_type, limit))
            .await
    }

    async fn events_in_range(&self, range: &DateRange) -> StorageResult<Vec<Event>> {
        self.bounded("events_in_range", self.inner.events_in_range(range))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStorage;

    /// Storage whose session lookups never complete
    struct StalledStorage(SqliteStorage);

    #[async_trait]
    impl Storage for StalledStorage {
        async fn init(&self) -> StorageResult<()> {
            self.0.init().await
        }
        async fn record_event(&self, event: &NewEvent, now: NaiveDateTime) -> StorageResult<i64> {
            self.0.record_event(event, now).await
        }
        async fn daily_aggregate(&self, date: NaiveDate) -> StorageResult<Option<DailyAggregate>> {
            self.0.daily_aggregate(date).await
        }
        async fn session(&self, _session_id: &str) -> StorageResult<Option<SessionRecord>> {
            std::future::pending().await
        }
        async fn count_sessions(&self, range: &DateRange) -> StorageResult<i64> {
            self.0.count_sessions(range).await
        }
        async fn count_users(&self, range: &DateRange) -> StorageResult<i64> {
            self.0.count_users(range).await
        }
        async fn count_events_of_type(
            &self,
            range: &DateRange,
            event_type: &str,
        ) -> StorageResult<i64> {
            self.0.count_events_of_type(range, event_type).await
        }
        async fn session_summaries(
            &self,
            range: &DateRange,
        ) -> StorageResult<Vec<SessionSummary>> {
            self.0.session_summaries(range).await
        }
        async fn top_pages(&self, range: &DateRange, limit: i64) -> StorageResult<Vec<PageCount>> {
            self.0.top_pages(range, limit).await
        }
        async fn top_referrers(
            &self,
            range: &DateRange,
            limit: i64,
        ) -> StorageResult<Vec<ReferrerCount>> {
            self.0.top_referrers(range, limit).await
        }
        async fn daily_trend(&self, range: &DateRange) -> StorageResult<Vec<TrendPoint>> {
            self.0.daily_trend(range).await
        }
        async fn event_type_counts(
            &self,
            range: &DateRange,
        ) -> StorageResult<Vec<EventTypeCount>> {
            self.0.event_type_counts(range).await
        }
        async fn list_visitors(&self, limit: i64, offset: i64) -> StorageResult<Vec<VisitorRow>> {
            self.0.list_visitors(limit, offset).await
        }
        async fn total_sessions(&self) -> StorageResult<i64> {
            self.0.total_sessions().await
        }
        async fn recent_events(
            &self,
            event_type: Option<&str>,
            limit: i64,
        ) -> StorageResult<Vec<Event>> {
            self.0.recent_events(event_type, limit).await
        }
        async fn events_in_range(&self, range: &DateRange) -> StorageResult<Vec<Event>> {
            self.0.events_in_range(range).await
        }
    }

    #[tokio::test]
    async fn test_stalled_call_becomes_timeout() {
        let inner = SqliteStorage::new("sqlite::memory:", 1).await.unwrap();
        inner.init().await.unwrap();
        let storage = TimeoutStorage::new(
            Arc::new(StalledStorage(inner)),
            Duration::from_millis(50),
        );

        let result = storage.session("session_1_abc").await;
        assert!(matches!(result, Err(StorageError::Timeout)));

        // Calls that finish in time pass straight through
        assert_eq!(storage.total_sessions().await.unwrap(), 0);
    }
}
