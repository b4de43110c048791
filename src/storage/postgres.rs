use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;

use crate::analytics::DateRange;
use crate::models::{
    DailyAggregate, Event, EventTypeCount, NewEvent, PageCount, ReferrerCount, SessionRecord,
    SessionSummary, TrendPoint, VisitorRow,
};
use crate::storage::{Storage, StorageResult};

pub struct PostgresStorage {
    pool: Arc<PgPool>,
}

impl PostgresStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

#[async_trait]
impl Storage for PostgresStorage {
    async fn init(&self) -> StorageResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS analytics_events (
                id BIGSERIAL PRIMARY KEY,
                event_type TEXT NOT NULL,
                event_data JSONB NOT NULL DEFAULT '{}'::jsonb,
                session_id TEXT NOT NULL,
                user_id TEXT,
                user_agent TEXT NOT NULL DEFAULT '',
                ip_address TEXT NOT NULL,
                referrer TEXT NOT NULL DEFAULT '',
                language TEXT NOT NULL DEFAULT '',
                page_url TEXT NOT NULL DEFAULT '',
                created_at TIMESTAMP NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_events_created_at ON analytics_events(created_at)",
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_events_session_id ON analytics_events(session_id)",
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_events_event_type ON analytics_events(event_type)",
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS analytics_daily (
                date DATE PRIMARY KEY,
                total_events BIGINT NOT NULL DEFAULT 0,
                page_views BIGINT NOT NULL DEFAULT 0,
                unique_visitors BIGINT NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS analytics_sessions (
                session_id TEXT PRIMARY KEY,
                start_time TIMESTAMP NOT NULL,
                last_activity TIMESTAMP NOT NULL,
                event_count BIGINT NOT NULL DEFAULT 1
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn record_event(&self, event: &NewEvent, now: NaiveDateTime) -> StorageResult<i64> {
        let today = DateRange::day(now.date());
        let mut tx = self.pool.begin().await?;

        let event_id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO analytics_events
                (event_type, event_data, session_id, user_id, user_agent, ip_address,
                 referrer, language, page_url, created_at)
            VALUES ($1, $2::jsonb, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id
            "#,
        )
        .bind(&event.event_type)
        .bind(event.data_json())
        .bind(&event.session_id)
        .bind(&event.user_id)
        .bind(&event.user_agent)
        .bind(&event.ip_address)
        .bind(&event.referrer)
        .bind(&event.language)
        .bind(&event.page_url)
        .bind(event.created_at)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO analytics_daily (date, total_events, page_views, unique_visitors)
            VALUES ($1, 1, $2, 1)
            ON CONFLICT (date) DO UPDATE SET
                total_events = analytics_daily.total_events + 1,
                page_views = analytics_daily.page_views + EXCLUDED.page_views,
                unique_visitors = (
                    SELECT COUNT(DISTINCT session_id)
                    FROM analytics_events
                    WHERE created_at >= $3 AND created_at < $4
                )
            "#,
        )
        .bind(now.date())
        .bind(i64::from(event.is_pageview()))
        .bind(today.start)
        .bind(today.end)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO analytics_sessions (session_id, start_time, last_activity, event_count)
            VALUES ($1, $2, $2, 1)
            ON CONFLICT (session_id) DO UPDATE SET
                last_activity = EXCLUDED.last_activity,
                event_count = analytics_sessions.event_count + 1
            "#,
        )
        .bind(&event.session_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(event_id)
    }

    async fn daily_aggregate(&self, date: NaiveDate) -> StorageResult<Option<DailyAggregate>> {
        let row = sqlx::query_as::<_, DailyAggregate>(
            r#"
            SELECT date, total_events, page_views, unique_visitors
            FROM analytics_daily
            WHERE date = $1
            "#,
        )
        .bind(date)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row)
    }

    async fn session(&self, session_id: &str) -> StorageResult<Option<SessionRecord>> {
        let row = sqlx::query_as::<_, SessionRecord>(
            r#"
            SELECT session_id, start_time, last_activity, event_count
            FROM analytics_sessions
            WHERE session_id = $1
            "#,
        )
        .bind(session_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row)
    }

    async fn count_sessions(&self, range: &DateRange) -> StorageResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(DISTINCT session_id)
            FROM analytics_events
            WHERE created_at >= $1 AND created_at < $2
            "#,
        )
        .bind(range.start)
        .bind(range.end)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(count)
    }

    async fn count_users(&self, range: &DateRange) -> StorageResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(DISTINCT user_id)
            FROM analytics_events
            WHERE created_at >= $1 AND created_at < $2
            AND user_id IS NOT NULL
            "#,
        )
        .bind(range.start)
        .bind(range.end)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(count)
    }

    async fn count_events_of_type(
        &self,
        range: &DateRange,
        event_type: &str,
    ) -> StorageResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM analytics_events
            WHERE event_type = $1
            AND created_at >= $2 AND created_at < $3
            "#,
        )
        .bind(event_type)
        .bind(range.start)
        .bind(range.end)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(count)
    }

    async fn session_summaries(&self, range: &DateRange) -> StorageResult<Vec<SessionSummary>> {
        let rows = sqlx::query_as::<_, SessionSummary>(
            r#"
            SELECT session_id,
                   COUNT(*) AS events,
                   MIN(created_at) AS first_seen,
                   MAX(created_at) AS last_seen,
                   MAX(user_agent) AS user_agent
            FROM analytics_events
            WHERE created_at >= $1 AND created_at < $2
            GROUP BY session_id
            "#,
        )
        .bind(range.start)
        .bind(range.end)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows)
    }

    async fn top_pages(&self, range: &DateRange, limit: i64) -> StorageResult<Vec<PageCount>> {
        let rows = sqlx::query_as::<_, PageCount>(
            r#"
            SELECT page, COUNT(*) AS views
            FROM (
                SELECT event_data ->> 'label' AS page
                FROM analytics_events
                WHERE event_type = 'pageview'
                AND created_at >= $1 AND created_at < $2
            ) AS labelled
            WHERE page IS NOT NULL
            GROUP BY page
            ORDER BY views DESC, page ASC
            LIMIT $3
            "#,
        )
        .bind(range.start)
        .bind(range.end)
        .bind(limit)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows)
    }

    async fn top_referrers(
        &self,
        range: &DateRange,
        limit: i64,
    ) -> StorageResult<Vec<ReferrerCount>> {
        let rows = sqlx::query_as::<_, ReferrerCount>(
            r#"
            SELECT referrer, COUNT(*) AS visits
            FROM analytics_events
            WHERE created_at >= $1 AND created_at < $2
            AND referrer != ''
            GROUP BY referrer
            ORDER BY visits DESC, referrer ASC
            LIMIT $3
            "#,
        )
        .bind(range.start)
        .bind(range.end)
        .bind(limit)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows)
    }

    async fn daily_trend(&self, range: &DateRange) -> StorageResult<Vec<TrendPoint>> {
        let rows = sqlx::query_as::<_, TrendPoint>(
            r#"
            SELECT TO_CHAR(created_at::date, 'YYYY-MM-DD') AS date,
                   COUNT(DISTINCT session_id) AS visitors,
                   SUM(CASE WHEN event_type = 'pageview' THEN 1 ELSE 0 END) AS pageviews
            FROM analytics_events
            WHERE created_at >= $1 AND created_at < $2
            GROUP BY 1
            ORDER BY 1
            "#,
        )
        .bind(range.start)
        .bind(range.end)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows)
    }

    async fn event_type_counts(&self, range: &DateRange) -> StorageResult<Vec<EventTypeCount>> {
        let rows = sqlx::query_as::<_, EventTypeCount>(
            r#"
            SELECT event_type, COUNT(*) AS count
            FROM analytics_events
            WHERE created_at >= $1 AND created_at < $2
            GROUP BY event_type
            ORDER BY count DESC, event_type ASC
            "#,
        )
        .bind(range.start)
        .bind(range.end)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows)
    }

    async fn list_visitors(&self, limit: i64, offset: i64) -> StorageResult<Vec<VisitorRow>> {
        let rows = sqlx::query_as::<_, VisitorRow>(
            r#"
            SELECT session_id,
                   MAX(user_id) AS user_id,
                   MAX(user_agent) AS user_agent,
                   MAX(ip_address) AS ip_address,
                   MAX(created_at) AS last_visit,
                   COUNT(*) AS visits,
                   STRING_AGG(DISTINCT event_type, ',') AS activities
            FROM analytics_events
            GROUP BY session_id
            ORDER BY last_visit DESC, session_id ASC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows)
    }

    async fn total_sessions(&self) -> StorageResult<i64> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(DISTINCT session_id) FROM analytics_events")
                .fetch_one(self.pool.as_ref())
                .await?;

        Ok(count)
    }

    async fn recent_events(
        &self,
        event_type: Option<&str>,
        limit: i64,
    ) -> StorageResult<Vec<Event>> {
        let events = if let Some(event_type) = event_type {
            sqlx::query_as::<_, Event>(
                r#"
                SELECT id, event_type, event_data, session_id, user_id, user_agent,
                       ip_address, referrer, language, page_url, created_at
                FROM analytics_events
                WHERE event_type = $1
                ORDER BY created_at DESC, id DESC
                LIMIT $2
                "#,
            )
            .bind(event_type)
            .bind(limit)
            .fetch_all(self.pool.as_ref())
            .await?
        } else {
            sqlx::query_as::<_, Event>(
                r#"
                SELECT id, event_type, event_data, session_id, user_id, user_agent,
                       ip_address, referrer, language, page_url, created_at
                FROM analytics_events
                ORDER BY created_at DESC, id DESC
                LIMIT $1
                "#,
            )
            .bind(limit)
            .fetch_all(self.pool.as_ref())
            .await?
        };

        Ok(events)
    }

    async fn events_in_range(&self, range: &DateRange) -> StorageResult<Vec<Event>> {
        let events = sqlx::query_as::<_, Event>(
            r#"
            SELECT id, event_type, event_data, session_id, user_id, user_agent,
                   ip_address, referrer, language, page_url, created_at
            FROM analytics_events
            WHERE created_at >= $1 AND created_at < $2
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(range.start)
        .bind(range.end)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(events)
    }
}
