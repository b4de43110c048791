//! Read-only dashboard reports over stored events

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::debug;

use crate::analytics::device::DeviceClass;
use crate::analytics::{DateRange, Timeframe};
use crate::models::{DeviceShare, Event, NewEvent, SessionSummary, Stats, VisitorPage};
use crate::storage::{Storage, StorageResult};

/// Entries kept in `topPages` and `referrers`
pub const TOP_N: i64 = 10;

pub const DEFAULT_VISITOR_LIMIT: i64 = 100;
pub const MAX_VISITOR_LIMIT: i64 = 1000;
pub const DEFAULT_EVENT_LIMIT: i64 = 50;
pub const MAX_EVENT_LIMIT: i64 = 500;

pub struct Reporter {
    storage: Arc<dyn Storage>,
}

impl Reporter {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub async fn stats(&self, timeframe: Timeframe, today: NaiveDate) -> StorageResult<Stats> {
        let range = DateRange::for_timeframe(timeframe, today);
        debug!(?timeframe, start = %range.start, end = %range.end, "building stats");

        let total_visitors = self.storage.count_sessions(&range).await?;
        let unique_visitors = self.storage.count_users(&range).await?;
        let page_views = self
            .storage
            .count_events_of_type(&range, NewEvent::PAGEVIEW)
            .await?;
        let sessions = self.storage.session_summaries(&range).await?;
        let top_pages = self.storage.top_pages(&range, TOP_N).await?;
        let referrers = self.storage.top_referrers(&range, TOP_N).await?;
        let visitor_data = self.storage.daily_trend(&range).await?;
        let event_types = self.storage.event_type_counts(&range).await?;

        Ok(Stats {
            total_visitors,
            unique_visitors,
            page_views,
            avg_time_on_site: avg_time_on_site(&sessions),
            bounce_rate: bounce_rate(&sessions),
            top_pages,
            devices: device_breakdown(&sessions),
            referrers,
            visitor_data,
            event_types,
        })
    }

    pub async fn visitors(
        &self,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> StorageResult<VisitorPage> {
        let limit = clamp_limit(limit, DEFAULT_VISITOR_LIMIT, MAX_VISITOR_LIMIT);
        let offset = offset.unwrap_or(0).max(0);

        let visitors = self.storage.list_visitors(limit, offset).await?;
        let total = self.storage.total_sessions().await?;
        Ok(VisitorPage { visitors, total })
    }

    pub async fn events(
        &self,
        event_type: Option<&str>,
        limit: Option<i64>,
    ) -> StorageResult<Vec<Event>> {
        let limit = clamp_limit(limit, DEFAULT_EVENT_LIMIT, MAX_EVENT_LIMIT);
        let event_type = event_type.filter(|t| !t.is_empty());
        self.storage.recent_events(event_type, limit).await
    }

    pub async fn export(&self, range: DateRange) -> StorageResult<Vec<Event>> {
        self.storage.events_in_range(&range).await
    }
}

pub fn clamp_limit(requested: Option<i64>, default: i64, max: i64) -> i64 {
    requested.unwrap_or(default).clamp(1, max)
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Share of sessions with a single event, as a percentage
pub fn bounce_rate(sessions: &[SessionSummary]) -> f64 {
    if sessions.is_empty() {
        return 0.0;
    }
    let bounced = sessions.iter().filter(|s| s.events == 1).count();
    round2(bounced as f64 / sessions.len() as f64 * 100.0)
}

/// Mean first-to-last event span in seconds
pub fn avg_time_on_site(sessions: &[SessionSummary]) -> f64 {
    if sessions.is_empty() {
        return 0.0;
    }
    let total: i64 = sessions
        .iter()
        .map(|s| (s.last_seen - s.first_seen).num_seconds().max(0))
        .sum();
    round2(total as f64 / sessions.len() as f64)
}

pub fn device_breakdown(sessions: &[SessionSummary]) -> Vec<DeviceShare> {
    let mut counts: BTreeMap<DeviceClass, i64> = DeviceClass::ALWAYS_REPORTED
        .iter()
        .map(|class| (*class, 0))
        .collect();

    for session in sessions {
        *counts
            .entry(DeviceClass::classify(&session.user_agent))
            .or_insert(0) += 1;
    }

    let total = sessions.len() as f64;
    counts
        .into_iter()
        .map(|(class, count)| DeviceShare {
            name: class.name().to_string(),
            count,
            percentage: if total > 0.0 {
                round2(count as f64 / total * 100.0)
            } else {
                0.0
            },
        })
        .collect()
}
