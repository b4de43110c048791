//! Event ingestion
//!
//! A beacon body is validated, defaulted and enriched with request context,
//! then handed to storage which inserts the event and applies the daily and
//! session upserts in one transaction.

use axum::http::{header, HeaderMap};
use chrono::{DateTime, Local, NaiveDateTime, Timelike, Utc};
use serde_json::{Map, Value};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::analytics::ip_extractor::{anonymize_ip, extract_client_ip};
use crate::config::AnalyticsConfig;
use crate::error::ApiError;
use crate::models::{NewEvent, TrackReceipt, TrackRequest};
use crate::storage::Storage;

const UNKNOWN_EVENT: &str = "unknown";

/// Ambient request data captured at ingestion time
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub user_agent: String,
    pub referer: String,
    pub accept_language: String,
    pub client_ip: IpAddr,
}

impl RequestContext {
    pub fn from_headers(headers: &HeaderMap, socket_addr: Option<IpAddr>) -> Self {
        let header_str = |name: header::HeaderName| {
            headers
                .get(name)
                .and_then(|h| h.to_str().ok())
                .unwrap_or("")
                .to_string()
        };

        Self {
            user_agent: header_str(header::USER_AGENT),
            referer: header_str(header::REFERER),
            accept_language: header_str(header::ACCEPT_LANGUAGE),
            client_ip: extract_client_ip(headers, socket_addr),
        }
    }
}

pub struct Tracker {
    storage: Arc<dyn Storage>,
    config: AnalyticsConfig,
}

impl Tracker {
    pub fn new(storage: Arc<dyn Storage>, config: AnalyticsConfig) -> Self {
        Self { storage, config }
    }

    /// Record one event from a raw beacon body
    pub async fn track(&self, body: &[u8], ctx: RequestContext) -> Result<TrackReceipt, ApiError> {
        let now = local_now();
        let request = parse_track_request(body)?;
        let event = self.prepare(request, ctx, now)?;

        let event_id = self.storage.record_event(&event, now).await?;

        debug!(
            event_id,
            event_type = %event.event_type,
            session_id = %event.session_id,
            "tracked analytics event"
        );

        Ok(TrackReceipt {
            success: true,
            message: "Event tracked successfully".to_string(),
            event_id,
            session_id: event.session_id,
        })
    }

    fn prepare(
        &self,
        request: TrackRequest,
        ctx: RequestContext,
        now: NaiveDateTime,
    ) -> Result<NewEvent, ApiError> {
        let event_type = request
            .event
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| UNKNOWN_EVENT.to_string());

        let event_data = request.data.unwrap_or_default();

        let session_id = request
            .session_id
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| generate_session_id(Utc::now().timestamp()));

        let user_id = request
            .user_id
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());

        let created_at = match request.timestamp {
            Some(ref raw) => parse_client_timestamp(raw).ok_or_else(|| {
                warn!(timestamp = %raw, "rejected event with unparseable timestamp");
                ApiError::InvalidInput("Invalid timestamp".to_string())
            })?,
            None => now,
        };

        let client_ip = if self.config.ip_anonymization {
            anonymize_ip(ctx.client_ip)
        } else {
            ctx.client_ip
        };

        let referrer = payload_referrer(&event_data).unwrap_or_else(|| ctx.referer.clone());

        Ok(NewEvent {
            event_type,
            event_data,
            session_id,
            user_id,
            user_agent: ctx.user_agent,
            ip_address: client_ip.to_string(),
            referrer,
            language: ctx.accept_language,
            page_url: ctx.referer,
            created_at,
        })
    }
}

/// Parse a beacon body. Bodies arrive as `application/json` from `fetch` and as
/// `text/plain` from `navigator.sendBeacon`, so the content type is ignored.
pub fn parse_track_request(body: &[u8]) -> Result<TrackRequest, ApiError> {
    serde_json::from_slice::<TrackRequest>(body).map_err(|e| {
        warn!(error = %e, "rejected malformed analytics payload");
        ApiError::InvalidInput("Invalid JSON data".to_string())
    })
}

/// `session_<unix seconds>_<16 hex digits>` carrying 64 random bits
pub fn generate_session_id(unix_secs: i64) -> String {
    let entropy: u64 = rand::random();
    format!("session_{}_{:016x}", unix_secs, entropy)
}

/// Accepts RFC 3339 strings, naive `YYYY-MM-DD HH:MM:SS` strings (taken as
/// server-local) and epoch milliseconds. Results are truncated to whole seconds.
pub fn parse_client_timestamp(raw: &Value) -> Option<NaiveDateTime> {
    let parsed = match raw {
        Value::String(s) => {
            let s = s.trim();
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Local).naive_local())
                .ok()
                .or_else(|| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").ok())
                .or_else(|| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").ok())
        }
        Value::Number(n) => n
            .as_i64()
            .and_then(DateTime::from_timestamp_millis)
            .map(|dt| dt.with_timezone(&Local).naive_local()),
        _ => None,
    }?;

    Some(truncate_to_seconds(parsed))
}

fn payload_referrer(data: &Map<String, Value>) -> Option<String> {
    data.get("referrer")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
}

fn local_now() -> NaiveDateTime {
    truncate_to_seconds(Local::now().naive_local())
}

fn truncate_to_seconds(ts: NaiveDateTime) -> NaiveDateTime {
    ts.with_nanosecond(0).unwrap_or(ts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStorage;
    use axum::http::HeaderValue;
    use chrono::NaiveDate;
    use serde_json::json;

    fn context() -> RequestContext {
        RequestContext {
            user_agent: "Mozilla/5.0 (X11; Linux x86_64)".to_string(),
            referer: "https://portfolio.example/projects".to_string(),
            accept_language: "en-GB,en;q=0.9".to_string(),
            client_ip: "203.0.113.77".parse().unwrap(),
        }
    }

    async fn tracker(config: AnalyticsConfig) -> (Tracker, Arc<dyn Storage>) {
        let storage = SqliteStorage::new("sqlite::memory:", 1).await.unwrap();
        storage.init().await.unwrap();
        let storage: Arc<dyn Storage> = Arc::new(storage);
        (Tracker::new(Arc::clone(&storage), config), storage)
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 15)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    #[test]
    fn test_generated_session_id_shape() {
        let id = generate_session_id(1_760_000_000);
        let parts: Vec<&str> = id.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "session");
        assert_eq!(parts[1], "1760000000");
        assert_eq!(parts[2].len(), 16);
        assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_generated_session_ids_differ() {
        assert_ne!(generate_session_id(1), generate_session_id(1));
    }

    #[test]
    fn test_parse_rejects_non_objects() {
        assert!(parse_track_request(b"not json").is_err());
        assert!(parse_track_request(b"[1,2,3]").is_err());
        assert!(parse_track_request(b"null").is_err());
        assert!(parse_track_request(b"").is_err());
        assert!(parse_track_request(br#"{"data": [1]}"#).is_err());
    }

    #[test]
    fn test_parse_accepts_empty_object() {
        let request = parse_track_request(b"{}").unwrap();
        assert!(request.event.is_none());
        assert!(request.data.is_none());
    }

    #[test]
    fn test_client_timestamp_formats() {
        let naive = parse_client_timestamp(&json!("2026-10-15 08:15:30")).unwrap();
        assert_eq!(
            naive,
            NaiveDate::from_ymd_opt(2026, 10, 15)
                .unwrap()
                .and_hms_opt(8, 15, 30)
                .unwrap()
        );

        let rfc3339 = parse_client_timestamp(&json!("2026-10-15T08:15:30.250Z")).unwrap();
        let expected = DateTime::parse_from_rfc3339("2026-10-15T08:15:30Z")
            .unwrap()
            .with_timezone(&Local)
            .naive_local();
        assert_eq!(rfc3339, expected);

        let millis = parse_client_timestamp(&json!(1_792_052_130_250_i64)).unwrap();
        assert_eq!(millis, expected);

        assert!(parse_client_timestamp(&json!("yesterday")).is_none());
        assert!(parse_client_timestamp(&json!(true)).is_none());
    }

    #[test]
    fn test_request_context_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, HeaderValue::from_static("curl/8.0"));
        headers.insert(header::REFERER, HeaderValue::from_static("https://a.example/"));
        headers.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_static("fr-FR"));
        headers.insert("x-forwarded-for", HeaderValue::from_static("198.51.100.4, 10.0.0.1"));

        let ctx = RequestContext::from_headers(&headers, Some("10.0.0.2".parse().unwrap()));
        assert_eq!(ctx.user_agent, "curl/8.0");
        assert_eq!(ctx.referer, "https://a.example/");
        assert_eq!(ctx.accept_language, "fr-FR");
        assert_eq!(ctx.client_ip, "198.51.100.4".parse::<IpAddr>().unwrap());
    }

    #[tokio::test]
    async fn test_prepare_applies_defaults() {
        let (tracker, _) = tracker(AnalyticsConfig::default()).await;
        let event = tracker
            .prepare(TrackRequest::default(), context(), now())
            .unwrap();

        assert_eq!(event.event_type, "unknown");
        assert!(event.event_data.is_empty());
        assert!(event.session_id.starts_with("session_"));
        assert_eq!(event.user_id, None);
        assert_eq!(event.created_at, now());
        assert_eq!(event.ip_address, "203.0.113.77");
        assert_eq!(event.page_url, "https://portfolio.example/projects");
        assert_eq!(event.referrer, "https://portfolio.example/projects");
        assert_eq!(event.language, "en-GB,en;q=0.9");
    }

    #[tokio::test]
    async fn test_prepare_prefers_payload_referrer_and_anonymizes() {
        let (tracker, _) = tracker(AnalyticsConfig {
            ip_anonymization: true,
        })
        .await;
        let request: TrackRequest = serde_json::from_value(json!({
            "event": "pageview",
            "data": {"label": "/home", "referrer": "https://news.example/"},
            "sessionId": "session_1_abc",
            "userId": "u-42"
        }))
        .unwrap();

        let event = tracker.prepare(request, context(), now()).unwrap();
        assert_eq!(event.event_type, "pageview");
        assert_eq!(event.session_id, "session_1_abc");
        assert_eq!(event.user_id.as_deref(), Some("u-42"));
        assert_eq!(event.referrer, "https://news.example/");
        assert_eq!(event.ip_address, "203.0.113.0");
    }

    #[tokio::test]
    async fn test_prepare_rejects_bad_timestamp() {
        let (tracker, _) = tracker(AnalyticsConfig::default()).await;
        let request = TrackRequest {
            timestamp: Some(json!("half past nine")),
            ..Default::default()
        };

        let err = tracker.prepare(request, context(), now()).unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_track_persists_event() {
        let (tracker, storage) = tracker(AnalyticsConfig::default()).await;
        let body = br#"{"event":"click","data":{"label":"cta"},"sessionId":"s-1"}"#;

        let receipt = tracker.track(body, context()).await.unwrap();
        assert!(receipt.success);
        assert_eq!(receipt.session_id, "s-1");

        let events = storage.recent_events(None, 10).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, receipt.event_id);
        assert_eq!(events[0].event_type, "click");
        assert_eq!(events[0].event_data, json!({"label": "cta"}));

        let session = storage.session("s-1").await.unwrap().unwrap();
        assert_eq!(session.event_count, 1);
    }

    #[tokio::test]
    async fn test_track_rejects_garbage_without_writing() {
        let (tracker, storage) = tracker(AnalyticsConfig::default()).await;

        let err = tracker.track(b"{oops", context()).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput(_)));
        assert_eq!(storage.total_sessions().await.unwrap(), 0);
    }
}
