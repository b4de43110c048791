use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, ConnectInfo, FromRequestParts, Query, State},
    http::{header, request::Parts, HeaderMap},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Deserializer, Serialize};
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use crate::analytics::export::{self, CSV_CONTENT_TYPE};
use crate::analytics::{local_today, ExportFormat, Reporter, RequestContext, Timeframe, Tracker};
use crate::error::ApiError;
use crate::models::TrackReceipt;

pub struct AppState {
    pub tracker: Tracker,
    pub reporter: Reporter,
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub message: String,
}

/// Dashboard query string shared by every GET action
#[derive(Debug, Default, Deserialize)]
pub struct ReportParams {
    pub action: Option<String>,
    pub timeframe: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub limit: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub offset: Option<i64>,
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    pub format: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
}

/// Integer query value that never fails: out-of-range digits saturate and
/// anything non-numeric counts as absent, leaving clamping to the reporter.
fn lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_lenient_i64))
}

fn parse_lenient_i64(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(value) = raw.parse::<i64>() {
        return Some(value);
    }

    let (negative, digits) = match raw.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, raw.strip_prefix('+').unwrap_or(raw)),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(if negative { i64::MIN } else { i64::MAX })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportAction {
    Stats,
    Visitors,
    Events,
    Export,
}

impl ReportAction {
    /// Absent action means `stats`
    pub fn parse(action: Option<&str>) -> Result<Self, ApiError> {
        match action {
            None | Some("stats") => Ok(Self::Stats),
            Some("visitors") => Ok(Self::Visitors),
            Some("events") => Ok(Self::Events),
            Some("export") => Ok(Self::Export),
            Some(_) => Err(ApiError::InvalidAction),
        }
    }
}

/// Peer address when the server was started with connect info
pub struct PeerAddr(pub Option<IpAddr>);

impl<S> FromRequestParts<S> for PeerAddr
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(PeerAddr(
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip()),
        ))
    }
}

/// Record a tracking beacon
pub async fn track_event(
    State(state): State<Arc<AppState>>,
    PeerAddr(peer): PeerAddr,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<TrackReceipt>, ApiError> {
    let ctx = RequestContext::from_headers(&headers, peer);
    let receipt = state.tracker.track(&body, ctx).await?;
    Ok(Json(receipt))
}

/// Serve one of the dashboard reports selected by `action`
pub async fn report(
    State(state): State<Arc<AppState>>,
    params: Result<Query<ReportParams>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(params) = params.map_err(|e| {
        tracing::warn!("rejected dashboard query: {}", e);
        ApiError::InvalidInput(e.body_text())
    })?;

    let today = local_today();

    match ReportAction::parse(params.action.as_deref())? {
        ReportAction::Stats => {
            let timeframe = Timeframe::parse(params.timeframe.as_deref());
            let stats = state.reporter.stats(timeframe, today).await?;
            Ok(Json(stats).into_response())
        }
        ReportAction::Visitors => {
            let page = state.reporter.visitors(params.limit, params.offset).await?;
            Ok(Json(page).into_response())
        }
        ReportAction::Events => {
            let events = state
                .reporter
                .events(params.event_type.as_deref(), params.limit)
                .await?;
            Ok(Json(events).into_response())
        }
        ReportAction::Export => {
            let format = ExportFormat::parse(params.format.as_deref())?;
            let range =
                export::parse_export_range(params.start.as_deref(), params.end.as_deref(), today)?;
            let events = state.reporter.export(range).await?;

            match format {
                ExportFormat::Json => Ok(Json(events).into_response()),
                ExportFormat::Csv => {
                    let disposition =
                        format!("attachment; filename=\"{}\"", export::export_filename(today));
                    Ok((
                        [
                            (header::CONTENT_TYPE, CSV_CONTENT_TYPE.to_string()),
                            (header::CONTENT_DISPOSITION, disposition),
                        ],
                        export::render_csv(&events),
                    )
                        .into_response())
                }
            }
        }
    }
}

pub async fn preflight() -> Json<SuccessResponse> {
    Json(SuccessResponse { success: true })
}

pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        message: "OK".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lenient_integer_params() {
        assert_eq!(parse_lenient_i64("25"), Some(25));
        assert_eq!(parse_lenient_i64(" -3 "), Some(-3));
        assert_eq!(parse_lenient_i64("99999999999999999999"), Some(i64::MAX));
        assert_eq!(parse_lenient_i64("-99999999999999999999"), Some(i64::MIN));
        assert_eq!(parse_lenient_i64("abc"), None);
        assert_eq!(parse_lenient_i64(""), None);
        assert_eq!(parse_lenient_i64("-"), None);
    }

    #[test]
    fn test_action_parse() {
        assert_eq!(ReportAction::parse(None).unwrap(), ReportAction::Stats);
        assert_eq!(
            ReportAction::parse(Some("export")).unwrap(),
            ReportAction::Export
        );
        assert!(matches!(
            ReportAction::parse(Some("delete")),
            Err(ApiError::InvalidAction)
        ));
        assert!(matches!(
            ReportAction::parse(Some("")),
            Err(ApiError::InvalidAction)
        ));
    }
}
