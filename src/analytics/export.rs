//! Raw event export as JSON or CSV

use chrono::{Days, NaiveDate};

use crate::analytics::DateRange;
use crate::error::ApiError;
use crate::models::Event;

/// Days before today covered when no `start` is given
pub const DEFAULT_EXPORT_DAYS: u64 = 30;

pub const CSV_CONTENT_TYPE: &str = "text/csv; charset=utf-8";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
}

impl ExportFormat {
    pub fn parse(tag: Option<&str>) -> Result<Self, ApiError> {
        match tag.map(|t| t.trim().to_ascii_lowercase()).as_deref() {
            None | Some("") | Some("json") => Ok(Self::Json),
            Some("csv") => Ok(Self::Csv),
            Some(other) => Err(ApiError::InvalidInput(format!(
                "Unsupported export format: {other}"
            ))),
        }
    }
}

/// Resolve optional `YYYY-MM-DD` bounds into an inclusive day range
pub fn parse_export_range(
    start: Option<&str>,
    end: Option<&str>,
    today: NaiveDate,
) -> Result<DateRange, ApiError> {
    let last = match non_empty(end) {
        Some(raw) => parse_date("end", raw)?,
        None => today,
    };
    let first = match non_empty(start) {
        Some(raw) => parse_date("start", raw)?,
        None => today
            .checked_sub_days(Days::new(DEFAULT_EXPORT_DAYS))
            .unwrap_or(NaiveDate::MIN),
    };

    if first > last {
        return Err(ApiError::InvalidInput(
            "start date must not be after end date".to_string(),
        ));
    }

    Ok(DateRange::between(first, last))
}

fn non_empty(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

fn parse_date(field: &str, raw: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| ApiError::InvalidInput(format!("Invalid {field} date: {raw}")))
}

pub fn export_filename(today: NaiveDate) -> String {
    format!("analytics-export-{}.csv", today.format("%Y-%m-%d"))
}

/// Header row plus one line per event, CRLF-terminated
pub fn render_csv(events: &[Event]) -> String {
    let mut out = String::new();
    push_row(&mut out, Event::COLUMNS.iter().map(|c| c.to_string()));

    for event in events {
        push_row(
            &mut out,
            [
                event.id.to_string(),
                event.event_type.clone(),
                event.event_data.to_string(),
                event.session_id.clone(),
                event.user_id.clone().unwrap_or_default(),
                event.user_agent.clone(),
                event.ip_address.clone(),
                event.referrer.clone(),
                event.language.clone(),
                event.page_url.clone(),
                event.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ],
        );
    }
    out
}

fn push_row(out: &mut String, fields: impl IntoIterator<Item = String>) {
    for (i, field) in fields.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&quote(&field));
    }
    out.push_str("\r\n");
}

fn quote(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
