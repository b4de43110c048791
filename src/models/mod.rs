mod aggregate;
mod event;
mod report;

pub use aggregate::{DailyAggregate, SessionRecord};
pub use event::{Event, NewEvent, TrackReceipt, TrackRequest};
pub use report::{
    Activities, DeviceShare, EventTypeCount, PageCount, ReferrerCount, SessionSummary, Stats,
    TrendPoint, VisitorPage, VisitorRow,
};
