//! Event log entries.
//!
//! Entries are produced elsewhere in the system and only displayed here: there is no create or
//! edit dialog. Managers may delete entries and relabel their action type.

use crate::query::{AggregateSource, AggregateSpec, Filterable};
use crate::store::Record;
use crate::view::StatusBearing;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

labelled_enum! {
    pub enum EventAction {
        Created => "Created",
        Updated => "Updated",
        Deleted => "Deleted",
        StatusChanged => "Status Changed",
        Synced => "Synced",
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EventLog {
    pub id: String,
    pub message: String,
    pub operator: String,
    pub action: EventAction,
    pub timestamp: String,
    #[serde(default = "default_available")]
    pub available: bool,
}

fn default_available() -> bool {
    true
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventLogField {
    Id,
    Message,
    Operator,
    Action,
}

/// Fields the event log search box looks in.
pub const SEARCH_FIELDS: [EventLogField; 3] = [
    EventLogField::Message,
    EventLogField::Operator,
    EventLogField::Id,
];

impl Record for EventLog {
    const KIND: &'static str = "event log";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Filterable for EventLog {
    type Field = EventLogField;

    fn field_text(&self, field: EventLogField) -> Option<Cow<'_, str>> {
        Some(match field {
            EventLogField::Id => Cow::Borrowed(self.id.as_str()),
            EventLogField::Message => Cow::Borrowed(self.message.as_str()),
            EventLogField::Operator => Cow::Borrowed(self.operator.as_str()),
            EventLogField::Action => Cow::Borrowed(self.action.label()),
        })
    }

    fn timestamp_text(&self) -> Option<&str> {
        Some(&self.timestamp)
    }
}

impl StatusBearing for EventLog {
    type Status = EventAction;

    fn status(&self) -> EventAction {
        self.action
    }

    fn set_status(&mut self, status: EventAction, _now: NaiveDateTime) {
        self.action = status;
    }
}

/// Summary cards: the total reflects the current filters, the per-action counts do not.
pub fn summary_specs() -> Vec<AggregateSpec<EventLog>> {
    let mut specs = vec![AggregateSpec::count("total", AggregateSource::Filtered)];
    specs.extend([
        AggregateSpec::count_equal(
            "created",
            AggregateSource::Full,
            EventLogField::Action,
            EventAction::Created.label(),
        ),
        AggregateSpec::count_equal(
            "updated",
            AggregateSource::Full,
            EventLogField::Action,
            EventAction::Updated.label(),
        ),
        AggregateSpec::count_equal(
            "deleted",
            AggregateSource::Full,
            EventLogField::Action,
            EventAction::Deleted.label(),
        ),
        AggregateSpec::count_where("unavailable", AggregateSource::Full, |e: &EventLog| {
            !e.available
        }),
    ]);
    specs
}
