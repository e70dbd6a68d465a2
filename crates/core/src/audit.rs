//! Audit log records and the trail manager views append to.

use crate::dates::format_timestamp;
use crate::error::LisResult;
use crate::query::Filterable;
use crate::store::Record;
use chrono::NaiveDateTime;
use lis_ids::{IdGenerator, TimestampIds};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::cell::RefCell;
use std::rc::Rc;

labelled_enum! {
    pub enum AuditAction {
        Created => "Created",
        Updated => "Updated",
        Deleted => "Deleted",
        StatusChanged => "Status Changed",
        ModeChanged => "Mode Changed",
        Synced => "Synced",
    }
}

/// One audit entry describing a change made from a manager view.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditLog {
    pub id: String,
    pub action: AuditAction,
    pub entity_kind: String,
    pub entity_id: String,
    pub user: String,
    pub details: String,
    pub timestamp: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuditLogField {
    Id,
    Action,
    EntityKind,
    EntityId,
    User,
    Details,
}

impl Record for AuditLog {
    const KIND: &'static str = "audit log";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Filterable for AuditLog {
    type Field = AuditLogField;

    fn field_text(&self, field: AuditLogField) -> Option<Cow<'_, str>> {
        Some(match field {
            AuditLogField::Id => Cow::Borrowed(self.id.as_str()),
            AuditLogField::Action => Cow::Borrowed(self.action.label()),
            AuditLogField::EntityKind => Cow::Borrowed(self.entity_kind.as_str()),
            AuditLogField::EntityId => Cow::Borrowed(self.entity_id.as_str()),
            AuditLogField::User => Cow::Borrowed(self.user.as_str()),
            AuditLogField::Details => Cow::Borrowed(self.details.as_str()),
        })
    }

    fn timestamp_text(&self) -> Option<&str> {
        Some(&self.timestamp)
    }
}

/// Search fields of the audit log view.
pub const SEARCH_FIELDS: [AuditLogField; 4] = [
    AuditLogField::User,
    AuditLogField::Details,
    AuditLogField::EntityId,
    AuditLogField::EntityKind,
];

/// Identifier source shared by every trail of one session, so merged trails never collide.
pub type SharedAuditIds = Rc<RefCell<TimestampIds>>;

/// Append-only audit trail owned by a single view.
#[derive(Clone, Debug)]
pub struct AuditTrail {
    entries: Vec<AuditLog>,
    ids: SharedAuditIds,
}

impl AuditTrail {
    /// # Errors
    ///
    /// Returns [`crate::error::LisError::Id`] if the identifier generator cannot be created.
    pub fn new() -> LisResult<Self> {
        Ok(Self::with_ids(Rc::new(RefCell::new(TimestampIds::new("AUD")?))))
    }

    pub fn with_ids(ids: SharedAuditIds) -> Self {
        Self {
            entries: Vec::new(),
            ids,
        }
    }

    /// An empty trail drawing identifiers from the same generator as `self`.
    pub fn fork(&self) -> Self {
        Self::with_ids(Rc::clone(&self.ids))
    }

    /// Appends an entry (newest first) and returns it.
    ///
    /// Never fails: generated ids only move forward, so an id already held by this trail is
    /// skipped.
    pub fn record(
        &mut self,
        action: AuditAction,
        entity_kind: &str,
        entity_id: &str,
        user: &str,
        details: impl Into<String>,
        now: NaiveDateTime,
    ) -> &AuditLog {
        let id = {
            let mut ids = self.ids.borrow_mut();
            let mut id = ids.next_id(now);
            while self.entries.iter().any(|e| e.id == id) {
                id = ids.next_id(now);
            }
            id
        };
        let entry = AuditLog {
            id,
            action,
            entity_kind: entity_kind.to_owned(),
            entity_id: entity_id.to_owned(),
            user: user.to_owned(),
            details: details.into(),
            timestamp: format_timestamp(now),
        };
        tracing::debug!(id = %entry.id, action = %action, entity = %entity_id, "audit entry");
        self.entries.insert(0, entry);
        &self.entries[0]
    }

    pub fn entries(&self) -> &[AuditLog] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
