//! In-app notifications shown in the dashboard header.

use crate::access::Action;
use crate::error::LisResult;
use crate::query::{AggregateSource, AggregateSpec, Filterable};
use crate::store::{Record, Repository};
use crate::view::ListView;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

labelled_enum! {
    pub enum NotificationKind {
        Info => "Info",
        Warning => "Warning",
        Alert => "Alert",
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Notification {
    pub id: String,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub timestamp: String,
    #[serde(default)]
    pub read: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotificationField {
    Title,
    Message,
    Kind,
}

pub const SEARCH_FIELDS: [NotificationField; 2] =
    [NotificationField::Title, NotificationField::Message];

impl Record for Notification {
    const KIND: &'static str = "notification";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Filterable for Notification {
    type Field = NotificationField;

    fn field_text(&self, field: NotificationField) -> Option<Cow<'_, str>> {
        Some(match field {
            NotificationField::Title => Cow::Borrowed(self.title.as_str()),
            NotificationField::Message => Cow::Borrowed(self.message.as_str()),
            NotificationField::Kind => Cow::Borrowed(self.kind.label()),
        })
    }

    fn timestamp_text(&self) -> Option<&str> {
        Some(&self.timestamp)
    }
}

pub fn summary_specs() -> Vec<AggregateSpec<Notification>> {
    vec![
        AggregateSpec::count("total", AggregateSource::Full),
        AggregateSpec::count_where("unread", AggregateSource::Full, |n: &Notification| !n.read),
        AggregateSpec::count_equal(
            "alerts",
            AggregateSource::Full,
            NotificationField::Kind,
            NotificationKind::Alert.label(),
        ),
    ]
}

impl<R: Repository<Notification>> ListView<Notification, R> {
    pub fn unread_count(&self) -> usize {
        self.records().iter().filter(|n| !n.read).count()
    }

    /// # Errors
    ///
    /// Returns [`crate::error::LisError::PermissionDenied`] or
    /// [`crate::error::LisError::NotFound`].
    pub fn mark_read(&mut self, id: &str) -> LisResult<()> {
        self.ensure(Action::Update)?;
        self.require_record(id)?;
        if let Some(notification) = self.store_mut().get_mut(id) {
            notification.read = true;
        }
        Ok(())
    }

    /// Marks every notification read and returns how many were unread.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::LisError::PermissionDenied`].
    pub fn mark_all_read(&mut self) -> LisResult<usize> {
        self.ensure(Action::Update)?;
        let unread: Vec<String> = self
            .records()
            .iter()
            .filter(|n| !n.read)
            .map(|n| n.id.clone())
            .collect();
        for id in &unread {
            if let Some(notification) = self.store_mut().get_mut(id) {
                notification.read = true;
            }
        }
        if !unread.is_empty() {
            self.notices_mut().info(
                "Notifications",
                format!("{} notification(s) marked as read", unread.len()),
            );
        }
        Ok(unread.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{Module, Role};
    use crate::query::FilterCriteria;
    use lis_ids::TimestampIds;

    fn notification(id: &str, kind: NotificationKind, read: bool) -> Notification {
        Notification {
            id: id.to_owned(),
            title: "Low stock".to_owned(),
            message: "CBC Diluent is below 200 mL".to_owned(),
            kind,
            timestamp: "2024-03-09 07:00:00".to_owned(),
            read,
        }
    }

    fn view() -> ListView<Notification> {
        ListView::in_memory(
            Role::LabUser,
            Module::Notifications,
            vec![
                notification("NTF-1", NotificationKind::Alert, false),
                notification("NTF-2", NotificationKind::Info, true),
                notification("NTF-3", NotificationKind::Warning, false),
            ],
            FilterCriteria::new(SEARCH_FIELDS),
            TimestampIds::new("NTF").unwrap(),
        )
    }

    #[test]
    fn marking_read_updates_the_unread_count() {
        let mut v = view();
        assert_eq!(v.unread_count(), 2);
        v.mark_read("NTF-1").unwrap();
        assert_eq!(v.unread_count(), 1);
        assert!(v.mark_read("NTF-9").is_err());

        assert_eq!(v.mark_all_read().unwrap(), 1);
        assert_eq!(v.aggregates(&summary_specs()).get("unread"), Some(0));
        assert_eq!(v.mark_all_read().unwrap(), 0);
    }

    #[test]
    fn dismissing_removes_one() {
        let mut v = view();
        let now = crate::dates::parse_timestamp("2024-03-09 08:00").unwrap();
        v.delete("NTF-2", now).unwrap();
        assert_eq!(v.records().len(), 2);
        assert_eq!(v.aggregates(&summary_specs()).get("alerts"), Some(1));
    }
}
