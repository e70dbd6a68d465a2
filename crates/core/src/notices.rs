//! Toast notices raised by view operations.
//!
//! Views queue a [`Notice`] for every user-visible outcome (record saved, validation failed,
//! nothing to publish, ...). The shell drains the queue and presents it. Each notice is also
//! emitted as a `tracing` event.

use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Success,
    Info,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub message: String,
}

/// Queue of pending notices, oldest first.
#[derive(Clone, Debug, Default)]
pub struct Notices {
    queue: Vec<Notice>,
}

impl Notices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn success(&mut self, title: impl Into<String>, message: impl Into<String>) {
        self.push(NoticeLevel::Success, title.into(), message.into());
    }

    pub fn info(&mut self, title: impl Into<String>, message: impl Into<String>) {
        self.push(NoticeLevel::Info, title.into(), message.into());
    }

    pub fn error(&mut self, title: impl Into<String>, message: impl Into<String>) {
        self.push(NoticeLevel::Error, title.into(), message.into());
    }

    fn push(&mut self, level: NoticeLevel, title: String, message: String) {
        match level {
            NoticeLevel::Error => tracing::warn!(%title, %message, "notice"),
            _ => tracing::info!(%title, %message, "notice"),
        }
        self.queue.push(Notice {
            level,
            title,
            message,
        });
    }

    pub fn latest(&self) -> Option<&Notice> {
        self.queue.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notice> {
        self.queue.iter()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Removes and returns every pending notice.
    pub fn drain(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.queue)
    }
}
