use std::collections::VecDeque;
use std::fmt;

/// Severity of a [`Notice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

impl fmt::Display for NoticeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NoticeLevel::Info => "info",
            NoticeLevel::Warning => "warning",
            NoticeLevel::Error => "error",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Loaded,
    Reloaded,
    LoadFailed,
    /// A push failed; the local state was kept.
    PersistenceWarning,
    ConnectionLost,
    ConnectionRestored,
    Unreachable,
    DeletionStaged,
    Deleted,
    EditApplied,
    /// An operation was refused; nothing changed.
    Rejected,
    CatalogFailed,
}

/// Transient message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn info(kind: NoticeKind, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            kind,
            message: message.into(),
        }
    }

    pub fn warning(kind: NoticeKind, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            kind,
            message: message.into(),
        }
    }

    pub fn error(kind: NoticeKind, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.level, self.message)
    }
}

const MAX_QUEUED: usize = 64;

/// Bounded FIFO; the oldest notice is dropped when full.
#[derive(Debug, Clone, Default)]
pub struct NoticeQueue {
    items: VecDeque<Notice>,
}

impl NoticeQueue {
    pub fn push(&mut self, notice: Notice) {
        if self.items.len() == MAX_QUEUED {
            self.items.pop_front();
        }
        self.items.push_back(notice);
    }

    pub fn drain(&mut self) -> Vec<Notice> {
        self.items.drain(..).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notice> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{MAX_QUEUED, Notice, NoticeKind, NoticeQueue};

    #[test]
    fn queue_drops_oldest_when_full() {
        let mut queue = NoticeQueue::default();
        for i in 0..=MAX_QUEUED {
            queue.push(Notice::info(NoticeKind::Loaded, i.to_string()));
        }
        assert_eq!(queue.len(), MAX_QUEUED);
        assert_eq!(queue.iter().next().map(|n| n.message.as_str()), Some("1"));
        assert_eq!(queue.drain().len(), MAX_QUEUED);
        assert!(queue.is_empty());
    }

    #[test]
    fn display_prefixes_level() {
        let notice = Notice::warning(NoticeKind::Unreachable, "Backend unreachable");
        assert_eq!(notice.to_string(), "[warning] Backend unreachable");
    }
}
