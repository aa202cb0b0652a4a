/// Severity of a user-facing notice.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum NoticeKind {
    Info,
    Success,
    Error,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NoticeId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub id: NoticeId,
    pub kind: NoticeKind,
    pub message: String,
}

/// Ordered set of dismissible notices owned by one UI region.
///
/// Each component keeps its own board; nothing is routed to a global handler.
#[derive(Debug, Default)]
pub struct NoticeBoard {
    next_id: u64,
    notices: Vec<Notice>,
}

impl NoticeBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn post(&mut self, kind: NoticeKind, message: impl Into<String>) -> NoticeId {
        self.next_id += 1;
        let id = NoticeId(self.next_id);
        self.notices.push(Notice {
            id,
            kind,
            message: message.into(),
        });
        id
    }

    /// Posts `message` after dropping every notice of the same kind.
    pub fn replace(&mut self, kind: NoticeKind, message: impl Into<String>) -> NoticeId {
        self.clear_kind(kind);
        self.post(kind, message)
    }

    /// Returns `true` if the notice was still present.
    pub fn dismiss(&mut self, id: NoticeId) -> bool {
        let before = self.notices.len();
        self.notices.retain(|n| n.id != id);
        self.notices.len() != before
    }

    pub fn clear_kind(&mut self, kind: NoticeKind) {
        self.notices.retain(|n| n.kind != kind);
    }

    pub fn clear(&mut self) {
        self.notices.clear();
    }

    pub fn latest(&self, kind: NoticeKind) -> Option<&Notice> {
        self.notices.iter().rev().find(|n| n.kind == kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notice> + '_ {
        self.notices.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.notices.is_empty()
    }
}
