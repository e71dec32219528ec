use crate::api::CommentId;

/// Source of ids for provisional comments.
///
/// Implementations must never hand out an id the server could assign.
pub trait TempIds {
    fn next_id(&mut self) -> CommentId;
}

/// Hands out -1, -2, -3... Server ids are always positive.
#[derive(Clone, Debug)]
pub struct DescendingIds {
    next: i64,
}

impl Default for DescendingIds {
    fn default() -> DescendingIds {
        DescendingIds { next: -1 }
    }
}

impl TempIds for DescendingIds {
    fn next_id(&mut self) -> CommentId {
        let id = CommentId(self.next);
        self.next = self.next.checked_sub(1).unwrap_or(-1);
        id
    }
}
