use crate::Comment;

/// Envelope of the messages pushed on a thread's live channel
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum FeedMessage {
    NewComment(Comment),

    /// Edits, like count changes and soft-deletions (with `deleted` set)
    UpdateComment(Comment),
}

impl FeedMessage {
    pub fn comment(&self) -> &Comment {
        match self {
            FeedMessage::NewComment(c) | FeedMessage::UpdateComment(c) => c,
        }
    }

    pub fn into_comment(self) -> Comment {
        match self {
            FeedMessage::NewComment(c) | FeedMessage::UpdateComment(c) => c,
        }
    }
}
