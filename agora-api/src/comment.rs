use std::fmt;

use crate::Time;

#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
#[serde(transparent)]
pub struct CommentId(pub i64);

impl fmt::Display for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
#[serde(transparent)]
pub struct PostId(pub i64);

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
#[serde(transparent)]
pub struct UserId(pub i64);

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Comment {
    pub id: CommentId,

    /// None for a top-level comment
    #[serde(default)]
    pub parent_id: Option<CommentId>,

    #[serde(rename = "username", default)]
    pub author_name: String,

    pub created_at: Time,

    /// Rich text payload, opaque to the client
    #[serde(default)]
    pub content: String,

    #[serde(rename = "likes_count", default)]
    pub like_count: u64,

    /// Tombstone flag: the comment is kept for the sake of its replies
    #[serde(default)]
    pub deleted: bool,

    /// Only ever filled by full fetches, never authoritative in updates
    #[serde(default)]
    pub children: Vec<Comment>,
}

impl Comment {
    /// Turns a nested tree of comments into a flat list, parents before children.
    ///
    /// Children listed under a parent but missing their `parent_id` get it filled in
    /// from their position in the tree.
    pub fn flatten(roots: Vec<Comment>) -> Vec<Comment> {
        let mut res = Vec::with_capacity(roots.len());
        let mut todo = roots.into_iter().rev().collect::<Vec<_>>();
        while let Some(mut c) = todo.pop() {
            let children = std::mem::take(&mut c.children);
            todo.extend(children.into_iter().rev().map(|mut child| {
                child.parent_id.get_or_insert(c.id);
                child
            }));
            res.push(c);
        }
        res
    }
}

/// Body of a comment creation request
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct NewComment {
    pub content: String,
    pub parent_id: Option<CommentId>,
}

/// Body of a comment edition request
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct UpdateComment {
    pub content: String,
}

/// Answer to a like toggle
#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct LikeStatus {
    pub liked: bool,
    #[serde(rename = "likes_count")]
    pub like_count: u64,
}
