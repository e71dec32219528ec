use std::collections::VecDeque;

use chrono::Utc;

use crate::{
    api::{Comment, CommentId},
    DescendingIds, TempIds,
};

/// Tracks the comments the local user submitted but the server did not confirm yet
#[derive(Clone, Debug)]
pub struct Coordinator<I = DescendingIds> {
    author_name: String,
    ids: I,

    /// Oldest submission first
    pending: VecDeque<Comment>,
}

impl<I: TempIds> Coordinator<I> {
    pub fn new(author_name: String, ids: I) -> Coordinator<I> {
        Coordinator {
            author_name,
            ids,
            pending: VecDeque::new(),
        }
    }

    pub fn author_name(&self) -> &str {
        &self.author_name
    }

    /// Synthesizes the provisional record for a new comment and starts tracking it
    pub fn provisional(&mut self, content: String, parent_id: Option<CommentId>) -> Comment {
        let c = Comment {
            id: self.ids.next_id(),
            parent_id,
            author_name: self.author_name.clone(),
            created_at: Utc::now(),
            content,
            like_count: 0,
            deleted: false,
            children: Vec::new(),
        };
        self.pending.push_back(c.clone());
        c
    }

    /// Stops tracking a provisional record, once the server answered about it either way
    pub fn settle(&mut self, temp_id: CommentId) -> Option<Comment> {
        let pos = self.pending.iter().position(|c| c.id == temp_id)?;
        self.pending.remove(pos)
    }

    pub fn is_pending(&self, id: &CommentId) -> bool {
        self.pending.iter().any(|c| c.id == *id)
    }

    /// Provisional records still waiting for the server, oldest first
    pub fn pending(&self) -> impl Iterator<Item = &Comment> {
        self.pending.iter()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
