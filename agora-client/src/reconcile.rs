use std::collections::VecDeque;

use crate::{api::Comment, CommentTree, Node};

/// What `upsert` did with a record
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MergeResult {
    /// The id was already known, its fields got overlaid
    Updated,
    InsertedRoot,
    InsertedChild,
    /// The parent is not known yet, the record waits for it
    Buffered,
}

/// Folds `record` into `tree`.
///
/// This is the only place where the forest gets mutated. Applying the same record
/// twice is a no-op, and records whose parent is not known yet are kept aside until
/// that parent gets inserted.
pub(crate) fn upsert(tree: &mut CommentTree, record: Comment) -> MergeResult {
    let mut todo = VecDeque::new();
    let res = merge(tree, record, &mut todo);
    // records unlocked by the first merge: nested children, or orphans whose parent just arrived
    while let Some(r) = todo.pop_front() {
        merge(tree, r, &mut todo);
    }
    res
}

fn merge(tree: &mut CommentTree, mut record: Comment, todo: &mut VecDeque<Comment>) -> MergeResult {
    let id = record.id;
    let res = if let Some(n) = tree.nodes.get_mut(&id) {
        // Updates never carry authoritative children, keep the local ones
        n.overlay(&record);
        tracing::trace!(?id, deleted = n.deleted, "overlaid comment");
        MergeResult::Updated
    } else {
        let res = match record.parent_id {
            None => {
                tree.roots.insert(0, id);
                MergeResult::InsertedRoot
            }
            Some(parent_id) => match tree.nodes.get_mut(&parent_id) {
                Some(parent) => {
                    // replayed events must not list a child twice
                    if !parent.children.contains(&id) {
                        parent.children.insert(0, id);
                    }
                    MergeResult::InsertedChild
                }
                None => {
                    tracing::debug!(?id, ?parent_id, "buffering comment with unknown parent");
                    let waiting = tree.orphans.entry(parent_id).or_insert_with(Vec::new);
                    match waiting.iter_mut().find(|c| c.id == id) {
                        Some(known) => overlay_buffered(known, record),
                        None => waiting.push(record),
                    }
                    return MergeResult::Buffered;
                }
            },
        };
        tree.nodes.insert(id, Node::from_record(&record));
        todo.extend(std::mem::take(&mut record.children).into_iter().map(|mut c| {
            c.parent_id.get_or_insert(id);
            c
        }));
        tracing::trace!(?id, ?res, "inserted comment");
        res
    };
    if let Some(waiting) = tree.orphans.remove(&id) {
        tracing::debug!(?id, num = waiting.len(), "attaching buffered replies");
        todo.extend(waiting);
    }
    res
}

/// Same rule as `Node::overlay`, so that a comment ends up identical whether its
/// repeats arrived before or after its parent
fn overlay_buffered(known: &mut Comment, record: Comment) {
    known.content = record.content;
    known.like_count = record.like_count;
    known.deleted |= record.deleted;
}
