use std::collections::{HashMap, HashSet};

use anyhow::{anyhow, ensure};

use crate::{
    api::{Comment, CommentId, Time},
    reconcile, MergeResult,
};

/// One comment of the thread, as stored in the arena
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Node {
    pub id: CommentId,
    pub parent_id: Option<CommentId>,
    pub author_name: String,
    pub created_at: Time,
    pub content: String,
    pub like_count: u64,
    pub deleted: bool,

    /// Most recently created first
    pub children: Vec<CommentId>,
}

impl Node {
    pub(crate) fn from_record(c: &Comment) -> Node {
        Node {
            id: c.id,
            parent_id: c.parent_id,
            author_name: c.author_name.clone(),
            created_at: c.created_at,
            content: c.content.clone(),
            like_count: c.like_count,
            deleted: c.deleted,
            children: Vec::new(),
        }
    }

    /// Overlays the mutable fields of `c`, never touching `children`.
    ///
    /// Deletion is sticky: the server never brings a tombstone back.
    pub(crate) fn overlay(&mut self, c: &Comment) {
        self.content = c.content.clone();
        self.like_count = c.like_count;
        self.deleted |= c.deleted;
    }
}

/// Read-only projection of a comment and its replies, for rendering
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommentView {
    pub id: CommentId,
    pub parent_id: Option<CommentId>,

    /// None for tombstones
    pub author_name: Option<String>,
    pub created_at: Time,

    /// None for tombstones
    pub content: Option<String>,
    pub like_count: u64,
    pub deleted: bool,
    pub children: Vec<CommentView>,
}

/// The comment forest of the currently viewed thread
#[derive(Clone, Debug, Default)]
pub struct CommentTree {
    pub(crate) nodes: HashMap<CommentId, Node>,

    /// Most recently created first
    pub(crate) roots: Vec<CommentId>,

    /// Records waiting for their parent to show up, keyed by the missing parent id
    pub(crate) orphans: HashMap<CommentId, Vec<Comment>>,
}

impl CommentTree {
    pub fn new() -> CommentTree {
        CommentTree::default()
    }

    /// Replaces the whole forest with the one described by `records`, that can be
    /// either flat or nested
    pub fn seed(&mut self, records: Vec<Comment>) {
        self.clear();
        let mut records = Comment::flatten(records);
        // oldest first, so that prepending leaves every sibling group newest-first
        records.sort_by_key(|c| (c.created_at, c.id));
        for r in records {
            self.upsert(r);
        }
        tracing::debug!(
            num_comments = self.nodes.len(),
            num_orphans = self.orphan_count(),
            "seeded comment tree"
        );
    }

    pub fn upsert(&mut self, record: Comment) -> MergeResult {
        reconcile::upsert(self, record)
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.roots.clear();
        self.orphans.clear();
    }

    pub fn get(&self, id: &CommentId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &CommentId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn roots(&self) -> &[CommentId] {
        &self.roots
    }

    /// Number of comments attached to the forest, tombstones included
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of records still waiting for their parent
    pub fn orphan_count(&self) -> usize {
        self.orphans.values().map(|v| v.len()).sum()
    }

    /// Ids in depth-first order, parents before their children, siblings in stored order
    pub fn walk(&self) -> Vec<(usize, CommentId)> {
        let mut res = Vec::with_capacity(self.nodes.len());
        let mut todo = self.roots.iter().rev().map(|id| (0, *id)).collect::<Vec<_>>();
        while let Some((depth, id)) = todo.pop() {
            res.push((depth, id));
            if let Some(n) = self.nodes.get(&id) {
                todo.extend(n.children.iter().rev().map(|c| (depth + 1, *c)));
            }
        }
        res
    }

    pub fn snapshot(&self) -> Vec<CommentView> {
        // Build the views bottom-up: walking the parent-first order backwards
        // guarantees all children are built before their parent
        let mut built: HashMap<CommentId, CommentView> = HashMap::with_capacity(self.nodes.len());
        for (_, id) in self.walk().into_iter().rev() {
            let n = &self.nodes[&id];
            let children = n
                .children
                .iter()
                .filter_map(|c| built.remove(c))
                .collect();
            built.insert(
                id,
                CommentView {
                    id,
                    parent_id: n.parent_id,
                    author_name: (!n.deleted).then(|| n.author_name.clone()),
                    created_at: n.created_at,
                    content: (!n.deleted).then(|| n.content.clone()),
                    like_count: n.like_count,
                    deleted: n.deleted,
                    children,
                },
            );
        }
        self.roots
            .iter()
            .filter_map(|id| built.remove(id))
            .collect()
    }

    /// Checks the forest invariants: every node is reachable from exactly one root,
    /// and the parent and children indexes agree with each other
    pub fn validate(&self) -> anyhow::Result<()> {
        let mut seen = HashSet::with_capacity(self.nodes.len());
        for (_, id) in self.walk() {
            ensure!(seen.insert(id), "comment {id} is reachable twice");
            let n = self
                .nodes
                .get(&id)
                .ok_or_else(|| anyhow!("comment {id} is referenced but not stored"))?;
            ensure!(n.id == id, "comment {id} is stored as {}", n.id);
            for c in n.children.iter() {
                let child = self
                    .nodes
                    .get(c)
                    .ok_or_else(|| anyhow!("child {c} of {id} is not stored"))?;
                ensure!(
                    child.parent_id == Some(id),
                    "child {c} of {id} has parent {:?}",
                    child.parent_id
                );
            }
        }
        for id in self.roots.iter() {
            let n = self
                .nodes
                .get(id)
                .ok_or_else(|| anyhow!("root {id} is not stored"))?;
            ensure!(n.parent_id.is_none(), "root {id} has a parent");
        }
        ensure!(
            seen.len() == self.nodes.len(),
            "{} comments are not reachable from any root",
            self.nodes.len() - seen.len()
        );
        Ok(())
    }
}
