use std::{
    collections::{BTreeMap, BTreeSet, HashMap, HashSet},
    sync::Arc,
};

use agora_api::{
    Comment, CommentId, CommentService, Error, FeedConnector, FeedMessage, FeedStream,
    LikeStatus, NewComment, PostId, Time, UserId, Uuid, DELETED_CONTENT,
};
use chrono::Utc;
use futures::{channel::mpsc, StreamExt};
use tokio::sync::Mutex;

/// In-memory comments backend, with per-post live feeds
#[derive(Debug, Default)]
pub struct MockServer {
    users: BTreeMap<UserId, String>,
    posts: BTreeSet<PostId>,
    comments: BTreeMap<CommentId, DbComment>,
    likes: HashSet<(UserId, CommentId)>,
    feeds: HashMap<PostId, HashMap<Uuid, mpsc::UnboundedSender<String>>>,
    next_id: i64,
}

#[derive(Debug)]
struct DbComment {
    post: PostId,
    owner: UserId,
    parent_id: Option<CommentId>,
    created_at: Time,
    content: String,
    deleted: bool,
}

impl MockServer {
    pub fn new() -> MockServer {
        MockServer::default()
    }

    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn create_user(&mut self, name: String) -> UserId {
        let id = UserId(self.next_id());
        self.users.insert(id, name);
        id
    }

    pub fn create_post(&mut self) -> PostId {
        let id = PostId(self.next_id());
        self.posts.insert(id);
        id
    }

    /// Return the number of currently open live feeds for `post`
    pub fn test_num_feeds(&self, post: PostId) -> usize {
        self.feeds.get(&post).map(|f| f.len()).unwrap_or(0)
    }

    fn view(&self, id: CommentId, c: &DbComment) -> Comment {
        Comment {
            id,
            parent_id: c.parent_id,
            author_name: self.users.get(&c.owner).cloned().unwrap_or_default(),
            created_at: c.created_at,
            content: match c.deleted {
                true => String::from(DELETED_CONTENT),
                false => c.content.clone(),
            },
            like_count: self.likes.iter().filter(|(_, l)| *l == id).count() as u64,
            deleted: c.deleted,
            children: Vec::new(),
        }
    }

    fn get(&self, id: CommentId) -> Result<&DbComment, Error> {
        self.comments.get(&id).ok_or(Error::CommentNotFound(id))
    }

    fn get_owned_mut(&mut self, user: UserId, id: CommentId) -> Result<&mut DbComment, Error> {
        match self.comments.get_mut(&id) {
            None => Err(Error::CommentNotFound(id)),
            Some(c) if c.owner != user => Err(Error::PermissionDenied),
            Some(c) => Ok(c),
        }
    }

    /// Returns the comments of `post` as a tree, oldest first at each level.
    ///
    /// Unknown posts just have no comments.
    pub fn fetch_comments(&self, post: PostId) -> Result<Vec<Comment>, Error> {
        let mut ordered = self
            .comments
            .iter()
            .filter(|(_, c)| c.post == post)
            .collect::<Vec<_>>();
        ordered.sort_by_key(|(id, c)| (c.created_at, **id));

        let mut roots = Vec::new();
        let mut children = HashMap::<CommentId, Vec<CommentId>>::new();
        for (id, c) in ordered.iter() {
            match c.parent_id {
                Some(p) if self.comments.contains_key(&p) => {
                    children.entry(p).or_default().push(**id)
                }
                _ => roots.push(**id),
            }
        }

        // Build bottom-up, from a parent-first order
        let mut order = Vec::new();
        let mut stack = roots.iter().rev().copied().collect::<Vec<_>>();
        while let Some(id) = stack.pop() {
            order.push(id);
            if let Some(kids) = children.get(&id) {
                stack.extend(kids.iter().rev());
            }
        }
        let mut built = HashMap::new();
        for id in order.into_iter().rev() {
            let mut c = self.view(id, &self.comments[&id]);
            c.children = children
                .get(&id)
                .map(|kids| kids.iter().filter_map(|k| built.remove(k)).collect())
                .unwrap_or_default();
            built.insert(id, c);
        }
        Ok(roots.iter().filter_map(|r| built.remove(r)).collect())
    }

    pub fn create_comment(
        &mut self,
        user: UserId,
        post: PostId,
        c: NewComment,
    ) -> Result<Comment, Error> {
        if !self.posts.contains(&post) {
            return Err(Error::PostNotFound(post));
        }
        if let Some(parent) = c.parent_id {
            match self.comments.get(&parent) {
                Some(p) if p.post == post => (),
                _ => return Err(Error::InvalidParent(parent)),
            }
        }
        let id = CommentId(self.next_id());
        let stored = DbComment {
            post,
            owner: user,
            parent_id: c.parent_id,
            created_at: Utc::now(),
            content: c.content,
            deleted: false,
        };
        let res = self.view(id, &stored);
        self.comments.insert(id, stored);
        self.relay(post, &FeedMessage::NewComment(res.clone()));
        Ok(res)
    }

    pub fn update_comment(
        &mut self,
        user: UserId,
        id: CommentId,
        content: String,
    ) -> Result<Comment, Error> {
        let c = self.get_owned_mut(user, id)?;
        c.content = content;
        let post = c.post;
        let res = self.view(id, self.get(id)?);
        self.relay(post, &FeedMessage::UpdateComment(res.clone()));
        Ok(res)
    }

    /// Soft-deletes the comment, keeping its replies attached
    pub fn delete_comment(&mut self, user: UserId, id: CommentId) -> Result<(), Error> {
        let c = self.get_owned_mut(user, id)?;
        c.deleted = true;
        let post = c.post;
        let res = self.view(id, self.get(id)?);
        self.relay(post, &FeedMessage::UpdateComment(res));
        Ok(())
    }

    /// Likes are not relayed on the live feeds
    pub fn toggle_like(&mut self, user: UserId, id: CommentId) -> Result<LikeStatus, Error> {
        self.get(id)?;
        let liked = match self.likes.remove(&(user, id)) {
            true => false,
            false => self.likes.insert((user, id)),
        };
        Ok(LikeStatus {
            liked,
            like_count: self.likes.iter().filter(|(_, l)| *l == id).count() as u64,
        })
    }

    pub fn action_feed(&mut self, post: PostId) -> Result<mpsc::UnboundedReceiver<String>, Error> {
        if !self.posts.contains(&post) {
            return Err(Error::PostNotFound(post));
        }
        let (sender, receiver) = mpsc::unbounded();
        self.feeds
            .entry(post)
            .or_default()
            .insert(Uuid::new_v4(), sender);
        Ok(receiver)
    }

    pub fn relay(&mut self, post: PostId, msg: &FeedMessage) {
        match serde_json::to_string(msg) {
            Ok(json) => self.relay_raw(post, json),
            Err(err) => tracing::error!(?err, ?msg, "failed serializing message to json"),
        }
    }

    /// Sends `frame` as-is to every live feed of `post`, forgetting the closed ones
    pub fn relay_raw(&mut self, post: PostId, frame: String) {
        if let Some(feeds) = self.feeds.get_mut(&post) {
            feeds.retain(|_, f| f.unbounded_send(frame.clone()).is_ok());
        }
    }
}

/// A user's connection to a shared `MockServer`
#[derive(Clone, Debug)]
pub struct MockClient {
    server: Arc<Mutex<MockServer>>,
    user: UserId,
}

impl MockClient {
    pub fn new(server: Arc<Mutex<MockServer>>, user: UserId) -> MockClient {
        MockClient { server, user }
    }

    pub fn user(&self) -> UserId {
        self.user
    }
}

#[async_trait::async_trait]
impl CommentService for MockClient {
    async fn fetch_comments(&self, post: PostId) -> anyhow::Result<Vec<Comment>> {
        Ok(self.server.lock().await.fetch_comments(post)?)
    }

    async fn create_comment(&self, post: PostId, comment: NewComment) -> anyhow::Result<Comment> {
        Ok(self
            .server
            .lock()
            .await
            .create_comment(self.user, post, comment)?)
    }

    async fn update_comment(&self, id: CommentId, content: String) -> anyhow::Result<Comment> {
        Ok(self
            .server
            .lock()
            .await
            .update_comment(self.user, id, content)?)
    }

    async fn delete_comment(&self, id: CommentId) -> anyhow::Result<()> {
        Ok(self.server.lock().await.delete_comment(self.user, id)?)
    }

    async fn toggle_like(&self, id: CommentId) -> anyhow::Result<LikeStatus> {
        Ok(self.server.lock().await.toggle_like(self.user, id)?)
    }
}

#[async_trait::async_trait]
impl FeedConnector for MockClient {
    async fn connect(&self, post: PostId) -> anyhow::Result<FeedStream> {
        let feed = self.server.lock().await.action_feed(post)?;
        Ok(Box::pin(feed.map(|frame| Ok::<_, anyhow::Error>(frame))))
    }
}
