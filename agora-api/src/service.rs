use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::{Comment, CommentId, LikeStatus, NewComment, PostId};

/// Request side of the server, as seen by a client viewing threads
#[async_trait]
pub trait CommentService {
    /// Returns either a flat list or a nested tree of the post's comments
    async fn fetch_comments(&self, post: PostId) -> anyhow::Result<Vec<Comment>>;
    async fn create_comment(&self, post: PostId, comment: NewComment) -> anyhow::Result<Comment>;
    async fn update_comment(&self, id: CommentId, content: String) -> anyhow::Result<Comment>;
    async fn delete_comment(&self, id: CommentId) -> anyhow::Result<()>;
    async fn toggle_like(&self, id: CommentId) -> anyhow::Result<LikeStatus>;
}

/// Raw text frames received on a thread's live channel
pub type FeedStream = Pin<Box<dyn Send + Stream<Item = anyhow::Result<String>>>>;

/// Push side of the server: one subscription per post
#[async_trait]
pub trait FeedConnector {
    /// Resolves once the transport confirmed the connection. Dropping the returned
    /// stream closes the subscription.
    async fn connect(&self, post: PostId) -> anyhow::Result<FeedStream>;
}
