use chrono::Utc;

mod comment;
pub use comment::{Comment, CommentId, LikeStatus, NewComment, PostId, UpdateComment, UserId};

mod error;
pub use error::Error;

mod feed;
pub use feed::FeedMessage;

mod service;
pub use service::{CommentService, FeedConnector, FeedStream};

pub use uuid::Uuid;
pub type Time = chrono::DateTime<Utc>;

/// Content the server substitutes for the text of a soft-deleted comment
pub const DELETED_CONTENT: &str = "[deleted]";
