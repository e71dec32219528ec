mod tree;
pub use tree::{CommentTree, CommentView, Node};

mod reconcile;
pub use reconcile::MergeResult;

mod ids;
pub use ids::{DescendingIds, TempIds};

mod optimistic;
pub use optimistic::Coordinator;

mod channel;
pub use channel::{ChannelState, LiveChannel};

mod session;
pub use session::{Command, Epoch, Notice, Op, SyncMsg, ThreadSession, UserAction};

mod driver;
pub use driver::Driver;

mod render;
pub use render::{render, DELETED_PLACEHOLDER};

pub mod api {
    pub use agora_api::*;
}
