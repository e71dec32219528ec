use std::collections::VecDeque;

use crate::{
    api::{Comment, CommentId, FeedMessage, LikeStatus, NewComment, PostId},
    ChannelState, CommentTree, CommentView, Coordinator, DescendingIds, LiveChannel, TempIds,
};

/// Generation of the thread view. Bumped every time the viewed thread changes, so
/// that answers to requests issued for a previous view can be recognized and dropped.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Epoch(pub u64);

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum UserAction {
    View(PostId),
    Leave,
    Submit {
        content: String,
        parent_id: Option<CommentId>,
    },
    Edit {
        id: CommentId,
        content: String,
    },
    Delete(CommentId),
    ToggleLike(CommentId),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Op {
    Fetch,
    Connect,
    Create,
    Update,
    Delete,
    ToggleLike,
}

#[derive(Debug)]
pub enum SyncMsg {
    User(UserAction),
    ChannelOpened(Epoch),
    ChannelFailed(Epoch, anyhow::Error),
    ChannelClosed(Epoch),
    Frame(Epoch, String),
    /// Answer to the `Command::Fetch` carrying the same sequence number
    Fetched(Epoch, u64, anyhow::Result<Vec<Comment>>),
    Created {
        epoch: Epoch,
        temp_id: CommentId,
        result: anyhow::Result<Comment>,
    },
    Updated(Epoch, CommentId, anyhow::Result<Comment>),
    Deleted(Epoch, CommentId, anyhow::Result<()>),
    LikeToggled(Epoch, CommentId, anyhow::Result<LikeStatus>),
}

impl SyncMsg {
    fn epoch(&self) -> Option<Epoch> {
        match self {
            SyncMsg::User(_) => None,
            SyncMsg::ChannelOpened(e)
            | SyncMsg::ChannelFailed(e, _)
            | SyncMsg::ChannelClosed(e)
            | SyncMsg::Frame(e, _)
            | SyncMsg::Fetched(e, _, _)
            | SyncMsg::Created { epoch: e, .. }
            | SyncMsg::Updated(e, _, _)
            | SyncMsg::Deleted(e, _, _)
            | SyncMsg::LikeToggled(e, _, _) => Some(*e),
        }
    }
}

/// Side effects requested by the session, to be run by the caller
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Command {
    Fetch {
        epoch: Epoch,
        seq: u64,
        post: PostId,
    },
    Connect {
        epoch: Epoch,
        post: PostId,
    },
    /// Drop the current live subscription, if any
    Disconnect,
    Create {
        epoch: Epoch,
        post: PostId,
        temp_id: CommentId,
        comment: NewComment,
    },
    Update {
        epoch: Epoch,
        id: CommentId,
        content: String,
    },
    Delete {
        epoch: Epoch,
        id: CommentId,
    },
    ToggleLike {
        epoch: Epoch,
        id: CommentId,
    },
    Notify(Notice),
}

/// What the user-facing side should know about
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Notice {
    /// The forest changed, here is its new projection
    Snapshot(Vec<CommentView>),
    ChannelOpened(PostId),
    ChannelClosed(PostId),
    Failed { op: Op, error: String },
}

#[derive(Clone, Debug)]
enum LoadState {
    /// Some fetches are in flight; live messages received meanwhile get replayed
    /// after each seed so that the reseed does not lose them
    Loading {
        in_flight: usize,
        queued: VecDeque<FeedMessage>,
    },
    Loaded,
}

/// Synchronization state for the currently viewed thread.
///
/// This is a pure reducer: feed it `SyncMsg`s, run the `Command`s it returns, and feed
/// their outcome back. All mutations of the comment tree go through here.
pub struct ThreadSession<I = DescendingIds> {
    epoch: Epoch,
    post: Option<PostId>,
    tree: CommentTree,
    coordinator: Coordinator<I>,
    channel: Option<LiveChannel>,
    load: LoadState,

    /// Sequence number of the last fetch issued, and of the last one seeded from
    fetch_seq: u64,
    seeded_seq: u64,
}

impl ThreadSession<DescendingIds> {
    pub fn new(author_name: String) -> ThreadSession<DescendingIds> {
        ThreadSession::with_ids(author_name, DescendingIds::default())
    }
}

impl<I: TempIds> ThreadSession<I> {
    pub fn with_ids(author_name: String, ids: I) -> ThreadSession<I> {
        ThreadSession {
            epoch: Epoch::default(),
            post: None,
            tree: CommentTree::new(),
            coordinator: Coordinator::new(author_name, ids),
            channel: None,
            load: LoadState::Loaded,
            fetch_seq: 0,
            seeded_seq: 0,
        }
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    pub fn post(&self) -> Option<PostId> {
        self.post
    }

    pub fn tree(&self) -> &CommentTree {
        &self.tree
    }

    pub fn snapshot(&self) -> Vec<CommentView> {
        self.tree.snapshot()
    }

    pub fn channel_state(&self) -> Option<ChannelState> {
        self.channel.as_ref().map(|c| c.state())
    }

    pub fn coordinator(&self) -> &Coordinator<I> {
        &self.coordinator
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.load, LoadState::Loading { .. })
    }

    pub fn handle(&mut self, msg: SyncMsg) -> Vec<Command> {
        let mut cmds = Vec::new();
        match msg.epoch() {
            Some(epoch) if epoch != self.epoch => {
                tracing::trace!(?epoch, current = ?self.epoch, "dropping stale completion");
            }
            _ => match msg {
                SyncMsg::User(action) => self.user_action(action, &mut cmds),
                msg => self.completion(msg, &mut cmds),
            },
        }
        cmds
    }

    fn user_action(&mut self, action: UserAction, cmds: &mut Vec<Command>) {
        tracing::debug!(?action, "handling user action");
        if let UserAction::View(post) = action {
            self.teardown(cmds);
            self.post = Some(post);
            let mut channel = LiveChannel::new(post);
            channel.connecting();
            self.channel = Some(channel);
            self.reseed(cmds);
            cmds.push(Command::Connect {
                epoch: self.epoch,
                post,
            });
            self.notify_snapshot(cmds);
            return;
        }
        if let UserAction::Leave = action {
            self.teardown(cmds);
            self.notify_snapshot(cmds);
            return;
        }

        let (op, target) = match &action {
            UserAction::Submit { .. } => (Op::Create, None),
            UserAction::Edit { id, .. } => (Op::Update, Some(*id)),
            UserAction::Delete(id) => (Op::Delete, Some(*id)),
            UserAction::ToggleLike(id) => (Op::ToggleLike, Some(*id)),
            UserAction::View(_) | UserAction::Leave => unreachable!(),
        };
        let post = match self.post {
            Some(post) => post,
            None => {
                return cmds.push(Command::Notify(Notice::Failed {
                    op,
                    error: String::from("no thread is being viewed"),
                }))
            }
        };
        if let Some(id) = target.filter(|id| self.coordinator.is_pending(id)) {
            return cmds.push(Command::Notify(Notice::Failed {
                op,
                error: format!("comment {id} is not confirmed by the server yet"),
            }));
        }

        let epoch = self.epoch;
        match action {
            UserAction::Submit { content, parent_id } => {
                let provisional = self.coordinator.provisional(content.clone(), parent_id);
                let temp_id = provisional.id;
                self.tree.upsert(provisional);
                cmds.push(Command::Create {
                    epoch,
                    post,
                    temp_id,
                    comment: NewComment { content, parent_id },
                });
                self.notify_snapshot(cmds);
            }
            UserAction::Edit { id, content } => cmds.push(Command::Update { epoch, id, content }),
            UserAction::Delete(id) => cmds.push(Command::Delete { epoch, id }),
            UserAction::ToggleLike(id) => cmds.push(Command::ToggleLike { epoch, id }),
            UserAction::View(_) | UserAction::Leave => unreachable!(),
        }
    }

    fn completion(&mut self, msg: SyncMsg, cmds: &mut Vec<Command>) {
        match msg {
            SyncMsg::User(_) => unreachable!(),
            SyncMsg::ChannelOpened(_) => {
                if let Some(chan) = self.channel.as_mut() {
                    if chan.opened() {
                        cmds.push(Command::Notify(Notice::ChannelOpened(chan.post())));
                    }
                }
            }
            SyncMsg::ChannelFailed(_, err) => {
                tracing::warn!(?err, "failed connecting to live channel");
                cmds.push(failure(Op::Connect, &err));
                self.channel_closed(cmds);
            }
            SyncMsg::ChannelClosed(_) => {
                tracing::warn!(post = ?self.post, "lost live channel");
                self.channel_closed(cmds);
            }
            SyncMsg::Frame(_, frame) => {
                let msg = match self.channel.as_ref().and_then(|c| c.decode(&frame)) {
                    Some(msg) => msg,
                    None => return,
                };
                match &mut self.load {
                    LoadState::Loading { queued, .. } => queued.push_back(msg),
                    LoadState::Loaded => {
                        let res = self.tree.upsert(msg.into_comment());
                        tracing::debug!(?res, "applied live message");
                        self.notify_snapshot(cmds);
                    }
                }
            }
            SyncMsg::Fetched(_, seq, result) => {
                let (in_flight, queued) =
                    match std::mem::replace(&mut self.load, LoadState::Loaded) {
                        LoadState::Loading { in_flight, queued } => {
                            (in_flight.saturating_sub(1), queued)
                        }
                        LoadState::Loaded => {
                            tracing::warn!("received comments that were not being fetched");
                            (0, VecDeque::new())
                        }
                    };
                match result {
                    // answers can come back out of order, never seed over a newer one
                    Ok(_) if seq <= self.seeded_seq => {
                        tracing::debug!(seq, seeded = self.seeded_seq, "dropping outdated fetch");
                    }
                    Ok(records) => {
                        self.seeded_seq = seq;
                        self.tree.seed(records);
                        for p in self.coordinator.pending() {
                            self.tree.upsert(p.clone());
                        }
                    }
                    Err(err) => {
                        tracing::error!(?err, post = ?self.post, "failed fetching comments");
                        cmds.push(failure(Op::Fetch, &err));
                    }
                }
                for msg in queued.iter() {
                    self.tree.upsert(msg.comment().clone());
                }
                if in_flight > 0 {
                    self.load = LoadState::Loading { in_flight, queued };
                }
                self.notify_snapshot(cmds);
            }
            SyncMsg::Created {
                temp_id, result, ..
            } => {
                self.coordinator.settle(temp_id);
                match result {
                    Ok(c) => tracing::debug!(?temp_id, id = ?c.id, "comment submission confirmed"),
                    Err(err) => {
                        tracing::error!(?err, ?temp_id, "comment submission failed");
                        cmds.push(failure(Op::Create, &err));
                    }
                }
                // Either way, the server has the canonical view of the thread
                self.reseed(cmds);
            }
            SyncMsg::Updated(_, id, result) => match result {
                Ok(c) => {
                    self.tree.upsert(c);
                    self.notify_snapshot(cmds);
                }
                Err(err) => {
                    tracing::error!(?err, ?id, "comment edition failed");
                    cmds.push(failure(Op::Update, &err));
                    self.reseed(cmds);
                }
            },
            SyncMsg::Deleted(_, id, result) => match result {
                // the tombstone comes back through the live channel
                Ok(()) => tracing::debug!(?id, "comment deletion confirmed"),
                Err(err) => {
                    tracing::error!(?err, ?id, "comment deletion failed");
                    cmds.push(failure(Op::Delete, &err));
                    self.reseed(cmds);
                }
            },
            SyncMsg::LikeToggled(_, id, result) => {
                match result {
                    Ok(status) => tracing::debug!(?id, ?status, "like toggled"),
                    Err(err) => {
                        tracing::error!(?err, ?id, "like toggle failed");
                        cmds.push(failure(Op::ToggleLike, &err));
                    }
                }
                // Likes are not broadcast on the live channel, refetch to see the new count
                self.reseed(cmds);
            }
        }
    }

    /// Forgets everything about the current thread
    fn teardown(&mut self, cmds: &mut Vec<Command>) {
        if let Some(mut chan) = self.channel.take() {
            let was_open = chan.state() == ChannelState::Open;
            chan.close();
            cmds.push(Command::Disconnect);
            if was_open {
                cmds.push(Command::Notify(Notice::ChannelClosed(chan.post())));
            }
        }
        self.epoch.0 += 1;
        self.post = None;
        self.tree.clear();
        self.coordinator.clear();
        self.load = LoadState::Loaded;
        self.seeded_seq = 0;
    }

    fn channel_closed(&mut self, cmds: &mut Vec<Command>) {
        if let Some(chan) = self.channel.as_mut() {
            if chan.close() {
                cmds.push(Command::Disconnect);
                cmds.push(Command::Notify(Notice::ChannelClosed(chan.post())));
            }
        }
    }

    fn reseed(&mut self, cmds: &mut Vec<Command>) {
        let post = match self.post {
            Some(post) => post,
            None => return,
        };
        match &mut self.load {
            LoadState::Loading { in_flight, .. } => *in_flight += 1,
            LoadState::Loaded => {
                self.load = LoadState::Loading {
                    in_flight: 1,
                    queued: VecDeque::new(),
                }
            }
        }
        self.fetch_seq += 1;
        cmds.push(Command::Fetch {
            epoch: self.epoch,
            seq: self.fetch_seq,
            post,
        });
    }

    fn notify_snapshot(&self, cmds: &mut Vec<Command>) {
        cmds.push(Command::Notify(Notice::Snapshot(self.tree.snapshot())));
    }
}

fn failure(op: Op, err: &anyhow::Error) -> Command {
    Command::Notify(Notice::Failed {
        op,
        error: format!("{err:#}"),
    })
}
