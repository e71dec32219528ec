use futures::{
    channel::mpsc,
    future::{self, LocalBoxFuture},
    pin_mut, select,
    stream::{FusedStream, FuturesUnordered},
    FutureExt, Stream, StreamExt,
};

use crate::{
    api::{CommentService, FeedConnector, FeedStream},
    Command, DescendingIds, Epoch, Notice, SyncMsg, ThreadSession, TempIds, UserAction,
};

enum Completion {
    Msg(SyncMsg),
    Connected(Epoch, anyhow::Result<FeedStream>),
}

enum Wakeup {
    Action(Option<UserAction>),
    Done(Completion),
    Frame(Epoch, Option<anyhow::Result<String>>),
}

/// Runs a `ThreadSession` against real collaborators: executes its commands, and feeds
/// back their completions as well as the live channel's frames.
pub struct Driver<S, C, I = DescendingIds> {
    service: S,
    connector: C,
    session: ThreadSession<I>,
}

impl<S, C, I> Driver<S, C, I>
where
    S: CommentService,
    C: FeedConnector,
    I: TempIds,
{
    pub fn new(service: S, connector: C, session: ThreadSession<I>) -> Driver<S, C, I> {
        Driver {
            service,
            connector,
            session,
        }
    }

    pub fn session(&self) -> &ThreadSession<I> {
        &self.session
    }

    /// Process `actions` until the stream ends, reporting to `notices`.
    ///
    /// Requests still in flight when `actions` ends are abandoned, as is the live
    /// subscription.
    pub async fn run<A>(self, mut actions: A, notices: mpsc::UnboundedSender<Notice>) -> Self
    where
        A: Stream<Item = UserAction> + FusedStream + Unpin,
    {
        let Driver {
            service,
            connector,
            mut session,
        } = self;
        {
            let service = &service;
            let connector = &connector;
            let mut in_flight = FuturesUnordered::<LocalBoxFuture<'_, Completion>>::new();
            let mut feed: Option<(Epoch, FeedStream)> = None;
            loop {
                let wakeup = {
                    let next_frame = async {
                        match feed.as_mut() {
                            Some((epoch, stream)) => (*epoch, stream.next().await),
                            None => future::pending().await,
                        }
                    }
                    .fuse();
                    pin_mut!(next_frame);
                    select! {
                        a = actions.next() => Wakeup::Action(a),
                        c = in_flight.select_next_some() => Wakeup::Done(c),
                        (epoch, f) = next_frame => Wakeup::Frame(epoch, f),
                    }
                };

                let msg = match wakeup {
                    Wakeup::Action(None) => break,
                    Wakeup::Action(Some(action)) => SyncMsg::User(action),
                    Wakeup::Done(Completion::Msg(msg)) => msg,
                    Wakeup::Done(Completion::Connected(epoch, Ok(stream))) => {
                        if epoch == session.epoch() {
                            tracing::info!(?epoch, "live channel connected");
                            feed = Some((epoch, stream));
                        }
                        SyncMsg::ChannelOpened(epoch)
                    }
                    Wakeup::Done(Completion::Connected(epoch, Err(err))) => {
                        SyncMsg::ChannelFailed(epoch, err)
                    }
                    Wakeup::Frame(epoch, Some(Ok(frame))) => SyncMsg::Frame(epoch, frame),
                    Wakeup::Frame(epoch, Some(Err(err))) => {
                        tracing::error!(?err, "live channel transport failure");
                        feed = None;
                        SyncMsg::ChannelClosed(epoch)
                    }
                    Wakeup::Frame(epoch, None) => {
                        feed = None;
                        SyncMsg::ChannelClosed(epoch)
                    }
                };

                for cmd in session.handle(msg) {
                    match cmd {
                        Command::Disconnect => {
                            if feed.take().is_some() {
                                tracing::info!("live channel disconnected");
                            }
                        }
                        Command::Notify(notice) => {
                            if notices.unbounded_send(notice).is_err() {
                                tracing::debug!("notice receiver is gone");
                            }
                        }
                        cmd => in_flight.push(execute(service, connector, cmd)),
                    }
                }
            }
        }
        Driver {
            service,
            connector,
            session,
        }
    }
}

fn execute<'a, S, C>(
    service: &'a S,
    connector: &'a C,
    cmd: Command,
) -> LocalBoxFuture<'a, Completion>
where
    S: CommentService,
    C: FeedConnector,
{
    async move {
        match cmd {
            Command::Fetch { epoch, seq, post } => Completion::Msg(SyncMsg::Fetched(
                epoch,
                seq,
                service.fetch_comments(post).await,
            )),
            Command::Connect { epoch, post } => {
                Completion::Connected(epoch, connector.connect(post).await)
            }
            Command::Create {
                epoch,
                post,
                temp_id,
                comment,
            } => Completion::Msg(SyncMsg::Created {
                epoch,
                temp_id,
                result: service.create_comment(post, comment).await,
            }),
            Command::Update { epoch, id, content } => Completion::Msg(SyncMsg::Updated(
                epoch,
                id,
                service.update_comment(id, content).await,
            )),
            Command::Delete { epoch, id } => {
                Completion::Msg(SyncMsg::Deleted(epoch, id, service.delete_comment(id).await))
            }
            Command::ToggleLike { epoch, id } => Completion::Msg(SyncMsg::LikeToggled(
                epoch,
                id,
                service.toggle_like(id).await,
            )),
            Command::Disconnect | Command::Notify(_) => {
                unreachable!("handled synchronously by the driver")
            }
        }
    }
    .boxed_local()
}
