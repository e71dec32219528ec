use crate::api::{FeedMessage, PostId};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ChannelState {
    Idle,
    Connecting,
    Open,
    Closed,
}

/// Lifecycle of the live subscription to one post.
///
/// A channel is never reopened once closed: viewing the thread again creates a new one.
#[derive(Clone, Debug)]
pub struct LiveChannel {
    post: PostId,
    state: ChannelState,
}

impl LiveChannel {
    pub fn new(post: PostId) -> LiveChannel {
        LiveChannel {
            post,
            state: ChannelState::Idle,
        }
    }

    pub fn post(&self) -> PostId {
        self.post
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// Returns false if the channel was not idle
    pub fn connecting(&mut self) -> bool {
        if self.state != ChannelState::Idle {
            return false;
        }
        tracing::debug!(post = ?self.post, "connecting to live channel");
        self.state = ChannelState::Connecting;
        true
    }

    /// To be called once the transport confirmed the connection. Returns false if the
    /// channel was not waiting for it, eg. because it got closed in-between.
    pub fn opened(&mut self) -> bool {
        if self.state != ChannelState::Connecting {
            return false;
        }
        tracing::info!(post = ?self.post, "live channel open");
        self.state = ChannelState::Open;
        true
    }

    /// Returns false if the channel was already closed
    pub fn close(&mut self) -> bool {
        if self.state == ChannelState::Closed {
            return false;
        }
        tracing::info!(post = ?self.post, "live channel closed");
        self.state = ChannelState::Closed;
        true
    }

    /// Decodes one inbound frame. Frames received while the channel is not open and
    /// frames that do not decode are logged and dropped.
    pub fn decode(&self, frame: &str) -> Option<FeedMessage> {
        if self.state != ChannelState::Open {
            tracing::debug!(post = ?self.post, state = ?self.state, "dropping frame on non-open channel");
            return None;
        }
        match serde_json::from_str(frame) {
            Ok(msg) => Some(msg),
            Err(err) => {
                tracing::warn!(post = ?self.post, ?err, ?frame, "dropping malformed live message");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::CommentId;

    const FRAME: &str = r#"{"type": "new_comment", "data": {"id": 2, "parent_id": 1, "username": "bob", "created_at": "2023-01-12T10:00:00Z", "content": "hi"}}"#;

    #[test]
    fn lifecycle() {
        let mut chan = LiveChannel::new(PostId(1));
        assert_eq!(chan.state(), ChannelState::Idle);
        assert!(!chan.opened());
        assert!(chan.connecting());
        assert!(!chan.connecting());
        assert!(chan.opened());
        assert_eq!(chan.state(), ChannelState::Open);
        assert!(chan.close());
        assert!(!chan.close());
        assert!(!chan.connecting());
        assert_eq!(chan.state(), ChannelState::Closed);
    }

    #[test]
    fn closed_before_open_stays_closed() {
        let mut chan = LiveChannel::new(PostId(1));
        chan.connecting();
        chan.close();
        assert!(!chan.opened());
        assert_eq!(chan.decode(FRAME), None);
    }

    #[test]
    fn decodes_only_when_open() {
        let mut chan = LiveChannel::new(PostId(1));
        chan.connecting();
        assert_eq!(chan.decode(FRAME), None);
        chan.opened();
        let msg = chan.decode(FRAME).unwrap();
        assert_eq!(msg.comment().id, CommentId(2));
        chan.close();
        assert_eq!(chan.decode(FRAME), None);
    }

    #[test]
    fn drops_malformed_frames() {
        let mut chan = LiveChannel::new(PostId(1));
        chan.connecting();
        chan.opened();
        assert_eq!(chan.decode("not json"), None);
        assert_eq!(chan.decode(r#"{"type": "new_comment"}"#), None);
        assert_eq!(chan.decode(r#"{"type": "vote", "data": {}}"#), None);
        assert_eq!(chan.state(), ChannelState::Open);
    }
}
