use std::{collections::BTreeMap, sync::Arc};

use anyhow::Context;
use async_trait::async_trait;
use futures::{channel::mpsc, sink, StreamExt};
use parking_lot::Mutex;
use threadsync_client::{
    api::{Comment, CommentId, DiscussionId, FeedMessage, OutboundMessage, User, UserId},
    FeedParams, FeedSocket, Transport,
};


/// Anonymous viewers get ids counting up from here
pub const ANONYMOUS_USER_ID_BASE: i64 = 1_000_000;

#[derive(Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Unknown discussion {0}")]
    UnknownDiscussion(DiscussionId),

    #[error("Unknown comment {0}")]
    UnknownComment(CommentId),
}

/// In-memory discussion server, reachable through its `Transport` impl
#[derive(Clone, Debug, Default)]
pub struct MockServer(Arc<Mutex<State>>);

#[derive(Debug, Default)]
struct State {
    discussions: BTreeMap<DiscussionId, Discussion>,
    last_comment_id: i64,
    num_anonymous: i64,
    num_opened: usize,
    received: Vec<OutboundMessage>,
}

#[derive(Debug)]
struct Discussion {
    comments: Vec<Comment>,
    users: Vec<User>,
    feeds: Vec<mpsc::UnboundedSender<String>>,
}

impl Discussion {
    fn relay(&mut self, msg: &FeedMessage) {
        match serde_json::to_string(msg) {
            Ok(json) => self.relay_raw(&json),
            Err(err) => tracing::error!(?err, "failed serializing feed message, not relaying it"),
        }
    }

    /// Closed feeds are pruned along the way
    fn relay_raw(&mut self, raw: &str) {
        self.feeds
            .retain(|f| f.unbounded_send(String::from(raw)).is_ok());
    }
}

fn find_in(comments: &[Comment], id: CommentId) -> Option<&Comment> {
    for c in comments {
        if c.id == id {
            return Some(c);
        }
        if let Some(res) = find_in(&c.embedded, id) {
            return Some(res);
        }
    }
    None
}

fn find_in_mut(comments: &mut [Comment], id: CommentId) -> Option<&mut Comment> {
    for c in comments.iter_mut() {
        if c.id == id {
            return Some(c);
        }
        if let Some(res) = find_in_mut(&mut c.embedded, id) {
            return Some(res);
        }
    }
    None
}

fn max_id(comments: &[Comment]) -> i64 {
    comments
        .iter()
        .map(|c| c.id.0.max(max_id(&c.embedded)))
        .max()
        .unwrap_or(0)
}

impl State {
    fn discussion(&mut self, id: DiscussionId) -> Result<&mut Discussion, Error> {
        self.discussions
            .get_mut(&id)
            .ok_or(Error::UnknownDiscussion(id))
    }

    fn post_reply(
        &mut self,
        discussion: DiscussionId,
        parent_id: Option<CommentId>,
        text: String,
    ) -> Result<Comment, Error> {
        let id = CommentId(self.last_comment_id + 1);
        let d = self.discussion(discussion)?;
        let siblings = match parent_id {
            None => &mut d.comments,
            Some(p) => {
                &mut find_in_mut(&mut d.comments, p)
                    .ok_or(Error::UnknownComment(p))?
                    .embedded
            }
        };
        let comment = Comment::new(id, parent_id, text);
        siblings.push(comment.clone());
        d.relay(&FeedMessage {
            reply: Some(comment.clone()),
            ..FeedMessage::default()
        });
        self.last_comment_id = id.0;
        Ok(comment)
    }
}

impl MockServer {
    pub fn new() -> MockServer {
        MockServer::default()
    }

    /// `comments` is the nested forest, each comment's `parent_id` must match
    /// where it is embedded
    pub fn create_discussion(&self, id: DiscussionId, comments: Vec<Comment>, users: Vec<User>) {
        let mut state = self.0.lock();
        state.last_comment_id = state.last_comment_id.max(max_id(&comments));
        state.discussions.insert(
            id,
            Discussion {
                comments,
                users,
                feeds: Vec::new(),
            },
        );
    }

    pub fn comments(&self, discussion: DiscussionId) -> Result<Vec<Comment>, Error> {
        Ok(self.0.lock().discussion(discussion)?.comments.clone())
    }

    pub fn post_reply(
        &self,
        discussion: DiscussionId,
        parent_id: Option<CommentId>,
        text: String,
    ) -> Result<Comment, Error> {
        self.0.lock().post_reply(discussion, parent_id, text)
    }

    /// Returns the edit as relayed, ie. without children
    pub fn edit_comment(
        &self,
        discussion: DiscussionId,
        id: CommentId,
        text: String,
        avg_rank: f64,
    ) -> Result<Comment, Error> {
        let mut state = self.0.lock();
        let d = state.discussion(discussion)?;
        let c = find_in_mut(&mut d.comments, id).ok_or(Error::UnknownComment(id))?;
        c.text = text;
        c.avg_rank = Some(avg_rank);
        let mut edit = c.clone();
        edit.embedded = Vec::new();
        d.relay(&FeedMessage {
            edit: Some(edit.clone()),
            ..FeedMessage::default()
        });
        Ok(edit)
    }

    /// Send an arbitrary frame to every open feed of the discussion
    pub fn push_raw(&self, discussion: DiscussionId, raw: &str) -> Result<(), Error> {
        let mut state = self.0.lock();
        state.discussion(discussion)?.relay_raw(raw);
        Ok(())
    }

    /// End every open feed of the discussion, as a server going away would
    pub fn disconnect_all(&self, discussion: DiscussionId) -> Result<(), Error> {
        self.0.lock().discussion(discussion)?.feeds.clear();
        Ok(())
    }

    pub fn num_live_feeds(&self, discussion: DiscussionId) -> usize {
        let mut state = self.0.lock();
        match state.discussion(discussion) {
            Err(_) => 0,
            Ok(d) => {
                d.feeds.retain(|f| !f.is_closed());
                d.feeds.len()
            }
        }
    }

    /// Number of feeds ever opened, across discussions
    pub fn num_opened(&self) -> usize {
        self.0.lock().num_opened
    }

    /// Every message clients sent, in order
    pub fn received(&self) -> Vec<OutboundMessage> {
        self.0.lock().received.clone()
    }

    fn receive(&self, discussion: DiscussionId, raw: &str) -> anyhow::Result<()> {
        let msg: OutboundMessage =
            serde_json::from_str(raw).with_context(|| format!("parsing client message {raw:?}"))?;
        let mut state = self.0.lock();
        state.received.push(msg.clone());
        let posted = match msg {
            OutboundMessage::TopReply { top_reply } => state.post_reply(discussion, None, top_reply),
            OutboundMessage::Reply { parent_id, text } => {
                state.post_reply(discussion, Some(parent_id), text)
            }
        };
        if let Err(err) = posted {
            // a real server would not hang up on this either
            tracing::warn!(%err, "rejected client reply");
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for MockServer {
    async fn open(&self, params: &FeedParams) -> anyhow::Result<FeedSocket> {
        let (sender, receiver) = mpsc::unbounded();
        {
            let mut state = self.0.lock();
            state.num_opened += 1;
            state.num_anonymous += 1;
            let anonymous = User {
                id: UserId(ANONYMOUS_USER_ID_BASE + state.num_anonymous),
                name: format!("anonymous-{}", state.num_anonymous),
            };
            let d = state.discussion(params.discussion_id)?;
            let comments = match params.focus_comment_id.and_then(|f| find_in(&d.comments, f)) {
                Some(focused) => vec![focused.clone()],
                None => d.comments.clone(),
            };
            for msg in [
                FeedMessage {
                    comments: Some(comments),
                    users: Some(d.users.clone()),
                    ..FeedMessage::default()
                },
                FeedMessage {
                    user: Some(anonymous),
                    ..FeedMessage::default()
                },
            ] {
                let json = serde_json::to_string(&msg).context("serializing initial feed message")?;
                sender
                    .unbounded_send(json)
                    .context("queueing initial feed message")?;
            }
            d.feeds.push(sender);
        }
        tracing::debug!(discussion_id = %params.discussion_id, "opened mock feed");

        let server = self.clone();
        let discussion = params.discussion_id;
        let outgoing = sink::unfold((), move |(), raw: String| {
            let server = server.clone();
            async move { server.receive(discussion, &raw) }
        });
        Ok(FeedSocket {
            incoming: receiver.map(Ok::<_, anyhow::Error>).boxed(),
            outgoing: Box::pin(outgoing),
        })
    }
}
