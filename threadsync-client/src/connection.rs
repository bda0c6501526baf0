use std::pin::Pin;

use anyhow::Context;
use async_trait::async_trait;
use futures::{stream::BoxStream, Sink, SinkExt, StreamExt};

use crate::{
    api::{CommentId, DiscussionId, OutboundMessage},
    ConnectionError,
};

/// What to subscribe to
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FeedParams {
    pub discussion_id: DiscussionId,

    /// Sub-thread to load first, if any
    pub focus_comment_id: Option<CommentId>,
}

impl FeedParams {
    pub fn new(discussion_id: DiscussionId) -> FeedParams {
        FeedParams {
            discussion_id,
            focus_comment_id: None,
        }
    }

    pub fn focused_on(self, comment: CommentId) -> FeedParams {
        FeedParams {
            focus_comment_id: Some(comment),
            ..self
        }
    }
}

/// Both halves of one open subscription
pub struct FeedSocket {
    pub incoming: BoxStream<'static, anyhow::Result<String>>,
    pub outgoing: Pin<Box<dyn Send + Sink<String, Error = anyhow::Error>>>,
}

/// Whatever actually carries the feed, eg. a websocket
#[async_trait]
pub trait Transport: Send + Sync {
    async fn open(&self, params: &FeedParams) -> anyhow::Result<FeedSocket>;
}

struct Subscription {
    generation: u64,
    socket: FeedSocket,
}

/// Owner of the one live subscription to the discussion feed
pub struct ConnectionManager<T> {
    transport: T,
    params: Option<FeedParams>,
    live: Option<Subscription>,
    last_generation: u64,
}

impl<T: Transport> ConnectionManager<T> {
    pub fn new(transport: T) -> ConnectionManager<T> {
        ConnectionManager {
            transport,
            params: None,
            live: None,
            last_generation: 0,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Parameters of the last `connect`, kept across `close`
    pub fn params(&self) -> Option<&FeedParams> {
        self.params.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.live.is_some()
    }

    /// Generation of the live subscription, if any
    pub fn generation(&self) -> Option<u64> {
        self.live.as_ref().map(|s| s.generation)
    }

    pub async fn connect(&mut self, params: FeedParams) -> Result<(), ConnectionError> {
        if let Some(live) = &self.live {
            return Err(ConnectionError::AlreadyConnected(live.generation));
        }
        self.params = Some(params);
        self.open(params).await
    }

    /// Close the current subscription if there is one, then open a fresh one
    /// with the same parameters. The caller must expect a new snapshot.
    pub async fn reconnect(&mut self) -> Result<(), ConnectionError> {
        let params = self.params.ok_or(ConnectionError::NeverConnected)?;
        self.close().await;
        self.open(params).await
    }

    /// Idempotent. Anything the subscription had not delivered yet is lost.
    pub async fn close(&mut self) {
        let Some(mut live) = self.live.take() else {
            return;
        };
        if let Err(err) = live.socket.outgoing.close().await {
            tracing::warn!(?err, generation = live.generation, "failed cleanly closing feed");
        }
        tracing::info!(generation = live.generation, "closed discussion feed");
    }

    pub async fn send(&mut self, msg: &OutboundMessage) -> Result<(), ConnectionError> {
        let live = self.live.as_mut().ok_or(ConnectionError::NotConnected)?;
        let json = serde_json::to_string(msg).map_err(ConnectionError::Encode)?;
        live.socket
            .outgoing
            .send(json)
            .await
            .with_context(|| format!("sending to feed generation {}", live.generation))?;
        Ok(())
    }

    /// Next raw frame of the live subscription.
    ///
    /// `None` when the subscription ended or there is none. Nothing is read
    /// ahead, so dropping this future loses no message.
    pub async fn next_message(&mut self) -> Option<anyhow::Result<String>> {
        self.live.as_mut()?.socket.incoming.next().await
    }

    async fn open(&mut self, params: FeedParams) -> Result<(), ConnectionError> {
        debug_assert!(self.live.is_none(), "opening a second feed subscription");
        let socket = self.transport.open(&params).await.with_context(|| {
            format!(
                "opening feed for discussion {}",
                params.discussion_id
            )
        })?;
        self.last_generation += 1;
        tracing::info!(
            generation = self.last_generation,
            discussion_id = %params.discussion_id,
            focus_comment_id = ?params.focus_comment_id,
            "subscribed to discussion feed"
        );
        self.live = Some(Subscription {
            generation: self.last_generation,
            socket,
        });
        Ok(())
    }
}
