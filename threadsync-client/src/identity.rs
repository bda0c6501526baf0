use std::{
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use futures::{
    channel::mpsc,
    stream::{FusedStream, Stream},
    StreamExt,
};
use parking_lot::Mutex;

use crate::api::User;

/// Who the viewer currently is
pub trait IdentityProvider: Send + Sync {
    fn get_identity(&self) -> Option<User>;

    fn set_identity(&self, user: User);

    /// Returns true iff `user` was written
    fn set_if_absent(&self, user: User) -> bool {
        if self.get_identity().is_some() {
            return false;
        }
        self.set_identity(user);
        true
    }
}

/// In-process identity holder.
///
/// Every write is announced on the matching `IdentityChanges`, which has a
/// single consumer: the feed loop, which reconnects on each change.
#[derive(Clone, Debug)]
pub struct IdentityCell {
    current: Arc<Mutex<Option<User>>>,
    changes: mpsc::UnboundedSender<User>,
}

#[derive(Debug)]
pub struct IdentityChanges(mpsc::UnboundedReceiver<User>);

impl IdentityCell {
    pub fn new() -> (IdentityCell, IdentityChanges) {
        IdentityCell::with_identity(None)
    }

    /// Start from an identity restored by the embedder, eg. from a cookie
    pub fn with_identity(user: Option<User>) -> (IdentityCell, IdentityChanges) {
        let (sender, receiver) = mpsc::unbounded();
        let cell = IdentityCell {
            current: Arc::new(Mutex::new(user)),
            changes: sender,
        };
        (cell, IdentityChanges(receiver))
    }

    fn notify(&self, user: User) {
        if self.changes.unbounded_send(user).is_err() {
            tracing::debug!("identity changed while nobody listens for changes");
        }
    }
}

impl IdentityProvider for IdentityCell {
    fn get_identity(&self) -> Option<User> {
        self.current.lock().clone()
    }

    fn set_identity(&self, user: User) {
        *self.current.lock() = Some(user.clone());
        self.notify(user);
    }

    fn set_if_absent(&self, user: User) -> bool {
        {
            let mut current = self.current.lock();
            if current.is_some() {
                return false;
            }
            *current = Some(user.clone());
        }
        self.notify(user);
        true
    }
}

impl Stream for IdentityChanges {
    type Item = User;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<User>> {
        self.0.poll_next_unpin(cx)
    }
}

impl FusedStream for IdentityChanges {
    fn is_terminated(&self) -> bool {
        self.0.is_terminated()
    }
}
