mod connection;
pub use connection::{ConnectionManager, FeedParams, FeedSocket, Transport};

mod error;
pub use error::{ConnectionError, DecodeError};

pub mod event;
pub use event::FeedEvent;

pub mod feed;

mod identity;
pub use identity::{IdentityCell, IdentityChanges, IdentityProvider};

mod merge;
pub use merge::{apply, Event, Outcome};

mod sync;
pub use sync::{SideEffect, SyncController};

mod tree;
pub use tree::{CommentTree, Node};

pub mod api {
    pub use threadsync_api::*;
}
