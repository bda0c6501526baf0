use crate::{Comment, CommentId, User};

/// One frame of the discussion feed, as sent by the server.
///
/// Any subset of the fields may be present. `comments` and `users` form a
/// snapshot, `reply` is a new comment, `edit` an edited comment and `user`
/// the identity the server assigned to an anonymous viewer.
#[derive(Clone, Debug, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct FeedMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<Vec<Comment>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users: Option<Vec<User>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply: Option<Comment>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edit: Option<Comment>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

/// Message sent by the client to the server over the feed
#[derive(Clone, Debug, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(untagged)]
pub enum OutboundMessage {
    TopReply {
        #[serde(rename = "topReply")]
        top_reply: String,
    },
    Reply {
        #[serde(rename = "parentId")]
        parent_id: CommentId,
        text: String,
    },
}
