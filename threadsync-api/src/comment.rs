use crate::{CommentId, Time, UserId};

#[derive(Clone, Debug, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: CommentId,

    /// None for a top-level comment
    #[serde(default)]
    pub parent_id: Option<CommentId>,

    #[serde(default)]
    pub text: String,

    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub modified: Option<Time>,

    /// Ranking score, computed server-side
    #[serde(default)]
    pub avg_rank: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_milliseconds_option"
    )]
    pub created: Option<Time>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_parent_id: Option<CommentId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_length: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_of_children: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted: Option<bool>,

    /// Child comments, in arrival order
    #[serde(default)]
    pub embedded: Vec<Comment>,
}

impl Comment {
    pub fn new(id: CommentId, parent_id: Option<CommentId>, text: String) -> Comment {
        Comment {
            id,
            parent_id,
            text,
            modified: None,
            avg_rank: None,
            user_id: None,
            user_name: None,
            created: None,
            top_parent_id: None,
            path_length: None,
            num_of_children: None,
            deleted: None,
            embedded: Vec::new(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}
