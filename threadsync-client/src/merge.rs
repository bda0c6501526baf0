use crate::{
    api::{Comment, CommentId, User},
    CommentTree,
};

/// A change to apply to the comment tree
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Wholesale replacement. A `None` part leaves that half of the state as-is.
    Snapshot {
        comments: Option<Vec<Comment>>,
        users: Option<Vec<User>>,
    },
    NewComment(Comment),
    Edited(Comment),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Outcome {
    Applied(CommentId),
    /// The parent or target comment is not in the tree, the event was dropped
    NotFound,
    Replaced,
    /// A new comment whose id is already in the tree, the event was dropped
    Duplicate(CommentId),
}

impl Outcome {
    pub fn changed_tree(&self) -> bool {
        matches!(self, Outcome::Applied(_) | Outcome::Replaced)
    }
}

/// Apply one event to the tree.
///
/// Never partially applies: when the outcome is `NotFound` or `Duplicate`,
/// the tree is left exactly as it was.
pub fn apply(tree: &mut CommentTree, event: Event) -> Outcome {
    match event {
        Event::Snapshot { comments, users } => {
            if let Some(comments) = comments {
                tree.replace_comments(comments);
            }
            if let Some(users) = users {
                tree.replace_users(users);
            }
            tracing::debug!(num_comments = tree.len(), "replaced comment tree");
            Outcome::Replaced
        }
        Event::NewComment(c) => add_comment(tree, c),
        Event::Edited(c) => edit_comment(tree, c),
    }
}

fn add_comment(tree: &mut CommentTree, comment: Comment) -> Outcome {
    let id = comment.id;
    if tree.contains(id) {
        tracing::warn!(comment_id = %id, "ignoring new comment already in the tree");
        return Outcome::Duplicate(id);
    }
    match comment.parent_id {
        None => {
            tree.push_root(comment);
            Outcome::Applied(id)
        }
        Some(parent) => {
            if tree.push_child(parent, comment) {
                Outcome::Applied(id)
            } else {
                tracing::debug!(comment_id = %id, parent_id = %parent, "dropping reply to unknown comment");
                Outcome::NotFound
            }
        }
    }
}

fn edit_comment(tree: &mut CommentTree, edit: Comment) -> Outcome {
    let id = edit.id;
    match tree.get_mut_under(edit.parent_id, id) {
        Some(node) => {
            node.apply_edit(edit);
            Outcome::Applied(id)
        }
        None => {
            tracing::debug!(comment_id = %id, parent_id = ?edit.parent_id, "dropping edit of unknown comment");
            Outcome::NotFound
        }
    }
}
