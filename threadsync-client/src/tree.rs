use crate::api::{Comment, CommentId, User, UserId};

/// One comment of the forest, with the ids of its direct children
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    /// Its `embedded` list is always empty, children live in `children`
    comment: Comment,

    /// Where the comment actually sits in the forest
    parent: Option<CommentId>,

    /// In arrival order
    children: im::Vector<CommentId>,
}

impl Node {
    pub fn id(&self) -> CommentId {
        self.comment.id
    }

    pub fn comment(&self) -> &Comment {
        &self.comment
    }

    pub fn parent(&self) -> Option<CommentId> {
        self.parent
    }

    pub fn children(&self) -> &im::Vector<CommentId> {
        &self.children
    }

    /// Edits only ever touch the text, modification date and rank
    pub(crate) fn apply_edit(&mut self, edit: Comment) {
        self.comment.text = edit.text;
        self.comment.modified = edit.modified;
        self.comment.avg_rank = edit.avg_rank;
    }
}

/// The discussion forest, plus the users it references.
///
/// Nodes are stored flat, keyed by id. Cloning is cheap, so clones are what
/// gets handed out to renderers.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CommentTree {
    nodes: im::HashMap<CommentId, Node>,
    roots: im::Vector<CommentId>,
    users: im::Vector<User>,
}

impl CommentTree {
    pub fn new() -> CommentTree {
        CommentTree::default()
    }

    pub fn from_comments(comments: Vec<Comment>) -> CommentTree {
        let mut tree = CommentTree::new();
        tree.replace_comments(comments);
        tree
    }

    /// Number of comments, at any depth
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: CommentId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn get(&self, id: CommentId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn root_ids(&self) -> &im::Vector<CommentId> {
        &self.roots
    }

    pub fn roots(&self) -> impl Iterator<Item = &Node> {
        self.roots.iter().filter_map(|id| self.nodes.get(id))
    }

    /// Direct children of `id`, empty if `id` is not in the tree
    pub fn children(&self, id: CommentId) -> impl Iterator<Item = &Node> {
        self.nodes
            .get(&id)
            .into_iter()
            .flat_map(|n| n.children.iter())
            .filter_map(|c| self.nodes.get(c))
    }

    pub fn users(&self) -> &im::Vector<User> {
        &self.users
    }

    pub fn user(&self, id: UserId) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    /// Rebuild the nested shape the server sends, children under `embedded`
    pub fn to_nested(&self) -> Vec<Comment> {
        let mut res = Vec::with_capacity(self.roots.len());
        // comments being rebuilt, each with the children still to visit
        let mut stack: Vec<(Comment, im::vector::Iter<'_, CommentId>)> = Vec::new();
        let mut roots = self.roots.iter();
        loop {
            let next = match stack.last_mut() {
                Some((_, children)) => children.next(),
                None => roots.next(),
            };
            match next {
                Some(id) => {
                    if let Some(node) = self.nodes.get(id) {
                        stack.push((node.comment.clone(), node.children.iter()));
                    }
                }
                None => {
                    let Some((done, _)) = stack.pop() else {
                        break;
                    };
                    match stack.last_mut() {
                        Some((parent, _)) => parent.embedded.push(done),
                        None => res.push(done),
                    }
                }
            }
        }
        res
    }

    pub fn clear(&mut self) {
        self.nodes = im::HashMap::new();
        self.roots = im::Vector::new();
        self.users = im::Vector::new();
    }

    pub(crate) fn replace_comments(&mut self, comments: Vec<Comment>) {
        self.nodes = im::HashMap::new();
        self.roots = self.adopt(None, comments).into_iter().collect();
    }

    pub(crate) fn replace_users(&mut self, users: Vec<User>) {
        self.users = users.into_iter().collect();
    }

    pub(crate) fn push_root(&mut self, comment: Comment) {
        let added = self.adopt(None, vec![comment]);
        self.roots.extend(added);
    }

    /// Returns false, leaving the tree untouched, if `parent` is not in the tree
    pub(crate) fn push_child(&mut self, parent: CommentId, comment: Comment) -> bool {
        if !self.nodes.contains_key(&parent) {
            return false;
        }
        let added = self.adopt(Some(parent), vec![comment]);
        if let Some(p) = self.nodes.get_mut(&parent) {
            p.children.extend(added);
        }
        true
    }

    /// The node `id`, provided it sits directly under `parent` (or at the
    /// root level for `None`)
    pub(crate) fn get_mut_under(
        &mut self,
        parent: Option<CommentId>,
        id: CommentId,
    ) -> Option<&mut Node> {
        self.nodes.get_mut(&id).filter(|n| n.parent == parent)
    }

    /// Index `comments` and all their embedded descendants under `parent`,
    /// returning the ids of the ones that were kept at this level.
    ///
    /// All the siblings of a level are claimed before descending into any of
    /// them, then each sibling's subtree is handled in turn, so the first
    /// occurrence of a duplicated id in that order wins. Works off an explicit
    /// stack, as threads can be arbitrarily deep.
    fn adopt(&mut self, parent: Option<CommentId>, comments: Vec<Comment>) -> Vec<CommentId> {
        let mut pending = Vec::new();
        let kept = self.claim(parent, comments, &mut pending);
        while let Some((id, embedded)) = pending.pop() {
            let children = self.claim(Some(id), embedded, &mut pending);
            if let Some(node) = self.nodes.get_mut(&id) {
                node.children = children.into_iter().collect();
            }
        }
        kept
    }

    /// Insert one level of siblings, queueing their embedded children on
    /// `pending` so that the first sibling's come out first
    fn claim(
        &mut self,
        parent: Option<CommentId>,
        comments: Vec<Comment>,
        pending: &mut Vec<(CommentId, Vec<Comment>)>,
    ) -> Vec<CommentId> {
        let mut kept = Vec::with_capacity(comments.len());
        let mut descendants = Vec::new();
        for mut comment in comments {
            if self.nodes.contains_key(&comment.id) {
                tracing::warn!(
                    comment_id = %comment.id,
                    ?parent,
                    "dropping comment whose id is already in the tree"
                );
                continue;
            }
            let embedded = std::mem::take(&mut comment.embedded);
            kept.push(comment.id);
            if !embedded.is_empty() {
                descendants.push((comment.id, embedded));
            }
            self.nodes.insert(
                comment.id,
                Node {
                    comment,
                    parent,
                    children: im::Vector::new(),
                },
            );
        }
        pending.extend(descendants.into_iter().rev());
        kept
    }
}
