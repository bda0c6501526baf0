use std::sync::Arc;

use futures::channel::mpsc;

use crate::{
    api::{CommentId, OutboundMessage, User},
    event::{self, FeedEvent},
    merge, CommentTree, ConnectionError, ConnectionManager, DecodeError, Event, IdentityProvider,
    Outcome, Transport,
};

/// Requests for the rendering layer, emitted after a message was merged
#[derive(Clone, Debug, PartialEq)]
pub enum SideEffect {
    /// The tree changed; here is a read-only view of it
    Render(CommentTree),
    /// Scroll to / highlight this comment
    Focus(CommentId),
}

/// Holds the comment tree and keeps it in sync with the feed
pub struct SyncController {
    tree: CommentTree,
    identity: Arc<dyn IdentityProvider>,
    effects: mpsc::UnboundedSender<SideEffect>,

    /// While the viewer is typing a reply, new comments must not steal focus
    composing: bool,
    top_reply: String,
}

impl SyncController {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        effects: mpsc::UnboundedSender<SideEffect>,
    ) -> SyncController {
        SyncController {
            tree: CommentTree::new(),
            identity,
            effects,
            composing: false,
            top_reply: String::new(),
        }
    }

    pub fn tree(&self) -> &CommentTree {
        &self.tree
    }

    pub fn is_composing(&self) -> bool {
        self.composing
    }

    pub fn set_composing(&mut self, composing: bool) {
        self.composing = composing;
    }

    pub fn top_reply(&self) -> &str {
        &self.top_reply
    }

    pub fn set_top_reply(&mut self, text: String) {
        self.top_reply = text;
    }

    /// Forget everything, a new snapshot is on its way
    pub fn reset(&mut self) {
        self.tree.clear();
    }

    /// Decode one raw feed message and merge it into the tree.
    ///
    /// On decode failure nothing is touched and nothing is emitted.
    pub fn handle_message(&mut self, raw: &str) -> Result<Vec<Outcome>, DecodeError> {
        let events = event::decode(raw)?;
        let mut outcomes = Vec::with_capacity(events.len());
        let mut focus = None;
        for e in events {
            match e {
                FeedEvent::Merge(e) => {
                    let is_new = matches!(e, Event::NewComment(_));
                    let outcome = self.apply(e);
                    if let (true, Outcome::Applied(id)) = (is_new, outcome) {
                        if !self.composing {
                            focus = Some(id);
                        }
                    }
                    outcomes.push(outcome);
                }
                FeedEvent::IdentityHint(user) => self.bootstrap_identity(user),
            }
        }
        if outcomes.iter().any(Outcome::changed_tree) {
            self.emit(SideEffect::Render(self.tree.clone()));
        }
        if let Some(id) = focus {
            self.emit(SideEffect::Focus(id));
        }
        Ok(outcomes)
    }

    pub fn apply(&mut self, event: Event) -> Outcome {
        merge::apply(&mut self.tree, event)
    }

    /// Send a top-level reply. The new comment only shows up once the server
    /// echoes it on the feed.
    pub async fn submit_top_reply<T: Transport>(
        &mut self,
        conn: &mut ConnectionManager<T>,
        text: String,
    ) -> Result<(), ConnectionError> {
        conn.send(&OutboundMessage::TopReply { top_reply: text })
            .await?;
        self.top_reply.clear();
        Ok(())
    }

    pub async fn submit_reply<T: Transport>(
        &mut self,
        conn: &mut ConnectionManager<T>,
        parent_id: CommentId,
        text: String,
    ) -> Result<(), ConnectionError> {
        conn.send(&OutboundMessage::Reply { parent_id, text }).await
    }

    fn bootstrap_identity(&mut self, user: User) {
        let user_id = user.id;
        if self.identity.set_if_absent(user) {
            tracing::info!(?user_id, "adopted identity assigned by server");
        } else {
            tracing::trace!(?user_id, "ignoring identity hint, already identified");
        }
    }

    fn emit(&self, effect: SideEffect) {
        // fire-and-forget: nobody listening is fine
        let _ = self.effects.unbounded_send(effect);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::{Comment, UserId},
        IdentityCell,
    };

    fn controller() -> (
        SyncController,
        IdentityCell,
        mpsc::UnboundedReceiver<SideEffect>,
    ) {
        let (identity, _changes) = IdentityCell::new();
        let (sender, receiver) = mpsc::unbounded();
        (
            SyncController::new(Arc::new(identity.clone()), sender),
            identity,
            receiver,
        )
    }

    fn drain(effects: &mut mpsc::UnboundedReceiver<SideEffect>) -> Vec<SideEffect> {
        let mut res = Vec::new();
        while let Ok(e) = effects.try_recv() {
            res.push(e);
        }
        res
    }

    fn focuses(effects: &[SideEffect]) -> Vec<CommentId> {
        effects
            .iter()
            .filter_map(|e| match e {
                SideEffect::Focus(id) => Some(*id),
                SideEffect::Render(_) => None,
            })
            .collect()
    }

    #[test]
    fn snapshot_then_reply_scenario() {
        let (mut ctl, _identity, mut effects) = controller();
        ctl.handle_message(r#"{"comments":[{"id":1,"parentId":null,"embedded":[]}]}"#)
            .unwrap();
        let outcomes = ctl
            .handle_message(r#"{"reply":{"id":2,"parentId":1,"text":"hi"}}"#)
            .unwrap();
        assert_eq!(outcomes, vec![Outcome::Applied(CommentId(2))]);

        let mut expected_root = Comment::new(CommentId(1), None, String::new());
        expected_root
            .embedded
            .push(Comment::new(CommentId(2), Some(CommentId(1)), String::from("hi")));
        assert_eq!(ctl.tree().to_nested(), vec![expected_root]);

        let effects = drain(&mut effects);
        assert_eq!(effects.len(), 3);
        assert!(matches!(&effects[0], SideEffect::Render(t) if t.len() == 1));
        assert!(matches!(&effects[1], SideEffect::Render(t) if t.len() == 2));
        assert_eq!(effects[2], SideEffect::Focus(CommentId(2)));
    }

    #[test]
    fn composing_suppresses_focus() {
        let (mut ctl, _identity, mut effects) = controller();
        ctl.handle_message(r#"{"comments":[{"id":1}]}"#).unwrap();
        assert!(!ctl.is_composing());
        ctl.set_composing(true);
        assert!(ctl.is_composing());
        ctl.handle_message(r#"{"reply":{"id":2,"parentId":1}}"#).unwrap();
        ctl.handle_message(r#"{"reply":{"id":3}}"#).unwrap();
        assert!(focuses(&drain(&mut effects)).is_empty());

        ctl.set_composing(false);
        ctl.handle_message(r#"{"reply":{"id":4,"parentId":2}}"#).unwrap();
        assert_eq!(focuses(&drain(&mut effects)), vec![CommentId(4)]);
    }

    #[test]
    fn edits_never_request_focus() {
        let (mut ctl, _identity, mut effects) = controller();
        ctl.handle_message(r#"{"comments":[{"id":1,"embedded":[{"id":2,"parentId":1}]}]}"#)
            .unwrap();
        drain(&mut effects);
        let outcomes = ctl
            .handle_message(r#"{"edit":{"id":2,"parentId":1,"text":"new","avgRank":1.5}}"#)
            .unwrap();
        assert_eq!(outcomes, vec![Outcome::Applied(CommentId(2))]);
        let effects = drain(&mut effects);
        assert_eq!(effects.len(), 1);
        assert!(matches!(&effects[0], SideEffect::Render(_)));
        assert_eq!(ctl.tree().get(CommentId(2)).unwrap().comment().text, "new");
    }

    #[test]
    fn unmatched_events_emit_nothing() {
        let (mut ctl, _identity, mut effects) = controller();
        ctl.handle_message(r#"{"comments":[{"id":1}]}"#).unwrap();
        drain(&mut effects);
        let before = ctl.tree().clone();
        let outcomes = ctl
            .handle_message(r#"{"reply":{"id":5,"parentId":40},"edit":{"id":41,"text":"x"}}"#)
            .unwrap();
        assert_eq!(outcomes, vec![Outcome::NotFound, Outcome::NotFound]);
        assert_eq!(ctl.tree(), &before);
        assert!(drain(&mut effects).is_empty());
    }

    #[test]
    fn malformed_message_touches_nothing() {
        let (mut ctl, identity, mut effects) = controller();
        ctl.handle_message(r#"{"comments":[{"id":1}]}"#).unwrap();
        drain(&mut effects);
        let before = ctl.tree().clone();
        assert!(ctl
            .handle_message(r#"{"comments":[],"user":{"id":"bad"}}"#)
            .is_err());
        assert!(ctl.handle_message("garbage").is_err());
        assert_eq!(ctl.tree(), &before);
        assert_eq!(identity.get_identity(), None);
        assert!(drain(&mut effects).is_empty());
    }

    #[test]
    fn identity_hint_is_first_writer_wins() {
        let (mut ctl, identity, _effects) = controller();
        ctl.handle_message(r#"{"user":{"id":10,"name":"anon-10"}}"#).unwrap();
        ctl.handle_message(r#"{"user":{"id":11,"name":"anon-11"}}"#).unwrap();
        assert_eq!(
            identity.get_identity(),
            Some(User {
                id: UserId(10),
                name: String::from("anon-10"),
            })
        );
    }

    #[test]
    fn reset_discards_tree() {
        let (mut ctl, _identity, _effects) = controller();
        ctl.handle_message(r#"{"comments":[{"id":1}],"users":[{"id":1,"name":"a"}]}"#)
            .unwrap();
        ctl.reset();
        assert!(ctl.tree().is_empty());
        assert!(ctl.tree().users().is_empty());
    }

    #[test]
    fn deep_snapshot_is_merged() {
        let (mut ctl, _identity, mut effects) = controller();
        let mut raw = String::from(r#"{"id":200,"parentId":199}"#);
        for id in (2..200).rev() {
            raw = format!(r#"{{"id":{id},"parentId":{},"embedded":[{raw}]}}"#, id - 1);
        }
        raw = format!(r#"{{"comments":[{{"id":1,"embedded":[{raw}]}}]}}"#);
        assert_eq!(ctl.handle_message(&raw).unwrap(), vec![Outcome::Replaced]);
        assert_eq!(ctl.tree().len(), 200);
        assert_eq!(ctl.tree().get(CommentId(200)).unwrap().parent(), Some(CommentId(199)));

        let outcomes = ctl
            .handle_message(r#"{"reply":{"id":201,"parentId":200}}"#)
            .unwrap();
        assert_eq!(outcomes, vec![Outcome::Applied(CommentId(201))]);
        assert_eq!(focuses(&drain(&mut effects)), vec![CommentId(201)]);
    }

    #[test]
    fn dropped_renderer_is_fine() {
        let (mut ctl, _identity, effects) = controller();
        drop(effects);
        ctl.handle_message(r#"{"reply":{"id":1}}"#).unwrap();
        assert_eq!(ctl.tree().len(), 1);
    }
}
