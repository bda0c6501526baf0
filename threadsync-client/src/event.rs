use serde::Deserialize;

use crate::{
    api::{FeedMessage, User},
    DecodeError, Event,
};

/// Everything a feed message can ask of the controller
#[derive(Clone, Debug, PartialEq)]
pub enum FeedEvent {
    Merge(Event),
    /// Identity the server assigned to an anonymous viewer
    IdentityHint(User),
}

impl FeedEvent {
    /// Split a message into events, in the order they must be applied
    pub fn from_message(msg: FeedMessage) -> Vec<FeedEvent> {
        let mut res = Vec::new();
        if msg.comments.is_some() || msg.users.is_some() {
            res.push(FeedEvent::Merge(Event::Snapshot {
                comments: msg.comments,
                users: msg.users,
            }));
        }
        if let Some(reply) = msg.reply {
            res.push(FeedEvent::Merge(Event::NewComment(reply)));
        }
        if let Some(edit) = msg.edit {
            res.push(FeedEvent::Merge(Event::Edited(edit)));
        }
        if let Some(user) = msg.user {
            res.push(FeedEvent::IdentityHint(user));
        }
        res
    }
}

/// Decodes the whole message before returning anything, so that a malformed
/// message yields no event at all.
///
/// Threads may nest arbitrarily deep, so there is no recursion limit; the
/// stack grows on the heap instead.
pub fn decode(raw: &str) -> Result<Vec<FeedEvent>, DecodeError> {
    let mut de = serde_json::Deserializer::from_str(raw);
    de.disable_recursion_limit();
    let msg = FeedMessage::deserialize(serde_stacker::Deserializer::new(&mut de))?;
    de.end()?;
    Ok(FeedEvent::from_message(msg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{CommentId, UserId};

    #[test]
    fn events_come_out_in_application_order() {
        let events = decode(
            r#"{"user":{"id":1,"name":"anon"},"edit":{"id":3,"text":"e"},"reply":{"id":2,"parentId":1},"users":[]}"#,
        )
        .unwrap();
        assert_eq!(events.len(), 4);
        assert!(matches!(
            &events[0],
            FeedEvent::Merge(Event::Snapshot { comments: None, users: Some(u) }) if u.is_empty()
        ));
        assert!(matches!(&events[1], FeedEvent::Merge(Event::NewComment(c)) if c.id == CommentId(2)));
        assert!(matches!(&events[2], FeedEvent::Merge(Event::Edited(c)) if c.id == CommentId(3)));
        assert!(matches!(&events[3], FeedEvent::IdentityHint(u) if u.id == UserId(1)));
    }

    #[test]
    fn empty_object_has_no_event() {
        assert!(decode("{}").unwrap().is_empty());
    }

    #[test]
    fn deep_threads_decode() {
        let mut raw = String::from(r#"{"id":300}"#);
        for id in (1..300).rev() {
            raw = format!(r#"{{"id":{id},"embedded":[{raw}]}}"#);
        }
        let events = decode(&format!(r#"{{"comments":[{raw}]}}"#)).unwrap();
        let FeedEvent::Merge(Event::Snapshot { comments: Some(comments), .. }) = &events[0] else {
            panic!("expected a snapshot, got {events:?}");
        };
        let mut depth = 0;
        let mut level = comments;
        while let Some(c) = level.first() {
            depth += 1;
            level = &c.embedded;
        }
        assert_eq!(depth, 300);
    }

    #[test]
    fn trailing_garbage_fails() {
        assert!(decode(r#"{"users":[]} {"#).is_err());
    }

    #[test]
    fn malformed_messages_fail() {
        assert!(decode("not json").is_err());
        assert!(decode("[1, 2]").is_err());
        assert!(decode(r#"{"reply":{"parentId":1}}"#).is_err());
        assert!(decode(r#"{"comments":{"id":1}}"#).is_err());
        // one bad part spoils the whole message
        assert!(decode(r#"{"comments":[],"edit":{"id":"nope"}}"#).is_err());
    }
}
