use std::collections::HashMap;
use std::sync::Arc;

use courier_core::{ClientId, Message};
use parking_lot::Mutex;

use crate::session::Session;

/// A named destination and the sessions subscribed to it.
pub struct Channel {
    name: String,
    subscribers: Mutex<HashMap<ClientId, Arc<Session>>>,
}

impl Channel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            subscribers: Mutex::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a subscriber. Returns false if it was already present.
    pub fn subscribe(&self, session: &Arc<Session>) -> bool {
        self.subscribers
            .lock()
            .insert(session.id().clone(), Arc::clone(session))
            .is_none()
    }

    /// Remove a subscriber. Returns false if it was not present.
    pub fn unsubscribe(&self, session: &Session) -> bool {
        self.subscribers.lock().remove(session.id()).is_some()
    }

    pub fn is_subscribed(&self, client_id: &ClientId) -> bool {
        self.subscribers.lock().contains_key(client_id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Enqueue a copy of `message` on every current subscriber and return
    /// how many received it.
    ///
    /// The subscriber set is snapshotted first and the channel lock released
    /// before any session is touched, so one busy session never holds up
    /// delivery to the rest.
    pub fn publish(&self, message: &Message) -> usize {
        let targets: Vec<Arc<Session>> = self.subscribers.lock().values().cloned().collect();
        for session in &targets {
            session.enqueue(message.clone());
        }
        targets.len()
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("name", &self.name)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn session(id: &str) -> Arc<Session> {
        Arc::new(Session::new(ClientId::from_raw(id)))
    }

    #[test]
    fn subscribe_is_idempotent() {
        let ch = Channel::new("/foo");
        let s = session("a");
        assert!(ch.subscribe(&s));
        assert!(!ch.subscribe(&s));
        assert_eq!(ch.subscriber_count(), 1);
        assert!(ch.is_subscribed(s.id()));
    }

    #[test]
    fn unsubscribe_removes() {
        let ch = Channel::new("/foo");
        let s = session("a");
        ch.subscribe(&s);
        assert!(ch.unsubscribe(&s));
        assert!(!ch.unsubscribe(&s));
        assert!(!ch.is_subscribed(s.id()));
    }

    #[test]
    fn publish_reaches_every_subscriber_once() {
        let ch = Channel::new("/foo");
        let subs: Vec<_> = ["a", "b", "c"].into_iter().map(session).collect();
        for s in &subs {
            ch.subscribe(s);
        }
        let outsider = session("d");

        let data = json!({"msg": "hello"}).as_object().cloned().unwrap();
        let message = Message::new("/foo").with_id("m1").with_data(data.clone());
        assert_eq!(ch.publish(&message), 3);

        for s in &subs {
            let queued = s.drain_all();
            assert_eq!(queued.len(), 1);
            assert_eq!(queued[0].channel, "/foo");
            assert_eq!(queued[0].id.as_deref(), Some("m1"));
            assert_eq!(queued[0].data.as_ref(), Some(&data));
        }
        assert_eq!(outsider.pending(), 0);
    }

    #[test]
    fn publish_with_no_subscribers() {
        let ch = Channel::new("/empty");
        assert_eq!(ch.publish(&Message::new("/empty")), 0);
    }
}
