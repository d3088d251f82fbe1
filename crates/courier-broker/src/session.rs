use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use courier_core::{Advice, ClientId, Message};
use parking_lot::Mutex;
use tokio::sync::Notify;

/// Per-client state: subscriptions, pending deliveries, advice override.
///
/// All state sits behind one mutex owned by the session; callers only go
/// through these methods. A closed session has been dropped from the broker
/// and never delivers again.
pub struct Session {
    id: ClientId,
    state: Mutex<SessionState>,
    arrivals: Notify,
}

#[derive(Default)]
struct SessionState {
    subscriptions: HashSet<String>,
    queue: VecDeque<Message>,
    advice: Option<Advice>,
    closed: bool,
}

impl Session {
    pub fn new(id: ClientId) -> Self {
        Self {
            id,
            state: Mutex::new(SessionState::default()),
            arrivals: Notify::new(),
        }
    }

    pub fn id(&self) -> &ClientId {
        &self.id
    }

    /// Record interest in `channel`. Returns false if already subscribed.
    pub fn subscribe(&self, channel: &str) -> bool {
        self.state.lock().subscriptions.insert(channel.to_owned())
    }

    /// Drop interest in `channel`. Returns false if it was not subscribed.
    pub fn unsubscribe(&self, channel: &str) -> bool {
        self.state.lock().subscriptions.remove(channel)
    }

    pub fn is_subscribed(&self, channel: &str) -> bool {
        self.state.lock().subscriptions.contains(channel)
    }

    /// Snapshot of subscribed channel names, in no particular order.
    pub fn subscriptions(&self) -> Vec<String> {
        self.state.lock().subscriptions.iter().cloned().collect()
    }

    /// Append a delivery and wake any parked connect.
    pub fn enqueue(&self, message: Message) {
        self.state.lock().queue.push_back(message);
        self.arrivals.notify_waiters();
    }

    /// Pop the oldest pending delivery.
    pub fn next_message(&self) -> Option<Message> {
        self.state.lock().queue.pop_front()
    }

    /// Take every pending delivery, oldest first, leaving the queue empty.
    pub fn drain_all(&self) -> Vec<Message> {
        self.state.lock().queue.drain(..).collect()
    }

    pub fn pending(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub fn set_advice(&self, advice: Advice) {
        self.state.lock().advice = Some(advice);
    }

    pub fn advice(&self) -> Option<Advice> {
        self.state.lock().advice
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Mark the session closed, forget its subscriptions, and discard its
    /// queue in one step. Parked connects are woken. Returns the messages
    /// that were never delivered.
    pub(crate) fn close(&self) -> Vec<Message> {
        let undelivered = {
            let mut state = self.state.lock();
            state.closed = true;
            state.subscriptions.clear();
            state.queue.drain(..).collect()
        };
        self.arrivals.notify_waiters();
        undelivered
    }

    /// Park until a delivery is pending, the session closes, or `hold`
    /// elapses. Returns false on timeout.
    ///
    /// The waiter is registered before the queue is inspected, so an
    /// enqueue racing with this call is never missed.
    pub async fn wait_for_message(&self, hold: Duration) -> bool {
        let notified = self.arrivals.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        {
            let state = self.state.lock();
            if !state.queue.is_empty() || state.closed {
                return true;
            }
        }

        tokio::time::timeout(hold, notified).await.is_ok()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("subscriptions", &state.subscriptions.len())
            .field("pending", &state.queue.len())
            .field("closed", &state.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn session() -> Session {
        Session::new(ClientId::from_raw("c1"))
    }

    fn msg(n: u32) -> Message {
        Message::new("/foo").with_id(n.to_string())
    }

    #[test]
    fn subscribe_and_unsubscribe() {
        let s = session();
        assert!(s.subscribe("/foo"));
        assert!(!s.subscribe("/foo"));
        assert!(s.is_subscribed("/foo"));
        assert!(!s.is_subscribed("/bar"));

        assert!(s.unsubscribe("/foo"));
        assert!(!s.unsubscribe("/foo"));
        assert!(!s.is_subscribed("/foo"));
        assert!(s.subscriptions().is_empty());
    }

    #[test]
    fn drain_all_returns_in_order_then_empty() {
        let s = session();
        s.enqueue(msg(1));
        s.enqueue(msg(2));
        s.enqueue(msg(3));

        let drained: Vec<_> = s.drain_all().into_iter().filter_map(|m| m.id).collect();
        assert_eq!(drained, vec!["1", "2", "3"]);
        assert!(s.drain_all().is_empty());
        assert_eq!(s.pending(), 0);
    }

    #[test]
    fn next_message_is_fifo() {
        let s = session();
        s.enqueue(msg(1));
        s.enqueue(msg(2));
        assert_eq!(s.next_message().and_then(|m| m.id).as_deref(), Some("1"));
        assert_eq!(s.next_message().and_then(|m| m.id).as_deref(), Some("2"));
        assert!(s.next_message().is_none());
    }

    #[test]
    fn advice_round_trip() {
        let s = session();
        assert!(s.advice().is_none());
        let advice = Advice {
            timeout: Duration::from_secs(3),
            ..Advice::default()
        };
        s.set_advice(advice);
        assert_eq!(s.advice(), Some(advice));
    }

    #[test]
    fn close_discards_everything() {
        let s = session();
        s.subscribe("/foo");
        s.enqueue(msg(1));
        let undelivered = s.close();
        assert_eq!(undelivered.len(), 1);
        assert!(s.is_closed());
        assert!(s.subscriptions().is_empty());
        assert_eq!(s.pending(), 0);
    }

    #[test]
    fn concurrent_enqueue_and_drain_lose_nothing() {
        let s = Arc::new(session());
        let producers: Vec<_> = (0..4)
            .map(|p| {
                let s = Arc::clone(&s);
                std::thread::spawn(move || {
                    for i in 0..250 {
                        s.enqueue(msg(p * 1000 + i));
                    }
                })
            })
            .collect();

        let mut seen = Vec::new();
        while producers.iter().any(|h| !h.is_finished()) {
            seen.extend(s.drain_all());
        }
        for handle in producers {
            handle.join().unwrap();
        }
        seen.extend(s.drain_all());

        let mut ids: Vec<String> = seen.into_iter().filter_map(|m| m.id).collect();
        assert_eq!(ids.len(), 1000);
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 1000);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_returns_immediately_when_pending() {
        let s = session();
        s.enqueue(msg(1));
        assert!(s.wait_for_message(Duration::from_secs(30)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_times_out_when_idle() {
        let s = session();
        let start = tokio::time::Instant::now();
        assert!(!s.wait_for_message(Duration::from_secs(5)).await);
        assert!(start.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_wakes_on_enqueue() {
        let s = Arc::new(session());
        let waiter = {
            let s = Arc::clone(&s);
            tokio::spawn(async move { s.wait_for_message(Duration::from_secs(60)).await })
        };
        tokio::task::yield_now().await;
        s.enqueue(msg(1));
        assert!(waiter.await.unwrap());
        assert_eq!(s.pending(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_wakes_on_close() {
        let s = Arc::new(session());
        let waiter = {
            let s = Arc::clone(&s);
            tokio::spawn(async move { s.wait_for_message(Duration::from_secs(60)).await })
        };
        tokio::task::yield_now().await;
        let _ = s.close();
        assert!(waiter.await.unwrap());
    }
}
