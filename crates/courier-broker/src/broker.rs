//! Session and channel registries plus the meta-protocol dispatcher.

use std::sync::Arc;
use std::time::Duration;

use courier_core::{Advice, ClientId, IdGenerator, Message, MetaChannel, ProtocolError, UuidGenerator};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;

use crate::channel::Channel;
use crate::session::Session;

/// Re-draws allowed when the id generator collides with a live session.
const MAX_ID_ATTEMPTS: usize = 16;

/// Broker tuning.
#[derive(Clone, Copy, Debug)]
pub struct BrokerConfig {
    /// Advice used when neither the request nor the session carries one.
    pub default_advice: Advice,
    /// Upper bound on how long an idle connect is parked by
    /// [`Broker::handle_async`]. Zero answers every connect immediately.
    pub max_hold: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            default_advice: Advice::default(),
            max_hold: Duration::from_secs(10),
        }
    }
}

/// A validated request, with its session already resolved.
enum Route {
    Handshake,
    Connect(Arc<Session>),
    Subscribe(Arc<Session>, String),
    Unsubscribe(Arc<Session>, String),
    Disconnect(Arc<Session>),
    Publish(Arc<Session>),
}

/// Owns every session and channel and answers protocol requests.
///
/// Both registries are sharded concurrent maps; a lookup clones the `Arc`
/// out and releases the shard before the entity is touched. The
/// `membership` gate is taken shared by anything that reads or changes
/// channel membership and exclusively by disconnect, so a disconnect is
/// observed either entirely or not at all.
pub struct Broker {
    sessions: DashMap<ClientId, Arc<Session>>,
    channels: DashMap<String, Arc<Channel>>,
    membership: RwLock<()>,
    ids: Arc<dyn IdGenerator>,
    config: BrokerConfig,
}

impl Broker {
    pub fn new(config: BrokerConfig) -> Self {
        Self::with_id_generator(config, Arc::new(UuidGenerator))
    }

    pub fn with_id_generator(config: BrokerConfig, ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            sessions: DashMap::new(),
            channels: DashMap::new(),
            membership: RwLock::new(()),
            ids,
            config,
        }
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn session(&self, id: &ClientId) -> Option<Arc<Session>> {
        self.sessions.get(id).map(|s| Arc::clone(s.value()))
    }

    pub fn channel(&self, name: &str) -> Option<Arc<Channel>> {
        self.channels.get(name).map(|c| Arc::clone(c.value()))
    }

    /// Register a session under `id`, or return the one already there.
    pub fn register_session(&self, id: ClientId) -> Arc<Session> {
        let session = self
            .sessions
            .entry(id.clone())
            .or_insert_with(|| Arc::new(Session::new(id)));
        Arc::clone(session.value())
    }

    /// Look up `name`, creating an empty channel on first use.
    pub fn channel_or_create(&self, name: &str) -> Arc<Channel> {
        if let Some(channel) = self.channel(name) {
            return channel;
        }
        let channel = self
            .channels
            .entry(name.to_owned())
            .or_insert_with(|| Arc::new(Channel::new(name)));
        Arc::clone(channel.value())
    }

    /// Answer one request without waiting.
    ///
    /// Always produces a reply today; the `Option` leaves room for
    /// operations that answer nothing.
    pub fn handle(&self, message: &Message) -> Option<Message> {
        let reply = self
            .route(message)
            .and_then(|route| self.dispatch(message, route))
            .unwrap_or_else(|error| self.error_reply(message, &error));
        Some(reply)
    }

    /// Like [`Broker::handle`], but a valid connect that finds nothing queued
    /// is parked until a delivery arrives, the session disconnects, or the
    /// hold time runs out. Dropping the future abandons the park.
    pub async fn handle_async(&self, message: &Message) -> Option<Message> {
        if let Ok(Route::Connect(session)) = self.route(message) {
            let hold = self
                .effective_advice(message, Some(&*session))
                .timeout
                .min(self.config.max_hold);
            if !hold.is_zero() && !session.wait_for_message(hold).await {
                tracing::trace!(client_id = %session.id(), ?hold, "connect hold expired");
            }
        }
        self.handle(message)
    }

    /// Answer a batch in order, keeping every reply that was produced.
    pub async fn handle_batch(&self, messages: Vec<Message>) -> Vec<Message> {
        let mut replies = Vec::with_capacity(messages.len());
        for message in &messages {
            if let Some(reply) = self.handle_async(message).await {
                replies.push(reply);
            }
        }
        replies
    }

    fn route(&self, message: &Message) -> Result<Route, ProtocolError> {
        let meta = MetaChannel::parse(&message.channel);
        if meta == Some(MetaChannel::Handshake) {
            return Ok(Route::Handshake);
        }

        let client_id = message.client().ok_or(ProtocolError::MissingClientId)?;
        let target = match meta {
            Some(MetaChannel::Subscribe | MetaChannel::Unsubscribe) => Some(
                message
                    .subscription_target()
                    .ok_or(ProtocolError::MissingSubscription)?
                    .to_owned(),
            ),
            None if message.channel.is_empty() => return Err(ProtocolError::MissingChannel),
            _ => None,
        };
        let session = self.session(client_id).ok_or(ProtocolError::UnknownClient)?;

        Ok(match (meta, target) {
            (Some(MetaChannel::Connect), _) => Route::Connect(session),
            (Some(MetaChannel::Disconnect), _) => Route::Disconnect(session),
            (Some(MetaChannel::Subscribe), Some(target)) => Route::Subscribe(session, target),
            (Some(MetaChannel::Unsubscribe), Some(target)) => Route::Unsubscribe(session, target),
            _ => Route::Publish(session),
        })
    }

    fn dispatch(&self, message: &Message, route: Route) -> Result<Message, ProtocolError> {
        match route {
            Route::Handshake => Ok(self.handshake(message)),
            Route::Connect(session) => self.connect(message, &session),
            Route::Subscribe(session, target) => self.subscribe(message, &session, &target),
            Route::Unsubscribe(session, target) => self.unsubscribe(message, &session, &target),
            Route::Disconnect(session) => self.disconnect(message, &session),
            Route::Publish(session) => self.publish(message, &session),
        }
    }

    fn handshake(&self, message: &Message) -> Message {
        let session = self.mint_session();
        if let Some(advice) = message.advice {
            session.set_advice(advice);
        }
        tracing::info!(client_id = %session.id(), "client handshake");

        message
            .reply(MetaChannel::Handshake.as_str())
            .with_client_id(session.id().clone())
            .with_successful(true)
            .with_advice(self.effective_advice(message, None))
    }

    fn mint_session(&self) -> Arc<Session> {
        for _ in 0..MAX_ID_ATTEMPTS {
            match self.sessions.entry(self.ids.generate()) {
                Entry::Vacant(slot) => {
                    let session = Arc::new(Session::new(slot.key().clone()));
                    slot.insert(Arc::clone(&session));
                    return session;
                }
                Entry::Occupied(taken) => {
                    tracing::warn!(client_id = %taken.key(), "generated client id already registered");
                }
            }
        }
        // The generator keeps colliding; a fresh UUIDv7 cannot.
        self.register_session(ClientId::new())
    }

    fn connect(&self, message: &Message, session: &Session) -> Result<Message, ProtocolError> {
        if let Some(delivery) = session.next_message() {
            return Ok(delivery);
        }
        if session.is_closed() {
            return Err(ProtocolError::UnknownClient);
        }
        Ok(message
            .reply(MetaChannel::Connect.as_str())
            .with_client_id(session.id().clone())
            .with_advice(self.effective_advice(message, Some(session))))
    }

    fn subscribe(&self, message: &Message, session: &Arc<Session>, target: &str) -> Result<Message, ProtocolError> {
        {
            let _membership = self.membership.read();
            if session.is_closed() {
                return Err(ProtocolError::UnknownClient);
            }
            self.channel_or_create(target).subscribe(session);
            session.subscribe(target);
        }
        tracing::debug!(client_id = %session.id(), channel = target, "subscribed");

        Ok(message
            .reply(MetaChannel::Subscribe.as_str())
            .with_subscription(target)
            .with_successful(true))
    }

    fn unsubscribe(&self, message: &Message, session: &Session, target: &str) -> Result<Message, ProtocolError> {
        {
            let _membership = self.membership.read();
            if session.is_closed() {
                return Err(ProtocolError::UnknownClient);
            }
            if let Some(channel) = self.channel(target) {
                channel.unsubscribe(session);
            }
            session.unsubscribe(target);
        }
        tracing::debug!(client_id = %session.id(), channel = target, "unsubscribed");

        Ok(message
            .reply(MetaChannel::Unsubscribe.as_str())
            .with_subscription(target)
            .with_successful(true))
    }

    fn disconnect(&self, message: &Message, session: &Session) -> Result<Message, ProtocolError> {
        let undelivered = {
            let _membership = self.membership.write();
            if self.sessions.remove(session.id()).is_none() {
                // Lost a race with another disconnect for the same client.
                return Err(ProtocolError::UnknownClient);
            }
            for name in session.subscriptions() {
                if let Some(channel) = self.channel(&name) {
                    channel.unsubscribe(session);
                }
            }
            session.close()
        };
        tracing::info!(
            client_id = %session.id(),
            undelivered = undelivered.len(),
            "client disconnected"
        );

        Ok(message.reply(MetaChannel::Disconnect.as_str()).with_successful(true))
    }

    fn publish(&self, message: &Message, session: &Session) -> Result<Message, ProtocolError> {
        let delivered = {
            let _membership = self.membership.read();
            if session.is_closed() {
                return Err(ProtocolError::UnknownClient);
            }
            self.channel_or_create(&message.channel).publish(message)
        };
        tracing::debug!(
            client_id = %session.id(),
            channel = %message.channel,
            delivered,
            "published"
        );

        Ok(message.reply(message.channel.clone()).with_successful(true))
    }

    /// Request override, else the session's stored advice, else the default.
    fn effective_advice(&self, message: &Message, session: Option<&Session>) -> Advice {
        message
            .advice
            .or_else(|| session.and_then(Session::advice))
            .unwrap_or(self.config.default_advice)
    }

    fn error_reply(&self, message: &Message, error: &ProtocolError) -> Message {
        tracing::debug!(
            channel = %message.channel,
            error_kind = error.error_kind(),
            structural = error.is_structural(),
            "rejected request"
        );
        let mut reply = Message::error_reply(message.channel.clone(), message.id.clone(), error);
        reply.advice = Some(self.config.default_advice);
        reply
    }
}

impl Default for Broker {
    fn default() -> Self {
        Self::new(BrokerConfig::default())
    }
}
