//! Reserved `/meta/*` destinations.

pub const HANDSHAKE: &str = "/meta/handshake";
pub const CONNECT: &str = "/meta/connect";
pub const SUBSCRIBE: &str = "/meta/subscribe";
pub const UNSUBSCRIBE: &str = "/meta/unsubscribe";
pub const DISCONNECT: &str = "/meta/disconnect";

/// A protocol operation addressed by its meta channel.
///
/// Matching is exact and case-sensitive; anything else (including other
/// `/meta/...` names) is an application publish.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MetaChannel {
    Handshake,
    Connect,
    Subscribe,
    Unsubscribe,
    Disconnect,
}

impl MetaChannel {
    pub fn parse(channel: &str) -> Option<Self> {
        match channel {
            HANDSHAKE => Some(Self::Handshake),
            CONNECT => Some(Self::Connect),
            SUBSCRIBE => Some(Self::Subscribe),
            UNSUBSCRIBE => Some(Self::Unsubscribe),
            DISCONNECT => Some(Self::Disconnect),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Handshake => HANDSHAKE,
            Self::Connect => CONNECT,
            Self::Subscribe => SUBSCRIBE,
            Self::Unsubscribe => UNSUBSCRIBE,
            Self::Disconnect => DISCONNECT,
        }
    }
}
