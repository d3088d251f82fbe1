//! The in-memory publish/subscribe core: sessions, channels, and the
//! dispatcher that applies handshake/connect/subscribe/unsubscribe/
//! disconnect/publish requests to them.

pub mod broker;
pub mod channel;
pub mod session;

pub use broker::{Broker, BrokerConfig};
pub use channel::Channel;
pub use session::Session;
