pub mod errors;
pub mod ids;
pub mod message;
pub mod meta;

pub use errors::ProtocolError;
pub use ids::{ClientId, IdGenerator, UuidGenerator};
pub use message::{Advice, Message, Reconnect};
pub use meta::MetaChannel;
