use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::ProtocolError;
use crate::ids::ClientId;

/// Reconnection strategy advertised to clients.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reconnect {
    #[default]
    Retry,
    Handshake,
    None,
}

/// Reconnection guidance attached to handshake/connect replies.
///
/// Durations travel as integer milliseconds. Missing fields take the
/// default values, so `{"reconnect":"none"}` is a complete advice.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Advice {
    pub reconnect: Reconnect,
    #[serde(with = "duration_ms")]
    pub interval: Duration,
    #[serde(with = "duration_ms")]
    pub timeout: Duration,
}

impl Default for Advice {
    fn default() -> Self {
        Self {
            reconnect: Reconnect::Retry,
            interval: Duration::ZERO,
            timeout: Duration::from_secs(10),
        }
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis().min(u128::from(u64::MAX)) as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// The protocol envelope, in both directions.
///
/// Field names are the interoperable wire names. Absent optionals are
/// omitted on output; `successful` is tri-state (absent / true / false).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(default)]
    pub channel: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<ClientId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub successful: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advice: Option<Advice>,
}

impl Message {
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            ..Self::default()
        }
    }

    pub fn with_client_id(mut self, client_id: ClientId) -> Self {
        self.client_id = Some(client_id);
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_subscription(mut self, subscription: impl Into<String>) -> Self {
        self.subscription = Some(subscription.into());
        self
    }

    pub fn with_advice(mut self, advice: Advice) -> Self {
        self.advice = Some(advice);
        self
    }

    pub fn with_successful(mut self, successful: bool) -> Self {
        self.successful = Some(successful);
        self
    }

    /// The sender's client id; an empty string counts as absent.
    pub fn client(&self) -> Option<&ClientId> {
        self.client_id.as_ref().filter(|id| !id.is_empty())
    }

    /// The subscribe/unsubscribe target; an empty string counts as absent.
    pub fn subscription_target(&self) -> Option<&str> {
        self.subscription.as_deref().filter(|s| !s.is_empty())
    }

    /// A reply skeleton on `channel` that echoes this message's correlation id.
    pub fn reply(&self, channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            id: self.id.clone(),
            ..Self::default()
        }
    }

    /// The uniform failure envelope: channel and id echoed, `successful`
    /// false, the error text, and default advice.
    pub fn error_reply(channel: impl Into<String>, id: Option<String>, error: &ProtocolError) -> Self {
        Self {
            channel: channel.into(),
            id,
            successful: Some(false),
            error: Some(error.to_string()),
            advice: Some(Advice::default()),
            ..Self::default()
        }
    }

    pub fn is_successful(&self) -> bool {
        self.successful == Some(true)
    }
}
