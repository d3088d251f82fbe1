/// Failures detected by the broker before a request reaches its handler.
///
/// These are never fatal: each one becomes an error envelope in the reply
/// batch and processing continues with the next request. The `Display`
/// strings are part of the wire contract.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("Missing clientId")]
    MissingClientId,
    #[error("Missing subscription")]
    MissingSubscription,
    #[error("Missing channel")]
    MissingChannel,
    #[error("Unknown ClientID")]
    UnknownClient,
}

impl ProtocolError {
    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::MissingClientId => "missing_client_id",
            Self::MissingSubscription => "missing_subscription",
            Self::MissingChannel => "missing_channel",
            Self::UnknownClient => "unknown_client",
        }
    }

    /// True for failures caused by a malformed request rather than by
    /// the state of the session registry.
    pub fn is_structural(&self) -> bool {
        !matches!(self, Self::UnknownClient)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_strings() {
        assert_eq!(ProtocolError::MissingClientId.to_string(), "Missing clientId");
        assert_eq!(ProtocolError::MissingSubscription.to_string(), "Missing subscription");
        assert_eq!(ProtocolError::MissingChannel.to_string(), "Missing channel");
        assert_eq!(ProtocolError::UnknownClient.to_string(), "Unknown ClientID");
    }

    #[test]
    fn structural_classification() {
        assert!(ProtocolError::MissingClientId.is_structural());
        assert!(ProtocolError::MissingSubscription.is_structural());
        assert!(ProtocolError::MissingChannel.is_structural());
        assert!(!ProtocolError::UnknownClient.is_structural());
    }

    #[test]
    fn error_kind_strings() {
        assert_eq!(ProtocolError::UnknownClient.error_kind(), "unknown_client");
        assert_eq!(ProtocolError::MissingChannel.error_kind(), "missing_channel");
    }
}
