use serde::{Deserialize, Serialize};

/// Opaque failure reported by the underlying channel.
///
/// Carried verbatim from the channel's error callbacks and finished events to
/// the caller; the coordination layer never reinterprets it.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, thiserror::Error)]
#[error("channel error {code}: {message}")]
pub struct ChannelError {
    pub code: i64,
    pub message: String,
}

impl ChannelError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }
}

/// Errors returned by session operations.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("session is not activated")]
    SessionNotActivated,

    #[error("counterpart is not reachable")]
    CounterpartNotReachable,

    #[error("transport error: {0}")]
    Transport(#[from] ChannelError),

    #[error("session channel is not supported on this device")]
    Unsupported,

    #[error("event subscriber lagged, {skipped} events skipped")]
    Lagged { skipped: u64 },

    #[error("session closed before the operation settled")]
    Closed,

    #[error("invalid session config: {0}")]
    InvalidConfig(String),
}

impl SessionError {
    /// Returns `true` for readiness failures that may succeed once the
    /// session comes back.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::SessionNotActivated | Self::CounterpartNotReachable)
    }

    /// The channel error behind a `Transport` failure, if any.
    pub fn channel_error(&self) -> Option<&ChannelError> {
        match self {
            Self::Transport(err) => Some(err),
            _ => None,
        }
    }
}

/// Errors raised while loading or validating a [`SessionConfig`](crate::SessionConfig).
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config field `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}
