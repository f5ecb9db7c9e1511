use serde::{Deserialize, Serialize};

use crate::{Result, SwitchboardError};

/// How the dispatcher fans an envelope out.
///
/// The raw codes are stable: `0` is broadcast, `1` is addressed. Anything else
/// is rejected by [`DeliveryMode::try_from`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeliveryMode {
    /// Deliver to every registered module.
    Broadcast = 0,
    /// Deliver to every registered module whose name equals the addressee.
    Addressed = 1,
}

impl TryFrom<i32> for DeliveryMode {
    type Error = SwitchboardError;

    fn try_from(raw: i32) -> Result<Self> {
        match raw {
            0 => Ok(DeliveryMode::Broadcast),
            1 => Ok(DeliveryMode::Addressed),
            other => Err(SwitchboardError::UnknownDeliveryMode(other)),
        }
    }
}

impl From<DeliveryMode> for i32 {
    fn from(mode: DeliveryMode) -> Self {
        mode as i32
    }
}

/// Immutable message wrapper carried through the dispatch queue.
///
/// An envelope couples a payload with its delivery mode and, for addressed
/// envelopes, the name of the module(s) it is meant for. Once built it cannot
/// be changed; ownership moves to the dispatcher when it is enqueued.
///
/// # Examples
///
/// ```
/// use switchboard_core::{DeliveryMode, Envelope};
///
/// let env = Envelope::addressed("ping", "logger");
/// assert_eq!(env.mode(), DeliveryMode::Addressed);
/// assert_eq!(env.addressee(), Some("logger"));
///
/// let env = Envelope::broadcast("tick");
/// assert_eq!(env.addressee(), None);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    payload: T,
    mode: DeliveryMode,
    addressee: String,
    created_ms: i64,
}

impl<T> Envelope<T> {
    /// Envelope for every registered module.
    pub fn broadcast(payload: T) -> Self {
        Self {
            payload,
            mode: DeliveryMode::Broadcast,
            addressee: String::new(),
            created_ms: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Envelope for the modules named `addressee`.
    pub fn addressed(payload: T, addressee: impl Into<String>) -> Self {
        Self {
            payload,
            mode: DeliveryMode::Addressed,
            addressee: addressee.into(),
            created_ms: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Builds an envelope from a raw mode code, failing fast on codes that do
    /// not name a known delivery mode.
    ///
    /// The addressee is ignored for broadcast envelopes.
    ///
    /// ```
    /// use switchboard_core::{Envelope, SwitchboardError};
    ///
    /// let env = Envelope::from_raw(7u32, 1, "worker").unwrap();
    /// assert_eq!(env.addressee(), Some("worker"));
    ///
    /// let err = Envelope::from_raw(7u32, 9, "").unwrap_err();
    /// assert!(matches!(err, SwitchboardError::UnknownDeliveryMode(9)));
    /// ```
    pub fn from_raw(payload: T, mode: i32, addressee: impl Into<String>) -> Result<Self> {
        Ok(match DeliveryMode::try_from(mode)? {
            DeliveryMode::Broadcast => Self::broadcast(payload),
            DeliveryMode::Addressed => Self::addressed(payload, addressee),
        })
    }

    pub fn payload(&self) -> &T {
        &self.payload
    }

    pub fn into_payload(self) -> T {
        self.payload
    }

    pub fn mode(&self) -> DeliveryMode {
        self.mode
    }

    /// The target name, only for addressed envelopes.
    pub fn addressee(&self) -> Option<&str> {
        match self.mode {
            DeliveryMode::Addressed => Some(&self.addressee),
            DeliveryMode::Broadcast => None,
        }
    }

    /// Creation timestamp in milliseconds since epoch.
    pub fn created_ms(&self) -> i64 {
        self.created_ms
    }
}

/// General purpose payload: a command word with optional structured data.
///
/// Hosts that do not need a dedicated message type can run a launcher over
/// `Command` and match on [`Command::command`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl Command {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            data: None,
        }
    }

    pub fn with_data(command: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            command: command.into(),
            data: Some(data),
        }
    }

    pub fn is(&self, command: &str) -> bool {
        self.command == command
    }
}
