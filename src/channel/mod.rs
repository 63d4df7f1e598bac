//! The private channel between the engine and its bridge.
//!
//! Both sides share a [`ChannelToken`] delivered out of band. All event names
//! are derived from a fixed prefix plus that token, so other scripts on the
//! page can neither address the engine nor listen to its state.
//!
//! | direction       | name                       | detail           |
//! |-----------------|----------------------------|------------------|
//! | bridge → engine | `{prefix}:{token}:command` | [`Command`] JSON |
//! | engine → bridge | `{prefix}:{token}:ready`   | `{}`             |
//! | engine → bridge | `{prefix}:{token}:state`   | snapshot JSON    |

mod token;
mod transport;

pub use token::ChannelToken;
pub use transport::{ChannelMessage, ChannelTransport, Transport};

use serde::{Deserialize, Serialize};

use crate::volume::{VolumeMethod, VolumeSetting};
use crate::ChannelError;

/// The three event names of one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelNames {
    command: String,
    ready: String,
    state: String,
}

impl ChannelNames {
    /// Derives the event names for a prefix and token.
    ///
    /// # Example
    ///
    /// ```
    /// use page_audio::{ChannelNames, ChannelToken};
    ///
    /// let token = ChannelToken::from_string("abc").unwrap();
    /// let names = ChannelNames::new("page-audio", &token);
    /// assert_eq!(names.state(), "page-audio:abc:state");
    /// ```
    pub fn new(prefix: &str, token: &ChannelToken) -> Self {
        let scoped = |suffix: &str| format!("{prefix}:{}:{suffix}", token.as_str());
        Self {
            command: scoped("command"),
            ready: scoped("ready"),
            state: scoped("state"),
        }
    }

    /// Bridge → engine commands.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Engine → bridge one-time readiness signal.
    pub fn ready(&self) -> &str {
        &self.ready
    }

    /// Engine → bridge state snapshots.
    pub fn state(&self) -> &str {
        &self.state
    }
}

/// A volume percentage as the bridge stores it: a number or a numeric string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Percent {
    /// `150`
    Number(f64),
    /// `"150"` or `"150%"`
    Text(String),
}

impl Percent {
    /// Parses the percentage. Non-finite values are rejected.
    pub fn value(&self) -> Result<f64, ChannelError> {
        let value = match self {
            Self::Number(n) => *n,
            Self::Text(s) => s
                .trim()
                .trim_end_matches('%')
                .trim()
                .parse::<f64>()
                .map_err(|_| ChannelError::InvalidLevel(s.clone()))?,
        };
        if value.is_finite() {
            Ok(value)
        } else {
            Err(ChannelError::InvalidLevel(value.to_string()))
        }
    }
}

impl From<f64> for Percent {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

/// Commands accepted by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Command {
    /// Change the volume. `level` is a percentage (100 = unity).
    SetVolume {
        /// Requested level in percent.
        level: Percent,
        /// How to apply it. Defaults to [`VolumeMethod::Both`].
        #[serde(default)]
        method: VolumeMethod,
    },
    /// Whether newly discovered media re-apply the last volume.
    SetPersist {
        /// New persist flag.
        enabled: bool,
    },
    /// Recompute and broadcast state now, bypassing deduplication.
    GetState,
}

impl Command {
    /// Decodes a command payload.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Malformed`] for anything that is not a known
    /// command, and [`ChannelError::InvalidLevel`] for unusable levels.
    pub fn decode(payload: &str) -> Result<Self, ChannelError> {
        let command: Self = serde_json::from_str(payload)?;
        if let Self::SetVolume { level, .. } = &command {
            level.value()?;
        }
        Ok(command)
    }

    /// Encodes the command as a JSON payload.
    pub fn encode(&self) -> Result<String, ChannelError> {
        Ok(serde_json::to_string(self)?)
    }

    /// The volume setting carried by a `SetVolume` command.
    pub fn volume_setting(&self) -> Option<VolumeSetting> {
        match self {
            Self::SetVolume { level, method } => level
                .value()
                .ok()
                .map(|percent| VolumeSetting::from_percent(percent, *method)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_token_scoped() {
        let a = ChannelNames::new("p", &ChannelToken::from_string("one").unwrap());
        let b = ChannelNames::new("p", &ChannelToken::from_string("two").unwrap());
        assert_eq!(a.command(), "p:one:command");
        assert_eq!(a.ready(), "p:one:ready");
        assert_ne!(a.command(), b.command());
    }

    #[test]
    fn test_decode_set_volume() {
        let command = Command::decode(r#"{"type":"set-volume","level":300,"method":"both"}"#).unwrap();
        let setting = command.volume_setting().unwrap();
        assert_eq!(setting.level, 3.0);
        assert_eq!(setting.method, VolumeMethod::Both);
    }

    #[test]
    fn test_decode_string_level_and_default_method() {
        let command = Command::decode(r#"{"type":"set-volume","level":"150%"}"#).unwrap();
        let setting = command.volume_setting().unwrap();
        assert_eq!(setting.level, 1.5);
        assert_eq!(setting.method, VolumeMethod::Both);
    }

    #[test]
    fn test_decode_other_commands() {
        assert_eq!(
            Command::decode(r#"{"type":"set-persist","enabled":true}"#).unwrap(),
            Command::SetPersist { enabled: true }
        );
        assert_eq!(
            Command::decode(r#"{"type":"get-state"}"#).unwrap(),
            Command::GetState
        );
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            Command::decode("not json"),
            Err(ChannelError::Malformed(_))
        ));
        assert!(matches!(
            Command::decode(r#"{"type":"self-destruct"}"#),
            Err(ChannelError::Malformed(_))
        ));
        assert!(matches!(
            Command::decode(r#"{"type":"set-volume","level":"loud"}"#),
            Err(ChannelError::InvalidLevel(_))
        ));
    }

    #[test]
    fn test_encode_uses_wire_names() {
        let payload = Command::SetVolume {
            level: 250.0.into(),
            method: VolumeMethod::NativeOnly,
        }
        .encode()
        .unwrap();
        assert!(payload.contains("\"type\":\"set-volume\""));
        assert!(payload.contains("\"method\":\"native\""));
    }
}
