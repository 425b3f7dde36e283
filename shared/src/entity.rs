//! Entity-facing types shared with the host framework
//!
//! Each TV is exposed as two entities: a media player facet and a remote
//! facet. Both derive their on/off state from the same power flag.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Entity id prefix for the media player facet
pub const MEDIA_PLAYER_PREFIX: &str = "media_player";

/// Entity id prefix for the remote facet
pub const REMOTE_PREFIX: &str = "remote";

/// Flat attribute mapping carried by an update event
pub type AttributeMap = Map<String, Value>;

/// Result code returned to the host for every command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusCode {
    Ok,
    BadRequest,
    ServerError,
    NotImplemented,
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusCode::Ok => write!(f, "OK"),
            StatusCode::BadRequest => write!(f, "BAD_REQUEST"),
            StatusCode::ServerError => write!(f, "SERVER_ERROR"),
            StatusCode::NotImplemented => write!(f, "NOT_IMPLEMENTED"),
        }
    }
}

/// Externally visible power state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PowerState {
    On,
    Off,
}

impl From<bool> for PowerState {
    fn from(power: bool) -> Self {
        if power {
            PowerState::On
        } else {
            PowerState::Off
        }
    }
}

/// Attributes of the media player facet
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerAttributes {
    pub state: PowerState,
    pub volume: u8,
    pub muted: bool,
    pub source: String,
    pub source_list: Vec<String>,
}

/// Attributes of the remote facet
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemoteAttributes {
    pub state: PowerState,
}

/// What part of the entity an update replaces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateKind {
    /// State attributes such as power and volume
    Attributes,
    /// Entity options such as the remote's advertised commands and pages
    Options,
}

/// An update event for one entity
#[derive(Debug, Clone, PartialEq)]
pub struct EntityUpdate {
    pub entity_id: String,
    pub kind: UpdateKind,
    /// Attribute map, or the options map for `UpdateKind::Options`
    pub attributes: AttributeMap,
}

impl EntityUpdate {
    /// Build an attribute update from any serializable attribute struct
    pub fn new(entity_id: impl Into<String>, attributes: &impl Serialize) -> Self {
        Self::build(entity_id.into(), UpdateKind::Attributes, attributes)
    }

    /// Build an options update
    pub fn options(entity_id: impl Into<String>, options: &impl Serialize) -> Self {
        Self::build(entity_id.into(), UpdateKind::Options, options)
    }

    fn build(entity_id: String, kind: UpdateKind, payload: &impl Serialize) -> Self {
        let attributes = match serde_json::to_value(payload) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };

        Self {
            entity_id,
            kind,
            attributes,
        }
    }

    pub fn is_options(&self) -> bool {
        self.kind == UpdateKind::Options
    }

    /// The `state` attribute, if present
    pub fn state(&self) -> Option<&str> {
        self.attributes.get("state").and_then(Value::as_str)
    }
}

/// Entity id of the media player facet for a device
pub fn media_player_entity_id(device_id: &str) -> String {
    format!("{}.{}", MEDIA_PLAYER_PREFIX, device_id)
}

/// Entity id of the remote facet for a device
pub fn remote_entity_id(device_id: &str) -> String {
    format!("{}.{}", REMOTE_PREFIX, device_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_wire_names() {
        assert_eq!(
            serde_json::to_value(StatusCode::BadRequest).unwrap(),
            Value::String("BAD_REQUEST".into())
        );
        assert_eq!(StatusCode::NotImplemented.to_string(), "NOT_IMPLEMENTED");
    }

    #[test]
    fn test_player_update_is_flat() {
        let attrs = PlayerAttributes {
            state: PowerState::On,
            volume: 12,
            muted: false,
            source: "Netflix".into(),
            source_list: vec!["Netflix".into(), "YouTube".into()],
        };
        let update = EntityUpdate::new(media_player_entity_id("viera_1"), &attrs);

        assert_eq!(update.entity_id, "media_player.viera_1");
        assert_eq!(update.state(), Some("ON"));
        assert_eq!(update.attributes["volume"], 12);
        assert_eq!(update.attributes["muted"], false);
        assert_eq!(update.attributes["source"], "Netflix");
        assert_eq!(update.attributes["source_list"][1], "YouTube");
    }

    #[test]
    fn test_remote_update() {
        let update = EntityUpdate::new(
            remote_entity_id("viera_1"),
            &RemoteAttributes {
                state: PowerState::from(false),
            },
        );
        assert_eq!(update.entity_id, "remote.viera_1");
        assert_eq!(update.state(), Some("OFF"));
        assert_eq!(update.attributes.len(), 1);
        assert!(!update.is_options());
    }

    #[test]
    fn test_options_update() {
        let options = serde_json::json!({"simple_commands": ["HOME", "APP_NETFLIX"]});
        let update = EntityUpdate::options(remote_entity_id("viera_1"), &options);

        assert_eq!(update.kind, UpdateKind::Options);
        assert!(update.is_options());
        assert_eq!(update.state(), None);
        assert_eq!(update.attributes["simple_commands"][1], "APP_NETFLIX");
    }
}
