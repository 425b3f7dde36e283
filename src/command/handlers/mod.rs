//! Command handlers for the two entity facets

mod media_player;
mod remote;

pub use media_player::handle_media_player_command;
pub use remote::handle_remote_command;

use crate::session::DeviceSession;
use serde_json::Value;
use std::sync::Arc;

/// Context passed to command handlers
#[derive(Clone)]
pub struct HandlerContext {
    pub entity_id: String,
    pub session: Arc<DeviceSession>,
}

/// String parameter `key` from a command's params object
pub(crate) fn param_str<'a>(params: Option<&'a Value>, key: &str) -> Option<&'a str> {
    params?.get(key)?.as_str()
}
