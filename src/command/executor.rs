//! Command executor - routes host commands to device sessions

use super::handlers::{self, HandlerContext};
use crate::session::DeviceSession;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use viera_shared::{entity, StatusCode};

/// Result of command execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    /// Device operation succeeded
    Completed { message: String },
    /// Device operation failed
    Failed { message: String },
    /// Missing or invalid parameter
    Rejected { message: String },
    /// Unknown command identifier
    Unsupported { message: String },
}

impl CommandResult {
    pub fn from_success(cmd_id: &str, success: bool) -> Self {
        if success {
            CommandResult::Completed {
                message: format!("{} done", cmd_id),
            }
        } else {
            CommandResult::Failed {
                message: format!("{} failed", cmd_id),
            }
        }
    }

    /// Status code reported back to the host
    pub fn status(&self) -> StatusCode {
        match self {
            CommandResult::Completed { .. } => StatusCode::Ok,
            CommandResult::Failed { .. } => StatusCode::ServerError,
            CommandResult::Rejected { .. } => StatusCode::BadRequest,
            CommandResult::Unsupported { .. } => StatusCode::NotImplemented,
        }
    }
}

/// Dispatches commands to the session owning the addressed entity
#[derive(Default)]
pub struct CommandExecutor {
    sessions: RwLock<HashMap<String, Arc<DeviceSession>>>,
}

impl CommandExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session under its device identifier
    pub async fn register(&self, session: Arc<DeviceSession>) {
        let id = session.identifier().to_string();
        if self.sessions.write().await.insert(id.clone(), session).is_some() {
            warn!("Replaced existing session for {}", id);
        }
    }

    pub async fn unregister(&self, identifier: &str) -> Option<Arc<DeviceSession>> {
        self.sessions.write().await.remove(identifier)
    }

    pub async fn session(&self, identifier: &str) -> Option<Arc<DeviceSession>> {
        self.sessions.read().await.get(identifier).cloned()
    }

    pub async fn sessions(&self) -> Vec<Arc<DeviceSession>> {
        self.sessions.read().await.values().cloned().collect()
    }

    /// Execute a command against an entity and return its status code
    pub async fn execute(&self, entity_id: &str, cmd_id: &str, params: Option<&Value>) -> StatusCode {
        let Some((facet, device_id)) = entity_id.split_once('.') else {
            warn!("Malformed entity id: {}", entity_id);
            return StatusCode::BadRequest;
        };

        let Some(session) = self.session(device_id).await else {
            warn!("No session for entity {}", entity_id);
            return StatusCode::BadRequest;
        };

        let ctx = HandlerContext {
            entity_id: entity_id.to_string(),
            session,
        };

        let result = match facet {
            entity::MEDIA_PLAYER_PREFIX => {
                handlers::handle_media_player_command(&ctx, cmd_id, params).await
            }
            entity::REMOTE_PREFIX => handlers::handle_remote_command(&ctx, cmd_id, params).await,
            _ => CommandResult::Rejected {
                message: format!("unknown entity type {}", facet),
            },
        };

        match &result {
            CommandResult::Completed { message } => debug!("[{}] {}", entity_id, message),
            CommandResult::Failed { message } => info!("[{}] {}", entity_id, message),
            CommandResult::Rejected { message } => warn!("[{}] Rejected: {}", entity_id, message),
            CommandResult::Unsupported { message } => {
                warn!("[{}] Not implemented: {}", entity_id, message)
            }
        }
        result.status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fake::{FakeFactory, FakeTv, FakeWaker, Fault};
    use crate::client::AppInfo;
    use crate::config::DeviceConfig;
    use crate::session::SessionTiming;
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use viera_shared::EntityUpdate;

    const PLAYER: &str = "media_player.viera_192_168_1_50_55000";
    const REMOTE: &str = "remote.viera_192_168_1_50_55000";

    async fn setup() -> (
        CommandExecutor,
        Arc<FakeTv>,
        Arc<DeviceSession>,
        mpsc::UnboundedReceiver<EntityUpdate>,
    ) {
        let tv = FakeTv::new();
        tv.set_volume_reply(Some(30));
        tv.set_mute_reply(Some(false));
        tv.set_apps(vec![
            AppInfo::new("0387878700000014", "Netflix"),
            AppInfo::new("0070000200170001", "YouTube"),
        ]);

        let (tx, rx) = mpsc::unbounded_channel();
        let timing = SessionTiming {
            poll_interval: Duration::from_secs(30),
            wake_settle: Duration::ZERO,
            power_on_settle: Duration::ZERO,
        };
        let session = Arc::new(DeviceSession::new(
            DeviceConfig::new("Living Room", "192.168.1.50", 55000),
            FakeFactory::new(tv.clone()),
            FakeWaker::new(),
            timing,
            tx,
        ));
        assert!(session.connect().await);

        let executor = CommandExecutor::new();
        executor.register(session.clone()).await;
        (executor, tv, session, rx)
    }

    #[tokio::test]
    async fn test_unknown_entity_is_bad_request() {
        let (executor, _, _, _rx) = setup().await;

        assert_eq!(
            executor.execute("media_player.nope", "on", None).await,
            StatusCode::BadRequest
        );
        assert_eq!(executor.execute("garbage", "on", None).await, StatusCode::BadRequest);
        assert_eq!(
            executor.execute("light.viera_192_168_1_50_55000", "on", None).await,
            StatusCode::BadRequest
        );
    }

    #[tokio::test]
    async fn test_unknown_command_is_not_implemented() {
        let (executor, _, _, _rx) = setup().await;

        assert_eq!(
            executor.execute(PLAYER, "shuffle", None).await,
            StatusCode::NotImplemented
        );
        assert_eq!(
            executor.execute(REMOTE, "NOT_A_KEY", None).await,
            StatusCode::NotImplemented
        );
        assert_eq!(
            executor.execute(REMOTE, "APP_DISNEY", None).await,
            StatusCode::NotImplemented
        );
    }

    #[tokio::test]
    async fn test_volume_parameter_handling() {
        let (executor, tv, session, _rx) = setup().await;

        assert_eq!(executor.execute(PLAYER, "volume", None).await, StatusCode::BadRequest);
        assert_eq!(
            executor.execute(PLAYER, "volume", Some(&json!({"volume": 150}))).await,
            StatusCode::BadRequest
        );
        assert_eq!(
            executor.execute(PLAYER, "volume", Some(&json!({"volume": 42}))).await,
            StatusCode::Ok
        );
        assert_eq!(session.state().await.volume, 42);
        assert_eq!(tv.count_calls("set_volume:42"), 1);
    }

    #[tokio::test]
    async fn test_transport_controls_map_to_keys() {
        let (executor, tv, _, _rx) = setup().await;

        for cmd in ["play_pause", "stop", "next", "previous", "fast_forward", "rewind"] {
            assert_eq!(executor.execute(PLAYER, cmd, None).await, StatusCode::Ok, "{}", cmd);
        }

        assert_eq!(tv.count_calls("send_key:NRC_PLAY-ONOFF"), 1);
        assert_eq!(tv.count_calls("send_key:NRC_STOP-ONOFF"), 1);
        assert_eq!(tv.count_calls("send_key:NRC_FF-ONOFF"), 2);
        assert_eq!(tv.count_calls("send_key:NRC_REW-ONOFF"), 2);
    }

    #[tokio::test]
    async fn test_mute_toggle_uses_local_state() {
        let (executor, tv, session, _rx) = setup().await;

        assert_eq!(executor.execute(PLAYER, "mute_toggle", None).await, StatusCode::Ok);
        assert!(session.state().await.muted);
        assert_eq!(executor.execute(PLAYER, "mute_toggle", None).await, StatusCode::Ok);
        assert!(!session.state().await.muted);
        assert_eq!(tv.call_names().iter().filter(|c| c.starts_with("set_mute")).count(), 2);
    }

    #[tokio::test]
    async fn test_select_source() {
        let (executor, tv, session, _rx) = setup().await;

        assert_eq!(
            executor
                .execute(PLAYER, "select_source", Some(&json!({"source": "Netflix"})))
                .await,
            StatusCode::Ok
        );
        assert_eq!(tv.count_calls("launch_app:0387878700000014"), 1);
        assert_eq!(session.state().await.source, "Netflix");

        assert_eq!(
            executor
                .execute(PLAYER, "select_source", Some(&json!({"source": "Hulu"})))
                .await,
            StatusCode::ServerError
        );
        assert_eq!(session.state().await.source, "Netflix");
        assert_eq!(
            executor.execute(PLAYER, "select_source", None).await,
            StatusCode::BadRequest
        );
    }

    #[tokio::test]
    async fn test_play_media() {
        let (executor, tv, _, _rx) = setup().await;

        let url = json!({"media_id": "https://example.com/a.mp4", "media_type": "VIDEO"});
        assert_eq!(executor.execute(PLAYER, "play_media", Some(&url)).await, StatusCode::Ok);
        assert_eq!(tv.count_calls("open_webpage:https://example.com/a.mp4"), 1);

        let typed = json!({"media_id": "example.com", "media_type": "URL"});
        assert_eq!(executor.execute(PLAYER, "play_media", Some(&typed)).await, StatusCode::Ok);

        let other = json!({"media_id": "spotify:track:1", "media_type": "MUSIC"});
        assert_eq!(
            executor.execute(PLAYER, "play_media", Some(&other)).await,
            StatusCode::NotImplemented
        );
        assert_eq!(
            executor.execute(PLAYER, "play_media", Some(&json!({}))).await,
            StatusCode::BadRequest
        );
    }

    #[tokio::test]
    async fn test_remote_keys_and_apps() {
        let (executor, tv, session, _rx) = setup().await;

        assert_eq!(executor.execute(REMOTE, "HOME", None).await, StatusCode::Ok);
        assert_eq!(tv.count_calls("send_key:NRC_HOME-ONOFF"), 1);

        assert_eq!(
            executor
                .execute(REMOTE, "send_cmd", Some(&json!({"command": "NUM_5"})))
                .await,
            StatusCode::Ok
        );
        assert_eq!(tv.count_calls("send_key:NRC_D5-ONOFF"), 1);

        assert_eq!(executor.execute(REMOTE, "APP_YOUTUBE", None).await, StatusCode::Ok);
        assert_eq!(tv.count_calls("launch_app:0070000200170001"), 1);
        assert_eq!(session.state().await.source, "YouTube");

        assert_eq!(
            executor
                .execute(REMOTE, "send_cmd", Some(&json!({"command": "APP_NETFLIX"})))
                .await,
            StatusCode::Ok
        );
        assert_eq!(
            executor.execute(REMOTE, "send_cmd", None).await,
            StatusCode::BadRequest
        );
    }

    #[tokio::test]
    async fn test_device_failure_is_server_error() {
        let (executor, tv, _, _rx) = setup().await;
        tv.set_call_fault(Some(Fault::Timeout));

        assert_eq!(executor.execute(PLAYER, "off", None).await, StatusCode::ServerError);
        assert_eq!(executor.execute(REMOTE, "OK", None).await, StatusCode::ServerError);
    }

    #[tokio::test]
    async fn test_unregister() {
        let (executor, _, _, _rx) = setup().await;

        assert!(executor.unregister("viera_192_168_1_50_55000").await.is_some());
        assert!(executor.sessions().await.is_empty());
        assert_eq!(executor.execute(PLAYER, "on", None).await, StatusCode::BadRequest);
    }
}
