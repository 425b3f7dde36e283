//! Remote facet commands

use super::{param_str, HandlerContext};
use crate::command::CommandResult;
use serde_json::Value;
use tracing::{info, warn};
use viera_shared::keys;

const SEND_CMD: &str = "send_cmd";

/// Handle a remote command: `send_cmd`, a bare key name or an `APP_*` id
pub async fn handle_remote_command(
    ctx: &HandlerContext,
    cmd_id: &str,
    params: Option<&Value>,
) -> CommandResult {
    info!("[{}] Command: {}", ctx.entity_id, cmd_id);

    if cmd_id == SEND_CMD {
        return match param_str(params, "command") {
            Some(name) => execute(ctx, name).await,
            None => CommandResult::Rejected {
                message: "missing command".into(),
            },
        };
    }

    execute(ctx, cmd_id).await
}

async fn execute(ctx: &HandlerContext, name: &str) -> CommandResult {
    if let Some(code) = keys::key_code(name) {
        let success = ctx.session.send_key(code).await;
        return CommandResult::from_success(name, success);
    }

    if let Some(app) = ctx.session.app_for_command(name).await {
        info!("[{}] Launching app: {}", ctx.entity_id, app.name);
        let success = ctx.session.launch_app(&app).await;
        return CommandResult::from_success(name, success);
    }

    warn!("[{}] Unknown command: {}", ctx.entity_id, name);
    CommandResult::Unsupported {
        message: format!("unknown command {}", name),
    }
}
