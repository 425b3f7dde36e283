//! Media player facet commands

use super::{param_str, HandlerContext};
use crate::command::CommandResult;
use serde_json::Value;
use tracing::info;
use viera_shared::{keys, timing};

/// Handle a media player command
///
/// Transport controls map onto remote keys; next and previous share the
/// fast-forward and rewind keys.
pub async fn handle_media_player_command(
    ctx: &HandlerContext,
    cmd_id: &str,
    params: Option<&Value>,
) -> CommandResult {
    info!("[{}] Command: {} {}", ctx.entity_id, cmd_id, fmt_params(params));
    let session = &ctx.session;

    let success = match cmd_id {
        "on" => session.turn_on().await,
        "off" => session.turn_off().await,
        "volume" => match volume_param(params) {
            Ok(volume) => session.set_volume(volume).await,
            Err(message) => return CommandResult::Rejected { message },
        },
        "volume_up" => session.volume_up().await,
        "volume_down" => session.volume_down().await,
        "mute_toggle" => {
            let muted = session.state().await.muted;
            session.set_mute(!muted).await
        }
        "mute" => session.set_mute(true).await,
        "unmute" => session.set_mute(false).await,
        "play_pause" => session.send_key(keys::KEY_PLAY).await,
        "stop" => session.send_key(keys::KEY_STOP).await,
        "next" | "fast_forward" => session.send_key(keys::KEY_FAST_FORWARD).await,
        "previous" | "rewind" => session.send_key(keys::KEY_REWIND).await,
        "select_source" => match param_str(params, "source") {
            Some(source) => session.select_source(source).await,
            None => {
                return CommandResult::Rejected {
                    message: "missing source".into(),
                }
            }
        },
        "play_media" => {
            let Some(media_id) = param_str(params, "media_id") else {
                return CommandResult::Rejected {
                    message: "missing media_id".into(),
                };
            };
            let media_type = param_str(params, "media_type").unwrap_or_default();
            if !media_type.eq_ignore_ascii_case("url") && !media_id.starts_with("http") {
                return CommandResult::Unsupported {
                    message: format!("cannot play media type {:?}", media_type),
                };
            }
            session.play_media(media_id).await
        }
        _ => {
            return CommandResult::Unsupported {
                message: format!("unknown command {}", cmd_id),
            }
        }
    };

    CommandResult::from_success(cmd_id, success)
}

/// Absolute volume from `{"volume": n}`; numeric strings are accepted
fn volume_param(params: Option<&Value>) -> Result<u8, String> {
    let raw = params
        .and_then(|p| p.get("volume"))
        .ok_or_else(|| "missing volume".to_string())?;

    let volume = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| format!("volume is not a number: {}", raw))?;

    if !(0.0..=f64::from(timing::VOLUME_MAX)).contains(&volume) {
        return Err(format!("volume out of range: {}", volume));
    }
    Ok(volume as u8)
}

fn fmt_params(params: Option<&Value>) -> String {
    params.map(Value::to_string).unwrap_or_default()
}
