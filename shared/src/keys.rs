//! Remote key table
//!
//! Maps abstract remote-button names to Viera NRC key codes. Several names
//! are aliases for the same code (`OK`/`ENTER`, `BACK`/`RETURN`, ...); the
//! reverse lookup returns the first name listed for a code.

/// Power toggle key
pub const KEY_POWER: &str = "NRC_POWER-ONOFF";
/// Volume up key
pub const KEY_VOLUME_UP: &str = "NRC_VOLUP-ONOFF";
/// Volume down key
pub const KEY_VOLUME_DOWN: &str = "NRC_VOLDOWN-ONOFF";
/// Play key (also used for play/pause)
pub const KEY_PLAY: &str = "NRC_PLAY-ONOFF";
/// Stop key
pub const KEY_STOP: &str = "NRC_STOP-ONOFF";
/// Fast-forward key (also used for "next")
pub const KEY_FAST_FORWARD: &str = "NRC_FF-ONOFF";
/// Rewind key (also used for "previous")
pub const KEY_REWIND: &str = "NRC_REW-ONOFF";
/// Info key, harmless and state-preserving
pub const KEY_INFO: &str = "NRC_INFO-ONOFF";

/// Complete list of Viera NRC keys, in advertised order
pub const VIERA_KEYS: &[(&str, &str)] = &[
    // Navigation
    ("UP", "NRC_UP-ONOFF"),
    ("DOWN", "NRC_DOWN-ONOFF"),
    ("LEFT", "NRC_LEFT-ONOFF"),
    ("RIGHT", "NRC_RIGHT-ONOFF"),
    ("OK", "NRC_ENTER-ONOFF"),
    ("ENTER", "NRC_ENTER-ONOFF"),
    ("BACK", "NRC_RETURN-ONOFF"),
    ("RETURN", "NRC_RETURN-ONOFF"),
    ("EXIT", "NRC_CANCEL-ONOFF"),
    ("CANCEL", "NRC_CANCEL-ONOFF"),
    ("HOME", "NRC_HOME-ONOFF"),
    ("MENU", "NRC_MENU-ONOFF"),
    ("OPTION", "NRC_SUBMENU-ONOFF"),
    ("INDEX", "NRC_INDEX-ONOFF"),
    // Playback
    ("PLAY", KEY_PLAY),
    ("PAUSE", "NRC_PAUSE-ONOFF"),
    ("STOP", KEY_STOP),
    ("REW", KEY_REWIND),
    ("REWIND", KEY_REWIND),
    ("FF", KEY_FAST_FORWARD),
    ("FAST_FORWARD", KEY_FAST_FORWARD),
    ("SKIP_BACK", "NRC_SKIP_PREV-ONOFF"),
    ("SKIP_PREV", "NRC_SKIP_PREV-ONOFF"),
    ("SKIP_FWD", "NRC_SKIP_NEXT-ONOFF"),
    ("SKIP_NEXT", "NRC_SKIP_NEXT-ONOFF"),
    ("REC", "NRC_REC-ONOFF"),
    ("RECORD", "NRC_REC-ONOFF"),
    ("THIRTY_SECOND_SKIP", "NRC_30S_SKIP-ONOFF"),
    // Volume & audio
    ("VOL_UP", KEY_VOLUME_UP),
    ("VOLUME_UP", KEY_VOLUME_UP),
    ("VOL_DOWN", KEY_VOLUME_DOWN),
    ("VOLUME_DOWN", KEY_VOLUME_DOWN),
    ("MUTE", "NRC_MUTE-ONOFF"),
    ("SURROUND", "NRC_SURROUND-ONOFF"),
    ("SAP", "NRC_SAP-ONOFF"),
    ("MPX", "NRC_MPX-ONOFF"),
    // Channel & input
    ("CH_UP", "NRC_CH_UP-ONOFF"),
    ("CH_DOWN", "NRC_CH_DOWN-ONOFF"),
    ("INPUT", "NRC_CHG_INPUT-ONOFF"),
    ("INPUT_KEY", "NRC_CHG_INPUT-ONOFF"),
    ("AV", "NRC_CHG_INPUT-ONOFF"),
    ("PREV_CH", "NRC_CHG_INPUT-ONOFF"),
    ("TV", "NRC_TV-ONOFF"),
    ("HDMI1", "NRC_HDMI1-ONOFF"),
    ("HDMI2", "NRC_HDMI2-ONOFF"),
    ("HDMI3", "NRC_HDMI3-ONOFF"),
    ("HDMI4", "NRC_HDMI4-ONOFF"),
    // Numeric
    ("NUM_0", "NRC_D0-ONOFF"),
    ("NUM_1", "NRC_D1-ONOFF"),
    ("NUM_2", "NRC_D2-ONOFF"),
    ("NUM_3", "NRC_D3-ONOFF"),
    ("NUM_4", "NRC_D4-ONOFF"),
    ("NUM_5", "NRC_D5-ONOFF"),
    ("NUM_6", "NRC_D6-ONOFF"),
    ("NUM_7", "NRC_D7-ONOFF"),
    ("NUM_8", "NRC_D8-ONOFF"),
    ("NUM_9", "NRC_D9-ONOFF"),
    // Colour buttons
    ("RED", "NRC_RED-ONOFF"),
    ("GREEN", "NRC_GREEN-ONOFF"),
    ("YELLOW", "NRC_YELLOW-ONOFF"),
    ("BLUE", "NRC_BLUE-ONOFF"),
    // Power & settings
    ("POWER", KEY_POWER),
    ("OFF_TIMER", "NRC_OFFTIMER-ONOFF"),
    ("P_NR", "NRC_P_NR-ONOFF"),
    ("PICTAI", "NRC_PICTAI-ONOFF"),
    // Information & guide
    ("INFO", KEY_INFO),
    ("GUIDE", "NRC_EPG-ONOFF"),
    ("EPG", "NRC_EPG-ONOFF"),
    ("EHELP", "NRC_GUIDE-ONOFF"),
    ("PROGRAM", "NRC_PROG-ONOFF"),
    ("FAVORITE", "NRC_FAVORITE-ONOFF"),
    ("LAST_VIEW", "NRC_R_TUNE-ONOFF"),
    // Display & picture
    ("DISPLAY", "NRC_DISP_MODE-ONOFF"),
    ("ASPECT", "NRC_ASPECT-ONOFF"),
    ("3D", "NRC_3D-ONOFF"),
    ("TOGGLE_3D", "NRC_3D-ONOFF"),
    ("R_SCREEN", "NRC_R_SCREEN-ONOFF"),
    ("SPLIT", "NRC_SPLIT-ONOFF"),
    ("SWAP", "NRC_SWAP-ONOFF"),
    // Text & subtitles
    ("TEXT", "NRC_TEXT-ONOFF"),
    ("STTL", "NRC_STTL-ONOFF"),
    ("SUBTITLES", "NRC_STTL-ONOFF"),
    ("CC", "NRC_CC-ONOFF"),
    ("HOLD", "NRC_HOLD-ONOFF"),
    // Apps & network
    ("APPS", "NRC_APPS-ONOFF"),
    ("MY_APP", "NRC_MYAPP-ONOFF"),
    ("NETFLIX", "NRC_NETFLIX-ONOFF"),
    ("CONNECT", "NRC_INTERNET-ONOFF"),
    ("INTERNET", "NRC_INTERNET-ONOFF"),
    ("NETWORK", "NRC_CHG_NETWORK-ONOFF"),
    ("VTOOLS", "NRC_VTOOLS-ONOFF"),
    // External devices
    ("LINK", "NRC_VIERA_LINK-ONOFF"),
    ("VIERA_LINK", "NRC_VIERA_LINK-ONOFF"),
    ("EZ_SYNC", "NRC_EZ_SYNC-ONOFF"),
    ("DIGA_CONTROL", "NRC_DIGA_CTL-ONOFF"),
    // Game & special
    ("GAME", "NRC_GAME-ONOFF"),
    ("CHAT_MODE", "NRC_CHAT_MODE-ONOFF"),
    ("TOGGLE_SD_CARD", "NRC_SD_CARD-ONOFF"),
    // Regional / broadcast
    ("NET_BS", "NRC_NET_BS-ONOFF"),
    ("NET_CS", "NRC_NET_CS-ONOFF"),
    ("NET_TD", "NRC_NET_TD-ONOFF"),
];

/// Look up the NRC code for a key name
pub fn key_code(name: &str) -> Option<&'static str> {
    VIERA_KEYS
        .iter()
        .find(|(key, _)| *key == name)
        .map(|(_, code)| *code)
}

/// Look up the primary key name for an NRC code
pub fn key_name(code: &str) -> Option<&'static str> {
    VIERA_KEYS
        .iter()
        .find(|(_, c)| *c == code)
        .map(|(name, _)| *name)
}

/// All key names, in advertised order
pub fn key_names() -> impl Iterator<Item = &'static str> {
    VIERA_KEYS.iter().map(|(name, _)| *name)
}
