//! Command surface builder
//!
//! Derives the advertised command list and the paged button layout from the
//! static key table plus the apps the TV reported. Rebuilt whenever the app
//! list changes; the static key names are always present so identifiers
//! handed out earlier stay valid.

use crate::client::AppInfo;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use viera_shared::keys;

/// Prefix of derived app-launch command identifiers
pub const APP_CMD_PREFIX: &str = "APP_";

/// Maximum length of the name part of an app command identifier
pub const APP_CMD_MAX_LEN: usize = 15;

/// Button label width on the apps page
pub const APP_LABEL_MAX_LEN: usize = 10;

/// Column count of the apps page
pub const APPS_GRID_WIDTH: u32 = 4;

/// Row cap of the apps page
pub const APPS_GRID_MAX_HEIGHT: u32 = 12;

/// Most apps shown on the apps page
pub const APPS_PAGE_CAPACITY: usize = (APPS_GRID_WIDTH * APPS_GRID_MAX_HEIGHT) as usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Grid {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Location {
    pub x: u32,
    pub y: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandRef {
    pub cmd_id: String,
}

/// One button on a page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum UiItem {
    Text {
        text: String,
        command: CommandRef,
        location: Location,
    },
    Icon {
        icon: String,
        command: CommandRef,
        location: Location,
    },
}

impl UiItem {
    pub fn command_id(&self) -> &str {
        match self {
            UiItem::Text { command, .. } | UiItem::Icon { command, .. } => &command.cmd_id,
        }
    }

    pub fn location(&self) -> Location {
        match self {
            UiItem::Text { location, .. } | UiItem::Icon { location, .. } => *location,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UiPage {
    pub page_id: String,
    pub name: String,
    pub grid: Grid,
    pub items: Vec<UiItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct UserInterface {
    pub pages: Vec<UiPage>,
}

/// Button label in the static layout tables
enum Label {
    Text(&'static str),
    Icon(&'static str),
}

struct StaticPage {
    page_id: &'static str,
    name: &'static str,
    grid: Grid,
    items: &'static [(Label, &'static str, u32, u32)],
}

use Label::{Icon, Text};

const STATIC_PAGES: &[StaticPage] = &[
    StaticPage {
        page_id: "navigation",
        name: "Navigation",
        grid: Grid { width: 3, height: 4 },
        items: &[
            (Text("Home"), "HOME", 0, 0),
            (Icon("uc:up-arrow"), "UP", 1, 0),
            (Text("Menu"), "MENU", 2, 0),
            (Icon("uc:left-arrow"), "LEFT", 0, 1),
            (Text("OK"), "OK", 1, 1),
            (Icon("uc:right-arrow"), "RIGHT", 2, 1),
            (Text("Back"), "BACK", 0, 2),
            (Icon("uc:down-arrow"), "DOWN", 1, 2),
            (Text("Exit"), "EXIT", 2, 2),
            (Text("Info"), "INFO", 0, 3),
            (Text("Guide"), "GUIDE", 1, 3),
            (Text("Last View"), "LAST_VIEW", 2, 3),
        ],
    },
    StaticPage {
        page_id: "playback",
        name: "Playback",
        grid: Grid { width: 3, height: 3 },
        items: &[
            (Icon("uc:prev"), "SKIP_BACK", 0, 0),
            (Icon("uc:play"), "PLAY", 1, 0),
            (Icon("uc:next"), "SKIP_FWD", 2, 0),
            (Icon("uc:backward"), "REW", 0, 1),
            (Icon("uc:pause"), "PAUSE", 1, 1),
            (Icon("uc:forward"), "FF", 2, 1),
            (Icon("uc:rec"), "REC", 0, 2),
            (Icon("uc:stop"), "STOP", 1, 2),
        ],
    },
    StaticPage {
        page_id: "channels",
        name: "Channels",
        grid: Grid { width: 3, height: 4 },
        items: &[
            (Text("1"), "NUM_1", 0, 0),
            (Text("2"), "NUM_2", 1, 0),
            (Text("3"), "NUM_3", 2, 0),
            (Text("4"), "NUM_4", 0, 1),
            (Text("5"), "NUM_5", 1, 1),
            (Text("6"), "NUM_6", 2, 1),
            (Text("7"), "NUM_7", 0, 2),
            (Text("8"), "NUM_8", 1, 2),
            (Text("9"), "NUM_9", 2, 2),
            (Icon("uc:down-arrow"), "CH_DOWN", 0, 3),
            (Text("0"), "NUM_0", 1, 3),
            (Icon("uc:up-arrow"), "CH_UP", 2, 3),
        ],
    },
    StaticPage {
        page_id: "color_input",
        name: "Color & Input",
        grid: Grid { width: 4, height: 5 },
        items: &[
            (Text("Power"), "POWER", 0, 0),
            (Text("Option"), "OPTION", 2, 0),
            (Text("eHelp"), "EHELP", 3, 0),
            (Text("Apps"), "APPS", 0, 1),
            (Text("My App"), "MY_APP", 1, 1),
            (Text("Netflix"), "NETFLIX", 2, 1),
            (Text("TV"), "TV", 0, 2),
            (Text("AV"), "AV", 1, 2),
            (Text("HDMI1"), "HDMI1", 0, 3),
            (Text("HDMI2"), "HDMI2", 1, 3),
            (Text("HDMI3"), "HDMI3", 2, 3),
            (Text("HDMI4"), "HDMI4", 3, 3),
            (Text("Red"), "RED", 0, 4),
            (Text("Green"), "GREEN", 1, 4),
            (Text("Yellow"), "YELLOW", 2, 4),
            (Text("Blue"), "BLUE", 3, 4),
        ],
    },
];

impl StaticPage {
    fn to_page(&self) -> UiPage {
        let items = self
            .items
            .iter()
            .map(|(label, cmd_id, x, y)| {
                let command = CommandRef {
                    cmd_id: (*cmd_id).to_string(),
                };
                let location = Location { x: *x, y: *y };
                match label {
                    Text(text) => UiItem::Text {
                        text: (*text).to_string(),
                        command,
                        location,
                    },
                    Icon(icon) => UiItem::Icon {
                        icon: (*icon).to_string(),
                        command,
                        location,
                    },
                }
            })
            .collect();

        UiPage {
            page_id: self.page_id.to_string(),
            name: self.name.to_string(),
            grid: self.grid,
            items,
        }
    }
}

/// Derive the launch command identifier for an app name
///
/// Keeps alphanumeric characters only, upper-cases them and truncates to
/// [`APP_CMD_MAX_LEN`]. Names that differ only in punctuation or spacing
/// collapse to the same identifier.
pub fn app_command_id(name: &str) -> String {
    let safe: String = name
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_uppercase)
        .take(APP_CMD_MAX_LEN)
        .collect();
    format!("{}{}", APP_CMD_PREFIX, safe)
}

fn apps_page(apps: &[AppInfo]) -> Option<UiPage> {
    if apps.is_empty() {
        return None;
    }

    let shown = &apps[..apps.len().min(APPS_PAGE_CAPACITY)];
    let items = shown
        .iter()
        .enumerate()
        .map(|(i, app)| {
            let i = i as u32;
            UiItem::Text {
                text: app.name.chars().take(APP_LABEL_MAX_LEN).collect(),
                command: CommandRef {
                    cmd_id: app_command_id(&app.name),
                },
                location: Location {
                    x: i % APPS_GRID_WIDTH,
                    y: i / APPS_GRID_WIDTH,
                },
            }
        })
        .collect();

    let rows = (shown.len() as u32).div_ceil(APPS_GRID_WIDTH);

    Some(UiPage {
        page_id: "apps".into(),
        name: "Apps".into(),
        grid: Grid {
            width: APPS_GRID_WIDTH,
            height: rows.min(APPS_GRID_MAX_HEIGHT),
        },
        items,
    })
}

/// Advertised commands and layout for one remote entity
#[derive(Debug, Clone)]
pub struct CommandSurface {
    simple_commands: Vec<String>,
    app_commands: HashMap<String, AppInfo>,
    user_interface: UserInterface,
}

impl CommandSurface {
    /// Recompute the surface for a discovered-app list
    pub fn build(apps: &[AppInfo]) -> Self {
        let mut simple_commands: Vec<String> = keys::key_names().map(str::to_string).collect();
        let mut app_commands = HashMap::new();

        for app in apps {
            let cmd_id = app_command_id(&app.name);
            if !app_commands.contains_key(&cmd_id) {
                simple_commands.push(cmd_id.clone());
            }
            // Later apps overwrite earlier ones on a collision
            app_commands.insert(cmd_id, app.clone());
        }

        let mut pages: Vec<UiPage> = STATIC_PAGES.iter().map(StaticPage::to_page).collect();
        pages.extend(apps_page(apps));

        Self {
            simple_commands,
            app_commands,
            user_interface: UserInterface { pages },
        }
    }

    pub fn simple_commands(&self) -> &[String] {
        &self.simple_commands
    }

    pub fn user_interface(&self) -> &UserInterface {
        &self.user_interface
    }

    /// App launched by a derived command identifier
    pub fn app_for_command(&self, cmd_id: &str) -> Option<&AppInfo> {
        self.app_commands.get(cmd_id)
    }

    pub fn contains(&self, cmd_id: &str) -> bool {
        keys::key_code(cmd_id).is_some() || self.app_commands.contains_key(cmd_id)
    }

    pub fn app_command_count(&self) -> usize {
        self.app_commands.len()
    }

    /// Options payload advertised to the host for the remote entity
    pub fn to_options_json(&self) -> Value {
        serde_json::json!({
            "simple_commands": self.simple_commands,
            "user_interface": self.user_interface,
        })
    }
}

impl Default for CommandSurface {
    fn default() -> Self {
        Self::build(&[])
    }
}
