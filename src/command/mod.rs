//! Command handling for the bridge
//!
//! This module handles:
//! - Deriving the advertised command surface from keys and discovered apps
//! - Dispatching host commands to the owning device session
//! - Mapping outcomes to host status codes

mod executor;
pub mod handlers;
mod surface;

pub use executor::{CommandExecutor, CommandResult};
pub use surface::{
    app_command_id, CommandRef, CommandSurface, Grid, Location, UiItem, UiPage, UserInterface,
    APP_CMD_PREFIX,
};
