//! Discord front end: slash commands, bot runtime and reconnect policy

pub mod commands;
pub mod discord;
pub mod reconnect;

pub use discord::{DiscordBot, classify_error_message};
pub use reconnect::{ConnectionState, Delay, ReconnectController, ReconnectPolicy, TokioDelay};
