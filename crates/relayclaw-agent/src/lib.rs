//! # RelayClaw Agent
//!
//! The command layer: parses slash commands off the update stream, runs every
//! one through the authorization gate, dispatches to the engine, and renders
//! replies. This is the single boundary where errors become user-visible
//! text; nothing below it ever talks to the sender.

pub mod commands;
pub mod handler;

pub use commands::{Command, ParsedCommand};
pub use handler::CommandHandler;
