//! Modal dialog stack for the Moderator console
//!
//! - [`class`]: single-inheritance class tables with explicit super calls
//! - [`surface`]: the node tree dialogs attach to
//! - [`dialogs`]: dialog instances and the [`dialogs::DialogManager`]
//! - [`demo`], [`cli`], [`tui`]: console dialogs and the front ends driving them

pub mod class;
pub mod cli;
pub mod config;
pub mod demo;
pub mod dialogs;
pub mod surface;
pub mod tui;

pub use config::Config;
pub use dialogs::{DialogError, DialogId, DialogManager, DialogResult};
