//! Dialog system for modal UI surfaces
//!
//! Dialog classes are ordinary [`crate::class`] classes over [`Dialog`]; the
//! [`DialogManager`] constructs instances from them, keeps the stack of open
//! dialogs and tears them down again.

pub mod class;
pub mod instance;
pub mod layer;
pub mod manager;
pub mod task;
pub mod types;

pub use class::{base_class, fields, hooks, DialogTraits};
pub use instance::{Dialog, DialogCall, DialogClass};
pub use layer::{DialogLayer, DialogLayout, DialogSize};
pub use manager::DialogManager;
pub use task::{guarded, spawn_guarded};
pub use types::*;
