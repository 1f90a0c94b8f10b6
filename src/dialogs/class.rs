//! Dialog classes
//!
//! Every dialog class derives from the base class built by [`base_class`]. The
//! base only defines the flag fields; subclasses add the hooks (`init`,
//! `on_create`, `on_ok`, `on_close`, `on_destroy`) and override fields.

use super::instance::DialogClass;
use crate::class::ClassBuilder;
use crate::config::Config;
use serde_json::Value;
use std::sync::Arc;

pub const BASE_CLASS: &str = "Dialog";

pub mod hooks {
    pub const INIT: &str = "init";
    pub const ON_CREATE: &str = "on_create";
    pub const ON_OK: &str = "on_ok";
    pub const ON_CLOSE: &str = "on_close";
    pub const ON_DESTROY: &str = "on_destroy";
}

pub mod fields {
    pub const SINGLETON: &str = "singleton";
    pub const OK_LABEL: &str = "ok_label";
    pub const CLOSE_LABEL: &str = "close_label";
    pub const RESTORE_FOCUS: &str = "restore_focus";
    pub const RESTORE_SELECTION: &str = "restore_selection";
    pub const SIZE: &str = "size";
}

/// `close_label` value that picks "cancel" or "close" depending on whether
/// the class can be confirmed.
pub const AUTO_LABEL: &str = "-";

/// Root of every dialog class.
pub fn base_class(config: &Config) -> Arc<DialogClass> {
    ClassBuilder::new(BASE_CLASS)
        .field(fields::SINGLETON, false)
        .field(fields::OK_LABEL, config.ok_label.clone())
        .field(fields::CLOSE_LABEL, AUTO_LABEL)
        .field(fields::RESTORE_FOCUS, false)
        .field(fields::RESTORE_SELECTION, false)
        .field(fields::SIZE, "fit")
        .build()
}

/// Flags of a class, read once per construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogTraits {
    pub singleton: bool,
    pub ok_label: Option<String>,
    pub close_label: Option<String>,
    pub restore_focus: bool,
    pub restore_selection: bool,
    pub full_screen: bool,
}

impl DialogTraits {
    pub fn resolve(class: &DialogClass, config: &Config) -> Self {
        let flag = |name: &str| class.field(name).and_then(Value::as_bool).unwrap_or(false);
        let label = |name: &str| class.field(name).and_then(Value::as_str).map(str::to_string);
        let confirmable = class.responds_to(hooks::ON_OK);

        let ok_label = label(fields::OK_LABEL).filter(|_| confirmable);
        let close_label = label(fields::CLOSE_LABEL).map(|l| {
            if l != AUTO_LABEL {
                l
            } else if confirmable {
                config.cancel_label.clone()
            } else {
                config.close_label.clone()
            }
        });

        Self {
            singleton: flag(fields::SINGLETON),
            ok_label,
            close_label,
            restore_focus: flag(fields::RESTORE_FOCUS),
            restore_selection: flag(fields::RESTORE_SELECTION),
            full_screen: class.field(fields::SIZE).and_then(Value::as_str) == Some("full"),
        }
    }
}
