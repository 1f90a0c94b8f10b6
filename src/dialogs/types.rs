//! Core dialog types
//!
//! Identifiers, lifecycle states, content produced by `init`, the events the
//! manager publishes, and the dialog error type.

use crate::class::ClassError;
use crate::surface::SurfaceError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Unique identifier for dialog instances
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DialogId(pub String);

impl DialogId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identifier handed out for the `number`-th constructed dialog.
    pub fn numbered(number: u64) -> Self {
        Self(format!("dlg_{}", number))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// An empty id addresses the topmost dialog.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for DialogId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for DialogId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for DialogId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Dialog state tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DialogState {
    /// Being built; `init` has not produced content yet
    #[default]
    Constructing,
    /// Attached and registered on the stack
    Open,
    /// Torn down; never reused
    Closed,
}

/// How a dialog left the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dismissal {
    /// Confirmed; `on_ok` ran
    Ok,
    /// Cancelled; `on_close` ran
    Cancel,
    /// Removed by `close_all` without either hook
    Forced,
}

/// Content returned by a dialog's `init` hook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Content {
    pub text: String,
    pub style: Option<String>,
}

impl Content {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: None,
        }
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = Some(style.into());
        self
    }

    /// Interpret a hook result. `null` means the dialog declined to open.
    pub fn from_value(value: Value) -> DialogResult<Option<Self>> {
        match value {
            Value::Null => Ok(None),
            Value::String(text) => Ok(Some(Self::text(text))),
            Value::Object(mut map) => {
                let text = match map.remove("text") {
                    Some(Value::String(text)) => text,
                    _ => {
                        return Err(DialogError::InvalidContent(
                            "object content needs a string 'text'".to_string(),
                        ))
                    }
                };
                let style = match map.remove("style") {
                    None | Some(Value::Null) => None,
                    Some(Value::String(style)) => Some(style),
                    Some(other) => {
                        return Err(DialogError::InvalidContent(format!(
                            "style must be a string, got {}",
                            other
                        )))
                    }
                };
                Ok(Some(Self { text, style }))
            }
            other => Err(DialogError::InvalidContent(format!(
                "expected null, a string or {{text, style}}, got {}",
                other
            ))),
        }
    }
}

impl From<Content> for Value {
    fn from(content: Content) -> Self {
        serde_json::json!({ "text": content.text, "style": content.style })
    }
}

/// Events published by the dialog manager
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DialogEvent {
    /// Dialog was attached and registered
    Opened { id: DialogId, class: String },
    /// `init` declined to open a dialog of this class
    Vetoed { class: String },
    /// Dialog finished its teardown
    Closed { id: DialogId, how: Dismissal },
    /// Emitted by a hook through [`super::Dialog::emit`]
    Custom {
        id: DialogId,
        name: String,
        payload: Value,
    },
}

/// Result type for dialog operations
pub type DialogResult<T> = std::result::Result<T, DialogError>;

/// Dialog-specific error types
#[derive(Debug, thiserror::Error)]
pub enum DialogError {
    #[error("dialog class misconfigured: {0}")]
    Class(#[from] ClassError),

    #[error("dialog hook failed: {0}")]
    Hook(#[source] anyhow::Error),

    #[error("surface operation failed: {0}")]
    Surface(#[from] SurfaceError),

    #[error("invalid dialog content: {0}")]
    InvalidContent(String),

    #[error("singleton '{0}' cannot open inside its own instance")]
    NestedSingleton(String),
}

impl DialogError {
    /// Wrap an error coming out of a hook, keeping class errors recognisable.
    pub fn from_hook(err: anyhow::Error) -> Self {
        match err.downcast::<ClassError>() {
            Ok(class) => Self::Class(class),
            Err(other) => Self::Hook(other),
        }
    }
}
