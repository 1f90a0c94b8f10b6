//! Dialog instances
//!
//! A [`Dialog`] is the receiver every hook runs against. It carries the
//! instance data seeded from the constructor arguments, the lifetime token,
//! and whatever the hook wants the manager to apply once it returns.

use super::types::{Content, DialogEvent, DialogId, DialogState};
use crate::class::{Call, Class};
use crate::surface::{NodeId, Selection};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub type DialogClass = Class<Dialog>;
pub type DialogCall<'a> = Call<'a, Dialog>;

/// One modal surface on the stack.
#[derive(Debug)]
pub struct Dialog {
    pub(super) id: DialogId,
    pub(super) number: u64,
    pub(super) class: Arc<DialogClass>,
    pub(super) state: DialogState,
    pub(super) data: Map<String, Value>,
    pub(super) token: CancellationToken,
    pub(super) root: Option<NodeId>,
    pub(super) inner: Option<NodeId>,
    pub(super) focus_on_close: Option<NodeId>,
    pub(super) selection_on_close: Option<Selection>,
    pub(super) staged_content: Option<Content>,
    pub(super) outbox: Vec<DialogEvent>,
}

impl Dialog {
    pub(super) fn new(
        id: DialogId,
        number: u64,
        class: Arc<DialogClass>,
        data: Map<String, Value>,
        token: CancellationToken,
    ) -> Self {
        Self {
            id,
            number,
            class,
            state: DialogState::Constructing,
            data,
            token,
            root: None,
            inner: None,
            focus_on_close: None,
            selection_on_close: None,
            staged_content: None,
            outbox: Vec::new(),
        }
    }

    pub fn id(&self) -> &DialogId {
        &self.id
    }

    /// Position in construction order, starting at 1.
    pub fn number(&self) -> u64 {
        self.number
    }

    pub fn class(&self) -> &Arc<DialogClass> {
        &self.class
    }

    pub fn state(&self) -> DialogState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == DialogState::Open
    }

    /// True from the moment teardown starts.
    pub fn is_closed(&self) -> bool {
        self.state == DialogState::Closed || self.token.is_cancelled()
    }

    /// Token cancelled when this dialog starts closing. Work started on behalf
    /// of the dialog should hold a clone and check it before touching the
    /// dialog again.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.data
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(key.into(), value.into());
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Node holding the content produced by `init`.
    pub fn inner(&self) -> Option<NodeId> {
        self.inner
    }

    /// Replace the inner content once the running hook returns.
    pub fn replace_content(&mut self, content: Content) {
        self.staged_content = Some(content);
    }

    /// Publish a custom event once the running hook returns.
    pub fn emit(&mut self, name: impl Into<String>, payload: Value) {
        self.outbox.push(DialogEvent::Custom {
            id: self.id.clone(),
            name: name.into(),
            payload,
        });
    }

    /// Node to focus again when this dialog closes.
    pub fn set_focus_on_close(&mut self, node: Option<NodeId>) {
        self.focus_on_close = node;
    }

    /// Selection to restore when this dialog closes.
    pub fn set_selection_on_close(&mut self, selection: Option<Selection>) {
        self.selection_on_close = selection;
    }
}
