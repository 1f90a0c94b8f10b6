//! Dialog manager for handling the dialog stack and lifecycle
//!
//! The dialog manager is responsible for:
//! - Constructing dialogs from their classes and attaching them to the surface
//! - Keeping the stack of open dialogs (last = topmost)
//! - Closing dialogs by id, by key, by button, and cascading to nested ones
//! - Running the deferred `on_create` hooks one tick after construction
//!
//! Membership in the stack and the `Open` state always go together: a dialog
//! is pushed when it becomes `Open` and marked `Closed` when it is removed.

use super::{
    class::{base_class, hooks, DialogTraits},
    instance::{Dialog, DialogClass},
    layer::{DialogLayer, DialogLayout, DialogSize},
    types::*,
};
use crate::class::Class;
use crate::config::Config;
use crate::surface::{NodeId, NodeTree, Surface, SurfaceError};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::layout::Rect;
use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub const ATTR_DIALOG_ID: &str = "dialog-id";
pub const ATTR_ACTION: &str = "action";
pub const ATTR_ROLE: &str = "role";
pub const ATTR_STYLE: &str = "style";
pub const ATTR_Z_INDEX: &str = "z-index";

type CloseAllHook<S> = Box<dyn FnMut(&mut S)>;

/// Dialog manager handles the dialog stack and lifecycle
pub struct DialogManager<S: Surface = NodeTree> {
    /// Tree the dialogs attach their nodes to
    surface: S,

    config: Config,

    /// Root of every dialog class built for this manager
    base: Arc<DialogClass>,

    /// Stack of open dialogs (last = topmost)
    dialogs: Vec<Dialog>,

    /// Number given to the next constructed dialog
    next_number: u64,

    /// Dialogs whose `on_create` runs on the next tick
    pending_create: VecDeque<DialogId>,

    /// Event sender for dialog events
    event_sender: Option<mpsc::UnboundedSender<DialogEvent>>,

    /// Runs after `close_all`
    close_all_hook: Option<CloseAllHook<S>>,
}

impl DialogManager<NodeTree> {
    /// Manager over a fresh in-memory tree with default configuration.
    pub fn in_memory() -> Self {
        Self::new(NodeTree::new(), Config::default())
    }
}

impl<S: Surface> DialogManager<S> {
    /// Create a new dialog manager
    pub fn new(surface: S, config: Config) -> Self {
        let base = base_class(&config);
        Self {
            surface,
            config,
            base,
            dialogs: Vec::new(),
            next_number: 1,
            pending_create: VecDeque::new(),
            event_sender: None,
            close_all_hook: None,
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Class every dialog class should extend.
    pub fn base_class(&self) -> &Arc<DialogClass> {
        &self.base
    }

    /// Set the event sender for dialog events
    pub fn set_event_sender(&mut self, sender: mpsc::UnboundedSender<DialogEvent>) {
        self.event_sender = Some(sender);
    }

    /// Replace the callback run after every [`Self::close_all`].
    pub fn set_close_all_hook(&mut self, hook: impl FnMut(&mut S) + 'static) {
        self.close_all_hook = Some(Box::new(hook));
    }

    /// Construct a dialog of `class` under `parent` (the surface root when
    /// `None`). `args` seeds the instance data; a non-object value is stored
    /// under `"args"`.
    ///
    /// Returns `Ok(None)` when `init` declines to open.
    pub fn open(
        &mut self,
        class: &Arc<DialogClass>,
        parent: Option<NodeId>,
        args: Value,
    ) -> DialogResult<Option<DialogId>> {
        let number = self.next_number;
        self.next_number += 1;
        let id = DialogId::numbered(number);
        let traits = DialogTraits::resolve(class, &self.config);

        let parent = parent.unwrap_or_else(|| self.surface.root());
        if !self.surface.exists(parent) {
            return Err(SurfaceError::UnknownNode(parent).into());
        }
        if traits.singleton && self.evicting_removes(class, parent) {
            return Err(DialogError::NestedSingleton(class.name().to_string()));
        }

        let token = match self.owner_of(parent).and_then(|owner| self.get(&owner)) {
            Some(owner) => owner.token.child_token(),
            None => CancellationToken::new(),
        };

        let data = match args {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("args".to_string(), other);
                map
            }
        };

        let mut dialog = Dialog::new(id.clone(), number, Arc::clone(class), data, token);

        let init = Arc::clone(class.resolve(hooks::INIT)?);
        let produced = init
            .invoke(&mut dialog, Value::Null)
            .map_err(DialogError::from_hook)?;

        let Some(content) = Content::from_value(produced)? else {
            debug!("{} ({}) declined to open", id, class.name());
            dialog.token.cancel();
            self.send_event(DialogEvent::Vetoed {
                class: class.name().to_string(),
            });
            return Ok(None);
        };

        // Only a dialog that is really opening displaces the others
        if traits.singleton {
            self.evict_instances_of(class)?;
        }

        let (root, inner) = self.build_nodes(&dialog, &traits, &content)?;

        if traits.restore_focus && dialog.focus_on_close.is_none() {
            dialog.focus_on_close = self.surface.focused();
        }
        if traits.restore_selection && dialog.selection_on_close.is_none() {
            dialog.selection_on_close = self.surface.selection();
        }

        self.surface.append(parent, root)?;
        dialog.root = Some(root);
        dialog.inner = Some(inner);
        dialog.state = DialogState::Open;
        let outbox = std::mem::take(&mut dialog.outbox);
        self.dialogs.push(dialog);

        debug!("opened {} ({}) under {}", id, class.name(), parent);
        self.send_event(DialogEvent::Opened {
            id: id.clone(),
            class: class.name().to_string(),
        });
        outbox.into_iter().for_each(|event| self.send_event(event));

        if class.responds_to(hooks::ON_CREATE) {
            self.pending_create.push_back(id.clone());
        }

        Ok(Some(id))
    }

    /// Close a dialog. `None` or an empty id closes the topmost one.
    ///
    /// Runs `on_ok` when `ok` is set and `on_close` otherwise, then tears the
    /// dialog down. Returns whether a dialog was closed.
    pub fn close(&mut self, id: Option<&DialogId>, ok: bool) -> DialogResult<bool> {
        let target = match id.filter(|id| !id.is_empty()) {
            Some(id) => id.clone(),
            None => match self.topmost() {
                Some(top) => top.id.clone(),
                None => return Ok(false),
            },
        };

        if self.index_of(&target).is_none() {
            return Ok(false);
        }

        let (hook, how) = if ok {
            (hooks::ON_OK, Dismissal::Ok)
        } else {
            (hooks::ON_CLOSE, Dismissal::Cancel)
        };
        self.run_hook(&target, hook)?;
        self.teardown(&target, how)?;
        Ok(true)
    }

    /// Close the topmost dialog
    pub fn close_topmost(&mut self, ok: bool) -> DialogResult<bool> {
        self.close(None, ok)
    }

    /// Force-close every dialog without `on_ok`/`on_close`, then run the
    /// close-all hook.
    pub fn close_all(&mut self) -> DialogResult<()> {
        while let Some(id) = self.dialogs.first().map(|d| d.id.clone()) {
            self.teardown(&id, Dismissal::Forced)?;
        }

        if let Some(hook) = self.close_all_hook.as_mut() {
            hook(&mut self.surface);
        }
        Ok(())
    }

    /// Esc without modifiers cancels the topmost dialog. Returns whether the
    /// key was consumed.
    pub fn handle_key_event(&mut self, key: KeyEvent) -> DialogResult<bool> {
        if key.code == KeyCode::Esc && key.modifiers.is_empty() {
            return self.close_topmost(false);
        }
        Ok(false)
    }

    /// Activate an OK or close button node.
    pub fn press(&mut self, node: NodeId) -> DialogResult<bool> {
        let ok = match self.surface.attr(node, ATTR_ACTION) {
            Some("ok") => true,
            Some("close") => false,
            _ => return Ok(false),
        };
        let Some(id) = self.surface.attr(node, ATTR_DIALOG_ID).map(DialogId::from) else {
            return Ok(false);
        };
        self.close(Some(&id), ok)
    }

    /// Run the `on_create` hooks queued before this tick. Dialogs closed in
    /// the meantime are skipped. Returns how many hooks ran.
    pub fn tick(&mut self) -> DialogResult<usize> {
        let due = self.pending_create.len();
        let mut ran = 0;

        for _ in 0..due {
            let Some(id) = self.pending_create.pop_front() else {
                break;
            };
            if self.index_of(&id).is_none() {
                warn!("skipping on_create for {}: already closed", id);
                continue;
            }
            self.run_hook(&id, hooks::ON_CREATE)?;
            ran += 1;
        }

        Ok(ran)
    }

    /// Whether `on_create` hooks are waiting for the next tick.
    pub fn has_pending(&self) -> bool {
        !self.pending_create.is_empty()
    }

    /// Replace the inner content of an open dialog.
    pub fn set_content(&mut self, id: &DialogId, content: Content) -> DialogResult<bool> {
        let Some(inner) = self.get(id).and_then(|d| d.inner) else {
            return Ok(false);
        };
        self.write_content(inner, &content)?;
        Ok(true)
    }

    /// Get dialog by ID
    pub fn get(&self, id: &DialogId) -> Option<&Dialog> {
        self.dialogs.iter().find(|d| d.id == *id)
    }

    /// Get dialog by ID (mutable)
    pub fn get_mut(&mut self, id: &DialogId) -> Option<&mut Dialog> {
        self.dialogs.iter_mut().find(|d| d.id == *id)
    }

    pub fn topmost(&self) -> Option<&Dialog> {
        self.dialogs.last()
    }

    /// Open dialogs, bottom first.
    pub fn iter(&self) -> impl Iterator<Item = &Dialog> {
        self.dialogs.iter()
    }

    pub fn ids(&self) -> Vec<DialogId> {
        self.dialogs.iter().map(|d| d.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.dialogs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dialogs.is_empty()
    }

    /// The innermost open dialog whose subtree contains `node`.
    pub fn owner_of(&self, node: NodeId) -> Option<DialogId> {
        self.dialogs
            .iter()
            .filter_map(|d| d.root.map(|root| (root, d)))
            .filter(|(root, _)| self.surface.contains(*root, node))
            .max_by_key(|(root, _)| self.surface.depth(*root))
            .map(|(_, d)| d.id.clone())
    }

    /// Open dialogs nested anywhere inside `id`, deepest first.
    pub fn children_of(&self, id: &DialogId) -> Vec<DialogId> {
        let Some(root) = self.get(id).and_then(|d| d.root) else {
            return Vec::new();
        };

        let mut children: Vec<(usize, DialogId)> = self
            .dialogs
            .iter()
            .filter(|d| d.id != *id)
            .filter_map(|d| {
                d.root
                    .filter(|r| self.surface.contains(root, *r))
                    .map(|r| (self.surface.depth(r), d.id.clone()))
            })
            .collect();
        children.sort_by(|a, b| b.0.cmp(&a.0));
        children.into_iter().map(|(_, id)| id).collect()
    }

    /// Paint-order layers for the open dialogs inside `area`.
    pub fn layers(&self, area: Rect) -> Vec<DialogLayer> {
        let top = self.dialogs.len().checked_sub(1);
        let mut layers: Vec<DialogLayer> = self
            .dialogs
            .iter()
            .enumerate()
            .map(|(index, dialog)| {
                let traits = DialogTraits::resolve(&dialog.class, &self.config);
                let size = if traits.full_screen {
                    DialogSize::FullScreen
                } else {
                    DialogSize::default()
                };
                let text = dialog
                    .inner
                    .and_then(|n| self.surface.text(n))
                    .unwrap_or_default();
                let widest = text.lines().map(|l| l.chars().count()).max().unwrap_or(0);
                let content_size = (
                    u16::try_from(widest).unwrap_or(u16::MAX),
                    u16::try_from(text.lines().count())
                        .unwrap_or(u16::MAX)
                        .saturating_add(1),
                );
                let nesting = self.nesting(dialog) as u16;
                DialogLayer::new(
                    dialog.id.clone(),
                    DialogLayout::calculate(size, area, content_size, nesting),
                    Some(index) == top,
                    self.z_index(dialog.number),
                )
            })
            .collect();

        layers.sort_by_key(|layer| layer.z_index());
        layers
    }

    fn nesting(&self, dialog: &Dialog) -> usize {
        let Some(root) = dialog.root else {
            return 0;
        };
        self.dialogs
            .iter()
            .filter(|d| d.id != dialog.id)
            .filter(|d| d.root.is_some_and(|r| self.surface.contains(r, root)))
            .count()
    }

    fn z_index(&self, number: u64) -> i32 {
        self.config
            .z_index_base
            .saturating_add(i32::try_from(number).unwrap_or(i32::MAX))
    }

    fn index_of(&self, id: &DialogId) -> Option<usize> {
        self.dialogs.iter().position(|d| d.id == *id)
    }

    /// Whether closing the open instances of `class` would take `node` with them.
    fn evicting_removes(&self, class: &Arc<DialogClass>, node: NodeId) -> bool {
        self.dialogs
            .iter()
            .filter(|d| Class::same(&d.class, class))
            .filter_map(|d| d.root)
            .any(|root| self.surface.contains(root, node))
    }

    fn evict_instances_of(&mut self, class: &Arc<DialogClass>) -> DialogResult<()> {
        let same: Vec<DialogId> = self
            .dialogs
            .iter()
            .filter(|d| Class::same(&d.class, class))
            .map(|d| d.id.clone())
            .collect();

        for id in same {
            debug!("closing {} to keep {} single", id, class.name());
            self.close(Some(&id), false)?;
        }
        Ok(())
    }

    /// Run an optional hook on an open dialog and apply what it staged.
    fn run_hook(&mut self, id: &DialogId, hook: &str) -> DialogResult<()> {
        let Some(index) = self.index_of(id) else {
            return Ok(());
        };
        let class = Arc::clone(&self.dialogs[index].class);
        if !class.responds_to(hook) {
            return Ok(());
        }

        debug!("{} {}", id, hook);
        class
            .resolve(hook)?
            .invoke(&mut self.dialogs[index], Value::Null)
            .map_err(DialogError::from_hook)?;

        let dialog = &mut self.dialogs[index];
        let staged = dialog.staged_content.take().zip(dialog.inner);
        let outbox = std::mem::take(&mut dialog.outbox);
        if let Some((content, inner)) = staged {
            self.write_content(inner, &content)?;
        }
        outbox.into_iter().for_each(|event| self.send_event(event));
        Ok(())
    }

    fn teardown(&mut self, id: &DialogId, how: Dismissal) -> DialogResult<()> {
        let Some(index) = self.index_of(id) else {
            return Ok(());
        };
        self.dialogs[index].token.cancel();

        for child in self.children_of(id) {
            match how {
                Dismissal::Forced => self.teardown(&child, Dismissal::Forced)?,
                _ => {
                    self.close(Some(&child), false)?;
                }
            }
        }

        // A child hook may have closed us already
        let Some(index) = self.index_of(id) else {
            return Ok(());
        };

        if let Some(root) = self.dialogs[index].root {
            if self.surface.exists(root) {
                self.surface.remove(root)?;
            }
        }

        let mut dialog = self.dialogs.remove(index);
        dialog.state = DialogState::Closed;
        self.pending_create.retain(|pending| pending != id);

        if let Some(node) = dialog.focus_on_close.take() {
            if let Err(err) = self.surface.focus(node) {
                debug!("{}: focus not restored: {}", id, err);
            }
        }
        if let Some(selection) = dialog.selection_on_close.take() {
            if let Err(err) = self.surface.set_selection(Some(selection)) {
                debug!("{}: selection not restored: {}", id, err);
            }
        }

        let class = Arc::clone(&dialog.class);
        if class.responds_to(hooks::ON_DESTROY) {
            class
                .resolve(hooks::ON_DESTROY)?
                .invoke(&mut dialog, Value::Null)
                .map_err(DialogError::from_hook)?;
        }

        debug!("closed {} ({:?})", id, how);
        let outbox = std::mem::take(&mut dialog.outbox);
        outbox.into_iter().for_each(|event| self.send_event(event));
        self.send_event(DialogEvent::Closed {
            id: id.clone(),
            how,
        });
        Ok(())
    }

    fn build_nodes(
        &mut self,
        dialog: &Dialog,
        traits: &DialogTraits,
        content: &Content,
    ) -> DialogResult<(NodeId, NodeId)> {
        let id = dialog.id.as_str();
        let z_index = self.z_index(dialog.number).to_string();

        let root = self.surface.create("dialog");
        self.surface.set_attr(root, ATTR_DIALOG_ID, id)?;
        self.surface.set_attr(root, "class", dialog.class.name())?;
        self.surface.set_attr(root, ATTR_Z_INDEX, &z_index)?;

        let inner = self.surface.create("div");
        self.surface.set_attr(inner, ATTR_ROLE, "inner")?;
        self.surface.append(root, inner)?;
        self.write_content(inner, content)?;

        let buttons: Vec<(&str, &str)> = [
            traits.ok_label.as_deref().map(|label| ("ok", label)),
            traits.close_label.as_deref().map(|label| ("close", label)),
        ]
        .into_iter()
        .flatten()
        .collect();

        if !buttons.is_empty() {
            let controls = self.surface.create("div");
            self.surface.set_attr(controls, ATTR_ROLE, "controls")?;
            self.surface.append(root, controls)?;
            for (action, label) in buttons {
                let button = self.surface.create("button");
                self.surface.set_text(button, label)?;
                self.surface.set_attr(button, ATTR_ACTION, action)?;
                self.surface.set_attr(button, ATTR_DIALOG_ID, id)?;
                self.surface.append(controls, button)?;
            }
        }

        Ok((root, inner))
    }

    fn write_content(&mut self, inner: NodeId, content: &Content) -> DialogResult<()> {
        self.surface.set_text(inner, &content.text)?;
        if let Some(style) = &content.style {
            self.surface.set_attr(inner, ATTR_STYLE, style)?;
        }
        Ok(())
    }

    /// Send an event if event sender is configured
    fn send_event(&self, event: DialogEvent) {
        if let Some(sender) = &self.event_sender {
            let _ = sender.send(event);
        }
    }
}

impl Default for DialogManager<NodeTree> {
    fn default() -> Self {
        Self::in_memory()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::ClassBuilder;
    use crate::dialogs::{fields, DialogCall};
    use crate::surface::Selection;
    use crossterm::event::KeyModifiers;
    use serde_json::json;
    use std::sync::Mutex;

    type Log = Arc<Mutex<Vec<String>>>;

    fn record(log: &Log, hook: &'static str) -> impl Fn(&mut DialogCall<'_>) -> anyhow::Result<Value> {
        let log = Arc::clone(log);
        move |call: &mut DialogCall<'_>| {
            let id = call.this().id().to_string();
            log.lock().unwrap().push(format!("{}:{}", id, hook));
            Ok(Value::Null)
        }
    }

    fn text_init(call: &mut DialogCall<'_>) -> anyhow::Result<Value> {
        let title = call.this().get_str("title").unwrap_or("dialog").to_string();
        Ok(Value::String(title))
    }

    /// A class recording every hook it receives.
    fn recording_class(
        manager: &DialogManager,
        name: &str,
        log: &Log,
        singleton: bool,
    ) -> Arc<DialogClass> {
        ClassBuilder::new(name)
            .extends(manager.base_class())
            .method(hooks::INIT, text_init)
            .method(hooks::ON_CREATE, record(log, "create"))
            .method(hooks::ON_OK, record(log, "ok"))
            .method(hooks::ON_CLOSE, record(log, "close"))
            .method(hooks::ON_DESTROY, record(log, "destroy"))
            .field(fields::SINGLETON, singleton)
            .build()
    }

    fn entries(log: &Log) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    fn assert_stack_matches_state(manager: &DialogManager) {
        for dialog in manager.iter() {
            assert_eq!(dialog.state(), DialogState::Open, "{} on stack", dialog.id());
            assert!(manager.surface().is_attached(dialog.root().unwrap()));
        }
    }

    #[test]
    fn test_open_builds_subtree_and_registers() {
        let mut manager = DialogManager::in_memory();
        let log = Log::default();
        let class = recording_class(&manager, "Message", &log, false);

        let id = manager
            .open(&class, None, json!({"title": "Feed saved"}))
            .unwrap()
            .unwrap();

        assert_eq!(id.as_str(), "dlg_1");
        assert_eq!(manager.len(), 1);
        let dialog = manager.get(&id).unwrap();
        assert!(dialog.is_open());
        let surface = manager.surface();
        let root = dialog.root().unwrap();
        assert_eq!(surface.parent(root), Some(surface.root()));
        assert_eq!(surface.attr(root, ATTR_DIALOG_ID), Some("dlg_1"));
        assert_eq!(surface.attr(root, ATTR_Z_INDEX), Some("21"));
        assert_eq!(surface.text(dialog.inner().unwrap()), Some("Feed saved"));
        assert_eq!(surface.full_text(root), "Feed savedokcancel");
        assert_stack_matches_state(&manager);
    }

    #[test]
    fn test_on_create_waits_for_tick() {
        let mut manager = DialogManager::in_memory();
        let log = Log::default();
        let class = recording_class(&manager, "Loader", &log, false);

        let id = manager.open(&class, None, Value::Null).unwrap().unwrap();
        assert!(entries(&log).is_empty());
        assert!(manager.has_pending());

        assert_eq!(manager.tick().unwrap(), 1);
        assert_eq!(entries(&log), vec![format!("{}:create", id)]);
        assert_eq!(manager.tick().unwrap(), 0);
    }

    #[test]
    fn test_on_create_skipped_when_closed_before_tick() {
        let mut manager = DialogManager::in_memory();
        let log = Log::default();
        let class = recording_class(&manager, "Loader", &log, false);

        let id = manager.open(&class, None, Value::Null).unwrap().unwrap();
        manager.close(Some(&id), false).unwrap();

        assert_eq!(manager.tick().unwrap(), 0);
        assert!(!entries(&log).iter().any(|e| e.ends_with(":create")));
    }

    #[test]
    fn test_singleton_keeps_only_the_newest() {
        let mut manager = DialogManager::in_memory();
        let log = Log::default();
        let picker = recording_class(&manager, "CategoryPicker", &log, true);
        let other = recording_class(&manager, "Message", &log, false);

        let note = manager.open(&other, None, Value::Null).unwrap().unwrap();
        let first = manager.open(&picker, None, Value::Null).unwrap().unwrap();
        let token = manager.get(&first).unwrap().token();
        let second = manager.open(&picker, None, Value::Null).unwrap().unwrap();
        let third = manager.open(&picker, None, Value::Null).unwrap().unwrap();

        assert_eq!(manager.ids(), vec![note, third]);
        assert!(token.is_cancelled());
        let log = entries(&log);
        for evicted in [&first, &second] {
            assert!(log.contains(&format!("{}:close", evicted)));
            assert!(log.contains(&format!("{}:destroy", evicted)));
            assert!(!log.contains(&format!("{}:ok", evicted)));
        }
        assert_stack_matches_state(&manager);
    }

    #[test]
    fn test_singleton_is_per_exact_class() {
        let mut manager = DialogManager::in_memory();
        let log = Log::default();
        let picker = recording_class(&manager, "CategoryPicker", &log, true);
        let derived = ClassBuilder::new("RecommendPicker")
            .extends(&picker)
            .build();

        manager.open(&picker, None, Value::Null).unwrap();
        manager.open(&derived, None, Value::Null).unwrap();
        manager.open(&derived, None, Value::Null).unwrap();

        assert_eq!(manager.len(), 2);
        assert_eq!(manager.get(&DialogId::numbered(1)).unwrap().class().name(), "CategoryPicker");
    }

    #[test]
    fn test_cascade_closes_children_first() {
        let mut manager = DialogManager::in_memory();
        let log = Log::default();
        let class = recording_class(&manager, "Panel", &log, false);

        let parent = manager.open(&class, None, Value::Null).unwrap().unwrap();
        let parent_inner = manager.get(&parent).unwrap().inner().unwrap();
        let first = manager
            .open(&class, Some(parent_inner), Value::Null)
            .unwrap()
            .unwrap();
        let second = manager
            .open(&class, Some(parent_inner), Value::Null)
            .unwrap()
            .unwrap();
        let unrelated = manager.open(&class, None, Value::Null).unwrap().unwrap();
        assert_eq!(manager.children_of(&parent), vec![first.clone(), second.clone()]);

        assert!(manager.close(Some(&parent), true).unwrap());

        let log = entries(&log);
        let at = |entry: String| log.iter().position(|e| *e == entry).unwrap();
        let parent_destroy = at(format!("{}:destroy", parent));
        assert!(at(format!("{}:ok", parent)) < at(format!("{}:close", first)));
        assert!(at(format!("{}:destroy", first)) < parent_destroy);
        assert!(at(format!("{}:destroy", second)) < parent_destroy);
        assert_eq!(manager.ids(), vec![unrelated]);
        assert_stack_matches_state(&manager);
    }

    #[test]
    fn test_nested_tokens_cancel_with_owner() {
        let mut manager = DialogManager::in_memory();
        let log = Log::default();
        let class = recording_class(&manager, "Panel", &log, false);

        let parent = manager.open(&class, None, Value::Null).unwrap().unwrap();
        let inner = manager.get(&parent).unwrap().inner().unwrap();
        let child = manager.open(&class, Some(inner), Value::Null).unwrap().unwrap();
        let parent_token = manager.get(&parent).unwrap().token();
        let child_token = manager.get(&child).unwrap().token();

        assert_eq!(manager.owner_of(inner), Some(parent.clone()));
        manager.close(Some(&child), false).unwrap();
        assert!(child_token.is_cancelled());
        assert!(!parent_token.is_cancelled());

        let child = manager.open(&class, Some(inner), Value::Null).unwrap().unwrap();
        let child_token = manager.get(&child).unwrap().token();
        manager.close(Some(&parent), false).unwrap();
        assert!(child_token.is_cancelled());
        assert!(manager.is_empty());
    }

    #[test]
    fn test_close_topmost_targets_last_opened() {
        let mut manager = DialogManager::in_memory();
        let log = Log::default();
        let class = recording_class(&manager, "Message", &log, false);

        let a = manager.open(&class, None, Value::Null).unwrap().unwrap();
        let b = manager.open(&class, None, Value::Null).unwrap().unwrap();
        let c = manager.open(&class, None, Value::Null).unwrap().unwrap();

        assert!(manager.close_topmost(false).unwrap());

        assert_eq!(manager.ids(), vec![a, b]);
        assert!(entries(&log).contains(&format!("{}:close", c)));
        assert!(manager.close(Some(&DialogId::from("")), false).unwrap());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_escape_closes_topmost() {
        let mut manager = DialogManager::in_memory();
        let log = Log::default();
        let class = recording_class(&manager, "Message", &log, false);
        manager.open(&class, None, Value::Null).unwrap();

        let ctrl_esc = KeyEvent::new(KeyCode::Esc, KeyModifiers::CONTROL);
        assert!(!manager.handle_key_event(ctrl_esc).unwrap());
        assert!(!manager.handle_key_event(KeyEvent::from(KeyCode::Enter)).unwrap());
        assert!(manager.handle_key_event(KeyEvent::from(KeyCode::Esc)).unwrap());
        assert!(manager.is_empty());
        assert!(!manager.handle_key_event(KeyEvent::from(KeyCode::Esc)).unwrap());
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut manager = DialogManager::in_memory();
        let log = Log::default();
        let class = recording_class(&manager, "Message", &log, false);
        let id = manager.open(&class, None, Value::Null).unwrap().unwrap();

        assert!(manager.close(Some(&id), false).unwrap());
        assert!(!manager.close(Some(&id), false).unwrap());
        assert!(!manager.close(Some(&DialogId::from("dlg_404")), true).unwrap());

        assert_eq!(
            entries(&log),
            vec![format!("{}:close", id), format!("{}:destroy", id)]
        );
    }

    #[test]
    fn test_veto_attaches_nothing() {
        let mut manager = DialogManager::in_memory();
        let (sender, mut receiver) = mpsc::unbounded_channel();
        manager.set_event_sender(sender);
        let needs_input = ClassBuilder::new("NeedsSelection")
            .extends(manager.base_class())
            .method(hooks::INIT, |call: &mut DialogCall<'_>| {
                Ok(call.this().get("selected").cloned().unwrap_or(Value::Null))
            })
            .build();
        let nodes = manager.surface().len();

        assert_eq!(manager.open(&needs_input, None, Value::Null).unwrap(), None);

        assert!(manager.is_empty());
        assert_eq!(manager.surface().len(), nodes);
        assert!(manager.surface().children(manager.surface().root()).is_empty());
        assert_eq!(
            receiver.try_recv().unwrap(),
            DialogEvent::Vetoed {
                class: "NeedsSelection".into()
            }
        );

        let id = manager
            .open(&needs_input, None, json!({"selected": "sports"}))
            .unwrap()
            .unwrap();
        assert_eq!(id.as_str(), "dlg_2");
    }

    #[test]
    fn test_missing_init_is_configuration_error() {
        let mut manager = DialogManager::in_memory();
        let class = ClassBuilder::new("Broken")
            .extends(manager.base_class())
            .build();

        let err = manager.open(&class, None, Value::Null).unwrap_err();

        assert!(matches!(
            err,
            DialogError::Class(crate::class::ClassError::MethodNotFound { .. })
        ));
        assert!(manager.is_empty());
    }

    #[test]
    fn test_hook_errors_propagate() {
        let mut manager = DialogManager::in_memory();
        let class = ClassBuilder::new("Failing")
            .extends(manager.base_class())
            .method(hooks::INIT, text_init)
            .method(hooks::ON_OK, |_call: &mut DialogCall<'_>| {
                Err(anyhow::anyhow!("commit failed"))
            })
            .build();
        let id = manager.open(&class, None, Value::Null).unwrap().unwrap();

        let err = manager.close(Some(&id), true).unwrap_err();

        assert!(matches!(err, DialogError::Hook(_)));
        assert!(manager.get(&id).unwrap().is_open());
    }

    #[test]
    fn test_buttons_follow_labels_and_press() {
        let mut manager = DialogManager::in_memory();
        let log = Log::default();
        let confirm = recording_class(&manager, "Confirm", &log, false);
        let info = ClassBuilder::new("Info")
            .extends(manager.base_class())
            .method(hooks::INIT, text_init)
            .build();
        let silent = ClassBuilder::new("Silent")
            .extends(&info)
            .field(fields::CLOSE_LABEL, Value::Null)
            .build();

        let buttons = |manager: &DialogManager, id: &DialogId| -> Vec<String> {
            let root = manager.get(id).unwrap().root().unwrap();
            let surface = manager.surface();
            surface
                .children(root)
                .into_iter()
                .filter(|n| surface.attr(*n, ATTR_ROLE) == Some("controls"))
                .flat_map(|controls| surface.children(controls))
                .map(|b| surface.text(b).unwrap_or_default().to_string())
                .collect()
        };

        let info_id = manager.open(&info, None, Value::Null).unwrap().unwrap();
        let silent_id = manager.open(&silent, None, Value::Null).unwrap().unwrap();
        let confirm_id = manager.open(&confirm, None, Value::Null).unwrap().unwrap();
        assert_eq!(buttons(&manager, &info_id), vec!["close"]);
        assert!(buttons(&manager, &silent_id).is_empty());
        assert_eq!(buttons(&manager, &confirm_id), vec!["ok", "cancel"]);

        let root = manager.get(&confirm_id).unwrap().root().unwrap();
        let surface = manager.surface();
        let ok_button = surface
            .children(root)
            .into_iter()
            .flat_map(|n| surface.children(n))
            .find(|n| surface.attr(*n, ATTR_ACTION) == Some("ok"))
            .unwrap();

        assert!(manager.press(ok_button).unwrap());
        assert!(entries(&log).contains(&format!("{}:ok", confirm_id)));
        assert!(!manager.press(ok_button).unwrap());
        assert!(!manager.press(root).unwrap());
    }

    #[test]
    fn test_focus_and_selection_restored() {
        let mut manager = DialogManager::in_memory();
        let root = manager.surface().root();
        let field = manager.surface_mut().add_child(root, "textarea").unwrap();
        manager.surface_mut().set_text(field, "word list").unwrap();
        manager.surface_mut().focus(field).unwrap();
        let selection = Selection { node: field, start: 0, end: 4 };
        manager.surface_mut().set_selection(Some(selection)).unwrap();

        let class = ClassBuilder::new("WordPicker")
            .extends(manager.base_class())
            .method(hooks::INIT, text_init)
            .field(fields::RESTORE_FOCUS, true)
            .field(fields::RESTORE_SELECTION, true)
            .build();
        let id = manager.open(&class, None, Value::Null).unwrap().unwrap();
        let inner = manager.get(&id).unwrap().inner().unwrap();
        manager.surface_mut().focus(inner).unwrap();
        manager.surface_mut().set_selection(None).unwrap();

        manager.close(Some(&id), false).unwrap();

        assert_eq!(manager.surface().focused(), Some(field));
        assert_eq!(manager.surface().selection(), Some(selection));
    }

    #[test]
    fn test_close_all_skips_hooks_and_runs_close_all_hook() {
        let mut manager = DialogManager::in_memory();
        let log = Log::default();
        let class = recording_class(&manager, "Message", &log, false);
        let resets = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&resets);
        manager.set_close_all_hook(move |_surface: &mut NodeTree| {
            *counter.lock().unwrap() += 1;
        });

        let a = manager.open(&class, None, Value::Null).unwrap().unwrap();
        let b = manager.open(&class, None, Value::Null).unwrap().unwrap();
        manager.close_all().unwrap();

        assert!(manager.is_empty());
        assert_eq!(
            entries(&log),
            vec![format!("{}:destroy", a), format!("{}:destroy", b)]
        );
        assert_eq!(*resets.lock().unwrap(), 1);

        manager.close_all().unwrap();
        assert_eq!(*resets.lock().unwrap(), 2);
    }

    #[test]
    fn test_hooks_stage_content_and_events() {
        let mut manager = DialogManager::in_memory();
        let (sender, mut receiver) = mpsc::unbounded_channel();
        manager.set_event_sender(sender);
        let class = ClassBuilder::new("FeedValidator")
            .extends(manager.base_class())
            .method(hooks::INIT, |_call: &mut DialogCall<'_>| Ok(json!("loading...")))
            .method(hooks::ON_CREATE, |call: &mut DialogCall<'_>| {
                let dialog = call.this();
                dialog.replace_content(Content::text("3 items valid"));
                dialog.emit("validated", json!({"items": 3}));
                Ok(Value::Null)
            })
            .build();

        let id = manager.open(&class, None, Value::Null).unwrap().unwrap();
        let inner = manager.get(&id).unwrap().inner().unwrap();
        assert_eq!(manager.surface().text(inner), Some("loading..."));

        manager.tick().unwrap();

        assert_eq!(manager.surface().text(inner), Some("3 items valid"));
        let events: Vec<_> = std::iter::from_fn(|| receiver.try_recv().ok()).collect();
        assert_eq!(
            events,
            vec![
                DialogEvent::Opened {
                    id: id.clone(),
                    class: "FeedValidator".into()
                },
                DialogEvent::Custom {
                    id: id.clone(),
                    name: "validated".into(),
                    payload: json!({"items": 3}),
                },
            ]
        );

        assert!(manager
            .set_content(&id, Content::text("done").with_style("color:green"))
            .unwrap());
        assert_eq!(manager.surface().attr(inner, ATTR_STYLE), Some("color:green"));
    }

    #[test]
    fn test_unknown_parent_is_rejected() {
        let mut manager = DialogManager::in_memory();
        let class = ClassBuilder::new("Info")
            .extends(manager.base_class())
            .method(hooks::INIT, text_init)
            .build();

        let err = manager
            .open(&class, Some(NodeId(4242)), Value::Null)
            .unwrap_err();

        assert!(matches!(err, DialogError::Surface(SurfaceError::UnknownNode(_))));
    }

    #[test]
    fn test_layers_paint_in_stack_order() {
        let mut manager = DialogManager::in_memory();
        let log = Log::default();
        let class = recording_class(&manager, "Panel", &log, false);
        let parent = manager.open(&class, None, Value::Null).unwrap().unwrap();
        let inner = manager.get(&parent).unwrap().inner().unwrap();
        let child = manager.open(&class, Some(inner), Value::Null).unwrap().unwrap();

        let layers = manager.layers(Rect::new(0, 0, 120, 40));

        assert_eq!(layers.len(), 2);
        assert_eq!(layers[0].dialog_id(), &parent);
        assert_eq!(layers[1].dialog_id(), &child);
        assert!(layers[1].is_focused());
        assert!(!layers[0].is_focused());
        assert_eq!(
            layers[1].layout().dialog_area.x,
            layers[0].layout().dialog_area.x + 2
        );
    }

    #[test]
    fn test_singleton_veto_keeps_open_instance() {
        let mut manager = DialogManager::in_memory();
        let log = Log::default();
        let picker = ClassBuilder::new("CategoryPicker")
            .extends(manager.base_class())
            .method(hooks::INIT, |call: &mut DialogCall<'_>| {
                Ok(call.this().get("selected").cloned().unwrap_or(Value::Null))
            })
            .method(hooks::ON_CLOSE, record(&log, "close"))
            .field(fields::SINGLETON, true)
            .build();

        let open = manager
            .open(&picker, None, json!({"selected": "sports"}))
            .unwrap()
            .unwrap();

        assert_eq!(manager.open(&picker, None, Value::Null).unwrap(), None);

        assert_eq!(manager.ids(), vec![open.clone()]);
        assert!(manager.get(&open).unwrap().is_open());
        assert!(entries(&log).is_empty());
    }

    #[test]
    fn test_singleton_inside_own_instance_is_rejected() {
        let mut manager = DialogManager::in_memory();
        let log = Log::default();
        let picker = recording_class(&manager, "CategoryPicker", &log, true);
        let other = recording_class(&manager, "Message", &log, false);

        let outer = manager.open(&picker, None, Value::Null).unwrap().unwrap();
        let inner = manager.get(&outer).unwrap().inner().unwrap();
        let note = manager.open(&other, Some(inner), Value::Null).unwrap().unwrap();
        let note_inner = manager.get(&note).unwrap().inner().unwrap();

        for parent in [inner, note_inner] {
            let err = manager.open(&picker, Some(parent), Value::Null).unwrap_err();
            assert!(matches!(err, DialogError::NestedSingleton(_)));
        }
        let bogus = manager.open(&picker, Some(NodeId(4242)), Value::Null);
        assert!(matches!(
            bogus,
            Err(DialogError::Surface(SurfaceError::UnknownNode(_)))
        ));

        assert_eq!(manager.ids(), vec![outer, note]);
        assert!(!entries(&log).iter().any(|e| e.ends_with(":close")));
    }

    #[test]
    fn test_close_all_forces_nested_dialogs() {
        let mut manager = DialogManager::in_memory();
        let (sender, mut receiver) = mpsc::unbounded_channel();
        manager.set_event_sender(sender);
        let log = Log::default();
        let class = recording_class(&manager, "Panel", &log, false);

        let parent = manager.open(&class, None, Value::Null).unwrap().unwrap();
        let inner = manager.get(&parent).unwrap().inner().unwrap();
        let child = manager.open(&class, Some(inner), Value::Null).unwrap().unwrap();
        manager.close_all().unwrap();

        assert!(manager.is_empty());
        assert_eq!(
            entries(&log),
            vec![format!("{}:destroy", child), format!("{}:destroy", parent)]
        );
        let closed: Vec<_> = std::iter::from_fn(|| receiver.try_recv().ok())
            .filter_map(|e| match e {
                DialogEvent::Closed { id, how } => Some((id, how)),
                _ => None,
            })
            .collect();
        assert_eq!(
            closed,
            vec![(child, Dismissal::Forced), (parent, Dismissal::Forced)]
        );
    }

    #[test]
    fn test_layers_survive_very_tall_content() {
        let mut manager = DialogManager::in_memory();
        let class = ClassBuilder::new("Report")
            .extends(manager.base_class())
            .method(hooks::INIT, |_call: &mut DialogCall<'_>| {
                Ok(Value::String("a\n".repeat(usize::from(u16::MAX))))
            })
            .build();
        manager.open(&class, None, Value::Null).unwrap();

        let area = Rect::new(0, 0, 80, 24);
        let layers = manager.layers(area);

        assert_eq!(layers.len(), 1);
        assert_eq!(layers[0].layout().dialog_area.height, area.height);
    }
}
