use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::layout::{Constraint, Direction, Layout};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::{events::Event, render, Frame};
use crate::config::Config;
use crate::demo::{validation_report, DemoClasses};
use crate::dialogs::{spawn_guarded, DialogEvent, DialogManager};
use crate::surface::{NodeTree, Surface};

const STATUS_LINES: usize = 6;
const CATEGORIES: [&str; 5] = ["Politics", "Sports", "Science", "Culture", "Economy"];

/// Main application state and controller
pub struct App {
    /// Whether the application should quit
    pub should_quit: bool,

    manager: DialogManager,

    classes: DemoClasses,

    /// Events published by the dialog manager
    dialog_events: mpsc::UnboundedReceiver<DialogEvent>,

    /// Sender for work finishing in the background
    event_sender: mpsc::UnboundedSender<Event>,

    /// Most recent dialog events, newest last
    status: VecDeque<String>,

    /// Counter for message dialog captions
    opened: usize,
}

impl App {
    pub fn new(config: Config, event_sender: mpsc::UnboundedSender<Event>) -> Self {
        let mut manager = DialogManager::new(NodeTree::new(), config);
        let (sender, dialog_events) = mpsc::unbounded_channel();
        manager.set_event_sender(sender);
        manager.set_close_all_hook(|surface: &mut NodeTree| {
            let root = surface.root();
            if let Err(err) = surface.set_attr(root, "side-panel", "docked") {
                debug!("side panel not reset: {}", err);
            }
        });
        let classes = DemoClasses::new(&manager);

        Self {
            should_quit: false,
            manager,
            classes,
            dialog_events,
            event_sender,
            status: VecDeque::new(),
            opened: 0,
        }
    }

    pub fn manager(&self) -> &DialogManager {
        &self.manager
    }

    pub fn status(&self) -> impl Iterator<Item = &str> {
        self.status.iter().map(String::as_str)
    }

    /// Handle one event. Returns true when the application should exit.
    pub fn handle_event(&mut self, event: Event) -> Result<bool> {
        match event {
            Event::Key(key) => self.handle_key(key)?,
            Event::Resize(width, height) => debug!("resized to {}x{}", width, height),
            Event::Tick => {
                self.manager.tick()?;
            }
            Event::Validated { id, url, valid } => {
                self.manager.set_content(&id, validation_report(&url, valid))?;
            }
        }

        self.drain_dialog_events();
        Ok(self.should_quit)
    }

    fn handle_key(&mut self, key: KeyEvent) -> Result<()> {
        if self.manager.handle_key_event(key)? {
            return Ok(());
        }

        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('m') => {
                self.opened += 1;
                let text = format!("Message #{} was moderated", self.opened);
                self.manager
                    .open(&self.classes.message, None, json!({ "text": text }))?;
            }
            KeyCode::Char('p') => {
                self.manager.open(
                    &self.classes.category_picker,
                    None,
                    json!({ "categories": CATEGORIES }),
                )?;
            }
            KeyCode::Char('r') => {
                self.manager.open(
                    &self.classes.recommend_picker,
                    None,
                    json!({ "categories": CATEGORIES, "selected": "Science" }),
                )?;
            }
            KeyCode::Char('v') => {
                self.manager.open(
                    &self.classes.feed_validator,
                    None,
                    json!({ "url": "http://feeds.example.com/world.rss" }),
                )?;
            }
            KeyCode::Char('c') => {
                let parent = self.manager.topmost().and_then(|d| d.inner());
                self.opened += 1;
                let text = format!("Nested note #{}", self.opened);
                self.manager
                    .open(&self.classes.message, parent, json!({ "text": text }))?;
            }
            KeyCode::Enter => {
                self.manager.close_topmost(true)?;
            }
            KeyCode::Char('x') => {
                self.manager.close_all()?;
                self.push_status("all dialogs closed".to_string());
            }
            _ => {}
        }
        Ok(())
    }

    fn drain_dialog_events(&mut self) {
        while let Ok(event) = self.dialog_events.try_recv() {
            if let DialogEvent::Custom { id, name, payload } = &event {
                if name == "validation_started" {
                    self.start_validation(id.clone(), payload);
                }
            }
            let line = serde_json::to_string(&event).unwrap_or_else(|_| format!("{:?}", event));
            self.push_status(line);
        }
    }

    /// Kick off the feed check for a validator dialog. The result is dropped
    /// when the dialog closes first.
    fn start_validation(&self, id: crate::dialogs::DialogId, payload: &Value) {
        let Some(token) = self.manager.get(&id).map(|d| d.token()) else {
            return;
        };
        let url = payload["url"].as_str().unwrap_or_default().to_string();
        let sender = self.event_sender.clone();
        info!("validating {} for {}", url, id);

        let work_token = token.clone();
        tokio::spawn(async move {
            let checked = spawn_guarded(work_token, async move {
                tokio::time::sleep(Duration::from_millis(1500)).await;
                let valid = url.ends_with(".rss") || url.ends_with(".xml");
                (url, valid)
            })
            .await;

            match checked {
                Ok(Some((url, valid))) if !token.is_cancelled() => {
                    let _ = sender.send(Event::Validated { id, url, valid });
                }
                _ => debug!("validation for {} abandoned", id),
            }
        });
    }

    fn push_status(&mut self, line: String) {
        self.status.push_back(line);
        while self.status.len() > STATUS_LINES {
            self.status.pop_front();
        }
    }

    pub fn render(&mut self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(5), Constraint::Length(STATUS_LINES as u16 + 2)])
            .split(frame.size());

        render::render_page(frame, chunks[0]);
        render::render_dialogs(frame, chunks[0], &self.manager);
        render::render_status(frame, chunks[1], self.status());
    }
}
