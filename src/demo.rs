//! Console dialogs used by the replay command and the TUI
//!
//! A message box, a category picker that may only be open once, a picker for
//! recommended categories layered on top of it, and a full-screen feed
//! validator that starts its work from `on_create`.

use crate::class::ClassBuilder;
use crate::dialogs::{fields, hooks, Content, DialogCall, DialogClass, DialogManager};
use crate::surface::Surface;
use serde_json::{json, Value};
use std::sync::Arc;

pub const MESSAGE: &str = "message";
pub const CATEGORY_PICKER: &str = "category_picker";
pub const RECOMMEND_PICKER: &str = "recommend_picker";
pub const FEED_VALIDATOR: &str = "feed_validator";

/// The demo classes, built against one manager's base class.
#[derive(Debug, Clone)]
pub struct DemoClasses {
    pub message: Arc<DialogClass>,
    pub category_picker: Arc<DialogClass>,
    pub recommend_picker: Arc<DialogClass>,
    pub feed_validator: Arc<DialogClass>,
}

impl DemoClasses {
    pub fn new<S: Surface>(manager: &DialogManager<S>) -> Self {
        let base = manager.base_class();

        let message = ClassBuilder::new("Message")
            .extends(base)
            .method(hooks::INIT, message_init)
            .build();

        let category_picker = ClassBuilder::new("CategoryPicker")
            .extends(base)
            .method(hooks::INIT, picker_init)
            .method(hooks::ON_OK, picker_ok)
            .field(fields::SINGLETON, true)
            .field(fields::RESTORE_FOCUS, true)
            .build();

        let recommend_picker = ClassBuilder::new("RecommendPicker")
            .extends(&category_picker)
            .method(hooks::INIT, |call: &mut DialogCall<'_>| {
                let listed = call.call_super(Value::Null)?;
                Ok(match listed.as_str() {
                    Some(text) => json!(format!("Recommended\n{}", text)),
                    None => listed,
                })
            })
            .method(hooks::ON_OK, |call: &mut DialogCall<'_>| {
                call.this().set("recommended", true);
                call.call_super(Value::Null)
            })
            .build();

        let feed_validator = ClassBuilder::new("FeedValidator")
            .extends(base)
            .method(hooks::INIT, |call: &mut DialogCall<'_>| {
                Ok(match call.this().get_str("url") {
                    Some(url) => json!({ "text": format!("Validating {} ...", url), "style": "loading" }),
                    None => Value::Null,
                })
            })
            .method(hooks::ON_CREATE, |call: &mut DialogCall<'_>| {
                let dialog = call.this();
                let url = dialog.get_str("url").unwrap_or_default().to_string();
                dialog.set("validating", true);
                dialog.emit("validation_started", json!({ "url": url }));
                Ok(Value::Null)
            })
            .method(hooks::ON_DESTROY, |call: &mut DialogCall<'_>| {
                call.this().emit("page_restored", Value::Null);
                Ok(Value::Null)
            })
            .field(fields::SIZE, "full")
            .field(fields::CLOSE_LABEL, "back")
            .build();

        Self {
            message,
            category_picker,
            recommend_picker,
            feed_validator,
        }
    }

    pub fn by_name(&self, name: &str) -> Option<&Arc<DialogClass>> {
        match name {
            MESSAGE => Some(&self.message),
            CATEGORY_PICKER => Some(&self.category_picker),
            RECOMMEND_PICKER => Some(&self.recommend_picker),
            FEED_VALIDATOR => Some(&self.feed_validator),
            _ => None,
        }
    }

    pub fn names() -> [&'static str; 4] {
        [MESSAGE, CATEGORY_PICKER, RECOMMEND_PICKER, FEED_VALIDATOR]
    }
}

/// Text the feed validator shows once validation finished.
pub fn validation_report(url: &str, valid: bool) -> Content {
    if valid {
        Content::text(format!("{}: feed is valid", url)).with_style("ok")
    } else {
        Content::text(format!("{}: feed could not be parsed", url)).with_style("error")
    }
}

fn message_init(call: &mut DialogCall<'_>) -> anyhow::Result<Value> {
    let text = call
        .this()
        .get_str("text")
        .unwrap_or("Nothing to show")
        .to_string();
    Ok(Value::String(text))
}

fn picker_init(call: &mut DialogCall<'_>) -> anyhow::Result<Value> {
    let dialog = call.this();
    let categories: Vec<String> = dialog
        .get("categories")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    if categories.is_empty() {
        return Ok(Value::Null);
    }

    if dialog.get_str("selected").is_none() {
        dialog.set("selected", categories[0].clone());
    }
    let selected = dialog.get_str("selected").unwrap_or_default().to_string();

    let lines: Vec<String> = categories
        .iter()
        .map(|c| {
            let mark = if *c == selected { '*' } else { ' ' };
            format!("{} {}", mark, c)
        })
        .collect();
    Ok(Value::String(lines.join("\n")))
}

fn picker_ok(call: &mut DialogCall<'_>) -> anyhow::Result<Value> {
    let dialog = call.this();
    let payload = json!({
        "category": dialog.get("selected").cloned().unwrap_or(Value::Null),
        "recommended": dialog.get("recommended").cloned().unwrap_or(json!(false)),
    });
    dialog.emit("category_selected", payload);
    Ok(Value::Null)
}
