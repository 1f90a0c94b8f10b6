use anyhow::{anyhow, Context, Result};
use clap::Args;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{self, Read};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::Config;
use crate::demo::DemoClasses;
use crate::dialogs::manager::ATTR_ACTION;
use crate::dialogs::{DialogEvent, DialogId, DialogManager, DialogState};
use crate::surface::{NodeId, NodeTree, Surface};

/// Replay a JSON script of dialog operations and print what happened
#[derive(Args)]
pub struct ReplayCommand {
    /// Script to replay. If not provided, will read from stdin
    pub script: Option<PathBuf>,

    /// Pretty-print each step report
    #[arg(short = 'p', long = "pretty")]
    pub pretty: bool,
}

/// One scripted operation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    /// Construct a dialog of a demo class, optionally inside another dialog
    Open {
        class: String,
        #[serde(default)]
        parent: Option<DialogId>,
        #[serde(default)]
        args: Value,
    },
    /// Close by id; no id means the topmost dialog
    Close {
        #[serde(default)]
        id: Option<DialogId>,
        #[serde(default)]
        ok: bool,
    },
    /// Press Esc
    Escape,
    /// Press the OK button of the topmost dialog
    PressOk,
    /// Run deferred `on_create` hooks
    Tick,
    CloseAll,
}

/// A dialog on the stack after a step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StackEntry {
    pub id: DialogId,
    pub class: String,
    pub state: DialogState,
}

/// What one step did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepReport {
    pub step: usize,
    pub result: Value,
    pub events: Vec<DialogEvent>,
    pub stack: Vec<StackEntry>,
}

impl ReplayCommand {
    pub async fn execute(&self, config: &Config) -> Result<()> {
        debug!("Executing replay command");

        let source = self.read_script().await?;
        let steps: Vec<Step> =
            serde_json::from_str(&source).context("Failed to parse replay script")?;
        info!("Replaying {} steps", steps.len());

        let reports = replay(config.clone(), &steps)?;
        for report in reports {
            let line = if self.pretty {
                serde_json::to_string_pretty(&report)?
            } else {
                serde_json::to_string(&report)?
            };
            println!("{}", line);
        }

        Ok(())
    }

    async fn read_script(&self) -> Result<String> {
        match &self.script {
            Some(path) => tokio::fs::read_to_string(path)
                .await
                .map_err(|e| anyhow!("Failed to read {}: {}", path.display(), e)),
            None => {
                debug!("Reading script from stdin");
                let mut buffer = String::new();
                io::stdin()
                    .read_to_string(&mut buffer)
                    .map_err(|e| anyhow!("Failed to read from stdin: {}", e))?;
                Ok(buffer)
            }
        }
    }
}

/// Run `steps` against a fresh manager populated with the demo classes.
pub fn replay(config: Config, steps: &[Step]) -> Result<Vec<StepReport>> {
    let mut manager = DialogManager::new(NodeTree::new(), config);
    let (sender, mut receiver) = mpsc::unbounded_channel();
    manager.set_event_sender(sender);
    let classes = DemoClasses::new(&manager);

    let mut reports = Vec::with_capacity(steps.len());
    for (index, step) in steps.iter().enumerate() {
        let result = apply(&mut manager, &classes, step)
            .with_context(|| format!("step {} ({:?}) failed", index + 1, step))?;
        let events = std::iter::from_fn(|| receiver.try_recv().ok()).collect();
        reports.push(StepReport {
            step: index + 1,
            result,
            events,
            stack: stack(&manager),
        });
    }

    Ok(reports)
}

fn apply(manager: &mut DialogManager, classes: &DemoClasses, step: &Step) -> Result<Value> {
    let value = match step {
        Step::Open {
            class,
            parent,
            args,
        } => {
            let class = classes
                .by_name(class)
                .ok_or_else(|| anyhow!("unknown dialog class '{}'", class))?;
            let parent = match parent {
                Some(id) => Some(
                    manager
                        .get(id)
                        .and_then(|d| d.inner())
                        .ok_or_else(|| anyhow!("parent dialog {} is not open", id))?,
                ),
                None => None,
            };
            let opened = manager.open(class, parent, args.clone())?;
            serde_json::to_value(opened)?
        }
        Step::Close { id, ok } => Value::Bool(manager.close(id.as_ref(), *ok)?),
        Step::Escape => {
            let esc = crossterm::event::KeyEvent::from(crossterm::event::KeyCode::Esc);
            Value::Bool(manager.handle_key_event(esc)?)
        }
        Step::PressOk => match topmost_ok_button(manager) {
            Some(button) => Value::Bool(manager.press(button)?),
            None => Value::Bool(false),
        },
        Step::Tick => Value::from(manager.tick()?),
        Step::CloseAll => {
            manager.close_all()?;
            Value::Null
        }
    };
    Ok(value)
}

fn topmost_ok_button(manager: &DialogManager) -> Option<NodeId> {
    let root = manager.topmost()?.root()?;
    let surface = manager.surface();
    let mut pending = vec![root];
    while let Some(node) = pending.pop() {
        if surface.attr(node, ATTR_ACTION) == Some("ok") {
            return Some(node);
        }
        pending.extend(surface.children(node));
    }
    None
}

fn stack(manager: &DialogManager) -> Vec<StackEntry> {
    manager
        .iter()
        .map(|d| StackEntry {
            id: d.id().clone(),
            class: d.class().name().to_string(),
            state: d.state(),
        })
        .collect()
}
