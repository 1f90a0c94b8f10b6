//! Drawing of the page, the dialog stack and the status bar

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};

use super::Frame;
use crate::dialogs::manager::{ATTR_ACTION, ATTR_STYLE};
use crate::dialogs::{Dialog, DialogManager};
use crate::surface::{NodeId, Surface};

const HELP: &str = "m message  c nested message  p category picker  r recommended  \
v validate feed  enter ok  esc cancel  x close all  q quit";

/// Background page the dialogs float over
pub fn render_page(frame: &mut Frame, area: Rect) {
    let page = Paragraph::new(vec![
        Line::from(Span::styled(
            "Moderator",
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled(HELP, Style::default().fg(Color::DarkGray))),
    ])
    .wrap(Wrap { trim: true })
    .block(Block::default().borders(Borders::ALL).title("Queue"));
    frame.render_widget(page, area);
}

/// Paint open dialogs in z-index order
pub fn render_dialogs<S: Surface>(frame: &mut Frame, area: Rect, manager: &DialogManager<S>) {
    for layer in manager.layers(area) {
        let Some(dialog) = manager.get(layer.dialog_id()) else {
            continue;
        };
        let layout = layer.layout();
        frame.render_widget(Clear, layout.dialog_area);

        let border_style = if layer.is_focused() {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(border_style)
            .title(format!(" {} {} ", dialog.class().name(), dialog.id()));
        frame.render_widget(block, layout.dialog_area);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(1), Constraint::Length(1)])
            .split(layout.content_area);

        frame.render_widget(content(manager.surface(), dialog), chunks[0]);
        frame.render_widget(
            Paragraph::new(buttons(manager.surface(), dialog)).alignment(Alignment::Right),
            chunks[1],
        );
    }
}

/// Last few dialog events
pub fn render_status<'a>(frame: &mut Frame, area: Rect, lines: impl Iterator<Item = &'a str>) {
    let lines: Vec<Line> = lines.map(|l| Line::from(l.to_string())).collect();
    let status = Paragraph::new(lines)
        .style(Style::default().fg(Color::Gray))
        .block(Block::default().borders(Borders::ALL).title("Events"));
    frame.render_widget(status, area);
}

fn content<'a, S: Surface>(surface: &'a S, dialog: &Dialog) -> Paragraph<'a> {
    let Some(inner) = dialog.inner() else {
        return Paragraph::new("");
    };
    let style = match surface.attr(inner, ATTR_STYLE) {
        Some("error") => Style::default().fg(Color::Red),
        Some("loading") => Style::default().fg(Color::Yellow),
        Some("ok") => Style::default().fg(Color::Green),
        _ => Style::default(),
    };
    Paragraph::new(surface.text(inner).unwrap_or_default())
        .style(style)
        .wrap(Wrap { trim: false })
}

fn buttons<'a, S: Surface>(surface: &'a S, dialog: &Dialog) -> Line<'a> {
    let mut spans = Vec::new();
    let mut pending: Vec<NodeId> = dialog.root().into_iter().collect();

    // Buttons of nested dialogs belong to them.
    while let Some(node) = pending.pop() {
        if let Some(action) = surface.attr(node, ATTR_ACTION) {
            let style = if action == "ok" {
                Style::default().fg(Color::Black).bg(Color::Cyan)
            } else {
                Style::default().add_modifier(Modifier::REVERSED)
            };
            spans.push(Span::raw(" "));
            spans.push(Span::styled(
                format!("[ {} ]", surface.text(node).unwrap_or_default()),
                style,
            ));
            continue;
        }
        if Some(node) != dialog.inner() {
            let mut children = surface.children(node);
            children.reverse();
            pending.extend(children);
        }
    }

    Line::from(spans)
}
