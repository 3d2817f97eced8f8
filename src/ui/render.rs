//! Render functions for the TUI.
//!
//! Draws the tree and article panels with the status bar, then whichever
//! overlay is open on top.

use crate::app::{App, EditPopup, InfoState, PickerState, PromptState};
use crate::tree::{NodeRef, SubscriptionId};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use super::{articles, help, status, tree};

/// Minimum terminal dimensions required for normal operation.
pub(super) const MIN_WIDTH: u16 = 60;
pub(super) const MIN_HEIGHT: u16 = 10;

/// Main render dispatch function.
pub(super) fn render(f: &mut Frame, app: &App) {
    let area = f.area();

    if area.width < 1 || area.height < 1 {
        return;
    }

    if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
        let msg = if area.height < 3 || area.width < 20 {
            Paragraph::new("Too small")
        } else {
            Paragraph::new(format!(
                "Terminal too small\n\nMinimum: {}x{}\nCurrent: {}x{}",
                MIN_WIDTH, MIN_HEIGHT, area.width, area.height
            ))
            .alignment(Alignment::Center)
        };
        f.render_widget(msg, area);
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(area);

    let main_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
        .split(chunks[0]);

    tree::render(f, app, main_chunks[0]);
    articles::render(f, app, main_chunks[1]);
    status::render(f, app, chunks[1]);

    if let Some(info) = &app.info {
        render_info_overlay(f, app, info);
    }
    if let Some(picker) = &app.picker {
        render_picker_overlay(f, app, picker);
    }
    if let Some(edit) = &app.edit {
        render_edit_overlay(f, app, edit);
    }
    if let Some(prompt) = &app.prompt {
        render_prompt_overlay(f, app, prompt);
    }
    if let Some(confirm) = &app.pending_confirm {
        let text = format!("{}\n\n(y) Confirm  (n/Esc) Cancel", confirm.prompt());
        render_dialog(f, app, " Confirm ", text, 50, Alignment::Center);
    }
    if app.show_help {
        help::render(f, app);
    }
}

/// Create a centered rectangle with the given percentage of the parent area.
pub(super) fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let width = area.width * percent_x / 100;
    let height = area.height * percent_y / 100;
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

/// Draw `text` in a bordered box sized to its line count, centered on screen.
fn render_dialog(
    f: &mut Frame,
    app: &App,
    title: &str,
    text: String,
    max_width: u16,
    alignment: Alignment,
) {
    let area = f.area();

    let content_lines = text.lines().count() as u16 + 2; // +2 for borders
    let width = max_width.min(area.width.saturating_sub(4));
    let height = content_lines.min(area.height.saturating_sub(4));
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    let overlay = Rect::new(x, y, width, height);

    if overlay.width < 20 || overlay.height < 5 {
        return;
    }

    f.render_widget(Clear, overlay);

    let paragraph = Paragraph::new(text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(app.style("panel_border_focused"))
                .title(title.to_string()),
        )
        .alignment(alignment)
        .style(app.style("tree_normal"));

    f.render_widget(paragraph, overlay);
}

fn render_edit_overlay(f: &mut Frame, app: &App, edit: &EditPopup) {
    let (title, label) = match edit.target {
        NodeRef::Category(_) => (" Rename Category ", "New name:"),
        NodeRef::Subscription(_) => (" Rename Subscription ", "New title:"),
    };
    let footer = if edit.submitting {
        "Saving..."
    } else {
        "(Enter) Save  (Esc) Cancel"
    };
    let text = format!("{}\n\n> {}_\n\n{}", label, edit.input, footer);
    render_dialog(f, app, title, text, 60, Alignment::Left);
}

fn render_prompt_overlay(f: &mut Frame, app: &App, prompt: &PromptState) {
    let footer = if prompt.submitting {
        "Sending..."
    } else {
        "(Enter) Create  (Esc) Cancel"
    };
    let text = format!("{}\n\n> {}_\n\n{}", prompt.kind.label(), prompt.input, footer);
    render_dialog(f, app, prompt.kind.title(), text, 60, Alignment::Left);
}

fn render_picker_overlay(f: &mut Frame, app: &App, picker: &PickerState) {
    let subscription = app
        .node_label(&NodeRef::Subscription(picker.subscription().clone()))
        .unwrap_or_default();

    let text = match picker {
        PickerState::Loading { .. } => "Loading categories...\n\n(Esc) Cancel".to_string(),
        PickerState::Ready {
            choices,
            selected,
            submitting,
            ..
        } => {
            let items = choices
                .iter()
                .enumerate()
                .map(|(i, choice)| {
                    if i == *selected {
                        format!("> {}", choice.name)
                    } else {
                        format!("  {}", choice.name)
                    }
                })
                .collect::<Vec<_>>()
                .join("\n");
            let footer = if *submitting {
                "Moving..."
            } else {
                "(Enter) Move  (Esc) Cancel"
            };
            format!("{}\n\n{}", items, footer)
        }
    };
    let title = format!(" Category for {} ", subscription);
    render_dialog(f, app, &title, text, 50, Alignment::Left);
}

/// Absolute favicon URL of a subscription in the loaded tree.
fn favicon_url(app: &App, id: &SubscriptionId) -> Option<String> {
    let subscription = app.controller.tree()?.subscription(id)?;
    match app.client.base_url().join(&subscription.favicon_url) {
        Ok(url) => Some(url.to_string()),
        Err(e) => {
            tracing::debug!(error = %e, "Unusable favicon path");
            None
        }
    }
}

fn render_info_overlay(f: &mut Frame, app: &App, info: &InfoState) {
    let overlay = centered_rect(70, 70, f.area());
    if overlay.width < 20 || overlay.height < 6 {
        return;
    }
    f.render_widget(Clear, overlay);

    let label = app.style("article_date");
    let mut lines: Vec<Line> = Vec::new();

    if let Some(error) = &info.error {
        lines.push(Line::from(Span::styled(error.clone(), app.style("status_error"))));
    } else if let Some(detail) = &info.detail {
        let favicon = favicon_url(app, &info.subscription);
        let mut field = |name: &str, value: Option<String>| {
            if let Some(value) = value.filter(|v| !v.is_empty()) {
                lines.push(Line::from(vec![
                    Span::styled(format!("{:<12}", name), label),
                    Span::raw(value),
                ]));
            }
        };
        field("Title", Some(detail.title.clone()));
        field("Feed title", detail.feed_title.clone());
        field("Site", detail.url.clone());
        field("Feed URL", detail.rss_url.clone());
        field("Category", detail.category_name.clone());
        field("Favicon", favicon);
        field(
            "Added",
            detail
                .created_at()
                .map(|d| d.format("%Y-%m-%d %H:%M").to_string()),
        );
        field("About", detail.description.clone());

        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "Recent synchronizations",
            app.style("tree_category"),
        )));
        if info.history.is_empty() {
            lines.push(Line::from(Span::styled("  none yet", app.style("placeholder"))));
        }
        for sync in &info.history {
            let when = sync
                .created_at()
                .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "?".to_string());
            let (mark, style) = if sync.success {
                ("ok  ", app.style("tree_checked"))
            } else {
                ("FAIL", app.style("tree_failing"))
            };
            let mut spans = vec![
                Span::styled(format!("  {} ", when), label),
                Span::styled(mark, style),
                Span::raw(format!(" {}ms", sync.duration)),
            ];
            if let Some(message) = &sync.message {
                spans.push(Span::raw(format!("  {}", message)));
            }
            lines.push(Line::from(spans));
        }
    } else {
        lines.push(Line::from(Span::styled("Loading...", app.style("placeholder"))));
    }

    let visible = overlay.height.saturating_sub(2) as usize;
    let max_scroll = lines.len().saturating_sub(visible);
    let scroll = info.scroll.min(max_scroll) as u16;

    let paragraph = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(app.style("panel_border_focused"))
                .title(format!(" {} ", info.title)),
        )
        .scroll((scroll, 0))
        .style(app.style("tree_normal"));

    f.render_widget(paragraph, overlay);
}
