//! Keybinding overlay, grouped by the context each binding applies in.
//!
//! Bindings come from the live `KeyBindings`, so config overrides show up.

use crate::app::App;
use crate::keybindings::Context;
use ratatui::{
    layout::{Constraint, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Row, Table},
    Frame,
};

use super::render::centered_rect;

const SECTIONS: [Context; 4] = [
    Context::Global,
    Context::Tree,
    Context::Moving,
    Context::Articles,
];

/// Border, blank line under the header, header.
const CHROME_ROWS: u16 = 3;

fn binding_rows(app: &App) -> Vec<Row<'static>> {
    let bindings = app.keybindings.all_bindings();
    let heading = Style::default().add_modifier(Modifier::BOLD);
    let mut rows = Vec::new();

    for section in SECTIONS {
        let mut entries = bindings
            .iter()
            .filter(|(ctx, _, _, _)| *ctx == section)
            .peekable();
        if entries.peek().is_none() {
            continue;
        }
        if !rows.is_empty() {
            rows.push(Row::new(vec![String::new(), String::new()]));
        }
        rows.push(
            Row::new(vec![
                Line::from(Span::styled(format!("[{}]", section.label()), heading)),
                Line::default(),
            ])
            .style(app.style("tree_category")),
        );
        rows.extend(
            entries.map(|(_, key, _, description)| {
                Row::new(vec![format!("  {key}"), description.to_string()])
            }),
        );
    }
    rows
}

pub fn render(f: &mut Frame, app: &App) {
    let area = centered_rect(70, 80, f.area());
    if area.width < 24 || area.height < 6 {
        return;
    }
    f.render_widget(Clear, area);

    let rows = binding_rows(app);
    let page = area.height.saturating_sub(CHROME_ROWS) as usize;
    let last_offset = rows.len().saturating_sub(page);
    let offset = app.help_scroll_offset.min(last_offset);
    let scrollable = last_offset > 0;

    let title = if scrollable {
        format!(" Keys {}/{} ", offset + 1, last_offset + 1)
    } else {
        " Keys (Esc to close) ".to_string()
    };

    let table = Table::new(
        rows.into_iter().skip(offset).take(page),
        [Constraint::Length(14), Constraint::Min(20)],
    )
    .header(
        Row::new(vec!["Key", "Does"])
            .style(Style::default().add_modifier(Modifier::UNDERLINED))
            .bottom_margin(1),
    )
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(title)
            .border_style(app.style("panel_border_focused")),
    )
    .style(app.style("tree_normal"));
    f.render_widget(table, area);

    if scrollable && offset < last_offset {
        let footer = Rect {
            x: area.x + 1,
            y: area.bottom().saturating_sub(1),
            width: area.width.saturating_sub(2),
            height: 1,
        };
        f.render_widget(
            Paragraph::new(Span::styled(" j/k scroll ", app.style("placeholder"))),
            footer,
        );
    }
}
