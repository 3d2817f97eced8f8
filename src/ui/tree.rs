use crate::app::{App, Focus};
use crate::tree::{NodeRef, Rendered, TreeRow};
use crate::util::{display_width, truncate_to_width};
use ratatui::{
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState},
    Frame,
};

/// Render the subscription tree panel
pub fn render(f: &mut Frame, app: &App, area: Rect) {
    let is_focused = app.focus == Focus::Tree;
    let rows = app.controller.rows();

    let items: Vec<ListItem> = if rows.is_empty() {
        vec![ListItem::new(Span::styled(
            empty_message(app),
            app.style("placeholder"),
        ))]
    } else {
        // 2 for borders
        let width = area.width.saturating_sub(2) as usize;
        rows.iter()
            .enumerate()
            .map(|(i, row)| ListItem::new(row_line(app, row, i == app.tree_cursor, width)))
            .collect()
    };

    let border_style = if is_focused {
        app.style("panel_border_focused")
    } else {
        app.style("panel_border")
    };

    let mut title = match app.controller.global_unread() {
        0 => "Subscriptions".to_string(),
        n => format!("Subscriptions ({})", n),
    };
    if app.controller.unread_only() {
        title.push_str(" [unread]");
    }
    if app.controller.is_loading() {
        title.push_str(" ⟳");
    }

    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(border_style)
            .title(title),
    );

    let mut state = ListState::default();
    if !rows.is_empty() {
        state.select(Some(app.tree_cursor));
    }
    f.render_stateful_widget(list, area, &mut state);
}

/// Text for a panel with no rows. A loaded tree's placeholder outranks a
/// later sync error, which the status bar reports instead.
fn empty_message(app: &App) -> String {
    if let Some(placeholder) = app.controller.rendered().and_then(placeholder_of) {
        placeholder.to_string()
    } else if let Some(error) = app.controller.load_error() {
        format!("Could not load subscriptions: {}", error)
    } else {
        "Loading...".to_string()
    }
}

fn placeholder_of(rendered: &Rendered) -> Option<&'static str> {
    match rendered {
        Rendered::Placeholder(p) => Some(p.message()),
        Rendered::Tree(_) => None,
    }
}

/// One tree row: indent, fold icon, checkbox, failing marker, label, counts.
fn row_line(app: &App, row: &TreeRow, selected: bool, width: usize) -> Line<'static> {
    let moving = app.moving.as_ref().is_some_and(|m| m.node == row.node);

    let mut prefix = "  ".repeat(row.depth);
    prefix.push_str(match (&row.node, row.expandable, row.markers.folded) {
        (NodeRef::Category(_), true, true) => "▸ ",
        (NodeRef::Category(_), true, false) => "▾ ",
        _ => "  ",
    });

    let checkbox = if app.controller.is_checked(&row.node) {
        "[x] "
    } else {
        "[ ] "
    };
    let failing = if row.markers.failing { "! " } else { "" };

    let counts = format!(" {}", row.counts);
    let fixed = display_width(&prefix) + display_width(checkbox) + display_width(failing);
    let label_room = width.saturating_sub(fixed + display_width(&counts));
    let label = truncate_to_width(&row.label, label_room).into_owned();

    let label_style = if moving {
        app.style("tree_moving")
    } else if selected {
        app.style("tree_selected")
    } else if row.markers.active {
        app.style("tree_active")
    } else if row.markers.unread {
        label_base(app, row).patch(app.style("tree_unread"))
    } else {
        label_base(app, row)
    };

    let checkbox_style = if app.controller.is_checked(&row.node) {
        app.style("tree_checked")
    } else {
        app.style("tree_counts")
    };

    Line::from(vec![
        Span::raw(prefix),
        Span::styled(checkbox, checkbox_style),
        Span::styled(failing, app.style("tree_failing")),
        Span::styled(label, label_style),
        Span::styled(counts, app.style("tree_counts")),
    ])
}

fn label_base(app: &App, row: &TreeRow) -> Style {
    match row.node {
        NodeRef::Category(_) => app.style("tree_category"),
        NodeRef::Subscription(_) if row.markers.failing => app.style("tree_failing"),
        NodeRef::Subscription(_) => app.style("tree_normal"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiError, ReaderClient};
    use crate::config::Config;
    use crate::tree::fixtures::{root, sub};
    use crate::tree::Placeholder;

    fn test_app(unread_only: bool) -> App {
        let client = ReaderClient::new("http://localhost:8080/api", None).unwrap();
        let config = Config {
            unread_only,
            ..Config::default()
        };
        App::new(client, &config)
    }

    #[test]
    fn test_empty_message_before_first_sync() {
        let app = test_app(false);
        assert_eq!(empty_message(&app), "Loading...");
    }

    #[test]
    fn test_empty_message_shows_error_without_tree() {
        let mut app = test_app(false);
        let ticket = app.controller.begin_resync();
        let _ = app.controller.apply_resync(ticket, Err(ApiError::Timeout));
        assert!(empty_message(&app).starts_with("Could not load subscriptions"));
    }

    #[test]
    fn test_show_all_hint_survives_failed_resync() {
        let mut app = test_app(true);
        let ticket = app.controller.begin_resync();
        app.controller
            .apply_resync(ticket, Ok(root(vec![], vec![sub("s1", "One", 0)])))
            .unwrap();

        let ticket = app.controller.begin_resync();
        let _ = app.controller.apply_resync(ticket, Err(ApiError::Timeout));

        assert!(app.controller.load_error().is_some());
        assert_eq!(empty_message(&app), Placeholder::EmptyUnread.message());
    }
}
