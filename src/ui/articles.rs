use crate::app::{App, Focus};
use crate::tree::ActiveContext;
use crate::util::{display_width, truncate_to_width};
use chrono::{DateTime, Utc};
use ratatui::{
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState},
    Frame,
};

/// Format timestamp as relative time
pub fn format_relative_time(timestamp: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(ts) = timestamp else {
        return String::new();
    };

    let diff = (now - ts).num_seconds();

    // Future dates (clock skew on the server)
    if diff < 0 {
        return "now".to_string();
    }

    if diff < 3600 {
        return format!("{}m", diff / 60);
    }

    if diff < 86400 {
        return format!("{}h", diff / 3600);
    }

    if diff < 604800 {
        return format!("{}d", diff / 86400);
    }

    ts.format("%b %d").to_string()
}

/// Render the article list panel
pub fn render(f: &mut Frame, app: &App, area: Rect) {
    let is_focused = app.focus == Focus::Articles;
    let panel = &app.articles;
    let now = Utc::now();
    // Source column only makes sense when articles come from several feeds
    let show_source = !matches!(panel.context, ActiveContext::Subscription(_));

    let mut items: Vec<ListItem> = if panel.articles.is_empty() {
        let message = if let Some(error) = &panel.error {
            error.clone()
        } else if panel.loading {
            "Loading...".to_string()
        } else {
            "No articles".to_string()
        };
        vec![ListItem::new(Span::styled(message, app.style("placeholder")))]
    } else {
        panel
            .articles
            .iter()
            .enumerate()
            .map(|(i, article)| {
                let time_str = format_relative_time(article.published_at(), now);
                let source = if show_source && !article.subscription.title.is_empty() {
                    format!("{}  ", truncate_to_width(&article.subscription.title, 20))
                } else {
                    String::new()
                };

                let marker = if article.is_read { "  " } else { "● " };
                let title_style = if i == panel.selected && is_focused {
                    app.style("article_selected")
                } else if article.is_read {
                    app.style("article_read")
                } else {
                    app.style("article_title")
                };

                // 2 borders, marker, time and a gap
                let room = (area.width as usize)
                    .saturating_sub(2 + 2 + display_width(&source) + time_str.len() + 2);
                let title = truncate_to_width(&article.title, room).into_owned();

                let mut spans = vec![
                    Span::styled(marker, app.style("article_title")),
                    Span::styled(source, app.style("article_source")),
                    Span::styled(title, title_style),
                ];
                if !time_str.is_empty() {
                    spans.push(Span::styled(format!("  {}", time_str), app.style("article_date")));
                }
                ListItem::new(Line::from(spans))
            })
            .collect()
    };

    if !panel.articles.is_empty() && !panel.exhausted {
        let more = if panel.loading {
            "  Loading more..."
        } else {
            "  More articles (L)"
        };
        items.push(ListItem::new(Span::styled(more, app.style("placeholder"))));
    }

    let border_style = if is_focused {
        app.style("panel_border_focused")
    } else {
        app.style("panel_border")
    };

    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(border_style)
            .title(panel_title(app)),
    );

    let mut state = ListState::default();
    if !panel.articles.is_empty() {
        state.select(Some(panel.selected));
    }
    f.render_stateful_widget(list, area, &mut state);
}

fn panel_title(app: &App) -> String {
    let panel = &app.articles;
    match &panel.context {
        ActiveContext::Unread => "Articles - Unread".to_string(),
        ActiveContext::Category(id) => {
            let name = app
                .controller
                .tree()
                .and_then(|t| t.category(id))
                .map(|c| c.name.as_str())
                .unwrap_or("Category");
            format!("Articles - {}", name)
        }
        ActiveContext::Subscription(id) => {
            let title = panel
                .detail
                .as_ref()
                .map(|d| d.title.as_str())
                .or_else(|| {
                    app.controller
                        .tree()
                        .and_then(|t| t.subscription(id))
                        .map(|s| s.title.as_str())
                })
                .unwrap_or("Subscription");
            format!("Articles - {}", title)
        }
    }
}
