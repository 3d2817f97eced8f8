use crate::app::{App, Focus};
use ratatui::{layout::Rect, widgets::Paragraph, Frame};
use std::borrow::Cow;

/// Render the status bar
pub fn render(f: &mut Frame, app: &App, area: Rect) {
    if area.width < 1 || area.height < 1 {
        return;
    }

    let text: Cow<'_, str> = if let Some((msg, _)) = &app.status_message {
        Cow::Borrowed(msg.as_ref())
    } else if let Some(moving) = &app.moving {
        Cow::Owned(format!(
            "Moving {}: [Enter]before [>]into [<]top level [Esc]cancel",
            moving.label
        ))
    } else {
        match app.focus {
            Focus::Tree => Cow::Borrowed(
                "[Enter]open [Space]fold [x]check [e]dit [d]elete [m]ove [a]dd [u]nread-only [?]help [q]uit",
            ),
            Focus::Articles => Cow::Borrowed(
                "[Space]read/unread [A]ll read [L]oad more [Tab]tree [g]unread [?]help [q]uit",
            ),
        }
    };

    let style = if app.status_is_error && app.status_message.is_some() {
        app.style("status_error")
    } else {
        app.style("status_bar")
    };

    let paragraph = Paragraph::new(text).style(style);
    f.render_widget(paragraph, area);
}
