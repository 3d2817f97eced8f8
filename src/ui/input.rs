//! Input handling for the TUI.
//!
//! Keys go to the topmost overlay first (help, confirm, info, picker, edit,
//! prompt), then to move mode, then to the focused panel.

use crate::app::{
    App, AppEvent, ConfirmAction, EditPopup, Focus, InfoState, MoveState, PickerState, PromptKind,
    PromptState,
};
use crate::keybindings::{Action as KbAction, Context as KbContext};
use crate::mutation::{DropTarget, Mutation};
use crate::tree::{ActiveContext, CategoryId, NodeRef, Placeholder, Rendered};
use crate::util::MAX_INPUT_LENGTH;
use crossterm::event::{KeyCode, KeyModifiers};
use tokio::sync::mpsc;

use super::helpers::{
    activate, spawn_articles_load, spawn_category_list, spawn_mutation, spawn_read_batch,
    spawn_resync, spawn_subscription_info,
};
use super::Action;

fn focus_to_context(focus: Focus) -> KbContext {
    match focus {
        Focus::Tree => KbContext::Tree,
        Focus::Articles => KbContext::Articles,
    }
}

/// Main input dispatch function.
pub(super) fn handle_input(
    app: &mut App,
    code: KeyCode,
    modifiers: KeyModifiers,
    event_tx: &mpsc::Sender<AppEvent>,
) -> Action {
    // Overlays capture all keys while visible
    if app.show_help {
        return handle_help_input(app, code);
    }
    if app.pending_confirm.is_some() {
        return handle_confirm_input(app, code, event_tx);
    }
    if app.info.is_some() {
        return handle_info_input(app, code);
    }

    if app.picker.is_some() {
        handle_picker_input(app, code, event_tx);
    } else if app.edit.is_some() {
        handle_edit_input(app, code, event_tx);
    } else if app.prompt.is_some() {
        handle_prompt_input(app, code, event_tx);
    } else if app.moving.is_some() {
        return handle_moving_input(app, code, modifiers, event_tx);
    } else {
        return handle_browse_input(app, code, modifiers, event_tx);
    }
    app.sync_edit_flag();
    Action::Continue
}

// ============================================================================
// Overlays
// ============================================================================

/// Handle input while the help overlay is visible.
///
/// Captures all keys: j/k/Up/Down scroll, Esc/q/? dismiss.
fn handle_help_input(app: &mut App, code: KeyCode) -> Action {
    match code {
        KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('?') => {
            app.show_help = false;
            app.help_scroll_offset = 0;
        }
        KeyCode::Char('j') | KeyCode::Down => {
            app.help_scroll_offset = app.help_scroll_offset.saturating_add(1);
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.help_scroll_offset = app.help_scroll_offset.saturating_sub(1);
        }
        _ => {}
    }
    Action::Continue
}

fn handle_confirm_input(
    app: &mut App,
    code: KeyCode,
    event_tx: &mpsc::Sender<AppEvent>,
) -> Action {
    match code {
        KeyCode::Char('y') | KeyCode::Char('Y') => {
            if let Some(confirm) = app.pending_confirm.take() {
                let mutation = confirm.into_mutation();
                if spawn_mutation(app, mutation, event_tx) {
                    app.set_status("Deleting...");
                }
            }
        }
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
            app.pending_confirm = None;
            app.set_status("Cancelled");
        }
        _ => {}
    }
    Action::Continue
}

fn handle_info_input(app: &mut App, code: KeyCode) -> Action {
    let Some(info) = app.info.as_mut() else {
        return Action::Continue;
    };
    match code {
        KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('i') => app.info = None,
        KeyCode::Char('j') | KeyCode::Down => info.scroll = info.scroll.saturating_add(1),
        KeyCode::Char('k') | KeyCode::Up => info.scroll = info.scroll.saturating_sub(1),
        _ => {}
    }
    Action::Continue
}

fn handle_picker_input(app: &mut App, code: KeyCode, event_tx: &mpsc::Sender<AppEvent>) {
    if code == KeyCode::Esc {
        app.picker = None;
        return;
    }
    let Some(PickerState::Ready {
        subscription,
        choices,
        selected,
        submitting,
    }) = app.picker.as_mut()
    else {
        return;
    };
    if *submitting {
        return;
    }

    match code {
        KeyCode::Char('j') | KeyCode::Down => {
            *selected = (*selected + 1).min(choices.len().saturating_sub(1));
        }
        KeyCode::Char('k') | KeyCode::Up => *selected = selected.saturating_sub(1),
        KeyCode::Enter => {
            let Some(choice) = choices.get(*selected) else {
                return;
            };
            let id = subscription.clone();
            let category = CategoryId(choice.id.clone());
            let unchanged = app
                .controller
                .tree()
                .and_then(|t| t.subscription(&id))
                .is_some_and(|s| s.category_id == category);
            if unchanged {
                app.picker = None;
                app.set_status("Already in that category");
                return;
            }
            if spawn_mutation(app, Mutation::ChangeCategory { id, category }, event_tx) {
                if let Some(PickerState::Ready { submitting, .. }) = app.picker.as_mut() {
                    *submitting = true;
                }
            }
        }
        _ => {}
    }
}

/// Apply a text-editing key to `input`. Returns true on Enter.
fn edit_text(input: &mut String, code: KeyCode) -> bool {
    match code {
        KeyCode::Char(c) => {
            if input.chars().count() < MAX_INPUT_LENGTH {
                input.push(c);
            }
        }
        KeyCode::Backspace => {
            input.pop();
        }
        KeyCode::Enter => return true,
        _ => {}
    }
    false
}

fn handle_edit_input(app: &mut App, code: KeyCode, event_tx: &mpsc::Sender<AppEvent>) {
    if code == KeyCode::Esc {
        app.edit = None;
        return;
    }
    let Some(edit) = app.edit.as_mut() else {
        return;
    };
    if edit.submitting || !edit_text(&mut edit.input, code) {
        return;
    }

    let value = edit.input.trim().to_owned();
    let mutation = match &edit.target {
        NodeRef::Category(id) => Mutation::RenameCategory {
            id: id.clone(),
            name: value,
        },
        NodeRef::Subscription(id) => Mutation::RetitleSubscription {
            id: id.clone(),
            title: value,
        },
    };
    if spawn_mutation(app, mutation, event_tx) {
        if let Some(edit) = app.edit.as_mut() {
            edit.submitting = true;
        }
    }
}

fn handle_prompt_input(app: &mut App, code: KeyCode, event_tx: &mpsc::Sender<AppEvent>) {
    if code == KeyCode::Esc {
        app.prompt = None;
        return;
    }
    let Some(prompt) = app.prompt.as_mut() else {
        return;
    };
    if prompt.submitting || !edit_text(&mut prompt.input, code) {
        return;
    }

    let value = prompt.input.trim().to_owned();
    let mutation = match prompt.kind {
        PromptKind::Subscribe => Mutation::AddSubscription { url: value },
        PromptKind::NewCategory => Mutation::CreateCategory { name: value },
    };
    if spawn_mutation(app, mutation, event_tx) {
        if let Some(prompt) = app.prompt.as_mut() {
            prompt.submitting = true;
        }
        app.set_status("Sending...");
    }
}

// ============================================================================
// Move mode
// ============================================================================

fn handle_moving_input(
    app: &mut App,
    code: KeyCode,
    modifiers: KeyModifiers,
    event_tx: &mpsc::Sender<AppEvent>,
) -> Action {
    let action = app
        .keybindings
        .action_for_key(code, modifiers, KbContext::Moving);

    match action {
        Some(KbAction::Quit) => return Action::Quit,
        Some(KbAction::Back) => {
            app.moving = None;
            app.set_status("Move cancelled");
        }
        Some(KbAction::NavDown) => app.nav_down(),
        Some(KbAction::NavUp) => app.nav_up(),
        Some(KbAction::ShowHelp) => app.show_help = true,
        Some(KbAction::DropBefore) => drop_before_cursor(app, event_tx),
        Some(KbAction::DropInto) => drop_into_cursor(app, event_tx),
        Some(KbAction::DropAtTop) => {
            let Some(root) = app.controller.root_id().cloned() else {
                return Action::Continue;
            };
            finish_move(app, DropTarget::end_of(root), event_tx);
        }
        _ => {}
    }
    Action::Continue
}

fn drop_before_cursor(app: &mut App, event_tx: &mpsc::Sender<AppEvent>) {
    let Some(row) = app.cursor_row() else {
        return;
    };
    if app.moving.as_ref().is_some_and(|m| m.node == row.node) {
        app.set_error_status("Pick a different target");
        return;
    }
    let parent = match &row.node {
        NodeRef::Subscription(_) => row.parent.clone(),
        NodeRef::Category(id) => app
            .controller
            .tree()
            .and_then(|t| t.category(id))
            .and_then(|c| c.parent_id.clone()),
    };
    let Some(parent) = parent else {
        return;
    };
    let target = DropTarget {
        parent,
        before: Some(row.node.clone()),
    };
    finish_move(app, target, event_tx);
}

fn drop_into_cursor(app: &mut App, event_tx: &mpsc::Sender<AppEvent>) {
    match app.cursor_node() {
        Some(NodeRef::Category(id)) => finish_move(app, DropTarget::end_of(id), event_tx),
        _ => app.set_error_status("Drop into needs a category"),
    }
}

fn finish_move(app: &mut App, target: DropTarget, event_tx: &mpsc::Sender<AppEvent>) {
    let Some(moving) = app.moving.as_ref() else {
        return;
    };
    let mutation = match &moving.node {
        NodeRef::Subscription(id) => Mutation::MoveSubscription {
            id: id.clone(),
            target,
        },
        NodeRef::Category(id) => Mutation::MoveCategory {
            id: id.clone(),
            target,
        },
    };
    // A rejected drop keeps move mode so another target can be picked
    if spawn_mutation(app, mutation, event_tx) {
        app.moving = None;
    }
}

// ============================================================================
// Browse
// ============================================================================

fn handle_browse_input(
    app: &mut App,
    code: KeyCode,
    modifiers: KeyModifiers,
    event_tx: &mpsc::Sender<AppEvent>,
) -> Action {
    let context = focus_to_context(app.focus);
    let action = app.keybindings.action_for_key(code, modifiers, context);

    match action {
        Some(KbAction::Quit) => return Action::Quit,
        Some(KbAction::Back) => {
            if app.focus == Focus::Articles {
                app.focus = Focus::Tree;
            }
        }
        Some(KbAction::NavDown) => app.nav_down(),
        Some(KbAction::NavUp) => app.nav_up(),
        Some(KbAction::CycleFocus) => {
            app.focus = match app.focus {
                Focus::Tree => Focus::Articles,
                Focus::Articles => Focus::Tree,
            };
        }
        Some(KbAction::Select) => match app.focus {
            Focus::Tree => select_tree_row(app, event_tx),
            Focus::Articles => {
                let batch = app.toggle_read_batch();
                spawn_read_batch(app, batch, event_tx);
            }
        },
        Some(KbAction::Resync) => {
            spawn_resync(app, event_tx);
            app.set_status("Syncing...");
        }
        Some(KbAction::ToggleUnreadOnly) => {
            let previous = app.cursor_node();
            let unread_only = !app.controller.unread_only();
            app.controller.set_unread_only(unread_only);
            app.reanchor_cursor(previous.as_ref());
            spawn_resync(app, event_tx);
            app.set_status(if unread_only {
                "Showing unread subscriptions"
            } else {
                "Showing all subscriptions"
            });
        }
        Some(KbAction::GoHome) => activate(app, ActiveContext::Unread, event_tx),
        Some(KbAction::CycleTheme) => {
            let name = app.cycle_theme();
            app.set_status(format!("Theme: {}", name));
        }
        Some(KbAction::ShowHelp) => {
            app.show_help = true;
            app.help_scroll_offset = 0;
        }
        Some(KbAction::AddSubscription) => open_prompt(app, PromptKind::Subscribe),
        Some(KbAction::NewCategory) => open_prompt(app, PromptKind::NewCategory),

        Some(KbAction::ToggleFold) => fold_cursor(app, None, event_tx),
        Some(KbAction::Collapse) => fold_cursor(app, Some(true), event_tx),
        Some(KbAction::Expand) => fold_cursor(app, Some(false), event_tx),
        Some(KbAction::ToggleCheck) => toggle_check(app),
        Some(KbAction::Edit) => open_edit(app),
        Some(KbAction::Delete) => confirm_delete(app),
        Some(KbAction::Info) => open_info(app, event_tx),
        Some(KbAction::ChangeCategory) => open_picker(app, event_tx),
        Some(KbAction::StartMove) => start_move(app),
        Some(KbAction::MarkNodeRead) => mark_cursor_read(app, event_tx),
        Some(KbAction::MarkCheckedRead) => mark_checked_read(app, event_tx),

        Some(KbAction::ToggleRead) => {
            let batch = app.toggle_read_batch();
            spawn_read_batch(app, batch, event_tx);
        }
        Some(KbAction::MarkArticlesRead) => {
            let batch = app.mark_loaded_read_batch();
            if batch.is_empty() {
                app.set_status("Nothing to mark read");
            } else {
                spawn_read_batch(app, batch, event_tx);
            }
        }
        Some(KbAction::LoadMore) => {
            if app.articles.exhausted {
                app.set_status("No more articles");
            } else {
                spawn_articles_load(app, true, event_tx);
            }
        }

        Some(KbAction::DropBefore | KbAction::DropInto | KbAction::DropAtTop) | None => {}
    }

    Action::Continue
}

fn select_tree_row(app: &mut App, event_tx: &mpsc::Sender<AppEvent>) {
    if let Some(node) = app.cursor_node() {
        activate(app, ActiveContext::from(node), event_tx);
        app.focus = Focus::Articles;
        return;
    }
    if matches!(
        app.controller.rendered(),
        Some(Rendered::Placeholder(Placeholder::EmptyUnread))
    ) {
        app.controller.show_all();
        spawn_resync(app, event_tx);
        app.set_status("Showing all subscriptions");
    }
}

/// Fold (`Some(true)`), unfold (`Some(false)`) or toggle (`None`) the
/// category under the cursor. Collapsing on a subscription jumps to its
/// category.
fn fold_cursor(app: &mut App, fold: Option<bool>, event_tx: &mpsc::Sender<AppEvent>) {
    let Some(row) = app.cursor_row() else {
        return;
    };
    let id = match &row.node {
        NodeRef::Category(id) if row.expandable => id.clone(),
        NodeRef::Category(_) => return,
        NodeRef::Subscription(_) => {
            if fold == Some(true) {
                let parent = row.parent.clone().map(NodeRef::Category);
                if let Some(index) = parent.and_then(|p| {
                    app.controller.rows().iter().position(|r| r.node == p)
                }) {
                    app.tree_cursor = index;
                }
            }
            return;
        }
    };
    let folded = row.markers.folded;
    if fold.is_some_and(|want| want == folded) {
        return;
    }
    spawn_mutation(app, Mutation::ToggleFold { id }, event_tx);
}

fn toggle_check(app: &mut App) {
    let checked = match app.cursor_node() {
        Some(NodeRef::Subscription(id)) => app.controller.toggle_subscription_checked(&id),
        Some(NodeRef::Category(id)) => app.controller.toggle_category_checked(&id),
        None => return,
    };
    let count = app.controller.checked_subscription_ids().len();
    if checked {
        app.set_status(format!("{} checked", count));
    } else {
        app.set_status(format!("Unchecked ({} still checked)", count));
    }
}

fn open_prompt(app: &mut App, kind: PromptKind) {
    app.prompt = Some(PromptState {
        kind,
        input: String::new(),
        submitting: false,
    });
    app.sync_edit_flag();
}

fn open_edit(app: &mut App) {
    let Some(node) = app.cursor_node() else {
        return;
    };
    let Some(input) = app.node_label(&node) else {
        return;
    };
    app.edit = Some(EditPopup {
        target: node,
        input,
        submitting: false,
    });
    app.sync_edit_flag();
}

fn confirm_delete(app: &mut App) {
    let Some(node) = app.cursor_node() else {
        return;
    };
    let Some(label) = app.node_label(&node) else {
        return;
    };
    app.pending_confirm = Some(match node {
        NodeRef::Category(id) => ConfirmAction::DeleteCategory { id, name: label },
        NodeRef::Subscription(id) => ConfirmAction::DeleteSubscription { id, title: label },
    });
}

fn open_info(app: &mut App, event_tx: &mpsc::Sender<AppEvent>) {
    let Some(NodeRef::Subscription(id)) = app.cursor_node() else {
        app.set_status("Info is available for subscriptions");
        return;
    };
    let title = app
        .node_label(&NodeRef::Subscription(id.clone()))
        .unwrap_or_default();
    app.info = Some(InfoState {
        subscription: id.clone(),
        title,
        detail: None,
        history: Vec::new(),
        error: None,
        scroll: 0,
    });
    spawn_subscription_info(app, id, event_tx);
}

fn open_picker(app: &mut App, event_tx: &mpsc::Sender<AppEvent>) {
    let Some(NodeRef::Subscription(id)) = app.cursor_node() else {
        app.set_status("Select a subscription to re-categorize");
        return;
    };
    app.picker = Some(PickerState::Loading {
        subscription: id.clone(),
    });
    app.sync_edit_flag();
    spawn_category_list(app, id, event_tx);
}

fn start_move(app: &mut App) {
    let Some(node) = app.cursor_node() else {
        return;
    };
    let label = app.node_label(&node).unwrap_or_default();
    app.set_status(format!("Moving {}: pick a target", label));
    app.moving = Some(MoveState { node, label });
}

fn mark_cursor_read(app: &mut App, event_tx: &mpsc::Sender<AppEvent>) {
    let mutation = match app.cursor_node() {
        Some(NodeRef::Subscription(id)) => Mutation::MarkSubscriptionRead { id },
        Some(NodeRef::Category(id)) => Mutation::MarkCategoryRead { id },
        None => return,
    };
    spawn_mutation(app, mutation, event_tx);
}

fn mark_checked_read(app: &mut App, event_tx: &mpsc::Sender<AppEvent>) {
    let ids = app.controller.checked_subscription_ids();
    if ids.is_empty() {
        app.set_status("Nothing checked");
        return;
    }
    tracing::info!(count = ids.len(), "Marking checked subscriptions read");
    for id in ids {
        spawn_mutation(app, Mutation::MarkSubscriptionRead { id }, event_tx);
    }
}
