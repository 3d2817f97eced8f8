//! Application event handling.
//!
//! Applies the results of background tasks (tree resyncs, mutations,
//! article pages, read-state syncs, popup data) to the application state.

use crate::api::{ApiError, CategoryList, SubscriptionDetail, Synchronization, TreePayload};
use crate::app::{App, AppEvent, ArticleFetch, PickerState};
use crate::mutation::{Mutation, PendingMutation, Reconcile};
use crate::sync::ResyncTicket;
use crate::tree::{ActiveContext, SubscriptionId, UnreadBatch};
use tokio::sync::mpsc;

use super::helpers::{activate, spawn_articles_load, spawn_resync};

/// Handle application events from background tasks.
pub(super) fn handle_app_event(
    app: &mut App,
    event: AppEvent,
    event_tx: &mpsc::Sender<AppEvent>,
) {
    match event {
        AppEvent::TreeLoaded { ticket, result } => handle_tree_loaded(app, ticket, result),
        AppEvent::MutationFinished { pending, result } => {
            handle_mutation_finished(app, pending, result, event_tx)
        }
        AppEvent::ArticlesLoaded {
            generation,
            append,
            result,
        } => handle_articles_loaded(app, generation, append, result),
        AppEvent::ReadStateSynced { batch, result } => {
            handle_read_state_synced(app, batch, result, event_tx)
        }
        AppEvent::CategoriesListed {
            subscription,
            result,
        } => handle_categories_listed(app, subscription, result),
        AppEvent::SubscriptionInfoLoaded {
            subscription,
            result,
        } => handle_subscription_info(app, subscription, result),
        AppEvent::TaskPanicked { task, error } => {
            tracing::error!(task, error, "Background task panicked");
            app.set_error_status(format!("Internal error in {} task", task));
            if task == "mark_read" {
                // The batch is lost; the next resync reloads the true counts
                app.articles.syncing.clear();
                spawn_resync(app, event_tx);
            }
        }
    }
}

fn handle_tree_loaded(app: &mut App, ticket: ResyncTicket, result: Result<TreePayload, ApiError>) {
    let previous = app.cursor_node();
    let had_tree = app.controller.tree().is_some();

    match app.controller.apply_resync(ticket, result) {
        Ok(()) => {
            app.reanchor_cursor(previous.as_ref());
            let moved_node_gone = app
                .moving
                .as_ref()
                .is_some_and(|m| app.node_label(&m.node).is_none());
            if moved_node_gone {
                app.moving = None;
                app.set_status("Moved item no longer exists");
            }
        }
        // Without a tree the panel shows the error itself
        Err(e) if had_tree => app.set_error_status(format!("Sync failed: {}", e.user_message())),
        Err(_) => {}
    }
}

fn handle_mutation_finished(
    app: &mut App,
    mut pending: PendingMutation,
    result: Result<Option<String>, ApiError>,
    event_tx: &mpsc::Sender<AppEvent>,
) {
    let reconcile = pending.finish(&result);
    let mutation = pending.mutation();

    match &result {
        Ok(_) => {
            tracing::info!(mutation = mutation.kind(), "Mutation committed");
            app.set_status(mutation.success_message());
        }
        Err(e) => {
            tracing::warn!(mutation = mutation.kind(), error = %e, "Mutation rolled back");
            app.set_error_status(format!("Request failed: {}", e.user_message()));
        }
    }
    settle_popup(app, mutation, result.is_ok());

    let marked_read = matches!(
        mutation,
        Mutation::MarkSubscriptionRead { .. } | Mutation::MarkCategoryRead { .. }
    );

    match reconcile {
        Reconcile::Nothing => {}
        Reconcile::Resync => spawn_resync(app, event_tx),
        Reconcile::ResyncAndGoHome => {
            activate(app, ActiveContext::Unread, event_tx);
            spawn_resync(app, event_tx);
        }
        Reconcile::ResyncAndOpen(id) => {
            activate(app, ActiveContext::Subscription(id), event_tx);
            spawn_resync(app, event_tx);
        }
    }

    if marked_read && result.is_ok() {
        spawn_articles_load(app, false, event_tx);
    }
}

/// Close the popup whose submit produced `mutation`, or re-enable its
/// submit after a failure.
fn settle_popup(app: &mut App, mutation: &Mutation, committed: bool) {
    match mutation {
        Mutation::RenameCategory { .. } | Mutation::RetitleSubscription { .. } => {
            let close = match app.edit.as_mut() {
                Some(edit) if edit.submitting => {
                    edit.submitting = false;
                    committed
                }
                _ => false,
            };
            if close {
                app.edit = None;
            }
        }
        Mutation::AddSubscription { .. } | Mutation::CreateCategory { .. } => {
            let close = match app.prompt.as_mut() {
                Some(prompt) if prompt.submitting => {
                    prompt.submitting = false;
                    committed
                }
                _ => false,
            };
            if close {
                app.prompt = None;
            }
        }
        Mutation::ChangeCategory { .. } => {
            let close = match app.picker.as_mut() {
                Some(PickerState::Ready { submitting, .. }) if *submitting => {
                    *submitting = false;
                    committed
                }
                _ => false,
            };
            if close {
                app.picker = None;
            }
        }
        _ => {}
    }
    app.sync_edit_flag();
}

fn handle_articles_loaded(
    app: &mut App,
    generation: u64,
    append: bool,
    result: Result<ArticleFetch, ApiError>,
) {
    if generation != app.articles.generation {
        tracing::debug!(
            generation,
            current = app.articles.generation,
            "Discarding stale article page"
        );
        return;
    }

    let page_size = app.article_page_size as usize;
    let panel = &mut app.articles;
    panel.loading = false;

    match result {
        Ok(fetch) => {
            panel.exhausted = fetch.articles.len() < page_size;
            if append {
                panel.articles.extend(fetch.articles);
            } else {
                panel.articles = fetch.articles;
                panel.selected = 0;
            }
            if fetch.detail.is_some() {
                panel.detail = fetch.detail;
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Article load failed");
            let message = e.user_message();
            panel.error = Some(message.clone());
            app.set_error_status(format!("Loading articles failed: {}", message));
        }
    }
}

fn handle_read_state_synced(
    app: &mut App,
    batch: UnreadBatch,
    result: Result<(), ApiError>,
    event_tx: &mpsc::Sender<AppEvent>,
) {
    let read = batch.transition().target_read();
    let verb = if read { "read" } else { "unread" };
    app.articles.finish_sync(&batch);

    if let Err(e) = result {
        tracing::warn!(error = %e, articles = batch.len(), "Read state sync failed");
        app.set_error_status(format!("Marking {} failed: {}", verb, e.user_message()));
        spawn_resync(app, event_tx);
        return;
    }

    app.articles.set_read(&batch.article_ids(), read);

    let previous = app.cursor_node();
    let applied = app.controller.apply_unread_batch(&batch);
    app.reanchor_cursor(previous.as_ref());

    if applied.needs_resync {
        tracing::debug!("Batch touched subscriptions outside the tree, resyncing");
        spawn_resync(app, event_tx);
    }
    if batch.len() > 1 {
        app.set_status(format!("Marked {} articles {}", batch.len(), verb));
    }
}

fn handle_categories_listed(
    app: &mut App,
    subscription: SubscriptionId,
    result: Result<CategoryList, ApiError>,
) {
    let waiting = matches!(
        &app.picker,
        Some(PickerState::Loading { subscription: s }) if *s == subscription
    );
    if !waiting {
        return;
    }

    match result {
        Ok(list) => {
            let choices = PickerState::choices_from(&list);
            if choices.is_empty() {
                app.picker = None;
                app.set_error_status("No categories to choose from");
                return;
            }
            let current = app
                .controller
                .tree()
                .and_then(|t| t.subscription(&subscription))
                .map(|s| s.category_id.as_str().to_owned());
            let selected = current
                .and_then(|id| choices.iter().position(|c| c.id == id))
                .unwrap_or(0);
            app.picker = Some(PickerState::Ready {
                subscription,
                choices,
                selected,
                submitting: false,
            });
        }
        Err(e) => {
            app.picker = None;
            app.set_error_status(format!("Loading categories failed: {}", e.user_message()));
        }
    }
    app.sync_edit_flag();
}

fn handle_subscription_info(
    app: &mut App,
    subscription: SubscriptionId,
    result: Result<(SubscriptionDetail, Vec<Synchronization>), ApiError>,
) {
    let Some(info) = app.info.as_mut().filter(|i| i.subscription == subscription) else {
        return;
    };
    match result {
        Ok((detail, history)) => {
            info.detail = Some(detail);
            info.history = history;
        }
        Err(e) => info.error = Some(e.user_message()),
    }
}
