//! Background task spawning shared across the UI layer.
//!
//! Every network call runs in its own tokio task and reports back through
//! the `AppEvent` channel. Panics inside a task are caught and reported as
//! `AppEvent::TaskPanicked` instead of vanishing with the task.

use crate::api::{ApiError, ArticlePage, ReaderClient};
use crate::app::{App, AppEvent, ArticleFetch};
use crate::mutation::Mutation;
use crate::tree::{ActiveContext, SubscriptionId, UnreadBatch};
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Wraps a future to catch panics and convert them to errors.
///
/// # Returns
///
/// - `Ok(result)` if the future completes normally
/// - `Err(panic_message)` if the future panics
pub(super) async fn catch_task_panic<F, T>(future: F) -> Result<T, String>
where
    F: Future<Output = T>,
{
    AssertUnwindSafe(future)
        .catch_unwind()
        .await
        .map_err(|panic| {
            if let Some(s) = panic.downcast_ref::<&'static str>() {
                s.to_string()
            } else if let Some(s) = panic.downcast_ref::<String>() {
                s.clone()
            } else {
                format!("Unknown panic: {:?}", (*panic).type_id())
            }
        })
}

/// Spawn `work` and send the event it produces, or `TaskPanicked`.
fn spawn_reporting<F>(task: &'static str, event_tx: &mpsc::Sender<AppEvent>, work: F)
where
    F: Future<Output = AppEvent> + Send + 'static,
{
    let tx = event_tx.clone();
    tokio::spawn(async move {
        let event = match catch_task_panic(work).await {
            Ok(event) => event,
            Err(panic_msg) => {
                tracing::error!(task, error = %panic_msg, "Background task panicked");
                AppEvent::TaskPanicked {
                    task,
                    error: panic_msg,
                }
            }
        };
        if let Err(e) = tx.send(event).await {
            tracing::warn!(error = %e, task, "Channel send failed (receiver dropped)");
        }
    });
}

// ============================================================================
// Tree
// ============================================================================

/// Fetch the whole tree. Overlapping resyncs are allowed; the controller
/// applies them in completion order.
pub(super) fn spawn_resync(app: &mut App, event_tx: &mpsc::Sender<AppEvent>) {
    let ticket = app.controller.begin_resync();
    app.last_resync = Instant::now();
    let client = app.client.clone();

    tracing::debug!(
        generation = ticket.generation(),
        unread_only = ticket.unread_only(),
        "Spawning tree resync"
    );

    spawn_reporting("resync", event_tx, async move {
        let result = client.list_tree(ticket.unread_only()).await;
        AppEvent::TreeLoaded { ticket, result }
    });
}

/// Validate a mutation, apply its optimistic effect and send it.
///
/// Returns false when local validation rejected it; the reason is shown in
/// the status bar and nothing is sent.
pub(super) fn spawn_mutation(
    app: &mut App,
    mutation: Mutation,
    event_tx: &mpsc::Sender<AppEvent>,
) -> bool {
    let previous = app.cursor_node();
    let pending = match app.controller.begin_mutation(mutation) {
        Ok(pending) => pending,
        Err(e) => {
            app.set_error_status(e.to_string());
            return false;
        }
    };
    app.reanchor_cursor(previous.as_ref());

    let client = app.client.clone();
    spawn_reporting("mutation", event_tx, async move {
        let result = pending.request().send(&client).await;
        AppEvent::MutationFinished { pending, result }
    });
    true
}

/// Make `context` active and load its articles.
pub(super) fn activate(app: &mut App, context: ActiveContext, event_tx: &mpsc::Sender<AppEvent>) {
    let previous = app.cursor_node();
    app.controller.set_active(context);
    app.reanchor_cursor(previous.as_ref());
    spawn_articles_load(app, false, event_tx);
}

// ============================================================================
// Articles
// ============================================================================

/// Load the first page of the active context, or the next page when
/// `append` is set.
pub(super) fn spawn_articles_load(
    app: &mut App,
    append: bool,
    event_tx: &mpsc::Sender<AppEvent>,
) {
    let panel = &mut app.articles;
    if append && (panel.loading || panel.exhausted) {
        return;
    }
    if !append {
        panel.context = app.controller.active().clone();
        panel.articles.clear();
        panel.selected = 0;
        panel.exhausted = false;
        panel.detail = None;
    }
    panel.error = None;
    panel.loading = true;
    panel.generation = panel.generation.wrapping_add(1);

    let generation = panel.generation;
    let context = panel.context.clone();
    let page = ArticlePage {
        unread: context == ActiveContext::Unread || app.controller.unread_only(),
        limit: Some(app.article_page_size),
        after_article: if append {
            panel.articles.last().map(|a| a.id.clone())
        } else {
            None
        },
    };
    let client = app.client.clone();

    tracing::debug!(?context, generation, append, "Spawning article load");

    spawn_reporting("article_load", event_tx, async move {
        let result = fetch_articles(&client, &context, &page).await;
        AppEvent::ArticlesLoaded {
            generation,
            append,
            result,
        }
    });
}

async fn fetch_articles(
    client: &ReaderClient,
    context: &ActiveContext,
    page: &ArticlePage,
) -> Result<ArticleFetch, ApiError> {
    match context {
        ActiveContext::Unread => client.all_articles(page).await.map(|articles| ArticleFetch {
            articles,
            detail: None,
        }),
        ActiveContext::Category(id) => {
            client
                .category_articles(id.as_str(), page)
                .await
                .map(|articles| ArticleFetch {
                    articles,
                    detail: None,
                })
        }
        ActiveContext::Subscription(id) => {
            client
                .subscription(id.as_str(), page)
                .await
                .map(|response| ArticleFetch {
                    articles: response.articles,
                    detail: Some(response.subscription),
                })
        }
    }
}

/// Send one read/unread batch. Counters are patched when it completes.
pub(super) fn spawn_read_batch(
    app: &mut App,
    batch: UnreadBatch,
    event_tx: &mpsc::Sender<AppEvent>,
) {
    if batch.is_empty() {
        return;
    }
    app.articles.begin_sync(&batch);
    let client = app.client.clone();
    tracing::debug!(articles = batch.len(), transition = ?batch.transition(), "Spawning read state sync");

    spawn_reporting("mark_read", event_tx, async move {
        let read = batch.transition().target_read();
        let result = client.mark_articles(&batch.article_ids(), read).await;
        AppEvent::ReadStateSynced { batch, result }
    });
}

// ============================================================================
// Popups
// ============================================================================

pub(super) fn spawn_category_list(
    app: &App,
    subscription: SubscriptionId,
    event_tx: &mpsc::Sender<AppEvent>,
) {
    let client = app.client.clone();
    spawn_reporting("category_list", event_tx, async move {
        let result = client.category_list().await;
        AppEvent::CategoriesListed {
            subscription,
            result,
        }
    });
}

pub(super) fn spawn_subscription_info(
    app: &App,
    subscription: SubscriptionId,
    event_tx: &mpsc::Sender<AppEvent>,
) {
    let client = app.client.clone();
    spawn_reporting("subscription_info", event_tx, async move {
        let page = ArticlePage {
            unread: false,
            limit: Some(1),
            after_article: None,
        };
        let (detail, history) = tokio::join!(
            client.subscription(subscription.as_str(), &page),
            client.synchronizations(subscription.as_str()),
        );
        let result = detail.and_then(|d| history.map(|h| (d.subscription, h)));
        AppEvent::SubscriptionInfoLoaded {
            subscription,
            result,
        }
    });
}
