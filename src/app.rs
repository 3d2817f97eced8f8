use crate::api::{
    ApiError, Article, CategoryChoice, CategoryList, ReaderClient, SubscriptionDetail,
    Synchronization, TreePayload,
};
use crate::config::Config;
use crate::keybindings::KeybindingRegistry;
use crate::mutation::{Mutation, PendingMutation};
use crate::sync::{ResyncTicket, TreeController};
use crate::theme::{StyleMap, ThemeVariant};
use crate::tree::{
    ActiveContext, CategoryId, NodeRef, ReadTransition, SubscriptionId, TreeRow, UnreadBatch,
};
use ratatui::style::Style;
use std::borrow::Cow;
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::Instant;

/// How long a status message stays visible.
const STATUS_TTL: Duration = Duration::from_secs(3);

// ============================================================================
// Focus and Overlay State
// ============================================================================

/// Which panel has focus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Tree,
    Articles,
}

/// A node picked up with the move key, waiting for a drop.
#[derive(Debug, Clone)]
pub struct MoveState {
    pub node: NodeRef,
    pub label: String,
}

/// Rename popup for a category or a subscription.
#[derive(Debug, Clone)]
pub struct EditPopup {
    pub target: NodeRef,
    pub input: String,
    /// A request for this popup is in flight; Enter is ignored.
    pub submitting: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    Subscribe,
    NewCategory,
}

impl PromptKind {
    pub fn title(self) -> &'static str {
        match self {
            PromptKind::Subscribe => " Subscribe ",
            PromptKind::NewCategory => " New Category ",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PromptKind::Subscribe => "Feed URL:",
            PromptKind::NewCategory => "Category name:",
        }
    }
}

/// Single-line text prompt for creating a subscription or a category.
#[derive(Debug, Clone)]
pub struct PromptState {
    pub kind: PromptKind,
    pub input: String,
    pub submitting: bool,
}

/// Category picker for re-categorizing one subscription.
#[derive(Debug, Clone)]
pub enum PickerState {
    /// `GET category/list` in flight.
    Loading { subscription: SubscriptionId },
    Ready {
        subscription: SubscriptionId,
        /// Root first (shown as "top level"), then its children.
        choices: Vec<CategoryChoice>,
        selected: usize,
        submitting: bool,
    },
}

impl PickerState {
    pub fn subscription(&self) -> &SubscriptionId {
        match self {
            PickerState::Loading { subscription } | PickerState::Ready { subscription, .. } => {
                subscription
            }
        }
    }

    /// Flatten the server list into picker choices.
    pub fn choices_from(list: &CategoryList) -> Vec<CategoryChoice> {
        let Some(root) = list.root() else {
            return Vec::new();
        };
        let mut choices = vec![CategoryChoice {
            id: root.id.clone(),
            name: "(top level)".to_string(),
        }];
        choices.extend(root.categories.iter().cloned());
        choices
    }
}

/// Read-only subscription info popup.
#[derive(Debug, Clone)]
pub struct InfoState {
    pub subscription: SubscriptionId,
    pub title: String,
    pub detail: Option<SubscriptionDetail>,
    pub history: Vec<Synchronization>,
    pub error: Option<String>,
    pub scroll: usize,
}

/// Pending confirmation for destructive operations.
#[derive(Debug, Clone)]
pub enum ConfirmAction {
    DeleteCategory { id: CategoryId, name: String },
    DeleteSubscription { id: SubscriptionId, title: String },
}

impl ConfirmAction {
    pub fn prompt(&self) -> String {
        match self {
            ConfirmAction::DeleteCategory { name, .. } => format!(
                "Delete category \"{}\"?\n\nIts subscriptions are deleted too.",
                name
            ),
            ConfirmAction::DeleteSubscription { title, .. } => {
                format!("Unsubscribe from \"{}\"?", title)
            }
        }
    }

    pub fn into_mutation(self) -> Mutation {
        match self {
            ConfirmAction::DeleteCategory { id, .. } => Mutation::DeleteCategory { id },
            ConfirmAction::DeleteSubscription { id, .. } => Mutation::DeleteSubscription { id },
        }
    }
}

// ============================================================================
// Article Panel
// ============================================================================

/// Articles of the active context.
#[derive(Debug, Clone, Default)]
pub struct ArticlePanel {
    /// The context the loaded articles belong to.
    pub context: ActiveContext,
    pub articles: Vec<Article>,
    pub selected: usize,
    pub loading: bool,
    /// The last page came back short; there is nothing more to load.
    pub exhausted: bool,
    /// Bumped for every load so late pages of an older context are dropped.
    pub generation: u64,
    pub detail: Option<SubscriptionDetail>,
    pub error: Option<String>,
    /// Articles whose read-state request has not answered yet. They are
    /// left out of new batches so one transition is never counted twice.
    pub syncing: HashSet<String>,
}

impl ArticlePanel {
    pub fn selected_article(&self) -> Option<&Article> {
        self.articles.get(self.selected)
    }

    pub fn is_syncing(&self, id: &str) -> bool {
        self.syncing.contains(id)
    }

    pub fn begin_sync(&mut self, batch: &UnreadBatch) {
        self.syncing
            .extend(batch.entries().iter().map(|e| e.article_id.clone()));
    }

    pub fn finish_sync(&mut self, batch: &UnreadBatch) {
        for entry in batch.entries() {
            self.syncing.remove(&entry.article_id);
        }
    }

    /// Set the read flag of every article in `ids`.
    pub fn set_read(&mut self, ids: &[String], read: bool) {
        for article in self.articles.iter_mut() {
            if ids.contains(&article.id) {
                article.is_read = read;
            }
        }
    }
}

/// One page of articles plus, for subscriptions, the detail header.
#[derive(Debug, Clone, Default)]
pub struct ArticleFetch {
    pub articles: Vec<Article>,
    pub detail: Option<SubscriptionDetail>,
}

// ============================================================================
// Events
// ============================================================================

/// Events from background tasks
pub enum AppEvent {
    TreeLoaded {
        ticket: ResyncTicket,
        result: Result<TreePayload, ApiError>,
    },
    MutationFinished {
        pending: PendingMutation,
        result: Result<Option<String>, ApiError>,
    },
    ArticlesLoaded {
        generation: u64,
        append: bool,
        result: Result<ArticleFetch, ApiError>,
    },
    ReadStateSynced {
        batch: UnreadBatch,
        result: Result<(), ApiError>,
    },
    CategoriesListed {
        subscription: SubscriptionId,
        result: Result<CategoryList, ApiError>,
    },
    SubscriptionInfoLoaded {
        subscription: SubscriptionId,
        result: Result<(SubscriptionDetail, Vec<Synchronization>), ApiError>,
    },
    /// A background task panicked.
    TaskPanicked { task: &'static str, error: String },
}

// ============================================================================
// Application State
// ============================================================================

/// Central application state
pub struct App {
    pub client: ReaderClient,
    pub controller: TreeController,

    pub theme_variant: ThemeVariant,
    pub theme: StyleMap,
    pub keybindings: KeybindingRegistry,

    pub focus: Focus,
    /// Index into `controller.rows()`.
    pub tree_cursor: usize,
    pub articles: ArticlePanel,
    pub article_page_size: u32,

    pub moving: Option<MoveState>,
    pub edit: Option<EditPopup>,
    pub prompt: Option<PromptState>,
    pub picker: Option<PickerState>,
    pub info: Option<InfoState>,
    pub pending_confirm: Option<ConfirmAction>,
    pub show_help: bool,
    pub help_scroll_offset: usize,

    pub status_message: Option<(Cow<'static, str>, Instant)>,
    pub status_is_error: bool,

    pub refresh_interval: Option<Duration>,
    pub last_resync: Instant,
    /// Last terminal title written, to avoid rewriting it every frame.
    pub window_title: String,

    pub needs_redraw: bool,
}

impl App {
    pub fn new(client: ReaderClient, config: &Config) -> Self {
        let theme_variant = ThemeVariant::from_str_name(&config.theme).unwrap_or_else(|| {
            tracing::warn!(theme = %config.theme, "Unknown theme, using dark");
            ThemeVariant::Dark
        });

        Self {
            client,
            controller: TreeController::new(config.unread_only),
            theme_variant,
            theme: StyleMap::from_palette(&theme_variant.palette()),
            keybindings: KeybindingRegistry::new(),
            focus: Focus::Tree,
            tree_cursor: 0,
            articles: ArticlePanel::default(),
            article_page_size: config.article_page_size.max(1),
            moving: None,
            edit: None,
            prompt: None,
            picker: None,
            info: None,
            pending_confirm: None,
            show_help: false,
            help_scroll_offset: 0,
            status_message: None,
            status_is_error: false,
            refresh_interval: config.refresh_interval(),
            last_resync: Instant::now(),
            window_title: String::new(),
            needs_redraw: true,
        }
    }

    /// Resolve a semantic role name to its `Style`.
    pub fn style(&self, role: &str) -> Style {
        self.theme.resolve(role)
    }

    pub fn set_theme(&mut self, variant: ThemeVariant) {
        self.theme_variant = variant;
        self.theme = StyleMap::from_palette(&variant.palette());
        self.needs_redraw = true;
    }

    /// Cycle to the next theme variant. Returns its name for status display.
    pub fn cycle_theme(&mut self) -> &'static str {
        let next = self.theme_variant.next();
        self.set_theme(next);
        next.name()
    }

    // ------------------------------------------------------------------------
    // Status
    // ------------------------------------------------------------------------

    /// Set status message (will auto-expire after 3 seconds)
    pub fn set_status(&mut self, msg: impl Into<Cow<'static, str>>) {
        self.status_message = Some((msg.into(), Instant::now()));
        self.status_is_error = false;
    }

    pub fn set_error_status(&mut self, msg: impl Into<Cow<'static, str>>) {
        self.set_status(msg);
        self.status_is_error = true;
    }

    /// Clear status message if expired. Returns true if a message was cleared.
    pub fn clear_expired_status(&mut self) -> bool {
        if let Some((_, time)) = &self.status_message {
            if time.elapsed() >= STATUS_TTL {
                self.status_message = None;
                self.status_is_error = false;
                return true;
            }
        }
        false
    }

    // ------------------------------------------------------------------------
    // Tree cursor
    // ------------------------------------------------------------------------

    pub fn cursor_row(&self) -> Option<&TreeRow> {
        self.controller.rows().get(self.tree_cursor)
    }

    pub fn cursor_node(&self) -> Option<NodeRef> {
        self.cursor_row().map(|r| r.node.clone())
    }

    /// Keep the cursor on `previous` after the rows changed, or clamp it.
    pub fn reanchor_cursor(&mut self, previous: Option<&NodeRef>) {
        let rows = self.controller.rows();
        if let Some(index) = previous.and_then(|node| rows.iter().position(|r| &r.node == node)) {
            self.tree_cursor = index;
        } else {
            self.tree_cursor = self.tree_cursor.min(rows.len().saturating_sub(1));
        }
    }

    pub fn nav_up(&mut self) {
        match self.focus {
            Focus::Tree => self.tree_cursor = self.tree_cursor.saturating_sub(1),
            Focus::Articles => self.articles.selected = self.articles.selected.saturating_sub(1),
        }
    }

    pub fn nav_down(&mut self) {
        match self.focus {
            Focus::Tree => {
                let max_index = self.controller.rows().len().saturating_sub(1);
                self.tree_cursor = self.tree_cursor.saturating_add(1).min(max_index);
            }
            Focus::Articles => {
                let max_index = self.articles.articles.len().saturating_sub(1);
                self.articles.selected = self.articles.selected.saturating_add(1).min(max_index);
            }
        }
    }

    /// Display label of a node in the current tree.
    pub fn node_label(&self, node: &NodeRef) -> Option<String> {
        let tree = self.controller.tree()?;
        match node {
            NodeRef::Category(id) => tree.category(id).map(|c| c.name.clone()),
            NodeRef::Subscription(id) => tree.subscription(id).map(|s| s.title.clone()),
        }
    }

    // ------------------------------------------------------------------------
    // Popups and periodic resync
    // ------------------------------------------------------------------------

    /// Any popup with an editable field is open.
    pub fn edit_popup_open(&self) -> bool {
        self.edit.is_some() || self.prompt.is_some() || self.picker.is_some()
    }

    /// Mirror the popup state into the controller's resync gate.
    pub fn sync_edit_flag(&mut self) {
        let open = self.edit_popup_open();
        if open != self.controller.edit_popup_open() {
            self.controller.set_edit_popup_open(open);
        }
    }

    /// Interval elapsed and nothing holds the periodic resync back.
    pub fn periodic_resync_due(&self) -> bool {
        let Some(interval) = self.refresh_interval else {
            return false;
        };
        self.last_resync.elapsed() >= interval && self.controller.should_periodic_resync()
    }

    /// Terminal title with the global unread counter.
    pub fn title_text(&self) -> String {
        match self.controller.global_unread() {
            0 => "feedtree".to_string(),
            n => format!("({}) feedtree", n),
        }
    }

    // ------------------------------------------------------------------------
    // Read state
    // ------------------------------------------------------------------------

    /// Batch flipping the cursor article. Empty when there is no article
    /// or its previous toggle is still in flight.
    pub fn toggle_read_batch(&self) -> UnreadBatch {
        let Some(article) = self
            .articles
            .selected_article()
            .filter(|a| !self.articles.is_syncing(&a.id))
        else {
            return UnreadBatch::new(ReadTransition::MarkRead);
        };
        let mut batch = UnreadBatch::new(ReadTransition::for_target(!article.is_read));
        batch.push(
            article.id.clone(),
            SubscriptionId(article.subscription.id.clone()),
            article.is_read,
        );
        batch
    }

    /// Batch marking every loaded article read. Already-read ones are skipped.
    pub fn mark_loaded_read_batch(&self) -> UnreadBatch {
        let mut batch = UnreadBatch::new(ReadTransition::MarkRead);
        for article in &self.articles.articles {
            if self.articles.is_syncing(&article.id) {
                continue;
            }
            batch.push(
                article.id.clone(),
                SubscriptionId(article.subscription.id.clone()),
                article.is_read,
            );
        }
        batch
    }
}

// ============================================================================
// Tests
// ============================================================================
