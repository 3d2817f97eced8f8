//! Owner of the local subscription tree and everything that survives or
//! rides along a resync.
//!
//! The controller is plain state: it never performs I/O. The UI asks it
//! for a [`ResyncTicket`], fetches the tree in a background task and hands
//! the result back through [`TreeController::apply_resync`].

use std::collections::HashMap;

use crate::api::{ApiError, TreePayload};
use crate::mutation::{Mutation, PendingMutation, ValidationError};
use crate::tree::{
    flatten, render, ActiveContext, CategoryId, CounterPatch, NodeRef, Rendered, SubscriptionId,
    Tree, TreeRow, UnreadBatch,
};

/// Issue-order marker handed out for each full resync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResyncTicket {
    generation: u64,
    unread_only: bool,
}

impl ResyncTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The `unread` query flag the fetch should use.
    pub fn unread_only(&self) -> bool {
        self.unread_only
    }
}

/// Result of applying an unread batch locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnreadApplied {
    pub patches: Vec<CounterPatch>,
    /// Some subscription in the batch is missing from the tree.
    pub needs_resync: bool,
}

#[derive(Debug)]
pub struct TreeController {
    tree: Option<Tree>,
    rendered: Option<Rendered>,
    rows: Vec<TreeRow>,
    unread_only: bool,
    active: ActiveContext,
    /// Keyed by subscription title; renaming loses the selection.
    checked_subscriptions: HashMap<String, bool>,
    /// Keyed by category name.
    checked_categories: HashMap<String, bool>,
    edit_popup_open: bool,
    load_error: Option<String>,
    issued: u64,
    last_applied: u64,
    in_flight: usize,
}

impl TreeController {
    pub fn new(unread_only: bool) -> Self {
        Self {
            tree: None,
            rendered: None,
            rows: Vec::new(),
            unread_only,
            active: ActiveContext::Unread,
            checked_subscriptions: HashMap::new(),
            checked_categories: HashMap::new(),
            edit_popup_open: false,
            load_error: None,
            issued: 0,
            last_applied: 0,
            in_flight: 0,
        }
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn tree(&self) -> Option<&Tree> {
        self.tree.as_ref()
    }

    /// `None` until the first successful resync.
    pub fn rendered(&self) -> Option<&Rendered> {
        self.rendered.as_ref()
    }

    pub fn rows(&self) -> &[TreeRow] {
        &self.rows
    }

    pub fn unread_only(&self) -> bool {
        self.unread_only
    }

    pub fn active(&self) -> &ActiveContext {
        &self.active
    }

    pub fn global_unread(&self) -> u32 {
        self.tree.as_ref().map_or(0, Tree::global_unread)
    }

    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight > 0
    }

    pub fn root_id(&self) -> Option<&CategoryId> {
        self.tree.as_ref().map(Tree::root_id)
    }

    // ------------------------------------------------------------------------
    // Resync
    // ------------------------------------------------------------------------

    pub fn begin_resync(&mut self) -> ResyncTicket {
        self.issued += 1;
        self.in_flight += 1;
        ResyncTicket {
            generation: self.issued,
            unread_only: self.unread_only,
        }
    }

    /// Apply a finished fetch.
    ///
    /// Responses are applied in completion order: an older ticket that
    /// completes after a newer one still replaces the tree. On failure the
    /// previous tree is kept and the error is returned for display.
    pub fn apply_resync(
        &mut self,
        ticket: ResyncTicket,
        result: Result<TreePayload, ApiError>,
    ) -> Result<(), ApiError> {
        self.in_flight = self.in_flight.saturating_sub(1);

        let payload = match result {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(error = %e, generation = ticket.generation, "Tree resync failed");
                self.load_error = Some(e.user_message());
                return Err(e);
            }
        };

        if ticket.generation < self.last_applied {
            tracing::debug!(
                generation = ticket.generation,
                last_applied = self.last_applied,
                "Applying resync that completed after a newer one"
            );
        }
        self.last_applied = self.last_applied.max(ticket.generation);

        let tree = Tree::from_payload(payload);
        if let Err(violation) = tree.check_unread_invariant() {
            tracing::warn!(error = %violation, "Server tree unread counts are inconsistent");
        }
        tracing::debug!(
            generation = ticket.generation,
            nodes = tree.node_count(),
            unread = tree.global_unread(),
            "Tree replaced"
        );
        self.tree = Some(tree);
        self.load_error = None;
        self.rerender();
        Ok(())
    }

    /// Periodic resyncs are held back while an edit popup is open.
    pub fn should_periodic_resync(&self) -> bool {
        !self.edit_popup_open
    }

    pub fn set_edit_popup_open(&mut self, open: bool) {
        self.edit_popup_open = open;
    }

    pub fn edit_popup_open(&self) -> bool {
        self.edit_popup_open
    }

    fn rerender(&mut self) {
        match &self.tree {
            Some(tree) => {
                let rendered = render(tree, self.unread_only, &self.active);
                self.rows = match &rendered {
                    Rendered::Tree(nodes) => flatten(nodes),
                    Rendered::Placeholder(_) => Vec::new(),
                };
                self.rendered = Some(rendered);
            }
            None => {
                self.rows.clear();
                self.rendered = None;
            }
        }
    }

    // ------------------------------------------------------------------------
    // Filters and context
    // ------------------------------------------------------------------------

    /// Toolbar unread toggle: sets the flag and clears every checkbox.
    /// The caller follows up with a resync.
    pub fn set_unread_only(&mut self, unread_only: bool) {
        self.unread_only = unread_only;
        self.checked_subscriptions.clear();
        self.checked_categories.clear();
        self.rerender();
    }

    /// The "show all" control of the empty-unread placeholder. Selections
    /// are kept. The caller follows up with a resync.
    pub fn show_all(&mut self) {
        self.unread_only = false;
        self.rerender();
    }

    pub fn set_active(&mut self, active: ActiveContext) {
        self.active = active;
        self.rerender();
    }

    // ------------------------------------------------------------------------
    // Checkbox selections
    // ------------------------------------------------------------------------

    /// Flip a subscription's checkbox. Returns the new state.
    pub fn toggle_subscription_checked(&mut self, id: &SubscriptionId) -> bool {
        let Some(title) = self
            .tree
            .as_ref()
            .and_then(|t| t.subscription(id))
            .map(|s| s.title.clone())
        else {
            return false;
        };
        let checked = !self.checked_subscriptions.get(&title).copied().unwrap_or(false);
        self.checked_subscriptions.insert(title, checked);
        checked
    }

    /// Flip a category's checkbox and set every subscription below it to
    /// the same state. Returns the new state.
    pub fn toggle_category_checked(&mut self, id: &CategoryId) -> bool {
        let Some(tree) = self.tree.as_ref() else {
            return false;
        };
        let Some(category) = tree.category(id) else {
            return false;
        };
        let checked = !self
            .checked_categories
            .get(&category.name)
            .copied()
            .unwrap_or(false);
        self.checked_categories.insert(category.name.clone(), checked);
        for sub in tree.descendant_subscriptions(id) {
            self.checked_subscriptions.insert(sub.title.clone(), checked);
        }
        checked
    }

    pub fn is_checked(&self, node: &NodeRef) -> bool {
        let Some(tree) = self.tree.as_ref() else {
            return false;
        };
        match node {
            NodeRef::Subscription(id) => tree
                .subscription(id)
                .and_then(|s| self.checked_subscriptions.get(&s.title))
                .copied()
                .unwrap_or(false),
            NodeRef::Category(id) => tree
                .category(id)
                .and_then(|c| self.checked_categories.get(&c.name))
                .copied()
                .unwrap_or(false),
        }
    }

    /// Subscriptions in the current tree whose title is checked.
    pub fn checked_subscription_ids(&self) -> Vec<SubscriptionId> {
        let Some(tree) = self.tree.as_ref() else {
            return Vec::new();
        };
        tree.descendant_subscriptions(tree.root_id())
            .into_iter()
            .filter(|s| self.checked_subscriptions.get(&s.title).copied().unwrap_or(false))
            .map(|s| s.id.clone())
            .collect()
    }

    // ------------------------------------------------------------------------
    // Mutations and unread propagation
    // ------------------------------------------------------------------------

    /// Validate a mutation and apply its optimistic effect.
    pub fn begin_mutation(&mut self, mutation: Mutation) -> Result<PendingMutation, ValidationError> {
        let kind = mutation.kind();
        let pending = PendingMutation::begin(mutation, self.tree.as_mut());
        match &pending {
            Ok(_) => {
                tracing::debug!(mutation = kind, "Mutation pending");
                self.rerender();
            }
            Err(e) => tracing::debug!(mutation = kind, error = %e, "Mutation rejected locally"),
        }
        pending
    }

    /// Apply an unread batch whose server request succeeded.
    pub fn apply_unread_batch(&mut self, batch: &UnreadBatch) -> UnreadApplied {
        let Some(tree) = self.tree.as_mut() else {
            return UnreadApplied {
                patches: Vec::new(),
                needs_resync: true,
            };
        };
        let delta = batch.aggregate(tree);
        let patches = delta.apply(tree);
        tracing::debug!(
            articles = batch.len(),
            patches = patches.len(),
            global = tree.global_unread(),
            "Unread counters patched"
        );
        let needs_resync = delta.needs_resync();
        self.rerender();
        UnreadApplied {
            patches,
            needs_resync,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutation::{DropTarget, Reconcile};
    use crate::tree::fixtures::{cat, root, sub};
    use crate::tree::{Placeholder, ReadTransition};
    use pretty_assertions::assert_eq;

    fn payload() -> TreePayload {
        root(
            vec![cat(
                "a",
                "A",
                vec![],
                vec![sub("s1", "S1", 3), sub("s2", "S2", 0)],
            )],
            vec![sub("s3", "Top", 0)],
        )
    }

    fn loaded(unread_only: bool) -> TreeController {
        let mut controller = TreeController::new(unread_only);
        let ticket = controller.begin_resync();
        controller.apply_resync(ticket, Ok(payload())).unwrap();
        controller
    }

    #[test]
    fn test_resync_replaces_tree_and_rows() {
        let controller = loaded(false);
        assert_eq!(controller.rows().len(), 4);
        assert_eq!(controller.global_unread(), 3);
        assert!(!controller.is_loading());
    }

    #[test]
    fn test_completion_order_wins() {
        let mut controller = TreeController::new(false);
        let older = controller.begin_resync();
        let newer = controller.begin_resync();

        let mut newer_payload = payload();
        newer_payload.categories[0].folded = true;
        controller.apply_resync(newer, Ok(newer_payload)).unwrap();
        assert!(controller.tree().unwrap().category(&"a".into()).unwrap().folded);

        // the older request completes last and overwrites
        controller.apply_resync(older, Ok(payload())).unwrap();
        assert!(!controller.tree().unwrap().category(&"a".into()).unwrap().folded);
    }

    #[test]
    fn test_resync_after_fold_overrides_optimistic_value() {
        let mut controller = loaded(false);
        let ticket = controller.begin_resync();
        let mut pending = controller
            .begin_mutation(Mutation::ToggleFold { id: "a".into() })
            .unwrap();
        assert!(controller.tree().unwrap().category(&"a".into()).unwrap().folded);
        assert_eq!(controller.rows().len(), 2);

        // resync issued before the toggle returns the old folded value
        controller.apply_resync(ticket, Ok(payload())).unwrap();
        assert!(!controller.tree().unwrap().category(&"a".into()).unwrap().folded);

        assert_eq!(pending.finish(&Ok(None)), Reconcile::Nothing);
    }

    #[test]
    fn test_failed_resync_keeps_previous_tree() {
        let mut controller = loaded(false);
        let ticket = controller.begin_resync();
        let err = ApiError::HttpStatus {
            status: 502,
            message: Some("Bad gateway".into()),
        };
        assert!(controller.apply_resync(ticket, Err(err)).is_err());
        assert_eq!(controller.load_error(), Some("Bad gateway"));
        assert_eq!(controller.rows().len(), 4);
    }

    #[test]
    fn test_periodic_resync_gated_by_edit_popup() {
        let mut controller = loaded(false);
        assert!(controller.should_periodic_resync());
        controller.set_edit_popup_open(true);
        assert!(!controller.should_periodic_resync());
        controller.set_edit_popup_open(false);
        assert!(controller.should_periodic_resync());
    }

    #[test]
    fn test_selection_survives_resync_by_title() {
        let mut controller = loaded(false);
        assert!(controller.toggle_subscription_checked(&"s1".into()));

        let ticket = controller.begin_resync();
        controller.apply_resync(ticket, Ok(payload())).unwrap();
        assert!(controller.is_checked(&NodeRef::Subscription("s1".into())));

        // renamed on the server: the association is lost
        let mut renamed = payload();
        renamed.categories[0].subscriptions[0].title = "S1 (renamed)".into();
        let ticket = controller.begin_resync();
        controller.apply_resync(ticket, Ok(renamed)).unwrap();
        assert!(!controller.is_checked(&NodeRef::Subscription("s1".into())));
    }

    #[test]
    fn test_category_check_cascades() {
        let mut controller = loaded(false);
        assert!(controller.toggle_category_checked(&"a".into()));
        assert!(controller.is_checked(&NodeRef::Category("a".into())));
        assert_eq!(
            controller.checked_subscription_ids(),
            vec![SubscriptionId::from("s1"), SubscriptionId::from("s2")]
        );
        assert!(!controller.toggle_category_checked(&"a".into()));
        assert!(controller.checked_subscription_ids().is_empty());
    }

    #[test]
    fn test_unread_toggle_resets_checkboxes() {
        let mut controller = loaded(false);
        controller.toggle_subscription_checked(&"s3".into());
        controller.set_unread_only(true);
        assert!(controller.checked_subscription_ids().is_empty());
        assert_eq!(controller.rows().len(), 2);
    }

    #[test]
    fn test_show_all_from_empty_unread_placeholder() {
        let mut all_read = payload();
        all_read.categories[0].subscriptions[0].unread_count = 0;
        all_read.categories[0].unread_count = 0;
        let mut controller = TreeController::new(true);
        let ticket = controller.begin_resync();
        controller.apply_resync(ticket, Ok(all_read)).unwrap();
        assert_eq!(
            controller.rendered(),
            Some(&Rendered::Placeholder(Placeholder::EmptyUnread))
        );

        controller.show_all();
        assert!(!controller.unread_only());
        assert!(!controller.begin_resync().unread_only());
        assert_eq!(controller.rows().len(), 4);
    }

    #[test]
    fn test_rejected_mutation_sends_nothing_and_keeps_tree() {
        let mut controller = loaded(false);
        let before = controller.tree().cloned();
        let result = controller.begin_mutation(Mutation::MoveCategory {
            id: "a".into(),
            target: DropTarget::end_of("a".into()),
        });
        assert_eq!(result.unwrap_err(), ValidationError::Cycle);
        assert_eq!(controller.tree().cloned(), before);
    }

    #[test]
    fn test_unread_batch_updates_rows_and_global() {
        let mut controller = loaded(true);
        let mut batch = UnreadBatch::new(ReadTransition::MarkRead);
        batch.push("x1", "s1".into(), false);
        let applied = controller.apply_unread_batch(&batch);
        assert_eq!(applied.patches.len(), 2);
        assert!(!applied.needs_resync);
        assert_eq!(controller.global_unread(), 2);
        let s1 = controller
            .rows()
            .iter()
            .find(|r| r.node == NodeRef::Subscription("s1".into()))
            .unwrap();
        assert_eq!(s1.counts, "(2/13)");
    }

    #[test]
    fn test_active_marker_follows_context() {
        let mut controller = loaded(false);
        controller.set_active(ActiveContext::Subscription("s3".into()));
        let active: Vec<_> = controller
            .rows()
            .iter()
            .filter(|r| r.markers.active)
            .map(|r| r.node.clone())
            .collect();
        assert_eq!(active, vec![NodeRef::Subscription("s3".into())]);
    }
}
