use std::collections::{BTreeMap, HashSet};

use super::model::Tree;
use super::{CategoryId, NodeRef, SubscriptionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadTransition {
    MarkRead,
    MarkUnread,
}

impl ReadTransition {
    /// Unread-count delta contributed by one article.
    pub fn delta(self) -> i64 {
        match self {
            ReadTransition::MarkRead => -1,
            ReadTransition::MarkUnread => 1,
        }
    }

    /// Read state an article ends up in.
    pub fn target_read(self) -> bool {
        matches!(self, ReadTransition::MarkRead)
    }

    pub fn for_target(read: bool) -> Self {
        if read {
            ReadTransition::MarkRead
        } else {
            ReadTransition::MarkUnread
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnreadUpdate {
    pub article_id: String,
    pub subscription: SubscriptionId,
}

/// Article transitions in a single direction, sent as one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnreadBatch {
    transition: ReadTransition,
    entries: Vec<UnreadUpdate>,
    seen: HashSet<String>,
}

impl UnreadBatch {
    pub fn new(transition: ReadTransition) -> Self {
        Self {
            transition,
            entries: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Queue one article. Returns false, queuing nothing, when the article
    /// is already in the target state or already queued.
    pub fn push(
        &mut self,
        article_id: impl Into<String>,
        subscription: SubscriptionId,
        currently_read: bool,
    ) -> bool {
        if currently_read == self.transition.target_read() {
            return false;
        }
        let article_id = article_id.into();
        if !self.seen.insert(article_id.clone()) {
            return false;
        }
        self.entries.push(UnreadUpdate {
            article_id,
            subscription,
        });
        true
    }

    pub fn transition(&self) -> ReadTransition {
        self.transition
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[UnreadUpdate] {
        &self.entries
    }

    /// Ids for the `article/read` or `article/unread` request body.
    pub fn article_ids(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.article_id.clone()).collect()
    }

    /// Sum the batch into one signed delta per subscription and per
    /// ancestor category.
    ///
    /// Each distinct subscription's ancestor chain is walked once,
    /// whatever the number of articles in it.
    pub fn aggregate(&self, tree: &Tree) -> UnreadDelta {
        let step = self.transition.delta();
        let mut per_subscription: BTreeMap<SubscriptionId, i64> = BTreeMap::new();
        for entry in &self.entries {
            *per_subscription.entry(entry.subscription.clone()).or_default() += step;
        }

        let mut delta = UnreadDelta::default();
        for (id, d) in per_subscription {
            let ancestors = tree.ancestors_of_subscription(&id);
            if ancestors.is_empty() {
                delta.unknown.push(id);
                continue;
            }
            for category in ancestors {
                if &category == tree.root_id() {
                    continue;
                }
                *delta.categories.entry(category).or_default() += d;
            }
            delta.global += d;
            delta.subscriptions.insert(id, d);
        }
        delta
    }
}

/// Aggregated signed deltas, ready to apply to a tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnreadDelta {
    pub subscriptions: BTreeMap<SubscriptionId, i64>,
    /// Non-root ancestor categories.
    pub categories: BTreeMap<CategoryId, i64>,
    /// Change to the global counter (the root category).
    pub global: i64,
    /// Subscriptions no longer in the tree; their articles change state on
    /// the server but no local counter can follow.
    pub unknown: Vec<SubscriptionId>,
}

/// New counter value for one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterPatch {
    pub node: NodeRef,
    pub unread_count: u32,
    /// Whether the node now carries the unread marker.
    pub unread: bool,
}

impl UnreadDelta {
    pub fn needs_resync(&self) -> bool {
        !self.unknown.is_empty()
    }

    /// Apply the deltas, saturating at zero, and return one patch per
    /// touched node. The root's new count is `tree.global_unread()`.
    pub fn apply(&self, tree: &mut Tree) -> Vec<CounterPatch> {
        let mut patches = Vec::with_capacity(self.subscriptions.len() + self.categories.len());

        for (id, &d) in &self.subscriptions {
            if let Some(sub) = tree.subscription_mut(id) {
                sub.unread_count = shift(sub.unread_count, d);
                patches.push(CounterPatch {
                    node: NodeRef::Subscription(id.clone()),
                    unread_count: sub.unread_count,
                    unread: sub.unread_count > 0,
                });
            }
        }
        for (id, &d) in &self.categories {
            if let Some(category) = tree.category_mut(id) {
                category.unread_count = shift(category.unread_count, d);
                patches.push(CounterPatch {
                    node: NodeRef::Category(id.clone()),
                    unread_count: category.unread_count,
                    unread: category.unread_count > 0,
                });
            }
        }
        let root_id = tree.root_id().clone();
        if let Some(root) = tree.category_mut(&root_id) {
            root.unread_count = shift(root.unread_count, self.global);
        }
        patches
    }
}

fn shift(count: u32, delta: i64) -> u32 {
    (i64::from(count) + delta).clamp(0, i64::from(u32::MAX)) as u32
}
