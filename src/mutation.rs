//! User mutations of the subscription tree.
//!
//! Every mutation goes through the same steps:
//!
//! 1. **validate** against the local tree, with no network and no state
//!    change on failure
//! 2. **optimistic** local effect (only fold toggling has one)
//! 3. **send** the server request
//! 4. **reconcile** from the outcome, which for everything structural
//!    means a full resync
//!
//! [`PendingMutation`] tracks one mutation through
//! `Idle -> Pending -> Committed | RolledBack`.

use thiserror::Error;

use crate::api::{ApiError, CategoryUpdate, ReaderClient, SubscriptionUpdate};
use crate::tree::{CategoryId, NodeRef, SubscriptionId, Tree, MAX_NESTING_LEVEL};
use crate::util::{validate_feed_url, UrlValidationError};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Name cannot be empty")]
    EmptyName,
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Max nesting exceeded: level {level} + depth {depth} > 5")]
    MaxNestingExceeded { level: u32, depth: u32 },
    #[error("Cannot move a category into itself")]
    Cycle,
    #[error("Item no longer exists")]
    UnknownNode,
}

impl From<UrlValidationError> for ValidationError {
    fn from(e: UrlValidationError) -> Self {
        ValidationError::InvalidUrl(e.to_string())
    }
}

/// Where a dragged node lands: inside `parent`, just before `before`, or
/// at the end of its sibling group when `before` is `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropTarget {
    pub parent: CategoryId,
    pub before: Option<NodeRef>,
}

impl DropTarget {
    pub fn end_of(parent: CategoryId) -> Self {
        Self {
            parent,
            before: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    MoveSubscription { id: SubscriptionId, target: DropTarget },
    MoveCategory { id: CategoryId, target: DropTarget },
    ToggleFold { id: CategoryId },
    RenameCategory { id: CategoryId, name: String },
    RetitleSubscription { id: SubscriptionId, title: String },
    DeleteCategory { id: CategoryId },
    DeleteSubscription { id: SubscriptionId },
    /// Re-categorize one subscription from the category picker.
    ChangeCategory { id: SubscriptionId, category: CategoryId },
    AddSubscription { url: String },
    CreateCategory { name: String },
    MarkSubscriptionRead { id: SubscriptionId },
    MarkCategoryRead { id: CategoryId },
}

/// What to do once the server has answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconcile {
    Nothing,
    Resync,
    /// Resync and return to the Unread context; the active node may be gone.
    ResyncAndGoHome,
    /// Resync and make the new subscription active.
    ResyncAndOpen(SubscriptionId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationState {
    Idle,
    Pending,
    Committed,
    RolledBack,
}

/// The HTTP call a mutation issues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationRequest {
    UpdateSubscription { id: String, update: SubscriptionUpdate },
    UpdateCategory { id: String, update: CategoryUpdate },
    DeleteSubscription { id: String },
    DeleteCategory { id: String },
    AddSubscription { url: String },
    CreateCategory { name: String },
    MarkSubscriptionRead { id: String },
    MarkCategoryRead { id: String },
}

impl MutationRequest {
    /// Issue the request. Returns the created id for additions.
    pub async fn send(&self, client: &ReaderClient) -> Result<Option<String>, ApiError> {
        match self {
            MutationRequest::UpdateSubscription { id, update } => {
                client.update_subscription(id, update).await.map(|_| None)
            }
            MutationRequest::UpdateCategory { id, update } => {
                client.update_category(id, update).await.map(|_| None)
            }
            MutationRequest::DeleteSubscription { id } => {
                client.delete_subscription(id).await.map(|_| None)
            }
            MutationRequest::DeleteCategory { id } => client.delete_category(id).await.map(|_| None),
            MutationRequest::AddSubscription { url } => client.add_subscription(url).await.map(Some),
            MutationRequest::CreateCategory { name } => client.create_category(name).await.map(Some),
            MutationRequest::MarkSubscriptionRead { id } => {
                client.mark_subscription_read(id).await.map(|_| None)
            }
            MutationRequest::MarkCategoryRead { id } => {
                client.mark_category_read(id).await.map(|_| None)
            }
        }
    }
}

// ============================================================================
// Validation and request building
// ============================================================================

impl Mutation {
    pub fn validate(&self, tree: Option<&Tree>) -> Result<(), ValidationError> {
        self.request(tree).map(|_| ())
    }

    /// Validate and build the server request from the current tree.
    ///
    /// Must run before [`Mutation::optimistic`]: the fold request carries
    /// the toggled value computed from the pre-toggle state.
    pub fn request(&self, tree: Option<&Tree>) -> Result<MutationRequest, ValidationError> {
        let need = || tree.ok_or(ValidationError::UnknownNode);
        match self {
            Mutation::AddSubscription { url } => {
                let url = validate_feed_url(url)?;
                Ok(MutationRequest::AddSubscription {
                    url: url.to_string(),
                })
            }
            Mutation::CreateCategory { name } => Ok(MutationRequest::CreateCategory {
                name: non_empty(name)?,
            }),
            Mutation::MoveSubscription { id, target } => {
                let tree = need()?;
                tree.subscription(id).ok_or(ValidationError::UnknownNode)?;
                let parent = tree
                    .category(&target.parent)
                    .ok_or(ValidationError::UnknownNode)?;
                let order = match &target.before {
                    // categories precede subscriptions, so this lands first
                    Some(NodeRef::Category(before)) => {
                        if !parent.categories.iter().any(|c| &c.id == before) {
                            return Err(ValidationError::UnknownNode);
                        }
                        0
                    }
                    Some(NodeRef::Subscription(before)) => {
                        sibling_position(parent.subscriptions.iter().map(|s| &s.id), id, before)?
                    }
                    None => parent.subscriptions.iter().filter(|s| &s.id != id).count(),
                };
                Ok(MutationRequest::UpdateSubscription {
                    id: id.0.clone(),
                    update: SubscriptionUpdate {
                        category: Some(target.parent.0.clone()),
                        order: Some(order),
                        ..Default::default()
                    },
                })
            }
            Mutation::MoveCategory { id, target } => {
                let tree = need()?;
                let dragged = tree.category(id).ok_or(ValidationError::UnknownNode)?;
                if dragged.is_root() {
                    return Err(ValidationError::UnknownNode);
                }
                let parent = tree
                    .category(&target.parent)
                    .ok_or(ValidationError::UnknownNode)?;
                if tree.is_within(id, &parent.id) {
                    return Err(ValidationError::Cycle);
                }
                if !parent.is_root() {
                    let level = parent.nesting_level;
                    let depth = dragged.max_subcategory_depth;
                    if level + depth > MAX_NESTING_LEVEL {
                        return Err(ValidationError::MaxNestingExceeded { level, depth });
                    }
                }
                let order = match &target.before {
                    Some(NodeRef::Category(before)) => {
                        sibling_position(parent.categories.iter().map(|c| &c.id), id, before)?
                    }
                    // subscriptions follow every category
                    Some(NodeRef::Subscription(_)) | None => {
                        parent.categories.iter().filter(|c| &c.id != id).count()
                    }
                };
                Ok(MutationRequest::UpdateCategory {
                    id: id.0.clone(),
                    update: CategoryUpdate {
                        parent_id: Some(target.parent.0.clone()),
                        order: Some(order),
                        ..Default::default()
                    },
                })
            }
            Mutation::ToggleFold { id } => {
                let category = need()?.category(id).ok_or(ValidationError::UnknownNode)?;
                Ok(MutationRequest::UpdateCategory {
                    id: id.0.clone(),
                    update: CategoryUpdate {
                        folded: Some(!category.folded),
                        ..Default::default()
                    },
                })
            }
            Mutation::RenameCategory { id, name } => {
                let name = non_empty(name)?;
                require_non_root(need()?, id)?;
                Ok(MutationRequest::UpdateCategory {
                    id: id.0.clone(),
                    update: CategoryUpdate {
                        name: Some(name),
                        ..Default::default()
                    },
                })
            }
            Mutation::RetitleSubscription { id, title } => {
                let title = non_empty(title)?;
                need()?.subscription(id).ok_or(ValidationError::UnknownNode)?;
                Ok(MutationRequest::UpdateSubscription {
                    id: id.0.clone(),
                    update: SubscriptionUpdate {
                        title: Some(title),
                        ..Default::default()
                    },
                })
            }
            Mutation::DeleteCategory { id } => {
                require_non_root(need()?, id)?;
                Ok(MutationRequest::DeleteCategory { id: id.0.clone() })
            }
            Mutation::DeleteSubscription { id } => {
                need()?.subscription(id).ok_or(ValidationError::UnknownNode)?;
                Ok(MutationRequest::DeleteSubscription { id: id.0.clone() })
            }
            Mutation::ChangeCategory { id, category } => {
                need()?.subscription(id).ok_or(ValidationError::UnknownNode)?;
                Ok(MutationRequest::UpdateSubscription {
                    id: id.0.clone(),
                    update: SubscriptionUpdate {
                        category: Some(category.0.clone()),
                        ..Default::default()
                    },
                })
            }
            Mutation::MarkSubscriptionRead { id } => {
                need()?.subscription(id).ok_or(ValidationError::UnknownNode)?;
                Ok(MutationRequest::MarkSubscriptionRead { id: id.0.clone() })
            }
            Mutation::MarkCategoryRead { id } => {
                need()?.category(id).ok_or(ValidationError::UnknownNode)?;
                Ok(MutationRequest::MarkCategoryRead { id: id.0.clone() })
            }
        }
    }

    /// Immediate local effect applied while the request is in flight.
    pub fn optimistic(&self, tree: &mut Tree) {
        if let Mutation::ToggleFold { id } = self {
            if let Some(category) = tree.category_mut(id) {
                category.folded = !category.folded;
            }
        }
    }

    /// Reconciliation for a finished request. `created` is the id the
    /// server returned for additions.
    pub fn reconcile(&self, outcome: Result<Option<&str>, &ApiError>) -> Reconcile {
        match (self, outcome) {
            (Mutation::ToggleFold { .. }, Ok(_)) => Reconcile::Nothing,
            (Mutation::ToggleFold { .. }, Err(_)) => Reconcile::Resync,
            (Mutation::DeleteCategory { .. } | Mutation::DeleteSubscription { .. }, _) => {
                Reconcile::ResyncAndGoHome
            }
            (Mutation::AddSubscription { .. }, Ok(Some(id))) => {
                Reconcile::ResyncAndOpen(SubscriptionId(id.to_owned()))
            }
            (Mutation::AddSubscription { .. }, Ok(None)) => Reconcile::Resync,
            (Mutation::AddSubscription { .. }, Err(_)) => Reconcile::Nothing,
            _ => Reconcile::Resync,
        }
    }

    /// Status bar text for a successful mutation.
    pub fn success_message(&self) -> &'static str {
        match self {
            Mutation::MoveSubscription { .. } => "Subscription moved",
            Mutation::MoveCategory { .. } => "Category moved",
            Mutation::ToggleFold { .. } => "Fold state saved",
            Mutation::RenameCategory { .. } => "Category renamed",
            Mutation::RetitleSubscription { .. } => "Subscription renamed",
            Mutation::DeleteCategory { .. } => "Category deleted",
            Mutation::DeleteSubscription { .. } => "Unsubscribed",
            Mutation::ChangeCategory { .. } => "Category changed",
            Mutation::AddSubscription { .. } => "Subscribed",
            Mutation::CreateCategory { .. } => "Category created",
            Mutation::MarkSubscriptionRead { .. } | Mutation::MarkCategoryRead { .. } => {
                "Marked as read"
            }
        }
    }

    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Mutation::MoveSubscription { .. } => "move_subscription",
            Mutation::MoveCategory { .. } => "move_category",
            Mutation::ToggleFold { .. } => "toggle_fold",
            Mutation::RenameCategory { .. } => "rename_category",
            Mutation::RetitleSubscription { .. } => "retitle_subscription",
            Mutation::DeleteCategory { .. } => "delete_category",
            Mutation::DeleteSubscription { .. } => "delete_subscription",
            Mutation::ChangeCategory { .. } => "change_category",
            Mutation::AddSubscription { .. } => "add_subscription",
            Mutation::CreateCategory { .. } => "create_category",
            Mutation::MarkSubscriptionRead { .. } => "mark_subscription_read",
            Mutation::MarkCategoryRead { .. } => "mark_category_read",
        }
    }
}

fn require_non_root(tree: &Tree, id: &CategoryId) -> Result<(), ValidationError> {
    match tree.category(id) {
        Some(c) if !c.is_root() => Ok(()),
        _ => Err(ValidationError::UnknownNode),
    }
}

fn non_empty(input: &str) -> Result<String, ValidationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    Ok(trimmed.to_owned())
}

/// Index `before` will have among `siblings` once `dragged` is removed.
fn sibling_position<'a, T: PartialEq + 'a>(
    siblings: impl Iterator<Item = &'a T>,
    dragged: &T,
    before: &T,
) -> Result<usize, ValidationError> {
    let mut position = 0;
    for id in siblings {
        if id == before {
            return Ok(position);
        }
        if id != dragged {
            position += 1;
        }
    }
    Err(ValidationError::UnknownNode)
}

// ============================================================================
// Lifecycle
// ============================================================================

/// One in-flight mutation.
#[derive(Debug, Clone)]
pub struct PendingMutation {
    mutation: Mutation,
    request: MutationRequest,
    state: MutationState,
}

impl PendingMutation {
    /// Validate, build the request and apply the optimistic effect.
    ///
    /// On a validation error nothing is sent and the tree is untouched.
    pub fn begin(mutation: Mutation, tree: Option<&mut Tree>) -> Result<Self, ValidationError> {
        let mut pending = Self {
            request: mutation.request(tree.as_deref())?,
            mutation,
            state: MutationState::Idle,
        };
        if let Some(tree) = tree {
            pending.mutation.optimistic(tree);
        }
        pending.state = MutationState::Pending;
        Ok(pending)
    }

    pub fn mutation(&self) -> &Mutation {
        &self.mutation
    }

    pub fn request(&self) -> &MutationRequest {
        &self.request
    }

    pub fn state(&self) -> MutationState {
        self.state
    }

    /// Record the server outcome and return the reconciliation to run.
    pub fn finish(&mut self, result: &Result<Option<String>, ApiError>) -> Reconcile {
        self.state = match result {
            Ok(_) => MutationState::Committed,
            Err(_) => MutationState::RolledBack,
        };
        self.mutation.reconcile(match result {
            Ok(created) => Ok(created.as_deref()),
            Err(e) => Err(e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::fixtures::{cat, chain, root, sub};
    use pretty_assertions::assert_eq;

    fn sample() -> Tree {
        Tree::from_payload(root(
            vec![
                cat(
                    "a",
                    "A",
                    vec![cat("a1", "A1", vec![], vec![])],
                    vec![sub("s1", "S1", 1), sub("s2", "S2", 0), sub("s3", "S3", 0)],
                ),
                cat("b", "B", vec![], vec![sub("s4", "S4", 2)]),
            ],
            vec![sub("s0", "Top", 0)],
        ))
    }

    fn update_of(request: MutationRequest) -> SubscriptionUpdate {
        match request {
            MutationRequest::UpdateSubscription { update, .. } => update,
            other => panic!("unexpected request {other:?}"),
        }
    }

    fn category_update_of(request: MutationRequest) -> CategoryUpdate {
        match request {
            MutationRequest::UpdateCategory { update, .. } => update,
            other => panic!("unexpected request {other:?}"),
        }
    }

    #[test]
    fn test_move_subscription_within_category() {
        let tree = sample();
        // s1 dropped before s3: remaining siblings are s2, s3
        let m = Mutation::MoveSubscription {
            id: "s1".into(),
            target: DropTarget {
                parent: "a".into(),
                before: Some(NodeRef::Subscription("s3".into())),
            },
        };
        let update = update_of(m.request(Some(&tree)).unwrap());
        assert_eq!(update.category.as_deref(), Some("a"));
        assert_eq!(update.order, Some(1));
    }

    #[test]
    fn test_move_subscription_ignores_category_rows() {
        let tree = sample();
        let before_category = Mutation::MoveSubscription {
            id: "s4".into(),
            target: DropTarget {
                parent: "a".into(),
                before: Some(NodeRef::Category("a1".into())),
            },
        };
        assert_eq!(update_of(before_category.request(Some(&tree)).unwrap()).order, Some(0));

        let at_end = Mutation::MoveSubscription {
            id: "s4".into(),
            target: DropTarget::end_of("a".into()),
        };
        assert_eq!(update_of(at_end.request(Some(&tree)).unwrap()).order, Some(3));
    }

    #[test]
    fn test_move_subscription_to_top_level_uses_root_id() {
        let tree = sample();
        let m = Mutation::MoveSubscription {
            id: "s4".into(),
            target: DropTarget {
                parent: "root".into(),
                before: Some(NodeRef::Subscription("s0".into())),
            },
        };
        let update = update_of(m.request(Some(&tree)).unwrap());
        assert_eq!(update.category.as_deref(), Some("root"));
        assert_eq!(update.order, Some(0));
    }

    #[test]
    fn test_move_category_order_counts_categories_only() {
        let tree = sample();
        let m = Mutation::MoveCategory {
            id: "b".into(),
            target: DropTarget {
                parent: "root".into(),
                before: Some(NodeRef::Category("a".into())),
            },
        };
        let update = category_update_of(m.request(Some(&tree)).unwrap());
        assert_eq!(update.parent_id.as_deref(), Some("root"));
        assert_eq!(update.order, Some(0));

        let after_subs = Mutation::MoveCategory {
            id: "a".into(),
            target: DropTarget {
                parent: "root".into(),
                before: Some(NodeRef::Subscription("s0".into())),
            },
        };
        assert_eq!(
            category_update_of(after_subs.request(Some(&tree)).unwrap()).order,
            Some(1)
        );
    }

    #[test]
    fn test_move_category_nesting_limit() {
        // c1 > c2 > c3 > c4, with c4 at level 4
        let mut payload = chain(4);
        // B has one subcategory: depth 2
        payload
            .categories
            .push(cat("b", "B", vec![cat("b1", "B1", vec![], vec![])], vec![]));
        let mut tree = Tree::from_payload(payload);
        assert_eq!(tree.category(&"c4".into()).unwrap().nesting_level, 4);
        assert_eq!(tree.category(&"b".into()).unwrap().max_subcategory_depth, 2);

        let into_c4 = Mutation::MoveCategory {
            id: "b".into(),
            target: DropTarget::end_of("c4".into()),
        };
        let before = tree.clone();
        assert_eq!(
            PendingMutation::begin(into_c4, Some(&mut tree)).unwrap_err(),
            ValidationError::MaxNestingExceeded { level: 4, depth: 2 }
        );
        assert_eq!(tree, before);

        let into_c3 = Mutation::MoveCategory {
            id: "b".into(),
            target: DropTarget::end_of("c3".into()),
        };
        assert!(into_c3.validate(Some(&tree)).is_ok());
    }

    #[test]
    fn test_move_category_to_root_always_allowed() {
        // c2 carries four levels below it
        let tree = Tree::from_payload(chain(5));
        assert_eq!(tree.category(&"c2".into()).unwrap().max_subcategory_depth, 4);
        let m = Mutation::MoveCategory {
            id: "c2".into(),
            target: DropTarget::end_of("root".into()),
        };
        assert!(m.validate(Some(&tree)).is_ok());
    }

    #[test]
    fn test_move_category_into_own_subtree_is_cycle() {
        let tree = sample();
        for parent in ["a", "a1"] {
            let m = Mutation::MoveCategory {
                id: "a".into(),
                target: DropTarget::end_of(parent.into()),
            };
            assert_eq!(m.validate(Some(&tree)), Err(ValidationError::Cycle));
        }
    }

    #[test]
    fn test_toggle_fold_is_optimistic() {
        let mut tree = sample();
        let mut pending =
            PendingMutation::begin(Mutation::ToggleFold { id: "a".into() }, Some(&mut tree)).unwrap();
        assert!(tree.category(&"a".into()).unwrap().folded);
        assert_eq!(pending.state(), MutationState::Pending);
        assert_eq!(
            category_update_of(pending.request().clone()).folded,
            Some(true)
        );

        assert_eq!(pending.finish(&Ok(None)), Reconcile::Nothing);
        assert_eq!(pending.state(), MutationState::Committed);
    }

    #[test]
    fn test_failed_fold_resyncs() {
        let mut tree = sample();
        let mut pending =
            PendingMutation::begin(Mutation::ToggleFold { id: "a".into() }, Some(&mut tree)).unwrap();
        let result = Err(ApiError::HttpStatus {
            status: 500,
            message: None,
        });
        assert_eq!(pending.finish(&result), Reconcile::Resync);
        assert_eq!(pending.state(), MutationState::RolledBack);
    }

    #[test]
    fn test_structural_mutations_resync_either_way() {
        let err = ApiError::HttpStatus {
            status: 400,
            message: None,
        };
        let m = Mutation::RenameCategory {
            id: "a".into(),
            name: "New".into(),
        };
        assert_eq!(m.reconcile(Ok(None)), Reconcile::Resync);
        assert_eq!(m.reconcile(Err(&err)), Reconcile::Resync);

        let d = Mutation::DeleteSubscription { id: "s1".into() };
        assert_eq!(d.reconcile(Ok(None)), Reconcile::ResyncAndGoHome);
        assert_eq!(d.reconcile(Err(&err)), Reconcile::ResyncAndGoHome);
    }

    #[test]
    fn test_add_subscription_opens_new_subscription() {
        let m = Mutation::AddSubscription {
            url: "example.com/feed".into(),
        };
        assert_eq!(
            m.request(None).unwrap(),
            MutationRequest::AddSubscription {
                url: "https://example.com/feed".into()
            }
        );
        assert_eq!(
            m.reconcile(Ok(Some("s9"))),
            Reconcile::ResyncAndOpen("s9".into())
        );
    }

    #[test]
    fn test_validation_errors() {
        let tree = sample();
        let blank = Mutation::RenameCategory {
            id: "a".into(),
            name: "   ".into(),
        };
        assert_eq!(blank.validate(Some(&tree)), Err(ValidationError::EmptyName));

        let bad_url = Mutation::AddSubscription {
            url: "ftp://example.com".into(),
        };
        assert!(matches!(
            bad_url.validate(None),
            Err(ValidationError::InvalidUrl(_))
        ));

        let gone = Mutation::DeleteSubscription { id: "zzz".into() };
        assert_eq!(gone.validate(Some(&tree)), Err(ValidationError::UnknownNode));

        let no_tree = Mutation::ToggleFold { id: "a".into() };
        assert_eq!(no_tree.validate(None), Err(ValidationError::UnknownNode));

        let root = Mutation::DeleteCategory { id: "root".into() };
        assert_eq!(root.validate(Some(&tree)), Err(ValidationError::UnknownNode));
    }

    #[test]
    fn test_rename_trims_name() {
        let tree = sample();
        let m = Mutation::RenameCategory {
            id: "a".into(),
            name: "  Reading  ".into(),
        };
        assert_eq!(
            category_update_of(m.request(Some(&tree)).unwrap()).name.as_deref(),
            Some("Reading")
        );
    }
}
