use super::model::{Category, Subscription, Tree};
use super::{ActiveContext, CategoryId, NodeRef, SubscriptionId};
use crate::util::sanitize_label;

/// Display state attached to every rendered node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeMarkers {
    pub active: bool,
    pub unread: bool,
    pub failing: bool,
    pub folded: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedCategory {
    pub id: CategoryId,
    pub name: String,
    pub nesting_level: u32,
    pub max_subcategory_depth: u32,
    pub unread_count: u32,
    pub total_count: u32,
    pub markers: NodeMarkers,
    pub children: Vec<RenderedNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedSubscription {
    pub id: SubscriptionId,
    pub title: String,
    pub category_id: CategoryId,
    pub unread_count: u32,
    pub total_count: u32,
    pub markers: NodeMarkers,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderedNode {
    Category(RenderedCategory),
    Subscription(RenderedSubscription),
}

impl RenderedNode {
    pub fn node_ref(&self) -> NodeRef {
        match self {
            RenderedNode::Category(c) => NodeRef::Category(c.id.clone()),
            RenderedNode::Subscription(s) => NodeRef::Subscription(s.id.clone()),
        }
    }
}

/// Shown instead of the tree when nothing is visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    /// The user has no subscriptions at all.
    Empty,
    /// Everything was filtered out by `unread_only`; offers "show all".
    EmptyUnread,
}

impl Placeholder {
    pub fn message(self) -> &'static str {
        match self {
            Placeholder::Empty => "No subscriptions yet. Press 'a' to add one.",
            Placeholder::EmptyUnread => "No unread articles. Press Enter to show all subscriptions.",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Rendered {
    Tree(Vec<RenderedNode>),
    Placeholder(Placeholder),
}

impl Rendered {
    /// Number of rendered nodes, folded children included.
    pub fn node_count(&self) -> usize {
        fn count(nodes: &[RenderedNode]) -> usize {
            nodes
                .iter()
                .map(|n| match n {
                    RenderedNode::Category(c) => 1 + count(&c.children),
                    RenderedNode::Subscription(_) => 1,
                })
                .sum()
        }
        match self {
            Rendered::Tree(nodes) => count(nodes),
            Rendered::Placeholder(_) => 0,
        }
    }
}

// ============================================================================
// Rendering
// ============================================================================

/// Render the tree below the root.
///
/// With `unread_only`, nodes with no unread articles are omitted. At each
/// level categories come first, then subscriptions, both in server order.
pub fn render(tree: &Tree, unread_only: bool, active: &ActiveContext) -> Rendered {
    let nodes = render_children(tree.root(), unread_only, active);
    if !nodes.is_empty() {
        return Rendered::Tree(nodes);
    }
    // The server drops read nodes from an unread listing, so an empty
    // unread view says nothing about whether the account has subscriptions
    if unread_only {
        Rendered::Placeholder(Placeholder::EmptyUnread)
    } else {
        Rendered::Placeholder(Placeholder::Empty)
    }
}

fn render_children(parent: &Category, unread_only: bool, active: &ActiveContext) -> Vec<RenderedNode> {
    let visible = |unread: u32| !unread_only || unread > 0;

    let categories = parent
        .categories
        .iter()
        .filter(|c| visible(c.unread_count))
        .map(|c| RenderedNode::Category(render_category(c, unread_only, active)));
    let subscriptions = parent
        .subscriptions
        .iter()
        .filter(|s| visible(s.unread_count))
        .map(|s| RenderedNode::Subscription(render_subscription(s, active)));

    categories.chain(subscriptions).collect()
}

fn render_category(category: &Category, unread_only: bool, active: &ActiveContext) -> RenderedCategory {
    RenderedCategory {
        id: category.id.clone(),
        name: sanitize_label(&category.name).into_owned(),
        nesting_level: category.nesting_level,
        max_subcategory_depth: category.max_subcategory_depth,
        unread_count: category.unread_count,
        total_count: category.total_count,
        markers: NodeMarkers {
            active: *active == ActiveContext::Category(category.id.clone()),
            unread: category.unread_count > 0,
            failing: false,
            folded: category.folded,
        },
        children: render_children(category, unread_only, active),
    }
}

fn render_subscription(sub: &Subscription, active: &ActiveContext) -> RenderedSubscription {
    RenderedSubscription {
        id: sub.id.clone(),
        title: sanitize_label(&sub.title).into_owned(),
        category_id: sub.category_id.clone(),
        unread_count: sub.unread_count,
        total_count: sub.total_count,
        markers: NodeMarkers {
            active: *active == ActiveContext::Subscription(sub.id.clone()),
            unread: sub.unread_count > 0,
            failing: sub.is_failing(),
            folded: false,
        },
    }
}

// ============================================================================
// Flattening
// ============================================================================

/// One display line of the tree panel.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeRow {
    pub depth: usize,
    pub node: NodeRef,
    pub label: String,
    /// `(unread)` for categories, `(unread/total)` for subscriptions.
    pub counts: String,
    pub unread_count: u32,
    pub markers: NodeMarkers,
    /// Category with visible children (shows a fold indicator).
    pub expandable: bool,
    /// For subscriptions, the containing category.
    pub parent: Option<CategoryId>,
}

/// Flatten rendered nodes into rows, skipping the children of folded
/// categories.
pub fn flatten(nodes: &[RenderedNode]) -> Vec<TreeRow> {
    let mut rows = Vec::new();
    flatten_into(nodes, 0, &mut rows);
    rows
}

fn flatten_into(nodes: &[RenderedNode], depth: usize, rows: &mut Vec<TreeRow>) {
    for node in nodes {
        match node {
            RenderedNode::Category(c) => {
                rows.push(TreeRow {
                    depth,
                    node: NodeRef::Category(c.id.clone()),
                    label: c.name.clone(),
                    counts: format!("({})", c.unread_count),
                    unread_count: c.unread_count,
                    markers: c.markers,
                    expandable: !c.children.is_empty(),
                    parent: None,
                });
                if !c.markers.folded {
                    flatten_into(&c.children, depth + 1, rows);
                }
            }
            RenderedNode::Subscription(s) => rows.push(TreeRow {
                depth,
                node: NodeRef::Subscription(s.id.clone()),
                label: s.title.clone(),
                counts: format!("({}/{})", s.unread_count, s.total_count),
                unread_count: s.unread_count,
                markers: s.markers,
                expandable: false,
                parent: Some(s.category_id.clone()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{CategoryPayload, SubscriptionPayload};
    use crate::tree::fixtures::{cat, root, sub};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn ids(rows: &[TreeRow]) -> Vec<String> {
        rows.iter()
            .map(|r| match &r.node {
                NodeRef::Category(id) => format!("c:{id}"),
                NodeRef::Subscription(id) => format!("s:{id}"),
            })
            .collect()
    }

    fn sample() -> Tree {
        Tree::from_payload(root(
            vec![
                cat("a", "A", vec![], vec![sub("s1", "S1", 3)]),
                cat("b", "B", vec![], vec![sub("s2", "S2", 0)]),
            ],
            vec![sub("s0", "Top", 0)],
        ))
    }

    #[test]
    fn test_categories_precede_subscriptions() {
        let tree = Tree::from_payload(root(
            vec![cat("a", "A", vec![], vec![])],
            vec![sub("s0", "Top", 1)],
        ));
        let Rendered::Tree(nodes) = render(&tree, false, &ActiveContext::Unread) else {
            panic!("expected tree");
        };
        assert_eq!(ids(&flatten(&nodes)), vec!["c:a", "s:s0"]);
    }

    #[test]
    fn test_unread_only_filters_read_nodes() {
        let tree = sample();
        let Rendered::Tree(nodes) = render(&tree, true, &ActiveContext::Unread) else {
            panic!("expected tree");
        };
        assert_eq!(ids(&flatten(&nodes)), vec!["c:a", "s:s1"]);
    }

    #[test]
    fn test_all_read_under_unread_only_offers_show_all() {
        let tree = Tree::from_payload(root(
            vec![cat("a", "A", vec![], vec![sub("s1", "S1", 0)])],
            vec![],
        ));
        assert_eq!(
            render(&tree, true, &ActiveContext::Unread),
            Rendered::Placeholder(Placeholder::EmptyUnread)
        );
        assert!(matches!(
            render(&tree, false, &ActiveContext::Unread),
            Rendered::Tree(_)
        ));
    }

    #[test]
    fn test_empty_tree_placeholder() {
        let tree = Tree::from_payload(root(vec![], vec![]));
        // An unread listing may come back empty because the server filtered it
        assert_eq!(
            render(&tree, true, &ActiveContext::Unread),
            Rendered::Placeholder(Placeholder::EmptyUnread)
        );
        assert_eq!(
            render(&tree, false, &ActiveContext::Unread),
            Rendered::Placeholder(Placeholder::Empty)
        );
    }

    #[test]
    fn test_markers() {
        let mut payload = root(
            vec![cat("a", "A", vec![], vec![sub("s1", "S1", 3)])],
            vec![sub("s0", "Broken", 0)],
        );
        payload.subscriptions[0].sync_fail_count = 5;
        payload.categories[0].folded = true;
        let tree = Tree::from_payload(payload);

        let active = ActiveContext::Subscription("s1".into());
        let Rendered::Tree(nodes) = render(&tree, false, &active) else {
            panic!("expected tree");
        };
        let RenderedNode::Category(a) = &nodes[0] else {
            panic!("expected category");
        };
        assert!(a.markers.folded);
        assert!(a.markers.unread);
        assert!(!a.markers.active);
        assert_eq!(a.nesting_level, 1);
        assert_eq!(a.max_subcategory_depth, 1);

        let RenderedNode::Subscription(s1) = &a.children[0] else {
            panic!("expected subscription");
        };
        assert!(s1.markers.active);

        let RenderedNode::Subscription(broken) = &nodes[1] else {
            panic!("expected subscription");
        };
        assert!(broken.markers.failing);
        assert!(!broken.markers.unread);
    }

    #[test]
    fn test_flatten_skips_folded_children() {
        let mut payload = root(
            vec![cat(
                "a",
                "A",
                vec![cat("a1", "Inner", vec![], vec![sub("s2", "S2", 1)])],
                vec![sub("s1", "S1", 1)],
            )],
            vec![],
        );
        payload.categories[0].categories[0].folded = true;
        let tree = Tree::from_payload(payload);
        let Rendered::Tree(nodes) = render(&tree, false, &ActiveContext::Unread) else {
            panic!("expected tree");
        };
        let rows = flatten(&nodes);
        assert_eq!(ids(&rows), vec!["c:a", "c:a1", "s:s1"]);
        assert_eq!(rows[1].depth, 1);
        assert!(rows[1].expandable);
        assert_eq!(rows[0].counts, "(2)");
        assert_eq!(rows[2].counts, "(1/11)");
        assert_eq!(rows[2].parent, Some(CategoryId::from("a")));
    }

    #[test]
    fn test_render_sanitizes_labels() {
        let tree = Tree::from_payload(root(vec![], vec![sub("s1", "Evil\x1b[2J\nFeed", 0)]));
        let Rendered::Tree(nodes) = render(&tree, false, &ActiveContext::Unread) else {
            panic!("expected tree");
        };
        assert_eq!(flatten(&nodes)[0].label, "Evil Feed");
    }

    // ------------------------------------------------------------------------
    // Properties
    // ------------------------------------------------------------------------

    fn arb_subscription() -> impl Strategy<Value = SubscriptionPayload> {
        (0u32..4, 0u32..8).prop_map(|(unread, fails)| SubscriptionPayload {
            unread_count: unread,
            total_count: unread + 2,
            sync_fail_count: fails,
            ..Default::default()
        })
    }

    fn arb_tree() -> impl Strategy<Value = Tree> {
        let leaf = prop::collection::vec(arb_subscription(), 0..4).prop_map(|subscriptions| {
            CategoryPayload {
                subscriptions,
                ..Default::default()
            }
        });
        leaf.prop_recursive(4, 48, 4, |inner| {
            (
                prop::collection::vec(inner, 0..4),
                prop::collection::vec(arb_subscription(), 0..4),
                any::<bool>(),
            )
                .prop_map(|(categories, subscriptions, folded)| CategoryPayload {
                    categories,
                    subscriptions,
                    folded,
                    ..Default::default()
                })
        })
        .prop_map(|mut payload| {
            let mut next = 0;
            label(&mut payload, &mut next);
            payload.id = "root".into();
            Tree::from_payload(payload)
        })
    }

    /// Assign unique ids and sum category counts bottom-up.
    fn label(payload: &mut CategoryPayload, next: &mut usize) {
        *next += 1;
        payload.id = format!("c{next}");
        payload.name = Some(format!("Category {next}"));
        for child in &mut payload.categories {
            label(child, next);
        }
        for s in &mut payload.subscriptions {
            *next += 1;
            s.id = format!("s{next}");
            s.title = format!("Feed {next}");
        }
        payload.unread_count = payload.categories.iter().map(|c| c.unread_count).sum::<u32>()
            + payload.subscriptions.iter().map(|s| s.unread_count).sum::<u32>();
    }

    fn rendered_ids(rendered: &Rendered) -> Vec<NodeRef> {
        fn walk(nodes: &[RenderedNode], out: &mut Vec<NodeRef>) {
            for n in nodes {
                out.push(n.node_ref());
                if let RenderedNode::Category(c) = n {
                    walk(&c.children, out);
                }
            }
        }
        let mut out = Vec::new();
        if let Rendered::Tree(nodes) = rendered {
            walk(nodes, &mut out);
        }
        out
    }

    fn model_nodes(tree: &Tree) -> Vec<(NodeRef, u32)> {
        let mut out = Vec::new();
        for id in tree.all_category_ids() {
            if id == tree.root_id() {
                continue;
            }
            let c = tree.category(id).unwrap();
            out.push((NodeRef::Category(id.clone()), c.unread_count));
        }
        for s in tree.descendant_subscriptions(tree.root_id()) {
            out.push((NodeRef::Subscription(s.id.clone()), s.unread_count));
        }
        out
    }

    proptest! {
        #[test]
        fn test_full_render_includes_every_node_once(tree in arb_tree()) {
            let rendered = render(&tree, false, &ActiveContext::Unread);
            let ids = rendered_ids(&rendered);
            let unique: HashSet<_> = ids.iter().cloned().collect();
            prop_assert_eq!(unique.len(), ids.len());
            prop_assert_eq!(ids.len(), tree.node_count());
            for (node, _) in model_nodes(&tree) {
                prop_assert!(unique.contains(&node));
            }
        }

        #[test]
        fn test_unread_render_includes_exactly_unread_nodes(tree in arb_tree()) {
            let rendered = render(&tree, true, &ActiveContext::Unread);
            let shown: HashSet<_> = rendered_ids(&rendered).into_iter().collect();
            for (node, unread) in model_nodes(&tree) {
                prop_assert_eq!(shown.contains(&node), unread > 0);
            }
        }

        #[test]
        fn test_categories_precede_subscriptions_in_any_tree(tree in arb_tree(), unread_only in any::<bool>()) {
            fn check(nodes: &[RenderedNode]) -> bool {
                let first_sub = nodes
                    .iter()
                    .position(|n| matches!(n, RenderedNode::Subscription(_)))
                    .unwrap_or(nodes.len());
                nodes[first_sub..]
                    .iter()
                    .all(|n| matches!(n, RenderedNode::Subscription(_)))
                    && nodes.iter().all(|n| match n {
                        RenderedNode::Category(c) => check(&c.children),
                        RenderedNode::Subscription(_) => true,
                    })
            }
            if let Rendered::Tree(nodes) = render(&tree, unread_only, &ActiveContext::Unread) {
                prop_assert!(check(&nodes));
            }
        }

        #[test]
        fn test_render_leaves_model_untouched(tree in arb_tree(), unread_only in any::<bool>()) {
            let before = tree.clone();
            let _ = render(&tree, unread_only, &ActiveContext::Unread);
            prop_assert_eq!(before, tree);
        }
    }
}
