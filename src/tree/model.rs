use std::collections::HashMap;

use thiserror::Error;

use super::{CategoryId, SubscriptionId, FAILING_SYNC_THRESHOLD};
use crate::api::{CategoryPayload, SubscriptionPayload};

#[derive(Debug, Clone, PartialEq)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    /// `None` only for the root.
    pub parent_id: Option<CategoryId>,
    pub order: usize,
    pub nesting_level: u32,
    /// Levels in the subtree rooted here, counting this category (a leaf
    /// category has 1).
    pub max_subcategory_depth: u32,
    pub folded: bool,
    pub unread_count: u32,
    pub total_count: u32,
    pub categories: Vec<Category>,
    pub subscriptions: Vec<Subscription>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub title: String,
    pub url: String,
    pub favicon_url: String,
    pub category_id: CategoryId,
    pub order: usize,
    pub unread_count: u32,
    pub total_count: u32,
    pub sync_fail_count: u32,
}

impl Subscription {
    pub fn is_failing(&self) -> bool {
        self.sync_fail_count >= FAILING_SYNC_THRESHOLD
    }

    fn from_payload(p: SubscriptionPayload, category_id: &CategoryId, order: usize) -> Self {
        let favicon_url = p
            .favicon_url
            .unwrap_or_else(|| format!("subscription/{}/favicon", p.id));
        Self {
            id: SubscriptionId(p.id),
            title: p.title,
            url: p.url,
            favicon_url,
            category_id: category_id.clone(),
            order,
            unread_count: p.unread_count,
            total_count: p.total_count,
            sync_fail_count: p.sync_fail_count,
        }
    }
}

impl Category {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn has_children(&self) -> bool {
        !self.categories.is_empty() || !self.subscriptions.is_empty()
    }

    fn from_payload(p: CategoryPayload, parent: Option<&CategoryId>, order: usize, level: u32) -> Self {
        let id = CategoryId(p.id);
        let subscriptions = p
            .subscriptions
            .into_iter()
            .enumerate()
            .map(|(i, s)| Subscription::from_payload(s, &id, i))
            .collect();
        let categories: Vec<Category> = p
            .categories
            .into_iter()
            .enumerate()
            .map(|(i, c)| Category::from_payload(c, Some(&id), i, level + 1))
            .collect();
        let computed_depth = 1 + categories
            .iter()
            .map(|c| c.max_subcategory_depth)
            .max()
            .unwrap_or(0);

        Self {
            name: p.name.unwrap_or_default(),
            parent_id: parent.cloned(),
            order,
            nesting_level: p.nesting_level.unwrap_or(level),
            max_subcategory_depth: p.max_subcategory_depth.unwrap_or(computed_depth),
            folded: p.folded,
            unread_count: p.unread_count,
            total_count: p.total_count,
            categories,
            subscriptions,
            id,
        }
    }
}

/// A category whose unread count disagrees with its descendants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("category {category} reports {reported} unread but its descendants sum to {computed}")]
pub struct InvariantViolation {
    pub category: CategoryId,
    pub reported: u32,
    pub computed: u32,
}

// ============================================================================
// Tree
// ============================================================================

/// The subscription tree plus an index from node id to its position.
///
/// Positions are paths of child indices from the root. The shape never
/// changes after construction (moves go through the server and a resync),
/// so the index stays valid for the tree's lifetime.
#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    root: Category,
    category_paths: HashMap<CategoryId, Vec<usize>>,
    subscription_paths: HashMap<SubscriptionId, (Vec<usize>, usize)>,
}

impl Tree {
    pub fn from_payload(payload: CategoryPayload) -> Self {
        let root = Category::from_payload(payload, None, 0, 0);
        let mut tree = Self {
            root,
            category_paths: HashMap::new(),
            subscription_paths: HashMap::new(),
        };
        let mut path = Vec::new();
        index_category(
            &tree.root,
            &mut path,
            &mut tree.category_paths,
            &mut tree.subscription_paths,
        );
        tree
    }

    pub fn root(&self) -> &Category {
        &self.root
    }

    pub fn root_id(&self) -> &CategoryId {
        &self.root.id
    }

    /// Global unread counter: the root's unread count.
    pub fn global_unread(&self) -> u32 {
        self.root.unread_count
    }

    pub fn category(&self, id: &CategoryId) -> Option<&Category> {
        let path = self.category_paths.get(id)?;
        walk(&self.root, path)
    }

    pub(crate) fn category_mut(&mut self, id: &CategoryId) -> Option<&mut Category> {
        let path = self.category_paths.get(id)?;
        walk_mut(&mut self.root, path)
    }

    pub fn subscription(&self, id: &SubscriptionId) -> Option<&Subscription> {
        let (path, index) = self.subscription_paths.get(id)?;
        walk(&self.root, path)?.subscriptions.get(*index)
    }

    pub(crate) fn subscription_mut(&mut self, id: &SubscriptionId) -> Option<&mut Subscription> {
        let (path, index) = self.subscription_paths.get(id)?;
        walk_mut(&mut self.root, path)?.subscriptions.get_mut(*index)
    }

    /// Categories containing the subscription, nearest first, root last.
    pub fn ancestors_of_subscription(&self, id: &SubscriptionId) -> Vec<CategoryId> {
        match self.subscription(id) {
            Some(sub) => {
                let mut chain = vec![sub.category_id.clone()];
                chain.extend(self.ancestors_of_category(&sub.category_id));
                chain
            }
            None => Vec::new(),
        }
    }

    /// Strict ancestors of a category, nearest first, root last.
    pub fn ancestors_of_category(&self, id: &CategoryId) -> Vec<CategoryId> {
        let mut chain = Vec::new();
        let mut current = self.category(id).and_then(|c| c.parent_id.clone());
        while let Some(parent) = current {
            current = self.category(&parent).and_then(|c| c.parent_id.clone());
            chain.push(parent);
        }
        chain
    }

    /// True when `id` is `ancestor` itself or lies inside its subtree.
    pub fn is_within(&self, ancestor: &CategoryId, id: &CategoryId) -> bool {
        id == ancestor || self.ancestors_of_category(id).contains(ancestor)
    }

    pub fn all_category_ids(&self) -> Vec<&CategoryId> {
        let mut ids = Vec::with_capacity(self.category_paths.len());
        collect_category_ids(&self.root, &mut ids);
        ids
    }

    /// Every subscription in the category's subtree, in render order.
    pub fn descendant_subscriptions(&self, id: &CategoryId) -> Vec<&Subscription> {
        let mut out = Vec::new();
        if let Some(category) = self.category(id) {
            collect_subscriptions(category, &mut out);
        }
        out
    }

    /// Categories and subscriptions below the root.
    pub fn node_count(&self) -> usize {
        self.category_paths.len() - 1 + self.subscription_paths.len()
    }

    pub fn subscription_count(&self) -> usize {
        self.subscription_paths.len()
    }

    /// First category (depth-first) whose unread count is not the sum
    /// over its direct subscriptions and subcategories.
    pub fn check_unread_invariant(&self) -> Result<(), InvariantViolation> {
        check_category(&self.root).map(|_| ())
    }
}

fn index_category(
    category: &Category,
    path: &mut Vec<usize>,
    categories: &mut HashMap<CategoryId, Vec<usize>>,
    subscriptions: &mut HashMap<SubscriptionId, (Vec<usize>, usize)>,
) {
    categories.insert(category.id.clone(), path.clone());
    for (i, sub) in category.subscriptions.iter().enumerate() {
        subscriptions.insert(sub.id.clone(), (path.clone(), i));
    }
    for (i, child) in category.categories.iter().enumerate() {
        path.push(i);
        index_category(child, path, categories, subscriptions);
        path.pop();
    }
}

fn walk<'a>(root: &'a Category, path: &[usize]) -> Option<&'a Category> {
    path.iter()
        .try_fold(root, |node, &i| node.categories.get(i))
}

fn walk_mut<'a>(root: &'a mut Category, path: &[usize]) -> Option<&'a mut Category> {
    let mut node = root;
    for &i in path {
        node = node.categories.get_mut(i)?;
    }
    Some(node)
}

fn collect_category_ids<'a>(category: &'a Category, out: &mut Vec<&'a CategoryId>) {
    out.push(&category.id);
    for child in &category.categories {
        collect_category_ids(child, out);
    }
}

fn collect_subscriptions<'a>(category: &'a Category, out: &mut Vec<&'a Subscription>) {
    for child in &category.categories {
        collect_subscriptions(child, out);
    }
    out.extend(category.subscriptions.iter());
}

fn check_category(category: &Category) -> Result<u32, InvariantViolation> {
    let mut computed: u32 = category.subscriptions.iter().map(|s| s.unread_count).sum();
    for child in &category.categories {
        computed += check_category(child)?;
    }
    if computed != category.unread_count {
        return Err(InvariantViolation {
            category: category.id.clone(),
            reported: category.unread_count,
            computed,
        });
    }
    Ok(category.unread_count)
}


#[cfg(test)]
mod tests {
    use super::fixtures::{cat, chain, root, sub};
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> Tree {
        Tree::from_payload(root(
            vec![
                cat(
                    "tech",
                    "Tech",
                    vec![cat("rust", "Rust", vec![], vec![sub("s2", "This Week in Rust", 4)])],
                    vec![sub("s1", "Lobsters", 3)],
                ),
                cat("news", "News", vec![], vec![]),
            ],
            vec![sub("s3", "Hacker News", 1)],
        ))
    }

    #[test]
    fn test_from_payload_computes_levels_and_depths() {
        let tree = sample();
        let root = tree.root();
        assert_eq!(root.nesting_level, 0);
        assert_eq!(root.max_subcategory_depth, 3);

        let tech = tree.category(&"tech".into()).unwrap();
        assert_eq!(tech.nesting_level, 1);
        assert_eq!(tech.max_subcategory_depth, 2);
        assert_eq!(tech.parent_id, Some(CategoryId::from("root")));

        let rust = tree.category(&"rust".into()).unwrap();
        assert_eq!(rust.nesting_level, 2);
        assert_eq!(rust.max_subcategory_depth, 1);

        let news = tree.category(&"news".into()).unwrap();
        assert_eq!(news.order, 1);
    }

    #[test]
    fn test_server_levels_take_precedence() {
        let mut payload = root(vec![cat("a", "A", vec![], vec![])], vec![]);
        payload.categories[0].nesting_level = Some(3);
        payload.categories[0].max_subcategory_depth = Some(2);
        let tree = Tree::from_payload(payload);
        let a = tree.category(&"a".into()).unwrap();
        assert_eq!(a.nesting_level, 3);
        assert_eq!(a.max_subcategory_depth, 2);
    }

    #[test]
    fn test_subscription_lookup_and_parent() {
        let tree = sample();
        let s2 = tree.subscription(&"s2".into()).unwrap();
        assert_eq!(s2.title, "This Week in Rust");
        assert_eq!(s2.category_id, CategoryId::from("rust"));
        assert_eq!(s2.favicon_url, "subscription/s2/favicon");

        let s3 = tree.subscription(&"s3".into()).unwrap();
        assert_eq!(s3.category_id, CategoryId::from("root"));
        assert!(tree.subscription(&"missing".into()).is_none());
    }

    #[test]
    fn test_ancestors_nearest_first() {
        let tree = sample();
        assert_eq!(
            tree.ancestors_of_subscription(&"s2".into()),
            vec![
                CategoryId::from("rust"),
                CategoryId::from("tech"),
                CategoryId::from("root")
            ]
        );
        assert_eq!(
            tree.ancestors_of_subscription(&"s3".into()),
            vec![CategoryId::from("root")]
        );
        assert!(tree.ancestors_of_subscription(&"nope".into()).is_empty());
    }

    #[test]
    fn test_is_within() {
        let tree = sample();
        let tech = CategoryId::from("tech");
        assert!(tree.is_within(&tech, &tech));
        assert!(tree.is_within(&tech, &"rust".into()));
        assert!(!tree.is_within(&tech, &"news".into()));
        assert!(!tree.is_within(&"rust".into(), &tech));
    }

    #[test]
    fn test_descendant_subscriptions() {
        let tree = sample();
        let titles: Vec<&str> = tree
            .descendant_subscriptions(&"tech".into())
            .iter()
            .map(|s| s.title.as_str())
            .collect();
        assert_eq!(titles, vec!["This Week in Rust", "Lobsters"]);
    }

    #[test]
    fn test_counts() {
        let tree = sample();
        assert_eq!(tree.node_count(), 6);
        assert_eq!(tree.subscription_count(), 3);
        assert_eq!(tree.global_unread(), 8);
        assert_eq!(tree.all_category_ids().len(), 4);
    }

    #[test]
    fn test_unread_invariant_holds_for_consistent_payload() {
        assert_eq!(sample().check_unread_invariant(), Ok(()));
    }

    #[test]
    fn test_unread_invariant_reports_first_bad_category() {
        let mut payload = root(
            vec![cat("a", "A", vec![], vec![sub("s1", "One", 2)])],
            vec![],
        );
        payload.categories[0].unread_count = 5;
        let tree = Tree::from_payload(payload);
        let err = tree.check_unread_invariant().unwrap_err();
        assert_eq!(err.category, CategoryId::from("a"));
        assert_eq!(err.reported, 5);
        assert_eq!(err.computed, 2);
    }

    #[test]
    fn test_chain_fixture_depths() {
        let tree = Tree::from_payload(chain(4));
        let c1 = tree.category(&"c1".into()).unwrap();
        assert_eq!(c1.max_subcategory_depth, 4);
        let c4 = tree.category(&"c4".into()).unwrap();
        assert_eq!(c4.nesting_level, 4);
        assert_eq!(tree.ancestors_of_category(&"c4".into()).len(), 4);
    }

    #[test]
    fn test_category_mut_through_index() {
        let mut tree = sample();
        tree.category_mut(&"rust".into()).unwrap().folded = true;
        assert!(tree.category(&"rust".into()).unwrap().folded);
    }
}
