//! Wire types for the reader REST API.
//!
//! Every response struct tolerates missing optional fields with
//! `#[serde(default)]`: the server omits keys rather than sending `null`
//! for several of them, and older servers do not send counts at all.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Subscription tree
// ============================================================================

/// A category node of the `subscription/list` payload.
///
/// The root of the payload has the same shape: it is the user's root
/// category with nesting level 0.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CategoryPayload {
    pub id: String,
    pub name: Option<String>,
    /// Server-reported depth (root = 0). Recomputed locally when absent.
    pub nesting_level: Option<u32>,
    /// Depth of the deepest subtree including this category. Recomputed
    /// locally when absent.
    pub max_subcategory_depth: Option<u32>,
    pub folded: bool,
    pub unread_count: u32,
    pub total_count: u32,
    pub categories: Vec<CategoryPayload>,
    pub subscriptions: Vec<SubscriptionPayload>,
}

/// The full tree payload, rooted at the user's root category.
pub type TreePayload = CategoryPayload;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SubscriptionPayload {
    pub id: String,
    pub title: String,
    pub url: String,
    pub favicon_url: Option<String>,
    pub unread_count: u32,
    pub total_count: u32,
    pub sync_fail_count: u32,
}

// ============================================================================
// Subscription detail and history
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SubscriptionDetail {
    pub title: String,
    pub feed_title: Option<String>,
    pub url: Option<String>,
    pub rss_url: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<String>,
    pub category_name: Option<String>,
    /// Milliseconds since the epoch.
    pub create_date: Option<i64>,
}

impl SubscriptionDetail {
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.create_date.and_then(DateTime::from_timestamp_millis)
    }
}

/// Response of `GET subscription/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SubscriptionResponse {
    pub subscription: SubscriptionDetail,
    pub articles: Vec<Article>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Synchronization {
    pub success: bool,
    pub message: Option<String>,
    /// Duration of the fetch in milliseconds.
    pub duration: u64,
    pub create_date: Option<i64>,
}

impl Synchronization {
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.create_date.and_then(DateTime::from_timestamp_millis)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct SynchronizationList {
    pub synchronizations: Vec<Synchronization>,
}

// ============================================================================
// Category picker
// ============================================================================

/// Response of `GET category/list`: a single root whose children are
/// the top-level categories.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CategoryList {
    pub categories: Vec<CategoryListRoot>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CategoryListRoot {
    pub id: String,
    pub categories: Vec<CategoryChoice>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CategoryChoice {
    pub id: String,
    pub name: String,
}

impl CategoryList {
    /// The root id and its direct children, or `None` for an empty list.
    pub fn root(&self) -> Option<&CategoryListRoot> {
        self.categories.first()
    }
}

// ============================================================================
// Articles
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Article {
    pub id: String,
    pub title: String,
    pub url: Option<String>,
    pub creator: Option<String>,
    pub description: Option<String>,
    pub subscription: ArticleSubscription,
    /// Publication date, milliseconds since the epoch.
    pub date: Option<i64>,
    pub is_read: bool,
    pub is_starred: bool,
}

impl Article {
    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        self.date.and_then(DateTime::from_timestamp_millis)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ArticleSubscription {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ArticleList {
    pub articles: Vec<Article>,
}

/// Query parameters for article listings.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ArticlePage {
    pub unread: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after_article: Option<String>,
}

// ============================================================================
// Mutation bodies
// ============================================================================

/// Form body for `POST subscription/{id}`. Absent fields are left
/// untouched by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SubscriptionUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<usize>,
}

/// Form body for `POST category/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CategoryUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folded: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CreatedId {
    pub id: String,
}

/// Error body returned by the server on 4xx/5xx.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ErrorBody {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub message: Option<String>,
}
