//! Reader backend REST API.
//!
//! [`ReaderClient`] wraps `reqwest` with the server's conventions: form
//! bodies for writes, the auth token as a cookie, JSON responses, and
//! `{type, message}` error bodies surfaced through [`ApiError`].

mod client;
mod types;

pub use client::{ApiError, ReaderClient};
pub use types::{
    Article, ArticlePage, ArticleSubscription, CategoryChoice, CategoryList, CategoryListRoot,
    CategoryPayload, CategoryUpdate, SubscriptionDetail, SubscriptionPayload,
    SubscriptionResponse, SubscriptionUpdate, Synchronization, TreePayload,
};
