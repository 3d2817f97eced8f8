//! Terminal client for a self-hosted RSS reader.
//!
//! The interesting parts live outside the UI: [`tree`] renders the
//! subscription tree, [`mutation`] validates and sends edits, and [`sync`]
//! keeps the tree and its unread counters consistent with the server.

pub mod api;
pub mod app;
pub mod config;
pub mod keybindings;
pub mod mutation;
pub mod sync;
pub mod theme;
pub mod tree;
pub mod ui;
pub mod util;
