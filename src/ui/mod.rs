//! Terminal User Interface module.
//!
//! This module provides the TUI for the reader, including:
//! - Main event loop (`run`)
//! - Input handling for the tree, move mode, articles and popups
//! - Rendering for the tree and article panels and overlays
//! - Background task event processing
//!
//! # Module Structure
//!
//! - `loop_runner` - Main event loop and terminal management
//! - `input` - Keyboard input handling
//! - `events` - Background task event processing
//! - `render` - Layout and overlay rendering
//! - `helpers` - Background task spawning
//! - `tree` - Subscription tree widget
//! - `articles` - Article list widget
//! - `status` - Status bar widget
//! - `help` - Keybinding help overlay

mod articles;
mod events;
mod help;
mod helpers;
mod input;
mod loop_runner;
mod render;
mod status;
mod tree;

pub use loop_runner::{run, Action};
