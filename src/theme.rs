//! Theme system for the TUI.
//!
//! Provides semantic color roles that map to ratatui `Style` values.
//! The `ThemeVariant` enum selects between Dark and Light palettes,
//! and `StyleMap` resolves role names to concrete styles.

use ratatui::style::{Color, Modifier, Style};
use std::collections::HashMap;

// ============================================================================
// Theme Variant
// ============================================================================

/// Available theme variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeVariant {
    Dark,
    Light,
}

impl ThemeVariant {
    /// Parse a variant name from a string (case-insensitive).
    pub fn from_str_name(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "dark" => Some(Self::Dark),
            "light" => Some(Self::Light),
            _ => None,
        }
    }

    /// Build the `ColorPalette` for this variant.
    pub fn palette(self) -> ColorPalette {
        match self {
            Self::Dark => ColorPalette::dark(),
            Self::Light => ColorPalette::light(),
        }
    }

    /// Cycle to the next variant: Dark → Light → Dark.
    pub fn next(self) -> Self {
        match self {
            Self::Dark => Self::Light,
            Self::Light => Self::Dark,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Dark => "Dark",
            Self::Light => "Light",
        }
    }
}

// ============================================================================
// Color Palette
// ============================================================================

/// A complete color palette mapping every semantic UI role to a `Style`.
#[derive(Debug, Clone)]
pub struct ColorPalette {
    // -- Subscription tree --
    pub tree_normal: Style,
    pub tree_selected: Style,
    pub tree_unread: Style,
    pub tree_failing: Style,
    pub tree_active: Style,
    pub tree_category: Style,
    pub tree_counts: Style,
    pub tree_checked: Style,
    pub tree_moving: Style,

    // -- Article list --
    pub article_title: Style,
    pub article_read: Style,
    pub article_selected: Style,
    pub article_date: Style,
    pub article_source: Style,

    // -- Chrome --
    pub status_bar: Style,
    pub status_error: Style,
    pub panel_border: Style,
    pub panel_border_focused: Style,
    pub placeholder: Style,
}

impl ColorPalette {
    fn dark() -> Self {
        Self {
            tree_normal: Style::default(),
            tree_selected: Style::default().bg(Color::DarkGray).fg(Color::White),
            tree_unread: Style::default().add_modifier(Modifier::BOLD),
            tree_failing: Style::default().fg(Color::Red),
            tree_active: Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
            tree_category: Style::default().fg(Color::Blue),
            tree_counts: Style::default().fg(Color::DarkGray),
            tree_checked: Style::default().fg(Color::Green),
            tree_moving: Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::REVERSED),

            article_title: Style::default().add_modifier(Modifier::BOLD),
            article_read: Style::default().fg(Color::Gray),
            article_selected: Style::default().bg(Color::DarkGray).fg(Color::White),
            article_date: Style::default().fg(Color::DarkGray),
            article_source: Style::default().fg(Color::Cyan),

            status_bar: Style::default().bg(Color::DarkGray).fg(Color::White),
            status_error: Style::default().bg(Color::DarkGray).fg(Color::LightRed),
            panel_border: Style::default(),
            panel_border_focused: Style::default().fg(Color::Cyan),
            placeholder: Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
        }
    }

    /// Light palette, adapted for light terminal backgrounds.
    fn light() -> Self {
        Self {
            tree_normal: Style::default().fg(Color::Black),
            tree_selected: Style::default().bg(Color::Blue).fg(Color::White),
            tree_unread: Style::default()
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
            tree_failing: Style::default().fg(Color::Red),
            tree_active: Style::default()
                .fg(Color::Blue)
                .add_modifier(Modifier::BOLD),
            tree_category: Style::default().fg(Color::Magenta),
            tree_counts: Style::default().fg(Color::DarkGray),
            tree_checked: Style::default().fg(Color::Green),
            tree_moving: Style::default()
                .fg(Color::Magenta)
                .add_modifier(Modifier::REVERSED),

            article_title: Style::default()
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
            article_read: Style::default().fg(Color::DarkGray),
            article_selected: Style::default().bg(Color::Blue).fg(Color::White),
            article_date: Style::default().fg(Color::DarkGray),
            article_source: Style::default().fg(Color::Blue),

            status_bar: Style::default().bg(Color::White).fg(Color::Black),
            status_error: Style::default().bg(Color::White).fg(Color::Red),
            panel_border: Style::default().fg(Color::DarkGray),
            panel_border_focused: Style::default().fg(Color::Blue),
            placeholder: Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
        }
    }
}

// ============================================================================
// Style Map — string-keyed lookup
// ============================================================================

/// String-keyed style lookup, built from a `ColorPalette`.
#[derive(Debug, Clone)]
pub struct StyleMap {
    map: HashMap<&'static str, Style>,
}

/// All semantic role names, in declaration order.
const ROLE_NAMES: [&str; 19] = [
    "tree_normal",
    "tree_selected",
    "tree_unread",
    "tree_failing",
    "tree_active",
    "tree_category",
    "tree_counts",
    "tree_checked",
    "tree_moving",
    "article_title",
    "article_read",
    "article_selected",
    "article_date",
    "article_source",
    "status_bar",
    "status_error",
    "panel_border",
    "panel_border_focused",
    "placeholder",
];

impl StyleMap {
    pub fn from_palette(p: &ColorPalette) -> Self {
        let styles: [Style; 19] = [
            p.tree_normal,
            p.tree_selected,
            p.tree_unread,
            p.tree_failing,
            p.tree_active,
            p.tree_category,
            p.tree_counts,
            p.tree_checked,
            p.tree_moving,
            p.article_title,
            p.article_read,
            p.article_selected,
            p.article_date,
            p.article_source,
            p.status_bar,
            p.status_error,
            p.panel_border,
            p.panel_border_focused,
            p.placeholder,
        ];

        let map = ROLE_NAMES.iter().copied().zip(styles).collect();
        Self { map }
    }

    /// Resolve a role name to its `Style`. Returns `Style::default()` for unknown roles.
    pub fn resolve(&self, role: &str) -> Style {
        self.map.get(role).copied().unwrap_or_default()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dark_palette_focus_border_is_cyan() {
        let palette = ThemeVariant::Dark.palette();
        assert_eq!(
            palette.panel_border_focused,
            Style::default().fg(Color::Cyan)
        );
    }

    #[test]
    fn failing_subscriptions_are_red_in_both_variants() {
        for variant in [ThemeVariant::Dark, ThemeVariant::Light] {
            assert_eq!(variant.palette().tree_failing.fg, Some(Color::Red));
        }
    }

    #[test]
    fn light_palette_differs_from_dark() {
        let dark = ThemeVariant::Dark.palette();
        let light = ThemeVariant::Light.palette();
        assert_ne!(dark.tree_selected, light.tree_selected);
        assert_ne!(dark.article_selected, light.article_selected);
    }

    #[test]
    fn variant_from_str_name() {
        assert_eq!(
            ThemeVariant::from_str_name("dark"),
            Some(ThemeVariant::Dark)
        );
        assert_eq!(
            ThemeVariant::from_str_name("Light"),
            Some(ThemeVariant::Light)
        );
        assert_eq!(ThemeVariant::from_str_name("neon"), None);
    }

    #[test]
    fn variant_cycles() {
        assert_eq!(ThemeVariant::Dark.next(), ThemeVariant::Light);
        assert_eq!(ThemeVariant::Light.next().next(), ThemeVariant::Light);
    }

    #[test]
    fn style_map_resolves_known_roles() {
        let palette = ThemeVariant::Dark.palette();
        let sm = StyleMap::from_palette(&palette);

        assert_eq!(sm.resolve("tree_unread"), palette.tree_unread);
        assert_eq!(sm.resolve("placeholder"), palette.placeholder);
        assert_eq!(sm.resolve("status_bar"), palette.status_bar);
    }

    #[test]
    fn style_map_returns_default_for_unknown() {
        let sm = StyleMap::from_palette(&ThemeVariant::Dark.palette());
        assert_eq!(sm.resolve("nonexistent_role"), Style::default());
    }

    #[test]
    fn role_names_count_matches_palette_fields() {
        let sm = StyleMap::from_palette(&ThemeVariant::Light.palette());
        assert_eq!(sm.map.len(), ROLE_NAMES.len());
    }
}
