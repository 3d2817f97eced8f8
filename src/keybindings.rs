//! Keybinding registry: maps keys to actions per context, with overrides
//! from config.toml.
use crossterm::event::{KeyCode, KeyModifiers};
use std::collections::HashMap;

// ============================================================================
// Action Enum
// ============================================================================

/// All user-facing actions that can be triggered by keybindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Quit,
    NavDown,
    NavUp,
    CycleFocus,
    Back,
    Select,
    Resync,
    ToggleUnreadOnly,
    GoHome,
    CycleTheme,
    ShowHelp,
    AddSubscription,
    // Tree
    ToggleFold,
    Collapse,
    Expand,
    ToggleCheck,
    Edit,
    Delete,
    Info,
    ChangeCategory,
    StartMove,
    NewCategory,
    MarkNodeRead,
    MarkCheckedRead,
    // Move mode
    DropBefore,
    DropInto,
    DropAtTop,
    // Articles
    ToggleRead,
    MarkArticlesRead,
    LoadMore,
}

impl Action {
    /// Human-readable description for the help screen.
    pub fn describe(self) -> &'static str {
        match self {
            Self::Quit => "Quit application",
            Self::NavDown => "Navigate down",
            Self::NavUp => "Navigate up",
            Self::CycleFocus => "Switch between tree and articles",
            Self::Back => "Go back / dismiss",
            Self::Select => "Open category or subscription",
            Self::Resync => "Reload the subscription tree",
            Self::ToggleUnreadOnly => "Toggle unread-only tree",
            Self::GoHome => "Show all unread articles",
            Self::CycleTheme => "Cycle theme",
            Self::ShowHelp => "Show help",
            Self::AddSubscription => "Subscribe to a feed",
            Self::ToggleFold => "Fold / unfold category",
            Self::Collapse => "Fold category",
            Self::Expand => "Unfold category",
            Self::ToggleCheck => "Check / uncheck",
            Self::Edit => "Rename",
            Self::Delete => "Delete",
            Self::Info => "Subscription info",
            Self::ChangeCategory => "Change category",
            Self::StartMove => "Move (drag) node",
            Self::NewCategory => "Create category",
            Self::MarkNodeRead => "Mark category or subscription read",
            Self::MarkCheckedRead => "Mark checked subscriptions read",
            Self::DropBefore => "Drop before the cursor row",
            Self::DropInto => "Drop into the cursor category",
            Self::DropAtTop => "Drop at top level",
            Self::ToggleRead => "Toggle article read",
            Self::MarkArticlesRead => "Mark loaded articles read",
            Self::LoadMore => "Load more articles",
        }
    }
}

// ============================================================================
// Context Enum
// ============================================================================

/// Dispatch context: determines which bindings are active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Context {
    Global,
    Tree,
    Moving,
    Articles,
}

impl Context {
    pub fn label(self) -> &'static str {
        match self {
            Context::Global => "Global",
            Context::Tree => "Subscription tree",
            Context::Moving => "Moving",
            Context::Articles => "Articles",
        }
    }
}

// ============================================================================
// Key Specification
// ============================================================================

/// A key event: code + modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeySpec {
    pub code: KeyCode,
    pub modifiers: KeyModifiers,
}

impl KeySpec {
    pub const fn new(code: KeyCode, modifiers: KeyModifiers) -> Self {
        Self { code, modifiers }
    }

    pub const fn plain(code: KeyCode) -> Self {
        Self::new(code, KeyModifiers::NONE)
    }

    pub const fn char(c: char) -> Self {
        Self::plain(KeyCode::Char(c))
    }

    pub const fn ctrl(c: char) -> Self {
        Self::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }
}

/// Parse a key string from config into a KeySpec.
///
/// Supported formats:
/// - Single char: "q", "j", "/"
/// - Named keys: "Enter", "Esc", "Tab", "Up", "Down", "Space"
/// - Modifier combos: "Ctrl+r"
/// - Function keys: "F1" through "F12"
fn parse_key_string(s: &str) -> Option<KeySpec> {
    let s = s.trim();

    if let Some(rest) = s.strip_prefix("Ctrl+") {
        let mut chars = rest.trim().chars();
        return match (chars.next(), chars.next()) {
            (Some(c), None) => Some(KeySpec::ctrl(c)),
            _ => None,
        };
    }

    let named = match s.to_lowercase().as_str() {
        "enter" | "return" => Some(KeyCode::Enter),
        "esc" | "escape" => Some(KeyCode::Esc),
        "tab" => Some(KeyCode::Tab),
        "up" => Some(KeyCode::Up),
        "down" => Some(KeyCode::Down),
        "left" => Some(KeyCode::Left),
        "right" => Some(KeyCode::Right),
        "backspace" => Some(KeyCode::Backspace),
        "space" => Some(KeyCode::Char(' ')),
        _ => None,
    };
    if let Some(code) = named {
        return Some(KeySpec::plain(code));
    }

    if let Some(n) = s.strip_prefix(['F', 'f']).and_then(|n| n.parse::<u8>().ok()) {
        return (1..=12).contains(&n).then(|| KeySpec::plain(KeyCode::F(n)));
    }

    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(KeySpec::char(c)),
        _ => None,
    }
}

/// Format a KeySpec for the help screen.
fn format_key(key: &KeySpec) -> String {
    let modifier = if key.modifiers.contains(KeyModifiers::CONTROL) {
        "Ctrl+"
    } else {
        ""
    };

    let key_name = match key.code {
        KeyCode::Char(' ') => "Space".to_string(),
        KeyCode::Char(c) => c.to_string(),
        KeyCode::Enter => "Enter".to_string(),
        KeyCode::Esc => "Esc".to_string(),
        KeyCode::Tab => "Tab".to_string(),
        KeyCode::Up => "Up".to_string(),
        KeyCode::Down => "Down".to_string(),
        KeyCode::Left => "Left".to_string(),
        KeyCode::Right => "Right".to_string(),
        KeyCode::Backspace => "Backspace".to_string(),
        KeyCode::F(n) => format!("F{}", n),
        _ => "?".to_string(),
    };

    format!("{}{}", modifier, key_name)
}

// ============================================================================
// Keybinding Registry
// ============================================================================

const DEFAULT_BINDINGS: &[(Context, KeySpec, Action)] = &[
    (Context::Global, KeySpec::char('q'), Action::Quit),
    (Context::Global, KeySpec::char('j'), Action::NavDown),
    (Context::Global, KeySpec::plain(KeyCode::Down), Action::NavDown),
    (Context::Global, KeySpec::char('k'), Action::NavUp),
    (Context::Global, KeySpec::plain(KeyCode::Up), Action::NavUp),
    (Context::Global, KeySpec::plain(KeyCode::Tab), Action::CycleFocus),
    (Context::Global, KeySpec::plain(KeyCode::Esc), Action::Back),
    (Context::Global, KeySpec::plain(KeyCode::Enter), Action::Select),
    (Context::Global, KeySpec::char('r'), Action::Resync),
    (Context::Global, KeySpec::ctrl('r'), Action::Resync),
    (Context::Global, KeySpec::char('u'), Action::ToggleUnreadOnly),
    (Context::Global, KeySpec::char('g'), Action::GoHome),
    (Context::Global, KeySpec::char('T'), Action::CycleTheme),
    (Context::Global, KeySpec::char('?'), Action::ShowHelp),
    (Context::Global, KeySpec::char('a'), Action::AddSubscription),
    // Tree
    (Context::Tree, KeySpec::char(' '), Action::ToggleFold),
    (Context::Tree, KeySpec::char('h'), Action::Collapse),
    (Context::Tree, KeySpec::plain(KeyCode::Left), Action::Collapse),
    (Context::Tree, KeySpec::char('l'), Action::Expand),
    (Context::Tree, KeySpec::plain(KeyCode::Right), Action::Expand),
    (Context::Tree, KeySpec::char('x'), Action::ToggleCheck),
    (Context::Tree, KeySpec::char('e'), Action::Edit),
    (Context::Tree, KeySpec::char('d'), Action::Delete),
    (Context::Tree, KeySpec::char('i'), Action::Info),
    (Context::Tree, KeySpec::char('c'), Action::ChangeCategory),
    (Context::Tree, KeySpec::char('m'), Action::StartMove),
    (Context::Tree, KeySpec::char('n'), Action::NewCategory),
    (Context::Tree, KeySpec::char('A'), Action::MarkNodeRead),
    (Context::Tree, KeySpec::char('M'), Action::MarkCheckedRead),
    // Move mode
    (Context::Moving, KeySpec::plain(KeyCode::Enter), Action::DropBefore),
    (Context::Moving, KeySpec::char('>'), Action::DropInto),
    (Context::Moving, KeySpec::char('<'), Action::DropAtTop),
    (Context::Moving, KeySpec::plain(KeyCode::Esc), Action::Back),
    // Articles
    (Context::Articles, KeySpec::char(' '), Action::ToggleRead),
    (Context::Articles, KeySpec::char('A'), Action::MarkArticlesRead),
    (Context::Articles, KeySpec::char('L'), Action::LoadMore),
];

/// Registry of keybindings, supporting default bindings and config overrides.
///
/// The same key can map to different actions in different contexts; lookup
/// falls back to `Global`.
pub struct KeybindingRegistry {
    lookup: HashMap<(Context, KeySpec), Action>,
    /// All bindings in registration order, for the help screen.
    bindings: Vec<(Context, KeySpec, Action)>,
}

impl KeybindingRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            lookup: HashMap::new(),
            bindings: Vec::new(),
        };
        for &(context, key, action) in DEFAULT_BINDINGS {
            registry.bind(context, key, action);
        }
        registry
    }

    fn bind(&mut self, context: Context, key: KeySpec, action: Action) {
        self.lookup.insert((context, key), action);
        self.bindings.push((context, key, action));
    }

    /// Apply user overrides from the config keybindings map.
    ///
    /// Keys in the map are action names (e.g., "quit", "toggle_fold").
    /// Values are key strings (e.g., "q", "Ctrl+r", "F5"). The new key
    /// replaces every existing binding of the action, in the same contexts.
    ///
    /// Returns a warning for each unknown action name or unparseable key.
    pub fn apply_overrides(&mut self, overrides: &HashMap<String, String>) -> Vec<String> {
        let mut warnings = Vec::new();

        for (action_name, key_str) in overrides {
            let Some(action) = parse_action_name(action_name) else {
                warnings.push(format!("Unknown action '{}', ignoring", action_name));
                continue;
            };
            let Some(key) = parse_key_string(key_str) else {
                warnings.push(format!(
                    "Cannot parse key '{}' for action '{}', ignoring",
                    key_str, action_name
                ));
                continue;
            };

            let mut contexts: Vec<Context> = self
                .bindings
                .iter()
                .filter(|(_, _, a)| *a == action)
                .map(|(c, _, _)| *c)
                .collect();
            contexts.dedup();

            self.lookup.retain(|_, a| *a != action);
            self.bindings.retain(|(_, _, a)| *a != action);
            for ctx in contexts {
                self.bind(ctx, key, action);
            }

            tracing::info!(action = %action_name, key = %key_str, "Applied keybinding override");
        }

        warnings
    }

    /// Look up the action for a key, trying `context` before `Global`.
    pub fn action_for_key(
        &self,
        code: KeyCode,
        modifiers: KeyModifiers,
        context: Context,
    ) -> Option<Action> {
        // Shift is already folded into the character
        let modifiers = match code {
            KeyCode::Char(_) => modifiers.difference(KeyModifiers::SHIFT),
            _ => modifiers,
        };
        let key = KeySpec::new(code, modifiers);
        self.lookup
            .get(&(context, key))
            .or_else(|| self.lookup.get(&(Context::Global, key)))
            .copied()
    }

    /// (context, key display string, action, description) for the help screen.
    pub fn all_bindings(&self) -> Vec<(Context, String, Action, &'static str)> {
        self.bindings
            .iter()
            .map(|(ctx, key, action)| (*ctx, format_key(key), *action, action.describe()))
            .collect()
    }
}

impl Default for KeybindingRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse an action name from config. Accepts snake_case names.
fn parse_action_name(name: &str) -> Option<Action> {
    let action = match name.to_lowercase().as_str() {
        "quit" => Action::Quit,
        "nav_down" | "down" => Action::NavDown,
        "nav_up" | "up" => Action::NavUp,
        "cycle_focus" | "focus" => Action::CycleFocus,
        "back" => Action::Back,
        "select" | "open" => Action::Select,
        "resync" | "refresh" => Action::Resync,
        "toggle_unread_only" | "unread" => Action::ToggleUnreadOnly,
        "go_home" | "home" => Action::GoHome,
        "cycle_theme" | "theme" => Action::CycleTheme,
        "show_help" | "help" => Action::ShowHelp,
        "add_subscription" | "subscribe" => Action::AddSubscription,
        "toggle_fold" | "fold" => Action::ToggleFold,
        "collapse" => Action::Collapse,
        "expand" => Action::Expand,
        "toggle_check" | "check" => Action::ToggleCheck,
        "edit" | "rename" => Action::Edit,
        "delete" => Action::Delete,
        "info" => Action::Info,
        "change_category" => Action::ChangeCategory,
        "start_move" | "move" => Action::StartMove,
        "new_category" => Action::NewCategory,
        "mark_node_read" | "mark_read" => Action::MarkNodeRead,
        "mark_checked_read" => Action::MarkCheckedRead,
        "drop_before" => Action::DropBefore,
        "drop_into" => Action::DropInto,
        "drop_at_top" => Action::DropAtTop,
        "toggle_read" => Action::ToggleRead,
        "mark_articles_read" | "mark_all_read" => Action::MarkArticlesRead,
        "load_more" => Action::LoadMore,
        _ => return None,
    };
    Some(action)
}

// ============================================================================
// Tests
// ============================================================================
