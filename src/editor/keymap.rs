// Keymap - Keyboard shortcuts to editor actions
//
// `command` covers Ctrl on Linux/Windows and Cmd on macOS. Nothing maps
// while a text field has focus so typing into names never edits the project.

/// A key without modifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Space,
    Delete,
    Backspace,
    Escape,
    /// Printable key; letters match case-insensitively
    Char(char),
}

/// A key press with its modifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPress {
    pub key: Key,
    pub command: bool,
    pub shift: bool,
}

impl KeyPress {
    pub fn plain(key: Key) -> Self {
        Self {
            key,
            command: false,
            shift: false,
        }
    }

    pub fn command(key: Key) -> Self {
        Self {
            key,
            command: true,
            shift: false,
        }
    }

    pub fn command_shift(key: Key) -> Self {
        Self {
            key,
            command: true,
            shift: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorAction {
    TogglePlay,
    Undo,
    Redo,
    Copy,
    Paste,
    Duplicate,
    Delete,
    ZoomIn,
    ZoomOut,
    ZoomReset,
    ToggleSnap,
    ToggleHistoryPanel,
    /// Close the open editor or dialog
    Dismiss,
}

/// Map a key press to an editor action
///
/// # Arguments
/// * `press` - The key and modifiers
/// * `text_input_focused` - True while a text field owns the keyboard
pub fn action_for(press: KeyPress, text_input_focused: bool) -> Option<EditorAction> {
    if text_input_focused {
        return None;
    }

    if !press.command {
        return match press.key {
            Key::Space => Some(EditorAction::TogglePlay),
            Key::Delete | Key::Backspace => Some(EditorAction::Delete),
            Key::Escape => Some(EditorAction::Dismiss),
            Key::Char(_) => None,
        };
    }

    let Key::Char(c) = press.key else {
        return None;
    };
    match (c.to_ascii_lowercase(), press.shift) {
        ('z', false) => Some(EditorAction::Undo),
        ('z', true) | ('y', _) => Some(EditorAction::Redo),
        ('c', false) => Some(EditorAction::Copy),
        ('v', false) => Some(EditorAction::Paste),
        ('d', false) => Some(EditorAction::Duplicate),
        // Shift+= types '+' on most layouts
        ('=' | '+', _) => Some(EditorAction::ZoomIn),
        ('-', _) => Some(EditorAction::ZoomOut),
        ('0', _) => Some(EditorAction::ZoomReset),
        ('g', false) => Some(EditorAction::ToggleSnap),
        ('h', false) => Some(EditorAction::ToggleHistoryPanel),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_keys() {
        assert_eq!(
            action_for(KeyPress::plain(Key::Space), false),
            Some(EditorAction::TogglePlay)
        );
        assert_eq!(
            action_for(KeyPress::plain(Key::Backspace), false),
            Some(EditorAction::Delete)
        );
        assert_eq!(
            action_for(KeyPress::plain(Key::Delete), false),
            Some(EditorAction::Delete)
        );
        assert_eq!(action_for(KeyPress::plain(Key::Char('z')), false), None);
    }

    #[test]
    fn test_undo_redo_variants() {
        assert_eq!(
            action_for(KeyPress::command(Key::Char('z')), false),
            Some(EditorAction::Undo)
        );
        assert_eq!(
            action_for(KeyPress::command_shift(Key::Char('Z')), false),
            Some(EditorAction::Redo)
        );
        assert_eq!(
            action_for(KeyPress::command(Key::Char('y')), false),
            Some(EditorAction::Redo)
        );
    }

    #[test]
    fn test_clipboard_zoom_and_toggles() {
        let cases = [
            ('c', EditorAction::Copy),
            ('v', EditorAction::Paste),
            ('d', EditorAction::Duplicate),
            ('=', EditorAction::ZoomIn),
            ('-', EditorAction::ZoomOut),
            ('0', EditorAction::ZoomReset),
            ('g', EditorAction::ToggleSnap),
            ('h', EditorAction::ToggleHistoryPanel),
        ];
        for (c, action) in cases {
            assert_eq!(action_for(KeyPress::command(Key::Char(c)), false), Some(action));
        }
        assert_eq!(
            action_for(KeyPress::command_shift(Key::Char('+')), false),
            Some(EditorAction::ZoomIn)
        );
    }

    #[test]
    fn test_text_focus_suppresses_everything() {
        for press in [
            KeyPress::plain(Key::Space),
            KeyPress::plain(Key::Backspace),
            KeyPress::command(Key::Char('z')),
            KeyPress::command(Key::Char('v')),
        ] {
            assert_eq!(action_for(press, true), None);
        }
    }
}
