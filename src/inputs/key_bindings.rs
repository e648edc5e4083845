//! Keyboard shortcuts for page navigation and zoom

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::viewer::Command;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyParseError {
    #[error("empty key")]
    Empty,
    #[error("unknown modifier `{0}`")]
    UnknownModifier(String),
    #[error("unknown key `{0}`")]
    UnknownKey(String),
}

/// Map a key press to a viewer command. Modifiers only matter for the
/// reset shortcut (Ctrl+0 / Cmd+0).
#[must_use]
pub fn command_for_key(key: KeyEvent) -> Option<Command> {
    match key.code {
        KeyCode::Left | KeyCode::PageUp => Some(Command::PrevPage),
        KeyCode::Right | KeyCode::PageDown | KeyCode::Char(' ') => Some(Command::NextPage),
        KeyCode::Home => Some(Command::FirstPage),
        KeyCode::End => Some(Command::LastPage),
        KeyCode::Char('+' | '=') => Some(Command::ZoomIn),
        KeyCode::Char('-') => Some(Command::ZoomOut),
        KeyCode::Char('0')
            if key
                .modifiers
                .intersects(KeyModifiers::CONTROL | KeyModifiers::SUPER | KeyModifiers::META) =>
        {
            Some(Command::ResetZoom)
        }
        _ => None,
    }
}

/// Parse a key description such as `right`, `pagedown`, `+` or `ctrl+0`
pub fn parse_key(spec: &str) -> Result<KeyEvent, KeyParseError> {
    let spec = spec.trim();
    if spec.is_empty() {
        return Err(KeyParseError::Empty);
    }

    let (mods, key) = if spec == "+" {
        ("", "+")
    } else if let Some(prefix) = spec.strip_suffix("++") {
        (prefix, "+")
    } else {
        spec.rsplit_once('+').unwrap_or(("", spec))
    };

    let mut modifiers = KeyModifiers::NONE;
    for name in mods.split('+').filter(|m| !m.is_empty()) {
        modifiers |= match name.to_ascii_lowercase().as_str() {
            "ctrl" | "control" => KeyModifiers::CONTROL,
            "cmd" | "command" | "super" | "meta" => KeyModifiers::SUPER,
            "alt" | "option" => KeyModifiers::ALT,
            "shift" => KeyModifiers::SHIFT,
            _ => return Err(KeyParseError::UnknownModifier(name.to_string())),
        };
    }

    let code = match key.to_ascii_lowercase().as_str() {
        "left" | "arrowleft" => KeyCode::Left,
        "right" | "arrowright" => KeyCode::Right,
        "up" | "arrowup" => KeyCode::Up,
        "down" | "arrowdown" => KeyCode::Down,
        "pageup" | "pgup" => KeyCode::PageUp,
        "pagedown" | "pgdn" => KeyCode::PageDown,
        "home" => KeyCode::Home,
        "end" => KeyCode::End,
        "space" => KeyCode::Char(' '),
        "enter" | "return" => KeyCode::Enter,
        "esc" | "escape" => KeyCode::Esc,
        _ => {
            let mut chars = key.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => KeyCode::Char(c),
                _ => return Err(KeyParseError::UnknownKey(key.to_string())),
            }
        }
    };

    Ok(KeyEvent::new(code, modifiers))
}

/// Parse a comma-separated key list
pub fn parse_key_list(list: &str) -> Result<Vec<KeyEvent>, KeyParseError> {
    list.split(',')
        .filter(|s| !s.trim().is_empty())
        .map(parse_key)
        .collect()
}
