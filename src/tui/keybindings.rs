use super::{
    action::ActivateAction,
    app::FocusedView,
    Action,
};
use crossterm::event::{
    KeyCode,
    KeyEvent,
    KeyModifiers,
};
use derive_more::{
    Deref,
    DerefMut,
};
use serde::{
    de::{
        self,
        MapAccess,
        Visitor,
    },
    ser::SerializeMap as _,
    Deserialize,
    Deserializer,
    Serialize,
    Serializer,
};
use std::{
    collections::HashMap,
    fmt,
};

/// Key sequences of one view, mapped to the actions they trigger.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deref, DerefMut)]
pub struct Keymap(pub HashMap<Vec<KeyEvent>, Action>);

/// One [`Keymap`] per top level view. Only the map of the active view is
/// consulted; an empty map swapped in while an editor is open routes every
/// key to the editor.
#[derive(Clone, Debug, Deref)]
pub struct KeyBindings(HashMap<FocusedView, Keymap>);

impl Default for KeyBindings {
    fn default() -> Self {
        let mut bindings = HashMap::new();
        for view in [FocusedView::Dashboard, FocusedView::Servers, FocusedView::Logs] {
            let mut keymap = HashMap::new();
            keymap.insert(single(KeyCode::Char('q'), KeyModifiers::NONE), Action::Quit);
            keymap.insert(single(KeyCode::Char('c'), KeyModifiers::CONTROL), Action::Quit);
            keymap.insert(single(KeyCode::Char('z'), KeyModifiers::CONTROL), Action::Suspend);
            keymap.insert(
                single(KeyCode::Char('1'), KeyModifiers::NONE),
                Action::Activate(ActivateAction::Dashboard),
            );
            keymap.insert(
                single(KeyCode::Char('2'), KeyModifiers::NONE),
                Action::Activate(ActivateAction::Servers),
            );
            keymap.insert(
                single(KeyCode::Char('3'), KeyModifiers::NONE),
                Action::Activate(ActivateAction::Logs),
            );
            keymap.insert(single(KeyCode::Esc, KeyModifiers::NONE), Action::DismissNotice);
            bindings.insert(view, Keymap(keymap));
        }
        Self(bindings)
    }
}

fn single(code: KeyCode, modifiers: KeyModifiers) -> Vec<KeyEvent> {
    vec![KeyEvent::new(code, modifiers)]
}

impl Serialize for Keymap {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (keys, action) in &self.0 {
            let raw = keys
                .iter()
                .map(|key| format!("<{}>", key_event_to_string(key)))
                .collect::<String>();
            map.serialize_entry(&raw, action)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Keymap {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct KeymapVisitor;

        impl<'de> Visitor<'de> for KeymapVisitor {
            type Value = Keymap;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                write!(formatter, "a map of key sequences to actions")
            }

            fn visit_map<M>(self, mut access: M) -> Result<Self::Value, M::Error>
            where
                M: MapAccess<'de>,
            {
                let mut keymap = HashMap::new();
                while let Some((raw, action)) = access.next_entry::<String, Action>()? {
                    let keys = parse_key_sequence(&raw).map_err(de::Error::custom)?;
                    keymap.insert(keys, action);
                }
                Ok(Keymap(keymap))
            }
        }

        deserializer.deserialize_map(KeymapVisitor)
    }
}

pub(crate) fn parse_key_event(raw: &str) -> Result<KeyEvent, String> {
    let raw_lower = raw.to_ascii_lowercase();
    let (remaining, modifiers) = extract_modifiers(&raw_lower);
    parse_key_code_with_modifiers(remaining, modifiers)
}

fn extract_modifiers(raw: &str) -> (&str, KeyModifiers) {
    let mut modifiers = KeyModifiers::empty();
    let mut current = raw;

    loop {
        match current {
            rest if rest.starts_with("ctrl-") => {
                modifiers.insert(KeyModifiers::CONTROL);
                current = &rest[5..];
            }
            rest if rest.starts_with("alt-") => {
                modifiers.insert(KeyModifiers::ALT);
                current = &rest[4..];
            }
            rest if rest.starts_with("shift-") => {
                modifiers.insert(KeyModifiers::SHIFT);
                current = &rest[6..];
            }
            _ => break,
        };
    }

    (current, modifiers)
}

fn parse_key_code_with_modifiers(raw: &str, mut modifiers: KeyModifiers) -> Result<KeyEvent, String> {
    let c = match raw {
        "esc" => KeyCode::Esc,
        "enter" => KeyCode::Enter,
        "left" => KeyCode::Left,
        "right" => KeyCode::Right,
        "up" => KeyCode::Up,
        "down" => KeyCode::Down,
        "home" => KeyCode::Home,
        "end" => KeyCode::End,
        "pageup" => KeyCode::PageUp,
        "pagedown" => KeyCode::PageDown,
        "backtab" => {
            modifiers.insert(KeyModifiers::SHIFT);
            KeyCode::BackTab
        }
        "backspace" => KeyCode::Backspace,
        "delete" => KeyCode::Delete,
        "insert" => KeyCode::Insert,
        "f1" => KeyCode::F(1),
        "f2" => KeyCode::F(2),
        "f3" => KeyCode::F(3),
        "f4" => KeyCode::F(4),
        "f5" => KeyCode::F(5),
        "f6" => KeyCode::F(6),
        "f7" => KeyCode::F(7),
        "f8" => KeyCode::F(8),
        "f9" => KeyCode::F(9),
        "f10" => KeyCode::F(10),
        "f11" => KeyCode::F(11),
        "f12" => KeyCode::F(12),
        "space" => KeyCode::Char(' '),
        "hyphen" | "minus" => KeyCode::Char('-'),
        "tab" => KeyCode::Tab,
        c if c.len() == 1 => {
            let mut c = c.chars().next().unwrap();
            if modifiers.contains(KeyModifiers::SHIFT) {
                c = c.to_ascii_uppercase();
            }
            KeyCode::Char(c)
        }
        _ => return Err(format!("Unable to parse {raw}")),
    };
    Ok(KeyEvent::new(c, modifiers))
}

pub(crate) fn key_event_to_string(key_event: &KeyEvent) -> String {
    let char;
    let key_code = match key_event.code {
        KeyCode::Backspace => "backspace",
        KeyCode::Enter => "enter",
        KeyCode::Left => "left",
        KeyCode::Right => "right",
        KeyCode::Up => "up",
        KeyCode::Down => "down",
        KeyCode::Home => "home",
        KeyCode::End => "end",
        KeyCode::PageUp => "pageup",
        KeyCode::PageDown => "pagedown",
        KeyCode::Tab => "tab",
        KeyCode::BackTab => "backtab",
        KeyCode::Delete => "delete",
        KeyCode::Insert => "insert",
        KeyCode::F(c) => {
            char = format!("f{c}");
            &char
        }
        KeyCode::Char(' ') => "space",
        KeyCode::Char(c) => {
            char = c.to_string();
            &char
        }
        KeyCode::Esc => "esc",
        _ => "",
    };

    let mut modifiers = Vec::with_capacity(3);
    if key_event.modifiers.intersects(KeyModifiers::CONTROL) {
        modifiers.push("ctrl-");
    }
    if key_event.modifiers.intersects(KeyModifiers::SHIFT) {
        modifiers.push("shift-");
    }
    if key_event.modifiers.intersects(KeyModifiers::ALT) {
        modifiers.push("alt-");
    }

    let mut key = modifiers.join("");
    key.push_str(key_code);
    key
}

pub(crate) fn parse_key_sequence(raw: &str) -> Result<Vec<KeyEvent>, String> {
    if raw.chars().filter(|c| *c == '>').count() != raw.chars().filter(|c| *c == '<').count() {
        return Err(format!("Unable to parse `{raw}`"));
    }
    let raw = if !raw.contains("><") {
        let raw = raw.strip_prefix('<').unwrap_or(raw);
        let raw = raw.strip_suffix('>').unwrap_or(raw);
        raw
    } else {
        raw
    };
    let sequences = raw
        .split("><")
        .map(|seq| {
            if let Some(s) = seq.strip_prefix('<') {
                s
            } else if let Some(s) = seq.strip_suffix('>') {
                s
            } else {
                seq
            }
        })
        .collect::<Vec<_>>();

    sequences.into_iter().map(parse_key_event).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn simple_keys_parse() {
        assert_eq!(
            parse_key_event("a").unwrap(),
            KeyEvent::new(KeyCode::Char('a'), KeyModifiers::empty())
        );
        assert_eq!(
            parse_key_event("enter").unwrap(),
            KeyEvent::new(KeyCode::Enter, KeyModifiers::empty())
        );
        assert_eq!(
            parse_key_event("esc").unwrap(),
            KeyEvent::new(KeyCode::Esc, KeyModifiers::empty())
        );
    }

    #[test]
    fn modifiers_parse_in_any_order() {
        assert_eq!(
            parse_key_event("ctrl-a").unwrap(),
            KeyEvent::new(KeyCode::Char('a'), KeyModifiers::CONTROL)
        );
        assert_eq!(
            parse_key_event("alt-ctrl-enter").unwrap(),
            KeyEvent::new(KeyCode::Enter, KeyModifiers::CONTROL | KeyModifiers::ALT)
        );
    }

    #[test]
    fn invalid_keys_are_rejected() {
        assert!(parse_key_event("invalid-key").is_err());
        assert!(parse_key_event("ctrl-invalid-key").is_err());
    }

    #[test]
    fn key_events_round_trip_through_strings() {
        for raw in ["q", "ctrl-c", "shift-up", "pagedown", "space"] {
            let event = parse_key_event(raw).unwrap();
            assert_eq!(key_event_to_string(&event), raw);
        }
    }

    #[test]
    fn every_view_has_the_common_bindings() {
        let bindings = KeyBindings::default();
        for view in [FocusedView::Dashboard, FocusedView::Servers, FocusedView::Logs] {
            let keymap = bindings.get(&view).unwrap();
            assert_eq!(
                keymap.get(&parse_key_sequence("<q>").unwrap()),
                Some(&Action::Quit),
                "{view:?} must quit on q"
            );
            assert_eq!(
                keymap.get(&parse_key_sequence("<ctrl-c>").unwrap()),
                Some(&Action::Quit)
            );
            assert_eq!(
                keymap.get(&parse_key_sequence("<esc>").unwrap()),
                Some(&Action::DismissNotice)
            );
        }
    }
}
