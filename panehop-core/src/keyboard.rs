use bitflags::bitflags;
use std::{fmt, str::FromStr};

/// Terminal-independent key code, so the core never depends on the event source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyCode {
    Char(char),
    Enter,
    Esc,
    Tab,
    BackTab,
    Backspace,
    Delete,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    F(u8),
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct KeyModifiers: u8 {
        const SHIFT = 0b0000_0001;
        const CONTROL = 0b0000_0010;
        const ALT = 0b0000_0100;
    }
}

impl KeyModifiers {
    pub const NONE: Self = Self::empty();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyEvent {
    // Field order matters for `Ord`: unmodified keys sort first.
    pub modifiers: KeyModifiers,
    pub code: KeyCode,
}

impl KeyEvent {
    pub const fn new(code: KeyCode, modifiers: KeyModifiers) -> Self {
        Self { modifiers, code }
    }

    /// The character to insert into a search query, if this key types one.
    pub fn printable_char(&self) -> Option<char> {
        match self.code {
            KeyCode::Char(c)
                if !c.is_control()
                    && !self
                        .modifiers
                        .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
            {
                Some(c)
            }
            _ => None,
        }
    }
}

fn parse_code(s: &str) -> Result<KeyCode, String> {
    let mut chars = s.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return Ok(KeyCode::Char(c));
    }
    let code = match s.to_ascii_lowercase().as_str() {
        "enter" | "return" | "ret" => KeyCode::Enter,
        "esc" | "escape" => KeyCode::Esc,
        "tab" => KeyCode::Tab,
        "backtab" => KeyCode::BackTab,
        "backspace" | "bs" => KeyCode::Backspace,
        "delete" | "del" => KeyCode::Delete,
        "up" => KeyCode::Up,
        "down" => KeyCode::Down,
        "left" => KeyCode::Left,
        "right" => KeyCode::Right,
        "home" => KeyCode::Home,
        "end" => KeyCode::End,
        "pageup" | "pgup" => KeyCode::PageUp,
        "pagedown" | "pgdn" => KeyCode::PageDown,
        "space" => KeyCode::Char(' '),
        "minus" => KeyCode::Char('-'),
        other => {
            if let Some(n) = other.strip_prefix('f')
                && let Ok(n) = n.parse::<u8>()
                && (1..=12).contains(&n)
            {
                KeyCode::F(n)
            } else {
                return Err(format!("unknown key name '{s}'"));
            }
        }
    };
    Ok(code)
}

impl FromStr for KeyEvent {
    type Err = String;

    /// Parses `C-x`, `A-enter`, `C-A-k`, `S-tab`, `space`, `/` and friends.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err("empty key".to_string());
        }

        let mut modifiers = KeyModifiers::NONE;
        let mut rest = s;
        loop {
            let Some((prefix, tail)) = rest.split_once('-') else {
                break;
            };
            if tail.is_empty() {
                break;
            }
            let flag = match prefix {
                "C" | "c" => KeyModifiers::CONTROL,
                "A" | "a" | "M" | "m" => KeyModifiers::ALT,
                "S" | "s" => KeyModifiers::SHIFT,
                _ => return Err(format!("unknown modifier '{prefix}' in '{s}'")),
            };
            modifiers |= flag;
            rest = tail;
        }

        let mut code = parse_code(rest)?;
        if modifiers.contains(KeyModifiers::SHIFT) {
            match code {
                KeyCode::Char(c) => {
                    code = KeyCode::Char(c.to_ascii_uppercase());
                    modifiers.remove(KeyModifiers::SHIFT);
                }
                KeyCode::Tab => {
                    code = KeyCode::BackTab;
                    modifiers.remove(KeyModifiers::SHIFT);
                }
                _ => {}
            }
        }
        Ok(Self::new(code, modifiers))
    }
}

impl fmt::Display for KeyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.modifiers.contains(KeyModifiers::CONTROL) {
            f.write_str("C-")?;
        }
        if self.modifiers.contains(KeyModifiers::ALT) {
            f.write_str("A-")?;
        }
        if self.modifiers.contains(KeyModifiers::SHIFT) {
            f.write_str("S-")?;
        }
        match self.code {
            KeyCode::Char(' ') => f.write_str("space"),
            KeyCode::Char(c) => write!(f, "{c}"),
            KeyCode::Enter => f.write_str("enter"),
            KeyCode::Esc => f.write_str("esc"),
            KeyCode::Tab => f.write_str("tab"),
            KeyCode::BackTab => f.write_str("backtab"),
            KeyCode::Backspace => f.write_str("backspace"),
            KeyCode::Delete => f.write_str("delete"),
            KeyCode::Up => f.write_str("up"),
            KeyCode::Down => f.write_str("down"),
            KeyCode::Left => f.write_str("left"),
            KeyCode::Right => f.write_str("right"),
            KeyCode::Home => f.write_str("home"),
            KeyCode::End => f.write_str("end"),
            KeyCode::PageUp => f.write_str("pageup"),
            KeyCode::PageDown => f.write_str("pagedown"),
            KeyCode::F(n) => write!(f, "f{n}"),
        }
    }
}

impl From<crossterm::event::KeyEvent> for KeyEvent {
    fn from(key: crossterm::event::KeyEvent) -> Self {
        use crossterm::event::{KeyCode as CtCode, KeyModifiers as CtMods};

        let mut modifiers = KeyModifiers::NONE;
        if key.modifiers.contains(CtMods::CONTROL) {
            modifiers |= KeyModifiers::CONTROL;
        }
        if key.modifiers.contains(CtMods::ALT) {
            modifiers |= KeyModifiers::ALT;
        }
        if key.modifiers.contains(CtMods::SHIFT) {
            modifiers |= KeyModifiers::SHIFT;
        }

        let code = match key.code {
            CtCode::Char(c) => {
                // The terminal already reports the shifted character.
                modifiers.remove(KeyModifiers::SHIFT);
                KeyCode::Char(c)
            }
            CtCode::Enter => KeyCode::Enter,
            CtCode::Esc => KeyCode::Esc,
            CtCode::Tab => KeyCode::Tab,
            CtCode::BackTab => {
                modifiers.remove(KeyModifiers::SHIFT);
                KeyCode::BackTab
            }
            CtCode::Backspace => KeyCode::Backspace,
            CtCode::Delete => KeyCode::Delete,
            CtCode::Up => KeyCode::Up,
            CtCode::Down => KeyCode::Down,
            CtCode::Left => KeyCode::Left,
            CtCode::Right => KeyCode::Right,
            CtCode::Home => KeyCode::Home,
            CtCode::End => KeyCode::End,
            CtCode::PageUp => KeyCode::PageUp,
            CtCode::PageDown => KeyCode::PageDown,
            CtCode::F(n) => KeyCode::F(n),
            // Unmapped keys become a control character nothing binds to.
            _ => KeyCode::Char('\0'),
        };
        Self::new(code, modifiers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("C-c", KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL))]
    #[case("A-g", KeyEvent::new(KeyCode::Char('g'), KeyModifiers::ALT))]
    #[case("enter", KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE))]
    #[case("esc", KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE))]
    #[case("space", KeyEvent::new(KeyCode::Char(' '), KeyModifiers::NONE))]
    #[case("/", KeyEvent::new(KeyCode::Char('/'), KeyModifiers::NONE))]
    #[case("-", KeyEvent::new(KeyCode::Char('-'), KeyModifiers::NONE))]
    #[case("S-tab", KeyEvent::new(KeyCode::BackTab, KeyModifiers::NONE))]
    #[case("S-g", KeyEvent::new(KeyCode::Char('G'), KeyModifiers::NONE))]
    #[case("C-A-k", KeyEvent::new(KeyCode::Char('k'), KeyModifiers::CONTROL | KeyModifiers::ALT))]
    #[case("C--", KeyEvent::new(KeyCode::Char('-'), KeyModifiers::CONTROL))]
    #[case("f5", KeyEvent::new(KeyCode::F(5), KeyModifiers::NONE))]
    #[case("PageDown", KeyEvent::new(KeyCode::PageDown, KeyModifiers::NONE))]
    fn test_parse_key(#[case] input: &str, #[case] expected: KeyEvent) {
        assert_eq!(input.parse::<KeyEvent>().unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("X-c")]
    #[case("invalid-key")]
    #[case("hyper")]
    #[case("f13")]
    fn test_parse_key_rejects(#[case] input: &str) {
        assert!(input.parse::<KeyEvent>().is_err());
    }

    #[rstest]
    #[case("C-c")]
    #[case("A-enter")]
    #[case("space")]
    #[case("q")]
    #[case("backtab")]
    #[case("C-A-x")]
    fn test_display_round_trips(#[case] input: &str) {
        let key: KeyEvent = input.parse().unwrap();
        assert_eq!(key.to_string(), input);
    }

    #[test]
    fn test_printable_char() {
        assert_eq!(
            KeyEvent::new(KeyCode::Char('a'), KeyModifiers::NONE).printable_char(),
            Some('a')
        );
        assert_eq!(
            KeyEvent::new(KeyCode::Char('a'), KeyModifiers::CONTROL).printable_char(),
            None
        );
        assert_eq!(
            KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE).printable_char(),
            None
        );
    }

    #[test]
    fn test_from_crossterm_drops_shift_for_chars() {
        let ct = crossterm::event::KeyEvent::new(
            crossterm::event::KeyCode::Char('G'),
            crossterm::event::KeyModifiers::SHIFT,
        );
        assert_eq!(
            KeyEvent::from(ct),
            KeyEvent::new(KeyCode::Char('G'), KeyModifiers::NONE)
        );

        let ct = crossterm::event::KeyEvent::new(
            crossterm::event::KeyCode::Char('h'),
            crossterm::event::KeyModifiers::CONTROL,
        );
        assert_eq!(
            KeyEvent::from(ct),
            KeyEvent::new(KeyCode::Char('h'), KeyModifiers::CONTROL)
        );
    }

    #[test]
    fn test_unmodified_keys_sort_first() {
        let mut keys = vec![
            KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL),
            KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE),
        ];
        keys.sort();
        assert_eq!(keys[0].code, KeyCode::Char('q'));
    }
}
