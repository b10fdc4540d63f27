//! Physical key codes
//!
//! Every key fits in a single byte so four of them can be packed into a
//! [`KeyCombo`](super::KeyCombo). `Key::Unknown` is zero and doubles as the
//! "unused slot" marker inside a packed combo.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

macro_rules! keys {
    ($($name:ident = $value:literal),* $(,)?) => {
        /// A physical key. The discriminant is the byte used in packed combos.
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(u8)]
        pub enum Key {
            #[default]
            Unknown = 0,
            $($name = $value),*
        }

        impl Key {
            /// Every key except `Unknown`, in discriminant order
            pub const ALL: &'static [Key] = &[$(Key::$name),*];

            /// Canonical name used in keybind files and display strings
            pub const fn name(self) -> &'static str {
                match self {
                    Key::Unknown => "Unknown",
                    $(Key::$name => stringify!($name)),*
                }
            }

            /// Decode a packed byte; unassigned bytes decode to `Unknown`
            pub const fn from_u8(byte: u8) -> Key {
                match byte {
                    $($value => Key::$name,)*
                    _ => Key::Unknown,
                }
            }
        }
    };
}

keys! {
    MouseLeft = 1,
    MouseRight = 2,
    MouseMiddle = 3,
    MouseButton4 = 4,
    MouseButton5 = 5,
    MouseButton6 = 6,
    MouseButton7 = 7,
    MouseButton8 = 8,
    MouseButton9 = 9,
    A = 10,
    B = 11,
    C = 12,
    D = 13,
    E = 14,
    F = 15,
    G = 16,
    H = 17,
    I = 18,
    J = 19,
    K = 20,
    L = 21,
    M = 22,
    N = 23,
    O = 24,
    P = 25,
    Q = 26,
    R = 27,
    S = 28,
    T = 29,
    U = 30,
    V = 31,
    W = 32,
    X = 33,
    Y = 34,
    Z = 35,
    Num0 = 36,
    Num1 = 37,
    Num2 = 38,
    Num3 = 39,
    Num4 = 40,
    Num5 = 41,
    Num6 = 42,
    Num7 = 43,
    Num8 = 44,
    Num9 = 45,
    NumpadNum0 = 46,
    NumpadNum1 = 47,
    NumpadNum2 = 48,
    NumpadNum3 = 49,
    NumpadNum4 = 50,
    NumpadNum5 = 51,
    NumpadNum6 = 52,
    NumpadNum7 = 53,
    NumpadNum8 = 54,
    NumpadNum9 = 55,
    Escape = 56,
    Control = 57,
    Shift = 58,
    Alt = 59,
    LSystem = 60,
    RSystem = 61,
    Menu = 62,
    LBracket = 63,
    RBracket = 64,
    SemiColon = 65,
    Comma = 66,
    Period = 67,
    Apostrophe = 68,
    Slash = 69,
    BackSlash = 70,
    Tilde = 71,
    Equal = 72,
    Space = 73,
    Return = 74,
    NumpadEnter = 75,
    BackSpace = 76,
    Tab = 77,
    PageUp = 78,
    PageDown = 79,
    End = 80,
    Home = 81,
    Insert = 82,
    Delete = 83,
    Minus = 84,
    NumpadAdd = 85,
    NumpadSubtract = 86,
    NumpadDivide = 87,
    NumpadMultiply = 88,
    NumpadDecimal = 89,
    Left = 90,
    Right = 91,
    Up = 92,
    Down = 93,
    F1 = 94,
    F2 = 95,
    F3 = 96,
    F4 = 97,
    F5 = 98,
    F6 = 99,
    F7 = 100,
    F8 = 101,
    F9 = 102,
    F10 = 103,
    F11 = 104,
    F12 = 105,
    F13 = 106,
    F14 = 107,
    F15 = 108,
    F16 = 109,
    F17 = 110,
    F18 = 111,
    F19 = 112,
    F20 = 113,
    F21 = 114,
    F22 = 115,
    F23 = 116,
    F24 = 117,
    Pause = 118,
    CapsLock = 119,
    ScrollLock = 120,
    NumLock = 121,
    PrintScreen = 122,
}

impl Key {
    /// The byte stored in packed combos and used to index the pressed-key table
    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Whether this is one of the keys reported through modifier flags
    pub const fn is_modifier(self) -> bool {
        matches!(
            self,
            Key::Control | Key::Shift | Key::Alt | Key::LSystem | Key::RSystem
        )
    }

    pub const fn is_mouse_button(self) -> bool {
        (self as u8) >= Key::MouseLeft as u8 && (self as u8) <= Key::MouseButton9 as u8
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown key name '{0}'")]
pub struct UnknownKeyName(pub String);

impl FromStr for Key {
    type Err = UnknownKeyName;

    /// Parse a key name, case-insensitively, accepting a few common aliases
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();

        let alias = match lower.as_str() {
            "ctrl" | "control" => Some(Key::Control),
            "option" | "opt" => Some(Key::Alt),
            "super" | "win" | "meta" | "cmd" | "system" => Some(Key::LSystem),
            "esc" => Some(Key::Escape),
            "enter" => Some(Key::Return),
            "backspace" | "back" => Some(Key::BackSpace),
            "del" => Some(Key::Delete),
            "ins" => Some(Key::Insert),
            "pgup" => Some(Key::PageUp),
            "pgdn" | "pgdown" => Some(Key::PageDown),
            "grave" | "`" | "~" => Some(Key::Tilde),
            ";" | "semicolon" => Some(Key::SemiColon),
            "," => Some(Key::Comma),
            "." => Some(Key::Period),
            "/" => Some(Key::Slash),
            "\\" | "backslash" => Some(Key::BackSlash),
            "=" => Some(Key::Equal),
            "-" => Some(Key::Minus),
            "[" => Some(Key::LBracket),
            "]" => Some(Key::RBracket),
            "'" => Some(Key::Apostrophe),
            _ => None,
        };
        if let Some(key) = alias {
            return Ok(key);
        }

        // Bare digits map onto the number row
        if lower.len() == 1 {
            if let Some(digit) = lower.chars().next().and_then(|c| c.to_digit(10)) {
                return Ok(Key::from_u8(Key::Num0 as u8 + digit as u8));
            }
        }

        Key::ALL
            .iter()
            .copied()
            .find(|key| key.name().eq_ignore_ascii_case(&lower))
            .ok_or_else(|| UnknownKeyName(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_fits_in_byte_and_roundtrips() {
        for &key in Key::ALL {
            assert_ne!(key, Key::Unknown);
            assert_eq!(Key::from_u8(key.as_u8()), key);
        }
        assert_eq!(Key::from_u8(0), Key::Unknown);
        assert_eq!(Key::from_u8(255), Key::Unknown);
    }

    #[test]
    fn test_parse_names_case_insensitive() {
        assert_eq!("a".parse::<Key>(), Ok(Key::A));
        assert_eq!("PageUp".parse::<Key>(), Ok(Key::PageUp));
        assert_eq!("pageup".parse::<Key>(), Ok(Key::PageUp));
        assert_eq!("F12".parse::<Key>(), Ok(Key::F12));
    }

    #[test]
    fn test_parse_aliases() {
        assert_eq!("ctrl".parse::<Key>(), Ok(Key::Control));
        assert_eq!("esc".parse::<Key>(), Ok(Key::Escape));
        assert_eq!("enter".parse::<Key>(), Ok(Key::Return));
        assert_eq!("7".parse::<Key>(), Ok(Key::Num7));
        assert_eq!("`".parse::<Key>(), Ok(Key::Tilde));
    }

    #[test]
    fn test_parse_unknown() {
        assert!("hyper".parse::<Key>().is_err());
        assert!("".parse::<Key>().is_err());
    }

    #[test]
    fn test_modifier_classification() {
        assert!(Key::Control.is_modifier());
        assert!(!Key::A.is_modifier());
        assert!(Key::MouseMiddle.is_mouse_button());
        assert!(!Key::Escape.is_mouse_button());
    }
}
