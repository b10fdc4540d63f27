//! Packed key combos: one base key plus up to three modifiers in a `u32`
//!
//! Layout (byte 0 is least significant):
//!
//! ```text
//! byte 3   byte 2   byte 1   byte 0
//! mod1     mod2     mod3     base
//! ```
//!
//! Modifiers are sorted descending (`mod1 >= mod2 >= mod3`) so a combo has a
//! single canonical encoding no matter what order its modifiers were given in.
//! Any combo with a modifier therefore compares larger than any single-key
//! combo, and sorting the binding table descending tests the most specific
//! combos first.

use std::fmt;

use thiserror::Error;

use super::key::Key;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ComboError {
    #[error("cannot bind the Unknown key")]
    UnknownBaseKey,
}

/// A canonical base key + modifiers combination packed into 32 bits
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyCombo(u32);

impl KeyCombo {
    /// Pack a combo, canonicalizing the modifier order
    pub fn pack(base: Key, mod1: Key, mod2: Key, mod3: Key) -> Result<Self, ComboError> {
        if base == Key::Unknown {
            return Err(ComboError::UnknownBaseKey);
        }

        let (mut m1, mut m2, mut m3) = (mod1, mod2, mod3);
        // Three compare-and-swaps sort three elements; Unknown is 0 and sinks.
        if m1 < m2 {
            std::mem::swap(&mut m1, &mut m2);
        }
        if m2 < m3 {
            std::mem::swap(&mut m2, &mut m3);
        }
        if m1 < m2 {
            std::mem::swap(&mut m1, &mut m2);
        }

        Ok(Self(
            (m1.as_u8() as u32) << 24
                | (m2.as_u8() as u32) << 16
                | (m3.as_u8() as u32) << 8
                | base.as_u8() as u32,
        ))
    }

    /// Pack a single key with no modifiers
    pub fn single(base: Key) -> Result<Self, ComboError> {
        Self::pack(base, Key::Unknown, Key::Unknown, Key::Unknown)
    }

    /// Pack a key with a list of at most three modifiers; extra modifiers are ignored
    pub fn with_modifiers(base: Key, modifiers: &[Key]) -> Result<Self, ComboError> {
        let get = |i: usize| modifiers.get(i).copied().unwrap_or(Key::Unknown);
        Self::pack(base, get(0), get(1), get(2))
    }

    /// The raw packed value
    #[inline]
    pub const fn packed(self) -> u32 {
        self.0
    }

    #[inline]
    fn byte(self, index: u32) -> Key {
        Key::from_u8(((self.0 >> (index * 8)) & 0xFF) as u8)
    }

    /// Split into `(base, mod1, mod2, mod3)` with modifiers in canonical order
    pub fn unpack(self) -> (Key, Key, Key, Key) {
        (self.byte(0), self.byte(3), self.byte(2), self.byte(1))
    }

    /// The non-modifier key
    pub fn base(self) -> Key {
        self.byte(0)
    }

    /// Every non-empty slot, base key first
    pub fn keys(self) -> impl Iterator<Item = Key> {
        (0..4)
            .map(move |i| self.byte(i))
            .filter(|key| *key != Key::Unknown)
    }

    /// Number of modifier slots in use
    pub fn modifier_count(self) -> usize {
        (1..4).filter(|&i| self.byte(i) != Key::Unknown).count()
    }

    /// Whether `key` occupies any slot of this combo
    pub fn contains_key(self, key: Key) -> bool {
        debug_assert!(key != Key::Unknown, "queried combo for the Unknown key");
        if key == Key::Unknown {
            return false;
        }
        (0..4).any(|i| self.byte(i) == key)
    }

    /// Whether every key of `sub` is also part of this combo
    pub fn is_sub_pattern(self, sub: KeyCombo) -> bool {
        sub.keys().all(|key| self.contains_key(key))
    }
}

impl fmt::Display for KeyCombo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (base, mod1, mod2, mod3) = self.unpack();
        for modifier in [mod3, mod2, mod1] {
            if modifier != Key::Unknown {
                write!(f, "{}+", modifier)?;
            }
        }
        write!(f, "{}", base)
    }
}
