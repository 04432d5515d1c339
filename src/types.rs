//! Core types: Symbol, cents formatting, percentage helpers.

use std::fmt;

/// Maximum ticker length in bytes.
pub const SYMBOL_CAPACITY: usize = 12;

/// Tolerance used when comparing drift against trigger levels.
///
/// Percentages are derived from integer cents through `f64` division, so an
/// allocation sitting exactly on its threshold may come out a few ulps short.
pub const DRIFT_EPSILON: f64 = 1e-9;

/// A ticker symbol stored inline (no heap allocation).
///
/// Symbols are ASCII, 1 to [`SYMBOL_CAPACITY`] bytes. `Copy` so they can be
/// used freely as map keys.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol {
    // Zero-padded, so deriving `Ord` over `bytes` first gives lexicographic order.
    bytes: [u8; SYMBOL_CAPACITY],
    len: u8,
}

impl Symbol {
    /// Create a symbol, panicking on empty, oversized, or non-ASCII input.
    ///
    /// Use [`Symbol::try_new`] for untrusted input.
    #[track_caller]
    pub fn new(s: &str) -> Self {
        match Self::try_new(s) {
            Some(sym) => sym,
            None => panic!("invalid symbol {s:?}: must be 1..={SYMBOL_CAPACITY} ASCII bytes"),
        }
    }

    /// Create a symbol if `s` is 1..=12 ASCII bytes.
    pub fn try_new(s: &str) -> Option<Self> {
        if s.is_empty() || s.len() > SYMBOL_CAPACITY || !s.is_ascii() {
            return None;
        }
        let mut bytes = [0u8; SYMBOL_CAPACITY];
        bytes[..s.len()].copy_from_slice(s.as_bytes());
        Some(Self {
            bytes,
            len: s.len() as u8,
        })
    }

    /// The ticker as a string slice.
    pub fn as_str(&self) -> &str {
        // Construction only accepts ASCII, so this never fails.
        std::str::from_utf8(&self.bytes[..self.len as usize]).unwrap_or_default()
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.as_str())
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Symbol {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Symbol {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Symbol::try_new(&s).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "symbol '{s}' must be 1..={SYMBOL_CAPACITY} ASCII bytes"
            ))
        })
    }
}

/// Format cents as dollars, e.g. `100_50` → `"$100.50"`.
pub fn format_cents(cents: i64) -> String {
    let dollars = cents / 100;
    let rem = (cents % 100).abs();
    if cents < 0 {
        format!("-${}.{:02}", dollars.abs(), rem)
    } else {
        format!("${dollars}.{rem:02}")
    }
}

/// `part / whole * 100`, or 0 when `whole` is not positive.
#[inline]
pub fn percent_of(part: i64, whole: i64) -> f64 {
    if whole <= 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Value in cents of `percent` of `total_cents`.
#[inline]
pub fn value_at_percent(total_cents: i64, percent: f64) -> i64 {
    (total_cents as f64 * percent / 100.0).round() as i64
}
