//! Mutable mapping view over the host's flat associative string.
//!
//! The host serializes dictionaries as whitespace-separated tokens
//! alternating key, value: `"a 1 b 2 c 3"`. [`TclDict`] parses that form
//! once and then offers mapping semantics over it — membership, get/set,
//! length — while staying round-trippable back to the flat encoding.
//!
//! Keys need not be unique in the raw string; every operation is
//! first-match-wins and later duplicates survive re-serialization
//! untouched. Brace and quote rules of the real host format are the
//! host's concern and are not modeled here.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// A parsed flat key/value string, in encoding order.
///
/// # Example
///
/// ```
/// use pybounce::TclDict;
///
/// let mut d: TclDict = "a 1 b 2 c 3".parse().unwrap();
///
/// assert!(d.contains("b"));
/// assert_eq!(d.get("c").unwrap(), "3");
/// assert_eq!(d.len(), 3);
///
/// d.set("b", "20");
/// d.set("d", "4");
/// assert_eq!(d.to_string(), "a 1 b 20 c 3 d 4");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TclDict {
    pairs: Vec<(String, String)>,
}

impl TclDict {
    /// An empty dict, serializing to the empty string.
    pub fn new() -> Self {
        Self::default()
    }

    /// True iff `key` appears at a key position.
    pub fn contains(&self, key: &str) -> bool {
        self.pairs.iter().any(|(k, _)| k == key)
    }

    /// Value of the first matching key. Missing keys are caller misuse
    /// and fail with [`Error::KeyError`] rather than being swallowed.
    pub fn get(&self, key: &str) -> Result<&str> {
        self.try_get(key)
            .ok_or_else(|| Error::KeyError(key.to_string()))
    }

    /// Non-failing lookup.
    pub fn try_get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Replace the value at the first occurrence of `key` in place, or
    /// append the pair at the end when the key is new. Pair order is
    /// otherwise untouched.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.pairs.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.pairs.push((key, value)),
        }
    }

    /// Remove the first occurrence of `key`, preserving the order of the
    /// remaining pairs. Returns the removed value; a missing key is a
    /// no-op `None`, mirroring the host's forgiving `dict unset`.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let at = self.pairs.iter().position(|(k, _)| k == key)?;
        Some(self.pairs.remove(at).1)
    }

    /// Number of key/value pairs (half the token count).
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// The pairs in encoding order.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromStr for TclDict {
    type Err = Error;

    /// Eager parse. An odd token count cannot alternate key/value and is
    /// a parse fault.
    fn from_str(s: &str) -> Result<Self> {
        let tokens: Vec<&str> = s.split_whitespace().collect();
        if tokens.len() % 2 != 0 {
            return Err(Error::Parse(format!(
                "flat dict string has an odd number of tokens ({})",
                tokens.len()
            )));
        }
        let pairs = tokens
            .chunks_exact(2)
            .map(|pair| (pair[0].to_string(), pair[1].to_string()))
            .collect();
        Ok(TclDict { pairs })
    }
}

impl fmt::Display for TclDict {
    /// Re-serialize as the single-space-joined token string the host
    /// consumes.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (key, value) in &self.pairs {
            if !first {
                f.write_str(" ")?;
            }
            first = false;
            write!(f, "{} {}", key, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn odd_token_count_is_a_parse_fault() {
        let err = "a 1 b".parse::<TclDict>().unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn duplicate_keys_are_first_match_wins() {
        let mut d: TclDict = "a 1 b 2 a 3".parse().unwrap();
        assert_eq!(d.get("a").unwrap(), "1");

        d.set("a", "9");
        assert_eq!(d.to_string(), "a 9 b 2 a 3");

        assert_eq!(d.remove("a"), Some("9".to_string()));
        assert_eq!(d.to_string(), "b 2 a 3");
        assert_eq!(d.get("a").unwrap(), "3");
    }

    #[test]
    fn empty_dict_round_trips() {
        let d: TclDict = "".parse().unwrap();
        assert!(d.is_empty());
        assert_eq!(d.to_string(), "");
        assert_eq!(d, TclDict::new());
    }

    #[test]
    fn pairs_iterate_in_encoding_order() {
        let d: TclDict = "x 1 y 2 z 3".parse().unwrap();
        let pairs: Vec<(&str, &str)> = d.pairs().collect();
        assert_eq!(pairs, vec![("x", "1"), ("y", "2"), ("z", "3")]);
    }
}
