//! Event keys: the identifier or pattern a listener is registered under.

use std::fmt;

use regex::Regex;
use serde::{Serialize, Serializer};

use crate::error::Result;

/// Key a listener is registered under.
///
/// Exact keys match an event whose canonical string is equal to the key.
/// Pattern keys match any event the regex finds a match in.
///
/// Two keys are equal when they are the same variant with the same text.
/// For patterns that is the pattern source, so `off` only removes listeners
/// registered with an identical pattern.
#[derive(Debug, Clone)]
pub enum EventKey {
    /// Matches one event name.
    Exact(String),
    /// Matches every event name the regex matches.
    Pattern(Regex),
}

impl EventKey {
    /// Creates an exact key from anything with a string form.
    pub fn exact(name: impl fmt::Display) -> Self {
        Self::Exact(name.to_string())
    }

    /// Compiles `pattern` into a pattern key.
    pub fn pattern(pattern: &str) -> Result<Self> {
        Ok(Self::Pattern(Regex::new(pattern)?))
    }

    /// Returns true if an event with this canonical name should reach
    /// listeners under this key.
    pub fn matches(&self, event: &str) -> bool {
        match self {
            Self::Exact(name) => name == event,
            Self::Pattern(regex) => regex.is_match(event),
        }
    }

    /// Returns true for pattern keys.
    pub fn is_pattern(&self) -> bool {
        matches!(self, Self::Pattern(_))
    }

    /// Exact name or pattern source.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Exact(name) => name,
            Self::Pattern(regex) => regex.as_str(),
        }
    }
}

impl PartialEq for EventKey {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Exact(a), Self::Exact(b)) => a == b,
            (Self::Pattern(a), Self::Pattern(b)) => a.as_str() == b.as_str(),
            _ => false,
        }
    }
}

impl Eq for EventKey {}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(name) => f.write_str(name),
            Self::Pattern(regex) => write!(f, "/{}/", regex.as_str()),
        }
    }
}

impl Serialize for EventKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl From<&str> for EventKey {
    fn from(name: &str) -> Self {
        Self::Exact(name.to_string())
    }
}

impl From<String> for EventKey {
    fn from(name: String) -> Self {
        Self::Exact(name)
    }
}

impl From<&String> for EventKey {
    fn from(name: &String) -> Self {
        Self::Exact(name.clone())
    }
}

impl From<Regex> for EventKey {
    fn from(regex: Regex) -> Self {
        Self::Pattern(regex)
    }
}

impl From<&Regex> for EventKey {
    fn from(regex: &Regex) -> Self {
        Self::Pattern(regex.clone())
    }
}

macro_rules! exact_key_from_number {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for EventKey {
                fn from(id: $ty) -> Self {
                    Self::Exact(id.to_string())
                }
            }
        )*
    };
}

exact_key_from_number!(i32, i64, u32, u64, usize);
