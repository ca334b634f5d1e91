//! Domain object identity.
//!
//! Objects are addressed by a namespace and a key. The key-string form is
//! `namespace:key`, or just `key` when the namespace is empty. Colons and
//! backslashes inside the namespace are escaped with a backslash so the
//! first unescaped colon always separates namespace from key.

use serde::{Deserialize, Serialize};

/// Identity of a domain object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identifier {
    pub namespace: String,
    pub key: String,
}

impl Identifier {
    #[must_use]
    pub fn new(namespace: &str, key: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            key: key.to_string(),
        }
    }

    /// An identifier in the default (empty) namespace.
    #[must_use]
    pub fn in_default_namespace(key: &str) -> Self {
        Self::new("", key)
    }

    /// Parse a key string.
    ///
    /// # Errors
    ///
    /// Returns `IdentifierError::EmptyKey` if the key part is empty and
    /// `IdentifierError::DanglingEscape` if the string ends in a lone `\`.
    pub fn parse(key_string: &str) -> Result<Self, IdentifierError> {
        let mut namespace = String::new();
        let mut chars = key_string.char_indices();
        let mut key_start = None;

        while let Some((index, c)) = chars.next() {
            match c {
                '\\' => match chars.next() {
                    Some((_, escaped)) => namespace.push(escaped),
                    None => return Err(IdentifierError::DanglingEscape),
                },
                ':' => {
                    key_start = Some(index + 1);
                    break;
                }
                _ => namespace.push(c),
            }
        }

        let (namespace, key) = match key_start {
            Some(start) => (namespace, key_string[start..].to_string()),
            // No separator: the whole (unescaped) string is the key.
            None => (String::new(), namespace),
        };

        if key.is_empty() {
            return Err(IdentifierError::EmptyKey);
        }
        Ok(Self { namespace, key })
    }

    /// The normalized key string.
    #[must_use]
    pub fn to_key_string(&self) -> String {
        if self.namespace.is_empty() {
            return escape(&self.key);
        }
        format!("{}:{}", escape(&self.namespace), self.key)
    }
}

fn escape(part: &str) -> String {
    let mut escaped = String::with_capacity(part.len());
    for c in part.chars() {
        if c == ':' || c == '\\' {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_key_string())
    }
}

impl std::str::FromStr for Identifier {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Errors from parsing a key string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierError {
    /// The key part is empty.
    EmptyKey,
    /// The string ends with an unpaired escape character.
    DanglingEscape,
}

impl std::fmt::Display for IdentifierError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyKey => write!(f, "identifier key must not be empty"),
            Self::DanglingEscape => write!(f, "identifier ends with a dangling escape"),
        }
    }
}

impl std::error::Error for IdentifierError {}
