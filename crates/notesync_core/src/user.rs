//! User binding for local stores.

use crate::error::{CoreError, CoreResult};
use std::fmt;

/// Identity of the user a store handle belongs to.
///
/// Built from the id the server reports for the logged-in account. A store
/// handle is opened for one key at login and dropped at logout.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserKey(String);

impl UserKey {
    /// Creates a user key.
    ///
    /// Keys name the store file directly, so only ASCII letters, digits,
    /// `-` and `_` are accepted. Server account ids are UUIDs and always
    /// qualify.
    pub fn new(value: impl Into<String>) -> CoreResult<Self> {
        let value = value.into();
        let usable = !value.is_empty()
            && value
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !usable {
            return Err(CoreError::InvalidUserKey(value));
        }
        Ok(Self(value))
    }

    /// Returns the raw key.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the key as embedded in file names. Distinct keys never share
    /// a stem.
    pub fn file_stem(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_key_rejected() {
        assert!(matches!(UserKey::new("  "), Err(CoreError::InvalidUserKey(_))));
        assert!(UserKey::new("").is_err());
    }

    #[test]
    fn keys_needing_escape_are_rejected() {
        for raw in ["a/b", "a_b/", "../x", "a:b", "a b", "ü"] {
            assert!(
                matches!(UserKey::new(raw), Err(CoreError::InvalidUserKey(_))),
                "{raw} accepted"
            );
        }
    }

    #[test]
    fn file_stem_is_the_key() {
        let id = "6f1c0b2e-8c1d-4f55-9a43-0c2d5e7b9a10";
        let key = UserKey::new(id).unwrap();
        assert_eq!(key.file_stem(), id);
        assert_ne!(
            UserKey::new("a_b").unwrap().file_stem(),
            UserKey::new("a-b").unwrap().file_stem()
        );
    }
}
