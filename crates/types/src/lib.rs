//! Validated text types shared across the LIS crates.
//!
//! Form fields in the dashboards are plain strings until they are accepted. These wrappers are
//! the accepted forms: once constructed, the value is known to satisfy its check.

mod contact;

pub use contact::{ContactError, EmailAddress, PhoneNumber};

/// Rejections from the text constructors in this crate.
#[derive(Debug, thiserror::Error)]
pub enum TextError {
    #[error("value is required")]
    Empty,
}

/// Text with at least one visible character, stored trimmed.
///
/// Used for display names, comment bodies and other free-text fields that a form marks as
/// required.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// # Errors
    ///
    /// Returns [`TextError::Empty`] when nothing is left after trimming.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        match input.as_ref().trim() {
            "" => Err(TextError::Empty),
            kept => Ok(Self(kept.to_owned())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NonEmptyText {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl std::str::FromStr for NonEmptyText {
    type Err = TextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl serde::Serialize for NonEmptyText {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> serde::Deserialize<'de> for NonEmptyText {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = <String as serde::Deserialize>::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}
