//! Contact details accepted by create/update forms.
//!
//! Both checks are pattern checks, matching what the dashboards require of a phone number or an
//! email address and nothing more.

use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@(?:[A-Za-z0-9\-]+\.)+[A-Za-z]{2,}$")
        .expect("email pattern compiles")
});

static PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9 ().\-]+$").expect("phone pattern compiles"));

/// Errors returned when parsing contact details.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContactError {
    #[error("invalid email address: {0}")]
    InvalidEmail(String),
    #[error("invalid phone number: {0}")]
    InvalidPhone(String),
}

/// An email address of the shape `local@domain.tld`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Parses an email address.
    ///
    /// The local part may hold letters, digits and `._%+-`. The domain is one or more dotted
    /// labels of letters, digits and `-`, ending in an alphabetic label of two or more letters.
    ///
    /// # Errors
    ///
    /// Returns [`ContactError::InvalidEmail`] when any of the above does not hold.
    pub fn parse(input: &str) -> Result<Self, ContactError> {
        let trimmed = input.trim();
        if !EMAIL.is_match(trimmed) {
            return Err(ContactError::InvalidEmail(trimmed.to_owned()));
        }
        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for EmailAddress {
    type Err = ContactError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A phone number written with digits and common separators.
///
/// An optional leading `+` is allowed, followed by digits, spaces, `-`, `.`, `(` and `)`.
/// Between 7 and 15 digits must be present.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    const MIN_DIGITS: usize = 7;
    const MAX_DIGITS: usize = 15;

    /// Parses a phone number.
    ///
    /// # Errors
    ///
    /// Returns [`ContactError::InvalidPhone`] for unsupported characters or a digit count
    /// outside 7..=15.
    pub fn parse(input: &str) -> Result<Self, ContactError> {
        let trimmed = input.trim();
        let invalid = || ContactError::InvalidPhone(trimmed.to_owned());

        if !PHONE.is_match(trimmed) {
            return Err(invalid());
        }

        let digits = trimmed.bytes().filter(u8::is_ascii_digit).count();
        if !(Self::MIN_DIGITS..=Self::MAX_DIGITS).contains(&digits) {
            return Err(invalid());
        }

        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns only the digits, keeping a leading `+` when present.
    pub fn normalised(&self) -> String {
        let mut out = String::with_capacity(self.0.len());
        if self.0.starts_with('+') {
            out.push('+');
        }
        out.extend(self.0.chars().filter(char::is_ascii_digit));
        out
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PhoneNumber {
    type Err = ContactError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
