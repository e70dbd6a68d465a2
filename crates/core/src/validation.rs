//! Form field checks.
//!
//! Each check records a message in a [`FormErrors`] map under the field name instead of failing
//! fast, so a dialog can show every problem at once.

use crate::dates::is_iso_date;
use crate::error::FormErrors;
use lis_types::{EmailAddress, NonEmptyText, PhoneNumber};

/// Records `"{label} is required"` when `value` is blank.
pub fn require(errors: &mut FormErrors, field: &'static str, label: &str, value: &str) {
    if NonEmptyText::new(value).is_err() {
        errors.insert(field, format!("{label} is required"));
    }
}

/// Requires a strict `YYYY-MM-DD` date.
pub fn require_iso_date(errors: &mut FormErrors, field: &'static str, label: &str, value: &str) {
    if value.trim().is_empty() {
        errors.insert(field, format!("{label} is required"));
    } else if !is_iso_date(value) {
        errors.insert(field, format!("{label} must be in YYYY-MM-DD format"));
    }
}

pub fn require_email(errors: &mut FormErrors, field: &'static str, value: &str) {
    if value.trim().is_empty() {
        errors.insert(field, "Email is required");
    } else if EmailAddress::parse(value).is_err() {
        errors.insert(field, "Enter a valid email address");
    }
}

pub fn require_phone(errors: &mut FormErrors, field: &'static str, value: &str) {
    if value.trim().is_empty() {
        errors.insert(field, "Phone number is required");
    } else if PhoneNumber::parse(value).is_err() {
        errors.insert(field, "Enter a valid phone number (7-15 digits)");
    }
}

/// Accepts either an email address or a phone number, as used for vendor contacts.
pub fn require_contact(errors: &mut FormErrors, field: &'static str, value: &str) {
    if value.trim().is_empty() {
        errors.insert(field, "Contact is required");
    } else if EmailAddress::parse(value).is_err() && PhoneNumber::parse(value).is_err() {
        errors.insert(field, "Contact must be an email address or a phone number");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_every_failing_field() {
        let mut errors = FormErrors::new();
        require(&mut errors, "patient_name", "Patient name", "  ");
        require_iso_date(&mut errors, "date_of_birth", "Date of birth", "23/07/1985");
        require_email(&mut errors, "email", "not-an-email");
        require_phone(&mut errors, "phone", "0901234567");

        assert_eq!(errors.len(), 3);
        assert_eq!(errors.get("patient_name"), Some("Patient name is required"));
        assert_eq!(
            errors.get("date_of_birth"),
            Some("Date of birth must be in YYYY-MM-DD format")
        );
        assert!(errors.contains("email"));
        assert!(!errors.contains("phone"));
    }

    #[test]
    fn contact_accepts_email_or_phone() {
        let mut errors = FormErrors::new();
        require_contact(&mut errors, "a", "sales@biovendor.com");
        require_contact(&mut errors, "b", "+1 800 555 0199");
        assert!(errors.is_empty());

        require_contact(&mut errors, "c", "ask at front desk");
        assert!(errors.contains("c"));
    }
}
