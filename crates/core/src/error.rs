use std::collections::BTreeMap;
use std::fmt;

/// Field-keyed validation messages collected from a dialog form.
///
/// An empty map means the form is valid. Keys are the form field names (`"patient_name"`,
/// `"reason"`, ...), values are the messages shown next to those fields.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct FormErrors(BTreeMap<&'static str, String>);

impl FormErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a message for `field`. The first message recorded for a field wins.
    pub fn insert(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_insert_with(|| message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.0.iter().map(|(k, v)| (*k, v.as_str()))
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Converts the collected messages into a result: `Ok(())` when empty.
    pub fn into_result(self) -> LisResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(LisError::Validation(self))
        }
    }
}

impl fmt::Display for FormErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, message) in &self.0 {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{field}: {message}")?;
            first = false;
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LisError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("validation failed: {0}")]
    Validation(FormErrors),
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
    #[error("{kind} already exists: {id}")]
    DuplicateId { kind: &'static str, id: String },
    #[error("{action} is not permitted for {role} in {module}")]
    PermissionDenied {
        action: &'static str,
        role: &'static str,
        module: &'static str,
    },
    #[error("{0}")]
    Precondition(String),
    #[error("invalid date: {0}")]
    InvalidDate(String),

    #[error("failed to read seed file: {0}")]
    SeedRead(std::io::Error),
    #[error("seed data schema mismatch at {path}: {message}")]
    SeedParse { path: String, message: String },
    #[error("failed to serialise: {0}")]
    Serialization(serde_json::Error),

    #[error("invalid text: {0}")]
    Text(#[from] lis_types::TextError),
    #[error("invalid identifier: {0}")]
    Id(#[from] lis_ids::IdError),
}

pub type LisResult<T> = std::result::Result<T, LisError>;
