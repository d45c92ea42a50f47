//! Accumulated validation failures.

use core::fmt;

use serde::Serialize;

/// Category of a violated invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A mandatory value is missing or blank.
    Required,
    /// A value is present but syntactically wrong.
    Format,
    /// A numeric or temporal value lies outside its allowed range.
    OutOfRange,
    /// Values disagree with each other (sums, duplicates).
    Inconsistent,
}

impl ErrorKind {
    /// Stable machine-readable code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::Format => "format",
            Self::OutOfRange => "out_of_range",
            Self::Inconsistent => "inconsistent",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One violated invariant, addressed by a JSON-style field path such as
/// `order_uid` or `items[0].price`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub path: String,
    pub kind: ErrorKind,
    pub message: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}: {}", self.path, self.kind)
        } else {
            write!(f, "{}: {} ({})", self.path, self.message, self.kind)
        }
    }
}

/// Every invariant an order violates, in the order they were checked.
///
/// Never empty when returned from the validator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    fields: Vec<FieldError>,
}

impl ValidationErrors {
    #[must_use]
    pub const fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Record a violation.
    pub fn add(&mut self, path: impl Into<String>, kind: ErrorKind, message: impl Into<String>) {
        self.fields.push(FieldError {
            path: path.into(),
            kind,
            message: message.into(),
        });
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if a violation of `kind` was recorded at `path`.
    #[must_use]
    pub fn has(&self, path: &str, kind: ErrorKind) -> bool {
        self.fields.iter().any(|f| f.path == path && f.kind == kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.fields.iter()
    }

    #[must_use]
    pub fn fields(&self) -> &[FieldError] {
        &self.fields
    }

    /// `Ok(())` when nothing was recorded, otherwise `Err(self)`.
    ///
    /// # Errors
    ///
    /// Returns `self` if at least one violation was recorded.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("validation failed: ")?;
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{field}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

impl<'a> IntoIterator for &'a ValidationErrors {
    type Item = &'a FieldError;
    type IntoIter = std::slice::Iter<'a, FieldError>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_joins_all_fields() {
        let mut errors = ValidationErrors::new();
        errors.add("order_uid", ErrorKind::Required, "must not be empty");
        errors.add("items[0].price", ErrorKind::OutOfRange, "");

        assert_eq!(
            errors.to_string(),
            "validation failed: order_uid: must not be empty (required); items[0].price: out_of_range"
        );
    }

    #[test]
    fn test_into_result() {
        assert!(ValidationErrors::new().into_result().is_ok());

        let mut errors = ValidationErrors::new();
        errors.add("items", ErrorKind::Required, "at least one item");
        let err = errors.into_result().unwrap_err();
        assert!(err.has("items", ErrorKind::Required));
        assert!(!err.has("items", ErrorKind::Format));
        assert_eq!(err.len(), 1);
    }

    #[test]
    fn test_kind_codes() {
        assert_eq!(ErrorKind::OutOfRange.as_str(), "out_of_range");
        assert_eq!(
            serde_json::to_string(&ErrorKind::Inconsistent).unwrap_or_default(),
            "\"inconsistent\""
        );
    }
}
