//! Record-level validation outcome.

use std::fmt;

use thiserror::Error;

use super::normalize::FormatError;

/// Why a raw row could not become a record.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{record}.{field}: {reason}")]
pub struct ValidationError {
    pub record: &'static str,
    pub field: &'static str,
    pub reason: Reason,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reason {
    Missing,
    Format(FormatError),
    Constraint(String),
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reason::Missing => write!(f, "required value is missing"),
            Reason::Format(err) => write!(f, "{err}"),
            Reason::Constraint(message) => write!(f, "{message}"),
        }
    }
}

impl ValidationError {
    pub fn missing(record: &'static str, field: &'static str) -> Self {
        Self {
            record,
            field,
            reason: Reason::Missing,
        }
    }

    pub fn format(record: &'static str, field: &'static str, err: FormatError) -> Self {
        Self {
            record,
            field,
            reason: Reason::Format(err),
        }
    }

    pub fn constraint(
        record: &'static str,
        field: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            record,
            field,
            reason: Reason::Constraint(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_record_and_field() {
        let err = ValidationError::missing("opening_result", "ibx_grp_nm");
        assert_eq!(
            err.to_string(),
            "opening_result.ibx_grp_nm: required value is missing"
        );
    }
}
