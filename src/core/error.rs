//! Error taxonomy of the persistence provider

use miette::Diagnostic;
use thiserror::Error;

use crate::codec::CodecError;
use crate::core::entity::EntityKind;
use crate::core::identity::IdError;
use crate::store::StoreError;

#[derive(Debug, Error, Diagnostic)]
pub enum RegisterError {
    #[error("{kind} {id} not found")]
    #[diagnostic(code(riskreg::not_found))]
    NotFound { kind: EntityKind, id: String },

    #[error("{kind} {id} already exists")]
    #[diagnostic(code(riskreg::conflict))]
    Conflict { kind: EntityKind, id: String },

    #[error("register document could not be parsed")]
    #[diagnostic(
        code(riskreg::parse),
        help("check the document is a valid xlsx workbook with a risk sheet")
    )]
    Parse(#[from] CodecError),

    #[error("document store unavailable: {message}")]
    #[diagnostic(
        code(riskreg::store_unavailable),
        help("check the store settings with `riskreg status` and retry")
    )]
    StoreUnavailable { message: String },

    #[error("{0}")]
    #[diagnostic(code(riskreg::validation))]
    Validation(String),

    #[error("register changed since it was read (revision {expected}, now {actual})")]
    #[diagnostic(
        code(riskreg::revision_conflict),
        help("the cached copy was dropped; re-run the command to apply it to the latest revision")
    )]
    RevisionConflict { expected: String, actual: String },

    #[error("{0}")]
    #[diagnostic(code(riskreg::transaction))]
    Transaction(String),
}

impl RegisterError {
    pub fn not_found(kind: EntityKind, id: impl ToString) -> Self {
        RegisterError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn conflict(kind: EntityKind, id: impl ToString) -> Self {
        RegisterError::Conflict {
            kind,
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RegisterError::NotFound { .. })
    }
}

impl From<IdError> for RegisterError {
    fn from(err: IdError) -> Self {
        RegisterError::Validation(err.to_string())
    }
}

impl From<StoreError> for RegisterError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::RevisionMismatch {
                expected, actual, ..
            } => RegisterError::RevisionConflict { expected, actual },
            other => RegisterError::StoreUnavailable {
                message: other.to_string(),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, RegisterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_map_to_taxonomy() {
        let err: RegisterError = StoreError::NotFound("abc".to_string()).into();
        assert!(matches!(err, RegisterError::StoreUnavailable { .. }));

        let err: RegisterError = StoreError::RevisionMismatch {
            file_id: "abc".to_string(),
            expected: "1".to_string(),
            actual: "2".to_string(),
        }
        .into();
        assert!(matches!(err, RegisterError::RevisionConflict { .. }));
    }

    #[test]
    fn test_not_found_names_the_id() {
        let err = RegisterError::not_found(EntityKind::Control, "ACC-01");
        assert_eq!(err.to_string(), "control ACC-01 not found");
        assert!(err.is_not_found());
    }
}
