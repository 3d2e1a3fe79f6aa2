//! # Error Definitions
//!
//! Failures raised while canonicalizing declarations or reading API dumps.

use crate::MemberKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A referenced type does not resolve to a class-like symbol.
    /// Fatal for the whole extraction: a partial dump is unsafe to compare.
    UnresolvedType { member: String, ty: String },
    /// Two members render to the same signature but disagree on their kind.
    KindConflict {
        service: String,
        signature: String,
        existing: MemberKind,
        incoming: MemberKind,
    },
    /// A dump listed the same service twice.
    DuplicateService(String),
    /// A dump line could not be read.
    Parse { line: usize, message: String },
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnresolvedType { member, ty } => {
                write!(f, "member '{}' references unresolved type '{}'", member, ty)
            }
            Self::KindConflict { service, signature, existing, incoming } => write!(
                f,
                "service '{}' declares '{}' as both {:?} and {:?}",
                service, signature, existing, incoming
            ),
            Self::DuplicateService(name) => write!(f, "service '{}' listed more than once", name),
            Self::Parse { line, message } => write!(f, "line {}: {}", line, message),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
