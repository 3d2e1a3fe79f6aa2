//! # NeoSig
//!
//! Canonical signatures for bridged service interfaces.
//!
//! One deterministic string per member serves two masters: the bridge uses it
//! as the dispatch key, and the API checker compares it across builds. Both
//! sides go through the same code here so that they cannot disagree.

mod dump;
mod error;
mod interface;
mod member;
mod service_type;
mod types;


pub use crate::error::Error;
pub use crate::error::Result;

pub use crate::types::TypeArg;
pub use crate::types::TypeRef;
pub use crate::types::Variance;

pub use crate::member::FunctionDecl;
pub use crate::member::Member;
pub use crate::member::MemberKind;
pub use crate::member::PropertyDecl;
pub use crate::member::Signature;
pub use crate::member::signature_of;

pub use crate::service_type::ServiceType;

pub use crate::interface::CLOSEABLE_MARKER;
pub use crate::interface::Interface;
pub use crate::interface::SERVICE_MARKER;

pub use crate::dump::ApiDiff;
pub use crate::dump::ApiDump;
pub use crate::dump::compare;
