//! # Member Declarations & Canonical Signatures
//!
//! A member is one callable element of an interface: a function or a property.
//! `signature_of` turns a member into the single string that both the runtime
//! dispatcher and the API checker key on.
//!
//! ## Grammar
//!
//! - Functions: `[suspend ]fun name(P1, P2): R`
//! - Properties: `val name: T` or `var name: T`
//!
//! Signatures order lexicographically; that order is the member order
//! everywhere a list of members is produced.

use std::borrow::Borrow;

use serde::Deserialize;
use serde::Serialize;

use crate::error::Result;
use crate::types::TypeRef;

/// The canonical text of a single member.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature(String);

impl Signature {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Wraps text that is already canonical, such as a line from a dump.
    pub(crate) fn from_canonical(text: String) -> Self {
        Self(text)
    }
}

impl Borrow<str> for Signature {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Signature {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<str> for Signature {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Signature {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// How a member is invoked across the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemberKind {
    Method,
    SuspendingMethod,
    ValProperty,
    VarProperty,
}

impl MemberKind {
    /// Recovers the kind from the leading keyword of a canonical signature.
    pub fn of_signature(signature: &str) -> Option<Self> {
        if signature.starts_with("suspend fun ") {
            Some(Self::SuspendingMethod)
        } else if signature.starts_with("fun ") {
            Some(Self::Method)
        } else if signature.starts_with("val ") {
            Some(Self::ValProperty)
        } else if signature.starts_with("var ") {
            Some(Self::VarProperty)
        } else {
            None
        }
    }

    pub fn is_suspending(self) -> bool {
        matches!(self, Self::SuspendingMethod)
    }
}

/// A function member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDecl {
    pub name: String,
    pub suspending: bool,
    pub params: Vec<TypeRef>,
    pub returns: TypeRef,
}

impl FunctionDecl {
    pub fn new(name: impl Into<String>, returns: TypeRef) -> Self {
        Self { name: name.into(), suspending: false, params: Vec::new(), returns }
    }

    pub fn suspending(mut self) -> Self {
        self.suspending = true;
        self
    }

    pub fn param(mut self, ty: TypeRef) -> Self {
        self.params.push(ty);
        self
    }
}

/// A property member. Mutable properties render as `var`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDecl {
    pub name: String,
    pub mutable: bool,
    pub ty: TypeRef,
}

impl PropertyDecl {
    pub fn val(name: impl Into<String>, ty: TypeRef) -> Self {
        Self { name: name.into(), mutable: false, ty }
    }

    pub fn var(name: impl Into<String>, ty: TypeRef) -> Self {
        Self { name: name.into(), mutable: true, ty }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Member {
    Function(FunctionDecl),
    Property(PropertyDecl),
}

impl Member {
    pub fn name(&self) -> &str {
        match self {
            Self::Function(f) => &f.name,
            Self::Property(p) => &p.name,
        }
    }

    pub fn kind(&self) -> MemberKind {
        match self {
            Self::Function(f) if f.suspending => MemberKind::SuspendingMethod,
            Self::Function(_) => MemberKind::Method,
            Self::Property(p) if p.mutable => MemberKind::VarProperty,
            Self::Property(_) => MemberKind::ValProperty,
        }
    }

    pub fn signature(&self) -> Result<Signature> {
        signature_of(self)
    }
}

impl From<FunctionDecl> for Member {
    fn from(f: FunctionDecl) -> Self {
        Self::Function(f)
    }
}

impl From<PropertyDecl> for Member {
    fn from(p: PropertyDecl) -> Self {
        Self::Property(p)
    }
}

/// Renders the canonical signature of a member.
///
/// Fails with `Error::UnresolvedType` if any referenced type is unresolved.
pub fn signature_of(member: &Member) -> Result<Signature> {
    let mut out = String::new();

    match member {
        Member::Function(f) => {
            if f.suspending {
                out.push_str("suspend ");
            }
            out.push_str("fun ");
            out.push_str(&f.name);
            out.push('(');
            for (i, param) in f.params.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                param.render_into(&f.name, &mut out)?;
            }
            out.push_str("): ");
            f.returns.render_into(&f.name, &mut out)?;
        }
        Member::Property(p) => {
            out.push_str(if p.mutable { "var " } else { "val " });
            out.push_str(&p.name);
            out.push_str(": ");
            p.ty.render_into(&p.name, &mut out)?;
        }
    }

    Ok(Signature(out))
}
