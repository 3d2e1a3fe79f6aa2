//! # Type References
//!
//! The resolved shape of a type as it appears in a member declaration.
//!
//! ## Rendering
//!
//! - **Classes** render as their fully-qualified name.
//! - **Aliases** render as the alias name, never the expansion. Retargeting an
//!   alias to a different backing type is not a signature change.
//! - **Arguments** render as `<A,B>` with no spaces; `in ` / `out ` prefixes
//!   for declared variance and `*` for star projections, whatever their bound.

use crate::error::Error;
use crate::error::Result;

/// Declared variance of a generic argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variance {
    Invariant,
    In,
    Out,
}

impl Variance {
    fn prefix(self) -> &'static str {
        match self {
            Variance::Invariant => "",
            Variance::In => "in ",
            Variance::Out => "out ",
        }
    }
}

/// A type as written at a use site, after name resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    /// A class-like symbol with its fully-qualified name.
    Class { name: String, args: Vec<TypeArg> },
    /// A type alias used by name. The expansion is kept for tooling but never rendered.
    Alias { name: String, args: Vec<TypeArg>, expansion: Box<TypeRef> },
    /// Name resolution failed for this reference.
    Unresolved(String),
}

/// One argument of a generic type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeArg {
    Star { bound: Option<Box<TypeRef>> },
    Projection { variance: Variance, ty: TypeRef },
}

impl TypeRef {
    pub fn class(name: impl Into<String>) -> Self {
        Self::Class { name: name.into(), args: Vec::new() }
    }

    pub fn generic(name: impl Into<String>, args: impl IntoIterator<Item = TypeArg>) -> Self {
        Self::Class { name: name.into(), args: args.into_iter().collect() }
    }

    pub fn alias(name: impl Into<String>, expansion: TypeRef) -> Self {
        Self::Alias { name: name.into(), args: Vec::new(), expansion: Box::new(expansion) }
    }

    pub fn unresolved(text: impl Into<String>) -> Self {
        Self::Unresolved(text.into())
    }

    /// Appends generic arguments to a class or alias reference.
    pub fn with_args(mut self, extra: impl IntoIterator<Item = TypeArg>) -> Self {
        match &mut self {
            Self::Class { args, .. } | Self::Alias { args, .. } => args.extend(extra),
            Self::Unresolved(_) => {}
        }
        self
    }

    /// Renders the canonical text for this type.
    ///
    /// `member` names the declaration being rendered and is only used for errors.
    pub fn render(&self, member: &str) -> Result<String> {
        let mut out = String::new();
        self.render_into(member, &mut out)?;
        Ok(out)
    }

    pub(crate) fn render_into(&self, member: &str, out: &mut String) -> Result<()> {
        let (name, args) = match self {
            Self::Class { name, args } | Self::Alias { name, args, .. } => (name, args),
            Self::Unresolved(text) => {
                return Err(Error::UnresolvedType { member: member.to_string(), ty: text.clone() });
            }
        };

        if name.is_empty() {
            return Err(Error::UnresolvedType { member: member.to_string(), ty: String::new() });
        }
        out.push_str(name);

        if args.is_empty() {
            return Ok(());
        }

        out.push('<');
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            arg.render_into(member, out)?;
        }
        out.push('>');
        Ok(())
    }
}

impl TypeArg {
    pub fn star() -> Self {
        Self::Star { bound: None }
    }

    pub fn bounded_star(bound: TypeRef) -> Self {
        Self::Star { bound: Some(Box::new(bound)) }
    }

    pub fn invariant(ty: TypeRef) -> Self {
        Self::Projection { variance: Variance::Invariant, ty }
    }

    pub fn covariant(ty: TypeRef) -> Self {
        Self::Projection { variance: Variance::Out, ty }
    }

    pub fn contravariant(ty: TypeRef) -> Self {
        Self::Projection { variance: Variance::In, ty }
    }

    fn render_into(&self, member: &str, out: &mut String) -> Result<()> {
        match self {
            Self::Star { .. } => {
                out.push('*');
                Ok(())
            }
            Self::Projection { variance, ty } => {
                out.push_str(variance.prefix());
                ty.render_into(member, out)
            }
        }
    }
}
