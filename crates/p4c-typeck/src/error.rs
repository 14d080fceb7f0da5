//! Semantic errors found while deriving the side tables.
//!
//! Each error has a stable code and converts into a [`Diagnostic`] so it can
//! be accumulated next to the errors reported by the passes.

use std::fmt;

use p4c_common::{Diagnostic, SourceInfo};

use crate::ty::Ty;

#[derive(Clone, Debug)]
pub enum TypeError {
    /// A name that no enclosing scope declares.
    UnresolvedName {
        name: String,
        span: Option<SourceInfo>,
    },
    /// Two declarations of the same name in one scope.
    DuplicateDeclaration {
        name: String,
        span: Option<SourceInfo>,
        previous: Option<SourceInfo>,
    },
    /// `if` condition that is not `bool`.
    NonBooleanCondition { found: Ty, span: Option<SourceInfo> },
    /// Call with the wrong number of arguments.
    ArgumentCount {
        callee: String,
        expected: usize,
        found: usize,
        span: Option<SourceInfo>,
    },
    /// Call of something that is not a method, function or action.
    NotCallable { ty: Ty, span: Option<SourceInfo> },
    /// Member access on a type without such a member.
    UnknownMember {
        ty: Ty,
        member: String,
        span: Option<SourceInfo>,
    },
    /// Assignment target, or `out`/`inout` argument, that cannot be written.
    NotLeftValue { span: Option<SourceInfo> },
    /// A type name that does not name a type.
    UnknownType {
        name: String,
        span: Option<SourceInfo>,
    },
    /// A value of the wrong type.
    Mismatch {
        expected: Ty,
        found: Ty,
        span: Option<SourceInfo>,
    },
}

impl TypeError {
    pub fn code(&self) -> &'static str {
        match self {
            TypeError::UnresolvedName { .. } => "E0001",
            TypeError::DuplicateDeclaration { .. } => "E0002",
            TypeError::NonBooleanCondition { .. } => "E0003",
            TypeError::ArgumentCount { .. } => "E0004",
            TypeError::NotCallable { .. } => "E0005",
            TypeError::UnknownMember { .. } => "E0006",
            TypeError::NotLeftValue { .. } => "E0007",
            TypeError::UnknownType { .. } => "E0008",
            TypeError::Mismatch { .. } => "E0009",
        }
    }

    pub fn span(&self) -> Option<SourceInfo> {
        match self {
            TypeError::UnresolvedName { span, .. }
            | TypeError::DuplicateDeclaration { span, .. }
            | TypeError::NonBooleanCondition { span, .. }
            | TypeError::ArgumentCount { span, .. }
            | TypeError::NotCallable { span, .. }
            | TypeError::UnknownMember { span, .. }
            | TypeError::NotLeftValue { span }
            | TypeError::UnknownType { span, .. }
            | TypeError::Mismatch { span, .. } => *span,
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        let diagnostic = Diagnostic::error(self.code(), self.to_string()).with_span(self.span());
        match self {
            TypeError::UnresolvedName { .. } => diagnostic.with_label("not found in this scope"),
            TypeError::DuplicateDeclaration { previous, .. } => {
                let diagnostic = diagnostic.with_label("declared again here");
                match previous {
                    Some(previous) => {
                        diagnostic.with_help(format!("previous declaration at {previous}"))
                    }
                    None => diagnostic,
                }
            }
            TypeError::NonBooleanCondition { .. } => diagnostic.with_label("expected `bool`"),
            TypeError::NotLeftValue { .. } => diagnostic.with_label("cannot be assigned"),
            _ => diagnostic,
        }
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeError::UnresolvedName { name, .. } => write!(f, "unresolved name `{name}`"),
            TypeError::DuplicateDeclaration { name, .. } => {
                write!(f, "`{name}` is declared twice in the same scope")
            }
            TypeError::NonBooleanCondition { found, .. } => {
                write!(f, "condition must be `bool`, found `{found}`")
            }
            TypeError::ArgumentCount {
                callee,
                expected,
                found,
                ..
            } => write!(
                f,
                "`{callee}` expects {expected} arguments, found {found}"
            ),
            TypeError::NotCallable { ty, .. } => write!(f, "`{ty}` cannot be called"),
            TypeError::UnknownMember { ty, member, .. } => {
                write!(f, "`{ty}` has no member `{member}`")
            }
            TypeError::NotLeftValue { .. } => write!(f, "expression is not a left-value"),
            TypeError::UnknownType { name, .. } => write!(f, "`{name}` does not name a type"),
            TypeError::Mismatch {
                expected, found, ..
            } => write!(f, "type mismatch: expected `{expected}`, found `{found}`"),
        }
    }
}
