//! Program tree for the P4 middle-end.
//!
//! The tree is immutable and shared through `Rc`: a rewrite never mutates a
//! node, it builds a new one and reuses every untouched child by pointer.
//! Each syntactic category is a closed sum type.
//!
//! # Architecture
//!
//! - [`id`]: node identities, the keys of the side tables
//! - [`ty`]: syntactic types
//! - [`expr`], [`stmt`], [`decl`]: expressions, statements, declarations
//! - [`visit`]: read-only traversal
//! - [`transform`]: rebuilding traversal with pre/post-order hooks
//! - [`names`]: collision-free fresh names
//! - [`print`]: P4-syntax printer used for dumps and tests

pub mod decl;
pub mod expr;
pub mod id;
pub mod names;
pub mod print;
pub mod stmt;
pub mod transform;
pub mod ty;
pub mod visit;

pub use decl::{
    Action, Control, Declaration, DeclarationKind, Direction, ExternType, Field, KeyElement,
    Method, Parameter, Program, Table,
};
pub use expr::{BinaryOp, Expression, ExpressionKind, UnaryOp};
pub use id::NodeId;
pub use names::NameGenerator;
pub use stmt::{Block, Statement, StatementKind, SwitchCase, SwitchLabel};
pub use ty::Type;
