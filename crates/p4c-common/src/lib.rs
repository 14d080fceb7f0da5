//! Shared types for the P4 middle-end.
//!
//! - [`span`]: source positions attached to tree nodes
//! - [`source`]: the table of input sources, distinguishing library files
//!   (architecture models) from user code
//! - [`diagnostic`]: the diagnostic accumulator that replaces a process-wide
//!   error counter, plus ariadne rendering
//! - [`graph`]: a named dependency graph with cycle detection, used to order
//!   inlining work

pub mod diagnostic;
pub mod graph;
pub mod source;
pub mod span;

pub use diagnostic::{Diagnostic, DiagnosticOptions, Diagnostics, Severity};
pub use source::{SourceFile, SourceMap};
pub use span::{SourceId, SourceInfo};
