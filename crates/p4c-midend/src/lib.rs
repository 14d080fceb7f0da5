//! P4 compiler middle-end.
//!
//! Takes a type-checked program tree and runs it through sequences of
//! tree-to-tree passes that inline controls and actions, hoist complex
//! table keys into temporaries and clean up what those rewrites leave
//! behind, ending with the elaborated [`ToplevelBlock`] a backend consumes.
//!
//! # Architecture
//!
//! - [`pass`]: the [`Pass`] trait, [`PassManager`] and [`PassContext`]
//! - [`hooks`]: per-pass instrumentation
//! - [`method_instance`]: classification of calls and constructor calls
//! - [`evaluator`]: the toplevel block
//! - [`rename`], [`hoist`]: building blocks shared by rewrite passes
//! - [`inline`]: control and action inlining
//! - [`simplify_key`]: table key simplification
//! - [`passes`]: supporting cleanups
//! - [`midend`]: the canonical pipelines
//! - [`options`], [`error`]: configuration and fatal errors

pub mod error;
pub mod evaluator;
pub mod hoist;
pub mod hooks;
pub mod inline;
pub mod method_instance;
pub mod midend;
pub mod options;
pub mod pass;
pub mod passes;
pub mod rename;
pub mod simplify_key;

pub use error::{ClassificationError, ConfigError, MidendError};
pub use evaluator::{BlockKind, Evaluator, InstanceBlock, ToplevelBlock};
pub use hooks::{DebugHook, DumpHook, JsonLinesHook, PassDump, PassPoint, TracingHook};
pub use method_instance::{BuiltIn, ConstructorCall, MethodInstance};
pub use midend::MidEnd;
pub use options::{Dialect, MidEndOptions};
pub use pass::{Pass, PassContext, PassManager, PipelineState, SideTables, TypeChecking};
pub use simplify_key::{KeyIsComplex, NonLeftValue, SimplifyKey};
