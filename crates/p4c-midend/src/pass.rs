//! Passes and the pass manager.
//!
//! A pipeline is an ordered list of [`Pass`]es run over one program. All
//! state shared between passes lives in the [`PassContext`]: the diagnostic
//! accumulator, the reference and type side tables, and which of those
//! tables no longer describe the current tree.
//!
//! Staleness is tracked, not assumed. When a pass returns a tree that is
//! not pointer-equal to its input, the tables it declares in
//! [`Pass::invalidates`] are marked stale; a later pass that
//! [requires](Pass::requires) a stale table is refused with
//! [`MidendError::StaleSideTables`]. The [`TypeChecking`] pass re-derives
//! both tables and clears the marks.

use std::rc::Rc;

use bitflags::bitflags;
use p4c_common::{Diagnostics, SourceMap};
use p4c_ir::Program;
use p4c_typeck::{RefMap, Typeck, TypeMap};

use crate::error::MidendError;
use crate::evaluator::ToplevelBlock;
use crate::hooks::{DebugHook, PassPoint};
use crate::options::MidEndOptions;

bitflags! {
    /// The side tables derived from the tree.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SideTables: u8 {
        /// Node -> declaration.
        const REFS = 0b01;
        /// Node -> type, left values, call bindings.
        const TYPES = 0b10;
    }
}

/// Everything a pass may read or update besides the tree.
pub struct PassContext {
    pub diagnostics: Diagnostics,
    pub refs: RefMap,
    pub types: TypeMap,
    /// Tables that no longer match the current tree.
    pub stale: SideTables,
    pub sources: SourceMap,
    /// Set by the [`Evaluator`](crate::evaluator::Evaluator).
    pub toplevel: Option<ToplevelBlock>,
    pub options: MidEndOptions,
}

impl PassContext {
    /// A context whose side tables have not been derived yet.
    pub fn new(sources: SourceMap, options: MidEndOptions) -> Self {
        PassContext {
            diagnostics: Diagnostics::new(),
            refs: RefMap::new(),
            types: TypeMap::new(),
            stale: SideTables::all(),
            sources,
            toplevel: None,
            options,
        }
    }

    /// Re-derive both side tables from `program`, reporting any semantic
    /// errors found on the way.
    pub fn refresh(&mut self, program: &Program) {
        let Typeck {
            refs,
            types,
            errors,
        } = p4c_typeck::check(program);
        self.diagnostics
            .extend(errors.iter().map(p4c_typeck::TypeError::to_diagnostic));
        self.refs = refs;
        self.types = types;
        self.stale = SideTables::empty();
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics.error_count()
    }
}

/// One tree-to-tree transformation.
pub trait Pass {
    fn name(&self) -> &str;

    /// Side tables this pass reads; they must be fresh when it starts.
    fn requires(&self) -> SideTables {
        SideTables::empty()
    }

    /// Side tables made stale when this pass changes the tree.
    fn invalidates(&self) -> SideTables {
        SideTables::all()
    }

    fn run(&mut self, program: Rc<Program>, ctx: &mut PassContext)
        -> Result<Rc<Program>, MidendError>;
}

/// Re-derives the side tables. Put one after every pass that changes
/// type-relevant structure.
#[derive(Debug, Default)]
pub struct TypeChecking;

impl Pass for TypeChecking {
    fn name(&self) -> &str {
        "TypeChecking"
    }

    fn run(
        &mut self,
        program: Rc<Program>,
        ctx: &mut PassContext,
    ) -> Result<Rc<Program>, MidendError> {
        ctx.refresh(&program);
        Ok(program)
    }
}

// ── Pass manager ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Ready,
    /// Index of the pass being run.
    Running(usize),
    Aborted,
    Completed,
}

pub struct PassManager {
    name: String,
    passes: Vec<Box<dyn Pass>>,
    hooks: Vec<Rc<dyn DebugHook>>,
    state: PipelineState,
}

impl PassManager {
    pub fn new(name: impl Into<String>) -> Self {
        PassManager {
            name: name.into(),
            passes: Vec::new(),
            hooks: Vec::new(),
            state: PipelineState::Ready,
        }
    }

    /// Append a pass.
    pub fn with(mut self, pass: impl Pass + 'static) -> Self {
        self.passes.push(Box::new(pass));
        self
    }

    pub fn push(&mut self, pass: Box<dyn Pass>) {
        self.passes.push(pass);
    }

    pub fn add_debug_hook(&mut self, hook: Rc<dyn DebugHook>) {
        self.hooks.push(hook);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn pass_names(&self) -> Vec<&str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    /// Run every pass in order.
    ///
    /// `Ok(None)` means the pipeline stopped at a pass boundary because
    /// semantic errors were reported; the caller must not go on with the
    /// program. `Err` is a fatal error raised by a pass.
    #[tracing::instrument(skip(self, program, ctx), fields(pipeline = %self.name))]
    pub fn apply(
        &mut self,
        program: Rc<Program>,
        ctx: &mut PassContext,
    ) -> Result<Option<Rc<Program>>, MidendError> {
        self.state = PipelineState::Ready;
        if ctx.diagnostics.has_errors() {
            tracing::warn!(
                errors = ctx.error_count(),
                "errors reported before the pipeline started"
            );
            self.state = PipelineState::Aborted;
            return Ok(None);
        }

        let mut program = program;
        for (index, pass) in self.passes.iter_mut().enumerate() {
            self.state = PipelineState::Running(index);

            let stale = pass.requires() & ctx.stale;
            if !stale.is_empty() {
                self.state = PipelineState::Aborted;
                return Err(MidendError::StaleSideTables {
                    pass: pass.name().to_string(),
                    stale,
                });
            }

            for hook in &self.hooks {
                hook.on_pass(&self.name, pass.name(), PassPoint::Before, &program);
            }
            tracing::debug!(pass = pass.name(), "running pass");

            let result = match pass.run(program.clone(), ctx) {
                Ok(result) => result,
                Err(err) => {
                    self.state = PipelineState::Aborted;
                    return Err(err);
                }
            };
            if !Rc::ptr_eq(&result, &program) {
                tracing::trace!(pass = pass.name(), "tree changed");
                ctx.stale |= pass.invalidates();
            }
            program = result;

            for hook in &self.hooks {
                hook.on_pass(&self.name, pass.name(), PassPoint::After, &program);
            }

            if ctx.diagnostics.has_errors() {
                tracing::warn!(
                    pass = pass.name(),
                    errors = ctx.error_count(),
                    "aborting pipeline"
                );
                self.state = PipelineState::Aborted;
                return Ok(None);
            }
        }

        self.state = PipelineState::Completed;
        Ok(Some(program))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use p4c_common::Diagnostic;
    use p4c_ir::{Declaration, Field, Type};

    fn program() -> Rc<Program> {
        Program::new(vec![Declaration::header(
            "h_t",
            vec![Field::new(Type::bits(8), "f")],
        )])
    }

    fn ctx() -> PassContext {
        PassContext::new(SourceMap::new(), MidEndOptions::default())
    }

    /// Rebuilds the program without changing it.
    struct Rebuild;

    impl Pass for Rebuild {
        fn name(&self) -> &str {
            "Rebuild"
        }

        fn run(
            &mut self,
            program: Rc<Program>,
            _ctx: &mut PassContext,
        ) -> Result<Rc<Program>, MidendError> {
            Ok(Program::new(program.declarations.clone()))
        }
    }

    struct NeedsRefs;

    impl Pass for NeedsRefs {
        fn name(&self) -> &str {
            "NeedsRefs"
        }

        fn requires(&self) -> SideTables {
            SideTables::REFS
        }

        fn run(
            &mut self,
            program: Rc<Program>,
            _ctx: &mut PassContext,
        ) -> Result<Rc<Program>, MidendError> {
            Ok(program)
        }
    }

    struct Fails;

    impl Pass for Fails {
        fn name(&self) -> &str {
            "Fails"
        }

        fn run(
            &mut self,
            program: Rc<Program>,
            ctx: &mut PassContext,
        ) -> Result<Rc<Program>, MidendError> {
            ctx.diagnostics.report(Diagnostic::error("E0100", "broken"));
            Ok(program)
        }
    }

    #[test]
    fn completes_and_tracks_state() {
        let mut ctx = ctx();
        let mut pm = PassManager::new("test")
            .with(TypeChecking)
            .with(NeedsRefs);
        assert_eq!(pm.state(), PipelineState::Ready);
        let out = pm.apply(program(), &mut ctx).unwrap();
        assert!(out.is_some());
        assert_eq!(pm.state(), PipelineState::Completed);
        assert!(ctx.stale.is_empty());
    }

    #[test]
    fn refuses_stale_requirements() {
        let mut ctx = ctx();
        let mut pm = PassManager::new("test")
            .with(TypeChecking)
            .with(Rebuild)
            .with(NeedsRefs);
        let err = pm.apply(program(), &mut ctx).unwrap_err();
        assert!(matches!(
            err,
            MidendError::StaleSideTables { ref pass, stale }
                if pass == "NeedsRefs" && stale == SideTables::REFS
        ));
        assert_eq!(pm.state(), PipelineState::Aborted);
    }

    #[test]
    fn aborts_at_the_next_boundary() {
        let mut ctx = ctx();
        let mut pm = PassManager::new("test")
            .with(Fails)
            .with(TypeChecking);
        assert!(pm.apply(program(), &mut ctx).unwrap().is_none());
        assert_eq!(pm.state(), PipelineState::Aborted);
        assert_eq!(ctx.error_count(), 1);

        // Errors from an earlier pipeline keep later ones from running.
        let mut next = PassManager::new("next").with(TypeChecking);
        assert!(next.apply(program(), &mut ctx).unwrap().is_none());
        assert_eq!(next.state(), PipelineState::Aborted);
    }
}
