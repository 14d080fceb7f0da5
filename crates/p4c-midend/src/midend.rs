//! The canonical pipelines.
//!
//! Legacy programs run `V1MidEnd`. Current programs run `Simplify`, then,
//! once the evaluator has found a `main`, the full `MidEnd`. Both finish
//! with `Backend`, whose evaluator produces the [`ToplevelBlock`] handed to
//! code generation.

use std::rc::Rc;

use p4c_ir::Program;

use crate::error::MidendError;
use crate::evaluator::{Evaluator, ToplevelBlock};
use crate::hooks::{DebugHook, TracingHook};
use crate::inline::{inline_actions, inline_controls, GeneralInliner, SimpleControlsInliner};
use crate::options::Dialect;
use crate::pass::{PassContext, PassManager, TypeChecking};
use crate::passes::{
    ConstantFolding, MoveActionsToTables, MoveDeclarations, RemoveAllUnusedDeclarations,
    RemoveReturns, SimplifyControlFlow, StrengthReduction, SynthesizeActions, UniqueNames,
};
use crate::simplify_key::{NonLeftValue, SimplifyKey};

pub fn v1_midend() -> PassManager {
    let (discover, driver) = inline_controls(SimpleControlsInliner);
    let (discover_actions, actions_driver) = inline_actions();
    PassManager::new("V1MidEnd")
        .with(TypeChecking)
        .with(RemoveReturns)
        .with(TypeChecking)
        .with(Evaluator)
        .with(discover)
        .with(driver)
        .with(RemoveAllUnusedDeclarations)
        .with(TypeChecking)
        .with(discover_actions)
        .with(actions_driver)
        .with(RemoveAllUnusedDeclarations)
}

pub fn simplify() -> PassManager {
    PassManager::new("Simplify")
        .with(TypeChecking)
        .with(UniqueNames)
        .with(MoveDeclarations)
        .with(TypeChecking)
        .with(RemoveReturns)
        .with(TypeChecking)
        .with(RemoveAllUnusedDeclarations)
        .with(TypeChecking)
        .with(Evaluator)
}

pub fn midend() -> PassManager {
    let (discover, driver) = inline_controls(GeneralInliner);
    let (discover_actions, actions_driver) = inline_actions();
    PassManager::new("MidEnd")
        .with(discover)
        .with(driver)
        .with(RemoveAllUnusedDeclarations)
        .with(TypeChecking)
        .with(discover_actions)
        .with(actions_driver)
        .with(RemoveAllUnusedDeclarations)
        .with(TypeChecking)
        .with(SimplifyControlFlow)
        .with(TypeChecking)
        .with(SimplifyKey::new(NonLeftValue))
        .with(TypeChecking)
        .with(SimplifyControlFlow)
        .with(ConstantFolding)
        .with(StrengthReduction)
        .with(TypeChecking)
        .with(MoveDeclarations)
        .with(TypeChecking)
        .with(SynthesizeActions)
        .with(TypeChecking)
        .with(MoveActionsToTables)
        .with(TypeChecking)
}

pub fn backend() -> PassManager {
    PassManager::new("Backend")
        .with(TypeChecking)
        .with(SimplifyControlFlow)
        .with(TypeChecking)
        .with(ConstantFolding)
        .with(TypeChecking)
        .with(Evaluator)
}

/// Runs the pipelines for one program.
#[derive(Default)]
pub struct MidEnd {
    hooks: Vec<Rc<dyn DebugHook>>,
}

impl MidEnd {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `hook` to every pipeline this middle-end runs.
    pub fn add_debug_hook(&mut self, hook: Rc<dyn DebugHook>) {
        self.hooks.push(hook);
    }

    /// `Ok(None)` when semantic errors stopped a pipeline or the program
    /// has no `main`; the diagnostics are in `ctx`.
    #[tracing::instrument(skip_all, fields(dialect = ?ctx.options.dialect))]
    pub fn process(
        &self,
        program: Rc<Program>,
        ctx: &mut PassContext,
    ) -> Result<Option<ToplevelBlock>, MidendError> {
        let program = match ctx.options.dialect {
            Dialect::Legacy => {
                let Some(program) = self.run(v1_midend(), program, ctx)? else {
                    return Ok(None);
                };
                if !has_main(ctx) {
                    return Ok(None);
                }
                program
            }
            Dialect::Current => {
                let Some(program) = self.run(simplify(), program, ctx)? else {
                    return Ok(None);
                };
                if !has_main(ctx) {
                    return Ok(None);
                }
                let Some(program) = self.run(midend(), program, ctx)? else {
                    return Ok(None);
                };
                program
            }
        };
        if self.run(backend(), program, ctx)?.is_none() {
            return Ok(None);
        }
        Ok(ctx.toplevel.take())
    }

    fn run(
        &self,
        mut pipeline: PassManager,
        program: Rc<Program>,
        ctx: &mut PassContext,
    ) -> Result<Option<Rc<Program>>, MidendError> {
        for hook in &self.hooks {
            pipeline.add_debug_hook(hook.clone());
        }
        if ctx.options.dump_passes {
            pipeline.add_debug_hook(Rc::new(TracingHook));
        }
        pipeline.apply(program, ctx)
    }
}

fn has_main(ctx: &PassContext) -> bool {
    let found = ctx
        .toplevel
        .as_ref()
        .and_then(ToplevelBlock::get_main)
        .is_some();
    if !found {
        tracing::warn!("program has no `main` instance, nothing to compile");
    }
    found
}
