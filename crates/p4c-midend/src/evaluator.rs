//! Static elaboration of the instantiation graph.
//!
//! The [`Evaluator`] walks the toplevel instances (`main` and any others)
//! and the constructor arguments they are built from, producing a
//! [`ToplevelBlock`]: one [`InstanceBlock`] per instance, with the instances
//! it was given and the ones declared inside it as children.

use std::rc::Rc;

use p4c_ir::{Declaration, DeclarationKind, Expression, ExpressionKind, NodeId, Program};
use p4c_typeck::{DeclRef, RefMap, TypeMap};

use crate::error::MidendError;
use crate::method_instance::ConstructorCall;
use crate::pass::{Pass, PassContext, SideTables};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Package,
    Control,
    Extern,
}

#[derive(Debug, Clone)]
pub struct InstanceBlock {
    /// The instance name, or the constructor parameter it was passed as.
    pub name: String,
    pub kind: BlockKind,
    /// The package, control or extern declaration instantiated.
    pub type_decl: Rc<Declaration>,
    /// Constructor arguments that are instances, in parameter order.
    pub arguments: Vec<InstanceBlock>,
    /// Instances declared among a control's locals.
    pub locals: Vec<InstanceBlock>,
}

impl InstanceBlock {
    /// Depth-first walk over this block and everything below it.
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a InstanceBlock)) {
        f(self);
        for child in self.arguments.iter().chain(&self.locals) {
            child.walk(f);
        }
    }
}

/// The elaborated program handed to a backend.
#[derive(Debug, Clone)]
pub struct ToplevelBlock {
    program: Rc<Program>,
    instances: Vec<InstanceBlock>,
}

impl ToplevelBlock {
    pub fn program(&self) -> &Rc<Program> {
        &self.program
    }

    pub fn instances(&self) -> &[InstanceBlock] {
        &self.instances
    }

    /// The toplevel instance called `main`, if the program has one.
    pub fn get_main(&self) -> Option<&InstanceBlock> {
        self.instances.iter().find(|b| b.name == "main")
    }
}

/// Builds the [`ToplevelBlock`] and stores it in the context. The tree is
/// returned unchanged.
#[derive(Debug, Default)]
pub struct Evaluator;

impl Pass for Evaluator {
    fn name(&self) -> &str {
        "Evaluator"
    }

    fn requires(&self) -> SideTables {
        SideTables::REFS | SideTables::TYPES
    }

    fn invalidates(&self) -> SideTables {
        SideTables::empty()
    }

    fn run(
        &mut self,
        program: Rc<Program>,
        ctx: &mut PassContext,
    ) -> Result<Rc<Program>, MidendError> {
        let mut elaborator = Elaborator {
            refs: &ctx.refs,
            types: &ctx.types,
            stack: Vec::new(),
        };
        let mut instances = Vec::new();
        for decl in &program.declarations {
            if let DeclarationKind::Instance { args, .. } = &decl.kind {
                if let Some(block) = elaborator.instance(decl, args)? {
                    instances.push(block);
                }
            }
        }
        tracing::debug!(instances = instances.len(), "elaborated toplevel");
        ctx.toplevel = Some(ToplevelBlock {
            program: program.clone(),
            instances,
        });
        Ok(program)
    }
}

struct Elaborator<'a> {
    refs: &'a RefMap,
    types: &'a TypeMap,
    /// Control declarations being elaborated, to stop self-instantiation.
    stack: Vec<NodeId>,
}

impl Elaborator<'_> {
    fn instance(
        &mut self,
        decl: &Rc<Declaration>,
        args: &[Rc<Expression>],
    ) -> Result<Option<InstanceBlock>, MidendError> {
        let Some(type_decl) = self
            .refs
            .get_declaration(decl.id)
            .and_then(DeclRef::as_declaration)
            .cloned()
        else {
            return Ok(None);
        };
        self.block(decl.name.clone(), type_decl, args).map(Some)
    }

    fn block(
        &mut self,
        name: String,
        type_decl: Rc<Declaration>,
        args: &[Rc<Expression>],
    ) -> Result<InstanceBlock, MidendError> {
        let kind = match &type_decl.kind {
            DeclarationKind::Package { .. } => BlockKind::Package,
            DeclarationKind::Control(_) => BlockKind::Control,
            DeclarationKind::Extern(_) => BlockKind::Extern,
            _ => {
                return Err(MidendError::Internal {
                    pass: "Evaluator".into(),
                    message: format!("`{name}` instantiates `{}`", type_decl.name),
                })
            }
        };
        if self.stack.contains(&type_decl.id) {
            return Err(MidendError::Internal {
                pass: "Evaluator".into(),
                message: format!("`{}` instantiates itself", type_decl.name),
            });
        }

        let param_names: Vec<String> = match &type_decl.kind {
            DeclarationKind::Package { params, .. } => {
                params.iter().map(|p| p.name.clone()).collect()
            }
            DeclarationKind::Control(control) => {
                control.ctor_params.iter().map(|p| p.name.clone()).collect()
            }
            _ => Vec::new(),
        };

        self.stack.push(type_decl.id);
        let mut arguments = Vec::new();
        for (i, arg) in args.iter().enumerate() {
            let arg_name = param_names
                .get(i)
                .cloned()
                .unwrap_or_else(|| format!("arg{i}"));
            if let Some(block) = self.argument(arg_name, arg)? {
                arguments.push(block);
            }
        }
        let mut locals = Vec::new();
        if let Some(control) = type_decl.as_control() {
            for local in &control.locals {
                if let DeclarationKind::Instance { args, .. } = &local.kind {
                    if let Some(block) = self.instance(local, args)? {
                        locals.push(block);
                    }
                }
            }
        }
        self.stack.pop();

        Ok(InstanceBlock {
            name,
            kind,
            type_decl,
            arguments,
            locals,
        })
    }

    /// A constructor argument: a nested constructor call, or a reference to
    /// another instance. Plain values produce no block.
    fn argument(
        &mut self,
        name: String,
        arg: &Rc<Expression>,
    ) -> Result<Option<InstanceBlock>, MidendError> {
        match &arg.kind {
            ExpressionKind::ConstructorCall { args, .. } => {
                let call = ConstructorCall::resolve(arg, self.refs, self.types)?;
                self.block(name, call.target().clone(), args).map(Some)
            }
            ExpressionKind::Path(_) => {
                let target = self
                    .refs
                    .get_declaration(arg.id)
                    .and_then(DeclRef::as_declaration)
                    .cloned();
                match target {
                    Some(decl) => match &decl.kind {
                        DeclarationKind::Instance { args, .. } => self.instance(&decl, args),
                        _ => Ok(None),
                    },
                    None => Ok(None),
                }
            }
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::MidEndOptions;
    use p4c_common::SourceMap;
    use p4c_ir::{Block, Direction, Parameter, Type};

    fn program() -> Rc<Program> {
        let counter = Declaration::extern_type("counter", vec![], vec![], vec![]);
        let ingress = Declaration::control(
            "ingress",
            vec![],
            vec![Declaration::instance("c", Type::named("counter"), vec![])],
            Block::empty(),
        );
        let pipe = Declaration::package(
            "Pipe",
            vec![],
            vec![Parameter::new(Direction::None, Type::named("ingress"), "ig")],
        );
        let main = Declaration::instance(
            "main",
            Type::named("Pipe"),
            vec![Expression::constructor(Type::named("ingress"), vec![])],
        );
        Program::new(vec![counter, ingress, pipe, main])
    }

    #[test]
    fn elaborates_main() {
        let program = program();
        let mut ctx = PassContext::new(SourceMap::new(), MidEndOptions::default());
        ctx.refresh(&program);
        assert!(!ctx.diagnostics.has_errors());

        let out = Evaluator.run(program.clone(), &mut ctx).unwrap();
        assert!(Rc::ptr_eq(&out, &program));

        let toplevel = ctx.toplevel.as_ref().unwrap();
        let main = toplevel.get_main().unwrap();
        assert_eq!(main.kind, BlockKind::Package);
        assert_eq!(main.arguments.len(), 1);

        let ig = &main.arguments[0];
        assert_eq!(ig.name, "ig");
        assert_eq!(ig.kind, BlockKind::Control);
        assert_eq!(ig.locals[0].name, "c");
        assert_eq!(ig.locals[0].kind, BlockKind::Extern);

        let mut names = Vec::new();
        main.walk(&mut |b| names.push(b.name.as_str()));
        assert_eq!(names, vec!["main", "ig", "c"]);
    }

    #[test]
    fn no_main() {
        let program = Program::new(vec![Declaration::extern_type(
            "counter",
            vec![],
            vec![],
            vec![],
        )]);
        let mut ctx = PassContext::new(SourceMap::new(), MidEndOptions::default());
        ctx.refresh(&program);
        Evaluator.run(program, &mut ctx).unwrap();
        assert!(ctx.toplevel.as_ref().unwrap().get_main().is_none());
    }
}
