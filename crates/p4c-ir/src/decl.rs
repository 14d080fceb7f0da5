//! Declarations and the program root.

use std::fmt;
use std::rc::Rc;

use p4c_common::SourceInfo;

use crate::expr::Expression;
use crate::id::NodeId;
use crate::stmt::Block;
use crate::ty::Type;

/// The root of the tree: toplevel declarations in source order.
#[derive(Debug, Default)]
pub struct Program {
    pub declarations: Vec<Rc<Declaration>>,
}

impl Program {
    pub fn new(declarations: Vec<Rc<Declaration>>) -> Rc<Self> {
        Rc::new(Program { declarations })
    }

    pub fn find(&self, name: &str) -> Option<&Rc<Declaration>> {
        self.declarations.iter().find(|d| d.name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Directionless: bound by the control plane for table actions,
    /// behaves like `in` for a direct call.
    None,
    In,
    Out,
    InOut,
}

impl Direction {
    /// Whether the argument value flows into the callee.
    pub fn copies_in(self) -> bool {
        matches!(self, Direction::None | Direction::In | Direction::InOut)
    }

    /// Whether the parameter value flows back to the argument.
    pub fn copies_out(self) -> bool {
        matches!(self, Direction::Out | Direction::InOut)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::None => Ok(()),
            Direction::In => write!(f, "in "),
            Direction::Out => write!(f, "out "),
            Direction::InOut => write!(f, "inout "),
        }
    }
}

#[derive(Debug)]
pub struct Parameter {
    pub id: NodeId,
    pub name: String,
    pub direction: Direction,
    pub ty: Rc<Type>,
    pub span: Option<SourceInfo>,
}

impl Parameter {
    pub fn new(direction: Direction, ty: Rc<Type>, name: impl Into<String>) -> Rc<Self> {
        Rc::new(Parameter {
            id: NodeId::fresh(),
            name: name.into(),
            direction,
            ty,
            span: None,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub ty: Rc<Type>,
}

impl Field {
    pub fn new(ty: Rc<Type>, name: impl Into<String>) -> Self {
        Field {
            name: name.into(),
            ty,
        }
    }
}

/// A method signature: extern methods, extern constructors, extern functions.
#[derive(Debug)]
pub struct Method {
    pub id: NodeId,
    pub name: String,
    pub type_params: Vec<String>,
    pub params: Vec<Rc<Parameter>>,
    pub return_type: Rc<Type>,
    pub span: Option<SourceInfo>,
}

impl Method {
    pub fn new(
        return_type: Rc<Type>,
        name: impl Into<String>,
        type_params: Vec<String>,
        params: Vec<Rc<Parameter>>,
    ) -> Rc<Self> {
        Rc::new(Method {
            id: NodeId::fresh(),
            name: name.into(),
            type_params,
            params,
            return_type,
            span: None,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ExternType {
    pub type_params: Vec<String>,
    pub constructors: Vec<Rc<Method>>,
    pub methods: Vec<Rc<Method>>,
}

impl ExternType {
    /// The method called `name` taking `arity` arguments.
    pub fn lookup_method(&self, name: &str, arity: usize) -> Option<&Rc<Method>> {
        self.methods
            .iter()
            .find(|m| m.name == name && m.params.len() == arity)
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.methods.iter().any(|m| m.name == name)
    }
}

#[derive(Debug, Clone)]
pub struct Action {
    pub params: Vec<Rc<Parameter>>,
    pub body: Rc<Block>,
}

#[derive(Debug, Clone)]
pub struct KeyElement {
    pub id: NodeId,
    pub expression: Rc<Expression>,
    /// `exact`, `ternary`, `lpm`, ...
    pub match_kind: String,
}

impl KeyElement {
    pub fn new(expression: Rc<Expression>, match_kind: impl Into<String>) -> Self {
        KeyElement {
            id: NodeId::fresh(),
            expression,
            match_kind: match_kind.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Table {
    pub key: Vec<KeyElement>,
    /// Each entry is a path to an action or a call binding some arguments.
    pub actions: Vec<Rc<Expression>>,
    pub default_action: Option<Rc<Expression>>,
}

#[derive(Debug, Clone)]
pub struct Control {
    pub type_params: Vec<String>,
    pub apply_params: Vec<Rc<Parameter>>,
    pub ctor_params: Vec<Rc<Parameter>>,
    pub locals: Vec<Rc<Declaration>>,
    pub body: Rc<Block>,
}

#[derive(Debug)]
pub struct Declaration {
    pub id: NodeId,
    pub name: String,
    pub span: Option<SourceInfo>,
    pub kind: DeclarationKind,
}

#[derive(Debug, Clone)]
pub enum DeclarationKind {
    Header { fields: Vec<Field> },
    Struct { fields: Vec<Field> },
    Extern(ExternType),
    ExternFunction(Rc<Method>),
    Action(Action),
    Table(Table),
    Control(Control),
    /// A package type: the shape `main` is instantiated from.
    Package {
        type_params: Vec<String>,
        params: Vec<Rc<Parameter>>,
    },
    /// `Type(args) name;`
    Instance {
        ty: Rc<Type>,
        args: Vec<Rc<Expression>>,
    },
    Variable {
        ty: Rc<Type>,
        init: Option<Rc<Expression>>,
    },
    Constant {
        ty: Rc<Type>,
        value: Rc<Expression>,
    },
}

impl Declaration {
    pub fn new(name: impl Into<String>, kind: DeclarationKind) -> Rc<Self> {
        Self::with_span(name, kind, None)
    }

    pub fn with_span(
        name: impl Into<String>,
        kind: DeclarationKind,
        span: Option<SourceInfo>,
    ) -> Rc<Self> {
        Rc::new(Declaration {
            id: NodeId::fresh(),
            name: name.into(),
            span,
            kind,
        })
    }

    /// Same declaration (id, name, position) with a different shape.
    pub fn rebuild(&self, kind: DeclarationKind) -> Rc<Self> {
        Rc::new(Declaration {
            id: self.id,
            name: self.name.clone(),
            span: self.span,
            kind,
        })
    }

    /// Same declaration under a new name.
    pub fn renamed(&self, name: impl Into<String>) -> Rc<Self> {
        Rc::new(Declaration {
            id: self.id,
            name: name.into(),
            span: self.span,
            kind: self.kind.clone(),
        })
    }

    pub fn header(name: impl Into<String>, fields: Vec<Field>) -> Rc<Self> {
        Self::new(name, DeclarationKind::Header { fields })
    }

    pub fn structure(name: impl Into<String>, fields: Vec<Field>) -> Rc<Self> {
        Self::new(name, DeclarationKind::Struct { fields })
    }

    pub fn variable(
        name: impl Into<String>,
        ty: Rc<Type>,
        init: Option<Rc<Expression>>,
    ) -> Rc<Self> {
        Self::new(name, DeclarationKind::Variable { ty, init })
    }

    pub fn constant(name: impl Into<String>, ty: Rc<Type>, value: Rc<Expression>) -> Rc<Self> {
        Self::new(name, DeclarationKind::Constant { ty, value })
    }

    pub fn instance(
        name: impl Into<String>,
        ty: Rc<Type>,
        args: Vec<Rc<Expression>>,
    ) -> Rc<Self> {
        Self::new(name, DeclarationKind::Instance { ty, args })
    }

    pub fn action(
        name: impl Into<String>,
        params: Vec<Rc<Parameter>>,
        body: Rc<Block>,
    ) -> Rc<Self> {
        Self::new(name, DeclarationKind::Action(Action { params, body }))
    }

    pub fn table(
        name: impl Into<String>,
        key: Vec<KeyElement>,
        actions: Vec<Rc<Expression>>,
        default_action: Option<Rc<Expression>>,
    ) -> Rc<Self> {
        Self::new(
            name,
            DeclarationKind::Table(Table {
                key,
                actions,
                default_action,
            }),
        )
    }

    pub fn control(
        name: impl Into<String>,
        apply_params: Vec<Rc<Parameter>>,
        locals: Vec<Rc<Declaration>>,
        body: Rc<Block>,
    ) -> Rc<Self> {
        Self::new(
            name,
            DeclarationKind::Control(Control {
                type_params: Vec::new(),
                apply_params,
                ctor_params: Vec::new(),
                locals,
                body,
            }),
        )
    }

    pub fn extern_type(
        name: impl Into<String>,
        type_params: Vec<String>,
        constructors: Vec<Rc<Method>>,
        methods: Vec<Rc<Method>>,
    ) -> Rc<Self> {
        Self::new(
            name,
            DeclarationKind::Extern(ExternType {
                type_params,
                constructors,
                methods,
            }),
        )
    }

    pub fn extern_function(method: Rc<Method>) -> Rc<Self> {
        let name = method.name.clone();
        Self::new(name, DeclarationKind::ExternFunction(method))
    }

    pub fn package(
        name: impl Into<String>,
        type_params: Vec<String>,
        params: Vec<Rc<Parameter>>,
    ) -> Rc<Self> {
        Self::new(
            name,
            DeclarationKind::Package {
                type_params,
                params,
            },
        )
    }

    pub fn as_control(&self) -> Option<&Control> {
        match &self.kind {
            DeclarationKind::Control(control) => Some(control),
            _ => None,
        }
    }

    pub fn as_action(&self) -> Option<&Action> {
        match &self.kind {
            DeclarationKind::Action(action) => Some(action),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&Table> {
        match &self.kind {
            DeclarationKind::Table(table) => Some(table),
            _ => None,
        }
    }

    pub fn as_extern(&self) -> Option<&ExternType> {
        match &self.kind {
            DeclarationKind::Extern(ext) => Some(ext),
            _ => None,
        }
    }

    /// Declarations that name a type rather than a value.
    pub fn is_type(&self) -> bool {
        matches!(
            self.kind,
            DeclarationKind::Header { .. }
                | DeclarationKind::Struct { .. }
                | DeclarationKind::Extern(_)
                | DeclarationKind::Control(_)
                | DeclarationKind::Package { .. }
        )
    }

    /// Copy of this subtree in which every node has a fresh id.
    ///
    /// Parameters and method signatures are shared, not copied: they are
    /// never the target of a rewrite.
    pub fn deep_clone(&self) -> Rc<Self> {
        let clone_all = |exprs: &[Rc<Expression>]| -> Vec<Rc<Expression>> {
            exprs.iter().map(|e| e.deep_clone()).collect()
        };
        let kind = match &self.kind {
            DeclarationKind::Header { .. }
            | DeclarationKind::Struct { .. }
            | DeclarationKind::Extern(_)
            | DeclarationKind::ExternFunction(_)
            | DeclarationKind::Package { .. } => self.kind.clone(),
            DeclarationKind::Action(action) => DeclarationKind::Action(Action {
                params: action.params.clone(),
                body: action.body.deep_clone(),
            }),
            DeclarationKind::Table(table) => DeclarationKind::Table(Table {
                key: table
                    .key
                    .iter()
                    .map(|k| KeyElement::new(k.expression.deep_clone(), k.match_kind.clone()))
                    .collect(),
                actions: clone_all(&table.actions),
                default_action: table.default_action.as_ref().map(|e| e.deep_clone()),
            }),
            DeclarationKind::Control(control) => DeclarationKind::Control(Control {
                type_params: control.type_params.clone(),
                apply_params: control.apply_params.clone(),
                ctor_params: control.ctor_params.clone(),
                locals: control.locals.iter().map(|d| d.deep_clone()).collect(),
                body: control.body.deep_clone(),
            }),
            DeclarationKind::Instance { ty, args } => DeclarationKind::Instance {
                ty: ty.clone(),
                args: clone_all(args),
            },
            DeclarationKind::Variable { ty, init } => DeclarationKind::Variable {
                ty: ty.clone(),
                init: init.as_ref().map(|e| e.deep_clone()),
            },
            DeclarationKind::Constant { ty, value } => DeclarationKind::Constant {
                ty: ty.clone(),
                value: value.deep_clone(),
            },
        };
        Declaration::with_span(self.name.clone(), kind, self.span)
    }
}
