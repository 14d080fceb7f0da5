//! Semantic types.
//!
//! Unlike the syntactic [`p4c_ir::Type`], a `Ty` has its names resolved:
//! a declared type is a handle to its declaration, compared by node id.
//! Type parameters stay symbolic (`Ty::Param`) until a call binds them.

use std::fmt;
use std::rc::Rc;

use p4c_ir::{Declaration, Direction, Type};
use rustc_hash::FxHashMap;

/// Type-variable bindings of one call: type parameter name -> type.
pub type Bindings = FxHashMap<String, Ty>;

#[derive(Clone, Debug)]
pub enum Ty {
    Bool,
    Bits { width: u32, signed: bool },
    InfInt,
    Void,
    /// A header, struct, extern, control or package, applied to arguments.
    Decl { decl: Rc<Declaration>, args: Vec<Ty> },
    Stack { element: Box<Ty>, size: u32 },
    /// An unbound type parameter.
    Param(String),
    Method(Rc<MethodTy>),
    /// A table declaration; its only member is `apply`.
    Table(Rc<Declaration>),
    /// What `table.apply()` returns: `hit`, `miss`, `action_run`.
    ApplyResult(Rc<Declaration>),
    /// The type of `table.apply().action_run`.
    ActionEnum(Rc<Declaration>),
    /// Produced after a reported error; compatible with everything.
    Error,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ParamTy {
    pub name: String,
    pub direction: Direction,
    pub ty: Ty,
}

/// Signature of anything callable: extern methods and functions, actions,
/// `apply` methods and built-ins.
#[derive(Clone, Debug, PartialEq)]
pub struct MethodTy {
    pub type_params: Vec<String>,
    pub params: Vec<ParamTy>,
    pub ret: Ty,
}

impl MethodTy {
    pub fn new(params: Vec<ParamTy>, ret: Ty) -> Self {
        MethodTy {
            type_params: Vec::new(),
            params,
            ret,
        }
    }

    /// The signature with every bound type parameter replaced.
    pub fn substitute(&self, bindings: &Bindings) -> MethodTy {
        MethodTy {
            type_params: self
                .type_params
                .iter()
                .filter(|p| !bindings.contains_key(*p))
                .cloned()
                .collect(),
            params: self
                .params
                .iter()
                .map(|p| ParamTy {
                    name: p.name.clone(),
                    direction: p.direction,
                    ty: p.ty.substitute(bindings),
                })
                .collect(),
            ret: self.ret.substitute(bindings),
        }
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

impl Ty {
    pub fn bits(width: u32) -> Ty {
        Ty::Bits {
            width,
            signed: false,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Ty::Error)
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Ty::Bool)
    }

    pub fn as_method(&self) -> Option<&Rc<MethodTy>> {
        match self {
            Ty::Method(m) => Some(m),
            _ => None,
        }
    }

    /// The declaration behind a header/struct/extern/control/package type.
    pub fn decl(&self) -> Option<&Rc<Declaration>> {
        match self {
            Ty::Decl { decl, .. } => Some(decl),
            _ => None,
        }
    }

    pub fn substitute(&self, bindings: &Bindings) -> Ty {
        match self {
            Ty::Param(name) => bindings.get(name).cloned().unwrap_or_else(|| self.clone()),
            Ty::Decl { decl, args } => Ty::Decl {
                decl: decl.clone(),
                args: args.iter().map(|a| a.substitute(bindings)).collect(),
            },
            Ty::Stack { element, size } => Ty::Stack {
                element: Box::new(element.substitute(bindings)),
                size: *size,
            },
            Ty::Method(m) => Ty::Method(Rc::new(m.substitute(bindings))),
            _ => self.clone(),
        }
    }

    /// Whether a value of type `other` may be used where `self` is expected.
    /// Unsized integers fit any fixed-width integer.
    pub fn accepts(&self, other: &Ty) -> bool {
        match (self, other) {
            (Ty::Error, _) | (_, Ty::Error) => true,
            (Ty::Param(_), _) | (_, Ty::Param(_)) => true,
            (Ty::Bits { .. }, Ty::InfInt) | (Ty::InfInt, Ty::Bits { .. }) => true,
            _ => self == other,
        }
    }

    /// Syntactic form of this type, for declaring temporaries of it.
    pub fn to_type(&self) -> Option<Rc<Type>> {
        let ty = match self {
            Ty::Bool => Type::Bool,
            Ty::Bits { width, signed } => Type::Bits {
                width: *width,
                signed: *signed,
            },
            Ty::InfInt => Type::InfInt,
            Ty::Void => Type::Void,
            Ty::Param(name) => Type::Named(name.clone()),
            Ty::Decl { decl, args } if args.is_empty() => Type::Named(decl.name.clone()),
            Ty::Decl { decl, args } => Type::Specialized {
                base: decl.name.clone(),
                args: args.iter().map(|a| a.to_type()).collect::<Option<_>>()?,
            },
            Ty::Stack { element, size } => Type::Stack {
                element: element.to_type()?,
                size: *size,
            },
            Ty::Method(_)
            | Ty::Table(_)
            | Ty::ApplyResult(_)
            | Ty::ActionEnum(_)
            | Ty::Error => return None,
        };
        Some(Rc::new(ty))
    }
}

impl PartialEq for Ty {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Ty::Bool, Ty::Bool)
            | (Ty::InfInt, Ty::InfInt)
            | (Ty::Void, Ty::Void)
            | (Ty::Error, Ty::Error) => true,
            (
                Ty::Bits {
                    width: w1,
                    signed: s1,
                },
                Ty::Bits {
                    width: w2,
                    signed: s2,
                },
            ) => w1 == w2 && s1 == s2,
            (Ty::Decl { decl: d1, args: a1 }, Ty::Decl { decl: d2, args: a2 }) => {
                d1.id == d2.id && a1 == a2
            }
            (
                Ty::Stack {
                    element: e1,
                    size: s1,
                },
                Ty::Stack {
                    element: e2,
                    size: s2,
                },
            ) => e1 == e2 && s1 == s2,
            (Ty::Param(a), Ty::Param(b)) => a == b,
            (Ty::Method(a), Ty::Method(b)) => a == b,
            (Ty::Table(a), Ty::Table(b))
            | (Ty::ApplyResult(a), Ty::ApplyResult(b))
            | (Ty::ActionEnum(a), Ty::ActionEnum(b)) => a.id == b.id,
            _ => false,
        }
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Bool => write!(f, "bool"),
            Ty::Bits {
                width,
                signed: false,
            } => write!(f, "bit<{width}>"),
            Ty::Bits {
                width,
                signed: true,
            } => write!(f, "int<{width}>"),
            Ty::InfInt => write!(f, "int"),
            Ty::Void => write!(f, "void"),
            Ty::Decl { decl, args } => {
                write!(f, "{}", decl.name)?;
                if !args.is_empty() {
                    write!(f, "<")?;
                    for (i, arg) in args.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{arg}")?;
                    }
                    write!(f, ">")?;
                }
                Ok(())
            }
            Ty::Stack { element, size } => write!(f, "{element}[{size}]"),
            Ty::Param(name) => write!(f, "{name}"),
            Ty::Method(m) => {
                write!(f, "(")?;
                for (i, p) in m.params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}{}", p.direction, p.ty)?;
                }
                write!(f, ") -> {}", m.ret)
            }
            Ty::Table(t) => write!(f, "table {}", t.name),
            Ty::ApplyResult(t) => write!(f, "{}.apply_result", t.name),
            Ty::ActionEnum(t) => write!(f, "{}.action_list", t.name),
            Ty::Error => write!(f, "<error>"),
        }
    }
}
