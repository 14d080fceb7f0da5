//! Syntactic types.
//!
//! Types are plain values shared through `Rc`. Names are resolved by the
//! type checker; the tree only records what was written.

use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Bool,
    /// `bit<N>` or `int<N>`.
    Bits { width: u32, signed: bool },
    /// Arbitrary-precision integer (unsized literals).
    InfInt,
    Void,
    /// A reference to a declared type or a type parameter.
    Named(String),
    /// A generic type applied to arguments: `register<bit<32>>`.
    Specialized { base: String, args: Vec<Rc<Type>> },
    /// Header stack: `h_t[4]`.
    Stack { element: Rc<Type>, size: u32 },
}

impl Type {
    pub fn bits(width: u32) -> Rc<Type> {
        Rc::new(Type::Bits {
            width,
            signed: false,
        })
    }

    pub fn int(width: u32) -> Rc<Type> {
        Rc::new(Type::Bits {
            width,
            signed: true,
        })
    }

    pub fn bool() -> Rc<Type> {
        Rc::new(Type::Bool)
    }

    pub fn void() -> Rc<Type> {
        Rc::new(Type::Void)
    }

    pub fn named(name: impl Into<String>) -> Rc<Type> {
        Rc::new(Type::Named(name.into()))
    }

    pub fn specialized(base: impl Into<String>, args: Vec<Rc<Type>>) -> Rc<Type> {
        Rc::new(Type::Specialized {
            base: base.into(),
            args,
        })
    }

    pub fn stack(element: Rc<Type>, size: u32) -> Rc<Type> {
        Rc::new(Type::Stack { element, size })
    }

    /// The declared name this type refers to, if any.
    pub fn base_name(&self) -> Option<&str> {
        match self {
            Type::Named(name) | Type::Specialized { base: name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn type_args(&self) -> &[Rc<Type>] {
        match self {
            Type::Specialized { args, .. } => args,
            _ => &[],
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Bool => write!(f, "bool"),
            Type::Bits {
                width,
                signed: false,
            } => write!(f, "bit<{width}>"),
            Type::Bits {
                width,
                signed: true,
            } => write!(f, "int<{width}>"),
            Type::InfInt => write!(f, "int"),
            Type::Void => write!(f, "void"),
            Type::Named(name) => write!(f, "{name}"),
            Type::Specialized { base, args } => {
                write!(f, "{base}<")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ">")
            }
            Type::Stack { element, size } => write!(f, "{element}[{size}]"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        assert_eq!(Type::bits(8).to_string(), "bit<8>");
        assert_eq!(Type::int(16).to_string(), "int<16>");
        assert_eq!(
            Type::specialized("register", vec![Type::bits(32), Type::bool()]).to_string(),
            "register<bit<32>, bool>"
        );
        assert_eq!(Type::stack(Type::named("h_t"), 4).to_string(), "h_t[4]");
    }

    #[test]
    fn base_name() {
        assert_eq!(Type::named("h_t").base_name(), Some("h_t"));
        assert_eq!(
            Type::specialized("counter", vec![Type::bits(8)]).base_name(),
            Some("counter")
        );
        assert_eq!(Type::bits(8).base_name(), None);
    }
}
