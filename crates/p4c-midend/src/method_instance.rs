//! Classification of calls and constructor calls.
//!
//! Every call expression is exactly one [`MethodInstance`] and every
//! constructor call exactly one [`ConstructorCall`]. Both are computed from
//! the side tables, so they must be fresh for the tree being inspected.
//!
//! The signature carried by each variant is the one with the call's type
//! arguments substituted, never the generic declaration signature.

use std::fmt;
use std::rc::Rc;

use p4c_ir::{Declaration, DeclarationKind, Expression, ExpressionKind, Method};
use p4c_typeck::{DeclRef, MethodTy, ParamTy, RefMap, Ty, TypeMap};

use crate::error::ClassificationError;

/// Operations every header or header stack has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltIn {
    IsValid,
    SetValid,
    SetInvalid,
    PushFront,
    PopFront,
}

impl BuiltIn {
    pub fn from_name(name: &str) -> Option<BuiltIn> {
        match name {
            "isValid" => Some(BuiltIn::IsValid),
            "setValid" => Some(BuiltIn::SetValid),
            "setInvalid" => Some(BuiltIn::SetInvalid),
            "push_front" => Some(BuiltIn::PushFront),
            "pop_front" => Some(BuiltIn::PopFront),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BuiltIn::IsValid => "isValid",
            BuiltIn::SetValid => "setValid",
            BuiltIn::SetInvalid => "setInvalid",
            BuiltIn::PushFront => "push_front",
            BuiltIn::PopFront => "pop_front",
        }
    }

    /// Stack operations; the others apply to a single header.
    pub fn on_stack(self) -> bool {
        matches!(self, BuiltIn::PushFront | BuiltIn::PopFront)
    }
}

impl fmt::Display for BuiltIn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone)]
pub enum MethodInstance {
    /// `t.apply()` on a table or `c.apply(...)` on a control instance.
    Apply {
        call: Rc<Expression>,
        /// The table, or the instance/parameter the control is reached by.
        object: DeclRef,
        /// The table or control declaration being applied.
        applied: Rc<Declaration>,
        signature: MethodTy,
    },
    ExternMethod {
        call: Rc<Expression>,
        object: DeclRef,
        extern_type: Rc<Declaration>,
        method: Rc<Method>,
        signature: MethodTy,
    },
    ExternFunction {
        call: Rc<Expression>,
        function: Rc<Declaration>,
        signature: MethodTy,
    },
    ActionCall {
        call: Rc<Expression>,
        action: Rc<Declaration>,
        signature: MethodTy,
    },
    BuiltIn {
        call: Rc<Expression>,
        builtin: BuiltIn,
        /// The header or stack the operation applies to.
        receiver: Rc<Expression>,
        signature: MethodTy,
    },
}

impl MethodInstance {
    /// Classify `call`, which must be a method call expression.
    ///
    /// Candidates are tried in a fixed order and the first match wins:
    /// apply, extern method, extern function, action, built-in. An extern
    /// method therefore always beats a built-in of the same name.
    pub fn resolve(
        call: &Rc<Expression>,
        refs: &RefMap,
        types: &TypeMap,
    ) -> Result<MethodInstance, ClassificationError> {
        let fail = |reason: &str| ClassificationError::Call {
            call: call.to_string(),
            reason: reason.to_string(),
        };
        let ExpressionKind::MethodCall { method, args, .. } = &call.kind else {
            return Err(fail("not a method call"));
        };
        let signature = match types.get_type(method.id).and_then(Ty::as_method) {
            Some(generic) => match types.bindings(call.id) {
                Some(bindings) => generic.substitute(bindings),
                None => (**generic).clone(),
            },
            None => return Err(fail("callee has no method type")),
        };

        match &method.kind {
            ExpressionKind::Member {
                expr: receiver,
                member,
            } => {
                let receiver_ty = types.get_type(receiver.id);
                let object = || {
                    refs.get_declaration(receiver.id)
                        .cloned()
                        .ok_or_else(|| fail("receiver does not name a declaration"))
                };

                if member == "apply" {
                    match receiver_ty {
                        Some(Ty::Table(table)) => {
                            return Ok(MethodInstance::Apply {
                                call: call.clone(),
                                object: object()?,
                                applied: table.clone(),
                                signature,
                            });
                        }
                        Some(Ty::Decl { decl, .. }) if decl.as_control().is_some() => {
                            return Ok(MethodInstance::Apply {
                                call: call.clone(),
                                object: object()?,
                                applied: decl.clone(),
                                signature,
                            });
                        }
                        _ => {}
                    }
                }

                if let Some(Ty::Decl { decl, .. }) = receiver_ty {
                    if let Some(ext) = decl.as_extern() {
                        let Some(m) = ext.lookup_method(member, args.len()) else {
                            return Err(fail("extern has no such method"));
                        };
                        return Ok(MethodInstance::ExternMethod {
                            call: call.clone(),
                            object: object()?,
                            extern_type: decl.clone(),
                            method: m.clone(),
                            signature,
                        });
                    }
                }

                if let Some(builtin) = BuiltIn::from_name(member) {
                    let applies = match receiver_ty {
                        Some(Ty::Stack { .. }) => builtin.on_stack(),
                        Some(Ty::Decl { decl, .. }) => {
                            !builtin.on_stack()
                                && matches!(decl.kind, DeclarationKind::Header { .. })
                        }
                        _ => false,
                    };
                    if applies {
                        return Ok(MethodInstance::BuiltIn {
                            call: call.clone(),
                            builtin,
                            receiver: receiver.clone(),
                            signature,
                        });
                    }
                }
                Err(fail("member call matches no call kind"))
            }
            ExpressionKind::Path(_) => {
                let Some(target) = refs.get_declaration(method.id).and_then(DeclRef::as_declaration)
                else {
                    return Err(fail("callee does not resolve to a declaration"));
                };
                match &target.kind {
                    DeclarationKind::ExternFunction(_) => Ok(MethodInstance::ExternFunction {
                        call: call.clone(),
                        function: target.clone(),
                        signature,
                    }),
                    DeclarationKind::Action(_) => Ok(MethodInstance::ActionCall {
                        call: call.clone(),
                        action: target.clone(),
                        signature,
                    }),
                    _ => Err(fail("callee is neither an extern function nor an action")),
                }
            }
            _ => Err(fail("callee is not a name or a member")),
        }
    }

    pub fn call(&self) -> &Rc<Expression> {
        match self {
            MethodInstance::Apply { call, .. }
            | MethodInstance::ExternMethod { call, .. }
            | MethodInstance::ExternFunction { call, .. }
            | MethodInstance::ActionCall { call, .. }
            | MethodInstance::BuiltIn { call, .. } => call,
        }
    }

    /// The signature with the call's type arguments substituted.
    pub fn signature(&self) -> &MethodTy {
        match self {
            MethodInstance::Apply { signature, .. }
            | MethodInstance::ExternMethod { signature, .. }
            | MethodInstance::ExternFunction { signature, .. }
            | MethodInstance::ActionCall { signature, .. }
            | MethodInstance::BuiltIn { signature, .. } => signature,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            MethodInstance::Apply { .. } => "apply",
            MethodInstance::ExternMethod { .. } => "extern method",
            MethodInstance::ExternFunction { .. } => "extern function",
            MethodInstance::ActionCall { .. } => "action call",
            MethodInstance::BuiltIn { .. } => "built-in",
        }
    }

    pub fn arguments(&self) -> &[Rc<Expression>] {
        match &self.call().kind {
            ExpressionKind::MethodCall { args, .. } => args,
            _ => &[],
        }
    }

    /// Each parameter with the argument bound to it, in order.
    pub fn substitution(&self) -> impl Iterator<Item = (&ParamTy, &Rc<Expression>)> + '_ {
        self.signature().params.iter().zip(self.arguments())
    }

    /// The control declaration applied, for an apply on a control.
    pub fn applied_control(&self) -> Option<&Rc<Declaration>> {
        match self {
            MethodInstance::Apply { applied, .. } if applied.as_control().is_some() => {
                Some(applied)
            }
            _ => None,
        }
    }
}

// ── Constructor calls ──────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum ConstructorCall {
    Extern {
        call: Rc<Expression>,
        extern_type: Rc<Declaration>,
        type_args: Vec<Ty>,
    },
    /// A control or package.
    Container {
        call: Rc<Expression>,
        container: Rc<Declaration>,
        type_args: Vec<Ty>,
    },
}

impl ConstructorCall {
    pub fn resolve(
        call: &Rc<Expression>,
        refs: &RefMap,
        types: &TypeMap,
    ) -> Result<ConstructorCall, ClassificationError> {
        let fail = |reason: &str| ClassificationError::Constructor {
            call: call.to_string(),
            reason: reason.to_string(),
        };
        if !matches!(call.kind, ExpressionKind::ConstructorCall { .. }) {
            return Err(fail("not a constructor call"));
        }
        let Some(target) = refs.get_declaration(call.id).and_then(DeclRef::as_declaration) else {
            return Err(fail("constructed type does not resolve"));
        };
        let type_args = match types.get_type(call.id) {
            Some(Ty::Decl { args, .. }) => args.clone(),
            _ => Vec::new(),
        };
        match &target.kind {
            DeclarationKind::Extern(_) => Ok(ConstructorCall::Extern {
                call: call.clone(),
                extern_type: target.clone(),
                type_args,
            }),
            DeclarationKind::Control(_) | DeclarationKind::Package { .. } => {
                Ok(ConstructorCall::Container {
                    call: call.clone(),
                    container: target.clone(),
                    type_args,
                })
            }
            _ => Err(fail("constructed type is neither an extern nor a container")),
        }
    }

    /// The declaration being instantiated.
    pub fn target(&self) -> &Rc<Declaration> {
        match self {
            ConstructorCall::Extern { extern_type, .. } => extern_type,
            ConstructorCall::Container { container, .. } => container,
        }
    }

    pub fn type_args(&self) -> &[Ty] {
        match self {
            ConstructorCall::Extern { type_args, .. }
            | ConstructorCall::Container { type_args, .. } => type_args,
        }
    }
}
