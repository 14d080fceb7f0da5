//! Statements and blocks.

use std::rc::Rc;

use p4c_common::SourceInfo;

use crate::decl::Declaration;
use crate::expr::Expression;
use crate::id::NodeId;

#[derive(Debug)]
pub struct Block {
    pub id: NodeId,
    pub statements: Vec<Rc<Statement>>,
}

impl Block {
    pub fn new(statements: Vec<Rc<Statement>>) -> Rc<Self> {
        Rc::new(Block {
            id: NodeId::fresh(),
            statements,
        })
    }

    pub fn empty() -> Rc<Self> {
        Self::new(Vec::new())
    }

    pub fn rebuild(&self, statements: Vec<Rc<Statement>>) -> Rc<Self> {
        Rc::new(Block {
            id: self.id,
            statements,
        })
    }

    pub fn deep_clone(&self) -> Rc<Self> {
        Block::new(self.statements.iter().map(|s| s.deep_clone()).collect())
    }

    /// Whether any statement directly in this block declares something.
    pub fn has_declarations(&self) -> bool {
        self.statements
            .iter()
            .any(|s| matches!(s.kind, StatementKind::Declaration(_)))
    }

    pub fn contains_return(&self) -> bool {
        self.statements.iter().any(|s| s.contains_return())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchLabel {
    /// An action name, for `switch (t.apply().action_run)`.
    Name(String),
    Default,
}

#[derive(Debug, Clone)]
pub struct SwitchCase {
    pub label: SwitchLabel,
    /// `None` falls through to the next case.
    pub body: Option<Rc<Block>>,
}

#[derive(Debug)]
pub struct Statement {
    pub id: NodeId,
    pub span: Option<SourceInfo>,
    pub kind: StatementKind,
}

#[derive(Debug, Clone)]
pub enum StatementKind {
    Block(Rc<Block>),
    Assignment {
        left: Rc<Expression>,
        right: Rc<Expression>,
    },
    /// A call evaluated for its effect; the expression is a `MethodCall`.
    MethodCall(Rc<Expression>),
    If {
        condition: Rc<Expression>,
        if_true: Rc<Statement>,
        if_false: Option<Rc<Statement>>,
    },
    Switch {
        expression: Rc<Expression>,
        cases: Vec<SwitchCase>,
    },
    /// A local variable, constant or instance.
    Declaration(Rc<Declaration>),
    Return(Option<Rc<Expression>>),
    Exit,
    Empty,
}

impl Statement {
    pub fn new(kind: StatementKind) -> Rc<Self> {
        Self::with_span(kind, None)
    }

    pub fn with_span(kind: StatementKind, span: Option<SourceInfo>) -> Rc<Self> {
        Rc::new(Statement {
            id: NodeId::fresh(),
            span,
            kind,
        })
    }

    pub fn rebuild(&self, kind: StatementKind) -> Rc<Self> {
        Rc::new(Statement {
            id: self.id,
            span: self.span,
            kind,
        })
    }

    pub fn block(statements: Vec<Rc<Statement>>) -> Rc<Self> {
        Self::new(StatementKind::Block(Block::new(statements)))
    }

    pub fn assign(left: Rc<Expression>, right: Rc<Expression>) -> Rc<Self> {
        Self::new(StatementKind::Assignment { left, right })
    }

    pub fn call(call: Rc<Expression>) -> Rc<Self> {
        Self::new(StatementKind::MethodCall(call))
    }

    pub fn if_else(
        condition: Rc<Expression>,
        if_true: Rc<Statement>,
        if_false: Option<Rc<Statement>>,
    ) -> Rc<Self> {
        Self::new(StatementKind::If {
            condition,
            if_true,
            if_false,
        })
    }

    pub fn switch(expression: Rc<Expression>, cases: Vec<SwitchCase>) -> Rc<Self> {
        Self::new(StatementKind::Switch { expression, cases })
    }

    pub fn declare(decl: Rc<Declaration>) -> Rc<Self> {
        let span = decl.span;
        Self::with_span(StatementKind::Declaration(decl), span)
    }

    pub fn ret(value: Option<Rc<Expression>>) -> Rc<Self> {
        Self::new(StatementKind::Return(value))
    }

    pub fn exit() -> Rc<Self> {
        Self::new(StatementKind::Exit)
    }

    pub fn empty() -> Rc<Self> {
        Self::new(StatementKind::Empty)
    }

    pub fn is_empty(&self) -> bool {
        match &self.kind {
            StatementKind::Empty => true,
            StatementKind::Block(block) => block.statements.iter().all(|s| s.is_empty()),
            _ => false,
        }
    }

    /// The expression a table application could hide in: the call of a
    /// call statement, the condition of an `if`, the selector of a `switch`.
    pub fn guard_expression(&self) -> Option<&Rc<Expression>> {
        match &self.kind {
            StatementKind::MethodCall(call) => Some(call),
            StatementKind::If { condition, .. } => Some(condition),
            StatementKind::Switch { expression, .. } => Some(expression),
            _ => None,
        }
    }

    /// Whether a `return` can be reached from here.
    pub fn contains_return(&self) -> bool {
        match &self.kind {
            StatementKind::Return(_) => true,
            StatementKind::Block(block) => block.contains_return(),
            StatementKind::If {
                if_true, if_false, ..
            } => {
                if_true.contains_return()
                    || if_false.as_ref().is_some_and(|s| s.contains_return())
            }
            StatementKind::Switch { cases, .. } => cases
                .iter()
                .any(|case| case.body.as_ref().is_some_and(|body| body.contains_return())),
            StatementKind::Assignment { .. }
            | StatementKind::MethodCall(_)
            | StatementKind::Declaration(_)
            | StatementKind::Exit
            | StatementKind::Empty => false,
        }
    }

    /// Copy of this subtree in which every node has a fresh id.
    pub fn deep_clone(&self) -> Rc<Self> {
        let kind = match &self.kind {
            StatementKind::Block(block) => StatementKind::Block(block.deep_clone()),
            StatementKind::Assignment { left, right } => StatementKind::Assignment {
                left: left.deep_clone(),
                right: right.deep_clone(),
            },
            StatementKind::MethodCall(call) => StatementKind::MethodCall(call.deep_clone()),
            StatementKind::If {
                condition,
                if_true,
                if_false,
            } => StatementKind::If {
                condition: condition.deep_clone(),
                if_true: if_true.deep_clone(),
                if_false: if_false.as_ref().map(|s| s.deep_clone()),
            },
            StatementKind::Switch { expression, cases } => StatementKind::Switch {
                expression: expression.deep_clone(),
                cases: cases
                    .iter()
                    .map(|case| SwitchCase {
                        label: case.label.clone(),
                        body: case.body.as_ref().map(|b| b.deep_clone()),
                    })
                    .collect(),
            },
            StatementKind::Declaration(decl) => StatementKind::Declaration(decl.deep_clone()),
            StatementKind::Return(value) => {
                StatementKind::Return(value.as_ref().map(|v| v.deep_clone()))
            }
            StatementKind::Exit => StatementKind::Exit,
            StatementKind::Empty => StatementKind::Empty,
        };
        Statement::with_span(kind, self.span)
    }
}
