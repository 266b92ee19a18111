//! The code DOM: the language-neutral lowered tree consumed by emission.
//!
//! Expressions and statements carry the SRG node they were lowered from so
//! the emitter can produce source maps. Trees are per-member and ephemeral.

mod builder;

#[cfg(test)]
mod codedom_tests;

use serulian_graph::store::NodeId;

use crate::typegraph::TypeReference;

pub use builder::DomBuilder;

/// Runtime helper functions the emitter provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeFunction {
    AssertNotNull,
    Cast,
    DynamicAccess,
    StreamAccess,
    EmptyPromise,
}

impl RuntimeFunction {
    pub fn name(self) -> &'static str {
        match self {
            RuntimeFunction::AssertNotNull => "$t.assertnotnull",
            RuntimeFunction::Cast => "$t.cast",
            RuntimeFunction::DynamicAccess => "$t.dynamicaccess",
            RuntimeFunction::StreamAccess => "$t.streamaccess",
            RuntimeFunction::EmptyPromise => "$promise.empty",
        }
    }
}

/// A lowered expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// A literal value, emitted verbatim.
    LiteralValue { value: String, source: NodeId },

    /// A reference to a local variable or parameter.
    LocalReference { name: String, source: NodeId },

    /// Wraps a base value into a nominal type.
    NominalWrapping {
        value: Box<Expression>,
        nominal_type: TypeReference,
        source: NodeId,
    },

    /// Unwraps a nominal instance to its base value.
    NominalUnwrapping {
        value: Box<Expression>,
        value_type: TypeReference,
        source: NodeId,
    },

    /// A call to a member through an instance.
    MemberCall {
        child: Box<Expression>,
        member: NodeId,
        arguments: Vec<Expression>,
        source: NodeId,
    },

    /// A member call that short-circuits to null when the receiver is null.
    NullableMemberCall {
        child: Box<Expression>,
        member: NodeId,
        arguments: Vec<Expression>,
        source: NodeId,
    },

    /// A reference to a member through an instance.
    MemberReference {
        child: Box<Expression>,
        member: NodeId,
        source: NodeId,
    },

    /// A reference to a member through its parent type.
    StaticMemberReference {
        member: NodeId,
        parent_type: TypeReference,
        source: NodeId,
    },

    /// Invocation of a plain function value.
    InvokeFunction {
        target: Box<Expression>,
        arguments: Vec<Expression>,
        source: NodeId,
    },

    /// A native binary operation.
    BinaryOperation {
        left: Box<Expression>,
        operator: &'static str,
        right: Box<Expression>,
        source: NodeId,
    },

    /// A native unary operation.
    UnaryOperation {
        operator: &'static str,
        child: Box<Expression>,
        source: NodeId,
    },

    /// A call to an emitter-provided runtime function.
    RuntimeFunctionCall {
        function: RuntimeFunction,
        arguments: Vec<Expression>,
        source: NodeId,
    },

    /// Awaits the value of a promise; suspends the enclosing machine.
    AwaitPromise { value: Box<Expression>, source: NodeId },

    /// An anonymous function closing over the current frame.
    FunctionDefinition {
        parameters: Vec<String>,
        body: Box<Statement>,
        source: NodeId,
    },

    /// A list construction.
    ListExpression {
        elements: Vec<Expression>,
        source: NodeId,
    },

    /// A mapping construction from key/value pairs.
    MapExpression {
        entries: Vec<(Expression, Expression)>,
        source: NodeId,
    },

    /// An object construction assigning named members.
    ObjectExpression {
        type_ref: TypeReference,
        entries: Vec<(String, Expression)>,
        source: NodeId,
    },
}

impl Expression {
    /// The SRG node this expression lowers.
    pub fn source(&self) -> NodeId {
        match self {
            Expression::LiteralValue { source, .. }
            | Expression::LocalReference { source, .. }
            | Expression::NominalWrapping { source, .. }
            | Expression::NominalUnwrapping { source, .. }
            | Expression::MemberCall { source, .. }
            | Expression::NullableMemberCall { source, .. }
            | Expression::MemberReference { source, .. }
            | Expression::StaticMemberReference { source, .. }
            | Expression::InvokeFunction { source, .. }
            | Expression::BinaryOperation { source, .. }
            | Expression::UnaryOperation { source, .. }
            | Expression::RuntimeFunctionCall { source, .. }
            | Expression::AwaitPromise { source, .. }
            | Expression::FunctionDefinition { source, .. }
            | Expression::ListExpression { source, .. }
            | Expression::MapExpression { source, .. }
            | Expression::ObjectExpression { source, .. } => *source,
        }
    }

    /// Whether emission of this expression can suspend the machine.
    pub fn is_suspendable(&self) -> bool {
        match self {
            Expression::AwaitPromise { .. } => true,
            Expression::LiteralValue { .. }
            | Expression::LocalReference { .. }
            | Expression::StaticMemberReference { .. }
            | Expression::FunctionDefinition { .. } => false,
            Expression::NominalWrapping { value, .. }
            | Expression::NominalUnwrapping { value, .. } => value.is_suspendable(),
            Expression::MemberCall { child, arguments, .. }
            | Expression::NullableMemberCall { child, arguments, .. } => {
                child.is_suspendable() || arguments.iter().any(Expression::is_suspendable)
            }
            Expression::MemberReference { child, .. } => child.is_suspendable(),
            Expression::InvokeFunction { target, arguments, .. } => {
                target.is_suspendable() || arguments.iter().any(Expression::is_suspendable)
            }
            Expression::BinaryOperation { left, right, .. } => {
                left.is_suspendable() || right.is_suspendable()
            }
            Expression::UnaryOperation { child, .. } => child.is_suspendable(),
            Expression::RuntimeFunctionCall { arguments, .. } => {
                arguments.iter().any(Expression::is_suspendable)
            }
            Expression::ListExpression { elements, .. } => {
                elements.iter().any(Expression::is_suspendable)
            }
            Expression::MapExpression { entries, .. } => entries
                .iter()
                .any(|(key, value)| key.is_suspendable() || value.is_suspendable()),
            Expression::ObjectExpression { entries, .. } => {
                entries.iter().any(|(_, value)| value.is_suspendable())
            }
        }
    }
}

/// A lowered statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Block {
        statements: Vec<Statement>,
        source: NodeId,
    },
    VarDefinition {
        name: String,
        initializer: Option<Expression>,
        source: NodeId,
    },
    Assignment {
        target: Expression,
        value: Expression,
        source: NodeId,
    },
    Conditional {
        test: Expression,
        then_branch: Box<Statement>,
        else_branch: Option<Box<Statement>>,
        source: NodeId,
    },
    /// A loop: over a bool condition, over a stream, or infinite.
    Loop {
        test: Option<Expression>,
        stream_value_name: Option<String>,
        body: Box<Statement>,
        label: Option<String>,
        source: NodeId,
    },
    Switch {
        test: Option<Expression>,
        cases: Vec<(Option<Expression>, Statement)>,
        label: Option<String>,
        source: NodeId,
    },
    Return {
        value: Option<Expression>,
        source: NodeId,
    },
    Reject {
        value: Expression,
        source: NodeId,
    },
    Yield {
        value: Expression,
        source: NodeId,
    },
    Break {
        label: Option<String>,
        source: NodeId,
    },
    Continue {
        label: Option<String>,
        source: NodeId,
    },
    ExpressionStatement {
        expression: Expression,
        source: NodeId,
    },
    /// Awaits a promise and assigns its result; `destination` of None
    /// discards the value, `rejection` receives a rejection value.
    ArrowAwait {
        destination: Option<Expression>,
        rejection: Option<Expression>,
        value: Expression,
        source: NodeId,
    },
    /// A resource access statement; the resource is released on exit.
    With {
        resource: Expression,
        value_name: Option<String>,
        body: Box<Statement>,
        source: NodeId,
    },
}

impl Statement {
    pub fn source(&self) -> NodeId {
        match self {
            Statement::Block { source, .. }
            | Statement::VarDefinition { source, .. }
            | Statement::Assignment { source, .. }
            | Statement::Conditional { source, .. }
            | Statement::Loop { source, .. }
            | Statement::Switch { source, .. }
            | Statement::Return { source, .. }
            | Statement::Reject { source, .. }
            | Statement::Yield { source, .. }
            | Statement::Break { source, .. }
            | Statement::Continue { source, .. }
            | Statement::ExpressionStatement { source, .. }
            | Statement::ArrowAwait { source, .. }
            | Statement::With { source, .. } => *source,
        }
    }

    /// Whether this statement (or any nested one) can suspend the machine.
    pub fn is_suspendable(&self) -> bool {
        match self {
            Statement::ArrowAwait { .. } => true,
            Statement::Block { statements, .. } => {
                statements.iter().any(Statement::is_suspendable)
            }
            Statement::VarDefinition { initializer, .. } => initializer
                .as_ref()
                .is_some_and(Expression::is_suspendable),
            Statement::Assignment { target, value, .. } => {
                target.is_suspendable() || value.is_suspendable()
            }
            Statement::Conditional {
                test,
                then_branch,
                else_branch,
                ..
            } => {
                test.is_suspendable()
                    || then_branch.is_suspendable()
                    || else_branch.as_ref().is_some_and(|branch| branch.is_suspendable())
            }
            Statement::Loop { test, body, .. } => {
                test.as_ref().is_some_and(Expression::is_suspendable) || body.is_suspendable()
            }
            Statement::Switch { test, cases, .. } => {
                test.as_ref().is_some_and(Expression::is_suspendable)
                    || cases.iter().any(|(case_test, body)| {
                        case_test.as_ref().is_some_and(Expression::is_suspendable)
                            || body.is_suspendable()
                    })
            }
            Statement::Return { value, .. } => {
                value.as_ref().is_some_and(Expression::is_suspendable)
            }
            Statement::Reject { value, .. }
            | Statement::Yield { value, .. }
            | Statement::ExpressionStatement {
                expression: value, ..
            } => value.is_suspendable(),
            Statement::Break { .. } | Statement::Continue { .. } => false,
            Statement::With { resource, body, .. } => {
                resource.is_suspendable() || body.is_suspendable()
            }
        }
    }
}
