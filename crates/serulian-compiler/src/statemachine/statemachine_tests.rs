use serulian_graph::store::NodeId;

use crate::codedom::{Expression, Statement};

use super::transform::lower_implementation;
use super::{Instruction, MemberEmission, StateId};

fn source() -> NodeId {
    NodeId(0)
}

fn literal(value: &str) -> Expression {
    Expression::LiteralValue {
        value: value.to_owned(),
        source: source(),
    }
}

fn await_call(value: Expression) -> Expression {
    Expression::AwaitPromise {
        value: Box::new(value),
        source: source(),
    }
}

fn block(statements: Vec<Statement>) -> Statement {
    Statement::Block {
        statements,
        source: source(),
    }
}

#[test]
fn synchronous_body_stays_simple() {
    let body = block(vec![Statement::Return {
        value: Some(literal("42")),
        source: source(),
    }]);

    let emission = lower_implementation(&body);
    assert!(matches!(emission, MemberEmission::Simple(_)));
}

#[test]
fn async_assignment_creates_receive_state() {
    // a = await foo(): the machine has at least two states, the receive
    // state binds $returnValue, and program order continues there.
    let body = block(vec![
        Statement::VarDefinition {
            name: "a".to_owned(),
            initializer: Some(await_call(literal("foo()"))),
            source: source(),
        },
        Statement::Return {
            value: Some(Expression::LocalReference {
                name: "a".to_owned(),
                source: source(),
            }),
            source: source(),
        },
    ]);

    let MemberEmission::Machine(machine) = lower_implementation(&body) else {
        panic!("expected a machine");
    };

    assert!(machine.state_count() >= 2);

    // The entry state performs the async call.
    let entry = machine.state(StateId(0));
    let Some(Instruction::AsyncCall {
        return_state,
        return_variable,
        ..
    }) = entry
        .instructions
        .iter()
        .find(|i| matches!(i, Instruction::AsyncCall { .. }))
    else {
        panic!("expected an async call in the entry state");
    };
    assert!(return_variable.starts_with("$returnValue"));

    // The receive state binds the variable and continues program order: the
    // assignment into `a` and then the resolution.
    let receive = machine.state(*return_state);
    assert!(receive.instructions.iter().any(|i| matches!(
        i,
        Instruction::VarAssign { name, value: Expression::LocalReference { name: from, .. } }
            if name == "a" && from == return_variable
    )));
    assert!(
        receive
            .instructions
            .iter()
            .any(|i| matches!(i, Instruction::Resolve(Some(_))))
    );

    // No observable side effects before the call settles: the entry state
    // holds nothing but the call itself.
    assert_eq!(entry.instructions.len(), 1);
}

#[test]
fn conditional_lowers_to_jump_targets() {
    let body = block(vec![
        Statement::Conditional {
            test: literal("cond"),
            then_branch: Box::new(Statement::ExpressionStatement {
                expression: await_call(literal("foo()")),
                source: source(),
            }),
            else_branch: None,
            source: source(),
        },
        Statement::Return {
            value: None,
            source: source(),
        },
    ]);

    let MemberEmission::Machine(machine) = lower_implementation(&body) else {
        panic!("expected a machine");
    };

    let entry = machine.state(StateId(0));
    let Some(Instruction::ConditionalJump {
        then_state,
        else_state,
        ..
    }) = entry
        .instructions
        .iter()
        .find(|i| matches!(i, Instruction::ConditionalJump { .. }))
    else {
        panic!("expected a conditional jump");
    };

    // The then branch suspends; the else branch jumps straight on.
    assert!(machine.state(*then_state).instructions.iter().any(|i| {
        matches!(i, Instruction::AsyncCall { .. })
    }));
    assert!(machine.state(*else_state).instructions.iter().any(|i| {
        matches!(i, Instruction::Jump(_))
    }));
}

#[test]
fn loop_resumes_at_test_state() {
    let body = block(vec![Statement::Loop {
        test: Some(literal("cond")),
        stream_value_name: None,
        body: Box::new(Statement::ExpressionStatement {
            expression: await_call(literal("foo()")),
            source: source(),
        }),
        label: None,
        source: source(),
    }]);

    let MemberEmission::Machine(machine) = lower_implementation(&body) else {
        panic!("expected a machine");
    };

    // The entry jumps into the test state.
    let entry = machine.state(StateId(0));
    let Some(Instruction::Jump(test_state)) = entry
        .instructions
        .iter()
        .find(|i| matches!(i, Instruction::Jump(_)))
    else {
        panic!("expected a jump to the loop test");
    };

    // The test state branches into the body, which suspends and then loops
    // back to the test.
    let Some(Instruction::ConditionalJump { then_state, .. }) = machine
        .state(*test_state)
        .instructions
        .iter()
        .find(|i| matches!(i, Instruction::ConditionalJump { .. }))
    else {
        panic!("expected the loop test branch");
    };

    let body_state = machine.state(*then_state);
    let Some(Instruction::AsyncCall { return_state, .. }) = body_state
        .instructions
        .iter()
        .find(|i| matches!(i, Instruction::AsyncCall { .. }))
    else {
        panic!("expected the body async call");
    };

    assert!(machine.state(*return_state).instructions.iter().any(|i| {
        matches!(i, Instruction::Jump(target) if target == test_state)
    }));
}

#[test]
fn rejection_skips_to_nearest_reject_destination() {
    // value, err <- compute(): the rejection handler assigns and continues;
    // the async call's reject state is that handler.
    let body = block(vec![Statement::ArrowAwait {
        destination: Some(Expression::LocalReference {
            name: "value".to_owned(),
            source: source(),
        }),
        rejection: Some(Expression::LocalReference {
            name: "err".to_owned(),
            source: source(),
        }),
        value: literal("compute()"),
        source: source(),
    }]);

    let MemberEmission::Machine(machine) = lower_implementation(&body) else {
        panic!("expected a machine");
    };

    let entry = machine.state(StateId(0));
    let Some(Instruction::AsyncCall {
        reject_state: Some(reject_state),
        ..
    }) = entry
        .instructions
        .iter()
        .find(|i| matches!(i, Instruction::AsyncCall { .. }))
    else {
        panic!("expected an async call with a reject destination");
    };

    // The handler assigns the rejection value.
    assert!(machine.state(*reject_state).instructions.iter().any(|i| {
        matches!(
            i,
            Instruction::Assign { target: Expression::LocalReference { name, .. }, .. }
                if name == "err"
        )
    }));
}

#[test]
fn async_call_without_handler_rejects_machine() {
    let body = block(vec![Statement::ExpressionStatement {
        expression: await_call(literal("foo()")),
        source: source(),
    }]);

    let MemberEmission::Machine(machine) = lower_implementation(&body) else {
        panic!("expected a machine");
    };

    let entry = machine.state(StateId(0));
    assert!(entry.instructions.iter().any(|i| matches!(
        i,
        Instruction::AsyncCall { reject_state: None, .. }
    )));
}
