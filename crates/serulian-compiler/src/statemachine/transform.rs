//! Statement and expression lowering into machine states.

use crate::codedom::{Expression, Statement};

use super::{Instruction, MemberEmission, State, StateId, StateMachine};

/// Lowers a member implementation. Synchronous implementations pass through
/// untouched; suspendable ones become explicit machines.
pub fn lower_implementation(body: &Statement) -> MemberEmission {
    if !body.is_suspendable() {
        return MemberEmission::Simple(body.clone());
    }

    let mut builder = MachineBuilder::new();
    let entry = builder.new_state();
    let end = builder.generate_statement(body, entry);

    // Falling off the end resolves the machine with no value.
    builder.push(end, Instruction::Resolve(None));

    MemberEmission::Machine(StateMachine {
        states: builder.states,
        variables: builder.variables,
    })
}

struct LoopTargets {
    label: Option<String>,
    break_state: StateId,
    continue_state: Option<StateId>,
}

struct MachineBuilder {
    states: Vec<State>,
    variables: Vec<String>,
    loop_targets: Vec<LoopTargets>,
    /// Nearest lexical reject destination, for rejection propagation.
    reject_targets: Vec<StateId>,
    return_counter: usize,
}

impl MachineBuilder {
    fn new() -> Self {
        Self {
            states: Vec::new(),
            variables: Vec::new(),
            loop_targets: Vec::new(),
            reject_targets: Vec::new(),
            return_counter: 0,
        }
    }

    fn new_state(&mut self) -> StateId {
        self.states.push(State::default());
        StateId(self.states.len() - 1)
    }

    fn push(&mut self, state: StateId, instruction: Instruction) {
        self.states[state.0].instructions.push(instruction);
    }

    fn add_variable(&mut self, prefix: &str) -> String {
        let name = format!("{prefix}{}", self.return_counter);
        self.return_counter += 1;
        self.variables.push(name.clone());
        name
    }

    fn current_reject_state(&self) -> Option<StateId> {
        self.reject_targets.last().copied()
    }

    /// Generates the statement into `current`, returning the state where
    /// execution continues.
    fn generate_statement(&mut self, statement: &Statement, current: StateId) -> StateId {
        match statement {
            Statement::Block { statements, .. } => {
                let mut state = current;
                for child in statements {
                    state = self.generate_statement(child, state);
                }
                state
            }

            Statement::VarDefinition {
                name, initializer, ..
            } => {
                self.variables.push(name.clone());
                match initializer {
                    Some(initializer) => {
                        let (value, state) = self.generate_expression(initializer, current);
                        self.push(
                            state,
                            Instruction::VarAssign {
                                name: name.clone(),
                                value,
                            },
                        );
                        state
                    }
                    None => current,
                }
            }

            Statement::Assignment { target, value, .. } => {
                let (value, state) = self.generate_expression(value, current);
                self.push(
                    state,
                    Instruction::Assign {
                        target: target.clone(),
                        value,
                    },
                );
                state
            }

            Statement::Conditional {
                test,
                then_branch,
                else_branch,
                ..
            } => {
                let (test, test_state) = self.generate_expression(test, current);

                let then_state = self.new_state();
                let else_state = self.new_state();
                let after_state = self.new_state();

                self.push(
                    test_state,
                    Instruction::ConditionalJump {
                        test,
                        then_state,
                        else_state,
                    },
                );

                let then_end = self.generate_statement(then_branch, then_state);
                self.push(then_end, Instruction::Jump(after_state));

                match else_branch {
                    Some(else_branch) => {
                        let else_end = self.generate_statement(else_branch, else_state);
                        self.push(else_end, Instruction::Jump(after_state));
                    }
                    None => self.push(else_state, Instruction::Jump(after_state)),
                }

                after_state
            }

            Statement::Loop {
                test,
                stream_value_name,
                body,
                label,
                ..
            } => {
                let test_state = self.new_state();
                let body_state = self.new_state();
                let after_state = self.new_state();

                self.push(current, Instruction::Jump(test_state));

                self.loop_targets.push(LoopTargets {
                    label: label.clone(),
                    break_state: after_state,
                    continue_state: Some(test_state),
                });

                match (test, stream_value_name) {
                    (Some(stream), Some(value_name)) => {
                        self.variables.push(value_name.clone());
                        let (stream, stream_state) =
                            self.generate_expression(stream, test_state);
                        self.push(
                            stream_state,
                            Instruction::IterateStream {
                                stream,
                                value_variable: value_name.clone(),
                                body_state,
                                exit_state: after_state,
                            },
                        );
                    }
                    (Some(test), None) => {
                        let (test, state) = self.generate_expression(test, test_state);
                        self.push(
                            state,
                            Instruction::ConditionalJump {
                                test,
                                then_state: body_state,
                                else_state: after_state,
                            },
                        );
                    }
                    (None, _) => {
                        self.push(test_state, Instruction::Jump(body_state));
                    }
                }

                let body_end = self.generate_statement(body, body_state);
                self.push(body_end, Instruction::Jump(test_state));

                self.loop_targets.pop();
                after_state
            }

            Statement::Switch { test, cases, label, .. } => {
                let after_state = self.new_state();

                self.loop_targets.push(LoopTargets {
                    label: label.clone(),
                    break_state: after_state,
                    continue_state: None,
                });

                let (test, mut state) = match test {
                    Some(test) => {
                        let (test, state) = self.generate_expression(test, current);
                        (Some(test), state)
                    }
                    None => (None, current),
                };

                for (case_test, case_body) in cases {
                    match case_test {
                        Some(case_test) => {
                            let (case_test, test_state) =
                                self.generate_expression(case_test, state);
                            // With a switch expression, compare against it;
                            // otherwise the case test is the condition.
                            let condition = match &test {
                                Some(test) => Expression::BinaryOperation {
                                    left: Box::new(test.clone()),
                                    operator: "==",
                                    right: Box::new(case_test.clone()),
                                    source: case_test.source(),
                                },
                                None => case_test.clone(),
                            };

                            let case_state = self.new_state();
                            let next_state = self.new_state();
                            self.push(
                                test_state,
                                Instruction::ConditionalJump {
                                    test: condition,
                                    then_state: case_state,
                                    else_state: next_state,
                                },
                            );
                            let case_end = self.generate_statement(case_body, case_state);
                            self.push(case_end, Instruction::Jump(after_state));
                            state = next_state;
                        }
                        None => {
                            // Default case.
                            let case_end = self.generate_statement(case_body, state);
                            self.push(case_end, Instruction::Jump(after_state));
                            state = self.new_state();
                        }
                    }
                }

                self.push(state, Instruction::Jump(after_state));
                self.loop_targets.pop();
                after_state
            }

            Statement::Return { value, .. } => {
                let (value, state) = match value {
                    Some(value) => {
                        let (value, state) = self.generate_expression(value, current);
                        (Some(value), state)
                    }
                    None => (None, current),
                };
                self.push(state, Instruction::Resolve(value));
                // Unreachable continuation.
                self.new_state()
            }

            Statement::Reject { value, .. } => {
                let (value, state) = self.generate_expression(value, current);
                match self.current_reject_state() {
                    Some(reject_state) => self.push(state, Instruction::Jump(reject_state)),
                    None => self.push(state, Instruction::Reject(value)),
                }
                self.new_state()
            }

            Statement::Yield { value, .. } => {
                let (value, state) = self.generate_expression(value, current);
                let resume_state = self.new_state();
                self.push(
                    state,
                    Instruction::YieldValue {
                        value,
                        resume_state,
                    },
                );
                resume_state
            }

            Statement::Break { label, .. } => {
                let target = self.find_loop_target(label.as_deref(), true);
                self.push(current, Instruction::Jump(target));
                self.new_state()
            }

            Statement::Continue { label, .. } => {
                let target = self.find_loop_target(label.as_deref(), false);
                self.push(current, Instruction::Jump(target));
                self.new_state()
            }

            Statement::ExpressionStatement { expression, .. } => {
                let (expression, state) = self.generate_expression(expression, current);
                self.push(state, Instruction::Execute(expression));
                state
            }

            Statement::ArrowAwait {
                destination,
                rejection,
                value,
                ..
            } => {
                let (call, call_state) = self.generate_expression(value, current);

                let return_variable = self.add_variable("$returnValue");
                let return_state = self.new_state();

                // A rejection destination becomes the reject target for this
                // call: the rejection value lands in the destination and
                // execution continues.
                let reject_state = match rejection {
                    Some(rejection) => {
                        let rejection_variable = self.add_variable("$rejection");
                        let handler = self.new_state();
                        self.push(
                            handler,
                            Instruction::Assign {
                                target: rejection.clone(),
                                value: Expression::LocalReference {
                                    name: rejection_variable,
                                    source: value.source(),
                                },
                            },
                        );
                        self.push(handler, Instruction::Jump(return_state));
                        Some(handler)
                    }
                    None => self.current_reject_state(),
                };

                self.push(
                    call_state,
                    Instruction::AsyncCall {
                        call,
                        return_state,
                        return_variable: return_variable.clone(),
                        reject_state,
                    },
                );

                if let Some(destination) = destination {
                    self.push(
                        return_state,
                        Instruction::Assign {
                            target: destination.clone(),
                            value: Expression::LocalReference {
                                name: return_variable,
                                source: value.source(),
                            },
                        },
                    );
                }

                return_state
            }

            Statement::With {
                resource, body, ..
            } => {
                let (resource, state) = self.generate_expression(resource, current);
                self.push(state, Instruction::Execute(resource));
                self.generate_statement(body, state)
            }
        }
    }

    /// Generates an expression, splitting states at each suspension point.
    /// Returns the (possibly rewritten) expression and the state in which it
    /// is available.
    fn generate_expression(
        &mut self,
        expression: &Expression,
        current: StateId,
    ) -> (Expression, StateId) {
        if !expression.is_suspendable() {
            return (expression.clone(), current);
        }

        match expression {
            Expression::AwaitPromise { value, source } => {
                let (call, call_state) = self.generate_expression(value, current);

                let return_variable = self.add_variable("$returnValue");
                let return_state = self.new_state();

                self.push(
                    call_state,
                    Instruction::AsyncCall {
                        call,
                        return_state,
                        return_variable: return_variable.clone(),
                        reject_state: self.current_reject_state(),
                    },
                );

                (
                    Expression::LocalReference {
                        name: return_variable,
                        source: *source,
                    },
                    return_state,
                )
            }

            Expression::NominalWrapping {
                value,
                nominal_type,
                source,
            } => {
                let (value, state) = self.generate_expression(value, current);
                (
                    Expression::NominalWrapping {
                        value: Box::new(value),
                        nominal_type: nominal_type.clone(),
                        source: *source,
                    },
                    state,
                )
            }

            Expression::NominalUnwrapping {
                value,
                value_type,
                source,
            } => {
                let (value, state) = self.generate_expression(value, current);
                (
                    Expression::NominalUnwrapping {
                        value: Box::new(value),
                        value_type: value_type.clone(),
                        source: *source,
                    },
                    state,
                )
            }

            Expression::BinaryOperation {
                left,
                operator,
                right,
                source,
            } => {
                let (left, state) = self.generate_expression(left, current);
                let (right, state) = self.generate_expression(right, state);
                (
                    Expression::BinaryOperation {
                        left: Box::new(left),
                        operator,
                        right: Box::new(right),
                        source: *source,
                    },
                    state,
                )
            }

            Expression::UnaryOperation {
                operator,
                child,
                source,
            } => {
                let (child, state) = self.generate_expression(child, current);
                (
                    Expression::UnaryOperation {
                        operator,
                        child: Box::new(child),
                        source: *source,
                    },
                    state,
                )
            }

            Expression::MemberCall {
                child,
                member,
                arguments,
                source,
            } => {
                let (child, state) = self.generate_expression(child, current);
                let (arguments, state) = self.generate_expressions(arguments, state);
                (
                    Expression::MemberCall {
                        child: Box::new(child),
                        member: *member,
                        arguments,
                        source: *source,
                    },
                    state,
                )
            }

            Expression::NullableMemberCall {
                child,
                member,
                arguments,
                source,
            } => {
                let (child, state) = self.generate_expression(child, current);
                let (arguments, state) = self.generate_expressions(arguments, state);
                (
                    Expression::NullableMemberCall {
                        child: Box::new(child),
                        member: *member,
                        arguments,
                        source: *source,
                    },
                    state,
                )
            }

            Expression::MemberReference {
                child,
                member,
                source,
            } => {
                let (child, state) = self.generate_expression(child, current);
                (
                    Expression::MemberReference {
                        child: Box::new(child),
                        member: *member,
                        source: *source,
                    },
                    state,
                )
            }

            Expression::InvokeFunction {
                target,
                arguments,
                source,
            } => {
                let (target, state) = self.generate_expression(target, current);
                let (arguments, state) = self.generate_expressions(arguments, state);
                (
                    Expression::InvokeFunction {
                        target: Box::new(target),
                        arguments,
                        source: *source,
                    },
                    state,
                )
            }

            Expression::RuntimeFunctionCall {
                function,
                arguments,
                source,
            } => {
                let (arguments, state) = self.generate_expressions(arguments, current);
                (
                    Expression::RuntimeFunctionCall {
                        function: *function,
                        arguments,
                        source: *source,
                    },
                    state,
                )
            }

            Expression::ListExpression { elements, source } => {
                let (elements, state) = self.generate_expressions(elements, current);
                (
                    Expression::ListExpression {
                        elements,
                        source: *source,
                    },
                    state,
                )
            }

            Expression::MapExpression { entries, source } => {
                let mut state = current;
                let mut generated = Vec::with_capacity(entries.len());
                for (key, value) in entries {
                    let (key, key_state) = self.generate_expression(key, state);
                    let (value, value_state) = self.generate_expression(value, key_state);
                    state = value_state;
                    generated.push((key, value));
                }
                (
                    Expression::MapExpression {
                        entries: generated,
                        source: *source,
                    },
                    state,
                )
            }

            Expression::ObjectExpression {
                type_ref,
                entries,
                source,
            } => {
                let mut state = current;
                let mut generated = Vec::with_capacity(entries.len());
                for (name, value) in entries {
                    let (value, value_state) = self.generate_expression(value, state);
                    state = value_state;
                    generated.push((name.clone(), value));
                }
                (
                    Expression::ObjectExpression {
                        type_ref: type_ref.clone(),
                        entries: generated,
                        source: *source,
                    },
                    state,
                )
            }

            // Leaves are never suspendable; handled by the early return.
            Expression::LiteralValue { .. }
            | Expression::LocalReference { .. }
            | Expression::StaticMemberReference { .. }
            | Expression::FunctionDefinition { .. } => (expression.clone(), current),
        }
    }

    fn generate_expressions(
        &mut self,
        expressions: &[Expression],
        current: StateId,
    ) -> (Vec<Expression>, StateId) {
        let mut state = current;
        let mut generated = Vec::with_capacity(expressions.len());
        for expression in expressions {
            let (expression, next_state) = self.generate_expression(expression, state);
            state = next_state;
            generated.push(expression);
        }
        (generated, state)
    }

    fn find_loop_target(&self, label: Option<&str>, is_break: bool) -> StateId {
        for target in self.loop_targets.iter().rev() {
            if let Some(label) = label {
                if target.label.as_deref() != Some(label) {
                    continue;
                }
            }
            if is_break {
                return target.break_state;
            }
            if let Some(continue_state) = target.continue_state {
                return continue_state;
            }
        }
        // Scope validation guarantees an enclosing target exists; fall back
        // to the entry state to keep the machine well-formed regardless.
        StateId(0)
    }
}
