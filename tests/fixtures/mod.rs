#![allow(dead_code)] // not every test binary uses every fixture app

//! Fixture apps for the integration suite, built directly as encoded
//! expression values the way the external compiler would emit them.
//!
//! Host calling convention: a function is applied with environment
//! `[state, [args...]]` and must return `[newState, response]`. States and
//! events are tagged JSON values, so an integer state is `["int", blob]`.

use pine_host::{Expression, TreeNode, Value, encode_expression, int_value, string_value};

/// `["int", <e>]`
fn tag_int(e: Expression) -> Expression {
    Expression::List(vec![Expression::Literal(string_value("int")), e])
}

/// Second element of a list: `list_head(skip(1, of))`.
fn second(of: Expression) -> Expression {
    Expression::kernel(
        "list_head",
        Expression::kernel(
            "skip",
            Expression::List(vec![Expression::Literal(int_value(1)), of]),
        ),
    )
}

/// The state slot of the environment.
fn state_expr() -> Expression {
    Expression::kernel("list_head", Expression::Environment)
}

/// The first argument: `list_head(second(env))`.
fn arg0_expr() -> Expression {
    Expression::kernel("list_head", second(Expression::Environment))
}

/// The encoded JSON `null`, used as the commands value.
fn null_value() -> Value {
    Value::list(vec![string_value("null"), Value::empty_list()])
}

fn function_file(body: &Expression) -> TreeNode {
    let function_value = encode_expression(body);
    TreeNode::blob(serde_json::to_vec(&function_value).expect("serialize function value"))
}

/// `init`: integer state `initial`, null commands.
fn init_body(initial: i64) -> Expression {
    Expression::List(vec![
        tag_int(Expression::Literal(int_value(initial))),
        Expression::Literal(null_value()),
    ])
}

/// `processEvent`-shaped adder: new state = state + event, response = new
/// total.
fn adder_body() -> Expression {
    let sum = Expression::kernel(
        "add_int",
        Expression::List(vec![second(state_expr()), second(arg0_expr())]),
    );
    let tagged = tag_int(sum);
    Expression::List(vec![tagged.clone(), tagged])
}

/// `migrate`: prior integer state times `factor`, null commands.
fn migrate_body(factor: i64) -> Expression {
    let product = Expression::kernel(
        "mul_int",
        Expression::List(vec![second(arg0_expr()), Expression::Literal(int_value(factor))]),
    );
    Expression::List(vec![tag_int(product), Expression::Literal(null_value())])
}

/// A function that violates the `[newState, response]` return convention.
fn broken_body() -> Expression {
    Expression::Literal(int_value(1))
}

/// Counter app: `init` at 0, `processEvent` adds the event to the state,
/// plus the same adder exposed as `add` for apply-function-on-db.
pub fn counter_app_tree() -> TreeNode {
    TreeNode::tree(vec![
        ("init.pine", function_file(&init_body(0))),
        ("processEvent.pine", function_file(&adder_body())),
        ("add.pine", function_file(&adder_body())),
        ("broken.pine", function_file(&broken_body())),
    ])
}

/// Successor app: migrates the prior integer state by multiplying it.
pub fn multiplier_app_tree(factor: i64) -> TreeNode {
    TreeNode::tree(vec![
        ("init.pine", function_file(&init_body(0))),
        ("processEvent.pine", function_file(&adder_body())),
        ("migrate.pine", function_file(&migrate_body(factor))),
    ])
}

/// An app without a `migrate` entry point; deploy-and-migrate must fail.
pub fn unmigratable_app_tree() -> TreeNode {
    TreeNode::tree(vec![
        ("init.pine", function_file(&init_body(0))),
        ("processEvent.pine", function_file(&adder_body())),
    ])
}
