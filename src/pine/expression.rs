//! The tagged expression tree reduced by the evaluator.

use crate::pine::value::Value;

/// A Pine expression. Evaluation reduces an expression against an environment
/// value to a value; see [`crate::pine::eval::Evaluator`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Expression {
    /// Evaluates to the carried value.
    Literal(Value),
    /// Evaluates to the current environment value.
    Environment,
    /// Evaluates each element, returns a list value.
    List(Vec<Expression>),
    /// Takes the true branch iff the condition reduces to the canonical
    /// `True` blob; every other value takes the false branch.
    Conditional {
        condition: Box<Expression>,
        if_true: Box<Expression>,
        if_false: Box<Expression>,
    },
    /// Evaluates the argument, then applies the named kernel primitive.
    KernelApplication {
        function: String,
        argument: Box<Expression>,
    },
    /// Evaluates `expression` to a value, decodes it back to an expression,
    /// and evaluates it against the value `environment` reduces to.
    DecodeAndEvaluate {
        expression: Box<Expression>,
        environment: Box<Expression>,
    },
    /// Evaluates the tagged expression; the tag is informational only.
    StringTag {
        tag: String,
        tagged: Box<Expression>,
    },
}

impl Expression {
    pub fn literal(value: Value) -> Self {
        Expression::Literal(value)
    }

    pub fn conditional(condition: Expression, if_true: Expression, if_false: Expression) -> Self {
        Expression::Conditional {
            condition: Box::new(condition),
            if_true: Box::new(if_true),
            if_false: Box::new(if_false),
        }
    }

    pub fn kernel(function: impl Into<String>, argument: Expression) -> Self {
        Expression::KernelApplication {
            function: function.into(),
            argument: Box::new(argument),
        }
    }

    pub fn decode_and_evaluate(expression: Expression, environment: Expression) -> Self {
        Expression::DecodeAndEvaluate {
            expression: Box::new(expression),
            environment: Box::new(environment),
        }
    }

    pub fn string_tag(tag: impl Into<String>, tagged: Expression) -> Self {
        Expression::StringTag {
            tag: tag.into(),
            tagged: Box::new(tagged),
        }
    }
}
