//! Bijection between expressions and values.
//!
//! Each expression encodes as a two-element list `[tagNameString, payload]`
//! where the payload is a record: a list of `[fieldNameString, fieldValue]`
//! pairs in declaration order. Strings encode as lists of per-code-point
//! blobs. Decoders are defensive; malformed encodings produce a descriptive
//! error chain, never a panic.

use thiserror::Error;

use crate::pine::expression::Expression;
use crate::pine::value::{Value, string_from_value, string_value};

const TAG_LITERAL: &str = "literal";
const TAG_ENVIRONMENT: &str = "environment";
const TAG_LIST: &str = "list";
const TAG_CONDITIONAL: &str = "conditional";
const TAG_KERNEL_APPLICATION: &str = "kernelApplication";
const TAG_DECODE_AND_EVALUATE: &str = "decodeAndEvaluate";
const TAG_STRING_TAG: &str = "stringTag";

#[derive(Debug, Error)]
pub enum DecodeExprError {
    #[error("expected a two-element list of tag and payload, got {got}")]
    NotATaggedList { got: String },
    #[error("tag name is not a string value")]
    TagNameNotAString,
    #[error("unexpected tag name: {tag}")]
    UnexpectedTagName { tag: String },
    #[error("payload of '{tag}' is not a record: {reason}")]
    PayloadNotARecord { tag: String, reason: String },
    #[error("record of '{tag}' is missing field '{field}'")]
    MissingField { tag: String, field: String },
    #[error("field '{field}' of '{tag}' is invalid: {reason}")]
    InvalidField {
        tag: String,
        field: String,
        reason: String,
    },
    #[error("failed to decode field '{field}' of '{tag}': {source}")]
    Field {
        tag: String,
        field: String,
        #[source]
        source: Box<DecodeExprError>,
    },
}

/// Encode an expression as a value.
pub fn encode_expression(expression: &Expression) -> Value {
    match expression {
        Expression::Literal(value) => tagged(TAG_LITERAL, vec![("value", value.clone())]),
        Expression::Environment => tagged(TAG_ENVIRONMENT, vec![]),
        Expression::List(items) => tagged(
            TAG_LIST,
            vec![(
                "items",
                Value::list(items.iter().map(encode_expression).collect()),
            )],
        ),
        Expression::Conditional {
            condition,
            if_true,
            if_false,
        } => tagged(
            TAG_CONDITIONAL,
            vec![
                ("condition", encode_expression(condition)),
                ("ifTrue", encode_expression(if_true)),
                ("ifFalse", encode_expression(if_false)),
            ],
        ),
        Expression::KernelApplication { function, argument } => tagged(
            TAG_KERNEL_APPLICATION,
            vec![
                ("functionName", string_value(function)),
                ("argument", encode_expression(argument)),
            ],
        ),
        Expression::DecodeAndEvaluate {
            expression,
            environment,
        } => tagged(
            TAG_DECODE_AND_EVALUATE,
            vec![
                ("expression", encode_expression(expression)),
                ("environment", encode_expression(environment)),
            ],
        ),
        Expression::StringTag { tag, tagged: inner } => tagged(
            TAG_STRING_TAG,
            vec![
                ("tag", string_value(tag)),
                ("tagged", encode_expression(inner)),
            ],
        ),
    }
}

/// Decode a value back to an expression.
pub fn decode_expression(value: &Value) -> Result<Expression, DecodeExprError> {
    let (tag, payload) = split_tagged(value)?;
    let record = Record::parse(&tag, payload)?;

    match tag.as_str() {
        TAG_LITERAL => Ok(Expression::Literal(record.field(&tag, "value")?.clone())),
        TAG_ENVIRONMENT => Ok(Expression::Environment),
        TAG_LIST => {
            let items = record.field(&tag, "items")?;
            let items = items
                .as_list()
                .ok_or_else(|| DecodeExprError::InvalidField {
                    tag: tag.clone(),
                    field: "items".into(),
                    reason: "expected a list".into(),
                })?;
            let decoded = items
                .iter()
                .map(|item| decode_expression(item).map_err(|e| field_error(&tag, "items", e)))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Expression::List(decoded))
        }
        TAG_CONDITIONAL => Ok(Expression::Conditional {
            condition: Box::new(record.expression_field(&tag, "condition")?),
            if_true: Box::new(record.expression_field(&tag, "ifTrue")?),
            if_false: Box::new(record.expression_field(&tag, "ifFalse")?),
        }),
        TAG_KERNEL_APPLICATION => Ok(Expression::KernelApplication {
            function: record.string_field(&tag, "functionName")?,
            argument: Box::new(record.expression_field(&tag, "argument")?),
        }),
        TAG_DECODE_AND_EVALUATE => Ok(Expression::DecodeAndEvaluate {
            expression: Box::new(record.expression_field(&tag, "expression")?),
            environment: Box::new(record.expression_field(&tag, "environment")?),
        }),
        TAG_STRING_TAG => Ok(Expression::StringTag {
            tag: record.string_field(&tag, "tag")?,
            tagged: Box::new(record.expression_field(&tag, "tagged")?),
        }),
        _ => Err(DecodeExprError::UnexpectedTagName { tag }),
    }
}

fn tagged(tag: &str, fields: Vec<(&str, Value)>) -> Value {
    let record = fields
        .into_iter()
        .map(|(name, value)| Value::list(vec![string_value(name), value]))
        .collect();
    Value::list(vec![string_value(tag), Value::list(record)])
}

fn split_tagged(value: &Value) -> Result<(String, &Value), DecodeExprError> {
    let items = value.as_list().ok_or_else(|| DecodeExprError::NotATaggedList {
        got: "a blob".into(),
    })?;
    let [tag, payload] = items else {
        return Err(DecodeExprError::NotATaggedList {
            got: format!("a list of {} elements", items.len()),
        });
    };
    let tag = string_from_value(tag).ok_or(DecodeExprError::TagNameNotAString)?;
    Ok((tag, payload))
}

fn field_error(tag: &str, field: &str, source: DecodeExprError) -> DecodeExprError {
    DecodeExprError::Field {
        tag: tag.to_string(),
        field: field.to_string(),
        source: Box::new(source),
    }
}

/// An order-preserving record payload: `[[nameString, fieldValue], ...]`.
struct Record<'a> {
    fields: Vec<(String, &'a Value)>,
}

impl<'a> Record<'a> {
    fn parse(tag: &str, payload: &'a Value) -> Result<Self, DecodeExprError> {
        let entries = payload
            .as_list()
            .ok_or_else(|| DecodeExprError::PayloadNotARecord {
                tag: tag.to_string(),
                reason: "payload is a blob".into(),
            })?;
        let mut fields = Vec::with_capacity(entries.len());
        for entry in entries {
            let pair = entry
                .as_list()
                .ok_or_else(|| DecodeExprError::PayloadNotARecord {
                    tag: tag.to_string(),
                    reason: "record entry is a blob".into(),
                })?;
            let [name, value] = pair else {
                return Err(DecodeExprError::PayloadNotARecord {
                    tag: tag.to_string(),
                    reason: format!("record entry has {} elements", pair.len()),
                });
            };
            let name = string_from_value(name).ok_or_else(|| DecodeExprError::PayloadNotARecord {
                tag: tag.to_string(),
                reason: "record field name is not a string".into(),
            })?;
            fields.push((name, value));
        }
        Ok(Self { fields })
    }

    fn field(&self, tag: &str, name: &str) -> Result<&'a Value, DecodeExprError> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| *value)
            .ok_or_else(|| DecodeExprError::MissingField {
                tag: tag.to_string(),
                field: name.to_string(),
            })
    }

    fn string_field(&self, tag: &str, name: &str) -> Result<String, DecodeExprError> {
        let value = self.field(tag, name)?;
        string_from_value(value).ok_or_else(|| DecodeExprError::InvalidField {
            tag: tag.to_string(),
            field: name.to_string(),
            reason: "expected a string value".into(),
        })
    }

    fn expression_field(&self, tag: &str, name: &str) -> Result<Expression, DecodeExprError> {
        decode_expression(self.field(tag, name)?).map_err(|e| field_error(tag, name, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pine::value::int_value;

    fn roundtrip(expression: Expression) {
        let encoded = encode_expression(&expression);
        let decoded = decode_expression(&encoded).expect("decode");
        assert_eq!(decoded, expression);
    }

    #[test]
    fn roundtrip_all_variants() {
        roundtrip(Expression::Literal(int_value(42)));
        roundtrip(Expression::Environment);
        roundtrip(Expression::List(vec![
            Expression::Literal(string_value("x")),
            Expression::Environment,
        ]));
        roundtrip(Expression::conditional(
            Expression::Literal(Value::true_value()),
            Expression::Literal(int_value(1)),
            Expression::Literal(int_value(2)),
        ));
        roundtrip(Expression::kernel(
            "skip",
            Expression::List(vec![
                Expression::Literal(int_value(2)),
                Expression::Environment,
            ]),
        ));
        roundtrip(Expression::decode_and_evaluate(
            Expression::Literal(Value::empty_list()),
            Expression::Environment,
        ));
        roundtrip(Expression::string_tag(
            "note",
            Expression::Literal(Value::empty_list()),
        ));
    }

    #[test]
    fn decode_rejects_blob() {
        let err = decode_expression(&Value::blob(vec![1u8])).unwrap_err();
        assert!(matches!(err, DecodeExprError::NotATaggedList { .. }));
    }

    #[test]
    fn decode_rejects_unknown_tag() {
        let bogus = Value::list(vec![string_value("lambda"), Value::empty_list()]);
        let err = decode_expression(&bogus).unwrap_err();
        assert!(matches!(
            err,
            DecodeExprError::UnexpectedTagName { tag } if tag == "lambda"
        ));
    }

    #[test]
    fn decode_rejects_wrong_arity() {
        let bogus = Value::list(vec![string_value(TAG_LITERAL)]);
        let err = decode_expression(&bogus).unwrap_err();
        assert!(matches!(err, DecodeExprError::NotATaggedList { .. }));
    }

    #[test]
    fn decode_rejects_missing_field() {
        let bogus = Value::list(vec![string_value(TAG_LITERAL), Value::empty_list()]);
        let err = decode_expression(&bogus).unwrap_err();
        assert!(matches!(
            err,
            DecodeExprError::MissingField { field, .. } if field == "value"
        ));
    }

    #[test]
    fn decode_rejects_non_string_field_name() {
        let entry = Value::list(vec![int_value(1), Value::empty_list()]);
        let bogus = Value::list(vec![string_value(TAG_LITERAL), Value::list(vec![entry])]);
        let err = decode_expression(&bogus).unwrap_err();
        assert!(matches!(err, DecodeExprError::PayloadNotARecord { .. }));
    }

    #[test]
    fn nested_decode_failures_chain() {
        let inner = Value::list(vec![string_value("bogusTag"), Value::empty_list()]);
        let record = Value::list(vec![Value::list(vec![string_value("items"), Value::list(vec![inner])])]);
        let outer = Value::list(vec![string_value(TAG_LIST), record]);
        let err = decode_expression(&outer).unwrap_err();
        let message = format!("{err}");
        assert!(message.contains("items"), "message: {message}");
        let chain = format!("{:?}", err);
        assert!(chain.contains("bogusTag"), "chain: {chain}");
    }
}
