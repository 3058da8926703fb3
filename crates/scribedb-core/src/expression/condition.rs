//! Condition and filter expression compiler.
//!
//! Walks a predicate AST left-to-right, depth-first, validating property
//! references against the context's schema and validation mode, coercing
//! literal operands, and emitting precedence-safe expression text. Every
//! AND/OR parenthesizes both operands unconditionally.

use super::ast::{BinaryOp, CallOp, Expr, LiteralValue, UnaryOp};
use super::coerce::coerce_literal;
use super::context::{TranslationContext, ValidationMode};
use super::error::TranslationError;
use crate::schema::{OperatorKind, PropertyMetadata};

/// Compile a predicate AST into condition/filter expression text.
///
/// Placeholders are allocated into `ctx` in AST-walk encounter order; the
/// same attribute referenced in two independent clauses gets two distinct
/// placeholders.
///
/// # Errors
///
/// Returns a [`TranslationError`] for schema violations, unsupported
/// operators or methods, invalid formats, and malformed ASTs.
pub fn compile_condition(
    expr: &Expr,
    ctx: &mut TranslationContext<'_>,
) -> Result<String, TranslationError> {
    match expr {
        Expr::Binary { op, left, right } => match op {
            BinaryOp::And | BinaryOp::Or => {
                let left_text = compile_condition(left, ctx)?;
                let right_text = compile_condition(right, ctx)?;
                Ok(format!("({left_text}) {op} ({right_text})"))
            }
            op if op.is_comparison() => compile_comparison(*op, left, right, ctx),
            op => Err(TranslationError::unsupported(format!(
                "operator '{op}' in a condition"
            ))),
        },
        Expr::Unary { op, operand } => match op {
            UnaryOp::Not => {
                let inner = compile_condition(operand, ctx)?;
                Ok(format!("NOT ({inner})"))
            }
            UnaryOp::Neg => Err(TranslationError::unsupported(
                "unary '-' applied to a condition operand",
            )),
        },
        Expr::Call { target, op, args } => compile_function(target.as_deref(), *op, args, ctx),
        Expr::Member { .. } | Expr::Literal(_) | Expr::Computed(_) => Err(
            TranslationError::failure("a condition must be a comparison, function, or combination"),
        ),
        Expr::ObjectInit { .. } => Err(TranslationError::failure(
            "an update initializer cannot be used as a condition",
        )),
    }
}

/// Pre-resolved identity of a path operand, used to coerce and label the
/// value on the opposite side of a comparison.
struct PathInfo<'a> {
    property: String,
    attribute: String,
    metadata: Option<&'a PropertyMetadata>,
}

/// Look up path identity without allocating or validating; validation
/// errors surface when the path operand itself is compiled.
fn peek_path<'a>(expr: &Expr, ctx: &TranslationContext<'a>) -> Option<PathInfo<'a>> {
    let path = match expr {
        Expr::Member { path } => path,
        Expr::Call {
            target: Some(target),
            op: CallOp::Size,
            ..
        } => match target.as_ref() {
            Expr::Member { path } => path,
            _ => return None,
        },
        _ => return None,
    };
    path_info(path, ctx)
}

fn path_info<'a>(path: &[String], ctx: &TranslationContext<'a>) -> Option<PathInfo<'a>> {
    let property = path.first()?.clone();
    let metadata = ctx.entity().and_then(|e| e.property(&property));
    let attribute = metadata.map_or_else(|| property.clone(), |m| m.attribute_name.clone());
    Some(PathInfo {
        property,
        attribute,
        metadata,
    })
}

fn compile_comparison(
    op: BinaryOp,
    left: &Expr,
    right: &Expr,
    ctx: &mut TranslationContext<'_>,
) -> Result<String, TranslationError> {
    let Some(op_kind) = comparison_kind(op) else {
        return Err(TranslationError::unsupported(format!(
            "operator '{op}' in a condition"
        )));
    };
    let left_info = peek_path(left, ctx);
    let right_info = peek_path(right, ctx);

    let left_text = compile_operand(left, right_info.as_ref(), op_kind, ctx)?;
    let right_text = compile_operand(right, left_info.as_ref(), op_kind, ctx)?;
    Ok(format!("{left_text} {op} {right_text}"))
}

fn comparison_kind(op: BinaryOp) -> Option<OperatorKind> {
    match op {
        BinaryOp::Eq => Some(OperatorKind::Eq),
        BinaryOp::Ne => Some(OperatorKind::Ne),
        BinaryOp::Lt => Some(OperatorKind::Lt),
        BinaryOp::Le => Some(OperatorKind::Le),
        BinaryOp::Gt => Some(OperatorKind::Gt),
        BinaryOp::Ge => Some(OperatorKind::Ge),
        _ => None,
    }
}

/// Compile one side of a comparison: a member path, `size(path)`, or a
/// value.
fn compile_operand(
    expr: &Expr,
    other: Option<&PathInfo<'_>>,
    op_kind: OperatorKind,
    ctx: &mut TranslationContext<'_>,
) -> Result<String, TranslationError> {
    match expr {
        Expr::Member { path } => resolve_member(path, op_kind, ctx),
        Expr::Call {
            target: Some(target),
            op: CallOp::Size,
            args,
        } if args.is_empty() => {
            let Expr::Member { path } = target.as_ref() else {
                return Err(TranslationError::failure(
                    "size() must be applied to an attribute path",
                ));
            };
            let rendered = resolve_member(path, OperatorKind::Size, ctx)?;
            Ok(format!("size({rendered})"))
        }
        Expr::Literal(value) => capture_operand(value, other, ctx),
        Expr::Computed(deferred) => {
            let value = evaluate_deferred(deferred)?;
            capture_operand(&value, other, ctx)
        }
        Expr::Binary { op, .. } => Err(TranslationError::unsupported(format!(
            "operator '{op}' in a comparison operand"
        ))),
        Expr::Unary { op, .. } => Err(TranslationError::unsupported(format!(
            "unary '{op}' in a comparison operand"
        ))),
        other => Err(TranslationError::failure(format!(
            "unexpected comparison operand: {other:?}"
        ))),
    }
}

fn capture_operand(
    value: &LiteralValue,
    other: Option<&PathInfo<'_>>,
    ctx: &mut TranslationContext<'_>,
) -> Result<String, TranslationError> {
    let metadata = other.and_then(|info| info.metadata);
    let coerced = coerce_literal(value, metadata)?;
    let (property, attribute) = other.map_or(("", ""), |info| {
        (info.property.as_str(), info.attribute.as_str())
    });
    Ok(ctx.capture_value(property, attribute, metadata, coerced, true))
}

pub(crate) fn evaluate_deferred(
    deferred: &super::ast::Deferred,
) -> Result<LiteralValue, TranslationError> {
    deferred
        .evaluate()
        .map_err(|source| TranslationError::TranslationFailure {
            message: "failed to evaluate captured sub-expression".to_owned(),
            source: Some(source),
        })
}

/// Validate a member path against the schema and validation mode, then
/// allocate its name placeholders.
fn resolve_member(
    path: &[String],
    op_kind: OperatorKind,
    ctx: &mut TranslationContext<'_>,
) -> Result<String, TranslationError> {
    let Some(property) = path.first() else {
        return Err(TranslationError::failure("empty attribute path"));
    };

    let attribute: &str = match ctx.entity() {
        // No schema at all: validation is skipped, raw names pass through.
        None => property,
        Some(entity) => {
            let Some(metadata) = entity.property(property) else {
                return Err(TranslationError::UnmappedProperty {
                    property: property.clone(),
                    entity: entity.table_name().to_owned(),
                });
            };
            if ctx.mode() == ValidationMode::KeysOnly && !metadata.is_key() {
                return Err(TranslationError::InvalidKeyExpression {
                    property: property.clone(),
                });
            }
            if metadata.operators.is_empty() {
                return Err(TranslationError::unsupported(format!(
                    "property '{property}' is not usable in any predicate"
                )));
            }
            if !metadata.operators.contains(&op_kind) {
                return Err(TranslationError::unsupported(format!(
                    "operator '{}' is not permitted on property '{property}'",
                    op_kind.name()
                )));
            }
            &metadata.attribute_name
        }
    };

    let mut rendered = ctx.alloc_name(attribute);
    for segment in &path[1..] {
        let placeholder = ctx.alloc_name(segment);
        rendered.push('.');
        rendered.push_str(&placeholder);
    }
    Ok(rendered)
}

fn compile_function(
    target: Option<&Expr>,
    op: CallOp,
    args: &[Expr],
    ctx: &mut TranslationContext<'_>,
) -> Result<String, TranslationError> {
    if op.is_update_marker() {
        return Err(TranslationError::unsupported(format!(
            "update marker '{op}' in a condition"
        )));
    }

    let Some(Expr::Member { path }) = target else {
        return Err(TranslationError::failure(format!(
            "{op}() must be applied to an attribute path"
        )));
    };
    let info = path_info(path, ctx);

    match op {
        CallOp::BeginsWith | CallOp::Contains => {
            let op_kind = if op == CallOp::BeginsWith {
                OperatorKind::BeginsWith
            } else {
                OperatorKind::Contains
            };
            let rendered = resolve_member(path, op_kind, ctx)?;
            let Some(arg) = args.first() else {
                return Err(TranslationError::NullArgument {
                    operation: op.to_string(),
                });
            };
            let value = compile_value_argument(arg, info.as_ref(), ctx)?;
            Ok(format!("{op}({rendered}, {value})"))
        }
        CallOp::Between => {
            let rendered = resolve_member(path, OperatorKind::Between, ctx)?;
            let (Some(low), Some(high)) = (args.first(), args.get(1)) else {
                return Err(TranslationError::NullArgument {
                    operation: op.to_string(),
                });
            };
            let low_text = compile_value_argument(low, info.as_ref(), ctx)?;
            let high_text = compile_value_argument(high, info.as_ref(), ctx)?;
            Ok(format!("{rendered} BETWEEN {low_text} AND {high_text}"))
        }
        CallOp::AttributeExists | CallOp::AttributeNotExists => {
            let rendered = resolve_member(path, OperatorKind::Exists, ctx)?;
            Ok(format!("{op}({rendered})"))
        }
        CallOp::Size => Err(TranslationError::unsupported(
            "size() must be composed with a comparison",
        )),
        // Markers were rejected above.
        _ => Err(TranslationError::unsupported(format!("method '{op}'"))),
    }
}

fn compile_value_argument(
    expr: &Expr,
    info: Option<&PathInfo<'_>>,
    ctx: &mut TranslationContext<'_>,
) -> Result<String, TranslationError> {
    match expr {
        Expr::Literal(value) => capture_operand(value, info, ctx),
        Expr::Computed(deferred) => {
            let value = evaluate_deferred(deferred)?;
            capture_operand(&value, info, ctx)
        }
        other => Err(TranslationError::failure(format!(
            "function argument must be a value, got {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use scribedb_model::AttributeValue;

    use super::*;
    use crate::expression::ast::{attr, lit, neg, not, remove};
    use crate::schema::{EntityMetadata, OperatorKind, PropertyMetadata, PropertyType};

    fn sample_entity() -> EntityMetadata {
        EntityMetadata::new(
            "users",
            vec![
                PropertyMetadata::builder()
                    .name("id")
                    .attribute_name("pk")
                    .value_type(PropertyType::String)
                    .is_partition_key(true)
                    .operators(OperatorKind::all())
                    .build(),
                PropertyMetadata::builder()
                    .name("created")
                    .attribute_name("sk")
                    .value_type(PropertyType::Timestamp)
                    .is_sort_key(true)
                    .operators(OperatorKind::all())
                    .build(),
                PropertyMetadata::builder()
                    .name("age")
                    .attribute_name("age")
                    .value_type(PropertyType::Number)
                    .operators(OperatorKind::all())
                    .build(),
                PropertyMetadata::builder()
                    .name("name")
                    .attribute_name("user_name")
                    .value_type(PropertyType::String)
                    .operators(OperatorKind::all())
                    .build(),
                PropertyMetadata::builder()
                    .name("profile")
                    .attribute_name("profile")
                    .value_type(PropertyType::Map)
                    .build(),
                PropertyMetadata::builder()
                    .name("nickname")
                    .attribute_name("nickname")
                    .value_type(PropertyType::String)
                    .operators(OperatorKind::comparisons())
                    .build(),
            ],
        )
    }

    #[test]
    fn test_should_compile_equality_comparison() {
        let entity = sample_entity();
        let mut ctx = TranslationContext::for_entity(&entity);
        let text = compile_condition(&attr("age").eq(lit(25)), &mut ctx).unwrap();

        assert_eq!(text, "#attr0 = :p0");
        assert_eq!(ctx.names().get("#attr0").unwrap(), "age");
        assert_eq!(
            ctx.values().get(":p0").unwrap(),
            &AttributeValue::N("25".to_owned())
        );
    }

    #[test]
    fn test_should_parenthesize_and_combination() {
        let entity = sample_entity();
        let mut ctx = TranslationContext::for_entity(&entity);
        let expr = attr("age").gt(lit(18)).and(attr("age").lt(lit(65)));
        let text = compile_condition(&expr, &mut ctx).unwrap();

        assert_eq!(text, "(#attr0 > :p0) AND (#attr1 < :p1)");
        // Two independent clauses: two distinct placeholders for the same
        // attribute.
        assert_eq!(ctx.names().get("#attr0").unwrap(), "age");
        assert_eq!(ctx.names().get("#attr1").unwrap(), "age");
    }

    #[test]
    fn test_should_parenthesize_or_combination() {
        let entity = sample_entity();
        let mut ctx = TranslationContext::for_entity(&entity);
        let expr = attr("age").lt(lit(18)).or(attr("age").gt(lit(65)));
        let text = compile_condition(&expr, &mut ctx).unwrap();
        assert_eq!(text, "(#attr0 < :p0) OR (#attr1 > :p1)");
    }

    #[test]
    fn test_should_compile_not() {
        let entity = sample_entity();
        let mut ctx = TranslationContext::for_entity(&entity);
        let text = compile_condition(&not(attr("age").gt(lit(18))), &mut ctx).unwrap();
        assert_eq!(text, "NOT (#attr0 > :p0)");
    }

    #[test]
    fn test_should_compile_begins_with() {
        let entity = sample_entity();
        let mut ctx = TranslationContext::for_entity(&entity);
        let text =
            compile_condition(&attr("name").begins_with(lit("John")), &mut ctx).unwrap();

        assert_eq!(text, "begins_with(#attr0, :p0)");
        assert_eq!(ctx.names().get("#attr0").unwrap(), "user_name");
        assert_eq!(
            ctx.values().get(":p0").unwrap(),
            &AttributeValue::S("John".to_owned())
        );
    }

    #[test]
    fn test_should_compile_contains() {
        let entity = sample_entity();
        let mut ctx = TranslationContext::for_entity(&entity);
        let text = compile_condition(&attr("name").contains(lit("oh")), &mut ctx).unwrap();
        assert_eq!(text, "contains(#attr0, :p0)");
    }

    #[test]
    fn test_should_compile_between() {
        let entity = sample_entity();
        let mut ctx = TranslationContext::for_entity(&entity);
        let text =
            compile_condition(&attr("age").between(lit(18), lit(65)), &mut ctx).unwrap();

        assert_eq!(text, "#attr0 BETWEEN :p0 AND :p1");
        assert_eq!(
            ctx.values().get(":p0").unwrap(),
            &AttributeValue::N("18".to_owned())
        );
        assert_eq!(
            ctx.values().get(":p1").unwrap(),
            &AttributeValue::N("65".to_owned())
        );
    }

    #[test]
    fn test_should_compile_attribute_exists() {
        let entity = sample_entity();
        let mut ctx = TranslationContext::for_entity(&entity);
        let text = compile_condition(&attr("age").exists(), &mut ctx).unwrap();
        assert_eq!(text, "attribute_exists(#attr0)");
    }

    #[test]
    fn test_should_compile_attribute_not_exists() {
        let entity = sample_entity();
        let mut ctx = TranslationContext::for_entity(&entity);
        let text = compile_condition(&attr("age").not_exists(), &mut ctx).unwrap();
        assert_eq!(text, "attribute_not_exists(#attr0)");
    }

    #[test]
    fn test_should_compile_size_comparison() {
        let entity = sample_entity();
        let mut ctx = TranslationContext::for_entity(&entity);
        let text = compile_condition(&attr("name").size().gt(lit(3)), &mut ctx).unwrap();
        assert_eq!(text, "size(#attr0) > :p0");
    }

    #[test]
    fn test_should_use_raw_names_without_schema() {
        let mut ctx = TranslationContext::new();
        let text = compile_condition(&attr("anything").eq(lit(1)), &mut ctx).unwrap();
        assert_eq!(text, "#attr0 = :p0");
        assert_eq!(ctx.names().get("#attr0").unwrap(), "anything");
    }

    #[test]
    fn test_should_reject_unmapped_property() {
        let entity = sample_entity();
        let mut ctx = TranslationContext::for_entity(&entity);
        let err = compile_condition(&attr("missing").eq(lit(1)), &mut ctx).unwrap_err();
        match err {
            TranslationError::UnmappedProperty { property, entity } => {
                assert_eq!(property, "missing");
                assert_eq!(entity, "users");
            }
            other => panic!("expected UnmappedProperty, got {other:?}"),
        }
    }

    #[test]
    fn test_should_reject_non_key_property_in_keys_only_mode() {
        let entity = sample_entity();
        let mut ctx =
            TranslationContext::for_entity(&entity).with_mode(ValidationMode::KeysOnly);
        let err = compile_condition(&attr("age").eq(lit(1)), &mut ctx).unwrap_err();
        assert!(
            matches!(err, TranslationError::InvalidKeyExpression { property } if property == "age")
        );
    }

    #[test]
    fn test_should_accept_key_properties_in_keys_only_mode() {
        let entity = sample_entity();
        let mut ctx =
            TranslationContext::for_entity(&entity).with_mode(ValidationMode::KeysOnly);
        let expr = attr("id")
            .eq(lit("u1"))
            .and(attr("created").begins_with(lit("2024")));
        let text = compile_condition(&expr, &mut ctx).unwrap();

        assert_eq!(text, "(#attr0 = :p0) AND (begins_with(#attr1, :p1))");
        let attributes: Vec<_> = ctx.names().values().cloned().collect();
        assert_eq!(attributes, vec!["pk", "sk"]);
    }

    #[test]
    fn test_should_reject_non_queryable_property_for_every_operator() {
        let entity = sample_entity();
        let predicates = [
            attr("profile").eq(lit(1)),
            attr("profile").ne(lit(1)),
            attr("profile").lt(lit(1)),
            attr("profile").gt(lit(1)),
            attr("profile").between(lit(1), lit(2)),
            attr("profile").begins_with(lit("x")),
            attr("profile").contains(lit("x")),
            attr("profile").exists(),
            attr("profile").size().gt(lit(0)),
        ];
        for predicate in predicates {
            let mut ctx = TranslationContext::for_entity(&entity);
            let err = compile_condition(&predicate, &mut ctx).unwrap_err();
            assert!(
                matches!(err, TranslationError::UnsupportedExpression { ref construct }
                    if construct.contains("profile")),
                "expected non-queryable error, got {err:?}"
            );
        }
    }

    #[test]
    fn test_should_reject_operator_outside_permitted_set() {
        let entity = sample_entity();
        let mut ctx = TranslationContext::for_entity(&entity);
        // nickname permits comparisons only.
        let err =
            compile_condition(&attr("nickname").begins_with(lit("J")), &mut ctx).unwrap_err();
        match err {
            TranslationError::UnsupportedExpression { construct } => {
                assert!(construct.contains("begins_with"));
                assert!(construct.contains("nickname"));
            }
            other => panic!("expected UnsupportedExpression, got {other:?}"),
        }
    }

    #[test]
    fn test_should_reject_modulo_operator() {
        let entity = sample_entity();
        let mut ctx = TranslationContext::for_entity(&entity);
        let err =
            compile_condition(&attr("age").modulo(lit(2)).eq(lit(0)), &mut ctx).unwrap_err();
        match err {
            TranslationError::UnsupportedExpression { construct } => {
                assert!(construct.contains('%'));
            }
            other => panic!("expected UnsupportedExpression, got {other:?}"),
        }
    }

    #[test]
    fn test_should_reject_modulo_as_condition_root() {
        let entity = sample_entity();
        let mut ctx = TranslationContext::for_entity(&entity);
        let err = compile_condition(&attr("age").modulo(lit(2)), &mut ctx).unwrap_err();
        match err {
            TranslationError::UnsupportedExpression { construct } => {
                assert!(construct.contains('%'));
            }
            other => panic!("expected UnsupportedExpression, got {other:?}"),
        }
    }

    #[test]
    fn test_should_reject_negation_of_mapped_field() {
        let entity = sample_entity();
        let mut ctx = TranslationContext::for_entity(&entity);
        let err = compile_condition(&neg(attr("age").gt(lit(0))), &mut ctx).unwrap_err();
        assert!(matches!(err, TranslationError::UnsupportedExpression { .. }));
    }

    #[test]
    fn test_should_reject_update_marker_in_condition() {
        let entity = sample_entity();
        let mut ctx = TranslationContext::for_entity(&entity);
        let err = compile_condition(&remove(), &mut ctx).unwrap_err();
        match err {
            TranslationError::UnsupportedExpression { construct } => {
                assert!(construct.contains("remove"));
            }
            other => panic!("expected UnsupportedExpression, got {other:?}"),
        }
    }

    #[test]
    fn test_should_reject_bare_literal_condition() {
        let mut ctx = TranslationContext::new();
        let err = compile_condition(&lit(true), &mut ctx).unwrap_err();
        assert!(matches!(err, TranslationError::TranslationFailure { .. }));
    }

    #[test]
    fn test_should_fold_computed_operand() {
        let entity = sample_entity();
        let mut ctx = TranslationContext::for_entity(&entity);
        let expr = attr("age").gt(crate::expression::ast::computed(|| {
            Ok(LiteralValue::Int(30))
        }));
        let text = compile_condition(&expr, &mut ctx).unwrap();
        assert_eq!(text, "#attr0 > :p0");
        assert_eq!(
            ctx.values().get(":p0").unwrap(),
            &AttributeValue::N("30".to_owned())
        );
    }

    #[test]
    fn test_should_surface_computed_failure_with_source() {
        let entity = sample_entity();
        let mut ctx = TranslationContext::for_entity(&entity);
        let expr = attr("age").gt(crate::expression::ast::computed(|| {
            Err("boom".to_owned().into())
        }));
        let err = compile_condition(&expr, &mut ctx).unwrap_err();
        match err {
            TranslationError::TranslationFailure { source, .. } => {
                assert_eq!(source.unwrap().to_string(), "boom");
            }
            other => panic!("expected TranslationFailure, got {other:?}"),
        }
    }

    #[test]
    fn test_should_compile_nested_member_path() {
        let entity = sample_entity();
        let mut ctx = TranslationContext::for_entity(&entity);
        let expr = crate::expression::ast::attr_path(["age", "inner"]).eq(lit(1));
        let text = compile_condition(&expr, &mut ctx).unwrap();
        assert_eq!(text, "#attr0.#attr1 = :p0");
        assert_eq!(ctx.names().get("#attr1").unwrap(), "inner");
    }
}
