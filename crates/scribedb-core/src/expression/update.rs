//! Update expression compiler.
//!
//! Walks an update initializer (one binding per target property),
//! classifies each binding as a plain value, a self-referential arithmetic
//! assignment, or a marker operation, and emits the SET, ADD, REMOVE, and
//! DELETE clauses in that fixed order.

use super::ast::{BinaryOp, CallOp, Expr, UnaryOp};
use super::coerce::coerce_literal;
use super::condition::evaluate_deferred;
use super::context::TranslationContext;
use super::error::TranslationError;
use crate::schema::PropertyMetadata;

/// Compile an update initializer AST into update expression text.
///
/// Returns an empty string when the initializer has no bindings. Placeholder
/// allocation follows binding order, destination before value; within a
/// self-referential arithmetic assignment the destination's name
/// placeholder is reused for the operand occurrence.
///
/// # Errors
///
/// Returns a [`TranslationError`] for schema violations, partition-key
/// mutations, unsupported constructs, and malformed ASTs.
pub fn compile_update(
    expr: &Expr,
    ctx: &mut TranslationContext<'_>,
) -> Result<String, TranslationError> {
    let Expr::ObjectInit { bindings } = expr else {
        return Err(TranslationError::failure(
            "update input must be an object initializer",
        ));
    };

    let mut set_terms: Vec<String> = Vec::new();
    let mut add_terms: Vec<String> = Vec::new();
    let mut remove_terms: Vec<String> = Vec::new();
    let mut delete_terms: Vec<String> = Vec::new();

    for (property, value) in bindings {
        let metadata = resolve_destination(property, ctx)?;
        let attribute = metadata.map_or(property.as_str(), |m| m.attribute_name.as_str());

        match value {
            Expr::Call {
                target: None,
                op,
                args,
            } if op.is_update_marker() => {
                let placeholder = ctx.alloc_name(attribute);
                match op {
                    CallOp::Remove => remove_terms.push(placeholder),
                    CallOp::Add => {
                        let value_text =
                            marker_argument(*op, args, property, attribute, metadata, ctx)?;
                        add_terms.push(format!("{placeholder} {value_text}"));
                    }
                    CallOp::Delete => {
                        let value_text =
                            marker_argument(*op, args, property, attribute, metadata, ctx)?;
                        delete_terms.push(format!("{placeholder} {value_text}"));
                    }
                    CallOp::IfNotExists => {
                        let value_text =
                            marker_argument(*op, args, property, attribute, metadata, ctx)?;
                        set_terms.push(format!(
                            "{placeholder} = if_not_exists({placeholder}, {value_text})"
                        ));
                    }
                    CallOp::ListAppend => {
                        let value_text =
                            marker_argument(*op, args, property, attribute, metadata, ctx)?;
                        set_terms
                            .push(format!("{placeholder} = list_append({placeholder}, {value_text})"));
                    }
                    CallOp::ListPrepend => {
                        let value_text =
                            marker_argument(*op, args, property, attribute, metadata, ctx)?;
                        set_terms
                            .push(format!("{placeholder} = list_append({value_text}, {placeholder})"));
                    }
                    // is_update_marker() admits only the six arms above.
                    _ => {
                        return Err(TranslationError::unsupported(format!(
                            "method '{op}' in an update value"
                        )));
                    }
                }
            }
            Expr::Call { op, .. } => {
                return Err(TranslationError::unsupported(format!(
                    "method '{op}' in an update value"
                )));
            }
            other => {
                let placeholder = ctx.alloc_name(attribute);
                let value_text =
                    compile_set_value(other, property, attribute, metadata, &placeholder, ctx)?;
                set_terms.push(format!("{placeholder} = {value_text}"));
            }
        }
    }

    let mut clauses: Vec<String> = Vec::new();
    if !set_terms.is_empty() {
        clauses.push(format!("SET {}", set_terms.join(", ")));
    }
    if !add_terms.is_empty() {
        clauses.push(format!("ADD {}", add_terms.join(", ")));
    }
    if !remove_terms.is_empty() {
        clauses.push(format!("REMOVE {}", remove_terms.join(", ")));
    }
    if !delete_terms.is_empty() {
        clauses.push(format!("DELETE {}", delete_terms.join(", ")));
    }
    Ok(clauses.join(" "))
}

/// Look up the destination property and reject partition-key mutations.
fn resolve_destination<'a>(
    property: &str,
    ctx: &TranslationContext<'a>,
) -> Result<Option<&'a PropertyMetadata>, TranslationError> {
    let Some(entity) = ctx.entity() else {
        return Ok(None);
    };
    let Some(metadata) = entity.property(property) else {
        return Err(TranslationError::UnmappedProperty {
            property: property.to_owned(),
            entity: entity.table_name().to_owned(),
        });
    };
    if metadata.is_partition_key {
        return Err(TranslationError::InvalidUpdateOperation {
            property: property.to_owned(),
            reason: "the partition key cannot be written or removed".to_owned(),
        });
    }
    Ok(Some(metadata))
}

/// Compile the single value argument of a marker operation.
fn marker_argument(
    op: CallOp,
    args: &[Expr],
    property: &str,
    attribute: &str,
    metadata: Option<&PropertyMetadata>,
    ctx: &mut TranslationContext<'_>,
) -> Result<String, TranslationError> {
    let Some(arg) = args.first() else {
        return Err(TranslationError::NullArgument {
            operation: op.to_string(),
        });
    };
    let value = match arg {
        Expr::Literal(value) => value.clone(),
        Expr::Computed(deferred) => evaluate_deferred(deferred)?,
        other => {
            return Err(TranslationError::failure(format!(
                "{op}() argument must be a value, got {other:?}"
            )));
        }
    };
    let coerced = coerce_literal(&value, metadata)?;
    Ok(ctx.capture_value(property, attribute, metadata, coerced, false))
}

/// Compile the right-hand side of a SET assignment: a value, another
/// attribute, or arithmetic over them. An operand naming the destination
/// property reuses the destination's placeholder.
fn compile_set_value(
    expr: &Expr,
    dest_property: &str,
    dest_attribute: &str,
    metadata: Option<&PropertyMetadata>,
    dest_placeholder: &str,
    ctx: &mut TranslationContext<'_>,
) -> Result<String, TranslationError> {
    match expr {
        Expr::Literal(value) => {
            let coerced = coerce_literal(value, metadata)?;
            Ok(ctx.capture_value(dest_property, dest_attribute, metadata, coerced, false))
        }
        Expr::Computed(deferred) => {
            let value = evaluate_deferred(deferred)?;
            let coerced = coerce_literal(&value, metadata)?;
            Ok(ctx.capture_value(dest_property, dest_attribute, metadata, coerced, false))
        }
        Expr::Member { path } => {
            if let [single] = path.as_slice() {
                if single == dest_property {
                    return Ok(dest_placeholder.to_owned());
                }
            }
            resolve_source_member(path, ctx)
        }
        Expr::Binary { op, left, right } => match op {
            BinaryOp::Add | BinaryOp::Sub => {
                let left_text = compile_set_value(
                    left,
                    dest_property,
                    dest_attribute,
                    metadata,
                    dest_placeholder,
                    ctx,
                )?;
                let right_text = compile_set_value(
                    right,
                    dest_property,
                    dest_attribute,
                    metadata,
                    dest_placeholder,
                    ctx,
                )?;
                Ok(format!("{left_text} {op} {right_text}"))
            }
            op => Err(TranslationError::unsupported(format!(
                "operator '{op}' in an update value"
            ))),
        },
        Expr::Unary { op: UnaryOp::Neg, .. } => Err(TranslationError::unsupported(
            "unary '-' in an update value",
        )),
        other => Err(TranslationError::failure(format!(
            "unexpected update value: {other:?}"
        ))),
    }
}

/// Render a non-destination attribute referenced in a SET value.
fn resolve_source_member(
    path: &[String],
    ctx: &mut TranslationContext<'_>,
) -> Result<String, TranslationError> {
    let Some(property) = path.first() else {
        return Err(TranslationError::failure("empty attribute path"));
    };
    let attribute: &str = match ctx.entity() {
        None => property,
        Some(entity) => {
            let Some(metadata) = entity.property(property) else {
                return Err(TranslationError::UnmappedProperty {
                    property: property.clone(),
                    entity: entity.table_name().to_owned(),
                });
            };
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
