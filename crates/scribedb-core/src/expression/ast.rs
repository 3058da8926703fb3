//! AST types for predicate and update-initializer expressions.
//!
//! The AST is a closed tagged union constructed through the builder API and
//! consumed by the condition and update compilers. Update markers (`add`,
//! `remove`, `delete`, `if_not_exists`, `list_append`, `list_prepend`) are
//! tag variants recognized structurally; they are never executable.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Result of a deferred caller-supplied evaluation.
pub type CaptureResult = Result<LiteralValue, Box<dyn std::error::Error + Send + Sync>>;

/// A deferred evaluation of a captured sub-expression.
///
/// Evaluated eagerly (constant-folded) at translation time; a failure
/// surfaces as a translation error carrying the caller's error as source.
#[derive(Clone)]
pub struct Deferred(Arc<dyn Fn() -> CaptureResult + Send + Sync>);

impl Deferred {
    /// Wrap a caller-supplied evaluation.
    pub fn new(f: impl Fn() -> CaptureResult + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Run the evaluation.
    ///
    /// # Errors
    ///
    /// Propagates whatever error the caller's closure returns.
    pub fn evaluate(&self) -> CaptureResult {
        (self.0)()
    }
}

impl fmt::Debug for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Deferred(..)")
    }
}

/// A runtime literal captured into an expression, prior to coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    /// Null / missing value.
    Null,
    /// Boolean.
    Bool(bool),
    /// String, passed through verbatim.
    String(String),
    /// Integral number.
    Int(i64),
    /// Floating-point number.
    Float(f64),
    /// Point in time.
    Timestamp(DateTime<Utc>),
    /// Opaque identifier.
    Id(Uuid),
    /// Enumerated value.
    ///
    /// An embedded constant coerces to its numeric ordinal; a value captured
    /// from a variable coerces to the member name.
    Enum {
        /// The member name.
        member: String,
        /// The underlying ordinal.
        ordinal: i64,
        /// Whether the value came from a captured variable rather than a
        /// constant embedded directly in the expression.
        captured: bool,
    },
    /// A collection; its wire shape follows the target property's declared
    /// container kind.
    Collection(Vec<LiteralValue>),
}

impl LiteralValue {
    /// An enum constant embedded directly in the expression.
    #[must_use]
    pub fn enum_constant(member: impl Into<String>, ordinal: i64) -> Self {
        Self::Enum {
            member: member.into(),
            ordinal,
            captured: false,
        }
    }

    /// An enum value captured from a variable.
    #[must_use]
    pub fn enum_captured(member: impl Into<String>, ordinal: i64) -> Self {
        Self::Enum {
            member: member.into(),
            ordinal,
            captured: true,
        }
    }
}

impl From<&str> for LiteralValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl From<String> for LiteralValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<i64> for LiteralValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for LiteralValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for LiteralValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for LiteralValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<DateTime<Utc>> for LiteralValue {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Timestamp(v)
    }
}

impl From<Uuid> for LiteralValue {
    fn from(v: Uuid) -> Self {
        Self::Id(v)
    }
}

impl From<Vec<LiteralValue>> for LiteralValue {
    fn from(v: Vec<LiteralValue>) -> Self {
        Self::Collection(v)
    }
}

/// Binary operator kinds: comparison, logical, and arithmetic.
///
/// `Mod` is part of the closed set so the compilers can reject it by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// Equal (`=`).
    Eq,
    /// Not equal (`<>`).
    Ne,
    /// Less than (`<`).
    Lt,
    /// Less than or equal (`<=`).
    Le,
    /// Greater than (`>`).
    Gt,
    /// Greater than or equal (`>=`).
    Ge,
    /// Logical AND.
    And,
    /// Logical OR.
    Or,
    /// Addition (`+`).
    Add,
    /// Subtraction (`-`).
    Sub,
    /// Modulo (`%`); not translatable.
    Mod,
}

impl BinaryOp {
    /// Returns `true` for the six comparison kinds.
    #[must_use]
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Eq | Self::Ne | Self::Lt | Self::Le | Self::Gt | Self::Ge
        )
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eq => write!(f, "="),
            Self::Ne => write!(f, "<>"),
            Self::Lt => write!(f, "<"),
            Self::Le => write!(f, "<="),
            Self::Gt => write!(f, ">"),
            Self::Ge => write!(f, ">="),
            Self::And => write!(f, "AND"),
            Self::Or => write!(f, "OR"),
            Self::Add => write!(f, "+"),
            Self::Sub => write!(f, "-"),
            Self::Mod => write!(f, "%"),
        }
    }
}

/// Unary operator kinds.
///
/// `Neg` is part of the closed set so the compilers can reject it by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Logical NOT.
    Not,
    /// Arithmetic negation; not translatable against a mapped field.
    Neg,
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Not => write!(f, "NOT"),
            Self::Neg => write!(f, "-"),
        }
    }
}

/// Recognized operation identifiers: database functions and update markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOp {
    /// `begins_with(path, prefix)`.
    BeginsWith,
    /// `contains(path, operand)`.
    Contains,
    /// `path BETWEEN low AND high`.
    Between,
    /// `attribute_exists(path)`.
    AttributeExists,
    /// `attribute_not_exists(path)`.
    AttributeNotExists,
    /// `size(path)`, composed with a comparison.
    Size,
    /// Update marker: ADD to a number or set.
    Add,
    /// Update marker: REMOVE the attribute.
    Remove,
    /// Update marker: DELETE elements from a set.
    Delete,
    /// Update marker: SET with `if_not_exists` default.
    IfNotExists,
    /// Update marker: SET appending to a list.
    ListAppend,
    /// Update marker: SET prepending to a list.
    ListPrepend,
}

impl CallOp {
    /// Returns `true` for the update-only marker operations.
    #[must_use]
    pub fn is_update_marker(self) -> bool {
        matches!(
            self,
            Self::Add
                | Self::Remove
                | Self::Delete
                | Self::IfNotExists
                | Self::ListAppend
                | Self::ListPrepend
        )
    }
}

impl fmt::Display for CallOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BeginsWith => write!(f, "begins_with"),
            Self::Contains => write!(f, "contains"),
            Self::Between => write!(f, "between"),
            Self::AttributeExists => write!(f, "attribute_exists"),
            Self::AttributeNotExists => write!(f, "attribute_not_exists"),
            Self::Size => write!(f, "size"),
            Self::Add => write!(f, "add"),
            Self::Remove => write!(f, "remove"),
            Self::Delete => write!(f, "delete"),
            Self::IfNotExists => write!(f, "if_not_exists"),
            Self::ListAppend => write!(f, "list_append"),
            Self::ListPrepend => write!(f, "list_prepend"),
        }
    }
}

/// Expression AST node.
#[derive(Debug, Clone)]
pub enum Expr {
    /// Binary combination: comparison, logical, or arithmetic.
    Binary {
        /// Operator kind.
        op: BinaryOp,
        /// Left-hand operand.
        left: Box<Expr>,
        /// Right-hand operand.
        right: Box<Expr>,
    },
    /// Unary operation.
    Unary {
        /// Operator kind.
        op: UnaryOp,
        /// The operand.
        operand: Box<Expr>,
    },
    /// Property access anchored to the entity parameter.
    Member {
        /// Logical property name, optionally followed by nested segments.
        path: Vec<String>,
    },
    /// A recognized database function (target = member) or an update marker
    /// (target = `None`, destination implied by the update binding).
    Call {
        /// The member the function applies to, absent for update markers.
        target: Option<Box<Expr>>,
        /// The operation identifier.
        op: CallOp,
        /// Operation arguments.
        args: Vec<Expr>,
    },
    /// Ordered update initializer: one binding per target property.
    ObjectInit {
        /// `(property, value expression)` pairs in declaration order.
        bindings: Vec<(String, Expr)>,
    },
    /// An already-evaluated runtime literal.
    Literal(LiteralValue),
    /// A deferred caller-supplied evaluation, constant-folded at
    /// translation time.
    Computed(Deferred),
}

impl Expr {
    fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Self::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    fn call(self, op: CallOp, args: Vec<Expr>) -> Self {
        Self::Call {
            target: Some(Box::new(self)),
            op,
            args,
        }
    }

    /// `self = other`.
    #[must_use]
    pub fn eq(self, other: Expr) -> Self {
        Self::binary(BinaryOp::Eq, self, other)
    }

    /// `self <> other`.
    #[must_use]
    pub fn ne(self, other: Expr) -> Self {
        Self::binary(BinaryOp::Ne, self, other)
    }

    /// `self < other`.
    #[must_use]
    pub fn lt(self, other: Expr) -> Self {
        Self::binary(BinaryOp::Lt, self, other)
    }

    /// `self <= other`.
    #[must_use]
    pub fn le(self, other: Expr) -> Self {
        Self::binary(BinaryOp::Le, self, other)
    }

    /// `self > other`.
    #[must_use]
    pub fn gt(self, other: Expr) -> Self {
        Self::binary(BinaryOp::Gt, self, other)
    }

    /// `self >= other`.
    #[must_use]
    pub fn ge(self, other: Expr) -> Self {
        Self::binary(BinaryOp::Ge, self, other)
    }

    /// `self AND other`.
    #[must_use]
    pub fn and(self, other: Expr) -> Self {
        Self::binary(BinaryOp::And, self, other)
    }

    /// `self OR other`.
    #[must_use]
    pub fn or(self, other: Expr) -> Self {
        Self::binary(BinaryOp::Or, self, other)
    }

    /// `self + other`.
    #[must_use]
    pub fn plus(self, other: Expr) -> Self {
        Self::binary(BinaryOp::Add, self, other)
    }

    /// `self - other`.
    #[must_use]
    pub fn minus(self, other: Expr) -> Self {
        Self::binary(BinaryOp::Sub, self, other)
    }

    /// `self % other`; present for completeness, rejected by the compilers.
    #[must_use]
    pub fn modulo(self, other: Expr) -> Self {
        Self::binary(BinaryOp::Mod, self, other)
    }

    /// `self BETWEEN low AND high`.
    #[must_use]
    pub fn between(self, low: Expr, high: Expr) -> Self {
        self.call(CallOp::Between, vec![low, high])
    }

    /// `begins_with(self, prefix)`.
    #[must_use]
    pub fn begins_with(self, prefix: Expr) -> Self {
        self.call(CallOp::BeginsWith, vec![prefix])
    }

    /// `contains(self, operand)`.
    #[must_use]
    pub fn contains(self, operand: Expr) -> Self {
        self.call(CallOp::Contains, vec![operand])
    }

    /// `attribute_exists(self)`.
    #[must_use]
    pub fn exists(self) -> Self {
        self.call(CallOp::AttributeExists, vec![])
    }

    /// `attribute_not_exists(self)`.
    #[must_use]
    pub fn not_exists(self) -> Self {
        self.call(CallOp::AttributeNotExists, vec![])
    }

    /// `size(self)`, for composition with a comparison.
    #[must_use]
    pub fn size(self) -> Self {
        self.call(CallOp::Size, vec![])
    }
}

/// A reference to an entity property by logical name.
#[must_use]
pub fn attr(name: impl Into<String>) -> Expr {
    Expr::Member {
        path: vec![name.into()],
    }
}

/// A reference to a nested document path; the first segment is the schema
/// property.
#[must_use]
pub fn attr_path<I, S>(segments: I) -> Expr
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Expr::Member {
        path: segments.into_iter().map(Into::into).collect(),
    }
}

/// A literal value embedded directly in the expression.
#[must_use]
pub fn lit(value: impl Into<LiteralValue>) -> Expr {
    Expr::Literal(value.into())
}

/// A deferred caller-supplied evaluation, constant-folded at translation
/// time.
#[must_use]
pub fn computed(f: impl Fn() -> CaptureResult + Send + Sync + 'static) -> Expr {
    Expr::Computed(Deferred::new(f))
}

/// Logical negation.
#[must_use]
pub fn not(expr: Expr) -> Expr {
    Expr::Unary {
        op: UnaryOp::Not,
        operand: Box::new(expr),
    }
}

/// Arithmetic negation; present for completeness, rejected against mapped
/// fields.
#[must_use]
pub fn neg(expr: Expr) -> Expr {
    Expr::Unary {
        op: UnaryOp::Neg,
        operand: Box::new(expr),
    }
}

fn marker(op: CallOp, args: Vec<Expr>) -> Expr {
    Expr::Call {
        target: None,
        op,
        args,
    }
}

/// Marker: ADD a number or set to the destination attribute.
#[must_use]
pub fn add(value: Expr) -> Expr {
    marker(CallOp::Add, vec![value])
}

/// Marker: REMOVE the destination attribute.
#[must_use]
pub fn remove() -> Expr {
    marker(CallOp::Remove, vec![])
}

/// Marker: DELETE elements from the destination set.
#[must_use]
pub fn delete(value: Expr) -> Expr {
    marker(CallOp::Delete, vec![value])
}

/// Marker: SET the destination to a default only when it does not exist.
#[must_use]
pub fn if_not_exists(default: Expr) -> Expr {
    marker(CallOp::IfNotExists, vec![default])
}

/// Marker: SET the destination appending to the existing list.
#[must_use]
pub fn list_append(value: Expr) -> Expr {
    marker(CallOp::ListAppend, vec![value])
}

/// Marker: SET the destination prepending to the existing list.
#[must_use]
pub fn list_prepend(value: Expr) -> Expr {
    marker(CallOp::ListPrepend, vec![value])
}

/// Builder for an update initializer.
#[derive(Debug, Clone, Default)]
pub struct UpdateBuilder {
    bindings: Vec<(String, Expr)>,
}

impl UpdateBuilder {
    /// Bind a value expression to a target property.
    #[must_use]
    pub fn set(mut self, property: impl Into<String>, value: Expr) -> Self {
        self.bindings.push((property.into(), value));
        self
    }

    /// Finish building the `ObjectInit` node.
    #[must_use]
    pub fn build(self) -> Expr {
        Expr::ObjectInit {
            bindings: self.bindings,
        }
    }
}

/// Start an update initializer.
#[must_use]
pub fn update() -> UpdateBuilder {
    UpdateBuilder::default()
}
