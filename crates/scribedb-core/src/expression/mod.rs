//! Expression translation for ScribeDB.
//!
//! This module compiles typed predicate and update-initializer ASTs into the
//! target store's expression language. The pipeline is:
//!
//! 1. **Building**: callers construct a closed-set AST through the builder
//!    API (update markers are tagged variants, never invokable methods).
//! 2. **Translation**: the condition and update compilers walk the AST,
//!    validating property references against the entity schema, coercing
//!    literal values, and allocating `#attrN` / `:pN` placeholders.
//! 3. **Output**: expression text plus the context's name and value tables,
//!    merged verbatim into the outgoing request by the request builders.

pub mod ast;
pub mod coerce;
pub mod condition;
pub mod context;
pub mod error;
pub mod update;

pub use ast::{Expr, LiteralValue, UpdateBuilder, attr, lit, not, update};
pub use condition::compile_condition;
pub use context::{ParameterRecord, TranslationContext, ValidationMode};
pub use error::TranslationError;
pub use update::compile_update;
