//! Expression translation engine for ScribeDB.
//!
//! Compiles typed predicate and update-initializer ASTs, written against a
//! statically known entity schema, into the condition/filter/update
//! expression text and placeholder tables of the target document store.
#![allow(missing_docs, clippy::module_name_repetitions)]

pub mod expression;
pub mod schema;
