//! Wire-level value model for ScribeDB.
//!
//! This crate holds the `AttributeValue` tagged union shared by the
//! expression translation engine (which produces these values) and the
//! request builders (which merge them verbatim into outgoing requests).
#![allow(clippy::module_name_repetitions)]

pub mod attribute_value;

pub use attribute_value::AttributeValue;
