//! Translation context: placeholder allocation, captured-value tables,
//! encryption parameter records, and diagnostics hooks.
//!
//! A context is created fresh for every translation call and must not be
//! reused or shared across calls; it carries no process-wide state.

use indexmap::IndexMap;
use scribedb_model::AttributeValue;

use crate::schema::{EntityMetadata, PropertyMetadata};

/// Prefix for attribute-name placeholders (`#attr0`, `#attr1`, ...).
pub const NAME_PREFIX: &str = "#attr";

/// Prefix for value placeholders (`:p0`, `:p1`, ...).
pub const VALUE_PREFIX: &str = ":p";

/// Fixed marker substituted for sensitive values in diagnostics output.
pub const REDACTION_MARKER: &str = "[REDACTED]";

/// Validation policy applied by the condition compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationMode {
    /// Any schema property is usable; with no schema at all, validation is
    /// skipped entirely.
    #[default]
    None,
    /// Only partition- and sort-key properties are usable.
    KeysOnly,
}

/// Metadata for a captured value that requires a downstream encryption pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterRecord {
    /// The value placeholder the coerced value was stored under.
    pub placeholder: String,
    /// The coerced value, exactly as stored in the value table.
    pub value: AttributeValue,
    /// Whether the downstream pass must encrypt this value.
    pub requires_encryption: bool,
    /// Logical name of the source property.
    pub property_name: String,
    /// Physical attribute name of the source property.
    pub attribute_name: String,
}

/// Sink for diagnostics events emitted while capturing condition values.
pub trait CaptureSink {
    /// Whether the sink wants events at all; when `false`, capture logging
    /// is skipped entirely.
    fn enabled(&self) -> bool {
        true
    }

    /// Record one captured value. `value` is already redacted when the
    /// property is sensitive.
    fn record(&self, placeholder: &str, property: &str, value: &str);
}

/// Default sink emitting `tracing` debug events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl CaptureSink for TracingSink {
    fn enabled(&self) -> bool {
        tracing::enabled!(tracing::Level::DEBUG)
    }

    fn record(&self, placeholder: &str, property: &str, value: &str) {
        tracing::debug!(placeholder, property, value, "captured expression value");
    }
}

type SensitivityPredicate = Box<dyn Fn(&str) -> bool>;

/// Per-translation mutable state: the name and value placeholder tables,
/// their counters, the schema reference, the validation mode, the
/// accumulated encryption parameter records, and the diagnostics hooks.
pub struct TranslationContext<'a> {
    names: IndexMap<String, String>,
    values: IndexMap<String, AttributeValue>,
    name_counter: usize,
    value_counter: usize,
    entity: Option<&'a EntityMetadata>,
    mode: ValidationMode,
    parameters: Vec<ParameterRecord>,
    sink: Option<Box<dyn CaptureSink>>,
    sensitivity: Option<SensitivityPredicate>,
}

impl std::fmt::Debug for TranslationContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranslationContext")
            .field("names", &self.names)
            .field("values", &self.values)
            .field("mode", &self.mode)
            .field("parameters", &self.parameters.len())
            .finish_non_exhaustive()
    }
}

impl Default for TranslationContext<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> TranslationContext<'a> {
    /// Create a schema-less context; property names pass through verbatim.
    #[must_use]
    pub fn new() -> Self {
        Self {
            names: IndexMap::new(),
            values: IndexMap::new(),
            name_counter: 0,
            value_counter: 0,
            entity: None,
            mode: ValidationMode::default(),
            parameters: Vec::new(),
            sink: None,
            sensitivity: None,
        }
    }

    /// Create a context validating against the given entity schema.
    #[must_use]
    pub fn for_entity(entity: &'a EntityMetadata) -> Self {
        Self {
            entity: Some(entity),
            ..Self::new()
        }
    }

    /// Set the condition validation mode.
    #[must_use]
    pub fn with_mode(mut self, mode: ValidationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Attach a diagnostics sink for captured condition values.
    #[must_use]
    pub fn with_sink(mut self, sink: impl CaptureSink + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Attach a sensitivity predicate over physical attribute names;
    /// matching attributes have their logged values redacted.
    #[must_use]
    pub fn with_sensitivity(mut self, predicate: impl Fn(&str) -> bool + 'static) -> Self {
        self.sensitivity = Some(Box::new(predicate));
        self
    }

    /// The entity schema this context validates against, if any.
    #[must_use]
    pub fn entity(&self) -> Option<&'a EntityMetadata> {
        self.entity
    }

    /// The condition validation mode.
    #[must_use]
    pub fn mode(&self) -> ValidationMode {
        self.mode
    }

    /// The placeholder-to-attribute-name table, in allocation order.
    #[must_use]
    pub fn names(&self) -> &IndexMap<String, String> {
        &self.names
    }

    /// The placeholder-to-coerced-value table, in allocation order.
    #[must_use]
    pub fn values(&self) -> &IndexMap<String, AttributeValue> {
        &self.values
    }

    /// The accumulated encryption parameter records.
    #[must_use]
    pub fn parameters(&self) -> &[ParameterRecord] {
        &self.parameters
    }

    /// Consume the context, returning the name table, value table, and
    /// parameter records for the request builder to merge.
    #[must_use]
    pub fn into_tables(
        self,
    ) -> (
        IndexMap<String, String>,
        IndexMap<String, AttributeValue>,
        Vec<ParameterRecord>,
    ) {
        (self.names, self.values, self.parameters)
    }

    /// Allocate the next attribute-name placeholder for `attribute`.
    ///
    /// Every call allocates a fresh placeholder; reuse within a
    /// self-referential assignment is the compiler's decision, not the
    /// allocator's.
    pub fn alloc_name(&mut self, attribute: &str) -> String {
        let placeholder = format!("{NAME_PREFIX}{}", self.name_counter);
        self.name_counter += 1;
        self.names.insert(placeholder.clone(), attribute.to_owned());
        placeholder
    }

    /// Allocate the next value placeholder and store the coerced value.
    pub fn alloc_value(&mut self, value: AttributeValue) -> String {
        let placeholder = format!("{VALUE_PREFIX}{}", self.value_counter);
        self.value_counter += 1;
        self.values.insert(placeholder.clone(), value);
        placeholder
    }

    /// Store a coerced value, running the capture side channels: the
    /// diagnostics sink (condition compilation only) and the encryption
    /// parameter collector.
    ///
    /// Returns the allocated value placeholder.
    pub(crate) fn capture_value(
        &mut self,
        property_name: &str,
        attribute_name: &str,
        metadata: Option<&PropertyMetadata>,
        value: AttributeValue,
        log: bool,
    ) -> String {
        let placeholder = self.alloc_value(value.clone());

        if metadata.is_some_and(|m| m.is_encrypted) {
            self.parameters.push(ParameterRecord {
                placeholder: placeholder.clone(),
                value: value.clone(),
                requires_encryption: true,
                property_name: property_name.to_owned(),
                attribute_name: attribute_name.to_owned(),
            });
        }

        if log {
            if let Some(sink) = &self.sink {
                if sink.enabled() {
                    let sensitive = metadata.is_some_and(|m| m.is_sensitive)
                        || self
                            .sensitivity
                            .as_ref()
                            .is_some_and(|pred| pred(attribute_name));
                    let rendered = if sensitive {
                        REDACTION_MARKER.to_owned()
                    } else {
                        value.to_string()
                    };
                    sink.record(&placeholder, property_name, &rendered);
                }
            }
        }

        placeholder
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::schema::{PropertyMetadata, PropertyType};

    /// Sink collecting events for assertions.
    #[derive(Debug, Clone, Default)]
    struct RecordingSink {
        events: Arc<Mutex<Vec<(String, String, String)>>>,
    }

    impl CaptureSink for RecordingSink {
        fn record(&self, placeholder: &str, property: &str, value: &str) {
            self.events.lock().push((
                placeholder.to_owned(),
                property.to_owned(),
                value.to_owned(),
            ));
        }
    }

    fn encrypted_property() -> PropertyMetadata {
        PropertyMetadata::builder()
            .name("ssn")
            .attribute_name("ssn")
            .value_type(PropertyType::String)
            .is_encrypted(true)
            .build()
    }

    #[test]
    fn test_should_allocate_sequential_name_placeholders() {
        let mut ctx = TranslationContext::new();
        assert_eq!(ctx.alloc_name("age"), "#attr0");
        assert_eq!(ctx.alloc_name("name"), "#attr1");
        assert_eq!(ctx.names().get("#attr0").unwrap(), "age");
        assert_eq!(ctx.names().get("#attr1").unwrap(), "name");
    }

    #[test]
    fn test_should_allocate_sequential_value_placeholders() {
        let mut ctx = TranslationContext::new();
        assert_eq!(ctx.alloc_value(AttributeValue::N("1".to_owned())), ":p0");
        assert_eq!(
            ctx.alloc_value(AttributeValue::S("two".to_owned())),
            ":p1"
        );
    }

    #[test]
    fn test_should_not_deduplicate_repeated_attributes() {
        let mut ctx = TranslationContext::new();
        assert_eq!(ctx.alloc_name("age"), "#attr0");
        assert_eq!(ctx.alloc_name("age"), "#attr1");
        assert_eq!(ctx.names().len(), 2);
    }

    #[test]
    fn test_should_preserve_allocation_order_in_tables() {
        let mut ctx = TranslationContext::new();
        ctx.alloc_name("b");
        ctx.alloc_name("a");
        let order: Vec<_> = ctx.names().values().cloned().collect();
        assert_eq!(order, vec!["b", "a"]);
    }

    #[test]
    fn test_should_append_parameter_record_for_encrypted_property() {
        let prop = encrypted_property();
        let mut ctx = TranslationContext::new();
        let placeholder = ctx.capture_value(
            "ssn",
            "ssn",
            Some(&prop),
            AttributeValue::S("123-45-6789".to_owned()),
            false,
        );

        assert_eq!(ctx.parameters().len(), 1);
        let record = &ctx.parameters()[0];
        assert_eq!(record.placeholder, placeholder);
        assert!(record.requires_encryption);
        assert_eq!(record.value, AttributeValue::S("123-45-6789".to_owned()));
    }

    #[test]
    fn test_should_append_parameter_record_for_null_value() {
        let prop = encrypted_property();
        let mut ctx = TranslationContext::new();
        ctx.capture_value("ssn", "ssn", Some(&prop), AttributeValue::Null(true), false);
        assert_eq!(ctx.parameters()[0].value, AttributeValue::Null(true));
    }

    #[test]
    fn test_should_not_record_parameters_for_plain_properties() {
        let prop = PropertyMetadata::builder()
            .name("age")
            .attribute_name("age")
            .value_type(PropertyType::Number)
            .build();
        let mut ctx = TranslationContext::new();
        ctx.capture_value("age", "age", Some(&prop), AttributeValue::N("1".to_owned()), false);
        assert!(ctx.parameters().is_empty());
    }

    #[test]
    fn test_should_redact_logged_value_for_sensitive_attribute() {
        let sink = RecordingSink::default();
        let events = Arc::clone(&sink.events);
        let prop = PropertyMetadata::builder()
            .name("email")
            .attribute_name("email")
            .value_type(PropertyType::String)
            .build();

        let mut ctx = TranslationContext::new()
            .with_sink(sink)
            .with_sensitivity(|attribute| attribute == "email");
        ctx.capture_value(
            "email",
            "email",
            Some(&prop),
            AttributeValue::S("a@b.c".to_owned()),
            true,
        );

        let events = events.lock();
        assert_eq!(events.len(), 1);
        let (placeholder, property, value) = &events[0];
        assert_eq!(placeholder, ":p0");
        assert_eq!(property, "email");
        assert_eq!(value, REDACTION_MARKER);
    }

    #[test]
    fn test_should_keep_real_value_in_table_when_redacting() {
        let sink = RecordingSink::default();
        let mut ctx = TranslationContext::new()
            .with_sink(sink)
            .with_sensitivity(|_| true);
        ctx.capture_value("email", "email", None, AttributeValue::S("a@b.c".to_owned()), true);
        assert_eq!(
            ctx.values().get(":p0").unwrap(),
            &AttributeValue::S("a@b.c".to_owned())
        );
    }

    #[test]
    fn test_should_log_plain_value_when_not_sensitive() {
        let sink = RecordingSink::default();
        let events = Arc::clone(&sink.events);
        let mut ctx = TranslationContext::new().with_sink(sink);
        ctx.capture_value("age", "age", None, AttributeValue::N("25".to_owned()), true);

        let events = events.lock();
        assert_eq!(events[0].2, "{N: 25}");
    }
}
