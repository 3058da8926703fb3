//! Entity schema registry.
//!
//! Per-entity, per-property metadata consulted during translation: the
//! physical attribute name, value type, key role, the set of operator kinds
//! the property may appear with in predicates, an optional format specifier,
//! and the sensitivity/encryption flags. Metadata is immutable once
//! constructed and shared read-only across any number of translations.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use indexmap::IndexMap;
use typed_builder::TypedBuilder;

/// The declared value type of a schema property.
///
/// The container kinds (`StringSet`, `NumberSet`, `List`) direct how
/// collection literals are coerced when the property is the target of a
/// set/list operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyType {
    /// UTF-8 string.
    String,
    /// Arbitrary-precision number (string-encoded on the wire).
    Number,
    /// Boolean.
    Boolean,
    /// Point in time; stored as a formatted string.
    Timestamp,
    /// Opaque identifier; stored in canonical textual form.
    Identifier,
    /// Set of strings.
    StringSet,
    /// Set of numbers.
    NumberSet,
    /// Ordered list of values.
    List,
    /// Name-to-value map.
    Map,
}

impl PropertyType {
    /// Human-readable type name used in error messages.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::String => "String",
            Self::Number => "Number",
            Self::Boolean => "Boolean",
            Self::Timestamp => "Timestamp",
            Self::Identifier => "Identifier",
            Self::StringSet => "StringSet",
            Self::NumberSet => "NumberSet",
            Self::List => "List",
            Self::Map => "Map",
        }
    }
}

/// A predicate operator kind a property may permit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorKind {
    /// `=`
    Eq,
    /// `<>`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `BETWEEN`
    Between,
    /// `begins_with`
    BeginsWith,
    /// `contains`
    Contains,
    /// `attribute_exists` / `attribute_not_exists`
    Exists,
    /// `size` used as a comparison operand.
    Size,
}

impl OperatorKind {
    /// Every operator kind.
    #[must_use]
    pub fn all() -> HashSet<Self> {
        HashSet::from([
            Self::Eq,
            Self::Ne,
            Self::Lt,
            Self::Le,
            Self::Gt,
            Self::Ge,
            Self::Between,
            Self::BeginsWith,
            Self::Contains,
            Self::Exists,
            Self::Size,
        ])
    }

    /// The six comparison operator kinds.
    #[must_use]
    pub fn comparisons() -> HashSet<Self> {
        HashSet::from([Self::Eq, Self::Ne, Self::Lt, Self::Le, Self::Gt, Self::Ge])
    }

    /// Operator name used in error messages.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Between => "BETWEEN",
            Self::BeginsWith => "begins_with",
            Self::Contains => "contains",
            Self::Exists => "attribute_exists",
            Self::Size => "size",
        }
    }
}

/// Metadata for a single entity property.
///
/// An empty `operators` set means the property is not usable in any
/// predicate; referencing it in a condition raises an error.
#[derive(Debug, Clone, TypedBuilder)]
pub struct PropertyMetadata {
    /// Logical property name as written in expressions.
    #[builder(setter(into))]
    pub name: String,
    /// Physical attribute name in the store.
    #[builder(setter(into))]
    pub attribute_name: String,
    /// Declared value type.
    pub value_type: PropertyType,
    /// Whether this property is the table's partition key.
    #[builder(default)]
    pub is_partition_key: bool,
    /// Whether this property is the table's sort key.
    #[builder(default)]
    pub is_sort_key: bool,
    /// Operator kinds this property may appear with in predicates.
    #[builder(default)]
    pub operators: HashSet<OperatorKind>,
    /// Optional format specifier applied during coercion.
    #[builder(default, setter(strip_option, into))]
    pub format: Option<String>,
    /// Whether captured values for this property are masked in diagnostics.
    #[builder(default)]
    pub is_sensitive: bool,
    /// Whether captured values for this property require a downstream
    /// encryption pass.
    #[builder(default)]
    pub is_encrypted: bool,
}

impl PropertyMetadata {
    /// Returns `true` if this property is a partition or sort key.
    #[must_use]
    pub fn is_key(&self) -> bool {
        self.is_partition_key || self.is_sort_key
    }
}

/// Immutable per-entity schema: table name plus properties in declaration
/// order, keyed by logical name for O(1) lookup.
#[derive(Debug, Clone)]
pub struct EntityMetadata {
    table_name: String,
    properties: IndexMap<String, PropertyMetadata>,
}

impl EntityMetadata {
    /// Build entity metadata from a table name and declaration-ordered
    /// properties.
    #[must_use]
    pub fn new(table_name: impl Into<String>, properties: Vec<PropertyMetadata>) -> Self {
        let properties = properties
            .into_iter()
            .map(|p| (p.name.clone(), p))
            .collect();
        Self {
            table_name: table_name.into(),
            properties,
        }
    }

    /// The physical table name.
    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Look up a property by logical name.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&PropertyMetadata> {
        self.properties.get(name)
    }

    /// Iterate properties in declaration order.
    pub fn properties(&self) -> impl Iterator<Item = &PropertyMetadata> {
        self.properties.values()
    }

    /// The partition-key property, if declared.
    #[must_use]
    pub fn partition_key(&self) -> Option<&PropertyMetadata> {
        self.properties.values().find(|p| p.is_partition_key)
    }

    /// The sort-key property, if declared.
    #[must_use]
    pub fn sort_key(&self) -> Option<&PropertyMetadata> {
        self.properties.values().find(|p| p.is_sort_key)
    }
}

/// Named registry of shared entity schemas.
///
/// Request builders resolve the schema for an entity once and hand the same
/// `Arc` to every translation.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    entities: HashMap<String, Arc<EntityMetadata>>,
}

impl SchemaRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a schema under an entity name, replacing any previous entry.
    pub fn register(&mut self, entity: impl Into<String>, metadata: EntityMetadata) {
        self.entities.insert(entity.into(), Arc::new(metadata));
    }

    /// Look up the shared schema for an entity name.
    #[must_use]
    pub fn get(&self, entity: &str) -> Option<Arc<EntityMetadata>> {
        self.entities.get(entity).cloned()
    }
}
