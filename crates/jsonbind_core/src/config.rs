//! Engine configuration.
//!
//! [`JsonbConfig`] is the one-stop builder callers hand to
//! [`JsonbContext`](crate::context::JsonbContext); the strategy enums here
//! are referenced from class model processing and the de/ser drivers.

use std::sync::Arc;

use crate::components::{JsonbAdapter, JsonbDeserializer, JsonbSerializer};

// -----------------------------------------------------------------------------
// Strategies

/// How property names translate into JSON keys when no explicit name is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PropertyNamingStrategy {
    /// Use the property name as-is.
    #[default]
    Identity,
    /// `firstName` -> `first_name`.
    LowerCaseWithUnderscores,
    /// `firstName` -> `first-name`.
    LowerCaseWithDashes,
    /// `firstName` -> `FirstName`.
    UpperCamelCase,
}

impl PropertyNamingStrategy {
    pub fn translate(&self, name: &str) -> String {
        match self {
            PropertyNamingStrategy::Identity => name.to_string(),
            PropertyNamingStrategy::LowerCaseWithUnderscores => separate_words(name, '_'),
            PropertyNamingStrategy::LowerCaseWithDashes => separate_words(name, '-'),
            PropertyNamingStrategy::UpperCamelCase => {
                let mut chars = name.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                }
            }
        }
    }
}

fn separate_words(name: &str, separator: char) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                out.push(separator);
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Order in which object properties are written and setters are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PropertyOrderStrategy {
    /// Declaration order across the superclass-then-subclass chain.
    #[default]
    Any,
    /// Sorted by property name.
    Lexicographical,
    /// Reverse-sorted by property name.
    Reverse,
}

/// How `Box<[u8]>` binary data is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BinaryDataStrategy {
    /// A plain JSON array of numbers.
    #[default]
    Byte,
    /// A Base64 string.
    Base64,
}

// -----------------------------------------------------------------------------
// JsonbConfig

/// Resolved configuration for one engine instance.
#[derive(Clone, Default)]
pub struct JsonbConfig {
    formatting: bool,
    null_values: bool,
    fail_on_unknown_properties: bool,
    property_naming: PropertyNamingStrategy,
    property_order: PropertyOrderStrategy,
    binary_data: BinaryDataStrategy,
    serializers: Vec<Arc<dyn JsonbSerializer>>,
    deserializers: Vec<Arc<dyn JsonbDeserializer>>,
    adapters: Vec<Arc<dyn JsonbAdapter>>,
}

impl JsonbConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretty-print serialized output.
    pub fn with_formatting(mut self, formatting: bool) -> Self {
        self.formatting = formatting;
        self
    }

    /// Write absent optional properties as explicit `null`s.
    pub fn with_null_values(mut self, null_values: bool) -> Self {
        self.null_values = null_values;
        self
    }

    /// Raise an error on JSON keys no property maps to, instead of skipping
    /// their subtree.
    pub fn with_fail_on_unknown_properties(mut self, fail: bool) -> Self {
        self.fail_on_unknown_properties = fail;
        self
    }

    pub fn with_property_naming_strategy(mut self, strategy: PropertyNamingStrategy) -> Self {
        self.property_naming = strategy;
        self
    }

    pub fn with_property_order_strategy(mut self, strategy: PropertyOrderStrategy) -> Self {
        self.property_order = strategy;
        self
    }

    pub fn with_binary_data_strategy(mut self, strategy: BinaryDataStrategy) -> Self {
        self.binary_data = strategy;
        self
    }

    pub fn with_serializers<I>(mut self, serializers: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn JsonbSerializer>>,
    {
        self.serializers.extend(serializers);
        self
    }

    pub fn with_deserializers<I>(mut self, deserializers: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn JsonbDeserializer>>,
    {
        self.deserializers.extend(deserializers);
        self
    }

    pub fn with_adapters<I>(mut self, adapters: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn JsonbAdapter>>,
    {
        self.adapters.extend(adapters);
        self
    }

    pub fn formatting(&self) -> bool {
        self.formatting
    }

    pub fn null_values(&self) -> bool {
        self.null_values
    }

    pub fn fail_on_unknown_properties(&self) -> bool {
        self.fail_on_unknown_properties
    }

    pub fn property_naming(&self) -> PropertyNamingStrategy {
        self.property_naming
    }

    pub fn property_order(&self) -> PropertyOrderStrategy {
        self.property_order
    }

    pub fn binary_data(&self) -> BinaryDataStrategy {
        self.binary_data
    }

    pub fn serializers(&self) -> &[Arc<dyn JsonbSerializer>] {
        &self.serializers
    }

    pub fn deserializers(&self) -> &[Arc<dyn JsonbDeserializer>] {
        &self.deserializers
    }

    pub fn adapters(&self) -> &[Arc<dyn JsonbAdapter>] {
        &self.adapters
    }
}

// -----------------------------------------------------------------------------
// Tests
