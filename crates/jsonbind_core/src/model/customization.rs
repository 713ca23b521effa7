//! Per-class and per-property binding customizations.
//!
//! These are the processed equivalents of source-level binding annotations:
//! renamed JSON keys, null policy, creators, polymorphic type information
//! and property-scoped user components.

use std::sync::Arc;

use crate::components::{JsonbAdapter, JsonbDeserializer, JsonbSerializer};
use crate::model::binding_type::BindingType;
use crate::model::descriptor::CreateFn;

// -----------------------------------------------------------------------------
// PropertyCustomization

/// Customization attached to a single property.
#[derive(Clone, Default)]
pub struct PropertyCustomization {
    /// JSON key used when reading this property; overrides the naming
    /// strategy.
    pub read_name: Option<String>,
    /// JSON key used when writing this property; overrides the naming
    /// strategy.
    pub write_name: Option<String>,
    /// Whether an absent value is still written as an explicit `null`.
    pub nillable: Option<bool>,
    /// Property-scoped adapter; only applied on an exact binding type match.
    pub adapter: Option<Arc<dyn JsonbAdapter>>,
    /// Property-scoped serializer override.
    pub serializer: Option<Arc<dyn JsonbSerializer>>,
    /// Property-scoped deserializer override.
    pub deserializer: Option<Arc<dyn JsonbDeserializer>>,
}

impl PropertyCustomization {
    pub fn with_read_name(mut self, name: impl Into<String>) -> Self {
        self.read_name = Some(name.into());
        self
    }

    pub fn with_write_name(mut self, name: impl Into<String>) -> Self {
        self.write_name = Some(name.into());
        self
    }

    /// Sets the JSON key for both directions.
    pub fn with_name(self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.with_read_name(name.clone()).with_write_name(name)
    }

    pub fn with_nillable(mut self, nillable: bool) -> Self {
        self.nillable = Some(nillable);
        self
    }

    pub fn with_adapter(mut self, adapter: Arc<dyn JsonbAdapter>) -> Self {
        self.adapter = Some(adapter);
        self
    }

    pub fn with_serializer(mut self, serializer: Arc<dyn JsonbSerializer>) -> Self {
        self.serializer = Some(serializer);
        self
    }

    pub fn with_deserializer(mut self, deserializer: Arc<dyn JsonbDeserializer>) -> Self {
        self.deserializer = Some(deserializer);
        self
    }
}

// -----------------------------------------------------------------------------
// ClassCustomization

/// Customization attached to a whole class.
#[derive(Clone, Default)]
pub struct ClassCustomization {
    /// Default null policy for all properties of the class.
    pub nillable: Option<bool>,
    /// Explicit property order; listed properties come first in the given
    /// order, the rest follow in strategy order.
    pub property_order: Option<Vec<String>>,
    /// Custom instantiation from named JSON properties.
    pub creator: Option<CreatorDescriptor>,
    /// Polymorphic discriminator handling.
    pub type_wrapper: Option<TypeWrapper>,
}

impl ClassCustomization {
    pub fn with_nillable(mut self, nillable: bool) -> Self {
        self.nillable = Some(nillable);
        self
    }

    pub fn with_property_order<I, S>(mut self, order: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.property_order = Some(order.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_creator(mut self, creator: CreatorDescriptor) -> Self {
        self.creator = Some(creator);
        self
    }

    pub fn with_type_wrapper(mut self, wrapper: TypeWrapper) -> Self {
        self.type_wrapper = Some(wrapper);
        self
    }
}

// -----------------------------------------------------------------------------
// CreatorDescriptor

/// A factory that builds an instance from a subset of properties, consumed
/// in declared parameter order. Remaining buffered values go through plain
/// setters afterwards.
#[derive(Clone)]
pub struct CreatorDescriptor {
    /// Property names, in the order the factory expects them.
    pub params: Vec<&'static str>,
    /// The factory. Receives one slot per parameter; a slot is `None` when
    /// the document did not provide that property.
    pub create: CreateFn,
}

impl CreatorDescriptor {
    pub fn new(params: Vec<&'static str>, create: CreateFn) -> Self {
        Self { params, create }
    }
}

// -----------------------------------------------------------------------------
// TypeWrapper

/// Polymorphic discriminator description for a base class: the JSON key that
/// carries the alias, and the alias-to-concrete-type table.
#[derive(Clone)]
pub struct TypeWrapper {
    pub key: String,
    pub aliases: Vec<(String, BindingType)>,
}

impl TypeWrapper {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            aliases: Vec::new(),
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>, ty: BindingType) -> Self {
        self.aliases.push((alias.into(), ty));
        self
    }

    /// Concrete binding for a discriminator value read from the document.
    pub fn binding_for(&self, alias: &str) -> Option<&BindingType> {
        self.aliases
            .iter()
            .find(|(name, _)| name == alias)
            .map(|(_, ty)| ty)
    }

    /// Discriminator value for a concrete runtime type, for serialization.
    pub fn alias_for(&self, id: core::any::TypeId) -> Option<&str> {
        self.aliases
            .iter()
            .find(|(_, ty)| ty.raw_type().is_some_and(|raw| raw.id() == id))
            .map(|(name, _)| name.as_str())
    }
}
