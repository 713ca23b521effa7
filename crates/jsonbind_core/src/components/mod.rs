//! User components: serializers, deserializers and adapters, plus the
//! matcher that pairs them with runtime types.
//!
//! Components describe the binding type they apply to themselves (there is
//! no supertype introspection to recover it from), and the registry keeps
//! one slot of each kind per binding type: the first registration wins,
//! later ones for the same type are ignored.

use core::any::Any;
use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use indexmap::IndexMap;

use crate::de::DeserializationContext;
use crate::error::{JsonbError, Result};
use crate::generator::JsonGenerator;
use crate::mapping::MappingContext;
use crate::model::customization::PropertyCustomization;
use crate::model::BindingType;
use crate::parser::JsonbParser;
use crate::ser::SerializationContext;

// -----------------------------------------------------------------------------
// Component traits

/// A user-supplied serializer taking over one value and everything below it.
pub trait JsonbSerializer: Send + Sync {
    /// The binding type this serializer handles.
    fn bound_type(&self) -> BindingType;

    /// Writes `value` to the generator. May recurse through the context.
    fn serialize(
        &self,
        value: &dyn Any,
        generator: &mut JsonGenerator,
        ctx: &mut SerializationContext<'_>,
    ) -> Result<()>;
}

/// A user-supplied deserializer consuming one value from the parser.
///
/// The engine re-synchronizes the parser afterwards: whatever part of the
/// value's subtree the deserializer left unread is skipped.
pub trait JsonbDeserializer: Send + Sync {
    fn bound_type(&self) -> BindingType;

    fn deserialize(
        &self,
        parser: &mut JsonbParser<'_>,
        ctx: &mut DeserializationContext<'_>,
        runtime_type: &BindingType,
    ) -> Result<Box<dyn Any>>;
}

/// A two-way bridge between an original type and a simpler adapted type
/// that the engine binds instead.
pub trait JsonbAdapter: Send + Sync {
    /// The type appearing in class models.
    fn original_type(&self) -> BindingType;

    /// The type actually bound to JSON.
    fn adapted_type(&self) -> BindingType;

    /// Original -> adapted, on serialization.
    fn to_json(&self, original: &dyn Any) -> Result<Box<dyn Any>>;

    /// Adapted -> original, on deserialization.
    fn from_json(&self, adapted: Box<dyn Any>) -> Result<Box<dyn Any>>;
}

/// Wraps a user component failure with the binding it was registered for.
pub(crate) fn component_failure(binding: &BindingType, error: JsonbError) -> JsonbError {
    match error {
        already @ JsonbError::Component { .. } => already,
        other => JsonbError::Component {
            binding: binding.to_string(),
            message: other.to_string(),
        },
    }
}

// -----------------------------------------------------------------------------
// ComponentBindings

/// All components registered for one binding type.
#[derive(Default, Clone)]
pub struct ComponentBindings {
    serializer: Option<Arc<dyn JsonbSerializer>>,
    deserializer: Option<Arc<dyn JsonbDeserializer>>,
    adapter: Option<Arc<dyn JsonbAdapter>>,
}

// -----------------------------------------------------------------------------
// ComponentMatcher

/// Pairs runtime types with registered components.
///
/// Lookup order: a property-scoped override first (used only on an exact
/// binding match, otherwise the lookup reports "none" without falling back
/// to the registry), then an exact registry match, then a scan in
/// registration order accepting supertype matches and, once any
/// parameterized component exists, parameterized matches with pairwise
/// equal arguments.
pub struct ComponentMatcher {
    bindings: RwLock<IndexMap<BindingType, ComponentBindings>>,
    /// Flipped once any component is bound to a parameterized type; scans
    /// skip argument matching entirely while this is false.
    generic_components: AtomicBool,
}

impl ComponentMatcher {
    pub fn new() -> Self {
        Self {
            bindings: RwLock::new(IndexMap::new()),
            generic_components: AtomicBool::new(false),
        }
    }

    fn note_binding(&self, bound: &BindingType) {
        if matches!(bound, BindingType::Parameterized { .. }) {
            self.generic_components.store(true, Ordering::Relaxed);
        }
    }

    pub fn register_serializer(&self, serializer: Arc<dyn JsonbSerializer>) {
        let bound = serializer.bound_type();
        self.note_binding(&bound);
        let mut bindings = self.bindings.write().unwrap_or_else(PoisonError::into_inner);
        let slot = bindings.entry(bound).or_default();
        if slot.serializer.is_none() {
            slot.serializer = Some(serializer);
        }
    }

    pub fn register_deserializer(&self, deserializer: Arc<dyn JsonbDeserializer>) {
        let bound = deserializer.bound_type();
        self.note_binding(&bound);
        let mut bindings = self.bindings.write().unwrap_or_else(PoisonError::into_inner);
        let slot = bindings.entry(bound).or_default();
        if slot.deserializer.is_none() {
            slot.deserializer = Some(deserializer);
        }
    }

    pub fn register_adapter(&self, adapter: Arc<dyn JsonbAdapter>) {
        let bound = adapter.original_type();
        self.note_binding(&bound);
        let mut bindings = self.bindings.write().unwrap_or_else(PoisonError::into_inner);
        let slot = bindings.entry(bound).or_default();
        if slot.adapter.is_none() {
            slot.adapter = Some(adapter);
        }
    }

    pub fn serializer_for(
        &self,
        runtime_type: &BindingType,
        customization: Option<&PropertyCustomization>,
        mapping: &MappingContext,
    ) -> Option<Arc<dyn JsonbSerializer>> {
        if let Some(serializer) = customization.and_then(|c| c.serializer.as_ref()) {
            return (serializer.bound_type() == *runtime_type).then(|| serializer.clone());
        }
        self.find(runtime_type, mapping, |slot| slot.serializer.clone())
    }

    pub fn deserializer_for(
        &self,
        runtime_type: &BindingType,
        customization: Option<&PropertyCustomization>,
        mapping: &MappingContext,
    ) -> Option<Arc<dyn JsonbDeserializer>> {
        if let Some(deserializer) = customization.and_then(|c| c.deserializer.as_ref()) {
            return (deserializer.bound_type() == *runtime_type).then(|| deserializer.clone());
        }
        self.find(runtime_type, mapping, |slot| slot.deserializer.clone())
    }

    /// Adapter lookup; the same adapter serves both directions.
    ///
    /// A property-scoped adapter whose original type does not exactly match
    /// the runtime type is dropped, never silently applied.
    pub fn adapter_for(
        &self,
        runtime_type: &BindingType,
        customization: Option<&PropertyCustomization>,
        mapping: &MappingContext,
    ) -> Option<Arc<dyn JsonbAdapter>> {
        if let Some(adapter) = customization.and_then(|c| c.adapter.as_ref()) {
            return (adapter.original_type() == *runtime_type).then(|| adapter.clone());
        }
        self.find(runtime_type, mapping, |slot| slot.adapter.clone())
    }

    fn find<C>(
        &self,
        runtime_type: &BindingType,
        mapping: &MappingContext,
        pick: impl Fn(&ComponentBindings) -> Option<C>,
    ) -> Option<C> {
        let bindings = self.bindings.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(component) = bindings.get(runtime_type).and_then(&pick) {
            return Some(component);
        }
        for (bound, slot) in bindings.iter() {
            if self.matches(runtime_type, bound, mapping) {
                if let Some(component) = pick(slot) {
                    return Some(component);
                }
            }
        }
        None
    }

    fn matches(
        &self,
        runtime_type: &BindingType,
        bound: &BindingType,
        mapping: &MappingContext,
    ) -> bool {
        if bound == runtime_type {
            return true;
        }
        match (bound, runtime_type) {
            (BindingType::Concrete(bound_ty), BindingType::Concrete(runtime_ty)) => {
                mapping.is_assignable(bound_ty.id(), runtime_ty.id())
            }
            (
                BindingType::Parameterized {
                    raw: bound_raw,
                    args: bound_args,
                },
                BindingType::Parameterized {
                    raw: runtime_raw,
                    args: runtime_args,
                },
            ) if self.generic_components.load(Ordering::Relaxed) => {
                mapping.is_assignable(bound_raw.id(), runtime_raw.id())
                    && bound_args.len() == runtime_args.len()
                    && bound_args
                        .iter()
                        .zip(runtime_args)
                        .all(|(bound_arg, runtime_arg)| bound_arg == runtime_arg)
            }
            _ => false,
        }
    }
}

impl Default for ComponentMatcher {
    fn default() -> Self {
        Self::new()
    }
}

// -----------------------------------------------------------------------------
// Tests
