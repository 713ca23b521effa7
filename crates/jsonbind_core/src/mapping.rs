//! The mapping context: descriptor registry and class model cache.
//!
//! One [`MappingContext`] lives for the life of an engine instance. It is
//! shared behind `&` across concurrent de/serialization calls, so all state
//! sits behind `RwLock`s; registration uses first-insert-wins semantics and
//! class models are computed at most once per type (a racing thread may
//! compute a duplicate, but only one result is ever published).

use core::any::TypeId;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::Arc;

use crate::config::{JsonbConfig, PropertyNamingStrategy, PropertyOrderStrategy};
use crate::error::{JsonbError, Result};
use crate::model::BindingType;
use crate::model::class_model::ClassModel;
use crate::model::descriptor::{Bindable, TypeDescriptor};

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

// -----------------------------------------------------------------------------
// MappingContext

/// Central store of everything the engine knows about registered types.
///
/// # Example
///
/// ```
/// use jsonbind_core::mapping::MappingContext;
/// use jsonbind_core::model::Bindable;
///
/// let ctx = MappingContext::new();
/// ctx.register::<Vec<i64>>();
///
/// let binding = <Vec<i64> as Bindable>::binding();
/// assert!(ctx.descriptor_of(&binding).is_ok());
/// ```
pub struct MappingContext {
    descriptors: RwLock<HashMap<TypeId, Arc<TypeDescriptor>>>,
    bindings: RwLock<HashMap<TypeId, BindingType>>,
    /// `(raw id, resolved args)` -> applied instantiation id.
    instantiations: RwLock<HashMap<(TypeId, Vec<BindingType>), TypeId>>,
    /// child id -> parent raw id, for assignability walks.
    parents: RwLock<HashMap<TypeId, TypeId>>,
    models: RwLock<HashMap<TypeId, Arc<ClassModel>>>,
    naming: PropertyNamingStrategy,
    ordering: PropertyOrderStrategy,
}

impl Default for MappingContext {
    fn default() -> Self {
        Self::new()
    }
}

impl MappingContext {
    /// Creates a context with default strategies and the built-in scalar and
    /// dynamic-value registrations.
    pub fn new() -> Self {
        Self::with_config(&JsonbConfig::default())
    }

    pub(crate) fn with_config(config: &JsonbConfig) -> Self {
        let ctx = Self {
            descriptors: RwLock::new(HashMap::new()),
            bindings: RwLock::new(HashMap::new()),
            instantiations: RwLock::new(HashMap::new()),
            parents: RwLock::new(HashMap::new()),
            models: RwLock::new(HashMap::new()),
            naming: config.property_naming(),
            ordering: config.property_order(),
        };
        ctx.register_builtins();
        ctx
    }

    fn register_builtins(&self) {
        self.register::<bool>();
        self.register::<char>();
        self.register::<u8>();
        self.register::<u16>();
        self.register::<u32>();
        self.register::<u64>();
        self.register::<u128>();
        self.register::<usize>();
        self.register::<i8>();
        self.register::<i16>();
        self.register::<i32>();
        self.register::<i64>();
        self.register::<i128>();
        self.register::<isize>();
        self.register::<f32>();
        self.register::<f64>();
        self.register::<String>();
        self.register::<serde_json::Value>();
    }

    pub(crate) fn property_naming(&self) -> PropertyNamingStrategy {
        self.naming
    }

    pub(crate) fn property_order(&self) -> PropertyOrderStrategy {
        self.ordering
    }

    /// Registers `T` and its dependencies. Safe to call repeatedly.
    pub fn register<T: Bindable>(&self) {
        T::register(self);
    }

    /// First-insert-wins registration primitive used by
    /// [`Bindable::register`]. Returns true when `T` was newly inserted.
    pub fn register_with<T: ?Sized + 'static>(
        &self,
        binding: fn() -> BindingType,
        descriptor: fn() -> TypeDescriptor,
    ) -> bool {
        let id = TypeId::of::<T>();
        if read(&self.descriptors).contains_key(&id) {
            return false;
        }
        let descriptor = descriptor();
        let binding = binding();

        let mut descriptors = write(&self.descriptors);
        if descriptors.contains_key(&id) {
            // Another thread won the race; its registration stands.
            return false;
        }
        tracing::debug!(ty = %binding, kind = descriptor.kind(), "registering type");
        if let TypeDescriptor::Object(class) = &descriptor {
            if let Some(parent_raw) = class.parent().and_then(BindingType::raw_type) {
                write(&self.parents).insert(id, parent_raw.id());
            }
        }
        if let BindingType::Parameterized { raw, args } = &binding {
            write(&self.instantiations).insert((raw.id(), args.clone()), id);
        }
        write(&self.bindings).insert(id, binding);
        descriptors.insert(id, Arc::new(descriptor));
        true
    }

    pub fn descriptor(&self, id: TypeId) -> Option<Arc<TypeDescriptor>> {
        read(&self.descriptors).get(&id).cloned()
    }

    /// The binding a type was registered under.
    pub fn binding_of(&self, id: TypeId) -> Option<BindingType> {
        read(&self.bindings).get(&id).cloned()
    }

    /// Maps a resolved binding onto the registered type that implements it:
    /// a concrete binding directly, a parameterized one through the
    /// instantiation index, falling back to the raw (dynamic) registration
    /// the way an erased raw type would.
    pub fn applied_id(&self, ty: &BindingType) -> Option<TypeId> {
        match ty {
            BindingType::Concrete(c) => Some(c.id()),
            BindingType::Parameterized { raw, args } => read(&self.instantiations)
                .get(&(raw.id(), args.clone()))
                .copied()
                .or(Some(raw.id())),
            _ => None,
        }
    }

    /// Descriptor lookup through [`applied_id`](Self::applied_id).
    pub fn descriptor_of(&self, ty: &BindingType) -> Result<Arc<TypeDescriptor>> {
        let id = self.applied_id(ty).ok_or_else(|| match ty {
            BindingType::Variable { name, declared_by } => JsonbError::UnresolvedVariable {
                variable: (*name).to_string(),
                declared_by: declared_by.name().to_string(),
            },
            _ => JsonbError::UnsupportedMapping {
                binding: ty.to_string(),
                message: "binding is not resolved to a concrete type".to_string(),
            },
        })?;
        self.descriptor(id).ok_or_else(|| JsonbError::UnsupportedMapping {
            binding: ty.to_string(),
            message: "type is not registered".to_string(),
        })
    }

    /// The cached class model for the type registered under `id`.
    pub fn class_model(&self, id: TypeId) -> Result<Arc<ClassModel>> {
        if let Some(model) = read(&self.models).get(&id) {
            return Ok(model.clone());
        }
        let built = ClassModel::process(self, id)?;
        let mut models = write(&self.models);
        Ok(models
            .entry(id)
            .or_insert_with(|| Arc::new(built))
            .clone())
    }

    /// Formal type parameter names of the class registered under `id`.
    pub(crate) fn type_params_of(&self, id: TypeId) -> Option<Vec<&'static str>> {
        match self.descriptor(id)?.as_ref() {
            TypeDescriptor::Object(class) => Some(class.type_params().to_vec()),
            _ => None,
        }
    }

    /// The declared (possibly parameterized) superclass of a binding.
    pub(crate) fn parent_of(&self, ty: &BindingType) -> Option<BindingType> {
        let id = self.applied_id(ty)?;
        match self.descriptor(id)?.as_ref() {
            TypeDescriptor::Object(class) => class.parent().cloned(),
            _ => None,
        }
    }

    /// True when `sub` is `sup` or transitively declares it as parent.
    pub fn is_assignable(&self, sup: TypeId, sub: TypeId) -> bool {
        if sup == sub {
            return true;
        }
        let parents = read(&self.parents);
        let mut current = sub;
        let mut hops = 0usize;
        while let Some(parent) = parents.get(&current) {
            if *parent == sup {
                return true;
            }
            current = *parent;
            hops += 1;
            if hops > parents.len() {
                break;
            }
        }
        false
    }
}

// -----------------------------------------------------------------------------
// Tests
