//! Type descriptors: what the engine knows about each registered type.
//!
//! ## Menu
//!
//! - [`Bindable`]: implemented by every type that can be a binding target.
//!   Supplies the type's [`BindingType`] identity, its [`TypeDescriptor`]
//!   and recursive registration of dependency types.
//! - [`TypeDescriptor`]: the closed classification the de/ser drivers
//!   dispatch on. Each structural variant carries erased `fn` pointers that
//!   do the monomorphic work (building a `Vec<T>` from boxed elements,
//!   iterating it, projecting an `Option<T>`, ...) so the drivers never need
//!   the concrete type in scope.
//! - [`ClassDescriptor`] / [`PropertyDescriptor`]: the raw, as-declared
//!   shape of a bound struct, before naming/ordering processing turns it
//!   into a [`ClassModel`](crate::model::ClassModel).

use core::any::{Any, TypeId};

use crate::mapping::MappingContext;
use crate::model::binding_type::{BindingType, ConcreteType};
use crate::model::customization::{ClassCustomization, PropertyCustomization};

// -----------------------------------------------------------------------------
// Erased operation signatures

/// Borrows one property out of an instance. `None` means the instance was
/// not of the owning type, which is an engine invariant violation.
pub type GetterFn = for<'a> fn(&'a dyn Any) -> Option<&'a dyn Any>;

/// Stores a boxed value into one property of an instance.
pub type SetterFn = fn(&mut dyn Any, Box<dyn Any>) -> Result<(), String>;

/// Builds a default instance.
pub type InstanceFn = fn() -> Box<dyn Any>;

/// Builds an instance from creator parameters; `None` slots were absent in
/// the document.
pub type CreateFn = fn(Vec<Option<Box<dyn Any>>>) -> Result<Box<dyn Any>, String>;

/// Materializes a collection or array from buffered elements.
pub type FromElementsFn = fn(Vec<Box<dyn Any>>) -> Result<Box<dyn Any>, String>;

/// Materializes a map from buffered string-keyed entries.
pub type FromEntriesFn = fn(Vec<(String, Box<dyn Any>)>) -> Result<Box<dyn Any>, String>;

/// Borrows the elements of a collection or array.
pub type IterFn = for<'a> fn(&'a dyn Any) -> Result<Box<dyn Iterator<Item = &'a dyn Any> + 'a>, String>;

/// Borrows the entries of a map.
pub type EntryIterFn =
    for<'a> fn(&'a dyn Any) -> Result<Box<dyn Iterator<Item = (&'a str, &'a dyn Any)> + 'a>, String>;

/// Wraps a value into its optional carrier (`T` -> `Some(T)`).
pub type WrapFn = fn(Box<dyn Any>) -> Result<Box<dyn Any>, String>;

/// Projects out of an optional carrier (`&Option<T>` -> `Option<&T>`).
pub type ProjectFn = for<'a> fn(&'a dyn Any) -> Result<Option<&'a dyn Any>, String>;

// -----------------------------------------------------------------------------
// Bindable

/// A type the engine can bind JSON to and from.
///
/// Implementations are usually written once per domain type, either by hand
/// through [`ClassDescriptor`] or with the [`bind_class!`](crate::bind_class)
/// macro. Container and scalar impls ship with the crate.
pub trait Bindable: 'static {
    /// The binding-time identity of this type.
    fn binding() -> BindingType;

    /// The descriptor the drivers dispatch on.
    fn descriptor() -> TypeDescriptor;

    /// Registers this type and, on first registration, its dependencies.
    fn register(ctx: &MappingContext) {
        if ctx.register_with::<Self>(Self::binding, Self::descriptor) {
            Self::register_dependencies(ctx);
        }
    }

    /// Registers types this type's descriptor refers to. Called at most once
    /// per context, guarded by the registry's first-insert check.
    fn register_dependencies(_ctx: &MappingContext) {}
}

// -----------------------------------------------------------------------------
// TypeDescriptor

/// The closed classification of registered types.
pub enum TypeDescriptor {
    /// A leaf value handled by the scalar conversion table.
    Scalar(ConcreteType),
    /// A bound struct with named properties.
    Object(ClassDescriptor),
    /// A growable sequence (`Vec<T>`).
    Collection(CollectionDescriptor),
    /// A string-keyed map.
    Map(MapDescriptor),
    /// A fixed-size sequence (`Box<[T]>`), materialized only once the
    /// closing bracket is known.
    Array(ArrayDescriptor),
    /// An `Option<T>` null carrier.
    Optional(OptionalDescriptor),
    /// The dynamic JSON value type itself.
    JsonValue,
}

impl TypeDescriptor {
    /// Short kind name for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            TypeDescriptor::Scalar(_) => "scalar",
            TypeDescriptor::Object(_) => "object",
            TypeDescriptor::Collection(_) => "collection",
            TypeDescriptor::Map(_) => "map",
            TypeDescriptor::Array(_) => "array",
            TypeDescriptor::Optional(_) => "optional",
            TypeDescriptor::JsonValue => "json value",
        }
    }
}

pub struct CollectionDescriptor {
    /// Declared element type; may contain variables until resolved.
    pub element: BindingType,
    pub from_elements: FromElementsFn,
    pub iter: IterFn,
}

pub struct MapDescriptor {
    /// Declared value type. Keys are always strings.
    pub value: BindingType,
    pub from_entries: FromEntriesFn,
    pub entries: EntryIterFn,
}

pub struct ArrayDescriptor {
    pub component: BindingType,
    /// Set when the component is one of the specialized primitive widths;
    /// element buffering then avoids per-element boxing.
    pub primitive: Option<PrimitiveKind>,
    pub from_elements: FromElementsFn,
    pub iter: IterFn,
}

pub struct OptionalDescriptor {
    pub inner: BindingType,
    pub wrap: WrapFn,
    pub empty: InstanceFn,
    pub project: ProjectFn,
}

/// The primitive component widths that get dedicated array buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveKind {
    Bool,
    I8,
    U8,
    I16,
    I32,
    I64,
    F32,
    F64,
}

impl PrimitiveKind {
    pub fn of(id: TypeId) -> Option<Self> {
        if id == TypeId::of::<bool>() {
            Some(Self::Bool)
        } else if id == TypeId::of::<i8>() {
            Some(Self::I8)
        } else if id == TypeId::of::<u8>() {
            Some(Self::U8)
        } else if id == TypeId::of::<i16>() {
            Some(Self::I16)
        } else if id == TypeId::of::<i32>() {
            Some(Self::I32)
        } else if id == TypeId::of::<i64>() {
            Some(Self::I64)
        } else if id == TypeId::of::<f32>() {
            Some(Self::F32)
        } else if id == TypeId::of::<f64>() {
            Some(Self::F64)
        } else {
            None
        }
    }
}

// -----------------------------------------------------------------------------
// ClassDescriptor

/// The as-declared shape of a bound struct.
pub struct ClassDescriptor {
    ty: ConcreteType,
    type_params: Vec<&'static str>,
    parent: Option<BindingType>,
    properties: Vec<PropertyDescriptor>,
    customization: ClassCustomization,
    instance: Option<InstanceFn>,
}

impl ClassDescriptor {
    pub fn new<T: ?Sized + 'static>() -> Self {
        Self {
            ty: ConcreteType::of::<T>(),
            type_params: Vec::new(),
            parent: None,
            properties: Vec::new(),
            customization: ClassCustomization::default(),
            instance: None,
        }
    }

    /// Names the formal type parameters of a generic declaration, in order.
    pub fn with_type_params(mut self, params: Vec<&'static str>) -> Self {
        self.type_params = params;
        self
    }

    /// Declares the (possibly parameterized) superclass this struct models
    /// an extension of. Used for property inheritance and type variable
    /// resolution.
    pub fn with_parent(mut self, parent: BindingType) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_property(mut self, property: PropertyDescriptor) -> Self {
        self.properties.push(property);
        self
    }

    pub fn with_customization(mut self, customization: ClassCustomization) -> Self {
        self.customization = customization;
        self
    }

    pub fn with_instance(mut self, instance: InstanceFn) -> Self {
        self.instance = Some(instance);
        self
    }

    pub fn ty(&self) -> ConcreteType {
        self.ty
    }

    pub fn type_params(&self) -> &[&'static str] {
        &self.type_params
    }

    pub fn parent(&self) -> Option<&BindingType> {
        self.parent.as_ref()
    }

    pub fn properties(&self) -> &[PropertyDescriptor] {
        &self.properties
    }

    pub fn customization(&self) -> &ClassCustomization {
        &self.customization
    }

    pub fn instance(&self) -> Option<InstanceFn> {
        self.instance
    }
}

// -----------------------------------------------------------------------------
// PropertyDescriptor

/// One declared property of a bound struct.
pub struct PropertyDescriptor {
    name: &'static str,
    declared_type: BindingType,
    getter: Option<GetterFn>,
    setter: Option<SetterFn>,
    customization: PropertyCustomization,
}

impl PropertyDescriptor {
    pub fn new(name: &'static str, declared_type: BindingType) -> Self {
        Self {
            name,
            declared_type,
            getter: None,
            setter: None,
            customization: PropertyCustomization::default(),
        }
    }

    pub fn with_getter(mut self, getter: GetterFn) -> Self {
        self.getter = Some(getter);
        self
    }

    pub fn with_setter(mut self, setter: SetterFn) -> Self {
        self.setter = Some(setter);
        self
    }

    pub fn with_customization(mut self, customization: PropertyCustomization) -> Self {
        self.customization = customization;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn declared_type(&self) -> &BindingType {
        &self.declared_type
    }

    pub fn getter(&self) -> Option<GetterFn> {
        self.getter
    }

    pub fn setter(&self) -> Option<SetterFn> {
        self.setter
    }

    pub fn customization(&self) -> &PropertyCustomization {
        &self.customization
    }
}
