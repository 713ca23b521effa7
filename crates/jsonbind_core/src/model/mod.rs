//! The binding type model.
//!
//! ## Menu
//!
//! - [`BindingType`] / [`ConcreteType`]: binding-time type identities,
//!   including variables and wildcards (see [`binding_type`]).
//! - [`Bindable`] and [`TypeDescriptor`]: per-type registration surface and
//!   the closed classification the drivers dispatch on (see [`descriptor`]).
//! - [`ClassModel`] / [`PropertyModel`]: processed object models (see
//!   [`class_model`]).
//! - [`customization`]: renamed keys, creators, null policy, polymorphism.
//! - [`impls`]: `Bindable` for scalars, containers and `serde_json::Value`.

pub mod binding_type;
pub mod class_model;
pub mod customization;
pub mod descriptor;
pub mod impls;

pub use binding_type::{BindingType, ConcreteType};
pub use class_model::{ClassModel, PropertyModel};
pub use customization::{
    ClassCustomization, CreatorDescriptor, PropertyCustomization, TypeWrapper,
};
pub use descriptor::{
    ArrayDescriptor, Bindable, ClassDescriptor, CollectionDescriptor, CreateFn, FromElementsFn,
    FromEntriesFn, GetterFn, InstanceFn, MapDescriptor, OptionalDescriptor, PrimitiveKind,
    PropertyDescriptor, SetterFn, TypeDescriptor,
};
