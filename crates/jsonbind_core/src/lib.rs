//! Core JSON data-binding engine: registry-driven, type-erased mapping
//! between JSON documents and plain Rust values.
//!
//! ## Menu
//!
//! - [`model`]: binding types, descriptors, processed class models and the
//!   [`Bindable`](model::Bindable) registration trait.
//! - [`mapping`]: the per-engine type registry and class model cache.
//! - [`resolver`]: type variable and wildcard resolution against runtime
//!   wrapper chains.
//! - [`parser`] / [`generator`]: streaming JSON reader with level
//!   bookkeeping, and the matching writer.
//! - [`de`] / [`ser`]: the two drivers.
//! - [`components`]: user serializers, deserializers and adapters.
//! - [`convert`]: the scalar conversion table.
//! - [`config`] / [`context`]: engine configuration and the assembled
//!   engine instance.
//!
//! The usual entry point is the `jsonbind` facade crate; this crate is the
//! engine itself and is consumed directly only when registering hand-built
//! descriptors or user components.

pub mod components;
pub mod config;
pub mod context;
pub mod convert;
pub mod de;
pub mod error;
pub mod generator;
pub mod mapping;
pub mod model;
pub mod parser;
pub mod resolver;
pub mod ser;

mod macros;

pub use error::{JsonbError, Result};

/// One-stop imports for descriptor authors and component implementors.
pub mod prelude {
    pub use crate::components::{JsonbAdapter, JsonbDeserializer, JsonbSerializer};
    pub use crate::config::JsonbConfig;
    pub use crate::context::JsonbContext;
    pub use crate::error::{JsonbError, Result};
    pub use crate::model::{Bindable, BindingType, ClassDescriptor, PropertyDescriptor, TypeDescriptor};
    pub use crate::{bind_class, property};
}
