#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]

use std::sync::Arc;

use jsonbind_core::context::JsonbContext;
use jsonbind_core::parser::JsonbParser;

pub use jsonbind_core::components::{JsonbAdapter, JsonbDeserializer, JsonbSerializer};
pub use jsonbind_core::config::{
    BinaryDataStrategy, JsonbConfig, PropertyNamingStrategy, PropertyOrderStrategy,
};
pub use jsonbind_core::error::{JsonbError, Result};
pub use jsonbind_core::model::{Bindable, BindingType};
pub use jsonbind_core::{bind_class, property};

/// The engine core, for hand-built descriptors and advanced registration.
pub use jsonbind_core as core;

// -----------------------------------------------------------------------------
// Jsonb

/// A configured binding engine.
///
/// Cheap to clone and safe to share across threads; all per-engine state
/// (type registry, class model cache, components) lives behind the shared
/// context.
///
/// # Example
///
/// ```
/// use jsonbind::Jsonb;
///
/// #[derive(Default, Debug, PartialEq)]
/// struct Point {
///     x: i32,
///     y: i32,
/// }
/// jsonbind::bind_class!(Point { x: i32, y: i32 });
///
/// let jsonb = Jsonb::new();
/// let point: Point = jsonb.from_str(r#"{"x":1,"y":2}"#)?;
/// assert_eq!(point, Point { x: 1, y: 2 });
/// assert_eq!(jsonb.to_string(&point)?, r#"{"x":1,"y":2}"#);
/// # Ok::<(), jsonbind::JsonbError>(())
/// ```
#[derive(Clone)]
pub struct Jsonb {
    context: Arc<JsonbContext>,
}

impl Jsonb {
    /// An engine with default configuration.
    pub fn new() -> Self {
        JsonbBuilder::new().build()
    }

    #[inline]
    pub fn builder() -> JsonbBuilder {
        JsonbBuilder::new()
    }

    /// Binds a complete JSON document to `T`.
    pub fn from_str<T: Bindable>(&self, json: &str) -> Result<T> {
        self.context.mapping().register::<T>();
        let mut parser = JsonbParser::new(json);
        let value = jsonbind_core::de::deserialize(&self.context, &T::binding(), &mut parser)?;
        // Surfaces trailing garbage after the root value.
        if parser.has_next()? {
            return Err(JsonbError::Internal(
                "root value left the document unconsumed".to_string(),
            ));
        }
        value
            .downcast::<T>()
            .map(|boxed| *boxed)
            .map_err(|_| JsonbError::Internal("bound value has an unexpected type".to_string()))
    }

    /// Serializes `value` to JSON text.
    pub fn to_string<T: Bindable>(&self, value: &T) -> Result<String> {
        self.context.mapping().register::<T>();
        jsonbind_core::ser::serialize(&self.context, &T::binding(), value)
    }

    /// The underlying engine context, for direct registration of hand-built
    /// descriptors or dynamically-typed calls into the drivers.
    #[inline]
    pub fn context(&self) -> &Arc<JsonbContext> {
        &self.context
    }
}

impl Default for Jsonb {
    fn default() -> Self {
        Self::new()
    }
}

// -----------------------------------------------------------------------------
// JsonbBuilder

/// Builds a [`Jsonb`] engine from a [`JsonbConfig`].
#[derive(Default)]
pub struct JsonbBuilder {
    config: JsonbConfig,
}

impl JsonbBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: JsonbConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Jsonb {
        Jsonb {
            context: Arc::new(JsonbContext::new(self.config)),
        }
    }
}
