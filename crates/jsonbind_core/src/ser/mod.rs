//! The serialization driver, mirroring [`crate::de`].
//!
//! ## Menu
//!
//! - [`serialize`]: renders one value to JSON text under its declared
//!   binding type.
//! - [`SerializationContext`]: recursion state (the generic resolution
//!   chain) plus the delegation surface for user serializers.
//!
//! Classification order matches deserialization: user serializer, then
//! adapter, then the descriptor of the resolved type.

use core::any::{Any, TypeId};

use base64::Engine as _;
use serde_json::Value;

use crate::components::component_failure;
use crate::config::BinaryDataStrategy;
use crate::context::JsonbContext;
use crate::convert::ScalarToken;
use crate::error::{JsonbError, Result};
use crate::generator::JsonGenerator;
use crate::model::descriptor::TypeDescriptor;
use crate::model::impls::array_raw;
use crate::model::{BindingType, ConcreteType, PropertyCustomization};
use crate::resolver;

// -----------------------------------------------------------------------------
// Entry point

/// Serializes `value` under the declared binding type.
pub fn serialize(ctx: &JsonbContext, declared: &BindingType, value: &dyn Any) -> Result<String> {
    let mut generator = JsonGenerator::new(ctx.config().formatting());
    let mut s = SerializationContext::new(ctx);
    s.serialize_value(declared, None, value, &mut generator)?;
    Ok(generator.finish())
}

// -----------------------------------------------------------------------------
// SerializationContext

/// Recursion state for one serialization run.
pub struct SerializationContext<'a> {
    ctx: &'a JsonbContext,
    /// Runtime types of the enclosing values that still carry type
    /// arguments; variables in declared property types resolve against it.
    chain: Vec<BindingType>,
}

impl<'a> SerializationContext<'a> {
    pub(crate) fn new(ctx: &'a JsonbContext) -> Self {
        Self {
            ctx,
            chain: Vec::new(),
        }
    }

    pub fn context(&self) -> &JsonbContext {
        self.ctx
    }

    /// Delegation surface for user serializers.
    pub fn serialize(
        &mut self,
        declared: &BindingType,
        value: &dyn Any,
        generator: &mut JsonGenerator,
    ) -> Result<()> {
        self.serialize_value(declared, None, value, generator)
    }

    fn serialize_value(
        &mut self,
        declared: &BindingType,
        customization: Option<&PropertyCustomization>,
        value: &dyn Any,
        generator: &mut JsonGenerator,
    ) -> Result<()> {
        let mut runtime_type = resolver::resolve_type(self.ctx.mapping(), &self.chain, declared)?;

        // A dynamic slot holding a registered concrete value serializes as
        // that value's own type.
        if runtime_type.is_dynamic() && value.type_id() != TypeId::of::<Value>() {
            runtime_type = self
                .ctx
                .mapping()
                .binding_of(value.type_id())
                .ok_or_else(|| JsonbError::UnsupportedMapping {
                    binding: declared.to_string(),
                    message: "runtime value type is not registered".to_string(),
                })?;
        }

        if let Some(serializer) =
            self.ctx
                .components()
                .serializer_for(&runtime_type, customization, self.ctx.mapping())
        {
            return serializer
                .serialize(value, generator, self)
                .map_err(|e| component_failure(&runtime_type, e));
        }

        if let Some(adapter) =
            self.ctx
                .components()
                .adapter_for(&runtime_type, customization, self.ctx.mapping())
        {
            let adapted_type = adapter.adapted_type();
            if adapted_type == runtime_type {
                return Err(JsonbError::Component {
                    binding: runtime_type.to_string(),
                    message: "adapter maps the type onto itself".to_string(),
                });
            }
            let adapted = adapter
                .to_json(value)
                .map_err(|e| component_failure(&runtime_type, e))?;
            return self.serialize_value(&adapted_type, None, adapted.as_ref(), generator);
        }

        if self.write_base64(&runtime_type, value, generator)? {
            return Ok(());
        }

        let descriptor = self.ctx.mapping().descriptor_of(&runtime_type)?;
        match descriptor.as_ref() {
            TypeDescriptor::Scalar(ty) => self.write_scalar(*ty, value, generator),
            TypeDescriptor::JsonValue => {
                let value = value.downcast_ref::<Value>().ok_or_else(|| {
                    JsonbError::Internal("dynamic slot does not hold a JSON value".to_string())
                })?;
                write_value(generator, value)
            }
            TypeDescriptor::Optional(optional) => {
                let projected = (optional.project)(value).map_err(JsonbError::Internal)?;
                match projected {
                    Some(inner) => {
                        let inner_type = optional.inner.clone();
                        self.serialize_value(&inner_type, None, inner, generator)
                    }
                    None => generator.write_null(),
                }
            }
            TypeDescriptor::Collection(collection) => {
                let element = collection.element.clone();
                let iter = collection.iter;
                self.write_sequence(&runtime_type, &element, iter, value, generator)
            }
            TypeDescriptor::Array(array) => {
                let component = array.component.clone();
                let iter = array.iter;
                self.write_sequence(&runtime_type, &component, iter, value, generator)
            }
            TypeDescriptor::Map(map) => {
                let value_type = map.value.clone();
                let entries = (map.entries)(value).map_err(JsonbError::Internal)?;
                generator.write_start_object()?;
                self.chain.push(runtime_type.clone());
                let result = (|| -> Result<()> {
                    for (key, entry) in entries {
                        generator.write_key(key)?;
                        self.serialize_value(&value_type, None, entry, generator)?;
                    }
                    Ok(())
                })();
                self.chain.pop();
                result?;
                generator.write_end()
            }
            TypeDescriptor::Object(_) => self.write_object(&runtime_type, value, generator),
        }
    }

    fn write_sequence(
        &mut self,
        runtime_type: &BindingType,
        element: &BindingType,
        iter: crate::model::descriptor::IterFn,
        value: &dyn Any,
        generator: &mut JsonGenerator,
    ) -> Result<()> {
        let elements = iter(value).map_err(JsonbError::Internal)?;
        generator.write_start_array()?;
        self.chain.push(runtime_type.clone());
        let result = (|| -> Result<()> {
            for entry in elements {
                self.serialize_value(element, None, entry, generator)?;
            }
            Ok(())
        })();
        self.chain.pop();
        result?;
        generator.write_end()
    }

    fn write_object(
        &mut self,
        runtime_type: &BindingType,
        value: &dyn Any,
        generator: &mut JsonGenerator,
    ) -> Result<()> {
        let mapping = self.ctx.mapping();
        let id = mapping
            .applied_id(runtime_type)
            .ok_or_else(|| JsonbError::UnsupportedMapping {
                binding: runtime_type.to_string(),
                message: "binding is not resolved to a concrete type".to_string(),
            })?;
        let mut model = mapping.class_model(id)?;

        generator.write_start_object()?;

        // A polymorphic base writes the discriminator first and then the
        // concrete subtype's own properties.
        if let Some(wrapper) = model.customization().type_wrapper.clone() {
            let actual = value.type_id();
            let alias = wrapper
                .alias_for(actual)
                .ok_or_else(|| JsonbError::UnsupportedMapping {
                    binding: runtime_type.to_string(),
                    message: "runtime value type has no registered alias".to_string(),
                })?;
            generator.write_key(&wrapper.key)?;
            generator.write_string(alias)?;
            if actual != model.ty().id() {
                model = mapping.class_model(actual)?;
            }
        }

        self.chain.push(runtime_type.clone());
        let result = (|| -> Result<()> {
            for property in model.properties() {
                let Some(getter) = property.getter() else {
                    continue;
                };
                let field = getter(value).ok_or_else(|| {
                    JsonbError::Internal(format!(
                        "getter for `{}` rejected its own instance",
                        property.name()
                    ))
                })?;
                let declared = property.declared_type();

                // Empty optionals are omitted unless some null policy asks
                // for an explicit null.
                if let Some(projected) = self.project_optional(declared, field)? {
                    if projected.is_none() {
                        let nillable = property
                            .customization()
                            .nillable
                            .or(model.customization().nillable)
                            .unwrap_or_else(|| self.ctx.config().null_values());
                        if nillable {
                            generator.write_key(property.write_name())?;
                            generator.write_null()?;
                        }
                        continue;
                    }
                }

                generator.write_key(property.write_name())?;
                self.serialize_value(
                    declared,
                    Some(property.customization()),
                    field,
                    generator,
                )?;
            }
            Ok(())
        })();
        self.chain.pop();
        result?;
        generator.write_end()
    }

    /// `Some(projection)` when the property's resolved type is an `Option`.
    fn project_optional<'v>(
        &self,
        declared: &BindingType,
        field: &'v dyn Any,
    ) -> Result<Option<Option<&'v dyn Any>>> {
        let resolved = resolver::resolve_type_or_dynamic(self.ctx.mapping(), &self.chain, declared);
        let Ok(descriptor) = self.ctx.mapping().descriptor_of(&resolved) else {
            return Ok(None);
        };
        match descriptor.as_ref() {
            TypeDescriptor::Optional(optional) => {
                Ok(Some((optional.project)(field).map_err(JsonbError::Internal)?))
            }
            _ => Ok(None),
        }
    }

    fn write_scalar(
        &self,
        ty: ConcreteType,
        value: &dyn Any,
        generator: &mut JsonGenerator,
    ) -> Result<()> {
        let converter = self
            .ctx
            .converters()
            .get(ty.id())
            .ok_or_else(|| JsonbError::UnsupportedMapping {
                binding: ty.name().to_string(),
                message: "no scalar converter is registered".to_string(),
            })?;
        let token = (converter.write)(value).map_err(|message| JsonbError::Conversion {
            value: "<value>".to_string(),
            target: ty.name().to_string(),
            message,
        })?;
        match token {
            ScalarToken::Str(s) => generator.write_string(&s),
            ScalarToken::Number(raw) => generator.write_number_raw(&raw),
            ScalarToken::Bool(b) => generator.write_bool(b),
        }
    }

    fn write_base64(
        &self,
        runtime_type: &BindingType,
        value: &dyn Any,
        generator: &mut JsonGenerator,
    ) -> Result<bool> {
        if self.ctx.config().binary_data() != BinaryDataStrategy::Base64
            || runtime_type.raw_type() != Some(array_raw())
            || runtime_type.type_args() != [BindingType::concrete::<u8>()]
        {
            return Ok(false);
        }
        let bytes = value.downcast_ref::<Box<[u8]>>().ok_or_else(|| {
            JsonbError::Internal("binary slot does not hold a byte array".to_string())
        })?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes.as_ref());
        generator.write_string(&encoded)?;
        Ok(true)
    }
}

/// Writes a dynamic JSON value verbatim.
fn write_value(generator: &mut JsonGenerator, value: &Value) -> Result<()> {
    match value {
        Value::Null => generator.write_null(),
        Value::Bool(b) => generator.write_bool(*b),
        Value::Number(n) => generator.write_number_raw(&n.to_string()),
        Value::String(s) => generator.write_string(s),
        Value::Array(items) => {
            generator.write_start_array()?;
            for item in items {
                write_value(generator, item)?;
            }
            generator.write_end()
        }
        Value::Object(map) => {
            generator.write_start_object()?;
            for (key, entry) in map {
                generator.write_key(key)?;
                write_value(generator, entry)?;
            }
            generator.write_end()
        }
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bind_class;
    use crate::config::JsonbConfig;
    use crate::model::Bindable;
    use std::collections::BTreeMap;

    fn write<T: Bindable>(ctx: &JsonbContext, value: &T) -> String {
        ctx.mapping().register::<T>();
        serialize(ctx, &T::binding(), value).expect("serialize")
    }

    #[derive(Default)]
    struct Point {
        x: i32,
        y: i32,
        label: Option<String>,
    }
    bind_class!(Point { x: i32, y: i32, label: Option<String> });

    #[test]
    fn object_with_absent_optional() {
        let ctx = JsonbContext::default();
        let out = write(&ctx, &Point { x: 1, y: 2, label: None });
        assert_eq!(out, r#"{"x":1,"y":2}"#);
    }

    #[test]
    fn null_values_config_writes_explicit_nulls() {
        let ctx = JsonbContext::new(JsonbConfig::new().with_null_values(true));
        let out = write(&ctx, &Point { x: 1, y: 2, label: None });
        assert_eq!(out, r#"{"x":1,"y":2,"label":null}"#);
    }

    #[test]
    fn present_optional_writes_the_inner_value() {
        let ctx = JsonbContext::default();
        let out = write(
            &ctx,
            &Point {
                x: 0,
                y: 0,
                label: Some("origin".into()),
            },
        );
        assert_eq!(out, r#"{"x":0,"y":0,"label":"origin"}"#);
    }

    #[test]
    fn collections_and_maps() {
        let ctx = JsonbContext::default();
        assert_eq!(write(&ctx, &vec![1i64, 2, 3]), "[1,2,3]");

        let mut map = BTreeMap::new();
        map.insert("a".to_string(), 1i64);
        map.insert("b".to_string(), 2i64);
        assert_eq!(write(&ctx, &map), r#"{"a":1,"b":2}"#);
    }

    #[test]
    fn dynamic_values_write_verbatim() {
        let ctx = JsonbContext::default();
        let value = serde_json::json!({"a": [1, "two", null, {"b": false}]});
        assert_eq!(
            write(&ctx, &value),
            r#"{"a":[1,"two",null,{"b":false}]}"#
        );
    }

    #[test]
    fn pretty_formatting() {
        let ctx = JsonbContext::new(JsonbConfig::new().with_formatting(true));
        let out = write(&ctx, &vec![1i64]);
        assert_eq!(out, "[\n  1\n]");
    }

    #[test]
    fn root_scalars() {
        let ctx = JsonbContext::default();
        assert_eq!(write(&ctx, &9007199254740993i64), "9007199254740993");
        assert_eq!(write(&ctx, &"hi".to_string()), r#""hi""#);
    }
}
