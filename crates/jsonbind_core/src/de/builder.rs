//! Classification of "what deserializes the next value".
//!
//! For every value position the driver calls [`build`] with the declared
//! type, the resolution chain and the event that opened the value. The
//! outcome is either a finished value (scalars, user components, Base64
//! binaries, wrapped optionals) or one or more [`Item`]s to push: a
//! structural item, optionally preceded by transparent wrappers.
//!
//! The classification order matters and is fixed: user deserializer, then
//! adapter, then the descriptor of the resolved type.

use core::any::Any;

use base64::Engine as _;
use serde_json::Value;

use crate::components::component_failure;
use crate::config::BinaryDataStrategy;
use crate::context::JsonbContext;
use crate::convert::ScalarValue;
use crate::de::item::Item;
use crate::de::DeserializationContext;
use crate::error::{JsonbError, Result};
use crate::model::descriptor::TypeDescriptor;
use crate::model::impls::array_raw;
use crate::model::{BindingType, ConcreteType, PropertyCustomization};
use crate::parser::{Event, JsonbParser};
use crate::resolver;

/// Outcome of classifying one value position.
pub(crate) enum Built {
    /// The value is already complete.
    Value(Box<dyn Any>),
    /// Items to push, bottom-most first.
    Items(Vec<Item>),
}

pub(crate) fn build(
    ctx: &JsonbContext,
    parser: &mut JsonbParser<'_>,
    chain: &[BindingType],
    declared: &BindingType,
    customization: Option<&PropertyCustomization>,
    event: Event,
) -> Result<Built> {
    let runtime_type = resolver::resolve_type(ctx.mapping(), chain, declared)?;

    if let Some(deserializer) =
        ctx.components()
            .deserializer_for(&runtime_type, customization, ctx.mapping())
    {
        // A user deserializer may leave part of its subtree unread; the
        // level captured here lets us drain exactly that structure.
        let level = event.is_start_structure().then(|| parser.current_index());
        let mut de_ctx = DeserializationContext::new(ctx);
        let value = deserializer
            .deserialize(parser, &mut de_ctx, &runtime_type)
            .map_err(|e| component_failure(&runtime_type, e))?;
        if let Some(level) = level {
            parser.finish_level(level)?;
        }
        return Ok(Built::Value(value));
    }

    if let Some(adapter) = ctx
        .components()
        .adapter_for(&runtime_type, customization, ctx.mapping())
    {
        let adapted_type = adapter.adapted_type();
        if adapted_type == runtime_type {
            return Err(JsonbError::Component {
                binding: runtime_type.to_string(),
                message: "adapter maps the type onto itself".to_string(),
            });
        }
        return match build(ctx, parser, chain, &adapted_type, None, event)? {
            Built::Value(value) => {
                let original = adapter
                    .from_json(value)
                    .map_err(|e| component_failure(&runtime_type, e))?;
                Ok(Built::Value(original))
            }
            Built::Items(mut items) => {
                items.insert(0, Item::adapted(runtime_type, adapter));
                Ok(Built::Items(items))
            }
        };
    }

    if let Some(binary) = build_base64(ctx, parser, &runtime_type, event)? {
        return Ok(Built::Value(binary));
    }

    let descriptor = ctx.mapping().descriptor_of(&runtime_type)?;
    match descriptor.as_ref() {
        TypeDescriptor::Optional(optional) => {
            let inner = optional.inner.clone();
            match build(ctx, parser, chain, &inner, None, event)? {
                Built::Value(value) => {
                    let wrapped = (optional.wrap)(value).map_err(JsonbError::Internal)?;
                    Ok(Built::Value(wrapped))
                }
                Built::Items(mut items) => {
                    items.insert(0, Item::optional_wrap(runtime_type, optional.wrap));
                    Ok(Built::Items(items))
                }
            }
        }
        TypeDescriptor::Scalar(ty) => {
            Ok(Built::Value(build_scalar(ctx, parser, *ty, event)?))
        }
        TypeDescriptor::JsonValue => match event {
            Event::StartObject | Event::StartArray => {
                Ok(Built::Items(vec![Item::json(event)?]))
            }
            _ => Ok(Built::Value(Box::new(build_dynamic_scalar(parser, event)?))),
        },
        TypeDescriptor::Collection(collection) => {
            expect_event(&runtime_type, event, Event::StartArray)?;
            Ok(Built::Items(vec![Item::collection(
                runtime_type,
                collection.element.clone(),
                collection.from_elements,
            )]))
        }
        TypeDescriptor::Array(array) => {
            expect_event(&runtime_type, event, Event::StartArray)?;
            Ok(Built::Items(vec![Item::array(
                runtime_type,
                array.component.clone(),
                array.primitive,
                array.from_elements,
            )]))
        }
        TypeDescriptor::Map(map) => {
            expect_event(&runtime_type, event, Event::StartObject)?;
            Ok(Built::Items(vec![Item::map(
                runtime_type,
                map.value.clone(),
                map.from_entries,
            )]))
        }
        TypeDescriptor::Object(_) => {
            expect_event(&runtime_type, event, Event::StartObject)?;
            Ok(Built::Items(vec![Item::object(ctx, runtime_type)?]))
        }
    }
}

fn expect_event(runtime_type: &BindingType, found: Event, required: Event) -> Result<()> {
    if found == required {
        Ok(())
    } else {
        Err(JsonbError::UnsupportedMapping {
            binding: runtime_type.to_string(),
            message: format!("cannot bind {found:?}, expected {required:?}"),
        })
    }
}

/// `Box<[u8]>` bound from a Base64 string when the strategy asks for it.
fn build_base64(
    ctx: &JsonbContext,
    parser: &JsonbParser<'_>,
    runtime_type: &BindingType,
    event: Event,
) -> Result<Option<Box<dyn Any>>> {
    if ctx.config().binary_data() != BinaryDataStrategy::Base64
        || event != Event::ValueString
        || runtime_type.raw_type() != Some(array_raw())
        || runtime_type.type_args() != [BindingType::concrete::<u8>()]
    {
        return Ok(None);
    }
    let text = parser.string_value()?;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(text)
        .map_err(|e| JsonbError::Conversion {
            value: text.to_string(),
            target: runtime_type.to_string(),
            message: format!("invalid Base64: {e}"),
        })?;
    Ok(Some(Box::new(bytes.into_boxed_slice())))
}

fn build_scalar(
    ctx: &JsonbContext,
    parser: &JsonbParser<'_>,
    ty: ConcreteType,
    event: Event,
) -> Result<Box<dyn Any>> {
    let scalar = scalar_value(parser, event)?;
    let converter = ctx
        .converters()
        .get(ty.id())
        .ok_or_else(|| JsonbError::UnsupportedMapping {
            binding: ty.name().to_string(),
            message: "no scalar converter is registered".to_string(),
        })?;
    (converter.read)(&scalar).map_err(|message| JsonbError::Conversion {
        value: format!("{scalar:?}"),
        target: ty.name().to_string(),
        message,
    })
}

fn build_dynamic_scalar(parser: &JsonbParser<'_>, event: Event) -> Result<Value> {
    match event {
        Event::ValueString => Ok(Value::String(parser.string_value()?.to_string())),
        Event::ValueNumber => {
            let text = parser.string_value()?;
            let number = text
                .parse::<serde_json::Number>()
                .map_err(|e| JsonbError::Conversion {
                    value: text.to_string(),
                    target: "json number".to_string(),
                    message: e.to_string(),
                })?;
            Ok(Value::Number(number))
        }
        Event::ValueTrue => Ok(Value::Bool(true)),
        Event::ValueFalse => Ok(Value::Bool(false)),
        other => Err(JsonbError::Internal(format!(
            "dynamic scalar requested for {other:?}"
        ))),
    }
}

fn scalar_value<'p>(parser: &'p JsonbParser<'_>, event: Event) -> Result<ScalarValue<'p>> {
    match event {
        Event::ValueString => Ok(ScalarValue::Str(parser.string_value()?)),
        Event::ValueNumber => Ok(ScalarValue::Number(parser.string_value()?)),
        Event::ValueTrue => Ok(ScalarValue::Bool(true)),
        Event::ValueFalse => Ok(ScalarValue::Bool(false)),
        other => Err(JsonbError::Internal(format!(
            "scalar requested for {other:?}"
        ))),
    }
}
