//! In-flight deserialization state, one [`Item`] per partially built value.
//!
//! The driver keeps a stack of items mirroring the parser's open levels.
//! Every item knows what child type comes next, accepts finished child
//! values, and materializes itself when its closing bracket arrives. Two
//! item kinds are *transparent*: they never correspond to a parser level and
//! instead rewrap the single child value that completes beneath them
//! (adapter originals and `Option` carriers around structures).

use core::any::Any;
use std::sync::Arc;

use serde_json::Value;

use crate::components::{component_failure, JsonbAdapter};
use crate::context::JsonbContext;
use crate::error::{JsonbError, Result};
use crate::model::customization::TypeWrapper;
use crate::model::descriptor::{FromElementsFn, FromEntriesFn, PrimitiveKind, TypeDescriptor, WrapFn};
use crate::model::impls::option_raw;
use crate::model::{BindingType, ClassModel, PropertyCustomization};
use crate::parser::Event;
use crate::resolver;

// -----------------------------------------------------------------------------
// Driver-facing surface

/// What the driver should do with the value following an object key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum KeyAction {
    /// The key bound to a slot; deserialize the value.
    Bind,
    /// No slot takes this key; skip the value's whole subtree.
    SkipValue,
}

/// The declared shape of the next child value.
pub(crate) struct ChildSlot {
    pub ty: BindingType,
    pub customization: Option<PropertyCustomization>,
}

// -----------------------------------------------------------------------------
// Item

pub(crate) struct Item {
    runtime_type: BindingType,
    kind: ItemKind,
}

enum ItemKind {
    Object(ObjectData),
    Collection {
        element: BindingType,
        from_elements: FromElementsFn,
        values: Vec<Box<dyn Any>>,
    },
    Map {
        value: BindingType,
        from_entries: FromEntriesFn,
        entries: Vec<(String, Box<dyn Any>)>,
        pending_key: Option<String>,
    },
    Array {
        component: BindingType,
        from_elements: FromElementsFn,
        buffer: ArrayBuffer,
    },
    Json(JsonNode),
    Wrapper {
        wrapper: TypeWrapper,
        state: WrapperState,
    },
    /// Transparent: turns the completed adapted value back into the
    /// original type.
    Adapted { adapter: Arc<dyn JsonbAdapter> },
    /// Transparent: wraps the completed structure into `Some(..)`.
    OptionalWrap { wrap: WrapFn },
}

struct ObjectData {
    model: Arc<ClassModel>,
    /// One slot per property, filled as keys arrive.
    values: Vec<Option<Box<dyn Any>>>,
    /// Property the pending value binds to.
    current: Option<usize>,
}

enum WrapperState {
    /// Waiting for the discriminator key.
    ExpectKey,
    /// Discriminator key seen, waiting for the alias string.
    ExpectAlias,
    /// Concrete type known; everything else is forwarded.
    Inner(Box<Item>),
}

enum JsonNode {
    Object {
        map: serde_json::Map<String, Value>,
        pending_key: Option<String>,
    },
    Array(Vec<Value>),
}

/// Unboxed buffers for the primitive component widths.
pub(crate) enum ArrayBuffer {
    Boxed(Vec<Box<dyn Any>>),
    Bool(Vec<bool>),
    I8(Vec<i8>),
    U8(Vec<u8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl ArrayBuffer {
    fn for_kind(kind: Option<PrimitiveKind>) -> Self {
        match kind {
            None => ArrayBuffer::Boxed(Vec::new()),
            Some(PrimitiveKind::Bool) => ArrayBuffer::Bool(Vec::new()),
            Some(PrimitiveKind::I8) => ArrayBuffer::I8(Vec::new()),
            Some(PrimitiveKind::U8) => ArrayBuffer::U8(Vec::new()),
            Some(PrimitiveKind::I16) => ArrayBuffer::I16(Vec::new()),
            Some(PrimitiveKind::I32) => ArrayBuffer::I32(Vec::new()),
            Some(PrimitiveKind::I64) => ArrayBuffer::I64(Vec::new()),
            Some(PrimitiveKind::F32) => ArrayBuffer::F32(Vec::new()),
            Some(PrimitiveKind::F64) => ArrayBuffer::F64(Vec::new()),
        }
    }

    fn push(&mut self, value: Box<dyn Any>) -> Result<(), String> {
        fn unbox<T: 'static>(value: Box<dyn Any>, out: &mut Vec<T>) -> Result<(), String> {
            let value = value
                .downcast::<T>()
                .map_err(|_| format!("array element is not `{}`", core::any::type_name::<T>()))?;
            out.push(*value);
            Ok(())
        }
        match self {
            ArrayBuffer::Boxed(out) => {
                out.push(value);
                Ok(())
            }
            ArrayBuffer::Bool(out) => unbox(value, out),
            ArrayBuffer::I8(out) => unbox(value, out),
            ArrayBuffer::U8(out) => unbox(value, out),
            ArrayBuffer::I16(out) => unbox(value, out),
            ArrayBuffer::I32(out) => unbox(value, out),
            ArrayBuffer::I64(out) => unbox(value, out),
            ArrayBuffer::F32(out) => unbox(value, out),
            ArrayBuffer::F64(out) => unbox(value, out),
        }
    }

    fn finish(self, from_elements: FromElementsFn) -> Result<Box<dyn Any>, String> {
        match self {
            ArrayBuffer::Boxed(values) => from_elements(values),
            ArrayBuffer::Bool(v) => Ok(Box::new(v.into_boxed_slice())),
            ArrayBuffer::I8(v) => Ok(Box::new(v.into_boxed_slice())),
            ArrayBuffer::U8(v) => Ok(Box::new(v.into_boxed_slice())),
            ArrayBuffer::I16(v) => Ok(Box::new(v.into_boxed_slice())),
            ArrayBuffer::I32(v) => Ok(Box::new(v.into_boxed_slice())),
            ArrayBuffer::I64(v) => Ok(Box::new(v.into_boxed_slice())),
            ArrayBuffer::F32(v) => Ok(Box::new(v.into_boxed_slice())),
            ArrayBuffer::F64(v) => Ok(Box::new(v.into_boxed_slice())),
        }
    }
}

impl Item {
    pub(crate) fn collection(
        runtime_type: BindingType,
        element: BindingType,
        from_elements: FromElementsFn,
    ) -> Self {
        Self {
            runtime_type,
            kind: ItemKind::Collection {
                element,
                from_elements,
                values: Vec::new(),
            },
        }
    }

    pub(crate) fn map(
        runtime_type: BindingType,
        value: BindingType,
        from_entries: FromEntriesFn,
    ) -> Self {
        Self {
            runtime_type,
            kind: ItemKind::Map {
                value,
                from_entries,
                entries: Vec::new(),
                pending_key: None,
            },
        }
    }

    pub(crate) fn array(
        runtime_type: BindingType,
        component: BindingType,
        primitive: Option<PrimitiveKind>,
        from_elements: FromElementsFn,
    ) -> Self {
        Self {
            runtime_type,
            kind: ItemKind::Array {
                component,
                from_elements,
                buffer: ArrayBuffer::for_kind(primitive),
            },
        }
    }

    /// Builds the item for a bound struct; a polymorphic base becomes a
    /// wrapper item that resolves the concrete type from the discriminator.
    pub(crate) fn object(ctx: &JsonbContext, runtime_type: BindingType) -> Result<Self> {
        let id = ctx
            .mapping()
            .applied_id(&runtime_type)
            .ok_or_else(|| JsonbError::UnsupportedMapping {
                binding: runtime_type.to_string(),
                message: "binding is not resolved to a concrete type".to_string(),
            })?;
        let model = ctx.mapping().class_model(id)?;
        if let Some(wrapper) = &model.customization().type_wrapper {
            return Ok(Self {
                runtime_type,
                kind: ItemKind::Wrapper {
                    wrapper: wrapper.clone(),
                    state: WrapperState::ExpectKey,
                },
            });
        }
        let values = (0..model.properties().len()).map(|_| None).collect();
        Ok(Self {
            runtime_type,
            kind: ItemKind::Object(ObjectData {
                model,
                values,
                current: None,
            }),
        })
    }

    pub(crate) fn json(event: Event) -> Result<Self> {
        let node = match event {
            Event::StartObject => JsonNode::Object {
                map: serde_json::Map::new(),
                pending_key: None,
            },
            Event::StartArray => JsonNode::Array(Vec::new()),
            other => {
                return Err(JsonbError::Internal(format!(
                    "dynamic item opened on {other:?}"
                )));
            }
        };
        Ok(Self {
            runtime_type: BindingType::dynamic(),
            kind: ItemKind::Json(node),
        })
    }

    pub(crate) fn adapted(runtime_type: BindingType, adapter: Arc<dyn JsonbAdapter>) -> Self {
        Self {
            runtime_type,
            kind: ItemKind::Adapted { adapter },
        }
    }

    pub(crate) fn optional_wrap(runtime_type: BindingType, wrap: WrapFn) -> Self {
        Self {
            runtime_type,
            kind: ItemKind::OptionalWrap { wrap },
        }
    }

    /// The (resolved) binding this item is building. Wrapper items report
    /// the concrete subtype once the discriminator has been read.
    pub(crate) fn runtime_type(&self) -> &BindingType {
        match &self.kind {
            ItemKind::Wrapper {
                state: WrapperState::Inner(inner),
                ..
            } => inner.runtime_type(),
            _ => &self.runtime_type,
        }
    }

    /// Whether this item contributes a link to the variable resolution
    /// chain.
    pub(crate) fn carries_generics(&self) -> bool {
        matches!(self.runtime_type(), BindingType::Parameterized { .. })
    }

    /// Transparent items complete as soon as one child value arrives.
    pub(crate) fn is_transparent(&self) -> bool {
        matches!(
            self.kind,
            ItemKind::Adapted { .. } | ItemKind::OptionalWrap { .. }
        )
    }

    pub(crate) fn accept_key(&mut self, ctx: &JsonbContext, key: &str) -> Result<KeyAction> {
        match &mut self.kind {
            ItemKind::Object(object) => match object.model.property_by_read_name(key) {
                Some((index, property)) => {
                    let settable = property.setter().is_some()
                        || object
                            .model
                            .customization()
                            .creator
                            .as_ref()
                            .is_some_and(|c| c.params.iter().any(|p| *p == property.name()));
                    if settable {
                        object.current = Some(index);
                        Ok(KeyAction::Bind)
                    } else {
                        // The property exists but cannot be written.
                        Ok(KeyAction::SkipValue)
                    }
                }
                None => {
                    if ctx.config().fail_on_unknown_properties() {
                        Err(JsonbError::UnsupportedMapping {
                            binding: object.model.ty().name().to_string(),
                            message: format!("unknown JSON property `{key}`"),
                        })
                    } else {
                        tracing::debug!(
                            class = object.model.ty().name(),
                            key,
                            "skipping unknown JSON property"
                        );
                        Ok(KeyAction::SkipValue)
                    }
                }
            },
            ItemKind::Map { pending_key, .. } => {
                *pending_key = Some(key.to_string());
                Ok(KeyAction::Bind)
            }
            ItemKind::Json(JsonNode::Object { pending_key, .. }) => {
                *pending_key = Some(key.to_string());
                Ok(KeyAction::Bind)
            }
            ItemKind::Wrapper { wrapper, state } => match state {
                WrapperState::ExpectKey => {
                    if key == wrapper.key {
                        *state = WrapperState::ExpectAlias;
                        Ok(KeyAction::Bind)
                    } else {
                        Err(JsonbError::UnsupportedMapping {
                            binding: self.runtime_type.to_string(),
                            message: format!(
                                "expected discriminator `{}` as the first property, found `{key}`",
                                wrapper.key
                            ),
                        })
                    }
                }
                WrapperState::ExpectAlias => Err(JsonbError::Internal(
                    "discriminator key accepted twice".to_string(),
                )),
                WrapperState::Inner(inner) => inner.accept_key(ctx, key),
            },
            _ => Err(JsonbError::Internal(
                "object key delivered to a non-object item".to_string(),
            )),
        }
    }

    /// The declared type the next child value binds to.
    pub(crate) fn child_slot(&self) -> Result<ChildSlot> {
        match &self.kind {
            ItemKind::Object(object) => {
                let index = object.current.ok_or_else(|| {
                    JsonbError::Internal("value arrived before its object key".to_string())
                })?;
                let property = &object.model.properties()[index];
                Ok(ChildSlot {
                    ty: property.declared_type().clone(),
                    customization: Some(property.customization().clone()),
                })
            }
            ItemKind::Collection { element, .. } => Ok(ChildSlot {
                ty: element.clone(),
                customization: None,
            }),
            ItemKind::Map { value, .. } => Ok(ChildSlot {
                ty: value.clone(),
                customization: None,
            }),
            ItemKind::Array { component, .. } => Ok(ChildSlot {
                ty: component.clone(),
                customization: None,
            }),
            ItemKind::Json(_) => Ok(ChildSlot {
                ty: BindingType::dynamic(),
                customization: None,
            }),
            ItemKind::Wrapper { state, .. } => match state {
                WrapperState::ExpectAlias => Ok(ChildSlot {
                    ty: BindingType::concrete::<String>(),
                    customization: None,
                }),
                WrapperState::Inner(inner) => inner.child_slot(),
                WrapperState::ExpectKey => Err(JsonbError::Internal(
                    "value arrived before the discriminator key".to_string(),
                )),
            },
            ItemKind::Adapted { .. } | ItemKind::OptionalWrap { .. } => Err(JsonbError::Internal(
                "transparent item asked for a child slot".to_string(),
            )),
        }
    }

    /// Stores one completed child value.
    pub(crate) fn accept_value(&mut self, ctx: &JsonbContext, value: Box<dyn Any>) -> Result<()> {
        match &mut self.kind {
            ItemKind::Object(object) => {
                let index = object.current.take().ok_or_else(|| {
                    JsonbError::Internal("value arrived before its object key".to_string())
                })?;
                object.values[index] = Some(value);
                Ok(())
            }
            ItemKind::Collection { values, .. } => {
                values.push(value);
                Ok(())
            }
            ItemKind::Map {
                entries,
                pending_key,
                ..
            } => {
                let key = pending_key.take().ok_or_else(|| {
                    JsonbError::Internal("map value arrived before its key".to_string())
                })?;
                entries.push((key, value));
                Ok(())
            }
            ItemKind::Array { buffer, .. } => {
                buffer.push(value).map_err(JsonbError::Internal)
            }
            ItemKind::Json(node) => {
                let value = *value.downcast::<Value>().map_err(|_| {
                    JsonbError::Internal("dynamic item received a non-JSON child".to_string())
                })?;
                node.push(value)
            }
            ItemKind::Wrapper { wrapper, state } => match state {
                WrapperState::ExpectAlias => {
                    let alias = *value.downcast::<String>().map_err(|_| {
                        JsonbError::Internal("discriminator alias is not a string".to_string())
                    })?;
                    let concrete = wrapper.binding_for(&alias).cloned().ok_or_else(|| {
                        JsonbError::UnsupportedMapping {
                            binding: self.runtime_type.to_string(),
                            message: format!("unknown type alias `{alias}`"),
                        }
                    })?;
                    let inner = Item::object(ctx, concrete)?;
                    *state = WrapperState::Inner(Box::new(inner));
                    Ok(())
                }
                WrapperState::Inner(inner) => inner.accept_value(ctx, value),
                WrapperState::ExpectKey => Err(JsonbError::Internal(
                    "value arrived before the discriminator key".to_string(),
                )),
            },
            ItemKind::Adapted { .. } | ItemKind::OptionalWrap { .. } => Err(JsonbError::Internal(
                "transparent item must complete through finish_with".to_string(),
            )),
        }
    }

    /// Handles an explicit JSON `null` at the current position.
    ///
    /// The declared slot type is resolved against `chain` first, so a `null`
    /// landing in a generic slot sees the instantiated type, the same as a
    /// non-null value would. A null property leaves the target's default in
    /// place, except that an `Option` slot is filled with its empty value. A
    /// null container element must bind to an `Option` or dynamic element
    /// type.
    pub(crate) fn accept_null(&mut self, ctx: &JsonbContext, chain: &[BindingType]) -> Result<()> {
        match &mut self.kind {
            ItemKind::Object(object) => {
                let index = object.current.take().ok_or_else(|| {
                    JsonbError::Internal("null arrived before its object key".to_string())
                })?;
                let declared = object.model.properties()[index].declared_type().clone();
                let declared = resolver::resolve_type(ctx.mapping(), chain, &declared)?;
                if let Some(empty) = empty_for(ctx, &declared)? {
                    object.values[index] = Some(empty);
                }
                Ok(())
            }
            ItemKind::Collection { element, values, .. } => {
                let element = resolver::resolve_type(ctx.mapping(), chain, element)?;
                values.push(required_null(ctx, &element)?);
                Ok(())
            }
            ItemKind::Map {
                value,
                entries,
                pending_key,
                ..
            } => {
                let key = pending_key.take().ok_or_else(|| {
                    JsonbError::Internal("map null arrived before its key".to_string())
                })?;
                let value = resolver::resolve_type(ctx.mapping(), chain, value)?;
                entries.push((key, required_null(ctx, &value)?));
                Ok(())
            }
            ItemKind::Array { component, buffer, .. } => {
                let component = resolver::resolve_type(ctx.mapping(), chain, component)?;
                buffer
                    .push(required_null(ctx, &component)?)
                    .map_err(JsonbError::Internal)
            }
            ItemKind::Json(node) => node.push(Value::Null),
            ItemKind::Wrapper { state, .. } => match state {
                WrapperState::Inner(inner) => inner.accept_null(ctx, chain),
                _ => Err(JsonbError::UnsupportedMapping {
                    binding: self.runtime_type.to_string(),
                    message: "discriminator value must be a string, not null".to_string(),
                }),
            },
            ItemKind::Adapted { .. } | ItemKind::OptionalWrap { .. } => Err(JsonbError::Internal(
                "null delivered to a transparent item".to_string(),
            )),
        }
    }

    /// Materializes the finished structure.
    pub(crate) fn finish(self, ctx: &JsonbContext) -> Result<Box<dyn Any>> {
        let binding = self.runtime_type.to_string();
        let op_error = |message: String| JsonbError::UnsupportedMapping {
            binding: binding.clone(),
            message,
        };
        match self.kind {
            ItemKind::Object(object) => finish_object(object),
            ItemKind::Collection {
                from_elements,
                values,
                ..
            } => from_elements(values).map_err(op_error),
            ItemKind::Map {
                from_entries,
                entries,
                ..
            } => from_entries(entries).map_err(op_error),
            ItemKind::Array {
                from_elements,
                buffer,
                ..
            } => buffer.finish(from_elements).map_err(op_error),
            ItemKind::Json(node) => Ok(Box::new(node.into_value())),
            ItemKind::Wrapper { state, .. } => match state {
                WrapperState::Inner(inner) => inner.finish(ctx),
                _ => Err(op_error("document ended before the discriminator".to_string())),
            },
            ItemKind::Adapted { .. } | ItemKind::OptionalWrap { .. } => Err(JsonbError::Internal(
                "transparent item must complete through finish_with".to_string(),
            )),
        }
    }

    /// Completes a transparent item with the single value built beneath it.
    pub(crate) fn finish_with(self, value: Box<dyn Any>) -> Result<Box<dyn Any>> {
        match self.kind {
            ItemKind::Adapted { adapter } => adapter
                .from_json(value)
                .map_err(|e| component_failure(&adapter.original_type(), e)),
            ItemKind::OptionalWrap { wrap } => {
                wrap(value).map_err(JsonbError::Internal)
            }
            _ => Err(JsonbError::Internal(
                "finish_with called on a structural item".to_string(),
            )),
        }
    }
}

impl JsonNode {
    fn push(&mut self, value: Value) -> Result<()> {
        match self {
            JsonNode::Object { map, pending_key } => {
                let key = pending_key.take().ok_or_else(|| {
                    JsonbError::Internal("dynamic object value arrived before its key".to_string())
                })?;
                map.insert(key, value);
                Ok(())
            }
            JsonNode::Array(values) => {
                values.push(value);
                Ok(())
            }
        }
    }

    fn into_value(self) -> Value {
        match self {
            JsonNode::Object { map, .. } => Value::Object(map),
            JsonNode::Array(values) => Value::Array(values),
        }
    }
}

fn finish_object(object: ObjectData) -> Result<Box<dyn Any>> {
    let ObjectData {
        model, mut values, ..
    } = object;
    let class = model.ty().name().to_string();
    let op_error = |message: String| JsonbError::UnsupportedMapping {
        binding: class.clone(),
        message,
    };

    let mut consumed = vec![false; model.properties().len()];
    let mut instance = if let Some(creator) = &model.customization().creator {
        let mut args = Vec::with_capacity(creator.params.len());
        for param in &creator.params {
            let (index, _) = model
                .property_by_name(param)
                .ok_or_else(|| JsonbError::Internal(format!("creator parameter `{param}` vanished")))?;
            args.push(values[index].take());
            consumed[index] = true;
        }
        (creator.create)(args).map_err(op_error)?
    } else {
        let instance = model
            .instance()
            .ok_or_else(|| op_error("no default instance and no creator".to_string()))?;
        instance()
    };

    for (index, property) in model.properties().iter().enumerate() {
        if consumed[index] {
            continue;
        }
        let Some(value) = values[index].take() else {
            continue;
        };
        let Some(setter) = property.setter() else {
            continue;
        };
        setter(instance.as_mut(), value)
            .map_err(|e| op_error(format!("property `{}`: {e}", property.name())))?;
    }
    Ok(instance)
}

/// The stored value for a null property: `Some(empty)` for `Option` and
/// dynamic slots, `None` to leave the default.
fn empty_for(ctx: &JsonbContext, declared: &BindingType) -> Result<Option<Box<dyn Any>>> {
    if declared.raw_type() == Some(option_raw()) {
        if let TypeDescriptor::Optional(optional) =
            ctx.mapping().descriptor_of(declared)?.as_ref()
        {
            return Ok(Some((optional.empty)()));
        }
    }
    if declared.is_dynamic() {
        return Ok(Some(Box::new(Value::Null)));
    }
    Ok(None)
}

/// A null container element; unlike a property there is no default to fall
/// back to.
fn required_null(ctx: &JsonbContext, element: &BindingType) -> Result<Box<dyn Any>> {
    empty_for(ctx, element)?.ok_or_else(|| JsonbError::Conversion {
        value: "null".to_string(),
        target: element.to_string(),
        message: "element type has no null representation".to_string(),
    })
}
