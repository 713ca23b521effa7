//! The deserialization driver.
//!
//! ## Menu
//!
//! - [`deserialize`]: binds the next JSON value in a parser to a declared
//!   binding type. One flat event loop over a stack of in-flight
//!   [`item::Item`]s; nothing in the engine recurses over document depth.
//! - [`DeserializationContext`]: handed to user deserializers so they can
//!   delegate parts of their subtree back to the engine.
//!
//! The loop shape: keys are offered to the top item (which either binds
//! them or asks for the subtree to be skipped), value and start events are
//! classified by [`builder::build`] against the declared child type, and
//! end events pop and materialize the top item. Transparent wrapper items
//! (adapters, `Option` carriers) complete immediately when the value built
//! beneath them does.

mod builder;
mod item;

use core::any::Any;

use crate::context::JsonbContext;
use crate::error::{JsonbError, Result};
use crate::model::descriptor::TypeDescriptor;
use crate::model::BindingType;
use crate::parser::{Event, JsonbParser};
use crate::resolver;
use builder::Built;
use item::{Item, KeyAction};

// -----------------------------------------------------------------------------
// Entry point

/// Binds the next value in `parser` to `declared`.
pub fn deserialize(
    ctx: &JsonbContext,
    declared: &BindingType,
    parser: &mut JsonbParser<'_>,
) -> Result<Box<dyn Any>> {
    let event = root_event(parser)?;
    if event == Event::ValueNull {
        return null_root(ctx, declared);
    }

    let mut stack: Vec<Item> = Vec::new();
    match builder::build(ctx, parser, &[], declared, None, event)? {
        Built::Value(value) => return Ok(value),
        Built::Items(items) => stack.extend(items),
    }

    loop {
        let event = parser.next()?;
        match event {
            Event::KeyName => {
                let key = parser.string_value()?.to_string();
                let top = stack.last_mut().ok_or_else(no_open_item)?;
                if top.accept_key(ctx, &key)? == KeyAction::SkipValue {
                    parser.next()?;
                    parser.skip_json_structure()?;
                }
            }
            Event::ValueNull => {
                let chain = generics_chain(&stack);
                stack
                    .last_mut()
                    .ok_or_else(no_open_item)?
                    .accept_null(ctx, &chain)?;
            }
            Event::EndObject | Event::EndArray => {
                let finished = stack.pop().ok_or_else(no_open_item)?;
                let value = finished.finish(ctx)?;
                if let Some(root) = complete(ctx, &mut stack, value)? {
                    return Ok(root);
                }
            }
            event => {
                let slot = stack.last().ok_or_else(no_open_item)?.child_slot()?;
                let chain = generics_chain(&stack);
                match builder::build(
                    ctx,
                    parser,
                    &chain,
                    &slot.ty,
                    slot.customization.as_ref(),
                    event,
                )? {
                    Built::Value(value) => {
                        if let Some(root) = complete(ctx, &mut stack, value)? {
                            return Ok(root);
                        }
                    }
                    Built::Items(items) => stack.extend(items),
                }
            }
        }
    }
}

/// Yields the event the root value starts at: the parser's current event
/// when one is positioned (a user deserializer delegating mid-document),
/// otherwise the next one.
fn root_event(parser: &mut JsonbParser<'_>) -> Result<Event> {
    match parser.current_event() {
        Some(event) if event != Event::KeyName => Ok(event),
        _ => parser.next(),
    }
}

fn null_root(ctx: &JsonbContext, declared: &BindingType) -> Result<Box<dyn Any>> {
    let runtime_type = resolver::resolve_type(ctx.mapping(), &[], declared)?;
    match ctx.mapping().descriptor_of(&runtime_type)?.as_ref() {
        TypeDescriptor::Optional(optional) => Ok((optional.empty)()),
        TypeDescriptor::JsonValue => Ok(Box::new(serde_json::Value::Null)),
        _ => Err(JsonbError::UnsupportedMapping {
            binding: runtime_type.to_string(),
            message: "cannot bind null at the document root".to_string(),
        }),
    }
}

/// Routes a finished value upward: transparent items rewrap it and pop,
/// the first structural item absorbs it. `Some` means the stack drained
/// and `value` is the finished root.
fn complete(
    ctx: &JsonbContext,
    stack: &mut Vec<Item>,
    mut value: Box<dyn Any>,
) -> Result<Option<Box<dyn Any>>> {
    loop {
        match stack.last_mut() {
            None => return Ok(Some(value)),
            Some(top) if top.is_transparent() => {
                let top = stack.pop().ok_or_else(no_open_item)?;
                value = top.finish_with(value)?;
            }
            Some(top) => {
                top.accept_value(ctx, value)?;
                return Ok(None);
            }
        }
    }
}

/// The variable resolution chain: runtime types of every open structural
/// item that still carries type arguments, outermost first. Transparent
/// items stand for the value being built, not for an enclosing scope, so
/// they contribute no link.
fn generics_chain(stack: &[Item]) -> Vec<BindingType> {
    stack
        .iter()
        .filter(|item| !item.is_transparent() && item.carries_generics())
        .map(|item| item.runtime_type().clone())
        .collect()
}

fn no_open_item() -> JsonbError {
    JsonbError::Internal("event arrived with no open item".to_string())
}

// -----------------------------------------------------------------------------
// DeserializationContext

/// Engine access for user deserializers.
pub struct DeserializationContext<'a> {
    ctx: &'a JsonbContext,
}

impl<'a> DeserializationContext<'a> {
    pub(crate) fn new(ctx: &'a JsonbContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &JsonbContext {
        self.ctx
    }

    /// Delegates the value at the parser's position back to the engine.
    pub fn deserialize(
        &mut self,
        ty: &BindingType,
        parser: &mut JsonbParser<'_>,
    ) -> Result<Box<dyn Any>> {
        deserialize(self.ctx, ty, parser)
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
    use serde_json::Value;
    use std::collections::BTreeMap;

    fn read_with<T: Bindable>(ctx: &JsonbContext, json: &str) -> Result<T> {
        ctx.mapping().register::<T>();
        let mut parser = JsonbParser::new(json);
        let value = deserialize(ctx, &T::binding(), &mut parser)?;
        value
            .downcast::<T>()
            .map(|boxed| *boxed)
            .map_err(|_| JsonbError::Internal("result type mismatch".to_string()))
    }

    fn read<T: Bindable>(json: &str) -> T {
        read_with(&JsonbContext::default(), json).expect("deserialize")
    }

    #[test]
    fn scalar_roots() {
        assert_eq!(read::<i64>("42"), 42);
        assert_eq!(read::<String>(r#""hi""#), "hi");
        assert!(read::<bool>("true"));
    }

    #[derive(Default, Debug, PartialEq)]
    struct Inner {
        label: String,
    }
    bind_class!(Inner { label: String });

    #[derive(Default, Debug, PartialEq)]
    struct Outer {
        id: i64,
        inner: Inner,
        items: Vec<i32>,
    }
    bind_class!(Outer { id: i64, inner: Inner, items: Vec<i32> });

    #[test]
    fn nested_object_and_collection() {
        let outer: Outer =
            read(r#"{"id":7,"inner":{"label":"x"},"items":[1,2,3]}"#);
        assert_eq!(
            outer,
            Outer {
                id: 7,
                inner: Inner { label: "x".into() },
                items: vec![1, 2, 3],
            }
        );
    }

    #[test]
    fn empty_containers() {
        let outer: Outer = read(r#"{"items":[],"inner":{}}"#);
        assert_eq!(outer, Outer::default());
    }

    #[derive(Default, Debug, PartialEq)]
    struct WithOption {
        note: Option<String>,
        count: i32,
    }
    bind_class!(WithOption { note: Option<String>, count: i32 });

    #[test]
    fn option_property_states() {
        let absent: WithOption = read(r#"{"count":1}"#);
        assert_eq!(absent.note, None);

        let null: WithOption = read(r#"{"note":null,"count":1}"#);
        assert_eq!(null.note, None);

        let present: WithOption = read(r#"{"note":"n","count":1}"#);
        assert_eq!(present.note.as_deref(), Some("n"));
    }

    #[test]
    fn null_property_keeps_default_for_plain_types() {
        let outer: Outer = read(r#"{"id":null,"items":[4]}"#);
        assert_eq!(outer.id, 0);
        assert_eq!(outer.items, vec![4]);
    }

    #[test]
    fn null_collection_element_needs_an_optional_slot() {
        let ctx = JsonbContext::default();
        let err = read_with::<Vec<i64>>(&ctx, "[1,null]").expect_err("must fail");
        assert!(matches!(err, JsonbError::Conversion { .. }));

        let values: Vec<Option<i64>> = read("[1,null,3]");
        assert_eq!(values, vec![Some(1), None, Some(3)]);
    }

    #[test]
    fn unknown_properties_are_skipped_with_their_subtree() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let outer: Outer = read(r#"{"ghost":{"deep":[{"a":1},2]},"id":5}"#);
        assert_eq!(outer.id, 5);
    }

    #[test]
    fn unknown_properties_can_be_fatal() {
        let ctx = JsonbContext::new(JsonbConfig::new().with_fail_on_unknown_properties(true));
        let err = read_with::<Outer>(&ctx, r#"{"ghost":1}"#).expect_err("must fail");
        assert!(matches!(err, JsonbError::UnsupportedMapping { .. }));
    }

    #[test]
    fn dynamic_values_bind_any_shape() {
        let value: Value = read(r#"{"a":[1,"two",null,{"b":false}]}"#);
        assert_eq!(
            value,
            serde_json::json!({"a": [1, "two", null, {"b": false}]})
        );
        let null: Value = read("null");
        assert_eq!(null, Value::Null);
    }

    #[test]
    fn string_keyed_maps() {
        let map: BTreeMap<String, i64> = read(r#"{"a":1,"b":2}"#);
        assert_eq!(map.get("a"), Some(&1));
        assert_eq!(map.get("b"), Some(&2));
    }

    #[test]
    fn primitive_array_buffers() {
        let bytes: Box<[u8]> = read("[1,2,255]");
        assert_eq!(bytes.as_ref(), &[1, 2, 255]);
        let floats: Box<[f64]> = read("[1.5,2.5]");
        assert_eq!(floats.as_ref(), &[1.5, 2.5]);
    }

    #[test]
    fn optional_root_and_null_root() {
        let some: Option<i64> = read("12");
        assert_eq!(some, Some(12));
        let none: Option<i64> = read("null");
        assert_eq!(none, None);

        let ctx = JsonbContext::default();
        let err = read_with::<i64>(&ctx, "null").expect_err("must fail");
        assert!(matches!(err, JsonbError::UnsupportedMapping { .. }));
    }

    #[test]
    fn transparent_items_add_no_resolution_chain_link() {
        use crate::components::JsonbAdapter;
        use std::sync::Arc;

        struct BitsAdapter;
        impl JsonbAdapter for BitsAdapter {
            fn original_type(&self) -> BindingType {
                <Vec<bool> as Bindable>::binding()
            }
            fn adapted_type(&self) -> BindingType {
                <Vec<i64> as Bindable>::binding()
            }
            fn to_json(&self, _original: &dyn Any) -> Result<Box<dyn Any>> {
                Err(JsonbError::Internal("write side unused".to_string()))
            }
            fn from_json(&self, adapted: Box<dyn Any>) -> Result<Box<dyn Any>> {
                Ok(adapted)
            }
        }

        // The adapter's original type is parameterized, but the item stands
        // for the value under construction, not for an enclosing scope.
        let item = Item::adapted(<Vec<bool> as Bindable>::binding(), Arc::new(BitsAdapter));
        assert!(item.carries_generics());
        assert!(generics_chain(core::slice::from_ref(&item)).is_empty());
    }

    #[test]
    fn wrong_shape_is_reported_against_the_binding() {
        let ctx = JsonbContext::default();
        let err = read_with::<Vec<i64>>(&ctx, r#"{"a":1}"#).expect_err("must fail");
        match err {
            JsonbError::UnsupportedMapping { message, .. } => {
                assert!(message.contains("StartObject"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
