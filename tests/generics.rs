//! Generic classes: type variables resolved through runtime wrapper chains.

use core::any::Any;

use jsonbind::core::model::{Bindable, BindingType, ClassDescriptor, TypeDescriptor};
use jsonbind::core::mapping::MappingContext;
use jsonbind::{property, Jsonb};
use serde_json::Value;

/// A generic wrapper; its raw identity is the dynamic instantiation.
#[derive(Default, Debug, PartialEq)]
struct Holder<T> {
    item: T,
    tag: String,
}

impl<T: Bindable + Default> Bindable for Holder<T> {
    fn binding() -> BindingType {
        BindingType::parameterized::<Holder<Value>>(vec![T::binding()])
    }

    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::Object(
            ClassDescriptor::new::<Holder<T>>()
                .with_type_params(vec!["T"])
                .with_instance(|| Box::new(Holder::<T>::default()) as Box<dyn Any>)
                .with_property(property!(
                    Holder<T>,
                    item: T,
                    declared = BindingType::variable::<Holder<Value>>("T")
                ))
                .with_property(property!(Holder<T>, tag: String)),
        )
    }

    fn register_dependencies(ctx: &MappingContext) {
        T::register(ctx);
        Holder::<Value>::register(ctx);
    }
}

#[test]
fn variable_property_binds_through_the_instantiation() {
    let jsonb = Jsonb::new();
    let holder: Holder<i64> = jsonb
        .from_str(r#"{"item":41,"tag":"x"}"#)
        .expect("deserialize");
    assert_eq!(
        holder,
        Holder {
            item: 41,
            tag: "x".into()
        }
    );
    assert_eq!(
        jsonb.to_string(&holder).expect("serialize"),
        r#"{"item":41,"tag":"x"}"#
    );
}

#[test]
fn variable_resolves_to_a_container_type() {
    let jsonb = Jsonb::new();
    let holder: Holder<Vec<i32>> = jsonb
        .from_str(r#"{"item":[1,2,3],"tag":"list"}"#)
        .expect("deserialize");
    assert_eq!(holder.item, vec![1, 2, 3]);
    assert_eq!(
        jsonb.to_string(&holder).expect("serialize"),
        r#"{"item":[1,2,3],"tag":"list"}"#
    );
}

#[test]
fn nested_instantiations_resolve_innermost_first() {
    let jsonb = Jsonb::new();
    let holder: Holder<Holder<i64>> = jsonb
        .from_str(r#"{"item":{"item":7,"tag":"inner"},"tag":"outer"}"#)
        .expect("deserialize");
    assert_eq!(holder.item.item, 7);
    assert_eq!(holder.item.tag, "inner");
    assert_eq!(holder.tag, "outer");
}

#[test]
fn null_in_a_variable_slot_resolves_the_instantiation() {
    let jsonb = Jsonb::new();

    // `T` is `Option<i64>` here, so the null must take the optional-empty
    // path, not the leave-the-default one.
    let holder: Holder<Option<i64>> = jsonb
        .from_str(r#"{"item":null,"tag":"opt"}"#)
        .expect("deserialize");
    assert_eq!(holder.item, None);
    assert_eq!(holder.tag, "opt");

    // A raw instantiation stores the null itself.
    let raw: Holder<Value> = jsonb
        .from_str(r#"{"item":null,"tag":"raw"}"#)
        .expect("deserialize");
    assert_eq!(raw.item, Value::Null);
}

#[test]
fn raw_instantiation_falls_back_to_dynamic_items() {
    let jsonb = Jsonb::new();
    let holder: Holder<Value> = jsonb
        .from_str(r#"{"item":{"free":["form",1]},"tag":"raw"}"#)
        .expect("deserialize");
    assert_eq!(holder.item, serde_json::json!({"free": ["form", 1]}));
}
