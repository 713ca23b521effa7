//! [`Bindable`] implementations for scalars, std containers and the dynamic
//! JSON value type.
//!
//! The raw identity of each generic container is its instantiation with
//! [`serde_json::Value`]: `Vec<Value>` stands for "a list of whatever", the
//! way a raw Java `List` erases to `List<Object>`.

use core::any::{Any, type_name};
use std::collections::{BTreeMap, HashMap};

use serde_json::Value;

use crate::mapping::MappingContext;
use crate::model::binding_type::{BindingType, ConcreteType};
use crate::model::descriptor::{
    ArrayDescriptor, Bindable, CollectionDescriptor, MapDescriptor, OptionalDescriptor,
    PrimitiveKind, TypeDescriptor,
};

// -----------------------------------------------------------------------------
// Raw markers

/// Raw (argument-free) identity of the list container.
pub fn list_raw() -> ConcreteType {
    ConcreteType::of::<Vec<Value>>()
}

/// Raw identity of the string-keyed hash map container.
pub fn map_raw() -> ConcreteType {
    ConcreteType::of::<HashMap<String, Value>>()
}

/// Raw identity of the string-keyed ordered map container.
pub fn sorted_map_raw() -> ConcreteType {
    ConcreteType::of::<BTreeMap<String, Value>>()
}

/// Raw identity of the fixed-size array container.
pub fn array_raw() -> ConcreteType {
    ConcreteType::of::<Box<[Value]>>()
}

/// Raw identity of the optional carrier.
pub fn option_raw() -> ConcreteType {
    ConcreteType::of::<Option<Value>>()
}

// -----------------------------------------------------------------------------
// Scalars

macro_rules! impl_scalar_bindable {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Bindable for $ty {
                fn binding() -> BindingType {
                    BindingType::concrete::<$ty>()
                }

                fn descriptor() -> TypeDescriptor {
                    TypeDescriptor::Scalar(ConcreteType::of::<$ty>())
                }
            }
        )*
    };
}

impl_scalar_bindable!(
    bool, char, u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64, String,
);

// -----------------------------------------------------------------------------
// Dynamic JSON value

impl Bindable for Value {
    fn binding() -> BindingType {
        BindingType::dynamic()
    }

    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::JsonValue
    }
}

// -----------------------------------------------------------------------------
// Erased helpers
//
// Generic functions with the exact erased signatures; taking `helper::<T>`
// as a value coerces it to the plain `fn` pointer stored in descriptors.

fn downcast_element<T: Bindable>(element: Box<dyn Any>) -> Result<T, String> {
    element
        .downcast::<T>()
        .map(|boxed| *boxed)
        .map_err(|_| format!("element is not `{}`", type_name::<T>()))
}

fn vec_from_elements<T: Bindable>(elements: Vec<Box<dyn Any>>) -> Result<Box<dyn Any>, String> {
    let mut out = Vec::with_capacity(elements.len());
    for element in elements {
        out.push(downcast_element::<T>(element)?);
    }
    Ok(Box::new(out))
}

fn vec_iter<'a, T: Bindable>(
    value: &'a dyn Any,
) -> Result<Box<dyn Iterator<Item = &'a dyn Any> + 'a>, String> {
    let vec = value
        .downcast_ref::<Vec<T>>()
        .ok_or_else(|| format!("value is not `{}`", type_name::<Vec<T>>()))?;
    Ok(Box::new(vec.iter().map(|element| element as &dyn Any)))
}

fn boxed_slice_from_elements<T: Bindable>(
    elements: Vec<Box<dyn Any>>,
) -> Result<Box<dyn Any>, String> {
    let mut out = Vec::with_capacity(elements.len());
    for element in elements {
        out.push(downcast_element::<T>(element)?);
    }
    Ok(Box::new(out.into_boxed_slice()))
}

fn boxed_slice_iter<'a, T: Bindable>(
    value: &'a dyn Any,
) -> Result<Box<dyn Iterator<Item = &'a dyn Any> + 'a>, String> {
    let slice = value
        .downcast_ref::<Box<[T]>>()
        .ok_or_else(|| format!("value is not `{}`", type_name::<Box<[T]>>()))?;
    Ok(Box::new(slice.iter().map(|element| element as &dyn Any)))
}

fn hash_map_from_entries<V: Bindable>(
    entries: Vec<(String, Box<dyn Any>)>,
) -> Result<Box<dyn Any>, String> {
    let mut out = HashMap::with_capacity(entries.len());
    for (key, value) in entries {
        out.insert(key, downcast_element::<V>(value)?);
    }
    Ok(Box::new(out))
}

fn hash_map_entries<'a, V: Bindable>(
    value: &'a dyn Any,
) -> Result<Box<dyn Iterator<Item = (&'a str, &'a dyn Any)> + 'a>, String> {
    let map = value
        .downcast_ref::<HashMap<String, V>>()
        .ok_or_else(|| format!("value is not `{}`", type_name::<HashMap<String, V>>()))?;
    Ok(Box::new(
        map.iter().map(|(k, v)| (k.as_str(), v as &dyn Any)),
    ))
}

fn btree_map_from_entries<V: Bindable>(
    entries: Vec<(String, Box<dyn Any>)>,
) -> Result<Box<dyn Any>, String> {
    let mut out = BTreeMap::new();
    for (key, value) in entries {
        out.insert(key, downcast_element::<V>(value)?);
    }
    Ok(Box::new(out))
}

fn btree_map_entries<'a, V: Bindable>(
    value: &'a dyn Any,
) -> Result<Box<dyn Iterator<Item = (&'a str, &'a dyn Any)> + 'a>, String> {
    let map = value
        .downcast_ref::<BTreeMap<String, V>>()
        .ok_or_else(|| format!("value is not `{}`", type_name::<BTreeMap<String, V>>()))?;
    Ok(Box::new(
        map.iter().map(|(k, v)| (k.as_str(), v as &dyn Any)),
    ))
}

fn option_wrap<T: Bindable>(value: Box<dyn Any>) -> Result<Box<dyn Any>, String> {
    Ok(Box::new(Some(downcast_element::<T>(value)?)))
}

fn option_empty<T: Bindable>() -> Box<dyn Any> {
    Box::new(None::<T>)
}

fn option_project<'a, T: Bindable>(value: &'a dyn Any) -> Result<Option<&'a dyn Any>, String> {
    let option = value
        .downcast_ref::<Option<T>>()
        .ok_or_else(|| format!("value is not `{}`", type_name::<Option<T>>()))?;
    Ok(option.as_ref().map(|inner| inner as &dyn Any))
}

// -----------------------------------------------------------------------------
// Containers

impl<T: Bindable> Bindable for Vec<T> {
    fn binding() -> BindingType {
        BindingType::Parameterized {
            raw: list_raw(),
            args: vec![T::binding()],
        }
    }

    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::Collection(CollectionDescriptor {
            element: T::binding(),
            from_elements: vec_from_elements::<T>,
            iter: vec_iter::<T>,
        })
    }

    fn register_dependencies(ctx: &MappingContext) {
        T::register(ctx);
    }
}

impl<T: Bindable> Bindable for Box<[T]> {
    fn binding() -> BindingType {
        BindingType::Parameterized {
            raw: array_raw(),
            args: vec![T::binding()],
        }
    }

    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::Array(ArrayDescriptor {
            component: T::binding(),
            primitive: PrimitiveKind::of(core::any::TypeId::of::<T>()),
            from_elements: boxed_slice_from_elements::<T>,
            iter: boxed_slice_iter::<T>,
        })
    }

    fn register_dependencies(ctx: &MappingContext) {
        T::register(ctx);
    }
}

impl<V: Bindable> Bindable for HashMap<String, V> {
    fn binding() -> BindingType {
        BindingType::Parameterized {
            raw: map_raw(),
            args: vec![V::binding()],
        }
    }

    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::Map(MapDescriptor {
            value: V::binding(),
            from_entries: hash_map_from_entries::<V>,
            entries: hash_map_entries::<V>,
        })
    }

    fn register_dependencies(ctx: &MappingContext) {
        V::register(ctx);
    }
}

impl<V: Bindable> Bindable for BTreeMap<String, V> {
    fn binding() -> BindingType {
        BindingType::Parameterized {
            raw: sorted_map_raw(),
            args: vec![V::binding()],
        }
    }

    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::Map(MapDescriptor {
            value: V::binding(),
            from_entries: btree_map_from_entries::<V>,
            entries: btree_map_entries::<V>,
        })
    }

    fn register_dependencies(ctx: &MappingContext) {
        V::register(ctx);
    }
}

impl<T: Bindable> Bindable for Option<T> {
    fn binding() -> BindingType {
        BindingType::Parameterized {
            raw: option_raw(),
            args: vec![T::binding()],
        }
    }

    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::Optional(OptionalDescriptor {
            inner: T::binding(),
            wrap: option_wrap::<T>,
            empty: option_empty::<T>,
            project: option_project::<T>,
        })
    }

    fn register_dependencies(ctx: &MappingContext) {
        T::register(ctx);
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vec_round_trips_through_erased_ops() {
        let elements: Vec<Box<dyn Any>> = vec![Box::new(1i32), Box::new(2i32)];
        let built = vec_from_elements::<i32>(elements).expect("build");
        let vec = built.downcast_ref::<Vec<i32>>().expect("downcast");
        assert_eq!(vec, &vec![1, 2]);

        let borrowed: Vec<i32> = vec_iter::<i32>(built.as_ref())
            .expect("iter")
            .map(|e| *e.downcast_ref::<i32>().expect("element"))
            .collect();
        assert_eq!(borrowed, vec![1, 2]);
    }

    #[test]
    fn element_type_mismatch_is_reported() {
        let elements: Vec<Box<dyn Any>> = vec![Box::new("nope".to_string())];
        let err = vec_from_elements::<i32>(elements).expect_err("must fail");
        assert!(err.contains("i32"));
    }

    #[test]
    fn option_ops() {
        let wrapped = option_wrap::<String>(Box::new("x".to_string())).expect("wrap");
        let projected = option_project::<String>(wrapped.as_ref()).expect("project");
        assert_eq!(
            projected.and_then(|v| v.downcast_ref::<String>()).map(String::as_str),
            Some("x")
        );

        let empty = option_empty::<String>();
        assert!(
            option_project::<String>(empty.as_ref())
                .expect("project")
                .is_none()
        );
    }

    #[test]
    fn container_bindings_share_raw_identity() {
        let a = <Vec<i32> as Bindable>::binding();
        let b = <Vec<String> as Bindable>::binding();
        assert_eq!(a.raw_type(), b.raw_type());
        assert_ne!(a, b);
    }

    #[test]
    fn primitive_arrays_are_detected() {
        match <Box<[i64]> as Bindable>::descriptor() {
            TypeDescriptor::Array(array) => assert_eq!(array.primitive, Some(PrimitiveKind::I64)),
            _ => panic!("expected an array descriptor"),
        }
        match <Box<[String]> as Bindable>::descriptor() {
            TypeDescriptor::Array(array) => assert_eq!(array.primitive, None),
            _ => panic!("expected an array descriptor"),
        }
    }
}
