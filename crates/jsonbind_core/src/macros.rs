//! Declarative descriptor construction.
//!
//! [`bind_class!`](crate::bind_class) covers the common case of a plain
//! `Default`-constructible struct; [`property!`](crate::property) builds one
//! accessor-backed property and is the escape hatch when a class needs
//! renamed keys, creators, parents or other customization on top.

/// Builds a [`PropertyDescriptor`](crate::model::PropertyDescriptor) with
/// getter and setter wired to a struct field.
///
/// The three-argument form overrides the declared binding type, which is how
/// a field keeps a type-variable declaration while its accessors stay
/// concrete:
///
/// ```
/// use jsonbind_core::model::{Bindable, BindingType};
///
/// #[derive(Default)]
/// struct Holder {
///     items: Vec<i32>,
/// }
///
/// let property = jsonbind_core::property!(Holder, items: Vec<i32>);
/// assert_eq!(property.name(), "items");
/// assert_eq!(property.declared_type(), &<Vec<i32> as Bindable>::binding());
/// assert_ne!(property.declared_type(), &BindingType::dynamic());
/// ```
#[macro_export]
macro_rules! property {
    ($owner:ty, $field:ident: $field_ty:ty) => {
        $crate::property!(
            $owner,
            $field: $field_ty,
            declared = <$field_ty as $crate::model::Bindable>::binding()
        )
    };
    ($owner:ty, $field:ident: $field_ty:ty, declared = $declared:expr) => {
        $crate::model::PropertyDescriptor::new(::core::stringify!($field), $declared)
            .with_getter(|owner: &dyn ::core::any::Any| {
                owner
                    .downcast_ref::<$owner>()
                    .map(|owner| &owner.$field as &dyn ::core::any::Any)
            })
            .with_setter(
                |owner: &mut dyn ::core::any::Any,
                 value: ::std::boxed::Box<dyn ::core::any::Any>| {
                    let owner = owner.downcast_mut::<$owner>().ok_or_else(|| {
                        ::std::string::String::from(::core::concat!(
                            "instance is not `",
                            ::core::stringify!($owner),
                            "`"
                        ))
                    })?;
                    let value = value.downcast::<$field_ty>().map_err(|_| {
                        ::std::string::String::from(::core::concat!(
                            "value is not `",
                            ::core::stringify!($field_ty),
                            "`"
                        ))
                    })?;
                    owner.$field = *value;
                    ::core::result::Result::Ok(())
                },
            )
    };
}

/// Implements [`Bindable`](crate::model::Bindable) for a plain struct: every
/// listed field becomes a property, instances come from `Default`, and field
/// types are registered as dependencies.
///
/// ```
/// use jsonbind_core::mapping::MappingContext;
///
/// #[derive(Default)]
/// struct Holder {
///     items: Vec<i32>,
/// }
///
/// jsonbind_core::bind_class!(Holder { items: Vec<i32> });
///
/// let ctx = MappingContext::new();
/// ctx.register::<Holder>();
/// assert!(ctx.descriptor(core::any::TypeId::of::<Holder>()).is_some());
/// ```
#[macro_export]
macro_rules! bind_class {
    ($owner:ty { $($field:ident: $field_ty:ty),* $(,)? }) => {
        impl $crate::model::Bindable for $owner {
            fn binding() -> $crate::model::BindingType {
                $crate::model::BindingType::concrete::<$owner>()
            }

            fn descriptor() -> $crate::model::TypeDescriptor {
                $crate::model::TypeDescriptor::Object(
                    $crate::model::ClassDescriptor::new::<$owner>()
                        .with_instance(|| {
                            ::std::boxed::Box::new(
                                <$owner as ::core::default::Default>::default(),
                            ) as ::std::boxed::Box<dyn ::core::any::Any>
                        })
                        $(.with_property($crate::property!($owner, $field: $field_ty)))*
                )
            }

            fn register_dependencies(ctx: &$crate::mapping::MappingContext) {
                $(<$field_ty as $crate::model::Bindable>::register(ctx);)*
            }
        }
    };
}
