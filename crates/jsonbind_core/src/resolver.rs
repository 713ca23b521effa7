//! Generic type resolution.
//!
//! Declared property and element types may contain type variables and
//! wildcards. This module resolves them against the *chain* of enclosing
//! runtime types: the stack of generic-bearing items wrapping the value
//! currently being processed, outermost first.
//!
//! Resolution is pure: every function takes the [`MappingContext`] (for
//! formal parameter names, parent links and assignability) and the chain as
//! plain arguments, and returns a new [`BindingType`].

use crate::error::{JsonbError, Result};
use crate::mapping::MappingContext;
use crate::model::{BindingType, ConcreteType};

// -----------------------------------------------------------------------------
// Entry points

/// Resolves `ty` against `chain` until no variable or wildcard remains.
///
/// Fails with [`JsonbError::UnresolvedVariable`] when a variable survives
/// every link of the chain.
pub fn resolve_type(
    ctx: &MappingContext,
    chain: &[BindingType],
    ty: &BindingType,
) -> Result<BindingType> {
    match ty {
        BindingType::Wildcard { upper, lower } => {
            most_specific_bound(ctx, chain, upper, lower)
        }
        BindingType::Variable { name, declared_by } => {
            resolve_variable_type(ctx, chain, *name, *declared_by)
        }
        BindingType::Parameterized { raw, args } if !ty.is_resolved() => {
            let args = args
                .iter()
                .map(|arg| resolve_type(ctx, chain, arg))
                .collect::<Result<Vec<_>>>()?;
            Ok(BindingType::Parameterized { raw: *raw, args })
        }
        other => Ok(other.clone()),
    }
}

/// Lenient variant used where the original system fell back to `Object`:
/// an unresolvable variable becomes the dynamic binding and the value is
/// inferred from the document instead.
pub fn resolve_type_or_dynamic(
    ctx: &MappingContext,
    chain: &[BindingType],
    ty: &BindingType,
) -> BindingType {
    match resolve_type(ctx, chain, ty) {
        Ok(resolved) => resolved,
        Err(error) => {
            tracing::debug!(ty = %ty, %error, "falling back to dynamic binding");
            BindingType::dynamic()
        }
    }
}

/// Resolves one type variable by walking the chain innermost-first and
/// searching each link's parameterized inheritance hierarchy.
pub fn resolve_variable_type(
    ctx: &MappingContext,
    chain: &[BindingType],
    name: &'static str,
    declared_by: ConcreteType,
) -> Result<BindingType> {
    let mut name = name;
    let mut declared_by = declared_by;
    for link in chain.iter().rev() {
        match search_parameterized_type(ctx, link, name, declared_by) {
            // The link knows the variable only as another variable of an
            // outer scope; keep walking outward under the new identity.
            Some(BindingType::Variable {
                name: outer_name,
                declared_by: outer_declarer,
            }) => {
                name = outer_name;
                declared_by = outer_declarer;
            }
            Some(found) => return resolve_type(ctx, chain, &found),
            None => continue,
        }
    }
    Err(JsonbError::UnresolvedVariable {
        variable: name.to_string(),
        declared_by: declared_by.name().to_string(),
    })
}

// -----------------------------------------------------------------------------
// Inheritance search

/// Searches one runtime type and its superclass hierarchy for the
/// instantiation of a type variable.
fn search_parameterized_type(
    ctx: &MappingContext,
    link: &BindingType,
    name: &'static str,
    declared_by: ConcreteType,
) -> Option<BindingType> {
    // Parameterized subclasses passed on the way up; consulted when a
    // superclass instantiates the variable with a variable of its subclass.
    let mut subclasses: Vec<BindingType> = Vec::new();
    search(ctx, Some(link.clone()), name, declared_by, &mut subclasses)
}

fn search(
    ctx: &MappingContext,
    to_search: Option<BindingType>,
    name: &'static str,
    declared_by: ConcreteType,
    subclasses: &mut Vec<BindingType>,
) -> Option<BindingType> {
    let parameterized = find_parameterized_superclass(ctx, to_search)?;
    if let Some(found) =
        search_runtime_type_argument(ctx, &parameterized, name, declared_by, subclasses)
    {
        return Some(found);
    }
    subclasses.push(parameterized.clone());
    let parent = ctx.parent_of(&parameterized);
    search(ctx, parent, name, declared_by, subclasses)
}

/// Walks concrete parent links until a parameterized type shows up.
fn find_parameterized_superclass(
    ctx: &MappingContext,
    ty: Option<BindingType>,
) -> Option<BindingType> {
    let ty = ty?;
    match ty {
        BindingType::Parameterized { .. } => Some(ty),
        BindingType::Concrete(_) => find_parameterized_superclass(ctx, ctx.parent_of(&ty)),
        _ => None,
    }
}

/// If `parameterized` instantiates the declaring class, picks the argument
/// standing in for the variable. An argument that is itself a variable was
/// propagated up from a subclass: its instantiation is looked up in the
/// subclass stack.
fn search_runtime_type_argument(
    ctx: &MappingContext,
    parameterized: &BindingType,
    name: &'static str,
    declared_by: ConcreteType,
    subclasses: &mut Vec<BindingType>,
) -> Option<BindingType> {
    let BindingType::Parameterized { raw, args } = parameterized else {
        return None;
    };
    if raw.id() != declared_by.id() {
        return None;
    }
    let params = ctx.type_params_of(raw.id())?;
    let index = params.iter().position(|param| *param == name)?;
    let arg = args.get(index)?;
    match arg {
        BindingType::Variable {
            name: inner_name,
            declared_by: inner_declarer,
        } => match subclasses.pop() {
            // No subclass information left: surface the variable itself so
            // the caller can continue with outer chain links.
            None => Some(arg.clone()),
            Some(subclass) => search_runtime_type_argument(
                ctx,
                &subclass,
                *inner_name,
                *inner_declarer,
                subclasses,
            ),
        },
        other => Some(other.clone()),
    }
}

// -----------------------------------------------------------------------------
// Wildcards

/// Narrows a wildcard to the most specific of its resolved bounds.
///
/// Upper bounds are folded first, then lower bounds, left to right; a
/// later bound replaces the current winner only when it is a strict
/// subclass, so for unrelated bounds the first applicable one wins.
fn most_specific_bound(
    ctx: &MappingContext,
    chain: &[BindingType],
    upper: &[BindingType],
    lower: &[BindingType],
) -> Result<BindingType> {
    let mut winner: Option<BindingType> = None;
    for bound in upper.iter().chain(lower) {
        let resolved = resolve_type(ctx, chain, bound)?;
        if resolved.is_dynamic() {
            continue;
        }
        winner = Some(match winner {
            None => resolved,
            Some(current) => {
                let narrower = match (current.raw_type(), resolved.raw_type()) {
                    (Some(cur), Some(new)) => {
                        cur.id() != new.id() && ctx.is_assignable(cur.id(), new.id())
                    }
                    _ => false,
                };
                if narrower { resolved } else { current }
            }
        });
    }
    Ok(winner.unwrap_or_else(BindingType::dynamic))
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ClassDescriptor, TypeDescriptor};
    use core::any::TypeId;
    use serde_json::Value;

    // A generic container class `Carton<T>`; its raw identity is the
    // dynamic instantiation.
    #[derive(Default)]
    struct Carton<T> {
        #[allow(dead_code)]
        value: T,
    }

    fn carton_raw() -> ConcreteType {
        ConcreteType::of::<Carton<Value>>()
    }

    fn register_carton_raw(ctx: &MappingContext) {
        ctx.register_with::<Carton<Value>>(
            || BindingType::Parameterized {
                raw: carton_raw(),
                args: vec![BindingType::dynamic()],
            },
            || {
                TypeDescriptor::Object(
                    ClassDescriptor::new::<Carton<Value>>().with_type_params(vec!["T"]),
                )
            },
        );
    }

    // `IntCarton` models `struct IntCarton: Carton<i32>`.
    struct IntCarton;

    fn register_int_carton(ctx: &MappingContext) {
        register_carton_raw(ctx);
        ctx.register_with::<IntCarton>(
            || BindingType::concrete::<IntCarton>(),
            || {
                TypeDescriptor::Object(
                    ClassDescriptor::new::<IntCarton>().with_parent(BindingType::Parameterized {
                        raw: carton_raw(),
                        args: vec![BindingType::concrete::<i32>()],
                    }),
                )
            },
        );
    }

    #[test]
    fn variable_resolves_from_parameterized_chain_link() {
        let ctx = MappingContext::new();
        register_carton_raw(&ctx);

        let chain = vec![BindingType::Parameterized {
            raw: carton_raw(),
            args: vec![BindingType::concrete::<String>()],
        }];
        let var = BindingType::Variable {
            name: "T",
            declared_by: carton_raw(),
        };
        let resolved = resolve_type(&ctx, &chain, &var).expect("resolve");
        assert_eq!(resolved, BindingType::concrete::<String>());
    }

    #[test]
    fn variable_resolves_through_concrete_subclass() {
        let ctx = MappingContext::new();
        register_int_carton(&ctx);

        // The runtime item is the concrete subclass; `T` must be found in
        // its parameterized superclass declaration.
        let chain = vec![BindingType::concrete::<IntCarton>()];
        let var = BindingType::Variable {
            name: "T",
            declared_by: carton_raw(),
        };
        let resolved = resolve_type(&ctx, &chain, &var).expect("resolve");
        assert_eq!(resolved, BindingType::concrete::<i32>());
    }

    #[test]
    fn propagated_variable_is_looked_up_in_subclass_stack() {
        // `Middle<U>: Carton<U>` and `Leaf: Middle<i64>`; resolving
        // Carton's `T` against Leaf must pass through Middle's `U`.
        #[derive(Default)]
        struct Middle<U> {
            #[allow(dead_code)]
            inner: U,
        }
        struct Leaf;

        let ctx = MappingContext::new();
        register_carton_raw(&ctx);
        ctx.register_with::<Middle<Value>>(
            || BindingType::Parameterized {
                raw: ConcreteType::of::<Middle<Value>>(),
                args: vec![BindingType::dynamic()],
            },
            || {
                TypeDescriptor::Object(
                    ClassDescriptor::new::<Middle<Value>>()
                        .with_type_params(vec!["U"])
                        .with_parent(BindingType::Parameterized {
                            raw: ConcreteType::of::<Carton<Value>>(),
                            args: vec![BindingType::variable::<Middle<Value>>("U")],
                        }),
                )
            },
        );
        ctx.register_with::<Leaf>(
            || BindingType::concrete::<Leaf>(),
            || {
                TypeDescriptor::Object(ClassDescriptor::new::<Leaf>().with_parent(
                    BindingType::Parameterized {
                        raw: ConcreteType::of::<Middle<Value>>(),
                        args: vec![BindingType::concrete::<i64>()],
                    },
                ))
            },
        );

        let chain = vec![BindingType::concrete::<Leaf>()];
        let var = BindingType::Variable {
            name: "T",
            declared_by: carton_raw(),
        };
        let resolved = resolve_type(&ctx, &chain, &var).expect("resolve");
        assert_eq!(resolved, BindingType::concrete::<i64>());
    }

    #[test]
    fn unresolved_variable_is_an_error_and_dynamic_in_lenient_mode() {
        let ctx = MappingContext::new();
        register_carton_raw(&ctx);

        // A variable declared by a class that never shows up in the chain
        // cannot be resolved.
        struct Elsewhere;
        let chain = vec![BindingType::concrete::<IntCarton>()];
        register_int_carton(&ctx);
        let foreign = BindingType::variable::<Elsewhere>("X");
        let err = resolve_type(&ctx, &chain, &foreign).expect_err("must fail");
        assert!(matches!(err, JsonbError::UnresolvedVariable { .. }));
        assert!(resolve_type_or_dynamic(&ctx, &chain, &foreign).is_dynamic());

        // A raw carton target is its dynamic instantiation, whose argument
        // list resolves `T` to the dynamic binding.
        let raw_chain = vec![BindingType::Parameterized {
            raw: carton_raw(),
            args: vec![BindingType::dynamic()],
        }];
        let var = BindingType::Variable {
            name: "T",
            declared_by: carton_raw(),
        };
        let resolved = resolve_type(&ctx, &raw_chain, &var).expect("resolve");
        assert!(resolved.is_dynamic());
    }

    #[test]
    fn parameterized_arguments_resolve_recursively() {
        let ctx = MappingContext::new();
        register_carton_raw(&ctx);
        ctx.register::<Vec<serde_json::Value>>();

        let chain = vec![BindingType::Parameterized {
            raw: carton_raw(),
            args: vec![BindingType::concrete::<u8>()],
        }];
        let list_of_t = BindingType::Parameterized {
            raw: ConcreteType::of::<Vec<Value>>(),
            args: vec![BindingType::Variable {
                name: "T",
                declared_by: carton_raw(),
            }],
        };
        let resolved = resolve_type(&ctx, &chain, &list_of_t).expect("resolve");
        assert_eq!(
            resolved,
            BindingType::Parameterized {
                raw: ConcreteType::of::<Vec<Value>>(),
                args: vec![BindingType::concrete::<u8>()],
            }
        );
    }

    #[test]
    fn wildcard_narrows_to_most_specific_bound() {
        struct Base;
        struct Derived;

        let ctx = MappingContext::new();
        ctx.register_with::<Base>(
            || BindingType::concrete::<Base>(),
            || TypeDescriptor::Object(ClassDescriptor::new::<Base>()),
        );
        ctx.register_with::<Derived>(
            || BindingType::concrete::<Derived>(),
            || {
                TypeDescriptor::Object(
                    ClassDescriptor::new::<Derived>().with_parent(BindingType::concrete::<Base>()),
                )
            },
        );

        let wildcard = BindingType::Wildcard {
            upper: vec![
                BindingType::concrete::<Base>(),
                BindingType::concrete::<Derived>(),
            ],
            lower: vec![],
        };
        let resolved = resolve_type(&ctx, &[], &wildcard).expect("resolve");
        assert_eq!(resolved, BindingType::concrete::<Derived>());

        // Unrelated bounds: the first applicable bound wins.
        let unrelated = BindingType::Wildcard {
            upper: vec![
                BindingType::concrete::<String>(),
                BindingType::concrete::<i32>(),
            ],
            lower: vec![],
        };
        let resolved = resolve_type(&ctx, &[], &unrelated).expect("resolve");
        assert_eq!(resolved, BindingType::concrete::<String>());

        // No usable bound at all degrades to dynamic.
        let unbounded = BindingType::Wildcard {
            upper: vec![BindingType::dynamic()],
            lower: vec![],
        };
        assert!(resolve_type(&ctx, &[], &unbounded).expect("resolve").is_dynamic());
    }

    #[test]
    fn wildcard_lower_bounds_participate_in_narrowing() {
        struct Base;
        struct Derived;

        let ctx = MappingContext::new();
        ctx.register_with::<Base>(
            || BindingType::concrete::<Base>(),
            || TypeDescriptor::Object(ClassDescriptor::new::<Base>()),
        );
        ctx.register_with::<Derived>(
            || BindingType::concrete::<Derived>(),
            || {
                TypeDescriptor::Object(
                    ClassDescriptor::new::<Derived>().with_parent(BindingType::concrete::<Base>()),
                )
            },
        );

        // A wildcard with only a lower bound resolves to that bound, not to
        // the dynamic binding.
        let lower_only = BindingType::Wildcard {
            upper: vec![],
            lower: vec![BindingType::concrete::<i64>()],
        };
        let resolved = resolve_type(&ctx, &[], &lower_only).expect("resolve");
        assert_eq!(resolved, BindingType::concrete::<i64>());

        // A lower bound that is a strict subclass of the upper-bound winner
        // takes over.
        let mixed = BindingType::Wildcard {
            upper: vec![BindingType::concrete::<Base>()],
            lower: vec![BindingType::concrete::<Derived>()],
        };
        let resolved = resolve_type(&ctx, &[], &mixed).expect("resolve");
        assert_eq!(resolved, BindingType::concrete::<Derived>());
    }

    #[test]
    fn resolution_ignores_irrelevant_chain_links() {
        let ctx = MappingContext::new();
        register_carton_raw(&ctx);
        ctx.register::<Vec<serde_json::Value>>();

        // Outer carton of String, inner list link; the variable belongs to
        // the carton and must skip over the list link.
        let chain = vec![
            BindingType::Parameterized {
                raw: carton_raw(),
                args: vec![BindingType::concrete::<String>()],
            },
            BindingType::Parameterized {
                raw: ConcreteType::of::<Vec<Value>>(),
                args: vec![BindingType::concrete::<bool>()],
            },
        ];
        let var = BindingType::Variable {
            name: "T",
            declared_by: carton_raw(),
        };
        let resolved = resolve_type(&ctx, &chain, &var).expect("resolve");
        assert_eq!(resolved, BindingType::concrete::<String>());
    }

    #[test]
    fn type_id_sanity_for_generic_markers() {
        assert_ne!(
            TypeId::of::<Carton<Value>>(),
            TypeId::of::<Carton<String>>()
        );
    }
}
