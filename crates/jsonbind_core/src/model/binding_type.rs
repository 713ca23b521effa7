//! The closed description of "a type as seen by the binding engine".

use core::any::TypeId;
use core::fmt;
use core::hash::{Hash, Hasher};

// -----------------------------------------------------------------------------
// ConcreteType

/// A fully known Rust type: its [`TypeId`] plus a display name.
///
/// Equality and hashing only consider the id; the name exists for
/// diagnostics.
#[derive(Debug, Clone, Copy)]
pub struct ConcreteType {
    id: TypeId,
    name: &'static str,
}

impl ConcreteType {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: core::any::type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for ConcreteType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ConcreteType {}

impl Hash for ConcreteType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for ConcreteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

// -----------------------------------------------------------------------------
// BindingType

/// A binding-time type.
///
/// This is the engine's stand-in for reflective generic type information:
/// every declared property type, component bound type and runtime item type
/// is one of these four shapes. Variables and wildcards are resolved against
/// the chain of enclosing runtime types by [`crate::resolver`]; the de/ser
/// drivers only ever see [`Concrete`](BindingType::Concrete) or fully
/// resolved [`Parameterized`](BindingType::Parameterized) values.
///
/// A generic type used "raw" (no arguments known) is identified by its
/// instantiation with the dynamic JSON value type, the same way a raw Java
/// type erases its arguments to `Object`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BindingType {
    /// A plain, fully known type.
    Concrete(ConcreteType),
    /// A generic type applied to arguments, e.g. `Vec<T>` applied to `i32`.
    /// `raw` identifies the generic declaration; `args` may still contain
    /// variables or wildcards before resolution.
    Parameterized {
        raw: ConcreteType,
        args: Vec<BindingType>,
    },
    /// A type variable, e.g. the `T` declared by a generic class.
    Variable {
        name: &'static str,
        declared_by: ConcreteType,
    },
    /// A bounded unknown. Both bound lists steer resolution: upper bounds
    /// are narrowed first, then lower bounds under the same rule.
    Wildcard {
        upper: Vec<BindingType>,
        lower: Vec<BindingType>,
    },
}

impl BindingType {
    pub fn concrete<T: ?Sized + 'static>() -> Self {
        BindingType::Concrete(ConcreteType::of::<T>())
    }

    /// Builds a parameterized binding whose raw declaration is identified by
    /// the type `Raw` (by convention, the dynamic instantiation).
    pub fn parameterized<Raw: ?Sized + 'static>(args: Vec<BindingType>) -> Self {
        BindingType::Parameterized {
            raw: ConcreteType::of::<Raw>(),
            args,
        }
    }

    pub fn variable<DeclaredBy: ?Sized + 'static>(name: &'static str) -> Self {
        BindingType::Variable {
            name,
            declared_by: ConcreteType::of::<DeclaredBy>(),
        }
    }

    /// The dynamic binding: "whatever the document says", materialized as
    /// [`serde_json::Value`].
    pub fn dynamic() -> Self {
        Self::concrete::<serde_json::Value>()
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, BindingType::Concrete(c) if c.id() == TypeId::of::<serde_json::Value>())
    }

    /// The concrete identity behind this binding, if it has one.
    pub fn raw_type(&self) -> Option<ConcreteType> {
        match self {
            BindingType::Concrete(c) => Some(*c),
            BindingType::Parameterized { raw, .. } => Some(*raw),
            _ => None,
        }
    }

    pub fn type_args(&self) -> &[BindingType] {
        match self {
            BindingType::Parameterized { args, .. } => args,
            _ => &[],
        }
    }

    /// True when no variable or wildcard remains anywhere in this binding.
    pub fn is_resolved(&self) -> bool {
        match self {
            BindingType::Concrete(_) => true,
            BindingType::Parameterized { args, .. } => args.iter().all(BindingType::is_resolved),
            BindingType::Variable { .. } | BindingType::Wildcard { .. } => false,
        }
    }
}

impl fmt::Display for BindingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingType::Concrete(c) => write!(f, "{c}"),
            BindingType::Parameterized { raw, args } => {
                write!(f, "{raw}<")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(">")
            }
            BindingType::Variable { name, declared_by } => {
                write!(f, "{name}@{declared_by}")
            }
            BindingType::Wildcard { upper, .. } => {
                f.write_str("?")?;
                for (i, bound) in upper.iter().enumerate() {
                    f.write_str(if i == 0 { ": " } else { " + " })?;
                    write!(f, "{bound}")?;
                }
                Ok(())
            }
        }
    }
}

// -----------------------------------------------------------------------------
// Tests
