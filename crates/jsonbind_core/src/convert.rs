//! Scalar conversion between JSON lexemes and Rust leaf values.
//!
//! Numbers travel as raw JSON text on both sides, so integer widths keep
//! full precision instead of bouncing through `f64`. Readers are lenient the
//! way data-binding usually is: a number may arrive quoted, a bool as the
//! literal text `"true"`. Writers are strict and reject values JSON cannot
//! represent (non-finite floats).

use core::any::{Any, TypeId};
use std::collections::HashMap;

use once_cell::sync::Lazy;

// -----------------------------------------------------------------------------
// Lexeme-side values

/// A scalar lexeme as read from the document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScalarValue<'a> {
    Str(&'a str),
    /// Raw number text, exactly as it appeared.
    Number(&'a str),
    Bool(bool),
}

impl ScalarValue<'_> {
    /// The textual payload, for converters that parse from text.
    fn text(&self) -> Option<&str> {
        match self {
            ScalarValue::Str(s) | ScalarValue::Number(s) => Some(s),
            ScalarValue::Bool(_) => None,
        }
    }
}

/// A scalar lexeme to be written to the document.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarToken {
    Str(String),
    /// Raw number text, written without quotes.
    Number(String),
    Bool(bool),
}

// -----------------------------------------------------------------------------
// Converter

/// One entry of the scalar table: lexeme -> boxed value and back.
#[derive(Clone, Copy)]
pub struct Converter {
    pub read: fn(&ScalarValue<'_>) -> Result<Box<dyn Any>, String>,
    pub write: fn(&dyn Any) -> Result<ScalarToken, String>,
}

fn downcast<T: 'static>(value: &dyn Any) -> Result<&T, String> {
    value
        .downcast_ref::<T>()
        .ok_or_else(|| format!("value is not `{}`", core::any::type_name::<T>()))
}

fn read_integer<T>(value: &ScalarValue<'_>) -> Result<Box<dyn Any>, String>
where
    T: core::str::FromStr + 'static,
    T::Err: core::fmt::Display,
{
    let text = value
        .text()
        .ok_or_else(|| format!("expected a number, got {value:?}"))?;
    let parsed: T = text
        .trim()
        .parse()
        .map_err(|e| format!("invalid {}: {e}", core::any::type_name::<T>()))?;
    Ok(Box::new(parsed))
}

fn write_integer<T: core::fmt::Display + 'static>(value: &dyn Any) -> Result<ScalarToken, String> {
    Ok(ScalarToken::Number(downcast::<T>(value)?.to_string()))
}

macro_rules! float_converter {
    ($ty:ty) => {
        Converter {
            read: read_integer::<$ty>,
            write: |value| {
                let float = *downcast::<$ty>(value)?;
                if !float.is_finite() {
                    return Err(format!("{float} has no JSON number representation"));
                }
                // Display gives a shortest round-trippable form for finite
                // floats; integral values print without a fraction.
                Ok(ScalarToken::Number(float.to_string()))
            },
        }
    };
}

fn bool_converter() -> Converter {
    Converter {
        read: |value| match value {
            ScalarValue::Bool(b) => Ok(Box::new(*b)),
            ScalarValue::Str("true") => Ok(Box::new(true)),
            ScalarValue::Str("false") => Ok(Box::new(false)),
            other => Err(format!("expected a boolean, got {other:?}")),
        },
        write: |value| Ok(ScalarToken::Bool(*downcast::<bool>(value)?)),
    }
}

fn char_converter() -> Converter {
    Converter {
        read: |value| {
            let text = match value {
                ScalarValue::Str(s) => *s,
                other => return Err(format!("expected a one-character string, got {other:?}")),
            };
            let mut chars = text.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(Box::new(c)),
                _ => Err(format!("expected a one-character string, got {text:?}")),
            }
        },
        write: |value| Ok(ScalarToken::Str(downcast::<char>(value)?.to_string())),
    }
}

fn string_converter() -> Converter {
    Converter {
        read: |value| match value {
            // Quoted or bare text both bind; booleans do not.
            ScalarValue::Str(s) | ScalarValue::Number(s) => {
                Ok(Box::new((*s).to_string()) as Box<dyn Any>)
            }
            other => Err(format!("expected a string, got {other:?}")),
        },
        write: |value| Ok(ScalarToken::Str(downcast::<String>(value)?.clone())),
    }
}

// -----------------------------------------------------------------------------
// ConverterRegistry

/// The scalar conversion table, keyed by `TypeId`.
pub struct ConverterRegistry {
    converters: HashMap<TypeId, Converter>,
}

impl ConverterRegistry {
    pub fn with_defaults() -> Self {
        let mut converters = HashMap::new();
        converters.insert(TypeId::of::<bool>(), bool_converter());
        converters.insert(TypeId::of::<char>(), char_converter());
        converters.insert(TypeId::of::<String>(), string_converter());

        macro_rules! integers {
            ($($ty:ty),*) => {$(
                converters.insert(
                    TypeId::of::<$ty>(),
                    Converter { read: read_integer::<$ty>, write: write_integer::<$ty> },
                );
            )*};
        }
        integers!(u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize);

        converters.insert(TypeId::of::<f32>(), float_converter!(f32));
        converters.insert(TypeId::of::<f64>(), float_converter!(f64));

        Self { converters }
    }

    pub fn get(&self, id: TypeId) -> Option<&Converter> {
        self.converters.get(&id)
    }
}

/// The process-wide default table. Scalar descriptors all resolve through
/// this instance.
pub fn default_converters() -> &'static ConverterRegistry {
    static DEFAULTS: Lazy<ConverterRegistry> = Lazy::new(ConverterRegistry::with_defaults);
    &DEFAULTS
}

// -----------------------------------------------------------------------------
// Tests
