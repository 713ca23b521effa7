use core::fmt;

use thiserror::Error;

use crate::parser::Event;

/// Convenience alias used throughout the engine.
pub type Result<T, E = JsonbError> = core::result::Result<T, E>;

// -----------------------------------------------------------------------------
// JsonbError

/// Every failure the binding engine can surface to a caller.
///
/// Errors carry enough context to locate the problem without the caller
/// re-parsing the document: syntax errors report a byte offset, structural
/// errors report the last observed event and object key.
#[derive(Debug, Error)]
pub enum JsonbError {
    /// The input is not well-formed JSON.
    #[error("invalid JSON at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    /// Well-formed JSON arrived in a shape the current target cannot take,
    /// or the event stream ended early.
    #[error("unexpected JSON structure: {message}{diagnostics}")]
    Structure {
        message: String,
        diagnostics: LevelDiagnostics,
    },

    /// A type variable could not be resolved against any link of the
    /// runtime wrapper chain.
    #[error("cannot resolve type variable `{variable}` declared by `{declared_by}`")]
    UnresolvedVariable {
        variable: String,
        declared_by: String,
    },

    /// The target type cannot represent the incoming document (or the
    /// outgoing value), e.g. a JSON array into a plain struct.
    #[error("unsupported mapping for `{binding}`: {message}")]
    UnsupportedMapping { binding: String, message: String },

    /// A leaf value failed scalar conversion.
    #[error("cannot convert {value} into `{target}`: {message}")]
    Conversion {
        value: String,
        target: String,
        message: String,
    },

    /// A user serializer, deserializer or adapter reported a failure.
    #[error("user component bound to `{binding}` failed: {message}")]
    Component { binding: String, message: String },

    /// Two properties of one class map onto the same JSON name.
    #[error("properties `{first}` and `{second}` of `{class}` both map to JSON name `{json_name}`")]
    NamingClash {
        class: String,
        first: String,
        second: String,
        json_name: String,
    },

    /// The configuration itself is inconsistent.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// An engine invariant was broken. Seeing this is a bug in the engine
    /// or in a hand-written descriptor, never in the input document.
    #[error("internal error: {0}")]
    Internal(String),
}

// -----------------------------------------------------------------------------
// LevelDiagnostics

/// Snapshot of the parser level that was current when a structural error
/// was raised.
#[derive(Debug, Clone, Default)]
pub struct LevelDiagnostics {
    pub last_event: Option<Event>,
    pub last_key: Option<String>,
}

impl fmt::Display for LevelDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(event) = self.last_event {
            write!(f, " (last event: {event:?}")?;
            if let Some(key) = &self.last_key {
                write!(f, ", last key: `{key}`")?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}
