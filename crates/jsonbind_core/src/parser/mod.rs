//! Streaming JSON parser with level bookkeeping.
//!
//! ## Menu
//!
//! - [`Event`]: the closed set of parser events the engine dispatches on.
//! - [`JsonbParser`]: pull parser over one document. Beyond raw events it
//!   tracks one [`LevelContext`] per open structure so that callers can ask
//!   "what was the last event / object key at this depth" and can skip a
//!   whole subtree without understanding it.
//!
//! Levels live in a growable arena indexed by creation order; the parallel
//! `open` vector is the stack of currently open levels. Finished levels stay
//! in the arena (marked `parsed`) so a caller holding an index from before a
//! user component ran can still drain exactly that structure.

mod lexer;

pub(crate) use lexer::Token;

use crate::error::{JsonbError, LevelDiagnostics, Result};
use lexer::Lexer;

// -----------------------------------------------------------------------------
// Event

/// A parser event.
///
/// Payloads (key names, string values, raw number text) are kept on the
/// parser and fetched with [`JsonbParser::string_value`], so `Event` stays
/// `Copy` and cheap to match on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    StartObject,
    StartArray,
    KeyName,
    ValueString,
    ValueNumber,
    ValueTrue,
    ValueFalse,
    ValueNull,
    EndObject,
    EndArray,
}

impl Event {
    /// True for scalar value events, including `null`.
    pub fn is_value(self) -> bool {
        matches!(
            self,
            Event::ValueString
                | Event::ValueNumber
                | Event::ValueTrue
                | Event::ValueFalse
                | Event::ValueNull
        )
    }

    pub fn is_start_structure(self) -> bool {
        matches!(self, Event::StartObject | Event::StartArray)
    }

    pub fn is_end_structure(self) -> bool {
        matches!(self, Event::EndObject | Event::EndArray)
    }
}

// -----------------------------------------------------------------------------
// LevelContext

/// Bookkeeping for one nesting level of the document.
#[derive(Debug, Clone)]
pub struct LevelContext {
    parent: Option<usize>,
    last_event: Option<Event>,
    last_key: Option<String>,
    parsed: bool,
}

impl LevelContext {
    fn new(parent: Option<usize>, last_event: Option<Event>) -> Self {
        Self {
            parent,
            last_event,
            last_key: None,
            parsed: false,
        }
    }

    /// Index of the enclosing level, `None` for the document root.
    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    /// The most recent event observed while this level was current.
    pub fn last_event(&self) -> Option<Event> {
        self.last_event
    }

    /// The most recent object key observed at this level.
    pub fn last_key(&self) -> Option<&str> {
        self.last_key.as_deref()
    }

    /// True once the closing bracket of this level has been consumed.
    pub fn is_parsed(&self) -> bool {
        self.parsed
    }
}

// -----------------------------------------------------------------------------
// JsonbParser

/// Pull parser over a single JSON document.
pub struct JsonbParser<'a> {
    lexer: Lexer<'a>,
    peeked: Option<Token>,
    levels: Vec<LevelContext>,
    open: Vec<usize>,
    last_string: Option<String>,
}

impl<'a> JsonbParser<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            lexer: Lexer::new(input),
            peeked: None,
            levels: vec![LevelContext::new(None, None)],
            open: vec![0],
            last_string: None,
        }
    }

    /// Whether another event is available. Also surfaces trailing-garbage
    /// syntax errors once the top-level value is complete.
    pub fn has_next(&mut self) -> Result<bool> {
        if self.peeked.is_none() {
            self.peeked = self.lexer.next_token()?;
        }
        Ok(self.peeked.is_some())
    }

    /// Index of the current level in the arena.
    pub fn current_index(&self) -> usize {
        // The root level is never popped, so `open` is never empty.
        self.open.last().copied().unwrap_or(0)
    }

    pub fn current_level(&self) -> &LevelContext {
        &self.levels[self.current_index()]
    }

    pub fn level(&self, index: usize) -> Option<&LevelContext> {
        self.levels.get(index)
    }

    /// The last event observed at the current level.
    pub fn current_event(&self) -> Option<Event> {
        self.current_level().last_event
    }

    /// The last object key observed at the current level.
    pub fn last_key(&self) -> Option<&str> {
        self.current_level().last_key.as_deref()
    }

    /// Text of the most recent key, string value or number value.
    pub fn string_value(&self) -> Result<&str> {
        self.last_string
            .as_deref()
            .ok_or_else(|| JsonbError::Internal("no scalar text is available".to_string()))
    }

    pub fn diagnostics(&self) -> LevelDiagnostics {
        let level = self.current_level();
        LevelDiagnostics {
            last_event: level.last_event,
            last_key: level.last_key.clone(),
        }
    }

    fn structure_error(&self, message: String) -> JsonbError {
        JsonbError::Structure {
            message,
            diagnostics: self.diagnostics(),
        }
    }

    /// Advances to the next event, maintaining the level arena.
    pub fn next(&mut self) -> Result<Event> {
        let token = match self.peeked.take() {
            Some(token) => token,
            None => self
                .lexer
                .next_token()?
                .ok_or_else(|| self.structure_error("unexpected end of JSON stream".into()))?,
        };
        let event = token.event;
        let current = self.current_index();
        self.levels[current].last_event = Some(event);

        match event {
            Event::StartObject | Event::StartArray => {
                self.levels
                    .push(LevelContext::new(Some(current), Some(event)));
                self.open.push(self.levels.len() - 1);
            }
            Event::EndObject | Event::EndArray => {
                if current == 0 {
                    return Err(JsonbError::Internal(
                        "closing event at document root".to_string(),
                    ));
                }
                let level = &mut self.levels[current];
                if level.parsed {
                    return Err(JsonbError::Internal(
                        "level was already finished".to_string(),
                    ));
                }
                level.parsed = true;
                self.open.pop();
            }
            Event::KeyName => {
                self.levels[current].last_key = token.text.clone();
                self.last_string = token.text;
            }
            Event::ValueString | Event::ValueNumber => {
                self.last_string = token.text;
            }
            Event::ValueTrue | Event::ValueFalse | Event::ValueNull => {}
        }
        Ok(event)
    }

    /// Returns the current event if it already matches `required`, otherwise
    /// advances one event and insists on a match.
    pub fn move_to(&mut self, required: Event) -> Result<Event> {
        if self.current_event() == Some(required) {
            return Ok(required);
        }
        let event = self.next()?;
        if event == required {
            Ok(event)
        } else {
            Err(self.structure_error(format!("expected {required:?}, found {event:?}")))
        }
    }

    /// Like [`move_to`](Self::move_to) for any scalar value event.
    pub fn move_to_value(&mut self) -> Result<Event> {
        if self.current_event().is_some_and(Event::is_value) {
            // An already positioned value event is reported, not re-read.
            return self
                .current_event()
                .ok_or_else(|| JsonbError::Internal("value event vanished".to_string()));
        }
        let event = self.next()?;
        if event.is_value() {
            Ok(event)
        } else {
            Err(self.structure_error(format!("expected a value event, found {event:?}")))
        }
    }

    /// Like [`move_to`](Self::move_to) for `StartObject` / `StartArray`.
    pub fn move_to_start_structure(&mut self) -> Result<Event> {
        if self.current_event().is_some_and(Event::is_start_structure) {
            return self
                .current_event()
                .ok_or_else(|| JsonbError::Internal("start event vanished".to_string()));
        }
        let event = self.next()?;
        if event.is_start_structure() {
            Ok(event)
        } else {
            Err(self.structure_error(format!("expected start of a structure, found {event:?}")))
        }
    }

    /// If the last event opened a structure, consumes events until its
    /// closing bracket; a plain value needs no skipping.
    ///
    /// Must be called right after the event that produced the value to skip,
    /// before any further [`next`](Self::next) call.
    pub fn skip_json_structure(&mut self) -> Result<()> {
        let index = self.current_index();
        let level = &self.levels[index];
        let just_opened = level.parent.is_some()
            && matches!(
                level.last_event,
                Some(Event::StartObject | Event::StartArray)
            );
        if just_opened && !level.parsed {
            self.finish_level(index)
        } else {
            Ok(())
        }
    }

    /// Drains events until the level at `index` is fully parsed. Used to
    /// re-synchronize after a user deserializer consumed only part of its
    /// subtree.
    pub fn finish_level(&mut self, index: usize) -> Result<()> {
        if self.levels.get(index).is_none() {
            return Err(JsonbError::Internal(format!("unknown parser level {index}")));
        }
        while !self.levels[index].parsed {
            self.next()?;
        }
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// Tests
