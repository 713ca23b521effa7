//! JSON text generation.
//!
//! A small push generator: the serializer drives it with start/key/value/end
//! calls and collects the final `String`. The generator validates structure
//! (keys only inside objects, one root value) so driver bugs surface as
//! errors instead of malformed output. Supports compact and two-space
//! pretty output.

use crate::error::{JsonbError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    Object { has_entries: bool, key_pending: bool },
    Array { has_entries: bool },
}

// -----------------------------------------------------------------------------
// JsonGenerator

pub struct JsonGenerator {
    out: String,
    frames: Vec<Frame>,
    pretty: bool,
    root_written: bool,
}

impl JsonGenerator {
    pub fn new(pretty: bool) -> Self {
        Self {
            out: String::new(),
            frames: Vec::new(),
            pretty,
            root_written: false,
        }
    }

    pub fn write_start_object(&mut self) -> Result<()> {
        self.before_value()?;
        self.out.push('{');
        self.frames.push(Frame::Object {
            has_entries: false,
            key_pending: false,
        });
        Ok(())
    }

    pub fn write_start_array(&mut self) -> Result<()> {
        self.before_value()?;
        self.out.push('[');
        self.frames.push(Frame::Array { has_entries: false });
        Ok(())
    }

    pub fn write_key(&mut self, key: &str) -> Result<()> {
        match self.frames.last_mut() {
            Some(Frame::Object {
                has_entries,
                key_pending: key_pending @ false,
            }) => {
                let first = !*has_entries;
                *has_entries = true;
                *key_pending = true;
                if !first {
                    self.out.push(',');
                }
                self.newline_indent();
                write_escaped(&mut self.out, key);
                self.out.push(':');
                if self.pretty {
                    self.out.push(' ');
                }
                Ok(())
            }
            _ => Err(state_error("key written outside an object entry position")),
        }
    }

    pub fn write_string(&mut self, value: &str) -> Result<()> {
        self.before_value()?;
        write_escaped(&mut self.out, value);
        Ok(())
    }

    /// Writes pre-validated number text verbatim.
    pub fn write_number_raw(&mut self, raw: &str) -> Result<()> {
        self.before_value()?;
        self.out.push_str(raw);
        Ok(())
    }

    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        self.before_value()?;
        self.out.push_str(if value { "true" } else { "false" });
        Ok(())
    }

    pub fn write_null(&mut self) -> Result<()> {
        self.before_value()?;
        self.out.push_str("null");
        Ok(())
    }

    /// Closes the innermost open object or array.
    pub fn write_end(&mut self) -> Result<()> {
        match self.frames.pop() {
            Some(Frame::Object {
                has_entries,
                key_pending: false,
            }) => {
                if has_entries {
                    self.newline_indent();
                }
                self.out.push('}');
                Ok(())
            }
            Some(Frame::Array { has_entries }) => {
                if has_entries {
                    self.newline_indent();
                }
                self.out.push(']');
                Ok(())
            }
            Some(frame @ Frame::Object { .. }) => {
                self.frames.push(frame);
                Err(state_error("object closed with a dangling key"))
            }
            None => Err(state_error("no open object or array to close")),
        }
    }

    /// Finishes generation, returning the document text.
    pub fn finish(self) -> String {
        self.out
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    fn before_value(&mut self) -> Result<()> {
        match self.frames.last_mut() {
            Some(Frame::Object { key_pending, .. }) => {
                if !*key_pending {
                    return Err(state_error("value written without a key"));
                }
                *key_pending = false;
                Ok(())
            }
            Some(Frame::Array { has_entries }) => {
                let first = !*has_entries;
                *has_entries = true;
                if !first {
                    self.out.push(',');
                }
                self.newline_indent();
                Ok(())
            }
            None => {
                if self.root_written {
                    return Err(state_error("second root value"));
                }
                self.root_written = true;
                Ok(())
            }
        }
    }

    fn newline_indent(&mut self) {
        if !self.pretty {
            return;
        }
        self.out.push('\n');
        for _ in 0..self.frames.len() {
            self.out.push_str("  ");
        }
    }
}

fn state_error(message: &str) -> JsonbError {
    JsonbError::Internal(format!("generator state: {message}"))
}

// Matches serde_json's escaping: the two mandatory escapes, short forms for
// the common control characters, `\u00XX` for the rest.
fn write_escaped(out: &mut String, value: &str) {
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compact_object_layout() {
        let mut g = JsonGenerator::new(false);
        g.write_start_object().unwrap();
        g.write_key("name").unwrap();
        g.write_string("a").unwrap();
        g.write_key("values").unwrap();
        g.write_start_array().unwrap();
        g.write_number_raw("1").unwrap();
        g.write_number_raw("2").unwrap();
        g.write_end().unwrap();
        g.write_end().unwrap();
        assert_eq!(g.finish(), r#"{"name":"a","values":[1,2]}"#);
    }

    #[test]
    fn pretty_layout_indents_two_spaces() {
        let mut g = JsonGenerator::new(true);
        g.write_start_object().unwrap();
        g.write_key("items").unwrap();
        g.write_start_array().unwrap();
        g.write_number_raw("1").unwrap();
        g.write_end().unwrap();
        g.write_end().unwrap();
        assert_eq!(g.finish(), "{\n  \"items\": [\n    1\n  ]\n}");
    }

    #[test]
    fn empty_containers_stay_on_one_line() {
        let mut g = JsonGenerator::new(true);
        g.write_start_object().unwrap();
        g.write_key("empty").unwrap();
        g.write_start_array().unwrap();
        g.write_end().unwrap();
        g.write_end().unwrap();
        assert_eq!(g.finish(), "{\n  \"empty\": []\n}");
    }

    #[test]
    fn strings_are_escaped() {
        let mut g = JsonGenerator::new(false);
        g.write_string("a\"b\\c\n\u{1}").unwrap();
        assert_eq!(g.finish(), "\"a\\\"b\\\\c\\n\\u0001\"");
    }

    #[test]
    fn structural_misuse_is_rejected() {
        let mut g = JsonGenerator::new(false);
        assert!(g.write_key("k").is_err());
        g.write_start_object().unwrap();
        assert!(g.write_string("value without key").is_err());
        g.write_key("k").unwrap();
        assert!(g.write_end().is_err());
        g.write_string("v").unwrap();
        g.write_end().unwrap();
        assert!(g.write_end().is_err());
    }

    #[test]
    fn only_one_root_value() {
        let mut g = JsonGenerator::new(false);
        g.write_bool(true).unwrap();
        assert!(g.write_null().is_err());
    }
}
