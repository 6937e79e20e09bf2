//! Partial JSON parsing under truncation
//!
//! Streamed tool-call arguments arrive as string fragments, so the engine
//! must repeatedly parse a prefix of a JSON document. [`parse_partial`]
//! returns the best-effort value built from the syntactically complete
//! portion: unterminated containers are closed, and an incomplete trailing
//! scalar (`tru`, `1.`, an unterminated string, a dangling key) is treated
//! as "field not yet present" rather than guessed.
//!
//! The scanner tracks string and escape state, so a `{` or `"` inside a
//! quoted string is never mistaken for structural syntax.

use serde_json::{Map, Value};

/// Outcome of parsing one value from the cursor.
enum Partial {
    /// The value ended before the input did.
    Complete(Value),
    /// Input ran out. `Some` carries a best-effort value (containers and
    /// complete trailing numbers), `None` means the fragment is unusable.
    Truncated(Option<Value>),
}

/// Parse a possibly-truncated JSON document, best effort.
///
/// Complete documents take the `serde_json` fast path. An empty or unusable
/// fragment parses to `Value::Null`.
pub fn parse_partial(input: &str) -> Value {
    if let Ok(value) = serde_json::from_str::<Value>(input) {
        return value;
    }

    let mut parser = Parser {
        bytes: input.as_bytes(),
        pos: 0,
    };
    parser.skip_ws();
    match parser.parse_value() {
        Partial::Complete(v) | Partial::Truncated(Some(v)) => v,
        Partial::Truncated(None) => Value::Null,
    }
}

struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) {
        self.pos += 1;
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            self.bump();
        }
    }

    fn parse_value(&mut self) -> Partial {
        match self.peek() {
            None => Partial::Truncated(None),
            Some(b'{') => self.parse_object(),
            Some(b'[') => self.parse_array(),
            Some(b'"') => self.parse_string(),
            Some(b't') => self.parse_literal("true", Value::Bool(true)),
            Some(b'f') => self.parse_literal("false", Value::Bool(false)),
            Some(b'n') => self.parse_literal("null", Value::Null),
            Some(b'-' | b'0'..=b'9') => self.parse_number(),
            Some(_) => Partial::Truncated(None),
        }
    }

    fn parse_object(&mut self) -> Partial {
        self.bump(); // consume '{'
        let mut map = Map::new();
        loop {
            self.skip_ws();
            match self.peek() {
                None => return Partial::Truncated(Some(Value::Object(map))),
                Some(b'}') => {
                    self.bump();
                    return Partial::Complete(Value::Object(map));
                }
                Some(b'"') => {}
                // Malformed where a key was expected; keep what we have.
                Some(_) => return Partial::Truncated(Some(Value::Object(map))),
            }

            let key = match self.parse_string() {
                Partial::Complete(Value::String(key)) => key,
                // Dangling key: the field is not yet present.
                _ => return Partial::Truncated(Some(Value::Object(map))),
            };

            self.skip_ws();
            match self.peek() {
                Some(b':') => self.bump(),
                _ => return Partial::Truncated(Some(Value::Object(map))),
            }
            self.skip_ws();
            if self.peek().is_none() {
                return Partial::Truncated(Some(Value::Object(map)));
            }

            match self.parse_value() {
                Partial::Complete(v) => {
                    map.insert(key, v);
                }
                Partial::Truncated(Some(v)) => {
                    map.insert(key, v);
                    return Partial::Truncated(Some(Value::Object(map)));
                }
                Partial::Truncated(None) => {
                    return Partial::Truncated(Some(Value::Object(map)));
                }
            }

            self.skip_ws();
            match self.peek() {
                None => return Partial::Truncated(Some(Value::Object(map))),
                Some(b',') => self.bump(),
                Some(b'}') => {
                    self.bump();
                    return Partial::Complete(Value::Object(map));
                }
                Some(_) => return Partial::Truncated(Some(Value::Object(map))),
            }
        }
    }

    fn parse_array(&mut self) -> Partial {
        self.bump(); // consume '['
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            match self.peek() {
                None => return Partial::Truncated(Some(Value::Array(items))),
                Some(b']') => {
                    self.bump();
                    return Partial::Complete(Value::Array(items));
                }
                Some(_) => {}
            }

            match self.parse_value() {
                Partial::Complete(v) => items.push(v),
                Partial::Truncated(Some(v)) => {
                    items.push(v);
                    return Partial::Truncated(Some(Value::Array(items)));
                }
                Partial::Truncated(None) => {
                    return Partial::Truncated(Some(Value::Array(items)));
                }
            }

            self.skip_ws();
            match self.peek() {
                None => return Partial::Truncated(Some(Value::Array(items))),
                Some(b',') => self.bump(),
                Some(b']') => {
                    self.bump();
                    return Partial::Complete(Value::Array(items));
                }
                Some(_) => return Partial::Truncated(Some(Value::Array(items))),
            }
        }
    }

    /// Parse a string whose opening quote is at the cursor. Unterminated
    /// strings and broken escapes yield `Truncated(None)`: a partial string
    /// value is never guessed.
    fn parse_string(&mut self) -> Partial {
        self.bump(); // consume '"'
        let mut out = String::new();
        loop {
            match self.peek() {
                None => return Partial::Truncated(None),
                Some(b'"') => {
                    self.bump();
                    return Partial::Complete(Value::String(out));
                }
                Some(b'\\') => {
                    self.bump();
                    match self.peek() {
                        None => return Partial::Truncated(None),
                        Some(b'"') => out.push('"'),
                        Some(b'\\') => out.push('\\'),
                        Some(b'/') => out.push('/'),
                        Some(b'n') => out.push('\n'),
                        Some(b't') => out.push('\t'),
                        Some(b'r') => out.push('\r'),
                        Some(b'b') => out.push('\u{0008}'),
                        Some(b'f') => out.push('\u{000C}'),
                        Some(b'u') => {
                            self.bump();
                            match self.parse_unicode_escape() {
                                Some(c) => {
                                    out.push(c);
                                    continue;
                                }
                                None => return Partial::Truncated(None),
                            }
                        }
                        Some(_) => return Partial::Truncated(None),
                    }
                    self.bump();
                }
                Some(_) => {
                    // Copy the whole UTF-8 character, not just one byte.
                    let rest = &self.bytes[self.pos..];
                    let s = match std::str::from_utf8(rest) {
                        Ok(s) => s,
                        Err(e) if e.valid_up_to() > 0 => {
                            std::str::from_utf8(&rest[..e.valid_up_to()]).unwrap_or("")
                        }
                        Err(_) => return Partial::Truncated(None),
                    };
                    match s.chars().next() {
                        Some(c) => {
                            out.push(c);
                            self.pos += c.len_utf8();
                        }
                        None => return Partial::Truncated(None),
                    }
                }
            }
        }
    }

    /// Four hex digits already past the `\u`. Surrogate pairs are resolved;
    /// anything incomplete fails the string.
    fn parse_unicode_escape(&mut self) -> Option<char> {
        let first = self.take_hex4()?;
        if (0xD800..=0xDBFF).contains(&first) {
            // High surrogate: require the low half.
            if self.peek() != Some(b'\\') {
                return None;
            }
            self.bump();
            if self.peek() != Some(b'u') {
                return None;
            }
            self.bump();
            let second = self.take_hex4()?;
            if !(0xDC00..=0xDFFF).contains(&second) {
                return None;
            }
            let combined = 0x10000 + ((first - 0xD800) << 10) + (second - 0xDC00);
            return char::from_u32(combined);
        }
        char::from_u32(first)
    }

    fn take_hex4(&mut self) -> Option<u32> {
        let mut value = 0u32;
        for _ in 0..4 {
            let b = self.peek()?;
            let digit = (b as char).to_digit(16)?;
            value = value * 16 + digit;
            self.bump();
        }
        Some(value)
    }

    fn parse_literal(&mut self, literal: &str, value: Value) -> Partial {
        let end = (self.pos + literal.len()).min(self.bytes.len());
        let slice = &self.bytes[self.pos..end];
        if slice == literal.as_bytes() {
            self.pos = end;
            return Partial::Complete(value);
        }
        if literal.as_bytes().starts_with(slice) && end == self.bytes.len() {
            // Literal cut off by the end of input: not yet present.
            self.pos = end;
            return Partial::Truncated(None);
        }
        Partial::Truncated(None)
    }

    fn parse_number(&mut self) -> Partial {
        let start = self.pos;
        while matches!(
            self.peek(),
            Some(b'-' | b'+' | b'.' | b'e' | b'E' | b'0'..=b'9')
        ) {
            self.bump();
        }
        let text = std::str::from_utf8(&self.bytes[start..self.pos]).unwrap_or("");
        match serde_json::from_str::<serde_json::Number>(text) {
            Ok(n) if self.pos == self.bytes.len() => {
                // A syntactically complete number at end of input is kept.
                Partial::Truncated(Some(Value::Number(n)))
            }
            Ok(n) => Partial::Complete(Value::Number(n)),
            // `1.`, `-`, `2e`: incomplete scalar, not yet present.
            Err(_) => Partial::Truncated(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn complete_document_fast_path() {
        assert_eq!(
            parse_partial(r#"{"name":"Ada","age":36}"#),
            json!({"name": "Ada", "age": 36})
        );
    }

    #[test]
    fn truncated_nested_object() {
        assert_eq!(
            parse_partial(r#"{"a":1,"b":{"c":2"#),
            json!({"a": 1, "b": {"c": 2}})
        );
    }

    #[test]
    fn braces_and_escaped_quotes_inside_strings_are_ignored() {
        assert_eq!(
            parse_partial(r#"{"text":"a \" and a { inside","n":1"#),
            json!({"text": "a \" and a { inside", "n": 1})
        );
    }

    #[test]
    fn unterminated_string_value_is_absent() {
        assert_eq!(parse_partial(r#"{"a":1,"b":"unfini"#), json!({"a": 1}));
    }

    #[test]
    fn incomplete_boolean_is_absent() {
        assert_eq!(parse_partial(r#"{"a":1,"ok":tru"#), json!({"a": 1}));
        assert_eq!(parse_partial(r#"{"ok":true"#), json!({"ok": true}));
    }

    #[test]
    fn incomplete_number_is_absent() {
        assert_eq!(parse_partial(r#"{"a":1,"x":2."#), json!({"a": 1}));
        assert_eq!(parse_partial(r#"{"a":1,"x":-"#), json!({"a": 1}));
        assert_eq!(parse_partial(r#"{"a":1,"x":2e"#), json!({"a": 1}));
    }

    #[test]
    fn dangling_key_is_absent() {
        assert_eq!(parse_partial(r#"{"a":1,"b"#), json!({"a": 1}));
        assert_eq!(parse_partial(r#"{"a":1,"b":"#), json!({"a": 1}));
        assert_eq!(parse_partial(r#"{"a":1,"#), json!({"a": 1}));
    }

    #[test]
    fn truncated_array() {
        assert_eq!(parse_partial(r#"{"xs":[1,2,3"#), json!({"xs": [1, 2, 3]}));
        assert_eq!(
            parse_partial(r#"[{"a":1},{"b":2"#),
            json!([{"a": 1}, {"b": 2}])
        );
    }

    #[test]
    fn trailing_complete_number_in_array_is_kept() {
        assert_eq!(parse_partial("[1,2,3"), json!([1, 2, 3]));
    }

    #[test]
    fn unicode_escapes() {
        assert_eq!(parse_partial(r#"{"s":"é"}"#), json!({"s": "é"}));
        // Truncated escape drops the field.
        assert_eq!(parse_partial(r#"{"a":1,"s":"\u00"#), json!({"a": 1}));
    }

    #[test]
    fn empty_and_garbage_inputs() {
        assert_eq!(parse_partial(""), Value::Null);
        assert_eq!(parse_partial("   "), Value::Null);
        assert_eq!(parse_partial("not json"), Value::Null);
    }

    #[test]
    fn deep_nesting_closed_best_effort() {
        assert_eq!(
            parse_partial(r#"{"a":{"b":{"c":{"d":1"#),
            json!({"a": {"b": {"c": {"d": 1}}}})
        );
    }
}
