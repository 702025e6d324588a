//! Preference blob codec
//!
//! Preferences that hold structured data are stored as a single string in
//! the web runtime's native serialization format, e.g.
//! `a:1:{s:5:"INBOX";a:1:{s:1:"b";i:2;}}`. Only primitive values and arrays
//! are materialized; anything that would reconstruct an object, a custom
//! serialized payload, an enum case or a reference is refused.

use std::borrow::Cow;
use std::fmt::Write as _;
use thiserror::Error;

/// Arrays deeper than this are rejected
const MAX_DEPTH: usize = 64;

/// Decode failures
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SerialError {
    #[error("syntax error at byte {pos}: {msg}")]
    Syntax { pos: usize, msg: &'static str },

    #[error("disallowed type '{tag}' at byte {pos}")]
    Forbidden { pos: usize, tag: char },

    #[error("nesting deeper than {MAX_DEPTH} levels")]
    TooDeep,

    #[error("top-level value is not an array")]
    NotArray,
}

/// Array key: integer or string
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Int(i64),
    Str(String),
}

impl Key {
    /// Build the key the runtime would use for `name`: canonical decimal
    /// integers become integer keys.
    pub fn from_name(name: &str) -> Self {
        match canonical_int(name) {
            Some(n) => Key::Int(n),
            None => Key::Str(name.to_string()),
        }
    }

    /// String form of the key
    pub fn as_str(&self) -> Cow<'_, str> {
        match self {
            Key::Int(n) => Cow::Owned(n.to_string()),
            Key::Str(s) => Cow::Borrowed(s),
        }
    }
}

/// Ordered associative array
pub type Array = Vec<(Key, Value)>;

/// A decoded value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Array(Array),
}

impl Value {
    /// Integer view: ints, bools and numeric strings
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Bool(b) => Some(i64::from(*b)),
            Value::Str(s) => s.trim().parse().ok(),
            Value::Float(f) if f.is_finite() => Some(f.trunc() as i64),
            _ => None,
        }
    }

    /// Array view
    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Mutable array view
    pub fn as_array_mut(&mut self) -> Option<&mut Array> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Look up `name` when this value is an array
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.as_array().and_then(|a| lookup(a, name))
    }

    /// Truthiness as the runtime evaluates it
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !(s.is_empty() || s == "0"),
            Value::Array(a) => !a.is_empty(),
        }
    }
}

/// Find the entry stored under `name`
pub fn lookup<'a>(array: &'a Array, name: &str) -> Option<&'a Value> {
    let key = Key::from_name(name);
    array.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
}

/// Decode a blob whose top-level value must be an array
pub fn decode_array(input: &str) -> Result<Array, SerialError> {
    match decode(input)? {
        Value::Array(a) => Ok(a),
        _ => Err(SerialError::NotArray),
    }
}

/// Decode a complete blob
pub fn decode(input: &str) -> Result<Value, SerialError> {
    let mut decoder = Decoder {
        input: input.as_bytes(),
        pos: 0,
    };
    let value = decoder.value(0)?;
    if decoder.pos != decoder.input.len() {
        return Err(decoder.syntax("trailing data"));
    }
    Ok(value)
}

/// Encode a value
pub fn encode(value: &Value) -> String {
    let mut out = String::new();
    encode_into(&mut out, value);
    out
}

/// Encode an array as a top-level value
pub fn encode_array(array: &Array) -> String {
    let mut out = String::new();
    encode_array_into(&mut out, array);
    out
}

fn encode_into(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("N;"),
        Value::Bool(b) => {
            let _ = write!(out, "b:{};", u8::from(*b));
        }
        Value::Int(n) => {
            let _ = write!(out, "i:{};", n);
        }
        Value::Float(f) => {
            if f.is_nan() {
                out.push_str("d:NAN;");
            } else if f.is_infinite() {
                out.push_str(if *f > 0.0 { "d:INF;" } else { "d:-INF;" });
            } else {
                let _ = write!(out, "d:{};", f);
            }
        }
        Value::Str(s) => encode_str(out, s),
        Value::Array(a) => encode_array_into(out, a),
    }
}

fn encode_array_into(out: &mut String, array: &Array) {
    let _ = write!(out, "a:{}:{{", array.len());
    for (key, value) in array {
        match key {
            Key::Int(n) => {
                let _ = write!(out, "i:{};", n);
            }
            Key::Str(s) => encode_str(out, s),
        }
        encode_into(out, value);
    }
    out.push('}');
}

fn encode_str(out: &mut String, s: &str) {
    let _ = write!(out, "s:{}:\"{}\";", s.len(), s);
}

fn canonical_int(s: &str) -> Option<i64> {
    let digits = s.strip_prefix('-').unwrap_or(s);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if digits.len() > 1 && digits.starts_with('0') {
        return None;
    }
    if s == "-0" {
        return None;
    }
    s.parse().ok()
}

struct Decoder<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    fn syntax(&self, msg: &'static str) -> SerialError {
        SerialError::Syntax { pos: self.pos, msg }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn expect(&mut self, byte: u8, msg: &'static str) -> Result<(), SerialError> {
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.syntax(msg))
        }
    }

    /// Bytes up to (not including) `end`, consuming the terminator
    fn until(&mut self, end: u8) -> Result<&'a str, SerialError> {
        let start = self.pos;
        let len = self.input[start..]
            .iter()
            .position(|&b| b == end)
            .ok_or_else(|| self.syntax("unterminated token"))?;
        self.pos = start + len + 1;
        std::str::from_utf8(&self.input[start..start + len])
            .map_err(|_| SerialError::Syntax { pos: start, msg: "invalid UTF-8" })
    }

    fn int_until(&mut self, end: u8) -> Result<i64, SerialError> {
        let start = self.pos;
        let text = self.until(end)?;
        let digits = text.strip_prefix(['-', '+']).unwrap_or(text);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(SerialError::Syntax { pos: start, msg: "invalid integer" });
        }
        text.parse()
            .map_err(|_| SerialError::Syntax { pos: start, msg: "integer out of range" })
    }

    fn len_until(&mut self, end: u8) -> Result<usize, SerialError> {
        let start = self.pos;
        let n = self.int_until(end)?;
        usize::try_from(n).map_err(|_| SerialError::Syntax { pos: start, msg: "negative length" })
    }

    fn string_body(&mut self) -> Result<String, SerialError> {
        let len = self.len_until(b':')?;
        self.expect(b'"', "expected opening quote")?;
        let start = self.pos;
        let end = start
            .checked_add(len)
            .filter(|&end| end <= self.input.len())
            .ok_or_else(|| self.syntax("string length exceeds input"))?;
        let s = std::str::from_utf8(&self.input[start..end])
            .map_err(|_| SerialError::Syntax { pos: start, msg: "invalid UTF-8" })?;
        self.pos = end;
        self.expect(b'"', "string length mismatch")?;
        self.expect(b';', "expected ';'")?;
        Ok(s.to_string())
    }

    fn value(&mut self, depth: usize) -> Result<Value, SerialError> {
        let tag_pos = self.pos;
        let tag = self.peek().ok_or_else(|| self.syntax("unexpected end of input"))?;
        self.pos += 1;

        match tag {
            b'N' => {
                self.expect(b';', "expected ';'")?;
                Ok(Value::Null)
            }
            b'b' => {
                self.expect(b':', "expected ':'")?;
                match self.until(b';')? {
                    "0" => Ok(Value::Bool(false)),
                    "1" => Ok(Value::Bool(true)),
                    _ => Err(SerialError::Syntax { pos: tag_pos, msg: "invalid boolean" }),
                }
            }
            b'i' => {
                self.expect(b':', "expected ':'")?;
                Ok(Value::Int(self.int_until(b';')?))
            }
            b'd' => {
                self.expect(b':', "expected ':'")?;
                let text = self.until(b';')?;
                let f = match text {
                    "INF" => f64::INFINITY,
                    "-INF" => f64::NEG_INFINITY,
                    "NAN" => f64::NAN,
                    other => other
                        .parse()
                        .map_err(|_| SerialError::Syntax { pos: tag_pos, msg: "invalid float" })?,
                };
                Ok(Value::Float(f))
            }
            b's' => {
                self.expect(b':', "expected ':'")?;
                Ok(Value::Str(self.string_body()?))
            }
            b'a' => {
                if depth >= MAX_DEPTH {
                    return Err(SerialError::TooDeep);
                }
                self.expect(b':', "expected ':'")?;
                let count = self.len_until(b':')?;
                self.expect(b'{', "expected '{'")?;
                // Every element needs at least 4 bytes of input
                let mut array = Vec::with_capacity(count.min(self.input.len() / 4));
                for _ in 0..count {
                    let key = self.key()?;
                    let value = self.value(depth + 1)?;
                    array.push((key, value));
                }
                self.expect(b'}', "expected '}'")?;
                Ok(Value::Array(array))
            }
            b'O' | b'C' | b'E' | b'r' | b'R' => Err(SerialError::Forbidden {
                pos: tag_pos,
                tag: char::from(tag),
            }),
            _ => Err(SerialError::Syntax { pos: tag_pos, msg: "unknown type tag" }),
        }
    }

    fn key(&mut self) -> Result<Key, SerialError> {
        let tag = self.peek().ok_or_else(|| self.syntax("unexpected end of input"))?;
        self.pos += 1;
        self.expect(b':', "expected ':'")?;
        match tag {
            b'i' => Ok(Key::Int(self.int_until(b';')?)),
            b's' => Ok(Key::Str(self.string_body()?)),
            _ => Err(SerialError::Syntax { pos: self.pos - 2, msg: "invalid array key" }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_decode_sortpref_blob() {
        let blob = r#"a:2:{s:5:"INBOX";a:1:{s:1:"b";i:2;}s:4:"Sent";a:2:{s:1:"b";i:1;s:1:"d";i:1;}}"#;
        let array = decode_array(blob).unwrap();

        assert_eq!(array.len(), 2);
        assert_eq!(array[0].0, Key::Str("INBOX".to_string()));
        assert_eq!(
            lookup(&array, "Sent").and_then(|v| v.get("d")),
            Some(&Value::Int(1))
        );
    }

    #[test]
    fn test_encode_matches_runtime_output() {
        let array: Array = vec![(
            Key::Str("INBOX".to_string()),
            Value::Array(vec![(Key::Str("b".to_string()), Value::Int(2))]),
        )];

        assert_eq!(encode_array(&array), r#"a:1:{s:5:"INBOX";a:1:{s:1:"b";i:2;}}"#);
    }

    #[test]
    fn test_scalars() {
        assert_eq!(decode("N;").unwrap(), Value::Null);
        assert_eq!(decode("b:1;").unwrap(), Value::Bool(true));
        assert_eq!(decode("i:-42;").unwrap(), Value::Int(-42));
        assert_eq!(decode("d:0.5;").unwrap(), Value::Float(0.5));
        assert_eq!(decode("d:-INF;").unwrap(), Value::Float(f64::NEG_INFINITY));
        assert_eq!(
            decode(r#"s:6:"Données";"#).unwrap_err(),
            SerialError::Syntax { pos: 11, msg: "string length mismatch" }
        );
        assert_eq!(
            decode(r#"s:8:"Données";"#).unwrap(),
            Value::Str("Données".to_string())
        );
    }

    #[test]
    fn test_numeric_mailbox_names_use_integer_keys() {
        assert_eq!(Key::from_name("2024"), Key::Int(2024));
        assert_eq!(Key::from_name("007"), Key::Str("007".to_string()));
        assert_eq!(Key::from_name("-0"), Key::Str("-0".to_string()));
        assert_eq!(Key::from_name("-12"), Key::Int(-12));

        let array = decode_array(r#"a:1:{i:2024;a:1:{s:1:"d";i:1;}}"#).unwrap();
        assert!(lookup(&array, "2024").is_some());
        assert_eq!(array[0].0.as_str(), "2024");
    }

    #[test]
    fn test_objects_are_refused() {
        let blob = r#"a:1:{s:5:"INBOX";O:8:"stdClass":0:{}}"#;
        assert!(matches!(
            decode(blob),
            Err(SerialError::Forbidden { tag: 'O', .. })
        ));

        assert!(matches!(
            decode(r#"C:3:"Foo":0:{}"#),
            Err(SerialError::Forbidden { tag: 'C', .. })
        ));
        assert!(matches!(
            decode(r#"a:2:{i:0;i:1;i:1;R:2;}"#),
            Err(SerialError::Forbidden { tag: 'R', .. })
        ));
    }

    #[test]
    fn test_scalar_top_level_is_not_an_array() {
        assert_eq!(decode_array("i:5;"), Err(SerialError::NotArray));
        assert_eq!(decode_array("b:0;"), Err(SerialError::NotArray));
    }

    #[test]
    fn test_malformed_input() {
        assert!(decode("").is_err());
        assert!(decode("a:1:{").is_err());
        assert!(decode("a:1:{i:0;i:1;}junk").is_err());
        assert!(decode("a:-1:{}").is_err());
        assert!(decode(r#"s:99:"short";"#).is_err());
        assert!(decode("i:9999999999999999999999;").is_err());
        assert!(decode("a:1:{d:1.5;i:1;}").is_err());
    }

    #[test]
    fn test_depth_limit() {
        let mut blob = String::new();
        for _ in 0..=MAX_DEPTH {
            blob.push_str("a:1:{i:0;");
        }
        blob.push_str("N;");
        for _ in 0..=MAX_DEPTH {
            blob.push('}');
        }

        assert_eq!(decode(&blob), Err(SerialError::TooDeep));
    }

    #[test]
    fn test_value_views() {
        assert_eq!(Value::Str("3".to_string()).as_int(), Some(3));
        assert_eq!(Value::Bool(true).as_int(), Some(1));
        assert_eq!(Value::Null.as_int(), None);
        assert!(!Value::Str("0".to_string()).is_truthy());
        assert!(Value::Bool(true).is_truthy());
    }
}
