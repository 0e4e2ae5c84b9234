//! JSON Pointer (RFC 6901) parsing and "set" with container creation.
//!
//! Setting a value walks the document token by token. Missing object keys
//! get a fresh container on the way down: an array when the following token
//! is an array index (or `-`), an object otherwise. Arrays grow on demand;
//! writing past the end pads the gap with `null`, up to [`MAX_ARRAY_PADDING`]
//! slots.

use std::fmt;

use serde_json::{Map, Value};

/// Most `null` slots a single index may add past the end of an array.
pub const MAX_ARRAY_PADDING: usize = 1024;

/// Errors raised while parsing or applying a pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PointerError {
    /// Pointer is neither empty nor starting with `/`, or has a bad escape
    Syntax { pointer: String, reason: String },
    /// The empty pointer addresses the whole document, which cannot be set
    Root,
    /// Tried to index into a scalar or null
    NotAContainer { at: String, found: &'static str },
    /// Non-numeric (or zero-padded) token used on an array
    BadIndex { at: String, token: String },
    /// Index too far past the end of the array to pad
    IndexOutOfRange { at: String, index: usize, len: usize },
}

impl fmt::Display for PointerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointerError::Syntax { pointer, reason } => {
                write!(f, "invalid JSON pointer {:?}: {}", pointer, reason)
            }
            PointerError::Root => write!(f, "cannot replace the document root"),
            PointerError::NotAContainer { at, found } => {
                write!(f, "cannot index into {} at {:?}", found, at)
            }
            PointerError::BadIndex { at, token } => {
                write!(f, "{:?} is not an array index at {:?}", token, at)
            }
            PointerError::IndexOutOfRange { at, index, len } => write!(
                f,
                "index {} is too far past the end of the array at {:?} (length {})",
                index, at, len
            ),
        }
    }
}

impl std::error::Error for PointerError {}

/// A parsed JSON pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPointer {
    tokens: Vec<String>,
}

impl JsonPointer {
    pub fn parse(raw: &str) -> Result<Self, PointerError> {
        if raw.is_empty() {
            return Ok(Self { tokens: Vec::new() });
        }

        let rest = raw.strip_prefix('/').ok_or_else(|| PointerError::Syntax {
            pointer: raw.to_string(),
            reason: "must start with '/'".to_string(),
        })?;

        let tokens = rest
            .split('/')
            .map(|token| unescape(token).ok_or_else(|| bad_escape(raw)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { tokens })
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn is_root(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Write `value` at this pointer, creating intermediate containers.
    pub fn set(&self, document: &mut Value, value: Value) -> Result<(), PointerError> {
        let (last, parents) = self.tokens.split_last().ok_or(PointerError::Root)?;

        let mut target = document;
        for (depth, token) in parents.iter().enumerate() {
            let next = &self.tokens[depth + 1];
            target = descend(target, token, next, || self.prefix(depth))?;
        }

        assign(target, last, value, || self.prefix(parents.len()))
    }

    // Location of the container reached after `len` tokens.
    fn prefix(&self, len: usize) -> String {
        self.tokens[..len]
            .iter()
            .map(|token| format!("/{}", escape(token)))
            .collect()
    }
}

fn descend<'a, F>(
    target: &'a mut Value,
    token: &str,
    next: &str,
    at: F,
) -> Result<&'a mut Value, PointerError>
where
    F: Fn() -> String,
{
    match target {
        Value::Object(map) => Ok(map
            .entry(token.to_string())
            .or_insert_with(|| container_for(next))),
        Value::Array(items) => {
            let index = checked_index(token, items.len(), &at)?;
            if index >= items.len() {
                items.resize(index, Value::Null);
                items.push(container_for(next));
            }
            Ok(&mut items[index])
        }
        other => Err(PointerError::NotAContainer {
            at: at(),
            found: kind_of(other),
        }),
    }
}

fn assign<F>(target: &mut Value, token: &str, value: Value, at: F) -> Result<(), PointerError>
where
    F: Fn() -> String,
{
    match target {
        Value::Object(map) => {
            map.insert(token.to_string(), value);
            Ok(())
        }
        Value::Array(items) => {
            let index = checked_index(token, items.len(), &at)?;
            if index < items.len() {
                items[index] = value;
            } else {
                items.resize(index, Value::Null);
                items.push(value);
            }
            Ok(())
        }
        other => Err(PointerError::NotAContainer {
            at: at(),
            found: kind_of(other),
        }),
    }
}

fn container_for(next: &str) -> Value {
    if next == "-" || is_index(next) {
        Value::Array(Vec::new())
    } else {
        Value::Object(Map::new())
    }
}

fn is_index(token: &str) -> bool {
    !token.is_empty()
        && token.bytes().all(|b| b.is_ascii_digit())
        && (token == "0" || !token.starts_with('0'))
}

/// `-` means "one past the end".
fn array_index(token: &str, len: usize) -> Option<usize> {
    if token == "-" {
        return Some(len);
    }
    if !is_index(token) {
        return None;
    }
    token.parse().ok()
}

fn checked_index<F>(token: &str, len: usize, at: &F) -> Result<usize, PointerError>
where
    F: Fn() -> String,
{
    let index = array_index(token, len).ok_or_else(|| PointerError::BadIndex {
        at: at(),
        token: token.to_string(),
    })?;
    if index.saturating_sub(len) > MAX_ARRAY_PADDING {
        return Err(PointerError::IndexOutOfRange {
            at: at(),
            index,
            len,
        });
    }
    Ok(index)
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn unescape(token: &str) -> Option<String> {
    if !token.contains('~') {
        return Some(token.to_string());
    }

    let mut out = String::with_capacity(token.len());
    let mut chars = token.chars();
    while let Some(c) = chars.next() {
        if c == '~' {
            match chars.next() {
                Some('0') => out.push('~'),
                Some('1') => out.push('/'),
                _ => return None,
            }
        } else {
            out.push(c);
        }
    }
    Some(out)
}

fn escape(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

fn bad_escape(raw: &str) -> PointerError {
    PointerError::Syntax {
        pointer: raw.to_string(),
        reason: "'~' must be followed by '0' or '1'".to_string(),
    }
}
