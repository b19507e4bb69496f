// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed dialect: `TYPE:KEY:VALUE|...`.
//!
//! Keys may be dotted (`user.name`) and bracketed (`items[0].id`); decode
//! reconstructs the nested graph from those paths, in any token order.
//! Encode walks a graph depth-first, emitting one `object`/`array` header
//! token per composite (value slot = member count) followed by leaf tokens.

use serde_json::{Map, Number, Value};

use crate::error::ToonError;
use crate::token::{fragments, ToonType, FIELD_SEP, NULL_LITERAL, TOKEN_SEP};
use crate::Payload;

/// One step of a key path.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Seg {
    Field(String),
    Index(usize),
}

/// Decode a typed payload into a key/value map, rebuilding nested graphs.
pub fn decode(input: &str) -> Result<Payload, ToonError> {
    let mut root = Payload::new();
    for frag in fragments(input) {
        let mut parts = frag.splitn(3, FIELD_SEP);
        let (Some(ty), Some(key), Some(raw)) = (parts.next(), parts.next(), parts.next()) else {
            return Err(ToonError::MalformedToken(frag.to_owned()));
        };
        let ty = ToonType::parse(ty).ok_or_else(|| ToonError::UnknownType(ty.to_owned()))?;
        let path = parse_path(key)?;

        match ty {
            ToonType::Object => {
                // Header token; the count is informational but must parse.
                raw.parse::<usize>().map_err(|_| ToonError::MalformedToken(frag.to_owned()))?;
                ensure_composite(&mut root, &path, Value::Object(Map::new()))?;
            }
            ToonType::Array => {
                raw.parse::<usize>().map_err(|_| ToonError::MalformedToken(frag.to_owned()))?;
                ensure_composite(&mut root, &path, Value::Array(Vec::new()))?;
            }
            ToonType::String => insert_at(&mut root, &path, Value::String(raw.to_owned()))?,
            ToonType::Number => insert_at(&mut root, &path, parse_number(raw)?)?,
            ToonType::Boolean => {
                let value = match raw {
                    "true" => Value::Bool(true),
                    "false" => Value::Bool(false),
                    _ => return Err(ToonError::InvalidBoolean(raw.to_owned())),
                };
                insert_at(&mut root, &path, value)?;
            }
            ToonType::Null => {
                if raw != NULL_LITERAL {
                    return Err(ToonError::MalformedToken(frag.to_owned()));
                }
                insert_at(&mut root, &path, Value::Null)?;
            }
        }
    }
    Ok(root)
}

/// Encode a payload in the typed dialect, depth-first.
pub fn encode(payload: &Payload) -> String {
    let mut tokens = Vec::new();
    for (key, value) in payload {
        emit(&mut tokens, key, value);
    }
    tokens.join(&TOKEN_SEP.to_string())
}

fn emit(tokens: &mut Vec<String>, path: &str, value: &Value) {
    match value {
        Value::Null => tokens.push(format!("null{FIELD_SEP}{path}{FIELD_SEP}{NULL_LITERAL}")),
        Value::Bool(b) => tokens.push(format!("boolean{FIELD_SEP}{path}{FIELD_SEP}{b}")),
        Value::Number(n) => tokens.push(format!("number{FIELD_SEP}{path}{FIELD_SEP}{n}")),
        Value::String(s) => tokens.push(format!("string{FIELD_SEP}{path}{FIELD_SEP}{s}")),
        Value::Array(items) => {
            tokens.push(format!("array{FIELD_SEP}{path}{FIELD_SEP}{}", items.len()));
            for (i, item) in items.iter().enumerate() {
                emit(tokens, &format!("{path}[{i}]"), item);
            }
        }
        Value::Object(map) => {
            tokens.push(format!("object{FIELD_SEP}{path}{FIELD_SEP}{}", map.len()));
            for (k, v) in map {
                emit(tokens, &format!("{path}.{k}"), v);
            }
        }
    }
}

fn parse_number(raw: &str) -> Result<Value, ToonError> {
    if !raw.contains(['.', 'e', 'E']) {
        if let Ok(n) = raw.parse::<i64>() {
            return Ok(Value::Number(Number::from(n)));
        }
    }
    raw.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| ToonError::InvalidNumber(raw.to_owned()))
}

/// Parse `ident('[' digits ']')*('.' ident('[' digits ']')*)*` into segments.
fn parse_path(key: &str) -> Result<Vec<Seg>, ToonError> {
    let mut segs = Vec::new();
    let mut field = String::new();
    let mut chars = key.chars().peekable();
    let mut expect_field = true;

    while let Some(c) = chars.next() {
        match c {
            '.' => {
                if field.is_empty() && expect_field {
                    return Err(ToonError::InvalidPath(key.to_owned()));
                }
                flush_field(&mut segs, &mut field);
                expect_field = true;
            }
            '[' => {
                flush_field(&mut segs, &mut field);
                if segs.is_empty() {
                    return Err(ToonError::InvalidPath(key.to_owned()));
                }
                let mut digits = String::new();
                loop {
                    match chars.next() {
                        Some(']') => break,
                        Some(d) if d.is_ascii_digit() => digits.push(d),
                        _ => return Err(ToonError::InvalidPath(key.to_owned())),
                    }
                }
                let idx: usize =
                    digits.parse().map_err(|_| ToonError::InvalidPath(key.to_owned()))?;
                segs.push(Seg::Index(idx));
                expect_field = false;
            }
            ']' => return Err(ToonError::InvalidPath(key.to_owned())),
            c => {
                field.push(c);
                expect_field = false;
            }
        }
    }
    if expect_field && field.is_empty() {
        return Err(ToonError::InvalidPath(key.to_owned()));
    }
    flush_field(&mut segs, &mut field);
    if segs.is_empty() {
        return Err(ToonError::InvalidPath(key.to_owned()));
    }
    Ok(segs)
}

fn flush_field(segs: &mut Vec<Seg>, field: &mut String) {
    if !field.is_empty() {
        segs.push(Seg::Field(std::mem::take(field)));
    }
}

/// Insert a leaf value at `path`, creating intermediate containers.
fn insert_at(root: &mut Payload, path: &[Seg], value: Value) -> Result<(), ToonError> {
    let (first, rest) = split_root(path)?;
    if rest.is_empty() {
        root.insert(first.to_owned(), value);
        return Ok(());
    }
    let slot = root.entry(first.to_owned()).or_insert_with(|| container_for(&rest[0]));
    descend(slot, rest, value, path)
}

/// Ensure a composite exists at `path` without clobbering members that
/// earlier tokens already placed inside it.
fn ensure_composite(root: &mut Payload, path: &[Seg], empty: Value) -> Result<(), ToonError> {
    let (first, rest) = split_root(path)?;
    if rest.is_empty() {
        let slot = root.entry(first.to_owned()).or_insert_with(|| empty.clone());
        return check_kind(slot, &empty, path);
    }
    let slot = root.entry(first.to_owned()).or_insert_with(|| container_for(&rest[0]));
    ensure_nested(slot, rest, empty, path)
}

fn split_root(path: &[Seg]) -> Result<(&str, &[Seg]), ToonError> {
    match path.first() {
        Some(Seg::Field(name)) => Ok((name, &path[1..])),
        _ => Err(ToonError::InvalidPath(render_path(path))),
    }
}

fn descend(cur: &mut Value, segs: &[Seg], value: Value, full: &[Seg]) -> Result<(), ToonError> {
    let (seg, rest) = (&segs[0], &segs[1..]);
    match seg {
        Seg::Field(name) => {
            let map = cur
                .as_object_mut()
                .ok_or_else(|| ToonError::InvalidPath(render_path(full)))?;
            if rest.is_empty() {
                map.insert(name.clone(), value);
                return Ok(());
            }
            let slot = map.entry(name.clone()).or_insert_with(|| container_for(&rest[0]));
            descend(slot, rest, value, full)
        }
        Seg::Index(i) => {
            let arr = cur
                .as_array_mut()
                .ok_or_else(|| ToonError::InvalidPath(render_path(full)))?;
            while arr.len() <= *i {
                arr.push(Value::Null);
            }
            if rest.is_empty() {
                arr[*i] = value;
                return Ok(());
            }
            if arr[*i].is_null() {
                arr[*i] = container_for(&rest[0]);
            }
            descend(&mut arr[*i], rest, value, full)
        }
    }
}

fn ensure_nested(cur: &mut Value, segs: &[Seg], empty: Value, full: &[Seg]) -> Result<(), ToonError> {
    let (seg, rest) = (&segs[0], &segs[1..]);
    match seg {
        Seg::Field(name) => {
            let map = cur
                .as_object_mut()
                .ok_or_else(|| ToonError::InvalidPath(render_path(full)))?;
            if rest.is_empty() {
                let slot = map.entry(name.clone()).or_insert_with(|| empty.clone());
                return check_kind(slot, &empty, full);
            }
            let slot = map.entry(name.clone()).or_insert_with(|| container_for(&rest[0]));
            ensure_nested(slot, rest, empty, full)
        }
        Seg::Index(i) => {
            let arr = cur
                .as_array_mut()
                .ok_or_else(|| ToonError::InvalidPath(render_path(full)))?;
            while arr.len() <= *i {
                arr.push(Value::Null);
            }
            if rest.is_empty() {
                if arr[*i].is_null() {
                    arr[*i] = empty.clone();
                }
                return check_kind(&mut arr[*i], &empty, full);
            }
            if arr[*i].is_null() {
                arr[*i] = container_for(&rest[0]);
            }
            ensure_nested(&mut arr[*i], rest, empty, full)
        }
    }
}

fn check_kind(slot: &mut Value, empty: &Value, path: &[Seg]) -> Result<(), ToonError> {
    let ok = matches!(
        (&*slot, empty),
        (Value::Object(_), Value::Object(_)) | (Value::Array(_), Value::Array(_))
    );
    if ok {
        Ok(())
    } else {
        Err(ToonError::InvalidPath(render_path(path)))
    }
}

fn container_for(seg: &Seg) -> Value {
    match seg {
        Seg::Field(_) => Value::Object(Map::new()),
        Seg::Index(_) => Value::Array(Vec::new()),
    }
}

fn render_path(path: &[Seg]) -> String {
    let mut out = String::new();
    for seg in path {
        match seg {
            Seg::Field(name) => {
                if !out.is_empty() {
                    out.push('.');
                }
                out.push_str(name);
            }
            Seg::Index(i) => {
                out.push('[');
                out.push_str(&i.to_string());
                out.push(']');
            }
        }
    }
    out
}

#[cfg(test)]
#[path = "typed_tests.rs"]
mod tests;
