//! JSON adapters over serde_json.
//!
//! `json-stream` folds from inside serde: a `Serialize` walker on the way out
//! and a `DeserializeSeed` visitor on the way in, so no intermediate tree is
//! built. `json-dom` goes through an ordered `serde_json::Value` both ways.
//!
//! JSON has no container headers, so counts are never declared here.

use std::cell::RefCell;
use std::fmt;

use serde::de::{self, DeserializeSeed, MapAccess, SeqAccess, Visitor};
use serde::ser::{self, Serialize, SerializeMap, SerializeSeq, Serializer};

use super::{Codec, Encoded, Format};
use crate::error::{DecodeError, EncodeError, Error, Result};
use crate::fold::{FoldOptions, Folder, count_of};
use crate::hash::Digest;
use crate::value::Value;

const STREAM: &str = "json-stream";
const DOM: &str = "json-dom";

fn utf8<'a>(codec: &'static str, bytes: &'a [u8]) -> Result<&'a str, EncodeError> {
    std::str::from_utf8(bytes).map_err(|e| EncodeError::Unrepresentable {
        codec,
        what: format!("a non-UTF-8 string ({e})"),
    })
}

fn finite(codec: &'static str, d: f64) -> Result<f64, EncodeError> {
    if d.is_finite() {
        Ok(d)
    } else {
        Err(EncodeError::Unrepresentable { codec, what: format!("the non-finite double {d}") })
    }
}

/// Folder plus the first error the fold hit. serde only carries string
/// errors through its own error type, so the typed one waits here.
struct FoldState {
    folder: Folder,
    failure: Option<Error>,
}

impl FoldState {
    fn new(folder: Folder) -> Self {
        Self { folder, failure: None }
    }

    fn record(&mut self, err: impl Into<Error>) {
        if self.failure.is_none() {
            self.failure = Some(err.into());
        }
    }
}

const ABORTED: &str = "fold aborted";

// ————————————————————————————————————————————————————————————————————————————
// json-stream
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonStream;

struct Folding<'a> {
    value: &'a Value,
    state: &'a RefCell<FoldState>,
}

impl Folding<'_> {
    fn fold<E: ser::Error>(&self, f: impl FnOnce(&mut Folder) -> Result<()>) -> Result<(), E> {
        let mut state = self.state.borrow_mut();
        let folded = f(&mut state.folder);
        folded.map_err(|err| {
            state.record(err);
            E::custom(ABORTED)
        })
    }

    fn reject<E: ser::Error>(&self, err: impl Into<Error>) -> E {
        self.state.borrow_mut().record(err);
        E::custom(ABORTED)
    }
}

impl Serialize for Folding<'_> {
    fn serialize<S: Serializer>(&self, ser: S) -> Result<S::Ok, S::Error> {
        match self.value {
            Value::Nil => {
                self.fold(|f| f.nil())?;
                ser.serialize_unit()
            }
            Value::Bool(b) => {
                self.fold(|f| f.bool(*b))?;
                ser.serialize_bool(*b)
            }
            Value::Int(i) => {
                self.fold(|f| f.int(*i))?;
                ser.serialize_i64(*i)
            }
            Value::UInt(u) => {
                self.fold(|f| f.uint(*u))?;
                ser.serialize_u64(*u)
            }
            Value::Double(d) => {
                let d = finite(STREAM, *d).map_err(|e| self.reject::<S::Error>(e))?;
                self.fold(|f| f.double(d))?;
                ser.serialize_f64(d)
            }
            Value::Str(s) => {
                let text = utf8(STREAM, s).map_err(|e| self.reject::<S::Error>(e))?;
                self.fold(|f| f.str(s))?;
                ser.serialize_str(text)
            }
            Value::List(items) => {
                let declared = count_of(items.len()).map_err(|e| self.reject::<S::Error>(e))?;
                self.fold(|f| f.begin_list(Some(declared)))?;
                let mut seq = ser.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(&Folding { value: item, state: self.state })?;
                }
                self.fold(|f| f.end_list())?;
                seq.end()
            }
            Value::Map(pairs) => {
                let declared = count_of(pairs.len()).map_err(|e| self.reject::<S::Error>(e))?;
                self.fold(|f| f.begin_map(Some(declared)))?;
                let mut map = ser.serialize_map(Some(pairs.len()))?;
                for (k, v) in pairs {
                    let key = utf8(STREAM, k).map_err(|e| self.reject::<S::Error>(e))?;
                    self.fold(|f| f.key(k))?;
                    map.serialize_key(key)?;
                    map.serialize_value(&Folding { value: v, state: self.state })?;
                }
                self.fold(|f| f.end_map())?;
                map.end()
            }
        }
    }
}

/// Seed for one JSON value; folds it as serde_json hands it over.
struct FoldSeed<'a> {
    state: &'a mut FoldState,
}

impl FoldSeed<'_> {
    fn fold<E: de::Error>(self, f: impl FnOnce(&mut Folder) -> Result<()>) -> Result<(), E> {
        let folded = f(&mut self.state.folder);
        folded.map_err(|err| {
            self.state.record(err);
            E::custom(ABORTED)
        })
    }
}

impl<'de> DeserializeSeed<'de> for FoldSeed<'_> {
    type Value = ();

    fn deserialize<D: de::Deserializer<'de>>(self, de: D) -> Result<(), D::Error> {
        de.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for FoldSeed<'_> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("any JSON value")
    }

    fn visit_unit<E: de::Error>(self) -> Result<(), E> {
        self.fold(|f| f.nil())
    }

    fn visit_bool<E: de::Error>(self, b: bool) -> Result<(), E> {
        self.fold(|f| f.bool(b))
    }

    fn visit_i64<E: de::Error>(self, i: i64) -> Result<(), E> {
        self.fold(|f| f.int(i))
    }

    fn visit_u64<E: de::Error>(self, u: u64) -> Result<(), E> {
        self.fold(|f| f.uint(u))
    }

    fn visit_f64<E: de::Error>(self, d: f64) -> Result<(), E> {
        self.fold(|f| f.double(d))
    }

    fn visit_str<E: de::Error>(self, s: &str) -> Result<(), E> {
        self.fold(|f| f.str(s.as_bytes()))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<(), A::Error> {
        let state = self.state;
        FoldSeed { state: &mut *state }.fold::<A::Error>(|f| f.begin_list(None))?;
        while seq.next_element_seed(FoldSeed { state: &mut *state })?.is_some() {}
        FoldSeed { state }.fold(|f| f.end_list())
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<(), A::Error> {
        let state = self.state;
        FoldSeed { state: &mut *state }.fold::<A::Error>(|f| f.begin_map(None))?;
        while map.next_key_seed(KeySeed { state: &mut *state })?.is_some() {
            map.next_value_seed(FoldSeed { state: &mut *state })?;
        }
        FoldSeed { state }.fold(|f| f.end_map())
    }
}

/// Map keys fold as bytes, never as string values.
struct KeySeed<'a> {
    state: &'a mut FoldState,
}

impl<'de> DeserializeSeed<'de> for KeySeed<'_> {
    type Value = ();

    fn deserialize<D: de::Deserializer<'de>>(self, de: D) -> Result<(), D::Error> {
        de.deserialize_str(self)
    }
}

impl<'de> Visitor<'de> for KeySeed<'_> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a string key")
    }

    fn visit_str<E: de::Error>(self, s: &str) -> Result<(), E> {
        FoldSeed { state: self.state }.fold(|f| f.key(s.as_bytes()))
    }
}

impl Codec for JsonStream {
    fn name(&self) -> &'static str {
        STREAM
    }

    fn format(&self) -> Format {
        Format::Json
    }

    fn encode(&self, value: &Value, options: &FoldOptions) -> Result<Encoded> {
        let state = RefCell::new(FoldState::new(Folder::for_encode(options)));
        let written = serde_json::to_vec(&Folding { value, state: &state });
        let FoldState { folder, failure } = state.into_inner();
        if let Some(err) = failure {
            return Err(err);
        }
        let bytes = written.map_err(|source| EncodeError::Serializer { codec: STREAM, source })?;
        Ok(Encoded { bytes, digest: folder.finish()? })
    }

    fn decode(&self, bytes: &[u8], options: &FoldOptions) -> Result<Digest> {
        let mut state = FoldState::new(Folder::new(options));
        let mut de = serde_json::Deserializer::from_slice(bytes);
        let parsed = FoldSeed { state: &mut state }
            .deserialize(&mut de)
            .and_then(|()| de.end());
        if let Some(err) = state.failure {
            return Err(err);
        }
        parsed.map_err(|source| DecodeError::Parser { codec: STREAM, source })?;
        state.folder.finish()
    }
}

// ————————————————————————————————————————————————————————————————————————————
// json-dom
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDom;

fn build_dom(value: &Value, folder: &mut Folder) -> Result<serde_json::Value> {
    use serde_json::Value as Json;
    Ok(match value {
        Value::Nil => {
            folder.nil()?;
            Json::Null
        }
        Value::Bool(b) => {
            folder.bool(*b)?;
            Json::Bool(*b)
        }
        Value::Int(i) => {
            folder.int(*i)?;
            Json::from(*i)
        }
        Value::UInt(u) => {
            folder.uint(*u)?;
            Json::from(*u)
        }
        Value::Double(d) => {
            let number = serde_json::Number::from_f64(*d).ok_or_else(|| {
                EncodeError::Unrepresentable { codec: DOM, what: format!("the non-finite double {d}") }
            })?;
            folder.double(*d)?;
            Json::Number(number)
        }
        Value::Str(s) => {
            let text = utf8(DOM, s)?;
            folder.str(s)?;
            Json::String(text.to_owned())
        }
        Value::List(items) => {
            folder.begin_list(Some(count_of(items.len())?))?;
            let items = items
                .iter()
                .map(|item| build_dom(item, folder))
                .collect::<Result<Vec<_>>>()?;
            folder.end_list()?;
            Json::Array(items)
        }
        Value::Map(pairs) => {
            folder.begin_map(Some(count_of(pairs.len())?))?;
            let mut object = serde_json::Map::with_capacity(pairs.len());
            for (k, v) in pairs {
                let key = utf8(DOM, k)?;
                folder.key(k)?;
                let child = build_dom(v, folder)?;
                if object.insert(key.to_owned(), child).is_some() {
                    return Err(EncodeError::Unrepresentable {
                        codec: DOM,
                        what: format!("the duplicate map key {key:?}"),
                    }
                    .into());
                }
            }
            folder.end_map()?;
            Json::Object(object)
        }
    })
}

fn walk_dom(json: &serde_json::Value, folder: &mut Folder) -> Result<()> {
    use serde_json::Value as Json;
    match json {
        Json::Null => folder.nil(),
        Json::Bool(b) => folder.bool(*b),
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                folder.int(i)
            } else if let Some(u) = n.as_u64() {
                folder.uint(u)
            } else if let Some(d) = n.as_f64() {
                folder.double(d)
            } else {
                Err(DecodeError::Malformed { offset: 0, detail: format!("unrepresentable number {n}") }
                    .into())
            }
        }
        Json::String(s) => folder.str(s.as_bytes()),
        Json::Array(items) => {
            folder.begin_list(Some(count_of(items.len())?))?;
            for item in items {
                walk_dom(item, folder)?;
            }
            folder.end_list()
        }
        Json::Object(object) => {
            folder.begin_map(Some(count_of(object.len())?))?;
            for (k, v) in object {
                folder.key(k.as_bytes())?;
                walk_dom(v, folder)?;
            }
            folder.end_map()
        }
    }
}

impl Codec for JsonDom {
    fn name(&self) -> &'static str {
        DOM
    }

    fn format(&self) -> Format {
        Format::Json
    }

    fn encode(&self, value: &Value, options: &FoldOptions) -> Result<Encoded> {
        let mut folder = Folder::for_encode(options);
        let dom = build_dom(value, &mut folder)?;
        let bytes = serde_json::to_vec(&dom)
            .map_err(|source| EncodeError::Serializer { codec: DOM, source })?;
        Ok(Encoded { bytes, digest: folder.finish()? })
    }

    /// Duplicate keys collapse while parsing into the ordered DOM (the last
    /// value wins, at the first key's position).
    fn decode(&self, bytes: &[u8], options: &FoldOptions) -> Result<Digest> {
        let dom: serde_json::Value = serde_json::from_slice(bytes)
            .map_err(|source| DecodeError::Parser { codec: DOM, source })?;
        let mut folder = Folder::new(options);
        walk_dom(&dom, &mut folder)?;
        folder.finish()
    }
}
