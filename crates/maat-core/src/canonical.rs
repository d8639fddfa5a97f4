//! Canonical serialization and the Universal Knowledge Hash (UKH)
//!
//! A record's canonical form has lexicographically sorted keys at every
//! depth, no insignificant whitespace, and every floating-point number
//! rendered as a fixed 15-fractional-digit decimal string with trailing
//! zeros (and a bare trailing point) stripped. Integers, booleans, strings
//! and null pass through. The top-level `ukh` field never takes part in
//! its own hash.

use crate::error::{Error, Result};
use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use serde::Serialize;
use serde_json::{Map, Number, Value};

/// Reserved field that carries a record's content hash.
pub const HASH_FIELD: &str = "ukh";

/// A ledger record in its generic form: one JSON object.
pub type RawRecord = Map<String, Value>;

type Blake2b256 = Blake2b<U32>;

/// Render a float as a canonical decimal string. Never uses exponent form.
pub fn decimal_string(x: f64) -> String {
    if x.is_nan() {
        return "nan".to_string();
    }
    if x.is_infinite() {
        return if x > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let s = format!("{:.15}", x);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s.is_empty() {
        "0".to_string()
    } else {
        s.to_string()
    }
}

/// Convert any serializable record into its generic object form.
pub fn to_raw<R: Serialize + ?Sized>(record: &R) -> Result<RawRecord> {
    match serde_json::to_value(record)? {
        Value::Object(map) => Ok(map),
        other => Err(Error::InvalidRecord(other.to_string())),
    }
}

/// Canonicalize a record: sorted keys, floats as decimal strings, hash field dropped.
pub fn canonicalize(record: &RawRecord) -> RawRecord {
    let mut keys: Vec<&String> = record.keys().filter(|k| *k != HASH_FIELD).collect();
    keys.sort();
    let mut out = Map::new();
    for key in keys {
        out.insert(key.clone(), canon_value(&record[key.as_str()]));
    }
    out
}

fn canon_value(value: &Value) -> Value {
    match value {
        Value::Number(n) if is_float(n) => {
            Value::String(decimal_string(n.as_f64().unwrap_or(0.0)))
        }
        Value::Array(items) => Value::Array(items.iter().map(canon_value).collect()),
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = Map::new();
            for key in keys {
                out.insert(key.clone(), canon_value(&map[key.as_str()]));
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

fn is_float(n: &Number) -> bool {
    !n.is_i64() && !n.is_u64()
}

/// The canonical byte string hashed for a record (hash field excluded).
pub fn canonical_string(record: &RawRecord) -> String {
    let mut out = String::new();
    write_object(&mut out, record, false);
    out
}

/// The line written to a ledger: canonical body with the hash field appended last.
pub fn ledger_line(record: &RawRecord) -> String {
    let mut out = String::new();
    write_object(&mut out, record, true);
    out
}

fn write_object(out: &mut String, record: &RawRecord, with_hash: bool) {
    let mut keys: Vec<&String> = record.keys().filter(|k| *k != HASH_FIELD).collect();
    keys.sort();
    out.push('{');
    let mut first = true;
    for key in keys {
        if !first {
            out.push(',');
        }
        first = false;
        write_string(out, key);
        out.push(':');
        write_value(out, &record[key.as_str()]);
    }
    if with_hash {
        if let Some(hash) = record.get(HASH_FIELD) {
            if !first {
                out.push(',');
            }
            write_string(out, HASH_FIELD);
            out.push(':');
            write_value(out, hash);
        }
    }
    out.push('}');
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) if is_float(n) => {
            write_string(out, &decimal_string(n.as_f64().unwrap_or(0.0)))
        }
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => write_string(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(out, key);
                out.push(':');
                write_value(out, &map[key.as_str()]);
            }
            out.push('}');
        }
    }
}

fn write_string(out: &mut String, s: &str) {
    // Value's Display is compact JSON with standard escaping.
    out.push_str(&Value::String(s.to_string()).to_string());
}

/// BLAKE2b-256 over the canonical form, as 64 lowercase hex chars.
pub fn compute_hash(record: &RawRecord) -> String {
    let mut hasher = Blake2b256::new();
    hasher.update(canonical_string(record).as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Insert the hash if absent. Idempotent; returns the record's hash.
pub fn attach_hash(record: &mut RawRecord) -> String {
    if let Some(Value::String(existing)) = record.get(HASH_FIELD) {
        return existing.clone();
    }
    let hash = compute_hash(record);
    record.insert(HASH_FIELD.to_string(), Value::String(hash.clone()));
    hash
}

/// True when `s` looks like a UKH (64 lowercase hex chars).
pub fn is_hash(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// Serde adapter: `f64` written as a canonical decimal string, read from string or number.
pub mod decimal {
    use super::decimal_string;
    use serde::de::{self, Deserializer, Visitor};
    use serde::Serializer;
    use std::fmt;

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&decimal_string(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        deserializer.deserialize_any(DecimalVisitor)
    }

    pub(super) struct DecimalVisitor;

    impl<'de> Visitor<'de> for DecimalVisitor {
        type Value = f64;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a decimal string or number")
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<f64, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<f64, E> {
            Ok(v as f64)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<f64, E> {
            Ok(v as f64)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<f64, E> {
            v.parse::<f64>()
                .map_err(|_| E::custom(format!("not a decimal: {:?}", v)))
        }
    }
}

/// Serde adapter for `BTreeMap<String, f64>` with decimal-string values.
pub mod decimal_map {
    use super::decimal_string;
    use serde::de::{Deserializer, MapAccess, Visitor};
    use serde::ser::{SerializeMap, Serializer};
    use std::collections::BTreeMap;
    use std::fmt;

    pub fn serialize<S: Serializer>(
        map: &BTreeMap<String, f64>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut out = serializer.serialize_map(Some(map.len()))?;
        for (k, v) in map {
            out.serialize_entry(k, &decimal_string(*v))?;
        }
        out.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<String, f64>, D::Error> {
        deserializer.deserialize_map(DecimalMapVisitor)
    }

    struct DecimalMapVisitor;

    struct Entry(f64);

    impl<'de> serde::Deserialize<'de> for Entry {
        fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
            d.deserialize_any(super::decimal::DecimalVisitor).map(Entry)
        }
    }

    impl<'de> Visitor<'de> for DecimalMapVisitor {
        type Value = BTreeMap<String, f64>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map of decimal strings")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
            let mut out = BTreeMap::new();
            while let Some((k, Entry(v))) = access.next_entry::<String, Entry>()? {
                out.insert(k, v);
            }
            Ok(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(v: Value) -> RawRecord {
        match v {
            Value::Object(m) => m,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn decimal_string_strips_trailing_zeros() {
        assert_eq!(decimal_string(1.0), "1");
        assert_eq!(decimal_string(0.5), "0.5");
        assert_eq!(decimal_string(0.0), "0");
        assert_eq!(decimal_string(-8.0), "-8");
        assert_eq!(decimal_string(0.1), "0.1");
    }

    #[test]
    fn decimal_string_never_uses_exponent() {
        assert_eq!(decimal_string(1e-7), "0.0000001");
        assert_eq!(decimal_string(1e20), "100000000000000000000");
        assert_eq!(decimal_string(1e-16), "0");
    }

    #[test]
    fn canonical_string_sorts_nested_keys() {
        let rec = raw(json!({"b": 1, "a": {"z": true, "y": null}}));
        assert_eq!(canonical_string(&rec), r#"{"a":{"y":null,"z":true},"b":1}"#);
    }

    #[test]
    fn canonical_string_excludes_hash_field() {
        let rec = raw(json!({"a": 1, "ukh": "deadbeef"}));
        assert_eq!(canonical_string(&rec), r#"{"a":1}"#);
        assert_eq!(ledger_line(&rec), r#"{"a":1,"ukh":"deadbeef"}"#);
    }

    #[test]
    fn ledger_line_puts_hash_last() {
        let rec = raw(json!({"zeta": 1, "alpha": 2, "ukh": "h"}));
        assert_eq!(ledger_line(&rec), r#"{"alpha":2,"zeta":1,"ukh":"h"}"#);
    }

    #[test]
    fn floats_and_integers_are_distinguished() {
        let rec = raw(json!({"f": 2.0, "i": 2}));
        assert_eq!(canonical_string(&rec), r#"{"f":"2","i":2}"#);
    }

    #[test]
    fn canonicalize_drops_hash_and_stringifies_floats() {
        let rec = raw(json!({"x": [0.25, 1], "ukh": "abc"}));
        let canon = canonicalize(&rec);
        assert!(!canon.contains_key(HASH_FIELD));
        assert_eq!(canon["x"], json!(["0.25", 1]));
    }

    #[test]
    fn hash_is_64_hex_chars() {
        let rec = raw(json!({"a": 1}));
        let h = compute_hash(&rec);
        assert!(is_hash(&h));
    }

    #[test]
    fn attach_hash_keeps_existing_value() {
        let mut rec = raw(json!({"a": 1, "ukh": "fixed"}));
        assert_eq!(attach_hash(&mut rec), "fixed");
        assert_eq!(rec["ukh"], json!("fixed"));
    }

    #[test]
    fn decimal_adapter_reads_strings_and_numbers() {
        #[derive(serde::Deserialize, serde::Serialize)]
        struct W {
            #[serde(with = "decimal")]
            v: f64,
        }
        let a: W = serde_json::from_str(r#"{"v":"0.75"}"#).unwrap();
        let b: W = serde_json::from_str(r#"{"v":0.75}"#).unwrap();
        assert_eq!(a.v, 0.75);
        assert_eq!(b.v, 0.75);
        assert_eq!(serde_json::to_string(&a).unwrap(), r#"{"v":"0.75"}"#);
    }
}
