//! Values file persistence
//!
//! A small JSON document `{"Values": {...}}` written with a one-space indent
//! and sorted keys, so that reading a file back and writing it again yields
//! the same bytes.

use crate::error::ValuesFileError;
use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;
use serde_json::{Serializer, Value};
use std::collections::BTreeMap;
use std::path::Path;

/// File used when no path is given
pub const DEFAULT_VALUES_FILE: &str = "example.json";

/// Key/value document persisted to disk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValuesDocument {
    #[serde(rename = "Values", default)]
    pub values: BTreeMap<String, Value>,
}

impl ValuesDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Document written by `rmon values write` when no pairs are given
    pub fn demo() -> Self {
        let mut doc = Self::new();
        doc.insert("key1", "value1");
        doc.insert("key2", "value2");
        doc.insert("key3", "value3");
        doc
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Encode with a one-space indent and no trailing newline
    pub fn to_bytes(&self) -> Result<Vec<u8>, ValuesFileError> {
        let mut buf = Vec::new();
        let mut ser = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b" "));
        self.serialize(&mut ser).map_err(ValuesFileError::Encode)?;
        Ok(buf)
    }

    pub fn write(&self, path: &Path) -> Result<(), ValuesFileError> {
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes).map_err(|source| ValuesFileError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn read(path: &Path) -> Result<Self, ValuesFileError> {
        let bytes = std::fs::read(path).map_err(|source| ValuesFileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_slice(&bytes).map_err(|source| ValuesFileError::Decode {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Parse a `key=value` argument; the value is taken as JSON when it parses,
/// otherwise as a plain string
pub fn parse_pair(arg: &str) -> Result<(String, Value), String> {
    let (key, raw) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", arg))?;
    if key.is_empty() {
        return Err(format!("empty key in '{}'", arg));
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}
