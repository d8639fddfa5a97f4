//! Append-only ledger streams
//!
//! One newline-delimited file per stream. Each line is a canonical record
//! with its hash appended last. Lines are written with a single append
//! and flushed, so a torn write can only ever affect the final line.
//! Reading is strict: a malformed line aborts the read.

use crate::canonical::{self, RawRecord, HASH_FIELD};
use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ledger {
    path: PathBuf,
}

impl Ledger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Append a record, attaching its hash if missing. Returns the hash.
    pub fn append<R: Serialize + ?Sized>(&self, record: &R) -> Result<String> {
        self.append_raw(canonical::to_raw(record)?)
    }

    pub fn append_raw(&self, mut record: RawRecord) -> Result<String> {
        let hash = canonical::attach_hash(&mut record);
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
                debug!("Created ledger directory {}", parent.display());
            }
        }

        let mut line = canonical::ledger_line(&record);
        line.push('\n');

        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        f.write_all(line.as_bytes())?;
        f.flush()?;
        Ok(hash)
    }

    /// All records in append order. An absent stream reads as empty.
    pub fn read_all(&self) -> Result<Vec<RawRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read(&self.path)?;
        let mut records = Vec::new();
        for (i, bytes) in content.split(|b| *b == b'\n').enumerate() {
            let line = match std::str::from_utf8(bytes) {
                Ok(line) => line.trim(),
                Err(e) => return Err(Error::format(&self.path, i + 1, e.to_string())),
            };
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<Value>(line) {
                Ok(Value::Object(map)) => records.push(map),
                Ok(other) => {
                    return Err(Error::format(
                        &self.path,
                        i + 1,
                        format!("expected an object, found {}", other),
                    ))
                }
                Err(e) => return Err(Error::format(&self.path, i + 1, e.to_string())),
            }
        }
        Ok(records)
    }

    /// All records decoded as `R`. A line that does not fit `R` is a format error.
    pub fn read_typed<R: DeserializeOwned>(&self) -> Result<Vec<R>> {
        self.read_all()?
            .into_iter()
            .enumerate()
            .map(|(i, raw)| {
                serde_json::from_value(Value::Object(raw))
                    .map_err(|e| Error::format(&self.path, i + 1, e.to_string()))
            })
            .collect()
    }

    /// The last `n` records decoded as `R`.
    pub fn tail<R: DeserializeOwned>(&self, n: usize) -> Result<Vec<R>> {
        let mut all = self.read_typed::<R>()?;
        let start = all.len().saturating_sub(n);
        Ok(all.split_off(start))
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.read_all()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Recompute every record's hash. Returns the number of records checked.
    pub fn verify(&self) -> Result<usize> {
        let records = self.read_all()?;
        for (i, record) in records.iter().enumerate() {
            let found = match record.get(HASH_FIELD) {
                Some(Value::String(h)) => h.clone(),
                _ => String::new(),
            };
            let expected = canonical::compute_hash(record);
            if found != expected {
                return Err(Error::HashMismatch {
                    path: self.path.clone(),
                    line: i + 1,
                    expected,
                    found,
                });
            }
        }
        Ok(records.len())
    }
}
