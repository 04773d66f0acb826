//! Hashing primitives for powledger
//!
//! Blocks never store their own hash. Every node recomputes it from the block's
//! fields, so the byte form fed into SHA-256 has to be identical everywhere. The
//! canonical form is a JSON document with object keys sorted, `", "` / `": "`
//! separators and non-ASCII characters escaped as `\uXXXX`.

use crate::blockchain::Block;
use crate::error::{ChainError, Result};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::Serialize;
use serde_json::ser::{Formatter, Serializer};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::io;

/// Hex-encoded SHA-256 digest (64 lowercase characters).
pub type HexDigest = String;

/// JSON formatter producing the canonical byte form used for hashing.
struct CanonicalFormatter;

impl Formatter for CanonicalFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }

    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if fragment.is_ascii() {
            return writer.write_all(fragment.as_bytes());
        }

        let mut units = [0u16; 2];
        for ch in fragment.chars() {
            if ch.is_ascii() {
                writer.write_all(&[ch as u8])?;
            } else {
                for unit in ch.encode_utf16(&mut units) {
                    write!(writer, "\\u{:04x}", unit)?;
                }
            }
        }
        Ok(())
    }
}

/// A JSON tree whose objects serialize with keys in sorted order, independent of
/// the map implementation `serde_json` was built with.
struct SortedKeys<'a>(&'a Value);

impl Serialize for SortedKeys<'_> {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self.0 {
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(&SortedKeys(item))?;
                }
                seq.end()
            }
            Value::Object(fields) => {
                let mut entries: Vec<_> = fields.iter().collect();
                entries.sort_by(|a, b| a.0.cmp(b.0));
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, &SortedKeys(value))?;
                }
                map.end()
            }
            scalar => scalar.serialize(serializer),
        }
    }
}

/// Serialize `value` into its canonical byte form.
pub fn canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let tree = serde_json::to_value(value)
        .map_err(|e| ChainError::InvalidInput(format!("Value is not serializable: {}", e)))?;

    let mut out = Vec::with_capacity(256);
    let mut serializer = Serializer::with_formatter(&mut out, CanonicalFormatter);
    SortedKeys(&tree)
        .serialize(&mut serializer)
        .map_err(|e| ChainError::InvalidInput(format!("Canonical encoding failed: {}", e)))?;
    Ok(out)
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> HexDigest {
    hex::encode(Sha256::digest(bytes))
}

/// Digest of a block over `index, previous_hash, proof, timestamp, transactions`.
pub fn hash_block(block: &Block) -> HexDigest {
    // Blocks contain only strings, integers and a finite-or-null float, all of which
    // serialize into an in-memory buffer without error.
    let bytes = canonical_bytes(block).expect("block serialization is infallible");
    sha256_hex(&bytes)
}
