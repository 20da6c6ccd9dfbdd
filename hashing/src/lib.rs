// Copyright 2026 action-engine contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! Stable content fingerprinting.
//!
//! A [`Fingerprint`] is a 256-bit content hash; [`Digest`] pairs one with the
//! byte length of the content it was computed over. Everything else in this
//! crate exists to compute fingerprints of either raw bytes, byte streams, or
//! hand-serialized structured records, in a way that is stable regardless of
//! which process computed it.

use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;

use serde::de::Visitor;
use serde::ser::Serializer;
use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest as Sha256Digest, Sha256};

pub const FINGERPRINT_SIZE: usize = 32;

pub const EMPTY_FINGERPRINT: Fingerprint = Fingerprint([
    0xe3, 0xb0, 0xc4, 0x42, 0x98, 0xfc, 0x1c, 0x14, 0x9a, 0xfb, 0xf4, 0xc8, 0x99, 0x6f, 0xb9, 0x24,
    0x27, 0xae, 0x41, 0xe4, 0x64, 0x9b, 0x93, 0x4c, 0xa4, 0x95, 0x99, 0x1b, 0x78, 0x52, 0xb8, 0x55,
]);

pub const EMPTY_DIGEST: Digest = Digest {
    hash: EMPTY_FINGERPRINT,
    size_bytes: 0,
};

/// An opaque, strong content hash. Equality is byte-equality.
#[derive(Clone, Copy, Eq, Hash, PartialEq, Ord, PartialOrd)]
pub struct Fingerprint(pub [u8; FINGERPRINT_SIZE]);

impl Fingerprint {
    pub fn from_bytes_unsafe(bytes: &[u8]) -> Fingerprint {
        assert_eq!(
            bytes.len(),
            FINGERPRINT_SIZE,
            "input was not a fingerprint; had length {}",
            bytes.len()
        );
        let mut fingerprint = [0; FINGERPRINT_SIZE];
        fingerprint.copy_from_slice(bytes);
        Fingerprint(fingerprint)
    }

    pub fn from_hex_string(s: &str) -> Result<Fingerprint, String> {
        <[u8; FINGERPRINT_SIZE] as hex::FromHex>::from_hex(s)
            .map(Fingerprint)
            .map_err(|e| format!("invalid fingerprint hex string {s:?}: {e}"))
    }

    pub fn as_bytes(&self) -> &[u8; FINGERPRINT_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// A hex prefix suitable for log lines; long enough to disambiguate by eye, short
    /// enough not to dominate the line.
    pub fn short_string(&self) -> String {
        self.to_hex()[..12].to_owned()
    }

    /// The on-disk layout's two sharding components: `(hex[0:2], hex[2:4])`.
    pub fn shard_components(&self) -> (String, String) {
        let hex = self.to_hex();
        (hex[0..2].to_owned(), hex[2..4].to_owned())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint<{}>", self.to_hex())
    }
}

impl AsRef<[u8]> for Fingerprint {
    fn as_ref(&self) -> &[u8] {
        &self.0[..]
    }
}

impl FromStr for Fingerprint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Fingerprint::from_hex_string(s)
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FingerprintVisitor;

        impl Visitor<'_> for FingerprintVisitor {
            type Value = Fingerprint;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a hex-encoded 32-byte fingerprint")
            }

            fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Fingerprint::from_hex_string(v).map_err(serde::de::Error::custom)
            }
        }

        deserializer.deserialize_str(FingerprintVisitor)
    }
}

/// A fingerprint plus the byte length of the content it covers.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct Digest {
    pub hash: Fingerprint,
    pub size_bytes: usize,
}

impl Digest {
    pub fn new(hash: Fingerprint, size_bytes: usize) -> Digest {
        Digest { hash, size_bytes }
    }

    pub fn of_bytes(bytes: &[u8]) -> Digest {
        Digest::new(fingerprint_of(bytes), bytes.len())
    }
}

/// Hash raw bytes with the crate's content hash function.
pub fn fingerprint_of(bytes: &[u8]) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    Fingerprint::from_bytes_unsafe(&hasher.finalize())
}

/// A `Write` sink that accumulates a canonical, field-ordered hash of whatever structured
/// record is written into it, seeded by a namespace string so independent subsystems never
/// share key spaces even if their field sequences happen to collide.
///
/// Callers write fields in a fixed, documented order: the hash has no self-description, so
/// the order is the only thing that makes it a "schema".
pub struct FingerprintSink {
    hasher: Sha256,
}

impl FingerprintSink {
    pub fn new(seed: &[u8]) -> FingerprintSink {
        let mut hasher = Sha256::new();
        hasher.update(seed);
        FingerprintSink { hasher }
    }

    pub fn update_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        // Length-prefix every chunk so that e.g. writing ["ab", "c"] cannot collide with
        // ["a", "bc"].
        self.hasher.update((bytes.len() as u64).to_le_bytes());
        self.hasher.update(bytes);
        self
    }

    pub fn update_str(&mut self, s: &str) -> &mut Self {
        self.update_bytes(s.as_bytes())
    }

    pub fn update_u64(&mut self, n: u64) -> &mut Self {
        self.hasher.update(n.to_le_bytes());
        self
    }

    pub fn update_fingerprint(&mut self, fp: &Fingerprint) -> &mut Self {
        self.hasher.update(fp.as_bytes());
        self
    }

    pub fn finish(self) -> Fingerprint {
        Fingerprint::from_bytes_unsafe(&self.hasher.finalize())
    }
}

impl Write for FingerprintSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.hasher.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Build a seeded fingerprint of a structured record via a caller-provided closure that
/// writes the record's fields in canonical order.
pub fn serialize_fingerprint(seed: &[u8], write_fields: impl FnOnce(&mut FingerprintSink)) -> Fingerprint {
    let mut sink = FingerprintSink::new(seed);
    write_fields(&mut sink);
    sink.finish()
}

/// A `Write` instance that fingerprints all data that passes through it, for streaming
/// content hashing in lockstep with a copy.
pub struct WriterHasher<T> {
    hasher: Sha256,
    byte_count: usize,
    inner: T,
}

impl<T> WriterHasher<T> {
    pub fn new(inner: T) -> WriterHasher<T> {
        WriterHasher {
            hasher: Sha256::new(),
            byte_count: 0,
            inner,
        }
    }

    pub fn finish(self) -> (Digest, T) {
        (
            Digest::new(
                Fingerprint::from_bytes_unsafe(&self.hasher.finalize()),
                self.byte_count,
            ),
            self.inner,
        )
    }
}

impl<W: Write> Write for WriterHasher<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.hasher.update(&buf[0..written]);
        self.byte_count += written;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Copy `reader` into `writer`, hashing the bytes as they pass through.
pub fn sync_copy_and_hash<R: ?Sized + io::Read, W: ?Sized + io::Write>(
    reader: &mut R,
    writer: &mut W,
) -> io::Result<Digest> {
    let mut hasher = WriterHasher::new(writer);
    io::copy(reader, &mut hasher)?;
    Ok(hasher.finish().0)
}

/// Digest an entire file's contents. Only content bytes participate; metadata such as mtime
/// is never read.
pub fn digest_file(path: &std::path::Path) -> io::Result<Digest> {
    let mut file = std::fs::File::open(path)?;
    let mut sink = io::sink();
    sync_copy_and_hash(&mut file, &mut sink)
}

/// Async equivalent of [`digest_file`], for use from a tokio worker pool.
pub async fn digest_file_async(path: &std::path::Path) -> io::Result<Digest> {
    use tokio::io::AsyncReadExt;

    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    let mut size = 0usize;
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        size += n;
    }
    Ok(Digest::new(Fingerprint::from_bytes_unsafe(&hasher.finalize()), size))
}

#[cfg(test)]
mod tests;
