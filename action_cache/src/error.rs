// Copyright 2026 action-engine contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::fmt;

use crate::bulk::BulkError;
use crate::entry::EntryCodecError;
use crate::key::MissingInputDigest;

#[derive(Debug)]
pub enum CacheError {
    /// No entry exists for this key, or no bulk under it matched the current inputs.
    Miss,
    /// An entry or bulk was read but failed to parse or verify; treated the same as a miss by
    /// callers, but logged louder since it points at on-disk corruption.
    Corruption(String),
    /// A bulk's recorded digests matched, but the archive's own contents didn't agree with
    /// what it claims to contain (or couldn't be read at all).
    BulkMismatch(String),
    UnsafeEntryPath(String),
    OutputMismatch { expected: usize, extracted: usize },
    MissingInputDigest(String),
    Io(std::io::Error),
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::Miss => write!(f, "cache miss"),
            CacheError::Corruption(msg) => write!(f, "cache entry corrupted: {msg}"),
            CacheError::BulkMismatch(msg) => write!(f, "cache bulk mismatch: {msg}"),
            CacheError::UnsafeEntryPath(path) => write!(f, "unsafe entry path: {path}"),
            CacheError::OutputMismatch { expected, extracted } => write!(
                f,
                "extracted {extracted} file(s) but {expected} were declared as outputs"
            ),
            CacheError::MissingInputDigest(path) => {
                write!(f, "no digest was supplied for declared input {path}")
            }
            CacheError::Io(e) => write!(f, "i/o error: {e}"),
        }
    }
}

impl std::error::Error for CacheError {}

impl From<std::io::Error> for CacheError {
    fn from(e: std::io::Error) -> CacheError {
        CacheError::Io(e)
    }
}

impl From<MissingInputDigest> for CacheError {
    fn from(e: MissingInputDigest) -> CacheError {
        CacheError::MissingInputDigest(e.path)
    }
}

impl From<EntryCodecError> for CacheError {
    fn from(e: EntryCodecError) -> CacheError {
        CacheError::Corruption(e.to_string())
    }
}

impl From<BulkError> for CacheError {
    fn from(e: BulkError) -> CacheError {
        match e {
            BulkError::UnsafeEntryPath(path) => CacheError::UnsafeEntryPath(path),
            BulkError::OutputMismatch { expected, extracted } => {
                CacheError::OutputMismatch { expected, extracted }
            }
            BulkError::Io(io) => CacheError::Io(io),
            other => CacheError::BulkMismatch(other.to_string()),
        }
    }
}
