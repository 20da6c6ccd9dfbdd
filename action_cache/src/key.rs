// Copyright 2026 action-engine contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::collections::HashMap;
use std::fmt;

use action_model::FileDigest;
use hashing::{Fingerprint, FingerprintSink};

use crate::artifact::CacheArtifact;

/// Namespaces this cache's keys away from any other subsystem that happens to fingerprint
/// similar-looking data with the same hash function.
const CACHE_KEY_NAMESPACE: &[u8] = b"action_cache.key.v1";

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ActionCacheKey(Fingerprint);

impl ActionCacheKey {
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.0
    }
}

impl fmt::Display for ActionCacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Eq, PartialEq)]
pub struct MissingInputDigest {
    pub path: String,
}

impl fmt::Display for MissingInputDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no digest was supplied for declared input {}", self.path)
    }
}

impl std::error::Error for MissingInputDigest {}

/// `command || sorted(input_files) || sorted(output_files) || each input file's FileDigest`,
/// seeded so the key space is private to this cache. `input_digests` need not be pre-sorted or
/// aligned to `artifact.input_files`'s order — they're looked up by path — but every file in
/// `artifact.input_files` must have a corresponding entry.
pub fn cache_key(
    artifact: &CacheArtifact,
    input_digests: &[FileDigest],
) -> Result<ActionCacheKey, MissingInputDigest> {
    let by_path: HashMap<&str, &FileDigest> = input_digests
        .iter()
        .map(|d| (d.source.as_path().to_str().unwrap_or_default(), d))
        .collect();

    let mut sink = FingerprintSink::new(CACHE_KEY_NAMESPACE);
    artifact.command.hash_into(&mut sink);

    sink.update_u64(artifact.input_files.len() as u64);
    for input in artifact.input_files.sorted().iter() {
        sink.update_str(&input.to_string());
    }

    sink.update_u64(artifact.output_files.len() as u64);
    for output in artifact.output_files.sorted().iter() {
        sink.update_str(&output.to_string());
    }

    for input in artifact.input_files.sorted().iter() {
        let path = input.to_string();
        let digest = by_path
            .get(path.as_str())
            .ok_or_else(|| MissingInputDigest { path: path.clone() })?;
        sink.update_fingerprint(&digest.digest.hash);
        sink.update_u64(digest.digest.size_bytes as u64);
    }

    Ok(ActionCacheKey(sink.finish()))
}
